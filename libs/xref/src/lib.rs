// This file is part of pdfr-rs.
//
// pdfr-rs is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// pdfr-rs is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with pdfr-rs.  If not, see <http://www.gnu.org/licenses/>.
//! Cross-reference resolution: locating `startxref`/`/Prev` chains,
//! parsing classical xref tables and xref streams (with the PNG-Up
//! predictor), and merging them into one first-wins object index.
//!
//! Sections are merged first-wins: the primary xref section is walked
//! before any `/Prev` chain, and a `/Prev` section's row for an object is
//! only inserted when that object wasn't already seen, so the most
//! current section always wins.

use std::collections::HashMap;

use pdfr_bytes::{lastmatch, read_be_uint, subchunk, Scanner, Token};
use pdfr_dictionary::{Dictionary, Parser as DictParser, Value};
use thiserror::Error;

/// Bounds the `/Prev` chain length against a crafted cyclic xref.
pub const MAX_XREF_CHAIN: usize = 1024;

#[derive(Error, Debug)]
pub enum XrefError {
    #[error("no startxref marker found")]
    NoStartxref,
    #[error("malformed xref section at offset {0}")]
    Malformed(usize),
    #[error("xref stream missing required /W entry")]
    MissingWidths,
    #[error("xref stream has zero-width row")]
    ZeroWidthRow,
    #[error("dictionary parse error: {0}")]
    Dict(#[from] pdfr_dictionary::DictError),
    #[error("inflate error: {0}")]
    Inflate(#[from] pdfr_inflate::InflateError),
    #[error("xref /Prev chain exceeds bound of {0}")]
    ChainTooLong(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    InUse { offset: usize, generation: u16 },
    Compressed { stream_object: u32, index_in_stream: u32 },
}

pub struct XrefTable {
    pub entries: HashMap<u32, XrefEntry>,
    pub trailer: Dictionary,
}

impl XrefTable {
    pub fn get(&self, object: u32) -> Option<XrefEntry> {
        self.entries.get(&object).copied()
    }
}

struct Section {
    rows: Vec<(u32, XrefEntry)>,
    trailer: Dictionary,
}

/// Finds the byte offset of the final `startxref` target and walks the
/// `/Prev` chain, returning each section's resolved rows plus its trailer,
/// most-current section first.
pub fn resolve(data: &[u8]) -> Result<XrefTable, XrefError> {
    let start = locate_initial_xref(data)?;
    log::trace!("resolving xref chain starting at offset {start}");

    let mut entries: HashMap<u32, XrefEntry> = HashMap::new();
    let mut trailer = Dictionary::new();
    let mut visited = std::collections::HashSet::new();
    let mut next = Some(start);
    let mut chain_len = 0;

    while let Some(offset) = next {
        chain_len += 1;
        if chain_len > MAX_XREF_CHAIN {
            return Err(XrefError::ChainTooLong(MAX_XREF_CHAIN));
        }
        if !visited.insert(offset) {
            log::warn!("xref /Prev chain revisited offset {offset}, stopping");
            break; // cyclic /Prev chain, stop rather than loop forever
        }
        let section = parse_section(data, offset)?;
        for (object, entry) in section.rows {
            entries.entry(object).or_insert(entry);
        }
        for (key, value) in section.trailer.iter() {
            trailer.entry(key.clone()).or_insert_with(|| value.clone());
        }
        next = section
            .trailer
            .get("Prev")
            .and_then(Value::as_int)
            .map(|p| p as usize)
            .filter(|&p| p != offset);
    }

    Ok(XrefTable { entries, trailer })
}

fn locate_initial_xref(data: &[u8]) -> Result<usize, XrefError> {
    let tail_start = data.len().saturating_sub(2048);
    let marker = lastmatch(&data[tail_start..], b"startxref")
        .map(|p| p + tail_start)
        .ok_or(XrefError::NoStartxref)?;
    let mut scanner = Scanner::at(data, marker + "startxref".len());
    match scanner.next_token().map_err(|_| XrefError::NoStartxref)? {
        Some(Token::Integer(n)) if n >= 0 => Ok(n as usize),
        _ => Err(XrefError::NoStartxref),
    }
}

fn parse_section(data: &[u8], offset: usize) -> Result<Section, XrefError> {
    let mut scanner = Scanner::at(data, offset);
    match scanner.next_token()? {
        Some(Token::Keyword(k)) if k == "xref" => parse_classical_section(data, scanner.pos()),
        _ => parse_stream_section(data, offset),
    }
}

fn parse_classical_section(data: &[u8], mut pos: usize) -> Result<Section, XrefError> {
    let mut rows = Vec::new();
    loop {
        let mut scanner = Scanner::at(data, pos);
        let first = scanner.next_token()?;
        match first {
            Some(Token::Keyword(k)) if k == "trailer" => {
                let (trailer, _) = pdfr_dictionary::parse_dict_at(data, scanner.pos())?;
                return Ok(Section { rows, trailer });
            }
            Some(Token::Integer(start_obj)) => {
                let count = match scanner.next_token()? {
                    Some(Token::Integer(c)) => c,
                    _ => return Err(XrefError::Malformed(pos)),
                };
                pos = scanner.pos();
                for i in 0..count {
                    let mut row_scanner = Scanner::at(data, pos);
                    let offset_tok = row_scanner.next_token()?;
                    let gen_tok = row_scanner.next_token()?;
                    let flag_tok = row_scanner.next_token()?;
                    pos = row_scanner.pos();
                    let (offset, generation, flag) = match (offset_tok, gen_tok, flag_tok) {
                        (
                            Some(Token::Integer(o)),
                            Some(Token::Integer(g)),
                            Some(Token::Keyword(f)),
                        ) => (o, g, f),
                        _ => return Err(XrefError::Malformed(pos)),
                    };
                    if flag == "n" {
                        let object = (start_obj + i) as u32;
                        rows.push((
                            object,
                            XrefEntry::InUse {
                                offset: offset.max(0) as usize,
                                generation: generation.max(0) as u16,
                            },
                        ));
                    }
                }
            }
            _ => return Err(XrefError::Malformed(pos)),
        }
    }
}

fn parse_stream_section(data: &[u8], objstart: usize) -> Result<Section, XrefError> {
    let mut parser = DictParser::at(data, objstart);
    // Skip the "N G obj" header preceding the dictionary if present: an
    // xref-stream section starts at an indirect object, not bare "<<".
    let mut scanner = Scanner::at(data, objstart);
    let save = scanner.pos();
    let looks_like_header = matches!(scanner.next_token()?, Some(Token::Integer(_)));
    let dict_pos = if looks_like_header {
        let mut s = Scanner::at(data, save);
        let _obj_num = s.next_token()?;
        let _gen = s.next_token()?;
        match s.next_token()? {
            Some(Token::Keyword(k)) if k == "obj" => s.pos(),
            _ => save,
        }
    } else {
        save
    };
    parser = DictParser::at(data, dict_pos);
    let value = parser.parse_value()?;
    let dict = value.as_dict().cloned().unwrap_or_default();

    let stream_start = parser.pos();
    let body = subchunk(data, b"stream", b"endstream", stream_start)
        .ok_or(XrefError::Malformed(stream_start))?;
    // "stream" is followed by CRLF or LF before the actual data.
    let body = match body.first() {
        Some(b'\r') => &body[2.min(body.len())..],
        Some(b'\n') => &body[1..],
        _ => body,
    };

    let is_flate = dict
        .get("Filter")
        .and_then(Value::as_name)
        .map(|f| f == "FlateDecode")
        .unwrap_or(false);
    let decoded = if is_flate {
        pdfr_inflate::inflate(body)?
    } else {
        body.to_vec()
    };

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_int).map(|n| n as usize).collect())
        .ok_or(XrefError::MissingWidths)?;
    if widths.len() != 3 {
        return Err(XrefError::MissingWidths);
    }

    let predictor = dict
        .get("DecodeParms")
        .and_then(Value::as_dict)
        .and_then(|d| d.get("Predictor"))
        .and_then(Value::as_int)
        .unwrap_or(1);
    let uses_png_up = predictor > 9;

    let field_total: usize = widths.iter().sum();
    let row_width = field_total + if uses_png_up { 1 } else { 0 };
    if row_width == 0 {
        return Err(XrefError::ZeroWidthRow);
    }
    let nrows = decoded.len() / row_width;

    let mut rows: Vec<Vec<u8>> = decoded
        .chunks(row_width)
        .take(nrows)
        .map(|c| c.to_vec())
        .collect();

    if predictor == 12 {
        for i in 1..rows.len() {
            for j in 0..row_width {
                rows[i][j] = rows[i][j].wrapping_add(rows[i - 1][j]);
            }
        }
    }

    let object_numbers = object_numbers_for(&dict, rows.len());

    let mut out = Vec::new();
    for (row, &object) in rows.iter().zip(object_numbers.iter()) {
        let fields = &row[if uses_png_up { 1 } else { 0 }..];
        let (w0, w1, w2) = (widths[0], widths[1], widths[2]);
        let mut cursor = 0;
        let type_field = if w0 == 0 {
            1
        } else {
            let v = read_be_uint(&fields[cursor..cursor + w0], w0);
            cursor += w0;
            v
        };
        let field1 = read_be_uint(&fields[cursor..cursor + w1], w1);
        cursor += w1;
        let field2 = if w2 == 0 {
            0
        } else {
            read_be_uint(&fields[cursor..cursor + w2], w2)
        };

        match type_field {
            0 => {} // free entry
            1 => out.push((
                object,
                XrefEntry::InUse {
                    offset: field1 as usize,
                    generation: field2 as u16,
                },
            )),
            2 => out.push((
                object,
                XrefEntry::Compressed {
                    stream_object: field1 as u32,
                    index_in_stream: field2 as u32,
                },
            )),
            _ => {}
        }
    }

    Ok(Section { rows: out, trailer: dict })
}

fn object_numbers_for(dict: &Dictionary, nrows: usize) -> Vec<u32> {
    let index = dict.get("Index").and_then(Value::as_array);
    match index {
        Some(pairs) if pairs.len() >= 2 => {
            let mut out = Vec::new();
            let mut i = 0;
            while i + 1 < pairs.len() {
                let first = pairs[i].as_int().unwrap_or(0);
                let count = pairs[i + 1].as_int().unwrap_or(0);
                for j in 0..count {
                    out.push((first + j) as u32);
                }
                i += 2;
            }
            out
        }
        _ => (0..nrows as u32).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_pdf_with_classical_xref() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj1_offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 2\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj1_offset).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());
        pdf
    }

    #[test]
    fn resolves_classical_xref_table() {
        let pdf = build_minimal_pdf_with_classical_xref();
        let table = resolve(&pdf).unwrap();
        assert!(table.get(0).is_none(), "free entry should not be present");
        match table.get(1) {
            Some(XrefEntry::InUse { offset, generation }) => {
                assert_eq!(generation, 0);
                assert_eq!(&pdf[offset..offset + 7], b"1 0 obj");
            }
            other => panic!("expected in-use entry, got {:?}", other),
        }
        assert_eq!(table.trailer.get("Size").unwrap().as_int(), Some(2));
    }

    #[test]
    fn locates_startxref_near_end_of_file() {
        let pdf = build_minimal_pdf_with_classical_xref();
        let offset = locate_initial_xref(&pdf).unwrap();
        assert_eq!(&pdf[offset..offset + 4], b"xref");
    }

    #[test]
    fn first_wins_merge_prefers_earlier_section_over_prev() {
        // Two chained sections both claim object 1; the first (most
        // current) one visited must win, not the /Prev section.
        let mut entries = HashMap::new();
        entries.insert(
            1,
            XrefEntry::InUse {
                offset: 100,
                generation: 0,
            },
        );
        // Simulate what `resolve`'s merge loop does: inserting only if
        // absent preserves the first section's row when a later section
        // is merged in afterwards.
        let later = XrefEntry::InUse {
            offset: 9999,
            generation: 0,
        };
        entries.entry(1).or_insert(later);
        assert_eq!(
            entries.get(&1),
            Some(&XrefEntry::InUse {
                offset: 100,
                generation: 0
            })
        );
    }
}
