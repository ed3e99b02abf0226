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
//! Font resolution: combines a font dictionary's `/Encoding`,
//! `/Differences`, `/ToUnicode`, `/Widths`, and `/DescendantFonts` into a
//! single `Font` that maps raw character codes to `(Unicode, width)`
//! pairs.

use pdfr_dictionary::{Dictionary, Value};
use pdfr_glyphs::{self as glyphs, Encoding};
use pdfr_objects::{ObjectError, ObjectStore};
use pdfr_widths::{self as widths, WidthTable, DEFAULT_WIDTH};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FontError {
    #[error("object store error: {0}")]
    Object(#[from] ObjectError),
    #[error("font dictionary is missing required entry {0}")]
    MissingEntry(&'static str),
}

/// A fully resolved font: character codes (1 byte for simple fonts, 2
/// bytes for Type0/composite fonts) map through `encoding` to Unicode and
/// through `widths` to a text-space glyph width.
pub struct Font {
    pub base_font: String,
    pub is_composite: bool,
    encoding: Encoding,
    widths: WidthTable,
    /// Mirrors `font::widthFromCharCodes`: `true` when widths came from an
    /// explicit `/Widths` or `/DescendantFonts[0]/W` array (keyed by raw
    /// character code), `false` when they came from a core-14 table
    /// (keyed by the Unicode value the code resolves to).
    width_from_char_codes: bool,
}

impl Font {
    /// Number of bytes each character code occupies in a content-stream
    /// string operand for this font.
    pub fn code_length(&self) -> usize {
        if self.is_composite {
            2
        } else {
            1
        }
    }

    /// Splits a string operand's raw bytes into character codes.
    pub fn decode_codes(&self, bytes: &[u8]) -> Vec<u16> {
        let width = self.code_length();
        bytes
            .chunks(width)
            .filter(|c| c.len() == width)
            .map(|c| {
                if width == 2 {
                    ((c[0] as u16) << 8) | c[1] as u16
                } else {
                    c[0] as u16
                }
            })
            .collect()
    }

    pub fn unicode_for(&self, code: u16) -> u32 {
        self.encoding.unicode_for(code)
    }

    /// Width of `code` in 1/1000 em text space.
    pub fn width_for(&self, code: u16) -> u32 {
        let key = if self.width_from_char_codes {
            code
        } else {
            (self.unicode_for(code) & 0xFFFF) as u16
        };
        self.widths.width_of(key)
    }

    /// Decodes a string operand straight to displayable text, one
    /// `char` per resolved code point.
    pub fn text_for(&self, bytes: &[u8]) -> String {
        self.decode_codes(bytes)
            .into_iter()
            .filter_map(|code| char::from_u32(self.unicode_for(code)))
            .collect()
    }
}

fn resolve_array(store: &ObjectStore, value: &Value) -> Result<Vec<Value>, FontError> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::Ref(num, _) => Ok(store.get(*num)?.value.as_array().map(|a| a.to_vec()).unwrap_or_default()),
        _ => Ok(Vec::new()),
    }
}

fn resolve_dict<'a>(store: &ObjectStore, value: &'a Value, owned: &'a mut Option<Dictionary>) -> Option<&'a Dictionary> {
    match value {
        Value::Dict(d) => Some(d),
        Value::Ref(num, _) => {
            *owned = store.get(*num).ok().map(|o| o.dict);
            owned.as_ref()
        }
        _ => None,
    }
}

/// Resolves `/BaseFont`, stripping the `ABCDEF+` subset-tag prefix PDF
/// producers add to embedded subsets, matching `font::getFontName`.
fn strip_subset_tag(base_font: &str) -> &str {
    let name = base_font.trim_start_matches('/');
    if name.len() > 7 && name.as_bytes()[6] == b'+' && name[..6].bytes().all(|b| b.is_ascii_uppercase()) {
        &name[7..]
    } else {
        name
    }
}

fn build_encoding(dict: &Dictionary, store: &ObjectStore) -> Result<Encoding, FontError> {
    let mut owned_encoding_dict = None;
    let (base_name, differences): (Option<String>, Option<Vec<Value>>) = match dict.get("Encoding") {
        Some(Value::Name(n)) => (Some(n.clone()), None),
        Some(v @ Value::Ref(..)) => {
            let encref = resolve_dict(store, v, &mut owned_encoding_dict);
            let base = encref.and_then(|d| d.get("BaseEncoding")).and_then(Value::as_name).map(String::from);
            let diffs = encref.and_then(|d| d.get("Differences")).and_then(Value::as_array).map(|a| a.to_vec());
            (base, diffs)
        }
        _ => (None, None),
    };

    let to_unicode_stream = match dict.get("ToUnicode") {
        Some(Value::Ref(num, _)) => store.get(*num)?.stream,
        _ => None,
    };

    Ok(glyphs::build(
        base_name.as_deref(),
        differences.as_deref(),
        to_unicode_stream.as_deref(),
    ))
}

/// `getWidthTable`/`parseWidths`: a simple font's direct `/Widths` array.
fn build_simple_widths(dict: &Dictionary, store: &ObjectStore) -> Result<Option<WidthTable>, FontError> {
    let widths_value = match dict.get("Widths") {
        Some(v) => v,
        None => return Ok(None),
    };
    let items = resolve_array(store, widths_value)?;
    if items.is_empty() {
        return Ok(None);
    }
    let first_char = dict.get("FirstChar").and_then(Value::as_int).unwrap_or(0).max(0) as u16;
    Ok(Some(WidthTable::from_map(widths::parse_widths_array(&items, first_char))))
}

/// `parseDescendants`: a composite font's `/DescendantFonts[0]/W` array.
fn build_descendant_widths(dict: &Dictionary, store: &ObjectStore) -> Result<Option<WidthTable>, FontError> {
    let descendants = match dict.get("DescendantFonts") {
        Some(v) => resolve_array(store, v)?,
        None => return Ok(None),
    };
    let first = match descendants.first() {
        Some(v) => v,
        None => return Ok(None),
    };
    let mut owned = None;
    let desc_dict = match resolve_dict(store, first, &mut owned) {
        Some(d) => d,
        None => return Ok(None),
    };
    let w_value = match desc_dict.get("W") {
        Some(v) => v,
        None => return Ok(None),
    };
    let items = resolve_array(store, w_value)?;
    if items.is_empty() {
        return Ok(None);
    }
    Ok(Some(WidthTable::from_map(widths::parse_descendant_w_array(&items))))
}

/// Builds a `Font` from a `/Font` resource dictionary, resolving every
/// indirect reference it contains through `store`.
pub fn build(dict: &Dictionary, store: &ObjectStore) -> Result<Font, FontError> {
    let base_font = dict
        .get("BaseFont")
        .and_then(Value::as_name)
        .map(strip_subset_tag)
        .unwrap_or("Unknown")
        .to_string();
    let is_composite = dict.get("Subtype").and_then(Value::as_name) == Some("Type0");

    let encoding = build_encoding(dict, store)?;

    let (widths, width_from_char_codes) = if let Some(w) = build_simple_widths(dict, store)? {
        (w, true)
    } else if let Some(w) = build_descendant_widths(dict, store)? {
        (w, true)
    } else if let Some(core) = widths::core_font_table(&base_font).map(|t| WidthTable::from_map(t.clone())) {
        (core, false)
    } else {
        log::debug!("font {base_font:?} has no width source, defaulting to {DEFAULT_WIDTH}");
        (WidthTable::from_map(Default::default()).with_default(DEFAULT_WIDTH), true)
    };

    Ok(Font {
        base_font,
        is_composite,
        encoding,
        widths,
        width_from_char_codes,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdfr_objects::ObjectStore;

    fn build_minimal_pdf_with_font(font_obj: &str) -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj1_offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog >>\nendobj\n");
        let obj2_offset = pdf.len();
        pdf.extend_from_slice(format!("2 0 obj\n{font_obj}\nendobj\n").as_bytes());
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 3\n");
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj1_offset).as_bytes());
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj2_offset).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 3 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());
        pdf
    }

    #[test]
    fn core_font_without_widths_uses_times_roman_table() {
        let pdf = build_minimal_pdf_with_font(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman /Encoding /WinAnsiEncoding >>",
        );
        let store = ObjectStore::open(&pdf).unwrap();
        let font_dict = store.get(2).unwrap().dict;
        let font = build(&font_dict, &store).unwrap();
        assert_eq!(font.width_for(b'A' as u16), 722);
        assert_eq!(font.unicode_for(b'A' as u16), 0x41);
    }

    #[test]
    fn explicit_widths_array_overrides_core_table() {
        let pdf = build_minimal_pdf_with_font(
            "<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman /FirstChar 65 /Widths [111 222 333] >>",
        );
        let store = ObjectStore::open(&pdf).unwrap();
        let font_dict = store.get(2).unwrap().dict;
        let font = build(&font_dict, &store).unwrap();
        assert_eq!(font.width_for(65), 111);
        assert_eq!(font.width_for(66), 222);
    }

    #[test]
    fn subset_tag_is_stripped_from_base_font_name() {
        let pdf = build_minimal_pdf_with_font(
            "<< /Type /Font /Subtype /Type1 /BaseFont /ABCDEF+Times-Roman >>",
        );
        let store = ObjectStore::open(&pdf).unwrap();
        let font_dict = store.get(2).unwrap().dict;
        let font = build(&font_dict, &store).unwrap();
        assert_eq!(font.base_font, "Times-Roman");
    }

    #[test]
    fn missing_font_falls_back_to_default_width() {
        let pdf = build_minimal_pdf_with_font(
            "<< /Type /Font /Subtype /Type1 /BaseFont /SomeEmbeddedFont >>",
        );
        let store = ObjectStore::open(&pdf).unwrap();
        let font_dict = store.get(2).unwrap().dict;
        let font = build(&font_dict, &store).unwrap();
        assert_eq!(font.width_for(65), DEFAULT_WIDTH);
    }

    #[test]
    fn composite_font_decodes_two_byte_codes() {
        let pdf = build_minimal_pdf_with_font(
            "<< /Type /Font /Subtype /Type0 /BaseFont /Identity-Font >>",
        );
        let store = ObjectStore::open(&pdf).unwrap();
        let font_dict = store.get(2).unwrap().dict;
        let font = build(&font_dict, &store).unwrap();
        assert_eq!(font.code_length(), 2);
        assert_eq!(font.decode_codes(&[0x00, 0x41, 0x00, 0x42]), vec![0x0041, 0x0042]);
    }
}
