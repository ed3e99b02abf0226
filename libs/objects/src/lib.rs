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
//! Indirect object materialization: locates an object via the xref table
//! (direct offset or compressed-in-`ObjStm`), decrypts it when the
//! document carries a standard `/Encrypt` dictionary, and runs its
//! `/Filter` chain.

use std::cell::RefCell;
use std::collections::HashMap;

use pdfr_bytes::{subchunk, Scanner, Token};
use pdfr_dictionary::{Dictionary, Parser as DictParser, Value};
use pdfr_xref::{resolve, XrefEntry, XrefTable};
use thiserror::Error;

/// `Do` XObject recursion and object-stream nesting are bounded by the
/// caller (`pdfr-content`); this crate bounds only its own filter chain
/// against pathological repeated-filter arrays.
const MAX_FILTER_CHAIN: usize = 8;

#[derive(Error, Debug)]
pub enum ObjectError {
    #[error("object {0} not found in xref table")]
    NotFound(u32),
    #[error("xref error: {0}")]
    Xref(#[from] pdfr_xref::XrefError),
    #[error("dictionary parse error: {0}")]
    Dict(#[from] pdfr_dictionary::DictError),
    #[error("inflate error: {0}")]
    Inflate(#[from] pdfr_inflate::InflateError),
    #[error("malformed object at offset {0}")]
    Malformed(usize),
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),
    #[error("object stream {0} is malformed")]
    MalformedObjStm(u32),
    #[error("filter chain exceeds bound of {0}")]
    FilterChainTooLong(usize),
}

/// A materialized indirect object: its dictionary (or, for non-dictionary
/// values such as bare integers found in object streams, an empty
/// dictionary) plus its decoded stream bytes, if it has one.
pub struct Object {
    pub dict: Dictionary,
    pub value: Value,
    pub stream: Option<Vec<u8>>,
}

pub struct ObjectStore<'a> {
    data: &'a [u8],
    xref: XrefTable,
    file_key: Option<Vec<u8>>,
    encrypt_object: Option<u32>,
    objstm_cache: RefCell<HashMap<u32, Vec<(u32, usize, usize)>>>,
}

impl<'a> ObjectStore<'a> {
    pub fn open(data: &'a [u8]) -> Result<Self, ObjectError> {
        let xref = resolve(data)?;
        let mut store = ObjectStore {
            data,
            xref,
            file_key: None,
            encrypt_object: None,
            objstm_cache: RefCell::new(HashMap::new()),
        };
        store.setup_encryption()?;
        Ok(store)
    }

    pub fn xref_entries(&self) -> impl Iterator<Item = (u32, XrefEntry)> + '_ {
        self.xref.entries.iter().map(|(&n, &e)| (n, e))
    }

    pub fn trailer(&self) -> &Dictionary {
        &self.xref.trailer
    }

    fn setup_encryption(&mut self) -> Result<(), ObjectError> {
        let encrypt_ref = match self.xref.trailer.get("Encrypt").and_then(Value::as_ref) {
            Some(r) => r,
            None => return Ok(()),
        };
        self.encrypt_object = Some(encrypt_ref.0);
        let raw = self.get_raw(encrypt_ref.0)?;
        let dict = raw.dict;

        let o_entry = dict
            .get("O")
            .and_then(|v| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default();
        let permissions = dict.get("P").and_then(Value::as_int).unwrap_or(-1) as i32;
        let revision = dict.get("R").and_then(Value::as_int).unwrap_or(2) as u8;
        let key_bits = dict.get("Length").and_then(Value::as_int).unwrap_or(40) as usize;
        let encrypt_metadata = !matches!(dict.get("EncryptMetadata"), Some(Value::Bool(false)));
        let id0 = self
            .xref
            .trailer
            .get("ID")
            .and_then(Value::as_array)
            .and_then(|a| a.first())
            .and_then(|v| match v {
                Value::Str(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap_or_default();

        let key = pdfr_crypto::compute_file_key(
            &[], // empty user password: the common case this crate supports
            &o_entry,
            permissions,
            &id0,
            key_bits / 8,
            revision,
            encrypt_metadata,
        );
        log::debug!("document is encrypted, derived a {}-byte file key", key.len());
        self.file_key = Some(key);
        Ok(())
    }

    /// Materializes object `num`, decrypting and decoding its stream if
    /// present. Skips decryption for the `/Encrypt` dictionary itself.
    ///
    /// A compound object inside an `ObjStm` may itself consist solely of an
    /// indirect reference (`N G R`) rather than a dictionary; such
    /// pseudo-references are chased recursively.
    pub fn get(&self, num: u32) -> Result<Object, ObjectError> {
        let mut object = self.get_raw(num)?;
        if let Value::Ref(target, _) = object.value {
            if object.dict.is_empty() && object.stream.is_none() && target != num {
                return self.get(target);
            }
        }
        if let Some(stream) = object.stream.take() {
            let stream = match (&self.file_key, self.encrypt_object == Some(num)) {
                (Some(key), false) => {
                    let generation = match self.xref.get(num) {
                        Some(XrefEntry::InUse { generation, .. }) => generation,
                        _ => 0,
                    };
                    pdfr_crypto::decrypt_stream(&stream, key, num, generation)
                        .map_err(|_| ObjectError::Malformed(num as usize))?
                }
                _ => stream,
            };
            object.stream = Some(self.apply_filters(&object.dict, stream)?);
        }
        Ok(object)
    }

    /// Materializes the object without decryption or filter decoding, used
    /// both for the `/Encrypt` dictionary itself and as the first stage of
    /// `get`.
    fn get_raw(&self, num: u32) -> Result<Object, ObjectError> {
        match self.xref.get(num) {
            Some(XrefEntry::InUse { offset, .. }) => self.parse_direct_object(offset),
            Some(XrefEntry::Compressed {
                stream_object,
                index_in_stream,
            }) => self.parse_compressed_object(stream_object, index_in_stream),
            None => Err(ObjectError::NotFound(num)),
        }
    }

    fn parse_direct_object(&self, offset: usize) -> Result<Object, ObjectError> {
        let mut scanner = Scanner::at(self.data, offset);
        let _num = scanner.next_token()?;
        let _gen = scanner.next_token()?;
        match scanner.next_token()? {
            Some(Token::Keyword(k)) if k == "obj" => {}
            _ => return Err(ObjectError::Malformed(offset)),
        }
        let mut parser = DictParser::at(self.data, scanner.pos());
        let value = parser.parse_value()?;
        let dict = value.as_dict().cloned().unwrap_or_default();
        let stream = self.extract_stream(&dict, parser.pos())?;
        Ok(Object { dict, value, stream })
    }

    fn extract_stream(&self, dict: &Dictionary, after_value: usize) -> Result<Option<Vec<u8>>, ObjectError> {
        let mut scanner = Scanner::at(self.data, after_value);
        let has_stream = matches!(scanner.next_token()?, Some(Token::Keyword(k)) if k == "stream");
        if !has_stream {
            return Ok(None);
        }
        let body = subchunk(self.data, b"stream", b"endstream", after_value)
            .ok_or(ObjectError::Malformed(after_value))?;
        let body = match body.first() {
            Some(b'\r') => &body[2.min(body.len())..],
            Some(b'\n') => &body[1..],
            _ => body,
        };
        let length = dict.get("Length").and_then(Value::as_int).map(|n| n as usize);
        let body = match length {
            Some(len) if len <= body.len() => &body[..len],
            _ => body,
        };
        Ok(Some(body.to_vec()))
    }

    fn apply_filters(&self, dict: &Dictionary, mut data: Vec<u8>) -> Result<Vec<u8>, ObjectError> {
        let filters: Vec<String> = match dict.get("Filter") {
            Some(Value::Name(n)) => vec![n.clone()],
            Some(Value::Array(a)) => a.iter().filter_map(|v| v.as_name().map(String::from)).collect(),
            _ => Vec::new(),
        };
        if filters.len() > MAX_FILTER_CHAIN {
            return Err(ObjectError::FilterChainTooLong(MAX_FILTER_CHAIN));
        }
        for filter in filters {
            data = match filter.as_str() {
                "FlateDecode" | "Fl" => pdfr_inflate::inflate(&data)?,
                // Pass unrecognized filters through unchanged rather than
                // failing the whole document; `page_text` callers degrade
                // to whatever bytes are present. LZW/DCT/CCITT image
                // codecs are intentionally not decoded.
                other => {
                    log::warn!("unsupported filter {other:?}, passing stream through unchanged");
                    data
                }
            };
        }
        Ok(data)
    }

    fn parse_compressed_object(
        &self,
        stream_object: u32,
        index_in_stream: u32,
    ) -> Result<Object, ObjectError> {
        if !self.objstm_cache.borrow().contains_key(&stream_object) {
            let entries = self.load_objstm_index(stream_object)?;
            self.objstm_cache.borrow_mut().insert(stream_object, entries);
        }
        let cache = self.objstm_cache.borrow();
        let entries = cache.get(&stream_object).unwrap();
        let (_, start, end) = *entries
            .get(index_in_stream as usize)
            .ok_or(ObjectError::MalformedObjStm(stream_object))?;
        let container = self.get(stream_object)?;
        let stream = container
            .stream
            .as_ref()
            .ok_or(ObjectError::MalformedObjStm(stream_object))?;
        let slice = stream
            .get(start..end)
            .ok_or(ObjectError::MalformedObjStm(stream_object))?;
        let mut parser = DictParser::new(slice);
        let value = parser.parse_value()?;
        let dict = value.as_dict().cloned().unwrap_or_default();
        Ok(Object { dict, value, stream: None })
    }

    fn load_objstm_index(&self, stream_object: u32) -> Result<Vec<(u32, usize, usize)>, ObjectError> {
        let container = self.get(stream_object)?;
        let count = container
            .dict
            .get("N")
            .and_then(Value::as_int)
            .ok_or(ObjectError::MalformedObjStm(stream_object))? as usize;
        let first = container
            .dict
            .get("First")
            .and_then(Value::as_int)
            .ok_or(ObjectError::MalformedObjStm(stream_object))? as usize;
        let stream = container
            .stream
            .as_ref()
            .ok_or(ObjectError::MalformedObjStm(stream_object))?;

        let mut header = Scanner::new(stream);
        let mut pairs = Vec::with_capacity(count);
        for _ in 0..count {
            let obj_num = match header.next_token()? {
                Some(Token::Integer(n)) => n as u32,
                _ => return Err(ObjectError::MalformedObjStm(stream_object)),
            };
            let rel_offset = match header.next_token()? {
                Some(Token::Integer(n)) => n as usize,
                _ => return Err(ObjectError::MalformedObjStm(stream_object)),
            };
            pairs.push((obj_num, first + rel_offset));
        }
        let mut out = Vec::with_capacity(pairs.len());
        for i in 0..pairs.len() {
            let start = pairs[i].1;
            let end = if i + 1 < pairs.len() { pairs[i + 1].1 } else { stream.len() };
            out.push((pairs[i].0, start, end));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_minimal_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj1_offset = pdf.len();
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");
        let obj2_offset = pdf.len();
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Count 0 >>\nendobj\n");
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
    fn materializes_plain_objects() {
        let pdf = build_minimal_pdf();
        let store = ObjectStore::open(&pdf).unwrap();
        let obj1 = store.get(1).unwrap();
        assert_eq!(obj1.dict.get("Type").unwrap().as_name(), Some("Catalog"));
        assert_eq!(obj1.dict.get("Pages").unwrap().as_ref(), Some((2, 0)));
    }

    #[test]
    fn missing_object_is_reported() {
        let pdf = build_minimal_pdf();
        let store = ObjectStore::open(&pdf).unwrap();
        assert!(matches!(store.get(99), Err(ObjectError::NotFound(99))));
    }

    #[test]
    fn unencrypted_document_has_no_file_key() {
        let pdf = build_minimal_pdf();
        let store = ObjectStore::open(&pdf).unwrap();
        assert!(store.file_key.is_none());
    }
}
