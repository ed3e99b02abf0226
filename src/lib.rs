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
//! Page assembly and the public `Document` API: walks the
//! `/Pages` tree, resolves inherited `/Resources` and the minimum
//! bounding box, and composes `pdfr-font`/`pdfr-content` into
//! `page_text`/`glyph_map`/`page_content_stream`.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;

use pdfr_content::TextElement;
use pdfr_dictionary::{Dictionary, Value};
use pdfr_font::Font;
use pdfr_objects::ObjectStore;
use thiserror::Error;

/// `/Pages` subtrees nested deeper than this are rejected. The
/// dictionary-nesting bound covers a single object; this bounds the page
/// tree as a whole.
const MAX_PAGE_TREE_DEPTH: usize = 64;

#[derive(Error, Debug)]
pub enum PdfError {
    #[error("malformed document: {0}")]
    MalformedDocument(String),
    #[error("missing object {0}")]
    MissingObject(u32),
    #[error("decrypt error: {0}")]
    DecryptError(String),
    #[error("inflate error: {0}")]
    InflateError(String),
    #[error("encoding error: {0}")]
    EncodingError(String),
    #[error("resource bound exceeded: {0}")]
    ResourceBound(String),
    #[error("unsupported filter: {0}")]
    UnsupportedFilter(String),
    #[error("page index {0} out of range ({1} pages)")]
    PageIndexOutOfRange(usize, usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<pdfr_xref::XrefError> for PdfError {
    fn from(e: pdfr_xref::XrefError) -> Self {
        PdfError::MalformedDocument(e.to_string())
    }
}

impl From<pdfr_dictionary::DictError> for PdfError {
    fn from(e: pdfr_dictionary::DictError) -> Self {
        PdfError::MalformedDocument(e.to_string())
    }
}

impl From<pdfr_objects::ObjectError> for PdfError {
    fn from(e: pdfr_objects::ObjectError) -> Self {
        match e {
            pdfr_objects::ObjectError::NotFound(n) => PdfError::MissingObject(n),
            pdfr_objects::ObjectError::Inflate(_) => PdfError::InflateError(e.to_string()),
            pdfr_objects::ObjectError::UnsupportedFilter(f) => PdfError::UnsupportedFilter(f),
            pdfr_objects::ObjectError::FilterChainTooLong(n) => {
                PdfError::ResourceBound(format!("filter chain exceeds {n}"))
            }
            other => PdfError::MalformedDocument(other.to_string()),
        }
    }
}

impl From<pdfr_content::ContentError> for PdfError {
    fn from(e: pdfr_content::ContentError) -> Self {
        PdfError::ResourceBound(e.to_string())
    }
}

/// One leaf `/Page` node with its resources and bounding box already
/// resolved (inheriting from ancestors where the page itself is silent).
/// Fully owned: unlike `ObjectStore`, nothing here borrows the file
/// buffer, so `Document` can cache it without a self-referential struct.
struct PageInfo {
    object_num: u32,
    resources: Dictionary,
    // Computed per assembly but not yet consumed by any public method;
    // layout-clustering features that would use it are out of scope here.
    #[allow(dead_code)]
    minbox: [f64; 4],
}

pub struct Document {
    bytes: Vec<u8>,
    pages: Vec<PageInfo>,
}

impl Document {
    pub fn open(bytes: Vec<u8>) -> Result<Document, PdfError> {
        let store = ObjectStore::open(&bytes)?;
        let pages = build_page_tree(&store)?;
        Ok(Document { bytes, pages })
    }

    pub fn open_path(path: impl AsRef<Path>) -> Result<Document, PdfError> {
        Document::open(fs::read(path)?)
    }

    fn store(&self) -> Result<ObjectStore<'_>, PdfError> {
        Ok(ObjectStore::open(&self.bytes)?)
    }

    pub fn xref_entries(&self) -> Result<Vec<(u32, usize, u32)>, PdfError> {
        let store = self.store()?;
        let mut out: Vec<(u32, usize, u32)> = store
            .xref_entries()
            .map(|(num, entry)| match entry {
                pdfr_xref::XrefEntry::InUse { offset, .. } => (num, offset, 0),
                pdfr_xref::XrefEntry::Compressed { stream_object, .. } => (num, 0, stream_object),
            })
            .collect();
        out.sort_by_key(|&(num, _, _)| num);
        Ok(out)
    }

    pub fn object(&self, n: u32) -> Result<(Dictionary, Vec<u8>), PdfError> {
        let store = self.store()?;
        let object = store.get(n)?;
        Ok((object.dict, object.stream.unwrap_or_default()))
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, page_index: usize) -> Result<&PageInfo, PdfError> {
        self.pages
            .get(page_index)
            .ok_or(PdfError::PageIndexOutOfRange(page_index, self.pages.len()))
    }

    /// Resolves every `/Resources /Font` entry for a page into a
    /// `pdfr_font::Font`, keyed by resource name (e.g. `"F1"`).
    fn page_fonts(&self, store: &ObjectStore<'_>, resources: &Dictionary) -> HashMap<String, Font> {
        let mut out = HashMap::new();
        let Some(font_dict) = resolve_subdict(store, resources.get("Font")) else {
            return out;
        };
        for (name, value) in &font_dict {
            let dict = match value {
                Value::Dict(d) => d.clone(),
                Value::Ref(n, _) => match store.get(*n) {
                    Ok(o) => o.dict,
                    Err(_) => continue,
                },
                _ => continue,
            };
            match pdfr_font::build(&dict, store) {
                Ok(font) => {
                    out.insert(name.clone(), font);
                }
                Err(e) => log::warn!("skipping font resource {name:?}: {e}"),
            }
        }
        out
    }

    /// Resolves every `/Resources /XObject` entry to its decoded stream
    /// bytes, keyed by resource name. Consumed by the `Do` operator.
    fn page_xobjects(&self, store: &ObjectStore<'_>, resources: &Dictionary) -> HashMap<String, Vec<u8>> {
        let mut out = HashMap::new();
        let Some(xobj_dict) = resolve_subdict(store, resources.get("XObject")) else {
            return out;
        };
        for (name, value) in &xobj_dict {
            if let Some((n, _)) = value.as_ref() {
                if let Ok(obj) = store.get(n) {
                    out.insert(name.clone(), obj.stream.unwrap_or_default());
                }
            }
        }
        out
    }

    fn page_content_bytes(&self, store: &ObjectStore<'_>, object_num: u32) -> Result<Vec<u8>, PdfError> {
        let page = store.get(object_num)?;
        let content_nums = content_object_numbers(page.dict.get("Contents"));
        let mut out = Vec::new();
        for (i, num) in content_nums.iter().enumerate() {
            if i > 0 {
                out.push(b'\n');
            }
            let obj = store.get(*num)?;
            out.extend_from_slice(&obj.stream.unwrap_or_default());
        }
        Ok(out)
    }

    pub fn page_content_stream(&self, page_index: usize) -> Result<String, PdfError> {
        let page = self.page(page_index)?;
        let store = self.store()?;
        let bytes = self.page_content_bytes(&store, page.object_num)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    pub fn page_text(&self, page_index: usize) -> Result<Vec<TextElement>, PdfError> {
        let page = self.page(page_index)?;
        let store = self.store()?;
        let content = self.page_content_bytes(&store, page.object_num)?;
        let fonts = self.page_fonts(&store, &page.resources);
        let xobjects = self.page_xobjects(&store, &page.resources);
        Ok(pdfr_content::interpret(&content, &fonts, &xobjects)?)
    }

    pub fn glyph_map(&self, page_index: usize) -> Result<Vec<(String, u16, u16, i32)>, PdfError> {
        let page = self.page(page_index)?;
        let store = self.store()?;
        let content = self.page_content_bytes(&store, page.object_num)?;
        let fonts = self.page_fonts(&store, &page.resources);
        let xobjects = self.page_xobjects(&store, &page.resources);
        let uses = pdfr_content::glyph_uses(&content, &fonts, &xobjects)?;
        Ok(uses
            .into_iter()
            .map(|(font, code, unicode, width)| (font, code, (unicode & 0xFFFF) as u16, width))
            .collect())
    }

}

/// Resolves a `/Resources` sub-entry (e.g. `/Font`, `/XObject`) that may
/// be a direct sub-dictionary or an indirect reference to one.
fn resolve_subdict(store: &ObjectStore<'_>, value: Option<&Value>) -> Option<Dictionary> {
    match value? {
        Value::Dict(d) => Some(d.clone()),
        Value::Ref(n, _) => store.get(*n).ok().map(|o| o.dict),
        _ => None,
    }
}

/// `/Contents` may be a single reference or an array of references.
fn content_object_numbers(value: Option<&Value>) -> Vec<u32> {
    match value {
        Some(Value::Ref(n, _)) => vec![*n],
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_ref).map(|(n, _)| n).collect(),
        _ => Vec::new(),
    }
}

const BOX_KEYS: [&str; 5] = ["BleedBox", "MediaBox", "CropBox", "TrimBox", "ArtBox"];
const DEFAULT_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0]; // US Letter, used only absent any box anywhere in the tree

fn read_box(store: &ObjectStore<'_>, dict: &Dictionary, key: &str) -> Option<[f64; 4]> {
    let value = dict.get(key)?;
    let items = match value {
        Value::Array(a) => a.clone(),
        Value::Ref(n, _) => store.get(*n).ok()?.value.as_array()?.to_vec(),
        _ => return None,
    };
    if items.len() < 4 {
        return None;
    }
    let nums: Vec<f64> = items.iter().filter_map(Value::as_f64).collect();
    if nums.len() < 4 {
        return None;
    }
    Some([nums[0], nums[1], nums[2], nums[3]])
}

/// The intersection of whichever of /MediaBox, /CropBox, /BleedBox,
/// /TrimBox, /ArtBox are present on this node; inherited if none are.
fn own_minbox(store: &ObjectStore<'_>, dict: &Dictionary) -> Option<[f64; 4]> {
    let boxes: Vec<[f64; 4]> = BOX_KEYS.iter().filter_map(|k| read_box(store, dict, k)).collect();
    boxes.into_iter().reduce(|a, b| {
        [a[0].max(b[0]), a[1].max(b[1]), a[2].min(b[2]), a[3].min(b[3])]
    })
}

fn build_page_tree(store: &ObjectStore<'_>) -> Result<Vec<PageInfo>, PdfError> {
    let root_ref = store
        .trailer()
        .get("Root")
        .and_then(Value::as_ref)
        .ok_or_else(|| PdfError::MalformedDocument("trailer has no /Root".into()))?;
    let catalog = store.get(root_ref.0)?;
    let pages_ref = catalog
        .dict
        .get("Pages")
        .and_then(Value::as_ref)
        .ok_or_else(|| PdfError::MalformedDocument("catalog has no /Pages".into()))?;

    let mut seen = HashSet::new();
    let mut out = Vec::new();
    expand_page_node(
        store,
        pages_ref.0,
        Dictionary::new(),
        DEFAULT_BOX,
        &mut seen,
        &mut out,
        0,
    )?;
    Ok(out)
}

#[allow(clippy::too_many_arguments)]
fn expand_page_node(
    store: &ObjectStore<'_>,
    object_num: u32,
    inherited_resources: Dictionary,
    inherited_box: [f64; 4],
    seen: &mut HashSet<u32>,
    out: &mut Vec<PageInfo>,
    depth: usize,
) -> Result<(), PdfError> {
    if depth > MAX_PAGE_TREE_DEPTH {
        return Err(PdfError::ResourceBound(format!("page tree nesting exceeds {MAX_PAGE_TREE_DEPTH}")));
    }
    if !seen.insert(object_num) {
        return Ok(()); // cyclic /Kids, already visited
    }
    let node = store.get(object_num)?;
    let resources = match node.dict.get("Resources") {
        Some(_) => resolve_subdict(store, node.dict.get("Resources")).unwrap_or(inherited_resources),
        None => inherited_resources,
    };
    let minbox = own_minbox(store, &node.dict).unwrap_or(inherited_box);

    match node.dict.get("Kids").and_then(Value::as_array) {
        Some(kids) => {
            for kid in kids.to_vec() {
                if let Some((n, _)) = kid.as_ref() {
                    expand_page_node(store, n, resources.clone(), minbox, seen, out, depth + 1)?;
                }
            }
        }
        None => out.push(PageInfo { object_num, resources, minbox }),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A minimal PDF that draws "Hello World" at (0, 0) in Times-Roman 18pt.
    fn hello_world_pdf() -> Vec<u8> {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");

        let content = b"BT /F1 18 Tf 0 0 Td (Hello World) Tj ET";
        let mut offsets = Vec::new();

        offsets.push(pdf.len());
        pdf.extend_from_slice(b"1 0 obj\n<< /Type /Catalog /Pages 2 0 R >>\nendobj\n");

        offsets.push(pdf.len());
        pdf.extend_from_slice(b"2 0 obj\n<< /Type /Pages /Kids [3 0 R] /Count 1 >>\nendobj\n");

        offsets.push(pdf.len());
        pdf.extend_from_slice(
            b"3 0 obj\n<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
              /Resources << /Font << /F1 5 0 R >> >> /Contents 4 0 R >>\nendobj\n",
        );

        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("4 0 obj\n<< /Length {} >>\nstream\n", content.len()).as_bytes());
        pdf.extend_from_slice(content);
        pdf.extend_from_slice(b"\nendstream\nendobj\n");

        offsets.push(pdf.len());
        pdf.extend_from_slice(
            b"5 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman /Encoding /WinAnsiEncoding >>\nendobj\n",
        );

        let xref_offset = pdf.len();
        pdf.extend_from_slice(format!("xref\n0 {}\n", offsets.len() + 1).as_bytes());
        pdf.extend_from_slice(b"0000000000 65535 f \n");
        for off in &offsets {
            pdf.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        pdf.extend_from_slice(format!("trailer\n<< /Size {} /Root 1 0 R >>\n", offsets.len() + 1).as_bytes());
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());
        pdf
    }

    #[test]
    fn minimal_pdf_has_one_page() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        assert_eq!(doc.page_count(), 1);
    }

    #[test]
    fn minimal_pdf_extracts_hello_world() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        let elements = doc.page_text(0).unwrap();
        assert_eq!(elements.len(), 11);
        let text: String = elements.iter().filter_map(|e| char::from_u32(e.glyphs[0])).collect();
        assert_eq!(text, "Hello World");
        for e in &elements {
            assert_eq!(e.font_name, "Times-Roman");
            assert_eq!(e.size, 18.0);
            assert_eq!(e.bottom, 0.0);
        }
        for pair in elements.windows(2) {
            assert!(pair[0].left < pair[1].left, "lefts must increase monotonically");
        }
    }

    #[test]
    fn glyph_map_reports_raw_codes_and_widths() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        let uses = doc.glyph_map(0).unwrap();
        assert_eq!(uses.len(), 11);
        assert_eq!(uses[0].0, "Times-Roman");
        assert_eq!(uses[0].1, b'H' as u16);
        assert_eq!(uses[0].2, b'H' as u16);
    }

    #[test]
    fn page_content_stream_round_trips_source_bytes() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        let stream = doc.page_content_stream(0).unwrap();
        assert!(stream.contains("Hello World"));
    }

    #[test]
    fn out_of_range_page_index_is_an_error() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        assert!(matches!(doc.page_text(5), Err(PdfError::PageIndexOutOfRange(5, 1))));
    }

    #[test]
    fn xref_entries_and_object_are_exposed() {
        let doc = Document::open(hello_world_pdf()).unwrap();
        let entries = doc.xref_entries().unwrap();
        assert_eq!(entries.len(), 5);
        let (dict, _stream) = doc.object(1).unwrap();
        assert_eq!(dict.get("Type").unwrap().as_name(), Some("Catalog"));
    }
}
