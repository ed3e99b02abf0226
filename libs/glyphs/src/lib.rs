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
//! Character-code to Unicode resolution: base encodings, `/Differences`
//! overrides, and `/ToUnicode` CMap parsing.

use std::collections::HashMap;

use lazy_static::lazy_static;
use pdfr_bytes::{multicarve, Scanner, Token};
use pdfr_dictionary::Value;

/// One of the four named base encodings a simple font's `/Encoding` entry
/// can select. Anything else (no `/Encoding`, a bare `/StandardEncoding`,
/// or a symbolic font) falls back to `Standard`, which defaults to an
/// identity table for unrecognized names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseEncoding {
    Standard,
    WinAnsi,
    MacRoman,
    PdfDoc,
}

pub fn resolve_base_encoding_name(name: &str) -> BaseEncoding {
    match name {
        "WinAnsiEncoding" => BaseEncoding::WinAnsi,
        "MacRomanEncoding" => BaseEncoding::MacRoman,
        "PDFDocEncoding" => BaseEncoding::PdfDoc,
        _ => BaseEncoding::Standard,
    }
}

fn identity_table() -> HashMap<u16, u32> {
    (0u16..=255).map(|c| (c, c as u32)).collect()
}

lazy_static! {
    /// cp1252's 0x80-0x9F block, which is where WinAnsiEncoding departs
    /// from a straight Latin-1 identity mapping. Codes Adobe leaves
    /// unassigned in Appendix D map to U+2022 (bullet).
    static ref WIN_ANSI_HIGH: [(u16, u32); 32] = [
        (0x80, 0x20AC), (0x81, 0x2022), (0x82, 0x201A), (0x83, 0x0192),
        (0x84, 0x201E), (0x85, 0x2026), (0x86, 0x2020), (0x87, 0x2021),
        (0x88, 0x02C6), (0x89, 0x2030), (0x8A, 0x0160), (0x8B, 0x2039),
        (0x8C, 0x0152), (0x8D, 0x2022), (0x8E, 0x017D), (0x8F, 0x2022),
        (0x90, 0x2022), (0x91, 0x2018), (0x92, 0x2019), (0x93, 0x201C),
        (0x94, 0x201D), (0x95, 0x2022), (0x96, 0x2013), (0x97, 0x2014),
        (0x98, 0x02DC), (0x99, 0x2122), (0x9A, 0x0161), (0x9B, 0x203A),
        (0x9C, 0x0153), (0x9D, 0x2022), (0x9E, 0x017E), (0x9F, 0x0178),
    ];

    static ref WIN_ANSI: HashMap<u16, u32> = {
        let mut m = identity_table();
        for &(code, uni) in WIN_ANSI_HIGH.iter() {
            m.insert(code, uni);
        }
        m
    };

    /// Standard Mac OS Roman, 0x80-0xFF. Unlike WinAnsi this has no
    /// relationship to Latin-1 in the upper half at all.
    static ref MAC_ROMAN_HIGH: [(u16, u32); 128] = [
        (0x80, 0x00C4), (0x81, 0x00C5), (0x82, 0x00C7), (0x83, 0x00C9),
        (0x84, 0x00D1), (0x85, 0x00D6), (0x86, 0x00DC), (0x87, 0x00E1),
        (0x88, 0x00E0), (0x89, 0x00E2), (0x8A, 0x00E4), (0x8B, 0x00E3),
        (0x8C, 0x00E5), (0x8D, 0x00E7), (0x8E, 0x00E9), (0x8F, 0x00E8),
        (0x90, 0x00EA), (0x91, 0x00EB), (0x92, 0x00ED), (0x93, 0x00EC),
        (0x94, 0x00EE), (0x95, 0x00EF), (0x96, 0x00F1), (0x97, 0x00F3),
        (0x98, 0x00F2), (0x99, 0x00F4), (0x9A, 0x00F6), (0x9B, 0x00F5),
        (0x9C, 0x00FA), (0x9D, 0x00F9), (0x9E, 0x00FB), (0x9F, 0x00FC),
        (0xA0, 0x2020), (0xA1, 0x00B0), (0xA2, 0x00A2), (0xA3, 0x00A3),
        (0xA4, 0x00A7), (0xA5, 0x2022), (0xA6, 0x00B6), (0xA7, 0x00DF),
        (0xA8, 0x00AE), (0xA9, 0x00A9), (0xAA, 0x2122), (0xAB, 0x00B4),
        (0xAC, 0x00A8), (0xAD, 0x2260), (0xAE, 0x00C6), (0xAF, 0x00D8),
        (0xB0, 0x221E), (0xB1, 0x00B1), (0xB2, 0x2264), (0xB3, 0x2265),
        (0xB4, 0x00A5), (0xB5, 0x00B5), (0xB6, 0x2202), (0xB7, 0x2211),
        (0xB8, 0x220F), (0xB9, 0x03C0), (0xBA, 0x222B), (0xBB, 0x00AA),
        (0xBC, 0x00BA), (0xBD, 0x03A9), (0xBE, 0x00E6), (0xBF, 0x00F8),
        (0xC0, 0x00BF), (0xC1, 0x00A1), (0xC2, 0x00AC), (0xC3, 0x221A),
        (0xC4, 0x0192), (0xC5, 0x2248), (0xC6, 0x2206), (0xC7, 0x00AB),
        (0xC8, 0x00BB), (0xC9, 0x2026), (0xCA, 0x00A0), (0xCB, 0x00C0),
        (0xCC, 0x00C3), (0xCD, 0x00D5), (0xCE, 0x0152), (0xCF, 0x0153),
        (0xD0, 0x2013), (0xD1, 0x2014), (0xD2, 0x201C), (0xD3, 0x201D),
        (0xD4, 0x2018), (0xD5, 0x2019), (0xD6, 0x00F7), (0xD7, 0x25CA),
        (0xD8, 0x00FF), (0xD9, 0x0178), (0xDA, 0x2044), (0xDB, 0x20AC),
        (0xDC, 0x2039), (0xDD, 0x203A), (0xDE, 0xFB01), (0xDF, 0xFB02),
        (0xE0, 0x2021), (0xE1, 0x00B7), (0xE2, 0x201A), (0xE3, 0x201E),
        (0xE4, 0x2030), (0xE5, 0x00C2), (0xE6, 0x00CA), (0xE7, 0x00C1),
        (0xE8, 0x00CB), (0xE9, 0x00C8), (0xEA, 0x00CD), (0xEB, 0x00CE),
        (0xEC, 0x00CF), (0xED, 0x00CC), (0xEE, 0x00D3), (0xEF, 0x00D4),
        (0xF0, 0xF8FF), (0xF1, 0x00D2), (0xF2, 0x00DA), (0xF3, 0x00DB),
        (0xF4, 0x00D9), (0xF5, 0x0131), (0xF6, 0x02C6), (0xF7, 0x02DC),
        (0xF8, 0x00AF), (0xF9, 0x02D8), (0xFA, 0x02D9), (0xFB, 0x02DA),
        (0xFC, 0x00B8), (0xFD, 0x02DD), (0xFE, 0x02DB), (0xFF, 0x02C7),
    ];

    static ref MAC_ROMAN: HashMap<u16, u32> = {
        let mut m: HashMap<u16, u32> = (0u16..0x80).map(|c| (c, c as u32)).collect();
        for &(code, uni) in MAC_ROMAN_HIGH.iter() {
            m.insert(code, uni);
        }
        m
    };

    static ref STANDARD: HashMap<u16, u32> = identity_table();

    /// PDFDocEncoding is rarely used for page text (mostly document info
    /// strings and outline titles); this implementation treats it as the
    /// WinAnsi table, which covers the large majority of real usage.
    static ref PDF_DOC: HashMap<u16, u32> = WIN_ANSI.clone();

    /// A representative subset of the Adobe Glyph List: common Latin
    /// letters, digits, and punctuation glyph names used by `/Differences`
    /// overrides in the wild. `adobe_glyph_to_unicode` falls back to the
    /// `uniXXXX`/`uXXXX` algorithmic forms for anything outside this set,
    /// which covers the rest of the real AGL mechanically.
    static ref AGL_SUBSET: HashMap<&'static str, u32> = {
        let mut m = HashMap::new();
        m.insert("space", 0x0020);
        m.insert("exclam", 0x0021);
        m.insert("quotedbl", 0x0022);
        m.insert("numbersign", 0x0023);
        m.insert("dollar", 0x0024);
        m.insert("percent", 0x0025);
        m.insert("ampersand", 0x0026);
        m.insert("quotesingle", 0x0027);
        m.insert("parenleft", 0x0028);
        m.insert("parenright", 0x0029);
        m.insert("asterisk", 0x002A);
        m.insert("plus", 0x002B);
        m.insert("comma", 0x002C);
        m.insert("hyphen", 0x002D);
        m.insert("period", 0x002E);
        m.insert("slash", 0x002F);
        for d in 0..=9u32 {
            let name: &'static str = Box::leak(format!("{}", d).into_boxed_str());
            m.insert(name, 0x0030 + d);
        }
        m.insert("colon", 0x003A);
        m.insert("semicolon", 0x003B);
        m.insert("less", 0x003C);
        m.insert("equal", 0x003D);
        m.insert("greater", 0x003E);
        m.insert("question", 0x003F);
        m.insert("at", 0x0040);
        for c in b'A'..=b'Z' {
            let name: &'static str = Box::leak((c as char).to_string().into_boxed_str());
            m.insert(name, c as u32);
        }
        m.insert("bracketleft", 0x005B);
        m.insert("backslash", 0x005C);
        m.insert("bracketright", 0x005D);
        m.insert("asciicircum", 0x005E);
        m.insert("underscore", 0x005F);
        m.insert("grave", 0x0060);
        for c in b'a'..=b'z' {
            let name: &'static str = Box::leak((c as char).to_string().into_boxed_str());
            m.insert(name, c as u32);
        }
        m.insert("braceleft", 0x007B);
        m.insert("bar", 0x007C);
        m.insert("braceright", 0x007D);
        m.insert("asciitilde", 0x007E);
        m.insert("bullet", 0x2022);
        m.insert("endash", 0x2013);
        m.insert("emdash", 0x2014);
        m.insert("quoteleft", 0x2018);
        m.insert("quoteright", 0x2019);
        m.insert("quotedblleft", 0x201C);
        m.insert("quotedblright", 0x201D);
        m.insert("ellipsis", 0x2026);
        m.insert("fi", 0xFB01);
        m.insert("fl", 0xFB02);
        m.insert("Euro", 0x20AC);
        m.insert("trademark", 0x2122);
        m.insert("copyright", 0x00A9);
        m.insert("registered", 0x00AE);
        m.insert("degree", 0x00B0);
        // Latin-1 Supplement named glyphs (WinAnsiEncoding's 0xA0-0xFF range).
        m.insert("exclamdown", 0x00A1);
        m.insert("cent", 0x00A2);
        m.insert("sterling", 0x00A3);
        m.insert("currency", 0x00A4);
        m.insert("yen", 0x00A5);
        m.insert("brokenbar", 0x00A6);
        m.insert("section", 0x00A7);
        m.insert("dieresis", 0x00A8);
        m.insert("ordfeminine", 0x00AA);
        m.insert("guillemotleft", 0x00AB);
        m.insert("logicalnot", 0x00AC);
        m.insert("macron", 0x00AF);
        m.insert("plusminus", 0x00B1);
        m.insert("twosuperior", 0x00B2);
        m.insert("threesuperior", 0x00B3);
        m.insert("acute", 0x00B4);
        m.insert("mu", 0x00B5);
        m.insert("paragraph", 0x00B6);
        m.insert("periodcentered", 0x00B7);
        m.insert("cedilla", 0x00B8);
        m.insert("onesuperior", 0x00B9);
        m.insert("ordmasculine", 0x00BA);
        m.insert("guillemotright", 0x00BB);
        m.insert("onequarter", 0x00BC);
        m.insert("onehalf", 0x00BD);
        m.insert("threequarters", 0x00BE);
        m.insert("questiondown", 0x00BF);
        m.insert("Agrave", 0x00C0);
        m.insert("Aacute", 0x00C1);
        m.insert("Acircumflex", 0x00C2);
        m.insert("Atilde", 0x00C3);
        m.insert("Adieresis", 0x00C4);
        m.insert("Aring", 0x00C5);
        m.insert("AE", 0x00C6);
        m.insert("Ccedilla", 0x00C7);
        m.insert("Egrave", 0x00C8);
        m.insert("Eacute", 0x00C9);
        m.insert("Ecircumflex", 0x00CA);
        m.insert("Edieresis", 0x00CB);
        m.insert("Igrave", 0x00CC);
        m.insert("Iacute", 0x00CD);
        m.insert("Icircumflex", 0x00CE);
        m.insert("Idieresis", 0x00CF);
        m.insert("Eth", 0x00D0);
        m.insert("Ntilde", 0x00D1);
        m.insert("Ograve", 0x00D2);
        m.insert("Oacute", 0x00D3);
        m.insert("Ocircumflex", 0x00D4);
        m.insert("Otilde", 0x00D5);
        m.insert("Odieresis", 0x00D6);
        m.insert("multiply", 0x00D7);
        m.insert("Oslash", 0x00D8);
        m.insert("Ugrave", 0x00D9);
        m.insert("Uacute", 0x00DA);
        m.insert("Ucircumflex", 0x00DB);
        m.insert("Udieresis", 0x00DC);
        m.insert("Yacute", 0x00DD);
        m.insert("Thorn", 0x00DE);
        m.insert("germandbls", 0x00DF);
        m.insert("agrave", 0x00E0);
        m.insert("aacute", 0x00E1);
        m.insert("acircumflex", 0x00E2);
        m.insert("atilde", 0x00E3);
        m.insert("adieresis", 0x00E4);
        m.insert("aring", 0x00E5);
        m.insert("ae", 0x00E6);
        m.insert("ccedilla", 0x00E7);
        m.insert("egrave", 0x00E8);
        m.insert("eacute", 0x00E9);
        m.insert("ecircumflex", 0x00EA);
        m.insert("edieresis", 0x00EB);
        m.insert("igrave", 0x00EC);
        m.insert("iacute", 0x00ED);
        m.insert("icircumflex", 0x00EE);
        m.insert("idieresis", 0x00EF);
        m.insert("eth", 0x00F0);
        m.insert("ntilde", 0x00F1);
        m.insert("ograve", 0x00F2);
        m.insert("oacute", 0x00F3);
        m.insert("ocircumflex", 0x00F4);
        m.insert("otilde", 0x00F5);
        m.insert("odieresis", 0x00F6);
        m.insert("divide", 0x00F7);
        m.insert("oslash", 0x00F8);
        m.insert("ugrave", 0x00F9);
        m.insert("uacute", 0x00FA);
        m.insert("ucircumflex", 0x00FB);
        m.insert("udieresis", 0x00FC);
        m.insert("yacute", 0x00FD);
        m.insert("thorn", 0x00FE);
        m.insert("ydieresis", 0x00FF);
        m
    };
}

pub fn base_encoding_table(enc: BaseEncoding) -> &'static HashMap<u16, u32> {
    match enc {
        BaseEncoding::Standard => &STANDARD,
        BaseEncoding::WinAnsi => &WIN_ANSI,
        BaseEncoding::MacRoman => &MAC_ROMAN,
        BaseEncoding::PdfDoc => &PDF_DOC,
    }
}

/// Looks up a glyph name the way the Adobe Glyph List would: first the
/// subset table, then the `uniXXXX` / `uXXXX...` algorithmic forms. An
/// unresolved name returns `None` and the caller decides the fallback
/// (typically the character code itself).
pub fn adobe_glyph_to_unicode(name: &str) -> Option<u32> {
    if let Some(&u) = AGL_SUBSET.get(name) {
        return Some(u);
    }
    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            if let Ok(v) = u32::from_str_radix(&hex[..4], 16) {
                return Some(v);
            }
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Ok(v) = u32::from_str_radix(hex, 16) {
                return Some(v);
            }
        }
    }
    None
}

/// States of the `/Differences` array scanner: a code number is followed
/// by one or more glyph names, until the next number restarts the
/// sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiffState {
    NewSymbol,
    Number,
    Name,
    Stop,
}

/// Parses a raw `/Differences` array body (the bytes between `[` and `]`,
/// not yet tokenized by the dictionary parser) directly off the page.
/// This is the fallback path for a malformed or partially-recoverable
/// array; the normal path for a cleanly parsed dictionary is
/// `parse_differences_values`, which walks the already-tokenized
/// `Value::Array`.
///
/// Stops as soon as it sees anything that is neither a number nor a
/// name, rather than requiring a well-formed closing `]`.
pub fn parse_differences_raw(data: &[u8]) -> Vec<(u16, String)> {
    let mut out = Vec::new();
    let mut state = DiffState::NewSymbol;
    let mut code: i64 = 0;
    let mut pos = 0usize;
    while pos < data.len() && state != DiffState::Stop {
        let b = data[pos];
        match state {
            DiffState::NewSymbol => {
                if b.is_ascii_whitespace() {
                    pos += 1;
                } else if b.is_ascii_digit() {
                    code = 0;
                    state = DiffState::Number;
                } else {
                    state = DiffState::Stop;
                }
            }
            DiffState::Number => {
                if b.is_ascii_digit() {
                    code = code * 10 + (b - b'0') as i64;
                    pos += 1;
                } else if b.is_ascii_whitespace() {
                    pos += 1;
                } else if b == b'/' {
                    state = DiffState::Name;
                } else {
                    state = DiffState::Stop;
                }
            }
            DiffState::Name => {
                let start = pos + 1; // skip '/'
                let mut end = start;
                while end < data.len() && pdfr_bytes::is_regular(data[end]) {
                    end += 1;
                }
                if end > start && code >= 0 && code <= u16::MAX as i64 {
                    let name = String::from_utf8_lossy(&data[start..end]).into_owned();
                    out.push((code as u16, name));
                    code += 1;
                }
                pos = end;
                state = DiffState::NewSymbol;
            }
            DiffState::Stop => unreachable!(),
        }
    }
    out
}

/// Walks an already-parsed `/Differences` array (`Value::Array` of
/// alternating integers and names) the same way, without re-scanning raw
/// bytes. Used whenever the font dictionary parsed cleanly, which is the
/// common case; `parse_differences_raw` exists for the rest.
pub fn parse_differences_values(items: &[Value]) -> Vec<(u16, String)> {
    let mut out = Vec::new();
    let mut code: i64 = -1;
    for item in items {
        match item {
            Value::Int(n) => code = *n,
            Value::Name(name) => {
                if code >= 0 && code <= u16::MAX as i64 {
                    out.push((code as u16, name.clone()));
                    code += 1;
                }
            }
            _ => {}
        }
    }
    out
}

/// Parses hex-string tokens out of a carved CMap section body, in order.
fn hex_tokens(data: &[u8]) -> Vec<Vec<u8>> {
    let mut scanner = Scanner::new(data);
    let mut out = Vec::new();
    while let Ok(Some(tok)) = scanner.next_token() {
        if let Token::HexString(bytes) = tok {
            out.push(bytes);
        }
    }
    out
}

/// One `bfrange` triple: `<lo> <hi> <dst>` or `<lo> <hi> [ <dst_a> ... ]`.
enum RangeDest {
    Single(Vec<u8>),
    Array(Vec<Vec<u8>>),
}

/// Parses every `bfrange` triple in a carved section body, honoring both
/// destination forms: a single hex string applied as a base that
/// increments per code, or a bracketed array giving each destination
/// explicitly.
fn bfrange_triples(data: &[u8]) -> Vec<(Vec<u8>, Vec<u8>, RangeDest)> {
    let mut scanner = Scanner::new(data);
    let mut out = Vec::new();
    loop {
        let lo = match scanner.next_token() {
            Ok(Some(Token::HexString(b))) => b,
            Ok(Some(_)) => continue,
            _ => break,
        };
        let hi = match scanner.next_token() {
            Ok(Some(Token::HexString(b))) => b,
            _ => break,
        };
        match scanner.next_token() {
            Ok(Some(Token::HexString(b))) => out.push((lo, hi, RangeDest::Single(b))),
            Ok(Some(Token::ArrayStart)) => {
                let mut items = Vec::new();
                loop {
                    match scanner.next_token() {
                        Ok(Some(Token::HexString(b))) => items.push(b),
                        Ok(Some(Token::ArrayEnd)) | Ok(None) => break,
                        Ok(Some(_)) => continue,
                        Err(_) => break,
                    }
                }
                out.push((lo, hi, RangeDest::Array(items)));
            }
            _ => break,
        }
    }
    out
}

fn bytes_to_code(bytes: &[u8]) -> u16 {
    match bytes.len() {
        0 => 0,
        1 => bytes[0] as u16,
        _ => ((bytes[0] as u16) << 8) | bytes[1] as u16,
    }
}

/// Takes the first UTF-16BE code unit of a CMap destination string as the
/// mapped Unicode scalar. Ligature/surrogate-pair destinations (rare in
/// practice) collapse to that first unit.
fn bytes_to_unicode(bytes: &[u8]) -> u32 {
    if bytes.len() >= 2 {
        ((bytes[0] as u32) << 8) | bytes[1] as u32
    } else if bytes.len() == 1 {
        bytes[0] as u32
    } else {
        0
    }
}

/// Parses a `/ToUnicode` CMap stream's `bfchar` and `bfrange` sections.
pub fn parse_to_unicode_cmap(data: &[u8]) -> HashMap<u16, u32> {
    let mut map = HashMap::new();

    for section in multicarve(data, b"beginbfchar", b"endbfchar") {
        let toks = hex_tokens(section);
        for pair in toks.chunks(2) {
            if let [src, dst] = pair {
                map.insert(bytes_to_code(src), bytes_to_unicode(dst));
            }
        }
    }

    for section in multicarve(data, b"beginbfrange", b"endbfrange") {
        for (lo, hi, dst) in bfrange_triples(section) {
            let lo_code = bytes_to_code(&lo);
            let hi_code = bytes_to_code(&hi);
            if hi_code < lo_code {
                continue;
            }
            match dst {
                RangeDest::Single(bytes) => {
                    let dst_start = bytes_to_unicode(&bytes);
                    for (i, code) in (lo_code..=hi_code).enumerate() {
                        map.insert(code, dst_start + i as u32);
                    }
                }
                RangeDest::Array(items) => {
                    for (code, bytes) in (lo_code..=hi_code).zip(items.iter()) {
                        map.insert(code, bytes_to_unicode(bytes));
                    }
                }
            }
        }
    }

    map
}

/// A fully resolved character-code-to-Unicode table for one font, built
/// by layering a base encoding, an optional `/Differences` override, and
/// an optional `/ToUnicode` CMap (which wins over everything, since it's
/// the most specific source a PDF producer can supply).
#[derive(Debug, Clone)]
pub struct Encoding {
    map: HashMap<u16, u32>,
}

impl Encoding {
    pub fn from_base(base: BaseEncoding) -> Self {
        Encoding {
            map: base_encoding_table(base).clone(),
        }
    }

    pub fn apply_differences(&mut self, diffs: &[(u16, String)]) {
        for (code, name) in diffs {
            let uni = adobe_glyph_to_unicode(name).unwrap_or(*code as u32);
            self.map.insert(*code, uni);
        }
    }

    pub fn apply_to_unicode(&mut self, cmap: &HashMap<u16, u32>) {
        for (&code, &uni) in cmap {
            self.map.insert(code, uni);
        }
    }

    /// Resolves a character code to its Unicode scalar value, falling
    /// back to the raw code itself if nothing in the encoding chain
    /// covers it.
    pub fn unicode_for(&self, code: u16) -> u32 {
        self.map.get(&code).copied().unwrap_or(code as u32)
    }
}

/// Builds a font's full `Encoding` from the pieces a font-dictionary
/// resolver (`pdfr-font`) hands it: the `/BaseEncoding` name (if any),
/// the already-parsed `/Differences` array (if any), and the decoded
/// `/ToUnicode` CMap stream bytes (if any).
pub fn build(
    base_name: Option<&str>,
    differences: Option<&[Value]>,
    to_unicode: Option<&[u8]>,
) -> Encoding {
    log::trace!("building encoding from base {base_name:?}");
    let base = base_name
        .map(resolve_base_encoding_name)
        .unwrap_or(BaseEncoding::Standard);
    let mut encoding = Encoding::from_base(base);
    if let Some(diffs) = differences {
        encoding.apply_differences(&parse_differences_values(diffs));
    }
    if let Some(stream) = to_unicode {
        let cmap = parse_to_unicode_cmap(stream);
        encoding.apply_to_unicode(&cmap);
    }
    encoding
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_ansi_identity_below_0x80_and_euro_at_0x80() {
        let table = base_encoding_table(BaseEncoding::WinAnsi);
        assert_eq!(table[&(b'A' as u16)], 0x0041);
        assert_eq!(table[&0x80], 0x20AC);
    }

    #[test]
    fn mac_roman_diverges_from_latin1_in_high_range() {
        let table = base_encoding_table(BaseEncoding::MacRoman);
        assert_eq!(table[&0x80], 0x00C4); // Ä, not Latin-1's 0x80 control code
    }

    #[test]
    fn differences_override_maps_named_glyph() {
        let diffs = vec![Value::Int(65), Value::Name("bullet".to_string())];
        let mut enc = Encoding::from_base(BaseEncoding::Standard);
        enc.apply_differences(&parse_differences_values(&diffs));
        assert_eq!(enc.unicode_for(65), 0x2022);
    }

    #[test]
    fn differences_override_remaps_accented_letters_over_win_ansi_base() {
        let diffs = vec![
            Value::Int(65),
            Value::Name("Aring".to_string()),
            Value::Name("adieresis".to_string()),
        ];
        let mut enc = Encoding::from_base(BaseEncoding::WinAnsi);
        enc.apply_differences(&parse_differences_values(&diffs));
        assert_eq!(enc.unicode_for(65), 0x00C5);
        assert_eq!(enc.unicode_for(66), 0x00E4);
        assert_eq!(enc.unicode_for(67), 0x0043); // untouched codes keep their WinAnsi mapping
    }

    #[test]
    fn differences_sequence_advances_code_across_consecutive_names() {
        let diffs = vec![
            Value::Int(10),
            Value::Name("A".to_string()),
            Value::Name("B".to_string()),
            Value::Name("C".to_string()),
        ];
        let parsed = parse_differences_values(&diffs);
        assert_eq!(
            parsed,
            vec![
                (10, "A".to_string()),
                (11, "B".to_string()),
                (12, "C".to_string()),
            ]
        );
    }

    #[test]
    fn raw_differences_parser_stops_at_unexpected_token() {
        let raw = parse_differences_raw(b"65 /A /B ]");
        assert_eq!(raw, vec![(65, "A".to_string()), (66, "B".to_string())]);
    }

    #[test]
    fn raw_differences_parser_permissive_terminator_on_malformed_input() {
        let raw = parse_differences_raw(b"1 /Name )unexpected");
        assert_eq!(raw, vec![(1, "Name".to_string())]);
    }

    #[test]
    fn adobe_glyph_list_algorithmic_fallback() {
        assert_eq!(adobe_glyph_to_unicode("uni00E9"), Some(0x00E9));
        assert_eq!(adobe_glyph_to_unicode("u1F600"), Some(0x1F600));
        assert_eq!(adobe_glyph_to_unicode("eacute"), Some(0x00E9));
        assert_eq!(adobe_glyph_to_unicode("totally-unknown-glyph"), None);
    }

    #[test]
    fn parses_bfchar_section() {
        let data = b"1 beginbfchar\n<0041> <0042>\n<0043> <0044>\nendbfchar";
        let cmap = parse_to_unicode_cmap(data);
        assert_eq!(cmap[&0x0041], 0x0042);
        assert_eq!(cmap[&0x0043], 0x0044);
    }

    #[test]
    fn parses_bfrange_section_expanding_inclusive_range() {
        let data = b"1 beginbfrange\n<0020> <0023> <0041>\nendbfrange";
        let cmap = parse_to_unicode_cmap(data);
        assert_eq!(cmap[&0x0020], 0x0041);
        assert_eq!(cmap[&0x0021], 0x0042);
        assert_eq!(cmap[&0x0023], 0x0044);
    }

    #[test]
    fn parses_bfrange_section_with_array_destination() {
        let data = b"1 beginbfrange\n<0001> <0003> [<0041> <0042> <0043>]\nendbfrange";
        let cmap = parse_to_unicode_cmap(data);
        assert_eq!(cmap[&0x0001], 0x0041);
        assert_eq!(cmap[&0x0002], 0x0042);
        assert_eq!(cmap[&0x0003], 0x0043);
    }

    #[test]
    fn to_unicode_wins_over_base_and_differences() {
        let mut cmap = HashMap::new();
        cmap.insert(65u16, 0x03B1); // alpha
        let mut enc = Encoding::from_base(BaseEncoding::Standard);
        enc.apply_differences(&[(65, "bullet".to_string())]);
        enc.apply_to_unicode(&cmap);
        assert_eq!(enc.unicode_for(65), 0x03B1);
    }

    #[test]
    fn unmapped_code_falls_back_to_identity() {
        let enc = Encoding::from_base(BaseEncoding::Standard);
        assert_eq!(enc.unicode_for(0x41), 0x41);
    }
}
