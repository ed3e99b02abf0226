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
//! Content-stream tokenizing and the stack-based graphics-state
//! interpreter that turns a page's operator stream into positioned
//! `TextElement`s. The scanner/parser split reuses `pdfr_bytes`'s
//! `Scanner` rather than a per-character state machine.

use std::collections::HashMap;

use pdfr_bytes::{firstmatch, Scanner, Token};
use pdfr_font::Font;
use thiserror::Error;

/// Bounds worst-case content-stream processing.
pub const MAX_CONTENT_LEN: usize = 64 * 1024 * 1024;
/// Bounds `Do` recursion into Form XObjects.
pub const MAX_DO_DEPTH: usize = 16;

#[derive(Error, Debug)]
pub enum ContentError {
    #[error("content stream of {0} bytes exceeds the {1}-byte bound")]
    TooLarge(usize, usize),
}

/// A 3x3 affine transform, row-major, with a fixed final column of
/// `(0, 0, 1)`: `[a, b, 0, c, d, 0, e, f, 1]` represents the PDF tuple
/// `a b c d e f`. A point `(x, y)` is carried as the row vector
/// `(x, y, 1)` and transformed by `point * matrix`.
pub type Matrix = [f64; 9];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Standard row-major 3x3 product `a * b`. `cm` composes as
/// `CTM <- M . CTM`, i.e. `mat_mul(m, ctm)`; `Td`/`TD` compose as
/// `Td <- M . Td`, i.e. `mat_mul(translate, td)`.
pub fn mat_mul(a: Matrix, b: Matrix) -> Matrix {
    let mut out = [0.0f64; 9];
    for row in 0..3 {
        for col in 0..3 {
            let mut sum = 0.0;
            for k in 0..3 {
                sum += a[row * 3 + k] * b[k * 3 + col];
            }
            out[row * 3 + col] = sum;
        }
    }
    out
}

fn six_tuple(nums: &[f64]) -> Matrix {
    let g = |i: usize| nums.get(i).copied().unwrap_or(0.0);
    [g(0), g(1), 0.0, g(2), g(3), 0.0, g(4), g(5), 1.0]
}

fn translation(x: f64, y: f64) -> Matrix {
    [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, x, y, 1.0]
}

/// One content-stream operand. Arrays nest (a `TJ` array of strings and
/// kerning numbers); dictionaries appear only as marked-content property
/// lists (`BDC`) that this interpreter has no use for, so they are
/// discarded at scan time rather than represented here.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Name(String),
    Str(Vec<u8>),
    Array(Vec<Operand>),
    Bool(bool),
    Null,
}

impl Operand {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Operand::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            Operand::Name(n) => Some(n),
            _ => None,
        }
    }
}

/// One operator application: the identifier together with whatever
/// operands had accumulated on the stack since the previous operator.
#[derive(Debug, Clone)]
pub struct Operation {
    pub operator: String,
    pub operands: Vec<Operand>,
}

/// Tokenizes a content stream into a flat sequence of operator
/// applications. Inline images (`BI ... ID ... EI`) are skipped whole:
/// the scanner jumps past the first `EI` found after `BI` without trying
/// to lex the (possibly binary) image data in between.
pub fn tokenize(data: &[u8]) -> Vec<Operation> {
    let mut scanner = Scanner::new(data);
    let mut operands = Vec::new();
    let mut ops = Vec::new();

    while let Ok(Some(tok)) = scanner.next_token() {
        match tok {
            Token::Integer(n) => operands.push(Operand::Number(n as f64)),
            Token::Real(f) => operands.push(Operand::Number(f)),
            Token::Name(n) => operands.push(Operand::Name(n)),
            Token::LiteralString(s) | Token::HexString(s) => operands.push(Operand::Str(s)),
            Token::ArrayStart => operands.push(Operand::Array(parse_array(&mut scanner))),
            Token::DictStart => skip_dict(&mut scanner),
            Token::ArrayEnd | Token::DictEnd => {} // unbalanced close, ignore and continue
            Token::Keyword(k) => match k.as_str() {
                "true" => operands.push(Operand::Bool(true)),
                "false" => operands.push(Operand::Bool(false)),
                "null" => operands.push(Operand::Null),
                "BI" => {
                    skip_inline_image(&mut scanner);
                    operands.clear();
                }
                _ => {
                    ops.push(Operation { operator: k, operands: std::mem::take(&mut operands) });
                }
            },
        }
    }
    ops
}

fn parse_array(scanner: &mut Scanner) -> Vec<Operand> {
    let mut items = Vec::new();
    loop {
        match scanner.next_token() {
            Ok(Some(Token::ArrayEnd)) | Ok(None) | Err(_) => break,
            Ok(Some(Token::Integer(n))) => items.push(Operand::Number(n as f64)),
            Ok(Some(Token::Real(f))) => items.push(Operand::Number(f)),
            Ok(Some(Token::Name(n))) => items.push(Operand::Name(n)),
            Ok(Some(Token::LiteralString(s))) | Ok(Some(Token::HexString(s))) => items.push(Operand::Str(s)),
            Ok(Some(Token::ArrayStart)) => items.push(Operand::Array(parse_array(scanner))),
            Ok(Some(Token::DictStart)) => skip_dict(scanner),
            Ok(Some(_)) => {}
        }
    }
    items
}

fn skip_dict(scanner: &mut Scanner) {
    let mut depth = 1u32;
    while depth > 0 {
        match scanner.next_token() {
            Ok(Some(Token::DictStart)) => depth += 1,
            Ok(Some(Token::DictEnd)) => depth -= 1,
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
}

fn skip_inline_image(scanner: &mut Scanner) {
    let rest = scanner.remaining();
    match firstmatch(rest, b"EI", 0) {
        Some(rel) => scanner.set_pos(scanner.pos() + rel + 2),
        None => scanner.set_pos(scanner.pos() + rest.len()),
    }
}

/// A positioned glyph run in page user space, points.
#[derive(Debug, Clone, PartialEq)]
pub struct TextElement {
    pub left: f64,
    pub right: f64,
    pub bottom: f64,
    pub top: f64,
    pub font_name: String,
    pub size: f64,
    pub glyphs: Vec<u32>,
}

#[derive(Clone)]
struct GsFrame {
    ctm: Matrix,
    font_name: String,
    font_size: f64,
}

#[derive(Clone, Copy)]
struct TextState {
    tm: Matrix,
    td: Matrix,
    tc: f64,
    tw: f64,
    th: f64,
    tl: f64,
    trise: f64,
}

impl TextState {
    fn reset() -> Self {
        TextState { tm: IDENTITY, td: IDENTITY, tc: 0.0, tw: 0.0, th: 100.0, tl: 0.0, trise: 0.0 }
    }
}

/// Drives the operator stack machine over one content stream, sharing the
/// page's font and XObject pools across any `Do` recursion by reusing the
/// same graphics state across a nested invocation.
pub struct Interpreter<'a> {
    fonts: &'a HashMap<String, Font>,
    xobjects: &'a HashMap<String, Vec<u8>>,
    stack: Vec<GsFrame>,
    text: TextState,
    pushright: f64,
    do_stack: Vec<String>,
    elements: Vec<TextElement>,
    /// `(font_name, raw_code, unicode, width)` for every glyph shown, in
    /// the same traversal order as `elements`. Backs `glyph_map`, which
    /// exposes the raw-code/width pair `page_text` throws away.
    glyph_uses: Vec<(String, u16, u32, i32)>,
}

impl<'a> Interpreter<'a> {
    pub fn new(fonts: &'a HashMap<String, Font>, xobjects: &'a HashMap<String, Vec<u8>>) -> Self {
        Interpreter {
            fonts,
            xobjects,
            stack: vec![GsFrame { ctm: IDENTITY, font_name: String::new(), font_size: 0.0 }],
            text: TextState::reset(),
            pushright: 0.0,
            do_stack: Vec::new(),
            elements: Vec::new(),
            glyph_uses: Vec::new(),
        }
    }

    fn frame(&self) -> &GsFrame {
        self.stack.last().expect("graphics state stack is never empty")
    }

    fn frame_mut(&mut self) -> &mut GsFrame {
        self.stack.last_mut().expect("graphics state stack is never empty")
    }

    fn run(&mut self, content: &[u8], depth: usize) -> Result<(), ContentError> {
        if content.len() > MAX_CONTENT_LEN {
            return Err(ContentError::TooLarge(content.len(), MAX_CONTENT_LEN));
        }
        for op in tokenize(content) {
            self.dispatch(op, depth)?;
        }
        Ok(())
    }

    fn dispatch(&mut self, op: Operation, depth: usize) -> Result<(), ContentError> {
        let nums: Vec<f64> = op.operands.iter().filter_map(Operand::as_f64).collect();
        match op.operator.as_str() {
            "q" => {
                let top = self.frame().clone();
                self.stack.push(top);
            }
            "Q" => {
                if self.stack.len() > 1 {
                    self.stack.pop();
                }
            }
            "cm" if nums.len() >= 6 => {
                let m = six_tuple(&nums);
                self.frame_mut().ctm = mat_mul(m, self.frame().ctm);
            }
            "BT" | "ET" => {
                self.text.tm = IDENTITY;
                self.text.td = IDENTITY;
                self.text.tc = 0.0;
                self.text.tw = 0.0;
                self.text.th = 100.0;
            }
            "Td" if nums.len() >= 2 => {
                self.text.td = mat_mul(translation(nums[0], nums[1]), self.text.td);
                self.pushright = 0.0;
            }
            "TD" if nums.len() >= 2 => {
                self.text.td = mat_mul(translation(nums[0], nums[1]), self.text.td);
                self.text.tl = -nums[1];
                self.pushright = 0.0;
            }
            "Tm" if nums.len() >= 6 => {
                self.text.tm = six_tuple(&nums);
                self.text.td = IDENTITY;
                self.pushright = 0.0;
            }
            "T*" => {
                self.text.td[7] -= self.text.tl;
                self.pushright = 0.0;
            }
            "Tc" if !nums.is_empty() => self.text.tc = nums[0],
            "Tw" if !nums.is_empty() => self.text.tw = nums[0],
            "TL" if !nums.is_empty() => self.text.tl = nums[0],
            "Tz" | "Th" if !nums.is_empty() => self.text.th = nums[0],
            "Tf" => {
                if let Some(name) = op.operands.first().and_then(Operand::as_name) {
                    self.frame_mut().font_name = name.to_string();
                }
                if let Some(&size) = nums.last() {
                    self.frame_mut().font_size = size;
                }
            }
            "Tj" => self.show_text(&op.operands),
            "TJ" => {
                if let Some(Operand::Array(items)) = op.operands.first() {
                    self.show_text(items);
                }
            }
            "'" => {
                self.text.td[7] -= self.text.tl;
                self.pushright = 0.0;
                self.show_text(&op.operands);
            }
            "Do" => {
                if let Some(name) = op.operands.first().and_then(Operand::as_name) {
                    self.do_xobject(name, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn do_xobject(&mut self, name: &str, depth: usize) -> Result<(), ContentError> {
        if depth + 1 > MAX_DO_DEPTH || self.do_stack.iter().any(|n| n == name) {
            log::warn!("skipping Do {name:?}: recursion bound or self-recursion guard tripped");
            return Ok(());
        }
        let stream = match self.xobjects.get(name) {
            Some(s) => s.clone(),
            None => return Ok(()),
        };
        if !is_ascii_textual(&stream) {
            return Ok(()); // images and other binary XObjects carry no text
        }
        self.do_stack.push(name.to_string());
        self.run(&stream, depth + 1)?;
        self.do_stack.pop();
        Ok(())
    }

    /// `processRawChar`: walks a `Tj`/`TJ` operand list, applying kerning
    /// numbers to the pushright accumulator and emitting one
    /// `TextElement` per glyph in any string operand.
    fn show_text(&mut self, operands: &[Operand]) {
        let frame = self.frame().clone();
        let font = self.fonts.get(&frame.font_name);
        let ts1 = mat_mul(self.text.tm, frame.ctm);
        let mut ts = mat_mul(self.text.td, ts1);
        let x0 = ts[6];
        let scale = frame.font_size * ts[0];

        for operand in operands {
            match operand {
                Operand::Number(n) => {
                    self.pushright -= n;
                    ts[6] = x0 + self.pushright * scale / 1000.0;
                }
                Operand::Str(bytes) => {
                    let font = match font {
                        Some(f) => f,
                        None => continue,
                    };
                    if bytes.is_empty() {
                        continue;
                    }
                    ts[6] = x0 + self.pushright * scale / 1000.0;
                    for code in font.decode_codes(bytes) {
                        let unicode = font.unicode_for(code);
                        let width_u = font.width_for(code) as f64;
                        let left = ts[6];
                        let bottom = ts[7];
                        let spacing = if frame.font_size != 0.0 {
                            if code == 0x0020 {
                                1000.0 * (self.text.tc + self.text.tw) / frame.font_size
                            } else {
                                1000.0 * self.text.tc / frame.font_size
                            }
                        } else {
                            0.0
                        };
                        let glyph_advance = width_u + spacing;
                        self.pushright += glyph_advance;
                        ts[6] = x0 + self.pushright * scale / 1000.0;
                        let width = scale * glyph_advance / 1000.0 * self.text.th / 100.0;
                        self.glyph_uses.push((font.base_font.clone(), code, unicode, font.width_for(code) as i32));
                        self.elements.push(TextElement {
                            left,
                            right: left + width,
                            bottom,
                            top: bottom + scale,
                            font_name: font.base_font.clone(),
                            size: scale,
                            glyphs: vec![unicode],
                        });
                    }
                }
                _ => {}
            }
        }
    }
}

/// A Form XObject worth recursing into should look like operator text,
/// not binary image samples.
fn is_ascii_textual(data: &[u8]) -> bool {
    if data.is_empty() {
        return false;
    }
    let sample = &data[..data.len().min(4096)];
    let printable = sample.iter().filter(|&&b| b == b'\n' || b == b'\r' || b == b'\t' || (0x20..=0x7e).contains(&b)).count();
    printable * 100 >= sample.len() * 95
}

fn run_interpreter<'a>(
    content: &[u8],
    fonts: &'a HashMap<String, Font>,
    xobjects: &'a HashMap<String, Vec<u8>>,
) -> Result<Interpreter<'a>, ContentError> {
    let mut interpreter = Interpreter::new(fonts, xobjects);
    interpreter.run(content, 0)?;
    Ok(interpreter)
}

/// Interprets one page's (already concatenated) content stream, given its
/// resolved font map (resource name -> `Font`) and XObject map (resource
/// name -> decoded stream bytes), producing the positioned glyph runs.
pub fn interpret(
    content: &[u8],
    fonts: &HashMap<String, Font>,
    xobjects: &HashMap<String, Vec<u8>>,
) -> Result<Vec<TextElement>, ContentError> {
    Ok(run_interpreter(content, fonts, xobjects)?.elements)
}

/// Same traversal as `interpret`, but returns the raw `(font_name,
/// raw_code, unicode, width)` tuple for every glyph shown rather than
/// positioned `TextElement`s. Backs `Document::glyph_map`.
pub fn glyph_uses(
    content: &[u8],
    fonts: &HashMap<String, Font>,
    xobjects: &HashMap<String, Vec<u8>>,
) -> Result<Vec<(String, u16, u32, i32)>, ContentError> {
    Ok(run_interpreter(content, fonts, xobjects)?.glyph_uses)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matrix_multiplication_is_row_major_standard_product() {
        let a = six_tuple(&[2.0, 0.0, 0.0, 2.0, 0.0, 0.0]); // scale by 2
        let b = translation(10.0, 5.0);
        let product = mat_mul(a, b); // scale, then translate: a*b
        assert_eq!(product[6], 10.0);
        assert_eq!(product[7], 5.0);
    }

    #[test]
    fn tokenizes_operators_and_array_operands() {
        let ops = tokenize(b"1 0 0 1 0 0 cm [(AB) -120 (C)] TJ");
        assert_eq!(ops.len(), 2);
        assert_eq!(ops[0].operator, "cm");
        assert_eq!(ops[0].operands.len(), 6);
        assert_eq!(ops[1].operator, "TJ");
        match &ops[1].operands[0] {
            Operand::Array(items) => assert_eq!(items.len(), 3),
            other => panic!("expected array operand, got {other:?}"),
        }
    }

    #[test]
    fn inline_image_is_skipped_without_producing_operations() {
        let ops = tokenize(b"BI /W 1 /H 1 ID \xff\xff\xff EI Tj");
        assert!(ops.iter().all(|o| o.operator != "ID"));
    }

    fn times_roman_font() -> Font {
        let mut pdf = Vec::new();
        pdf.extend_from_slice(b"%PDF-1.4\n");
        let obj_offset = pdf.len();
        pdf.extend_from_slice(
            b"1 0 obj\n<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman /Encoding /WinAnsiEncoding >>\nendobj\n",
        );
        let xref_offset = pdf.len();
        pdf.extend_from_slice(b"xref\n0 2\n0000000000 65535 f \n");
        pdf.extend_from_slice(format!("{:010} 00000 n \n", obj_offset).as_bytes());
        pdf.extend_from_slice(b"trailer\n<< /Size 2 /Root 1 0 R >>\n");
        pdf.extend_from_slice(format!("startxref\n{}\n%%EOF", xref_offset).as_bytes());

        let store = pdfr_objects::ObjectStore::open(&pdf).unwrap();
        let dict = store.get(1).unwrap().dict;
        pdfr_font::build(&dict, &store).unwrap()
    }

    #[test]
    fn tj_kerning_matches_worked_example() {
        let mut fonts = HashMap::new();
        fonts.insert("F1".to_string(), times_roman_font());
        let xobjects = HashMap::new();
        let content = b"BT /F1 10 Tf [(AB) -120 (C)] TJ ET";
        let elements = interpret(content, &fonts, &xobjects).unwrap();
        assert_eq!(elements.len(), 3);
        assert!((elements[0].left - 0.0).abs() < 1e-6);
        assert!((elements[1].left - 7.22).abs() < 1e-3);
        assert!((elements[2].left - 15.09).abs() < 1e-3);
    }

    #[test]
    fn q_and_unbalanced_q_leave_at_least_one_frame() {
        let fonts = HashMap::new();
        let xobjects = HashMap::new();
        let elements = interpret(b"q q q Q Q Q Q Q", &fonts, &xobjects).unwrap();
        assert!(elements.is_empty());
    }

    #[test]
    fn bt_resets_text_matrix_and_spacing() {
        let mut fonts = HashMap::new();
        fonts.insert("F1".to_string(), times_roman_font());
        let xobjects = HashMap::new();
        let content = b"BT /F1 10 Tf 5 Tc 100 0 0 100 0 0 Tm (A) Tj ET BT (A) Tj ET";
        let elements = interpret(content, &fonts, &xobjects).unwrap();
        assert_eq!(elements.len(), 2);
        // second run happens after ET/BT reset Tm to identity, so its
        // origin differs from the first run's scaled-up matrix.
        assert_ne!(elements[0].left, elements[1].left);
    }

    #[test]
    fn do_guards_against_self_recursion() {
        let fonts = HashMap::new();
        let mut xobjects = HashMap::new();
        xobjects.insert("Fx".to_string(), b"/Fx Do".to_vec());
        // should terminate rather than loop forever
        let elements = interpret(b"/Fx Do", &fonts, &xobjects).unwrap();
        assert!(elements.is_empty());
    }
}
