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
use anyhow::Result;
use humansize::{file_size_opts as options, FileSize};
use pdfr::Document;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(name = "dump-text")]
/// Inspect and extract text from PDF files
enum Opt {
    #[structopt(name = "xref")]
    /// List the resolved cross-reference table
    Xref {
        #[structopt(parse(from_os_str))]
        /// The PDF file to inspect
        input: PathBuf,
    },

    #[structopt(name = "object")]
    /// Dump a single indirect object's dictionary and stream length
    Object {
        /// The object number to dump
        number: u32,

        #[structopt(parse(from_os_str))]
        /// The PDF file to inspect
        input: PathBuf,
    },

    #[structopt(name = "text")]
    /// Extract positioned text from one or all pages
    Text {
        #[structopt(short = "-p", long = "--page")]
        /// Dump only this page (0-indexed); all pages if omitted
        page: Option<usize>,

        #[structopt(parse(from_os_str))]
        /// The PDF files to extract text from
        inputs: Vec<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    match opt {
        Opt::Xref { input } => handle_xref(input),
        Opt::Object { number, input } => handle_object(number, input),
        Opt::Text { page, inputs } => handle_text(page, inputs),
    }
}

fn handle_xref(input: PathBuf) -> Result<()> {
    let doc = Document::open_path(&input)?;
    for (num, offset, stream_object) in doc.xref_entries()? {
        if stream_object != 0 {
            println!("{num:>6}  in stream {stream_object}");
        } else {
            println!("{num:>6}  offset {offset}");
        }
    }
    Ok(())
}

fn handle_object(number: u32, input: PathBuf) -> Result<()> {
    let doc = Document::open_path(&input)?;
    let (dict, stream) = doc.object(number)?;
    println!("{dict:#?}");
    if !stream.is_empty() {
        let size = stream.len().file_size(options::BINARY).unwrap();
        println!("stream: {size}");
    }
    Ok(())
}

fn handle_text(page: Option<usize>, inputs: Vec<PathBuf>) -> Result<()> {
    let multi_input = inputs.len() > 1;
    for (i, input) in inputs.iter().enumerate() {
        let doc = Document::open_path(input)?;
        if multi_input {
            if i != 0 {
                println!();
            }
            println!("{}:", input.to_string_lossy());
        }
        let pages = match page {
            Some(p) => p..p + 1,
            None => 0..doc.page_count(),
        };
        for page_index in pages {
            let elements = doc.page_text(page_index)?;
            let text: String = elements
                .iter()
                .flat_map(|e| e.glyphs.iter().filter_map(|&u| char::from_u32(u)))
                .collect();
            println!("--- page {page_index} ---");
            println!("{text}");
        }
    }
    Ok(())
}
