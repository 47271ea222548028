//! The toc command: print a document's outline as an indented listing.

use std::path::Path;

use anyhow::Result;

use crate::pdf::outline::read_outline;
use crate::pdf::PdfDocument;

pub fn run<P: AsRef<Path>>(path: P) -> Result<()> {
    let pdf = PdfDocument::open(&path)?;

    let entries = read_outline(&pdf.doc);
    if entries.is_empty() {
        println!("No outline found in {}", pdf.path);
        return Ok(());
    }

    for entry in &entries {
        let indent = "  ".repeat(entry.level);
        match entry.page {
            Some(page) => println!("{}{} ... {}", indent, entry.title, page + 1),
            None => println!("{}{}", indent, entry.title),
        }
    }

    Ok(())
}
