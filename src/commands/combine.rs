//! The combine command: concatenate a directory's PDFs into one document,
//! optionally with bookmarks and a generated table of contents.
//!
//! In manifest mode the file list, output name, and section tree come from a
//! markdown/txt manifest; in directory mode every PDF in the folder is taken
//! alphabetically with a cover file forced to the front. Unreadable and
//! encrypted inputs are skipped and reported, never fatal. The combined file
//! is written first; the TOC stage then reassembles cover + TOC pages +
//! content, and a failure there leaves the already-written output in place.

use std::collections::HashSet;
use std::io::{self, BufRead, Write};
use std::path::Path;

use anyhow::{bail, Context, Result};
use lopdf::Document;

use crate::manifest::{parse_manifest, OutlineNode};
use crate::pdf::merge::{front_pages, skip_pages, DocumentBuilder, PageOffsets};
use crate::pdf::{outline, toc_page, PdfDocument};
use crate::resolve::{find_manifest_file, is_cover_file, list_pdf_files};

/// Output filename in directory mode; sorts ahead of its inputs.
pub const DEFAULT_OUTPUT: &str = "00-Combined.pdf";

pub struct CombineOptions {
    /// Write bookmarks into the combined document.
    pub outline: bool,
    /// Insert generated table-of-contents pages.
    pub toc: bool,
    /// Drive the run from a manifest file instead of the directory listing.
    pub use_manifest: bool,
    /// Skip the interactive confirmation.
    pub assume_yes: bool,
}

struct Plan {
    output: String,
    files: Vec<String>,
    /// Section tree in manifest mode, absent in directory mode.
    tree: Option<Vec<OutlineNode>>,
}

pub fn run<P: AsRef<Path>>(dir: P, options: &CombineOptions) -> Result<()> {
    let dir = dir.as_ref();
    let plan = build_plan(dir, options)?;

    if plan.files.is_empty() {
        bail!("no PDF files to combine in {}", dir.display());
    }

    println!("Files to combine into {}:", plan.output);
    for (i, name) in plan.files.iter().enumerate() {
        println!("  {}. {}", i + 1, name);
    }
    if !options.assume_yes && !confirm()? {
        println!("Aborted.");
        return Ok(());
    }

    let output_path = dir.join(&plan.output);
    if output_path.exists() {
        std::fs::remove_file(&output_path).with_context(|| {
            format!(
                "failed to remove previous output {}",
                output_path.display()
            )
        })?;
    }

    let mut builder = DocumentBuilder::new();
    let mut combined: Vec<(String, usize)> = Vec::new();
    let mut skipped: Vec<(String, String)> = Vec::new();
    for name in &plan.files {
        let source = match Document::load(dir.join(name)) {
            Ok(doc) => doc,
            Err(err) => {
                skipped.push((name.clone(), err.to_string()));
                continue;
            }
        };
        if source.is_encrypted() {
            skipped.push((name.clone(), "encrypted".to_string()));
            continue;
        }
        let pages = source.get_pages().len();
        builder.append(name, source)?;
        combined.push((name.clone(), pages));
    }

    if combined.is_empty() {
        bail!("none of the input files could be read");
    }

    let (mut doc, offsets) = builder.finish()?;

    // Cover pages stay ahead of the TOC and out of the outline.
    let cover_count = match combined.first() {
        Some((name, pages)) if is_cover_file(name) => *pages,
        _ => 0,
    };
    let flat_entries = flat_outline_entries(&combined, &offsets);

    if options.outline {
        match &plan.tree {
            Some(tree) => outline::write_outline_tree(&mut doc, tree, &offsets, 0)?,
            None => outline::write_flat_outline(&mut doc, &flat_entries)?,
        }
    }

    PdfDocument::save(&mut doc, &output_path)?;

    println!();
    println!("Combined {} file(s) into {}:", combined.len(), output_path.display());
    for (i, (name, pages)) in combined.iter().enumerate() {
        println!(
            "  {}. {} ({} page{})",
            i + 1,
            name,
            pages,
            if *pages == 1 { "" } else { "s" }
        );
    }
    if !skipped.is_empty() {
        println!("Skipped:");
        for (name, reason) in &skipped {
            println!("  {} ({})", name, reason);
        }
    }

    if options.toc {
        if let Err(err) = add_toc(
            &doc,
            &output_path,
            &plan,
            &offsets,
            &flat_entries,
            cover_count,
        ) {
            eprintln!(
                "warning: table of contents failed ({:#}); keeping {}",
                err,
                output_path.display()
            );
        }
    }

    Ok(())
}

fn build_plan(dir: &Path, options: &CombineOptions) -> Result<Plan> {
    if options.use_manifest {
        let manifest_path = find_manifest_file(dir)?;
        let content = std::fs::read_to_string(&manifest_path)
            .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
        let manifest = parse_manifest(&content, dir)?;

        println!("Using manifest {}", manifest_path.display());
        for entry in &manifest.warnings {
            eprintln!("warning: manifest entry '{}' matches no file", entry);
        }

        Ok(Plan {
            output: manifest.output_filename,
            files: manifest.pdf_files,
            tree: Some(manifest.outline),
        })
    } else {
        let files = list_pdf_files(dir, DEFAULT_OUTPUT)?;
        Ok(Plan {
            output: DEFAULT_OUTPUT.to_string(),
            files,
            tree: None,
        })
    }
}

fn confirm() -> Result<bool> {
    print!("Proceed? [y/N] ");
    io::stdout().flush().context("failed to flush stdout")?;
    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read confirmation")?;
    let answer = line.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}

/// One (title, page) pair per combined non-cover file, titles cleaned from
/// the filenames. Directory mode's outline and TOC both come from this.
fn flat_outline_entries(
    combined: &[(String, usize)],
    offsets: &PageOffsets,
) -> Vec<(String, usize)> {
    combined
        .iter()
        .filter(|(name, _)| !is_cover_file(name))
        .filter_map(|(name, _)| {
            offsets
                .get(name)
                .map(|page| (outline::clean_outline_title(name), page))
        })
        .collect()
}

/// Generate TOC pages and reassemble the output as cover + TOC + content.
///
/// Row targets are printed against the final page order, so the outline is
/// rewritten with the TOC page count as shift afterwards.
fn add_toc(
    doc: &Document,
    output_path: &Path,
    plan: &Plan,
    offsets: &PageOffsets,
    flat_entries: &[(String, usize)],
    cover_count: usize,
) -> Result<()> {
    let entries: Vec<toc_page::TocEntry> = match &plan.tree {
        Some(tree) => {
            let cover_pages: HashSet<usize> = offsets
                .iter()
                .filter(|(name, _)| is_cover_file(name))
                .map(|(_, page)| page)
                .collect();
            toc_page::flatten_entries(tree, offsets)
                .into_iter()
                .filter(|e| !cover_pages.contains(&e.page))
                .collect()
        }
        None => outline::read_outline(doc)
            .into_iter()
            .filter_map(|e| {
                e.page.map(|page| toc_page::TocEntry {
                    title: e.title,
                    page,
                    level: 0,
                })
            })
            .collect(),
    };
    if entries.is_empty() {
        println!("No outline entries available; skipping table of contents.");
        return Ok(());
    }

    let (mut toc_doc, toc_pages, links) = toc_page::build_toc_document(&entries)?;

    // Round-trip through the writer so the TOC pages merge like any other
    // loaded input.
    let mut bytes = Vec::new();
    toc_doc
        .save_to(&mut bytes)
        .context("failed to serialize TOC pages")?;
    let toc_doc = Document::load_mem(&bytes).context("failed to reload TOC pages")?;

    let mut builder = DocumentBuilder::new();
    if cover_count > 0 {
        builder.append("cover", front_pages(doc, cover_count))?;
    }
    builder.append("toc", toc_doc)?;
    builder.append("content", skip_pages(doc, cover_count))?;
    let (mut final_doc, _) = builder.finish()?;

    toc_page::attach_links(&mut final_doc, cover_count, &links)?;

    match &plan.tree {
        Some(tree) => outline::write_outline_tree(&mut final_doc, tree, offsets, toc_pages)?,
        None => {
            let shifted: Vec<(String, usize)> = flat_entries
                .iter()
                .map(|(title, page)| (title.clone(), page + toc_pages))
                .collect();
            outline::write_flat_outline(&mut final_doc, &shifted)?;
        }
    }

    PdfDocument::save(&mut final_doc, output_path)?;
    println!(
        "Inserted {} table-of-contents page{}.",
        toc_pages,
        if toc_pages == 1 { "" } else { "s" }
    );
    Ok(())
}
