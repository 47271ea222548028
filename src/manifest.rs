//! Manifest parsing for combine runs.
//!
//! A manifest is a small markdown/plain-text file declaring the output name,
//! the section structure, and the ordered file list:
//!
//! ```text
//! # Output Title
//!
//! ## Section Title
//! - file1
//! - file2.pdf
//!
//! ### Subsection file3.pdf
//! - file4
//! ```
//!
//! The single `#` line names the output. Lines with two or more hashes open a
//! heading whose trailing text may double as a filename; `- ` lines are leaf
//! file references attached to the innermost open heading. File references may
//! omit `.pdf` and are matched case-insensitively against the directory.

use std::fmt;
use std::path::Path;

use crate::resolve::resolve_pdf_file;

/// Headings deeper than this are clamped; the level stack has a fixed size.
const MAX_LEVEL: usize = 9;

/// One node of the parsed section tree.
///
/// A node without a `file` still resolves to a page through the first
/// descendant that has one; a node with neither is dropped when the outline
/// or TOC is rendered, never during parsing, so the parsed tree stays
/// inspectable.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode {
    /// Display text; derived from `file` at render time when absent.
    pub title: Option<String>,
    /// Nesting depth, 1 = top-level section.
    pub level: usize,
    /// Resolved filename whose page offset this node points at.
    pub file: Option<String>,
    pub children: Vec<OutlineNode>,
}

/// Result of parsing one manifest.
#[derive(Debug)]
pub struct Manifest {
    /// Output filename, `.pdf` appended if the title lacked it.
    pub output_filename: String,
    /// Resolved filenames in encounter order. Authoritative for page
    /// concatenation order; duplicates are allowed.
    pub pdf_files: Vec<String>,
    /// Top-level section nodes.
    pub outline: Vec<OutlineNode>,
    /// Entries that could not be matched to a file on disk.
    pub warnings: Vec<String>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ManifestError {
    /// No `# Title` line (exactly one hash) was found.
    MissingTitle,
    /// No heading or list entry resolved to a file on disk.
    NoFiles,
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestError::MissingTitle => {
                write!(f, "no title found in manifest (expected '# Title')")
            }
            ManifestError::NoFiles => {
                write!(f, "no PDF files found from manifest entries")
            }
        }
    }
}

impl std::error::Error for ManifestError {}

/// Parse manifest text, resolving file references against `dir`.
pub fn parse_manifest(content: &str, dir: &Path) -> Result<Manifest, ManifestError> {
    let mut title: Option<String> = None;
    let mut pdf_files: Vec<String> = Vec::new();
    let mut outline: Vec<OutlineNode> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();

    // Path (root index, then child indices) of the open heading per level.
    let mut stack: [Option<Vec<usize>>; MAX_LEVEL + 1] = std::array::from_fn(|_| None);

    for line in content.lines() {
        let line = line.trim();

        if let Some(text) = line.strip_prefix("# ") {
            if title.is_none() {
                title = Some(text.trim().to_string());
            }
        } else if let Some((level, text)) = split_heading(line) {
            let (heading_title, heading_file) = resolve_heading(dir, text);
            if let Some(file) = &heading_file {
                pdf_files.push(file.clone());
            }
            let node = OutlineNode {
                title: Some(heading_title),
                level,
                file: heading_file,
                children: Vec::new(),
            };

            // Nearest open ancestor at a lower level, else top level.
            let parent_path = (1..level).rev().find_map(|l| stack[l].clone());
            let path = attach(&mut outline, parent_path, node);
            stack[level] = Some(path);
            for slot in stack[level + 1..].iter_mut() {
                *slot = None;
            }
        } else if let Some(text) = line.strip_prefix("- ") {
            let text = text.trim();
            if text.is_empty() {
                continue;
            }
            let Some(file) = resolve_pdf_file(dir, text) else {
                warnings.push(text.to_string());
                continue;
            };
            pdf_files.push(file.clone());

            // Innermost open heading at any level; without one the item
            // becomes an implicit top-level node.
            let parent_path = (1..=MAX_LEVEL).rev().find_map(|l| stack[l].clone());
            let level = match &parent_path {
                Some(path) => node_mut(&mut outline, path).level + 1,
                None => 1,
            };
            let leaf = OutlineNode {
                title: None,
                level,
                file: Some(file),
                children: Vec::new(),
            };
            attach(&mut outline, parent_path, leaf);
        }
    }

    let Some(title) = title else {
        return Err(ManifestError::MissingTitle);
    };
    if pdf_files.is_empty() {
        return Err(ManifestError::NoFiles);
    }

    let output_filename = if title.to_lowercase().ends_with(".pdf") {
        title
    } else {
        format!("{}.pdf", title)
    };

    Ok(Manifest {
        output_filename,
        pdf_files,
        outline,
        warnings,
    })
}

/// Recognize a heading line: two or more hashes followed by a space.
/// `## ` is level 1, `### ` level 2, and so on.
fn split_heading(line: &str) -> Option<(usize, &str)> {
    let hashes = line.bytes().take_while(|&b| b == b'#').count();
    if hashes < 2 {
        return None;
    }
    let rest = &line[hashes..];
    let text = rest.strip_prefix(' ')?;
    Some(((hashes - 1).min(MAX_LEVEL), text.trim()))
}

/// Decide whether heading text doubles as a file reference.
///
/// Tried in order: the whole text as a filename (title becomes the text with
/// its extension stripped), then the last whitespace-delimited token as a
/// filename (title becomes the remaining prefix). Neither resolving leaves a
/// plain section header.
fn resolve_heading(dir: &Path, text: &str) -> (String, Option<String>) {
    if let Some(file) = resolve_pdf_file(dir, text) {
        return (strip_extension(text).to_string(), Some(file));
    }

    if let Some((prefix, last)) = text.rsplit_once(' ') {
        if let Some(file) = resolve_pdf_file(dir, last) {
            return (prefix.trim_end().to_string(), Some(file));
        }
    }

    (text.to_string(), None)
}

fn strip_extension(name: &str) -> &str {
    match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    }
}

/// Push `node` under the parent at `parent_path` (top level when `None`) and
/// return the new node's path.
fn attach(
    roots: &mut Vec<OutlineNode>,
    parent_path: Option<Vec<usize>>,
    node: OutlineNode,
) -> Vec<usize> {
    match parent_path {
        Some(mut path) => {
            let parent = node_mut(roots, &path);
            parent.children.push(node);
            path.push(parent.children.len() - 1);
            path
        }
        None => {
            roots.push(node);
            vec![roots.len() - 1]
        }
    }
}

fn node_mut<'a>(roots: &'a mut [OutlineNode], path: &[usize]) -> &'a mut OutlineNode {
    let mut node = &mut roots[path[0]];
    for &index in &path[1..] {
        node = &mut node.children[index];
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::write(dir.join(name), b"").unwrap();
    }

    #[test]
    fn test_scenario_manifest() {
        let tmp = TempDir::new().unwrap();
        for name in ["intro.pdf", "appendix1.pdf", "appendix2.pdf"] {
            touch(tmp.path(), name);
        }

        let manifest = parse_manifest(
            "# Combined Report\n\
             ## Intro intro.pdf\n\
             - appendix1.pdf\n\
             ## Summary\n\
             - appendix2.pdf\n",
            tmp.path(),
        )
        .unwrap();

        assert_eq!(manifest.output_filename, "Combined Report.pdf");
        assert_eq!(
            manifest.pdf_files,
            vec!["intro.pdf", "appendix1.pdf", "appendix2.pdf"]
        );
        assert!(manifest.warnings.is_empty());

        assert_eq!(manifest.outline.len(), 2);
        let intro = &manifest.outline[0];
        assert_eq!(intro.title.as_deref(), Some("Intro"));
        assert_eq!(intro.file.as_deref(), Some("intro.pdf"));
        assert_eq!(intro.children.len(), 1);
        assert_eq!(intro.children[0].file.as_deref(), Some("appendix1.pdf"));
        assert_eq!(intro.children[0].level, 2);

        let summary = &manifest.outline[1];
        assert_eq!(summary.title.as_deref(), Some("Summary"));
        assert_eq!(summary.file, None);
        assert_eq!(summary.children.len(), 1);
        assert_eq!(summary.children[0].file.as_deref(), Some("appendix2.pdf"));
    }

    #[test]
    fn test_missing_title() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let err = parse_manifest("## Section\n- a.pdf\n", tmp.path()).unwrap_err();
        assert_eq!(err, ManifestError::MissingTitle);
    }

    #[test]
    fn test_title_only_is_not_enough() {
        let tmp = TempDir::new().unwrap();
        let err = parse_manifest("# Just A Title\n", tmp.path()).unwrap_err();
        assert_eq!(err, ManifestError::NoFiles);
    }

    #[test]
    fn test_first_title_wins() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# First\n# Second\n- a\n", tmp.path()).unwrap();
        assert_eq!(manifest.output_filename, "First.pdf");
    }

    #[test]
    fn test_title_keeps_existing_pdf_suffix() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# Out.PDF\n- a\n", tmp.path()).unwrap();
        assert_eq!(manifest.output_filename, "Out.PDF");
    }

    #[test]
    fn test_whole_heading_as_filename() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "Summary.pdf");
        let manifest = parse_manifest("# Out\n## Summary\n", tmp.path()).unwrap();
        assert_eq!(manifest.pdf_files, vec!["Summary.pdf"]);
        assert_eq!(manifest.outline[0].title.as_deref(), Some("Summary"));
        assert_eq!(manifest.outline[0].file.as_deref(), Some("Summary.pdf"));
    }

    #[test]
    fn test_unresolved_list_item_warns_and_continues() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# Out\n## S\n- missing\n- a\n", tmp.path()).unwrap();
        assert_eq!(manifest.pdf_files, vec!["a.pdf"]);
        assert_eq!(manifest.warnings, vec!["missing"]);
    }

    #[test]
    fn test_unresolved_heading_becomes_section_header() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# Out\n## Only Words Here\n- a\n", tmp.path()).unwrap();
        let section = &manifest.outline[0];
        assert_eq!(section.title.as_deref(), Some("Only Words Here"));
        assert_eq!(section.file, None);
        assert_eq!(section.children.len(), 1);
    }

    #[test]
    fn test_nested_headings_and_sibling_reset() {
        let tmp = TempDir::new().unwrap();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            touch(tmp.path(), name);
        }

        let manifest = parse_manifest(
            "# Out\n\
             ## One\n\
             ### Inner\n\
             - a\n\
             ## Two\n\
             - b\n\
             - c\n",
            tmp.path(),
        )
        .unwrap();

        assert_eq!(manifest.outline.len(), 2);
        let one = &manifest.outline[0];
        assert_eq!(one.children.len(), 1);
        assert_eq!(one.children[0].title.as_deref(), Some("Inner"));
        assert_eq!(one.children[0].level, 2);
        assert_eq!(one.children[0].children[0].level, 3);

        // "## Two" cleared the level-2 slot, so its items are its own.
        let two = &manifest.outline[1];
        assert_eq!(two.children.len(), 2);
        assert_eq!(two.children[0].file.as_deref(), Some("b.pdf"));
    }

    #[test]
    fn test_list_item_without_heading_is_top_level() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# Out\n- a\n", tmp.path()).unwrap();
        assert_eq!(manifest.outline.len(), 1);
        assert_eq!(manifest.outline[0].level, 1);
        assert_eq!(manifest.outline[0].title, None);
    }

    #[test]
    fn test_duplicate_references_kept_in_order() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "a.pdf");
        let manifest = parse_manifest("# Out\n## S a.pdf\n- a\n", tmp.path()).unwrap();
        assert_eq!(manifest.pdf_files, vec!["a.pdf", "a.pdf"]);
    }

    #[test]
    fn test_heading_last_token_as_filename() {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "03-Certificates.pdf");
        let manifest =
            parse_manifest("# Out\n## Certificates 03-Certificates\n", tmp.path()).unwrap();
        let node = &manifest.outline[0];
        assert_eq!(node.title.as_deref(), Some("Certificates"));
        assert_eq!(node.file.as_deref(), Some("03-Certificates.pdf"));
    }
}
