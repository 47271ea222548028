//! Outline (bookmark) reading and writing.
//!
//! Writing walks the manifest section tree and emits nested outline
//! dictionaries; reading walks an existing document's outline, which is how
//! non-manifest TOC generation finds its entries.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};
use regex::Regex;

use crate::manifest::OutlineNode;
use crate::pdf::merge::PageOffsets;

/// Leading tokens stripped from filenames when deriving a bookmark title.
const ACRONYMS: [&str; 12] = [
    "BR", "CERT", "DR", "DS", "IOM", "PR", "PL", "PIC", "PTT", "REG", "TD", "TQ",
];

static LEADING_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:0*[1-9]\d*|0+)\b").expect("leading number pattern"));
static LEADING_ACRONYM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^\s*(?:{})\b\s*", ACRONYMS.join("|"))).expect("acronym pattern")
});

/// Derive a display title from a filename: drop the extension, a leading
/// number token ("02", "002"), and one leading acronym.
pub fn clean_outline_title(filename: &str) -> String {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => filename,
    };
    let stripped = LEADING_NUMBER.replace(stem, "");
    let stripped = LEADING_ACRONYM.replace(stripped.trim_start(), "");
    stripped.trim().to_string()
}

/// The page a node points at: its own file's offset, else the first
/// descendant (depth-first, first child first) that has one.
pub fn resolve_page(node: &OutlineNode, offsets: &PageOffsets) -> Option<usize> {
    if let Some(file) = &node.file {
        if let Some(page) = offsets.get(file) {
            return Some(page);
        }
    }
    node.children
        .iter()
        .find_map(|child| resolve_page(child, offsets))
}

/// Explicit title, else one cleaned from the filename.
pub fn display_title(node: &OutlineNode) -> Option<String> {
    match (&node.title, &node.file) {
        (Some(title), _) => Some(title.clone()),
        (None, Some(file)) => Some(clean_outline_title(file)),
        (None, None) => None,
    }
}

/// A node that survived page/title resolution; this is what actually gets
/// written. Nodes that resolve to nothing are dropped together with their
/// subtree, the parsed tree itself is left untouched.
struct ResolvedNode {
    title: String,
    page: usize,
    children: Vec<ResolvedNode>,
}

fn resolve_tree(nodes: &[OutlineNode], offsets: &PageOffsets, shift: usize) -> Vec<ResolvedNode> {
    nodes
        .iter()
        .filter_map(|node| {
            let title = display_title(node)?;
            let page = resolve_page(node, offsets)?;
            Some(ResolvedNode {
                title,
                page: page + shift,
                children: resolve_tree(&node.children, offsets, shift),
            })
        })
        .collect()
}

/// Replace the document outline with the manifest section tree.
///
/// `shift` is added to every page offset; it is the generated TOC page count
/// once TOC pages have been inserted ahead of the content, zero before.
pub fn write_outline_tree(
    doc: &mut Document,
    nodes: &[OutlineNode],
    offsets: &PageOffsets,
    shift: usize,
) -> Result<()> {
    let resolved = resolve_tree(nodes, offsets, shift);
    write_resolved(doc, &resolved)
}

/// Replace the document outline with one flat entry per (title, page) pair.
/// Used in non-manifest mode, one entry per combined file.
pub fn write_flat_outline(doc: &mut Document, entries: &[(String, usize)]) -> Result<()> {
    let resolved: Vec<ResolvedNode> = entries
        .iter()
        .map(|(title, page)| ResolvedNode {
            title: title.clone(),
            page: *page,
            children: Vec::new(),
        })
        .collect();
    write_resolved(doc, &resolved)
}

fn write_resolved(doc: &mut Document, nodes: &[ResolvedNode]) -> Result<()> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .context("document has no catalog")?;

    if nodes.is_empty() {
        if let Ok(Object::Dictionary(catalog)) = doc.get_object_mut(catalog_id) {
            catalog.remove(b"Outlines");
        }
        return Ok(());
    }

    let pages = sorted_page_ids(doc);
    let outlines_id = doc.new_object_id();
    let (first, last, count) = write_level(doc, nodes, outlines_id, &pages)?;

    let outlines = Dictionary::from_iter([
        ("Type", Object::Name(b"Outlines".to_vec())),
        ("First", Object::Reference(first)),
        ("Last", Object::Reference(last)),
        ("Count", Object::Integer(count as i64)),
    ]);
    doc.objects
        .insert(outlines_id, Object::Dictionary(outlines));

    let catalog = doc
        .get_object_mut(catalog_id)
        .context("document has no catalog")?;
    if let Object::Dictionary(dict) = catalog {
        dict.set("Outlines", Object::Reference(outlines_id));
    }

    Ok(())
}

/// Write one sibling chain, recursing into children. Returns the first and
/// last item IDs plus the total entry count of the subtree.
fn write_level(
    doc: &mut Document,
    nodes: &[ResolvedNode],
    parent_id: ObjectId,
    pages: &[ObjectId],
) -> Result<(ObjectId, ObjectId, usize)> {
    let ids: Vec<ObjectId> = nodes.iter().map(|_| doc.new_object_id()).collect();
    let mut total = nodes.len();

    for (i, node) in nodes.iter().enumerate() {
        let page_id = *pages
            .get(node.page)
            .with_context(|| format!("outline target page {} out of range", node.page))?;

        let mut dict = Dictionary::new();
        dict.set("Title", Object::string_literal(node.title.as_str()));
        dict.set("Parent", Object::Reference(parent_id));
        dict.set(
            "Dest",
            Object::Array(vec![
                Object::Reference(page_id),
                Object::Name(b"Fit".to_vec()),
            ]),
        );
        if i > 0 {
            dict.set("Prev", Object::Reference(ids[i - 1]));
        }
        if i + 1 < ids.len() {
            dict.set("Next", Object::Reference(ids[i + 1]));
        }

        if !node.children.is_empty() {
            let (first, last, count) = write_level(doc, &node.children, ids[i], pages)?;
            dict.set("First", Object::Reference(first));
            dict.set("Last", Object::Reference(last));
            dict.set("Count", Object::Integer(count as i64));
            total += count;
        }

        doc.objects.insert(ids[i], Object::Dictionary(dict));
    }

    Ok((ids[0], ids[ids.len() - 1], total))
}

fn sorted_page_ids(doc: &Document) -> Vec<ObjectId> {
    let mut pages: Vec<_> = doc.get_pages().into_iter().collect();
    pages.sort_by_key(|(num, _)| *num);
    pages.into_iter().map(|(_, id)| id).collect()
}

/// One entry read back out of a document outline.
#[derive(Debug, Clone)]
pub struct OutlineEntry {
    pub title: String,
    /// Zero-based page index, if the destination resolved.
    pub page: Option<usize>,
    pub level: usize,
}

/// Flatten a document's outline in display order.
pub fn read_outline(doc: &Document) -> Vec<OutlineEntry> {
    let mut entries = Vec::new();

    let Ok(catalog) = doc.catalog() else {
        return entries;
    };
    let Ok(Object::Reference(outlines_id)) = catalog.get(b"Outlines") else {
        return entries;
    };
    let Ok(outlines) = doc.get_dictionary(*outlines_id) else {
        return entries;
    };
    let Ok(Object::Reference(first)) = outlines.get(b"First") else {
        return entries;
    };

    let page_index: Vec<ObjectId> = sorted_page_ids(doc);
    walk_items(doc, *first, &page_index, 0, &mut entries);
    entries
}

fn walk_items(
    doc: &Document,
    first_id: ObjectId,
    pages: &[ObjectId],
    level: usize,
    entries: &mut Vec<OutlineEntry>,
) {
    let mut current = Some(first_id);
    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };

        let title = match dict.get(b"Title") {
            Ok(Object::String(bytes, _)) => decode_pdf_string(bytes),
            _ => "Untitled".to_string(),
        };
        let page = destination_page(doc, dict, pages);
        entries.push(OutlineEntry { title, page, level });

        if let Ok(Object::Reference(child)) = dict.get(b"First") {
            walk_items(doc, *child, pages, level + 1, entries);
        }

        current = match dict.get(b"Next") {
            Ok(Object::Reference(next)) => Some(*next),
            _ => None,
        };
    }
}

/// Resolve an item's target page from a direct `/Dest` or a `/GoTo` action.
fn destination_page(doc: &Document, dict: &Dictionary, pages: &[ObjectId]) -> Option<usize> {
    if let Ok(dest) = dict.get(b"Dest") {
        return dest_array_page(doc, dest, pages);
    }

    let action = match dict.get(b"A") {
        Ok(Object::Reference(id)) => doc.get_dictionary(*id).ok(),
        Ok(Object::Dictionary(inline)) => Some(inline),
        _ => None,
    }?;
    if let Ok(Object::Name(kind)) = action.get(b"S") {
        if kind == b"GoTo" {
            if let Ok(dest) = action.get(b"D") {
                return dest_array_page(doc, dest, pages);
            }
        }
    }
    None
}

fn dest_array_page(doc: &Document, dest: &Object, pages: &[ObjectId]) -> Option<usize> {
    match dest {
        Object::Array(arr) => {
            let Some(Object::Reference(page_ref)) = arr.first() else {
                return None;
            };
            pages.iter().position(|id| id == page_ref)
        }
        Object::Reference(id) => {
            let resolved = doc.get_object(*id).ok()?;
            dest_array_page(doc, resolved, pages)
        }
        _ => None,
    }
}

fn decode_pdf_string(bytes: &[u8]) -> String {
    // UTF-16 BE with BOM, else PDFDocEncoding treated as Latin-1.
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter(|c| c.len() == 2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
