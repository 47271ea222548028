//! Table-of-contents page generation.
//!
//! Flattened outline entries are laid out across A4 pages with per-level
//! font, indent, and line-height rules, and every row's rectangle is
//! remembered so clickable link annotations can be attached once the TOC
//! pages sit inside the final document.
//!
//! Target page numbers are printed as `original + toc_page_count`, so the
//! TOC's own page count is needed before rendering. It is first estimated,
//! then corrected with one re-render if the estimate was off. A second pass
//! always suffices because the layout itself does not depend on the printed
//! numbers; digit-width differences are assumed never to change row
//! wrapping, which is a known approximation for very large documents.

use anyhow::{Context, Result};
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::manifest::OutlineNode;
use crate::pdf::merge::PageOffsets;
use crate::pdf::outline::{display_title, resolve_page};

const A4_WIDTH: f32 = 595.276;
const A4_HEIGHT: f32 = 841.89;
const LEFT_MARGIN: f32 = 50.0;
const RIGHT_MARGIN: f32 = A4_WIDTH - 50.0;
const TOP_MARGIN: f32 = A4_HEIGHT - 50.0;
const BOTTOM_MARGIN: f32 = 60.0;
const HEADER_FONT_SIZE: f32 = 16.0;
/// Vertical gap between the page header and the first entry row.
const HEADER_GAP: f32 = 35.0;
const DOT_STEP: f32 = 5.0;

/// One flattened outline row to be printed.
///
/// `page` is the zero-based offset in the concatenated document before TOC
/// insertion. `level` 0 means flat (non-manifest) styling.
#[derive(Debug, Clone, PartialEq)]
pub struct TocEntry {
    pub title: String,
    pub page: usize,
    pub level: usize,
}

/// Rectangle of a rendered row, for link annotation attachment.
#[derive(Debug, Clone)]
pub struct LinkInfo {
    /// Zero-based index within the generated TOC pages.
    pub toc_page: usize,
    /// (x1, y1, x2, y2) in PDF page coordinates.
    pub rect: [f32; 4],
    /// Final page index in the assembled document.
    pub target_page: usize,
}

struct LevelStyle {
    font_size: f32,
    indent: f32,
    line_height: f32,
    bold: bool,
}

fn level_style(level: usize) -> LevelStyle {
    match level {
        0 => LevelStyle {
            font_size: 11.0,
            indent: 0.0,
            line_height: 20.0,
            bold: false,
        },
        1 => LevelStyle {
            font_size: 13.0,
            indent: 0.0,
            line_height: 24.0,
            bold: true,
        },
        2 => LevelStyle {
            font_size: 11.0,
            indent: 20.0,
            line_height: 20.0,
            bold: false,
        },
        3 => LevelStyle {
            font_size: 10.0,
            indent: 40.0,
            line_height: 18.0,
            bold: false,
        },
        n => LevelStyle {
            font_size: 9.0,
            indent: 60.0 + (n - 4) as f32 * 15.0,
            line_height: 16.0,
            bold: false,
        },
    }
}

fn title_color(level: usize) -> (f32, f32, f32) {
    match level {
        0 => (0.0, 0.0, 0.8),
        1 => (0.0, 0.0, 0.7),
        _ => (0.1, 0.1, 0.6),
    }
}

/// Approximate Helvetica string width; half the font size per character.
fn text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.5
}

/// Flatten the section tree in document order, dropping nodes that resolve
/// to neither a page nor a title. Exactly the filtering the outline writer
/// applies, so TOC rows and bookmarks always agree.
pub fn flatten_entries(nodes: &[OutlineNode], offsets: &PageOffsets) -> Vec<TocEntry> {
    let mut entries = Vec::new();
    flatten_into(nodes, offsets, &mut entries);
    entries
}

fn flatten_into(nodes: &[OutlineNode], offsets: &PageOffsets, entries: &mut Vec<TocEntry>) {
    for node in nodes {
        if let (Some(title), Some(page)) = (display_title(node), resolve_page(node, offsets)) {
            entries.push(TocEntry {
                title,
                page,
                level: node.level,
            });
            flatten_into(&node.children, offsets, entries);
        }
    }
}

/// Estimate how many pages the TOC needs before rendering it.
pub fn estimate_page_count(entries: &[TocEntry]) -> usize {
    if entries.is_empty() {
        return 0;
    }
    let usable = TOP_MARGIN - BOTTOM_MARGIN - HEADER_GAP;

    if entries.iter().all(|e| e.level == 0) {
        let per_page = (usable / level_style(0).line_height) as usize;
        if per_page == 0 {
            return entries.len();
        }
        return entries.len().div_ceil(per_page);
    }

    let total: f32 = entries
        .iter()
        .map(|e| level_style(e.level).line_height)
        .sum();
    ((total / usable).ceil() as usize).max(1)
}

/// Render the TOC as its own document, printing each target as
/// `page + toc_page_count` (1-based on the page).
pub fn render(entries: &[TocEntry], toc_page_count: usize) -> Result<(Document, Vec<LinkInfo>)> {
    let mut pages: Vec<Vec<Operation>> = vec![header_ops()];
    let mut links = Vec::new();
    let mut y = TOP_MARGIN - HEADER_GAP;

    for entry in entries {
        let style = level_style(entry.level);
        if y < BOTTOM_MARGIN {
            pages.push(header_ops());
            y = TOP_MARGIN - HEADER_GAP;
        }
        let ops = pages.last_mut().context("no current TOC page")?;

        let target_page = entry.page + toc_page_count;
        let display = (target_page + 1).to_string();
        let entry_left = LEFT_MARGIN + style.indent;
        let font = if style.bold { "F2" } else { "F1" };

        text_run(
            ops,
            font,
            style.font_size,
            title_color(entry.level),
            entry_left,
            y,
            &entry.title,
        );

        let number_width = text_width(&display, style.font_size);
        text_run(
            ops,
            font,
            style.font_size,
            (0.0, 0.0, 0.0),
            RIGHT_MARGIN - number_width,
            y,
            &display,
        );

        let dot_start = entry_left + text_width(&entry.title, style.font_size) + 10.0;
        let dot_end = RIGHT_MARGIN - number_width - 10.0;
        if dot_end > dot_start {
            leader_dots(ops, style.font_size, dot_start, dot_end, y);
        }

        links.push(LinkInfo {
            toc_page: pages.len() - 1,
            rect: [LEFT_MARGIN, y - 3.0, RIGHT_MARGIN, y + style.font_size],
            target_page,
        });

        y -= style.line_height;
    }

    let doc = build_document(pages)?;
    Ok((doc, links))
}

/// Estimate, render, and re-render once if the estimate was wrong.
/// Returns the TOC document, its page count, and the link rectangles.
pub fn build_toc_document(entries: &[TocEntry]) -> Result<(Document, usize, Vec<LinkInfo>)> {
    let estimate = estimate_page_count(entries);
    let (doc, links) = render(entries, estimate)?;
    let actual = doc.get_pages().len();
    if actual == estimate {
        return Ok((doc, actual, links));
    }
    let (doc, links) = render(entries, actual)?;
    Ok((doc, actual, links))
}

/// Attach one `/Link` annotation per rendered row.
///
/// `toc_start` is the index of the first TOC page in the final document
/// (the cover page count); `target_page` indices are already final.
pub fn attach_links(doc: &mut Document, toc_start: usize, links: &[LinkInfo]) -> Result<()> {
    let mut pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
    pages.sort_by_key(|(num, _)| *num);
    let pages: Vec<ObjectId> = pages.into_iter().map(|(_, id)| id).collect();

    for link in links {
        let page_id = *pages
            .get(toc_start + link.toc_page)
            .context("TOC page out of range for link annotation")?;
        let target_id = *pages
            .get(link.target_page)
            .context("link target page out of range")?;

        let [x1, y1, x2, y2] = link.rect;
        let annotation = Dictionary::from_iter([
            ("Type", Object::Name(b"Annot".to_vec())),
            ("Subtype", Object::Name(b"Link".to_vec())),
            (
                "Rect",
                Object::Array(vec![
                    Object::Real(x1),
                    Object::Real(y1),
                    Object::Real(x2),
                    Object::Real(y2),
                ]),
            ),
            (
                "Border",
                Object::Array(vec![0.into(), 0.into(), 0.into()]),
            ),
            (
                "Dest",
                Object::Array(vec![
                    Object::Reference(target_id),
                    Object::Name(b"Fit".to_vec()),
                ]),
            ),
        ]);
        let annotation_id = doc.add_object(annotation);

        let page = doc
            .get_object_mut(page_id)
            .context("TOC page object missing")?;
        if let Object::Dictionary(dict) = page {
            match dict.get(b"Annots").ok().cloned() {
                Some(Object::Array(mut annots)) => {
                    annots.push(Object::Reference(annotation_id));
                    dict.set("Annots", Object::Array(annots));
                }
                _ => {
                    dict.set(
                        "Annots",
                        Object::Array(vec![Object::Reference(annotation_id)]),
                    );
                }
            }
        }
    }

    Ok(())
}

fn header_ops() -> Vec<Operation> {
    let mut ops = Vec::new();
    text_run(
        &mut ops,
        "F2",
        HEADER_FONT_SIZE,
        (0.0, 0.0, 0.0),
        LEFT_MARGIN,
        TOP_MARGIN,
        "Table of Contents",
    );
    ops
}

fn text_run(
    ops: &mut Vec<Operation>,
    font: &str,
    size: f32,
    color: (f32, f32, f32),
    x: f32,
    y: f32,
    text: &str,
) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec![font.into(), Object::Real(size)]));
    ops.push(Operation::new(
        "rg",
        vec![
            Object::Real(color.0),
            Object::Real(color.1),
            Object::Real(color.2),
        ],
    ));
    ops.push(Operation::new("Td", vec![Object::Real(x), Object::Real(y)]));
    ops.push(Operation::new("Tj", vec![Object::string_literal(text)]));
    ops.push(Operation::new("ET", vec![]));
}

fn leader_dots(ops: &mut Vec<Operation>, size: f32, start: f32, end: f32, y: f32) {
    ops.push(Operation::new("BT", vec![]));
    ops.push(Operation::new("Tf", vec!["F1".into(), Object::Real(size)]));
    ops.push(Operation::new(
        "rg",
        vec![
            Object::Real(0.5),
            Object::Real(0.5),
            Object::Real(0.5),
        ],
    ));
    let mut x = start;
    while x < end {
        ops.push(Operation::new(
            "Tm",
            vec![
                1.into(),
                0.into(),
                0.into(),
                1.into(),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        ops.push(Operation::new("Tj", vec![Object::string_literal(".")]));
        x += DOT_STEP;
    }
    ops.push(Operation::new("ET", vec![]));
}

fn build_document(pages: Vec<Vec<Operation>>) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let helvetica = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let helvetica_bold = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica-Bold".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([
            ("F1", Object::Reference(helvetica)),
            ("F2", Object::Reference(helvetica_bold)),
        ])),
    )]));

    let mut kids = Vec::new();
    for operations in pages {
        let content = Content { operations };
        let encoded = content.encode().context("failed to encode TOC content")?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), encoded));
        let page_id = doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            (
                "MediaBox",
                Object::Array(vec![
                    0.into(),
                    0.into(),
                    Object::Real(A4_WIDTH),
                    Object::Real(A4_HEIGHT),
                ]),
            ),
        ]));
        kids.push(Object::Reference(page_id));
    }

    let count = kids.len() as i64;
    let pages_dict = Dictionary::from_iter([
        ("Type", Object::Name(b"Pages".to_vec())),
        ("Count", Object::Integer(count)),
        ("Kids", Object::Array(kids)),
    ]);
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    Ok(doc)
}
