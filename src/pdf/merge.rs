//! Page concatenation and page-offset tracking.
//!
//! Documents are appended strictly one at a time; the offset of each file is
//! recorded as the page count accumulated before it. Everything downstream
//! (outline targets, TOC page numbers, link destinations) is computed from
//! these offsets, so append order and offset order must never diverge.

use anyhow::{Context, Result};
use lopdf::{Dictionary, Document, Object, ObjectId};

/// Zero-based starting page per input file, in insertion order.
///
/// A filename listed twice keeps the offset of its last insertion, matching
/// how duplicate manifest entries behave everywhere else in the pipeline.
#[derive(Debug, Default)]
pub struct PageOffsets {
    entries: Vec<(String, usize)>,
}

impl PageOffsets {
    pub fn insert(&mut self, name: &str, offset: usize) {
        self.entries.push((name.to_string(), offset));
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .rev()
            .find(|(n, _)| n == name)
            .map(|(_, o)| *o)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.entries.iter().map(|(n, o)| (n.as_str(), *o))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Builds one output document out of appended inputs.
///
/// Source objects are renumbered past the current maximum and copied over;
/// each source's catalog, page tree, and outline objects are discarded and a
/// fresh page tree and catalog are written by [`DocumentBuilder::finish`].
/// Discarding outlines is also what strips any bookmarks an input (cover
/// files in particular) carries.
pub struct DocumentBuilder {
    doc: Document,
    page_ids: Vec<ObjectId>,
    offsets: PageOffsets,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        DocumentBuilder {
            doc: Document::with_version("1.5"),
            page_ids: Vec::new(),
            offsets: PageOffsets::default(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append all pages of `source`, recording `name`'s starting offset.
    pub fn append(&mut self, name: &str, mut source: Document) -> Result<()> {
        source.renumber_objects_with(self.doc.max_id + 1);
        self.doc.max_id = source.max_id;

        self.offsets.insert(name, self.page_ids.len());

        let mut pages: Vec<_> = source.get_pages().into_iter().collect();
        pages.sort_by_key(|(num, _)| *num);
        self.page_ids.extend(pages.into_iter().map(|(_, id)| id));

        for (id, object) in source.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Outlines" | b"Outline" => {}
                _ => {
                    self.doc.objects.insert(id, object);
                }
            }
        }

        Ok(())
    }

    /// Write the page tree and catalog and hand back the assembled document.
    pub fn finish(mut self) -> Result<(Document, PageOffsets)> {
        let pages_id = self.doc.new_object_id();

        for &page_id in &self.page_ids {
            let page = self
                .doc
                .objects
                .get_mut(&page_id)
                .context("appended page object missing")?;
            if let Object::Dictionary(dict) = page {
                dict.set("Parent", Object::Reference(pages_id));
            }
        }

        let kids: Vec<Object> = self
            .page_ids
            .iter()
            .map(|&id| Object::Reference(id))
            .collect();
        let pages_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(self.page_ids.len() as i64)),
            ("Kids", Object::Array(kids)),
        ]);
        self.doc
            .objects
            .insert(pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.doc.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc
            .trailer
            .set("Size", Object::Integer(self.doc.max_id as i64 + 1));

        Ok((self.doc, self.offsets))
    }
}

/// The first `count` pages of `doc` as their own document.
pub fn front_pages(doc: &Document, count: usize) -> Document {
    let total = doc.get_pages().len();
    let delete: Vec<u32> = ((count as u32 + 1)..=(total as u32)).collect();
    let mut front = doc.clone();
    if !delete.is_empty() {
        front.delete_pages(&delete);
    }
    front
}

/// `doc` with its first `count` pages removed.
pub fn skip_pages(doc: &Document, count: usize) -> Document {
    let delete: Vec<u32> = (1..=(count as u32)).collect();
    let mut rest = doc.clone();
    if !delete.is_empty() {
        rest.delete_pages(&delete);
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_pdf::make_pdf;

    #[test]
    fn test_offsets_scenario() {
        let mut builder = DocumentBuilder::new();
        builder.append("intro.pdf", make_pdf(2)).unwrap();
        builder.append("appendix1.pdf", make_pdf(3)).unwrap();
        builder.append("appendix2.pdf", make_pdf(1)).unwrap();

        let (doc, offsets) = builder.finish().unwrap();
        assert_eq!(doc.get_pages().len(), 6);
        assert_eq!(offsets.get("intro.pdf"), Some(0));
        assert_eq!(offsets.get("appendix1.pdf"), Some(2));
        assert_eq!(offsets.get("appendix2.pdf"), Some(5));
    }

    #[test]
    fn test_offsets_strictly_increasing() {
        let mut builder = DocumentBuilder::new();
        for name in ["a.pdf", "b.pdf", "c.pdf"] {
            builder.append(name, make_pdf(2)).unwrap();
        }
        let (_, offsets) = builder.finish().unwrap();

        let values: Vec<usize> = offsets.iter().map(|(_, o)| o).collect();
        assert_eq!(values, vec![0, 2, 4]);
        assert!(values.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_duplicate_name_keeps_last_offset() {
        let mut builder = DocumentBuilder::new();
        builder.append("a.pdf", make_pdf(1)).unwrap();
        builder.append("a.pdf", make_pdf(1)).unwrap();
        let (_, offsets) = builder.finish().unwrap();

        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets.get("a.pdf"), Some(1));
    }

    #[test]
    fn test_merged_document_round_trips() {
        let mut builder = DocumentBuilder::new();
        builder.append("a.pdf", make_pdf(2)).unwrap();
        builder.append("b.pdf", make_pdf(1)).unwrap();
        let (mut doc, _) = builder.finish().unwrap();

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        let reloaded = Document::load_mem(&bytes).unwrap();
        assert_eq!(reloaded.get_pages().len(), 3);
    }

    #[test]
    fn test_source_outline_is_dropped() {
        let mut source = make_pdf(1);
        // Give the source a bookmark; the merge must not carry it over.
        let page_id = *source.get_pages().values().next().unwrap();
        let item_id = source.add_object(Dictionary::from_iter([
            ("Title", Object::string_literal("stale")),
            (
                "Dest",
                Object::Array(vec![
                    Object::Reference(page_id),
                    Object::Name(b"Fit".to_vec()),
                ]),
            ),
        ]));
        let outlines_id = source.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Outlines".to_vec())),
            ("First", Object::Reference(item_id)),
            ("Last", Object::Reference(item_id)),
            ("Count", Object::Integer(1)),
        ]));
        let root = source.trailer.get(b"Root").unwrap().as_reference().unwrap();
        if let Ok(Object::Dictionary(catalog)) = source.get_object_mut(root) {
            catalog.set("Outlines", Object::Reference(outlines_id));
        }

        let mut builder = DocumentBuilder::new();
        builder.append("cover.pdf", source).unwrap();
        let (doc, _) = builder.finish().unwrap();

        let catalog = doc.catalog().unwrap();
        assert!(catalog.get(b"Outlines").is_err());
    }

    #[test]
    fn test_front_and_skip_pages() {
        let doc = make_pdf(5);
        assert_eq!(front_pages(&doc, 2).get_pages().len(), 2);
        assert_eq!(skip_pages(&doc, 2).get_pages().len(), 3);
        assert_eq!(skip_pages(&doc, 0).get_pages().len(), 5);
    }
}
