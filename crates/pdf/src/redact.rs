//! Applying redaction annotations to a page with lopdf.
//!
//! A commit rewrites the page in three steps: glyphs under any annotation are
//! removed from the content stream, the annotations are painted as opaque
//! rectangles, and pixels of intersecting image placements are overwritten.
//! The replaced content streams are pruned so the removed text does not
//! survive as an unreferenced object.

use std::collections::BTreeMap;

use blackline_core::{PageImage, RedactionAnnotation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::font::load_fonts;
use crate::image::{dimension, find_placements, list_page_images, redact_image_object};
use crate::text::{add_overlay, process_content_stream};
use crate::utils::{get_page_box, get_page_content, get_page_id, get_page_resources};
use crate::Result;

/// What a commit changed on one page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub annotations: usize,
    pub glyphs_removed: usize,
    pub images_rewritten: usize,
}

pub fn apply_annotations(
    doc: &mut Document,
    page: usize,
    annotations: &[RedactionAnnotation],
) -> Result<CommitStats> {
    if annotations.is_empty() {
        return Ok(CommitStats::default());
    }

    let page_id = get_page_id(doc, page)?;
    let page_box = get_page_box(doc, page_id);
    let masks: Vec<_> = annotations
        .iter()
        .map(|a| (page_box.to_user(&a.rect), a.fill))
        .collect();

    let original = get_page_content(doc, page_id)?;
    let rects: Vec<_> = masks.iter().map(|(m, _)| *m).collect();
    let fonts = load_fonts(doc, get_page_resources(doc, page_id));
    let (stripped, glyphs_removed) = process_content_stream(&original, &rects, &fonts)?;
    let content = add_overlay(&stripped, &masks)?;

    let images_rewritten = redact_placed_images(doc, page_id, &original, annotations)?;

    let mut stream = Stream::new(Dictionary::new(), content);
    stream.compress().ok();
    let content_id = doc.add_object(stream);
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Reference(content_id));

    let pruned = doc.prune_objects();
    log::debug!("[Commit] pruned {} unreferenced object(s)", pruned.len());

    Ok(CommitStats {
        annotations: annotations.len(),
        glyphs_removed,
        images_rewritten,
    })
}

/// Overwrites the pixels of every image placement an annotation intersects.
/// Images that cannot be decoded stay as they are; the overlay still covers
/// them on the rendered page.
fn redact_placed_images(
    doc: &mut Document,
    page_id: ObjectId,
    content: &[u8],
    annotations: &[RedactionAnnotation],
) -> Result<usize> {
    let page_box = get_page_box(doc, page_id);
    let images = list_page_images(doc, get_page_resources(doc, page_id));
    if images.is_empty() {
        return Ok(0);
    }

    let mut regions: BTreeMap<ObjectId, Vec<(u32, u32, u32, u32)>> = BTreeMap::new();
    for placement in find_placements(content, &images)? {
        let rect = placement.rect(&page_box);
        let Ok(stream) = doc.get_object(placement.object).and_then(Object::as_stream) else {
            continue;
        };
        let width = dimension(&stream.dict, b"Width");
        let height = dimension(&stream.dict, b"Height");
        let (Ok(width), Ok(height)) = (width, height) else {
            continue;
        };

        for annotation in annotations.iter().filter(|a| a.rect.intersects(&rect)) {
            let region = placement.pixel_region(&annotation.rect, &page_box, width, height);
            if let Some(region) = region {
                regions.entry(placement.object).or_default().push(region);
            }
        }
    }

    let fill = annotations[0].fill;
    let mut rewritten = 0;
    for (id, pixel_regions) in regions {
        match redact_image_object(doc, id, &pixel_regions, fill) {
            Ok(()) => rewritten += 1,
            Err(e) => log::warn!("[Commit] image {:?} left unchanged: {}", id, e),
        }
    }
    Ok(rewritten)
}

/// Images referenced by the page, one entry per placement. Images in the
/// resources that the content stream never draws are listed unplaced.
pub fn page_images(doc: &Document, page: usize) -> Result<Vec<PageImage>> {
    let page_id = get_page_id(doc, page)?;
    let page_box = get_page_box(doc, page_id);
    let images = list_page_images(doc, get_page_resources(doc, page_id));
    if images.is_empty() {
        return Ok(Vec::new());
    }

    let content = get_page_content(doc, page_id)?;
    let placements = find_placements(&content, &images)?;

    let mut result: Vec<PageImage> = placements
        .iter()
        .map(|p| PageImage {
            resource: p.object.0,
            name: p.name.clone(),
            placement: Some(p.rect(&page_box)),
        })
        .collect();

    for (name, id) in &images {
        if !placements.iter().any(|p| p.object == *id) {
            result.push(PageImage {
                resource: id.0,
                name: name.clone(),
                placement: None,
            });
        }
    }

    Ok(result)
}

pub fn serialize(doc: &mut Document) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}
