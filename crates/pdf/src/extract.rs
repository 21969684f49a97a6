//! Page text extraction: the embedded text layer through pdfium, or OCR over
//! a rendering of the page.

use blackline_core::{PageExtraction, RawSpan, Rect, Word};
use blackline_ocr::{group_lines, OcrEngine, OcrWord};
use image::DynamicImage;
use pdfium_render::prelude::*;

use crate::utils::PageBox;
use crate::{PdfError, Result};

/// Groups positioned characters into words. Whitespace ends a word, and so
/// does a jump to another line or backwards along the line.
pub fn group_chars(chars: &[(char, Rect)]) -> Vec<Word> {
    let mut words: Vec<Word> = Vec::new();
    let mut current: Option<Word> = None;

    for &(ch, bbox) in chars {
        if ch.is_whitespace() || ch.is_control() {
            words.extend(current.take());
            continue;
        }

        if let Some(word) = current.as_ref() {
            let (_, cy) = bbox.center();
            let (_, wy) = word.bbox.center();
            let line_height = word.bbox.height().max(bbox.height());
            let new_line = (cy - wy).abs() > line_height / 2.0;
            let backwards = bbox.x1 < word.bbox.x0;
            if new_line || backwards {
                words.extend(current.take());
            }
        }

        match current.as_mut() {
            Some(word) => {
                word.text.push(ch);
                word.bbox = word.bbox.union(&bbox);
            }
            None => {
                current = Some(Word {
                    text: ch.to_string(),
                    bbox,
                });
            }
        }
    }

    words.extend(current);
    words
}

fn to_page_rect(bounds: &PdfRect, page_box: &PageBox) -> Rect {
    page_box.to_page(
        bounds.left().value,
        bounds.bottom().value,
        bounds.right().value,
        bounds.top().value,
    )
}

/// Reads the embedded text layer. Returns the plain page text and the
/// positioned extraction (segments as spans, characters grouped into words).
pub fn extract_text_layer(page: &PdfPage, page_box: &PageBox) -> Result<(String, PageExtraction)> {
    let text = page.text().map_err(|e| PdfError::Pdfium(e.to_string()))?;

    let spans = text
        .segments()
        .iter()
        .map(|segment| RawSpan {
            text: segment.text(),
            bbox: to_page_rect(&segment.bounds(), page_box),
        })
        .collect();

    let chars: Vec<(char, Rect)> = text
        .chars()
        .iter()
        .filter_map(|ch| {
            let c = ch.unicode_char()?;
            let bounds = ch.loose_bounds().ok()?;
            Some((c, to_page_rect(&bounds, page_box)))
        })
        .collect();

    Ok((
        text.all(),
        PageExtraction {
            spans,
            words: group_chars(&chars),
        },
    ))
}

/// How needles are matched against the text layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SearchFlags {
    match_case: bool,
    match_whole_word: bool,
}

/// Needles are verbatim strings from the document, so case must match.
const EXACT_SEARCH: SearchFlags = SearchFlags {
    match_case: true,
    match_whole_word: false,
};

impl SearchFlags {
    fn options(self) -> PdfSearchOptions {
        PdfSearchOptions::new()
            .match_case(self.match_case)
            .match_whole_word(self.match_whole_word)
    }
}

fn search_options() -> PdfSearchOptions {
    EXACT_SEARCH.options()
}

/// Case-sensitive search for every needle; all occurrence rectangles per
/// needle.
pub fn search_text_layer(
    page: &PdfPage,
    page_box: &PageBox,
    needles: &[String],
) -> Result<Vec<Vec<Rect>>> {
    let text = page.text().map_err(|e| PdfError::Pdfium(e.to_string()))?;
    let options = search_options();
    let mut results = Vec::with_capacity(needles.len());

    for needle in needles {
        let mut rects = Vec::new();
        match text.search(needle, &options) {
            Ok(search) => {
                for segments in search.iter(PdfSearchDirection::SearchForward) {
                    for segment in segments.iter() {
                        rects.push(to_page_rect(&segment.bounds(), page_box));
                    }
                }
            }
            Err(e) => log::warn!("[Search] {:?} failed: {}", needle, e),
        }
        results.push(rects);
    }

    Ok(results)
}

/// Renders the page at `dpi` for OCR.
pub fn render_page(page: &PdfPage, page_box: &PageBox, dpi: u32) -> Result<DynamicImage> {
    let scale = dpi as f32 / 72.0;
    let target_width = (page_box.width() * scale).round().max(1.0) as i32;
    let target_height = (page_box.height() * scale).round().max(1.0) as i32;

    log::debug!(
        "[Render] {}x{} pt -> {}x{} px ({} dpi)",
        page_box.width(),
        page_box.height(),
        target_width,
        target_height,
        dpi
    );

    let config = PdfRenderConfig::new()
        .set_target_width(target_width)
        .set_target_height(target_height);

    let bitmap = page
        .render_with_config(&config)
        .map_err(|e| PdfError::Pdfium(format!("render failed: {}", e)))?;
    Ok(bitmap.as_image())
}

/// Converts OCR words (normalized to the rendered page) into page space.
/// Lines become spans and are joined by newlines into the page text.
pub fn ocr_extraction(words: &[OcrWord], bounds: &Rect) -> (String, PageExtraction) {
    let scale = |b: &blackline_ocr::BBox| {
        Rect::from_xywh(
            bounds.x0 + b.x * bounds.width(),
            bounds.y0 + b.y * bounds.height(),
            b.w * bounds.width(),
            b.h * bounds.height(),
        )
    };

    let lines = group_lines(words);
    let text = lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    let extraction = PageExtraction {
        spans: lines
            .iter()
            .map(|line| RawSpan {
                text: line.text.clone(),
                bbox: scale(&line.bbox),
            })
            .collect(),
        words: words
            .iter()
            .map(|w| Word {
                text: w.text.clone(),
                bbox: scale(&w.bbox),
            })
            .collect(),
    };

    (text, extraction)
}

/// Renders and recognises a page.
pub fn extract_ocr(
    page: &PdfPage,
    page_box: &PageBox,
    dpi: u32,
    engine: &mut dyn OcrEngine,
) -> Result<(String, PageExtraction)> {
    let image = render_page(page, page_box, dpi)?;
    let words = engine.recognize_image(&image)?;
    Ok(ocr_extraction(&words, &page_box.bounds()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdfium::bind_pdfium;
    use blackline_ocr::BBox;
    use lopdf::{dictionary, Document, Object, Stream};

    fn glyphs(text: &str, x: f32, y: f32) -> Vec<(char, Rect)> {
        text.chars()
            .enumerate()
            .map(|(i, c)| (c, Rect::from_xywh(x + i as f32 * 6.0, y, 6.0, 12.0)))
            .collect()
    }

    #[test]
    fn test_group_chars_splits_on_whitespace() {
        let words = group_chars(&glyphs("John Doe", 100.0, 80.0));
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();

        assert_eq!(texts, vec!["John", "Doe"]);
        assert_eq!(words[0].bbox, Rect::new(100.0, 80.0, 124.0, 92.0));
        assert_eq!(words[1].bbox, Rect::new(130.0, 80.0, 148.0, 92.0));
    }

    #[test]
    fn test_group_chars_splits_on_line_change() {
        let mut chars = glyphs("Call", 100.0, 80.0);
        chars.extend(glyphs("me", 100.0, 100.0));
        let words = group_chars(&chars);
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();

        assert_eq!(texts, vec!["Call", "me"]);
    }

    #[test]
    fn test_ocr_words_scaled_to_page() {
        let word = |text: &str, x: f32, line: u32| OcrWord {
            text: text.to_string(),
            confidence: 0.9,
            bbox: BBox {
                x,
                y: 0.1 * line as f32,
                w: 0.1,
                h: 0.02,
            },
            block: 1,
            par: 1,
            line,
        };
        let words = vec![word("John", 0.1, 1), word("Doe", 0.25, 1), word("Acme", 0.1, 2)];
        let bounds = Rect::new(0.0, 0.0, 600.0, 800.0);

        let (text, extraction) = ocr_extraction(&words, &bounds);

        assert_eq!(text, "John Doe\nAcme");
        assert_eq!(extraction.spans.len(), 2);
        assert_eq!(extraction.spans[0].text, "John Doe");
        let john = &extraction.words[0].bbox;
        assert!((john.x0 - 60.0).abs() < 0.01);
        assert!((john.y0 - 80.0).abs() < 0.01);
        assert!((john.width() - 60.0).abs() < 0.01);
        assert!((john.height() - 16.0).abs() < 0.01);
    }

    #[test]
    fn test_search_is_case_sensitive() {
        assert!(EXACT_SEARCH.match_case);
        assert!(!EXACT_SEARCH.match_whole_word);
    }

    /// One Letter page showing "ACCOUNT HOLDER: JOHN DOE" in Helvetica.
    fn text_pdf() -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = b"BT /F1 12 Tf 100 700 Td (ACCOUNT HOLDER: JOHN DOE) Tj ET";
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(612),
                Object::Integer(792),
            ],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(page_id)],
                "Count" => Object::Integer(1),
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();
        bytes
    }

    #[test]
    fn test_search_text_layer_does_not_match_other_case() {
        // Needs a pdfium library on the search path.
        let Ok(pdfium) = bind_pdfium(None) else {
            return;
        };
        let document = pdfium.load_pdf_from_byte_vec(text_pdf(), None).unwrap();
        let page = document.pages().get(0).unwrap();
        let needles = vec!["JOHN DOE".to_string(), "john doe".to_string()];

        let hits = search_text_layer(&page, &PageBox::LETTER, &needles).unwrap();

        assert!(!hits[0].is_empty());
        assert!(hits[1].is_empty());
    }
}
