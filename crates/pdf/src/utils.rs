//! Page boxes, object helpers and coordinate conversion.

use blackline_core::Rect;
use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::{PdfError, Result};

/// Affine matrix `[a b c d e f]` as used by `cm` and `Tm`.
pub type Matrix = [f32; 6];

pub const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `m` applied after `base`, i.e. `m × base`.
pub fn concat(m: &Matrix, base: &Matrix) -> Matrix {
    [
        m[0] * base[0] + m[1] * base[2],
        m[0] * base[1] + m[1] * base[3],
        m[2] * base[0] + m[3] * base[2],
        m[2] * base[1] + m[3] * base[3],
        m[4] * base[0] + m[5] * base[2] + base[4],
        m[4] * base[1] + m[5] * base[3] + base[5],
    ]
}

pub fn transform_point(m: &Matrix, x: f32, y: f32) -> (f32, f32) {
    (m[0] * x + m[2] * y + m[4], m[1] * x + m[3] * y + m[5])
}

/// Rectangle in PDF user space, bottom-left origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaskRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl MaskRect {
    /// Whether a glyph starting at `text_x` on baseline `text_y` falls under
    /// the mask. The glyph's horizontal centre must lie inside the mask, so
    /// neighbouring glyphs are left alone; vertically the glyph box only has
    /// to overlap.
    pub fn covers_glyph(&self, text_x: f32, text_y: f32, width: f32, height: f32) -> bool {
        const MARGIN: f32 = 1.0;
        let center = text_x + width / 2.0;
        let horizontal = center >= self.x && center <= self.x + self.width;
        // Glyphs sit on the baseline with a small descent below it.
        let glyph_bottom = text_y - height * 0.25;
        let glyph_top = text_y + height * 0.75;
        let vertical = glyph_bottom < self.y + self.height + MARGIN && glyph_top > self.y - MARGIN;
        horizontal && vertical
    }
}

/// Visible page box in user space: CropBox, else MediaBox, inherited from the
/// page tree when the page has none.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f32,
    pub lly: f32,
    pub urx: f32,
    pub ury: f32,
}

impl PageBox {
    pub const LETTER: PageBox = PageBox {
        llx: 0.0,
        lly: 0.0,
        urx: 612.0,
        ury: 792.0,
    };

    pub fn width(&self) -> f32 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f32 {
        self.ury - self.lly
    }

    /// Page bounds in top-left page space.
    pub fn bounds(&self) -> Rect {
        Rect::new(0.0, 0.0, self.width(), self.height())
    }

    /// User-space corners (bottom-left origin) to top-left page space.
    pub fn to_page(&self, left: f32, bottom: f32, right: f32, top: f32) -> Rect {
        Rect::new(
            left - self.llx,
            self.ury - top,
            right - self.llx,
            self.ury - bottom,
        )
    }

    /// Top-left page space to a user-space mask.
    pub fn to_user(&self, rect: &Rect) -> MaskRect {
        MaskRect {
            x: self.llx + rect.x0,
            y: self.ury - rect.y1,
            width: rect.width(),
            height: rect.height(),
        }
    }
}

/// Reads a box array such as `[0 0 612 792]`.
fn extract_box_values(arr: &[Object]) -> Option<PageBox> {
    let values: Vec<f32> = arr.iter().filter_map(get_number).collect();
    if values.len() == 4 {
        Some(PageBox {
            llx: values[0].min(values[2]),
            lly: values[1].min(values[3]),
            urx: values[0].max(values[2]),
            ury: values[1].max(values[3]),
        })
    } else {
        None
    }
}

pub fn get_page_box(doc: &Document, page_id: ObjectId) -> PageBox {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let Ok(dict) = doc.get_dictionary(id) else {
            break;
        };
        for key in [b"CropBox".as_slice(), b"MediaBox".as_slice()] {
            if let Some(page_box) = dict
                .get(key)
                .ok()
                .and_then(|o| resolve(doc, o).as_array().ok())
                .and_then(|arr| extract_box_values(arr))
            {
                return page_box;
            }
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 32 {
            break;
        }
    }

    log::warn!("[PageBox] no usable box on page {:?}, assuming Letter", page_id);
    PageBox::LETTER
}

pub fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Six numeric operands as a matrix.
pub fn get_matrix(operands: &[Object]) -> Option<Matrix> {
    if operands.len() < 6 {
        return None;
    }
    let mut m = [0.0; 6];
    for (slot, obj) in m.iter_mut().zip(operands) {
        *slot = get_number(obj)?;
    }
    Some(m)
}

/// Follows a reference; anything else is returned as is.
pub fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

pub fn get_page_id(doc: &Document, page: usize) -> Result<ObjectId> {
    doc.page_iter().nth(page).ok_or(PdfError::PageNotFound(page))
}

/// The page's Resources dictionary, inherited from the page tree if needed.
pub fn get_page_resources(doc: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut current = Some(page_id);
    let mut depth = 0;

    while let Some(id) = current {
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(resources) = dict.get(b"Resources") {
            return resolve(doc, resources).as_dict().ok();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > 32 {
            break;
        }
    }
    None
}

fn get_stream_content(stream: &lopdf::Stream) -> Vec<u8> {
    stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// The page's content streams, decoded and concatenated.
pub fn get_page_content(doc: &Document, page_id: ObjectId) -> Result<Vec<u8>> {
    let page = doc.get_dictionary(page_id)?;
    let contents = match page.get(b"Contents") {
        Ok(obj) => obj,
        Err(_) => return Ok(Vec::new()),
    };

    match resolve(doc, contents) {
        Object::Stream(stream) => Ok(get_stream_content(stream)),
        Object::Array(parts) => {
            let mut data = Vec::new();
            for part in parts {
                if let Object::Stream(stream) = resolve(doc, part) {
                    if !data.is_empty() {
                        data.push(b'\n');
                    }
                    data.extend(get_stream_content(stream));
                }
            }
            Ok(data)
        }
        other => Err(PdfError::Content(format!(
            "unsupported Contents object: {:?}",
            other
        ))),
    }
}
