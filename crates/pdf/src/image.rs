//! Raster image XObjects: enumeration, placement, decoding and pixel
//! redaction.

use std::io::{Cursor, Read};

use blackline_core::{Fill, Rect};
use flate2::read::ZlibDecoder;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use imageproc::drawing::draw_filled_rect_mut;
use lopdf::{content::Content, Dictionary, Document, Object, ObjectId, Stream};

use crate::utils::{concat, get_matrix, resolve, transform_point, Matrix, PageBox, IDENTITY};
use crate::{PdfError, Result};

/// An image XObject drawn by a page's content stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub name: String,
    pub object: ObjectId,
    /// Image space (unit square) to user space.
    pub matrix: Matrix,
}

impl Placement {
    /// Bounding box of the placement in top-left page space.
    pub fn rect(&self, page_box: &PageBox) -> Rect {
        let corners = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)]
            .map(|(u, v)| transform_point(&self.matrix, u, v));
        let left = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min);
        let right = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max);
        let bottom = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min);
        let top = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max);
        page_box.to_page(left, bottom, right, top)
    }

    /// Maps a page-space region to pixel bounds `(x, y, w, h)` of an image of
    /// the given size. `None` if the region misses the image.
    pub fn pixel_region(
        &self,
        region: &Rect,
        page_box: &PageBox,
        width: u32,
        height: u32,
    ) -> Option<(u32, u32, u32, u32)> {
        let inverse = invert(&self.matrix)?;
        let user = page_box.to_user(region);
        let corners = [
            (user.x, user.y),
            (user.x + user.width, user.y),
            (user.x, user.y + user.height),
            (user.x + user.width, user.y + user.height),
        ]
        .map(|(x, y)| transform_point(&inverse, x, y));

        // Image rows run top to bottom while v grows upwards.
        let u0 = corners.iter().map(|c| c.0).fold(f32::INFINITY, f32::min).max(0.0);
        let u1 = corners.iter().map(|c| c.0).fold(f32::NEG_INFINITY, f32::max).min(1.0);
        let v0 = corners.iter().map(|c| c.1).fold(f32::INFINITY, f32::min).max(0.0);
        let v1 = corners.iter().map(|c| c.1).fold(f32::NEG_INFINITY, f32::max).min(1.0);
        if u0 >= u1 || v0 >= v1 {
            return None;
        }

        let x0 = snap(u0 * width as f32).floor() as u32;
        let x1 = (snap(u1 * width as f32).ceil() as u32).min(width);
        let y0 = snap((1.0 - v1) * height as f32).floor() as u32;
        let y1 = (snap((1.0 - v0) * height as f32).ceil() as u32).min(height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

/// Rounds values within float noise of a pixel edge.
fn snap(v: f32) -> f32 {
    let r = v.round();
    if (v - r).abs() < 0.01 {
        r
    } else {
        v
    }
}

fn invert(m: &Matrix) -> Option<Matrix> {
    let det = m[0] * m[3] - m[1] * m[2];
    if det.abs() < f32::EPSILON {
        return None;
    }
    let a = m[3] / det;
    let b = -m[1] / det;
    let c = -m[2] / det;
    let d = m[0] / det;
    Some([a, b, c, d, -(m[4] * a + m[5] * c), -(m[4] * b + m[5] * d)])
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

/// Image XObjects in the page's resources, by resource name, in resource
/// dictionary order.
pub fn list_page_images(doc: &Document, resources: Option<&Dictionary>) -> Vec<(String, ObjectId)> {
    let Some(xobjects) = resources
        .and_then(|r| r.get(b"XObject").ok())
        .and_then(|o| resolve(doc, o).as_dict().ok())
    else {
        return Vec::new();
    };

    xobjects
        .iter()
        .filter_map(|(name, obj)| {
            let id = obj.as_reference().ok()?;
            match doc.get_object(id) {
                Ok(Object::Stream(stream)) if is_image(stream) => {
                    Some((String::from_utf8_lossy(name).into_owned(), id))
                }
                _ => None,
            }
        })
        .collect()
}

/// Every `Do` of a listed image in the content stream, with the CTM in force.
pub fn find_placements(
    content_data: &[u8],
    images: &[(String, ObjectId)],
) -> Result<Vec<Placement>> {
    let content = Content::decode(content_data)?;
    let mut ctm = IDENTITY;
    let mut stack: Vec<Matrix> = Vec::new();
    let mut placements = Vec::new();

    for op in &content.operations {
        match op.operator.as_str() {
            "q" => stack.push(ctm),
            "Q" => {
                if let Some(saved) = stack.pop() {
                    ctm = saved;
                }
            }
            "cm" => {
                if let Some(m) = get_matrix(&op.operands) {
                    ctm = concat(&m, &ctm);
                }
            }
            "Do" => {
                let Some(Ok(name)) = op.operands.first().map(Object::as_name) else {
                    continue;
                };
                let name = String::from_utf8_lossy(name);
                if let Some((_, object)) = images.iter().find(|(n, _)| *n == name) {
                    placements.push(Placement {
                        name: name.into_owned(),
                        object: *object,
                        matrix: ctm,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(placements)
}

/// Number of colour components for raw 8-bit samples, when supported.
fn components(doc: &Document, dict: &Dictionary) -> Option<usize> {
    let color_space = resolve(doc, dict.get(b"ColorSpace").ok()?);
    match color_space {
        Object::Name(n) if n == b"DeviceRGB" => Some(3),
        Object::Name(n) if n == b"DeviceGray" => Some(1),
        Object::Array(arr) => {
            let family = arr.first().and_then(|o| o.as_name().ok())?;
            if family != b"ICCBased" {
                return None;
            }
            let profile = resolve(doc, arr.get(1)?).as_stream().ok()?;
            match profile.dict.get(b"N") {
                Ok(Object::Integer(3)) => Some(3),
                Ok(Object::Integer(1)) => Some(1),
                _ => None,
            }
        }
        _ => None,
    }
}

pub(crate) fn dimension(dict: &Dictionary, key: &[u8]) -> Result<u32> {
    match dict.get(key) {
        Ok(Object::Integer(v)) if *v > 0 => Ok(*v as u32),
        _ => Err(PdfError::Image(format!(
            "missing {}",
            String::from_utf8_lossy(key)
        ))),
    }
}

fn is_jpeg(stream: &Stream) -> bool {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == b"DCTDecode",
        Ok(Object::Array(filters)) => {
            filters.len() == 1 && matches!(&filters[0], Object::Name(n) if n == b"DCTDecode")
        }
        _ => false,
    }
}

/// Filter names of a stream, in the order they were applied.
fn filters(stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_name().ok().map(<[u8]>::to_vec))
            .collect(),
        _ => Vec::new(),
    }
}

/// `DecodeParms` of the filter at `index`.
fn decode_parms<'a>(doc: &'a Document, stream: &'a Stream, index: usize) -> Option<&'a Dictionary> {
    match resolve(doc, stream.dict.get(b"DecodeParms").ok()?) {
        Object::Dictionary(parms) if index == 0 => Some(parms),
        Object::Array(parms) => resolve(doc, parms.get(index)?).as_dict().ok(),
        _ => None,
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    if let Err(e) = ZlibDecoder::new(data).read_to_end(&mut out) {
        // Truncated streams are common; keep what inflated cleanly.
        if out.is_empty() {
            return Err(PdfError::Image(format!("FlateDecode failed: {}", e)));
        }
        log::warn!("[Images] FlateDecode stopped early after {} bytes: {}", out.len(), e);
    }
    Ok(out)
}

fn parm(doc: &Document, parms: &Dictionary, key: &[u8], default: usize) -> usize {
    match parms.get(key).map(|o| resolve(doc, o)) {
        Ok(Object::Integer(v)) if *v > 0 => *v as usize,
        _ => default,
    }
}

/// Undoes the TIFF (2) or PNG (10..=15) predictor named in `parms`.
fn unpredict(doc: &Document, data: Vec<u8>, parms: &Dictionary) -> Result<Vec<u8>> {
    let predictor = parm(doc, parms, b"Predictor", 1);
    let colors = parm(doc, parms, b"Colors", 1);
    let bits = parm(doc, parms, b"BitsPerComponent", 8);
    let columns = parm(doc, parms, b"Columns", 1);
    let row_len = (colors * bits * columns).div_ceil(8);
    let bpp = (colors * bits / 8).max(1);

    match predictor {
        1 => Ok(data),
        2 if bits == 8 => {
            let mut data = data;
            for row in data.chunks_mut(row_len) {
                for i in colors..row.len() {
                    row[i] = row[i].wrapping_add(row[i - colors]);
                }
            }
            Ok(data)
        }
        10..=15 => png_unpredict(&data, bpp, row_len),
        other => Err(PdfError::Image(format!(
            "unsupported predictor {} ({} bpc)",
            other, bits
        ))),
    }
}

/// Reverses PNG row filters. Each row starts with its filter type byte.
fn png_unpredict(data: &[u8], bpp: usize, row_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut prev = vec![0u8; row_len];

    for chunk in data.chunks_exact(row_len + 1) {
        let kind = chunk[0];
        let mut row = chunk[1..].to_vec();
        for i in 0..row_len {
            let left = if i >= bpp { row[i - bpp] } else { 0 };
            let up = prev[i];
            let upper_left = if i >= bpp { prev[i - bpp] } else { 0 };
            let base = match kind {
                0 => 0,
                1 => left,
                2 => up,
                3 => ((left as u16 + up as u16) / 2) as u8,
                4 => paeth(left, up, upper_left),
                other => {
                    return Err(PdfError::Image(format!("unknown PNG row filter {}", other)));
                }
            };
            row[i] = row[i].wrapping_add(base);
        }
        out.extend_from_slice(&row);
        prev = row;
    }
    Ok(out)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Stream data of a non-JPEG image with every filter undone. Only
/// FlateDecode (with predictors) is supported.
fn image_samples(doc: &Document, stream: &Stream) -> Result<Vec<u8>> {
    let mut data = stream.content.clone();
    for (index, filter) in filters(stream).iter().enumerate() {
        if filter.as_slice() != b"FlateDecode" {
            return Err(PdfError::Image(format!(
                "unsupported filter {}",
                String::from_utf8_lossy(filter)
            )));
        }
        data = inflate(&data)?;
        if let Some(parms) = decode_parms(doc, stream, index) {
            data = unpredict(doc, data, parms)?;
        }
    }
    Ok(data)
}

/// Decodes an image XObject: JPEG, 8-bit RGB or gray samples (raw or
/// FlateDecode), or anything else the `image` crate recognises.
pub fn decode_image(doc: &Document, stream: &Stream) -> Result<DynamicImage> {
    let width = dimension(&stream.dict, b"Width")?;
    let height = dimension(&stream.dict, b"Height")?;

    if is_jpeg(stream) {
        return image::load_from_memory(&stream.content)
            .map_err(|e| PdfError::Image(format!("JPEG decode failed: {}", e)));
    }

    let data = image_samples(doc, stream)?;
    let bits = match stream.dict.get(b"BitsPerComponent") {
        Ok(Object::Integer(b)) => *b,
        _ => 8,
    };
    let pixels = width as usize * height as usize;

    match (bits, components(doc, &stream.dict)) {
        (8, Some(3)) if data.len() >= pixels * 3 => {
            let mut img = RgbaImage::new(width, height);
            for (i, px) in data.chunks_exact(3).take(pixels).enumerate() {
                img.put_pixel(i as u32 % width, i as u32 / width, Rgba([px[0], px[1], px[2], 255]));
            }
            Ok(DynamicImage::ImageRgba8(img))
        }
        (8, Some(1)) if data.len() >= pixels => {
            let mut img = RgbaImage::new(width, height);
            for (i, &gray) in data.iter().take(pixels).enumerate() {
                img.put_pixel(i as u32 % width, i as u32 / width, Rgba([gray, gray, gray, 255]));
            }
            Ok(DynamicImage::ImageRgba8(img))
        }
        _ => image::load_from_memory(&data).map_err(|e| {
            PdfError::Image(format!(
                "unsupported image encoding ({} bpc): {}",
                bits, e
            ))
        }),
    }
}

pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageFormat::Png)
        .map_err(|e| PdfError::Image(format!("PNG encode failed: {}", e)))?;
    Ok(cursor.into_inner())
}

/// PNG encoding of the image object with the given object number.
pub fn image_png(doc: &Document, object_number: u32) -> Result<Vec<u8>> {
    let stream = doc
        .objects
        .iter()
        .find(|((number, _), _)| *number == object_number)
        .and_then(|(_, obj)| obj.as_stream().ok())
        .filter(|stream| is_image(stream))
        .ok_or_else(|| PdfError::Image(format!("no image object {}", object_number)))?;
    encode_png(&decode_image(doc, stream)?)
}

/// Overwrites pixel regions `(x, y, w, h)` of an image XObject with `fill`
/// and stores the re-encoded image in place. JPEG images stay JPEG; anything
/// else is written as Flate-compressed 8-bit RGB.
pub fn redact_image_object(
    doc: &mut Document,
    id: ObjectId,
    regions: &[(u32, u32, u32, u32)],
    fill: Fill,
) -> Result<()> {
    let stream = doc.get_object(id)?.as_stream()?.clone();
    let mut rgba = decode_image(doc, &stream)?.to_rgba8();

    let [r, g, b] = fill.to_rgb8();
    for &(x, y, w, h) in regions {
        draw_filled_rect_mut(
            &mut rgba,
            imageproc::rect::Rect::at(x as i32, y as i32).of_size(w.max(1), h.max(1)),
            Rgba([r, g, b, 255]),
        );
    }

    let rgb = DynamicImage::ImageRgba8(rgba).to_rgb8();
    let mut dict = stream.dict.clone();
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict.remove(b"Decode");
    dict.remove(b"DecodeParms");

    let new_stream = if is_jpeg(&stream) {
        let mut cursor = Cursor::new(Vec::new());
        rgb.write_to(&mut cursor, ImageFormat::Jpeg)
            .map_err(|e| PdfError::Image(format!("JPEG encode failed: {}", e)))?;
        let data = cursor.into_inner();
        dict.set("Length", Object::Integer(data.len() as i64));
        Stream::new(dict, data)
    } else {
        dict.remove(b"Filter");
        let data = rgb.into_raw();
        dict.set("Length", Object::Integer(data.len() as i64));
        let mut s = Stream::new(dict, data);
        s.compress().ok();
        s
    };

    doc.objects.insert(id, Object::Stream(new_stream));
    log::info!("[Images] blacked out {} region(s) in image {:?}", regions.len(), id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::{write::ZlibEncoder, Compression};
    use lopdf::dictionary;
    use std::io::Write;

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    /// A 16x16 DeviceRGB image stored FlateDecode with PNG `Up` rows. The
    /// left half is red, the right half blue.
    fn flate_rgb_image(doc: &mut Document) -> ObjectId {
        let mut rows = Vec::new();
        for y in 0..16 {
            // The first row is filtered with `Sub`, the rest with `Up`.
            rows.push(if y == 0 { 1u8 } else { 2u8 });
            for x in 0..16usize {
                let pixel: [u8; 3] = if x < 8 { [255, 0, 0] } else { [0, 0, 255] };
                let left: [u8; 3] = match x {
                    0 => [0, 0, 0],
                    8 => [255, 0, 0],
                    _ => pixel,
                };
                for c in 0..3 {
                    rows.push(if y == 0 { pixel[c].wrapping_sub(left[c]) } else { 0 });
                }
            }
        }
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(16),
                "Height" => Object::Integer(16),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "FlateDecode",
                "DecodeParms" => dictionary! {
                    "Predictor" => Object::Integer(15),
                    "Colors" => Object::Integer(3),
                    "Columns" => Object::Integer(16),
                },
            },
            zlib(&rows),
        ))
    }

    fn raw_rgb_image(doc: &mut Document, width: u32, height: u32, value: u8) -> ObjectId {
        let data = vec![value; (width * height * 3) as usize];
        doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => Object::Integer(width as i64),
                "Height" => Object::Integer(height as i64),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => Object::Integer(8),
            },
            data,
        ))
    }

    const LETTER: PageBox = PageBox::LETTER;

    #[test]
    fn test_placement_follows_cm() {
        let images = vec![("Im1".to_string(), (7, 0))];
        let stream = b"q 200 0 0 100 50 600 cm /Im1 Do Q /Im1 Do";
        let placements = find_placements(stream, &images).unwrap();

        assert_eq!(placements.len(), 2);
        assert_eq!(placements[0].rect(&LETTER), Rect::new(50.0, 92.0, 250.0, 192.0));
        // Outside q/Q the CTM is back to identity.
        assert_eq!(placements[1].rect(&LETTER), Rect::new(0.0, 791.0, 1.0, 792.0));
    }

    #[test]
    fn test_unknown_names_are_ignored() {
        let images = vec![("Im1".to_string(), (7, 0))];
        let placements = find_placements(b"q 10 0 0 10 0 0 cm /Fm1 Do Q", &images).unwrap();
        assert!(placements.is_empty());
    }

    #[test]
    fn test_pixel_region_maps_top_rows_to_top_of_page() {
        let placement = Placement {
            name: "Im1".to_string(),
            object: (7, 0),
            matrix: [200.0, 0.0, 0.0, 100.0, 50.0, 600.0],
        };
        // Top-left quarter of the placement in page space.
        let region = Rect::new(50.0, 92.0, 150.0, 142.0);
        assert_eq!(placement.pixel_region(&region, &LETTER, 400, 200), Some((0, 0, 200, 100)));

        let outside = Rect::new(300.0, 300.0, 310.0, 310.0);
        assert_eq!(placement.pixel_region(&outside, &LETTER, 400, 200), None);
    }

    #[test]
    fn test_list_and_decode_raw_rgb() {
        let mut doc = Document::with_version("1.5");
        let id = raw_rgb_image(&mut doc, 4, 2, 200);
        let resources = dictionary! {
            "XObject" => dictionary! { "Im1" => Object::Reference(id) },
        };

        let images = list_page_images(&doc, Some(&resources));
        assert_eq!(images, vec![("Im1".to_string(), id)]);

        let png = image_png(&doc, id.0).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [200, 200, 200]);
    }

    #[test]
    fn test_redact_image_object_overwrites_pixels() {
        let mut doc = Document::with_version("1.5");
        let id = raw_rgb_image(&mut doc, 4, 4, 255);

        redact_image_object(&mut doc, id, &[(0, 0, 2, 2)], Fill::BLACK).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let img = decode_image(&doc, stream).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(1, 1).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(3, 3).0, [255, 255, 255]);
    }

    #[test]
    fn test_invert_round_trip() {
        let m = [200.0, 0.0, 0.0, 100.0, 50.0, 600.0];
        let inv = invert(&m).unwrap();
        let (u, v) = transform_point(&inv, 150.0, 650.0);
        assert!((u - 0.5).abs() < 1e-5);
        assert!((v - 0.5).abs() < 1e-5);
        assert!(invert(&[0.0; 6]).is_none());
    }

    #[test]
    fn test_flate_image_with_png_predictor() {
        let mut doc = Document::with_version("1.5");
        let id = flate_rgb_image(&mut doc);

        let png = image_png(&doc, id.0).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(7, 15).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(8, 0).0, [0, 0, 255]);
        assert_eq!(decoded.get_pixel(15, 15).0, [0, 0, 255]);
    }

    #[test]
    fn test_redact_flate_image_object() {
        let mut doc = Document::with_version("1.5");
        let id = flate_rgb_image(&mut doc);

        redact_image_object(&mut doc, id, &[(4, 4, 8, 8)], Fill::BLACK).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"DecodeParms").is_err());
        let img = decode_image(&doc, stream).unwrap().to_rgb8();
        assert_eq!(img.get_pixel(4, 4).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(11, 11).0, [0, 0, 0]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(img.get_pixel(15, 15).0, [0, 0, 255]);
    }

    #[test]
    fn test_tiff_predictor_and_gray_flate() {
        let mut doc = Document::with_version("1.5");
        // Gray ramp 10, 20, 30, 40 stored as differences.
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => Object::Integer(4),
                "Height" => Object::Integer(1),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => vec![Object::Name(b"FlateDecode".to_vec())],
                "DecodeParms" => vec![Object::Dictionary(dictionary! {
                    "Predictor" => Object::Integer(2),
                    "Columns" => Object::Integer(4),
                })],
            },
            zlib(&[10, 10, 10, 10]),
        ));

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        let img = decode_image(&doc, stream).unwrap().to_rgb8();
        let ramp: Vec<u8> = img.pixels().map(|p| p.0[0]).collect();
        assert_eq!(ramp, vec![10, 20, 30, 40]);
    }

    #[test]
    fn test_unsupported_filter_is_an_error() {
        let mut doc = Document::with_version("1.5");
        let id = doc.add_object(Stream::new(
            dictionary! {
                "Subtype" => "Image",
                "Width" => Object::Integer(1),
                "Height" => Object::Integer(1),
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => Object::Integer(8),
                "Filter" => "JBIG2Decode",
            },
            vec![0u8; 4],
        ));

        assert!(matches!(image_png(&doc, id.0), Err(PdfError::Image(_))));
    }

    #[test]
    fn test_paeth_picks_nearest_neighbour() {
        assert_eq!(paeth(10, 20, 10), 20);
        assert_eq!(paeth(20, 10, 10), 20);
        assert_eq!(paeth(5, 5, 5), 5);
    }
}
