//! Content-stream redaction: glyph removal and opaque overlays.

use blackline_core::Fill;
use lopdf::{
    content::{Content, Operation},
    Object, StringFormat,
};

use crate::font::{FontMap, FontMetrics};
use crate::utils::{concat, get_matrix, get_number, transform_point, MaskRect, Matrix, IDENTITY};
use crate::Result;

/// Graphics state parameters saved and restored by `q`/`Q`.
#[derive(Clone, Copy)]
struct GraphicsState<'a> {
    ctm: Matrix,
    char_spacing: f32,
    word_spacing: f32,
    /// `Tz` as a fraction.
    horizontal_scaling: f32,
    leading: f32,
    font_size: f32,
    font: &'a FontMetrics,
}

/// Text and graphics state needed to place glyphs in user space.
struct TextState<'a> {
    gs: GraphicsState<'a>,
    stack: Vec<GraphicsState<'a>>,
    text_matrix: Matrix,
    line_matrix: Matrix,
    in_text_object: bool,
}

/// Result of showing one string: the replacement `TJ` items and how many
/// glyphs were dropped.
#[derive(Default)]
struct Shown {
    items: Vec<Object>,
    removed: usize,
}

impl<'a> TextState<'a> {
    fn new(font: &'a FontMetrics) -> Self {
        Self {
            gs: GraphicsState {
                ctm: IDENTITY,
                char_spacing: 0.0,
                word_spacing: 0.0,
                horizontal_scaling: 1.0,
                leading: 0.0,
                font_size: 12.0,
                font,
            },
            stack: Vec::new(),
            text_matrix: IDENTITY,
            line_matrix: IDENTITY,
            in_text_object: false,
        }
    }

    fn translate_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = concat(&[1.0, 0.0, 0.0, 1.0, tx, ty], &self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.translate_line(0.0, -self.gs.leading);
    }

    /// Horizontal scale from text space to user space.
    fn scale(&self) -> f32 {
        let m = concat(&self.text_matrix, &self.gs.ctm);
        (m[0] * m[0] + m[1] * m[1]).sqrt()
    }

    fn origin(&self) -> (f32, f32) {
        let m = concat(&self.text_matrix, &self.gs.ctm);
        transform_point(&m, 0.0, 0.0)
    }

    fn advance(&mut self, tx: f32) {
        self.text_matrix = concat(&[1.0, 0.0, 0.0, 1.0, tx, 0.0], &self.text_matrix);
    }

    /// A `TJ` number moving the pen by `tx` in text space.
    fn kerning_for(&self, tx: f32) -> Object {
        let unit = self.gs.font_size * self.gs.horizontal_scaling;
        if unit.abs() < f32::EPSILON {
            return Object::Real(0.0);
        }
        Object::Real(-tx * 1000.0 / unit)
    }

    /// Shows `text`, dropping every glyph that falls under a mask. Each run of
    /// dropped glyphs becomes a kerning number of the same advance, so the
    /// glyphs that remain keep their positions.
    fn show(&mut self, text: &[u8], format: StringFormat, masks: &[MaskRect]) -> Shown {
        let scale = self.scale();
        let height = (self.gs.font_size * scale).max(1.0);
        let code_length = self.gs.font.code_length();
        let mut shown = Shown::default();
        let mut run: Vec<u8> = Vec::with_capacity(text.len());
        let mut skipped = 0.0f32;

        for glyph in text.chunks(code_length) {
            let code = glyph.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
            let is_space = code_length == 1 && code == 32;
            let width = self.gs.font.width(code) / 1000.0 * self.gs.font_size;
            let mut advance = width + self.gs.char_spacing;
            if is_space {
                advance += self.gs.word_spacing;
            }
            advance *= self.gs.horizontal_scaling;

            let (x, y) = self.origin();
            let glyph_width = width * self.gs.horizontal_scaling * scale;
            let covered = !is_space
                && masks
                    .iter()
                    .any(|m| m.covers_glyph(x, y, glyph_width, height));

            if covered {
                if !run.is_empty() {
                    shown.items.push(Object::String(std::mem::take(&mut run), format));
                }
                skipped += advance;
                shown.removed += 1;
            } else {
                if skipped != 0.0 {
                    shown.items.push(self.kerning_for(skipped));
                    skipped = 0.0;
                }
                run.extend_from_slice(glyph);
            }
            self.advance(advance);
        }

        if !run.is_empty() {
            shown.items.push(Object::String(run, format));
        }
        if skipped != 0.0 {
            shown.items.push(self.kerning_for(skipped));
        }
        shown
    }

    /// A `TJ` number, in thousandths of text space.
    fn kern(&mut self, amount: f32) {
        self.advance(-amount / 1000.0 * self.gs.font_size * self.gs.horizontal_scaling);
    }
}

fn string_operand(obj: Option<&Object>) -> Option<(&[u8], StringFormat)> {
    match obj {
        Some(Object::String(bytes, format)) => Some((bytes.as_slice(), *format)),
        _ => None,
    }
}

fn show_array(items: Vec<Object>) -> Operation {
    Operation::new("TJ", vec![Object::Array(items)])
}

/// Removes the glyphs that fall under any mask from the content stream.
///
/// Glyph positions follow the text state (`Tm`, `Td`, `TD`, `T*`, `TL`, `Tf`,
/// `Tc`, `Tw`, `Tz`), the CTM and the advance widths in `fonts`, keyed by the
/// `Tf` resource name. Fonts missing from the map use Helvetica metrics.
/// Shows that lose glyphs are rewritten as `TJ` arrays whose kerning stands in
/// for the dropped glyphs. Returns the new stream and the number of glyphs
/// removed.
pub fn process_content_stream(
    content_data: &[u8],
    masks: &[MaskRect],
    fonts: &FontMap,
) -> Result<(Vec<u8>, usize)> {
    let content = Content::decode(content_data)?;
    let fallback = FontMetrics::fallback();
    let mut state = TextState::new(&fallback);
    let mut removed = 0usize;
    let mut new_operations: Vec<Operation> = Vec::with_capacity(content.operations.len());

    for op in content.operations {
        match op.operator.as_str() {
            "q" => {
                state.stack.push(state.gs);
                new_operations.push(op);
            }
            "Q" => {
                if let Some(saved) = state.stack.pop() {
                    state.gs = saved;
                }
                new_operations.push(op);
            }
            "cm" => {
                if let Some(m) = get_matrix(&op.operands) {
                    state.gs.ctm = concat(&m, &state.gs.ctm);
                }
                new_operations.push(op);
            }
            "BT" => {
                state.in_text_object = true;
                state.text_matrix = IDENTITY;
                state.line_matrix = IDENTITY;
                new_operations.push(op);
            }
            "ET" => {
                state.in_text_object = false;
                new_operations.push(op);
            }
            "Tm" if state.in_text_object => {
                if let Some(m) = get_matrix(&op.operands) {
                    state.text_matrix = m;
                    state.line_matrix = m;
                }
                new_operations.push(op);
            }
            "Td" | "TD" if state.in_text_object && op.operands.len() >= 2 => {
                let tx = get_number(&op.operands[0]);
                let ty = get_number(&op.operands[1]);
                if let (Some(tx), Some(ty)) = (tx, ty) {
                    if op.operator == "TD" {
                        state.gs.leading = -ty;
                    }
                    state.translate_line(tx, ty);
                }
                new_operations.push(op);
            }
            "T*" if state.in_text_object => {
                state.next_line();
                new_operations.push(op);
            }
            "TL" | "Tc" | "Tw" | "Tz" => {
                if let Some(value) = op.operands.first().and_then(get_number) {
                    match op.operator.as_str() {
                        "TL" => state.gs.leading = value,
                        "Tc" => state.gs.char_spacing = value,
                        "Tw" => state.gs.word_spacing = value,
                        _ => state.gs.horizontal_scaling = value / 100.0,
                    }
                }
                new_operations.push(op);
            }
            "Tf" if op.operands.len() >= 2 => {
                if let Ok(name) = op.operands[0].as_name() {
                    state.gs.font = fonts.get(name).unwrap_or(&fallback);
                }
                if let Some(size) = get_number(&op.operands[1]) {
                    state.gs.font_size = size.abs();
                }
                new_operations.push(op);
            }
            "Tj" | "'" if state.in_text_object => {
                if op.operator == "'" {
                    state.next_line();
                }
                let Some((bytes, format)) = string_operand(op.operands.first()) else {
                    new_operations.push(op);
                    continue;
                };
                let shown = state.show(bytes, format, masks);
                if shown.removed == 0 {
                    new_operations.push(op);
                    continue;
                }
                removed += shown.removed;
                log::debug!("[Glyphs] {}: removed {} glyph(s)", op.operator, shown.removed);
                if op.operator == "'" {
                    new_operations.push(Operation::new("T*", vec![]));
                }
                new_operations.push(show_array(shown.items));
            }
            "\"" if state.in_text_object && op.operands.len() >= 3 => {
                let word_spacing = get_number(&op.operands[0]);
                let char_spacing = get_number(&op.operands[1]);
                if let Some(aw) = word_spacing {
                    state.gs.word_spacing = aw;
                }
                if let Some(ac) = char_spacing {
                    state.gs.char_spacing = ac;
                }
                state.next_line();
                let Some((bytes, format)) = string_operand(op.operands.get(2)) else {
                    new_operations.push(op);
                    continue;
                };
                let shown = state.show(bytes, format, masks);
                if shown.removed == 0 {
                    new_operations.push(op);
                    continue;
                }
                removed += shown.removed;
                log::debug!("[Glyphs] \": removed {} glyph(s)", shown.removed);
                new_operations.push(Operation::new("Tw", vec![op.operands[0].clone()]));
                new_operations.push(Operation::new("Tc", vec![op.operands[1].clone()]));
                new_operations.push(Operation::new("T*", vec![]));
                new_operations.push(show_array(shown.items));
            }
            "TJ" if state.in_text_object => {
                let Some(Object::Array(items)) = op.operands.first() else {
                    new_operations.push(op);
                    continue;
                };

                let mut new_items = Vec::with_capacity(items.len());
                let mut removed_here = 0usize;
                for item in items {
                    match item {
                        Object::String(bytes, format) => {
                            let shown = state.show(bytes, *format, masks);
                            if shown.removed > 0 {
                                removed_here += shown.removed;
                                new_items.extend(shown.items);
                            } else {
                                new_items.push(item.clone());
                            }
                        }
                        Object::Integer(_) | Object::Real(_) => {
                            if let Some(amount) = get_number(item) {
                                state.kern(amount);
                            }
                            new_items.push(item.clone());
                        }
                        other => new_items.push(other.clone()),
                    }
                }

                if removed_here > 0 {
                    removed += removed_here;
                    log::debug!("[Glyphs] TJ: removed {} glyph(s)", removed_here);
                    new_operations.push(show_array(new_items));
                } else {
                    new_operations.push(op);
                }
            }
            _ => new_operations.push(op),
        }
    }

    let new_content = Content {
        operations: new_operations,
    };
    Ok((new_content.encode()?, removed))
}

/// Wraps the existing content in `q`/`Q` and paints every mask as an opaque
/// rectangle in its fill colour on top of it.
pub fn add_overlay(content_data: &[u8], masks: &[(MaskRect, Fill)]) -> Result<Vec<u8>> {
    let content = Content::decode(content_data)?;
    let mut operations = Vec::with_capacity(content.operations.len() + masks.len() * 4 + 4);

    operations.push(Operation::new("q", vec![]));
    operations.extend(content.operations);
    operations.push(Operation::new("Q", vec![]));

    operations.push(Operation::new("q", vec![]));
    let mut current: Option<Fill> = None;
    for (rect, fill) in masks {
        if current != Some(*fill) {
            let color = vec![Object::Real(fill.r), Object::Real(fill.g), Object::Real(fill.b)];
            operations.push(Operation::new("rg", color.clone()));
            operations.push(Operation::new("RG", color));
            current = Some(*fill);
        }
        log::debug!(
            "[Overlay] x={:.1}, y={:.1}, w={:.1}, h={:.1}",
            rect.x,
            rect.y,
            rect.width,
            rect.height
        );
        operations.push(Operation::new(
            "re",
            vec![
                Object::Real(rect.x),
                Object::Real(rect.y),
                Object::Real(rect.width),
                Object::Real(rect.height),
            ],
        ));
        operations.push(Operation::new("f", vec![]));
    }
    operations.push(Operation::new("Q", vec![]));

    Ok(Content { operations }.encode()?)
}
