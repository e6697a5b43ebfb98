use std::sync::Arc;

use crate::error::{TidemarkError, TidemarkResult};

/// RGBA8 brush color used by Parley text layout.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TextBrushRgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl From<[u8; 4]> for TextBrushRgba8 {
    fn from(c: [u8; 4]) -> Self {
        Self {
            r: c[0],
            g: c[1],
            b: c[2],
            a: c[3],
        }
    }
}

#[derive(Clone)]
struct ResolvedFont {
    bytes: Arc<Vec<u8>>,
    index: u32,
    family: String,
}

/// Shapes watermark text with the fixed sans-serif face.
///
/// The face is resolved from system fonts once, on first use; the family is
/// deliberately not user-configurable. Layouts are single-line
/// (no width constraint), matching how the watermark is painted centered on
/// its anchor.
pub struct TextLayoutEngine {
    font_ctx: parley::FontContext,
    layout_ctx: parley::LayoutContext<TextBrushRgba8>,
    font: Option<ResolvedFont>,
}

impl Default for TextLayoutEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TextLayoutEngine {
    pub fn new() -> Self {
        Self {
            font_ctx: parley::FontContext::default(),
            layout_ctx: parley::LayoutContext::new(),
            font: None,
        }
    }

    /// Resolved family name, if a face has been resolved yet.
    pub fn family_name(&self) -> Option<&str> {
        self.font.as_ref().map(|f| f.family.as_str())
    }

    fn ensure_font(&mut self) -> TidemarkResult<()> {
        if self.font.is_some() {
            return Ok(());
        }

        let (bytes, index) = resolve_sans_serif_face()?;
        let families = self
            .font_ctx
            .collection
            .register_fonts(parley::fontique::Blob::from(bytes.as_ref().clone()), None);
        let family_id = families.first().map(|(id, _)| *id).ok_or_else(|| {
            TidemarkError::asset("no font families registered from sans-serif face")
        })?;
        let family = self
            .font_ctx
            .collection
            .family_name(family_id)
            .ok_or_else(|| TidemarkError::asset("registered font family has no name"))?
            .to_string();

        self.font = Some(ResolvedFont {
            bytes,
            index,
            family,
        });
        Ok(())
    }

    /// Shape and lay out plain single-line text at `size_px` with `color`.
    pub fn layout(
        &mut self,
        text: &str,
        size_px: f32,
        color: [u8; 4],
    ) -> TidemarkResult<parley::Layout<TextBrushRgba8>> {
        if !size_px.is_finite() || size_px <= 0.0 {
            return Err(TidemarkError::validation(
                "text size_px must be finite and > 0",
            ));
        }

        self.ensure_font()?;
        let family = match &self.font {
            Some(f) => f.family.clone(),
            None => return Err(TidemarkError::asset("sans-serif face not resolved")),
        };

        let mut builder = self
            .layout_ctx
            .ranged_builder(&mut self.font_ctx, text, 1.0, true);
        builder.push_default(parley::style::StyleProperty::FontStack(
            parley::style::FontStack::Source(std::borrow::Cow::Owned(family)),
        ));
        builder.push_default(parley::style::StyleProperty::FontSize(size_px));
        builder.push_default(parley::style::StyleProperty::Brush(TextBrushRgba8::from(
            color,
        )));

        let mut layout: parley::Layout<TextBrushRgba8> = builder.build(text);
        layout.break_all_lines(None);
        Ok(layout)
    }

    /// Font data handle for glyph painting, resolving the face if needed.
    pub fn font_data(&mut self) -> TidemarkResult<vello_cpu::peniko::FontData> {
        self.ensure_font()?;
        let font = match &self.font {
            Some(f) => f,
            None => return Err(TidemarkError::asset("sans-serif face not resolved")),
        };
        Ok(vello_cpu::peniko::FontData::new(
            vello_cpu::peniko::Blob::from(font.bytes.as_ref().clone()),
            font.index,
        ))
    }
}

/// Paint a shaped layout centered on `anchor_tf` with the fixed legibility
/// halo: four 1px-offset white passes under the color fill. The halo is part
/// of the rendering contract and always applied.
pub(crate) fn paint_layout_with_halo(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrushRgba8>,
    anchor_tf: kurbo::Affine,
    color: [u8; 4],
) {
    const HALO: [u8; 4] = [255, 255, 255, 255];

    let (tw, th) = measure(layout);
    let center = kurbo::Affine::translate((-f64::from(tw) / 2.0, -f64::from(th) / 2.0));

    for (dx, dy, rgba) in [
        (-1.0, -1.0, HALO),
        (1.0, -1.0, HALO),
        (-1.0, 1.0, HALO),
        (1.0, 1.0, HALO),
        (0.0, 0.0, color),
    ] {
        let tf = anchor_tf * kurbo::Affine::translate((dx, dy)) * center;
        paint_layout(ctx, font, layout, tf, rgba);
    }
}

fn paint_layout(
    ctx: &mut vello_cpu::RenderContext,
    font: &vello_cpu::peniko::FontData,
    layout: &parley::Layout<TextBrushRgba8>,
    tf: kurbo::Affine,
    rgba: [u8; 4],
) {
    ctx.set_transform(crate::compositor::affine_to_cpu(tf));
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(
        rgba[0], rgba[1], rgba[2], rgba[3],
    ));

    for line in layout.lines() {
        for item in line.items() {
            let parley::layout::PositionedLayoutItem::GlyphRun(run) = item else {
                continue;
            };
            let glyphs = run.glyphs().map(|g| vello_cpu::Glyph {
                id: g.id,
                x: g.x,
                y: g.y,
            });
            ctx.glyph_run(font)
                .font_size(run.run().font_size())
                .fill_glyphs(glyphs);
        }
    }
}

/// Measured extent of a shaped layout: (max line advance, total line height).
pub fn measure(layout: &parley::Layout<TextBrushRgba8>) -> (f32, f32) {
    let mut w = 0.0f32;
    let mut h = 0.0f32;
    for line in layout.lines() {
        let m = line.metrics();
        w = w.max(m.advance);
        h += m.ascent + m.descent + m.leading;
    }
    (w, h)
}

fn resolve_sans_serif_face() -> TidemarkResult<(Arc<Vec<u8>>, u32)> {
    let mut db = fontdb::Database::new();
    db.load_system_fonts();

    let query = fontdb::Query {
        families: &[fontdb::Family::SansSerif],
        weight: fontdb::Weight::NORMAL,
        stretch: fontdb::Stretch::Normal,
        style: fontdb::Style::Normal,
    };

    let id = db
        .query(&query)
        .or_else(|| db.faces().next().map(|f| f.id))
        .ok_or_else(|| TidemarkError::asset("no system font available for watermark text"))?;

    let (bytes, index) = db
        .with_face_data(id, |data, face_index| (data.to_vec(), face_index))
        .ok_or_else(|| TidemarkError::asset("failed to read sans-serif face data"))?;

    Ok((Arc::new(bytes), index))
}
