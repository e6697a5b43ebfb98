use kurbo::Affine;

use crate::{
    assets::{PreparedImage, WatermarkStore, unpremultiply_rgba8_in_place},
    error::{TidemarkError, TidemarkResult},
    position,
    spec::{WatermarkKind, WatermarkSpec, parse_hex_color},
    text::{self, TextLayoutEngine},
    tile,
};

/// Rasterized output frame in straight (unpremultiplied) RGBA8.
#[derive(Clone, Debug)]
pub struct FrameRgba {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

/// Result of one compositing call.
#[derive(Clone, Debug)]
pub enum RenderOutcome {
    Composited(FrameRgba),
    /// No active watermark content; the caller keeps the original bytes.
    Unchanged,
}

/// Paints one watermark instance onto a copy of the base bitmap.
///
/// Rendering is fully deterministic: identical `(base, spec, watermark)`
/// inputs produce byte-identical frames, which is what lets the interactive
/// preview and the offline export agree. The compositor owns scratch state
/// (text contexts, the decoded watermark) that is reused across calls, so
/// callers must not interleave calls against one instance.
pub struct Compositor {
    text: TextLayoutEngine,
    pub watermark: WatermarkStore,
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor {
    pub fn new() -> Self {
        Self {
            text: TextLayoutEngine::new(),
            watermark: WatermarkStore::new(),
        }
    }

    #[tracing::instrument(skip(self, base, spec), fields(kind = ?spec.kind))]
    pub fn render(
        &mut self,
        base: &PreparedImage,
        spec: &WatermarkSpec,
    ) -> TidemarkResult<RenderOutcome> {
        spec.validate()?;

        let noop = match spec.kind {
            WatermarkKind::Text => spec.text.trim().is_empty(),
            WatermarkKind::Image => !self.watermark.has_source(),
            WatermarkKind::Tiled => {
                spec.text.trim().is_empty() && !self.watermark.has_source()
            }
        };
        if noop {
            return Ok(RenderOutcome::Unchanged);
        }

        let mut pixmap = pixmap_from_premul(base)?;
        match spec.kind {
            WatermarkKind::Text => self.draw_text(&mut pixmap, base, spec)?,
            WatermarkKind::Image => self.draw_image(&mut pixmap, base, spec)?,
            WatermarkKind::Tiled => {
                // Tiled mode ignores anchor placement entirely; the cell
                // carries the rotation instead.
                let watermark = if spec.text.trim().is_empty() {
                    self.watermark.get_or_decode()?
                } else {
                    None
                };
                tile::fill(
                    &mut pixmap,
                    base.width,
                    base.height,
                    spec,
                    &mut self.text,
                    watermark,
                )?;
            }
        }

        let mut data = pixmap.data_as_u8_slice().to_vec();
        unpremultiply_rgba8_in_place(&mut data);
        Ok(RenderOutcome::Composited(FrameRgba {
            width: base.width,
            height: base.height,
            data,
        }))
    }

    fn draw_text(
        &mut self,
        pixmap: &mut vello_cpu::Pixmap,
        base: &PreparedImage,
        spec: &WatermarkSpec,
    ) -> TidemarkResult<()> {
        let (w16, h16) = surface_dims(base.width, base.height)?;
        let color = parse_hex_color(&spec.color)?;
        let layout = self.text.layout(&spec.text, spec.font_size as f32, color)?;
        let font = self.text.font_data()?;

        let (px, py) = position::resolve_pixels(base.width, base.height, spec);
        let anchor_tf = Affine::translate((f64::from(px), f64::from(py)))
            * Affine::rotate(spec.rotation_deg.to_radians());

        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        if spec.opacity < 1.0 {
            ctx.push_opacity_layer(spec.opacity);
        }
        text::paint_layout_with_halo(&mut ctx, &font, &layout, anchor_tf, color);
        if spec.opacity < 1.0 {
            ctx.pop_layer();
        }
        ctx.flush();
        ctx.render_to_pixmap(pixmap);
        Ok(())
    }

    fn draw_image(
        &mut self,
        pixmap: &mut vello_cpu::Pixmap,
        base: &PreparedImage,
        spec: &WatermarkSpec,
    ) -> TidemarkResult<()> {
        let (w16, h16) = surface_dims(base.width, base.height)?;
        let watermark = self
            .watermark
            .get_or_decode()?
            .ok_or_else(|| TidemarkError::asset("watermark image not available"))?;

        let (draw_w, draw_h) = watermark_draw_size(
            base.width,
            base.height,
            watermark.width,
            watermark.height,
            spec.image_size_pct,
        );
        let scale = draw_w / f64::from(watermark.width);

        let (px, py) = position::resolve_pixels(base.width, base.height, spec);
        let tf = Affine::translate((f64::from(px), f64::from(py)))
            * Affine::rotate(spec.rotation_deg.to_radians())
            * Affine::translate((-draw_w / 2.0, -draw_h / 2.0))
            * Affine::scale(scale);

        let paint = image_paint(watermark)?;
        let mut ctx = vello_cpu::RenderContext::new(w16, h16);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_transform(affine_to_cpu(tf));
        ctx.set_paint(paint);
        if spec.opacity < 1.0 {
            ctx.push_opacity_layer(spec.opacity);
        }
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(watermark.width),
            f64::from(watermark.height),
        ));
        if spec.opacity < 1.0 {
            ctx.pop_layer();
        }
        ctx.flush();
        ctx.render_to_pixmap(pixmap);
        Ok(())
    }
}

/// Drawn size of the watermark image on a surface: the target box is
/// `image_size_pct` percent of the surface on each axis and the asset is
/// scaled uniformly to fit it. Shared by the compositor and the overlay so
/// the proxy and the raster always agree.
pub fn watermark_draw_size(
    surface_w: u32,
    surface_h: u32,
    asset_w: u32,
    asset_h: u32,
    size_pct: u32,
) -> (f64, f64) {
    let target_w = f64::from(surface_w) * f64::from(size_pct) / 100.0;
    let target_h = f64::from(surface_h) * f64::from(size_pct) / 100.0;
    let scale = (target_w / f64::from(asset_w)).min(target_h / f64::from(asset_h));
    (f64::from(asset_w) * scale, f64::from(asset_h) * scale)
}

/// Encode a frame as PNG, the single fixed lossless output encoding.
pub fn encode_png(frame: &FrameRgba) -> TidemarkResult<Vec<u8>> {
    let img = image::RgbaImage::from_raw(frame.width, frame.height, frame.data.clone())
        .ok_or_else(|| TidemarkError::render("frame byte length mismatch"))?;
    let mut buf = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| TidemarkError::render(format!("encode png: {e}")))?;
    Ok(buf)
}

pub(crate) fn surface_dims(width: u32, height: u32) -> TidemarkResult<(u16, u16)> {
    let w: u16 = width
        .try_into()
        .map_err(|_| TidemarkError::render("surface width exceeds u16"))?;
    let h: u16 = height
        .try_into()
        .map_err(|_| TidemarkError::render("surface height exceeds u16"))?;
    Ok((w, h))
}

pub(crate) fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

pub(crate) fn pixmap_from_premul(img: &PreparedImage) -> TidemarkResult<vello_cpu::Pixmap> {
    let (w, h) = surface_dims(img.width, img.height)?;
    if img.rgba8_premul.len() != img.width as usize * img.height as usize * 4 {
        return Err(TidemarkError::render("prepared image byte length mismatch"));
    }

    let mut may_have_opacities = false;
    let mut pixels = Vec::with_capacity(img.width as usize * img.height as usize);
    for px in img.rgba8_premul.chunks_exact(4) {
        let a = px[3];
        may_have_opacities |= a != 255;
        pixels.push(vello_cpu::peniko::color::PremulRgba8 {
            r: px[0],
            g: px[1],
            b: px[2],
            a,
        });
    }

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}

pub(crate) fn image_paint(img: &PreparedImage) -> TidemarkResult<vello_cpu::Image> {
    let pixmap = pixmap_from_premul(img)?;
    Ok(vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(std::sync::Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    })
}
