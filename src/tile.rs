use kurbo::Affine;

use crate::{
    assets::PreparedImage,
    composite::blit_over,
    compositor::{affine_to_cpu, image_paint},
    error::{TidemarkError, TidemarkResult},
    spec::{WatermarkSpec, parse_hex_color},
    text::{self, TextLayoutEngine},
};

/// Fraction of the cell the tiled image content may occupy.
const IMAGE_CELL_FIT: f64 = 0.8;

/// Fill a surface with the repeating watermark pattern.
///
/// One square cell of side `tile_spacing_px` is pre-rendered with a single
/// content instance centered in it, rotation applied once at cell-build time.
/// The cell is then blitted in a symmetric grid around the surface center
/// with `ceil(diagonal / spacing) + 2` cells per axis, which covers the whole
/// surface for any rotation as long as the spacing does not exceed the
/// smaller surface side. Tiled content prefers text when non-empty, else the
/// watermark image; with neither, the surface is left untouched.
pub fn fill(
    pixmap: &mut vello_cpu::Pixmap,
    width: u32,
    height: u32,
    spec: &WatermarkSpec,
    engine: &mut TextLayoutEngine,
    watermark: Option<&PreparedImage>,
) -> TidemarkResult<()> {
    let spacing = spec.tile_spacing_px;
    let cell = if !spec.text.trim().is_empty() {
        render_text_cell(spacing, spec, engine)?
    } else if let Some(img) = watermark {
        render_image_cell(spacing, spec, img)?
    } else {
        return Ok(());
    };

    let diagonal = f64::from(width).hypot(f64::from(height));
    let count = (diagonal / f64::from(spacing)).ceil() as i64 + 2;
    let half = count / 2;

    let s = i64::from(spacing);
    let (cx, cy) = (i64::from(width) / 2, i64::from(height) / 2);
    let cell_data = cell.data_as_u8_slice();

    for i in -half..half {
        for j in -half..half {
            blit_over(
                pixmap.data_as_u8_slice_mut(),
                width,
                height,
                cell_data,
                spacing,
                spacing,
                cx + i * s - s / 2,
                cy + j * s - s / 2,
                spec.opacity,
            )?;
        }
    }
    Ok(())
}

fn render_text_cell(
    spacing: u32,
    spec: &WatermarkSpec,
    engine: &mut TextLayoutEngine,
) -> TidemarkResult<vello_cpu::Pixmap> {
    let side = cell_side(spacing)?;
    let color = parse_hex_color(&spec.color)?;
    let layout = engine.layout(&spec.text, spec.font_size as f32, color)?;
    let font = engine.font_data()?;

    let center = f64::from(spacing) / 2.0;
    let anchor_tf = Affine::translate((center, center))
        * Affine::rotate(spec.rotation_deg.to_radians());

    let mut ctx = vello_cpu::RenderContext::new(side, side);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    text::paint_layout_with_halo(&mut ctx, &font, &layout, anchor_tf, color);
    ctx.flush();

    let mut cell = vello_cpu::Pixmap::new(side, side);
    ctx.render_to_pixmap(&mut cell);
    Ok(cell)
}

fn render_image_cell(
    spacing: u32,
    spec: &WatermarkSpec,
    img: &PreparedImage,
) -> TidemarkResult<vello_cpu::Pixmap> {
    let side = cell_side(spacing)?;

    let fit = f64::from(spacing) * IMAGE_CELL_FIT;
    let scale = (fit / f64::from(img.width)).min(fit / f64::from(img.height));
    let draw_w = f64::from(img.width) * scale;
    let draw_h = f64::from(img.height) * scale;

    let center = f64::from(spacing) / 2.0;
    let tf = Affine::translate((center, center))
        * Affine::rotate(spec.rotation_deg.to_radians())
        * Affine::translate((-draw_w / 2.0, -draw_h / 2.0))
        * Affine::scale(scale);

    let paint = image_paint(img)?;
    let mut ctx = vello_cpu::RenderContext::new(side, side);
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
    ctx.set_transform(affine_to_cpu(tf));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(img.width),
        f64::from(img.height),
    ));
    ctx.flush();

    let mut cell = vello_cpu::Pixmap::new(side, side);
    ctx.render_to_pixmap(&mut cell);
    Ok(cell)
}

fn cell_side(spacing: u32) -> TidemarkResult<u16> {
    spacing
        .try_into()
        .map_err(|_| TidemarkError::render("tile spacing exceeds u16"))
}
