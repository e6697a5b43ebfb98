use crate::error::{TidemarkError, TidemarkResult};

pub type PremulRgba8 = [u8; 4];

/// Source-over in premultiplied RGBA8 with an extra opacity factor.
pub fn over(dst: PremulRgba8, src: PremulRgba8, opacity: f32) -> PremulRgba8 {
    let opacity = opacity.clamp(0.0, 1.0);
    if opacity <= 0.0 || src[3] == 0 {
        return dst;
    }

    let op = ((opacity * 255.0).round() as i32).clamp(0, 255) as u16;
    let sa = mul_div255(u16::from(src[3]), op);
    if sa == 0 {
        return dst;
    }

    let inv = 255u16 - u16::from(sa);

    let mut out = [0u8; 4];
    out[3] = add_sat_u8(sa, mul_div255(u16::from(dst[3]), inv));

    for i in 0..3 {
        let sc = mul_div255(u16::from(src[i]), op);
        let dc = mul_div255(u16::from(dst[i]), inv);
        out[i] = add_sat_u8(sc, dc);
    }
    out
}

/// Composite a source tile over a destination buffer with its top-left corner
/// at `(origin_x, origin_y)`, clipping at the destination edges. Both buffers
/// are row-major premultiplied RGBA8.
pub fn blit_over(
    dst: &mut [u8],
    dst_w: u32,
    dst_h: u32,
    src: &[u8],
    src_w: u32,
    src_h: u32,
    origin_x: i64,
    origin_y: i64,
    opacity: f32,
) -> TidemarkResult<()> {
    if dst.len() != dst_w as usize * dst_h as usize * 4 {
        return Err(TidemarkError::render(
            "blit_over destination byte length mismatch",
        ));
    }
    if src.len() != src_w as usize * src_h as usize * 4 {
        return Err(TidemarkError::render("blit_over source byte length mismatch"));
    }

    for sy in 0..i64::from(src_h) {
        let dy = origin_y + sy;
        if dy < 0 || dy >= i64::from(dst_h) {
            continue;
        }
        for sx in 0..i64::from(src_w) {
            let dx = origin_x + sx;
            if dx < 0 || dx >= i64::from(dst_w) {
                continue;
            }
            let si = (sy as usize * src_w as usize + sx as usize) * 4;
            let di = (dy as usize * dst_w as usize + dx as usize) * 4;
            let src_px = [src[si], src[si + 1], src[si + 2], src[si + 3]];
            let dst_px = [dst[di], dst[di + 1], dst[di + 2], dst[di + 3]];
            let out = over(dst_px, src_px, opacity);
            dst[di..di + 4].copy_from_slice(&out);
        }
    }
    Ok(())
}

fn mul_div255(x: u16, y: u16) -> u8 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u8
}

fn add_sat_u8(a: u8, b: u8) -> u8 {
    a.saturating_add(b)
}
