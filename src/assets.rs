use std::sync::Arc;

use crate::error::{TidemarkError, TidemarkResult};

/// Decoded raster image in premultiplied RGBA8 form.
#[derive(Clone, Debug)]
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    /// Pixel bytes in row-major premultiplied RGBA8.
    pub rgba8_premul: Arc<Vec<u8>>,
}

pub fn decode_image(bytes: &[u8]) -> TidemarkResult<PreparedImage> {
    let dyn_img = image::load_from_memory(bytes)
        .map_err(|e| TidemarkError::asset(format!("decode image from memory: {e}")))?;
    let rgba = dyn_img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let mut rgba8_premul = rgba.into_raw();
    premultiply_rgba8_in_place(&mut rgba8_premul);

    Ok(PreparedImage {
        width,
        height,
        rgba8_premul: Arc::new(rgba8_premul),
    })
}

/// True for the one animated format the engine passes through unmodified.
pub fn sniff_animated(bytes: &[u8]) -> bool {
    image::guess_format(bytes)
        .map(|f| f == image::ImageFormat::Gif)
        .unwrap_or(false)
}

fn premultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u16;
        if a == 0 {
            px[0] = 0;
            px[1] = 0;
            px[2] = 0;
            continue;
        }
        px[0] = ((px[0] as u16 * a + 127) / 255) as u8;
        px[1] = ((px[1] as u16 * a + 127) / 255) as u8;
        px[2] = ((px[2] as u16 * a + 127) / 255) as u8;
    }
}

pub fn unpremultiply_rgba8_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a == 0 || a == 255 {
            continue;
        }
        px[0] = ((px[0] as u32 * 255 + a / 2) / a).min(255) as u8;
        px[1] = ((px[1] as u32 * 255 + a / 2) / a).min(255) as u8;
        px[2] = ((px[2] as u32 * 255 + a / 2) / a).min(255) as u8;
    }
}

/// One imported source image tracked through the batch pipeline.
///
/// Created on import; `rendered` is filled after each settings-stabilization
/// event and dropped when the record is removed. Animated records never
/// populate `rendered` (pass-through contract).
#[derive(Clone, Debug)]
pub struct ImageRecord {
    pub id: String,
    /// Original path relative to the import root, `/`-separated.
    pub rel_path: String,
    /// Untouched source bytes.
    pub bytes: Vec<u8>,
    pub animated: bool,
    /// Composited output as PNG bytes; `None` until rendered and for
    /// pass-through records.
    pub rendered: Option<Vec<u8>>,
}

impl ImageRecord {
    pub fn import(id: impl Into<String>, rel_path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let animated = sniff_animated(&bytes);
        Self {
            id: id.into(),
            rel_path: normalize_path(rel_path.into()),
            bytes,
            animated,
            rendered: None,
        }
    }

    /// File name without any directory component.
    pub fn file_name(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(i) => &self.rel_path[i + 1..],
            None => &self.rel_path,
        }
    }

    /// Directory component including the trailing slash, or empty for
    /// root-level records.
    pub fn dir_path(&self) -> &str {
        match self.rel_path.rfind('/') {
            Some(i) => &self.rel_path[..=i],
            None => "",
        }
    }

    pub fn clear_rendered(&mut self) {
        self.rendered = None;
    }
}

fn normalize_path(p: String) -> String {
    if p.contains('\\') { p.replace('\\', "/") } else { p }
}

/// Exclusive owner of the watermark image handle.
///
/// Decode happens lazily on first use; until then only the source bytes are
/// held. Replacing or clearing the source drops the superseded decoded
/// handle, so at most one decoded bitmap is alive at a time.
#[derive(Clone, Debug, Default)]
pub struct WatermarkStore {
    source: Option<Arc<Vec<u8>>>,
    decoded: Option<PreparedImage>,
}

impl WatermarkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_source(&self) -> bool {
        self.source.is_some()
    }

    /// Install new source bytes, releasing any previously decoded bitmap.
    pub fn replace(&mut self, bytes: Vec<u8>) {
        self.decoded = None;
        self.source = Some(Arc::new(bytes));
    }

    pub fn clear(&mut self) {
        self.decoded = None;
        self.source = None;
    }

    /// Decoded watermark bitmap, decoding on first call. Returns `Ok(None)`
    /// when no source is installed; decode failures are asset errors.
    pub fn get_or_decode(&mut self) -> TidemarkResult<Option<&PreparedImage>> {
        let Some(source) = self.source.clone() else {
            return Ok(None);
        };
        if self.decoded.is_none() {
            self.decoded = Some(decode_image(&source)?);
        }
        Ok(self.decoded.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png_bytes(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
        let mut pixels = Vec::with_capacity((width * height * 4) as usize);
        for _ in 0..width * height {
            pixels.extend_from_slice(&rgba);
        }
        let img = image::RgbaImage::from_raw(width, height, pixels).unwrap();
        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn decode_image_png_dimensions_and_premul() {
        let src_rgba = vec![100u8, 50u8, 200u8, 128u8];
        let img = image::RgbaImage::from_raw(1, 1, src_rgba).unwrap();

        let mut buf = Vec::new();
        image::DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();

        let prepared = decode_image(&buf).unwrap();
        assert_eq!(prepared.width, 1);
        assert_eq!(prepared.height, 1);
        assert_eq!(
            prepared.rgba8_premul.as_slice(),
            &[
                ((100u16 * 128 + 127) / 255) as u8,
                ((50u16 * 128 + 127) / 255) as u8,
                ((200u16 * 128 + 127) / 255) as u8,
                128u8
            ]
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode_image(b"not an image at all").is_err());
    }

    #[test]
    fn sniff_detects_gif_only() {
        assert!(sniff_animated(b"GIF89a\x01\x00\x01\x00"));
        assert!(!sniff_animated(&png_bytes(1, 1, [0, 0, 0, 255])));
        assert!(!sniff_animated(b"garbage"));
    }

    #[test]
    fn record_splits_path_components() {
        let r = ImageRecord::import("a", "shoot\\day1\\photo.png", vec![]);
        assert_eq!(r.rel_path, "shoot/day1/photo.png");
        assert_eq!(r.dir_path(), "shoot/day1/");
        assert_eq!(r.file_name(), "photo.png");

        let r = ImageRecord::import("b", "photo.png", vec![]);
        assert_eq!(r.dir_path(), "");
        assert_eq!(r.file_name(), "photo.png");
    }

    #[test]
    fn watermark_store_decodes_lazily_and_supersedes() {
        let mut store = WatermarkStore::new();
        assert!(store.get_or_decode().unwrap().is_none());

        store.replace(png_bytes(2, 3, [255, 0, 0, 255]));
        {
            let img = store.get_or_decode().unwrap().unwrap();
            assert_eq!((img.width, img.height), (2, 3));
        }

        store.replace(png_bytes(4, 1, [0, 255, 0, 255]));
        {
            let img = store.get_or_decode().unwrap().unwrap();
            assert_eq!((img.width, img.height), (4, 1));
        }

        store.clear();
        assert!(store.get_or_decode().unwrap().is_none());
    }

    #[test]
    fn watermark_store_decode_failure_is_asset_error() {
        let mut store = WatermarkStore::new();
        store.replace(b"corrupt".to_vec());
        assert!(matches!(
            store.get_or_decode(),
            Err(crate::error::TidemarkError::Asset(_))
        ));
    }

    #[test]
    fn unpremultiply_inverts_premultiply() {
        let mut px = vec![200u8, 100, 50, 255, 100, 50, 200, 128, 0, 0, 0, 0];
        let original = px.clone();
        premultiply_rgba8_in_place(&mut px);
        unpremultiply_rgba8_in_place(&mut px);
        // Opaque pixels are exact; partially transparent within rounding.
        assert_eq!(&px[0..4], &original[0..4]);
        for i in 4..8 {
            assert!((px[i] as i32 - original[i] as i32).abs() <= 1);
        }
    }
}
