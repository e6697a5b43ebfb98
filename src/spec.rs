use std::ops::RangeInclusive;

use crate::error::{TidemarkError, TidemarkResult};

/// Allowed text size in points for text watermarks.
pub const FONT_SIZE_RANGE: RangeInclusive<u32> = 8..=144;
/// Allowed watermark image size as percent of the target width.
pub const IMAGE_SIZE_RANGE: RangeInclusive<u32> = 5..=100;
/// Allowed tile cell side in pixels.
pub const TILE_SPACING_RANGE: RangeInclusive<u32> = 50..=300;
/// Allowed opacity as a fraction. Opacity is stored as a fraction everywhere;
/// percent values only exist at UI boundaries (see [`WatermarkSpec::opacity_percent`]).
pub const OPACITY_RANGE: RangeInclusive<f32> = 0.1..=1.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkKind {
    Text,
    Image,
    Tiled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Center,
    Custom,
}

/// Canonical watermark settings shared by the interactive proxy and the
/// offline compositor. One revision of this struct describes exactly one
/// visual result; mutation happens through the settings UI or the gesture
/// controller, never during rendering.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct WatermarkSpec {
    pub kind: WatermarkKind,
    pub text: String,
    pub font_size: u32,
    /// Hex color, `#rrggbb` or `#rrggbbaa`.
    pub color: String,
    /// Fraction in [0.1, 1.0].
    pub opacity: f32,
    pub placement: Placement,
    /// Percent of the surface, meaningful only when `placement` is `Custom`.
    pub offset_x: f64,
    pub offset_y: f64,
    /// Degrees in [-180, 180].
    pub rotation_deg: f64,
    /// Source reference for the watermark bitmap. The decoded handle itself
    /// is owned by [`crate::assets::WatermarkStore`]; replacing or clearing
    /// the source supersedes that handle.
    pub image: Option<String>,
    /// Percent of the target width, [5, 100].
    pub image_size_pct: u32,
    /// Tile cell side in pixels, [50, 300].
    pub tile_spacing_px: u32,
}

impl Default for WatermarkSpec {
    fn default() -> Self {
        Self {
            kind: WatermarkKind::Text,
            text: "Watermark".to_string(),
            font_size: 24,
            color: "#000000".to_string(),
            opacity: 0.8,
            placement: Placement::BottomRight,
            offset_x: 0.0,
            offset_y: 0.0,
            rotation_deg: 0.0,
            image: None,
            image_size_pct: 20,
            tile_spacing_px: 100,
        }
    }
}

impl WatermarkSpec {
    pub fn validate(&self) -> TidemarkResult<()> {
        if !FONT_SIZE_RANGE.contains(&self.font_size) {
            return Err(TidemarkError::validation(format!(
                "font_size {} outside [{}, {}]",
                self.font_size,
                FONT_SIZE_RANGE.start(),
                FONT_SIZE_RANGE.end()
            )));
        }
        if !self.opacity.is_finite() || !OPACITY_RANGE.contains(&self.opacity) {
            return Err(TidemarkError::validation(format!(
                "opacity {} outside [0.1, 1.0]",
                self.opacity
            )));
        }
        if !IMAGE_SIZE_RANGE.contains(&self.image_size_pct) {
            return Err(TidemarkError::validation(format!(
                "image_size_pct {} outside [{}, {}]",
                self.image_size_pct,
                IMAGE_SIZE_RANGE.start(),
                IMAGE_SIZE_RANGE.end()
            )));
        }
        if !TILE_SPACING_RANGE.contains(&self.tile_spacing_px) {
            return Err(TidemarkError::validation(format!(
                "tile_spacing_px {} outside [{}, {}]",
                self.tile_spacing_px,
                TILE_SPACING_RANGE.start(),
                TILE_SPACING_RANGE.end()
            )));
        }
        if !self.rotation_deg.is_finite() || !(-180.0..=180.0).contains(&self.rotation_deg) {
            return Err(TidemarkError::validation(format!(
                "rotation_deg {} outside [-180, 180]",
                self.rotation_deg
            )));
        }
        if !self.offset_x.is_finite() || !(0.0..=100.0).contains(&self.offset_x) {
            return Err(TidemarkError::validation(format!(
                "offset_x {} outside [0, 100]",
                self.offset_x
            )));
        }
        if !self.offset_y.is_finite() || !(0.0..=100.0).contains(&self.offset_y) {
            return Err(TidemarkError::validation(format!(
                "offset_y {} outside [0, 100]",
                self.offset_y
            )));
        }
        parse_hex_color(&self.color)?;
        Ok(())
    }

    /// Set the watermark image source, superseding any previous one. Mirrors
    /// the settings UI, which switches to the image kind when an image is
    /// chosen.
    pub fn set_image(&mut self, source: impl Into<String>) {
        self.image = Some(source.into());
        self.kind = WatermarkKind::Image;
    }

    pub fn clear_image(&mut self) {
        self.image = None;
    }

    /// Opacity converted to percent for UI boundaries.
    pub fn opacity_percent(&self) -> f32 {
        self.opacity * 100.0
    }

    /// Set opacity from a percent value, the unit some settings surfaces use.
    pub fn set_opacity_percent(&mut self, percent: f32) {
        self.opacity = percent / 100.0;
    }
}

/// Parse `#rrggbb` or `#rrggbbaa` into RGBA8.
pub fn parse_hex_color(s: &str) -> TidemarkResult<[u8; 4]> {
    let hex = s
        .strip_prefix('#')
        .ok_or_else(|| TidemarkError::validation(format!("color '{s}' must start with '#'")))?;
    // The length check counts bytes, so non-ASCII input must be rejected
    // before slicing into digit pairs.
    if !hex.is_ascii() || (hex.len() != 6 && hex.len() != 8) {
        return Err(TidemarkError::validation(format!(
            "color '{s}' must be #rrggbb or #rrggbbaa"
        )));
    }

    let byte_at = |i: usize| -> TidemarkResult<u8> {
        u8::from_str_radix(&hex[i..i + 2], 16)
            .map_err(|_| TidemarkError::validation(format!("color '{s}' has invalid hex digits")))
    };

    let r = byte_at(0)?;
    let g = byte_at(2)?;
    let b = byte_at(4)?;
    let a = if hex.len() == 8 { byte_at(6)? } else { 255 };
    Ok([r, g, b, a])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_spec_validates() {
        WatermarkSpec::default().validate().unwrap();
    }

    #[test]
    fn validate_rejects_out_of_range_fields() {
        let mut spec = WatermarkSpec {
            font_size: 4,
            ..Default::default()
        };
        assert!(spec.validate().is_err());

        spec = WatermarkSpec {
            opacity: 0.0,
            ..Default::default()
        };
        assert!(spec.validate().is_err());

        spec = WatermarkSpec {
            tile_spacing_px: 10,
            ..Default::default()
        };
        assert!(spec.validate().is_err());

        spec = WatermarkSpec {
            rotation_deg: 270.0,
            ..Default::default()
        };
        assert!(spec.validate().is_err());
    }

    #[test]
    fn set_image_switches_kind_and_supersedes() {
        let mut spec = WatermarkSpec::default();
        spec.set_image("logo.png");
        assert_eq!(spec.kind, WatermarkKind::Image);
        assert_eq!(spec.image.as_deref(), Some("logo.png"));

        spec.set_image("other.png");
        assert_eq!(spec.image.as_deref(), Some("other.png"));

        spec.clear_image();
        assert!(spec.image.is_none());
    }

    #[test]
    fn hex_color_parses_and_rejects() {
        assert_eq!(parse_hex_color("#000000").unwrap(), [0, 0, 0, 255]);
        assert_eq!(parse_hex_color("#ff8000").unwrap(), [255, 128, 0, 255]);
        assert_eq!(parse_hex_color("#ff800080").unwrap(), [255, 128, 0, 128]);
        assert!(parse_hex_color("000000").is_err());
        assert!(parse_hex_color("#fff").is_err());
        assert!(parse_hex_color("#zzzzzz").is_err());
    }

    #[test]
    fn hex_color_rejects_multibyte_input_without_panicking() {
        // Two three-byte chars total six bytes, matching the byte-length
        // check but not the digit-pair layout.
        assert!(parse_hex_color("#\u{65e5}\u{65e5}").is_err());
        assert!(parse_hex_color("#ffff\u{e9}").is_err());
        assert!(parse_hex_color("#\u{1f600}\u{65e5}").is_err());
    }

    #[test]
    fn opacity_percent_round_trips() {
        let mut spec = WatermarkSpec::default();
        spec.set_opacity_percent(80.0);
        assert!((spec.opacity - 0.8).abs() < 1e-6);
        assert!((spec.opacity_percent() - 80.0).abs() < 1e-4);
    }

    #[test]
    fn json_roundtrip_with_defaults() {
        let spec = WatermarkSpec::default();
        let s = serde_json::to_string(&spec).unwrap();
        let de: WatermarkSpec = serde_json::from_str(&s).unwrap();
        assert_eq!(de, spec);

        // Partial configs fill in defaults.
        let de: WatermarkSpec = serde_json::from_str(r#"{"kind":"tiled"}"#).unwrap();
        assert_eq!(de.kind, WatermarkKind::Tiled);
        assert_eq!(de.tile_spacing_px, 100);
    }
}
