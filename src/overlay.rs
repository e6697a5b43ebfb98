use crate::{
    assets::PreparedImage,
    compositor::watermark_draw_size,
    position,
    spec::{Placement, WatermarkKind, WatermarkSpec, parse_hex_color},
};

/// Digest of the spec fields that affect watermark appearance. Used to skip
/// overlay content rebuilds and to key recomposition jobs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ContentHash {
    pub hi: u64,
    pub lo: u64,
}

/// Hash the appearance subset of the spec plus the preview zoom scale.
/// Placement and offsets are included: a moved watermark is a changed frame
/// even though only its position differs.
pub fn content_hash(spec: &WatermarkSpec, zoom_scale: f64) -> ContentHash {
    let mut a = Fnv1a64::new(0xcbf29ce484222325);
    let mut b = Fnv1a64::new(0x9ae16a3b2f90404f);

    let kind_tag = match spec.kind {
        WatermarkKind::Text => 0u8,
        WatermarkKind::Image => 1,
        WatermarkKind::Tiled => 2,
    };
    write_u8_pair(&mut a, &mut b, kind_tag);
    write_str_pair(&mut a, &mut b, &spec.text);
    write_u64_pair(&mut a, &mut b, u64::from(spec.font_size));
    write_str_pair(&mut a, &mut b, &spec.color);
    write_u64_pair(&mut a, &mut b, u64::from(spec.opacity.to_bits()));
    write_u64_pair(&mut a, &mut b, spec.rotation_deg.to_bits());
    write_u8_pair(&mut a, &mut b, u8::from(spec.image.is_some()));

    let placement_tag = match spec.placement {
        Placement::TopLeft => 0u8,
        Placement::TopRight => 1,
        Placement::BottomLeft => 2,
        Placement::BottomRight => 3,
        Placement::Center => 4,
        Placement::Custom => 5,
    };
    write_u8_pair(&mut a, &mut b, placement_tag);
    write_u64_pair(&mut a, &mut b, spec.offset_x.to_bits());
    write_u64_pair(&mut a, &mut b, spec.offset_y.to_bits());
    write_u64_pair(&mut a, &mut b, u64::from(spec.image_size_pct));
    write_u64_pair(&mut a, &mut b, u64::from(spec.tile_spacing_px));
    write_u64_pair(&mut a, &mut b, zoom_scale.to_bits());

    ContentHash {
        hi: a.finish(),
        lo: b.finish(),
    }
}

/// Visual description of the watermark content node.
#[derive(Clone, Debug, PartialEq)]
pub enum ContentNode {
    Text {
        text: String,
        font_size: u32,
        color: [u8; 4],
    },
    Image {
        draw_width: f64,
        draw_height: f64,
    },
    Tiled {
        cell_px: u32,
    },
}

/// The single content node of the overlay: what to show, where, and how.
/// Positions are percentages of the preview so the proxy tracks resizes.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayNode {
    pub x_pct: f64,
    pub y_pct: f64,
    /// Zero for tiled content; rotation is baked into the tile cell there.
    pub rotation_deg: f64,
    pub opacity: f32,
    pub content: ContentNode,
}

/// The gesture grab handle, positioned on the same anchor as the content.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HandleNode {
    pub x_pct: f64,
    pub y_pct: f64,
}

/// One immutable overlay description.
///
/// Rebuilt as a value on every content change, so "at most one content node
/// and at most one handle node" holds by construction; there is no
/// incremental patching that could leave duplicates behind.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OverlayFrame {
    pub content: Option<OverlayNode>,
    pub handle: Option<HandleNode>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayUpdate {
    /// Content changed; the node was rebuilt and positioned.
    Rebuilt,
    /// Only position could have moved; the existing node was repositioned.
    Repositioned,
    /// Nothing to show (hidden, or no active content).
    Hidden,
}

/// Keeps the interactive visual proxy consistent with the compositor.
///
/// Positioning goes through the same [`position::resolve`] as the raster
/// path, and image sizing through the same [`watermark_draw_size`], so the
/// proxy and the export can never visually disagree.
pub struct OverlaySync {
    last_hash: Option<ContentHash>,
    frame: OverlayFrame,
}

impl Default for OverlaySync {
    fn default() -> Self {
        Self::new()
    }
}

impl OverlaySync {
    pub fn new() -> Self {
        Self {
            last_hash: None,
            frame: OverlayFrame::default(),
        }
    }

    pub fn frame(&self) -> &OverlayFrame {
        &self.frame
    }

    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        spec: &WatermarkSpec,
        preview_w: u32,
        preview_h: u32,
        zoom_scale: f64,
        visible: bool,
        watermark: Option<&PreparedImage>,
    ) -> OverlayUpdate {
        if !visible || !has_active_content(spec, watermark) {
            self.frame = OverlayFrame::default();
            self.last_hash = None;
            return OverlayUpdate::Hidden;
        }

        let hash = content_hash(spec, zoom_scale);
        let anchor = position::resolve(spec);
        let (x_pct, y_pct) = (anchor.x * 100.0, anchor.y * 100.0);

        if self.last_hash == Some(hash) && self.frame.content.is_some() {
            // Cheap path: nothing about the appearance changed, so only move
            // the existing nodes.
            if let Some(content) = &mut self.frame.content {
                content.x_pct = x_pct;
                content.y_pct = y_pct;
            }
            self.frame.handle = Some(HandleNode { x_pct, y_pct });
            return OverlayUpdate::Repositioned;
        }

        let content = build_content(spec, preview_w, preview_h, watermark);
        let rotation_deg = match spec.kind {
            WatermarkKind::Tiled => 0.0,
            _ => spec.rotation_deg,
        };
        self.frame = OverlayFrame {
            content: content.map(|c| OverlayNode {
                x_pct,
                y_pct,
                rotation_deg,
                opacity: spec.opacity,
                content: c,
            }),
            handle: Some(HandleNode { x_pct, y_pct }),
        };
        self.last_hash = Some(hash);
        OverlayUpdate::Rebuilt
    }
}

fn has_active_content(spec: &WatermarkSpec, watermark: Option<&PreparedImage>) -> bool {
    match spec.kind {
        WatermarkKind::Text => !spec.text.trim().is_empty(),
        WatermarkKind::Image => watermark.is_some(),
        WatermarkKind::Tiled => !spec.text.trim().is_empty() || watermark.is_some(),
    }
}

fn build_content(
    spec: &WatermarkSpec,
    preview_w: u32,
    preview_h: u32,
    watermark: Option<&PreparedImage>,
) -> Option<ContentNode> {
    match spec.kind {
        WatermarkKind::Text => Some(ContentNode::Text {
            text: spec.text.clone(),
            font_size: spec.font_size,
            color: parse_hex_color(&spec.color).unwrap_or([0, 0, 0, 255]),
        }),
        WatermarkKind::Image => {
            let img = watermark?;
            let (draw_width, draw_height) = watermark_draw_size(
                preview_w,
                preview_h,
                img.width,
                img.height,
                spec.image_size_pct,
            );
            Some(ContentNode::Image {
                draw_width,
                draw_height,
            })
        }
        WatermarkKind::Tiled => Some(ContentNode::Tiled {
            cell_px: spec.tile_spacing_px,
        }),
    }
}

fn write_u8_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u8) {
    a.write_u8(v);
    b.write_u8(v);
}

fn write_u64_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, v: u64) {
    a.write_u64(v);
    b.write_u64(v);
}

fn write_str_pair(a: &mut Fnv1a64, b: &mut Fnv1a64, s: &str) {
    write_u64_pair(a, b, s.len() as u64);
    a.write_bytes(s.as_bytes());
    b.write_bytes(s.as_bytes());
}

#[derive(Clone, Copy)]
struct Fnv1a64(u64);

impl Fnv1a64 {
    fn new(seed: u64) -> Self {
        Self(seed)
    }

    fn write_u8(&mut self, v: u8) {
        self.write_bytes(&[v]);
    }

    fn write_u64(&mut self, v: u64) {
        self.write_bytes(&v.to_le_bytes());
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        let mut h = self.0;
        for &b in bytes {
            h ^= b as u64;
            h = h.wrapping_mul(0x100000001b3);
        }
        self.0 = h;
    }

    fn finish(self) -> u64 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::Placement;

    #[test]
    fn hash_is_deterministic() {
        let spec = WatermarkSpec::default();
        assert_eq!(content_hash(&spec, 1.0), content_hash(&spec, 1.0));
    }

    #[test]
    fn hash_tracks_appearance_fields() {
        let spec = WatermarkSpec::default();
        let base = content_hash(&spec, 1.0);

        let mut changed = spec.clone();
        changed.font_size = 32;
        assert_ne!(content_hash(&changed, 1.0), base);

        let mut changed = spec.clone();
        changed.offset_x = 55.0;
        assert_ne!(content_hash(&changed, 1.0), base);

        assert_ne!(content_hash(&spec, 2.0), base);
    }

    #[test]
    fn hash_tracks_image_presence_not_path() {
        let with_a = WatermarkSpec {
            image: Some("a.png".to_string()),
            ..Default::default()
        };
        let with_b = WatermarkSpec {
            image: Some("b.png".to_string()),
            ..Default::default()
        };
        let without = WatermarkSpec::default();

        // The decoded bytes live in the watermark store; the spec only
        // contributes presence.
        assert_eq!(content_hash(&with_a, 1.0), content_hash(&with_b, 1.0));
        assert_ne!(content_hash(&with_a, 1.0), content_hash(&without, 1.0));
    }

    #[test]
    fn unchanged_spec_repositions_without_rebuild() {
        let mut sync = OverlaySync::new();
        let spec = WatermarkSpec::default();

        assert_eq!(
            sync.update(&spec, 400, 300, 1.0, true, None),
            OverlayUpdate::Rebuilt
        );
        assert_eq!(
            sync.update(&spec, 400, 300, 1.0, true, None),
            OverlayUpdate::Repositioned
        );
    }

    #[test]
    fn changed_spec_rebuilds() {
        let mut sync = OverlaySync::new();
        let mut spec = WatermarkSpec::default();

        sync.update(&spec, 400, 300, 1.0, true, None);
        spec.text = "CONFIDENTIAL".to_string();
        assert_eq!(
            sync.update(&spec, 400, 300, 1.0, true, None),
            OverlayUpdate::Rebuilt
        );
    }

    #[test]
    fn frame_has_at_most_one_content_and_handle() {
        let mut sync = OverlaySync::new();
        let mut spec = WatermarkSpec::default();

        for i in 0..10 {
            spec.font_size = 10 + i;
            sync.update(&spec, 400, 300, 1.0, true, None);
            let frame = sync.frame();
            assert!(frame.content.is_some());
            assert!(frame.handle.is_some());
        }
    }

    #[test]
    fn hidden_when_invisible_or_no_content() {
        let mut sync = OverlaySync::new();
        let spec = WatermarkSpec::default();
        assert_eq!(
            sync.update(&spec, 400, 300, 1.0, false, None),
            OverlayUpdate::Hidden
        );
        assert!(sync.frame().content.is_none());

        let empty = WatermarkSpec {
            text: "   ".to_string(),
            ..Default::default()
        };
        assert_eq!(
            sync.update(&empty, 400, 300, 1.0, true, None),
            OverlayUpdate::Hidden
        );

        // Image kind with no decoded watermark has nothing to show.
        let image_spec = WatermarkSpec {
            kind: WatermarkKind::Image,
            ..Default::default()
        };
        assert_eq!(
            sync.update(&image_spec, 400, 300, 1.0, true, None),
            OverlayUpdate::Hidden
        );
    }

    #[test]
    fn node_position_matches_resolver() {
        let mut sync = OverlaySync::new();
        let spec = WatermarkSpec {
            placement: Placement::BottomRight,
            ..Default::default()
        };
        sync.update(&spec, 800, 600, 1.0, true, None);

        let node = sync.frame().content.as_ref().unwrap();
        assert!((node.x_pct - 93.0).abs() < 1e-9);
        assert!((node.y_pct - 98.0).abs() < 1e-9);
        let handle = sync.frame().handle.unwrap();
        assert_eq!((handle.x_pct, handle.y_pct), (node.x_pct, node.y_pct));
    }

    #[test]
    fn tiled_node_carries_no_rotation() {
        let mut sync = OverlaySync::new();
        let spec = WatermarkSpec {
            kind: WatermarkKind::Tiled,
            rotation_deg: 45.0,
            ..Default::default()
        };
        sync.update(&spec, 400, 300, 1.0, true, None);
        let node = sync.frame().content.as_ref().unwrap();
        assert_eq!(node.rotation_deg, 0.0);
        assert!(matches!(node.content, ContentNode::Tiled { cell_px: 100 }));
    }
}
