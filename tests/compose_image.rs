use tidemark::{
    Compositor, Placement, RenderOutcome, WatermarkKind, WatermarkSpec, assets::decode_image,
};

fn png_of(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(
            &mut std::io::Cursor::new(&mut bytes),
            image::ImageFormat::Png,
        )
        .unwrap();
    bytes
}

fn pixel(frame: &tidemark::FrameRgba, x: u32, y: u32) -> [u8; 4] {
    let i = ((y * frame.width + x) * 4) as usize;
    frame.data[i..i + 4].try_into().unwrap()
}

fn centered_image_spec() -> WatermarkSpec {
    WatermarkSpec {
        kind: WatermarkKind::Image,
        placement: Placement::Center,
        opacity: 1.0,
        image_size_pct: 20,
        image: Some("mark.png".to_string()),
        ..Default::default()
    }
}

const BLUE: [u8; 4] = [0, 0, 255, 255];
const RED: [u8; 4] = [255, 0, 0, 255];

#[test]
fn image_watermark_lands_on_the_anchor() {
    let base = decode_image(&png_of(1000, 500, BLUE)).unwrap();

    let mut compositor = Compositor::new();
    compositor.watermark.replace(png_of(400, 200, RED));

    let RenderOutcome::Composited(frame) = compositor
        .render(&base, &centered_image_spec())
        .unwrap()
    else {
        panic!("expected composited output");
    };

    assert_eq!((frame.width, frame.height), (1000, 500));
    // A 400x200 asset in a 200x100 target box scales by 0.5 and spans
    // [400, 600] x [200, 300] around the center anchor.
    assert_eq!(pixel(&frame, 500, 250), RED);
    assert_eq!(pixel(&frame, 450, 230), RED);
    assert_eq!(pixel(&frame, 10, 10), BLUE);
    assert_eq!(pixel(&frame, 990, 490), BLUE);
    assert_eq!(pixel(&frame, 500, 100), BLUE);
}

#[test]
fn rendering_is_deterministic() {
    let base = decode_image(&png_of(320, 240, BLUE)).unwrap();
    let spec = centered_image_spec();

    let mut compositor = Compositor::new();
    compositor.watermark.replace(png_of(64, 64, RED));

    let RenderOutcome::Composited(first) = compositor.render(&base, &spec).unwrap() else {
        panic!("expected composited output");
    };
    let RenderOutcome::Composited(second) = compositor.render(&base, &spec).unwrap() else {
        panic!("expected composited output");
    };
    assert_eq!(first.data, second.data);

    // A fresh compositor agrees byte for byte.
    let mut other = Compositor::new();
    other.watermark.replace(png_of(64, 64, RED));
    let RenderOutcome::Composited(third) = other.render(&base, &spec).unwrap() else {
        panic!("expected composited output");
    };
    assert_eq!(first.data, third.data);
}

#[test]
fn missing_watermark_image_is_a_noop() {
    let base = decode_image(&png_of(64, 64, BLUE)).unwrap();
    let mut compositor = Compositor::new();

    let outcome = compositor.render(&base, &centered_image_spec()).unwrap();
    assert!(matches!(outcome, RenderOutcome::Unchanged));
}

#[test]
fn blank_text_is_a_noop() {
    let base = decode_image(&png_of(64, 64, BLUE)).unwrap();
    let mut compositor = Compositor::new();
    let spec = WatermarkSpec {
        text: "   ".to_string(),
        ..Default::default()
    };

    let outcome = compositor.render(&base, &spec).unwrap();
    assert!(matches!(outcome, RenderOutcome::Unchanged));
}

#[test]
fn invalid_spec_is_rejected() {
    let base = decode_image(&png_of(64, 64, BLUE)).unwrap();
    let mut compositor = Compositor::new();
    let spec = WatermarkSpec {
        opacity: 1.5,
        ..Default::default()
    };

    assert!(compositor.render(&base, &spec).is_err());
}

#[test]
fn half_opacity_blends_with_the_base() {
    let base = decode_image(&png_of(200, 200, BLUE)).unwrap();
    let mut compositor = Compositor::new();
    compositor.watermark.replace(png_of(50, 50, RED));

    let spec = WatermarkSpec {
        opacity: 0.5,
        image_size_pct: 50,
        ..centered_image_spec()
    };
    let RenderOutcome::Composited(frame) = compositor.render(&base, &spec).unwrap() else {
        panic!("expected composited output");
    };

    let [r, _, b, a] = pixel(&frame, 100, 100);
    assert_eq!(a, 255);
    assert!((120..=135).contains(&r), "r = {r}");
    assert!((120..=135).contains(&b), "b = {b}");
}
