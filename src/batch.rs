use crate::{
    assets::{ImageRecord, decode_image},
    compositor::{Compositor, RenderOutcome, encode_png},
    error::TidemarkResult,
    spec::WatermarkSpec,
};

/// Renders the watermark onto every record in order.
///
/// One item failing to decode or render is logged and its record keeps its
/// previous content; the run continues. Animated sources are passed through
/// without rendering. `on_progress` receives a fraction in `[0, 1]` after
/// every item, including skips and failures.
#[tracing::instrument(skip_all, fields(count = records.len()))]
pub fn process_all(
    records: &mut [ImageRecord],
    spec: &WatermarkSpec,
    compositor: &mut Compositor,
    mut on_progress: impl FnMut(f64),
) {
    let total = records.len();
    for (i, record) in records.iter_mut().enumerate() {
        if record.animated {
            tracing::debug!(path = %record.rel_path, "animated source, passing through");
            record.rendered = None;
        } else {
            match render_record(record, spec, compositor) {
                Ok(rendered) => record.rendered = rendered,
                Err(err) => {
                    // A failed item keeps whatever it had, including a
                    // composite from an earlier run.
                    tracing::warn!(path = %record.rel_path, error = %err, "keeping previous content");
                }
            }
        }
        on_progress((i + 1) as f64 / total as f64);
    }
}

fn render_record(
    record: &ImageRecord,
    spec: &WatermarkSpec,
    compositor: &mut Compositor,
) -> TidemarkResult<Option<Vec<u8>>> {
    let base = decode_image(&record.bytes)?;
    match compositor.render(&base, spec)? {
        RenderOutcome::Composited(frame) => Ok(Some(encode_png(&frame)?)),
        RenderOutcome::Unchanged => Ok(None),
    }
}
