//! Video assembly from sequenced frame images.

use flightreel_core::report::{EncodeSummary, FrameFailure};
use flightreel_core::{ReelError, ReelResult};
use flightreel_env::{FrameIndex, FrameSize, RgbFrame, VideoEncoder, VideoSpec};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

fn decode(path: &Path, expected: FrameSize) -> Result<RgbFrame, String> {
    let img = image::open(path).map_err(|e| format!("cannot decode {}: {}", path.display(), e))?;
    let rgb = img.to_rgb8();
    let size = FrameSize::new(rgb.width(), rgb.height());
    if size != expected {
        return Err(format!("{} is {}, expected {}", path.display(), size, expected));
    }
    RgbFrame::new(size, rgb.into_raw()).map_err(|e| e.to_string())
}

/// Encodes `frames` in the order given.
///
/// Images that cannot be decoded or have the wrong size are skipped with a
/// warning. Encoder failures are fatal, as is ending up with no frames.
pub fn encode(
    frames: &[(FrameIndex, PathBuf)],
    spec: &VideoSpec,
    encoder: &dyn VideoEncoder,
) -> ReelResult<EncodeSummary> {
    spec.validate()?;
    info!(
        encoder = encoder.name(),
        frames = frames.len(),
        output = %spec.output.display(),
        "Encoding video"
    );

    let mut sink = encoder.open(spec)?;
    let mut summary = EncodeSummary {
        output: spec.output.clone(),
        ..Default::default()
    };
    for (index, path) in frames {
        match decode(path, spec.size) {
            Ok(frame) => {
                sink.write_frame(&frame)?;
                summary.frames_written += 1;
            }
            Err(reason) => {
                warn!(frame = index.0, %reason, "Skipping undecodable frame");
                summary.skipped.push(FrameFailure { index: index.0, reason });
            }
        }
    }

    if summary.frames_written == 0 {
        drop(sink);
        if spec.output.exists() {
            let _ = std::fs::remove_file(&spec.output);
        }
        return Err(ReelError::encoding("no frames could be decoded for encoding"));
    }
    sink.finish()?;
    info!(
        frames = summary.frames_written,
        skipped = summary.skipped.len(),
        output = %spec.output.display(),
        "Video written"
    );
    Ok(summary)
}
