//! Production encoder backed by an external ffmpeg process.

use crate::encoder::{VideoEncoder, VideoSink};
use crate::error::EnvError;
use crate::types::{RgbFrame, VideoSpec};
use std::io::Write;
use std::path::PathBuf;
use std::process::{Child, ChildStdin, Command, Stdio};
use tracing::{debug, info, warn};

/// Environment variable overriding the ffmpeg binary.
pub const FFMPEG_ENV: &str = "FLIGHTREEL_FFMPEG";

/// H.264 in an MP4 container via `ffmpeg`.
///
/// Frames are streamed as raw `rgb24` over stdin, so nothing but the final
/// file touches the disk.
#[derive(Debug, Clone)]
pub struct FfmpegEncoder {
    binary: PathBuf,
    codec: String,
    crf: u8,
}

impl FfmpegEncoder {
    /// Uses `$FLIGHTREEL_FFMPEG`, else `ffmpeg` from `PATH`.
    pub fn from_env() -> Self {
        let binary = std::env::var_os(FFMPEG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        Self::with_binary(binary)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            codec: "libx264".to_string(),
            crf: 23,
        }
    }

    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Command-line arguments for one output.
    pub fn args(&self, spec: &VideoSpec) -> Vec<String> {
        vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            "rgb24".into(),
            "-s".into(),
            format!("{}x{}", spec.size.width, spec.size.height),
            "-r".into(),
            format!("{}", spec.fps),
            "-i".into(),
            "-".into(),
            "-an".into(),
            "-c:v".into(),
            self.codec.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-movflags".into(),
            "+faststart".into(),
            spec.output.to_string_lossy().into_owned(),
        ]
    }
}

impl Default for FfmpegEncoder {
    fn default() -> Self {
        Self::from_env()
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn VideoSink>, EnvError> {
        spec.validate()?;
        let args = self.args(spec);
        debug!(binary = %self.binary.display(), ?args, "Starting encoder");

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                EnvError::EncoderUnavailable(format!("{}: {}", self.binary.display(), e))
            })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| EnvError::EncoderUnavailable("encoder stdin not captured".into()))?;

        info!(output = %spec.output.display(), size = %spec.size, fps = spec.fps, "Encoder started");
        Ok(Box::new(FfmpegSink {
            child: Some(child),
            stdin: Some(stdin),
            spec: spec.clone(),
            frames: 0,
        }))
    }
}

struct FfmpegSink {
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    spec: VideoSpec,
    frames: usize,
}

impl VideoSink for FfmpegSink {
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), EnvError> {
        if frame.size != self.spec.size {
            return Err(EnvError::FrameSize {
                width: self.spec.size.width,
                height: self.spec.size.height,
                got_width: frame.size.width,
                got_height: frame.size.height,
            });
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| EnvError::encoder("stream already closed"))?;
        stdin
            .write_all(&frame.data)
            .map_err(|e| EnvError::encoder(format!("writing frame {}: {}", self.frames, e)))?;
        self.frames += 1;
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> Result<(), EnvError> {
        // Closing stdin signals end of stream.
        drop(self.stdin.take());
        let child = self
            .child
            .take()
            .ok_or_else(|| EnvError::encoder("encoder already finished"))?;
        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(EnvError::encoder(format!(
                "ffmpeg exited with {}: {}",
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join(" | ")
            )));
        }
        info!(frames = self.frames, output = %self.spec.output.display(), "Encoder finished");
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            warn!("Encoder dropped before finish, killing ffmpeg");
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FrameSize;

    fn spec() -> VideoSpec {
        VideoSpec {
            size: FrameSize::new(720, 1280),
            fps: 15.0,
            output: PathBuf::from("out.mp4"),
        }
    }

    #[test]
    fn test_args_describe_raw_input() {
        let args = FfmpegEncoder::with_binary("ffmpeg").args(&spec());
        let joined = args.join(" ");
        assert!(joined.contains("-f rawvideo -pix_fmt rgb24 -s 720x1280 -r 15 -i -"));
        assert!(joined.contains("-pix_fmt yuv420p"));
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_missing_binary_is_unavailable() {
        let encoder = FfmpegEncoder::with_binary("/nonexistent/flightreel-ffmpeg");
        match encoder.open(&spec()) {
            Err(EnvError::EncoderUnavailable(msg)) => assert!(msg.contains("nonexistent")),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("encoder should not start"),
        }
    }

    #[test]
    fn test_odd_size_rejected_before_spawn() {
        let mut bad = spec();
        bad.size = FrameSize::new(721, 1280);
        assert!(matches!(
            FfmpegEncoder::with_binary("/nonexistent").open(&bad),
            Err(EnvError::InvalidSpec(_))
        ));
    }
}
