//! In-memory encoder that records frames instead of encoding them.

use crate::encoder::{VideoEncoder, VideoSink};
use crate::error::EnvError;
use crate::types::{RgbFrame, VideoSpec};
use std::sync::{Arc, Mutex};

/// Everything written to one sink.
#[derive(Debug, Clone, Default)]
pub struct RecordedVideo {
    pub spec: Option<VideoSpec>,
    pub frames: Vec<RgbFrame>,
    pub finished: bool,
}

/// Encoder whose output can be inspected after the run.
///
/// Clones share the same recording.
#[derive(Debug, Clone, Default)]
pub struct MemoryEncoder {
    recorded: Arc<Mutex<RecordedVideo>>,
}

impl MemoryEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of what has been written so far.
    pub fn recorded(&self) -> RecordedVideo {
        match self.recorded.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl VideoEncoder for MemoryEncoder {
    fn name(&self) -> &str {
        "memory"
    }

    fn open(&self, spec: &VideoSpec) -> Result<Box<dyn VideoSink>, EnvError> {
        spec.validate()?;
        {
            let mut guard = self
                .recorded
                .lock()
                .map_err(|_| EnvError::encoder("recording lock poisoned"))?;
            *guard = RecordedVideo {
                spec: Some(spec.clone()),
                ..Default::default()
            };
        }
        Ok(Box::new(MemorySink {
            spec: spec.clone(),
            recorded: Arc::clone(&self.recorded),
        }))
    }
}

struct MemorySink {
    spec: VideoSpec,
    recorded: Arc<Mutex<RecordedVideo>>,
}

impl VideoSink for MemorySink {
    fn write_frame(&mut self, frame: &RgbFrame) -> Result<(), EnvError> {
        if frame.size != self.spec.size {
            return Err(EnvError::FrameSize {
                width: self.spec.size.width,
                height: self.spec.size.height,
                got_width: frame.size.width,
                got_height: frame.size.height,
            });
        }
        self.recorded
            .lock()
            .map_err(|_| EnvError::encoder("recording lock poisoned"))?
            .frames
            .push(frame.clone());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Result<(), EnvError> {
        self.recorded
            .lock()
            .map_err(|_| EnvError::encoder("recording lock poisoned"))?
            .finished = true;
        Ok(())
    }
}
