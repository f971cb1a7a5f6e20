use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use rodio::{Decoder, OutputStreamBuilder, Sink};

use crate::library::Track;

use super::types::{Engine, EngineError, EngineHandle};

/// Playback engine backed by a rodio output stream.
///
/// The stream is opened once and owned for the life of the control thread;
/// each track gets its own `Sink` connected to the stream's mixer.
pub struct RodioEngine {
    stream: rodio::OutputStream,
}

impl RodioEngine {
    pub fn open() -> Result<Self, EngineError> {
        let mut stream = OutputStreamBuilder::open_default_stream()?;
        // rodio logs to stderr when OutputStream is dropped. That's useful in
        // debugging, but noisy for a daemon.
        stream.log_on_drop(false);
        Ok(Self { stream })
    }
}

impl Engine for RodioEngine {
    type Prepared = Decoder<BufReader<File>>;
    type Handle = RodioHandle;

    fn prepare(track: &Track) -> Result<Self::Prepared, EngineError> {
        let file = File::open(&track.path).map_err(|source| EngineError::Open {
            path: track.path.clone(),
            source,
        })?;
        Decoder::new(BufReader::new(file)).map_err(|source| EngineError::Decode {
            path: track.path.clone(),
            source,
        })
    }

    fn attach(&mut self, track: &Track, prepared: Self::Prepared) -> Self::Handle {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.append(prepared);
        sink.pause();
        RodioHandle {
            sink: Some(sink),
            track_id: track.id,
        }
    }
}

/// One sink bound to exactly one track. `release` stops and drops the sink;
/// further calls are no-ops.
pub struct RodioHandle {
    sink: Option<Sink>,
    track_id: u64,
}

impl EngineHandle for RodioHandle {
    fn start(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.play();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = self.sink.as_ref() {
            sink.pause();
        }
    }

    fn bound_track(&self) -> u64 {
        self.track_id
    }

    fn position(&self) -> Duration {
        self.sink
            .as_ref()
            .map(|sink| sink.get_pos())
            .unwrap_or(Duration::ZERO)
    }

    fn is_finished(&self) -> bool {
        self.sink.as_ref().map(|sink| sink.empty()).unwrap_or(true)
    }

    fn release(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }
}

impl Drop for RodioHandle {
    fn drop(&mut self) {
        self.release();
    }
}
