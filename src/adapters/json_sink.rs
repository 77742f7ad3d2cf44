//! JSON-lines event sink.
//!
//! Serializes every [`HeaterEvent`] (except phase changes, which are too
//! chatty for the backend link) as one line of JSON into any
//! `std::io::Write`: a UART, a socket, or a `Vec<u8>` in tests.

use std::io::Write;

use log::warn;

use crate::app::events::HeaterEvent;
use crate::app::ports::EventSink;

pub struct JsonEventSink<W: Write> {
    writer: W,
    include_phases: bool,
}

impl<W: Write> JsonEventSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            include_phases: false,
        }
    }

    /// Also forward `PhaseChanged` events (oscilloscope view).
    pub fn with_phases(mut self) -> Self {
        self.include_phases = true;
        self
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> EventSink for JsonEventSink<W> {
    fn emit(&mut self, event: &HeaterEvent) {
        if matches!(event, HeaterEvent::PhaseChanged(_)) && !self.include_phases {
            return;
        }
        let line = match serde_json::to_vec(event) {
            Ok(line) => line,
            Err(e) => {
                warn!("Event serialization failed: {}", e);
                return;
            }
        };
        if let Err(e) = self
            .writer
            .write_all(&line)
            .and_then(|()| self.writer.write_all(b"\n"))
        {
            warn!("Event write failed: {}", e);
        }
    }
}
