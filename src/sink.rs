//! Output sink boundary
//!
//! The sink is the single consumer that renders key events as physical
//! press/release signals. The concrete implementation here writes 8-byte
//! boot keyboard reports to a Linux USB gadget HID device file; a tracing
//! sink stands in when running without gadget hardware.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use thiserror::Error;
use tracing::debug;

use crate::keymap::Modifiers;

/// Per-event failures at the sink boundary. Neither variant is fatal to the
/// pipeline; callers drop the affected event and continue.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("output sink is not ready")]
    NotReady,
    #[error("output sink transport failed")]
    Transport(#[from] io::Error),
}

/// The one consumer of key events.
///
/// `send_press` and `send_release_all` are assumed to complete within
/// bounded time; readiness is checked before every event.
pub trait KeySink: Send {
    fn is_ready(&mut self) -> bool;
    fn send_press(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), SinkError>;
    fn send_release_all(&mut self) -> Result<(), SinkError>;
}

/// Boot keyboard report: modifier byte, reserved byte, six key slots.
/// Only the first slot is ever used.
fn boot_report(modifiers: Modifiers, keycode: u8) -> [u8; 8] {
    [modifiers.bits(), 0, keycode, 0, 0, 0, 0, 0]
}

/// Keyboard sink backed by a USB gadget HID device file (e.g. `/dev/hidg0`).
///
/// The device handle is opened lazily and dropped on any write failure, so
/// a host that disconnects and reattaches is picked up again without
/// restarting the process.
pub struct HidGadgetSink {
    path: PathBuf,
    device: Option<File>,
}

impl HidGadgetSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            device: None,
        }
    }

    fn ensure_open(&mut self) -> io::Result<&mut File> {
        if self.device.is_none() {
            let file = OpenOptions::new().write(true).open(&self.path)?;
            debug!(path = %self.path.display(), "opened HID gadget device");
            self.device = Some(file);
        }
        Ok(self.device.as_mut().unwrap())
    }

    fn write_report(&mut self, report: [u8; 8]) -> Result<(), SinkError> {
        let device = self.ensure_open()?;
        if let Err(err) = device.write_all(&report).and_then(|_| device.flush()) {
            // Stale handle after a host disconnect; reopen on the next event.
            self.device = None;
            return Err(err.into());
        }
        Ok(())
    }
}

impl KeySink for HidGadgetSink {
    fn is_ready(&mut self) -> bool {
        self.ensure_open().is_ok()
    }

    fn send_press(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), SinkError> {
        self.write_report(boot_report(modifiers, keycode))
    }

    fn send_release_all(&mut self) -> Result<(), SinkError> {
        self.write_report(boot_report(Modifiers::empty(), 0))
    }
}

/// Sink that logs frames instead of sending them. Used by `--dry-run` to
/// verify decoding and serialization without gadget hardware.
pub struct TraceSink;

impl KeySink for TraceSink {
    fn is_ready(&mut self) -> bool {
        true
    }

    fn send_press(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), SinkError> {
        tracing::info!(keycode, modifiers = modifiers.bits(), "press");
        Ok(())
    }

    fn send_release_all(&mut self) -> Result<(), SinkError> {
        tracing::info!("release all");
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    //! Recording sink shared by serializer and session tests.

    use std::sync::{Arc, Mutex};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Frame {
        Press { modifiers: Modifiers, keycode: u8 },
        ReleaseAll,
    }

    /// Sink that records every frame and can be toggled unready or failing.
    pub struct RecordingSink {
        pub frames: Arc<Mutex<Vec<Frame>>>,
        pub ready: bool,
        pub fail_writes: bool,
    }

    impl RecordingSink {
        pub fn new() -> (Self, Arc<Mutex<Vec<Frame>>>) {
            let frames = Arc::new(Mutex::new(Vec::new()));
            let sink = Self {
                frames: frames.clone(),
                ready: true,
                fail_writes: false,
            };
            (sink, frames)
        }
    }

    impl KeySink for RecordingSink {
        fn is_ready(&mut self) -> bool {
            self.ready
        }

        fn send_press(&mut self, modifiers: Modifiers, keycode: u8) -> Result<(), SinkError> {
            if self.fail_writes {
                return Err(SinkError::Transport(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "sink detached",
                )));
            }
            self.frames
                .lock()
                .unwrap()
                .push(Frame::Press { modifiers, keycode });
            Ok(())
        }

        fn send_release_all(&mut self) -> Result<(), SinkError> {
            if self.fail_writes {
                return Err(SinkError::Transport(io::Error::new(
                    io::ErrorKind::BrokenPipe,
                    "sink detached",
                )));
            }
            self.frames.lock().unwrap().push(Frame::ReleaseAll);
            Ok(())
        }
    }
}
