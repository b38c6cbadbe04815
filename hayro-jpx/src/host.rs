//! The interfaces through which decoded data and diagnostics reach the host.

use crate::error::Result;
use log::{error, warn};

/// The host side of the diagnostic channel.
pub trait Diagnostics {
    /// Report a warning. Called zero or more times per decode.
    fn warning(&mut self, message: &str);
    /// Store an error message. The most recently stored message is the one the host
    /// surfaces when a decode call fails.
    fn store_error(&mut self, message: &str);
}

/// One plane of samples handed to a [`PixelSink`].
#[derive(Debug, Clone, Copy)]
pub struct Plane<'a> {
    /// Exactly `pixel_count` samples in row-major order.
    pub samples: &'a [i32],
    /// The number of bits per sample.
    pub precision: u32,
}

/// The destination of decoded sample planes.
///
/// Exactly one of the delivery methods is called per successful decode, selected by
/// the number of components. Planes are passed in the order the engine produced
/// them, without any color space interpretation.
pub trait PixelSink {
    /// Called before any planes are delivered.
    fn begin(&mut self, _width: u32, _height: u32) {}
    /// Deliver a single-component image.
    fn single_plane(&mut self, plane: Plane<'_>, pixel_count: usize) -> Result<()>;
    /// Deliver a three-component image.
    fn three_planes(&mut self, planes: [Plane<'_>; 3], pixel_count: usize) -> Result<()>;
    /// Deliver a four-component image.
    fn four_planes(&mut self, planes: [Plane<'_>; 4], pixel_count: usize) -> Result<()>;
}

/// Diagnostics that go to the `log` facade.
///
/// Warnings are logged with an `OpenJPEG:` prefix; the last error is kept so
/// it can be shown to the user.
#[derive(Debug, Default, Clone)]
pub struct LogDiagnostics {
    last_error: Option<String>,
}

impl LogDiagnostics {
    /// Create a new, empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently stored error message.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl Diagnostics for LogDiagnostics {
    fn warning(&mut self, message: &str) {
        warn!("OpenJPEG: {}", message.trim_end());
    }

    fn store_error(&mut self, message: &str) {
        error!("OpenJPEG: {}", message.trim_end());
        self.last_error = Some(message.to_string());
    }
}
