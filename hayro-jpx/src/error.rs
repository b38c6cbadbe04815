//! Error types for JPX decoding.

use core::fmt;

/// Status reported to the host when a decode call succeeded.
pub const STATUS_SUCCESS: i32 = 0;
/// Status reported to the host when a decode call failed.
pub const STATUS_FAILURE: i32 = 1;

/// The error type for JPX decoding operations.
///
/// Every error is terminal for the decode call that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// The leading bytes match neither a JP2 signature nor a codestream marker.
    UnknownFormat,
    /// The engine could not be created or rejected the decode parameters.
    DecoderSetupFailed,
    /// The main header or the JP2 boxes could not be read.
    HeaderReadFailed,
    /// Decoding or finalizing the image failed.
    DecodeFailed,
    /// The decoded image has a component count the host cannot consume.
    UnsupportedComponentCount(u32),
    /// Width times height does not fit into the address space.
    ImageTooLarge,
    /// A component holds fewer samples than the image has pixels.
    IncompletePlane,
    /// A sample precision that cannot be packed into bytes.
    UnsupportedPrecision(u32),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownFormat => write!(f, "unknown image format"),
            Self::DecoderSetupFailed => write!(f, "failed to set up the decoder"),
            Self::HeaderReadFailed => write!(f, "failed to read the header"),
            Self::DecodeFailed => write!(f, "failed to decode the image"),
            Self::UnsupportedComponentCount(n) => {
                write!(f, "unsupported number of components: {n}")
            }
            Self::ImageTooLarge => write!(f, "image dimensions are too large"),
            Self::IncompletePlane => write!(f, "component plane is smaller than the image"),
            Self::UnsupportedPrecision(p) => {
                write!(f, "unsupported number of bytes per pixel for precision {p}")
            }
        }
    }
}

impl core::error::Error for DecodeError {}

/// Result type for JPX decoding operations.
pub type Result<T> = core::result::Result<T, DecodeError>;

/// Map the outcome of a decode call to the host status code.
pub fn status<T>(result: &Result<T>) -> i32 {
    match result {
        Ok(_) => STATUS_SUCCESS,
        Err(_) => STATUS_FAILURE,
    }
}
