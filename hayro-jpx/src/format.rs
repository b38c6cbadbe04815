//! Detection of the container format from the leading bytes.

use crate::reader::Reader;

/// The payload of the JP2 signature box, '\r\n\x87\n'.
pub const JP2_MAGIC: [u8; 4] = [0x0D, 0x0A, 0x87, 0x0A];
/// A complete JP2 signature box as registered in RFC 3745: length 12, type 'jP\x20\x20'
/// and the signature payload.
pub const JP2_RFC3745_MAGIC: [[u8; 4]; 3] = [
    [0x00, 0x00, 0x00, 0x0C],
    [0x6A, 0x50, 0x20, 0x20],
    [0x0D, 0x0A, 0x87, 0x0A],
];
/// The SOC marker followed by the SIZ marker that starts every codestream.
pub const J2K_CODESTREAM_MAGIC: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// The number of bytes inspected when classifying a buffer.
pub const MAGIC_LEN: usize = 12;

/// The container kind of an input buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    /// A JP2 file made of boxes.
    Jp2Box,
    /// A bare JPEG 2000 codestream.
    RawCodestream,
    /// Anything else.
    Unrecognized,
}

/// The decoder mode the engine needs to be created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFormat {
    /// JPEG 2000 codestream.
    J2k,
    /// JP2 file format.
    Jp2,
}

impl ContainerKind {
    /// The engine mode for this container, or `None` if it can't be decoded.
    pub fn codec_format(self) -> Option<CodecFormat> {
        match self {
            Self::Jp2Box => Some(CodecFormat::Jp2),
            Self::RawCodestream => Some(CodecFormat::J2k),
            Self::Unrecognized => None,
        }
    }
}

/// Classify a buffer by its first three 32-bit words.
///
/// Buffers shorter than [`MAGIC_LEN`] bytes are never recognized.
pub fn classify(data: &[u8]) -> ContainerKind {
    let mut reader = Reader::new(data);

    let (Some(first), Some(second), Some(third)) = (
        reader.read_array::<4>(),
        reader.read_array::<4>(),
        reader.read_array::<4>(),
    ) else {
        return ContainerKind::Unrecognized;
    };

    if first == JP2_MAGIC || [first, second, third] == JP2_RFC3745_MAGIC {
        ContainerKind::Jp2Box
    } else if first == J2K_CODESTREAM_MAGIC {
        ContainerKind::RawCodestream
    } else {
        ContainerKind::Unrecognized
    }
}
