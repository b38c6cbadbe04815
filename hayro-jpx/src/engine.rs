//! The interface to the JPEG 2000 decoding engine.
//!
//! The engine owns wavelet, entropy and tier-1/tier-2 decoding. It is driven
//! through three handles: a codec, an input stream and an image. Each handle
//! releases its engine resource when dropped, so a handle that was never
//! acquired is never released and one that was acquired is released exactly once.

use crate::format::CodecFormat;

/// Receives the messages an engine emits while it works.
///
/// Messages arrive live, while the engine call that produced them is still running.
pub trait MessageHandler {
    /// An informational message.
    fn on_info(&self, message: &str);
    /// A warning. Warnings never abort decoding.
    fn on_warning(&self, message: &str);
    /// An error message.
    fn on_error(&self, message: &str);
}

/// Parameters applied to a codec before the header is read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecodeParameters {
    /// Ignore the palette, component mapping and channel definition boxes of a JP2 file,
    /// so that indexed images are returned as raw palette indices.
    pub ignore_palette_metadata: bool,
}

/// A single component of a decoded image.
#[derive(Debug, Clone, Copy)]
pub struct Component<'a> {
    /// The number of bits per sample.
    pub precision: u32,
    /// Whether samples are signed.
    pub signed: bool,
    /// Whether the component is an alpha channel.
    pub alpha: bool,
    /// The width of the component in samples.
    pub width: u32,
    /// The height of the component in samples.
    pub height: u32,
    /// The samples in row-major order.
    pub samples: &'a [i32],
}

/// The image object produced by an engine.
pub trait DecodedImage {
    /// The width of the image area.
    fn width(&self) -> u32;
    /// The height of the image area.
    fn height(&self) -> u32;
    /// The components, in the order the engine produced them.
    fn components(&self) -> Vec<Component<'_>>;
    /// Release the ICC profile buffer attached to the image, if any.
    ///
    /// Must be called once decoding succeeded. Returns the number of bytes released.
    fn discard_color_profile(&mut self) -> usize;
}

/// A stream-based JPEG 2000 decoding engine.
///
/// The codec borrows the message handler registered on it for `'h`, and the stream
/// borrows the input bytes for `'d`. The engine ordering rules require streams to be
/// released before their codec and images to be released last.
pub trait Engine {
    /// A codec context.
    type Codec<'h>;
    /// A seekable, read-only view of the input bytes.
    type Stream<'d>;
    /// A decoded (or partially decoded) image.
    type Image: DecodedImage;

    /// Create a codec in decompression mode.
    fn create_decompress<'h>(&self, format: CodecFormat) -> Option<Self::Codec<'h>>;

    /// Route the info, warning and error messages of a codec to `handler`.
    fn set_message_handlers<'h>(
        &self,
        codec: &mut Self::Codec<'h>,
        handler: &'h dyn MessageHandler,
    ) -> bool;

    /// Bind `data` as an input stream without copying it.
    fn open_stream<'d>(&self, data: &'d [u8]) -> Option<Self::Stream<'d>>;

    /// Apply decode parameters to a codec.
    fn setup_decoder(&self, codec: &mut Self::Codec<'_>, parameters: &DecodeParameters) -> bool;

    /// Read the main header and, for JP2 files, the header boxes.
    ///
    /// On failure, a partially constructed image is handed back so that the caller
    /// can release it after the stream and the codec.
    fn read_header(
        &self,
        codec: &mut Self::Codec<'_>,
        stream: &mut Self::Stream<'_>,
    ) -> Result<Self::Image, Option<Self::Image>>;

    /// Decode the image data into `image`.
    fn decode(
        &self,
        codec: &mut Self::Codec<'_>,
        stream: &mut Self::Stream<'_>,
        image: &mut Self::Image,
    ) -> bool;

    /// Finish decompression and let the codec flush its internal state.
    fn end_decompress(&self, codec: &mut Self::Codec<'_>, stream: &mut Self::Stream<'_>) -> bool;
}
