/*!
Decode orchestration for JPEG 2000 images embedded in PDF files.

`hayro-jpx` takes a JPEG 2000 codestream or a JP2 file, drives a decoding engine
through setup, header reading, decoding and finalization, and hands the decoded
component planes to the host. By default the engine is [OpenJPEG](https://www.openjpeg.org).

The entry points are [`decode`], which returns packed [`ImageData`], and
[`decode_with`], which lets the caller plug in its own engine, diagnostics and
pixel sink.

# Example
```rust,no_run
use hayro_jpx::{DecodeRequest, decode};

let data = std::fs::read("image.jp2").unwrap();
let image = decode(&DecodeRequest::new(&data)).unwrap();

println!("{}x{} image with {} channels", image.width, image.height, image.channels);
```

# Component layouts
Images with one, three or four components are supported. Planes are delivered in
the order the engine produces them; no color space conversion takes place.

# Cargo features
- `openjpeg` (default): the [`OpenJpeg`] engine and the [`decode`] function.
- `image`: conversion of [`ImageData`] into an `image::DynamicImage`.
*/

mod engine;
mod error;
mod extract;
mod format;
mod host;
mod image_data;
#[cfg(feature = "image")]
mod integration;
#[cfg(feature = "openjpeg")]
pub mod openjpeg;
mod reader;
mod relay;
mod session;

pub use engine::{Component, DecodeParameters, DecodedImage, Engine, MessageHandler};
pub use error::{DecodeError, Result, STATUS_FAILURE, STATUS_SUCCESS, status};
pub use format::{
    CodecFormat, ContainerKind, J2K_CODESTREAM_MAGIC, JP2_MAGIC, JP2_RFC3745_MAGIC, MAGIC_LEN,
    classify,
};
pub use host::{Diagnostics, LogDiagnostics, PixelSink, Plane};
pub use image_data::ImageData;
#[cfg(feature = "openjpeg")]
pub use openjpeg::OpenJpeg;

use log::debug;
use relay::Relay;

/// A request to decode a single image.
#[derive(Debug, Clone, Copy)]
pub struct DecodeRequest<'a> {
    /// The encoded image, either a JPEG 2000 codestream or a JP2 file.
    pub data: &'a [u8],
    /// The number of components the embedding document declares, or 0 if unknown.
    pub declared_components: u32,
    /// Whether the image is used as an indexed color map, in which case the palette
    /// related boxes of a JP2 file are ignored and raw indices are returned.
    pub ignore_palette_metadata: bool,
    /// Whether a soft mask is stored together with the color data.
    pub smask_in_data: bool,
}

impl<'a> DecodeRequest<'a> {
    /// Create a request for `data` without any hints.
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            declared_components: 0,
            ignore_palette_metadata: false,
            smask_in_data: false,
        }
    }
}

/// Decode an image with a custom engine, diagnostics and pixel sink.
///
/// Engine warnings and errors are passed to `diagnostics` while decoding runs. If
/// decoding fails, a description of the failure is stored as the last error, and
/// `sink` has not received any planes.
pub fn decode_with<E, D, S>(
    engine: &E,
    request: &DecodeRequest<'_>,
    diagnostics: &mut D,
    sink: &mut S,
) -> Result<()>
where
    E: Engine,
    D: Diagnostics,
    S: PixelSink,
{
    let result = decode_inner(engine, request, diagnostics, sink);

    if let Err(e) = &result {
        diagnostics.store_error(&e.to_string());
    }

    result
}

fn decode_inner<E, D, S>(
    engine: &E,
    request: &DecodeRequest<'_>,
    diagnostics: &mut D,
    sink: &mut S,
) -> Result<()>
where
    E: Engine,
    D: Diagnostics,
    S: PixelSink,
{
    let image = {
        let relay = Relay::new(&mut *diagnostics);
        session::decode(engine, request, &relay)?
    };

    let num_components = image.components().len();

    if request.declared_components != 0 && request.declared_components as usize != num_components
    {
        debug!(
            "document declares {} component(s), image has {num_components}",
            request.declared_components
        );
    }

    if request.smask_in_data {
        debug!("soft mask data is stored with the image");
    }

    extract::extract(&image, sink)
}

/// Decode an image with OpenJPEG into packed bytes.
///
/// Warnings and errors are reported through the `log` crate.
#[cfg(feature = "openjpeg")]
pub fn decode(request: &DecodeRequest<'_>) -> Result<ImageData> {
    let mut diagnostics = LogDiagnostics::new();
    let mut data = ImageData::new();

    decode_with(&OpenJpeg, request, &mut diagnostics, &mut data)?;

    Ok(data)
}
