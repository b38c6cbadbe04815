//! Handing decoded component planes to the host.

use crate::engine::{Component, DecodedImage};
use crate::error::{DecodeError, Result};
use crate::host::{PixelSink, Plane};
use log::debug;

/// Deliver the planes of a decoded image to `sink`.
///
/// Exactly one delivery method of the sink is called, chosen by the number of
/// components. Each plane holds the first `width * height` samples of its component.
pub(crate) fn extract<I, S>(image: &I, sink: &mut S) -> Result<()>
where
    I: DecodedImage + ?Sized,
    S: PixelSink + ?Sized,
{
    let width = image.width();
    let height = image.height();
    let pixel_count = (width as usize)
        .checked_mul(height as usize)
        .ok_or(DecodeError::ImageTooLarge)?;

    let components = image.components();
    debug!(
        "extracting {} component(s) of {width}x{height}",
        components.len()
    );

    match components.as_slice() {
        [c] => {
            sink.begin(width, height);
            sink.single_plane(plane(c, pixel_count)?, pixel_count)
        }
        [c0, c1, c2] => {
            let planes = [
                plane(c0, pixel_count)?,
                plane(c1, pixel_count)?,
                plane(c2, pixel_count)?,
            ];
            sink.begin(width, height);
            sink.three_planes(planes, pixel_count)
        }
        [c0, c1, c2, c3] => {
            let planes = [
                plane(c0, pixel_count)?,
                plane(c1, pixel_count)?,
                plane(c2, pixel_count)?,
                plane(c3, pixel_count)?,
            ];
            sink.begin(width, height);
            sink.four_planes(planes, pixel_count)
        }
        other => Err(DecodeError::UnsupportedComponentCount(
            u32::try_from(other.len()).unwrap_or(u32::MAX),
        )),
    }
}

fn plane<'a>(component: &Component<'a>, pixel_count: usize) -> Result<Plane<'a>> {
    let samples = component
        .samples
        .get(..pixel_count)
        .ok_or(DecodeError::IncompletePlane)?;

    Ok(Plane {
        samples,
        precision: component.precision,
    })
}
