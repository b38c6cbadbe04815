//! An [`Engine`] backed by the OpenJPEG library.
//!
//! All three handles own exactly one OpenJPEG object and destroy it when dropped.
//! Codec contexts are independent of each other, so separate threads may decode
//! concurrently with their own handles.

use crate::engine::{Component, DecodeParameters, DecodedImage, Engine, MessageHandler};
use crate::format::CodecFormat;
use core::ffi::{CStr, c_char, c_void};
use core::marker::PhantomData;
use core::ptr::{self, NonNull};
use core::{mem, slice};
use openjpeg_sys as sys;

/// Ignore the palette, component mapping and channel definition boxes.
const IGNORE_PCLR_CMAP_CDEF_FLAG: u32 = 0x0001;

/// The OpenJPEG decoding engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenJpeg;

/// An OpenJPEG codec, together with the message handler registered on it.
pub struct Codec<'h> {
    ptr: NonNull<sys::opj_codec_t>,
    // Boxed so that the address handed to OpenJPEG stays stable.
    handler: Option<Box<&'h dyn MessageHandler>>,
}

impl Drop for Codec<'_> {
    fn drop(&mut self) {
        // SAFETY: The codec was created by `opj_create_decompress` and is destroyed once.
        unsafe { sys::opj_destroy_codec(self.ptr.as_ptr()) }
    }
}

/// An OpenJPEG input stream reading from a borrowed slice.
pub struct Stream<'d> {
    ptr: NonNull<sys::opj_stream_t>,
    _data: PhantomData<&'d [u8]>,
}

impl Drop for Stream<'_> {
    fn drop(&mut self) {
        // SAFETY: The stream was created by `opj_stream_default_create`. Destroying it
        // also releases the reader through `free_reader`.
        unsafe { sys::opj_stream_destroy(self.ptr.as_ptr()) }
    }
}

/// An image decoded by OpenJPEG.
pub struct Image {
    ptr: NonNull<sys::opj_image_t>,
}

impl Image {
    fn raw(&self) -> &sys::opj_image_t {
        // SAFETY: The pointer stays valid until the image is dropped.
        unsafe { self.ptr.as_ref() }
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        // SAFETY: The image was allocated by `opj_read_header` and is destroyed once.
        unsafe { sys::opj_image_destroy(self.ptr.as_ptr()) }
    }
}

impl DecodedImage for Image {
    fn width(&self) -> u32 {
        let raw = self.raw();
        raw.x1.saturating_sub(raw.x0)
    }

    fn height(&self) -> u32 {
        let raw = self.raw();
        raw.y1.saturating_sub(raw.y0)
    }

    fn components(&self) -> Vec<Component<'_>> {
        let raw = self.raw();

        if raw.comps.is_null() || raw.numcomps == 0 {
            return vec![];
        }

        // SAFETY: `comps` points to `numcomps` initialized component descriptions.
        let comps = unsafe { slice::from_raw_parts(raw.comps, raw.numcomps as usize) };

        comps
            .iter()
            .map(|comp| {
                let len = (comp.w as usize).checked_mul(comp.h as usize);

                let samples = match len {
                    Some(len) if !comp.data.is_null() => {
                        // SAFETY: A decoded component holds `w * h` samples.
                        unsafe { slice::from_raw_parts(comp.data, len) }
                    }
                    _ => &[],
                };

                Component {
                    precision: comp.prec,
                    signed: comp.sgnd != 0,
                    alpha: comp.alpha != 0,
                    width: comp.w,
                    height: comp.h,
                    samples,
                }
            })
            .collect()
    }

    fn discard_color_profile(&mut self) -> usize {
        // SAFETY: We have exclusive access to the image.
        let raw = unsafe { self.ptr.as_mut() };

        if raw.icc_profile_buf.is_null() {
            return 0;
        }

        let len = raw.icc_profile_len as usize;

        // SAFETY: OpenJPEG allocates the profile with the C allocator, and the
        // pointer is reset so that `opj_image_destroy` won't free it again.
        unsafe { libc::free(raw.icc_profile_buf.cast::<c_void>()) };
        raw.icc_profile_buf = ptr::null_mut();
        raw.icc_profile_len = 0;

        len
    }
}

impl Engine for OpenJpeg {
    type Codec<'h> = Codec<'h>;
    type Stream<'d> = Stream<'d>;
    type Image = Image;

    fn create_decompress<'h>(&self, format: CodecFormat) -> Option<Codec<'h>> {
        let format = match format {
            CodecFormat::J2k => sys::CODEC_FORMAT::OPJ_CODEC_J2K,
            CodecFormat::Jp2 => sys::CODEC_FORMAT::OPJ_CODEC_JP2,
        };

        // SAFETY: No preconditions.
        let ptr = NonNull::new(unsafe { sys::opj_create_decompress(format) })?;

        Some(Codec { ptr, handler: None })
    }

    fn set_message_handlers<'h>(
        &self,
        codec: &mut Codec<'h>,
        handler: &'h dyn MessageHandler,
    ) -> bool {
        let handler = codec.handler.insert(Box::new(handler));
        let user_data = ptr::from_ref::<&dyn MessageHandler>(&**handler)
            .cast_mut()
            .cast::<c_void>();
        let codec = codec.ptr.as_ptr();

        // SAFETY: `user_data` is owned by the codec and outlives every callback.
        unsafe {
            sys::opj_set_info_handler(codec, Some(info_callback), user_data) != 0
                && sys::opj_set_warning_handler(codec, Some(warning_callback), user_data) != 0
                && sys::opj_set_error_handler(codec, Some(error_callback), user_data) != 0
        }
    }

    fn open_stream<'d>(&self, data: &'d [u8]) -> Option<Stream<'d>> {
        // SAFETY: No preconditions. A non-zero argument creates an input stream.
        let ptr = NonNull::new(unsafe { sys::opj_stream_default_create(1) })?;
        let stream = Stream {
            ptr,
            _data: PhantomData,
        };

        let reader = Box::into_raw(Box::new(SliceReader { data, offset: 0 }));
        let raw = stream.ptr.as_ptr();

        // SAFETY: The stream takes ownership of the reader and frees it on destruction.
        unsafe {
            sys::opj_stream_set_user_data(raw, reader.cast::<c_void>(), Some(free_reader));
            sys::opj_stream_set_user_data_length(raw, data.len() as u64);
            sys::opj_stream_set_read_function(raw, Some(read_reader));
            sys::opj_stream_set_skip_function(raw, Some(skip_reader));
            sys::opj_stream_set_seek_function(raw, Some(seek_reader));
        }

        Some(stream)
    }

    fn setup_decoder(&self, codec: &mut Codec<'_>, parameters: &DecodeParameters) -> bool {
        // SAFETY: An all-zero value is valid for this plain C struct, and it is
        // initialized right away.
        let mut raw: sys::opj_dparameters_t = unsafe { mem::zeroed() };
        // SAFETY: `raw` is a valid parameter struct.
        unsafe { sys::opj_set_default_decoder_parameters(&mut raw) };

        if parameters.ignore_palette_metadata {
            raw.flags |= IGNORE_PCLR_CMAP_CDEF_FLAG;
        }

        // SAFETY: Both pointers are valid for the duration of the call.
        unsafe { sys::opj_setup_decoder(codec.ptr.as_ptr(), &mut raw) != 0 }
    }

    fn read_header(
        &self,
        codec: &mut Codec<'_>,
        stream: &mut Stream<'_>,
    ) -> Result<Image, Option<Image>> {
        let mut raw = ptr::null_mut();

        // SAFETY: Codec and stream are alive. On return, `raw` is either null or
        // an image we own.
        let ok = unsafe {
            sys::opj_read_header(stream.ptr.as_ptr(), codec.ptr.as_ptr(), &mut raw) != 0
        };
        let image = NonNull::new(raw).map(|ptr| Image { ptr });

        match (ok, image) {
            (true, Some(image)) => Ok(image),
            (_, partial) => Err(partial),
        }
    }

    fn decode(&self, codec: &mut Codec<'_>, stream: &mut Stream<'_>, image: &mut Image) -> bool {
        // SAFETY: All three handles are alive.
        unsafe {
            sys::opj_decode(codec.ptr.as_ptr(), stream.ptr.as_ptr(), image.ptr.as_ptr()) != 0
        }
    }

    fn end_decompress(&self, codec: &mut Codec<'_>, stream: &mut Stream<'_>) -> bool {
        // SAFETY: Both handles are alive.
        unsafe { sys::opj_end_decompress(codec.ptr.as_ptr(), stream.ptr.as_ptr()) != 0 }
    }
}

/// # Safety
///
/// `user_data` must point to the handler stored in a live [`Codec`] and `msg` must
/// be null or a NUL-terminated string.
unsafe fn forward(msg: *const c_char, user_data: *mut c_void, f: fn(&dyn MessageHandler, &str)) {
    if msg.is_null() || user_data.is_null() {
        return;
    }

    // SAFETY: Guaranteed by the caller.
    let (handler, msg) = unsafe {
        (
            *user_data.cast::<&dyn MessageHandler>().cast_const(),
            CStr::from_ptr(msg),
        )
    };

    f(handler, &msg.to_string_lossy());
}

unsafe extern "C" fn info_callback(msg: *const c_char, user_data: *mut c_void) {
    // SAFETY: Registered in `set_message_handlers`.
    unsafe { forward(msg, user_data, |h, m| h.on_info(m)) }
}

unsafe extern "C" fn warning_callback(msg: *const c_char, user_data: *mut c_void) {
    // SAFETY: Registered in `set_message_handlers`.
    unsafe { forward(msg, user_data, |h, m| h.on_warning(m)) }
}

unsafe extern "C" fn error_callback(msg: *const c_char, user_data: *mut c_void) {
    // SAFETY: Registered in `set_message_handlers`.
    unsafe { forward(msg, user_data, |h, m| h.on_error(m)) }
}

/// The user data of a [`Stream`].
struct SliceReader<'d> {
    data: &'d [u8],
    offset: usize,
}

/// # Safety
///
/// `user_data` must be a reader created in `open_stream`.
unsafe fn reader<'a>(user_data: *mut c_void) -> &'a mut SliceReader<'a> {
    // SAFETY: Guaranteed by the caller.
    unsafe { &mut *user_data.cast::<SliceReader<'a>>() }
}

unsafe extern "C" fn read_reader(
    buffer: *mut c_void,
    len: sys::OPJ_SIZE_T,
    user_data: *mut c_void,
) -> sys::OPJ_SIZE_T {
    // SAFETY: Installed together with the reader in `open_stream`.
    let reader = unsafe { reader(user_data) };
    let remaining = reader.data.get(reader.offset..).unwrap_or_default();

    if remaining.is_empty() {
        // End of stream.
        return sys::OPJ_SIZE_T::MAX;
    }

    let len = len.min(remaining.len());

    // SAFETY: OpenJPEG passes a buffer of at least `len` bytes.
    unsafe { ptr::copy_nonoverlapping(remaining.as_ptr(), buffer.cast::<u8>(), len) };
    reader.offset += len;

    len
}

unsafe extern "C" fn skip_reader(len: sys::OPJ_OFF_T, user_data: *mut c_void) -> sys::OPJ_OFF_T {
    // SAFETY: Installed together with the reader in `open_stream`.
    let reader = unsafe { reader(user_data) };
    let current = reader.offset as i64;
    let target = current.saturating_add(len).clamp(0, reader.data.len() as i64);

    reader.offset = target as usize;

    target - current
}

unsafe extern "C" fn seek_reader(offset: sys::OPJ_OFF_T, user_data: *mut c_void) -> sys::OPJ_BOOL {
    // SAFETY: Installed together with the reader in `open_stream`.
    let reader = unsafe { reader(user_data) };

    match usize::try_from(offset) {
        Ok(offset) if offset <= reader.data.len() => {
            reader.offset = offset;
            1
        }
        _ => 0,
    }
}

unsafe extern "C" fn free_reader(user_data: *mut c_void) {
    if !user_data.is_null() {
        // SAFETY: The reader was leaked from a box in `open_stream`.
        drop(unsafe { Box::from_raw(user_data.cast::<SliceReader<'_>>()) });
    }
}
