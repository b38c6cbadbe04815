//! The decoder session: drives the engine from raw bytes to a decoded image.

use crate::DecodeRequest;
use crate::engine::{DecodeParameters, DecodedImage, Engine, MessageHandler};
use crate::error::{DecodeError, Result};
use crate::format::classify;
use log::debug;

/// Engine resources acquired during a single decode call.
///
/// Fields are dropped in declaration order, so on every exit path the stream is
/// released before the codec and the image is released last.
struct DecodeSession<'h, 'd, E: Engine> {
    stream: Option<E::Stream<'d>>,
    codec: Option<E::Codec<'h>>,
    image: Option<E::Image>,
}

impl<E: Engine> DecodeSession<'_, '_, E> {
    fn new() -> Self {
        Self {
            stream: None,
            codec: None,
            image: None,
        }
    }

    /// Release the stream and the codec and hand out the image.
    fn finish(mut self) -> Option<E::Image> {
        self.stream = None;
        self.codec = None;

        self.image.take()
    }
}

/// Decode the image described by `request`, reporting engine messages to `handler`.
pub(crate) fn decode<'h, E: Engine>(
    engine: &E,
    request: &DecodeRequest<'_>,
    handler: &'h dyn MessageHandler,
) -> Result<E::Image> {
    let kind = classify(request.data);
    let format = kind.codec_format().ok_or(DecodeError::UnknownFormat)?;
    debug!("decoding {kind:?} of {} bytes", request.data.len());

    let mut session = DecodeSession::<'h, '_, E>::new();

    let codec = engine
        .create_decompress(format)
        .ok_or(DecodeError::DecoderSetupFailed)?;
    let codec = session.codec.insert(codec);

    // Before anything else, so that no message is lost.
    if !engine.set_message_handlers(codec, handler) {
        return Err(DecodeError::DecoderSetupFailed);
    }

    let mut parameters = DecodeParameters::default();

    if request.ignore_palette_metadata {
        parameters.ignore_palette_metadata = true;
    }

    let stream = engine
        .open_stream(request.data)
        .ok_or(DecodeError::DecoderSetupFailed)?;
    let stream = session.stream.insert(stream);

    if !engine.setup_decoder(codec, &parameters) {
        return Err(DecodeError::DecoderSetupFailed);
    }

    let image = match engine.read_header(codec, stream) {
        Ok(image) => session.image.insert(image),
        Err(partial) => {
            // Released last, together with the stream and the codec.
            session.image = partial;
            return Err(DecodeError::HeaderReadFailed);
        }
    };
    debug!("read header");

    if !engine.decode(codec, stream, image) || !engine.end_decompress(codec, stream) {
        return Err(DecodeError::DecodeFailed);
    }

    let mut image = session.finish().ok_or(DecodeError::DecodeFailed)?;

    let released = image.discard_color_profile();
    if released > 0 {
        debug!("released {released} bytes of ICC profile data");
    }

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::mock::{MockEngine, Resource, Step, outstanding, releases};
    use crate::format::{CodecFormat, J2K_CODESTREAM_MAGIC, JP2_RFC3745_MAGIC};
    use crate::relay::Relay;
    use crate::relay::tests::Recorder;

    fn codestream() -> Vec<u8> {
        let mut data = J2K_CODESTREAM_MAGIC.to_vec();
        data.resize(64, 0);
        data
    }

    fn run(engine: &MockEngine, request: &DecodeRequest<'_>, recorder: &mut Recorder) -> Result<()> {
        let relay = Relay::new(recorder);
        decode(engine, request, &relay).map(|_| ())
    }

    #[test]
    fn unknown_format_acquires_nothing() {
        let engine = MockEngine::gray(2, 2);
        let mut recorder = Recorder::default();
        let data = [0_u8; 32];

        let result = run(&engine, &DecodeRequest::new(&data), &mut recorder);

        assert_eq!(result, Err(DecodeError::UnknownFormat));
        assert!(engine.ledger.borrow().is_empty());
        assert_eq!(*engine.seen_format.borrow(), None);
    }

    #[test]
    fn selects_codec_format() {
        let engine = MockEngine::gray(2, 2);
        let mut recorder = Recorder::default();

        let data = codestream();
        run(&engine, &DecodeRequest::new(&data), &mut recorder).unwrap();
        assert_eq!(*engine.seen_format.borrow(), Some(CodecFormat::J2k));

        let mut data = JP2_RFC3745_MAGIC.concat();
        data.resize(64, 0);
        run(&engine, &DecodeRequest::new(&data), &mut recorder).unwrap();
        assert_eq!(*engine.seen_format.borrow(), Some(CodecFormat::Jp2));
    }

    #[test]
    fn success_releases_stream_and_codec_before_returning_image() {
        let engine = MockEngine::gray(3, 2);
        let mut recorder = Recorder::default();
        let data = codestream();

        let relay = Relay::new(&mut recorder);
        let image = decode(&engine, &DecodeRequest::new(&data), &relay).unwrap();

        assert_eq!(releases(&engine.ledger), vec![Resource::Stream, Resource::Codec]);
        assert_eq!(outstanding(&engine.ledger), 1);
        assert_eq!(image.width(), 3);
        assert_eq!(image.components().len(), 1);

        drop(image);
        assert_eq!(outstanding(&engine.ledger), 0);
    }

    #[test]
    fn color_profile_is_released_after_decode() {
        let mut engine = MockEngine::gray(1, 1);
        engine.with_profile = true;
        let mut recorder = Recorder::default();
        let data = codestream();

        let relay = Relay::new(&mut recorder);
        let image = decode(&engine, &DecodeRequest::new(&data), &relay).unwrap();

        assert_eq!(
            releases(&engine.ledger),
            vec![Resource::Stream, Resource::Codec, Resource::ColorProfile]
        );

        drop(image);
        assert_eq!(outstanding(&engine.ledger), 0);
    }

    #[test]
    fn every_failure_releases_what_was_acquired() {
        let cases = [
            (Step::CreateCodec, DecodeError::DecoderSetupFailed, vec![]),
            (
                Step::SetHandlers,
                DecodeError::DecoderSetupFailed,
                vec![Resource::Codec],
            ),
            (
                Step::OpenStream,
                DecodeError::DecoderSetupFailed,
                vec![Resource::Codec],
            ),
            (
                Step::Setup,
                DecodeError::DecoderSetupFailed,
                vec![Resource::Stream, Resource::Codec],
            ),
            (
                Step::ReadHeader,
                DecodeError::HeaderReadFailed,
                vec![Resource::Stream, Resource::Codec, Resource::Image],
            ),
            (
                Step::Decode,
                DecodeError::DecodeFailed,
                vec![Resource::Stream, Resource::Codec, Resource::Image],
            ),
            (
                Step::EndDecompress,
                DecodeError::DecodeFailed,
                vec![Resource::Stream, Resource::Codec, Resource::Image],
            ),
        ];

        let data = codestream();

        for (step, expected, released) in cases {
            let engine = MockEngine::gray(2, 2).failing_at(step);
            let mut recorder = Recorder::default();

            let result = run(&engine, &DecodeRequest::new(&data), &mut recorder);

            assert_eq!(result, Err(expected), "{step:?}");
            assert_eq!(releases(&engine.ledger), released, "{step:?}");
            assert_eq!(outstanding(&engine.ledger), 0, "{step:?}");
        }
    }

    #[test]
    fn repeated_failures_do_not_accumulate() {
        let engine = MockEngine::gray(2, 2).failing_at(Step::Decode);
        let data = codestream();

        for _ in 0..16 {
            let mut recorder = Recorder::default();
            let _ = run(&engine, &DecodeRequest::new(&data), &mut recorder);
            assert_eq!(outstanding(&engine.ledger), 0);
        }

        assert_eq!(engine.ledger.borrow().len(), 16 * 6);
    }

    #[test]
    fn palette_hint_reaches_engine() {
        let data = codestream();
        let mut recorder = Recorder::default();

        let engine = MockEngine::gray(1, 1);
        run(&engine, &DecodeRequest::new(&data), &mut recorder).unwrap();
        assert_eq!(
            *engine.seen_parameters.borrow(),
            Some(DecodeParameters::default())
        );

        let engine = MockEngine::gray(1, 1);
        let mut request = DecodeRequest::new(&data);
        request.ignore_palette_metadata = true;
        run(&engine, &request, &mut recorder).unwrap();
        assert_eq!(
            *engine.seen_parameters.borrow(),
            Some(DecodeParameters {
                ignore_palette_metadata: true
            })
        );
    }

    #[test]
    fn engine_messages_are_relayed_live() {
        let mut engine = MockEngine::gray(1, 1).failing_at(Step::Decode);
        engine.messages = vec![
            (0, "Start to read j2k main header (0).\n"),
            (1, "Empty SOT marker detected: Psot=12.\n"),
            (2, "Stream too short\n"),
        ];
        let mut recorder = Recorder::default();
        let data = codestream();

        let result = run(&engine, &DecodeRequest::new(&data), &mut recorder);

        assert_eq!(result, Err(DecodeError::DecodeFailed));
        assert_eq!(recorder.warnings, vec!["Empty SOT marker detected: Psot=12.\n"]);
        assert_eq!(recorder.last_error(), Some("Stream too short\n"));
    }
}
