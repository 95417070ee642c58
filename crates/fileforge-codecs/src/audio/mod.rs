//! Audio adapter: decode any container symphonia understands to PCM, then
//! re-encode as 16-bit WAV.

pub mod wav;

use std::io::Cursor;

use async_trait::async_trait;
use bytes::Bytes;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use fileforge_core::types::{Blob, Category, normalize_format};
use fileforge_core::{ConvertError, ConvertResult, ErrorKind, ProgressReporter};

use crate::adapter::{ConversionRequest, FormatAdapter};
use crate::blocking::run_blocking;
use crate::context::SlotContext;

pub use wav::{PcmBuffer, WAV_HEADER_LEN, WavHeader, encode_wav};

/// Transcodes compressed audio to WAV.
#[derive(Debug, Default)]
pub struct AudioAdapter;

impl AudioAdapter {
    /// Create the adapter.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FormatAdapter for AudioAdapter {
    fn category(&self) -> Category {
        Category::Audio
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        if normalize_format(&request.output_format) != "wav" {
            return Err(ConvertError::unsupported_pair(
                &request.input_format(),
                &request.output_format,
            ));
        }

        let bytes = request.file.bytes.clone();
        let extension = request.file.extension();
        progress.report(10.0);

        let pcm = run_blocking(move || decode_pcm(bytes, extension.as_deref())).await?;
        debug!(
            file = %request.file.name,
            sample_rate = pcm.sample_rate,
            channels = pcm.channel_count(),
            frames = pcm.frames(),
            "Decoded audio"
        );
        progress.report(40.0);
        progress.report(50.0);

        let encode_progress = progress.scaled(50.0, 0.45);
        let wav = run_blocking(move || {
            encode_wav(&pcm, |fraction| encode_progress.report(fraction * 100.0))
        })
        .await?;
        progress.finish();

        Ok(Blob::new(wav, "audio/wav"))
    }
}

/// Decode the first audio track of `bytes` into planar PCM.
pub fn decode_pcm(bytes: Bytes, extension: Option<&str>) -> ConvertResult<PcmBuffer> {
    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| decode_error("Unrecognized audio format", e))?;
    let mut reader = probed.format;

    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| ConvertError::decode("No decodable audio track found"))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| decode_error("Unsupported audio codec", e))?;

    let mut pcm: Option<PcmBuffer> = None;

    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(decode_error("Failed to read audio packet", e)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                let mut samples = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                samples.copy_interleaved_ref(decoded);
                pcm.get_or_insert_with(|| PcmBuffer::new(spec.rate, spec.channels.count()))
                    .push_interleaved(samples.samples());
            }
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable audio packet: {}", e);
            }
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(e) => return Err(decode_error("Failed to decode audio", e)),
        }
    }

    pcm.ok_or_else(|| ConvertError::decode("Audio track contains no samples"))
}

fn decode_error(context: &str, err: SymphoniaError) -> ConvertError {
    ConvertError::with_source(ErrorKind::DecodeFailure, format!("{context}: {err}"), err)
}
