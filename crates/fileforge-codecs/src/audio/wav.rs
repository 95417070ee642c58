//! Canonical 16-bit PCM WAV encoding.
//!
//! Layout (all integers little-endian):
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | `RIFF` |
//! | 4 | 4 | `36 + data_len` |
//! | 8 | 4 | `WAVE` |
//! | 12 | 4 | `fmt ` |
//! | 16 | 4 | `16` |
//! | 20 | 2 | `1` (PCM) |
//! | 22 | 2 | channels |
//! | 24 | 4 | sample rate |
//! | 28 | 4 | `sample_rate * channels * 2` |
//! | 32 | 2 | `channels * 2` |
//! | 34 | 2 | `16` |
//! | 36 | 4 | `data` |
//! | 40 | 4 | `data_len = frames * channels * 2` |

use fileforge_core::{ConvertError, ConvertResult};

/// Size of the canonical header.
pub const WAV_HEADER_LEN: usize = 44;

/// Progress is reported every this many frames while encoding.
const PROGRESS_INTERVAL: usize = 10_000;

/// Decoded audio as planar `f32` samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PcmBuffer {
    /// Frames per second.
    pub sample_rate: u32,
    /// One sample vector per channel, all the same length.
    pub channels: Vec<Vec<f32>>,
}

impl PcmBuffer {
    /// Create an empty buffer with `channels` channels.
    pub fn new(sample_rate: u32, channels: usize) -> Self {
        Self {
            sample_rate,
            channels: vec![Vec::new(); channels],
        }
    }

    /// Number of channels.
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Samples per channel.
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Append interleaved samples.
    pub fn push_interleaved(&mut self, samples: &[f32]) {
        let count = self.channel_count();
        if count == 0 {
            return;
        }
        for frame in samples.chunks_exact(count) {
            for (channel, sample) in self.channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }
    }
}

/// Quantize one float sample to signed 16-bit.
///
/// Clamped to `[-1, 1]`, negatives scaled by 32768, the rest by 32767,
/// truncated toward zero.
pub fn quantize(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode `pcm` as a WAV file.
///
/// `on_progress` receives the encoded fraction in `0..=1`, every
/// 10,000 frames and once more at the end.
pub fn encode_wav(pcm: &PcmBuffer, mut on_progress: impl FnMut(f64)) -> ConvertResult<Vec<u8>> {
    let channels = pcm.channel_count();
    let frames = pcm.frames();

    if pcm.channels.iter().any(|c| c.len() != frames) {
        return Err(ConvertError::encode("Audio channels have unequal lengths"));
    }
    let channel_count = u16::try_from(channels)
        .map_err(|_| ConvertError::encode(format!("Too many audio channels: {channels}")))?;
    let data_len = frames
        .checked_mul(channels)
        .and_then(|n| n.checked_mul(2))
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| n.checked_add(36).is_some())
        .ok_or_else(|| ConvertError::encode("Audio is too long for a WAV file"))?;
    let byte_rate = pcm
        .sample_rate
        .checked_mul(u32::from(channel_count) * 2)
        .ok_or_else(|| ConvertError::encode("Sample rate is too high for a WAV file"))?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&channel_count.to_le_bytes());
    out.extend_from_slice(&pcm.sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&(channel_count * 2).to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..frames {
        if i % PROGRESS_INTERVAL == 0 {
            on_progress(i as f64 / frames as f64);
        }
        for channel in &pcm.channels {
            out.extend_from_slice(&quantize(channel[i]).to_le_bytes());
        }
    }
    on_progress(1.0);

    Ok(out)
}

/// Fields read back from a canonical WAV header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub riff_len: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Parse the 44-byte canonical header at the start of `bytes`.
    pub fn parse(bytes: &[u8]) -> ConvertResult<Self> {
        if bytes.len() < WAV_HEADER_LEN {
            return Err(ConvertError::decode("WAV data is shorter than its header"));
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(ConvertError::decode("Not a RIFF/WAVE file"));
        }
        if &bytes[12..16] != b"fmt " || &bytes[36..40] != b"data" {
            return Err(ConvertError::decode("WAV header is not in canonical layout"));
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        if u16_at(20) != 1 {
            return Err(ConvertError::decode("WAV data is not PCM"));
        }

        Ok(Self {
            riff_len: u32_at(4),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_len: u32_at(40),
        })
    }

    /// Frames described by the header.
    pub fn frames(&self) -> u32 {
        match self.block_align {
            0 => 0,
            align => self.data_len / u32::from(align),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stereo(frames: usize) -> PcmBuffer {
        PcmBuffer {
            sample_rate: 44_100,
            channels: vec![vec![0.25; frames], vec![-0.25; frames]],
        }
    }

    #[test]
    fn test_header_fields() {
        let wav = encode_wav(&stereo(1000), |_| {}).expect("encode");
        assert_eq!(wav.len(), WAV_HEADER_LEN + 4000);

        let header = WavHeader::parse(&wav).expect("parse");
        assert_eq!(header.riff_len, 4036);
        assert_eq!(header.channels, 2);
        assert_eq!(header.sample_rate, 44_100);
        assert_eq!(header.byte_rate, 44_100 * 4);
        assert_eq!(header.block_align, 4);
        assert_eq!(header.bits_per_sample, 16);
        assert_eq!(header.data_len, 4000);
        assert_eq!(header.frames(), 1000);
    }

    #[test]
    fn test_quantize() {
        assert_eq!(quantize(1.0), 32767);
        assert_eq!(quantize(-1.0), -32768);
        assert_eq!(quantize(2.5), 32767);
        assert_eq!(quantize(-7.0), -32768);
        assert_eq!(quantize(0.5), 16383);
        assert_eq!(quantize(-0.5), -16384);
        assert_eq!(quantize(f32::NAN), 0);
    }

    #[test]
    fn test_samples_interleaved() {
        let pcm = PcmBuffer {
            sample_rate: 8_000,
            channels: vec![vec![1.0, 0.0], vec![-1.0, 0.5]],
        };
        let wav = encode_wav(&pcm, |_| {}).expect("encode");
        let data: Vec<i16> = wav[WAV_HEADER_LEN..]
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(data, vec![32767, -32768, 0, 16383]);
    }

    #[test]
    fn test_progress_interval() {
        let mut seen = Vec::new();
        encode_wav(&stereo(25_000), |f| seen.push(f)).expect("encode");
        assert_eq!(seen, vec![0.0, 0.4, 0.8, 1.0]);
    }

    #[test]
    fn test_push_interleaved() {
        let mut pcm = PcmBuffer::new(48_000, 2);
        pcm.push_interleaved(&[0.1, 0.2, 0.3, 0.4]);
        assert_eq!(pcm.frames(), 2);
        assert_eq!(pcm.channels[1], vec![0.2, 0.4]);
    }

    #[test]
    fn test_rejects_non_riff() {
        assert!(WavHeader::parse(&[0u8; 44]).is_err());
        assert!(WavHeader::parse(b"RIFF").is_err());
    }
}
