//! Audio decoder using Symphonia
//!
//! Provides `SymphoniaSource`, which decodes a media file into blocks of
//! stereo f32 frames.

use std::fs::File;
use std::path::Path;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::{Hint, ProbeResult};

use crate::config::audio::DEFAULT_SAMPLE_RATE;
use crate::config::timeouts::PROBE_TIMEOUT_SECS;
use crate::error::{PlayerError, Result};

use super::source::BlockSource;
use super::types::{CodecInfo, Frame, Pull};

/// Convert a symphonia codec type to a human-readable name
pub fn codec_type_to_name(codec: symphonia::core::codecs::CodecType) -> String {
    use symphonia::core::codecs::*;
    match codec {
        CODEC_TYPE_AAC => "AAC".to_string(),
        CODEC_TYPE_FLAC => "FLAC".to_string(),
        CODEC_TYPE_MP3 => "MP3".to_string(),
        CODEC_TYPE_OPUS => "Opus".to_string(),
        CODEC_TYPE_VORBIS => "Vorbis".to_string(),
        CODEC_TYPE_PCM_U8 => "PCM 8-bit".to_string(),
        CODEC_TYPE_PCM_S16LE | CODEC_TYPE_PCM_S16BE => "PCM 16-bit".to_string(),
        CODEC_TYPE_PCM_S24LE | CODEC_TYPE_PCM_S24BE => "PCM 24-bit".to_string(),
        CODEC_TYPE_PCM_S32LE | CODEC_TYPE_PCM_S32BE => "PCM 32-bit".to_string(),
        CODEC_TYPE_PCM_F32LE | CODEC_TYPE_PCM_F32BE => "PCM 32-bit Float".to_string(),
        CODEC_TYPE_PCM_F64LE | CODEC_TYPE_PCM_F64BE => "PCM 64-bit Float".to_string(),
        CODEC_TYPE_PCM_ALAW => "PCM A-law".to_string(),
        CODEC_TYPE_PCM_MULAW => "PCM u-law".to_string(),
        CODEC_TYPE_ALAC => "ALAC".to_string(),
        _ => "Audio".to_string(),
    }
}

/// Spawn a probe thread and return the receiver immediately (non-blocking).
///
/// The probe runs on a background `"symphonia-probe"` thread so a malformed
/// file cannot hang the caller past its timeout.
pub fn start_probe(
    media: Box<dyn MediaSource>,
    format_hint: Option<String>,
) -> Result<Receiver<Result<ProbeResult>>> {
    let mss = MediaSourceStream::new(media, Default::default());

    let format_opts = FormatOptions::default();
    let metadata_opts = MetadataOptions::default();
    let mut hint = Hint::new();

    if let Some(ref ext) = format_hint {
        hint.with_extension(ext);
    }

    let (tx, rx) = crossbeam_channel::bounded(1);
    std::thread::Builder::new()
        .name("symphonia-probe".to_string())
        .spawn(move || {
            let probe = symphonia::default::get_probe();
            let result = probe.format(&hint, mss, &format_opts, &metadata_opts);
            let _ = tx.send(result.map_err(|e| PlayerError::Decode(format!("Probe error: {}", e))));
        })
        .map_err(|e| PlayerError::Audio(format!("Failed to spawn probe thread: {}", e)))?;

    Ok(rx)
}

/// Wait for a probe started with [`start_probe`]
pub fn wait_for_probe(rx: Receiver<Result<ProbeResult>>, timeout: Duration) -> Result<ProbeResult> {
    match rx.recv_timeout(timeout) {
        Ok(result) => result,
        Err(RecvTimeoutError::Timeout) => Err(PlayerError::Timeout(format!(
            "Format probe timed out after {}s",
            timeout.as_secs()
        ))),
        Err(RecvTimeoutError::Disconnected) => {
            Err(PlayerError::Decode("Probe thread panicked".to_string()))
        }
    }
}

/// A symphonia-based block source
pub struct SymphoniaSource {
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    format: Box<dyn symphonia::core::formats::FormatReader>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<f32>>,
    sample_idx: usize,
    channels: u16,
    sample_rate: u32,
    codec_name: String,
    bits_per_sample: Option<u32>,
    exhausted: bool,
    /// Last non-EOF error, reported once the stream has ended
    last_error: Option<String>,
}

impl SymphoniaSource {
    /// Open a file, using its extension as the format hint
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, DEFAULT_SAMPLE_RATE, Duration::from_secs(PROBE_TIMEOUT_SECS))
    }

    /// Open a file with an explicit fallback sample rate and probe timeout
    pub fn open_with(
        path: &Path,
        default_sample_rate: u32,
        probe_timeout: Duration,
    ) -> Result<Self> {
        let file = File::open(path)?;
        let hint = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        let rx = start_probe(Box::new(file), hint)?;
        let probed = wait_for_probe(rx, probe_timeout)?;
        Self::from_probed(probed, default_sample_rate)
    }

    /// Decode from any media source (an in-memory cursor, for instance)
    pub fn from_media(media: Box<dyn MediaSource>, format_hint: Option<&str>) -> Result<Self> {
        let rx = start_probe(media, format_hint.map(|s| s.to_string()))?;
        let probed = wait_for_probe(rx, Duration::from_secs(PROBE_TIMEOUT_SECS))?;
        Self::from_probed(probed, DEFAULT_SAMPLE_RATE)
    }

    /// Create a `SymphoniaSource` from a completed `ProbeResult` (fast, no I/O).
    pub fn from_probed(probed: ProbeResult, default_sample_rate: u32) -> Result<Self> {
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
            .ok_or_else(|| PlayerError::Decode("No audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| PlayerError::Decode(format!("Decoder creation error: {}", e)))?;

        let channels = codec_params.channels.map(|c| c.count() as u16).unwrap_or(2);
        let sample_rate = codec_params.sample_rate.unwrap_or(default_sample_rate);
        let bits_per_sample = codec_params.bits_per_sample;
        let codec_name = codec_type_to_name(codec_params.codec);

        let mut source = Self {
            decoder,
            format,
            track_id,
            sample_buf: None,
            sample_idx: 0,
            channels,
            sample_rate,
            codec_name,
            bits_per_sample,
            exhausted: false,
            last_error: None,
        };

        // Pre-decode the first packet so sample rate and channel count come
        // from real decoder output rather than container headers.
        if !source.decode_next_packet() {
            source.exhausted = true;
            if let Some(err) = source.last_error.take() {
                return Err(PlayerError::Decode(err));
            }
        }

        Ok(source)
    }

    /// Get the codec name (e.g., "MP3", "FLAC")
    pub fn codec_name(&self) -> &str {
        &self.codec_name
    }

    /// Get the bits per sample, if known
    pub fn bits_per_sample(&self) -> Option<u32> {
        self.bits_per_sample
    }

    /// Get full codec info as a `CodecInfo` struct
    pub fn codec_info(&self) -> CodecInfo {
        CodecInfo {
            codec_name: self.codec_name.clone(),
            channels: self.channels,
            sample_rate: self.sample_rate,
            bits_per_sample: self.bits_per_sample,
        }
    }

    fn decode_next_packet(&mut self) -> bool {
        loop {
            match self.format.next_packet() {
                Ok(packet) => {
                    if packet.track_id() != self.track_id {
                        continue;
                    }

                    match self.decoder.decode(&packet) {
                        Ok(decoded) => {
                            let spec = *decoded.spec();
                            let duration = decoded.capacity() as u64;
                            let needed = duration as usize * spec.channels.count();

                            self.sample_rate = spec.rate;
                            self.channels = spec.channels.count() as u16;

                            if self.sample_buf.as_ref().map_or(true, |b| b.capacity() < needed) {
                                self.sample_buf = Some(SampleBuffer::new(duration, spec));
                            }

                            if let Some(ref mut buf) = self.sample_buf {
                                buf.copy_interleaved_ref(decoded);
                                self.sample_idx = 0;
                                return true;
                            }
                        }
                        Err(symphonia::core::errors::Error::DecodeError(e)) => {
                            log::debug!("Skipping undecodable packet: {}", e);
                            continue;
                        }
                        Err(e) => {
                            self.last_error = Some(e.to_string());
                            return false;
                        }
                    }
                }
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    // Clean EOF, no error stored
                    return false;
                }
                Err(e) => {
                    self.last_error = Some(e.to_string());
                    return false;
                }
            }
        }
    }

    /// Copy decoded samples already in the buffer into `out`, returning frames copied
    fn copy_buffered(&mut self, out: &mut [Frame]) -> usize {
        let ch = self.channels.max(1) as usize;
        let Some(buf) = self.sample_buf.as_ref() else {
            return 0;
        };
        let samples = buf.samples().get(self.sample_idx..).unwrap_or(&[]);
        let n = (samples.len() / ch).min(out.len());

        for (dst, chunk) in out.iter_mut().zip(samples.chunks_exact(ch)).take(n) {
            *dst = if ch == 1 {
                [chunk[0], chunk[0]]
            } else {
                [chunk[0], chunk[1]]
            };
        }

        self.sample_idx += n * ch;
        n
    }
}

impl BlockSource for SymphoniaSource {
    fn pull(&mut self, block: &mut [Frame]) -> Pull {
        let mut written = 0;
        while written < block.len() {
            let n = self.copy_buffered(&mut block[written..]);
            written += n;
            if n > 0 {
                continue;
            }
            if self.exhausted || !self.decode_next_packet() {
                self.exhausted = true;
                break;
            }
        }

        if written == 0 {
            Pull::end()
        } else {
            Pull::more(written)
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channels(&self) -> u16 {
        self.channels
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build a minimal valid WAV file in memory
    pub(crate) fn make_wav(sample_rate: u32, channels: u16, samples: &[i16]) -> Vec<u8> {
        let bits_per_sample: u16 = 16;
        let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
        let block_align = channels * (bits_per_sample / 8);
        let data_size = (samples.len() * 2) as u32;
        let file_size = 36 + data_size;

        let mut buf = Vec::new();
        // RIFF header
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&file_size.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        // fmt chunk
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
        buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
        buf.extend_from_slice(&channels.to_le_bytes());
        buf.extend_from_slice(&sample_rate.to_le_bytes());
        buf.extend_from_slice(&byte_rate.to_le_bytes());
        buf.extend_from_slice(&block_align.to_le_bytes());
        buf.extend_from_slice(&bits_per_sample.to_le_bytes());
        // data chunk
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&data_size.to_le_bytes());
        for &s in samples {
            buf.extend_from_slice(&s.to_le_bytes());
        }
        buf
    }

    fn source_from(wav: Vec<u8>) -> Result<SymphoniaSource> {
        SymphoniaSource::from_media(Box::new(Cursor::new(wav)), Some("wav"))
    }

    fn drain(source: &mut SymphoniaSource, block_len: usize) -> Vec<Frame> {
        let mut out = Vec::new();
        let mut block = vec![[0.0; 2]; block_len];
        loop {
            let pull = source.pull(&mut block);
            if !pull.has_more {
                assert_eq!(pull.frames, 0);
                break;
            }
            assert!(pull.frames <= block_len);
            out.extend_from_slice(&block[..pull.frames]);
        }
        out
    }

    // --- Basic decoding ---

    #[test]
    fn decode_wav_mono() {
        let samples: Vec<i16> = (0..1000).map(|i| (i % 100 * 100) as i16).collect();
        let source = source_from(make_wav(44100, 1, &samples)).unwrap();

        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), 44100);
    }

    #[test]
    fn decode_wav_stereo() {
        let samples: Vec<i16> = (0..2000).map(|i| (i % 200 * 50) as i16).collect();
        let source = source_from(make_wav(48000, 2, &samples)).unwrap();

        assert_eq!(source.channels(), 2);
        assert_eq!(source.sample_rate(), 48000);
    }

    // --- Block pulling ---

    #[test]
    fn pull_mono_duplicates_into_both_slots() {
        let samples: Vec<i16> = vec![1000, 2000, 3000, 4000];
        let mut source = source_from(make_wav(44100, 1, &samples)).unwrap();

        let frames = drain(&mut source, 512);
        assert_eq!(frames.len(), 4);
        for frame in &frames {
            assert_ne!(frame[0], 0.0);
            assert_eq!(frame[0], frame[1]);
        }
    }

    #[test]
    fn pull_stereo_keeps_channels_apart() {
        let mut samples = Vec::new();
        for _ in 0..300 {
            samples.push(16384i16);
            samples.push(-16384i16);
        }
        let mut source = source_from(make_wav(44100, 2, &samples)).unwrap();

        let frames = drain(&mut source, 128);
        assert_eq!(frames.len(), 300);
        assert!(frames.iter().all(|f| (f[0] - 0.5).abs() < 0.01));
        assert!(frames.iter().all(|f| (f[1] + 0.5).abs() < 0.01));
    }

    #[test]
    fn pull_returns_full_blocks_then_partial() {
        let samples = vec![100i16; 1200];
        let mut source = source_from(make_wav(44100, 1, &samples)).unwrap();
        let mut block = vec![[0.0; 2]; 512];

        assert_eq!(source.pull(&mut block), Pull::more(512));
        assert_eq!(source.pull(&mut block), Pull::more(512));
        assert_eq!(source.pull(&mut block), Pull::more(176));
        assert_eq!(source.pull(&mut block), Pull::end());
        assert_eq!(source.pull(&mut block), Pull::end());
    }

    #[test]
    fn pull_silence() {
        let mut source = source_from(make_wav(44100, 1, &[0; 500])).unwrap();
        let frames = drain(&mut source, 256);
        assert_eq!(frames.len(), 500);
        assert!(frames.iter().all(|f| f[0] == 0.0 && f[1] == 0.0));
    }

    #[test]
    fn pull_large_stereo_preserves_frame_count() {
        // 5 seconds of stereo audio
        let num_samples = 44100 * 2 * 5;
        let samples: Vec<i16> = (0..num_samples)
            .map(|i| ((i as f64 * 0.01).sin() * 10000.0) as i16)
            .collect();
        let mut source = source_from(make_wav(44100, 2, &samples)).unwrap();

        let frames = drain(&mut source, 512);
        assert_eq!(frames.len(), num_samples / 2);
    }

    #[test]
    fn samples_are_in_valid_range() {
        let samples: Vec<i16> = (0..2000)
            .map(|i| ((i as f64 * 0.05).sin() * 30000.0) as i16)
            .collect();
        let mut source = source_from(make_wav(44100, 1, &samples)).unwrap();

        for (i, f) in drain(&mut source, 512).iter().enumerate() {
            assert!((-1.0..=1.0).contains(&f[0]), "Frame {} out of range: {:?}", i, f);
        }
    }

    #[test]
    fn clean_eof_has_no_error() {
        let mut source = source_from(make_wav(44100, 1, &[0; 100])).unwrap();
        drain(&mut source, 64);
        assert!(source.last_error().is_none());
    }

    // --- Codec info ---

    #[test]
    fn codec_info_for_wav() {
        let source = source_from(make_wav(44100, 2, &[0; 100])).unwrap();

        let info = source.codec_info();
        assert_eq!(info.channels, 2);
        assert_eq!(info.sample_rate, 44100);
        assert!(info.codec_name.contains("PCM"), "got {}", info.codec_name);
        assert_eq!(info.codec_name, source.codec_name());
        assert_eq!(info.bits_per_sample, source.bits_per_sample());
    }

    // --- codec_type_to_name ---

    #[test]
    fn codec_name_lookup() {
        use symphonia::core::codecs::*;
        assert_eq!(codec_type_to_name(CODEC_TYPE_MP3), "MP3");
        assert_eq!(codec_type_to_name(CODEC_TYPE_FLAC), "FLAC");
        assert_eq!(codec_type_to_name(CODEC_TYPE_VORBIS), "Vorbis");
        assert_eq!(codec_type_to_name(CODEC_TYPE_PCM_S16LE), "PCM 16-bit");
        assert_eq!(codec_type_to_name(CODEC_TYPE_NULL), "Audio");
    }

    // --- Error paths ---

    #[test]
    fn error_on_invalid_data() {
        assert!(source_from(vec![0u8; 100]).is_err());
    }

    #[test]
    fn error_on_empty_data() {
        assert!(source_from(Vec::new()).is_err());
    }

    #[test]
    fn error_on_truncated_wav_header() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&100u32.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        assert!(source_from(buf).is_err());
    }
}
