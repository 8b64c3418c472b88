//! Audio Normalizer (C4).
//!
//! Decodes any of the supported containers (`wav`, `mp3`, `m4a`, `flac`,
//! `ogg`) via `symphonia`, downmixes to mono by averaging channels,
//! resamples to 16 kHz with `rubato`'s sinc interpolator, and writes the
//! canonical 16-bit signed little-endian PCM WAV with `hound`. The
//! normalizer never interprets content as text or metadata — it only
//! reshapes sample values.

use std::path::Path;

use rubato::{SincFixedIn, SincInterpolationParameters, SincInterpolationType, VecResampler, WindowFunction};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::temp::ScratchFile;

pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac", "ogg"];

#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("file extension is not one of the supported formats: {0:?}")]
    UnsupportedExtension(Vec<&'static str>),
    #[error("failed to decode audio: {0}")]
    DecodeFailed(String),
    #[error("failed to write normalized WAV: {0}")]
    WriteFailed(String),
}

/// Returns `true` if `filename`'s extension (case-insensitive) is in the
/// closed, supported set.
pub fn has_supported_extension(filename: &str) -> bool {
    extension_of(filename)
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}

fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
}

/// Decode `input_path` (originally named `original_filename`) and produce a
/// canonical 16 kHz mono 16-bit PCM WAV scratch file. The caller owns the
/// returned `ScratchFile` and is responsible for its lifetime; this function
/// has already cleaned up its own intermediates.
pub async fn normalize(
    input_path: std::path::PathBuf,
    original_filename: String,
    target_sample_rate: u32,
) -> Result<ScratchFile, AudioError> {
    if !has_supported_extension(&original_filename) {
        return Err(AudioError::UnsupportedExtension(SUPPORTED_EXTENSIONS.to_vec()));
    }

    tokio::task::spawn_blocking(move || decode_and_write(&input_path, &original_filename, target_sample_rate))
        .await
        .map_err(|e| AudioError::DecodeFailed(format!("normalize task panicked: {e}")))?
}

fn decode_and_write(
    input_path: &Path,
    original_filename: &str,
    target_sample_rate: u32,
) -> Result<ScratchFile, AudioError> {
    let (samples, source_rate) = decode_to_mono_f32(input_path, original_filename)?;
    let resampled = if source_rate == target_sample_rate {
        samples
    } else {
        resample_mono(&samples, source_rate, target_sample_rate)?
    };

    std::fs::create_dir_all(crate::temp::scratch_dir())
        .map_err(|e| AudioError::WriteFailed(format!("failed to create scratch dir: {e}")))?;
    let out = ScratchFile::new_path("wav");
    write_canonical_wav(out.path(), &resampled, target_sample_rate)?;
    Ok(out)
}

/// Decode the file into mono f32 samples, downmixing multichannel input by
/// averaging, and return the samples alongside the source sample rate.
fn decode_to_mono_f32(path: &Path, original_filename: &str) -> Result<(Vec<f32>, u32), AudioError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AudioError::DecodeFailed(format!("failed to open input: {e}")))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension_of(original_filename) {
        hint.with_extension(&ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| AudioError::DecodeFailed(format!("unrecognized container: {e}")))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| AudioError::DecodeFailed("no decodable audio track".to_string()))?
        .clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &Default::default())
        .map_err(|e| AudioError::DecodeFailed(format!("unsupported codec: {e}")))?;

    let source_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| AudioError::DecodeFailed("stream has no sample rate".to_string()))?;

    let mut mono_samples = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(symphonia::core::errors::Error::ResetRequired) => break,
            Err(e) => return Err(AudioError::DecodeFailed(format!("packet read error: {e}"))),
        };

        if packet.track_id() != track.id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => downmix_into(&decoded, &mut mono_samples),
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(AudioError::DecodeFailed(format!("decode error: {e}"))),
        }
    }

    if mono_samples.is_empty() {
        return Err(AudioError::DecodeFailed("no audio frames decoded".to_string()));
    }

    Ok((mono_samples, source_rate))
}

/// Append one decoded buffer's frames to `out`, averaging across channels.
fn downmix_into(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    macro_rules! downmix_plane {
        ($buf:expr) => {{
            let channels = $buf.spec().channels.count().max(1);
            let frames = $buf.frames();
            for frame in 0..frames {
                let mut sum = 0.0f32;
                for ch in 0..channels {
                    sum += IntoSample::<f32>::into_sample($buf.chan(ch)[frame]);
                }
                out.push(sum / channels as f32);
            }
        }};
    }

    use symphonia::core::conv::IntoSample;
    match buffer {
        AudioBufferRef::U8(b) => downmix_plane!(b),
        AudioBufferRef::U16(b) => downmix_plane!(b),
        AudioBufferRef::U24(b) => downmix_plane!(b),
        AudioBufferRef::U32(b) => downmix_plane!(b),
        AudioBufferRef::S8(b) => downmix_plane!(b),
        AudioBufferRef::S16(b) => downmix_plane!(b),
        AudioBufferRef::S24(b) => downmix_plane!(b),
        AudioBufferRef::S32(b) => downmix_plane!(b),
        AudioBufferRef::F32(b) => downmix_plane!(b),
        AudioBufferRef::F64(b) => downmix_plane!(b),
    }
}

/// High-quality resampling via `rubato`'s windowed-sinc interpolator.
fn resample_mono(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>, AudioError> {
    if samples.is_empty() {
        return Ok(Vec::new());
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .map_err(|e| AudioError::DecodeFailed(format!("failed to build resampler: {e}")))?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .map_err(|e| AudioError::DecodeFailed(format!("resampling failed: {e}")))?;

    Ok(output.into_iter().next().unwrap_or_default())
}

/// Read a canonical 16-bit PCM WAV back into normalized f32 samples, for
/// feeding into the transcription engine.
pub fn read_wav_samples_f32(path: &Path) -> Result<Vec<f32>, AudioError> {
    let mut reader = hound::WavReader::open(path).map_err(|e| AudioError::DecodeFailed(e.to_string()))?;
    reader
        .samples::<i16>()
        .map(|s| s.map(|v| v as f32 / i16::MAX as f32).map_err(|e| AudioError::DecodeFailed(e.to_string())))
        .collect()
}

fn write_canonical_wav(path: &Path, samples: &[f32], sample_rate: u32) -> Result<(), AudioError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)
        .map_err(|e| AudioError::WriteFailed(e.to_string()))?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let pcm = (clamped * i16::MAX as f32) as i16;
        writer.write_sample(pcm).map_err(|e| AudioError::WriteFailed(e.to_string()))?;
    }
    writer.finalize().map_err(|e| AudioError::WriteFailed(e.to_string()))?;
    Ok(())
}
