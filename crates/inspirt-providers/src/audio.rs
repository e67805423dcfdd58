//! Pre-flight checks on uploaded voice samples. Everything here runs before
//! any network call: a sample that fails validation never reaches the
//! provider, and the errors are distinguishable from provider errors.

use std::io::Cursor;

use thiserror::Error;

/// Upload ceiling enforced before the body is even sniffed.
pub const MAX_SAMPLE_BYTES: usize = 6 * 1024 * 1024;

pub const MIN_SAMPLE_SECONDS: f64 = 10.0;
pub const MAX_SAMPLE_SECONDS: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    M4a,
}

impl AudioFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::M4a => "audio/mp4",
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::Wav => "voice.wav",
            Self::Mp3 => "voice.mp3",
            Self::M4a => "voice.m4a",
        }
    }
}

#[derive(Debug, Error)]
pub enum AudioValidationError {
    #[error("audio file too large: {size} bytes (maximum {MAX_SAMPLE_BYTES})")]
    TooLarge { size: usize },

    #[error("unsupported audio format; expected WAV, MP3 or M4A")]
    UnsupportedFormat,

    #[error("unreadable {0} data: {1}")]
    Malformed(&'static str, String),

    #[error(
        "sample duration {seconds:.1}s outside the allowed range \
         ({MIN_SAMPLE_SECONDS:.0}-{MAX_SAMPLE_SECONDS:.0}s)"
    )]
    DurationOutOfRange { seconds: f64 },
}

/// A sample that passed validation and is ready for upload.
#[derive(Debug)]
pub struct AudioSample {
    pub bytes: Vec<u8>,
    pub format: AudioFormat,
}

/// Validate size, container and duration. Duration is exact for WAV, a CBR
/// header estimate for MP3, and not derivable for M4A (size bound only).
pub fn validate_sample(bytes: Vec<u8>) -> Result<AudioSample, AudioValidationError> {
    if bytes.len() > MAX_SAMPLE_BYTES {
        return Err(AudioValidationError::TooLarge { size: bytes.len() });
    }

    let format = sniff_format(&bytes).ok_or(AudioValidationError::UnsupportedFormat)?;

    let seconds = match format {
        AudioFormat::Wav => Some(wav_duration(&bytes)?),
        AudioFormat::Mp3 => mp3_duration_estimate(&bytes),
        AudioFormat::M4a => None,
    };

    if let Some(seconds) = seconds {
        if !(MIN_SAMPLE_SECONDS..=MAX_SAMPLE_SECONDS).contains(&seconds) {
            return Err(AudioValidationError::DurationOutOfRange { seconds });
        }
    }

    Ok(AudioSample { bytes, format })
}

fn sniff_format(bytes: &[u8]) -> Option<AudioFormat> {
    if bytes.len() < 12 {
        return None;
    }
    if &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE" {
        return Some(AudioFormat::Wav);
    }
    if &bytes[4..8] == b"ftyp" {
        return Some(AudioFormat::M4a);
    }
    if &bytes[0..3] == b"ID3" || (bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0) {
        return Some(AudioFormat::Mp3);
    }
    None
}

fn wav_duration(bytes: &[u8]) -> Result<f64, AudioValidationError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| AudioValidationError::Malformed("WAV", e.to_string()))?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(AudioValidationError::Malformed(
            "WAV",
            "zero sample rate".into(),
        ));
    }
    Ok(reader.duration() as f64 / spec.sample_rate as f64)
}

/// MPEG-1 Layer III bitrates, kbit/s, indexed by the frame header nibble.
const MP3_BITRATES_KBPS: [u32; 16] = [
    0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0,
];

/// Best-effort duration from the first frame header, assuming constant
/// bitrate. VBR files underestimate; that is acceptable for a bounds check
/// on a voice sample. Returns `None` when no usable frame header is found.
fn mp3_duration_estimate(bytes: &[u8]) -> Option<f64> {
    let mut offset = 0usize;

    // Skip an ID3v2 tag if present (syncsafe 28-bit size at offset 6).
    if bytes.len() > 10 && &bytes[0..3] == b"ID3" {
        let size = ((bytes[6] as usize & 0x7F) << 21)
            | ((bytes[7] as usize & 0x7F) << 14)
            | ((bytes[8] as usize & 0x7F) << 7)
            | (bytes[9] as usize & 0x7F);
        offset = 10 + size;
    }

    while offset + 4 <= bytes.len() {
        let h = &bytes[offset..offset + 4];
        let is_sync = h[0] == 0xFF && h[1] & 0xE0 == 0xE0;
        let is_mpeg1_layer3 = h[1] & 0x1E == 0x1A;
        if is_sync && is_mpeg1_layer3 {
            let bitrate_kbps = MP3_BITRATES_KBPS[(h[2] >> 4) as usize];
            if bitrate_kbps == 0 {
                return None;
            }
            let audio_bytes = (bytes.len() - offset) as f64;
            return Some(audio_bytes * 8.0 / (bitrate_kbps as f64 * 1000.0));
        }
        offset += 1;
    }
    None
}
