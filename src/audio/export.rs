//! Audio file encoding.
//!
//! Renders a session's composition offline and packs it into a WAV file or
//! a stub "mp3" blob, together with a suggested file name.

use super::buffer::StereoBuffer;
use super::render::render_offline;
use crate::error::{ExportError, Result, ValidationError};
use crate::score::Layers;
use crate::session::Session;
use chrono::{DateTime, Utc};
use hound::{SampleFormat, WavSpec, WavWriter};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

/// Pseudo-header written at the start of a stub mp3 blob.
pub const STUB_MP3_HEADER: [u8; 8] = [0xFF, 0xFB, 0x90, 0x00, 0x00, 0x00, 0x00, 0x00];

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExportFormat {
    /// 16-bit PCM WAV.
    #[default]
    #[serde(rename = "wav")]
    Wav,
    /// Raw PCM behind a fake MPEG frame header. Not decodable as MP3.
    #[serde(rename = "mp3")]
    StubMp3,
}

impl ExportFormat {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "wav",
            ExportFormat::StubMp3 => "mp3",
        }
    }

    /// Media type to declare for the encoded bytes.
    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportFormat::Wav => "audio/wav",
            ExportFormat::StubMp3 => "audio/x-scorecraft-stub",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wav" => Ok(ExportFormat::Wav),
            "mp3" => Ok(ExportFormat::StubMp3),
            other => Err(ExportError::UnknownFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoded audio plus the name it should be saved under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioBlob {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl AudioBlob {
    /// Writes the blob into `dir` under its file name.
    ///
    /// # Returns
    ///
    /// The path of the written file
    ///
    /// # Errors
    ///
    /// Returns `ExportError::Io` if the directory or file cannot be written
    pub fn write_to_dir<P: AsRef<Path>>(
        &self,
        dir: P,
    ) -> std::result::Result<PathBuf, ExportError> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(&self.file_name);
        fs::write(&path, &self.bytes)?;
        Ok(path)
    }
}

/// Converts a sample to 16-bit PCM, asymmetric so that -1.0 maps to
/// -32768 and 1.0 to 32767.
#[inline]
fn to_pcm16(sample: f32) -> i16 {
    let s = sample.clamp(-1.0, 1.0);
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encodes a buffer as a 16-bit PCM WAV file in memory.
///
/// # Errors
///
/// Returns `ExportError::TooLong` if the data would not fit the RIFF size
/// fields, or `ExportError::Wav` if the writer fails.
pub fn encode_wav(buffer: &StereoBuffer) -> std::result::Result<Vec<u8>, ExportError> {
    let channels = buffer.channels();
    let data_bytes = buffer.frames() as u64 * channels as u64 * 2;
    if data_bytes + 36 > u32::MAX as u64 {
        return Err(ExportError::TooLong {
            frames: buffer.frames(),
        });
    }

    let spec = WavSpec {
        channels,
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + data_bytes as usize));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for (left, right) in buffer.left().iter().zip(buffer.right()) {
            writer.write_sample(to_pcm16(*left))?;
            writer.write_sample(to_pcm16(*right))?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

/// Encodes a buffer as a stub "mp3": [`STUB_MP3_HEADER`] followed by
/// interleaved 16-bit little-endian samples.
///
/// This is not an MP3 bitstream and no decoder will accept it.
pub fn encode_stub_mp3(buffer: &StereoBuffer) -> Vec<u8> {
    let interleaved = buffer.interleaved();
    let mut bytes = Vec::with_capacity(STUB_MP3_HEADER.len() + interleaved.len() * 2);
    bytes.extend_from_slice(&STUB_MP3_HEADER);
    for sample in interleaved {
        let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

/// Suggested file name: `composition_{genre}_{key}_{timestamp}.{ext}`.
pub fn export_file_name(
    genre: &str,
    key: Option<&str>,
    format: ExportFormat,
    timestamp: DateTime<Utc>,
) -> String {
    format!(
        "composition_{}_{}_{}.{}",
        genre,
        key.unwrap_or(""),
        timestamp.format("%Y-%m-%dT%H-%M-%S"),
        format.extension()
    )
}

/// Renders the session's composition and encodes it.
///
/// The composition is snapshotted first and never modified.
///
/// # Arguments
///
/// * `session` - Source of the composition, master volume, genre and key
/// * `format` - Output format
/// * `timestamp` - Time used in the file name
///
/// # Errors
///
/// Returns `ValidationError::EmptyComposition` if neither layer has notes,
/// or an `ExportError` if encoding fails.
pub fn export(
    session: &Session,
    format: ExportFormat,
    timestamp: DateTime<Utc>,
) -> Result<AudioBlob> {
    let composition = session.composition().snapshot();
    if composition.is_empty(Layers::All) {
        return Err(ValidationError::EmptyComposition.into());
    }

    let rendered = render_offline(&composition, session.render_context());
    let bytes = match format {
        ExportFormat::Wav => encode_wav(&rendered.buffer).map_err(|e| {
            error!("WAV encoding failed: {}", e);
            e
        })?,
        ExportFormat::StubMp3 => encode_stub_mp3(&rendered.buffer),
    };

    let blob = AudioBlob {
        file_name: export_file_name(
            session.genre(),
            session.detected_key(),
            format,
            timestamp,
        ),
        mime_type: format.mime_type(),
        bytes,
    };
    info!(
        file = %blob.file_name,
        bytes = blob.bytes.len(),
        skipped = rendered.skipped,
        "Export complete"
    );
    Ok(blob)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn read_u16(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn read_u32(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_wav_header() {
        let buffer = StereoBuffer::new(100, 44100);
        let bytes = encode_wav(&buffer).unwrap();

        assert_eq!(bytes.len(), 44 + 2 * 100 * 2);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(read_u32(&bytes, 4), 36 + 400);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(read_u32(&bytes, 16), 16);
        assert_eq!(read_u16(&bytes, 20), 1);
        assert_eq!(read_u16(&bytes, 22), 2);
        assert_eq!(read_u32(&bytes, 24), 44100);
        assert_eq!(read_u32(&bytes, 28), 44100 * 4);
        assert_eq!(read_u16(&bytes, 32), 4);
        assert_eq!(read_u16(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(read_u32(&bytes, 40), 400);
    }

    #[test]
    fn test_wav_sample_mapping() {
        let buffer =
            StereoBuffer::from_channels(vec![1.0, 0.0, 2.0], vec![-1.0, 0.5, -3.0], 44100);
        let bytes = encode_wav(&buffer).unwrap();
        let samples: Vec<i16> = bytes[44..]
            .chunks_exact(2)
            .map(|c| i16::from_le_bytes([c[0], c[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32768, 0, 16383, 32767, -32768]);
    }

    #[test]
    fn test_wav_round_trip_through_hound() {
        let buffer = StereoBuffer::from_channels(vec![0.25; 10], vec![-0.25; 10], 22050);
        let bytes = encode_wav(&buffer).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 22050);
        assert_eq!(reader.len(), 20);
    }

    #[test]
    fn test_stub_mp3_layout() {
        let buffer = StereoBuffer::from_channels(vec![1.0, -1.0], vec![0.0, 0.5], 44100);
        let bytes = encode_stub_mp3(&buffer);
        assert_eq!(bytes.len(), 8 + 4 * 2);
        assert_eq!(&bytes[..8], &STUB_MP3_HEADER);
        assert_eq!(i16::from_le_bytes([bytes[8], bytes[9]]), 32767);
        assert_eq!(i16::from_le_bytes([bytes[12], bytes[13]]), -32767);
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("wav".parse::<ExportFormat>().unwrap(), ExportFormat::Wav);
        assert_eq!("MP3".parse::<ExportFormat>().unwrap(), ExportFormat::StubMp3);
        assert!("flac".parse::<ExportFormat>().is_err());
        assert_eq!(ExportFormat::StubMp3.mime_type(), "audio/x-scorecraft-stub");
    }

    #[test]
    fn test_file_name() {
        let timestamp = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            export_file_name("jazz", Some("D"), ExportFormat::Wav, timestamp),
            "composition_jazz_D_2024-03-09T14-05-07.wav"
        );
        assert_eq!(
            export_file_name("pop", None, ExportFormat::StubMp3, timestamp),
            "composition_pop__2024-03-09T14-05-07.mp3"
        );
    }

    #[test]
    fn test_write_to_dir() {
        let dir = tempfile::tempdir().unwrap();
        let blob = AudioBlob {
            file_name: "out.wav".to_string(),
            mime_type: "audio/wav",
            bytes: vec![1, 2, 3],
        };
        let path = blob.write_to_dir(dir.path().join("nested")).unwrap();
        assert_eq!(fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
