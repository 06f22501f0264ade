use anyhow::{Context, Result};
use std::io::Cursor;
use std::path::PathBuf;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Mono PCM for one track.
pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Where a track's `source` string points.
#[derive(Debug, PartialEq)]
pub enum SourceLocation {
    File(PathBuf),
    Remote(String),
}

pub fn locate(source: &str) -> SourceLocation {
    if source.starts_with("http://") || source.starts_with("https://") {
        SourceLocation::Remote(source.to_string())
    } else if let Some(path) = source.strip_prefix("file://") {
        SourceLocation::File(PathBuf::from(path))
    } else {
        SourceLocation::File(PathBuf::from(source))
    }
}

/// Extension used as a probe hint, ignoring any query string.
fn extension_hint(source: &str) -> Option<&str> {
    let without_query = source.split(['?', '#']).next().unwrap_or(source);
    let name = without_query.rsplit('/').next()?;
    let (_, ext) = name.rsplit_once('.')?;
    if ext.is_empty() {
        None
    } else {
        Some(ext)
    }
}

/// Resolve and decode a track source to mono f32 samples.
pub fn decode_source(source: &str) -> Result<AudioData> {
    let media: Box<dyn MediaSource> = match locate(source) {
        SourceLocation::File(path) => Box::new(
            std::fs::File::open(&path)
                .with_context(|| format!("Failed to open audio file: {}", path.display()))?,
        ),
        SourceLocation::Remote(url) => Box::new(Cursor::new(fetch_remote(&url)?)),
    };

    let mut hint = Hint::new();
    if let Some(ext) = extension_hint(source) {
        hint.with_extension(ext);
    }

    decode_stream(MediaSourceStream::new(media, Default::default()), &hint)
        .with_context(|| format!("Failed to decode {}", source))
}

fn fetch_remote(url: &str) -> Result<Vec<u8>> {
    log::info!("Fetching {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch {}", url))?
        .error_for_status()
        .with_context(|| format!("Server refused {}", url))?;
    let bytes = response.bytes().context("Failed to read response body")?;
    Ok(bytes.to_vec())
}

fn decode_stream(mss: MediaSourceStream, hint: &Hint) -> Result<AudioData> {
    let probed = symphonia::default::get_probe()
        .format(hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .context("Failed to probe audio format")?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let num_frames = decoded.frames();

        let mut sample_buf = SampleBuffer::<f32>::new(num_frames as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();

        // Downmix to mono
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            for frame_samples in samples.chunks(channels) {
                let mono: f32 = frame_samples.iter().sum::<f32>() / channels as f32;
                all_samples.push(mono);
            }
        }
    }

    log::info!(
        "Decoded audio: {} samples, {}Hz, {:.1}s",
        all_samples.len(),
        sample_rate,
        all_samples.len() as f32 / sample_rate as f32
    );

    Ok(AudioData {
        samples: all_samples,
        sample_rate,
    })
}

#[cfg(test)]
/// 16-bit mono PCM WAV with `samples` frames of a constant value.
pub(crate) fn wav_bytes(sample_rate: u32, samples: usize, value: i16) -> Vec<u8> {
    let data_len = (samples * 2) as u32;
    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVEfmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    for _ in 0..samples {
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn locates_sources() {
        assert_eq!(locate("/bgm1.mp3"), SourceLocation::File(PathBuf::from("/bgm1.mp3")));
        assert_eq!(
            locate("file:///tmp/a.wav"),
            SourceLocation::File(PathBuf::from("/tmp/a.wav"))
        );
        assert_eq!(
            locate("https://cdn.example.com/a.mp3"),
            SourceLocation::Remote("https://cdn.example.com/a.mp3".into())
        );
    }

    #[test]
    fn extension_hint_ignores_query() {
        assert_eq!(extension_hint("https://x.com/a/b.mp3?token=1"), Some("mp3"));
        assert_eq!(extension_hint("/music/track.flac"), Some("flac"));
        assert_eq!(extension_hint("https://x.com/stream"), None);
    }

    #[test]
    fn decodes_wav_file() {
        let mut file = tempfile::Builder::new().suffix(".wav").tempfile().unwrap();
        file.write_all(&wav_bytes(8000, 4000, 16384)).unwrap();

        let audio = decode_source(&file.path().to_string_lossy()).unwrap();
        assert_eq!(audio.sample_rate, 8000);
        assert_eq!(audio.samples.len(), 4000);
        assert!((audio.duration() - 0.5).abs() < 1e-9);
        assert!((audio.samples[10] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_source("/definitely/not/here.mp3").is_err());
    }
}
