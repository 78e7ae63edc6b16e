use std::collections::HashMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::error::SynthError;
use crate::instrument::SampleData;

/// Retrieves the raw bytes behind an asset url.
pub trait AssetFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SynthError>;
}

/// Resolves urls as paths below a root directory.
#[derive(Debug, Clone)]
pub struct FileFetcher {
    root: PathBuf,
}

impl FileFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FileFetcher { root: root.into() }
    }

    pub fn resolve(&self, url: &str) -> PathBuf {
        let path = url.strip_prefix("file://").unwrap_or(url);
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Default for FileFetcher {
    fn default() -> Self {
        FileFetcher::new(".")
    }
}

impl AssetFetcher for FileFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, SynthError> {
        let path = self.resolve(url);
        std::fs::read(&path)
            .map_err(|e| SynthError::FileError(format!("{}: {}", path.display(), e)))
    }
}

/// Decode any container symphonia understands into mono f32 at the file's own rate.
pub fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleData, SynthError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| SynthError::DecodeError(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| SynthError::DecodeError("No supported audio tracks".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| SynthError::DecodeError(e.to_string()))?;

    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate.unwrap_or(0);
    let mut samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(Error::IoError(_)) | Err(Error::ResetRequired) => break,
            Err(err) => return Err(SynthError::DecodeError(err.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate = spec.rate;
                let mut buf = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buf.copy_interleaved_ref(decoded);

                let channels = spec.channels.count().max(1);
                if channels == 1 {
                    samples.extend_from_slice(buf.samples());
                } else {
                    for frame in buf.samples().chunks(channels) {
                        samples.push(frame.iter().sum::<f32>() / channels as f32);
                    }
                }
            }
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(_)) => (),
            Err(err) => return Err(SynthError::DecodeError(err.to_string())),
        }
    }

    if sample_rate == 0 {
        return Err(SynthError::DecodeError("Unknown sample rate".to_string()));
    }
    Ok(SampleData::new(samples, sample_rate))
}

/// Fetch and decode one asset. Failures are logged and yield `None`.
pub fn fetch_and_decode(fetcher: &dyn AssetFetcher, url: &str) -> Option<SampleData> {
    let extension = Path::new(url).extension().and_then(|e| e.to_str());
    let result = fetcher.fetch(url).and_then(|bytes| decode(bytes, extension));
    match result {
        Ok(data) if data.is_empty() => {
            warn!("Asset {} decoded to an empty buffer", url);
            None
        }
        Ok(data) => {
            debug!("Loaded {} ({:.2}s at {} Hz)", url, data.duration(), data.sample_rate);
            Some(data)
        }
        Err(e) => {
            warn!("Failed to load {}: {}", url, e);
            None
        }
    }
}

/// Every decoded recording the engine can play. Absent entries fall back to synthesis.
#[derive(Debug, Clone, Default)]
pub struct SampleBank {
    pub tanpura_sa: Option<SampleData>,
    pub tanpura_pa: Option<SampleData>,
    pub tabla_loops: HashMap<String, SampleData>, // keyed by lower-cased taal name
    pub harmonium: HashMap<String, SampleData>,   // keyed by note name
}

impl SampleBank {
    pub fn tabla_loop(&self, taal_name: &str) -> Option<&SampleData> {
        self.tabla_loops.get(&taal_name.to_lowercase())
    }

    pub fn harmonium_note(&self, note: &str) -> Option<&SampleData> {
        self.harmonium.get(note)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn write_stereo_wav(path: &Path, frames: usize) {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 22050,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).expect("create wav");
        for _ in 0..frames {
            writer.write_sample(16384_i16).expect("left");
            writer.write_sample(0_i16).expect("right");
        }
        writer.finalize().expect("finalize wav");
    }

    #[test]
    fn file_fetcher_strips_scheme_and_leading_slash() {
        let fetcher = FileFetcher::new("/srv/assets");
        assert_eq!(fetcher.resolve("file:///Sa Tanpura.m4a"), PathBuf::from("/srv/assets/Sa Tanpura.m4a"));
        assert_eq!(fetcher.resolve("/tabla/Dadra.m4a"), PathBuf::from("/srv/assets/tabla/Dadra.m4a"));
        assert_eq!(fetcher.resolve("C.wav"), PathBuf::from("/srv/assets/C.wav"));
    }

    #[test]
    fn decodes_wav_to_mono_at_native_rate() {
        let dir = tempfile::tempdir().expect("tempdir");
        write_stereo_wav(&dir.path().join("tone.wav"), 2205);

        let fetcher = FileFetcher::new(dir.path());
        let data = fetch_and_decode(&fetcher, "/tone.wav").expect("decoded");
        assert_eq!(data.sample_rate, 22050);
        assert_eq!(data.samples.len(), 2205);
        // Left at half scale, right silent
        assert!((data.samples[100] - 0.25).abs() < 1e-3);
    }

    #[test]
    fn missing_or_garbage_assets_yield_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("junk.wav"), b"not audio at all").expect("write");

        let fetcher: Arc<dyn AssetFetcher> = Arc::new(FileFetcher::new(dir.path()));
        assert!(fetch_and_decode(fetcher.as_ref(), "missing.wav").is_none());
        assert!(fetch_and_decode(fetcher.as_ref(), "junk.wav").is_none());
    }

    #[test]
    fn tabla_loops_lookup_ignores_case() {
        let mut bank = SampleBank::default();
        bank.tabla_loops.insert("teental".to_string(), SampleData::new(vec![0.0; 4], 44100));
        assert!(bank.tabla_loop("Teental").is_some());
        assert!(bank.tabla_loop("Dadra").is_none());
    }
}
