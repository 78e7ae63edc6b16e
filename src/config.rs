use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/// Native pitch of the bundled tanpura recordings (G#3).
pub const TANPURA_REFERENCE_HZ: f32 = 207.65;
/// Tempo the bundled tabla loops were recorded at.
pub const TABLA_REFERENCE_BPM: f32 = 136.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Default cpal output device
    Device,
    /// No device; audio is pulled with `Engine::render`
    Offline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub output: OutputMode,
    pub sample_rate: u32, // offline only, device mode uses the device rate
    pub master_volume: f32,
    pub tanpura_reference_hz: f32,
    pub tabla_reference_bpm: f32,
    pub jivari: bool, // shape the synthetic drone through the jivari curve
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            output: OutputMode::Device,
            sample_rate: 44100,
            master_volume: 0.7,
            tanpura_reference_hz: TANPURA_REFERENCE_HZ,
            tabla_reference_bpm: TABLA_REFERENCE_BPM,
            jivari: false,
        }
    }
}

impl EngineConfig {
    pub fn offline(sample_rate: u32) -> Self {
        EngineConfig {
            output: OutputMode::Offline,
            sample_rate,
            ..Default::default()
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SynthError> {
        let config: EngineConfig = toml::from_str(content)
            .map_err(|e| SynthError::ConfigError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SynthError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        if self.sample_rate == 0 {
            return Err(SynthError::ConfigError("sample_rate must be positive".to_string()));
        }
        if !(self.tanpura_reference_hz.is_finite() && self.tanpura_reference_hz > 0.0) {
            return Err(SynthError::ConfigError("tanpura_reference_hz must be positive".to_string()));
        }
        if !(self.tabla_reference_bpm.is_finite() && self.tabla_reference_bpm > 0.0) {
            return Err(SynthError::ConfigError("tabla_reference_bpm must be positive".to_string()));
        }
        if !(0.0..=1.0).contains(&self.master_volume) {
            return Err(SynthError::ConfigError("master_volume must be within [0, 1]".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TanpuraAssets {
    pub sa: String,
    pub pa: String,
}

/// Where the practice-room recordings live.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetManifest {
    pub root: PathBuf,
    pub tanpura: Option<TanpuraAssets>,
    pub tabla: HashMap<String, String>, // taal name -> loop url
    pub harmonium: HashMap<String, String>, // note name -> sample url
}

impl AssetManifest {
    pub fn from_toml_str(content: &str) -> Result<Self, SynthError> {
        toml::from_str(content).map_err(|e| SynthError::ConfigError(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, SynthError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let mut manifest = Self::from_toml_str(&content)?;
        // Relative roots resolve against the manifest's own directory
        if manifest.root.is_relative() {
            if let Some(dir) = path.parent() {
                manifest.root = dir.join(&manifest.root);
            }
        }
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_recordings() {
        let config = EngineConfig::default();
        assert_eq!(config.output, OutputMode::Device);
        assert_eq!(config.master_volume, 0.7);
        assert_eq!(config.tanpura_reference_hz, 207.65);
        assert_eq!(config.tabla_reference_bpm, 136.0);
        assert!(!config.jivari);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("output = \"offline\"\nmaster_volume = 0.5\n")
            .expect("valid config");
        assert_eq!(config.output, OutputMode::Offline);
        assert_eq!(config.master_volume, 0.5);
        assert_eq!(config.sample_rate, 44100);
    }

    #[test]
    fn rejects_out_of_range_volume() {
        assert!(EngineConfig::from_toml_str("master_volume = 1.5").is_err());
        assert!(EngineConfig::from_toml_str("tabla_reference_bpm = 0.0").is_err());
        assert!(EngineConfig::from_toml_str("output = \"speakers\"").is_err());
    }

    #[test]
    fn manifest_parses_instrument_tables() {
        let manifest = AssetManifest::from_toml_str(
            r#"
root = "assets"

[tanpura]
sa = "Sa Tanpura.m4a"
pa = "Pa Tanpura.m4a"

[tabla]
Teental = "Teentaal.m4a"
"Ada Chautaal" = "Ada Chautaal.m4a"

[harmonium]
C = "harmonium/C.wav"
"#,
        )
        .expect("valid manifest");
        assert_eq!(manifest.root, PathBuf::from("assets"));
        assert_eq!(manifest.tanpura.map(|t| t.pa), Some("Pa Tanpura.m4a".to_string()));
        assert_eq!(manifest.tabla.len(), 2);
        assert_eq!(manifest.harmonium.get("C").map(String::as_str), Some("harmonium/C.wav"));
    }
}
