use std::fmt;
use std::time::Duration;

use crate::error::SynthError;
use crate::tabla::Bol;

/// One matra of a taal: the written syllable and the stroke it sounds as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Beat {
    pub label: String,
    pub bol: Bol,
}

/// A rhythmic cycle of bols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Taal {
    name: String,
    beats: Vec<Beat>,
}

const LIBRARY: &[(&str, &str)] = &[
    ("Teental", "Dha Dhin Dhin Dha Dha Dhin Dhin Dha Dha Tin Tin Ta Ta Dhin Dhin Dha"),
    ("Dadra", "Dha Dhin Na Dha Tin Na"),
    ("Keherwa", "Dha Ge Na Ti Na Ka Dhin Na"),
    ("Rupak", "Tin Tin Na Dhin Na Dhin Na"),
    ("Jhaptal", "Dhi Na Dhi Dhi Na Ti Na Dhi Dhi Na"),
    ("Ektaal", "Dhin Dhin Dha Ge Tu Na Kat Ta Dha Ge Dhi Na"),
    ("Chautaal", "Dha Dha Dhin Ta Kit Dha Dhin Ta Tit Kat Gadi Gan"),
    ("Deep Chandi", "Dha Dhin - Dha Dha Tin - Ta Tin - Dha Dha Dhin -"),
    ("Jhoomra", "Dhin - Dha Tir Kit Dhin Dhin Dha Ge Tir Kit Tin Na Ta"),
    ("Tilwada", "Dha Tir Kit Dhin Dhin Dha Dha Tin Tin Ta Tir Kit Dhin Dhin Dha Dha Dhin Dhin"),
    ("Dhamaar", "Ka Dhi T Dhi T Dha - Ga Ti T Ti T Ta -"),
    ("Ada Chautaal", "Dhin Tir Kit Dhi Na Tu Na Kat Ta Tir Kit Dhi Na Dhi Dhi Na"),
    ("Addha", "Dha Dhin - Dha Dha Dhin - Dha Dha Tin - Ta Ta Dhin - Dha"),
    ("Punjabi", "Dha - Dhin Na Dha - Tin Na"),
    ("Garba", "Dha Dhin Ta Ta Dhin Dha Ta Ta"),
    ("Bhajan", "Dha Dhin Na Dha Tin Na Dha Dhin"),
];

impl Taal {
    pub fn new<S: AsRef<str>>(name: &str, labels: &[S]) -> Result<Self, SynthError> {
        if labels.is_empty() {
            return Err(SynthError::ParseError(format!("Taal '{name}' has no beats")));
        }
        let beats = labels
            .iter()
            .map(|label| {
                let label = label.as_ref().trim().to_string();
                let bol = Bol::parse(&label);
                Beat { label, bol }
            })
            .collect();
        Ok(Taal { name: name.to_string(), beats })
    }

    /// Whitespace separated pattern, e.g. `"Dha Dhin Na"`.
    pub fn parse(name: &str, pattern: &str) -> Result<Self, SynthError> {
        let labels: Vec<&str> = pattern.split_whitespace().collect();
        Self::new(name, &labels)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    pub fn beats(&self) -> &[Beat] {
        &self.beats
    }

    pub fn bols(&self) -> impl Iterator<Item = Bol> + '_ {
        self.beats.iter().map(|b| b.bol)
    }

    pub fn bol_at(&self, beat: usize) -> Bol {
        self.beats[beat % self.beats.len()].bol
    }

    /// Key under which a recorded loop for this taal is stored.
    pub fn loop_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// Look up a built-in taal by name, case-insensitively.
    pub fn builtin(name: &str) -> Option<Taal> {
        LIBRARY
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name.trim()))
            .and_then(|(n, pattern)| Taal::parse(n, pattern).ok())
    }

    pub fn library() -> Vec<Taal> {
        LIBRARY
            .iter()
            .filter_map(|(n, pattern)| Taal::parse(n, pattern).ok())
            .collect()
    }
}

impl fmt::Display for Taal {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({} beats)", self.name, self.beats.len())
    }
}

/// Time between beats at `tempo` BPM.
pub fn beat_interval(tempo: f32) -> Result<Duration, SynthError> {
    if !tempo.is_finite() || tempo <= 0.0 {
        return Err(SynthError::ParseError(format!("Invalid tempo: {tempo}")));
    }
    Duration::try_from_secs_f64(60.0 / tempo as f64)
        .map_err(|_| SynthError::ParseError(format!("Tempo too slow: {tempo}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn library_lengths() {
        let expected = [
            ("Teental", 16),
            ("Dadra", 6),
            ("Keherwa", 8),
            ("Rupak", 7),
            ("Jhaptal", 10),
            ("Ektaal", 12),
            ("Chautaal", 12),
            ("Deep Chandi", 14),
            ("Jhoomra", 14),
            ("Tilwada", 18),
            ("Dhamaar", 14),
            ("Ada Chautaal", 16),
            ("Addha", 16),
            ("Punjabi", 8),
            ("Garba", 8),
            ("Bhajan", 8),
        ];
        assert_eq!(Taal::library().len(), expected.len());
        for (name, len) in expected {
            let taal = Taal::builtin(name).unwrap_or_else(|| panic!("missing {name}"));
            assert_eq!(taal.len(), len, "{name}");
        }
    }

    #[test]
    fn builtin_lookup_ignores_case() {
        let taal = Taal::builtin("deep chandi").expect("found");
        assert_eq!(taal.name(), "Deep Chandi");
        assert_eq!(taal.loop_key(), "deep chandi");
        assert!(Taal::builtin("Sitarkhani").is_none());
    }

    #[test]
    fn labels_keep_spelling_and_map_to_bols() {
        let taal = Taal::parse("Custom", "Dha - Kat tun").expect("valid");
        let bols: Vec<Bol> = taal.bols().collect();
        assert_eq!(bols, vec![Bol::Dha, Bol::Rest, Bol::Rest, Bol::Tin]);
        assert_eq!(taal.beats()[2].label, "Kat");
        assert_eq!(taal.bol_at(5), Bol::Rest);
    }

    #[test]
    fn empty_taal_is_rejected() {
        let none: [&str; 0] = [];
        assert!(Taal::new("Empty", &none).is_err());
        assert!(Taal::parse("Blank", "   ").is_err());
    }

    #[test]
    fn interval_from_tempo() {
        assert_eq!(beat_interval(60.0).ok(), Some(Duration::from_secs(1)));
        assert_eq!(beat_interval(120.0).ok(), Some(Duration::from_millis(500)));
        assert!(beat_interval(0.0).is_err());
        assert!(beat_interval(-10.0).is_err());
        assert!(beat_interval(f32::NAN).is_err());
        assert!(beat_interval(1e-18).is_err());
        assert!(beat_interval(f32::MIN_POSITIVE).is_err());
    }
}
