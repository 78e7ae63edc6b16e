use crate::error::SynthError;

/// Frequency of a note name such as `C#3`, `Db` or `a4`. A4 is 440 Hz and a
/// missing octave means octave 4.
pub fn parse_note(note_str: &str) -> Result<f32, SynthError> {
    let note_str = note_str.trim();
    let mut chars = note_str.chars();

    let semitone: i32 = match chars.next().map(|c| c.to_ascii_uppercase()) {
        Some('C') => 0,
        Some('D') => 2,
        Some('E') => 4,
        Some('F') => 5,
        Some('G') => 7,
        Some('A') => 9,
        Some('B') => 11,
        _ => return Err(SynthError::ParseError(format!("Invalid note: {note_str}"))),
    };

    let rest = chars.as_str();
    let (accidental, octave_str) = match rest.chars().next() {
        Some('#') | Some('s') | Some('S') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave = if octave_str.is_empty() {
        4
    } else {
        octave_str
            .parse::<i32>()
            .map_err(|_| SynthError::ParseError(format!("Invalid octave in note: {note_str}")))?
    };

    let midi = (octave + 1) * 12 + semitone + accidental;
    Ok(440.0 * 2.0_f32.powf((midi - 69) as f32 / 12.0))
}

/// Shift `freq` by `cents` (100 cents to a semitone).
pub fn fine_tune(freq: f32, cents: f32) -> f32 {
    freq * 2.0_f32.powf(cents / 1200.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 0.01
    }

    #[test]
    fn parses_naturals_and_accidentals() {
        assert!(close(parse_note("A4").unwrap_or(0.0), 440.0));
        assert!(close(parse_note("C4").unwrap_or(0.0), 261.63));
        assert!(close(parse_note("c#3").unwrap_or(0.0), 138.59));
        assert!(close(parse_note("Db3").unwrap_or(0.0), 138.59));
        assert!(close(parse_note("G#3").unwrap_or(0.0), 207.65));
        assert!(close(parse_note("A").unwrap_or(0.0), 440.0));
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_note("H4").is_err());
        assert!(parse_note("").is_err());
        assert!(parse_note("C#x").is_err());
    }

    #[test]
    fn fine_tune_by_cents() {
        assert!(close(fine_tune(440.0, 1200.0), 880.0));
        assert!(close(fine_tune(440.0, -1200.0), 220.0));
        assert!(close(fine_tune(261.63, 0.0), 261.63));
    }
}
