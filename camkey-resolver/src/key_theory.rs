//! Key theory: note-name normalization and Camelot wheel lookup
//!
//! Provider data arrives in many spellings (`Bb`, `A♯`, `f#`, `Eb minor`,
//! `F#m`). Everything is normalized to the twelve sharp-only note names
//! before the Camelot tables are consulted.

use camkey_common::{CamelotCode, Mode};

/// The twelve canonical note names, sharps only
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Flat spellings and their sharp equivalents
const FLAT_TO_SHARP: [(&str, &str); 5] = [
    ("Db", "C#"),
    ("Eb", "D#"),
    ("Gb", "F#"),
    ("Ab", "G#"),
    ("Bb", "A#"),
];

/// Camelot number for each major key (B side), indexed like `NOTE_NAMES`
const MAJOR_WHEEL: [u8; 12] = [
    8,  // C
    3,  // C#
    10, // D
    5,  // D#
    12, // E
    7,  // F
    2,  // F#
    9,  // G
    4,  // G#
    11, // A
    6,  // A#
    1,  // B
];

/// Camelot number for each minor key (A side), indexed like `NOTE_NAMES`
const MINOR_WHEEL: [u8; 12] = [
    5,  // Cm
    12, // C#m
    7,  // Dm
    2,  // D#m
    9,  // Em
    4,  // Fm
    11, // F#m
    6,  // Gm
    1,  // G#m
    8,  // Am
    3,  // A#m
    10, // Bm
];

/// Key and scale parsed from a provider key string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    /// Canonical note name (one of `NOTE_NAMES`)
    pub key: String,
    pub mode: Mode,
}

/// Normalize a note name to its canonical sharp spelling
///
/// Strips whitespace, converts `♯`/`♭` to `#`/`b`, upper-cases the letter and
/// maps the five flat spellings to sharps. Input that does not name one of the
/// twelve notes is returned unchanged.
pub fn normalize_note_name(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '♯' => '#',
            '♭' => 'b',
            other => other,
        })
        .collect();

    let mut chars = compact.chars();
    let Some(letter) = chars.next() else {
        return raw.to_string();
    };
    let letter = letter.to_ascii_uppercase();
    if !('A'..='G').contains(&letter) {
        return raw.to_string();
    }

    let accidental: String = chars.collect();
    let candidate = match accidental.as_str() {
        "" | "#" => format!("{}{}", letter, accidental),
        "b" | "B" => {
            let flat = format!("{}b", letter);
            match FLAT_TO_SHARP.iter().find(|(f, _)| *f == flat) {
                Some((_, sharp)) => sharp.to_string(),
                None => return raw.to_string(),
            }
        }
        _ => return raw.to_string(),
    };

    if note_index(&candidate).is_some() {
        candidate
    } else {
        raw.to_string()
    }
}

/// Position of a canonical note name within `NOTE_NAMES`
fn note_index(note: &str) -> Option<usize> {
    NOTE_NAMES.iter().position(|n| *n == note)
}

/// Parse a provider key string
///
/// Accepts compact forms (`Em`, `F#m`, `Bb`, `A♭m`) where a trailing lowercase
/// `m` marks minor, and verbose forms (`E minor`, `A major`). Anything else,
/// including notes outside the twelve, yields `None`.
pub fn parse_provider_key_string(raw: &str) -> Option<ParsedKey> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut words = trimmed.split_whitespace();
    let (note, mode) = match (words.next(), words.next(), words.next()) {
        (Some(note), Some(scale), None) => (note, scale.parse::<Mode>().ok()?),
        (Some(compact), None, None) => match compact.strip_suffix('m') {
            Some(note) => (note, Mode::Minor),
            None => (compact, Mode::Major),
        },
        _ => return None,
    };

    let key = canonical_note(note)?;
    Some(ParsedKey { key, mode })
}

/// Key and scale given as separate fields (as audio-analysis data does)
pub fn parse_key_and_scale(key: &str, scale: &str) -> Option<ParsedKey> {
    let mode = scale.parse::<Mode>().ok()?;
    let key = canonical_note(key)?;
    Some(ParsedKey { key, mode })
}

/// Normalize and require one of the twelve notes
fn canonical_note(note: &str) -> Option<String> {
    let normalized = normalize_note_name(note);
    note_index(&normalized).map(|_| normalized)
}

/// Camelot code for a note in the given mode
pub fn camelot_code(key: &str, mode: Mode) -> Option<CamelotCode> {
    let index = note_index(&normalize_note_name(key))?;
    let number = match mode {
        Mode::Major => MAJOR_WHEEL[index],
        Mode::Minor => MINOR_WHEEL[index],
    };
    CamelotCode::new(number, mode)
}

/// Camelot code for a note and a scale name
///
/// `None` when the scale is neither `major` nor `minor`, or the note is not
/// recognized.
pub fn key_to_camelot(key: &str, scale: &str) -> Option<CamelotCode> {
    let mode = scale.parse::<Mode>().ok()?;
    camelot_code(key, mode)
}
