//! # Note reference table
//!
//! Immutable MIDI (0–127) ↔ name ↔ frequency table built on first use from
//! the A4 = 440 Hz standard.

use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;

use crate::math::pitch::{frequency_to_midi, midi_to_frequency, midi_to_note_name};

/// Twelve-tone chromatic names starting at C, sharps only.
pub const NOTE_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A single row of the reference table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoteEntry {
    pub midi: u8,
    /// Note name with octave, e.g. "A4"
    pub name: String,
    pub octave: i32,
    /// Frequency in Hz
    pub frequency: f64,
}

/// Lazily computed table for all 128 MIDI notes.
static REFERENCE: Lazy<NoteReference> = Lazy::new(NoteReference::build);

/// Lookup table over the full MIDI range.
#[derive(Debug)]
pub struct NoteReference {
    entries: Vec<NoteEntry>,
    by_name: HashMap<String, u8>,
}

impl NoteReference {
    /// Shared table; computed once per process.
    pub fn global() -> &'static NoteReference {
        &REFERENCE
    }

    fn build() -> Self {
        let entries: Vec<NoteEntry> = (0..=127)
            .filter_map(|midi: i32| {
                Some(NoteEntry {
                    midi: midi as u8,
                    name: midi_to_note_name(midi)?,
                    octave: midi.div_euclid(12) - 1,
                    frequency: midi_to_frequency(midi)?,
                })
            })
            .collect();

        let by_name = entries
            .iter()
            .map(|entry| (entry.name.clone(), entry.midi))
            .collect();

        Self { entries, by_name }
    }

    pub fn entry(&self, midi: u8) -> Option<&NoteEntry> {
        self.entries.get(midi as usize)
    }

    /// Look up a note by name. Accepts flats ("Bb3") as well as sharps.
    pub fn by_name(&self, name: &str) -> Option<&NoteEntry> {
        self.by_name
            .get(name)
            .copied()
            .or_else(|| note_name_to_midi(name))
            .and_then(|midi| self.entry(midi))
    }

    /// Nearest entry to a frequency, or `None` when out of MIDI range.
    pub fn nearest(&self, frequency: f64) -> Option<&NoteEntry> {
        frequency_to_midi(frequency).and_then(|midi| self.entry(midi))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NoteEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse a note name such as "C4", "F#2", "Db5" or "G-1" into a MIDI number.
///
/// Returns `None` for malformed names or notes outside 0..=127.
pub fn note_name_to_midi(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars().peekable();

    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let accidental = match chars.peek() {
        Some('#') => {
            chars.next();
            1
        }
        Some('b') => {
            chars.next();
            -1
        }
        _ => 0,
    };

    let octave: i32 = chars.collect::<String>().parse().ok()?;
    let midi = (octave + 1) * 12 + base + accidental;

    if (0..=127).contains(&midi) {
        Some(midi as u8)
    } else {
        None
    }
}
