// Pitch module - frequency, MIDI and cents conversions
//
// Equal temperament anchored at A4 = 440 Hz (MIDI 69). All conversions are
// total: out-of-domain input yields `None` or a zero sentinel.

use serde::{Deserialize, Serialize};

use crate::config::AccuracyThresholds;
use crate::math::notes::NOTE_NAMES;

/// Reference pitch for A4 in Hz
pub const A4_FREQUENCY: f64 = 440.0;

/// MIDI number of A4
pub const A4_MIDI: i32 = 69;

const MIDI_MIN: i32 = 0;
const MIDI_MAX: i32 = 127;

/// Accuracy tier for a cents deviation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accuracy {
    Excellent,
    Good,
    Fair,
    Poor,
}

/// Nearest-note interpretation of a measured frequency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PitchReading {
    /// Measured frequency in Hz
    pub frequency: f64,
    /// Nearest MIDI note
    pub midi: u8,
    /// Note name with octave, e.g. "C#4"
    pub note: String,
    pub octave: i32,
    /// Equal-tempered frequency of the nearest note
    pub target_frequency: f64,
    /// Signed deviation from the target; positive means sharp
    pub cents: f64,
    pub accuracy: Accuracy,
}

/// Unrounded MIDI pitch for a frequency.
///
/// Returns `None` for non-finite or non-positive input. No range check is
/// applied, so 8 Hz yields a (valid) negative pitch.
pub fn frequency_to_midi_exact(frequency: f64) -> Option<f64> {
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }
    Some(A4_MIDI as f64 + 12.0 * (frequency / A4_FREQUENCY).log2())
}

/// Nearest MIDI note for a frequency.
///
/// Formula: round(69 + 12 × log2(f / 440))
///
/// # Returns
/// `None` if `frequency <= 0`, non-finite, or the rounded note falls
/// outside 0..=127.
pub fn frequency_to_midi(frequency: f64) -> Option<u8> {
    let exact = frequency_to_midi_exact(frequency)?;
    // Round half up so x.5 always goes to the higher note.
    let rounded = (exact + 0.5).floor();
    if rounded < MIDI_MIN as f64 || rounded > MIDI_MAX as f64 {
        return None;
    }
    Some(rounded as u8)
}

/// Equal-tempered frequency of a MIDI note: 440 × 2^((m − 69) / 12)
///
/// Returns `None` outside 0..=127.
pub fn midi_to_frequency(midi: i32) -> Option<f64> {
    if !(MIDI_MIN..=MIDI_MAX).contains(&midi) {
        return None;
    }
    Some(A4_FREQUENCY * 2f64.powf((midi - A4_MIDI) as f64 / 12.0))
}

/// Note name with octave for a MIDI number ("A4" for 69, "C-1" for 0).
pub fn midi_to_note_name(midi: i32) -> Option<String> {
    if !(MIDI_MIN..=MIDI_MAX).contains(&midi) {
        return None;
    }
    let octave = midi.div_euclid(12) - 1;
    let name = NOTE_NAMES[midi.rem_euclid(12) as usize];
    Some(format!("{}{}", name, octave))
}

/// Note name of the nearest MIDI note to `frequency`.
pub fn frequency_to_note_name(frequency: f64) -> Option<String> {
    frequency_to_midi(frequency).and_then(|midi| midi_to_note_name(midi as i32))
}

/// Cents deviation of `measured` from `target`: 1200 × log2(measured / target)
///
/// Returns `0.0` when either argument is not a positive finite number; the
/// condition is logged at debug level so callers tracing odd readings can
/// tell a real 0 from the sentinel.
pub fn calculate_cents(measured: f64, target: f64) -> f64 {
    cents_between(measured, target).unwrap_or_else(|| {
        log::debug!(
            "[FrequencyMath] Invalid cents input: measured={}, target={}",
            measured,
            target
        );
        0.0
    })
}

fn cents_between(measured: f64, target: f64) -> Option<f64> {
    let valid = |x: f64| x.is_finite() && x > 0.0;
    if !valid(measured) || !valid(target) {
        return None;
    }
    Some(1200.0 * (measured / target).log2())
}

/// Shift a frequency by a number of cents: f × 2^(c / 1200)
pub fn apply_cents(frequency: f64, cents: f64) -> f64 {
    frequency * 2f64.powf(cents / 1200.0)
}

/// Map a cents deviation to an accuracy tier.
///
/// Compares `|cents|` against the ascending thresholds with `<=`, so a
/// value exactly on a boundary lands in the tighter tier. Anything beyond
/// the `fair` bound (including NaN) is `Poor`.
pub fn categorize_accuracy(cents: f64, thresholds: &AccuracyThresholds) -> Accuracy {
    let magnitude = cents.abs();
    if magnitude <= thresholds.excellent {
        Accuracy::Excellent
    } else if magnitude <= thresholds.good {
        Accuracy::Good
    } else if magnitude <= thresholds.fair {
        Accuracy::Fair
    } else {
        Accuracy::Poor
    }
}

/// Interval in semitones from `from` to `to`: 12 × log2(to / from)
///
/// Returns `0.0` for non-positive input.
pub fn calculate_interval(from: f64, to: f64) -> f64 {
    cents_between(to, from).map(|cents| cents / 100.0).unwrap_or(0.0)
}

/// Transpose a frequency by a (possibly fractional) number of semitones.
pub fn transpose(frequency: f64, semitones: f64) -> f64 {
    frequency * 2f64.powf(semitones / 12.0)
}

/// Interpret a measured frequency against the nearest equal-tempered note.
///
/// # Returns
/// `None` when the frequency has no valid nearest MIDI note.
pub fn analyze_frequency(frequency: f64, thresholds: &AccuracyThresholds) -> Option<PitchReading> {
    let midi = frequency_to_midi(frequency)?;
    let target_frequency = midi_to_frequency(midi as i32)?;
    let note = midi_to_note_name(midi as i32)?;
    let cents = cents_between(frequency, target_frequency)?;

    Some(PitchReading {
        frequency,
        midi,
        note,
        octave: (midi as i32).div_euclid(12) - 1,
        target_frequency,
        cents,
        accuracy: categorize_accuracy(cents, thresholds),
    })
}
