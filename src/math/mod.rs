//! Frequency math engine
//!
//! Pure, stateless conversions between frequency, MIDI pitch, note names,
//! cents deviation and loudness, plus buffer statistics. Nothing here
//! panics or returns an error: malformed input resolves to a documented
//! sentinel (`None`, `0.0`, or `f64::NEG_INFINITY`) that callers check.

pub mod level;
pub mod notes;
pub mod pitch;
pub mod stats;

pub use level::{
    calculate_rms, db_to_linear, linear_to_db, normalize_buffer, peak, rms_db, DEFAULT_TARGET_PEAK,
};
pub use notes::{note_name_to_midi, NoteEntry, NoteReference, NOTE_NAMES};
pub use pitch::{
    analyze_frequency, apply_cents, calculate_cents, calculate_interval, categorize_accuracy,
    frequency_to_midi, frequency_to_midi_exact, frequency_to_note_name, midi_to_frequency,
    midi_to_note_name, transpose, Accuracy, PitchReading, A4_FREQUENCY, A4_MIDI,
};
pub use stats::{average, min_max, standard_deviation, MinMax};
