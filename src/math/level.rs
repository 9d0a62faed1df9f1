// Level module - loudness conversions and buffer scaling
//
// Buffers are time-domain f32 samples as delivered by the audio graph.

/// Default peak used by `normalize_buffer` when the caller has no preference
pub const DEFAULT_TARGET_PEAK: f32 = 0.95;

/// Linear amplitude to decibels: 20 × log10(x)
///
/// Silence maps to `f64::NEG_INFINITY`, which is a valid level rather than
/// an error. Negative or NaN amplitudes are treated as silence.
pub fn linear_to_db(linear: f64) -> f64 {
    if linear.is_nan() || linear <= 0.0 {
        return f64::NEG_INFINITY;
    }
    20.0 * linear.log10()
}

/// Decibels to linear amplitude: 10^(db / 20)
///
/// Returns `0.0` for non-finite input, so `-inf dB` round-trips to silence.
pub fn db_to_linear(db: f64) -> f64 {
    if !db.is_finite() {
        return 0.0;
    }
    10f64.powf(db / 20.0)
}

/// Root mean square of a buffer: sqrt(mean(x²))
///
/// Empty buffers yield `0.0`.
pub fn calculate_rms(buffer: &[f32]) -> f32 {
    if buffer.is_empty() {
        return 0.0;
    }
    let sum_squares: f64 = buffer.iter().map(|&x| (x as f64) * (x as f64)).sum();
    (sum_squares / buffer.len() as f64).sqrt() as f32
}

/// RMS level in dBFS.
pub fn rms_db(buffer: &[f32]) -> f64 {
    linear_to_db(calculate_rms(buffer) as f64)
}

/// Largest absolute sample value, `0.0` for empty buffers.
pub fn peak(buffer: &[f32]) -> f32 {
    buffer.iter().fold(0.0_f32, |acc, &x| acc.max(x.abs()))
}

/// Scale a buffer so its peak equals `target_peak`.
///
/// An all-silent buffer (peak 0) is returned unchanged.
pub fn normalize_buffer(buffer: &[f32], target_peak: f32) -> Vec<f32> {
    let current = peak(buffer);
    if current == 0.0 || !current.is_finite() {
        return buffer.to_vec();
    }
    let gain = target_peak / current;
    buffer.iter().map(|&x| x * gain).collect()
}
