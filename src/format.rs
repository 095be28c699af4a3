//! Presentation formatting of session metrics.
//!
//! The contracts here are fixed: duration as zero-padded `HH:MM:SS`,
//! distance in kilometers, speed in km/h, climb as one-decimal magnitudes.

/// `HH:MM:SS`, hours not wrapped at 24.
pub fn duration(millis: u64) -> String {
    let hours = millis / 3_600_000;
    let hours_remainder = millis % 3_600_000;
    let minutes = hours_remainder / 60_000;
    let seconds = (hours_remainder % 60_000) / 1_000;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Kilometers with two decimals.
pub fn distance(meters: f64) -> String {
    format!("{:.2}", meters / 1000.0)
}

/// km/h with two decimals.
pub fn speed(meters_per_second: f64) -> String {
    format!("{:.2}", meters_per_second * 3.6)
}

/// Climb magnitudes with one decimal: gain is signed-positive input, loss
/// is stored signed-negative and shown as its magnitude.
pub fn climb(gain_m: f64, loss_m: f64) -> String {
    format!("+{:.1} / -{:.1}", gain_m, loss_m.abs())
}
