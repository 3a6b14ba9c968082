//! Display strings for the status indicator. Every function here is total:
//! ratios that cannot be computed render as a `--` sentinel.

use crate::counter::CounterPair;
use crate::mode::DisplayMode;

pub fn render(mode: DisplayMode, pair: CounterPair) -> String {
    match mode {
        DisplayMode::XFactor => x_factor(pair),
        DisplayMode::TypingReduction => typing_reduction(pair),
        DisplayMode::CharsPerKey => chars_per_key(pair),
    }
}

/// Net characters produced per keystroke, e.g. `"2.5x coding boost"`.
pub fn x_factor(pair: CounterPair) -> String {
    if pair.key_count == 0 {
        return "-- coding boost".to_string();
    }
    let ratio = pair.char_count as f64 / pair.key_count as f64;
    format!("{:.1}x coding boost", round_to_tenth(ratio))
}

/// Percentage by which keystrokes undershoot the net character count.
pub fn typing_reduction(pair: CounterPair) -> String {
    if pair.key_count == 0 && pair.char_count == 0 {
        return "0% typing reduction".to_string();
    }

    let reduction = 1.0 - pair.key_count as f64 / pair.char_count as f64;

    // Keystrokes against zero net chars divide to infinity.
    if !reduction.is_finite() {
        return "-- typing reduction".to_string();
    }

    if reduction < 0.0 {
        let increase_percent = (-reduction * 100.0).round();
        return format!("⚠ -{}% typing reduction", increase_percent);
    }

    format!("{}% reduction", (reduction * 100.0).round())
}

pub fn chars_per_key(pair: CounterPair) -> String {
    format!("{} chars | {} keystrokes", pair.char_count, pair.key_count)
}

// Rounds half away from zero before formatting; `{:.1}` alone would round
// exact ties to even.
fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
