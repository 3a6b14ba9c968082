use serde::{Deserialize, Serialize};

/// Which ratio the status indicator is showing.
///
/// The order is significant: cycling walks the variants in declaration
/// order and wraps back to the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    #[default]
    XFactor,
    TypingReduction,
    CharsPerKey,
}

impl DisplayMode {
    pub const ALL: [DisplayMode; 3] = [
        DisplayMode::XFactor,
        DisplayMode::TypingReduction,
        DisplayMode::CharsPerKey,
    ];

    pub fn index(self) -> usize {
        match self {
            DisplayMode::XFactor => 0,
            DisplayMode::TypingReduction => 1,
            DisplayMode::CharsPerKey => 2,
        }
    }

    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % Self::ALL.len()]
    }

    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayMode::XFactor => "coding boost",
            DisplayMode::TypingReduction => "typing reduction",
            DisplayMode::CharsPerKey => "chars per key",
        }
    }
}

/// The current display mode, advanced by the cycle command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeCycle {
    current: DisplayMode,
}

impl ModeCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> DisplayMode {
        self.current
    }

    /// Advances to the following mode and returns it.
    pub fn next(&mut self) -> DisplayMode {
        self.current = self.current.next();
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cycle_starts_at_x_factor() {
        assert_eq!(ModeCycle::new().current(), DisplayMode::XFactor);
    }

    #[test]
    fn cycle_visits_every_mode_in_order() {
        let mut cycle = ModeCycle::new();
        assert_eq!(cycle.next(), DisplayMode::TypingReduction);
        assert_eq!(cycle.next(), DisplayMode::CharsPerKey);
        assert_eq!(cycle.next(), DisplayMode::XFactor);
    }

    #[test]
    fn three_steps_return_to_start() {
        for mode in DisplayMode::ALL {
            assert_eq!(mode.next().next().next(), mode);
        }
    }

    #[test]
    fn next_is_a_bijection() {
        let mut seen: Vec<usize> = DisplayMode::ALL.iter().map(|m| m.next().index()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2]);
    }

    #[test]
    fn from_index_wraps() {
        assert_eq!(DisplayMode::from_index(3), DisplayMode::XFactor);
        assert_eq!(DisplayMode::from_index(5), DisplayMode::CharsPerKey);
    }
}
