//! Noise level classification.
//!
//! Maps a raw reading onto the display color bands and onto the alert tiers
//! defined by the configured [`Thresholds`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound (exclusive) of the green color band.
pub const GREEN_BELOW: f64 = 20.0;
/// Upper bound (exclusive) of the yellow color band.
pub const YELLOW_BELOW: f64 = 30.0;

/// Thresholds for alert state computation.
///
/// A reading at or above `warning` raises an alert, a reading at or above
/// `critical` is critical. The color bands ([`classify_color`]) do not use
/// these values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Reading that triggers [`AlertState::Alert`].
    pub warning: f64,
    /// Reading that triggers [`AlertState::Critical`].
    pub critical: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            warning: 45.0,
            critical: 70.0,
        }
    }
}

impl Thresholds {
    /// Create thresholds from explicit warning and critical values.
    pub fn new(warning: f64, critical: f64) -> Self {
        Self { warning, critical }
    }

    /// Compute the alert state for a reading.
    ///
    /// Critical is checked first, so a misconfigured pair where
    /// `warning > critical` still reports critical readings as critical.
    pub fn classify(&self, level: f64) -> AlertState {
        if level >= self.critical {
            AlertState::Critical
        } else if level >= self.warning {
            AlertState::Alert
        } else {
            AlertState::Normal
        }
    }
}

/// Display color for the current reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayColor {
    #[default]
    Green,
    Yellow,
    Red,
}

impl DisplayColor {
    /// Returns the color name used by renderers.
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayColor::Green => "green",
            DisplayColor::Yellow => "yellow",
            DisplayColor::Red => "red",
        }
    }
}

impl fmt::Display for DisplayColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a reading onto its display color band.
pub fn classify_color(level: f64) -> DisplayColor {
    if level < GREEN_BELOW {
        DisplayColor::Green
    } else if level < YELLOW_BELOW {
        DisplayColor::Yellow
    } else {
        DisplayColor::Red
    }
}

/// Alert tier for the current reading.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum AlertState {
    #[default]
    Normal,
    Alert,
    Critical,
}

impl AlertState {
    /// Returns a short symbol for display.
    pub fn symbol(&self) -> &'static str {
        match self {
            AlertState::Normal => "OK",
            AlertState::Alert => "WARN",
            AlertState::Critical => "CRIT",
        }
    }

    /// True for every tier except [`AlertState::Normal`].
    pub fn is_active(&self) -> bool {
        *self != AlertState::Normal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_bands() {
        assert_eq!(classify_color(0.0), DisplayColor::Green);
        assert_eq!(classify_color(19.99), DisplayColor::Green);
        assert_eq!(classify_color(20.0), DisplayColor::Yellow);
        assert_eq!(classify_color(29.9), DisplayColor::Yellow);
        assert_eq!(classify_color(30.0), DisplayColor::Red);
        assert_eq!(classify_color(120.0), DisplayColor::Red);
    }

    #[test]
    fn test_negative_reading_is_green() {
        assert_eq!(classify_color(-5.0), DisplayColor::Green);
        assert_eq!(Thresholds::default().classify(-5.0), AlertState::Normal);
    }

    #[test]
    fn test_default_thresholds() {
        let t = Thresholds::default();
        assert_eq!(t.classify(44.9), AlertState::Normal);
        assert_eq!(t.classify(45.0), AlertState::Alert);
        assert_eq!(t.classify(69.9), AlertState::Alert);
        assert_eq!(t.classify(70.0), AlertState::Critical);
        assert_eq!(t.classify(200.0), AlertState::Critical);
    }

    #[test]
    fn test_custom_thresholds() {
        let t = Thresholds::new(10.0, 20.0);
        assert_eq!(t.classify(9.0), AlertState::Normal);
        assert_eq!(t.classify(15.0), AlertState::Alert);
        assert_eq!(t.classify(25.0), AlertState::Critical);
    }

    #[test]
    fn test_inverted_thresholds_prefer_critical() {
        let t = Thresholds::new(80.0, 50.0);
        assert_eq!(t.classify(60.0), AlertState::Critical);
        assert_eq!(t.classify(40.0), AlertState::Normal);
    }

    #[test]
    fn test_alert_state_ordering() {
        assert!(AlertState::Critical > AlertState::Alert);
        assert!(AlertState::Alert > AlertState::Normal);
        assert!(!AlertState::Normal.is_active());
        assert!(AlertState::Alert.is_active());
        assert_eq!(AlertState::Critical.symbol(), "CRIT");
    }

    #[test]
    fn test_color_serializes_lowercase() {
        let json = serde_json::to_string(&DisplayColor::Yellow).unwrap();
        assert_eq!(json, "\"yellow\"");
        assert_eq!(DisplayColor::Red.to_string(), "red");
    }
}
