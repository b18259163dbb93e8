//! Derived, read-only views over [`MonitorState`].
//!
//! Everything here is a pure function of the state snapshot, so renderers
//! can call these on every frame.

use super::classify::AlertState;
use super::state::MonitorState;

/// Grade at or above which behavior is considered excellent.
pub const GRADE_EXCELLENT: f64 = 4.5;
/// Grade at or above which behavior is considered acceptable.
pub const GRADE_ACCEPTABLE: f64 = 3.0;

/// Three-tier grade classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum GradeTier {
    NeedsImprovement,
    Acceptable,
    Excellent,
}

impl GradeTier {
    /// Boundaries are inclusive toward the higher tier.
    pub fn from_grade(grade: f64) -> Self {
        if grade >= GRADE_EXCELLENT {
            GradeTier::Excellent
        } else if grade >= GRADE_ACCEPTABLE {
            GradeTier::Acceptable
        } else {
            GradeTier::NeedsImprovement
        }
    }

    pub fn color_class(&self) -> &'static str {
        match self {
            GradeTier::Excellent => "grade-green",
            GradeTier::Acceptable => "grade-yellow",
            GradeTier::NeedsImprovement => "grade-red",
        }
    }

    pub fn status_text(&self) -> &'static str {
        match self {
            GradeTier::Excellent => "Excellent behavior!",
            GradeTier::Acceptable => "Acceptable behavior",
            GradeTier::NeedsImprovement => "Behavior needs improvement!",
        }
    }
}

impl MonitorState {
    /// Human-readable connection status line.
    pub fn status_message(&self) -> &'static str {
        if self.connected {
            "Server connected"
        } else {
            "Server disconnected"
        }
    }

    /// Style class for the connection status line.
    pub fn status_class(&self) -> &'static str {
        if self.connected {
            "status-ok"
        } else {
            "status-error"
        }
    }

    pub fn alert_active(&self) -> bool {
        self.alert.is_active()
    }

    /// Message shown while an alert is active, empty otherwise.
    pub fn alert_message(&self) -> &'static str {
        match self.alert {
            AlertState::Critical => "Critical noise level. Reduce immediately.",
            AlertState::Alert => "Elevated noise level, lower the classroom volume.",
            AlertState::Normal => "",
        }
    }

    /// Style class for the level indicator.
    pub fn alert_class(&self) -> &'static str {
        match self.alert {
            AlertState::Critical => "circle-critical",
            AlertState::Alert => "circle-alert",
            AlertState::Normal => "",
        }
    }

    pub fn grade_tier(&self) -> GradeTier {
        GradeTier::from_grade(self.grade.current_value)
    }

    pub fn grade_color_class(&self) -> &'static str {
        self.grade_tier().color_class()
    }

    pub fn grade_status_text(&self) -> &'static str {
        self.grade_tier().status_text()
    }
}
