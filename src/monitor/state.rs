//! The monitor's state bag and its change notifications.

use serde::{Deserialize, Serialize};

use super::classify::{AlertState, DisplayColor};

/// Default value for both the initial and the current grade.
pub const DEFAULT_GRADE: f64 = 5.0;

/// Default sensitivity multiplier.
pub const DEFAULT_SENSITIVITY: f64 = 1.0;

/// The session under which grade changes are forwarded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    /// Opaque identifier assigned by the server. Grades are only forwarded
    /// while this is set.
    pub session_id: Option<String>,
    pub teacher_name: String,
    pub course_name: String,
}

impl Session {
    /// Create an active session.
    pub fn new(
        session_id: impl Into<String>,
        teacher_name: impl Into<String>,
        course_name: impl Into<String>,
    ) -> Self {
        Self {
            session_id: Some(session_id.into()),
            teacher_name: teacher_name.into(),
            course_name: course_name.into(),
        }
    }

    /// Returns the session id if one is set and non-empty.
    pub fn active_id(&self) -> Option<&str> {
        self.session_id.as_deref().filter(|id| !id.is_empty())
    }
}

/// The session grade.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Grade {
    pub initial_value: f64,
    pub current_value: f64,
    /// Pulses true for a short time after every `set_grade`.
    pub is_animating: bool,
}

impl Default for Grade {
    fn default() -> Self {
        Self {
            initial_value: DEFAULT_GRADE,
            current_value: DEFAULT_GRADE,
            is_animating: false,
        }
    }
}

/// Accumulators owned by the grading collaborator. The monitor stores them
/// but never changes them on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorCounters {
    pub silence_duration: f64,
    pub noise_duration: f64,
    pub last_penalty_time: f64,
    pub last_regeneration_time: f64,
}

/// Complete monitor state, as seen by renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorState {
    pub connected: bool,
    pub noise_level: f64,
    pub color: DisplayColor,
    pub alert: AlertState,
    /// Conventionally 0.5 to 9.0, not enforced and not applied here.
    pub sensitivity: f64,
    pub measurement_active: bool,
    pub session: Session,
    pub grade: Grade,
    pub behavior: BehaviorCounters,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self {
            connected: false,
            noise_level: 0.0,
            color: DisplayColor::Green,
            alert: AlertState::Normal,
            sensitivity: DEFAULT_SENSITIVITY,
            measurement_active: false,
            session: Session::default(),
            grade: Grade::default(),
            behavior: BehaviorCounters::default(),
        }
    }
}

/// A single field-level change published by the monitor.
///
/// Observers that only care about one facet can filter on the variant
/// instead of diffing full snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum StateChange {
    Connection(bool),
    NoiseLevel(f64),
    Color(DisplayColor),
    Alert(AlertState),
    Grade(f64),
    Animating(bool),
    Session(Session),
    Sensitivity(f64),
    MeasurementActive(bool),
    Behavior(BehaviorCounters),
}
