//! The level monitor view-model.
//!
//! [`LevelMonitor`] owns the state bag, applies inbound [`ChannelEvent`]s,
//! and forwards grade changes through the injected [`Transport`].
//!
//! ## Submodules
//!
//! - [`classify`]: color bands and alert [`Thresholds`]
//! - [`state`]: the [`MonitorState`] snapshot and [`StateChange`] notifications
//! - [`views`]: derived display values computed from a snapshot
//!
//! ## Data Flow
//!
//! ```text
//! Transport ──ChannelEvent──▶ LevelMonitor::handle_event()
//!                                   │
//!                                   ├──▶ watch::Sender<MonitorState>  (snapshots)
//!                                   └──▶ broadcast::Sender<StateChange> (field changes)
//!
//! UI ──set_grade()──▶ LevelMonitor ──OutboundEvent──▶ Transport
//! ```

pub mod classify;
pub mod state;
pub mod views;

pub use classify::{classify_color, AlertState, DisplayColor, Thresholds};
pub use state::{BehaviorCounters, Grade, MonitorState, Session, StateChange};
pub use views::GradeTier;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::{broadcast, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info, warn};

use crate::transport::{ChannelEvent, EventReceiver, GradeUpdate, OutboundEvent, Transport};

/// How long `is_animating` stays set after a grade change.
pub const GRADE_ANIMATION: Duration = Duration::from_millis(600);

/// Capacity of the change notification channel.
const CHANGE_BUFFER: usize = 64;

/// State shared with the animation reset tasks.
#[derive(Debug)]
struct Shared {
    state: watch::Sender<MonitorState>,
    changes: broadcast::Sender<StateChange>,
}

impl Shared {
    fn publish(&self, change: StateChange) {
        // No subscribers is fine.
        let _ = self.changes.send(change);
    }
}

/// Client-side view-model for the noise level feed.
///
/// Every mutation recomputes the derived fields synchronously, updates the
/// snapshot channel and publishes one [`StateChange`] per field that
/// actually changed.
///
/// # Example
///
/// ```
/// use level_monitor::{ChannelEvent, ChannelTransport, LevelMonitor, Thresholds};
/// use level_monitor::monitor::AlertState;
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let (transport, _peer, _events) = ChannelTransport::create("example");
/// let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::default());
///
/// monitor.handle_event(ChannelEvent::NoiseLevel(52.0));
/// assert_eq!(monitor.state().alert, AlertState::Alert);
/// # });
/// ```
#[derive(Debug)]
pub struct LevelMonitor {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    thresholds: Thresholds,
    animations: Mutex<Vec<AbortHandle>>,
    /// Runtime current at construction, used for animation resets when
    /// `set_grade` is called from outside a runtime.
    runtime: Option<Handle>,
}

impl LevelMonitor {
    /// Create a monitor bound to a transport, with fixed thresholds.
    pub fn new(transport: Arc<dyn Transport>, thresholds: Thresholds) -> Self {
        let (state, _) = watch::channel(MonitorState::default());
        let (changes, _) = broadcast::channel(CHANGE_BUFFER);
        Self {
            shared: Arc::new(Shared { state, changes }),
            transport,
            thresholds,
            animations: Mutex::new(Vec::new()),
            runtime: Handle::try_current().ok(),
        }
    }

    /// The thresholds this monitor classifies against.
    pub fn thresholds(&self) -> Thresholds {
        self.thresholds
    }

    /// Returns a description of the underlying transport.
    pub fn transport_description(&self) -> &str {
        self.transport.description()
    }

    /// A copy of the current state.
    pub fn state(&self) -> MonitorState {
        self.shared.state.borrow().clone()
    }

    /// Subscribe to full state snapshots.
    pub fn watch(&self) -> watch::Receiver<MonitorState> {
        self.shared.state.subscribe()
    }

    /// Subscribe to field-level change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.shared.changes.subscribe()
    }

    /// Apply inbound events until the transport closes its channel.
    ///
    /// Each event is handled to completion before the next is received.
    pub async fn run(&self, mut events: EventReceiver) {
        while let Some(event) = events.recv().await {
            self.handle_event(event);
        }
        debug!("Event channel closed");
    }

    /// Apply a single inbound event.
    pub fn handle_event(&self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                self.set_connected(true);
                info!("Connected to server");
            }
            ChannelEvent::ConnectFailed => {
                self.set_connected(false);
                warn!("Could not connect to server");
            }
            ChannelEvent::Disconnected => {
                self.set_connected(false);
                warn!("Server disconnected");
            }
            ChannelEvent::NoiseLevel(value) => self.update_level(value),
        }
    }

    fn set_connected(&self, connected: bool) {
        let changed = self.shared.state.send_if_modified(|state| {
            if state.connected == connected {
                return false;
            }
            state.connected = connected;
            true
        });
        if changed {
            self.shared.publish(StateChange::Connection(connected));
        }
    }

    fn update_level(&self, value: f64) {
        debug!(level = value, "Noise level update");
        self.shared.state.send_modify(|state| state.noise_level = value);
        self.shared.publish(StateChange::NoiseLevel(value));
        self.refresh_color();
    }

    /// Recompute the display color from the stored reading, then the alert
    /// state.
    pub fn refresh_color(&self) {
        let mut color = None;
        self.shared.state.send_if_modified(|state| {
            let next = classify_color(state.noise_level);
            if state.color == next {
                return false;
            }
            state.color = next;
            color = Some(next);
            true
        });
        if let Some(color) = color {
            self.shared.publish(StateChange::Color(color));
        }
        self.evaluate_thresholds();
    }

    /// Recompute the alert state from the stored reading.
    ///
    /// The state is only reassigned, and a change only published, when the
    /// computed tier differs from the current one.
    pub fn evaluate_thresholds(&self) {
        let thresholds = self.thresholds;
        let mut alert = None;
        self.shared.state.send_if_modified(|state| {
            let next = thresholds.classify(state.noise_level);
            if state.alert == next {
                return false;
            }
            state.alert = next;
            alert = Some(next);
            true
        });
        if let Some(alert) = alert {
            debug!(alert = alert.symbol(), "Alert state changed");
            self.shared.publish(StateChange::Alert(alert));
        }
    }

    /// Set a new grade and forward it to the remote party.
    ///
    /// Does nothing at all while no session id is set. Otherwise the grade
    /// is applied locally first; a failed send is logged and the local value
    /// is kept.
    ///
    /// The animation reset runs on the current tokio runtime, or on the one
    /// the monitor was created in. Without either the grade is still applied
    /// and sent, but `is_animating` is not set.
    pub fn set_grade(&self, grade: f64) {
        let session_id = self.shared.state.borrow().session.active_id().map(str::to_string);
        let Some(session_id) = session_id else {
            debug!(grade, "No active session, grade not applied");
            return;
        };

        let runtime = Handle::try_current().ok().or_else(|| self.runtime.clone());
        if runtime.is_none() {
            warn!(grade, "No tokio runtime available, grade animation skipped");
        }

        self.shared.state.send_modify(|state| {
            state.grade.current_value = grade;
            state.grade.is_animating = runtime.is_some();
        });
        self.shared.publish(StateChange::Grade(grade));
        if let Some(runtime) = runtime {
            self.shared.publish(StateChange::Animating(true));
            self.schedule_animation_reset(&runtime);
        }

        let event = OutboundEvent::GradeUpdate(GradeUpdate { session_id, grade });
        if let Err(e) = self.transport.emit(event) {
            error!(error = %e, grade, "Error sending grade update");
        }
    }

    /// Earlier resets are not cancelled by later grade changes: each one
    /// clears the flag when it fires.
    fn schedule_animation_reset(&self, runtime: &Handle) {
        let shared = Arc::clone(&self.shared);
        let handle = runtime.spawn(async move {
            tokio::time::sleep(GRADE_ANIMATION).await;
            let changed = shared.state.send_if_modified(|state| {
                let was = state.grade.is_animating;
                state.grade.is_animating = false;
                was
            });
            if changed {
                shared.publish(StateChange::Animating(false));
            }
        });

        let mut animations = self.animations.lock();
        animations.retain(|h| !h.is_finished());
        animations.push(handle.abort_handle());
    }

    /// Cancel pending animation resets.
    ///
    /// The flag keeps whatever value it has at the time of the call.
    pub fn shutdown(&self) {
        for handle in self.animations.lock().drain(..) {
            handle.abort();
        }
    }

    /// Replace the session. Passing a session without id disables grade
    /// forwarding.
    pub fn set_session(&self, session: Session) {
        let changed = self.shared.state.send_if_modified(|state| {
            if state.session == session {
                return false;
            }
            state.session = session.clone();
            true
        });
        if changed {
            info!(
                session_id = session.session_id.as_deref().unwrap_or("-"),
                teacher = %session.teacher_name,
                course = %session.course_name,
                "Session updated"
            );
            self.shared.publish(StateChange::Session(session));
        }
    }

    /// Forget the session id, keeping teacher and course names.
    pub fn clear_session(&self) {
        let mut session = self.shared.state.borrow().session.clone();
        session.session_id = None;
        self.set_session(session);
    }

    /// Set the initial grade, e.g. when a session is loaded.
    pub fn set_initial_grade(&self, grade: f64) {
        self.shared.state.send_modify(|state| state.grade.initial_value = grade);
    }

    pub fn set_sensitivity(&self, sensitivity: f64) {
        self.shared.state.send_modify(|state| state.sensitivity = sensitivity);
        self.shared.publish(StateChange::Sensitivity(sensitivity));
    }

    pub fn set_measurement_active(&self, active: bool) {
        self.shared.state.send_modify(|state| state.measurement_active = active);
        self.shared.publish(StateChange::MeasurementActive(active));
    }

    /// Let the grading collaborator update the behavior counters.
    pub fn update_behavior<F>(&self, update: F)
    where
        F: FnOnce(&mut BehaviorCounters),
    {
        let mut counters = BehaviorCounters::default();
        self.shared.state.send_modify(|state| {
            update(&mut state.behavior);
            counters = state.behavior;
        });
        self.shared.publish(StateChange::Behavior(counters));
    }
}

impl Drop for LevelMonitor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::{ChannelPeer, ChannelTransport, Frame, EVENT_LEVEL_UPDATE};
    use serde_json::json;

    fn monitor() -> (LevelMonitor, ChannelPeer) {
        let (transport, peer, _events) = ChannelTransport::create("test");
        (LevelMonitor::new(Arc::new(transport), Thresholds::default()), peer)
    }

    fn drain(rx: &mut broadcast::Receiver<StateChange>) -> Vec<StateChange> {
        let mut changes = Vec::new();
        while let Ok(change) = rx.try_recv() {
            changes.push(change);
        }
        changes
    }

    #[derive(Debug)]
    struct FailingTransport;

    impl Transport for FailingTransport {
        fn emit(&self, _event: OutboundEvent) -> Result<(), TransportError> {
            Err(TransportError::Closed)
        }

        fn description(&self) -> &str {
            "failing"
        }
    }

    #[tokio::test]
    async fn test_connection_flips() {
        let (monitor, _peer) = monitor();
        let mut changes = monitor.subscribe();

        monitor.handle_event(ChannelEvent::Connected);
        assert!(monitor.state().connected);
        monitor.handle_event(ChannelEvent::Disconnected);
        assert!(!monitor.state().connected);

        assert_eq!(
            drain(&mut changes),
            vec![StateChange::Connection(true), StateChange::Connection(false)]
        );

        assert_eq!(monitor.state(), MonitorState::default());
    }

    #[tokio::test]
    async fn test_connect_failed_clears_status() {
        let (monitor, _peer) = monitor();
        monitor.handle_event(ChannelEvent::Connected);
        monitor.handle_event(ChannelEvent::ConnectFailed);
        assert!(!monitor.state().connected);
    }

    #[tokio::test]
    async fn test_level_update_classifies() {
        let (monitor, _peer) = monitor();

        monitor.handle_event(ChannelEvent::NoiseLevel(25.0));
        let state = monitor.state();
        assert_eq!(state.noise_level, 25.0);
        assert_eq!(state.color, DisplayColor::Yellow);
        assert_eq!(state.alert, AlertState::Normal);

        monitor.handle_event(ChannelEvent::NoiseLevel(80.0));
        let state = monitor.state();
        assert_eq!(state.color, DisplayColor::Red);
        assert_eq!(state.alert, AlertState::Critical);
        assert!(state.alert_active());
    }

    #[tokio::test]
    async fn test_empty_payload_resets_to_quiet() {
        let (monitor, _peer) = monitor();
        monitor.handle_event(ChannelEvent::NoiseLevel(80.0));
        let mut changes = monitor.subscribe();

        let event = Frame::new(EVENT_LEVEL_UPDATE, json!({}))
            .into_channel_event()
            .unwrap();
        monitor.handle_event(event);

        let state = monitor.state();
        assert_eq!(state.noise_level, 0.0);
        assert_eq!(state.color, DisplayColor::Green);
        assert_eq!(state.alert, AlertState::Normal);
        assert_eq!(
            drain(&mut changes),
            vec![
                StateChange::NoiseLevel(0.0),
                StateChange::Color(DisplayColor::Green),
                StateChange::Alert(AlertState::Normal),
            ]
        );
    }

    #[tokio::test]
    async fn test_alert_sequence() {
        let (monitor, _peer) = monitor();
        let mut observed = Vec::new();
        for level in [44.0, 45.0, 70.0] {
            monitor.handle_event(ChannelEvent::NoiseLevel(level));
            observed.push(monitor.state().alert);
        }
        assert_eq!(
            observed,
            vec![AlertState::Normal, AlertState::Alert, AlertState::Critical]
        );
    }

    #[tokio::test]
    async fn test_alert_not_republished_when_unchanged() {
        let (monitor, _peer) = monitor();
        let mut changes = monitor.subscribe();

        monitor.handle_event(ChannelEvent::NoiseLevel(50.0));
        monitor.handle_event(ChannelEvent::NoiseLevel(55.0));

        let alerts: Vec<_> = drain(&mut changes)
            .into_iter()
            .filter(|c| matches!(c, StateChange::Alert(_)))
            .collect();
        assert_eq!(alerts, vec![StateChange::Alert(AlertState::Alert)]);
    }

    #[tokio::test]
    async fn test_evaluate_thresholds_is_idempotent() {
        let (monitor, _peer) = monitor();
        monitor.handle_event(ChannelEvent::NoiseLevel(75.0));
        let mut changes = monitor.subscribe();

        monitor.evaluate_thresholds();
        monitor.refresh_color();

        assert!(drain(&mut changes).is_empty());
        assert_eq!(monitor.state().alert, AlertState::Critical);
    }

    #[tokio::test]
    async fn test_custom_thresholds_apply() {
        let (transport, _peer, _events) = ChannelTransport::create("test");
        let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::new(10.0, 15.0));

        monitor.handle_event(ChannelEvent::NoiseLevel(12.0));
        let state = monitor.state();
        assert_eq!(state.alert, AlertState::Alert);
        // Color bands do not follow the thresholds.
        assert_eq!(state.color, DisplayColor::Green);
    }

    #[tokio::test]
    async fn test_set_grade_without_session_is_noop() {
        let (monitor, mut peer) = monitor();
        let mut changes = monitor.subscribe();
        let before = monitor.state();

        monitor.set_grade(2.0);

        assert_eq!(monitor.state(), before);
        assert!(drain(&mut changes).is_empty());
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_set_grade_with_empty_session_id_is_noop() {
        let (monitor, mut peer) = monitor();
        monitor.set_session(Session::new("", "Ana", "5B"));

        monitor.set_grade(2.0);

        assert_eq!(monitor.state().grade.current_value, 5.0);
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_grade_forwards_and_animates() {
        let (monitor, mut peer) = monitor();
        monitor.set_session(Session::new("s-1", "Ana", "5B"));

        monitor.set_grade(3.9);

        let state = monitor.state();
        assert_eq!(state.grade.current_value, 3.9);
        assert_eq!(state.grade.initial_value, 5.0);
        assert!(state.grade.is_animating);

        let sent = peer.outbound.try_recv().unwrap();
        assert_eq!(
            sent,
            OutboundEvent::GradeUpdate(GradeUpdate {
                session_id: "s-1".to_string(),
                grade: 3.9,
            })
        );
        assert!(peer.outbound.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(599)).await;
        assert!(monitor.state().grade.is_animating);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(!monitor.state().grade.is_animating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_grades_do_not_cancel_resets() {
        let (monitor, _peer) = monitor();
        monitor.set_session(Session::new("s-1", "Ana", "5B"));

        monitor.set_grade(4.0);
        tokio::time::sleep(Duration::from_millis(300)).await;
        monitor.set_grade(3.0);

        // The first reset fires at 600ms even though the second call
        // happened at 300ms.
        tokio::time::sleep(Duration::from_millis(301)).await;
        assert!(!monitor.state().grade.is_animating);
        assert_eq!(monitor.state().grade.current_value, 3.0);

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!monitor.state().grade.is_animating);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_reset() {
        let (monitor, _peer) = monitor();
        monitor.set_session(Session::new("s-1", "Ana", "5B"));

        monitor.set_grade(4.0);
        monitor.shutdown();

        tokio::time::sleep(Duration::from_millis(700)).await;
        assert!(monitor.state().grade.is_animating);
    }

    #[test]
    fn test_set_grade_outside_runtime_skips_animation() {
        let (monitor, mut peer) = monitor();
        monitor.set_session(Session::new("s-1", "Ana", "5B"));
        let mut changes = monitor.subscribe();

        monitor.set_grade(3.9);

        let state = monitor.state();
        assert_eq!(state.grade.current_value, 3.9);
        assert!(!state.grade.is_animating);
        assert_eq!(drain(&mut changes), vec![StateChange::Grade(3.9)]);
        assert_eq!(
            peer.outbound.try_recv().unwrap(),
            OutboundEvent::GradeUpdate(GradeUpdate {
                session_id: "s-1".to_string(),
                grade: 3.9,
            })
        );
    }

    #[test]
    fn test_set_grade_uses_construction_runtime() {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let (monitor, _peer) = {
            let _guard = runtime.enter();
            monitor()
        };
        monitor.set_session(Session::new("s-1", "Ana", "5B"));

        monitor.set_grade(4.0);
        assert!(monitor.state().grade.is_animating);

        runtime.block_on(async { tokio::time::sleep(Duration::from_millis(601)).await });
        assert!(!monitor.state().grade.is_animating);
    }

    #[tokio::test]
    async fn test_send_failure_keeps_local_grade() {
        let monitor = LevelMonitor::new(Arc::new(FailingTransport), Thresholds::default());
        monitor.set_session(Session::new("s-1", "Ana", "5B"));

        monitor.set_grade(1.5);

        let state = monitor.state();
        assert_eq!(state.grade.current_value, 1.5);
        assert_eq!(state.grade_color_class(), "grade-red");
    }

    #[tokio::test]
    async fn test_clear_session_stops_forwarding() {
        let (monitor, mut peer) = monitor();
        monitor.set_session(Session::new("s-1", "Ana", "5B"));
        monitor.clear_session();

        monitor.set_grade(4.8);

        let state = monitor.state();
        assert_eq!(state.session.teacher_name, "Ana");
        assert!(state.session.session_id.is_none());
        assert_eq!(state.grade.current_value, 5.0);
        assert!(peer.outbound.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_applies_events_in_order() {
        let (transport, peer, events) = ChannelTransport::create("test");
        let monitor = LevelMonitor::new(Arc::new(transport), Thresholds::default());

        peer.events.send(ChannelEvent::Connected).await.unwrap();
        peer.events.send(ChannelEvent::NoiseLevel(46.0)).await.unwrap();
        peer.events.send(ChannelEvent::NoiseLevel(10.0)).await.unwrap();
        drop(peer);

        monitor.run(events).await;

        let state = monitor.state();
        assert!(state.connected);
        assert_eq!(state.noise_level, 10.0);
        assert_eq!(state.alert, AlertState::Normal);
        assert_eq!(state.color, DisplayColor::Green);
    }

    #[tokio::test]
    async fn test_watch_receives_snapshots() {
        let (monitor, _peer) = monitor();
        let mut rx = monitor.watch();

        monitor.handle_event(ChannelEvent::NoiseLevel(31.0));

        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().color, DisplayColor::Red);
    }

    #[tokio::test]
    async fn test_external_fields_are_stored_only() {
        let (monitor, _peer) = monitor();

        monitor.set_sensitivity(12.0);
        monitor.set_measurement_active(true);
        monitor.set_initial_grade(4.0);
        monitor.update_behavior(|b| {
            b.silence_duration = 30.0;
            b.last_penalty_time = 12.5;
        });
        monitor.handle_event(ChannelEvent::NoiseLevel(40.0));

        let state = monitor.state();
        assert_eq!(state.sensitivity, 12.0);
        assert!(state.measurement_active);
        assert_eq!(state.grade.initial_value, 4.0);
        assert_eq!(state.grade.current_value, 5.0);
        assert_eq!(state.behavior.silence_duration, 30.0);
        assert_eq!(state.behavior.last_penalty_time, 12.5);
        assert_eq!(state.behavior.noise_duration, 0.0);
        // Sensitivity is not applied to readings.
        assert_eq!(state.noise_level, 40.0);
    }
}
