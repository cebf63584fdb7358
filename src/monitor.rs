use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::client::{ProjectController, StatusFetcher};
use crate::clock::{Clock, SystemClock};
use crate::config::ProjectConfig;
use crate::estimator::BuildDurationEstimator;
use crate::events::{BuildOccurred, MessageReceived, Observers, PollCompleted};
use crate::status::{
    Activity, BuildStatus, IntegratorState, ProjectState, SnapshotCell, StatusSnapshot,
    derive_state,
};
use crate::transition::{PollTransition, classify};

/// Watches one remote project: polls its status, classifies what changed
/// since the last poll, and notifies subscribers.
///
/// `poll` must be driven by a single task at a time. Every read accessor may
/// be called concurrently with it from any thread; each one works from a
/// single snapshot load, so it never mixes fields of two polls. Use
/// [`snapshot`](Self::snapshot) or [`report`](Self::report) when several
/// fields must agree with each other.
pub struct ProjectMonitor<F: StatusFetcher, C: ProjectController> {
    config: ProjectConfig,
    fetcher: F,
    controller: C,
    clock: Arc<dyn Clock>,
    snapshot: SnapshotCell,
    last_error: Mutex<Option<Arc<F::Error>>>,
    estimator: Mutex<BuildDurationEstimator>,
    poll_completed: Observers<Self, PollCompleted>,
    build_occurred: Observers<Self, BuildOccurred>,
    message_received: Observers<Self, MessageReceived>,
}

/// Everything the monitor knows, taken from one snapshot load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectReport {
    pub project: String,
    pub state: ProjectState,
    pub connected: bool,
    pub activity: Option<Activity>,
    pub build_status: BuildStatus,
    pub last_build_label: String,
    pub last_build_date: Option<DateTime<Utc>>,
    pub next_build_time: Option<DateTime<Utc>>,
    pub web_url: String,
    pub build_stage: String,
    pub current_message: String,
    pub server_name: String,
    pub integrator_state: IntegratorState,
    pub estimated_remaining_secs: i64,
    pub summary: String,
    pub last_error: Option<String>,
}

impl<F: StatusFetcher, C: ProjectController> ProjectMonitor<F, C> {
    pub fn new(config: ProjectConfig, fetcher: F, controller: C) -> Self {
        Self::with_clock(config, fetcher, controller, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: ProjectConfig,
        fetcher: F,
        controller: C,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            fetcher,
            controller,
            clock,
            snapshot: SnapshotCell::new(),
            last_error: Mutex::new(None),
            estimator: Mutex::new(BuildDurationEstimator::new()),
            poll_completed: Observers::new(),
            build_occurred: Observers::new(),
            message_received: Observers::new(),
        }
    }

    // --- Polling ---

    /// Run one poll cycle.
    ///
    /// On success the new snapshot is classified against the previous one,
    /// the duration estimator is updated, build and message events fire, and
    /// only then is the stored snapshot replaced. On failure the snapshot is
    /// cleared and the error stored. Poll-completed fires exactly once either
    /// way. Fetch errors never reach the caller.
    pub async fn poll(&self) {
        // No lock is held across the fetch.
        let result = self.fetcher.fetch_status(&self.config.name).await;

        match result {
            Ok(snapshot) => self.apply_snapshot(snapshot),
            Err(err) => self.apply_failure(err),
        }

        let event = PollCompleted {
            project: self.config.name.clone(),
            connected: self.is_connected(),
        };
        self.poll_completed.emit(self, &event);
    }

    /// Poll every `period` until `shutdown` resolves and return the number
    /// of polls that ran to completion.
    ///
    /// The shutdown future is created once and raced against both the tick
    /// and the poll itself, so a request arriving mid-fetch interrupts it.
    /// An interrupted poll leaves the monitor untouched: state only changes
    /// after the fetch returns.
    pub async fn watch_until<S>(&self, period: Duration, shutdown: S) -> usize
    where
        S: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut polls = 0;
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                _ = ticker.tick() => {}
            }
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    debug!(project = %self.config.name, "shutdown during poll");
                    break;
                }
                _ = self.poll() => polls += 1,
            }
        }
        polls
    }

    fn apply_snapshot(&self, snapshot: StatusSnapshot) {
        let current = Arc::new(snapshot);
        let previous = self.snapshot.load();

        debug!(
            project = %self.config.name,
            activity = %current.activity,
            status = %current.build_status,
            "poll succeeded"
        );

        if let Some(transition) = classify(previous.as_deref(), Some(current.as_ref())) {
            self.record_durations(&transition);
            self.notify(&transition, &current);
        }

        if self.snapshot.replace(Some(current)).is_none() {
            info!(project = %self.config.name, "connected");
        }
    }

    fn apply_failure(&self, err: F::Error) {
        warn!(project = %self.config.name, error = %err, "poll failed");
        if self.snapshot.replace(None).is_some() {
            info!(project = %self.config.name, "disconnected");
        }
        *lock(&self.last_error) = Some(Arc::new(err));
    }

    fn record_durations(&self, transition: &PollTransition) {
        let now = self.clock.now();
        let mut estimator = lock(&self.estimator);
        if transition.build_started {
            estimator.on_build_start(now);
        }
        if transition.build_completed && transition.build_succeeded {
            estimator.on_successful_build(now);
        }
    }

    fn notify(&self, transition: &PollTransition, current: &StatusSnapshot) {
        for kind in transition.build_events() {
            info!(project = %self.config.name, transition = %kind, "build event");
            let event = BuildOccurred {
                project: self.config.name.clone(),
                transition: kind,
            };
            self.build_occurred.emit(self, &event);
        }

        if transition.new_message_received {
            let event = MessageReceived {
                project: self.config.name.clone(),
                message: current.current_message.clone(),
            };
            self.message_received.emit(self, &event);
        }
    }

    // --- Event streams ---

    pub fn poll_completed(&self) -> &Observers<Self, PollCompleted> {
        &self.poll_completed
    }

    pub fn build_occurred(&self) -> &Observers<Self, BuildOccurred> {
        &self.build_occurred
    }

    pub fn message_received(&self) -> &Observers<Self, MessageReceived> {
        &self.message_received
    }

    // --- Control forwarding ---

    pub async fn force_build(&self) -> Result<(), C::Error> {
        self.controller.force_build(&self.config.name).await
    }

    pub async fn abort_build(&self) -> Result<(), C::Error> {
        self.controller.abort_build(&self.config.name).await
    }

    pub async fn fix_build(&self, user: &str) -> Result<(), C::Error> {
        self.controller.fix_build(&self.config.name, user).await
    }

    pub async fn stop_project(&self) -> Result<(), C::Error> {
        self.controller.stop_project(&self.config.name).await
    }

    pub async fn start_project(&self) -> Result<(), C::Error> {
        self.controller.start_project(&self.config.name).await
    }

    pub async fn cancel_pending(&self) -> Result<(), C::Error> {
        self.controller.cancel_pending_request(&self.config.name).await
    }

    // --- Queries ---

    pub fn configuration(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn project_name(&self) -> &str {
        &self.config.name
    }

    /// The current snapshot, or `None` while disconnected.
    pub fn snapshot(&self) -> Option<Arc<StatusSnapshot>> {
        self.snapshot.load()
    }

    /// Connected iff a snapshot is held. This, not [`last_error`](Self::last_error),
    /// is the connectivity signal.
    pub fn is_connected(&self) -> bool {
        !self.snapshot.is_empty()
    }

    /// Error from the most recent failed poll.
    ///
    /// A later successful poll does not clear it, so a connected monitor may
    /// still report an old error here.
    pub fn last_error(&self) -> Option<Arc<F::Error>> {
        lock(&self.last_error).clone()
    }

    pub fn project_state(&self) -> ProjectState {
        derive_state(self.snapshot.load().as_deref())
    }

    /// `None` while disconnected.
    pub fn activity(&self) -> Option<Activity> {
        self.project(|s| Some(s.activity), None)
    }

    /// `Unknown` while disconnected.
    pub fn last_build_status(&self) -> BuildStatus {
        self.project(|s| s.build_status, BuildStatus::Unknown)
    }

    pub fn last_build_label(&self) -> String {
        self.project(|s| s.last_build_label.clone(), String::new())
    }

    pub fn last_build_time(&self) -> Option<DateTime<Utc>> {
        self.project(|s| s.last_build_date, None)
    }

    pub fn next_build_time(&self) -> Option<DateTime<Utc>> {
        self.project(|s| s.next_build_time, None)
    }

    pub fn web_url(&self) -> String {
        self.project(|s| s.web_url.clone(), String::new())
    }

    pub fn build_stage(&self) -> String {
        self.project(|s| s.build_stage.clone(), String::new())
    }

    pub fn current_message(&self) -> String {
        self.project(|s| s.current_message.clone(), String::new())
    }

    pub fn server_name(&self) -> String {
        self.project(|s| s.server_name.clone(), String::new())
    }

    /// `Unknown` while disconnected.
    pub fn integrator_state(&self) -> IntegratorState {
        self.project(|s| s.integrator_state, IntegratorState::Unknown)
    }

    pub fn is_pending(&self) -> bool {
        self.project(|s| s.activity == Activity::Pending, false)
    }

    /// Time left on the running build, based on the last green build's
    /// duration. Zero unless the project is `Building`.
    pub fn estimated_remaining(&self) -> TimeDelta {
        self.remaining_for(self.snapshot.load().as_deref())
    }

    /// Empty when the project is green, else `"<project>: <state>"`.
    pub fn summary_status_string(&self) -> String {
        self.summary_for(derive_state(self.snapshot.load().as_deref()))
    }

    pub fn report(&self) -> ProjectReport {
        let snapshot = self.snapshot.load();
        let current = snapshot.as_deref();
        let state = derive_state(current);
        let text = |f: fn(&StatusSnapshot) -> String| current.map(f).unwrap_or_default();

        ProjectReport {
            project: self.config.name.clone(),
            state,
            connected: current.is_some(),
            activity: current.map(|s| s.activity),
            build_status: current.map_or(BuildStatus::Unknown, |s| s.build_status),
            last_build_label: text(|s| s.last_build_label.clone()),
            last_build_date: current.and_then(|s| s.last_build_date),
            next_build_time: current.and_then(|s| s.next_build_time),
            web_url: text(|s| s.web_url.clone()),
            build_stage: text(|s| s.build_stage.clone()),
            current_message: text(|s| s.current_message.clone()),
            server_name: text(|s| s.server_name.clone()),
            integrator_state: current.map_or(IntegratorState::Unknown, |s| s.integrator_state),
            estimated_remaining_secs: self.remaining_for(current).num_seconds(),
            summary: self.summary_for(state),
            last_error: self.last_error().map(|e| e.to_string()),
        }
    }

    fn project<T>(&self, f: impl FnOnce(&StatusSnapshot) -> T, disconnected: T) -> T {
        match self.snapshot.load() {
            Some(snapshot) => f(snapshot.as_ref()),
            None => disconnected,
        }
    }

    fn remaining_for(&self, snapshot: Option<&StatusSnapshot>) -> TimeDelta {
        match snapshot {
            Some(s) if s.activity.is_building() => {
                lock(&self.estimator).estimated_remaining(self.clock.now())
            }
            _ => TimeDelta::zero(),
        }
    }

    fn summary_for(&self, state: ProjectState) -> String {
        if state == ProjectState::Success {
            String::new()
        } else {
            format!("{}: {state}", self.config.name)
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;

    #[derive(Debug, thiserror::Error)]
    #[error("{0}")]
    struct FakeError(String);

    /// Returns scripted results in order; fails once the script runs out.
    #[derive(Default)]
    struct ScriptedFetcher {
        script: Mutex<VecDeque<Result<StatusSnapshot, FakeError>>>,
    }

    impl ScriptedFetcher {
        fn push_ok(&self, snapshot: StatusSnapshot) {
            self.script.lock().unwrap().push_back(Ok(snapshot));
        }

        fn push_err(&self, message: &str) {
            self.script
                .lock()
                .unwrap()
                .push_back(Err(FakeError(message.to_string())));
        }
    }

    impl StatusFetcher for Arc<ScriptedFetcher> {
        type Error = FakeError;

        async fn fetch_status(&self, _project: &str) -> Result<StatusSnapshot, FakeError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(FakeError("script exhausted".into())))
        }
    }

    #[derive(Default)]
    struct RecordingController {
        calls: Mutex<Vec<String>>,
        fail: bool,
    }

    impl RecordingController {
        fn record(&self, call: String) -> Result<(), FakeError> {
            self.calls.lock().unwrap().push(call.clone());
            if self.fail {
                Err(FakeError(format!("{call} rejected")))
            } else {
                Ok(())
            }
        }
    }

    impl ProjectController for Arc<RecordingController> {
        type Error = FakeError;

        async fn force_build(&self, project: &str) -> Result<(), FakeError> {
            self.record(format!("force {project}"))
        }

        async fn abort_build(&self, project: &str) -> Result<(), FakeError> {
            self.record(format!("abort {project}"))
        }

        async fn fix_build(&self, project: &str, user: &str) -> Result<(), FakeError> {
            self.record(format!("fix {project} by {user}"))
        }

        async fn stop_project(&self, project: &str) -> Result<(), FakeError> {
            self.record(format!("stop {project}"))
        }

        async fn start_project(&self, project: &str) -> Result<(), FakeError> {
            self.record(format!("start {project}"))
        }

        async fn cancel_pending_request(&self, project: &str) -> Result<(), FakeError> {
            self.record(format!("cancel {project}"))
        }
    }

    type TestMonitor = ProjectMonitor<Arc<ScriptedFetcher>, Arc<RecordingController>>;

    struct Harness {
        monitor: Arc<TestMonitor>,
        fetcher: Arc<ScriptedFetcher>,
        controller: Arc<RecordingController>,
        clock: Arc<ManualClock>,
        events: Arc<Mutex<Vec<String>>>,
    }

    fn harness_with(controller: RecordingController) -> Harness {
        let fetcher = Arc::new(ScriptedFetcher::default());
        let controller = Arc::new(controller);
        let clock = Arc::new(ManualClock::new(DateTime::<Utc>::UNIX_EPOCH));
        let monitor = Arc::new(ProjectMonitor::with_clock(
            ProjectConfig::new("core", "http://ci.local"),
            fetcher.clone(),
            controller.clone(),
            clock.clone(),
        ));

        let events = Arc::new(Mutex::new(Vec::new()));
        let log = events.clone();
        monitor.poll_completed().subscribe(move |_, e: &PollCompleted| {
            log.lock()
                .unwrap()
                .push(format!("poll-completed connected={}", e.connected));
        });
        let log = events.clone();
        monitor.build_occurred().subscribe(move |_, e: &BuildOccurred| {
            log.lock()
                .unwrap()
                .push(format!("build-occurred {:?}", e.transition));
        });
        let log = events.clone();
        monitor.message_received().subscribe(move |_, e: &MessageReceived| {
            log.lock()
                .unwrap()
                .push(format!("message {}: {}", e.project, e.message));
        });

        Harness {
            monitor,
            fetcher,
            controller,
            clock,
            events,
        }
    }

    fn harness() -> Harness {
        harness_with(RecordingController::default())
    }

    impl Harness {
        fn take_events(&self) -> Vec<String> {
            std::mem::take(&mut *self.events.lock().unwrap())
        }
    }

    fn snap(activity: Activity, status: BuildStatus) -> StatusSnapshot {
        StatusSnapshot::new("core", activity, status)
    }

    #[tokio::test]
    async fn first_poll_connects_silently() {
        let h = harness();
        assert_eq!(h.monitor.project_state(), ProjectState::NotConnected);

        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success).with_message("hi"));
        h.monitor.poll().await;

        assert!(h.monitor.is_connected());
        assert_eq!(h.monitor.project_state(), ProjectState::Success);
        assert_eq!(h.take_events(), vec!["poll-completed connected=true"]);
    }

    #[tokio::test]
    async fn build_lifecycle_scenarios() {
        let h = harness();

        // A: silent connect.
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;
        assert_eq!(h.monitor.project_state(), ProjectState::Success);
        assert_eq!(h.take_events(), vec!["poll-completed connected=true"]);

        // B: build starts.
        h.clock.advance(TimeDelta::seconds(10));
        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        assert_eq!(h.monitor.project_state(), ProjectState::Building);
        assert_eq!(
            h.take_events(),
            vec!["build-occurred Started", "poll-completed connected=true"]
        );
        assert_eq!(
            lock(&h.monitor.estimator).build_start(),
            Some(DateTime::<Utc>::UNIX_EPOCH + TimeDelta::seconds(10))
        );

        // C: build completes green.
        h.clock.advance(TimeDelta::seconds(45));
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;
        assert_eq!(h.monitor.project_state(), ProjectState::Success);
        assert_eq!(h.monitor.summary_status_string(), "");
        assert_eq!(
            h.take_events(),
            vec!["build-occurred StillSuccessful", "poll-completed connected=true"]
        );
        assert_eq!(
            lock(&h.monitor.estimator).last_duration(),
            Some(TimeDelta::seconds(45))
        );

        // D: fetch fails.
        h.fetcher.push_err("connection refused");
        h.monitor.poll().await;
        assert!(!h.monitor.is_connected());
        assert_eq!(h.monitor.project_state(), ProjectState::NotConnected);
        assert_eq!(
            h.monitor.last_error().unwrap().to_string(),
            "connection refused"
        );
        assert_eq!(h.take_events(), vec!["poll-completed connected=false"]);
    }

    #[tokio::test]
    async fn reconnect_after_failure_is_silent_and_keeps_stale_error() {
        let h = harness();
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.fetcher.push_err("timeout");
        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        for _ in 0..3 {
            h.monitor.poll().await;
        }

        assert!(h.monitor.is_connected());
        assert_eq!(h.monitor.project_state(), ProjectState::Building);
        // Reconnecting does not count as a build start.
        assert!(!h.take_events().iter().any(|e| e.starts_with("build-occurred")));
        assert_eq!(h.monitor.last_error().unwrap().to_string(), "timeout");
    }

    #[tokio::test]
    async fn estimated_remaining_tracks_last_green_build() {
        let h = harness();
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;

        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        h.clock.advance(TimeDelta::seconds(120));
        // No history yet.
        assert_eq!(h.monitor.estimated_remaining(), TimeDelta::zero());

        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;
        assert_eq!(h.monitor.estimated_remaining(), TimeDelta::zero());

        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        h.clock.advance(TimeDelta::seconds(20));
        assert_eq!(h.monitor.estimated_remaining(), TimeDelta::seconds(100));
        assert_eq!(h.monitor.report().estimated_remaining_secs, 100);

        h.clock.advance(TimeDelta::seconds(500));
        assert_eq!(h.monitor.estimated_remaining(), TimeDelta::zero());
    }

    #[tokio::test]
    async fn failed_build_keeps_previous_duration() {
        let h = harness();
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        h.monitor.poll().await;
        h.clock.advance(TimeDelta::seconds(30));
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;

        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        h.clock.advance(TimeDelta::seconds(300));
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Failure));
        h.monitor.poll().await;

        assert_eq!(
            lock(&h.monitor.estimator).last_duration(),
            Some(TimeDelta::seconds(30))
        );
        assert_eq!(h.monitor.project_state(), ProjectState::Broken);
        assert_eq!(h.monitor.summary_status_string(), "core: Broken");
        let events = h.take_events();
        assert!(events.contains(&"build-occurred Broken".to_string()));
    }

    #[tokio::test]
    async fn new_message_fires_once() {
        let h = harness();
        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.fetcher
            .push_ok(snap(Activity::Sleeping, BuildStatus::Success).with_message("deploying"));
        h.fetcher
            .push_ok(snap(Activity::Sleeping, BuildStatus::Success).with_message("deploying"));
        for _ in 0..3 {
            h.monitor.poll().await;
        }

        let messages: Vec<_> = h
            .take_events()
            .into_iter()
            .filter(|e| e.starts_with("message"))
            .collect();
        assert_eq!(messages, vec!["message core: deploying"]);
    }

    #[tokio::test]
    async fn build_events_fire_before_snapshot_is_replaced() {
        let h = harness();
        let seen = Arc::new(Mutex::new(None));
        let slot = seen.clone();
        h.monitor.build_occurred().subscribe(move |m: &TestMonitor, _| {
            *slot.lock().unwrap() = m.activity();
        });

        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.fetcher.push_ok(snap(Activity::Building, BuildStatus::Success));
        h.monitor.poll().await;
        h.monitor.poll().await;

        assert_eq!(*seen.lock().unwrap(), Some(Activity::Sleeping));
        assert_eq!(h.monitor.activity(), Some(Activity::Building));
    }

    #[tokio::test]
    async fn panicking_subscriber_does_not_break_polling() {
        let h = harness();
        h.monitor
            .poll_completed()
            .subscribe(|_, _| panic!("subscriber bug"));

        h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        h.monitor.poll().await;
        h.fetcher.push_ok(snap(Activity::Pending, BuildStatus::Failure));
        h.monitor.poll().await;

        assert_eq!(h.monitor.project_state(), ProjectState::BrokenAndBuilding);
        assert!(h.monitor.is_pending());
        assert_eq!(h.take_events().len(), 2);
    }

    #[tokio::test]
    async fn disconnected_accessors_return_defaults() {
        let h = harness();
        h.fetcher.push_err("dns failure");
        h.monitor.poll().await;

        let m = &h.monitor;
        assert_eq!(m.activity(), None);
        assert_eq!(m.last_build_status(), BuildStatus::Unknown);
        assert_eq!(m.last_build_label(), "");
        assert_eq!(m.last_build_time(), None);
        assert_eq!(m.next_build_time(), None);
        assert_eq!(m.web_url(), "");
        assert_eq!(m.build_stage(), "");
        assert_eq!(m.current_message(), "");
        assert_eq!(m.server_name(), "");
        assert_eq!(m.integrator_state(), IntegratorState::Unknown);
        assert!(!m.is_pending());
        assert_eq!(m.estimated_remaining(), TimeDelta::zero());
        assert_eq!(m.summary_status_string(), "core: Not connected");

        let report = m.report();
        assert!(!report.connected);
        assert_eq!(report.state, ProjectState::NotConnected);
        assert_eq!(report.last_error.as_deref(), Some("dns failure"));
    }

    #[tokio::test]
    async fn connected_accessors_project_the_snapshot() {
        let h = harness();
        let mut s = snap(Activity::CheckingModifications, BuildStatus::Failure).with_label("b-7");
        s.web_url = "http://ci.local/core".into();
        s.build_stage = "linking".into();
        s.server_name = "ci.local".into();
        s.integrator_state = IntegratorState::Stopped;
        h.fetcher.push_ok(s);
        h.monitor.poll().await;

        let m = &h.monitor;
        assert_eq!(m.activity(), Some(Activity::CheckingModifications));
        assert_eq!(m.last_build_label(), "b-7");
        assert_eq!(m.web_url(), "http://ci.local/core");
        assert_eq!(m.build_stage(), "linking");
        assert_eq!(m.server_name(), "ci.local");
        assert_eq!(m.integrator_state(), IntegratorState::Stopped);
        assert_eq!(m.configuration().server_url, "http://ci.local");

        let json = serde_json::to_value(m.report()).unwrap();
        assert_eq!(json["state"], "Broken");
        assert_eq!(json["summary"], "core: Broken");
    }

    #[tokio::test]
    async fn control_calls_are_forwarded() {
        let h = harness();
        h.monitor.force_build().await.unwrap();
        h.monitor.abort_build().await.unwrap();
        h.monitor.fix_build("alice").await.unwrap();
        h.monitor.stop_project().await.unwrap();
        h.monitor.start_project().await.unwrap();
        h.monitor.cancel_pending().await.unwrap();

        assert_eq!(
            *h.controller.calls.lock().unwrap(),
            vec![
                "force core",
                "abort core",
                "fix core by alice",
                "stop core",
                "start core",
                "cancel core",
            ]
        );
        assert!(h.take_events().is_empty());
        assert!(!h.monitor.is_connected());
    }

    #[tokio::test]
    async fn control_failures_propagate_unchanged() {
        let h = harness_with(RecordingController {
            fail: true,
            ..RecordingController::default()
        });
        let err = h.monitor.force_build().await.unwrap_err();
        assert_eq!(err.to_string(), "force core rejected");
        assert!(h.monitor.last_error().is_none());
    }

    #[tokio::test]
    async fn readers_never_see_mixed_snapshots() {
        let h = harness();
        let stop = Arc::new(AtomicBool::new(false));

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let monitor = h.monitor.clone();
                let stop = stop.clone();
                thread::spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let report = monitor.report();
                        match report.last_build_label.as_str() {
                            "green" => {
                                assert_eq!(report.activity, Some(Activity::Sleeping));
                                assert_eq!(report.build_status, BuildStatus::Success);
                                assert_eq!(report.state, ProjectState::Success);
                            }
                            "red" => {
                                assert_eq!(report.activity, Some(Activity::Building));
                                assert_eq!(report.build_status, BuildStatus::Failure);
                                assert_eq!(report.state, ProjectState::BrokenAndBuilding);
                            }
                            "" => assert!(!report.connected),
                            other => panic!("unexpected label {other}"),
                        }
                    }
                })
            })
            .collect();

        for i in 0..2000 {
            if i % 2 == 0 {
                h.fetcher
                    .push_ok(snap(Activity::Sleeping, BuildStatus::Success).with_label("green"));
            } else {
                h.fetcher
                    .push_ok(snap(Activity::Building, BuildStatus::Failure).with_label("red"));
            }
            h.monitor.poll().await;
        }

        stop.store(true, Ordering::Relaxed);
        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(h.monitor.last_build_label(), "red");
    }

    /// Signals `started` on entry, then never answers.
    #[derive(Default)]
    struct StalledFetcher {
        started: tokio::sync::Notify,
    }

    impl StatusFetcher for Arc<StalledFetcher> {
        type Error = FakeError;

        async fn fetch_status(&self, _project: &str) -> Result<StatusSnapshot, FakeError> {
            self.started.notify_one();
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn watch_stops_when_shutdown_arrives_mid_poll() {
        let fetcher = Arc::new(StalledFetcher::default());
        let monitor = ProjectMonitor::new(
            ProjectConfig::new("core", "http://ci.local"),
            fetcher.clone(),
            Arc::new(RecordingController::default()),
        );

        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let started = fetcher.clone();
        tokio::spawn(async move {
            started.started.notified().await;
            let _ = tx.send(());
        });

        let shutdown = async {
            let _ = rx.await;
        };
        let polls = tokio::time::timeout(
            Duration::from_secs(5),
            monitor.watch_until(Duration::from_millis(10), shutdown),
        )
        .await
        .expect("shutdown during a stalled fetch was ignored");

        assert_eq!(polls, 0);
        assert!(!monitor.is_connected());
        assert!(monitor.last_error().is_none());
    }

    #[tokio::test]
    async fn watch_polls_on_every_tick_until_shutdown() {
        let h = harness();
        for _ in 0..5 {
            h.fetcher.push_ok(snap(Activity::Sleeping, BuildStatus::Success));
        }

        let stop = Arc::new(tokio::sync::Notify::new());
        let seen = Arc::new(Mutex::new(0));
        let (trigger, counter) = (stop.clone(), seen.clone());
        h.monitor.poll_completed().subscribe(move |_, _| {
            let mut n = counter.lock().unwrap();
            *n += 1;
            if *n == 3 {
                trigger.notify_one();
            }
        });

        let polls = tokio::time::timeout(
            Duration::from_secs(5),
            h.monitor.watch_until(Duration::from_millis(1), stop.notified()),
        )
        .await
        .expect("watch loop did not stop");

        assert_eq!(polls, 3);
        assert_eq!(*seen.lock().unwrap(), 3);
        assert!(h.monitor.is_connected());
    }
}
