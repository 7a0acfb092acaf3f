// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Polling coordinator.
//!
//! Drives the entity table from a [`FeedSource`] on a fixed interval. All
//! table mutation happens inside [`Poller::run`]; fetches run as spawned
//! tasks and hand their results back over a channel, so user events keep
//! flowing while a request is outstanding. At most one request per
//! resource is in flight; ticks that find one pending are dropped.

mod activity;
mod http;

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, info, warn};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub use activity::{ActivityLog, DEFAULT_ACTIVITY_LINES};
pub use http::HttpFeed;

use crate::format::DisplayUnits;
use crate::protocol::{
    ActivityResponse, AircraftSnapshot, ParseError, ReceiverInfo, RestartResponse,
};
use crate::tracker::{EntityTable, SortColumn, UiEvent, ViewEffect};

/// Errors from a single feed request.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned HTTP {0}")]
    Status(u16),

    #[error("request timed out")]
    Timeout,

    #[error("bad document: {0}")]
    Parse(#[from] ParseError),

    #[error("empty response body")]
    Empty,
}

/// Source of feed documents.
///
/// [`HttpFeed`] is the production implementation; tests supply their own.
pub trait FeedSource: Send + Sync + 'static {
    fn fetch_aircraft(&self) -> impl Future<Output = Result<AircraftSnapshot, FetchError>> + Send;

    fn fetch_receiver(&self) -> impl Future<Output = Result<ReceiverInfo, FetchError>> + Send;

    fn fetch_activity(
        &self,
        since: u64,
    ) -> impl Future<Output = Result<ActivityResponse, FetchError>> + Send;

    fn restart_sensor(&self) -> impl Future<Output = Result<RestartResponse, FetchError>> + Send;
}

/// Wall-clock source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        if let Ok(mut now) = self.now.lock() {
            *now += delta;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(now) => *now,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

/// Feed resources that are polled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Aircraft,
    Activity,
}

/// Single-slot guard: one request per resource in flight.
#[derive(Debug, Default)]
pub struct FetchGate {
    pending: bool,
    skipped: u64,
}

impl FetchGate {
    /// Claim the slot. Returns false, and counts a skip, when a request is
    /// already pending.
    pub fn try_begin(&mut self) -> bool {
        if self.pending {
            self.skipped += 1;
            return false;
        }
        self.pending = true;
        true
    }

    pub fn finish(&mut self) {
        self.pending = false;
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Ticks dropped because a request was still pending.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}

/// Feed health as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedHealth {
    Live,
    /// The last request failed; the table shows the last good state.
    FetchFailed(String),
    /// The feed timestamp has not advanced for this many cycles.
    Stale { cycles: u32 },
}

/// Counts consecutive cycles in which the feed did not advance.
///
/// A cycle counts as non-advancing when the request failed or when the
/// snapshot carried the same `now` as the previous one.
#[derive(Debug)]
pub struct StalenessMonitor {
    limit: u32,
    cycles: u32,
    last_timestamp: Option<f64>,
    last_error: Option<String>,
}

impl StalenessMonitor {
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self {
            limit,
            cycles: 0,
            last_timestamp: None,
            last_error: None,
        }
    }

    pub fn record_snapshot(&mut self, now: f64) -> FeedHealth {
        self.last_error = None;
        if self.last_timestamp == Some(now) {
            self.cycles += 1;
        } else {
            self.cycles = 0;
            self.last_timestamp = Some(now);
        }
        self.health()
    }

    pub fn record_failure(&mut self, error: &FetchError) -> FeedHealth {
        self.cycles += 1;
        self.last_error = Some(error.to_string());
        self.health()
    }

    #[must_use]
    pub fn health(&self) -> FeedHealth {
        if self.cycles >= self.limit {
            FeedHealth::Stale {
                cycles: self.cycles,
            }
        } else if let Some(error) = &self.last_error {
            FeedHealth::FetchFailed(error.clone())
        } else {
            FeedHealth::Live
        }
    }

    #[must_use]
    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Feed timestamp of the last snapshot that advanced it.
    #[must_use]
    pub fn last_timestamp(&self) -> Option<f64> {
        self.last_timestamp
    }
}

/// Snapshot of coordinator state handed to the view on every render.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedStatus {
    pub health: FeedHealth,
    pub stale_cycles: u32,
    /// Local time of the last successful aircraft fetch.
    pub last_success: Option<DateTime<Utc>>,
    pub skipped_ticks: u64,
}

/// Configuration for the polling coordinator.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Tick interval for both resources.
    pub interval: Duration,
    pub aircraft_timeout: Duration,
    pub activity_timeout: Duration,
    pub receiver_timeout: Duration,
    pub restart_timeout: Duration,
    /// Non-advancing cycles before the feed is reported stale.
    pub stale_after_cycles: u32,
    pub poll_activity: bool,
    pub activity_max_lines: usize,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            aircraft_timeout: Duration::from_secs(5),
            activity_timeout: Duration::from_secs(3),
            receiver_timeout: Duration::from_secs(5),
            restart_timeout: Duration::from_secs(5),
            stale_after_cycles: 5,
            poll_activity: true,
            activity_max_lines: DEFAULT_ACTIVITY_LINES,
        }
    }
}

/// Presentation-only settings; they never touch the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayCommand {
    Units(DisplayUnits),
    /// Order the listing by a column, flipping direction on repeat.
    Sort(SortColumn),
}

/// Commands accepted by a running poller.
#[derive(Debug, Clone, PartialEq)]
pub enum PollerCommand {
    Ui(UiEvent),
    Display(DisplayCommand),
    RestartSensor,
}

/// Presentation layer driven by the poller. Reads only.
pub trait View {
    fn render(&mut self, table: &EntityTable, status: &FeedStatus);

    fn apply_effect(&mut self, _effect: ViewEffect) {}

    fn activity(&mut self, _log: &ActivityLog) {}

    fn display(&mut self, _command: DisplayCommand) {}

    /// One-off message for the user, e.g. a restart outcome.
    fn notice(&mut self, _message: &str) {}
}

enum Completion {
    Aircraft(Result<AircraftSnapshot, FetchError>),
    Activity(Result<ActivityResponse, FetchError>),
    Restart(Result<RestartResponse, FetchError>),
}

async fn with_timeout<T>(
    limit: Duration,
    fut: impl Future<Output = Result<T, FetchError>>,
) -> Result<T, FetchError> {
    timeout(limit, fut).await.unwrap_or(Err(FetchError::Timeout))
}

/// The polling coordinator. Owns the entity table while running.
pub struct Poller<F, C = SystemClock> {
    source: Arc<F>,
    table: EntityTable,
    config: PollerConfig,
    clock: C,
    aircraft_gate: FetchGate,
    activity_gate: FetchGate,
    staleness: StalenessMonitor,
    activity: ActivityLog,
    last_success: Option<DateTime<Utc>>,
}

impl<F, C> std::fmt::Debug for Poller<F, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("table", &self.table)
            .field("config", &self.config)
            .field("staleness", &self.staleness)
            .finish_non_exhaustive()
    }
}

impl<F: FeedSource> Poller<F> {
    #[must_use]
    pub fn new(source: F, table: EntityTable, config: PollerConfig) -> Self {
        let staleness = StalenessMonitor::new(config.stale_after_cycles);
        let activity = ActivityLog::new(config.activity_max_lines);
        Self {
            source: Arc::new(source),
            table,
            config,
            clock: SystemClock,
            aircraft_gate: FetchGate::default(),
            activity_gate: FetchGate::default(),
            staleness,
            activity,
            last_success: None,
        }
    }
}

impl<F: FeedSource, C: Clock> Poller<F, C> {
    /// Replace the clock used to stamp fetch outcomes.
    #[must_use]
    pub fn with_clock<C2: Clock>(self, clock: C2) -> Poller<F, C2> {
        Poller {
            source: self.source,
            table: self.table,
            config: self.config,
            clock,
            aircraft_gate: self.aircraft_gate,
            activity_gate: self.activity_gate,
            staleness: self.staleness,
            activity: self.activity,
            last_success: self.last_success,
        }
    }

    #[must_use]
    pub fn table(&self) -> &EntityTable {
        &self.table
    }

    #[must_use]
    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    #[must_use]
    pub fn gate(&self, resource: Resource) -> &FetchGate {
        match resource {
            Resource::Aircraft => &self.aircraft_gate,
            Resource::Activity => &self.activity_gate,
        }
    }

    #[must_use]
    pub fn status(&self) -> FeedStatus {
        FeedStatus {
            health: self.staleness.health(),
            stale_cycles: self.staleness.cycles(),
            last_success: self.last_success,
            skipped_ticks: self.aircraft_gate.skipped(),
        }
    }

    /// Run until `cancel` fires, then hand the poller back.
    ///
    /// The receiver descriptor is fetched once first and the view is
    /// centered on the site it reports; failing that, site distances are
    /// simply not computed.
    pub async fn run<V: View>(
        mut self,
        view: &mut V,
        mut commands: mpsc::Receiver<PollerCommand>,
        cancel: CancellationToken,
    ) -> Self {
        self.load_site(view).await;

        let (done_tx, mut done_rx) = mpsc::channel(8);
        let mut aircraft_tick = interval(self.config.interval);
        aircraft_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut activity_tick = interval(self.config.interval);
        activity_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut commands_open = true;

        info!("Polling every {} ms", self.config.interval.as_millis());

        loop {
            tokio::select! {
                () = cancel.cancelled() => {
                    info!("Poller cancelled");
                    break;
                }

                _ = aircraft_tick.tick() => self.begin_aircraft(&done_tx),

                _ = activity_tick.tick(), if self.config.poll_activity => {
                    self.begin_activity(&done_tx);
                }

                Some(done) = done_rx.recv() => self.complete(done, view),

                command = commands.recv(), if commands_open => match command {
                    Some(command) => self.handle_command(command, view, &done_tx),
                    None => {
                        debug!("Command channel closed");
                        commands_open = false;
                    }
                },
            }
        }

        self
    }

    async fn load_site<V: View>(&mut self, view: &mut V) {
        match with_timeout(self.config.receiver_timeout, self.source.fetch_receiver()).await {
            Ok(receiver) => {
                if let Some(version) = &receiver.version {
                    info!("Receiver {version}");
                }
                if let Some((lon, lat)) = receiver.site_position() {
                    info!("Receiver site at {lat:.4}, {lon:.4}");
                    self.table.set_site(Some((lon, lat)));
                    view.apply_effect(ViewEffect::Recenter((lon, lat)));
                }
            }
            Err(e) => warn!("Could not load receiver descriptor: {e}"),
        }
    }

    fn begin_aircraft(&mut self, done_tx: &mpsc::Sender<Completion>) {
        if !self.aircraft_gate.try_begin() {
            debug!("Aircraft fetch still pending, skipping tick");
            return;
        }
        let source = Arc::clone(&self.source);
        let limit = self.config.aircraft_timeout;
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = with_timeout(limit, source.fetch_aircraft()).await;
            let _ = done_tx.send(Completion::Aircraft(result)).await;
        });
    }

    fn begin_activity(&mut self, done_tx: &mpsc::Sender<Completion>) {
        if !self.activity_gate.try_begin() {
            debug!("Activity fetch still pending, skipping tick");
            return;
        }
        let source = Arc::clone(&self.source);
        let limit = self.config.activity_timeout;
        let since = self.activity.cursor();
        let done_tx = done_tx.clone();
        tokio::spawn(async move {
            let result = with_timeout(limit, source.fetch_activity(since)).await;
            let _ = done_tx.send(Completion::Activity(result)).await;
        });
    }

    fn complete<V: View>(&mut self, done: Completion, view: &mut V) {
        match done {
            Completion::Aircraft(Ok(snapshot)) => {
                self.aircraft_gate.finish();
                let effect = self.table.process_snapshot(&snapshot);
                let previous = self.staleness.health();
                let health = self.staleness.record_snapshot(snapshot.now);
                if health != previous {
                    if let FeedHealth::Stale { cycles } = health {
                        warn!("Feed timestamp has not advanced for {cycles} cycles");
                    } else if health == FeedHealth::Live {
                        info!("Feed is live");
                    }
                }
                self.last_success = Some(self.clock.now());
                if effect != ViewEffect::None {
                    view.apply_effect(effect);
                }
                view.render(&self.table, &self.status());
            }
            Completion::Aircraft(Err(e)) => {
                self.aircraft_gate.finish();
                warn!("Aircraft fetch failed: {e}");
                if let FeedHealth::Stale { cycles } = self.staleness.record_failure(&e) {
                    warn!("No feed progress for {cycles} cycles");
                }
                view.render(&self.table, &self.status());
            }
            Completion::Activity(Ok(response)) => {
                self.activity_gate.finish();
                if self.activity.ingest(&response) > 0 {
                    view.activity(&self.activity);
                }
            }
            Completion::Activity(Err(e)) => {
                self.activity_gate.finish();
                debug!("Activity fetch failed: {e}");
            }
            Completion::Restart(Ok(response)) => {
                let message = if response.is_ok() {
                    info!("Sensor restart accepted");
                    "Restarted".to_string()
                } else {
                    let message = response
                        .message
                        .unwrap_or_else(|| "Restart failed".to_string());
                    warn!("Sensor restart refused: {message}");
                    message
                };
                view.notice(&message);
            }
            Completion::Restart(Err(e)) => {
                warn!("Sensor restart request failed: {e}");
                view.notice("Could not reach server");
            }
        }
    }

    fn handle_command<V: View>(
        &mut self,
        command: PollerCommand,
        view: &mut V,
        done_tx: &mpsc::Sender<Completion>,
    ) {
        match command {
            PollerCommand::Ui(event) => {
                let effect = self.table.dispatch(event);
                if effect != ViewEffect::None {
                    view.apply_effect(effect);
                }
                view.render(&self.table, &self.status());
            }
            PollerCommand::Display(command) => {
                view.display(command);
                view.render(&self.table, &self.status());
            }
            PollerCommand::RestartSensor => {
                info!("Requesting sensor restart");
                self.activity.reset();
                view.activity(&self.activity);

                let source = Arc::clone(&self.source);
                let limit = self.config.restart_timeout;
                let done_tx = done_tx.clone();
                tokio::spawn(async move {
                    let result = with_timeout(limit, source.restart_sensor()).await;
                    let _ = done_tx.send(Completion::Restart(result)).await;
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::protocol::{ActivityEntry, DeviceRecord};
    use crate::tracker::TrackerConfig;

    /// Scripted feed: each aircraft call takes `delay` and returns the next
    /// `now` from `timestamps` (the last one repeats), or fails if `fail`.
    struct MockFeed {
        delay: Duration,
        timestamps: Vec<f64>,
        fail_after: Option<usize>,
        aircraft_calls: Arc<AtomicUsize>,
        activity_since: Arc<Mutex<Vec<u64>>>,
    }

    impl MockFeed {
        fn new(delay: Duration, timestamps: Vec<f64>) -> Self {
            Self {
                delay,
                timestamps,
                fail_after: None,
                aircraft_calls: Arc::new(AtomicUsize::new(0)),
                activity_since: Arc::new(Mutex::new(Vec::new())),
            }
        }
    }

    impl FeedSource for MockFeed {
        async fn fetch_aircraft(&self) -> Result<AircraftSnapshot, FetchError> {
            let call = self.aircraft_calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.fail_after.is_some_and(|n| call >= n) {
                return Err(FetchError::Status(503));
            }
            let now = self.timestamps[call.min(self.timestamps.len() - 1)];
            Ok(AircraftSnapshot {
                now,
                messages: None,
                aircraft: vec![DeviceRecord {
                    lat: Some(Some(25.78)),
                    lon: Some(Some(-80.155)),
                    seen: Some(Some(0.0)),
                    ..DeviceRecord::new("abc123")
                }],
            })
        }

        async fn fetch_receiver(&self) -> Result<ReceiverInfo, FetchError> {
            Ok(ReceiverInfo {
                lat: Some(25.78),
                lon: Some(-80.155),
                ..Default::default()
            })
        }

        async fn fetch_activity(&self, since: u64) -> Result<ActivityResponse, FetchError> {
            if let Ok(mut calls) = self.activity_since.lock() {
                calls.push(since);
            }
            Ok(ActivityResponse {
                lines: vec![ActivityEntry::Sequenced {
                    seq: since + 1,
                    text: format!("line {}", since + 1),
                }],
            })
        }

        async fn restart_sensor(&self) -> Result<RestartResponse, FetchError> {
            Ok(RestartResponse {
                status: "ok".to_string(),
                message: None,
            })
        }
    }

    #[derive(Default)]
    struct RecordingView {
        statuses: Vec<FeedStatus>,
        table_sizes: Vec<usize>,
        effects: Vec<ViewEffect>,
        notices: Vec<String>,
        activity_lines: usize,
    }

    impl View for RecordingView {
        fn render(&mut self, table: &EntityTable, status: &FeedStatus) {
            self.statuses.push(status.clone());
            self.table_sizes.push(table.len());
        }

        fn apply_effect(&mut self, effect: ViewEffect) {
            self.effects.push(effect);
        }

        fn activity(&mut self, log: &ActivityLog) {
            self.activity_lines = log.len();
        }

        fn notice(&mut self, message: &str) {
            self.notices.push(message.to_string());
        }
    }

    fn config() -> PollerConfig {
        PollerConfig {
            interval: Duration::from_secs(1),
            aircraft_timeout: Duration::from_secs(10),
            poll_activity: false,
            ..Default::default()
        }
    }

    fn cancel_after(delay: Duration) -> CancellationToken {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            token.cancel();
        });
        cancel
    }

    fn table() -> EntityTable {
        EntityTable::new(TrackerConfig::default())
    }

    #[test]
    fn test_fetch_gate() {
        let mut gate = FetchGate::default();
        assert!(gate.try_begin());
        assert!(gate.is_pending());
        assert!(!gate.try_begin());
        assert_eq!(gate.skipped(), 1);
        gate.finish();
        assert!(gate.try_begin());
    }

    #[test]
    fn test_staleness_monitor() {
        let mut monitor = StalenessMonitor::new(5);
        assert_eq!(monitor.record_snapshot(100.0), FeedHealth::Live);
        for _ in 0..4 {
            assert_eq!(monitor.record_snapshot(100.0), FeedHealth::Live);
        }
        assert_eq!(
            monitor.record_snapshot(100.0),
            FeedHealth::Stale { cycles: 5 }
        );
        assert_eq!(monitor.record_snapshot(101.0), FeedHealth::Live);
        assert_eq!(monitor.cycles(), 0);
        assert_eq!(monitor.last_timestamp(), Some(101.0));
    }

    #[test]
    fn test_failures_count_toward_staleness() {
        let mut monitor = StalenessMonitor::new(3);
        assert_eq!(
            monitor.record_failure(&FetchError::Timeout),
            FeedHealth::FetchFailed("request timed out".to_string())
        );
        monitor.record_failure(&FetchError::Empty);
        assert_eq!(
            monitor.record_failure(&FetchError::Status(500)),
            FeedHealth::Stale { cycles: 3 }
        );
        assert_eq!(monitor.record_snapshot(5.0), FeedHealth::Live);
    }

    #[test]
    fn test_manual_clock() {
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(TimeDelta::seconds(5));
        assert_eq!(clock.now().timestamp(), 1_700_000_005);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_fetch_is_not_overlapped() {
        let feed = MockFeed::new(Duration::from_millis(3500), vec![1.0, 2.0]);
        let calls = Arc::clone(&feed.aircraft_calls);
        let poller = Poller::new(feed, table(), config());
        let (_tx, rx) = mpsc::channel(4);
        let mut view = RecordingView::default();

        let poller = poller
            .run(&mut view, rx, cancel_after(Duration::from_millis(5500)))
            .await;

        // ticks at 0 and 4 fetch; 1, 2, 3 and 5 find a request pending
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(poller.gate(Resource::Aircraft).skipped(), 4);
        assert!(poller.gate(Resource::Aircraft).is_pending());
        assert_eq!(poller.table().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_frozen_feed_goes_stale_and_recovers() {
        let mut timestamps = vec![100.0; 6];
        timestamps.push(101.0);
        let feed = MockFeed::new(Duration::from_millis(10), timestamps);
        let start = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let poller = Poller::new(feed, table(), config()).with_clock(ManualClock::new(start));
        let (_tx, rx) = mpsc::channel(4);
        let mut view = RecordingView::default();

        let poller = poller
            .run(&mut view, rx, cancel_after(Duration::from_millis(6500)))
            .await;

        let healths: Vec<_> = view.statuses.iter().map(|s| s.health.clone()).collect();
        assert_eq!(healths.len(), 7);
        assert!(healths[..5].iter().all(|h| *h == FeedHealth::Live));
        assert_eq!(healths[5], FeedHealth::Stale { cycles: 5 });
        assert_eq!(healths[6], FeedHealth::Live);
        assert_eq!(poller.status().last_success, Some(start));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_fetch_keeps_last_good_table() {
        let mut feed = MockFeed::new(Duration::from_millis(10), vec![1.0, 2.0]);
        feed.fail_after = Some(1);
        let poller = Poller::new(feed, table(), config());
        let (_tx, rx) = mpsc::channel(4);
        let mut view = RecordingView::default();

        let poller = poller
            .run(&mut view, rx, cancel_after(Duration::from_millis(2500)))
            .await;

        assert_eq!(view.table_sizes, [1, 1, 1]);
        assert_eq!(
            view.statuses[2].health,
            FeedHealth::FetchFailed("server returned HTTP 503".to_string())
        );
        assert_eq!(view.statuses[2].stale_cycles, 2);
        assert!(poller.table().get("abc123").is_some());
        assert_eq!(poller.table().site(), Some((-80.155, 25.78)));
        assert_eq!(view.effects.first(), Some(&ViewEffect::Recenter((-80.155, 25.78))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_commands_processed_between_fetches() {
        let feed = MockFeed::new(Duration::from_millis(10), vec![1.0]);
        let poller = Poller::new(feed, table(), config());
        let (tx, rx) = mpsc::channel(4);
        let mut view = RecordingView::default();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            let _ = tx
                .send(PollerCommand::Ui(UiEvent::FollowRow("abc123".to_string())))
                .await;
        });

        let poller = poller
            .run(&mut view, rx, cancel_after(Duration::from_millis(800)))
            .await;

        // site on startup, then the followed entity
        assert_eq!(
            view.effects,
            [
                ViewEffect::Recenter((-80.155, 25.78)),
                ViewEffect::Recenter((-80.155, 25.78))
            ]
        );
        assert!(poller.table().get("abc123").unwrap().is_selected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_activity_cursor_and_restart() {
        let feed = MockFeed::new(Duration::from_millis(10), vec![1.0]);
        let since = Arc::clone(&feed.activity_since);
        let poller = Poller::new(
            feed,
            table(),
            PollerConfig {
                poll_activity: true,
                ..config()
            },
        );
        let (tx, rx) = mpsc::channel(4);
        let mut view = RecordingView::default();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(2500)).await;
            let _ = tx.send(PollerCommand::RestartSensor).await;
        });

        let poller = poller
            .run(&mut view, rx, cancel_after(Duration::from_millis(3500)))
            .await;

        let since = since.lock().unwrap().clone();
        assert_eq!(since, [0, 1, 2, 0]);
        assert_eq!(view.notices, ["Restarted"]);
        assert_eq!(poller.activity_log().cursor(), 1);
        assert_eq!(poller.activity_log().len(), 1);
    }
}
