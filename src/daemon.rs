/// Core daemon implementation for the VitalWeather connector
///
/// This module implements the main daemon loop that:
/// 1. Runs `pull_observations` for every integration each poll interval
/// 2. Runs `fetch_daily_summary` once a day at the configured UTC hour
/// 3. Drains per-station work triggered by the handlers onto a worker pool
/// 4. Keeps each (integration, action, station) unit from running twice at once

use crate::actions::runner::ActionRunner;
use crate::actions::ActionId;
use crate::config::{ServiceSettings, MAX_POLL_INTERVAL_MINUTES};
use crate::scheduler::{next_daily_run, ActionRequest};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashSet;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use threadpool::ThreadPool;

/// Longest the loop blocks on the queue before re-checking the schedule.
const MAX_WAIT: std::time::Duration = std::time::Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Schedule
// ---------------------------------------------------------------------------

/// When the two recurring actions are next due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    poll_interval: Duration,
    summary_hour: u32,
    pub next_poll: DateTime<Utc>,
    pub next_summary: DateTime<Utc>,
}

impl Schedule {
    /// First poll is immediate; the first summary waits for its hour.
    ///
    /// The poll interval is clamped to `1..=MAX_POLL_INTERVAL_MINUTES`.
    pub fn starting_at(now: DateTime<Utc>, settings: &ServiceSettings) -> Self {
        let minutes = settings.poll_interval_minutes.clamp(1, MAX_POLL_INTERVAL_MINUTES);
        Self {
            poll_interval: Duration::try_minutes(minutes as i64).unwrap_or(Duration::hours(1)),
            summary_hour: settings.daily_summary_hour_utc,
            next_poll: now,
            next_summary: next_daily_run(now, settings.daily_summary_hour_utc),
        }
    }

    /// Actions due at `now`; advances their next run.
    pub fn take_due(&mut self, now: DateTime<Utc>) -> Vec<ActionId> {
        let mut due = Vec::new();
        if now >= self.next_poll {
            due.push(ActionId::PullObservations);
            self.next_poll = now.checked_add_signed(self.poll_interval).unwrap_or(DateTime::<Utc>::MAX_UTC);
        }
        if now >= self.next_summary {
            due.push(ActionId::FetchDailySummary);
            self.next_summary = next_daily_run(now, self.summary_hour);
        }
        due
    }

    pub fn next_deadline(&self) -> DateTime<Utc> {
        self.next_poll.min(self.next_summary)
    }
}

// ---------------------------------------------------------------------------
// In-flight tracking
// ---------------------------------------------------------------------------

/// Releases a unit's in-flight key when dropped, including while unwinding
/// from a panicking handler.
struct InFlightGuard {
    key: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).remove(&self.key);
    }
}

// ---------------------------------------------------------------------------
// Daemon State
// ---------------------------------------------------------------------------

/// Main daemon state
pub struct Daemon {
    settings: ServiceSettings,
    runner: Arc<ActionRunner>,
    queue: Receiver<ActionRequest>,
    pool: ThreadPool,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl Daemon {
    /// `queue` is the receiving end of the `QueueScheduler` held by the
    /// runner's context.
    pub fn new(settings: ServiceSettings, runner: Arc<ActionRunner>, queue: Receiver<ActionRequest>) -> Self {
        let pool = ThreadPool::with_name("vitalweather-worker".to_string(), settings.worker_threads.max(1));
        Self {
            settings,
            runner,
            queue,
            pool,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn runner(&self) -> &Arc<ActionRunner> {
        &self.runner
    }

    /// Hands a request to the worker pool.
    ///
    /// Returns false (and drops the request) if the same unit is still running.
    pub fn submit(&self, request: ActionRequest) -> bool {
        let key = request.work_key();
        {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if !in_flight.insert(key.clone()) {
                log::warn!("Skipping {}: already in progress", key);
                return false;
            }
        }

        let runner = Arc::clone(&self.runner);
        let guard = InFlightGuard { key, in_flight: Arc::clone(&self.in_flight) };
        self.pool.execute(move || {
            let guard = guard;
            match runner.execute(&request) {
                Ok(result) => log::info!("{} finished: {}", guard.key, result),
                Err(e) => log::error!("{} failed: {}", guard.key, e),
            }
        });
        true
    }

    /// Submits every request currently waiting on the queue.
    pub fn drain_queue(&self) -> usize {
        let mut submitted = 0;
        while let Ok(request) = self.queue.try_recv() {
            if self.submit(request) {
                submitted += 1;
            }
        }
        submitted
    }

    /// Submits `action` for every configured integration.
    pub fn run_for_all_integrations(&self, action: ActionId) {
        let ids = self.runner.integration_ids();
        log::info!("Running '{}' for {} integrations", action, ids.len());
        for integration_id in ids {
            self.submit(ActionRequest::new(&integration_id, action.as_str(), None));
        }
    }

    /// Blocks until the pool is idle and no triggered work is left queued.
    pub fn run_until_idle(&self) {
        loop {
            self.pool.join();
            if self.drain_queue() == 0 {
                break;
            }
        }
    }

    /// Main daemon loop (runs indefinitely)
    pub fn run(&self) -> Result<(), String> {
        log::info!(
            "Starting daemon loop: {} integrations, poll every {} min, daily summary at {:02}:00 UTC, {} workers",
            self.runner.integration_ids().len(),
            self.settings.poll_interval_minutes,
            self.settings.daily_summary_hour_utc,
            self.settings.worker_threads
        );

        let mut schedule = Schedule::starting_at(Utc::now(), &self.settings);

        loop {
            for action in schedule.take_due(Utc::now()) {
                self.run_for_all_integrations(action);
            }

            let wait = (schedule.next_deadline() - Utc::now())
                .to_std()
                .unwrap_or_default()
                .min(MAX_WAIT);

            match self.queue.recv_timeout(wait) {
                Ok(request) => {
                    self.submit(request);
                    self.drain_queue();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    return Err("action queue disconnected".to_string());
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::handlers::tests::{FakeApi, RecordingSink};
    use crate::actions::handlers::ActionContext;
    use crate::config::{ActionConfiguration, Integration};
    use crate::ingest::fixtures::{fixture_conditions_json, fixture_stations_json};
    use crate::ingest::vitalweather::parse_envelope;
    use crate::scheduler::QueueScheduler;
    use crate::state::{MemoryStateStore, WatermarkStore};
    use chrono::TimeZone;
    use serde_json::json;

    fn test_daemon(sink: Arc<RecordingSink>) -> Daemon {
        let (scheduler, queue) = QueueScheduler::channel();
        let ctx = ActionContext {
            api: Arc::new(FakeApi {
                stations: Some(parse_envelope(fixture_stations_json())),
                conditions: Some(parse_envelope(fixture_conditions_json())),
                ..Default::default()
            }),
            sink,
            scheduler: Arc::new(scheduler),
            watermarks: WatermarkStore::new(Arc::new(MemoryStateStore::new())),
        };
        let integration = Integration {
            id: "int-1".to_string(),
            base_url: None,
            configurations: vec![
                ActionConfiguration { action_id: "auth".to_string(), data: json!({"key": "testkey"}) },
                ActionConfiguration { action_id: "pull_observations".to_string(), data: json!({}) },
            ],
        };
        let runner = Arc::new(ActionRunner::new(vec![integration], ctx));
        Daemon::new(ServiceSettings::default(), runner, queue)
    }

    #[test]
    fn test_schedule_first_poll_is_immediate() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 0, 30, 0).unwrap();
        let mut schedule = Schedule::starting_at(now, &ServiceSettings::default());

        assert_eq!(schedule.take_due(now), vec![ActionId::PullObservations]);
        assert_eq!(schedule.next_poll, now + Duration::minutes(60));
        assert_eq!(schedule.next_summary, Utc.with_ymd_and_hms(2025, 3, 3, 1, 0, 0).unwrap());
        assert_eq!(schedule.next_deadline(), schedule.next_summary);
    }

    #[test]
    fn test_schedule_daily_summary_due() {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 30, 0).unwrap();
        let mut schedule = Schedule::starting_at(start, &ServiceSettings::default());
        schedule.take_due(start);

        let at_one = Utc.with_ymd_and_hms(2025, 3, 3, 1, 0, 0).unwrap();
        assert_eq!(schedule.take_due(at_one), vec![ActionId::FetchDailySummary]);
        assert_eq!(schedule.next_summary, Utc.with_ymd_and_hms(2025, 3, 4, 1, 0, 0).unwrap());
        assert!(schedule.take_due(at_one).is_empty());
    }

    #[test]
    fn test_schedule_clamps_oversized_interval() {
        let now = Utc.with_ymd_and_hms(2025, 3, 3, 0, 30, 0).unwrap();
        let settings = ServiceSettings { poll_interval_minutes: u64::MAX, ..ServiceSettings::default() };
        let mut schedule = Schedule::starting_at(now, &settings);

        schedule.take_due(now);
        assert_eq!(schedule.next_poll, now + Duration::days(7));
    }

    #[test]
    fn test_in_flight_key_released_when_worker_panics() {
        let in_flight = Arc::new(Mutex::new(HashSet::from(["int-1/pull_station_conditions/123".to_string()])));
        let guard = InFlightGuard {
            key: "int-1/pull_station_conditions/123".to_string(),
            in_flight: Arc::clone(&in_flight),
        };

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(move || {
            let _guard = guard;
            panic!("handler blew up");
        }));

        assert!(outcome.is_err());
        assert!(in_flight.lock().unwrap().is_empty());
    }

    #[test]
    fn test_in_flight_unit_is_skipped() {
        let daemon = test_daemon(Arc::new(RecordingSink::default()));
        let request = ActionRequest::new("int-1", "fetch_daily_summary", None);
        daemon.in_flight.lock().unwrap().insert(request.work_key());

        assert!(!daemon.submit(request.clone()));

        daemon.in_flight.lock().unwrap().clear();
        assert!(daemon.submit(request));
        daemon.run_until_idle();
    }

    #[test]
    fn test_pull_observations_fans_out_to_workers() {
        let sink = Arc::new(RecordingSink::default());
        let daemon = test_daemon(sink.clone());

        daemon.run_for_all_integrations(ActionId::PullObservations);
        daemon.run_until_idle();

        // One station in the fixture: one conditions batch delivered.
        let batches = sink.observation_batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].source, 123);
        assert!(daemon.in_flight.lock().unwrap().is_empty());
    }
}
