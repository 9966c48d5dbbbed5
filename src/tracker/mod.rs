//! The sampling loop. [Sampler] periodically asks the [WindowObserver] what
//! holds focus, turns the observation into an [ActivityRecord](crate::store::entities::ActivityRecord)
//! with the duration accounting described on [Sampler::tick], and appends it
//! to the [ActivityStore].

pub mod classifier;

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::{
    store::{activity_store::ActivityStore, entities::NewActivity},
    utils::clock::Clock,
    window_api::WindowObserver,
};

pub const DEFAULT_SAMPLING_INTERVAL: Duration = Duration::from_millis(5000);

/// Identity of the previously recorded sample. Held in memory only and owned
/// exclusively by the sampler; it is the baseline for the next tick's delta.
struct LastActivity {
    app_name: Arc<str>,
    window_title: Arc<str>,
    timestamp: i64,
}

/// What a single tick did. The loop treats every variant the same way and
/// keeps going, which makes the continue-regardless policy an explicit branch
/// instead of a catch-all.
#[derive(Debug)]
pub enum TickOutcome {
    /// A record was appended under `id` carrying `duration` milliseconds.
    Recorded { id: u64, duration: i64 },
    /// Nothing held focus; no record was written and the baseline is kept.
    Skipped,
    /// The observer or the store failed; no record was written and the
    /// baseline is kept.
    Failed(anyhow::Error),
}

pub struct Sampler<S> {
    store: S,
    observer: Box<dyn WindowObserver + Send>,
    clock: Box<dyn Clock>,
    interval: Duration,
    shutdown: CancellationToken,
    last_activity: Option<LastActivity>,
}

impl<S: ActivityStore> Sampler<S> {
    pub fn new(
        store: S,
        observer: Box<dyn WindowObserver + Send>,
        clock: Box<dyn Clock>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            store,
            observer,
            clock,
            interval,
            shutdown,
            last_activity: None,
        }
    }

    /// Samples the foreground window once.
    ///
    /// A sample of the same application and title as the previous one is a
    /// continuation: its duration is the time elapsed since that previous
    /// tick. Any other sample starts a new session with duration 0, so the
    /// total time of a session is the sum of its per-tick deltas.
    pub async fn tick(&mut self) -> TickOutcome {
        match self.sample_once().await {
            Ok(Some((id, duration))) => TickOutcome::Recorded { id, duration },
            Ok(None) => TickOutcome::Skipped,
            Err(e) => TickOutcome::Failed(e),
        }
    }

    async fn sample_once(&mut self) -> Result<Option<(u64, i64)>> {
        let Some(window) = self
            .observer
            .focused_window()
            .context("querying the focused window")?
        else {
            return Ok(None);
        };

        let now = self.clock.now_millis();

        let duration = match &self.last_activity {
            Some(last)
                if last.app_name == window.app_name
                    && last.window_title == window.window_title =>
            {
                now - last.timestamp
            }
            _ => 0,
        };

        let category = classifier::categorize(&window.app_name, &window.window_title);

        let id = self
            .store
            .append(
                NewActivity::new(now, window.app_name.clone(), window.window_title.clone())
                    .with_category(category)
                    .with_duration(duration),
            )
            .await
            .context("appending the activity record")?;

        // Only a fully recorded tick moves the baseline. An aborted one keeps
        // the previous timestamp so no observed time is silently dropped.
        self.last_activity = Some(LastActivity {
            app_name: window.app_name,
            window_title: window.window_title,
            timestamp: now,
        });

        Ok(Some((id, duration)))
    }

    /// Executes the sampling event loop: one immediate tick, then one per
    /// interval. Ticks never overlap; a slow tick delays the next deadline
    /// instead of skipping it or running concurrently. Cancellation lets an
    /// in-flight tick finish.
    pub async fn run(mut self) -> Result<()> {
        info!("Starting sampler with interval {:?}", self.interval);
        let mut deadline = self.clock.instant();
        loop {
            match self.tick().await {
                TickOutcome::Recorded { id, duration } => {
                    debug!("Recorded activity {id} with duration {duration}ms")
                }
                TickOutcome::Skipped => debug!("No focused window, skipping this tick"),
                TickOutcome::Failed(e) => error!("Sampling tick failed {e:?}"),
            }

            deadline += self.interval;

            tokio::select! {
                // Cancelation means we stop scheduling new ticks. The tick
                // above has already run to completion.
                _ = self.shutdown.cancelled() => {
                    info!("Sampler stopped");
                    return Ok(())
                }
                _ = self.clock.sleep_until(deadline) => ()
            }
        }
    }
}

/// Detects signals sent to the process and cancels the sampling loop.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    let _ = tokio::signal::ctrl_c().await;
    cancelation.cancel();
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
    use tempfile::tempdir;
    use tokio::time::Instant;
    use tokio_util::sync::CancellationToken;

    use crate::{
        error::StoreError,
        store::{
            activity_store::{ActivityStore, JsonlActivityStore},
            entities::{ActivityRecord, AppUsageSummary, NewActivity},
        },
        utils::{clock::Clock, logging::TEST_LOGGING},
        window_api::{FocusedWindow, MockWindowObserver},
    };

    use super::{Sampler, TickOutcome};

    const TEST_START_DATE: NaiveDateTime =
        NaiveDateTime::new(NaiveDate::from_ymd_opt(2018, 7, 4).unwrap(), NaiveTime::MIN);

    const INTERVAL: Duration = Duration::from_millis(5000);

    /// Follows tokio's (paused) clock, so `tokio::time::advance` moves the
    /// recorded timestamps deterministically.
    struct TestClock {
        start_time: DateTime<Utc>,
        reference: Instant,
    }

    impl TestClock {
        fn new() -> Self {
            Self {
                start_time: Utc.from_utc_datetime(&TEST_START_DATE),
                reference: Instant::now(),
            }
        }
    }

    #[async_trait]
    impl Clock for TestClock {
        fn time(&self) -> DateTime<Utc> {
            self.start_time + self.reference.elapsed()
        }

        fn instant(&self) -> Instant {
            Instant::now()
        }

        async fn sleep_until(&self, deadline: Instant) {
            tokio::time::sleep_until(deadline).await;
        }
    }

    fn window(app: &str, title: &str) -> FocusedWindow {
        FocusedWindow {
            app_name: app.into(),
            window_title: title.into(),
        }
    }

    fn sampler_over(
        dir: &std::path::Path,
        observer: MockWindowObserver,
    ) -> Result<Sampler<JsonlActivityStore>> {
        Ok(Sampler::new(
            JsonlActivityStore::new(dir)?,
            Box::new(observer),
            Box::new(TestClock::new()),
            INTERVAL,
            CancellationToken::new(),
        ))
    }

    fn recorded_duration(outcome: TickOutcome) -> i64 {
        match outcome {
            TickOutcome::Recorded { duration, .. } => duration,
            other => panic!("expected a recorded tick, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_duration_is_a_sum_of_deltas() -> Result<()> {
        *TEST_LOGGING;
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(|| Ok(Some(window("editor", "main.rs"))));

        let dir = tempdir()?;
        let mut sampler = sampler_over(dir.path(), observer)?;

        let mut durations = vec![recorded_duration(sampler.tick().await)];
        for _ in 0..3 {
            tokio::time::advance(INTERVAL).await;
            durations.push(recorded_duration(sampler.tick().await));
        }

        // First tick of a session is always 0; 4 ticks at 5s sum to 15s.
        assert_eq!(durations, vec![0, 5000, 5000, 5000]);
        assert_eq!(durations.iter().sum::<i64>(), 3 * 5000);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_change_starts_a_new_session() -> Result<()> {
        *TEST_LOGGING;
        let mut observations = vec![
            window("editor", "main.rs"),
            window("editor", "main.rs"),
            window("editor", "lib.rs"),
            window("browser", "docs"),
        ]
        .into_iter();
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(move || Ok(Some(observations.next().unwrap())));

        let dir = tempdir()?;
        let mut sampler = sampler_over(dir.path(), observer)?;

        let mut durations = vec![recorded_duration(sampler.tick().await)];
        for _ in 0..3 {
            tokio::time::advance(INTERVAL).await;
            durations.push(recorded_duration(sampler.tick().await));
        }

        // A different title or application resets the delta to 0.
        assert_eq!(durations, vec![0, 5000, 0, 0]);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_absent_window_skips_and_keeps_the_baseline() -> Result<()> {
        *TEST_LOGGING;
        let mut observations: Vec<Option<FocusedWindow>> = vec![
            Some(window("editor", "main.rs")),
            None,
            Some(window("editor", "main.rs")),
        ];
        observations.reverse();
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(move || Ok(observations.pop().unwrap()));

        let dir = tempdir()?;
        let mut sampler = sampler_over(dir.path(), observer)?;

        assert_eq!(recorded_duration(sampler.tick().await), 0);

        tokio::time::advance(INTERVAL).await;
        assert!(matches!(sampler.tick().await, TickOutcome::Skipped));

        // The skipped tick wrote nothing and left the baseline in place, so
        // the next continuation spans the whole gap.
        tokio::time::advance(INTERVAL).await;
        assert_eq!(recorded_duration(sampler.tick().await), 10_000);

        let reader = JsonlActivityStore::new(dir.path())?;
        assert_eq!(reader.recent(10).await?.len(), 2);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_observer_failure_does_not_stop_sampling() -> Result<()> {
        *TEST_LOGGING;
        let mut calls = 0;
        let mut observer = MockWindowObserver::new();
        observer.expect_focused_window().returning(move || {
            calls += 1;
            if calls == 1 {
                Err(anyhow!("display server went away"))
            } else {
                Ok(Some(window("editor", "main.rs")))
            }
        });

        let dir = tempdir()?;
        let mut sampler = sampler_over(dir.path(), observer)?;

        assert!(matches!(sampler.tick().await, TickOutcome::Failed(_)));

        tokio::time::advance(INTERVAL).await;
        assert_eq!(recorded_duration(sampler.tick().await), 0);

        let reader = JsonlActivityStore::new(dir.path())?;
        assert_eq!(reader.recent(10).await?.len(), 1);
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_carry_classified_categories() -> Result<()> {
        *TEST_LOGGING;
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(|| Ok(Some(window("Google Chrome", "some youtube video"))));

        let dir = tempdir()?;
        let mut sampler = sampler_over(dir.path(), observer)?;
        sampler.tick().await;

        let reader = JsonlActivityStore::new(dir.path())?;
        let records = reader.recent(1).await?;
        assert_eq!(&*records[0].category, "Distraction - Social Media");
        Ok(())
    }

    struct FailingStore;

    impl ActivityStore for FailingStore {
        async fn append(&mut self, _activity: NewActivity) -> Result<u64, StoreError> {
            Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )))
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
            unimplemented!()
        }

        async fn by_time_range(
            &self,
            _start: i64,
            _end: i64,
        ) -> Result<Vec<ActivityRecord>, StoreError> {
            unimplemented!()
        }

        async fn summary(
            &self,
            _start: i64,
            _end: i64,
        ) -> Result<Vec<AppUsageSummary>, StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_failure_is_contained_in_the_tick() {
        *TEST_LOGGING;
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(|| Ok(Some(window("editor", "main.rs"))));

        let mut sampler = Sampler::new(
            FailingStore,
            Box::new(observer),
            Box::new(TestClock::new()),
            INTERVAL,
            CancellationToken::new(),
        );

        assert!(matches!(sampler.tick().await, TickOutcome::Failed(_)));
        assert!(matches!(sampler.tick().await, TickOutcome::Failed(_)));
    }

    /// Purely async store, so the paused-clock run loop never touches the
    /// blocking file pool and the schedule stays exactly deterministic.
    #[derive(Clone, Default)]
    struct MemoryStore {
        records: std::sync::Arc<std::sync::Mutex<Vec<ActivityRecord>>>,
    }

    impl ActivityStore for MemoryStore {
        async fn append(&mut self, activity: NewActivity) -> Result<u64, StoreError> {
            let mut records = self.records.lock().unwrap();
            let id = records.len() as u64 + 1;
            records.push(ActivityRecord {
                id,
                timestamp: activity.timestamp,
                app_name: activity.app_name,
                window_title: activity.window_title,
                category: activity
                    .category
                    .unwrap_or_else(|| crate::store::entities::UNCATEGORIZED.into()),
                duration: activity.duration.unwrap_or(0).max(0),
            });
            Ok(id)
        }

        async fn recent(&self, _limit: usize) -> Result<Vec<ActivityRecord>, StoreError> {
            unimplemented!()
        }

        async fn by_time_range(
            &self,
            _start: i64,
            _end: i64,
        ) -> Result<Vec<ActivityRecord>, StoreError> {
            unimplemented!()
        }

        async fn summary(
            &self,
            _start: i64,
            _end: i64,
        ) -> Result<Vec<AppUsageSummary>, StoreError> {
            unimplemented!()
        }
    }

    /// Smoke test for the whole loop: immediate first tick, fixed schedule,
    /// cooperative shutdown.
    #[tokio::test(start_paused = true)]
    async fn smoke_test_run_loop() -> Result<()> {
        *TEST_LOGGING;
        let mut observer = MockWindowObserver::new();
        observer
            .expect_focused_window()
            .returning(|| Ok(Some(window("editor", "main.rs"))))
            .times(..7);

        let store = MemoryStore::default();
        let shutdown = CancellationToken::new();
        let sampler = Sampler::new(
            store.clone(),
            Box::new(observer),
            Box::new(TestClock::new()),
            INTERVAL,
            shutdown.clone(),
        );

        let handle = tokio::spawn(sampler.run());

        // Ticks land at 0s, 5s, ..., 25s; cancel between the 6th and 7th.
        tokio::time::sleep(Duration::from_millis(27_500)).await;
        shutdown.cancel();
        handle.await??;

        let records = store.records.lock().unwrap();
        assert_eq!(records.len(), 6);
        // 6 ticks of one continuous session sum to (6 - 1) * 5000 ms.
        let total: i64 = records.iter().map(|r| r.duration).sum();
        assert_eq!(total, 5 * 5000);
        Ok(())
    }
}
