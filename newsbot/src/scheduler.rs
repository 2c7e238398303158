use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::sync::Arc;
use tokio::select;
use tokio::sync::{Notify, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::pipeline::NewsPipeline;

/// Next strictly-future occurrence of `at` (UTC wall clock) after `now`.
pub fn next_occurrence(now: DateTime<Utc>, at: NaiveTime) -> DateTime<Utc> {
    let today = now.date_naive().and_time(at).and_utc();
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleState {
    pub fire_at: NaiveTime,
    pub running: bool,
    pub next_fire: Option<DateTime<Utc>>,
}

/// Fires the news pipeline once a day at a fixed UTC time.
pub struct Scheduler {
    state: RwLock<ScheduleState>,
}

impl Scheduler {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        let fire_at = NaiveTime::from_hms_opt(hour, minute, 0)
            .with_context(|| format!("invalid post time {:02}:{:02}", hour, minute))?;
        Ok(Self {
            state: RwLock::new(ScheduleState {
                fire_at,
                running: false,
                next_fire: None,
            }),
        })
    }

    pub async fn is_active(&self) -> bool {
        self.state.read().await.running
    }

    pub async fn next_fire(&self) -> Option<DateTime<Utc>> {
        self.state.read().await.next_fire
    }

    pub async fn snapshot(&self) -> ScheduleState {
        self.state.read().await.clone()
    }

    /// Arm the daily loop. Call once the host connection is ready.
    ///
    /// Returns `None` when the scheduler is already armed.
    pub async fn start(
        self: &Arc<Self>,
        pipeline: Arc<NewsPipeline>,
        shutdown: Arc<Notify>,
    ) -> Option<JoinHandle<()>> {
        {
            let mut state = self.state.write().await;
            if state.running {
                return None;
            }
            state.running = true;
            state.next_fire = Some(next_occurrence(Utc::now(), state.fire_at));
        }

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            scheduler.run_loop(pipeline, shutdown).await;
        }))
    }

    async fn run_loop(&self, pipeline: Arc<NewsPipeline>, shutdown: Arc<Notify>) {
        loop {
            let Some(due) = self.next_fire().await else {
                break;
            };
            info!(next_fire = %due, "scheduler: next daily news run");

            let wait = (due - Utc::now()).to_std().unwrap_or_default();
            select! {
                _ = tokio::time::sleep(wait) => {}
                _ = shutdown.notified() => {
                    info!("scheduler: shutdown requested, exiting loop");
                    break;
                }
            }

            self.advance(due).await;

            info!("Running daily gaming news task");
            // A panicking run must not take the schedule down with it.
            let run = Arc::clone(&pipeline);
            match tokio::spawn(async move { run.run().await }).await {
                Ok(outcome) => info!(?outcome, "scheduler: daily run finished"),
                Err(e) => error!(error = %e, "scheduler: daily run aborted"),
            }
        }

        let mut state = self.state.write().await;
        state.running = false;
        state.next_fire = None;
    }

    /// Move to the occurrence after `fired`, 24h later unless that is already past.
    async fn advance(&self, fired: DateTime<Utc>) {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let following = fired + Duration::days(1);
        state.next_fire = Some(if following > now {
            following
        } else {
            next_occurrence(now, state.fire_at)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn started_after_fire_time_fires_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 9, 14, 14, 0, 0).unwrap();
        let next = next_occurrence(now, at(9, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn started_before_fire_time_fires_today() {
        let now = Utc.with_ymd_and_hms(2025, 9, 14, 8, 59, 59).unwrap();
        let next = next_occurrence(now, at(9, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 9, 14, 9, 0, 0).unwrap());
    }

    #[test]
    fn exactly_at_fire_time_is_not_in_the_future() {
        let now = Utc.with_ymd_and_hms(2025, 9, 14, 9, 0, 0).unwrap();
        let next = next_occurrence(now, at(9, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2025, 9, 15, 9, 0, 0).unwrap());
    }

    #[test]
    fn rolls_over_month_and_year() {
        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 30, 0).unwrap();
        let next = next_occurrence(now, at(0, 15));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 1, 0, 15, 0).unwrap());
    }

    #[test]
    fn next_occurrence_is_always_ahead_and_within_a_day() {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        for minutes in (0..24 * 60).step_by(7) {
            let now = base + Duration::minutes(minutes) + Duration::seconds(13);
            let next = next_occurrence(now, at(9, 30));
            assert!(next > now);
            assert!(next - now <= Duration::days(1));
            assert_eq!(next.time(), at(9, 30));
        }
    }

    #[test]
    fn rejects_invalid_time() {
        assert!(Scheduler::new(24, 0).is_err());
        assert!(Scheduler::new(9, 60).is_err());
    }

    #[tokio::test]
    async fn idle_scheduler_reports_inactive() {
        let scheduler = Scheduler::new(9, 0).unwrap();
        assert!(!scheduler.is_active().await);
        assert_eq!(scheduler.next_fire().await, None);
    }

    #[tokio::test]
    async fn advance_keeps_daily_cadence() {
        let scheduler = Scheduler::new(9, 0).unwrap();
        let fired = next_occurrence(Utc::now(), at(9, 0));
        scheduler.advance(fired).await;
        assert_eq!(scheduler.next_fire().await, Some(fired + Duration::days(1)));
    }

    #[tokio::test]
    async fn advance_skips_missed_days() {
        let scheduler = Scheduler::new(9, 0).unwrap();
        let long_ago = Utc::now() - Duration::days(5);
        scheduler.advance(long_ago).await;
        let next = scheduler.next_fire().await.unwrap();
        assert!(next > Utc::now());
        assert_eq!(next.time(), at(9, 0));
    }
}
