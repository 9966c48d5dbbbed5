use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of time for the sampling loop. Abstracting it lets tests drive the
/// loop on tokio's paused clock.
#[async_trait]
pub trait Clock: Sync + Send + 'static {
    fn time(&self) -> DateTime<Utc>;

    /// Current time as milliseconds since the Unix epoch, the unit records
    /// are stamped with.
    fn now_millis(&self) -> i64 {
        self.time().timestamp_millis()
    }

    fn instant(&self) -> Instant;

    async fn sleep_until(&self, deadline: Instant);
}

pub struct DefaultClock;

#[async_trait]
impl Clock for DefaultClock {
    fn time(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn instant(&self) -> Instant {
        Instant::now()
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(deadline).await;
    }
}
