//! Periodic background sweeps: completing finished bookings, expiring unpaid
//! ones, sending same-day reminders and pruning expired sessions.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::{config::SchedulerConfig, error::Result, service::ServiceContext};

/// Spawn one interval task per sweep. Returns no handles when the scheduler
/// is disabled.
pub fn spawn_scheduler(ctx: Arc<ServiceContext>, config: &SchedulerConfig) -> Vec<JoinHandle<()>> {
    if !config.enabled {
        tracing::info!("Background scheduler disabled");
        return Vec::new();
    }

    let completion = {
        let ctx = ctx.clone();
        spawn_every("completion", config.completion_interval_secs, move || {
            let ctx = ctx.clone();
            async move { ctx.booking_service.complete_finished().await.map(|_| ()) }
        })
    };

    let expiry = {
        let ctx = ctx.clone();
        spawn_every("expiry", config.expiry_interval_secs, move || {
            let ctx = ctx.clone();
            async move { ctx.booking_service.expire_unpaid().await.map(|_| ()) }
        })
    };

    let reminders = {
        let ctx = ctx.clone();
        spawn_every("reminders", config.reminder_interval_secs, move || {
            let ctx = ctx.clone();
            async move { ctx.booking_service.send_reminders().await.map(|_| ()) }
        })
    };

    let sessions = spawn_every("session cleanup", config.completion_interval_secs, move || {
        let ctx = ctx.clone();
        async move {
            let removed = ctx.auth_service.purge_expired_sessions().await?;
            if removed > 0 {
                tracing::debug!("Removed {} expired sessions", removed);
            }
            Ok(())
        }
    });

    vec![completion, expiry, reminders, sessions]
}

fn spawn_every<F, Fut>(name: &'static str, every_secs: u64, mut job: F) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send,
{
    let period = Duration::from_secs(every_secs.max(1));
    tracing::info!("Scheduling {} sweep every {:?}", name, period);

    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = job().await {
                tracing::error!("{} sweep failed: {}", name, e);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let handle = spawn_every("test", 10, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(crate::error::AppError::Internal("boom".to_string()))
            }
        });

        tokio::time::sleep(Duration::from_secs(25)).await;
        handle.abort();
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }
}
