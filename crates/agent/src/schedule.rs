//! The daily trigger: one pass per day at a fixed local time.

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, NaiveTime};

use crate::alerts::{AlertPipeline, EmailSender, PassOptions, Trigger};
use crate::store::VehicleStore;

/// Runs forever, firing one pipeline pass at `fire_at` local time each day.
/// Failures are logged and the loop keeps going; the next scheduled pass
/// (or a manual trigger) is the retry mechanism.
pub async fn daily_digest_loop<V, S>(pipeline: Arc<AlertPipeline<V, S>>, fire_at: NaiveTime)
where
    V: VehicleStore,
    S: EmailSender,
{
    loop {
        let now = Local::now().naive_local();
        let target = next_occurrence(now, fire_at);
        let wait = (target - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO);
        tracing::info!(next_run = %target, "daily digest scheduled");
        tokio::time::sleep(wait).await;

        match pipeline
            .run(PassOptions {
                trigger: Trigger::Scheduled,
                bypass_batch_gate: false,
            })
            .await
        {
            Ok(summary) => {
                tracing::info!(
                    vehicles_included = summary.vehicles_included,
                    digest_sent = summary.digest_sent,
                    "scheduled alert pass completed"
                );
            }
            Err(error) => {
                tracing::error!(?error, "scheduled alert pass failed");
            }
        }
    }
}

/// The next instant strictly after `after` whose time-of-day is `at`.
fn next_occurrence(after: NaiveDateTime, at: NaiveTime) -> NaiveDateTime {
    let candidate = after.date().and_time(at);
    if candidate <= after {
        candidate + chrono::Duration::days(1)
    } else {
        candidate
    }
}
