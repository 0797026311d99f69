//! Daily removal of availability rows whose date has passed.

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use croner::errors::CronError;
use croner::Cron;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::store::AvailabilityStore;
use crate::utils::error::AppResult;

/// Calendar date of `now` in `tz`.
pub fn local_date(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    now.with_timezone(&tz).date_naive()
}

/// Deletes every row dated strictly before `today`; rows for today and later stay.
pub async fn cleanup_past_availability(store: &dyn AvailabilityStore, today: NaiveDate) -> AppResult<u64> {
    info!(%today, "Starting cleanup of past resource availabilities");
    let deleted = store.delete_before(today).await?;
    info!(deleted, "Deleted past resource availability records");
    Ok(deleted)
}

pub fn next_run(cron: &Cron, tz: Tz, now: DateTime<Utc>) -> Result<DateTime<Tz>, CronError> {
    cron.find_next_occurrence(&now.with_timezone(&tz), false)
}

/// Runs the cleanup at every occurrence of `schedule` in `tz` until the
/// returned task is aborted.
pub fn spawn_cleanup_job(
    store: Arc<dyn AvailabilityStore>,
    schedule: &str,
    tz: Tz,
) -> Result<JoinHandle<()>, CronError> {
    let cron = Cron::new(schedule).parse()?;
    info!(schedule, timezone = %tz, "Starting availability cleanup scheduler");

    Ok(tokio::spawn(async move {
        loop {
            let now = Utc::now();
            let next = match next_run(&cron, tz, now) {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "No further cleanup occurrences, stopping scheduler");
                    break;
                }
            };
            info!(next_run = %next, "Next availability cleanup scheduled");

            let wait = (next.with_timezone(&Utc) - now).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            let today = local_date(Utc::now(), tz);
            if let Err(e) = cleanup_past_availability(store.as_ref(), today).await {
                error!(error = %e, "Scheduled availability cleanup failed");
            }
        }
    }))
}
