use crate::i18n::TargetLanguage;
use crate::service::TranslationService;
use anyhow::Result;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

/// Cron expression for the hourly rate-limiter sweep.
const PURGE_CRON: &str = "0 0 * * * *";

/// Initialize and start the scheduler.
///
/// One job per entry in `schedule_times` refreshes the priority cache of every
/// warm language, so entries are rewritten before they expire. An hourly job
/// drops rate-limit counters whose day window has lapsed.
pub async fn start_scheduler(
    service: Arc<TranslationService>,
    warm_languages: Vec<TargetLanguage>,
    schedule_times: &[String],
) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    if warm_languages.is_empty() {
        info!("No warm languages configured, skipping cache refresh jobs");
    } else {
        for time in schedule_times {
            let cron_expr = time_to_cron(time)?;
            info!("Scheduling cache refresh for {} UTC (cron: {})", time, cron_expr);

            let service_clone = Arc::clone(&service);
            let languages = warm_languages.clone();

            let job = Job::new_async(cron_expr.as_str(), move |_uuid, _l| {
                let service = Arc::clone(&service_clone);
                let languages = languages.clone();

                Box::pin(async move {
                    info!("⏰ Scheduled cache refresh triggered");
                    refresh_languages(&service, &languages);
                })
            })?;

            scheduler.add(job).await?;
        }
    }

    let service_clone = Arc::clone(&service);
    let purge = Job::new_async(PURGE_CRON, move |_uuid, _l| {
        let service = Arc::clone(&service_clone);
        Box::pin(async move {
            let removed = service.rate_limiter().purge_idle();
            info!("Purged {} idle rate-limit counters", removed);
        })
    })?;
    scheduler.add(purge).await?;

    scheduler.start().await?;
    info!("✓ Scheduler started");

    Ok(scheduler)
}

/// Kick off a refresh for each language. Languages with a job already in
/// flight are left alone.
pub fn refresh_languages(service: &TranslationService, languages: &[TargetLanguage]) {
    for &lang in languages {
        let status = service.populator().refresh(lang);
        info!("Cache refresh for {}: {}", lang, status);
    }
}

/// Convert a UTC time string (HH:MM) to a daily cron expression
fn time_to_cron(time: &str) -> Result<String> {
    let parts: Vec<&str> = time.trim().split(':').collect();
    if parts.len() != 2 {
        anyhow::bail!("Invalid time format: {}. Expected HH:MM", time);
    }

    let hour: u8 = parts[0].parse()?;
    let minute: u8 = parts[1].parse()?;
    if hour > 23 || minute > 59 {
        anyhow::bail!("Invalid time: {}. Hour must be 0-23, minute 0-59", time);
    }

    // Cron format: "second minute hour day month day_of_week"
    // We run daily, so: "0 <minute> <hour> * * *"
    Ok(format!("0 {} {} * * *", minute, hour))
}
