use std::time::Duration as StdDuration;

use chrono::{Days, Duration};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::config::JobsConfig;
use crate::engine::Routines;
use crate::engine::expand::DateWindow;

/// Runs one pass for every family: expand `[today, today + horizon]`, then
/// mark overdue logs missed. Errors are logged per family and the pass moves on.
pub async fn run_once(routines: &Routines, cfg: &JobsConfig) {
    let families = match routines.store().list_families().await {
        Ok(f) => f,
        Err(e) => {
            error!(error = %e, "jobs: list_families failed");
            return;
        }
    };
    let grace = Duration::minutes(cfg.miss_grace_minutes);
    for family in families {
        let today = match routines.today(&family.id).await {
            Ok(d) => d,
            Err(e) => {
                error!(family_id = %family.id, error = %e, "jobs: today lookup failed");
                continue;
            }
        };
        let end = today
            .checked_add_days(Days::new(u64::from(cfg.horizon_days)))
            .unwrap_or(today);
        match DateWindow::new(today, end) {
            Ok(window) => {
                if let Err(e) = routines.expand_family(&family.id, window).await {
                    error!(family_id = %family.id, error = %e, "jobs: expansion failed");
                }
            }
            Err(e) => error!(family_id = %family.id, error = %e, "jobs: bad horizon"),
        }
        if let Err(e) = routines.sweep(&family.id, grace).await {
            error!(family_id = %family.id, error = %e, "jobs: sweep failed");
        }
    }
}

/// Ticks until `shutdown` is cancelled.
pub async fn run(routines: Routines, cfg: JobsConfig, shutdown: CancellationToken) {
    info!(
        interval_secs = cfg.interval_secs,
        horizon_days = cfg.horizon_days,
        miss_grace_minutes = cfg.miss_grace_minutes,
        "jobs: started"
    );
    let mut ticker = tokio::time::interval(StdDuration::from_secs(cfg.interval_secs));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("jobs: stopping");
                break;
            }
            _ = ticker.tick() => {
                debug!("jobs: tick");
                run_once(&routines, &cfg).await;
            }
        }
    }
}
