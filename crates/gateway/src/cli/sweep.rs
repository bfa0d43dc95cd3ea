//! `concierge sweep`: one-off retention sweep of the usage ledger.

use std::sync::Arc;

use anyhow::Context;

use cg_domain::config::Config;

pub async fn run(config: Arc<Config>, days: Option<u32>) -> anyhow::Result<()> {
    let days = days.unwrap_or(config.quota.retention_days);
    if days == 0 {
        anyhow::bail!("--days must be at least 1");
    }
    let state = crate::bootstrap::build_app_state(config).await?;
    if !state.quota.store().is_persistent() {
        eprintln!("note: quota.store = memory, nothing persists between runs");
    }
    let removed = state
        .quota
        .purge_older_than(days, chrono::Utc::now())
        .await
        .context("sweeping usage ledger")?;
    println!("removed {removed} usage event(s) older than {days} day(s)");
    Ok(())
}
