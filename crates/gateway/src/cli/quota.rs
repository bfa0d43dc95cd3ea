//! `concierge quota <user>`: print window usage against resolved limits.

use std::sync::Arc;

use cg_domain::config::Config;
use cg_domain::quota::{Limit, QuotaStatus};

use crate::bootstrap;

fn limit(l: Limit) -> String {
    match l {
        Limit::Unlimited => "∞".into(),
        Limit::Max(n) => n.to_string(),
    }
}

fn line(status: &QuotaStatus) -> String {
    let flag = match (status.ok, status.degraded) {
        (_, true) => "degraded",
        (true, false) => "ok",
        (false, false) => "EXCEEDED",
    };
    format!(
        "{:<48} rpm {}/{}  rpd {}/{}  tpm {}/{}  tpd {}/{}  {flag}",
        status.model,
        status.used.rpm,
        limit(status.limits.rpm),
        status.used.rpd,
        limit(status.limits.rpd),
        status.used.tpm,
        limit(status.limits.tpm),
        status.used.tpd,
        limit(status.limits.tpd),
    )
}

pub async fn run(config: Arc<Config>, user: &str, model: Option<&str>) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(config).await?;
    match model {
        Some(model) => println!("{}", line(&state.quota.quota_status(user, model).await)),
        None => {
            for status in state.quota.all_quota_statuses(user).await.values() {
                println!("{}", line(status));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_domain::quota::{QuotaPolicy, QuotaUsed};

    #[test]
    fn line_shows_unlimited_and_state() {
        let status = QuotaStatus {
            model: "compound-beta".into(),
            limits: QuotaPolicy::new(Limit::Max(15), Limit::Max(200), Limit::Max(70_000), Limit::Unlimited),
            used: QuotaUsed { rpm: 15, ..Default::default() },
            ok: false,
            degraded: false,
        };
        let out = line(&status);
        assert!(out.contains("rpm 15/15"));
        assert!(out.contains("tpd 0/∞"));
        assert!(out.ends_with("EXCEEDED"));
    }
}
