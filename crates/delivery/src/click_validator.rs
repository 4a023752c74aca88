//! Click validator: decides ACCEPTED/REJECTED for a tracking click.
//!
//! The check order is load-bearing: empty UA is rejected as `BOT_SUSPECTED`
//! *before* duplicate detection, and duplicate detection runs before the
//! rate limiter. Reordering changes which `reject_reason` a given request
//! gets. Do not reorder.

use std::sync::Arc;

use campaign_core::error::MarketResult;
use campaign_core::store::ReadModel;
use campaign_core::types::{AdAssignment, ClickStatus, RejectReason};
use campaign_core::{config::ClickConfig, fingerprint};
use chrono::{DateTime, Utc};

use crate::rate_limit::ClickRateLimiter;

/// The outcome of validating one tracking click. `ip_hash`/`ua_hash` are
/// always populated so the caller can persist them on the `ClickEvent`
/// regardless of the decision.
#[derive(Debug, Clone)]
pub struct ClickDecision {
    pub status: ClickStatus,
    pub reject_reason: Option<RejectReason>,
    pub ip_hash: String,
    pub ua_hash: Option<String>,
    pub assignment: Option<AdAssignment>,
}

impl ClickDecision {
    /// A rejection with no resolvable assignment — only `InvalidAssignment`
    /// reaches this; the accountant records it with no campaign attribution.
    fn rejected_unresolved(reason: RejectReason, ip_hash: String, ua_hash: Option<String>) -> Self {
        Self {
            status: ClickStatus::Rejected,
            reject_reason: Some(reason),
            ip_hash,
            ua_hash,
            assignment: None,
        }
    }

    /// A rejection against a known assignment (bot-suspected, duplicate,
    /// rate-limited) — keeps the assignment so the accountant still
    /// attributes the event to its campaign/partner, just without a debit.
    fn rejected_with_assignment(
        reason: RejectReason,
        ip_hash: String,
        ua_hash: Option<String>,
        assignment: AdAssignment,
    ) -> Self {
        Self {
            status: ClickStatus::Rejected,
            reject_reason: Some(reason),
            ip_hash,
            ua_hash,
            assignment: Some(assignment),
        }
    }
}

pub struct ClickValidator {
    store: Arc<dyn ReadModel>,
    limiter: Arc<ClickRateLimiter>,
}

impl ClickValidator {
    pub fn new(store: Arc<dyn ReadModel>, limiter: Arc<ClickRateLimiter>) -> Self {
        Self { store, limiter }
    }

    pub async fn validate(
        &self,
        config: &ClickConfig,
        code: &str,
        forwarded_for: Option<&str>,
        remote_addr: &str,
        user_agent: &str,
        now: DateTime<Utc>,
    ) -> MarketResult<ClickDecision> {
        let ip = fingerprint::extract_ip(forwarded_for, remote_addr);
        let ip_hash = fingerprint::ip_hash(&ip, &config.hash_salt);
        let ua_hash = fingerprint::ua_hash(user_agent, &config.hash_salt);

        let assignment = self.store.assignment(code).await?;
        let Some(assignment) = assignment else {
            return Ok(ClickDecision::rejected_unresolved(
                RejectReason::InvalidAssignment,
                ip_hash,
                ua_hash,
            ));
        };

        if user_agent.trim().is_empty() {
            return Ok(ClickDecision::rejected_with_assignment(
                RejectReason::BotSuspected,
                ip_hash,
                ua_hash,
                assignment,
            ));
        }

        let window_start = now - chrono::Duration::seconds(config.duplicate_window_secs);
        let recent = self
            .store
            .recent_clicks_for_assignment(code, window_start)
            .await?;
        if recent.iter().any(|c| c.ip_hash == ip_hash) {
            return Ok(ClickDecision::rejected_with_assignment(
                RejectReason::DuplicateClick,
                ip_hash,
                ua_hash,
                assignment,
            ));
        }

        if !self
            .limiter
            .allow(&ip_hash, now, config.rate_limit_per_minute)
        {
            return Ok(ClickDecision::rejected_with_assignment(
                RejectReason::RateLimit,
                ip_hash,
                ua_hash,
                assignment,
            ));
        }

        Ok(ClickDecision {
            status: ClickStatus::Accepted,
            reject_reason: None,
            ip_hash,
            ua_hash,
            assignment: Some(assignment),
        })
    }
}
