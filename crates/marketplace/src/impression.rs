//! Impression tracking: records `POST /api/track/impression` hits, deduping
//! repeats from the same (assignment, ip) within a configured window so the
//! CTR estimate's denominators aren't inflated by page-refresh noise.

use std::sync::Arc;

use campaign_core::error::MarketResult;
use campaign_core::fingerprint;
use campaign_core::store::TransactionalStore;
use campaign_core::types::{AdAssignment, ImpressionDedupReason, ImpressionEvent, ImpressionStatus};
use campaign_core::config::ClickConfig;
use chrono::{DateTime, Duration, Utc};

pub struct ImpressionTracker<S> {
    store: Arc<S>,
}

impl<S: TransactionalStore> ImpressionTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Returns `Ok(None)` when the code doesn't resolve to an assignment —
    /// the caller surfaces `404 not_found`.
    pub async fn record(
        &self,
        config: &ClickConfig,
        code: &str,
        forwarded_for: Option<&str>,
        remote_addr: &str,
        now: DateTime<Utc>,
    ) -> MarketResult<Option<bool>> {
        let Some(assignment) = self.store.assignment(code).await? else {
            return Ok(None);
        };

        let ip = fingerprint::extract_ip(forwarded_for, remote_addr);
        let ip_hash = fingerprint::ip_hash(&ip, &config.hash_salt);

        let window_start = now - Duration::seconds(config.impression_dedup_window_secs);
        let recent = self
            .store
            .recent_impressions_for_assignment(code, window_start)
            .await?;
        let deduped = recent.iter().any(|i| i.ip_hash == ip_hash);

        self.store
            .record_impression(build_event(&assignment, ip_hash, now, deduped))
            .await?;

        Ok(Some(deduped))
    }
}

fn build_event(
    assignment: &AdAssignment,
    ip_hash: String,
    ts: DateTime<Utc>,
    deduped: bool,
) -> ImpressionEvent {
    ImpressionEvent {
        assignment_code: assignment.code.clone(),
        partner_id: assignment.partner_id,
        campaign_id: assignment.campaign_id,
        ad_id: assignment.ad_id,
        ts,
        ip_hash,
        status: if deduped {
            ImpressionStatus::Deduped
        } else {
            ImpressionStatus::Accepted
        },
        dedup_reason: if deduped {
            Some(ImpressionDedupReason::DuplicateWindow)
        } else {
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;
    use campaign_core::types::{AdAssignment, Targeting};

    fn config() -> ClickConfig {
        ClickConfig {
            hash_salt: "devsalt".into(),
            duplicate_window_secs: 10,
            rate_limit_per_minute: 20,
            impression_dedup_window_secs: 60,
            freq_cap_secs: 60,
        }
    }

    #[tokio::test]
    async fn unknown_code_is_none() {
        let store = Arc::new(InMemoryStore::new());
        let tracker = ImpressionTracker::new(store);
        let result = tracker
            .record(&config(), "nope", None, "1.2.3.4", Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn second_impression_in_window_is_deduped() {
        let store = Arc::new(InMemoryStore::new());
        store
            .create_assignment(AdAssignment {
                code: "abc".into(),
                partner_id: 1,
                campaign_id: 1,
                ad_id: 1,
                targeting: Targeting::default(),
                created_at: Utc::now(),
            })
            .await
            .unwrap();
        let tracker = ImpressionTracker::new(store);
        let now = Utc::now();
        let first = tracker
            .record(&config(), "abc", None, "1.2.3.4", now)
            .await
            .unwrap();
        assert_eq!(first, Some(false));

        let second = tracker
            .record(&config(), "abc", None, "1.2.3.4", now)
            .await
            .unwrap();
        assert_eq!(second, Some(true));
    }
}
