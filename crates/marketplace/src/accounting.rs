//! Budget accountant: turns a click decision into a persisted
//! `ClickEvent` and a redirect destination, debiting the campaign's budget
//! through the store's row-locked `record_click_and_debit`.

use std::sync::Arc;

use campaign_core::error::MarketResult;
use campaign_core::store::TransactionalStore;
use campaign_core::types::{ClickEvent, ClickStatus, RejectReason};
use campaign_delivery::ClickDecision;
use chrono::{DateTime, Utc};

const FALLBACK_DESTINATION: &str = "/";

#[derive(Debug, Clone)]
pub struct ClickSettlement {
    pub event: ClickEvent,
    pub destination: String,
}

pub struct BudgetAccountant<S> {
    store: Arc<S>,
}

impl<S: TransactionalStore> BudgetAccountant<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Always persists a `ClickEvent` and always resolves a redirect
    /// destination — the destination ad URL on success, `"/"` otherwise.
    pub async fn settle(&self, decision: ClickDecision, now: DateTime<Utc>) -> MarketResult<ClickSettlement> {
        let Some(assignment) = decision.assignment.as_ref() else {
            let event = ClickEvent {
                assignment_code: String::new(),
                partner_id: None,
                campaign_id: None,
                ad_id: None,
                ts: now,
                ip_hash: decision.ip_hash.clone(),
                ua_hash: decision.ua_hash.clone(),
                status: ClickStatus::Rejected,
                reject_reason: decision.reject_reason.or(Some(RejectReason::InvalidAssignment)),
                spend_delta: campaign_core::Money::ZERO,
                earnings_delta: campaign_core::Money::ZERO,
                profit_delta: campaign_core::Money::ZERO,
            };
            self.store.record_click(event.clone()).await?;
            return Ok(ClickSettlement {
                event,
                destination: FALLBACK_DESTINATION.to_string(),
            });
        };

        let policy_accepted = decision.status == ClickStatus::Accepted;
        let event = self
            .store
            .record_click_and_debit(
                assignment,
                policy_accepted,
                decision.reject_reason,
                decision.ip_hash,
                decision.ua_hash,
                now,
            )
            .await?;

        let destination = match self.store.ad(assignment.ad_id).await? {
            Some(ad) => ad.destination_url,
            None => FALLBACK_DESTINATION.to_string(),
        };

        Ok(ClickSettlement { event, destination })
    }
}
