//! In-memory reference implementation of `campaign_core::store`'s
//! `ReadModel` / `TransactionalStore` traits. A real deployment swaps this
//! for a transactional SQL store without touching any selection, delivery,
//! or accounting call sites — see `campaign_core::store` for the contract.
//!
//! Campaigns are held in a `DashMap` keyed by id; `get_mut` on a key holds
//! that shard's lock for the guard's lifetime, giving the budget debit a
//! per-campaign row lock without a global mutex. Event logs are small
//! append-only vectors behind a `parking_lot::RwLock`, scanned on read —
//! adequate at reference-store scale.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;

use campaign_core::error::{MarketError, MarketResult};
use campaign_core::store::{ClickStats, ReadModel, TransactionalStore};
use campaign_core::types::{
    Ad, AdAssignment, AdId, Campaign, CampaignId, ClickEvent, ClickStatus, ImpressionEvent,
    ImpressionStatus, PartnerAdExposure, PartnerAdRequestEvent, PartnerId, RejectReason,
};
use campaign_core::Money;

#[derive(Default)]
pub struct InMemoryStore {
    campaigns: DashMap<CampaignId, Campaign>,
    ads: RwLock<HashMap<AdId, Ad>>,
    assignments: DashMap<String, AdAssignment>,
    exposures: DashMap<(PartnerId, AdId), PartnerAdExposure>,
    click_events: RwLock<Vec<ClickEvent>>,
    impression_events: RwLock<Vec<ImpressionEvent>>,
    request_events: RwLock<Vec<PartnerAdRequestEvent>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a campaign (used by the binary's demo data and by tests).
    pub fn put_campaign(&self, campaign: Campaign) {
        self.campaigns.insert(campaign.id, campaign);
    }

    /// Seed an ad.
    pub fn put_ad(&self, ad: Ad) {
        self.ads.write().insert(ad.id, ad);
    }

}

#[async_trait]
impl ReadModel for InMemoryStore {
    async fn active_campaigns(&self) -> MarketResult<Vec<Campaign>> {
        Ok(self
            .campaigns
            .iter()
            .filter(|e| e.status == campaign_core::types::CampaignStatus::Active)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn campaign(&self, id: CampaignId) -> MarketResult<Option<Campaign>> {
        Ok(self.campaigns.get(&id).map(|e| e.value().clone()))
    }

    async fn active_ads_for_campaign(&self, campaign_id: CampaignId) -> MarketResult<Vec<Ad>> {
        Ok(self
            .ads
            .read()
            .values()
            .filter(|a| a.campaign_id == campaign_id && a.active)
            .cloned()
            .collect())
    }

    async fn ad(&self, id: AdId) -> MarketResult<Option<Ad>> {
        Ok(self.ads.read().get(&id).cloned())
    }

    async fn exposure(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
    ) -> MarketResult<Option<PartnerAdExposure>> {
        Ok(self
            .exposures
            .get(&(partner_id, ad_id))
            .map(|e| e.value().clone()))
    }

    async fn assignment(&self, code: &str) -> MarketResult<Option<AdAssignment>> {
        Ok(self.assignments.get(code).map(|e| e.value().clone()))
    }

    async fn recent_clicks_for_assignment(
        &self,
        assignment_code: &str,
        since: DateTime<Utc>,
    ) -> MarketResult<Vec<ClickEvent>> {
        Ok(self
            .click_events
            .read()
            .iter()
            .filter(|c| c.assignment_code == assignment_code && c.ts >= since)
            .cloned()
            .collect())
    }

    async fn recent_impressions_for_assignment(
        &self,
        assignment_code: &str,
        since: DateTime<Utc>,
    ) -> MarketResult<Vec<ImpressionEvent>> {
        Ok(self
            .impression_events
            .read()
            .iter()
            .filter(|i| i.assignment_code == assignment_code && i.ts >= since)
            .cloned()
            .collect())
    }

    async fn partner_click_stats_since(
        &self,
        partner_id: PartnerId,
        since: DateTime<Utc>,
    ) -> MarketResult<ClickStats> {
        let events = self.click_events.read();
        let mut stats = ClickStats::default();
        for c in events.iter().filter(|c| c.partner_id == Some(partner_id) && c.ts >= since) {
            match c.status {
                ClickStatus::Accepted => stats.accepted += 1,
                ClickStatus::Rejected => stats.rejected += 1,
            }
        }
        Ok(stats)
    }

    async fn ad_serve_count_since(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        since: DateTime<Utc>,
    ) -> MarketResult<u64> {
        Ok(self
            .request_events
            .read()
            .iter()
            .filter(|e| e.partner_id == partner_id && e.created_at >= since && e.ad_id == Some(ad_id))
            .count() as u64)
    }

    async fn partner_request_count_since(
        &self,
        partner_id: PartnerId,
        since: DateTime<Utc>,
    ) -> MarketResult<u64> {
        Ok(self
            .request_events
            .read()
            .iter()
            .filter(|e| e.partner_id == partner_id && e.created_at >= since)
            .count() as u64)
    }

    async fn campaign_request_stats_since(
        &self,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)> {
        let filled = self
            .request_events
            .read()
            .iter()
            .filter(|e| e.campaign_id == Some(campaign_id) && e.created_at >= since && e.filled)
            .count() as u64;
        let accepted = self
            .click_events
            .read()
            .iter()
            .filter(|c| {
                c.campaign_id == Some(campaign_id)
                    && c.ts >= since
                    && c.status == ClickStatus::Accepted
            })
            .count() as u64;
        Ok((filled, accepted))
    }

    async fn impression_stats_partner_ad(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)> {
        let impressions = self.impression_events.read();
        let clicks = self.click_events.read();
        let imps = impressions
            .iter()
            .filter(|i| {
                i.partner_id == partner_id
                    && i.ad_id == ad_id
                    && i.ts >= since
                    && i.status == ImpressionStatus::Accepted
            })
            .count() as u64;
        let clk = clicks
            .iter()
            .filter(|c| {
                c.partner_id == Some(partner_id)
                    && c.ad_id == Some(ad_id)
                    && c.ts >= since
                    && c.status == ClickStatus::Accepted
            })
            .count() as u64;
        Ok((imps, clk))
    }

    async fn impression_stats_partner_campaign(
        &self,
        partner_id: PartnerId,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)> {
        let impressions = self.impression_events.read();
        let clicks = self.click_events.read();
        let imps = impressions
            .iter()
            .filter(|i| {
                i.partner_id == partner_id
                    && i.campaign_id == campaign_id
                    && i.ts >= since
                    && i.status == ImpressionStatus::Accepted
            })
            .count() as u64;
        let clk = clicks
            .iter()
            .filter(|c| {
                c.partner_id == Some(partner_id)
                    && c.campaign_id == Some(campaign_id)
                    && c.ts >= since
                    && c.status == ClickStatus::Accepted
            })
            .count() as u64;
        Ok((imps, clk))
    }

    async fn impression_stats_campaign(
        &self,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)> {
        let impressions = self.impression_events.read();
        let clicks = self.click_events.read();
        let imps = impressions
            .iter()
            .filter(|i| {
                i.campaign_id == campaign_id
                    && i.ts >= since
                    && i.status == ImpressionStatus::Accepted
            })
            .count() as u64;
        let clk = clicks
            .iter()
            .filter(|c| {
                c.campaign_id == Some(campaign_id)
                    && c.ts >= since
                    && c.status == ClickStatus::Accepted
            })
            .count() as u64;
        Ok((imps, clk))
    }

    async fn request_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MarketResult<Vec<PartnerAdRequestEvent>> {
        Ok(self
            .request_events
            .read()
            .iter()
            .filter(|e| e.created_at >= start && e.created_at < end)
            .cloned()
            .collect())
    }

    async fn recent_request_events(&self, limit: usize) -> MarketResult<Vec<PartnerAdRequestEvent>> {
        let events = self.request_events.read();
        let len = events.len();
        let start = len.saturating_sub(limit);
        Ok(events[start..].to_vec())
    }

    async fn click_stats_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MarketResult<ClickStats> {
        let events = self.click_events.read();
        let mut stats = ClickStats::default();
        for c in events.iter().filter(|c| c.ts >= start && c.ts < end) {
            match c.status {
                ClickStatus::Accepted => stats.accepted += 1,
                ClickStatus::Rejected => stats.rejected += 1,
            }
        }
        Ok(stats)
    }
}

#[async_trait]
impl TransactionalStore for InMemoryStore {
    async fn create_assignment(&self, assignment: AdAssignment) -> MarketResult<()> {
        if self.assignments.contains_key(&assignment.code) {
            return Err(MarketError::Config(format!(
                "assignment code collision: {}",
                assignment.code
            )));
        }
        self.assignments.insert(assignment.code.clone(), assignment);
        Ok(())
    }

    async fn upsert_exposure(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        served_at: DateTime<Utc>,
    ) -> MarketResult<()> {
        self.exposures
            .entry((partner_id, ad_id))
            .and_modify(|e| e.last_served_at = served_at)
            .or_insert(PartnerAdExposure {
                partner_id,
                ad_id,
                last_served_at: served_at,
            });
        Ok(())
    }

    async fn record_request_event(&self, event: PartnerAdRequestEvent) -> MarketResult<()> {
        self.request_events.write().push(event);
        Ok(())
    }

    async fn record_impression(&self, event: ImpressionEvent) -> MarketResult<()> {
        self.impression_events.write().push(event);
        Ok(())
    }

    async fn record_click(&self, event: ClickEvent) -> MarketResult<()> {
        self.click_events.write().push(event);
        Ok(())
    }

    async fn record_click_and_debit(
        &self,
        assignment: &AdAssignment,
        policy_accepted: bool,
        policy_reject_reason: Option<RejectReason>,
        ip_hash: String,
        ua_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> MarketResult<ClickEvent> {
        let base = |reason: RejectReason| ClickEvent {
            assignment_code: assignment.code.clone(),
            partner_id: Some(assignment.partner_id),
            campaign_id: Some(assignment.campaign_id),
            ad_id: Some(assignment.ad_id),
            ts: now,
            ip_hash: ip_hash.clone(),
            ua_hash: ua_hash.clone(),
            status: ClickStatus::Rejected,
            reject_reason: Some(reason),
            spend_delta: Money::ZERO,
            earnings_delta: Money::ZERO,
            profit_delta: Money::ZERO,
        };

        if !policy_accepted {
            let reason = policy_reject_reason.unwrap_or(RejectReason::InvalidAssignment);
            let event = base(reason);
            self.click_events.write().push(event.clone());
            return Ok(event);
        }

        let Some(mut campaign) = self.campaigns.get_mut(&assignment.campaign_id) else {
            let event = base(RejectReason::InvalidAssignment);
            self.click_events.write().push(event.clone());
            return Ok(event);
        };

        if campaign.status != campaign_core::types::CampaignStatus::Active
            || campaign.budget_remaining() < campaign.buyer_cpc
        {
            if campaign.status == campaign_core::types::CampaignStatus::Active {
                campaign.status = campaign_core::types::CampaignStatus::Paused;
            }
            drop(campaign);
            let event = base(RejectReason::BudgetExhausted);
            self.click_events.write().push(event.clone());
            return Ok(event);
        }

        let spend_delta = campaign.buyer_cpc;
        let earnings_delta = campaign.partner_payout;
        let profit_delta = spend_delta - earnings_delta;
        campaign.budget_spent += spend_delta;
        if campaign.budget_remaining() < campaign.buyer_cpc {
            campaign.status = campaign_core::types::CampaignStatus::Paused;
        }
        drop(campaign);

        let event = ClickEvent {
            assignment_code: assignment.code.clone(),
            partner_id: Some(assignment.partner_id),
            campaign_id: Some(assignment.campaign_id),
            ad_id: Some(assignment.ad_id),
            ts: now,
            ip_hash,
            ua_hash,
            status: ClickStatus::Accepted,
            reject_reason: None,
            spend_delta,
            earnings_delta,
            profit_delta,
        };
        self.click_events.write().push(event.clone());
        Ok(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use campaign_core::types::{CampaignStatus, Targeting};
    use chrono::Utc;

    fn campaign(id: CampaignId, buyer_cpc: f64, budget_total: f64, budget_spent: f64) -> Campaign {
        Campaign {
            id,
            buyer_id: 1,
            name: "c".into(),
            status: CampaignStatus::Active,
            budget_total: Money::from_dollars(budget_total),
            budget_spent: Money::from_dollars(budget_spent),
            buyer_cpc: Money::from_dollars(buyer_cpc),
            partner_payout: Money::from_dollars(buyer_cpc * 0.7),
            targeting: Targeting::default(),
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
        }
    }

    fn assignment() -> AdAssignment {
        AdAssignment {
            code: "code1".into(),
            partner_id: 1,
            campaign_id: 1,
            ad_id: 1,
            targeting: Targeting::default(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn accepted_click_debits_and_flips_to_paused_at_exhaustion() {
        let store = InMemoryStore::new();
        store.put_campaign(campaign(1, 2.50, 2.50, 0.0));
        let event = store
            .record_click_and_debit(&assignment(), true, None, "iphash".into(), Some("uahash".into()), Utc::now())
            .await
            .unwrap();
        assert_eq!(event.status, ClickStatus::Accepted);
        assert_eq!(event.spend_delta, Money::from_dollars(2.50));

        let c = store.campaign(1).await.unwrap().unwrap();
        assert_eq!(c.budget_spent, Money::from_dollars(2.50));
        assert_eq!(c.status, CampaignStatus::Paused);
    }

    #[tokio::test]
    async fn insufficient_budget_rejects_and_pauses_without_spending() {
        let store = InMemoryStore::new();
        store.put_campaign(campaign(1, 2.50, 1.0, 0.0));
        let event = store
            .record_click_and_debit(&assignment(), true, None, "iphash".into(), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(event.status, ClickStatus::Rejected);
        assert_eq!(event.reject_reason, Some(RejectReason::BudgetExhausted));
        assert_eq!(event.spend_delta, Money::ZERO);

        let c = store.campaign(1).await.unwrap().unwrap();
        assert_eq!(c.budget_spent, Money::ZERO);
        assert_eq!(c.status, CampaignStatus::Paused);
    }

    #[tokio::test]
    async fn missing_campaign_is_invalid_assignment() {
        let store = InMemoryStore::new();
        let event = store
            .record_click_and_debit(&assignment(), true, None, "iphash".into(), None, Utc::now())
            .await
            .unwrap();
        assert_eq!(event.reject_reason, Some(RejectReason::InvalidAssignment));
    }

    #[tokio::test]
    async fn duplicate_assignment_code_is_rejected() {
        let store = InMemoryStore::new();
        store.create_assignment(assignment()).await.unwrap();
        assert!(store.create_assignment(assignment()).await.is_err());
    }
}
