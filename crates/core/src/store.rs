//! Store abstraction: the boundary between the scoring/selection pipeline
//! and whatever actually holds campaign/ad/event state. The in-memory
//! reference implementation lives in `campaign-marketplace::store`; a real
//! deployment swaps it for a transactional SQL store without touching the
//! scoring, selection, click-validation, or accounting call sites.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::MarketResult;
use crate::types::{
    Ad, AdAssignment, AdId, Campaign, CampaignId, ClickEvent, ImpressionEvent,
    PartnerAdExposure, PartnerAdRequestEvent, PartnerId, RejectReason,
};

/// Aggregate counts the scoring engine needs per (partner, ad) pair,
/// computed over the configured lookback windows.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickStats {
    pub accepted: u64,
    pub rejected: u64,
}

/// Read-only queries against marketplace state. Implemented by both the
/// in-memory reference store and (eventually) a real database-backed one.
#[async_trait]
pub trait ReadModel: Send + Sync {
    async fn active_campaigns(&self) -> MarketResult<Vec<Campaign>>;
    async fn campaign(&self, id: CampaignId) -> MarketResult<Option<Campaign>>;
    async fn active_ads_for_campaign(&self, campaign_id: CampaignId) -> MarketResult<Vec<Ad>>;

    /// Look up an ad regardless of its active flag — used to resolve a
    /// click's redirect destination even if the ad was deactivated after
    /// the assignment was issued.
    async fn ad(&self, id: AdId) -> MarketResult<Option<Ad>>;

    async fn exposure(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
    ) -> MarketResult<Option<PartnerAdExposure>>;

    async fn assignment(&self, code: &str) -> MarketResult<Option<AdAssignment>>;

    async fn recent_clicks_for_assignment(
        &self,
        assignment_code: &str,
        since: DateTime<Utc>,
    ) -> MarketResult<Vec<ClickEvent>>;

    async fn recent_impressions_for_assignment(
        &self,
        assignment_code: &str,
        since: DateTime<Utc>,
    ) -> MarketResult<Vec<ImpressionEvent>>;

    /// Partner-scoped accepted/rejected click counts since `since` — feeds
    /// both the partner-quality classifier's recent/long windows and the
    /// scoring engine's global `partner_reject_rate`.
    async fn partner_click_stats_since(
        &self,
        partner_id: PartnerId,
        since: DateTime<Utc>,
    ) -> MarketResult<ClickStats>;

    /// How many times this (partner, ad) pair has been served since `since` —
    /// the exploration gate's serve cap and new-ad check.
    async fn ad_serve_count_since(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        since: DateTime<Utc>,
    ) -> MarketResult<u64>;

    /// How many ad requests this partner has made since `since` — the
    /// exploration gate's new-partner check.
    async fn partner_request_count_since(
        &self,
        partner_id: PartnerId,
        since: DateTime<Utc>,
    ) -> MarketResult<u64>;

    /// `(filled_requests, accepted_clicks)` for this campaign since `since` —
    /// the delivery balancer's click rate.
    async fn campaign_request_stats_since(
        &self,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)>;

    /// `(impressions, clicks)` at the (partner, ad) tier — the CTR estimate's
    /// first fallback tier.
    async fn impression_stats_partner_ad(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)>;

    /// `(impressions, clicks)` at the (partner, campaign) tier.
    async fn impression_stats_partner_campaign(
        &self,
        partner_id: PartnerId,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)>;

    /// `(impressions, clicks)` at the global-campaign tier.
    async fn impression_stats_campaign(
        &self,
        campaign_id: CampaignId,
        since: DateTime<Utc>,
    ) -> MarketResult<(u64, u64)>;

    /// Request events whose `created_at` falls in `[start, end)`, for the
    /// market-health sampler's fill-rate and eligible-supply computation.
    async fn request_events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MarketResult<Vec<PartnerAdRequestEvent>>;

    /// The most recent `limit` request events across all partners, newest
    /// last, for the market-health sampler's trailing unfilled-streak count.
    async fn recent_request_events(&self, limit: usize) -> MarketResult<Vec<PartnerAdRequestEvent>>;

    /// Accepted/rejected click counts across all partners whose `ts` falls
    /// in `[start, end)` — the market-health sampler's reject-rate and
    /// reject-volatility signal. Independent of `request_events_in_range`:
    /// a click reject rate is a property of click decisions, not of how
    /// often requests go unfilled.
    async fn click_stats_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> MarketResult<ClickStats>;
}

/// The write/transactional half of the store: assignment creation, event
/// recording, and the row-locked budget debit.
#[async_trait]
pub trait TransactionalStore: ReadModel {
    /// Insert a brand-new assignment. Implementations must fail with
    /// [`crate::error::MarketError::Config`] on a `code` collision so the
    /// caller can retry with a freshly generated code.
    async fn create_assignment(&self, assignment: AdAssignment) -> MarketResult<()>;

    async fn upsert_exposure(
        &self,
        partner_id: PartnerId,
        ad_id: AdId,
        served_at: DateTime<Utc>,
    ) -> MarketResult<()>;

    async fn record_request_event(&self, event: PartnerAdRequestEvent) -> MarketResult<()>;

    async fn record_impression(&self, event: ImpressionEvent) -> MarketResult<()>;

    /// Append a click event whose status/deltas are already final — used
    /// for the `INVALID_ASSIGNMENT` path, where there is no campaign to
    /// lock.
    async fn record_click(&self, event: ClickEvent) -> MarketResult<()>;

    /// Record a click against a resolved assignment and, if the click
    /// validator passed it as
    /// policy-accepted, atomically debit the campaign's budget and
    /// auto-pause it on exhaustion. Holds the row lock for the click's
    /// campaign for the duration of the debit; returns the event as finally
    /// persisted (the store may downgrade an accepted click to
    /// `BUDGET_EXHAUSTED` after reading the campaign's live budget).
    async fn record_click_and_debit(
        &self,
        assignment: &AdAssignment,
        policy_accepted: bool,
        policy_reject_reason: Option<RejectReason>,
        ip_hash: String,
        ua_hash: Option<String>,
        now: DateTime<Utc>,
    ) -> MarketResult<ClickEvent>;
}
