use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

pub type CampaignId = i64;
pub type AdId = i64;
pub type PartnerId = i64;

/// Lifecycle state of a [`Campaign`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    Active,
    Paused,
}

/// The four optional targeting dimensions a campaign or request can carry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Targeting {
    pub category: Option<String>,
    pub geo: Option<String>,
    pub device: Option<String>,
    pub placement: Option<String>,
}

impl Targeting {
    /// A campaign's targeting field matches a request field iff the
    /// campaign's field is null or equals the request's value.
    pub fn matches(&self, request: &Targeting) -> bool {
        Self::field_matches(&self.category, &request.category)
            && Self::field_matches(&self.geo, &request.geo)
            && Self::field_matches(&self.device, &request.device)
            && Self::field_matches(&self.placement, &request.placement)
    }

    fn field_matches(campaign_field: &Option<String>, request_field: &Option<String>) -> bool {
        match campaign_field {
            None => true,
            Some(v) => request_field.as_deref() == Some(v.as_str()),
        }
    }

    /// Count of matched (non-null, equal) targeting dimensions for the
    /// scoring engine's `targeting_bonus` — equality only, a null campaign
    /// field scores nothing even though it "matches" for eligibility.
    pub fn matched_dimensions(&self, request: &Targeting) -> u32 {
        let mut n = 0;
        if Self::dimension_scores(&self.category, &request.category) {
            n += 1;
        }
        if Self::dimension_scores(&self.geo, &request.geo) {
            n += 1;
        }
        if Self::dimension_scores(&self.device, &request.device) {
            n += 1;
        }
        if Self::dimension_scores(&self.placement, &request.placement) {
            n += 1;
        }
        n
    }

    fn dimension_scores(campaign_field: &Option<String>, request_field: &Option<String>) -> bool {
        matches!((campaign_field, request_field), (Some(c), Some(r)) if c == r)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub buyer_id: i64,
    pub name: String,
    pub status: CampaignStatus,
    pub budget_total: Money,
    pub budget_spent: Money,
    pub buyer_cpc: Money,
    pub partner_payout: Money,
    pub targeting: Targeting,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
}

impl Campaign {
    pub fn budget_remaining(&self) -> Money {
        self.budget_total - self.budget_spent
    }

    pub fn can_afford_one_click(&self) -> bool {
        self.budget_spent + self.buyer_cpc <= self.budget_total
    }

    pub fn within_date_window(&self, today: NaiveDate) -> bool {
        self.start_date.map_or(true, |d| d <= today) && self.end_date.map_or(true, |d| d >= today)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ad {
    pub id: AdId,
    pub campaign_id: CampaignId,
    pub active: bool,
    pub title: String,
    pub body: String,
    pub image_url: String,
    pub destination_url: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdAssignment {
    pub code: String,
    pub partner_id: PartnerId,
    pub campaign_id: CampaignId,
    pub ad_id: AdId,
    pub targeting: Targeting,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClickStatus {
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidAssignment,
    BotSuspected,
    DuplicateClick,
    RateLimit,
    BudgetExhausted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickEvent {
    pub assignment_code: String,
    pub partner_id: Option<PartnerId>,
    pub campaign_id: Option<CampaignId>,
    pub ad_id: Option<AdId>,
    pub ts: DateTime<Utc>,
    pub ip_hash: String,
    pub ua_hash: Option<String>,
    pub status: ClickStatus,
    pub reject_reason: Option<RejectReason>,
    pub spend_delta: Money,
    pub earnings_delta: Money,
    pub profit_delta: Money,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpressionStatus {
    Accepted,
    Deduped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ImpressionDedupReason {
    DuplicateWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpressionEvent {
    pub assignment_code: String,
    pub partner_id: PartnerId,
    pub campaign_id: CampaignId,
    pub ad_id: AdId,
    pub ts: DateTime<Utc>,
    pub ip_hash: String,
    pub status: ImpressionStatus,
    pub dedup_reason: Option<ImpressionDedupReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnfilledReason {
    NoEligibleAds,
    FreqCap,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerAdRequestEvent {
    pub created_at: DateTime<Utc>,
    pub partner_id: PartnerId,
    pub targeting: Targeting,
    pub filled: bool,
    pub ad_id: Option<AdId>,
    pub campaign_id: Option<CampaignId>,
    pub assignment_code: Option<String>,
    pub explanation: Option<String>,
    pub score_breakdown: Option<String>,
    pub unfilled_reason: Option<UnfilledReason>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartnerAdExposure {
    pub partner_id: PartnerId,
    pub ad_id: AdId,
    pub last_served_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn targeting(category: Option<&str>) -> Targeting {
        Targeting {
            category: category.map(String::from),
            ..Default::default()
        }
    }

    #[test]
    fn null_campaign_field_matches_anything() {
        let campaign = targeting(None);
        let request = targeting(Some("fitness"));
        assert!(campaign.matches(&request));
        assert_eq!(campaign.matched_dimensions(&request), 0);
    }

    #[test]
    fn equal_fields_match_and_score() {
        let campaign = targeting(Some("fitness"));
        let request = targeting(Some("fitness"));
        assert!(campaign.matches(&request));
        assert_eq!(campaign.matched_dimensions(&request), 1);
    }

    #[test]
    fn unequal_fields_do_not_match() {
        let campaign = targeting(Some("fitness"));
        let request = targeting(Some("finance"));
        assert!(!campaign.matches(&request));
    }

    #[test]
    fn budget_remaining_and_afford_check() {
        let campaign = Campaign {
            id: 1,
            buyer_id: 1,
            name: "c".into(),
            status: CampaignStatus::Active,
            budget_total: Money::from_dollars(100.0),
            budget_spent: Money::from_dollars(98.5),
            buyer_cpc: Money::from_dollars(2.50),
            partner_payout: Money::from_dollars(1.75),
            targeting: Targeting::default(),
            start_date: None,
            end_date: None,
            created_at: Utc::now(),
        };
        assert_eq!(campaign.budget_remaining(), Money::from_dollars(1.50));
        assert!(!campaign.can_afford_one_click());
    }
}
