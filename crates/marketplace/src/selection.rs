//! Selection orchestrator: enumerates eligible campaigns, applies the
//! frequency cap, scores each candidate, picks a winner and persists the
//! outcome.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::warn;

use campaign_core::config::AppConfig;
use campaign_core::error::MarketResult;
use campaign_core::store::TransactionalStore;
use campaign_core::types::{
    Ad, AdId, Campaign, CampaignId, PartnerAdRequestEvent, PartnerId, Targeting, UnfilledReason,
};
use campaign_scoring::ctr::ImpressionStats;
use campaign_scoring::engine::{self, ScoreInputs, ScoredCandidate};
use campaign_scoring::market_health::MarketHealthCache;
use campaign_scoring::{ctr, delivery, exploration, market_health, partner_quality};

#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub partner_id: PartnerId,
    pub targeting: Targeting,
}

#[derive(Debug, Clone)]
pub struct DebugCandidate {
    pub campaign_id: CampaignId,
    pub ad_id: AdId,
    pub score: f64,
    pub breakdown: engine::ScoreBreakdown,
}

#[derive(Debug, Clone)]
pub enum SelectionOutcome {
    Filled {
        assignment_code: String,
        campaign_id: CampaignId,
        ad: Ad,
        campaign: Campaign,
        explanation: String,
        score_breakdown: String,
    },
    Unfilled {
        reason: UnfilledReason,
    },
}

#[derive(Debug, Clone)]
pub struct SelectionResult {
    pub outcome: SelectionOutcome,
    pub debug_candidates: Option<Vec<DebugCandidate>>,
}

struct Candidate {
    campaign: Campaign,
    ad: Ad,
    scored: ScoredCandidate,
    prior_assignments: u64,
}

pub struct SelectionOrchestrator<S> {
    store: Arc<S>,
    market_health_cache: MarketHealthCache,
}

impl<S: TransactionalStore> SelectionOrchestrator<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            market_health_cache: MarketHealthCache::default(),
        }
    }

    /// Run selection end to end: eligibility, scoring, tie-break, assignment.
    pub async fn select(
        &self,
        config: &AppConfig,
        request: SelectionRequest,
        now: DateTime<Utc>,
    ) -> MarketResult<SelectionResult> {
        let today = now.date_naive();
        let active = self.store.active_campaigns().await?;

        let partner_reject_rate = {
            let since = now - Duration::days(config.scoring.reject_lookback_days);
            let stats = self
                .store
                .partner_click_stats_since(request.partner_id, since)
                .await?;
            let total = stats.accepted + stats.rejected;
            if total == 0 {
                0.0
            } else {
                stats.rejected as f64 / total as f64
            }
        };

        let quality = {
            let recent_since = now - Duration::days(config.partner_quality.recent_days);
            let long_since = now - Duration::days(config.partner_quality.long_days);
            let recent = self
                .store
                .partner_click_stats_since(request.partner_id, recent_since)
                .await?;
            let long = self
                .store
                .partner_click_stats_since(request.partner_id, long_since)
                .await?;
            partner_quality::classify(&config.partner_quality, recent, long)
        };

        let mut eligible: Vec<(Campaign, Ad)> = Vec::new();
        for campaign in &active {
            if !campaign.can_afford_one_click() {
                continue;
            }
            if !campaign.within_date_window(today) {
                continue;
            }
            if !campaign.targeting.matches(&request.targeting) {
                continue;
            }
            let mut ads = self.store.active_ads_for_campaign(campaign.id).await?;
            ads.sort_by_key(|a| a.id);
            if let Some(ad) = ads.into_iter().next() {
                eligible.push((campaign.clone(), ad));
            }
        }

        let total_eligible_ads = eligible.len() as u64;
        let market_snapshot = match self.market_health_cache.get(now) {
            Some(cached) => cached,
            None => {
                let window = Duration::minutes(config.market_health.window_minutes);
                let current_requests = self
                    .store
                    .request_events_in_range(now - window, now)
                    .await?;
                let current_clicks = self
                    .store
                    .click_stats_in_range(now - window, now)
                    .await?;
                let previous_clicks = self
                    .store
                    .click_stats_in_range(now - window * 2, now - window)
                    .await?;
                let recent_events = self
                    .store
                    .recent_request_events(config.market_health.streak_sample)
                    .await?;
                let snapshot = market_health::build_snapshot(
                    &config.market_health,
                    &current_requests,
                    total_eligible_ads,
                    current_clicks,
                    previous_clicks,
                    &recent_events,
                );
                self.market_health_cache.publish(now, snapshot);
                snapshot
            }
        };
        let multipliers = market_health::derive_multipliers(&config.market_health, market_snapshot);

        let mut candidates = Vec::new();
        let mut cap_blocked = false;

        for (campaign, ad) in eligible {
            if let Some(exposure) = self.store.exposure(request.partner_id, ad.id).await? {
                let cap_until = exposure.last_served_at + Duration::seconds(config.click.freq_cap_secs);
                if cap_until > now {
                    cap_blocked = true;
                    continue;
                }
            }

            let ctr_since = now - Duration::days(config.scoring.ctr_lookback_days);
            let (pa_imps, pa_clicks) = self
                .store
                .impression_stats_partner_ad(request.partner_id, ad.id, ctr_since)
                .await?;
            let (pc_imps, pc_clicks) = self
                .store
                .impression_stats_partner_campaign(request.partner_id, campaign.id, ctr_since)
                .await?;
            let (gc_imps, gc_clicks) = self
                .store
                .impression_stats_campaign(campaign.id, ctr_since)
                .await?;
            let ctr_value = ctr::estimate(
                ImpressionStats {
                    impressions: pa_imps,
                    clicks: pa_clicks,
                },
                ImpressionStats {
                    impressions: pc_imps,
                    clicks: pc_clicks,
                },
                ImpressionStats {
                    impressions: gc_imps,
                    clicks: gc_clicks,
                },
            );

            let explore_since = now - Duration::days(config.exploration.lookback_days);
            let partner_request_count = self
                .store
                .partner_request_count_since(request.partner_id, explore_since)
                .await?;
            let ad_serves_to_partner = self
                .store
                .ad_serve_count_since(request.partner_id, ad.id, explore_since)
                .await?;
            let exploration_decision = exploration::evaluate(
                &config.exploration,
                request.partner_id,
                ad.id,
                partner_request_count,
                ad_serves_to_partner,
            );

            let delivery_since = now - Duration::days(config.delivery.lookback_days);
            let (filled_requests, accepted_clicks) = self
                .store
                .campaign_request_stats_since(campaign.id, delivery_since)
                .await?;
            let budget_remaining_ratio = if campaign.budget_total.as_dollars() == 0.0 {
                0.0
            } else {
                campaign.budget_remaining().as_dollars() / campaign.budget_total.as_dollars()
            };
            let delivery_boost = delivery::evaluate(
                &config.delivery,
                budget_remaining_ratio,
                filled_requests,
                accepted_clicks,
            );

            let profit = (campaign.buyer_cpc - campaign.partner_payout).as_dollars();
            let matched_dimensions = campaign.targeting.matched_dimensions(&request.targeting);

            let scored = engine::score(
                &config.scoring,
                ScoreInputs {
                    campaign_id: campaign.id,
                    ad_id: ad.id,
                    profit,
                    ctr: ctr_value,
                    matched_dimensions,
                    partner_reject_rate,
                    multipliers: &multipliers,
                    partner_quality: &quality,
                    exploration: &exploration_decision,
                    delivery: &delivery_boost,
                },
            );

            let prior_assignments = self
                .store
                .ad_serve_count_since(request.partner_id, ad.id, DateTime::<Utc>::MIN_UTC)
                .await?;

            candidates.push(Candidate {
                campaign,
                ad,
                scored,
                prior_assignments,
            });
        }

        candidates.sort_by(|a, b| {
            b.scored
                .score
                .partial_cmp(&a.scored.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.prior_assignments.cmp(&b.prior_assignments))
                .then(a.campaign.id.cmp(&b.campaign.id))
                .then(a.ad.id.cmp(&b.ad.id))
        });

        let debug_candidates = if config.scoring.debug {
            Some(
                candidates
                    .iter()
                    .map(|c| DebugCandidate {
                        campaign_id: c.campaign.id,
                        ad_id: c.ad.id,
                        score: c.scored.score,
                        breakdown: c.scored.breakdown.clone(),
                    })
                    .collect(),
            )
        } else {
            None
        };

        let Some(winner) = candidates.into_iter().next() else {
            let reason = if cap_blocked {
                UnfilledReason::FreqCap
            } else {
                UnfilledReason::NoEligibleAds
            };
            self.store
                .record_request_event(PartnerAdRequestEvent {
                    created_at: now,
                    partner_id: request.partner_id,
                    targeting: request.targeting,
                    filled: false,
                    ad_id: None,
                    campaign_id: None,
                    assignment_code: None,
                    explanation: None,
                    score_breakdown: None,
                    unfilled_reason: Some(reason),
                })
                .await?;
            return Ok(SelectionResult {
                outcome: SelectionOutcome::Unfilled { reason },
                debug_candidates,
            });
        };

        let score_breakdown = serde_json::to_string(&winner.scored.breakdown)
            .unwrap_or_else(|_| "{}".to_string());

        let code = self.issue_assignment(&winner, &request, now).await?;

        self.store
            .upsert_exposure(request.partner_id, winner.ad.id, now)
            .await?;

        self.store
            .record_request_event(PartnerAdRequestEvent {
                created_at: now,
                partner_id: request.partner_id,
                targeting: request.targeting,
                filled: true,
                ad_id: Some(winner.ad.id),
                campaign_id: Some(winner.campaign.id),
                assignment_code: Some(code.clone()),
                explanation: Some(winner.scored.explanation.clone()),
                score_breakdown: Some(score_breakdown.clone()),
                unfilled_reason: None,
            })
            .await?;

        Ok(SelectionResult {
            outcome: SelectionOutcome::Filled {
                assignment_code: code,
                campaign_id: winner.campaign.id,
                ad: winner.ad,
                campaign: winner.campaign,
                explanation: winner.scored.explanation,
                score_breakdown,
            },
            debug_candidates,
        })
    }

    /// Generate a fresh URL-safe assignment code and retry on the rare
    /// unique-violation collision.
    async fn issue_assignment(
        &self,
        winner: &Candidate,
        request: &SelectionRequest,
        now: DateTime<Utc>,
    ) -> MarketResult<String> {
        for _ in 0..5 {
            let code = generate_code();
            let assignment = campaign_core::types::AdAssignment {
                code: code.clone(),
                partner_id: request.partner_id,
                campaign_id: winner.campaign.id,
                ad_id: winner.ad.id,
                targeting: request.targeting.clone(),
                created_at: now,
            };
            match self.store.create_assignment(assignment).await {
                Ok(()) => return Ok(code),
                Err(e) => warn!(error = %e, "assignment code collision, retrying"),
            }
        }
        Err(campaign_core::error::MarketError::Infrastructure(anyhow::anyhow!(
            "exhausted retries generating a unique assignment code"
        )))
    }
}

/// 9 random bytes (72 bits, comfortably above the 48-bit floor) encoded as
/// URL-safe base64 without padding.
fn generate_code() -> String {
    use base64::Engine;
    let mut bytes = [0u8; 9];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Wrap a selection call with the configured deadline; on expiry, degrade to
/// `NO_ELIGIBLE_ADS` rather than propagating a timeout error.
pub async fn select_with_deadline<S: TransactionalStore>(
    orchestrator: &SelectionOrchestrator<S>,
    config: &AppConfig,
    request: SelectionRequest,
    now: DateTime<Utc>,
) -> MarketResult<SelectionResult> {
    let deadline = std::time::Duration::from_millis(config.api.selection_deadline_ms);
    match tokio::time::timeout(deadline, orchestrator.select(config, request, now)).await {
        Ok(result) => result,
        Err(_) => Ok(SelectionResult {
            outcome: SelectionOutcome::Unfilled {
                reason: UnfilledReason::NoEligibleAds,
            },
            debug_candidates: None,
        }),
    }
}
