//! Scoring engine: combines every signal into one score per candidate,
//! plus a serializable breakdown and a human-readable explanation.

use campaign_core::config::ScoringConfig;
use campaign_core::types::{AdId, CampaignId};
use serde::Serialize;

use crate::delivery::DeliveryBoost;
use crate::exploration::ExplorationDecision;
use crate::market_health::AdaptiveMultipliers;
use crate::partner_quality::PartnerQuality;

/// Everything the engine needs about one (campaign, ad) candidate, already
/// computed upstream. Kept as plain fields rather than trait objects so the
/// engine stays pure and unit-testable without a store.
pub struct ScoreInputs<'a> {
    pub campaign_id: CampaignId,
    pub ad_id: AdId,
    pub profit: f64,
    pub ctr: f64,
    pub matched_dimensions: u32,
    pub partner_reject_rate: f64,
    pub multipliers: &'a AdaptiveMultipliers,
    pub partner_quality: &'a PartnerQuality,
    pub exploration: &'a ExplorationDecision,
    pub delivery: &'a DeliveryBoost,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreBreakdown {
    pub profit: f64,
    pub profit_component: f64,
    pub ctr: f64,
    pub ctr_component: f64,
    pub targeting_bonus: f64,
    pub targeting_component: f64,
    pub partner_reject_rate: f64,
    pub partner_reject_penalty: f64,
    pub exploration_bonus: f64,
    pub delivery_boost: f64,
    pub alpha_profit: f64,
    pub beta_ctr: f64,
    pub gamma_targeting: f64,
    pub delta_market: f64,
    pub delta_partner: f64,
}

#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub campaign_id: CampaignId,
    pub ad_id: AdId,
    pub score: f64,
    pub breakdown: ScoreBreakdown,
    pub explanation: String,
}

/// Score one candidate:
///
/// ```text
/// score = profit·α_profit
///       + (ctr · ctr_weight) · β_ctr
///       + targeting_bonus · γ_targeting
///       − (partner_reject_rate · reject_penalty_weight) · (δ_market · δ_partner)
///       + exploration_bonus
///       + delivery_boost
/// ```
pub fn score(config: &ScoringConfig, inputs: ScoreInputs<'_>) -> ScoredCandidate {
    let m = inputs.multipliers;
    let q = inputs.partner_quality;

    let profit_component = round4(inputs.profit * m.alpha_profit);
    let ctr_component = round4(inputs.ctr * config.ctr_weight * m.beta_ctr);
    let targeting_bonus = inputs.matched_dimensions as f64 * config.targeting_bonus_value;
    let targeting_component = round4(targeting_bonus * m.gamma_targeting);
    let partner_reject_penalty = round4(
        inputs.partner_reject_rate * config.reject_penalty_weight * m.delta_market * q.delta_partner,
    );
    let exploration_bonus = if inputs.exploration.applied {
        inputs.exploration.bonus
    } else {
        0.0
    };
    let delivery_boost = if inputs.delivery.applied {
        inputs.delivery.boost
    } else {
        0.0
    };

    let total = profit_component + ctr_component + targeting_component - partner_reject_penalty
        + exploration_bonus
        + delivery_boost;

    let breakdown = ScoreBreakdown {
        profit: round4(inputs.profit),
        profit_component,
        ctr: round4(inputs.ctr),
        ctr_component,
        targeting_bonus: round4(targeting_bonus),
        targeting_component,
        partner_reject_rate: round4(inputs.partner_reject_rate),
        partner_reject_penalty,
        exploration_bonus: round4(exploration_bonus),
        delivery_boost: round4(delivery_boost),
        alpha_profit: m.alpha_profit,
        beta_ctr: m.beta_ctr,
        gamma_targeting: m.gamma_targeting,
        delta_market: m.delta_market,
        delta_partner: q.delta_partner,
    };

    let explanation = explain(&breakdown, m, q, inputs.exploration, inputs.delivery);

    ScoredCandidate {
        campaign_id: inputs.campaign_id,
        ad_id: inputs.ad_id,
        score: round4(total),
        breakdown,
        explanation,
    }
}

fn explain(
    breakdown: &ScoreBreakdown,
    multipliers: &AdaptiveMultipliers,
    quality: &PartnerQuality,
    exploration: &ExplorationDecision,
    delivery: &DeliveryBoost,
) -> String {
    let mut parts = vec![format!(
        "profit {:.4} (x{:.2}) + ctr {:.4} (x{:.2}) + targeting {:.4} (x{:.2}) - reject_penalty {:.4}",
        breakdown.profit,
        breakdown.alpha_profit,
        breakdown.ctr,
        breakdown.beta_ctr,
        breakdown.targeting_bonus,
        breakdown.gamma_targeting,
        breakdown.partner_reject_penalty,
    )];
    parts.push(multipliers.market_note.clone());
    parts.push(format!("Partner quality: {:?}. {}", quality.state, quality.note));
    if let Some(reason) = exploration.reason {
        if exploration.applied {
            parts.push(format!("Exploration bonus applied ({reason:?})."));
        }
    }
    if delivery.applied {
        parts.push("Delivery boost applied for under-delivering campaign.".to_string());
    }
    parts.join(" ")
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryBoost;
    use crate::exploration::ExplorationDecision;
    use crate::market_health::AdaptiveMultipliers;
    use crate::partner_quality::{PartnerQuality, PartnerQualityState};

    fn scoring_config() -> ScoringConfig {
        ScoringConfig {
            ctr_lookback_days: 14,
            reject_lookback_days: 7,
            ctr_weight: 1.0,
            targeting_bonus_value: 1.0,
            reject_penalty_weight: 1.0,
            debug: false,
        }
    }

    #[test]
    fn matches_the_adaptive_boost_scenario() {
        let multipliers = AdaptiveMultipliers {
            alpha_profit: 1.5,
            beta_ctr: 1.0,
            gamma_targeting: 1.3,
            delta_market: 1.0,
            market_note: "Fill rate is low.".to_string(),
        };
        let quality = PartnerQuality {
            state: PartnerQualityState::Stable,
            note: "steady".to_string(),
            delta_partner: 1.0,
        };
        let exploration = ExplorationDecision {
            applied: false,
            bonus: 0.0,
            reason: None,
        };
        let delivery = DeliveryBoost {
            applied: false,
            boost: 0.0,
        };
        let result = score(
            &scoring_config(),
            ScoreInputs {
                campaign_id: 1,
                ad_id: 1,
                profit: 0.60,
                ctr: 0.01,
                matched_dimensions: 1,
                partner_reject_rate: 0.0,
                multipliers: &multipliers,
                partner_quality: &quality,
                exploration: &exploration,
                delivery: &delivery,
            },
        );
        assert_eq!(result.score, 2.21);
    }

    #[test]
    fn reject_penalty_is_identical_across_candidates_with_same_partner_rate() {
        let multipliers = AdaptiveMultipliers {
            alpha_profit: 1.0,
            beta_ctr: 1.0,
            gamma_targeting: 1.0,
            delta_market: 1.0,
            market_note: "Market stable.".to_string(),
        };
        let quality = PartnerQuality {
            state: PartnerQualityState::Stable,
            note: String::new(),
            delta_partner: 1.0,
        };
        let exploration = ExplorationDecision {
            applied: false,
            bonus: 0.0,
            reason: None,
        };
        let delivery = DeliveryBoost {
            applied: false,
            boost: 0.0,
        };
        let a = score(
            &scoring_config(),
            ScoreInputs {
                campaign_id: 1,
                ad_id: 1,
                profit: 1.0,
                ctr: 0.02,
                matched_dimensions: 0,
                partner_reject_rate: 1.0,
                multipliers: &multipliers,
                partner_quality: &quality,
                exploration: &exploration,
                delivery: &delivery,
            },
        );
        let b = score(
            &scoring_config(),
            ScoreInputs {
                campaign_id: 2,
                ad_id: 2,
                profit: 0.5,
                ctr: 0.02,
                matched_dimensions: 0,
                partner_reject_rate: 1.0,
                multipliers: &multipliers,
                partner_quality: &quality,
                exploration: &exploration,
                delivery: &delivery,
            },
        );
        assert_eq!(a.breakdown.partner_reject_penalty, b.breakdown.partner_reject_penalty);
        assert_eq!(a.breakdown.partner_reject_penalty, 1.0);
    }
}
