//! Deterministic ε-exploration for new partners / new ads, with a
//! per-ad serve cap.

use campaign_core::config::ExplorationConfig;
use campaign_core::types::{AdId, PartnerId};
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExplorationReason {
    NewPartner,
    NewAd,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplorationDecision {
    pub applied: bool,
    pub bonus: f64,
    pub reason: Option<ExplorationReason>,
}

/// Deterministic bucket in `[0, 1]` for a (partner, ad) pair: the first
/// 4 bytes of `SHA-256("{partner_id}:{ad_id}")` as a big-endian `u32`,
/// divided by `u32::MAX`. Stable across runs so exploration decisions
/// (and their tests) are reproducible.
pub fn bucket(partner_id: PartnerId, ad_id: AdId) -> f64 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{partner_id}:{ad_id}").as_bytes());
    let digest = hasher.finalize();
    let n = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    n as f64 / u32::MAX as f64
}

/// Decide whether to apply the exploration bonus to a candidate.
///
/// The serve cap is checked *before* the epsilon draw: once
/// `ad_serves_to_partner >= max_ad_serves`, no further exploration is
/// possible for that (partner, ad) pair even if `epsilon == 1.0`. Do not
/// reorder these checks — it changes which requests get explored.
pub fn evaluate(
    config: &ExplorationConfig,
    partner_id: PartnerId,
    ad_id: AdId,
    partner_request_count: u64,
    ad_serves_to_partner: u64,
) -> ExplorationDecision {
    if ad_serves_to_partner >= config.max_ad_serves {
        return ExplorationDecision {
            applied: false,
            bonus: 0.0,
            reason: None,
        };
    }

    let is_new_partner = partner_request_count < config.new_partner_requests;
    let is_new_ad = ad_serves_to_partner < config.new_ad_serves;

    if !is_new_partner && !is_new_ad {
        return ExplorationDecision {
            applied: false,
            bonus: 0.0,
            reason: None,
        };
    }

    if bucket(partner_id, ad_id) > config.epsilon {
        return ExplorationDecision {
            applied: false,
            bonus: 0.0,
            reason: None,
        };
    }

    let reason = if is_new_partner {
        ExplorationReason::NewPartner
    } else {
        ExplorationReason::NewAd
    };

    ExplorationDecision {
        applied: true,
        bonus: config.bonus,
        reason: Some(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ExplorationConfig {
        ExplorationConfig {
            epsilon: 1.0,
            bonus: 0.2,
            new_partner_requests: 5,
            new_ad_serves: 1,
            max_ad_serves: 1,
            lookback_days: 7,
        }
    }

    #[test]
    fn bucket_is_deterministic() {
        assert_eq!(bucket(42, 7), bucket(42, 7));
        assert_ne!(bucket(42, 7), bucket(42, 8));
    }

    #[test]
    fn first_serve_explores_then_cap_blocks_second() {
        let cfg = config();
        let first = evaluate(&cfg, 1, 1, 0, 0);
        assert!(first.applied);

        let second = evaluate(&cfg, 1, 1, 0, 1);
        assert!(!second.applied);
    }

    #[test]
    fn epsilon_zero_never_explores() {
        let cfg = ExplorationConfig {
            epsilon: 0.0,
            ..config()
        };
        let decision = evaluate(&cfg, 1, 1, 0, 0);
        assert!(!decision.applied);
    }
}
