//! Delivery balancer: boost campaigns that are under-delivering
//! relative to their traffic but still have budget to spend.

use campaign_core::config::DeliveryConfig;

#[derive(Debug, Clone, Copy)]
pub struct DeliveryBoost {
    pub applied: bool,
    pub boost: f64,
}

/// Decide whether a campaign qualifies for the delivery boost.
///
/// `budget_remaining_ratio` = budget_remaining / budget_total.
/// `filled_requests` / `accepted_clicks` are counted over
/// `config.lookback_days`.
pub fn evaluate(
    config: &DeliveryConfig,
    budget_remaining_ratio: f64,
    filled_requests: u64,
    accepted_clicks: u64,
) -> DeliveryBoost {
    if budget_remaining_ratio < config.min_budget_remaining_ratio {
        return DeliveryBoost {
            applied: false,
            boost: 0.0,
        };
    }
    if filled_requests < config.min_requests {
        return DeliveryBoost {
            applied: false,
            boost: 0.0,
        };
    }
    let click_rate = accepted_clicks as f64 / filled_requests as f64;
    if click_rate < config.low_click_rate {
        DeliveryBoost {
            applied: true,
            boost: config.boost_value,
        }
    } else {
        DeliveryBoost {
            applied: false,
            boost: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeliveryConfig {
        DeliveryConfig {
            lookback_days: 7,
            min_requests: 2,
            low_click_rate: 0.5,
            min_budget_remaining_ratio: 0.5,
            boost_value: 0.4,
        }
    }

    #[test]
    fn low_click_rate_with_enough_volume_boosts() {
        let decision = evaluate(&config(), 0.9, 2, 0);
        assert!(decision.applied);
        assert_eq!(decision.boost, 0.4);
    }

    #[test]
    fn insufficient_volume_does_not_boost() {
        let decision = evaluate(&config(), 0.9, 1, 0);
        assert!(!decision.applied);
    }

    #[test]
    fn low_remaining_budget_does_not_boost() {
        let decision = evaluate(&config(), 0.1, 10, 0);
        assert!(!decision.applied);
    }

    #[test]
    fn healthy_click_rate_does_not_boost() {
        let decision = evaluate(&config(), 0.9, 10, 9);
        assert!(!decision.applied);
    }
}
