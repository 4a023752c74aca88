//! Market-health sampler: aggregates recent fill/reject behavior into
//! a snapshot, then derives the four scoring multipliers from it.

use campaign_core::config::MarketHealthConfig;
use campaign_core::store::ClickStats;
use campaign_core::types::PartnerAdRequestEvent;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct MarketHealthSnapshot {
    pub fill_rate: f64,
    pub reject_rate: f64,
    pub prev_reject_rate: f64,
    pub reject_volatility: f64,
    pub eligible_ads_per_request: f64,
    pub unfilled_streak: u32,
}

/// Build a snapshot from the request events of the current window, the
/// click decisions of the current and preceding windows, the eligible-ad
/// count observed for the current window, and the global trailing request
/// history (for the unfilled streak).
///
/// `current_window` is already filtered to its time range by the caller
/// (the store query does the windowing; this function is pure aggregation
/// so it stays unit-testable). `current_clicks`/`previous_clicks` are click
/// decision counts over the same two windows — a reject rate is a property
/// of click outcomes, not of how often requests go unfilled, so it is kept
/// independent of `current_window`. `recent_events` is the last
/// `config.streak_sample` request events across all partners regardless of
/// window, newest last.
pub fn build_snapshot(
    config: &MarketHealthConfig,
    current_window: &[PartnerAdRequestEvent],
    total_eligible_ads: u64,
    current_clicks: ClickStats,
    previous_clicks: ClickStats,
    recent_events: &[PartnerAdRequestEvent],
) -> MarketHealthSnapshot {
    let total = current_window.len() as f64;
    let filled = current_window.iter().filter(|e| e.filled).count() as f64;
    let fill_rate = if total == 0.0 { 0.0 } else { filled / total };

    let reject_rate = click_reject_rate(current_clicks);
    let prev_reject_rate = click_reject_rate(previous_clicks);
    let reject_volatility = (reject_rate - prev_reject_rate).abs();

    let eligible_ads_per_request = if total == 0.0 {
        total_eligible_ads as f64
    } else {
        total_eligible_ads as f64 / total
    };

    let unfilled_streak = recent_events
        .iter()
        .rev()
        .take(config.streak_sample)
        .take_while(|e| !e.filled)
        .count() as u32;

    MarketHealthSnapshot {
        fill_rate: round4(fill_rate),
        reject_rate: round4(reject_rate),
        prev_reject_rate: round4(prev_reject_rate),
        reject_volatility: round4(reject_volatility),
        eligible_ads_per_request: round4(eligible_ads_per_request),
        unfilled_streak,
    }
}

/// Fraction of click decisions rejected, over a window of `ClickEvent`s.
fn click_reject_rate(stats: ClickStats) -> f64 {
    let total = (stats.accepted + stats.rejected) as f64;
    if total == 0.0 {
        0.0
    } else {
        stats.rejected as f64 / total
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdaptiveMultipliers {
    pub alpha_profit: f64,
    pub beta_ctr: f64,
    pub gamma_targeting: f64,
    pub delta_market: f64,
    pub market_note: String,
}

/// Derive the four additive multipliers from a market-health snapshot.
pub fn derive_multipliers(
    config: &MarketHealthConfig,
    snapshot: MarketHealthSnapshot,
) -> AdaptiveMultipliers {
    let mut alpha_profit = 1.0;
    let mut beta_ctr = 1.0;
    let mut gamma_targeting = 1.0;
    let mut delta_market = 1.0;
    let mut notes = Vec::new();

    if snapshot.fill_rate < config.fill_low {
        alpha_profit += config.alpha_profit_boost_low_fill;
        gamma_targeting += config.gamma_targeting_boost_low_fill;
        delta_market += config.delta_market_boost_low_fill;
        notes.push("Fill rate is low; favoring profitable and well-targeted candidates.");
    }

    if snapshot.fill_rate > config.fill_high && snapshot.reject_rate < config.reject_healthy {
        beta_ctr += config.beta_ctr_boost_healthy;
        notes.push("Market is healthy; leaning further into predicted CTR.");
    }

    if snapshot.eligible_ads_per_request < config.eligible_supply_low {
        alpha_profit += config.alpha_profit_boost_low_supply;
        notes.push("Eligible supply is thin; favoring profit.");
    }

    if snapshot.unfilled_streak >= config.unfilled_streak_threshold {
        gamma_targeting += config.gamma_targeting_boost_unfilled;
        notes.push("Recent requests are going unfilled; relaxing toward targeting fit.");
    }

    if snapshot.reject_volatility > config.reject_volatility_threshold {
        delta_market += config.delta_market_boost_volatility;
        notes.push("Reject rate is volatile; intensifying the reject penalty.");
    }

    let market_note = if notes.is_empty() {
        "Market stable.".to_string()
    } else {
        notes.join(" ")
    };

    AdaptiveMultipliers {
        alpha_profit: round4(alpha_profit),
        beta_ctr: round4(beta_ctr),
        gamma_targeting: round4(gamma_targeting),
        delta_market: round4(delta_market),
        market_note,
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

/// Publishes the market-health snapshot read-mostly, refreshing it at most
/// once per `ttl`. Spec.md §9 calls this out as "the obvious target for a
/// periodic refresh with atomic publication"; this is the sub-second-TTL
/// version it explicitly permits, reset-on-elapsed the way
/// `MessageThrottler` resets its per-second/per-minute counters.
pub struct MarketHealthCache {
    ttl: chrono::Duration,
    published: RwLock<Option<(DateTime<Utc>, MarketHealthSnapshot)>>,
}

impl MarketHealthCache {
    pub fn new(ttl: chrono::Duration) -> Self {
        Self {
            ttl,
            published: RwLock::new(None),
        }
    }

    /// Return the cached snapshot if still fresh as of `now`; otherwise
    /// `None`, signaling the caller must recompute and call [`Self::publish`].
    pub fn get(&self, now: DateTime<Utc>) -> Option<MarketHealthSnapshot> {
        let guard = self.published.read();
        match &*guard {
            Some((stamped_at, snapshot)) if now - *stamped_at < self.ttl => Some(*snapshot),
            _ => None,
        }
    }

    pub fn publish(&self, now: DateTime<Utc>, snapshot: MarketHealthSnapshot) {
        *self.published.write() = Some((now, snapshot));
    }
}

impl Default for MarketHealthCache {
    fn default() -> Self {
        Self::new(chrono::Duration::milliseconds(500))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MarketHealthConfig {
        MarketHealthConfig {
            window_minutes: 60,
            streak_sample: 10,
            fill_low: 1.0, // forces fill_rate < fill_low unconditionally
            fill_high: 0.8,
            eligible_supply_low: 0.5,
            reject_volatility_threshold: 0.1,
            unfilled_streak_threshold: 3,
            reject_healthy: 0.05,
            alpha_profit_boost_low_fill: 0.5,
            alpha_profit_boost_low_supply: 0.1,
            beta_ctr_boost_healthy: 0.1,
            gamma_targeting_boost_low_fill: 0.3,
            gamma_targeting_boost_unfilled: 0.1,
            delta_market_boost_low_fill: 0.2,
            delta_market_boost_volatility: 0.1,
        }
    }

    #[test]
    fn low_fill_rate_boosts_profit_and_targeting() {
        let snapshot = MarketHealthSnapshot {
            fill_rate: 0.5,
            reject_rate: 0.0,
            prev_reject_rate: 0.0,
            reject_volatility: 0.0,
            eligible_ads_per_request: 5.0,
            unfilled_streak: 0,
        };
        let m = derive_multipliers(&config(), snapshot);
        assert_eq!(m.alpha_profit, 1.5);
        assert_eq!(m.gamma_targeting, 1.3);
        assert_eq!(m.beta_ctr, 1.0);
    }

    #[test]
    fn no_triggers_reports_stable() {
        let cfg = MarketHealthConfig {
            fill_low: 0.0,
            ..config()
        };
        let snapshot = MarketHealthSnapshot {
            fill_rate: 0.5,
            reject_rate: 0.02,
            prev_reject_rate: 0.02,
            reject_volatility: 0.0,
            eligible_ads_per_request: 5.0,
            unfilled_streak: 0,
        };
        let m = derive_multipliers(&cfg, snapshot);
        assert_eq!(m.market_note, "Market stable.");
    }

    #[test]
    fn unfilled_streak_counts_trailing_unfilled_only() {
        fn event(filled: bool) -> PartnerAdRequestEvent {
            PartnerAdRequestEvent {
                created_at: chrono::Utc::now(),
                partner_id: 1,
                targeting: Default::default(),
                filled,
                ad_id: None,
                campaign_id: None,
                assignment_code: None,
                explanation: None,
                score_breakdown: None,
                unfilled_reason: None,
            }
        }
        let window = vec![event(true), event(true), event(false), event(false)];
        let snap = build_snapshot(&config(), &window, 0, ClickStats::default(), ClickStats::default(), &window);
        assert_eq!(snap.unfilled_streak, 2);
    }

    #[test]
    fn reject_rate_comes_from_clicks_not_unfilled_requests() {
        // All requests filled (fill_rate = 1.0), but half the clicks on
        // those filled requests were rejected — reject_rate must reflect
        // the clicks, not the (zero) unfilled fraction.
        fn event() -> PartnerAdRequestEvent {
            PartnerAdRequestEvent {
                created_at: chrono::Utc::now(),
                partner_id: 1,
                targeting: Default::default(),
                filled: true,
                ad_id: None,
                campaign_id: None,
                assignment_code: None,
                explanation: None,
                score_breakdown: None,
                unfilled_reason: None,
            }
        }
        let window = vec![event(), event()];
        let clicks = ClickStats {
            accepted: 1,
            rejected: 1,
        };
        let snap = build_snapshot(&config(), &window, 0, clicks, ClickStats::default(), &window);
        assert_eq!(snap.fill_rate, 1.0);
        assert_eq!(snap.reject_rate, 0.5);
        assert_eq!(snap.prev_reject_rate, 0.0);
        assert_eq!(snap.reject_volatility, 0.5);
    }

    #[test]
    fn unfilled_streak_uses_global_recent_events_not_current_window() {
        fn event(filled: bool) -> PartnerAdRequestEvent {
            PartnerAdRequestEvent {
                created_at: chrono::Utc::now(),
                partner_id: 1,
                targeting: Default::default(),
                filled,
                ad_id: None,
                campaign_id: None,
                assignment_code: None,
                explanation: None,
                score_breakdown: None,
                unfilled_reason: None,
            }
        }
        // current_window (e.g. last hour) is empty, but the global recent
        // history still carries a trailing unfilled streak.
        let current_window: Vec<PartnerAdRequestEvent> = vec![];
        let recent = vec![event(true), event(false), event(false), event(false)];
        let snap = build_snapshot(
            &config(),
            &current_window,
            0,
            ClickStats::default(),
            ClickStats::default(),
            &recent,
        );
        assert_eq!(snap.unfilled_streak, 3);
    }

    #[test]
    fn cache_serves_stale_reads_within_ttl_then_expires() {
        let cache = MarketHealthCache::new(chrono::Duration::milliseconds(500));
        let t0 = Utc::now();
        assert!(cache.get(t0).is_none());

        let snapshot = MarketHealthSnapshot {
            fill_rate: 0.3,
            reject_rate: 0.1,
            prev_reject_rate: 0.1,
            reject_volatility: 0.0,
            eligible_ads_per_request: 2.0,
            unfilled_streak: 0,
        };
        cache.publish(t0, snapshot);

        let within_ttl = t0 + chrono::Duration::milliseconds(100);
        assert_eq!(cache.get(within_ttl).unwrap().fill_rate, 0.3);

        let after_ttl = t0 + chrono::Duration::milliseconds(600);
        assert!(cache.get(after_ttl).is_none());
    }
}
