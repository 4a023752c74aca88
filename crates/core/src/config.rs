use serde::Deserialize;

/// Root application configuration. Loaded from environment variables
/// prefixed `AD_MARKETPLACE__` (nested fields separated by `__`).
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_node_id")]
    pub node_id: String,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub click: ClickConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub market_health: MarketHealthConfig,
    #[serde(default)]
    pub partner_quality: PartnerQualityConfig,
    #[serde(default)]
    pub exploration: ExplorationConfig,
    #[serde(default)]
    pub delivery: DeliveryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_selection_deadline_ms")]
    pub selection_deadline_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

fn default_node_id() -> String {
    "node-01".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_http_port() -> u16 {
    8080
}
fn default_selection_deadline_ms() -> u64 {
    500
}
fn default_metrics_port() -> u16 {
    9091
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            http_port: default_http_port(),
            selection_deadline_ms: default_selection_deadline_ms(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            port: default_metrics_port(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            api: ApiConfig::default(),
            metrics: MetricsConfig::default(),
            pricing: PricingConfig::default(),
            click: ClickConfig::default(),
            scoring: ScoringConfig::default(),
            market_health: MarketHealthConfig::default(),
            partner_quality: PartnerQualityConfig::default(),
            exploration: ExplorationConfig::default(),
            delivery: DeliveryConfig::default(),
        }
    }
}

// ─── Pricing ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PricingConfig {
    #[serde(default = "default_platform_fee_percent")]
    pub platform_fee_percent: f64,
}

fn default_platform_fee_percent() -> f64 {
    30.0
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            platform_fee_percent: default_platform_fee_percent(),
        }
    }
}

// ─── Click validation / accounting ─────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ClickConfig {
    #[serde(default = "default_hash_salt")]
    pub hash_salt: String,
    #[serde(default = "default_duplicate_window_secs")]
    pub duplicate_window_secs: i64,
    #[serde(default = "default_rate_limit_per_minute")]
    pub rate_limit_per_minute: u32,
    #[serde(default = "default_impression_dedup_window_secs")]
    pub impression_dedup_window_secs: i64,
    #[serde(default = "default_freq_cap_secs")]
    pub freq_cap_secs: i64,
}

fn default_hash_salt() -> String {
    "devsalt".to_string()
}
fn default_duplicate_window_secs() -> i64 {
    10
}
fn default_rate_limit_per_minute() -> u32 {
    20
}
fn default_impression_dedup_window_secs() -> i64 {
    60
}
fn default_freq_cap_secs() -> i64 {
    60
}

impl Default for ClickConfig {
    fn default() -> Self {
        Self {
            hash_salt: default_hash_salt(),
            duplicate_window_secs: default_duplicate_window_secs(),
            rate_limit_per_minute: default_rate_limit_per_minute(),
            impression_dedup_window_secs: default_impression_dedup_window_secs(),
            freq_cap_secs: default_freq_cap_secs(),
        }
    }
}

// ─── Scoring engine ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_ctr_lookback_days")]
    pub ctr_lookback_days: i64,
    #[serde(default = "default_reject_lookback_days")]
    pub reject_lookback_days: i64,
    #[serde(default = "default_ctr_weight")]
    pub ctr_weight: f64,
    #[serde(default = "default_targeting_bonus")]
    pub targeting_bonus_value: f64,
    #[serde(default = "default_reject_penalty_weight")]
    pub reject_penalty_weight: f64,
    #[serde(default)]
    pub debug: bool,
}

fn default_ctr_lookback_days() -> i64 {
    14
}
fn default_reject_lookback_days() -> i64 {
    7
}
fn default_ctr_weight() -> f64 {
    1.0
}
fn default_targeting_bonus() -> f64 {
    0.5
}
fn default_reject_penalty_weight() -> f64 {
    1.0
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            ctr_lookback_days: default_ctr_lookback_days(),
            reject_lookback_days: default_reject_lookback_days(),
            ctr_weight: default_ctr_weight(),
            targeting_bonus_value: default_targeting_bonus(),
            reject_penalty_weight: default_reject_penalty_weight(),
            debug: false,
        }
    }
}

// ─── Market-health sampler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct MarketHealthConfig {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: i64,
    #[serde(default = "default_streak_sample")]
    pub streak_sample: usize,
    #[serde(default = "default_fill_low")]
    pub fill_low: f64,
    #[serde(default = "default_fill_high")]
    pub fill_high: f64,
    #[serde(default = "default_eligible_supply_low")]
    pub eligible_supply_low: f64,
    #[serde(default = "default_reject_volatility_threshold")]
    pub reject_volatility_threshold: f64,
    #[serde(default = "default_unfilled_streak_threshold")]
    pub unfilled_streak_threshold: u32,
    #[serde(default = "default_reject_healthy")]
    pub reject_healthy: f64,
    #[serde(default = "default_alpha_boost_low_fill")]
    pub alpha_profit_boost_low_fill: f64,
    #[serde(default = "default_alpha_boost_low_supply")]
    pub alpha_profit_boost_low_supply: f64,
    #[serde(default = "default_beta_boost_healthy")]
    pub beta_ctr_boost_healthy: f64,
    #[serde(default = "default_gamma_boost_low_fill")]
    pub gamma_targeting_boost_low_fill: f64,
    #[serde(default = "default_gamma_boost_unfilled")]
    pub gamma_targeting_boost_unfilled: f64,
    #[serde(default = "default_delta_boost_low_fill")]
    pub delta_market_boost_low_fill: f64,
    #[serde(default = "default_delta_boost_volatility")]
    pub delta_market_boost_volatility: f64,
}

fn default_window_minutes() -> i64 {
    60
}
fn default_streak_sample() -> usize {
    10
}
fn default_fill_low() -> f64 {
    0.5
}
fn default_fill_high() -> f64 {
    0.8
}
fn default_eligible_supply_low() -> f64 {
    0.5
}
fn default_reject_volatility_threshold() -> f64 {
    0.1
}
fn default_unfilled_streak_threshold() -> u32 {
    3
}
fn default_reject_healthy() -> f64 {
    0.05
}
fn default_alpha_boost_low_fill() -> f64 {
    0.2
}
fn default_alpha_boost_low_supply() -> f64 {
    0.1
}
fn default_beta_boost_healthy() -> f64 {
    0.1
}
fn default_gamma_boost_low_fill() -> f64 {
    0.1
}
fn default_gamma_boost_unfilled() -> f64 {
    0.1
}
fn default_delta_boost_low_fill() -> f64 {
    0.2
}
fn default_delta_boost_volatility() -> f64 {
    0.1
}

impl Default for MarketHealthConfig {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            streak_sample: default_streak_sample(),
            fill_low: default_fill_low(),
            fill_high: default_fill_high(),
            eligible_supply_low: default_eligible_supply_low(),
            reject_volatility_threshold: default_reject_volatility_threshold(),
            unfilled_streak_threshold: default_unfilled_streak_threshold(),
            reject_healthy: default_reject_healthy(),
            alpha_profit_boost_low_fill: default_alpha_boost_low_fill(),
            alpha_profit_boost_low_supply: default_alpha_boost_low_supply(),
            beta_ctr_boost_healthy: default_beta_boost_healthy(),
            gamma_targeting_boost_low_fill: default_gamma_boost_low_fill(),
            gamma_targeting_boost_unfilled: default_gamma_boost_unfilled(),
            delta_market_boost_low_fill: default_delta_boost_low_fill(),
            delta_market_boost_volatility: default_delta_boost_volatility(),
        }
    }
}

// ─── Partner-quality classifier ─────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct PartnerQualityConfig {
    #[serde(default = "default_quality_recent_days")]
    pub recent_days: i64,
    #[serde(default = "default_quality_long_days")]
    pub long_days: i64,
    #[serde(default = "default_quality_new_clicks")]
    pub new_clicks_threshold: u64,
    #[serde(default = "default_quality_risky_rate")]
    pub risky_reject_rate: f64,
    #[serde(default = "default_quality_recovering_rate")]
    pub recovering_reject_rate: f64,
    #[serde(default = "default_quality_delta_new")]
    pub delta_new: f64,
    #[serde(default = "default_quality_delta_stable")]
    pub delta_stable: f64,
    #[serde(default = "default_quality_delta_risky")]
    pub delta_risky: f64,
    #[serde(default = "default_quality_delta_recovering")]
    pub delta_recovering: f64,
}

fn default_quality_recent_days() -> i64 {
    1
}
fn default_quality_long_days() -> i64 {
    7
}
fn default_quality_new_clicks() -> u64 {
    10
}
fn default_quality_risky_rate() -> f64 {
    0.2
}
fn default_quality_recovering_rate() -> f64 {
    0.1
}
fn default_quality_delta_new() -> f64 {
    0.8
}
fn default_quality_delta_stable() -> f64 {
    1.0
}
fn default_quality_delta_risky() -> f64 {
    1.5
}
fn default_quality_delta_recovering() -> f64 {
    1.1
}

impl Default for PartnerQualityConfig {
    fn default() -> Self {
        Self {
            recent_days: default_quality_recent_days(),
            long_days: default_quality_long_days(),
            new_clicks_threshold: default_quality_new_clicks(),
            risky_reject_rate: default_quality_risky_rate(),
            recovering_reject_rate: default_quality_recovering_rate(),
            delta_new: default_quality_delta_new(),
            delta_stable: default_quality_delta_stable(),
            delta_risky: default_quality_delta_risky(),
            delta_recovering: default_quality_delta_recovering(),
        }
    }
}

// ─── Exploration gate ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct ExplorationConfig {
    #[serde(default = "default_exploration_rate")]
    pub epsilon: f64,
    #[serde(default = "default_exploration_bonus")]
    pub bonus: f64,
    #[serde(default = "default_exploration_new_partner_requests")]
    pub new_partner_requests: u64,
    #[serde(default = "default_exploration_new_ad_serves")]
    pub new_ad_serves: u64,
    #[serde(default = "default_exploration_max_ad_serves")]
    pub max_ad_serves: u64,
    #[serde(default = "default_exploration_lookback_days")]
    pub lookback_days: i64,
}

fn default_exploration_rate() -> f64 {
    0.05
}
fn default_exploration_bonus() -> f64 {
    0.2
}
fn default_exploration_new_partner_requests() -> u64 {
    5
}
fn default_exploration_new_ad_serves() -> u64 {
    1
}
fn default_exploration_max_ad_serves() -> u64 {
    5
}
fn default_exploration_lookback_days() -> i64 {
    7
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            epsilon: default_exploration_rate(),
            bonus: default_exploration_bonus(),
            new_partner_requests: default_exploration_new_partner_requests(),
            new_ad_serves: default_exploration_new_ad_serves(),
            max_ad_serves: default_exploration_max_ad_serves(),
            lookback_days: default_exploration_lookback_days(),
        }
    }
}

// ─── Delivery balancer ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    #[serde(default = "default_delivery_lookback_days")]
    pub lookback_days: i64,
    #[serde(default = "default_delivery_min_requests")]
    pub min_requests: u64,
    #[serde(default = "default_delivery_low_click_rate")]
    pub low_click_rate: f64,
    #[serde(default = "default_delivery_min_budget_remaining_ratio")]
    pub min_budget_remaining_ratio: f64,
    #[serde(default = "default_delivery_boost_value")]
    pub boost_value: f64,
}

fn default_delivery_lookback_days() -> i64 {
    7
}
fn default_delivery_min_requests() -> u64 {
    10
}
fn default_delivery_low_click_rate() -> f64 {
    0.01
}
fn default_delivery_min_budget_remaining_ratio() -> f64 {
    0.5
}
fn default_delivery_boost_value() -> f64 {
    0.2
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            lookback_days: default_delivery_lookback_days(),
            min_requests: default_delivery_min_requests(),
            low_click_rate: default_delivery_low_click_rate(),
            min_budget_remaining_ratio: default_delivery_min_budget_remaining_ratio(),
            boost_value: default_delivery_boost_value(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables (`AD_MARKETPLACE__*`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder().add_source(
            config::Environment::with_prefix("AD_MARKETPLACE")
                .separator("__")
                .try_parsing(true)
                .list_separator(","),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_policy() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.pricing.platform_fee_percent, 30.0);
        assert_eq!(cfg.click.duplicate_window_secs, 10);
        assert_eq!(cfg.exploration.epsilon, 0.05);
        assert_eq!(cfg.delivery.boost_value, 0.2);
        assert_eq!(cfg.market_health.fill_low, 0.5);
    }
}
