// 7.0 config.rs: all settings in one place. hedge thresholds, quote guard, settlement params.
// 7.1 HedgeSettings and QuoteThresholdSettings are replaceable at runtime, the rest is fixed at startup.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::pricing::{PricingPolicies, MARKUP_POLICY, MID_POLICY};

/** 7.2: hedge order generation. thresholds are in USD */
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HedgeSettings {
    // Below this remaining amount no order is placed (virtual exchange excepted)
    pub threshold_down: Decimal,
    // From this amount the markup policy crosses the spread
    pub threshold_up: Decimal,
    // Fraction added beyond the touch when crossing (0.02 = 2%)
    pub market_order_markup: Decimal,
    // Name of the pricing policy in the registry
    pub pricing_policy: String,
}

impl Default for HedgeSettings {
    fn default() -> Self {
        Self {
            threshold_down: dec!(10),
            threshold_up: dec!(1000),
            market_order_markup: dec!(0.02),
            pricing_policy: MARKUP_POLICY.to_string(),
        }
    }
}

// Guard against single bad ticks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuoteThresholdSettings {
    pub enabled: bool,
    // Max relative mid deviation from the cached quote (0.1 = 10%)
    pub value: Decimal,
}

impl Default for QuoteThresholdSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            value: dec!(0.1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementParams {
    // Constituents at or below this weight always settle in USD
    pub min_direct_weight: Decimal,
    pub usd_asset_id: String,
}

impl Default for SettlementParams {
    fn default() -> Self {
        Self {
            min_direct_weight: dec!(0.02),
            usd_asset_id: "USD".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    // Allowed distance of the weight sum from 1
    pub weight_tolerance: Decimal,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            weight_tolerance: dec!(0.001),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimersSettings {
    pub settlement_interval_ms: u64,
    // Inbox capacity of the market maker
    pub inbox_capacity: usize,
}

impl Default for TimersSettings {
    fn default() -> Self {
        Self {
            settlement_interval_ms: 5_000,
            inbox_capacity: 256,
        }
    }
}

// The complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub hedge: HedgeSettings,
    pub quote_threshold: QuoteThresholdSettings,
    pub settlement: SettlementParams,
    pub index: IndexParams,
    pub timers: TimersSettings,
}

impl EngineConfig {
    pub fn development() -> Self {
        let mut config = Self::default();
        config.hedge.threshold_down = Decimal::ZERO;
        config.quote_threshold.enabled = false;
        config.timers.settlement_interval_ms = 1_000;
        config
    }

    // tighter guard and passive pricing
    pub fn conservative() -> Self {
        let mut config = Self::default();
        config.hedge.pricing_policy = MID_POLICY.to_string();
        config.hedge.threshold_down = dec!(100);
        config.quote_threshold.value = dec!(0.05);
        config
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_with(&PricingPolicies::standard())
    }

    /// Same checks, with the pricing policy looked up in `policies` so custom strategies can be selected.
    pub fn validate_with(&self, policies: &PricingPolicies) -> Result<(), ConfigError> {
        if self.hedge.threshold_down < Decimal::ZERO {
            return Err(ConfigError::InvalidHedge("threshold_down must not be negative".into()));
        }

        if self.hedge.threshold_up < self.hedge.threshold_down {
            return Err(ConfigError::InvalidHedge("threshold_up must be >= threshold_down".into()));
        }

        if self.hedge.market_order_markup < Decimal::ZERO || self.hedge.market_order_markup >= Decimal::ONE {
            return Err(ConfigError::InvalidHedge("markup must be in [0, 1)".into()));
        }

        if !policies.contains(&self.hedge.pricing_policy) {
            return Err(ConfigError::UnknownPricingPolicy(self.hedge.pricing_policy.clone()));
        }

        if self.quote_threshold.enabled && self.quote_threshold.value <= Decimal::ZERO {
            return Err(ConfigError::InvalidQuoteThreshold);
        }

        if self.settlement.min_direct_weight < Decimal::ZERO || self.settlement.min_direct_weight >= Decimal::ONE {
            return Err(ConfigError::InvalidSettlement("min_direct_weight must be in [0, 1)".into()));
        }

        if self.settlement.usd_asset_id.is_empty() {
            return Err(ConfigError::InvalidSettlement("usd_asset_id is empty".into()));
        }

        if self.index.weight_tolerance < Decimal::ZERO {
            return Err(ConfigError::InvalidIndex);
        }

        if self.timers.settlement_interval_ms == 0 || self.timers.inbox_capacity == 0 {
            return Err(ConfigError::InvalidTimers);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(String),
    #[error("invalid hedge settings: {0}")]
    InvalidHedge(String),
    #[error("unknown pricing policy '{0}'")]
    UnknownPricingPolicy(String),
    #[error("quote threshold must be positive when enabled")]
    InvalidQuoteThreshold,
    #[error("invalid settlement params: {0}")]
    InvalidSettlement(String),
    #[error("weight tolerance must not be negative")]
    InvalidIndex,
    #[error("timer interval and inbox capacity must be positive")]
    InvalidTimers,
}

// Environment presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn config(&self) -> EngineConfig {
        match self {
            Environment::Development => EngineConfig::development(),
            Environment::Production => EngineConfig::conservative(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_environment_presets() {
        assert!(Environment::Development.config().validate().is_ok());
        assert!(Environment::Production.config().validate().is_ok());
        assert!(!Environment::Development.config().quote_threshold.enabled);
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let mut config = EngineConfig::default();
        config.hedge.pricing_policy = "skewed".into();
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownPricingPolicy("skewed".into()))
        );
    }

    #[test]
    fn test_registered_policy_accepted() {
        use crate::hedge_settings::AssetHedgeSettings;
        use crate::pricing::{LimitOrderPrice, PriceType, PricingPolicy};
        use crate::quote::Quote;
        use crate::types::Side;

        struct Skewed;
        impl PricingPolicy for Skewed {
            fn name(&self) -> &str {
                "skewed"
            }
            fn calculate(&self, quote: &Quote, _: Decimal, _: Side, _: &AssetHedgeSettings, _: &HedgeSettings) -> LimitOrderPrice {
                LimitOrderPrice::new(quote.mid, PriceType::Limit)
            }
        }

        let mut policies = PricingPolicies::standard();
        policies.register(std::sync::Arc::new(Skewed));

        let mut config = EngineConfig::default();
        config.hedge.pricing_policy = "skewed".into();
        assert!(config.validate_with(&policies).is_ok());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_thresholds() {
        let mut config = EngineConfig::default();
        config.hedge.threshold_up = dec!(1);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidHedge(_))));
    }

    #[test]
    fn test_from_toml_partial() {
        let source = r#"
            [hedge]
            threshold_down = "25"
            pricing_policy = "touch"

            [quote_threshold]
            enabled = false
        "#;
        let config = EngineConfig::from_toml_str(source).unwrap();
        assert_eq!(config.hedge.threshold_down, dec!(25));
        assert_eq!(config.hedge.pricing_policy, "touch");
        assert!(!config.quote_threshold.enabled);
        assert_eq!(config.settlement.min_direct_weight, dec!(0.02));
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(matches!(
            EngineConfig::from_toml_str("hedge = 5"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::conservative();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
