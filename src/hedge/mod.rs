// 8.0: hedge service. turns index exposure into hedge limit orders and sends them to the exchanges.
// the pricing cycle lives in cycle.rs, operator actions in manual.rs.
// nothing here locks across calls: serialization is the market maker's job.

mod cycle;
mod manual;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use crate::config::{EngineConfig, HedgeSettings};
use crate::error::{HedgeError, Result};
use crate::exchange::ExchangeAdapterRegistry;
use crate::health::HealthMonitor;
use crate::hedge_settings::AssetHedgeSettingsService;
use crate::investment::AssetInvestment;
use crate::order::HedgeLimitOrder;
use crate::pricing::{PricingPolicies, PricingPolicy};
use crate::quote::QuoteStore;
use crate::services::{Collaborators, IndexPriceService, IndexSettingsService, PositionService, TokenService};

pub struct HedgeService {
    index_prices: Arc<dyn IndexPriceService>,
    index_settings: Arc<dyn IndexSettingsService>,
    tokens: Arc<dyn TokenService>,
    positions: Arc<dyn PositionService>,
    asset_hedge_settings: Arc<AssetHedgeSettingsService>,
    quotes: Arc<QuoteStore>,
    exchanges: ExchangeAdapterRegistry,
    policies: PricingPolicies,
    health: Arc<HealthMonitor>,
    settings: RwLock<HedgeSettings>,
    weight_tolerance: Decimal,
    // audit trail of the last cycle
    latest_investments: RwLock<Vec<AssetInvestment>>,
    latest_limit_orders: RwLock<Vec<HedgeLimitOrder>>,
}

impl HedgeService {
    pub fn new(
        collaborators: &Collaborators,
        asset_hedge_settings: Arc<AssetHedgeSettingsService>,
        quotes: Arc<QuoteStore>,
        exchanges: ExchangeAdapterRegistry,
        health: Arc<HealthMonitor>,
        policies: PricingPolicies,
        config: &EngineConfig,
    ) -> Self {
        Self {
            index_prices: collaborators.index_prices.clone(),
            index_settings: collaborators.index_settings.clone(),
            tokens: collaborators.tokens.clone(),
            positions: collaborators.positions.clone(),
            asset_hedge_settings,
            quotes,
            exchanges,
            policies,
            health,
            settings: RwLock::new(config.hedge.clone()),
            weight_tolerance: config.index.weight_tolerance,
            latest_investments: RwLock::new(Vec::new()),
            latest_limit_orders: RwLock::new(Vec::new()),
        }
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.names()
    }

    pub fn settings(&self) -> HedgeSettings {
        self.settings.read().clone()
    }

    pub fn set_settings(&self, settings: HedgeSettings) -> Result<()> {
        if !self.policies.contains(&settings.pricing_policy) {
            return Err(HedgeError::invalid_operation(format!(
                "unknown pricing policy '{}'",
                settings.pricing_policy
            )));
        }

        info!(
            threshold_down = %settings.threshold_down,
            threshold_up = %settings.threshold_up,
            markup = %settings.market_order_markup,
            policy = %settings.pricing_policy,
            "hedge settings updated"
        );
        *self.settings.write() = settings;
        Ok(())
    }

    pub fn latest_investments(&self) -> Vec<AssetInvestment> {
        self.latest_investments.read().clone()
    }

    pub fn latest_limit_orders(&self) -> Vec<HedgeLimitOrder> {
        self.latest_limit_orders.read().clone()
    }

    fn policy(&self, name: &str) -> Result<Arc<dyn PricingPolicy>> {
        self.policies
            .get(name)
            .ok_or_else(|| HedgeError::invalid_operation(format!("unknown pricing policy '{}'", name)))
    }
}
