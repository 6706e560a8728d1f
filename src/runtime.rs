// 12.0 runtime.rs: builds the process-scoped services once and starts the market maker actor.
// the quote store, hedge settings cache and health monitor are created here and shared by Arc.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::{ConfigError, EngineConfig};
use crate::exchange::ExchangeAdapterRegistry;
use crate::health::HealthMonitor;
use crate::hedge::HedgeService;
use crate::hedge_settings::AssetHedgeSettingsService;
use crate::market_maker::{spawn_settlement_timer, MarketMaker, MarketMakerHandle};
use crate::pricing::PricingPolicies;
use crate::quote::QuoteStore;
use crate::services::Collaborators;
use crate::settlement::SettlementService;

pub struct HedgingEngine {
    pub quotes: Arc<QuoteStore>,
    pub asset_hedge_settings: Arc<AssetHedgeSettingsService>,
    pub hedge: Arc<HedgeService>,
    pub settlements: Arc<SettlementService>,
    pub health: Arc<HealthMonitor>,
    pub market_maker: MarketMakerHandle,
    config: EngineConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl HedgingEngine {
    /// Must be called from within a tokio runtime.
    pub fn start(
        collaborators: Collaborators,
        exchanges: ExchangeAdapterRegistry,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        Self::start_with_policies(collaborators, exchanges, PricingPolicies::standard(), config)
    }

    /// `policies` is the full registry the hedge service picks from, standard ones included.
    pub fn start_with_policies(
        collaborators: Collaborators,
        exchanges: ExchangeAdapterRegistry,
        policies: PricingPolicies,
        config: EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate_with(&policies)?;

        let quotes = Arc::new(QuoteStore::new(
            collaborators.instruments.clone(),
            config.quote_threshold.clone(),
        ));
        let asset_hedge_settings = Arc::new(AssetHedgeSettingsService::new(
            collaborators.asset_hedge_settings.clone(),
        ));
        let health = Arc::new(HealthMonitor::new());

        let hedge = Arc::new(HedgeService::new(
            &collaborators,
            asset_hedge_settings.clone(),
            quotes.clone(),
            exchanges.clone(),
            health.clone(),
            policies,
            &config,
        ));
        let settlements = Arc::new(SettlementService::new(
            &collaborators,
            asset_hedge_settings.clone(),
            quotes.clone(),
            config.settlement.clone(),
        ));

        let (market_maker, actor) = MarketMaker::new(&collaborators, hedge.clone(), settlements.clone()).spawn(
            &collaborators,
            asset_hedge_settings.clone(),
            quotes.clone(),
            config.timers.inbox_capacity,
        );

        info!(
            exchanges = ?exchanges.names(),
            policies = ?hedge.policy_names(),
            policy = %config.hedge.pricing_policy,
            "hedging engine started"
        );

        Ok(Self {
            quotes,
            asset_hedge_settings,
            hedge,
            settlements,
            health,
            market_maker,
            config,
            tasks: vec![actor],
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Settlement ticks every `settlement_interval_ms`.
    pub fn start_settlement_timer(&mut self) {
        let interval = Duration::from_millis(self.config.timers.settlement_interval_ms);
        self.tasks
            .push(spawn_settlement_timer(self.market_maker.clone(), interval));
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("hedging engine stopped");
    }
}
