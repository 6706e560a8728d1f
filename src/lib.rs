// index-hedging-core: hedging engine for a synthetic index market maker, plus the settlement saga
// that turns index redemptions into per-asset reservations, position closes and transfers.
// all real-time events go through one actor inbox; settlement steps record failures as data.
//
// file map (search X.0 for structs, X.1+ for logic):
//   1.x  types.rs, error.rs: ids, sides, timestamps, error taxonomy
//   2.x  quote.rs: quote store, virtual exchange composite quotes
//   3.x  hedge_settings.rs: per-asset hedge mode + ensure semantics
//   4.x  index.rs: index ticks, index prices, tokens, internal trades, mm status
//   5.x  position.rs: hedge positions
//   6.x  exchange.rs, health.rs: adapter registry, health issues
//   7.x  config.rs: thresholds, quote guard, settlement params, env presets
//   7.5  pricing.rs: pricing policies (mid, touch, markup) + rounding
//   7.6  order.rs: hedge limit orders
//   7.7  investment.rs: exposure calculation
//   8.x  hedge/: pricing cycle, manual operator actions
//   9.x  settlement/: saga model, operator calls, phases, transfers, validation
//   10.x memory.rs: in-memory collaborators (mocked)
//   11.x market_maker.rs: actor gate for index/trade/state/settlement events
//   12.x runtime.rs: wiring
//   services.rs: collaborator contracts

// core modules
pub mod error;
pub mod index;
pub mod investment;
pub mod order;
pub mod position;
pub mod pricing;
pub mod quote;
pub mod types;

// services
pub mod hedge;
pub mod hedge_settings;
pub mod market_maker;
pub mod settlement;

// integration modules
pub mod config;
pub mod exchange;
pub mod health;
pub mod memory;
pub mod runtime;
pub mod services;

// re exports for convenience
pub use config::{ConfigError, EngineConfig, Environment, HedgeSettings, QuoteThresholdSettings, SettlementParams};
pub use error::{HedgeError, Result};
pub use exchange::{ExchangeAdapter, ExchangeAdapterRegistry};
pub use health::{HealthIssue, HealthIssueKind, HealthMonitor};
pub use hedge::HedgeService;
pub use hedge_settings::{AssetHedgeMode, AssetHedgeSettings, AssetHedgeSettingsService};
pub use index::*;
pub use investment::AssetInvestment;
pub use market_maker::{spawn_settlement_timer, ManualOrderRequest, MarketMaker, MarketMakerHandle};
pub use order::{HedgeLimitOrder, LimitOrderError};
pub use position::Position;
pub use pricing::{LimitOrderPrice, PriceType, PricingPolicies, PricingPolicy};
pub use quote::{Quote, QuoteStore, QuoteUpdate};
pub use runtime::HedgingEngine;
pub use services::Collaborators;
pub use settlement::{
    AssetSettlement, AssetSettlementStatus, CreateSettlement, Settlement, SettlementError, SettlementService,
    SettlementStatus,
};
pub use types::*;
