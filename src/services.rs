//! Collaborator contracts.
//!
//! Everything the engine reads from or writes to outside of its own memory:
//! index prices, tokens, positions, fund transfers, repositories. Each is an
//! async trait so storage and transport stay pluggable; the `memory` module
//! carries in-process implementations of all of them.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::Result;
use crate::hedge_settings::AssetHedgeSettings;
use crate::index::{Index, IndexPrice, IndexSettings, InternalTrade, MarketMakerState, MarketMakerStatus, Token};
use crate::position::Position;
use crate::settlement::{AssetSettlement, Settlement, SettlementStatus};
use crate::types::{AssetId, AssetPairId};

#[async_trait]
pub trait IndexPriceService: Send + Sync {
    async fn get_all(&self) -> Result<Vec<IndexPrice>>;

    async fn get_by_index(&self, name: &str) -> Result<Option<IndexPrice>>;

    /// Recomputes the snapshot of the index from a fresh tick.
    async fn update(&self, index: &Index) -> Result<()>;
}

#[async_trait]
pub trait IndexSettingsService: Send + Sync {
    async fn get_all(&self) -> Result<Vec<IndexSettings>>;

    async fn get_by_index(&self, name: &str) -> Result<Option<IndexSettings>>;
}

#[async_trait]
pub trait TokenService: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Token>>;

    async fn update_volume(&self, asset_id: &AssetId, trade: &InternalTrade) -> Result<()>;

    async fn close(&self, asset_id: &AssetId, volume: Decimal, price: Decimal) -> Result<()>;
}

#[async_trait]
pub trait PositionService: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Position>>;

    async fn get_by_asset_id(&self, asset_id: &AssetId, exchange: &str) -> Result<Option<Position>>;

    async fn close(&self, asset_id: &AssetId, exchange: &str, volume: Decimal, price: Decimal) -> Result<()>;
}

#[async_trait]
pub trait InternalTradeService: Send + Sync {
    async fn register(&self, trade: &InternalTrade) -> Result<()>;
}

/// The market maker quoting the index tokens themselves.
#[async_trait]
pub trait MarketMakerService: Send + Sync {
    async fn update_limit_orders(&self, index_name: &str) -> Result<()>;

    async fn cancel_limit_orders(&self, index_name: &str) -> Result<()>;
}

#[async_trait]
pub trait MarketMakerStateService: Send + Sync {
    async fn get(&self) -> Result<MarketMakerState>;

    async fn update(&self, status: MarketMakerStatus, comment: &str, user_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSettings {
    pub asset_id: AssetId,
    pub exchange: String,
    /// Name of the asset on that exchange.
    pub asset: String,
    pub accuracy: u32,
}

#[async_trait]
pub trait InstrumentCatalog: Send + Sync {
    async fn is_asset_pair_exists(&self, asset_pair_id: &AssetPairId) -> Result<bool>;

    async fn get_assets(&self) -> Result<Vec<AssetSettings>>;

    async fn get_asset(&self, asset_id: &AssetId, exchange: &str) -> Result<Option<AssetSettings>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub asset_id: String,
    pub amount: Decimal,
    pub reserved: Decimal,
}

impl Balance {
    pub fn empty(asset_id: impl Into<String>) -> Self {
        Self {
            asset_id: asset_id.into(),
            amount: Decimal::ZERO,
            reserved: Decimal::ZERO,
        }
    }

    pub fn free(&self) -> Decimal {
        self.amount - self.reserved
    }
}

/// Cached wallet balances, read without suspension.
pub trait BalanceService: Send + Sync {
    fn get_by_asset_id(&self, exchange: &str, asset_id: &str) -> Balance;
}

/// Wallet movements of the settlement saga. Every call fails with
/// `HedgeError::NotEnoughFunds` on a shortfall and `HedgeError::Service` otherwise.
#[async_trait]
pub trait FundTransferService: Send + Sync {
    /// Holds `amount` of the asset in the operating wallet.
    async fn reserve_funds(&self, asset_id: &AssetId, amount: Decimal, settlement_id: &str) -> Result<()>;

    /// Holds the USD equivalent of `amount` at `price`.
    async fn reserve_usd_funds(
        &self,
        asset_id: &AssetId,
        price: Decimal,
        amount: Decimal,
        settlement_id: &str,
    ) -> Result<()>;

    /// Holds the index tokens in the client wallet.
    async fn reserve_client_funds(
        &self,
        wallet_id: &str,
        asset: &str,
        amount: Decimal,
        client_id: &str,
        settlement_id: &str,
    ) -> Result<()>;

    /// Moves reserved operating funds to the client wallet, returns the transaction id.
    async fn transfer_reserved_funds(
        &self,
        wallet_id: &str,
        asset_id: &str,
        amount: Decimal,
        client_id: &str,
        settlement_id: &str,
    ) -> Result<String>;

    /// Moves the reserved index tokens from the client wallet to the operating wallet.
    async fn transfer_client_reserved_funds(
        &self,
        asset: &str,
        amount: Decimal,
        client_id: &str,
        settlement_id: &str,
    ) -> Result<String>;

    async fn release_reserved_funds(
        &self,
        asset_id: &str,
        amount: Decimal,
        client_id: &str,
        settlement_id: &str,
    ) -> Result<()>;

    async fn release_client_reserved_funds(
        &self,
        wallet_id: &str,
        asset: &str,
        amount: Decimal,
        client_id: &str,
        settlement_id: &str,
    ) -> Result<()>;
}

#[async_trait]
pub trait SettlementRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<Settlement>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<Settlement>>;

    async fn get_by_client_id(&self, client_id: &str) -> Result<Vec<Settlement>>;

    async fn get_by_status(&self, status: SettlementStatus) -> Result<Vec<Settlement>>;

    async fn insert(&self, settlement: &Settlement) -> Result<()>;

    /// Stores the settlement together with a new asset list.
    async fn replace(&self, settlement: &Settlement) -> Result<()>;

    /// Stores the settlement header, the asset list is left as stored.
    async fn update(&self, settlement: &Settlement) -> Result<()>;

    async fn update_asset(&self, asset: &AssetSettlement) -> Result<()>;
}

#[async_trait]
pub trait AssetHedgeSettingsRepository: Send + Sync {
    async fn get_all(&self) -> Result<Vec<AssetHedgeSettings>>;

    async fn get_by_asset_id(&self, asset_id: &AssetId) -> Result<Option<AssetHedgeSettings>>;

    /// Fails with `EntityAlreadyExists` when the asset already has settings.
    async fn insert(&self, settings: &AssetHedgeSettings) -> Result<()>;

    async fn update(&self, settings: &AssetHedgeSettings) -> Result<()>;
}

/// Every collaborator the engine is wired with.
#[derive(Clone)]
pub struct Collaborators {
    pub index_prices: Arc<dyn IndexPriceService>,
    pub index_settings: Arc<dyn IndexSettingsService>,
    pub tokens: Arc<dyn TokenService>,
    pub positions: Arc<dyn PositionService>,
    pub internal_trades: Arc<dyn InternalTradeService>,
    pub market_maker: Arc<dyn MarketMakerService>,
    pub market_maker_state: Arc<dyn MarketMakerStateService>,
    pub instruments: Arc<dyn InstrumentCatalog>,
    pub balances: Arc<dyn BalanceService>,
    pub fund_transfers: Arc<dyn FundTransferService>,
    pub settlements: Arc<dyn SettlementRepository>,
    pub asset_hedge_settings: Arc<dyn AssetHedgeSettingsRepository>,
}
