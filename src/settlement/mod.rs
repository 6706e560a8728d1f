// 9.0: settlement saga. converts a redemption request into per-asset reservations, position
// closes and wallet transfers. operator calls live in service.rs, the scheduled phases in
// phases.rs, wallet movements in transfers.rs and balance checks in validation.rs.
// every scheduled step records failures on the entity and moves on.

mod model;
mod phases;
mod service;
mod transfers;
mod validation;

pub use model::{
    calculate_asset_settlements, AssetSettlement, AssetSettlementStatus, ConstituentPricing, Settlement,
    SettlementError, SettlementStatus,
};
pub use service::CreateSettlement;

use std::sync::Arc;

use crate::config::SettlementParams;
use crate::error::{HedgeError, Result};
use crate::hedge_settings::AssetHedgeSettingsService;
use crate::quote::QuoteStore;
use crate::services::{
    BalanceService, Collaborators, FundTransferService, IndexPriceService, IndexSettingsService, InstrumentCatalog,
    PositionService, SettlementRepository, TokenService,
};

pub struct SettlementService {
    index_prices: Arc<dyn IndexPriceService>,
    index_settings: Arc<dyn IndexSettingsService>,
    asset_hedge_settings: Arc<AssetHedgeSettingsService>,
    repository: Arc<dyn SettlementRepository>,
    quotes: Arc<QuoteStore>,
    balances: Arc<dyn BalanceService>,
    transfers: Arc<dyn FundTransferService>,
    instruments: Arc<dyn InstrumentCatalog>,
    positions: Arc<dyn PositionService>,
    tokens: Arc<dyn TokenService>,
    params: SettlementParams,
}

impl SettlementService {
    pub fn new(
        collaborators: &Collaborators,
        asset_hedge_settings: Arc<AssetHedgeSettingsService>,
        quotes: Arc<QuoteStore>,
        params: SettlementParams,
    ) -> Self {
        Self {
            index_prices: collaborators.index_prices.clone(),
            index_settings: collaborators.index_settings.clone(),
            asset_hedge_settings,
            repository: collaborators.settlements.clone(),
            quotes,
            balances: collaborators.balances.clone(),
            transfers: collaborators.fund_transfers.clone(),
            instruments: collaborators.instruments.clone(),
            positions: collaborators.positions.clone(),
            tokens: collaborators.tokens.clone(),
            params,
        }
    }

    pub async fn get_all(&self) -> Result<Vec<Settlement>> {
        self.repository.get_all().await
    }

    pub async fn get_by_client_id(&self, client_id: &str) -> Result<Vec<Settlement>> {
        self.repository.get_by_client_id(client_id).await
    }

    pub async fn get_by_id(&self, settlement_id: &str) -> Result<Settlement> {
        self.repository
            .get_by_id(settlement_id)
            .await?
            .ok_or_else(|| HedgeError::EntityNotFound(format!("settlement {}", settlement_id)))
    }
}
