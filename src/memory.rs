// 10.0 memory.rs: MOCKED. in-process collaborators, would be storage, wallets and exchange
// connectivity in prod. used by the simulation binary and the tests.
// 10.1 every store is behind a parking_lot lock that is never held across an await.

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::{HedgeError, Result};
use crate::exchange::ExchangeAdapter;
use crate::hedge_settings::AssetHedgeSettings;
use crate::index::{Index, IndexPrice, IndexSettings, InternalTrade, MarketMakerState, MarketMakerStatus, Token};
use crate::order::HedgeLimitOrder;
use crate::position::Position;
use crate::services::{
    AssetHedgeSettingsRepository, AssetSettings, Balance, BalanceService, Collaborators, FundTransferService,
    IndexPriceService, IndexSettingsService, InstrumentCatalog, InternalTradeService, MarketMakerService,
    MarketMakerStateService, PositionService, SettlementRepository, TokenService,
};
use crate::settlement::{AssetSettlement, Settlement, SettlementStatus};
use crate::types::{AssetId, AssetPairId, Side};

// 10.2: index side

#[derive(Default)]
pub struct InMemoryIndexPriceService {
    prices: RwLock<BTreeMap<String, IndexPrice>>,
}

impl InMemoryIndexPriceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, price: IndexPrice) {
        self.prices.write().insert(price.name.clone(), price);
    }
}

#[async_trait]
impl IndexPriceService for InMemoryIndexPriceService {
    async fn get_all(&self) -> Result<Vec<IndexPrice>> {
        Ok(self.prices.read().values().cloned().collect())
    }

    async fn get_by_index(&self, name: &str) -> Result<Option<IndexPrice>> {
        Ok(self.prices.read().get(name).cloned())
    }

    async fn update(&self, index: &Index) -> Result<()> {
        self.set(IndexPrice::from_index(index));
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryIndexSettingsService {
    settings: RwLock<BTreeMap<String, IndexSettings>>,
}

impl InMemoryIndexSettingsService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, settings: IndexSettings) {
        self.settings.write().insert(settings.name.clone(), settings);
    }
}

#[async_trait]
impl IndexSettingsService for InMemoryIndexSettingsService {
    async fn get_all(&self) -> Result<Vec<IndexSettings>> {
        Ok(self.settings.read().values().cloned().collect())
    }

    async fn get_by_index(&self, name: &str) -> Result<Option<IndexSettings>> {
        Ok(self.settings.read().get(name).cloned())
    }
}

#[derive(Default)]
pub struct InMemoryTokenService {
    tokens: RwLock<BTreeMap<AssetId, Token>>,
}

impl InMemoryTokenService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, token: Token) {
        self.tokens.write().insert(token.asset_id.clone(), token);
    }

    pub fn get(&self, asset_id: &AssetId) -> Option<Token> {
        self.tokens.read().get(asset_id).cloned()
    }
}

#[async_trait]
impl TokenService for InMemoryTokenService {
    async fn get_all(&self) -> Result<Vec<Token>> {
        Ok(self.tokens.read().values().cloned().collect())
    }

    async fn update_volume(&self, asset_id: &AssetId, trade: &InternalTrade) -> Result<()> {
        self.tokens
            .write()
            .entry(asset_id.clone())
            .or_insert_with(|| Token::new(asset_id.clone()))
            .update_volume(trade);
        Ok(())
    }

    async fn close(&self, asset_id: &AssetId, volume: Decimal, price: Decimal) -> Result<()> {
        let mut tokens = self.tokens.write();
        let token = tokens
            .get_mut(asset_id)
            .ok_or_else(|| HedgeError::EntityNotFound(format!("token {}", asset_id)))?;
        token.close(volume, price);
        Ok(())
    }
}

// 10.3: positions and trades

#[derive(Default)]
pub struct InMemoryPositionService {
    positions: RwLock<BTreeMap<(AssetId, String), Position>>,
    close_failures: RwLock<HashMap<AssetId, HedgeError>>,
}

impl InMemoryPositionService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, position: Position) {
        self.positions
            .write()
            .insert((position.asset_id.clone(), position.exchange.clone()), position);
    }

    // hedge fill reported by an exchange
    pub fn apply_trade(&self, asset_id: &AssetId, exchange: &str, side: Side, volume: Decimal, price: Decimal) {
        self.positions
            .write()
            .entry((asset_id.clone(), exchange.to_string()))
            .or_insert_with(|| Position::new(asset_id.clone(), exchange))
            .apply_trade(side, volume, price);
    }

    pub fn fail_close(&self, asset_id: &str, error: HedgeError) {
        self.close_failures.write().insert(AssetId::from(asset_id), error);
    }

    pub fn clear_close_failure(&self, asset_id: &str) {
        self.close_failures.write().remove(&AssetId::from(asset_id));
    }
}

#[async_trait]
impl PositionService for InMemoryPositionService {
    async fn get_all(&self) -> Result<Vec<Position>> {
        Ok(self.positions.read().values().cloned().collect())
    }

    async fn get_by_asset_id(&self, asset_id: &AssetId, exchange: &str) -> Result<Option<Position>> {
        Ok(self
            .positions
            .read()
            .get(&(asset_id.clone(), exchange.to_string()))
            .cloned())
    }

    async fn close(&self, asset_id: &AssetId, exchange: &str, volume: Decimal, price: Decimal) -> Result<()> {
        if let Some(error) = self.close_failures.read().get(asset_id) {
            return Err(error.clone());
        }

        let mut positions = self.positions.write();
        match positions.get_mut(&(asset_id.clone(), exchange.to_string())) {
            Some(position) => {
                position.close(volume, price);
            }
            None => debug!(asset = %asset_id, exchange, "no position to close"),
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryInternalTradeService {
    trades: Mutex<Vec<InternalTrade>>,
}

impl InMemoryInternalTradeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registered(&self) -> Vec<InternalTrade> {
        self.trades.lock().clone()
    }
}

#[async_trait]
impl InternalTradeService for InMemoryInternalTradeService {
    async fn register(&self, trade: &InternalTrade) -> Result<()> {
        self.trades.lock().push(trade.clone());
        Ok(())
    }
}

// 10.4: market maker

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarketMakerCall {
    UpdateLimitOrders(String),
    CancelLimitOrders(String),
}

#[derive(Default)]
pub struct InMemoryMarketMakerService {
    calls: Mutex<Vec<MarketMakerCall>>,
}

impl InMemoryMarketMakerService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<MarketMakerCall> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl MarketMakerService for InMemoryMarketMakerService {
    async fn update_limit_orders(&self, index_name: &str) -> Result<()> {
        self.calls
            .lock()
            .push(MarketMakerCall::UpdateLimitOrders(index_name.to_string()));
        Ok(())
    }

    async fn cancel_limit_orders(&self, index_name: &str) -> Result<()> {
        self.calls
            .lock()
            .push(MarketMakerCall::CancelLimitOrders(index_name.to_string()));
        Ok(())
    }
}

pub struct InMemoryMarketMakerStateService {
    state: RwLock<MarketMakerState>,
}

impl InMemoryMarketMakerStateService {
    pub fn new(status: MarketMakerStatus) -> Self {
        Self {
            state: RwLock::new(MarketMakerState::new(status, "", "")),
        }
    }
}

#[async_trait]
impl MarketMakerStateService for InMemoryMarketMakerStateService {
    async fn get(&self) -> Result<MarketMakerState> {
        Ok(self.state.read().clone())
    }

    async fn update(&self, status: MarketMakerStatus, comment: &str, user_id: &str) -> Result<()> {
        *self.state.write() = MarketMakerState::new(status, comment, user_id);
        Ok(())
    }
}

// 10.5: instruments and balances

#[derive(Default)]
pub struct InMemoryInstrumentCatalog {
    pairs: RwLock<BTreeSet<AssetPairId>>,
    assets: RwLock<Vec<AssetSettings>>,
}

impl InMemoryInstrumentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_asset_pair(&self, asset_pair_id: &str) {
        self.pairs.write().insert(AssetPairId::from(asset_pair_id));
    }

    pub fn add_asset(&self, asset_id: &str, exchange: &str, asset: &str) {
        self.assets.write().push(AssetSettings {
            asset_id: AssetId::from(asset_id),
            exchange: exchange.to_string(),
            asset: asset.to_string(),
            accuracy: 8,
        });
    }
}

#[async_trait]
impl InstrumentCatalog for InMemoryInstrumentCatalog {
    async fn is_asset_pair_exists(&self, asset_pair_id: &AssetPairId) -> Result<bool> {
        Ok(self.pairs.read().contains(asset_pair_id))
    }

    async fn get_assets(&self) -> Result<Vec<AssetSettings>> {
        Ok(self.assets.read().clone())
    }

    async fn get_asset(&self, asset_id: &AssetId, exchange: &str) -> Result<Option<AssetSettings>> {
        Ok(self
            .assets
            .read()
            .iter()
            .find(|a| &a.asset_id == asset_id && a.exchange == exchange)
            .cloned())
    }
}

#[derive(Default)]
pub struct InMemoryBalanceService {
    balances: RwLock<HashMap<(String, String), Balance>>,
}

impl InMemoryBalanceService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, exchange: &str, asset_id: &str, amount: Decimal, reserved: Decimal) {
        self.balances.write().insert(
            (exchange.to_string(), asset_id.to_string()),
            Balance {
                asset_id: asset_id.to_string(),
                amount,
                reserved,
            },
        );
    }
}

impl BalanceService for InMemoryBalanceService {
    fn get_by_asset_id(&self, exchange: &str, asset_id: &str) -> Balance {
        self.balances
            .read()
            .get(&(exchange.to_string(), asset_id.to_string()))
            .cloned()
            .unwrap_or_else(|| Balance::empty(asset_id))
    }
}

// 10.6: fund transfers. failures are injected per (operation, asset) and stay until cleared.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TransferKind {
    Reserve,
    ReserveUsd,
    ReserveClient,
    Transfer,
    TransferClient,
    Release,
    ReleaseClient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub kind: TransferKind,
    pub asset: String,
    pub amount: Decimal,
    pub settlement_id: String,
}

#[derive(Default)]
pub struct InMemoryFundTransferService {
    records: Mutex<Vec<TransferRecord>>,
    failures: RwLock<HashMap<(TransferKind, String), HedgeError>>,
}

impl InMemoryFundTransferService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail(&self, kind: TransferKind, asset: &str, error: HedgeError) {
        self.failures.write().insert((kind, asset.to_string()), error);
    }

    pub fn clear_failure(&self, kind: TransferKind, asset: &str) {
        self.failures.write().remove(&(kind, asset.to_string()));
    }

    pub fn records(&self) -> Vec<TransferRecord> {
        self.records.lock().clone()
    }

    pub fn records_of(&self, kind: TransferKind) -> Vec<TransferRecord> {
        self.records.lock().iter().filter(|r| r.kind == kind).cloned().collect()
    }

    fn record(&self, kind: TransferKind, asset: &str, amount: Decimal, settlement_id: &str) -> Result<()> {
        if let Some(error) = self.failures.read().get(&(kind, asset.to_string())) {
            return Err(error.clone());
        }
        self.records.lock().push(TransferRecord {
            kind,
            asset: asset.to_string(),
            amount,
            settlement_id: settlement_id.to_string(),
        });
        Ok(())
    }
}

#[async_trait]
impl FundTransferService for InMemoryFundTransferService {
    async fn reserve_funds(&self, asset_id: &AssetId, amount: Decimal, settlement_id: &str) -> Result<()> {
        self.record(TransferKind::Reserve, asset_id.as_str(), amount, settlement_id)
    }

    async fn reserve_usd_funds(
        &self,
        asset_id: &AssetId,
        price: Decimal,
        amount: Decimal,
        settlement_id: &str,
    ) -> Result<()> {
        self.record(TransferKind::ReserveUsd, asset_id.as_str(), amount * price, settlement_id)
    }

    async fn reserve_client_funds(
        &self,
        _wallet_id: &str,
        asset: &str,
        amount: Decimal,
        _client_id: &str,
        settlement_id: &str,
    ) -> Result<()> {
        self.record(TransferKind::ReserveClient, asset, amount, settlement_id)
    }

    async fn transfer_reserved_funds(
        &self,
        _wallet_id: &str,
        asset_id: &str,
        amount: Decimal,
        _client_id: &str,
        settlement_id: &str,
    ) -> Result<String> {
        self.record(TransferKind::Transfer, asset_id, amount, settlement_id)?;
        Ok(Uuid::new_v4().to_string())
    }

    async fn transfer_client_reserved_funds(
        &self,
        asset: &str,
        amount: Decimal,
        _client_id: &str,
        settlement_id: &str,
    ) -> Result<String> {
        self.record(TransferKind::TransferClient, asset, amount, settlement_id)?;
        Ok(Uuid::new_v4().to_string())
    }

    async fn release_reserved_funds(
        &self,
        asset_id: &str,
        amount: Decimal,
        _client_id: &str,
        settlement_id: &str,
    ) -> Result<()> {
        self.record(TransferKind::Release, asset_id, amount, settlement_id)
    }

    async fn release_client_reserved_funds(
        &self,
        _wallet_id: &str,
        asset: &str,
        amount: Decimal,
        _client_id: &str,
        settlement_id: &str,
    ) -> Result<()> {
        self.record(TransferKind::ReleaseClient, asset, amount, settlement_id)
    }
}

// 10.7: repositories

#[derive(Default)]
pub struct InMemorySettlementRepository {
    settlements: RwLock<BTreeMap<String, Settlement>>,
}

impl InMemorySettlementRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn not_found(id: &str) -> HedgeError {
        HedgeError::EntityNotFound(format!("settlement {}", id))
    }
}

#[async_trait]
impl SettlementRepository for InMemorySettlementRepository {
    async fn get_all(&self) -> Result<Vec<Settlement>> {
        Ok(self.settlements.read().values().cloned().collect())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Settlement>> {
        Ok(self.settlements.read().get(id).cloned())
    }

    async fn get_by_client_id(&self, client_id: &str) -> Result<Vec<Settlement>> {
        Ok(self
            .settlements
            .read()
            .values()
            .filter(|s| s.client_id == client_id)
            .cloned()
            .collect())
    }

    async fn get_by_status(&self, status: SettlementStatus) -> Result<Vec<Settlement>> {
        Ok(self
            .settlements
            .read()
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn insert(&self, settlement: &Settlement) -> Result<()> {
        let mut settlements = self.settlements.write();
        if settlements.contains_key(&settlement.id) {
            return Err(HedgeError::EntityAlreadyExists(format!("settlement {}", settlement.id)));
        }
        settlements.insert(settlement.id.clone(), settlement.clone());
        Ok(())
    }

    async fn replace(&self, settlement: &Settlement) -> Result<()> {
        let mut settlements = self.settlements.write();
        let stored = settlements
            .get_mut(&settlement.id)
            .ok_or_else(|| Self::not_found(&settlement.id))?;
        *stored = settlement.clone();
        Ok(())
    }

    async fn update(&self, settlement: &Settlement) -> Result<()> {
        let mut settlements = self.settlements.write();
        let stored = settlements
            .get_mut(&settlement.id)
            .ok_or_else(|| Self::not_found(&settlement.id))?;
        let assets = std::mem::take(&mut stored.assets);
        *stored = Settlement {
            assets,
            ..settlement.clone()
        };
        Ok(())
    }

    async fn update_asset(&self, asset: &AssetSettlement) -> Result<()> {
        let mut settlements = self.settlements.write();
        let stored = settlements
            .get_mut(&asset.settlement_id)
            .and_then(|s| s.get_asset_mut(&asset.asset_id))
            .ok_or_else(|| {
                HedgeError::EntityNotFound(format!("asset {} of settlement {}", asset.asset_id, asset.settlement_id))
            })?;
        *stored = asset.clone();
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryAssetHedgeSettingsRepository {
    settings: RwLock<BTreeMap<AssetId, AssetHedgeSettings>>,
}

impl InMemoryAssetHedgeSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AssetHedgeSettingsRepository for InMemoryAssetHedgeSettingsRepository {
    async fn get_all(&self) -> Result<Vec<AssetHedgeSettings>> {
        Ok(self.settings.read().values().cloned().collect())
    }

    async fn get_by_asset_id(&self, asset_id: &AssetId) -> Result<Option<AssetHedgeSettings>> {
        Ok(self.settings.read().get(asset_id).cloned())
    }

    async fn insert(&self, settings: &AssetHedgeSettings) -> Result<()> {
        let mut stored = self.settings.write();
        if stored.contains_key(&settings.asset_id) {
            return Err(HedgeError::EntityAlreadyExists(format!(
                "asset hedge settings {}",
                settings.asset_id
            )));
        }
        stored.insert(settings.asset_id.clone(), settings.clone());
        Ok(())
    }

    async fn update(&self, settings: &AssetHedgeSettings) -> Result<()> {
        self.settings
            .write()
            .insert(settings.asset_id.clone(), settings.clone());
        Ok(())
    }
}

// 10.8: exchange

/// Records what the hedge service sends instead of talking to an exchange.
pub struct RecordingExchangeAdapter {
    name: String,
    executed: Mutex<Vec<HedgeLimitOrder>>,
    cancelled: Mutex<Vec<AssetId>>,
}

impl RecordingExchangeAdapter {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            executed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    pub fn executed(&self) -> Vec<HedgeLimitOrder> {
        self.executed.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<AssetId> {
        self.cancelled.lock().clone()
    }

    pub fn clear(&self) {
        self.executed.lock().clear();
        self.cancelled.lock().clear();
    }
}

#[async_trait]
impl ExchangeAdapter for RecordingExchangeAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    async fn execute_limit_order(&self, order: &HedgeLimitOrder) -> Result<()> {
        self.executed.lock().push(order.clone());
        Ok(())
    }

    async fn cancel_limit_order(&self, asset_id: &AssetId) -> Result<()> {
        self.cancelled.lock().push(asset_id.clone());
        Ok(())
    }
}

// 10.9: one of everything, keeping the concrete types so callers can seed and inspect state

pub struct InMemoryBackend {
    pub index_prices: Arc<InMemoryIndexPriceService>,
    pub index_settings: Arc<InMemoryIndexSettingsService>,
    pub tokens: Arc<InMemoryTokenService>,
    pub positions: Arc<InMemoryPositionService>,
    pub internal_trades: Arc<InMemoryInternalTradeService>,
    pub market_maker: Arc<InMemoryMarketMakerService>,
    pub market_maker_state: Arc<InMemoryMarketMakerStateService>,
    pub instruments: Arc<InMemoryInstrumentCatalog>,
    pub balances: Arc<InMemoryBalanceService>,
    pub fund_transfers: Arc<InMemoryFundTransferService>,
    pub settlements: Arc<InMemorySettlementRepository>,
    pub asset_hedge_settings: Arc<InMemoryAssetHedgeSettingsRepository>,
}

impl InMemoryBackend {
    pub fn new(status: MarketMakerStatus) -> Self {
        Self {
            index_prices: Arc::new(InMemoryIndexPriceService::new()),
            index_settings: Arc::new(InMemoryIndexSettingsService::new()),
            tokens: Arc::new(InMemoryTokenService::new()),
            positions: Arc::new(InMemoryPositionService::new()),
            internal_trades: Arc::new(InMemoryInternalTradeService::new()),
            market_maker: Arc::new(InMemoryMarketMakerService::new()),
            market_maker_state: Arc::new(InMemoryMarketMakerStateService::new(status)),
            instruments: Arc::new(InMemoryInstrumentCatalog::new()),
            balances: Arc::new(InMemoryBalanceService::new()),
            fund_transfers: Arc::new(InMemoryFundTransferService::new()),
            settlements: Arc::new(InMemorySettlementRepository::new()),
            asset_hedge_settings: Arc::new(InMemoryAssetHedgeSettingsRepository::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            index_prices: self.index_prices.clone(),
            index_settings: self.index_settings.clone(),
            tokens: self.tokens.clone(),
            positions: self.positions.clone(),
            internal_trades: self.internal_trades.clone(),
            market_maker: self.market_maker.clone(),
            market_maker_state: self.market_maker_state.clone(),
            instruments: self.instruments.clone(),
            balances: self.balances.clone(),
            fund_transfers: self.fund_transfers.clone(),
            settlements: self.settlements.clone(),
            asset_hedge_settings: self.asset_hedge_settings.clone(),
        }
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(MarketMakerStatus::Active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::SettlementError;
    use crate::types::Timestamp;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn injected_failure_is_returned_until_cleared() {
        let transfers = InMemoryFundTransferService::new();
        transfers.fail(TransferKind::Reserve, "ETH", HedgeError::NotEnoughFunds("ETH".into()));

        let eth = AssetId::from("ETH");
        assert!(transfers.reserve_funds(&eth, dec!(1), "s1").await.unwrap_err().is_not_enough_funds());
        assert!(transfers.records().is_empty());

        transfers.clear_failure(TransferKind::Reserve, "ETH");
        transfers.reserve_funds(&eth, dec!(1), "s1").await.unwrap();
        assert_eq!(transfers.records_of(TransferKind::Reserve).len(), 1);
    }

    #[tokio::test]
    async fn settlement_update_keeps_stored_assets() {
        let repo = InMemorySettlementRepository::new();
        let asset = AssetSettlement {
            asset_id: AssetId::from("BTC"),
            settlement_id: "s1".into(),
            amount: dec!(1),
            price: dec!(50000),
            actual_amount: dec!(1),
            actual_price: dec!(50000),
            fee: Decimal::ZERO,
            weight: dec!(1),
            is_direct: false,
            is_external: false,
            status: crate::settlement::AssetSettlementStatus::New,
            error: SettlementError::None,
            transaction_id: None,
        };
        let mut settlement = Settlement {
            id: "s1".into(),
            index_name: "CRYPTO10".into(),
            amount: dec!(1),
            price: dec!(50000),
            wallet_id: "w".into(),
            client_id: "c".into(),
            comment: String::new(),
            is_direct: false,
            status: SettlementStatus::New,
            error: SettlementError::None,
            created_by: "ops".into(),
            created_at: Timestamp::from_millis(0),
            transaction_id: None,
            assets: vec![asset],
        };
        repo.insert(&settlement).await.unwrap();

        settlement.status = SettlementStatus::Approved;
        settlement.assets.clear();
        repo.update(&settlement).await.unwrap();

        let stored = repo.get_by_id("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SettlementStatus::Approved);
        assert_eq!(stored.assets.len(), 1);
        assert_eq!(repo.get_by_status(SettlementStatus::Approved).await.unwrap().len(), 1);
        assert!(repo.insert(&stored).await.is_err());
    }

    #[tokio::test]
    async fn position_close_on_missing_position_is_noop() {
        let positions = InMemoryPositionService::new();
        positions.close(&AssetId::from("BTC"), "kraken", dec!(1), dec!(1)).await.unwrap();
        assert!(positions.get_all().await.unwrap().is_empty());
    }
}
