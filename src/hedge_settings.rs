// 3.0 hedge_settings.rs: per-asset hedging mode, exchange and pair mapping.
// 3.1 entries are auto-created (Disabled, unapproved) the first time an asset shows up, and never
// removed behind the operator's back.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::error::{HedgeError, Result};
use crate::services::AssetHedgeSettingsRepository;
use crate::types::{AssetId, AssetPairId, VIRTUAL_EXCHANGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetHedgeMode {
    None,
    /// Hedging not allowed.
    Disabled,
    /// Orders are calculated but never sent.
    Idle,
    /// Only operator orders.
    Manual,
    /// Orders are calculated and sent every cycle.
    Auto,
}

impl AssetHedgeMode {
    pub fn computes_orders(&self) -> bool {
        matches!(self, AssetHedgeMode::Auto | AssetHedgeMode::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetHedgeSettings {
    pub asset_id: AssetId,
    pub exchange: String,
    /// Pair on the hedge exchange.
    pub asset_pair_id: AssetPairId,
    pub min_volume: Decimal,
    pub volume_accuracy: u32,
    pub price_accuracy: u32,
    pub mode: AssetHedgeMode,
    pub approved: bool,
    pub reference_exchange: Option<String>,
    /// Max relative distance from the reference mid (0.05 = 5%).
    pub reference_delta: Option<Decimal>,
}

impl AssetHedgeSettings {
    pub fn default_for(asset_id: &AssetId) -> Self {
        Self {
            asset_id: asset_id.clone(),
            exchange: VIRTUAL_EXCHANGE.to_string(),
            asset_pair_id: asset_id.usd_pair(),
            min_volume: Decimal::ZERO,
            volume_accuracy: 8,
            price_accuracy: 8,
            mode: AssetHedgeMode::Disabled,
            approved: false,
            reference_exchange: None,
            reference_delta: None,
        }
    }

    pub fn reference(&self) -> Option<(&str, Decimal)> {
        match (&self.reference_exchange, self.reference_delta) {
            (Some(exchange), Some(delta)) if !exchange.is_empty() => Some((exchange.as_str(), delta)),
            _ => None,
        }
    }
}

/// Write-through cache in front of the settings repository.
pub struct AssetHedgeSettingsService {
    repository: Arc<dyn AssetHedgeSettingsRepository>,
    cache: RwLock<Option<HashMap<AssetId, AssetHedgeSettings>>>,
}

impl AssetHedgeSettingsService {
    pub fn new(repository: Arc<dyn AssetHedgeSettingsRepository>) -> Self {
        Self {
            repository,
            cache: RwLock::new(None),
        }
    }

    async fn load(&self) -> Result<HashMap<AssetId, AssetHedgeSettings>> {
        let cached = self.cache.read().clone();
        if let Some(cached) = cached {
            return Ok(cached);
        }

        let all: HashMap<AssetId, AssetHedgeSettings> = self
            .repository
            .get_all()
            .await?
            .into_iter()
            .map(|s| (s.asset_id.clone(), s))
            .collect();

        *self.cache.write() = Some(all.clone());
        Ok(all)
    }

    fn cache_put(&self, settings: AssetHedgeSettings) {
        if let Some(cached) = self.cache.write().as_mut() {
            cached.insert(settings.asset_id.clone(), settings);
        }
    }

    pub async fn get_all(&self) -> Result<Vec<AssetHedgeSettings>> {
        let mut all: Vec<AssetHedgeSettings> = self.load().await?.into_values().collect();
        all.sort_by(|a, b| a.asset_id.cmp(&b.asset_id));
        Ok(all)
    }

    pub async fn get_by_asset_id(&self, asset_id: &AssetId) -> Result<Option<AssetHedgeSettings>> {
        Ok(self.load().await?.get(asset_id).cloned())
    }

    // only when the asset is hedged on that exchange
    pub async fn get_by_asset_and_exchange(
        &self,
        asset_id: &AssetId,
        exchange: &str,
    ) -> Result<Option<AssetHedgeSettings>> {
        Ok(self
            .get_by_asset_id(asset_id)
            .await?
            .filter(|s| s.exchange == exchange))
    }

    pub async fn ensure(&self, asset_id: &AssetId) -> Result<AssetHedgeSettings> {
        if let Some(existing) = self.get_by_asset_id(asset_id).await? {
            return Ok(existing);
        }

        let settings = AssetHedgeSettings::default_for(asset_id);

        match self.repository.insert(&settings).await {
            Ok(()) => {
                info!(asset = %asset_id, exchange = %settings.exchange, "asset hedge settings created");
                self.cache_put(settings.clone());
                Ok(settings)
            }
            Err(HedgeError::EntityAlreadyExists(_)) => {
                // lost a race with another writer, take theirs
                let stored = self
                    .repository
                    .get_by_asset_id(asset_id)
                    .await?
                    .ok_or_else(|| HedgeError::EntityNotFound(format!("asset hedge settings {}", asset_id)))?;
                self.cache_put(stored.clone());
                Ok(stored)
            }
            Err(e) => Err(e),
        }
    }

    /// Operator edit. Saving marks the entry approved.
    pub async fn update(&self, mut settings: AssetHedgeSettings) -> Result<()> {
        if self.get_by_asset_id(&settings.asset_id).await?.is_none() {
            return Err(HedgeError::EntityNotFound(format!("asset hedge settings {}", settings.asset_id)));
        }

        settings.approved = true;
        self.repository.update(&settings).await?;
        info!(asset = %settings.asset_id, mode = ?settings.mode, exchange = %settings.exchange, "asset hedge settings updated");
        self.cache_put(settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryAssetHedgeSettingsRepository;
    use rust_decimal_macros::dec;

    fn service() -> (AssetHedgeSettingsService, Arc<InMemoryAssetHedgeSettingsRepository>) {
        let repo = Arc::new(InMemoryAssetHedgeSettingsRepository::new());
        (AssetHedgeSettingsService::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn ensure_creates_disabled_entry_once() {
        let (service, repo) = service();
        let btc = AssetId::from("BTC");

        let created = service.ensure(&btc).await.unwrap();
        assert_eq!(created.mode, AssetHedgeMode::Disabled);
        assert!(!created.approved);
        assert_eq!(created.exchange, VIRTUAL_EXCHANGE);
        assert_eq!(created.asset_pair_id, AssetPairId::from("BTCUSD"));

        let again = service.ensure(&btc).await.unwrap();
        assert_eq!(again, created);
        assert_eq!(repo.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn ensure_keeps_existing_configuration() {
        let (service, repo) = service();
        let mut eth = AssetHedgeSettings::default_for(&AssetId::from("ETH"));
        eth.mode = AssetHedgeMode::Auto;
        eth.exchange = "kraken".into();
        repo.insert(&eth).await.unwrap();

        let ensured = service.ensure(&AssetId::from("ETH")).await.unwrap();
        assert_eq!(ensured.mode, AssetHedgeMode::Auto);
        assert_eq!(ensured.exchange, "kraken");
    }

    #[tokio::test]
    async fn update_marks_approved() {
        let (service, _) = service();
        let mut settings = service.ensure(&AssetId::from("BTC")).await.unwrap();
        settings.mode = AssetHedgeMode::Auto;
        settings.reference_exchange = Some("bitstamp".into());
        settings.reference_delta = Some(dec!(0.05));
        service.update(settings).await.unwrap();

        let stored = service.get_by_asset_id(&AssetId::from("BTC")).await.unwrap().unwrap();
        assert!(stored.approved);
        assert_eq!(stored.reference(), Some(("bitstamp", dec!(0.05))));
    }

    #[tokio::test]
    async fn update_unknown_asset_fails() {
        let (service, _) = service();
        let settings = AssetHedgeSettings::default_for(&AssetId::from("XRP"));
        assert!(matches!(service.update(settings).await, Err(HedgeError::EntityNotFound(_))));
    }

    #[tokio::test]
    async fn lookup_by_exchange_filters() {
        let (service, _) = service();
        service.ensure(&AssetId::from("BTC")).await.unwrap();
        let btc = AssetId::from("BTC");
        assert!(service.get_by_asset_and_exchange(&btc, VIRTUAL_EXCHANGE).await.unwrap().is_some());
        assert!(service.get_by_asset_and_exchange(&btc, "kraken").await.unwrap().is_none());
    }
}
