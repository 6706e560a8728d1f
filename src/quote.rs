//! Quote store.
//!
//! Holds the latest quote per (source, asset pair) and derives the composite
//! quote of the virtual exchange from index constituent prices. Reads take a
//! shared lock and never suspend; a quote is swapped in whole, so readers always
//! see a fully-formed snapshot.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::QuoteThresholdSettings;
use crate::error::Result;
use crate::index::Index;
use crate::services::InstrumentCatalog;
use crate::types::{AssetPairId, Side, Timestamp, VIRTUAL_EXCHANGE};

/// A market snapshot from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub source: String,
    pub asset_pair_id: AssetPairId,
    pub timestamp: Timestamp,
    pub bid: Decimal,
    pub ask: Decimal,
    pub mid: Decimal,
}

impl Quote {
    pub fn new(
        source: impl Into<String>,
        asset_pair_id: AssetPairId,
        timestamp: Timestamp,
        bid: Decimal,
        ask: Decimal,
    ) -> Self {
        Self {
            source: source.into(),
            asset_pair_id,
            timestamp,
            bid,
            ask,
            mid: (bid + ask) / Decimal::TWO,
        }
    }

    // bid = ask = mid, used for prices that carry no spread
    pub fn flat(source: impl Into<String>, asset_pair_id: AssetPairId, timestamp: Timestamp, price: Decimal) -> Self {
        Self {
            source: source.into(),
            asset_pair_id,
            timestamp,
            bid: price,
            ask: price,
            mid: price,
        }
    }

    /// Resting price on the order's own side of the book: asks for sells, bids for buys.
    pub fn touch(&self, side: Side) -> Decimal {
        match side {
            Side::Sell => self.ask,
            Side::Buy => self.bid,
        }
    }

    /// Price that crosses the spread for the given side.
    pub fn opposite_touch(&self, side: Side) -> Decimal {
        self.touch(side.opposite())
    }

    pub fn has_zero_price(&self) -> bool {
        self.bid.is_zero() || self.ask.is_zero() || self.mid.is_zero()
    }

    pub fn relative_deviation(&self, mid: Decimal) -> Decimal {
        if self.mid.is_zero() {
            return Decimal::ZERO;
        }
        (self.mid - mid).abs() / self.mid
    }
}

/// Outcome of [`QuoteStore::update`]. Anything but `Applied` leaves the store untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuoteUpdate {
    Applied,
    UnknownAssetPair,
    InvalidPrices,
    ExcessiveDeviation,
}

type QuoteKey = (String, AssetPairId);

pub struct QuoteStore {
    catalog: Arc<dyn InstrumentCatalog>,
    threshold: RwLock<QuoteThresholdSettings>,
    quotes: RwLock<HashMap<QuoteKey, Quote>>,
    // constituent prices per (index name, pair), averaged for the virtual exchange
    index_quotes: RwLock<HashMap<QuoteKey, Quote>>,
    exchanges: RwLock<BTreeSet<String>>,
}

impl QuoteStore {
    pub fn new(catalog: Arc<dyn InstrumentCatalog>, threshold: QuoteThresholdSettings) -> Self {
        Self {
            catalog,
            threshold: RwLock::new(threshold),
            quotes: RwLock::new(HashMap::new()),
            index_quotes: RwLock::new(HashMap::new()),
            exchanges: RwLock::new(BTreeSet::new()),
        }
    }

    pub fn threshold(&self) -> QuoteThresholdSettings {
        self.threshold.read().clone()
    }

    pub fn set_threshold(&self, settings: QuoteThresholdSettings) {
        info!(enabled = settings.enabled, value = %settings.value, "quote threshold updated");
        *self.threshold.write() = settings;
    }

    pub async fn update(&self, quote: Quote) -> Result<QuoteUpdate> {
        if !self.catalog.is_asset_pair_exists(&quote.asset_pair_id).await? {
            debug!(source = %quote.source, pair = %quote.asset_pair_id, "quote for unknown asset pair ignored");
            return Ok(QuoteUpdate::UnknownAssetPair);
        }

        if quote.has_zero_price() {
            warn!(?quote, "invalid quote received");
            return Ok(QuoteUpdate::InvalidPrices);
        }

        let threshold = self.threshold();
        let key = (quote.source.clone(), quote.asset_pair_id.clone());

        let mut quotes = self.quotes.write();

        if let Some(current) = quotes.get(&key) {
            if threshold.enabled && current.relative_deviation(quote.mid) > threshold.value {
                warn!(
                    ?quote,
                    current_mid = %current.mid,
                    threshold = %threshold.value,
                    "quote rejected: mid deviates beyond threshold"
                );
                return Ok(QuoteUpdate::ExcessiveDeviation);
            }
        }

        self.exchanges.write().insert(quote.source.clone());
        quotes.insert(key, quote);

        Ok(QuoteUpdate::Applied)
    }

    /// Cache one synthetic quote per constituent of the index, tagged with the index name.
    pub fn handle_index(&self, index: &Index) {
        let mut index_quotes = self.index_quotes.write();

        for weight in &index.weights {
            let quote = Quote::flat(index.name.clone(), weight.asset_id.usd_pair(), index.timestamp, weight.price);
            index_quotes.insert((index.name.clone(), quote.asset_pair_id.clone()), quote);
        }

        self.exchanges.write().insert(VIRTUAL_EXCHANGE.to_string());
    }

    pub fn get(&self, source: &str, asset_pair_id: &AssetPairId) -> Option<Quote> {
        if source == VIRTUAL_EXCHANGE {
            return self.virtual_quote(asset_pair_id);
        }

        self.quotes
            .read()
            .get(&(source.to_string(), asset_pair_id.clone()))
            .cloned()
    }

    fn virtual_quote(&self, asset_pair_id: &AssetPairId) -> Option<Quote> {
        let index_quotes = self.index_quotes.read();

        let matching: Vec<&Quote> = index_quotes
            .values()
            .filter(|q| &q.asset_pair_id == asset_pair_id)
            .collect();

        if matching.is_empty() {
            return None;
        }

        let sum: Decimal = matching.iter().map(|q| q.mid).sum();
        let mid = sum / Decimal::from(matching.len());
        let timestamp = matching.iter().map(|q| q.timestamp).max()?;

        Some(Quote::flat(VIRTUAL_EXCHANGE, asset_pair_id.clone(), timestamp, mid))
    }

    pub fn get_all(&self) -> Vec<Quote> {
        let mut all: Vec<Quote> = self.quotes.read().values().cloned().collect();
        all.sort_by(|a, b| (&a.source, &a.asset_pair_id).cmp(&(&b.source, &b.asset_pair_id)));
        all
    }

    pub fn exchanges(&self) -> Vec<String> {
        self.exchanges.read().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::AssetWeight;
    use crate::memory::InMemoryInstrumentCatalog;
    use rust_decimal_macros::dec;

    fn store(threshold: QuoteThresholdSettings) -> QuoteStore {
        let catalog = InMemoryInstrumentCatalog::new();
        catalog.add_asset_pair("BTCUSD");
        catalog.add_asset_pair("ETHUSD");
        QuoteStore::new(Arc::new(catalog), threshold)
    }

    fn btc(mid: Decimal) -> Quote {
        Quote::new("binance", "BTCUSD".into(), Timestamp::from_millis(1), mid - dec!(1), mid + dec!(1))
    }

    #[tokio::test]
    async fn test_update_and_get() {
        let store = store(QuoteThresholdSettings::default());
        assert_eq!(store.update(btc(dec!(50000))).await.unwrap(), QuoteUpdate::Applied);

        let quote = store.get("binance", &"BTCUSD".into()).unwrap();
        assert_eq!(quote.mid, dec!(50000));
        assert_eq!(store.exchanges(), vec!["binance".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_pair_ignored() {
        let store = store(QuoteThresholdSettings::default());
        let quote = Quote::new("binance", "DOGEUSD".into(), Timestamp::from_millis(1), dec!(1), dec!(2));
        assert_eq!(store.update(quote).await.unwrap(), QuoteUpdate::UnknownAssetPair);
        assert!(store.get_all().is_empty());
        assert!(store.exchanges().is_empty());
    }

    #[tokio::test]
    async fn test_zero_price_rejected() {
        let store = store(QuoteThresholdSettings::default());
        let quote = Quote::new("binance", "BTCUSD".into(), Timestamp::from_millis(1), dec!(0), dec!(2));
        assert_eq!(store.update(quote).await.unwrap(), QuoteUpdate::InvalidPrices);
        assert!(store.get("binance", &"BTCUSD".into()).is_none());
    }

    #[tokio::test]
    async fn test_deviation_guard() {
        let store = store(QuoteThresholdSettings { enabled: true, value: dec!(0.1) });
        store.update(btc(dec!(50000))).await.unwrap();

        // 20% jump is a bad tick
        assert_eq!(store.update(btc(dec!(60000))).await.unwrap(), QuoteUpdate::ExcessiveDeviation);
        assert_eq!(store.get("binance", &"BTCUSD".into()).unwrap().mid, dec!(50000));

        // 5% is fine
        assert_eq!(store.update(btc(dec!(52500))).await.unwrap(), QuoteUpdate::Applied);
    }

    #[tokio::test]
    async fn test_deviation_guard_disabled() {
        let store = store(QuoteThresholdSettings { enabled: false, value: dec!(0.1) });
        store.update(btc(dec!(50000))).await.unwrap();
        assert_eq!(store.update(btc(dec!(90000))).await.unwrap(), QuoteUpdate::Applied);
    }

    #[tokio::test]
    async fn test_set_threshold_applies_to_next_update() {
        let store = store(QuoteThresholdSettings { enabled: true, value: dec!(0.1) });
        store.update(btc(dec!(50000))).await.unwrap();
        assert_eq!(store.update(btc(dec!(60000))).await.unwrap(), QuoteUpdate::ExcessiveDeviation);

        store.set_threshold(QuoteThresholdSettings { enabled: true, value: dec!(0.25) });
        assert_eq!(store.threshold().value, dec!(0.25));
        assert_eq!(store.update(btc(dec!(60000))).await.unwrap(), QuoteUpdate::Applied);

        // 60000 -> 45000 is 25%, not above the bound
        assert_eq!(store.update(btc(dec!(45000))).await.unwrap(), QuoteUpdate::Applied);

        store.set_threshold(QuoteThresholdSettings { enabled: true, value: dec!(0.01) });
        assert_eq!(store.update(btc(dec!(46000))).await.unwrap(), QuoteUpdate::ExcessiveDeviation);
        assert_eq!(store.get("binance", &"BTCUSD".into()).unwrap().mid, dec!(45000));
    }

    #[test]
    fn test_virtual_quote_averages_indices() {
        let store = store(QuoteThresholdSettings::default());
        assert!(store.get(VIRTUAL_EXCHANGE, &"BTCUSD".into()).is_none());

        let weights = |price| vec![AssetWeight::new("BTC", dec!(1), price)];
        store.handle_index(&Index::new("CRYPTO10", Timestamp::from_millis(10), dec!(100), weights(dec!(50000))));
        store.handle_index(&Index::new("CRYPTO5", Timestamp::from_millis(20), dec!(100), weights(dec!(51000))));

        let quote = store.get(VIRTUAL_EXCHANGE, &"BTCUSD".into()).unwrap();
        assert_eq!(quote.mid, dec!(50500));
        assert_eq!(quote.bid, quote.ask);
        assert_eq!(quote.timestamp, Timestamp::from_millis(20));
        assert!(store.exchanges().contains(&VIRTUAL_EXCHANGE.to_string()));
    }

    #[test]
    fn test_touch_prices() {
        let quote = btc(dec!(100));
        assert_eq!(quote.touch(Side::Sell), dec!(101));
        assert_eq!(quote.touch(Side::Buy), dec!(99));
        assert_eq!(quote.opposite_touch(Side::Sell), dec!(99));
    }
}
