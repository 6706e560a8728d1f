// 4.0 index.rs: index events, index settings, price snapshots, token inventory, internal trades,
// market maker status. everything the hedge cycle reads about the index side of the book.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{AssetId, AssetPairId, Side, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetWeight {
    pub asset_id: AssetId,
    pub weight: Decimal,
    // constituent price in USD at the time of the index tick
    pub price: Decimal,
}

impl AssetWeight {
    pub fn new(asset_id: impl Into<String>, weight: Decimal, price: Decimal) -> Self {
        Self {
            asset_id: AssetId::new(asset_id),
            weight,
            price,
        }
    }
}

/// Inbound index tick from the index provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub timestamp: Timestamp,
    pub value: Decimal,
    pub weights: Vec<AssetWeight>,
}

impl Index {
    pub fn new(name: impl Into<String>, timestamp: Timestamp, value: Decimal, weights: Vec<AssetWeight>) -> Self {
        Self {
            name: name.into(),
            timestamp,
            value,
            weights,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSettings {
    pub name: String,
    /// Asset of the index token.
    pub asset_id: AssetId,
    /// Pair the market maker quotes the index token on.
    pub asset_pair_id: AssetPairId,
    /// Short indices move against their constituents.
    pub is_short: bool,
}

impl IndexSettings {
    pub fn exposure_sign(&self) -> Decimal {
        if self.is_short {
            Decimal::NEGATIVE_ONE
        } else {
            Decimal::ONE
        }
    }
}

/// Index token price derived from the latest tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexPrice {
    pub name: String,
    pub value: Decimal,
    pub price: Decimal,
    pub timestamp: Timestamp,
    pub weights: Vec<AssetWeight>,
}

impl IndexPrice {
    pub fn from_index(index: &Index) -> Self {
        Self {
            name: index.name.clone(),
            value: index.value,
            price: index.value,
            timestamp: index.timestamp,
            weights: index.weights.clone(),
        }
    }

    pub fn validate_value(&self) -> bool {
        self.value > Decimal::ZERO && self.price > Decimal::ZERO
    }

    pub fn validate_weights(&self, tolerance: Decimal) -> bool {
        if self.weights.is_empty() || self.weights.iter().any(|w| w.weight < Decimal::ZERO) {
            return false;
        }
        let total: Decimal = self.weights.iter().map(|w| w.weight).sum();
        (total - Decimal::ONE).abs() <= tolerance
    }

    pub fn weight_of(&self, asset_id: &AssetId) -> Decimal {
        self.weights
            .iter()
            .filter(|w| &w.asset_id == asset_id)
            .map(|w| w.weight)
            .sum()
    }
}

/// Index token inventory of the market maker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub asset_id: AssetId,
    pub open_volume: Decimal,
    // USD paid (negative) or received (positive) for the open volume
    pub opposite_volume: Decimal,
}

impl Token {
    pub fn new(asset_id: AssetId) -> Self {
        Self {
            asset_id,
            open_volume: Decimal::ZERO,
            opposite_volume: Decimal::ZERO,
        }
    }

    pub fn update_volume(&mut self, trade: &InternalTrade) {
        self.open_volume += trade.side.sign() * trade.volume;
        self.opposite_volume -= trade.side.sign() * trade.opposite_volume;
    }

    // redeemed tokens leave the inventory at the settlement price
    pub fn close(&mut self, volume: Decimal, price: Decimal) {
        self.open_volume -= volume;
        self.opposite_volume += volume * price;
    }
}

/// Fill of a market maker order on an index pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternalTrade {
    pub id: String,
    pub limit_order_id: String,
    pub asset_pair_id: AssetPairId,
    pub side: Side,
    pub timestamp: Timestamp,
    pub price: Decimal,
    pub volume: Decimal,
    pub opposite_volume: Decimal,
}

impl InternalTrade {
    pub fn new(
        id: impl Into<String>,
        asset_pair_id: AssetPairId,
        side: Side,
        price: Decimal,
        volume: Decimal,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            limit_order_id: String::new(),
            asset_pair_id,
            side,
            timestamp,
            price,
            volume,
            opposite_volume: price * volume,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketMakerStatus {
    None,
    Active,
    Paused,
    Disabled,
}

impl Default for MarketMakerStatus {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketMakerState {
    pub status: MarketMakerStatus,
    pub comment: String,
    pub user_id: String,
    pub timestamp: Timestamp,
}

impl MarketMakerState {
    pub fn new(status: MarketMakerStatus, comment: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            status,
            comment: comment.into(),
            user_id: user_id.into(),
            timestamp: Timestamp::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == MarketMakerStatus::Active
    }
}
