//! Hedge limit orders.
//!
//! Built fresh every hedge cycle, one per asset at most. Once handed to an
//! exchange adapter an order is never touched again; before that only its
//! error may be set, which keeps it from being dispatched.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pricing::PriceType;
use crate::types::{AssetId, AssetPairId, Side, Timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitOrderError {
    None,
    Unknown,
    /// Volume under the asset's configured minimum.
    TooSmallVolume,
}

impl Default for LimitOrderError {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeLimitOrder {
    pub id: String,
    pub exchange: String,
    pub asset_id: AssetId,
    pub asset_pair_id: AssetPairId,
    pub side: Side,
    pub price_type: PriceType,
    pub price: Decimal,
    pub volume: Decimal,
    pub timestamp: Timestamp,
    pub error: LimitOrderError,
    pub error_message: Option<String>,
    /// Audit payload: the investment snapshot or the operator request behind the order.
    pub context: Option<serde_json::Value>,
}

impl HedgeLimitOrder {
    pub fn create(
        exchange: impl Into<String>,
        asset_id: AssetId,
        asset_pair_id: AssetPairId,
        side: Side,
        price_type: PriceType,
        price: Decimal,
        volume: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            exchange: exchange.into(),
            asset_id,
            asset_pair_id,
            side,
            price_type,
            price,
            volume,
            timestamp: Timestamp::now(),
            error: LimitOrderError::None,
            error_message: None,
            context: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn set_error(&mut self, error: LimitOrderError, message: impl Into<String>) {
        self.error = error;
        self.error_message = Some(message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.error == LimitOrderError::None
    }

    pub fn usd_volume(&self) -> Decimal {
        self.price * self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order() -> HedgeLimitOrder {
        HedgeLimitOrder::create(
            "kraken",
            AssetId::from("BTC"),
            AssetPairId::from("XBTUSD"),
            Side::Sell,
            PriceType::Limit,
            dec!(50000),
            dec!(0.5),
        )
    }

    #[test]
    fn test_new_order_is_valid() {
        let order = order();
        assert!(order.is_valid());
        assert_eq!(order.usd_volume(), dec!(25000));
        assert!(Uuid::parse_str(&order.id).is_ok());
        assert_ne!(order.id, self::order().id);
    }

    #[test]
    fn test_error_blocks_dispatch() {
        let mut order = order();
        order.set_error(LimitOrderError::Unknown, "large price deviation");
        assert!(!order.is_valid());
        assert_eq!(order.error_message.as_deref(), Some("large price deviation"));
    }

    #[test]
    fn test_context_serializes() {
        let order = order().with_context(serde_json::json!({ "user_id": "ops" }));
        let json = serde_json::to_value(&order).unwrap();
        assert_eq!(json["context"]["user_id"], "ops");
        assert_eq!(json["side"], "Sell");
    }
}
