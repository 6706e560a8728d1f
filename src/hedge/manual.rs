//! Operator actions. Every rule violation is reported as `InvalidOperation`
//! so the operator gets immediate feedback.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::info;

use super::HedgeService;
use crate::error::{HedgeError, Result};
use crate::exchange::ExchangeAdapter;
use crate::hedge_settings::{AssetHedgeMode, AssetHedgeSettings};
use crate::order::HedgeLimitOrder;
use crate::pricing::PriceType;
use crate::types::{AssetId, Side};

impl HedgeService {
    async fn settings_for(&self, asset_id: &AssetId, exchange: &str) -> Result<AssetHedgeSettings> {
        self.asset_hedge_settings
            .get_by_asset_and_exchange(asset_id, exchange)
            .await?
            .ok_or_else(|| HedgeError::invalid_operation("asset hedge settings not found"))
    }

    fn adapter_for(&self, settings: &AssetHedgeSettings) -> Result<Arc<dyn ExchangeAdapter>> {
        self.exchanges
            .get(&settings.exchange)
            .ok_or_else(|| HedgeError::invalid_operation(format!("there is no exchange adapter for {}", settings.exchange)))
    }

    /// Only for assets in Manual mode.
    pub async fn create_limit_order(
        &self,
        asset_id: &AssetId,
        exchange: &str,
        side: Side,
        price: Decimal,
        volume: Decimal,
        user_id: &str,
    ) -> Result<HedgeLimitOrder> {
        let settings = self.settings_for(asset_id, exchange).await?;

        if settings.mode != AssetHedgeMode::Manual {
            return Err(HedgeError::invalid_operation("asset hedge settings mode should be 'Manual'"));
        }

        if price <= Decimal::ZERO || volume <= Decimal::ZERO {
            return Err(HedgeError::invalid_operation("price and volume must be positive"));
        }

        let adapter = self.adapter_for(&settings)?;

        let order = HedgeLimitOrder::create(
            settings.exchange.clone(),
            settings.asset_id.clone(),
            settings.asset_pair_id.clone(),
            side,
            PriceType::Limit,
            price,
            volume,
        )
        .with_context(serde_json::json!({
            "price": price,
            "volume": volume,
            "user_id": user_id,
        }));

        info!(order_id = %order.id, asset = %asset_id, exchange, %side, %price, %volume, user_id, "manual hedge limit order created");

        adapter.execute_limit_order(&order).await?;
        Ok(order)
    }

    pub async fn cancel_limit_order(&self, asset_id: &AssetId, exchange: &str, user_id: &str) -> Result<()> {
        let settings = self.settings_for(asset_id, exchange).await?;
        let adapter = self.adapter_for(&settings)?;

        info!(asset = %asset_id, exchange, user_id, "hedge limit order cancelled by user");

        adapter.cancel_limit_order(asset_id).await
    }

    /// Flattens the position with a limit order resting at the same-side touch.
    pub async fn close_position(&self, asset_id: &AssetId, exchange: &str, user_id: &str) -> Result<HedgeLimitOrder> {
        let position = self
            .positions
            .get_by_asset_id(asset_id, exchange)
            .await?
            .ok_or_else(|| HedgeError::invalid_operation("position not found"))?;

        let settings = self.settings_for(asset_id, exchange).await?;

        if settings.mode == AssetHedgeMode::Auto {
            return Err(HedgeError::invalid_operation(
                "can not close position while asset hedge settings mode is 'Auto'",
            ));
        }

        let adapter = self.adapter_for(&settings)?;

        let quote = self
            .quotes
            .get(&settings.exchange, &settings.asset_pair_id)
            .ok_or_else(|| HedgeError::invalid_operation("no quote"))?;

        if position.is_empty() {
            return Err(HedgeError::invalid_operation("position is already flat"));
        }

        let side = Side::closing(position.volume);

        let order = HedgeLimitOrder::create(
            settings.exchange.clone(),
            settings.asset_id.clone(),
            settings.asset_pair_id.clone(),
            side,
            PriceType::Limit,
            quote.touch(side),
            position.volume.abs(),
        )
        .with_context(serde_json::json!({ "user_id": user_id }));

        info!(order_id = %order.id, asset = %asset_id, exchange, %side, price = %order.price, volume = %order.volume, user_id, "hedge limit order created to close position");

        adapter.execute_limit_order(&order).await?;
        Ok(order)
    }
}
