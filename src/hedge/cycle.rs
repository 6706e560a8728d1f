//! Full pricing cycle: validate index data, compute exposure, build, check
//! and dispatch one hedge order per asset.

use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

use super::HedgeService;
use crate::config::HedgeSettings;
use crate::error::Result;
use crate::health::HealthIssueKind;
use crate::hedge_settings::AssetHedgeMode;
use crate::index::{IndexPrice, IndexSettings};
use crate::investment::{self, AssetInvestment, InvestmentInput};
use crate::order::{HedgeLimitOrder, LimitOrderError};
use crate::position::Position;
use crate::pricing::round_volume;
use crate::quote::Quote;
use crate::types::{AssetId, VIRTUAL_EXCHANGE};

impl HedgeService {
    pub async fn update_limit_orders(&self) -> Result<()> {
        let index_prices = self.index_prices.get_all().await?;
        let indices = self.index_settings.get_all().await?;

        if !self.validate_index_prices(&indices, &index_prices) {
            return Ok(());
        }

        let tokens = self.tokens.get_all().await?;
        let positions = self.positions.get_all().await?;

        let assets = asset_universe(&indices, &index_prices, &positions);
        let quotes = self.asset_quotes(&assets).await?;

        let investments = investment::calculate(&InvestmentInput {
            assets: &assets,
            indices: &indices,
            tokens: &tokens,
            index_prices: &index_prices,
            positions: &positions,
            quotes: &quotes,
        });

        info!(count = investments.len(), investments = ?investments, "investments calculated");

        let settings = self.settings();
        let mut orders = self.create_limit_orders(&investments, &settings).await?;
        self.validate_limit_orders(&mut orders).await?;

        info!(count = orders.len(), orders = ?orders, "hedge limit orders calculated");

        *self.latest_investments.write() = investments;
        *self.latest_limit_orders.write() = orders.clone();

        self.apply_limit_orders(&assets, &orders).await
    }

    // 8.1: every configured index needs a sane snapshot, otherwise the whole cycle is skipped
    fn validate_index_prices(&self, indices: &[IndexSettings], prices: &[IndexPrice]) -> bool {
        let mut valid = true;

        for settings in indices {
            match prices.iter().find(|p| p.name == settings.name) {
                None => {
                    warn!(index = %settings.name, "index price not found");
                    valid = false;
                }
                Some(price) if !price.validate_value() => {
                    warn!(index = %price.name, value = %price.value, price = %price.price, "invalid index price");
                    valid = false;
                }
                Some(price) if !price.validate_weights(self.weight_tolerance) => {
                    warn!(index = %price.name, weights = ?price.weights, "invalid index price weights");
                    valid = false;
                }
                Some(_) => {}
            }
        }

        valid
    }

    async fn asset_quotes(&self, assets: &[AssetId]) -> Result<HashMap<AssetId, Quote>> {
        let mut quotes = HashMap::new();

        for asset_id in assets {
            let settings = self.asset_hedge_settings.ensure(asset_id).await?;

            if let Some(quote) = self.quotes.get(&settings.exchange, &settings.asset_pair_id) {
                quotes.insert(asset_id.clone(), quote);
            }
        }

        Ok(quotes)
    }

    async fn create_limit_orders(
        &self,
        investments: &[AssetInvestment],
        hedge: &HedgeSettings,
    ) -> Result<Vec<HedgeLimitOrder>> {
        let policy = self.policy(&hedge.pricing_policy)?;
        let mut orders = Vec::new();

        for investment in investments {
            if investment.is_disabled || investment.remaining_amount.is_zero() {
                continue;
            }

            let settings = self.asset_hedge_settings.ensure(&investment.asset_id).await?;
            let amount = investment.remaining_amount.abs();

            // the virtual exchange has no minimum
            if settings.exchange != VIRTUAL_EXCHANGE && amount < hedge.threshold_down {
                continue;
            }

            if !settings.mode.computes_orders() {
                continue;
            }

            let (Some(quote), Some(volume)) = (investment.quote.as_ref(), investment.volume()) else {
                continue;
            };

            let side = investment.side();
            let price = policy.calculate(quote, amount, side, &settings, hedge);
            let volume = round_volume(volume, settings.volume_accuracy);

            let mut order = HedgeLimitOrder::create(
                settings.exchange.clone(),
                settings.asset_id.clone(),
                settings.asset_pair_id.clone(),
                side,
                price.price_type,
                price.price,
                volume,
            );
            order.context = serde_json::to_value(investment).ok();

            if volume.is_zero() || volume < settings.min_volume {
                order.set_error(LimitOrderError::TooSmallVolume, format!("volume below minimum {}", settings.min_volume));
            }

            orders.push(order);
        }

        Ok(orders)
    }

    // 8.2: an order too far from the reference market is flagged, never adjusted
    async fn validate_limit_orders(&self, orders: &mut [HedgeLimitOrder]) -> Result<()> {
        for order in orders.iter_mut().filter(|o| o.is_valid()) {
            let Some(settings) = self.asset_hedge_settings.get_by_asset_id(&order.asset_id).await? else {
                continue;
            };
            let Some((exchange, delta)) = settings.reference() else {
                continue;
            };

            let Some(reference) = self.quotes.get(exchange, &settings.asset_pair_id) else {
                warn!(exchange, pair = %settings.asset_pair_id, "no reference quote");
                continue;
            };

            if reference.relative_deviation(order.price) > delta {
                order.set_error(LimitOrderError::Unknown, "large price deviation");
                warn!(
                    asset = %order.asset_id,
                    price = %order.price,
                    reference_mid = %reference.mid,
                    delta = %delta,
                    "hedge limit order deviates from reference market"
                );
            }
        }

        Ok(())
    }

    async fn apply_limit_orders(&self, assets: &[AssetId], orders: &[HedgeLimitOrder]) -> Result<()> {
        for asset_id in assets {
            let Some(settings) = self.asset_hedge_settings.get_by_asset_id(asset_id).await? else {
                continue;
            };

            let order = orders.iter().find(|o| &o.asset_id == asset_id);

            let Some(adapter) = self.exchanges.get(&settings.exchange) else {
                if let Some(order) = order {
                    warn!(asset = %asset_id, exchange = %settings.exchange, order_id = %order.id, "there is no exchange adapter");
                    self.health.raise(
                        HealthIssueKind::MissingExchangeAdapter,
                        settings.exchange.clone(),
                        format!("no adapter for hedge order on {}", asset_id),
                    );
                }
                continue;
            };

            match order.filter(|o| o.is_valid()) {
                Some(order) if settings.mode == AssetHedgeMode::Auto => {
                    adapter.execute_limit_order(order).await?;
                }
                // idle: calculated, never sent
                Some(_) => {
                    debug!(asset = %asset_id, mode = ?settings.mode, "hedge limit order not dispatched");
                }
                None if settings.mode != AssetHedgeMode::Manual => {
                    adapter.cancel_limit_order(asset_id).await?;
                }
                None => {}
            }
        }

        Ok(())
    }
}

/// Union of every index constituent and every asset with a position, sorted.
fn asset_universe(indices: &[IndexSettings], prices: &[IndexPrice], positions: &[Position]) -> Vec<AssetId> {
    let mut assets = BTreeSet::new();

    for settings in indices {
        if let Some(price) = prices.iter().find(|p| p.name == settings.name) {
            assets.extend(price.weights.iter().map(|w| w.asset_id.clone()));
        }
    }

    assets.extend(positions.iter().map(|p| p.asset_id.clone()));
    assets.into_iter().collect()
}
