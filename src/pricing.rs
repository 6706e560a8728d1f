//! Hedge order pricing.
//!
//! A policy turns a quote, a USD volume and a side into a limit price and a
//! price type. Policies are looked up by name so new strategies plug in
//! without touching the hedge service.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::HedgeSettings;
use crate::hedge_settings::AssetHedgeSettings;
use crate::quote::Quote;
use crate::types::Side;

pub const MID_POLICY: &str = "mid";
pub const TOUCH_POLICY: &str = "touch";
pub const MARKUP_POLICY: &str = "markup";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceType {
    Limit,
    MidPrice,
    Market,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitOrderPrice {
    pub price: Decimal,
    pub price_type: PriceType,
}

impl LimitOrderPrice {
    pub fn new(price: Decimal, price_type: PriceType) -> Self {
        Self { price, price_type }
    }
}

pub trait PricingPolicy: Send + Sync {
    fn name(&self) -> &str;

    /// `volume` is the USD amount still to hedge.
    fn calculate(
        &self,
        quote: &Quote,
        volume: Decimal,
        side: Side,
        settings: &AssetHedgeSettings,
        hedge: &HedgeSettings,
    ) -> LimitOrderPrice;
}

/// Rounds so the order never gets a better price than asked for: sells down, buys up.
pub fn round_price(price: Decimal, side: Side, accuracy: u32) -> Decimal {
    let strategy = match side {
        Side::Sell => RoundingStrategy::ToNegativeInfinity,
        Side::Buy => RoundingStrategy::ToPositiveInfinity,
    };
    price.round_dp_with_strategy(accuracy, strategy).normalize()
}

// volume is always truncated so the order never exceeds the exposure
pub fn round_volume(volume: Decimal, accuracy: u32) -> Decimal {
    volume
        .round_dp_with_strategy(accuracy, RoundingStrategy::ToZero)
        .normalize()
}

pub struct MidPricePolicy;

impl PricingPolicy for MidPricePolicy {
    fn name(&self) -> &str {
        MID_POLICY
    }

    fn calculate(
        &self,
        quote: &Quote,
        _volume: Decimal,
        side: Side,
        settings: &AssetHedgeSettings,
        _hedge: &HedgeSettings,
    ) -> LimitOrderPrice {
        LimitOrderPrice::new(
            round_price(quote.mid, side, settings.price_accuracy),
            PriceType::MidPrice,
        )
    }
}

/// Rests on the order's own side of the book.
pub struct TouchPricePolicy;

impl PricingPolicy for TouchPricePolicy {
    fn name(&self) -> &str {
        TOUCH_POLICY
    }

    fn calculate(
        &self,
        quote: &Quote,
        _volume: Decimal,
        side: Side,
        settings: &AssetHedgeSettings,
        _hedge: &HedgeSettings,
    ) -> LimitOrderPrice {
        LimitOrderPrice::new(
            round_price(quote.touch(side), side, settings.price_accuracy),
            PriceType::Limit,
        )
    }
}

/// Passive at mid for small amounts. From `threshold_up` on it crosses the
/// spread by `market_order_markup` to get filled.
pub struct MarkupPolicy;

impl PricingPolicy for MarkupPolicy {
    fn name(&self) -> &str {
        MARKUP_POLICY
    }

    fn calculate(
        &self,
        quote: &Quote,
        volume: Decimal,
        side: Side,
        settings: &AssetHedgeSettings,
        hedge: &HedgeSettings,
    ) -> LimitOrderPrice {
        if volume < hedge.threshold_up {
            return LimitOrderPrice::new(
                round_price(quote.mid, side, settings.price_accuracy),
                PriceType::Limit,
            );
        }

        let price = match side {
            Side::Sell => quote.bid * (Decimal::ONE - hedge.market_order_markup),
            Side::Buy => quote.ask * (Decimal::ONE + hedge.market_order_markup),
        };

        LimitOrderPrice::new(round_price(price, side, settings.price_accuracy), PriceType::Market)
    }
}

#[derive(Clone)]
pub struct PricingPolicies {
    policies: BTreeMap<String, Arc<dyn PricingPolicy>>,
}

impl PricingPolicies {
    pub fn empty() -> Self {
        Self {
            policies: BTreeMap::new(),
        }
    }

    pub fn standard() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(MidPricePolicy));
        registry.register(Arc::new(TouchPricePolicy));
        registry.register(Arc::new(MarkupPolicy));
        registry
    }

    pub fn register(&mut self, policy: Arc<dyn PricingPolicy>) {
        self.policies.insert(policy.name().to_string(), policy);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PricingPolicy>> {
        self.policies.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.policies.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.policies.keys().cloned().collect()
    }
}

impl Default for PricingPolicies {
    fn default() -> Self {
        Self::standard()
    }
}
