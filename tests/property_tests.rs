//! Property-based tests for the hedge and settlement math.
//!
//! These tests verify invariants hold under random inputs.

use index_hedging_core::investment::{self, InvestmentInput};
use index_hedging_core::memory::InMemoryInstrumentCatalog;
use index_hedging_core::pricing::{round_price, round_volume};
use index_hedging_core::settlement::{calculate_asset_settlements, ConstituentPricing};
use index_hedging_core::*;
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;

const ASSETS: [&str; 5] = ["BTC", "ETH", "SOL", "ADA", "XRP"];

// Strategies for generating test data
fn price_strategy() -> impl Strategy<Value = Decimal> {
    (1i64..10_000_000i64).prop_map(|x| Decimal::new(x, 2)) // $0.01 to $100,000
}

fn volume_strategy() -> impl Strategy<Value = Decimal> {
    (-100_000i64..100_000i64).prop_map(|x| Decimal::new(x, 3)) // -100 to +100
}

fn raw_weights_strategy() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::vec(1u32..1000u32, 1..=ASSETS.len())
}

fn normalize(raw: &[u32]) -> Vec<Decimal> {
    let total: u32 = raw.iter().sum();
    raw.iter()
        .map(|w| Decimal::from(*w) / Decimal::from(total))
        .collect()
}

fn settlement(amount: Decimal, price: Decimal, is_direct: bool) -> Settlement {
    Settlement {
        id: "s1".into(),
        index_name: "CRYPTO10".into(),
        amount,
        price,
        wallet_id: "w1".into(),
        client_id: "c1".into(),
        comment: String::new(),
        is_direct,
        status: SettlementStatus::New,
        error: SettlementError::None,
        created_by: "ops".into(),
        created_at: Timestamp::from_millis(0),
        transaction_id: None,
        assets: vec![],
    }
}

fn crypto10_settings() -> IndexSettings {
    IndexSettings {
        name: "CRYPTO10".into(),
        asset_id: AssetId::from("C10"),
        asset_pair_id: AssetPairId::from("C10USD"),
        is_short: false,
    }
}

proptest! {
    /// Settlement amounts at their prices add back up to the settlement value
    #[test]
    fn settlement_value_preserved(
        amount in (1i64..100_000i64).prop_map(|x| Decimal::new(x, 2)),
        index_price in price_strategy(),
        raw in raw_weights_strategy(),
        mids in prop::collection::vec(price_strategy(), ASSETS.len()),
    ) {
        let weights = normalize(&raw);
        let constituents: Vec<ConstituentPricing> = weights
            .iter()
            .enumerate()
            .map(|(i, weight)| ConstituentPricing {
                asset_id: AssetId::from(ASSETS[i]),
                weight: *weight,
                mid: Some(mids[i]),
                hedge_exchange: HOME_EXCHANGE.into(),
            })
            .collect();

        let s = settlement(amount, index_price, true);
        let assets = calculate_asset_settlements(&s, &constituents, dec!(0.02));

        let total: Decimal = assets.iter().map(|a| a.amount * a.price).sum();
        let expected = amount * index_price;
        let tolerance = expected * dec!(0.000001);

        prop_assert!((total - expected).abs() <= tolerance, "total {} expected {}", total, expected);
        prop_assert!(assets.iter().all(|a| a.amount >= Decimal::ZERO));
        prop_assert!(assets.iter().all(|a| a.status == AssetSettlementStatus::New));
    }

    /// Small constituents always settle in USD, even on a direct settlement
    #[test]
    fn small_weight_never_direct(
        small in 0i64..=200i64,
        large in 201i64..10_000i64,
        mid in price_strategy(),
    ) {
        let small_weight = Decimal::new(small, 4); // 0 to 0.02
        let large_weight = Decimal::new(large, 4);
        let constituents = vec![
            ConstituentPricing { asset_id: AssetId::from("ADA"), weight: small_weight, mid: Some(mid), hedge_exchange: HOME_EXCHANGE.into() },
            ConstituentPricing { asset_id: AssetId::from("BTC"), weight: large_weight, mid: Some(mid), hedge_exchange: HOME_EXCHANGE.into() },
        ];

        let direct = calculate_asset_settlements(&settlement(dec!(1), dec!(100), true), &constituents, dec!(0.02));
        prop_assert!(!direct[0].is_direct);
        prop_assert!(direct[1].is_direct);

        let indirect = calculate_asset_settlements(&settlement(dec!(1), dec!(100), false), &constituents, dec!(0.02));
        prop_assert!(indirect.iter().all(|a| !a.is_direct));
    }

    /// Exposure does not depend on the order the snapshots come in
    #[test]
    fn investments_order_independent(
        open_volume in volume_strategy(),
        raw in raw_weights_strategy(),
        position_volumes in prop::collection::vec(volume_strategy(), ASSETS.len()),
        mids in prop::collection::vec(price_strategy(), ASSETS.len()),
    ) {
        let weights = normalize(&raw);
        let index = Index::new(
            "CRYPTO10",
            Timestamp::from_millis(0),
            dec!(1000),
            weights.iter().enumerate().map(|(i, w)| AssetWeight::new(ASSETS[i], *w, mids[i])).collect(),
        );
        let prices = vec![IndexPrice::from_index(&index)];
        let indices = vec![crypto10_settings()];

        let mut token = Token::new(AssetId::from("C10"));
        token.open_volume = open_volume;
        let tokens = vec![token];

        let mut positions: Vec<Position> = Vec::new();
        for (i, volume) in position_volumes.iter().enumerate() {
            for exchange in ["kraken", "bitstamp"] {
                positions.push(Position::new(AssetId::from(ASSETS[i]), exchange).with_volume(*volume, mids[i]));
            }
        }

        let quotes: HashMap<AssetId, Quote> = ASSETS
            .iter()
            .enumerate()
            .map(|(i, a)| (AssetId::from(*a), Quote::flat("kraken", AssetId::from(*a).usd_pair(), Timestamp::from_millis(0), mids[i])))
            .collect();

        let assets: Vec<AssetId> = ASSETS.iter().map(|a| AssetId::from(*a)).collect();
        let forward = investment::calculate(&InvestmentInput {
            assets: &assets,
            indices: &indices,
            tokens: &tokens,
            index_prices: &prices,
            positions: &positions,
            quotes: &quotes,
        });

        let reversed_assets: Vec<AssetId> = assets.iter().rev().cloned().collect();
        let reversed_positions: Vec<Position> = positions.iter().rev().cloned().collect();
        let backward = investment::calculate(&InvestmentInput {
            assets: &reversed_assets,
            indices: &indices,
            tokens: &tokens,
            index_prices: &prices,
            positions: &reversed_positions,
            quotes: &quotes,
        });

        prop_assert_eq!(forward, backward);
    }

    /// remaining = target + position value, and the side closes the remaining exposure
    #[test]
    fn remaining_is_target_plus_positions(
        open_volume in volume_strategy(),
        position_volume in volume_strategy(),
        mid in price_strategy(),
    ) {
        let index = Index::new("CRYPTO10", Timestamp::from_millis(0), dec!(1000), vec![AssetWeight::new("BTC", dec!(1), mid)]);
        let prices = vec![IndexPrice::from_index(&index)];
        let indices = vec![crypto10_settings()];
        let mut token = Token::new(AssetId::from("C10"));
        token.open_volume = open_volume;
        let positions = vec![Position::new(AssetId::from("BTC"), "kraken").with_volume(position_volume, mid)];
        let mut quotes = HashMap::new();
        quotes.insert(AssetId::from("BTC"), Quote::flat("kraken", "BTCUSD".into(), Timestamp::from_millis(0), mid));

        let assets = vec![AssetId::from("BTC")];
        let result = investment::calculate(&InvestmentInput {
            assets: &assets,
            indices: &indices,
            tokens: &[token],
            index_prices: &prices,
            positions: &positions,
            quotes: &quotes,
        });

        let btc = &result[0];
        prop_assert_eq!(btc.target_amount, open_volume * dec!(1000));
        prop_assert_eq!(btc.position_amount, position_volume * mid);
        prop_assert_eq!(btc.remaining_amount, btc.target_amount + btc.position_amount);
        if btc.remaining_amount > Decimal::ZERO {
            prop_assert_eq!(btc.side(), Side::Sell);
        } else if btc.remaining_amount < Decimal::ZERO {
            prop_assert_eq!(btc.side(), Side::Buy);
        }
    }

    /// Rounded prices never improve on the input; volumes never grow
    #[test]
    fn rounding_direction(
        raw in 1i64..1_000_000_000i64,
        scale in 0u32..8u32,
        accuracy in 0u32..6u32,
    ) {
        let value = Decimal::new(raw, scale);

        prop_assert!(round_price(value, Side::Sell, accuracy) <= value);
        prop_assert!(round_price(value, Side::Buy, accuracy) >= value);
        prop_assert!(round_volume(value, accuracy) <= value);
        prop_assert!(round_volume(value, accuracy).scale() <= accuracy);
    }

    /// A quote beyond the deviation threshold leaves the store as it was
    #[test]
    fn deviation_guard_keeps_store(
        mid in 1_000i64..100_000i64,
        jump_bps in 1_001i64..9_000i64,
        up in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();

        runtime.block_on(async {
            let catalog = Arc::new(InMemoryInstrumentCatalog::new());
            catalog.add_asset_pair("BTCUSD");
            let store = QuoteStore::new(catalog, QuoteThresholdSettings { enabled: true, value: dec!(0.1) });

            let mid = Decimal::from(mid);
            let first = Quote::flat("kraken", "BTCUSD".into(), Timestamp::from_millis(0), mid);
            assert_eq!(store.update(first.clone()).await.unwrap(), QuoteUpdate::Applied);

            let jump = mid * Decimal::new(jump_bps, 4);
            let next_mid = if up { mid + jump } else { mid - jump };
            let next = Quote::flat("kraken", "BTCUSD".into(), Timestamp::from_millis(1), next_mid);

            assert_eq!(store.update(next).await.unwrap(), QuoteUpdate::ExcessiveDeviation);
            assert_eq!(store.get("kraken", &"BTCUSD".into()), Some(first));
        });
    }
}

/// Fixed edge cases
#[cfg(test)]
mod edge_cases {
    use super::*;

    #[test]
    fn missing_quote_disables_asset() {
        let index = Index::new("CRYPTO10", Timestamp::from_millis(0), dec!(1000), vec![AssetWeight::new("BTC", dec!(1), dec!(50000))]);
        let prices = vec![IndexPrice::from_index(&index)];
        let assets = vec![AssetId::from("BTC")];

        let result = investment::calculate(&InvestmentInput {
            assets: &assets,
            indices: &[crypto10_settings()],
            tokens: &[],
            index_prices: &prices,
            positions: &[],
            quotes: &HashMap::new(),
        });

        assert!(result[0].is_disabled);
        assert_eq!(result[0].remaining_amount, Decimal::ZERO);
    }

    #[test]
    fn missing_mid_settles_nothing() {
        let constituents = vec![ConstituentPricing {
            asset_id: AssetId::from("BTC"),
            weight: dec!(1),
            mid: None,
            hedge_exchange: "kraken".into(),
        }];

        let assets = calculate_asset_settlements(&settlement(dec!(10), dec!(100), true), &constituents, dec!(0.02));

        assert_eq!(assets[0].amount, Decimal::ZERO);
        assert_eq!(assets[0].error, SettlementError::NoQuote);
        assert!(assets[0].is_external);
    }

    #[test]
    fn short_index_inverts_target() {
        let index = Index::new("CRYPTO10S", Timestamp::from_millis(0), dec!(500), vec![AssetWeight::new("BTC", dec!(1), dec!(50000))]);
        let prices = vec![IndexPrice::from_index(&index)];
        let settings = IndexSettings {
            name: "CRYPTO10S".into(),
            asset_id: AssetId::from("C10S"),
            asset_pair_id: AssetPairId::from("C10SUSD"),
            is_short: true,
        };
        let mut token = Token::new(AssetId::from("C10S"));
        token.open_volume = dec!(10);
        let mut quotes = HashMap::new();
        quotes.insert(AssetId::from("BTC"), Quote::flat("kraken", "BTCUSD".into(), Timestamp::from_millis(0), dec!(50000)));
        let assets = vec![AssetId::from("BTC")];

        let result = investment::calculate(&InvestmentInput {
            assets: &assets,
            indices: &[settings],
            tokens: &[token],
            index_prices: &prices,
            positions: &[],
            quotes: &quotes,
        });

        assert_eq!(result[0].target_amount, dec!(-5000));
        assert_eq!(result[0].side(), Side::Buy);
    }
}
