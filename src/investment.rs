//! Exposure calculation.
//!
//! For every asset in the hedge universe: the USD exposure the index inventory
//! implies (target), the USD value of the hedge positions already held, and what
//! is left to hedge. Pure and order independent: inputs are keyed and summed in
//! sorted order, so equal snapshots always give equal results.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::index::{IndexPrice, IndexSettings, Token};
use crate::position::Position;
use crate::quote::Quote;
use crate::types::{AssetId, Side};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetInvestment {
    pub asset_id: AssetId,
    /// USD exposure implied by the index tokens held.
    pub target_amount: Decimal,
    /// USD value of the hedge positions at the current mid.
    pub position_amount: Decimal,
    /// Signed USD amount still to hedge. Positive means sell.
    pub remaining_amount: Decimal,
    /// No quote: excluded from order generation.
    pub is_disabled: bool,
    pub quote: Option<Quote>,
}

impl AssetInvestment {
    pub fn side(&self) -> Side {
        Side::closing(self.remaining_amount)
    }

    /// Remaining amount in asset units at the quote mid.
    pub fn volume(&self) -> Option<Decimal> {
        let quote = self.quote.as_ref()?;
        if quote.mid.is_zero() {
            return None;
        }
        Some((self.remaining_amount / quote.mid).abs())
    }
}

pub struct InvestmentInput<'a> {
    pub assets: &'a [AssetId],
    pub indices: &'a [IndexSettings],
    pub tokens: &'a [Token],
    pub index_prices: &'a [IndexPrice],
    pub positions: &'a [Position],
    pub quotes: &'a HashMap<AssetId, Quote>,
}

pub fn calculate(input: &InvestmentInput<'_>) -> Vec<AssetInvestment> {
    let assets: BTreeSet<&AssetId> = input.assets.iter().collect();

    let indices: BTreeMap<&str, &IndexSettings> = input.indices.iter().map(|i| (i.name.as_str(), i)).collect();
    let prices: BTreeMap<&str, &IndexPrice> = input.index_prices.iter().map(|p| (p.name.as_str(), p)).collect();
    let tokens: BTreeMap<&AssetId, &Token> = input.tokens.iter().map(|t| (&t.asset_id, t)).collect();

    // volume per asset, summed in exchange order
    let mut position_volumes: BTreeMap<&AssetId, BTreeMap<&str, Decimal>> = BTreeMap::new();
    for position in input.positions {
        *position_volumes
            .entry(&position.asset_id)
            .or_default()
            .entry(position.exchange.as_str())
            .or_default() += position.volume;
    }

    assets
        .into_iter()
        .map(|asset_id| {
            let mut target_amount = Decimal::ZERO;

            for (name, settings) in &indices {
                let Some(price) = prices.get(name) else {
                    continue;
                };
                let open_volume = tokens.get(&settings.asset_id).map(|t| t.open_volume).unwrap_or_default();
                target_amount += settings.exposure_sign() * open_volume * price.price * price.weight_of(asset_id);
            }

            let quote = input.quotes.get(asset_id).cloned();

            let Some(mid) = quote.as_ref().map(|q| q.mid) else {
                return AssetInvestment {
                    asset_id: asset_id.clone(),
                    target_amount,
                    position_amount: Decimal::ZERO,
                    remaining_amount: Decimal::ZERO,
                    is_disabled: true,
                    quote: None,
                };
            };

            let volume: Decimal = position_volumes
                .get(asset_id)
                .map(|by_exchange| by_exchange.values().copied().sum())
                .unwrap_or_default();
            let position_amount = volume * mid;

            AssetInvestment {
                asset_id: asset_id.clone(),
                target_amount,
                position_amount,
                remaining_amount: target_amount + position_amount,
                is_disabled: false,
                quote,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{AssetWeight, Index};
    use crate::types::{AssetPairId, Timestamp, VIRTUAL_EXCHANGE};
    use rust_decimal_macros::dec;

    fn crypto10() -> (IndexSettings, IndexPrice, Token) {
        let settings = IndexSettings {
            name: "CRYPTO10".into(),
            asset_id: AssetId::from("C10"),
            asset_pair_id: AssetPairId::from("C10USD"),
            is_short: false,
        };
        let price = IndexPrice::from_index(&Index::new(
            "CRYPTO10",
            Timestamp::from_millis(0),
            dec!(1000),
            vec![
                AssetWeight::new("BTC", dec!(0.6), dec!(50000)),
                AssetWeight::new("ETH", dec!(0.4), dec!(3000)),
            ],
        ));
        let mut token = Token::new(AssetId::from("C10"));
        token.open_volume = dec!(100);
        (settings, price, token)
    }

    fn quote(pair: &str, mid: Decimal) -> Quote {
        Quote::flat(VIRTUAL_EXCHANGE, pair.into(), Timestamp::from_millis(0), mid)
    }

    #[test]
    fn target_follows_weights() {
        let (settings, price, token) = crypto10();
        let assets = vec![AssetId::from("BTC"), AssetId::from("ETH")];
        let quotes = HashMap::from([
            (AssetId::from("BTC"), quote("BTCUSD", dec!(50000))),
            (AssetId::from("ETH"), quote("ETHUSD", dec!(3000))),
        ]);

        let result = calculate(&InvestmentInput {
            assets: &assets,
            indices: &[settings],
            tokens: &[token],
            index_prices: &[price],
            positions: &[],
            quotes: &quotes,
        });

        assert_eq!(result[0].asset_id, AssetId::from("BTC"));
        assert_eq!(result[0].remaining_amount, dec!(60000));
        assert_eq!(result[0].volume(), Some(dec!(1.2)));
        assert_eq!(result[0].side(), Side::Sell);
        assert_eq!(result[1].remaining_amount, dec!(40000));
    }

    #[test]
    fn short_hedge_reduces_remaining() {
        let (settings, price, token) = crypto10();
        let assets = vec![AssetId::from("BTC")];
        let quotes = HashMap::from([(AssetId::from("BTC"), quote("BTCUSD", dec!(50000)))]);
        let positions = vec![Position::new(AssetId::from("BTC"), "kraken").with_volume(dec!(-1), dec!(50000))];

        let result = calculate(&InvestmentInput {
            assets: &assets,
            indices: &[settings],
            tokens: &[token],
            index_prices: &[price],
            positions: &positions,
            quotes: &quotes,
        });

        assert_eq!(result[0].position_amount, dec!(-50000));
        assert_eq!(result[0].remaining_amount, dec!(10000));
    }

    #[test]
    fn short_index_flips_target() {
        let (mut settings, price, token) = crypto10();
        settings.is_short = true;
        let assets = vec![AssetId::from("ETH")];
        let quotes = HashMap::from([(AssetId::from("ETH"), quote("ETHUSD", dec!(3000)))]);

        let result = calculate(&InvestmentInput {
            assets: &assets,
            indices: &[settings],
            tokens: &[token],
            index_prices: &[price],
            positions: &[],
            quotes: &quotes,
        });

        assert_eq!(result[0].remaining_amount, dec!(-40000));
        assert_eq!(result[0].side(), Side::Buy);
    }

    #[test]
    fn missing_quote_disables_asset() {
        let (settings, price, token) = crypto10();
        let assets = vec![AssetId::from("BTC")];

        let result = calculate(&InvestmentInput {
            assets: &assets,
            indices: &[settings],
            tokens: &[token],
            index_prices: &[price],
            positions: &[],
            quotes: &HashMap::new(),
        });

        assert!(result[0].is_disabled);
        assert_eq!(result[0].remaining_amount, Decimal::ZERO);
        assert_eq!(result[0].volume(), None);
    }
}
