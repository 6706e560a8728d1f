// 5.0: hedge position per (asset, exchange). volume is signed, long positive.
// opposite_volume tracks the USD side so the average price falls out of the two.

use crate::types::{AssetId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub asset_id: AssetId,
    pub exchange: String,
    pub volume: Decimal,
    pub opposite_volume: Decimal,
}

impl Position {
    pub fn new(asset_id: AssetId, exchange: impl Into<String>) -> Self {
        Self {
            asset_id,
            exchange: exchange.into(),
            volume: Decimal::ZERO,
            opposite_volume: Decimal::ZERO,
        }
    }

    pub fn with_volume(mut self, volume: Decimal, price: Decimal) -> Self {
        self.volume = volume;
        self.opposite_volume = -volume * price;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.volume.is_zero()
    }

    pub fn side(&self) -> Option<Side> {
        if self.volume > Decimal::ZERO {
            Some(Side::Buy)
        } else if self.volume < Decimal::ZERO {
            Some(Side::Sell)
        } else {
            None
        }
    }

    // 5.1: buys add volume and spend USD, sells the reverse
    pub fn apply_trade(&mut self, side: Side, volume: Decimal, price: Decimal) {
        self.volume += side.sign() * volume;
        self.opposite_volume -= side.sign() * volume * price;
    }

    /// Move the position toward flat by `volume` at `price`. Never flips the sign.
    pub fn close(&mut self, volume: Decimal, price: Decimal) -> Decimal {
        let Some(side) = self.side() else {
            return Decimal::ZERO;
        };
        let closed = volume.abs().min(self.volume.abs());
        self.apply_trade(side.opposite(), closed, price);
        closed
    }

    /// Signed USD value of the position at `mid`.
    pub fn value(&self, mid: Decimal) -> Decimal {
        self.volume * mid
    }

    pub fn average_price(&self) -> Option<Decimal> {
        if self.volume.is_zero() {
            None
        } else {
            Some((self.opposite_volume / self.volume).abs())
        }
    }

    // 5.2: mark-to-market result of the round trip so far
    pub fn pnl(&self, mid: Decimal) -> Decimal {
        self.opposite_volume + self.value(mid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn btc() -> Position {
        Position::new(AssetId::from("BTC"), "kraken")
    }

    #[test]
    fn trades_accumulate() {
        let mut position = btc();
        position.apply_trade(Side::Sell, dec!(2), dec!(50000));
        position.apply_trade(Side::Sell, dec!(1), dec!(53000));

        assert_eq!(position.volume, dec!(-3));
        assert_eq!(position.opposite_volume, dec!(153000));
        assert_eq!(position.average_price(), Some(dec!(51000)));
        assert_eq!(position.side(), Some(Side::Sell));
    }

    #[test]
    fn close_moves_toward_flat() {
        let mut position = btc().with_volume(dec!(-3), dec!(50000));

        let closed = position.close(dec!(1), dec!(49000));
        assert_eq!(closed, dec!(1));
        assert_eq!(position.volume, dec!(-2));

        // over-close stops at zero
        let closed = position.close(dec!(5), dec!(49000));
        assert_eq!(closed, dec!(2));
        assert!(position.is_empty());
        assert_eq!(position.close(dec!(1), dec!(1)), Decimal::ZERO);
    }

    #[test]
    fn pnl_of_short_when_price_drops() {
        let position = btc().with_volume(dec!(-1), dec!(50000));
        assert_eq!(position.value(dec!(48000)), dec!(-48000));
        assert_eq!(position.pnl(dec!(48000)), dec!(2000));
    }
}
