// 9.1: settlement aggregate. a settlement owns its asset list outright, recalculation swaps the
// whole list. statuses only move forward; errors are data and freeze the entity until a retry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::HedgeError;
use crate::types::{AssetId, Timestamp, HOME_EXCHANGE};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementStatus {
    New,
    Approved,
    Rejected,
    Reserved,
    Processed,
    Transferred,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetSettlementStatus {
    New,
    Reserved,
    Processed,
    Transferred,
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementError {
    None,
    NotEnoughFunds,
    NoQuote,
    Unknown,
}

impl SettlementError {
    pub fn from_failure(error: &HedgeError) -> Self {
        match error {
            HedgeError::NotEnoughFunds(_) => Self::NotEnoughFunds,
            _ => Self::Unknown,
        }
    }
}

impl Default for SettlementError {
    fn default() -> Self {
        Self::None
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSettlement {
    pub asset_id: AssetId,
    pub settlement_id: String,
    pub amount: Decimal,
    pub price: Decimal,
    pub actual_amount: Decimal,
    pub actual_price: Decimal,
    pub fee: Decimal,
    pub weight: Decimal,
    /// Settled with the asset itself instead of its USD equivalent.
    pub is_direct: bool,
    /// Hedged outside the home exchange.
    pub is_external: bool,
    pub status: AssetSettlementStatus,
    pub error: SettlementError,
    pub transaction_id: Option<String>,
}

impl AssetSettlement {
    pub fn has_error(&self) -> bool {
        self.error != SettlementError::None
    }

    // direct external assets are moved off-band and confirmed by an operator
    pub fn is_manual(&self) -> bool {
        self.is_direct && self.is_external
    }

    /// Asset that leaves the operating wallet for this constituent.
    pub fn transfer_asset(&self, usd_asset_id: &str) -> String {
        if self.is_direct {
            self.asset_id.to_string()
        } else {
            usd_asset_id.to_string()
        }
    }

    pub fn transfer_amount(&self) -> Decimal {
        if self.is_direct {
            self.amount
        } else {
            self.usd_amount()
        }
    }

    pub fn usd_amount(&self) -> Decimal {
        self.amount * self.price
    }

    pub fn update(&mut self, amount: Decimal, is_direct: bool, is_external: bool) {
        self.amount = amount;
        self.actual_amount = amount;
        self.is_direct = is_direct;
        self.is_external = is_external;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settlement {
    pub id: String,
    pub index_name: String,
    /// Index tokens to redeem.
    pub amount: Decimal,
    /// Index price at creation or last recalculation.
    pub price: Decimal,
    pub wallet_id: String,
    pub client_id: String,
    pub comment: String,
    pub is_direct: bool,
    pub status: SettlementStatus,
    pub error: SettlementError,
    pub created_by: String,
    pub created_at: Timestamp,
    pub transaction_id: Option<String>,
    pub assets: Vec<AssetSettlement>,
}

impl Settlement {
    pub fn has_error(&self) -> bool {
        self.error != SettlementError::None
    }

    pub fn usd_amount(&self) -> Decimal {
        self.amount * self.price
    }

    pub fn get_asset(&self, asset_id: &AssetId) -> Option<&AssetSettlement> {
        self.assets.iter().find(|a| &a.asset_id == asset_id)
    }

    pub fn get_asset_mut(&mut self, asset_id: &AssetId) -> Option<&mut AssetSettlement> {
        self.assets.iter_mut().find(|a| &a.asset_id == asset_id)
    }

    /// True once every constituent sits in `status`. An erroring constituent still short of it blocks.
    pub fn all_assets_in(&self, status: AssetSettlementStatus) -> bool {
        self.assets.iter().all(|a| a.status == status)
    }

    // funds already moved to the client, nothing left to undo
    pub fn has_transferred_assets(&self) -> bool {
        self.assets.iter().any(|a| {
            matches!(
                a.status,
                AssetSettlementStatus::Transferred | AssetSettlementStatus::Completed
            )
        })
    }
}

/// One index constituent as seen at calculation time.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstituentPricing {
    pub asset_id: AssetId,
    pub weight: Decimal,
    /// Mid of the asset on its hedge exchange, if quoted.
    pub mid: Option<Decimal>,
    pub hedge_exchange: String,
}

/// Splits the USD value of a settlement across the constituents:
/// `amount = requested * index_price * weight / mid`.
pub fn calculate_asset_settlements(
    settlement: &Settlement,
    constituents: &[ConstituentPricing],
    min_direct_weight: Decimal,
) -> Vec<AssetSettlement> {
    let amount_in_usd = settlement.usd_amount();

    constituents
        .iter()
        .map(|constituent| {
            let (amount, price, error) = match constituent.mid {
                Some(mid) if !mid.is_zero() => (amount_in_usd * constituent.weight / mid, mid, SettlementError::None),
                _ => (Decimal::ZERO, Decimal::ZERO, SettlementError::NoQuote),
            };

            AssetSettlement {
                asset_id: constituent.asset_id.clone(),
                settlement_id: settlement.id.clone(),
                amount,
                price,
                actual_amount: amount,
                actual_price: price,
                fee: Decimal::ZERO,
                weight: constituent.weight,
                is_direct: settlement.is_direct && constituent.weight > min_direct_weight,
                is_external: constituent.hedge_exchange != HOME_EXCHANGE,
                status: AssetSettlementStatus::New,
                error,
                transaction_id: None,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

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

    fn constituent(asset: &str, weight: Decimal, mid: Option<Decimal>, exchange: &str) -> ConstituentPricing {
        ConstituentPricing {
            asset_id: AssetId::from(asset),
            weight,
            mid,
            hedge_exchange: exchange.into(),
        }
    }

    #[test]
    fn single_constituent_amount() {
        let s = settlement(dec!(10), dec!(100), true);
        let assets = calculate_asset_settlements(&s, &[constituent("BTC", dec!(1), Some(dec!(50)), HOME_EXCHANGE)], dec!(0.02));

        assert_eq!(assets.len(), 1);
        assert_eq!(assets[0].amount, dec!(20));
        assert_eq!(assets[0].price, dec!(50));
        assert!(assets[0].is_direct);
        assert!(!assets[0].is_external);
        assert_eq!(assets[0].settlement_id, "s1");
    }

    #[test]
    fn small_weights_never_direct() {
        let s = settlement(dec!(10), dec!(100), true);
        let assets = calculate_asset_settlements(
            &s,
            &[
                constituent("BTC", dec!(0.98), Some(dec!(50)), "kraken"),
                constituent("XRP", dec!(0.02), Some(dec!(1)), "kraken"),
            ],
            dec!(0.02),
        );

        assert!(assets[0].is_direct);
        assert!(assets[0].is_manual());
        assert!(!assets[1].is_direct);
        assert_eq!(assets[1].transfer_asset("USD"), "USD");
        assert_eq!(assets[1].transfer_amount(), dec!(20));
    }

    #[test]
    fn missing_quote_flags_asset() {
        let s = settlement(dec!(10), dec!(100), false);
        let assets = calculate_asset_settlements(&s, &[constituent("ETH", dec!(1), None, HOME_EXCHANGE)], dec!(0.02));
        assert_eq!(assets[0].error, SettlementError::NoQuote);
        assert_eq!(assets[0].amount, Decimal::ZERO);
    }

    #[test]
    fn failure_mapping() {
        assert_eq!(
            SettlementError::from_failure(&HedgeError::NotEnoughFunds("USD".into())),
            SettlementError::NotEnoughFunds
        );
        assert_eq!(
            SettlementError::from_failure(&HedgeError::service("timeout")),
            SettlementError::Unknown
        );
    }

    #[test]
    fn parent_waits_for_every_asset() {
        let mut s = settlement(dec!(10), dec!(100), false);
        s.assets = calculate_asset_settlements(
            &s,
            &[
                constituent("BTC", dec!(0.5), Some(dec!(50)), HOME_EXCHANGE),
                constituent("ETH", dec!(0.5), Some(dec!(5)), HOME_EXCHANGE),
            ],
            dec!(0.02),
        );
        s.assets[0].status = AssetSettlementStatus::Reserved;
        assert!(!s.all_assets_in(AssetSettlementStatus::Reserved));

        s.assets[1].status = AssetSettlementStatus::Reserved;
        assert!(s.all_assets_in(AssetSettlementStatus::Reserved));
        assert!(!s.has_transferred_assets());
    }
}
