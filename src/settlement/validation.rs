//! Balance validation at edit time.
//!
//! Direct assets held on the home exchange are checked one by one against
//! their free balance. Everything settled in USD is pooled and checked once
//! against the free USD balance, so a shortfall flags the whole pool.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::warn;

use super::model::{Settlement, SettlementError};
use super::SettlementService;
use crate::error::Result;
use crate::types::{AssetId, HOME_EXCHANGE};

impl SettlementService {
    // wallet names of the assets held on the home exchange
    async fn home_asset_names(&self) -> Result<BTreeMap<AssetId, String>> {
        Ok(self
            .instruments
            .get_assets()
            .await?
            .into_iter()
            .filter(|a| a.exchange == HOME_EXCHANGE)
            .map(|a| (a.asset_id, a.asset))
            .collect())
    }

    pub(super) async fn validate_balance(&self, settlement: &mut Settlement) -> Result<()> {
        for asset in settlement.assets.iter_mut() {
            if asset.error == SettlementError::NotEnoughFunds {
                asset.error = SettlementError::None;
            }
        }

        // the id itself stands in when the catalog has no entry
        let names = self.home_asset_names().await?;
        let name_of = |asset_id: &AssetId| names.get(asset_id).cloned().unwrap_or_else(|| asset_id.to_string());

        let mut direct: BTreeMap<AssetId, Decimal> = BTreeMap::new();
        let mut usd_required = Decimal::ZERO;

        for asset in settlement.assets.iter().filter(|a| !a.has_error()) {
            if asset.is_direct && !asset.is_external {
                *direct.entry(asset.asset_id.clone()).or_default() += asset.amount;
            } else if !asset.is_direct {
                usd_required += asset.usd_amount();
            }
        }

        for (asset_id, required) in direct {
            let balance = self.balances.get_by_asset_id(HOME_EXCHANGE, &name_of(&asset_id));

            if balance.free() < required {
                warn!(settlement_id = %settlement.id, asset = %asset_id, %required, free = %balance.free(), "not enough funds for direct settlement");
                for asset in settlement
                    .assets
                    .iter_mut()
                    .filter(|a| a.asset_id == asset_id && !a.has_error())
                {
                    asset.error = SettlementError::NotEnoughFunds;
                }
            }
        }

        let usd_asset = AssetId::new(self.params.usd_asset_id.clone());
        let usd_balance = self.balances.get_by_asset_id(HOME_EXCHANGE, &name_of(&usd_asset));

        if usd_balance.free() < usd_required {
            warn!(settlement_id = %settlement.id, required = %usd_required, free = %usd_balance.free(), "not enough USD for settlement");
            for asset in settlement
                .assets
                .iter_mut()
                .filter(|a| !a.is_direct && !a.has_error())
            {
                asset.error = SettlementError::NotEnoughFunds;
            }
        }

        Ok(())
    }
}
