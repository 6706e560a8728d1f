// 9.2: scheduled phases. each pass loads the settlements sitting in one status, skips the ones
// with an error, steps every eligible asset and advances the parent once all assets caught up.
// a failure on one settlement is logged and the pass moves on to the next.

use rust_decimal::Decimal;
use tracing::{error, info, warn};

use super::model::{AssetSettlementStatus, Settlement, SettlementError, SettlementStatus};
use super::SettlementService;
use crate::error::{HedgeError, Result};
use crate::types::AssetId;

impl SettlementService {
    /// One pass of every phase, in order.
    pub async fn execute(&self) -> Result<()> {
        self.reserve().await?;
        self.process().await?;
        self.transfer().await?;
        self.complete().await
    }

    async fn pending(&self, status: SettlementStatus) -> Result<Vec<Settlement>> {
        Ok(self
            .repository
            .get_by_status(status)
            .await?
            .into_iter()
            .filter(|s| !s.has_error())
            .collect())
    }

    pub async fn reserve(&self) -> Result<()> {
        for mut settlement in self.pending(SettlementStatus::Approved).await? {
            if let Err(e) = self.reserve_settlement(&mut settlement).await {
                warn!(settlement_id = %settlement.id, error = %e, "an error occurred while reserving funds for settlement");
            }
        }
        Ok(())
    }

    async fn reserve_settlement(&self, settlement: &mut Settlement) -> Result<()> {
        for asset in settlement
            .assets
            .iter_mut()
            .filter(|a| !a.has_error() && a.status == AssetSettlementStatus::New)
        {
            if asset.is_manual() {
                // moved off-band, confirmed later through execute_asset
                asset.status = AssetSettlementStatus::Reserved;
                self.repository.update_asset(asset).await?;
            } else {
                self.reserve_asset_funds(asset).await?;
            }
        }

        if settlement.all_assets_in(AssetSettlementStatus::Reserved) {
            self.reserve_client_funds(settlement).await?;
        }

        Ok(())
    }

    pub async fn process(&self) -> Result<()> {
        for mut settlement in self.pending(SettlementStatus::Reserved).await? {
            if let Err(e) = self.process_settlement(&mut settlement).await {
                warn!(settlement_id = %settlement.id, error = %e, "an error occurred while closing positions of settlement");
            }
        }
        Ok(())
    }

    async fn process_settlement(&self, settlement: &mut Settlement) -> Result<()> {
        for asset in settlement
            .assets
            .iter_mut()
            .filter(|a| !a.has_error() && a.status == AssetSettlementStatus::Reserved)
        {
            // indirect home assets are closed by the regular hedge orders
            let result = if !asset.is_direct && !asset.is_external {
                Ok(())
            } else {
                self.close_asset_position(&asset.asset_id, asset.amount, asset.price).await
            };

            match result {
                Ok(()) => {
                    asset.status = AssetSettlementStatus::Processed;
                    info!(settlement_id = %asset.settlement_id, asset = %asset.asset_id, "asset settlement processed");
                }
                Err(e) => {
                    asset.error = SettlementError::Unknown;
                    error!(settlement_id = %asset.settlement_id, asset = %asset.asset_id, error = %e, "an error occurred while processing asset settlement");
                }
            }

            self.repository.update_asset(asset).await?;
        }

        if settlement.all_assets_in(AssetSettlementStatus::Processed) {
            match self.close_tokens(settlement).await {
                Ok(()) => {
                    settlement.status = SettlementStatus::Processed;
                    info!(settlement_id = %settlement.id, amount = %settlement.amount, price = %settlement.price, "settlement processed");
                }
                Err(e) => {
                    settlement.error = SettlementError::Unknown;
                    error!(settlement_id = %settlement.id, error = %e, "an error occurred while processing settlement");
                }
            }

            self.repository.update(settlement).await?;
        }

        Ok(())
    }

    async fn close_asset_position(&self, asset_id: &AssetId, amount: Decimal, price: Decimal) -> Result<()> {
        let settings = self
            .asset_hedge_settings
            .get_by_asset_id(asset_id)
            .await?
            .ok_or_else(|| HedgeError::EntityNotFound(format!("asset hedge settings {}", asset_id)))?;

        self.positions.close(asset_id, &settings.exchange, amount, price).await
    }

    async fn close_tokens(&self, settlement: &Settlement) -> Result<()> {
        let index = self
            .index_settings
            .get_by_index(&settlement.index_name)
            .await?
            .ok_or_else(|| HedgeError::EntityNotFound(format!("index settings {}", settlement.index_name)))?;

        self.tokens.close(&index.asset_id, settlement.amount, settlement.price).await
    }

    pub async fn transfer(&self) -> Result<()> {
        for mut settlement in self.pending(SettlementStatus::Processed).await? {
            if let Err(e) = self.transfer_settlement(&mut settlement).await {
                warn!(settlement_id = %settlement.id, error = %e, "an error occurred while transferring settlement");
            }
        }
        Ok(())
    }

    async fn transfer_settlement(&self, settlement: &mut Settlement) -> Result<()> {
        let client_id = settlement.client_id.clone();
        let wallet_id = settlement.wallet_id.clone();

        for asset in settlement
            .assets
            .iter_mut()
            .filter(|a| !a.is_manual() && !a.has_error() && a.status == AssetSettlementStatus::Processed)
        {
            self.transfer_asset_funds(asset, &client_id, &wallet_id).await?;
        }

        if settlement.all_assets_in(AssetSettlementStatus::Transferred) {
            self.transfer_client_funds(settlement).await?;
        }

        Ok(())
    }

    pub async fn complete(&self) -> Result<()> {
        for mut settlement in self.pending(SettlementStatus::Transferred).await? {
            if let Err(e) = self.complete_settlement(&mut settlement).await {
                warn!(settlement_id = %settlement.id, error = %e, "an error occurred while completing settlement");
            }
        }
        Ok(())
    }

    async fn complete_settlement(&self, settlement: &mut Settlement) -> Result<()> {
        let ready = settlement
            .assets
            .iter()
            .all(|a| !a.has_error() && a.status == AssetSettlementStatus::Transferred);

        if !ready {
            return Ok(());
        }

        for asset in settlement.assets.iter_mut() {
            asset.status = AssetSettlementStatus::Completed;
            self.repository.update_asset(asset).await?;
        }

        settlement.status = SettlementStatus::Completed;
        self.repository.update(settlement).await?;

        info!(settlement_id = %settlement.id, transaction_id = ?settlement.transaction_id, "settlement completed");
        Ok(())
    }
}
