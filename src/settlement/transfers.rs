//! Wallet movements. A collaborator failure lands on the entity's error field
//! and is logged; only repository failures are returned to the caller.

use tracing::{error, info, warn};

use super::model::{AssetSettlement, AssetSettlementStatus, Settlement, SettlementError, SettlementStatus};
use super::SettlementService;
use crate::error::{HedgeError, Result};
use crate::types::HOME_EXCHANGE;

// shortfalls are expected and logged as warnings, anything else is an error
fn record_failure(failure: &HedgeError, settlement_id: &str, step: &str) -> SettlementError {
    let mapped = SettlementError::from_failure(failure);
    if mapped == SettlementError::NotEnoughFunds {
        warn!(settlement_id, step, %failure, "not enough funds");
    } else {
        error!(settlement_id, step, %failure, "settlement step failed");
    }
    mapped
}

impl SettlementService {
    /// Name of the index token in the client wallet.
    async fn client_asset(&self, settlement: &Settlement) -> Result<String> {
        let index = self
            .index_settings
            .get_by_index(&settlement.index_name)
            .await?
            .ok_or_else(|| HedgeError::EntityNotFound(format!("index settings {}", settlement.index_name)))?;

        let asset = self
            .instruments
            .get_asset(&index.asset_id, HOME_EXCHANGE)
            .await?
            .ok_or_else(|| HedgeError::EntityNotFound(format!("asset settings {}", index.asset_id)))?;

        Ok(asset.asset)
    }

    pub(super) async fn reserve_asset_funds(&self, asset: &mut AssetSettlement) -> Result<()> {
        let result = if asset.is_direct {
            self.transfers
                .reserve_funds(&asset.asset_id, asset.amount, &asset.settlement_id)
                .await
        } else {
            self.transfers
                .reserve_usd_funds(&asset.asset_id, asset.price, asset.amount, &asset.settlement_id)
                .await
        };

        match result {
            Ok(()) => {
                asset.status = AssetSettlementStatus::Reserved;
                info!(settlement_id = %asset.settlement_id, asset = %asset.asset_id, amount = %asset.amount, is_direct = asset.is_direct, "funds reserved from main wallet");
            }
            Err(failure) => asset.error = record_failure(&failure, &asset.settlement_id, "reserve asset funds"),
        }

        self.repository.update_asset(asset).await
    }

    pub(super) async fn reserve_client_funds(&self, settlement: &mut Settlement) -> Result<()> {
        let current: &Settlement = settlement;
        let result: Result<()> = async {
            let asset = self.client_asset(current).await?;
            self.transfers
                .reserve_client_funds(
                    &current.wallet_id,
                    &asset,
                    current.amount,
                    &current.client_id,
                    &current.id,
                )
                .await
        }
        .await;

        match result {
            Ok(()) => {
                settlement.status = SettlementStatus::Reserved;
                info!(settlement_id = %settlement.id, amount = %settlement.amount, wallet_id = %settlement.wallet_id, "funds reserved from client wallet");
            }
            Err(failure) => settlement.error = record_failure(&failure, &settlement.id, "reserve client funds"),
        }

        self.repository.update(settlement).await
    }

    pub(super) async fn transfer_asset_funds(
        &self,
        asset: &mut AssetSettlement,
        client_id: &str,
        wallet_id: &str,
    ) -> Result<()> {
        let asset_id = asset.transfer_asset(&self.params.usd_asset_id);
        let amount = asset.transfer_amount();

        let result = self
            .transfers
            .transfer_reserved_funds(wallet_id, &asset_id, amount, client_id, &asset.settlement_id)
            .await;

        match result {
            Ok(transaction_id) => {
                info!(settlement_id = %asset.settlement_id, asset = %asset_id, %amount, wallet_id, %transaction_id, "reserved funds transferred to client wallet");
                asset.transaction_id = Some(transaction_id);
                asset.status = AssetSettlementStatus::Transferred;
            }
            Err(failure) => asset.error = record_failure(&failure, &asset.settlement_id, "transfer reserved funds"),
        }

        self.repository.update_asset(asset).await
    }

    pub(super) async fn transfer_client_funds(&self, settlement: &mut Settlement) -> Result<()> {
        let current: &Settlement = settlement;
        let result: Result<String> = async {
            let asset = self.client_asset(current).await?;
            self.transfers
                .transfer_client_reserved_funds(&asset, current.amount, &current.client_id, &current.id)
                .await
        }
        .await;

        match result {
            Ok(transaction_id) => {
                info!(settlement_id = %settlement.id, amount = %settlement.amount, %transaction_id, "reserved client funds transferred to main wallet");
                settlement.transaction_id = Some(transaction_id);
                settlement.status = SettlementStatus::Transferred;
            }
            Err(failure) => settlement.error = record_failure(&failure, &settlement.id, "transfer client funds"),
        }

        self.repository.update(settlement).await
    }

    pub(super) async fn release_asset_funds(&self, asset: &mut AssetSettlement, client_id: &str) -> Result<()> {
        // manual assets were marked reserved without holding anything
        if asset.is_manual() {
            asset.status = AssetSettlementStatus::Cancelled;
            return self.repository.update_asset(asset).await;
        }

        let asset_id = asset.transfer_asset(&self.params.usd_asset_id);
        let amount = asset.transfer_amount();

        let result = self
            .transfers
            .release_reserved_funds(&asset_id, amount, client_id, &asset.settlement_id)
            .await;

        match result {
            Ok(()) => {
                asset.status = AssetSettlementStatus::Cancelled;
                asset.error = SettlementError::None;
                info!(settlement_id = %asset.settlement_id, asset = %asset_id, %amount, "reserved market maker funds released");
            }
            Err(failure) => asset.error = record_failure(&failure, &asset.settlement_id, "release reserved funds"),
        }

        self.repository.update_asset(asset).await
    }

    pub(super) async fn release_client_funds(&self, settlement: &mut Settlement) -> Result<()> {
        let current: &Settlement = settlement;
        let result: Result<()> = async {
            let asset = self.client_asset(current).await?;
            self.transfers
                .release_client_reserved_funds(
                    &current.wallet_id,
                    &asset,
                    current.amount,
                    &current.client_id,
                    &current.id,
                )
                .await
        }
        .await;

        match result {
            Ok(()) => {
                settlement.status = SettlementStatus::Rejected;
                settlement.error = SettlementError::None;
                info!(settlement_id = %settlement.id, amount = %settlement.amount, "reserved client funds released");
            }
            Err(failure) => settlement.error = record_failure(&failure, &settlement.id, "release client funds"),
        }

        self.repository.update(settlement).await
    }
}
