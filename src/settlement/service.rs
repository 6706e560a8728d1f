//! Operator-driven settlement calls: create, recalculate, approve, reject,
//! retry, asset edits and manual execution.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::model::{
    calculate_asset_settlements, AssetSettlement, AssetSettlementStatus, ConstituentPricing, Settlement,
    SettlementError, SettlementStatus,
};
use super::SettlementService;
use crate::error::{HedgeError, Result};
use crate::index::AssetWeight;
use crate::types::{AssetId, Timestamp};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateSettlement {
    pub index_name: String,
    pub amount: Decimal,
    pub comment: String,
    pub wallet_id: String,
    pub client_id: String,
    pub user_id: String,
    pub is_direct: bool,
}

const RETRYABLE: [SettlementStatus; 3] = [
    SettlementStatus::Approved,
    SettlementStatus::Reserved,
    SettlementStatus::Processed,
];

fn holds_reservation(asset: &AssetSettlement) -> bool {
    matches!(
        asset.status,
        AssetSettlementStatus::Reserved | AssetSettlementStatus::Processed
    )
}

impl SettlementService {
    pub async fn create(&self, request: CreateSettlement) -> Result<Settlement> {
        if request.amount <= Decimal::ZERO {
            return Err(HedgeError::invalid_operation("settlement amount must be positive"));
        }

        let index_price = self
            .index_prices
            .get_by_index(&request.index_name)
            .await?
            .ok_or_else(|| HedgeError::invalid_operation("index price not found"))?;

        let mut settlement = Settlement {
            id: Uuid::new_v4().to_string(),
            index_name: request.index_name,
            amount: request.amount,
            price: index_price.price,
            wallet_id: request.wallet_id,
            client_id: request.client_id,
            comment: request.comment,
            is_direct: request.is_direct,
            status: SettlementStatus::New,
            error: SettlementError::None,
            created_by: request.user_id,
            created_at: Timestamp::now(),
            transaction_id: None,
            assets: Vec::new(),
        };

        settlement.assets = self.calculate_assets(&settlement, &index_price.weights).await?;
        self.validate_balance(&mut settlement).await?;

        self.repository.insert(&settlement).await?;

        info!(
            settlement_id = %settlement.id,
            index = %settlement.index_name,
            amount = %settlement.amount,
            price = %settlement.price,
            client_id = %settlement.client_id,
            assets = settlement.assets.len(),
            "settlement created"
        );

        Ok(settlement)
    }

    pub async fn recalculate(&self, settlement_id: &str, user_id: &str) -> Result<Settlement> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        if settlement.status != SettlementStatus::New {
            return Err(HedgeError::invalid_operation("only new settlement can be recalculated"));
        }

        let index_price = self
            .index_prices
            .get_by_index(&settlement.index_name)
            .await?
            .ok_or_else(|| HedgeError::invalid_operation("index price not found"))?;

        settlement.price = index_price.price;
        settlement.assets = self.calculate_assets(&settlement, &index_price.weights).await?;
        self.validate_balance(&mut settlement).await?;

        self.repository.replace(&settlement).await?;

        info!(settlement_id, price = %settlement.price, user_id, "settlement recalculated");
        Ok(settlement)
    }

    pub async fn approve(&self, settlement_id: &str, user_id: &str) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        if settlement.status != SettlementStatus::New {
            return Err(HedgeError::invalid_operation("only new settlement can be approved"));
        }

        settlement.status = SettlementStatus::Approved;
        self.repository.update(&settlement).await?;

        info!(settlement_id, user_id, "settlement approved");
        Ok(())
    }

    /// Releases whatever was reserved, then marks the settlement rejected. A failed release
    /// leaves the status as it is with the error recorded on the settlement.
    pub async fn reject(&self, settlement_id: &str, user_id: &str) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        let allowed = matches!(
            settlement.status,
            SettlementStatus::New | SettlementStatus::Approved | SettlementStatus::Reserved
        );

        if !allowed || settlement.has_transferred_assets() {
            return Err(HedgeError::invalid_operation("settlement can not be rejected"));
        }

        // processed assets still hold their reservation until the transfer phase
        let client_id = settlement.client_id.clone();
        for asset in settlement.assets.iter_mut().filter(|a| holds_reservation(a)) {
            self.release_asset_funds(asset, &client_id).await?;
        }

        let failed_release = settlement
            .assets
            .iter()
            .find(|a| holds_reservation(a) && a.has_error())
            .map(|a| a.error);

        if let Some(error) = failed_release {
            settlement.error = error;
            self.repository.update(&settlement).await?;
            info!(settlement_id, user_id, ?error, "settlement rejection halted by a failed release");
            return Ok(());
        }

        if settlement.status == SettlementStatus::Reserved {
            self.release_client_funds(&mut settlement).await?;
        } else {
            settlement.status = SettlementStatus::Rejected;
            self.repository.update(&settlement).await?;
        }

        info!(settlement_id, user_id, status = ?settlement.status, "settlement rejected");
        Ok(())
    }

    /// Clears the settlement error. The status is left alone; the next phase pass retries.
    pub async fn retry(&self, settlement_id: &str, user_id: &str) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        if !RETRYABLE.contains(&settlement.status) {
            return Err(HedgeError::invalid_operation("can not retry settlement"));
        }

        settlement.error = SettlementError::None;
        self.repository.update(&settlement).await?;

        info!(settlement_id, user_id, status = ?settlement.status, "settlement retry");
        Ok(())
    }

    pub async fn retry_asset(&self, settlement_id: &str, asset_id: &AssetId, user_id: &str) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;
        let status = settlement.status;

        let asset = settlement
            .get_asset_mut(asset_id)
            .ok_or_else(|| HedgeError::invalid_operation("asset not found"))?;

        let asset_retryable = matches!(
            asset.status,
            AssetSettlementStatus::New | AssetSettlementStatus::Reserved | AssetSettlementStatus::Processed
        );

        if !RETRYABLE.contains(&status) || !asset_retryable {
            return Err(HedgeError::invalid_operation("can not retry asset"));
        }

        asset.error = SettlementError::None;
        self.repository.update_asset(asset).await?;

        info!(settlement_id, asset = %asset_id, user_id, status = ?asset.status, "asset settlement retry");
        Ok(())
    }

    pub async fn update_asset(
        &self,
        settlement_id: &str,
        asset_id: &AssetId,
        amount: Decimal,
        is_direct: bool,
        is_external: bool,
        user_id: &str,
    ) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        if settlement.status != SettlementStatus::New {
            return Err(HedgeError::invalid_operation("only new settlement can be updated"));
        }

        if amount < Decimal::ZERO {
            return Err(HedgeError::invalid_operation("asset amount must not be negative"));
        }

        settlement
            .get_asset_mut(asset_id)
            .ok_or_else(|| HedgeError::invalid_operation("asset not found"))?
            .update(amount, is_direct, is_external);

        self.validate_balance(&mut settlement).await?;
        self.repository.replace(&settlement).await?;

        info!(settlement_id, asset = %asset_id, %amount, is_direct, is_external, user_id, "asset settlement updated");
        Ok(())
    }

    /// Re-runs balance validation on a new settlement against current balances.
    pub async fn validate(&self, settlement_id: &str, user_id: &str) -> Result<Settlement> {
        let mut settlement = self.get_by_id(settlement_id).await?;

        if settlement.status != SettlementStatus::New {
            return Err(HedgeError::invalid_operation("only new settlement can be validated"));
        }

        self.validate_balance(&mut settlement).await?;
        self.repository.replace(&settlement).await?;

        info!(settlement_id, user_id, "settlement validated");
        Ok(settlement)
    }

    /// Confirms an off-band execution of a direct external asset.
    pub async fn execute_asset(
        &self,
        settlement_id: &str,
        asset_id: &AssetId,
        actual_amount: Decimal,
        actual_price: Decimal,
        user_id: &str,
    ) -> Result<()> {
        let mut settlement = self.get_by_id(settlement_id).await?;
        let status = settlement.status;

        let asset = settlement
            .get_asset_mut(asset_id)
            .ok_or_else(|| HedgeError::invalid_operation("asset not found"))?;

        if !asset.is_manual() {
            return Err(HedgeError::invalid_operation(
                "only direct external assets can be manually executed",
            ));
        }

        if status != SettlementStatus::Processed || asset.status != AssetSettlementStatus::Processed {
            return Err(HedgeError::invalid_operation("can not execute asset"));
        }

        asset.actual_amount = actual_amount;
        asset.actual_price = actual_price;
        asset.status = AssetSettlementStatus::Transferred;
        self.repository.update_asset(asset).await?;

        info!(settlement_id, asset = %asset_id, %actual_amount, %actual_price, user_id, "asset settlement executed");
        Ok(())
    }

    async fn calculate_assets(&self, settlement: &Settlement, weights: &[AssetWeight]) -> Result<Vec<AssetSettlement>> {
        let mut constituents = Vec::with_capacity(weights.len());

        for weight in weights {
            let settings = self.asset_hedge_settings.ensure(&weight.asset_id).await?;
            let mid = self
                .quotes
                .get(&settings.exchange, &settings.asset_pair_id)
                .map(|q| q.mid);

            constituents.push(ConstituentPricing {
                asset_id: weight.asset_id.clone(),
                weight: weight.weight,
                mid,
                hedge_exchange: settings.exchange,
            });
        }

        Ok(calculate_asset_settlements(
            settlement,
            &constituents,
            self.params.min_direct_weight,
        ))
    }
}
