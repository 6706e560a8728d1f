// 6.0 exchange.rs: exchange adapter contract and the registry the hedge service dispatches through.
// 6.1 the registry is fixed at startup. an absent adapter is a normal lookup miss, not a fault.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::order::HedgeLimitOrder;
use crate::types::AssetId;

#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Replaces the live hedge order of the asset.
    async fn execute_limit_order(&self, order: &HedgeLimitOrder) -> Result<()>;

    async fn cancel_limit_order(&self, asset_id: &AssetId) -> Result<()>;
}

#[derive(Clone, Default)]
pub struct ExchangeAdapterRegistry {
    adapters: BTreeMap<String, Arc<dyn ExchangeAdapter>>,
}

impl ExchangeAdapterRegistry {
    pub fn new(adapters: Vec<Arc<dyn ExchangeAdapter>>) -> Self {
        Self {
            adapters: adapters
                .into_iter()
                .map(|adapter| (adapter.name().to_string(), adapter))
                .collect(),
        }
    }

    pub fn get(&self, exchange: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.adapters.get(exchange).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::RecordingExchangeAdapter;

    #[test]
    fn lookup_by_name() {
        let registry = ExchangeAdapterRegistry::new(vec![
            Arc::new(RecordingExchangeAdapter::new("kraken")),
            Arc::new(RecordingExchangeAdapter::new("bitstamp")),
        ]);

        assert!(registry.get("kraken").is_some());
        assert!(registry.get("binance").is_none());
        assert_eq!(registry.names(), vec!["bitstamp".to_string(), "kraken".to_string()]);
    }
}
