//! Market maker orchestrator.
//!
//! One actor task owns the gate: index recalculations, internal trade batches,
//! state changes, settlement ticks and operator hedge actions all travel
//! through a single FIFO inbox and run one at a time. Callers hold a cloneable
//! [`MarketMakerHandle`] and await a oneshot reply, so failures reach the
//! event source instead of vanishing.
//!
//! The parts of index handling that need no serialization (state check,
//! hedge settings auto-creation while paused, synthetic quote refresh) run on
//! the caller's task before the event is queued.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::error::{HedgeError, Result};
use crate::hedge::HedgeService;
use crate::hedge_settings::AssetHedgeSettingsService;
use crate::index::{Index, IndexSettings, InternalTrade, MarketMakerStatus};
use crate::order::HedgeLimitOrder;
use crate::quote::QuoteStore;
use crate::services::{
    Collaborators, IndexPriceService, IndexSettingsService, InternalTradeService, MarketMakerService,
    MarketMakerStateService, TokenService,
};
use crate::settlement::SettlementService;
use crate::types::{AssetId, Side};

type Reply<T> = oneshot::Sender<Result<T>>;

#[derive(Debug, Clone, PartialEq)]
pub struct ManualOrderRequest {
    pub asset_id: AssetId,
    pub exchange: String,
    pub side: Side,
    pub price: Decimal,
    pub volume: Decimal,
    pub user_id: String,
}

enum Command {
    Index {
        index: Index,
        short_index: Option<(Index, IndexSettings)>,
        reply: Reply<()>,
    },
    InternalTrades {
        trades: Vec<InternalTrade>,
        reply: Reply<()>,
    },
    StateChange {
        status: MarketMakerStatus,
        comment: String,
        user_id: String,
        reply: Reply<()>,
    },
    SettlementTick {
        reply: Reply<()>,
    },
    CreateLimitOrder {
        request: ManualOrderRequest,
        reply: Reply<HedgeLimitOrder>,
    },
    CancelLimitOrder {
        asset_id: AssetId,
        exchange: String,
        user_id: String,
        reply: Reply<()>,
    },
    ClosePosition {
        asset_id: AssetId,
        exchange: String,
        user_id: String,
        reply: Reply<HedgeLimitOrder>,
    },
}

/// State owned by the actor task.
pub struct MarketMaker {
    index_prices: Arc<dyn IndexPriceService>,
    index_settings: Arc<dyn IndexSettingsService>,
    internal_trades: Arc<dyn InternalTradeService>,
    tokens: Arc<dyn TokenService>,
    market_maker: Arc<dyn MarketMakerService>,
    state: Arc<dyn MarketMakerStateService>,
    hedge: Arc<HedgeService>,
    settlements: Arc<SettlementService>,
}

impl MarketMaker {
    pub fn new(collaborators: &Collaborators, hedge: Arc<HedgeService>, settlements: Arc<SettlementService>) -> Self {
        Self {
            index_prices: collaborators.index_prices.clone(),
            index_settings: collaborators.index_settings.clone(),
            internal_trades: collaborators.internal_trades.clone(),
            tokens: collaborators.tokens.clone(),
            market_maker: collaborators.market_maker.clone(),
            state: collaborators.market_maker_state.clone(),
            hedge,
            settlements,
        }
    }

    /// Starts the actor. The task ends once every handle is dropped.
    pub fn spawn(
        self,
        collaborators: &Collaborators,
        asset_hedge_settings: Arc<AssetHedgeSettingsService>,
        quotes: Arc<QuoteStore>,
        capacity: usize,
    ) -> (MarketMakerHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        let handle = MarketMakerHandle {
            tx,
            state: collaborators.market_maker_state.clone(),
            index_settings: collaborators.index_settings.clone(),
            asset_hedge_settings,
            quotes,
        };

        let task = tokio::spawn(self.run(rx));
        (handle, task)
    }

    async fn run(self, mut rx: mpsc::Receiver<Command>) {
        info!("market maker started");

        while let Some(command) = rx.recv().await {
            self.dispatch(command).await;
        }

        info!("market maker stopped");
    }

    async fn dispatch(&self, command: Command) {
        // a dropped receiver only means the caller stopped waiting
        match command {
            Command::Index {
                index,
                short_index,
                reply,
            } => {
                let _ = reply.send(self.process_index(&index, short_index.as_ref()).await);
            }
            Command::InternalTrades { trades, reply } => {
                let _ = reply.send(self.process_internal_trades(&trades).await);
            }
            Command::StateChange {
                status,
                comment,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.change_state(status, &comment, &user_id).await);
            }
            Command::SettlementTick { reply } => {
                let _ = reply.send(self.settlements.execute().await);
            }
            Command::CreateLimitOrder { request, reply } => {
                let result = self
                    .hedge
                    .create_limit_order(
                        &request.asset_id,
                        &request.exchange,
                        request.side,
                        request.price,
                        request.volume,
                        &request.user_id,
                    )
                    .await;
                let _ = reply.send(result);
            }
            Command::CancelLimitOrder {
                asset_id,
                exchange,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.hedge.cancel_limit_order(&asset_id, &exchange, &user_id).await);
            }
            Command::ClosePosition {
                asset_id,
                exchange,
                user_id,
                reply,
            } => {
                let _ = reply.send(self.hedge.close_position(&asset_id, &exchange, &user_id).await);
            }
        }
    }

    async fn process_index(&self, index: &Index, short_index: Option<&(Index, IndexSettings)>) -> Result<()> {
        match self.recalculate(index, short_index).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_invalid_operation() => {
                warn!(index = %index.name, error = %e, "an error occurred while processing index");
                Ok(())
            }
            Err(e) => {
                error!(index = %index.name, error = %e, "an error occurred while processing index");
                Err(e)
            }
        }
    }

    // 11.1: both index prices, then the hedge cycle, then both market maker order books
    async fn recalculate(&self, index: &Index, short_index: Option<&(Index, IndexSettings)>) -> Result<()> {
        let short = short_index.map(|(short, _)| short);

        tokio::try_join!(self.index_prices.update(index), async {
            match short {
                Some(short) => self.index_prices.update(short).await,
                None => Ok(()),
            }
        })?;

        self.hedge.update_limit_orders().await?;

        tokio::try_join!(self.market_maker.update_limit_orders(&index.name), async {
            match short {
                Some(short) => self.market_maker.update_limit_orders(&short.name).await,
                None => Ok(()),
            }
        })?;

        Ok(())
    }

    async fn process_internal_trades(&self, trades: &[InternalTrade]) -> Result<()> {
        let indices = self.index_settings.get_all().await?;

        for trade in trades {
            let Some(settings) = indices.iter().find(|s| s.asset_pair_id == trade.asset_pair_id) else {
                debug!(trade_id = %trade.id, pair = %trade.asset_pair_id, "internal trade for unknown index ignored");
                continue;
            };

            self.internal_trades.register(trade).await?;
            self.tokens.update_volume(&settings.asset_id, trade).await?;

            info!(
                trade_id = %trade.id,
                index = %settings.name,
                side = %trade.side,
                price = %trade.price,
                volume = %trade.volume,
                "internal trade registered"
            );
        }

        Ok(())
    }

    async fn change_state(&self, status: MarketMakerStatus, comment: &str, user_id: &str) -> Result<()> {
        self.state.update(status, comment, user_id).await?;

        info!(?status, comment, user_id, "market maker state changed");

        if status != MarketMakerStatus::Active {
            for settings in self.index_settings.get_all().await? {
                self.market_maker.cancel_limit_orders(&settings.name).await?;
            }
        }

        Ok(())
    }
}

#[derive(Clone)]
pub struct MarketMakerHandle {
    tx: mpsc::Sender<Command>,
    state: Arc<dyn MarketMakerStateService>,
    index_settings: Arc<dyn IndexSettingsService>,
    asset_hedge_settings: Arc<AssetHedgeSettingsService>,
    quotes: Arc<QuoteStore>,
}

impl MarketMakerHandle {
    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();

        self.tx
            .send(command(reply))
            .await
            .map_err(|_| HedgeError::service("market maker is stopped"))?;

        response
            .await
            .map_err(|_| HedgeError::service("market maker dropped the request"))?
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Index tick, with the optional short companion index published alongside it.
    pub async fn handle_index(&self, index: Index, short_index: Option<Index>) -> Result<()> {
        let state = self.state.get().await?;
        let settings = self.index_settings.get_by_index(&index.name).await?;

        if !state.is_active() {
            // keep hedge settings current while paused, nothing else
            if settings.is_some() {
                for weight in &index.weights {
                    self.asset_hedge_settings.ensure(&weight.asset_id).await?;
                }
            }
            debug!(index = %index.name, status = ?state.status, "market maker is not active, index skipped");
            return Ok(());
        }

        self.quotes.handle_index(&index);

        if settings.is_none() {
            return Ok(());
        }

        let short_index = match short_index {
            Some(short) => self
                .index_settings
                .get_by_index(&short.name)
                .await?
                .map(|short_settings| (short, short_settings)),
            None => None,
        };

        self.request(|reply| Command::Index {
            index,
            short_index,
            reply,
        })
        .await
    }

    pub async fn handle_internal_trades(&self, trades: Vec<InternalTrade>) -> Result<()> {
        self.request(|reply| Command::InternalTrades { trades, reply }).await
    }

    pub async fn handle_state_change(&self, status: MarketMakerStatus, comment: &str, user_id: &str) -> Result<()> {
        let comment = comment.to_string();
        let user_id = user_id.to_string();
        self.request(|reply| Command::StateChange {
            status,
            comment,
            user_id,
            reply,
        })
        .await
    }

    /// One settlement pass, serialized with the hedge cycle.
    pub async fn execute_settlements(&self) -> Result<()> {
        self.request(|reply| Command::SettlementTick { reply }).await
    }

    pub async fn create_limit_order(&self, request: ManualOrderRequest) -> Result<HedgeLimitOrder> {
        self.request(|reply| Command::CreateLimitOrder { request, reply }).await
    }

    pub async fn cancel_limit_order(&self, asset_id: AssetId, exchange: &str, user_id: &str) -> Result<()> {
        let exchange = exchange.to_string();
        let user_id = user_id.to_string();
        self.request(|reply| Command::CancelLimitOrder {
            asset_id,
            exchange,
            user_id,
            reply,
        })
        .await
    }

    pub async fn close_position(&self, asset_id: AssetId, exchange: &str, user_id: &str) -> Result<HedgeLimitOrder> {
        let exchange = exchange.to_string();
        let user_id = user_id.to_string();
        self.request(|reply| Command::ClosePosition {
            asset_id,
            exchange,
            user_id,
            reply,
        })
        .await
    }
}

/// Drives settlement ticks through the inbox until the market maker stops.
pub fn spawn_settlement_timer(handle: MarketMakerHandle, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if handle.is_closed() {
                break;
            }

            if let Err(e) = handle.execute_settlements().await {
                error!(error = %e, "settlement pass failed");
            }
        }

        debug!("settlement timer stopped");
    })
}
