//! Index hedging simulation.
//!
//! Wires the engine to in-memory collaborators and walks through a hedge
//! cycle, a paused market maker, operator hedge actions and a full
//! settlement lifecycle.

use index_hedging_core::memory::{InMemoryBackend, RecordingExchangeAdapter};
use index_hedging_core::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::error::Error;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const HEDGE_EXCHANGE: &str = "kraken";

type SimResult = std::result::Result<(), Box<dyn Error>>;

#[tokio::main]
async fn main() -> SimResult {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    println!("Index Hedging Engine Simulation");
    println!("CRYPTO10 index, hedged on {}\n", HEDGE_EXCHANGE);

    scenario_1_hedge_cycle().await?;
    scenario_2_paused_market_maker().await?;
    scenario_3_manual_hedging().await?;
    scenario_4_settlement_lifecycle().await?;

    println!("\nAll simulations completed successfully.");
    Ok(())
}

struct Simulation {
    backend: InMemoryBackend,
    adapter: Arc<RecordingExchangeAdapter>,
    engine: HedgingEngine,
}

impl Simulation {
    async fn new(config: EngineConfig) -> std::result::Result<Self, Box<dyn Error>> {
        let backend = InMemoryBackend::default();

        backend.index_settings.add(IndexSettings {
            name: "CRYPTO10".into(),
            asset_id: AssetId::from("C10"),
            asset_pair_id: AssetPairId::from("C10USD"),
            is_short: false,
        });
        for pair in ["BTCUSD", "ETHUSD", "C10USD"] {
            backend.instruments.add_asset_pair(pair);
        }
        backend.instruments.add_asset("C10", HOME_EXCHANGE, "C10");
        backend.instruments.add_asset("USD", HOME_EXCHANGE, "USD");
        backend.balances.set(HOME_EXCHANGE, "USD", dec!(1000000), Decimal::ZERO);

        let mut token = Token::new(AssetId::from("C10"));
        token.open_volume = dec!(100);
        backend.tokens.set(token);

        let adapter = Arc::new(RecordingExchangeAdapter::new(HEDGE_EXCHANGE));
        let exchanges = ExchangeAdapterRegistry::new(vec![adapter.clone() as Arc<dyn ExchangeAdapter>]);
        let engine = HedgingEngine::start(backend.collaborators(), exchanges, config)?;

        for (asset, mode) in [("BTC", AssetHedgeMode::Auto), ("ETH", AssetHedgeMode::Auto)] {
            hedge_on(&engine, asset, mode).await?;
        }

        engine
            .quotes
            .update(Quote::new(HEDGE_EXCHANGE, "BTCUSD".into(), Timestamp::now(), dec!(49990), dec!(50010)))
            .await?;
        engine
            .quotes
            .update(Quote::new(HEDGE_EXCHANGE, "ETHUSD".into(), Timestamp::now(), dec!(2999), dec!(3001)))
            .await?;

        Ok(Self {
            backend,
            adapter,
            engine,
        })
    }
}

async fn hedge_on(engine: &HedgingEngine, asset: &str, mode: AssetHedgeMode) -> SimResult {
    let asset_id = AssetId::from(asset);
    let mut settings = engine.asset_hedge_settings.ensure(&asset_id).await?;
    settings.exchange = HEDGE_EXCHANGE.to_string();
    settings.mode = mode;
    settings.min_volume = dec!(0.0001);
    settings.volume_accuracy = 4;
    settings.price_accuracy = 2;
    engine.asset_hedge_settings.update(settings).await?;
    Ok(())
}

fn crypto10(btc: Decimal, eth: Decimal) -> Index {
    Index::new(
        "CRYPTO10",
        Timestamp::now(),
        dec!(1000),
        vec![
            AssetWeight::new("BTC", dec!(0.6), btc),
            AssetWeight::new("ETH", dec!(0.4), eth),
        ],
    )
}

/// Index inventory turned into hedge orders, then a fill that neutralizes it.
async fn scenario_1_hedge_cycle() -> SimResult {
    println!("Scenario 1: Hedge Cycle\n");

    let sim = Simulation::new(EngineConfig::default()).await?;

    println!("  Market maker holds 100 C10 at index value 1000");
    sim.engine
        .market_maker
        .handle_index(crypto10(dec!(50000), dec!(3000)), None)
        .await?;

    for investment in sim.engine.hedge.latest_investments() {
        println!(
            "  {}: target ${}, positions ${}, remaining ${}",
            investment.asset_id, investment.target_amount, investment.position_amount, investment.remaining_amount
        );
    }

    for order in sim.adapter.executed() {
        println!(
            "  Sent {} {} {} @ ${} ({:?})",
            order.side, order.volume, order.asset_id, order.price, order.price_type
        );
        sim.backend
            .positions
            .apply_trade(&order.asset_id, &order.exchange, order.side, order.volume, order.price);
    }

    sim.adapter.clear();
    sim.engine
        .market_maker
        .handle_index(crypto10(dec!(50000), dec!(3000)), None)
        .await?;

    println!("\n  After the fills:");
    for investment in sim.engine.hedge.latest_investments() {
        println!("  {}: remaining ${}", investment.asset_id, investment.remaining_amount);
    }
    println!("  Orders sent: {}, cancels sent: {}\n", sim.adapter.executed().len(), sim.adapter.cancelled().len());

    sim.engine.shutdown();
    Ok(())
}

/// Paused: hedge settings are still created for new constituents, nothing is traded.
async fn scenario_2_paused_market_maker() -> SimResult {
    println!("Scenario 2: Paused Market Maker\n");

    let sim = Simulation::new(EngineConfig::default()).await?;

    sim.engine
        .market_maker
        .handle_state_change(MarketMakerStatus::Paused, "maintenance", "ops")
        .await?;

    let mut index = crypto10(dec!(50000), dec!(3000));
    index.weights = vec![
        AssetWeight::new("BTC", dec!(0.5), dec!(50000)),
        AssetWeight::new("ETH", dec!(0.3), dec!(3000)),
        AssetWeight::new("SOL", dec!(0.2), dec!(150)),
    ];
    sim.engine.market_maker.handle_index(index, None).await?;

    let sol = sim.engine.asset_hedge_settings.get_by_asset_id(&AssetId::from("SOL")).await?;
    println!("  SOL hedge settings created while paused: {:?}", sol.map(|s| s.mode));
    println!("  Orders sent: {}", sim.adapter.executed().len());
    println!("  Market maker calls: {:?}\n", sim.backend.market_maker.calls());

    sim.engine.shutdown();
    Ok(())
}

/// Operator orders on a Manual asset and a position close.
async fn scenario_3_manual_hedging() -> SimResult {
    println!("Scenario 3: Manual Hedging\n");

    let sim = Simulation::new(EngineConfig::default()).await?;
    hedge_on(&sim.engine, "ETH", AssetHedgeMode::Manual).await?;

    let order = sim
        .engine
        .market_maker
        .create_limit_order(ManualOrderRequest {
            asset_id: AssetId::from("ETH"),
            exchange: HEDGE_EXCHANGE.into(),
            side: Side::Sell,
            price: dec!(3005),
            volume: dec!(2),
            user_id: "ops".into(),
        })
        .await?;
    println!("  Manual order {} {} ETH @ ${}", order.side, order.volume, order.price);

    sim.backend
        .positions
        .apply_trade(&order.asset_id, HEDGE_EXCHANGE, order.side, order.volume, order.price);

    let close = sim
        .engine
        .market_maker
        .close_position(AssetId::from("ETH"), HEDGE_EXCHANGE, "ops")
        .await?;
    println!("  Close order {} {} ETH @ ${}", close.side, close.volume, close.price);

    sim.backend
        .positions
        .apply_trade(&AssetId::from("BTC"), HEDGE_EXCHANGE, Side::Sell, dec!(1), dec!(50000));
    let rejected = sim
        .engine
        .market_maker
        .close_position(AssetId::from("BTC"), HEDGE_EXCHANGE, "ops")
        .await;
    println!("  Close on an Auto asset: {}\n", rejected.err().map(|e| e.to_string()).unwrap_or_default());

    sim.engine.shutdown();
    Ok(())
}

/// Redemption of 2 C10 settled in USD, driven by settlement ticks.
async fn scenario_4_settlement_lifecycle() -> SimResult {
    println!("Scenario 4: Settlement Lifecycle\n");

    let sim = Simulation::new(EngineConfig::development()).await?;
    sim.engine
        .market_maker
        .handle_index(crypto10(dec!(50000), dec!(3000)), None)
        .await?;

    let settlement = sim
        .engine
        .settlements
        .create(CreateSettlement {
            index_name: "CRYPTO10".into(),
            amount: dec!(2),
            comment: "redemption".into(),
            wallet_id: "wallet-1".into(),
            client_id: "client-1".into(),
            user_id: "ops".into(),
            is_direct: false,
        })
        .await?;

    println!("  Settlement {} for ${}", settlement.id, settlement.usd_amount());
    for asset in &settlement.assets {
        println!(
            "  {}: {} @ ${} (direct: {}, external: {})",
            asset.asset_id, asset.amount, asset.price, asset.is_direct, asset.is_external
        );
    }

    sim.engine.settlements.approve(&settlement.id, "ops").await?;
    sim.engine.market_maker.execute_settlements().await?;

    let settled = sim.engine.settlements.get_by_id(&settlement.id).await?;
    println!("\n  Status after one tick: {:?}", settled.status);
    println!("  Transfers: {}", sim.backend.fund_transfers.records().len());
    if let Some(token) = sim.backend.tokens.get(&AssetId::from("C10")) {
        println!("  C10 inventory: {}", token.open_volume);
    }

    sim.engine.shutdown();
    Ok(())
}
