mod analyzer;
mod chart;
mod chat;
mod config;
mod coordinator;
mod engine;
mod error;
mod indicators;
mod market;
mod quality;
mod report;
mod scanner;
mod sensitivity;
mod simulator;
mod storage;
mod throttle;
mod types;

use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

use analyzer::AnalyzerRequest;
use chart::ChartGenerator;
use chat::TelegramChat;
use config::{EngineConfig, RuntimeConfigManager};
use coordinator::Coordinator;
use engine::EngineController;
use market::{BinanceMarketData, MarketDataPort};
use report::DailyReportScheduler;
use sensitivity::Sensitivity;
use simulator::Simulator;
use storage::Storage;
use throttle::Throttle;
use types::Symbol;

#[derive(Parser)]
#[command(name = "market-signal-engine")]
#[command(author = "Trading Bot")]
#[command(version = "0.1.0")]
#[command(about = "Continuously-running market signal engine with paper-trading simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose (debug) logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the scanner loop and keep running until interrupted
    Run,
    /// Run a single scan tick over the universe, then exit
    Once,
    /// Force one analyzer pass for a symbol and print the outcome
    TestSignal {
        /// Symbol to analyze, e.g. BTCUSDT
        symbol: String,
    },
    /// Print a throttle/last-admit/open-trade snapshot
    Health,
}

struct Runtime {
    config: Arc<RuntimeConfigManager>,
    controller: Arc<EngineController>,
    market: Arc<dyn MarketDataPort>,
    sensitivity: Arc<Sensitivity>,
    storage: Storage,
    coordinator: Arc<Coordinator>,
    scanner: scanner::Scanner,
    daily_report: Arc<DailyReportScheduler>,
}

async fn bootstrap() -> anyhow::Result<Runtime> {
    dotenvy::dotenv().ok();

    let config = EngineConfig::from_env().map_err(|errors| anyhow::anyhow!(errors.join("; ")))?;

    let storage = Storage::connect(&config.database_url).await?;
    let throttle = Throttle::load(&config.throttle_state_path).await?;
    let chart = ChartGenerator::new(config.charts_dir.clone());
    let sensitivity = Arc::new(Sensitivity::new());
    let market: Arc<dyn MarketDataPort> = Arc::new(BinanceMarketData::new());
    let controller = Arc::new(EngineController::new_running());
    let simulator = Simulator::new(storage.clone(), config.simulator.clone());

    let build_chat = |token: &Option<String>| -> Box<dyn chat::ChatPort> {
        match token {
            Some(token) => Box::new(TelegramChat::new(token.clone())),
            None => Box::new(chat::NullChat),
        }
    };
    if config.chat.bot_token.is_none() {
        warn!("TELEGRAM_BOT_TOKEN not set; admitted signals and reports will not be delivered to chat");
    }
    let chat = build_chat(&config.chat.bot_token);
    let report_chat = build_chat(&config.chat.bot_token);
    let daily_report = Arc::new(DailyReportScheduler::new(
        storage.clone(),
        report_chat,
        config.chat.default_chat_id.clone(),
        config.report.clone(),
    ));

    let manager = Arc::new(RuntimeConfigManager::new(config.clone()));

    let coordinator = Arc::new(Coordinator::new(
        storage.clone(),
        throttle,
        chart,
        chat,
        Arc::clone(&sensitivity),
        Arc::clone(&manager),
        simulator,
        config.daily_csv_path.clone().into(),
    ));

    let universe = resolve_universe(market.as_ref(), &config).await?;
    info!(count = universe.len(), "scan universe resolved");

    let scanner = scanner::Scanner::new(
        universe,
        config.scan.base_timeframe,
        config.scan.htf_timeframe,
        Duration::from_secs(config.scan.scan_interval_seconds),
        config.scan.concurrency,
        config.scan.per_symbol_min_gap,
    );

    Ok(Runtime {
        config: manager,
        controller,
        market,
        sensitivity,
        storage,
        coordinator,
        scanner,
        daily_report,
    })
}

/// When `SYMBOLS` is unset, the universe is derived once at startup from
/// `get_exchange_info()` filtered to tradable symbols and held fixed for the
/// process lifetime.
async fn resolve_universe(market: &dyn MarketDataPort, config: &EngineConfig) -> anyhow::Result<Vec<Symbol>> {
    if let Some(symbols) = &config.symbols {
        return Ok(symbols.iter().map(|s| Symbol::new(s.clone())).collect());
    }

    let info = market.get_exchange_info().await?;
    Ok(info
        .into_iter()
        .filter(|s| s.status == "TRADING")
        .map(|s| s.symbol)
        .collect())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();

    info!("market signal engine starting");

    match cli.command {
        Commands::Run => run().await,
        Commands::Once => once().await,
        Commands::TestSignal { symbol } => test_signal(&symbol).await,
        Commands::Health => health().await,
    }
}

async fn run() -> anyhow::Result<()> {
    let rt = bootstrap().await?;
    let controller = Arc::clone(&rt.controller);

    let report_handle = {
        let daily_report = Arc::clone(&rt.daily_report);
        let controller = Arc::clone(&controller);
        tokio::spawn(async move {
            daily_report.run(controller).await;
        })
    };

    let scan_handle = {
        let market = Arc::clone(&rt.market);
        let sensitivity = Arc::clone(&rt.sensitivity);
        let coordinator = Arc::clone(&rt.coordinator);
        let scan_controller = Arc::clone(&controller);
        let config = rt.config.get_config().await;
        let scanner = rt.scanner;
        tokio::spawn(async move {
            scanner
                .run(market, sensitivity, coordinator, scan_controller, config.starvation_window_hours)
                .await;
        })
    };

    tokio::select! {
        result = scan_handle => {
            if let Err(e) = result {
                error!(error = %e, "scanner task panicked");
            }
        }
        result = report_handle => {
            if let Err(e) = result {
                error!(error = %e, "daily report task panicked");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown requested");
        }
    }

    controller.stop().await;
    Ok(())
}

async fn once() -> anyhow::Result<()> {
    let rt = bootstrap().await?;
    let config = rt.config.get_config().await;

    rt.scanner
        .tick(&rt.market, &rt.sensitivity, &rt.coordinator, config.starvation_window_hours)
        .await;

    Ok(())
}

async fn test_signal(symbol: &str) -> anyhow::Result<()> {
    let rt = bootstrap().await?;
    let config = rt.config.get_config().await;
    let symbol = Symbol::new(symbol.to_uppercase());

    let request = AnalyzerRequest {
        symbol: &symbol,
        base_timeframe: config.scan.base_timeframe,
        htf_timeframe: config.scan.htf_timeframe,
        leverage: 10,
        strategy_tag: "midterm",
    };

    match analyzer::analyze(rt.market.as_ref(), rt.sensitivity.as_ref(), config.starvation_window_hours, request).await {
        Ok(output) => {
            println!(
                "{} {} entry {}-{} sl {} tp {:?}",
                symbol.as_str(),
                output.candidate.side,
                output.candidate.entry_range.0,
                output.candidate.entry_range.1,
                output.candidate.stop_loss,
                output.candidate.tp_levels
            );
            rt.coordinator.admit(output.candidate, output.recent_candles).await;
        }
        Err(e) => println!("{}: {}", symbol.as_str(), e),
    }

    Ok(())
}

async fn health() -> anyhow::Result<()> {
    let rt = bootstrap().await?;
    let state = rt.controller.state().await;
    println!("status: {}", state.status);
    println!("uptime_seconds: {}", state.uptime_seconds);
    println!("signals_admitted: {}", state.signals_admitted);

    let summary = simulator::Simulator::new(rt.storage.clone(), rt.config.get_config().await.simulator)
        .portfolio_summary()
        .await?;
    println!(
        "open: {} partial: {} closed: {} total_pnl_usd: {} win_rate_pct: {}",
        summary.open_count, summary.partial_count, summary.closed_count, summary.total_realized_pnl_usd, summary.win_rate_pct
    );

    Ok(())
}
