//! Momentum Screener — stock momentum analysis for NSE equities
//!
//! Usage:
//!   momentum-screener serve --port 5000        — Launch the JSON API
//!   momentum-screener update                   — Fetch prices and recompute signals
//!   momentum-screener screen --top 20          — Print the ranked universe
//!   momentum-screener forecast INFY            — Monte Carlo forecast for one stock

mod convert;
mod jobs;
mod routes;
mod universe;

use clap::{Parser, Subcommand};
use engine::{
    detect_gems, forecast_prices, generate_signals, EngineConfig, SignalType, YahooFinanceClient,
};
use persistence::repository::{AnalysisRepository, PriceRepository};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use routes::{AppState, APP_VERSION};

#[derive(Parser)]
#[command(name = "momentum-screener")]
#[command(about = "Momentum screening, signals and forecasts for NSE stocks", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the JSON API server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 5000)]
        port: u16,
    },
    /// Fetch latest prices and recompute indicators and signals
    Update {
        /// Symbols to update (comma-separated, default: full universe)
        #[arg(long, value_delimiter = ',')]
        symbols: Vec<String>,
    },
    /// Print the ranked universe from stored snapshots
    Screen {
        /// Number of rows to print
        #[arg(long, default_value_t = 20)]
        top: usize,
        /// Only this signal type (strong_buy, buy, hold, sell, avoid)
        #[arg(long)]
        signal: Option<String>,
        /// Print hidden gems instead of the momentum ranking
        #[arg(long)]
        gems: bool,
    },
    /// Run a Monte Carlo forecast for one symbol
    Forecast {
        symbol: String,
        /// Trading days to project
        #[arg(long)]
        days: Option<usize>,
        /// Number of simulated paths
        #[arg(long)]
        simulations: Option<usize>,
        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,
    },
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,momentum_screener=debug")
    } else {
        EnvFilter::new("info,engine=info,momentum_screener=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

fn db_path() -> String {
    std::env::var("MOMENTUM_DB_PATH").unwrap_or_else(|_| "data/momentum.db".to_string())
}

/// Engine configuration from `MOMENTUM_CONFIG`, or the built-in defaults
fn load_config() -> anyhow::Result<EngineConfig> {
    match std::env::var("MOMENTUM_CONFIG") {
        Ok(path) => {
            let config = EngineConfig::load(&path)?;
            info!("Configuration loaded: {}", path);
            Ok(config)
        }
        Err(_) => Ok(EngineConfig::default()),
    }
}

async fn open_database() -> anyhow::Result<persistence::Database> {
    let path = db_path();
    let db = persistence::Database::new(&path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", path);
    Ok(db)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = load_config()?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(&host, port, config).await?;
        }
        Commands::Update { symbols } => {
            cmd_update(symbols, config).await?;
        }
        Commands::Screen { top, signal, gems } => {
            cmd_screen(top, signal, gems, config).await?;
        }
        Commands::Forecast {
            symbol,
            days,
            simulations,
            seed,
        } => {
            cmd_forecast(&symbol, days, simulations, seed, config).await?;
        }
    }

    Ok(())
}

// ============================================================================
// Serve command — Axum web server
// ============================================================================

async fn cmd_serve(host: &str, port: u16, config: EngineConfig) -> anyhow::Result<()> {
    info!("Momentum Screener v{} starting...", APP_VERSION);

    let db = open_database().await?;
    let state = AppState {
        db: Arc::new(db),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = axum::Router::new()
        .nest("/api", routes::router(state))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Momentum Screener v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/screener            - Stock rankings");
    println!("  GET  /api/stock/:symbol       - Stock details");
    println!("  GET  /api/signals             - Signal recommendations");
    println!("  GET  /api/gems                - Hidden gems");
    println!("  GET  /api/forecast/:symbol    - Monte Carlo forecast");
    println!("  GET  /api/trend/:symbol       - Linear trend projection");
    println!("  GET  /api/volatility/:symbol  - Volatility analysis");
    println!("  GET  /api/sectors             - Sector analysis");
    println!("  GET  /api/top-movers          - Top gainers and losers");
    println!("  GET  /api/search              - Search stocks");
    println!("  GET  /api/benchmark           - Benchmark index");
    println!("  GET  /api/market-overview     - Market overview");
    println!("\n  Database: {}", db_path());
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Update command — daily job, triggered externally (cron)
// ============================================================================

async fn cmd_update(symbols: Vec<String>, config: EngineConfig) -> anyhow::Result<()> {
    let db = open_database().await?;
    let symbols = if symbols.is_empty() {
        universe::symbols()
    } else {
        symbols.iter().map(|s| universe::normalize_symbol(s)).collect()
    };

    info!(symbols = symbols.len(), "Daily update started");
    let client = YahooFinanceClient::new();
    let summary = jobs::run_update(&db, &client, &config, &symbols).await?;

    println!(
        "\nUpdate complete: {}/{} fetched, {} screened, {} analysis errors",
        summary.fetched, summary.requested, summary.screened, summary.analysis_errors
    );
    if !summary.fetch_failures.is_empty() {
        println!("Failed to fetch: {}", summary.fetch_failures.join(", "));
    }

    Ok(())
}

// ============================================================================
// Screen command — print stored rankings
// ============================================================================

async fn cmd_screen(
    top: usize,
    signal: Option<String>,
    gems: bool,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let filter = match signal.as_deref() {
        Some(s) => Some(
            SignalType::parse(s).ok_or_else(|| anyhow::anyhow!("Unknown signal type: {}", s))?,
        ),
        None => None,
    };

    let db = open_database().await?;
    let rows = AnalysisRepository::new(db.pool())
        .latest_indicators(500)
        .await?;
    if rows.is_empty() {
        println!("No data available. Run `momentum-screener update` first.");
        return Ok(());
    }

    let snapshots: Vec<_> = rows.iter().map(convert::stock_snapshot).collect();
    let signals = generate_signals(&snapshots, &config.weights, &config.thresholds);

    if gems {
        let scored: Vec<_> = signals.into_iter().map(|s| s.stock).collect();
        let found = detect_gems(&scored);
        println!("\nHidden gems ({} found):", found.len());
        println!(
            "  {:>3}  {:<16} {:<18} {:>5} {:>6} {:<7}",
            "#", "Symbol", "Type", "Score", "RSI", "Risk"
        );
        println!("  {}", "-".repeat(62));
        for (i, g) in found.iter().take(top).enumerate() {
            println!(
                "  {:>3}  {:<16} {:<18} {:>5} {:>6.1} {:<7}",
                i + 1,
                g.stock.info.symbol,
                g.gem_type.to_string(),
                g.gem_score,
                g.stock.snapshot().rsi.unwrap_or_default(),
                format!("{:?}", g.risk_level),
            );
        }
        return Ok(());
    }

    println!("\nTop {} by momentum score:", top);
    println!(
        "  {:>3}  {:<16} {:<18} {:>7} {:<11} {:>7}",
        "#", "Symbol", "Sector", "Score", "Signal", "ROC5%"
    );
    println!("  {}", "-".repeat(70));
    for (i, s) in signals
        .iter()
        .filter(|s| filter.map_or(true, |t| s.signal_type == t))
        .take(top)
        .enumerate()
    {
        println!(
            "  {:>3}  {:<16} {:<18} {:>7.2} {:<11} {:>+7.2}",
            i + 1,
            s.symbol(),
            s.sector(),
            s.score(),
            s.signal_type.to_string(),
            s.stock.snapshot().roc_5.unwrap_or_default(),
        );
    }

    Ok(())
}

// ============================================================================
// Forecast command
// ============================================================================

async fn cmd_forecast(
    symbol: &str,
    days: Option<usize>,
    simulations: Option<usize>,
    seed: Option<u64>,
    config: EngineConfig,
) -> anyhow::Result<()> {
    let symbol = universe::normalize_symbol(symbol);
    let db = open_database().await?;

    let records = PriceRepository::new(db.pool())
        .get_prices(&symbol, 120)
        .await?;
    if records.is_empty() {
        anyhow::bail!("No stored prices for {}. Run the update command first.", symbol);
    }
    let bars = convert::price_bars(&records)?;

    let mut settings = config.forecast;
    if let Some(days) = days {
        settings.days_forward = days;
    }
    if let Some(simulations) = simulations {
        settings.num_simulations = simulations;
    }
    if let Some(seed) = seed {
        settings.seed = seed;
    }

    let result = forecast_prices(&bars, &settings)?;
    let m = &result.metrics;

    println!("\n=== {} — {}-day forecast ===", symbol, result.forecast_days);
    println!(
        "Current: {:.2} ({}) | σ daily {:.2}% | σ annual {:.2}% | drift {:.3}%",
        result.current_price,
        result.last_date,
        result.daily_volatility,
        result.annual_volatility,
        result.daily_drift
    );
    println!(
        "Targets: low {:.2} | mid {:.2} | high {:.2}",
        m.target_low, m.target_mid, m.target_high
    );
    println!(
        "Expected return {:+.2}% | P(profit) {:.1}% | P(-10%) {:.1}% | P(+10%) {:.1}%",
        m.expected_return, m.prob_profit, m.prob_loss_10pct, m.prob_gain_10pct
    );
    println!("VaR 95%: {:.2} ({:.2}%)", m.var_95, m.var_95_pct);

    println!("\n  {:>4}  {:<10} {:>10} {:>10} {:>10}", "Day", "Date", "Mean", "Median", "Std");
    for day in &result.forecast {
        println!(
            "  {:>4}  {:<10} {:>10.2} {:>10.2} {:>10.2}",
            day.day,
            day.date.to_string(),
            day.mean,
            day.median,
            day.std
        );
    }

    Ok(())
}
