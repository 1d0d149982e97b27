//! Polystrat — strategy backtesting and trader analytics for Polymarket
//!
//! Usage:
//!   polystrat serve --port 8000                          — Launch web server with UI
//!   polystrat backtest --token <id> --template momentum_breakout
//!   polystrat analyze --address 0xabc...                 — Profile a wallet from CLI

mod api;
mod config;
mod portfolio;

use anyhow::Context;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use engine::sandbox::templates;
use engine::{
    run_backtest, BacktestRequest, BacktestResult, ClobClient, PolymarketDataClient,
    TraderAnalyzer,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::api::AppState;
use crate::config::AppConfig;

pub(crate) const APP_VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "-", env!("GIT_HASH"));

#[derive(Parser)]
#[command(name = "polystrat")]
#[command(about = "Polymarket strategy backtester and trader analytics", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Launch the web server
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        /// Port to listen on
        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Backtest a strategy against one market's price history (no web server)
    Backtest {
        /// CLOB token id of the market outcome
        #[arg(long)]
        token: String,
        /// Built-in template key
        #[arg(long, conflicts_with = "strategy_file", required_unless_present = "strategy_file")]
        template: Option<String>,
        /// Path to a strategy source file
        #[arg(long)]
        strategy_file: Option<String>,
        /// Strategy params as a JSON object (overrides template defaults)
        #[arg(long)]
        params: Option<String>,
        /// Starting capital
        #[arg(long)]
        capital: Option<f64>,
        /// Fee rate per trade, e.g. 0.002
        #[arg(long)]
        fee_rate: Option<f64>,
        /// Price history interval (1d, 1w, 1m, max)
        #[arg(long, default_value = engine::engine::DEFAULT_INTERVAL)]
        interval: String,
        /// Price history resolution in minutes
        #[arg(long, default_value_t = engine::engine::DEFAULT_FIDELITY)]
        fidelity: u32,
        /// Optional JSON export path
        #[arg(long)]
        export: Option<String>,
    },
    /// Profile a wallet and classify its trading style
    Analyze {
        /// Wallet address
        #[arg(long)]
        address: String,
    },
    /// List built-in strategy templates
    Templates,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,polystrat=debug")
    } else {
        EnvFilter::new("info,engine=info,persistence=info,polystrat=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env();

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
        Commands::Backtest {
            token,
            template,
            strategy_file,
            params,
            capital,
            fee_rate,
            interval,
            fidelity,
            export,
        } => {
            let (code, default_params) = load_strategy(template.as_deref(), strategy_file.as_deref())?;
            let params = match params {
                Some(raw) => serde_json::from_str(&raw).context("--params must be a JSON object")?,
                None => default_params,
            };

            let mut request = BacktestRequest::new(&token, &code);
            request.params = params;
            request.initial_capital = capital.unwrap_or(config.default_initial_capital);
            request.fee_rate = fee_rate.unwrap_or(config.backtest_fee_rate);
            request.interval = interval;
            request.fidelity = fidelity;

            cmd_backtest(&config, &request, export).await?;
        }
        Commands::Analyze { address } => {
            cmd_analyze(&config, &address).await?;
        }
        Commands::Templates => {
            for t in templates::all() {
                println!("  {:<26} {}", t.key, t.name);
                println!("  {:<26} params: {}", "", t.params);
            }
        }
    }

    Ok(())
}

// ============================================================================
// Serve command
// ============================================================================

async fn cmd_serve(config: AppConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Polystrat v{} starting...", APP_VERSION);

    let db_path = config.db_path.clone();
    let db = persistence::Database::new(&db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", db_path);

    let state = AppState::new(config, db)?;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Static UI next to the binary, else ./dist
    let exe_path = std::env::current_exe().unwrap_or_default();
    let exe_dir = exe_path.parent().unwrap_or(std::path::Path::new("."));
    let dist_dir = exe_dir.join("dist");
    let static_dir = if dist_dir.exists() {
        dist_dir
    } else {
        std::path::PathBuf::from("dist")
    };

    let app = axum::Router::new()
        .nest("/api", api::router(state))
        .fallback_service(ServeDir::new(&static_dir))
        .layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    println!("\n=== Polystrat v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health                       - Health check");
    println!("  GET  /api/strategies/templates         - Built-in strategy templates");
    println!("  *    /api/strategies[/:id]             - Strategy CRUD");
    println!("  POST /api/strategies/validate          - Compile-check strategy code");
    println!("  POST /api/backtests/run                - Run and save a backtest");
    println!("  GET  /api/backtests[/:id]              - Saved backtests");
    println!("  GET  /api/markets[/:condition_id]      - Market listing (Gamma proxy)");
    println!("  GET  /api/markets/events               - Event listing (Gamma proxy)");
    println!("  GET  /api/markets/prices-history/:tok  - Price history (CLOB proxy)");
    println!("  GET  /api/markets/price|orderbook|midpoint/:tok - Live quotes (CLOB proxy)");
    println!("  GET  /api/markets/trades               - Recent market trades");
    println!("  GET  /api/portfolio/summary            - Roll-up of saved backtests");
    println!("  GET  /api/portfolio/equity-curve       - Latest curve per strategy");
    println!("  GET  /api/traders/leaderboard          - Top traders");
    println!("  GET  /api/traders/compare              - Compare up to 10 wallets");
    println!("  *    /api/traders/tracked[/:address]   - Tracked wallets");
    println!("  PUT  /api/traders/tracked/:a/favorite  - Star or unstar a tracked wallet");
    println!("  GET  /api/traders/:address/...         - profile | trades | performance | strategy");
    println!("\n  Database: {}", db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Backtest command — CLI mode (no web server, nothing persisted)
// ============================================================================

fn load_strategy(
    template: Option<&str>,
    strategy_file: Option<&str>,
) -> anyhow::Result<(String, serde_json::Value)> {
    match (template, strategy_file) {
        (Some(key), _) => {
            let t = templates::get(key).with_context(|| {
                let keys: Vec<&str> = templates::all().iter().map(|t| t.key).collect();
                format!("unknown template '{}', expected one of: {}", key, keys.join(", "))
            })?;
            Ok((t.code.to_string(), t.params))
        }
        (None, Some(path)) => {
            let code = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read strategy file {}", path))?;
            Ok((code, serde_json::json!({})))
        }
        (None, None) => anyhow::bail!("either --template or --strategy-file is required"),
    }
}

async fn cmd_backtest(
    config: &AppConfig,
    request: &BacktestRequest,
    export: Option<String>,
) -> anyhow::Result<()> {
    println!("\n=== Polystrat v{} ===", APP_VERSION);
    println!(
        "Token: {} | Interval: {} | Fidelity: {}m | Capital: {:.2} | Fee: {}",
        request.token_id, request.interval, request.fidelity, request.initial_capital, request.fee_rate
    );

    let clob = ClobClient::new(&config.clob_api_base)?;
    let result = run_backtest(&clob, request).await?;
    print_backtest(&result);

    if let Some(export_path) = export {
        let export_data = serde_json::json!({
            "generated_at": Utc::now().to_rfc3339(),
            "version": APP_VERSION,
            "token_id": request.token_id,
            "strategy_hash": request.strategy_hash(),
            "params": request.params,
            "result": result,
        });
        let json = serde_json::to_string_pretty(&export_data)?;
        std::fs::write(&export_path, &json)?;
        println!("\nResult exported to {}", export_path);
    }

    Ok(())
}

fn print_backtest(result: &BacktestResult) {
    let m = &result.metrics;
    println!("\nResult ({} data points, {:.3}s):", result.data_points, result.duration_seconds);
    println!("  {}", "-".repeat(44));
    println!("  {:<24} {:>+18.2}", "PnL", m.total_pnl);
    println!("  {:<24} {:>17.2}%", "ROI", m.roi_pct);
    println!("  {:<24} {:>18.2}", "Final equity", result.final_equity);
    println!("  {:<24} {:>18.4}", "Sharpe", m.sharpe_ratio);
    println!("  {:<24} {:>17.2}%", "Max drawdown", m.max_drawdown_pct);
    println!("  {:<24} {:>17.2}%", "Win rate", m.win_rate_pct);
    println!(
        "  {:<24} {:>18}",
        "Trades (W/L)",
        format!("{} ({}/{})", m.total_trades, m.winning_trades, m.losing_trades)
    );
    println!("  {:<24} {:>18.2}", "Profit factor", m.profit_factor);
}

// ============================================================================
// Analyze command
// ============================================================================

fn format_ts(ts: Option<i64>) -> String {
    ts.and_then(|t| DateTime::<Utc>::from_timestamp(t, 0))
        .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

async fn cmd_analyze(config: &AppConfig, address: &str) -> anyhow::Result<()> {
    println!("\n=== Polystrat v{} ===", APP_VERSION);

    let data = PolymarketDataClient::new(&config.data_api_base)?;
    let analyzer = TraderAnalyzer::new(&data);

    let profile = analyzer.profile(address).await;
    let report = analyzer.detect_strategy(address).await;

    println!("Trader: {}", profile.address);
    println!(
        "  Trades: {} in {} markets | Volume: {:.2} | Avg size: {:.2}",
        profile.total_trades, profile.unique_markets, profile.total_volume, profile.avg_position_size
    );
    println!(
        "  PnL: {:+.2} | ROI: {:.2}% | Win rate: {:.2}% | Open positions: {}",
        profile.total_pnl, profile.roi_pct, profile.win_rate_pct, profile.active_positions
    );
    println!(
        "  Active: {} -> {}",
        format_ts(profile.first_trade),
        format_ts(profile.last_trade)
    );

    let c = &report.classification;
    println!(
        "\nStrategy: {} (confidence {:.2})",
        c.primary_strategy, c.confidence
    );
    println!("  {}", c.summary);

    if !profile.markets_breakdown.is_empty() {
        println!("\nTop markets:");
        println!("  {:<20} {:>7} {:>12} {:>6} {:>6}", "Market", "Trades", "Volume", "Buys", "Sells");
        for m in profile.markets_breakdown.iter().take(10) {
            let id: String = m.market_id.chars().take(18).collect();
            println!(
                "  {:<20} {:>7} {:>12.2} {:>6} {:>6}",
                id, m.trades, m.volume, m.buys, m.sells
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_backtest() {
        let cli = Cli::try_parse_from([
            "polystrat", "backtest", "--token", "123", "--template", "mean_reversion", "--capital", "500",
        ])
        .unwrap();
        match cli.command {
            Commands::Backtest { token, template, capital, interval, .. } => {
                assert_eq!(token, "123");
                assert_eq!(template.as_deref(), Some("mean_reversion"));
                assert_eq!(capital, Some(500.0));
                assert_eq!(interval, engine::engine::DEFAULT_INTERVAL);
            }
            _ => panic!("expected backtest command"),
        }
    }

    #[test]
    fn test_cli_requires_a_strategy_source() {
        assert!(Cli::try_parse_from(["polystrat", "backtest", "--token", "1"]).is_err());
        assert!(Cli::try_parse_from([
            "polystrat", "backtest", "--token", "1", "--template", "a", "--strategy-file", "b",
        ])
        .is_err());
    }

    #[test]
    fn test_load_strategy_from_template() {
        let (code, params) = load_strategy(Some("momentum_breakout"), None).unwrap();
        assert!(code.contains("fn signal"));
        assert!(params.is_object());

        let err = load_strategy(Some("nope"), None).unwrap_err();
        assert!(err.to_string().contains("mean_reversion"));
    }

    #[test]
    fn test_format_ts() {
        assert_eq!(format_ts(Some(0)), "1970-01-01 00:00");
        assert_eq!(format_ts(None), "-");
    }
}
