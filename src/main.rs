//! Swapdeck - Multi-Venue Token Swap Bot
//!
//! CLI entry point: an interactive console session plus one-shot quote,
//! swap, and balance commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{fmt, EnvFilter};

use swapdeck::adapters::amm::{AmmVenue, AmmVenueConfig};
use swapdeck::adapters::chain::RpcChainClient;
use swapdeck::adapters::console::ConsoleChat;
use swapdeck::adapters::curve::{CurveVenue, CurveVenueConfig};
use swapdeck::adapters::registry::{HttpRegistrySource, RegistryCache};
use swapdeck::adapters::store::JsonWalletStore;
use swapdeck::application::{
    RetryPolicy, Session, SessionServices, SessionStore, TokenInfoResolver,
};
use swapdeck::config::{load_config, Config};
use swapdeck::domain::AssetId;
use swapdeck::flow::{Action, TemplateAction};
use swapdeck::ports::chat::ChatPort;
use swapdeck::ports::registry::AssetRegistrySource;
use swapdeck::ports::telemetry::{LogSink, NullSink, TelemetrySink};
use swapdeck::ports::venue::Venue;

#[derive(Parser)]
#[command(name = "swapdeck", about = "Multi-venue token swap bot")]
struct CliApp {
    /// Log at info level
    #[arg(short, long, global = true)]
    verbose: bool,
    /// Log at debug level
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive console session
    Run(RunCmd),
    /// One-shot best-venue quote
    Quote(QuoteCmd),
    /// One-shot swap through the best venue
    Swap(SwapCmd),
    /// Show wallet holdings
    Balance(BalanceCmd),
}

#[derive(Args)]
struct RunCmd {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    /// User id the console session impersonates
    #[arg(long, default_value_t = 1)]
    user: u64,
}

#[derive(Args)]
struct QuoteCmd {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long = "in")]
    asset_in: String,
    #[arg(long = "out")]
    asset_out: String,
    #[arg(long)]
    amount: Decimal,
}

#[derive(Args)]
struct SwapCmd {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
    #[arg(long = "in")]
    asset_in: String,
    #[arg(long = "out")]
    asset_out: String,
    #[arg(long)]
    amount: Decimal,
    /// Override the stored slippage preference (basis points)
    #[arg(long)]
    slippage_bps: Option<u16>,
}

#[derive(Args)]
struct BalanceCmd {
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

/// User id the one-shot commands operate as.
const CLI_USER: u64 = 0;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let app = CliApp::parse();
    init_logging(app.verbose, app.debug);

    match app.command {
        Command::Run(cmd) => run_command(cmd).await,
        Command::Quote(cmd) => quote_command(cmd).await,
        Command::Swap(cmd) => swap_command(cmd).await,
        Command::Balance(cmd) => balance_command(cmd).await,
    }
}

fn init_logging(verbose: bool, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    fmt().with_env_filter(filter).init();
}

/// Wire every adapter into the shared session services. Returns the registry
/// cache so callers can hold its refresher alive.
fn build_services(
    config: &Config,
    chat: Arc<dyn ChatPort>,
    telemetry: Arc<dyn TelemetrySink>,
) -> Result<(SessionServices, Arc<RegistryCache>, Arc<dyn AssetRegistrySource>)> {
    let cipher = config.wallet.load_cipher().context("wallet cipher")?;

    let store_path = shellexpand::tilde(&config.wallet.store_path).to_string();
    let store = Arc::new(JsonWalletStore::open(&store_path).context("wallet store")?);

    let trade_asset = AssetId::new(config.router.trade_asset.clone());
    let stable_asset = AssetId::new(config.router.stable_asset.clone());

    let mut venues: Vec<Arc<dyn Venue>> = Vec::new();
    for section in &config.venues.pooled {
        let api_key = section
            .api_key_env
            .as_ref()
            .and_then(|var| std::env::var(var).ok());
        let venue = AmmVenue::new(AmmVenueConfig {
            name: section.name.clone(),
            api_url: section.api_url.clone(),
            api_key,
            base_asset: trade_asset.clone(),
            stable_asset: stable_asset.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
        })
        .map_err(|e| anyhow::anyhow!("pooled venue {}: {e}", section.name))?;
        venues.push(Arc::new(venue));
    }
    for section in &config.venues.curve {
        let venue = CurveVenue::new(CurveVenueConfig {
            name: section.name.clone(),
            api_url: section.api_url.clone(),
            trade_asset: trade_asset.clone(),
            timeout: Duration::from_secs(section.timeout_secs),
        })
        .map_err(|e| anyhow::anyhow!("curve venue {}: {e}", section.name))?;
        venues.push(Arc::new(venue));
    }

    let registry = Arc::new(RegistryCache::new());
    let registry_source: Arc<dyn AssetRegistrySource> = Arc::new(
        HttpRegistrySource::new(config.registry.url.clone(), Duration::from_secs(30))
            .map_err(|e| anyhow::anyhow!("registry source: {e}"))?,
    );

    let retry = RetryPolicy::new(
        config.retry.network_attempts,
        Duration::from_millis(config.retry.base_delay_ms),
    );
    let resolver = Arc::new(TokenInfoResolver::new(
        Arc::clone(&registry),
        venues.clone(),
        retry,
    ));

    let chain = Arc::new(RpcChainClient::new(
        config.chain.effective_rpc_url(),
        AssetId::new(config.chain.native_asset.clone()),
    ));

    let services = SessionServices {
        store,
        chat,
        telemetry,
        resolver,
        venues,
        chain: chain.clone(),
        transfer: chain,
        cipher,
        trade_asset,
        stable_asset,
        service_fee_bps: config.router.service_fee_bps,
        dust_threshold: config.router.dust_threshold,
        retry,
    };
    Ok((services, registry, registry_source))
}

async fn run_command(cmd: RunCmd) -> Result<()> {
    let config = load_config(&cmd.config).context("failed to load configuration")?;

    let chat: Arc<dyn ChatPort> = Arc::new(ConsoleChat::new());
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(LogSink);
    let (services, registry, registry_source) = build_services(&config, chat, telemetry)?;

    registry.refresh(registry_source.as_ref()).await;
    let _refresher = registry
        .clone()
        .spawn_refresher(registry_source, config.registry.refresh_interval());

    let sessions = Arc::new(SessionStore::new(
        services,
        config.session.inactivity_threshold(),
    ));
    let _sweeper = sessions.clone().spawn_sweeper(config.session.sweep_interval());

    let session = sessions.get_or_create(cmd.user).await?;
    println!("swapdeck console session for user {}", cmd.user);
    println!("wallet: {}", session.wallet().address());
    println!("commands: /buy [asset], /sell [symbol [percent]], /withdraw, /balance, /slippage <bps>, /accept, /quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }

        // every event refreshes the session's activity stamp
        let session = sessions.get_or_create(cmd.user).await?;
        if let Err(e) = dispatch_console_line(&session, &line).await {
            tracing::error!(error = %e, "command failed");
            println!("Something went wrong. Please try again later.");
        }
    }

    println!("swapdeck stopped");
    Ok(())
}

async fn dispatch_console_line(session: &Arc<Session>, line: &str) -> Result<()> {
    if let Some(rest) = line.strip_prefix('/') {
        let mut parts = rest.split_whitespace();
        let command = parts.next().unwrap_or_default();
        match command {
            "accept" => {
                session.accept_terms().await?;
                println!("Terms accepted.");
                return Ok(());
            }
            "balance" => {
                print_balances(session).await;
                return Ok(());
            }
            "slippage" => {
                match parts.next().and_then(|v| v.parse::<u16>().ok()) {
                    Some(bps) if bps < 10_000 => {
                        session.set_slippage(bps).await?;
                        println!("Slippage tolerance set to {bps} bps.");
                    }
                    _ => println!("Usage: /slippage <bps below 10000>"),
                }
                return Ok(());
            }
            "buy" | "sell" | "withdraw" => {
                if !session.preferences().await?.accepted_terms {
                    println!("Accept the terms of use first: /accept");
                    return Ok(());
                }
                match command {
                    "buy" => {
                        let preset = parts.next().map(AssetId::new);
                        session.begin_buy(preset).await;
                    }
                    "sell" => {
                        let symbol = parts.next().map(str::to_string);
                        let percent = parts.next().and_then(|p| p.parse().ok());
                        session.begin_sell(symbol, percent).await;
                    }
                    _ => session.begin_withdraw().await,
                }
                return Ok(());
            }
            _ => {
                println!("Unknown command: /{command}");
                return Ok(());
            }
        }
    }

    // button tokens first, then template tokens, then plain text
    let handled = if let Some(action) = Action::parse(line) {
        session.handle_action(&action).await
    } else if let Some(action) = TemplateAction::parse(line) {
        session.handle_template_action(&action).await
    } else {
        session.handle_message(line).await
    };

    if !handled {
        println!("No active dialog. Start one with /buy, /sell or /withdraw.");
    }
    Ok(())
}

async fn print_balances(session: &Arc<Session>) {
    match session.router().balances().await {
        Ok(holdings) if holdings.is_empty() => println!("No holdings."),
        Ok(holdings) => {
            for holding in holdings {
                println!("{:>12}  {}", holding.symbol(), holding.amount);
            }
        }
        Err(e) => println!("Balance lookup failed: {e}"),
    }
}

async fn one_shot_session(config_path: &str) -> Result<Arc<Session>> {
    let config = load_config(config_path).context("failed to load configuration")?;
    let chat: Arc<dyn ChatPort> = Arc::new(ConsoleChat::new());
    let telemetry: Arc<dyn TelemetrySink> = Arc::new(NullSink);
    let (services, registry, registry_source) = build_services(&config, chat, telemetry)?;
    registry.refresh(registry_source.as_ref()).await;

    let sessions = SessionStore::new(services, config.session.inactivity_threshold());
    Ok(sessions.get_or_create(CLI_USER).await?)
}

async fn quote_command(cmd: QuoteCmd) -> Result<()> {
    let session = one_shot_session(&cmd.config).await?;
    let quote = session
        .router()
        .quote_best(
            &AssetId::new(cmd.asset_in),
            &AssetId::new(cmd.asset_out),
            cmd.amount,
        )
        .await?;

    println!("venue:  {}", quote.venue);
    println!(
        "output: {}",
        quote.amount_out_readable(session.router().dust_threshold())
    );
    Ok(())
}

async fn swap_command(cmd: SwapCmd) -> Result<()> {
    let session = one_shot_session(&cmd.config).await?;
    let slippage_bps = match cmd.slippage_bps {
        Some(bps) => bps,
        None => session.preferences().await?.slippage_bps,
    };

    let request = swapdeck::domain::SwapRequest {
        asset_in: AssetId::new(cmd.asset_in),
        asset_out: AssetId::new(cmd.asset_out),
        amount_in: cmd.amount,
        slippage_bps,
    };
    let outcome = session.router().execute_request(&request).await?;

    println!("venue:    {}", outcome.venue);
    println!("received: {}", outcome.amount_out);
    match outcome.tx_id {
        Some(tx_id) => println!("tx:       {tx_id}"),
        None => println!("tx:       settled despite venue error (balance delta confirmed)"),
    }
    Ok(())
}

async fn balance_command(cmd: BalanceCmd) -> Result<()> {
    let session = one_shot_session(&cmd.config).await?;
    println!("wallet: {}", session.wallet().address());
    print_balances(&session).await;
    Ok(())
}
