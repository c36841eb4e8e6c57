//! Djed Dashboard CLI
//!
//! Command-line front end for the session controller:
//! - Watch protocol and account figures
//! - Print a one-off status snapshot
//! - Connect a wallet or open the install page

use anyhow::Context;
use clap::{Parser, Subcommand};
use djed_dashboard::config::generate_default_config;
use djed_dashboard::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "djed-dashboard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Wallet session and live figures for a Djed stablecoin deployment")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: platform config dir, then ./config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Keep the account list in memory instead of the preference file
    #[arg(long, global = true)]
    pub ephemeral: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the session and log every change until Ctrl-C
    Watch {
        /// Connect the wallet if no connection was restored
        #[arg(long)]
        connect: bool,
    },

    /// Print the session state after startup as JSON
    Status,

    /// Ask the wallet for account access
    Connect,

    /// Forget the remembered wallet connection
    Disconnect,

    /// Open the wallet install page
    Install,

    /// Generate default config file
    InitConfig {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };
    init_logging(&config.logging);

    match cli.command {
        Commands::Watch { connect } => {
            let session = build_session(&config, config.rpc_config()?, cli.ephemeral)?;
            watch(session, connect).await?;
        }

        Commands::Status => {
            let session = build_session(&config, config.rpc_config()?, cli.ephemeral)?;
            session.start().await;
            let snapshot = session.snapshot();
            session.shutdown().await;

            let status = serde_json::json!({
                "phase": snapshot.phase,
                "is_wallet_installed": snapshot.is_wallet_installed(),
                "is_wallet_connected": snapshot.is_wallet_connected(),
                "is_wrong_chain": snapshot.is_wrong_chain,
                "chain_id": snapshot.chain_id,
                "accounts": snapshot.accounts,
                "contracts": snapshot.contracts,
                "coins_details": snapshot.coins_details,
                "system_params": snapshot.system_params,
                "account_details": snapshot.account_details(),
                "coin_budgets": snapshot.coin_budgets(),
                "coins_updated_at": snapshot.coins_updated_at,
                "account_updated_at": snapshot.account_updated_at,
            });
            println!("{}", serde_json::to_string_pretty(&status)?);
        }

        Commands::Connect => {
            let session = build_session(&config, config.rpc_config()?, cli.ephemeral)?;
            session.start().await;
            let result = session.connect().await;
            session.shutdown().await;

            let accounts = result.context("Wallet refused the connection")?;
            for account in &accounts {
                println!("{}", account);
            }
            if session.snapshot().is_wrong_chain {
                println!(
                    "Wallet is on the wrong chain (expected {})",
                    config.chain.expected_chain_id
                );
            }
        }

        Commands::Disconnect => {
            let session = build_session(&config, config.rpc_config()?, cli.ephemeral)?;
            session.disconnect().await?;
            session.shutdown().await;
            println!("Disconnected");
        }

        Commands::Install => {
            // Opening the install page needs no contract address
            let rpc = RpcConfig {
                rpc_url: config.chain.rpc_url.clone(),
                wallet_url: config.wallet.url.clone(),
                request_timeout_ms: config.chain.request_timeout_ms,
                ..RpcConfig::default()
            };
            let session = build_session(&config, rpc, true)?;
            session.redirect_to_install()?;
            println!("Opened {}", session.config().install_url);
        }

        Commands::InitConfig { output } => {
            let content = generate_default_config();
            match output {
                Some(path) => {
                    std::fs::write(&path, content)
                        .with_context(|| format!("Failed to write {:?}", path))?;
                    println!("Config written to {:?}", path);
                }
                None => print!("{}", content),
            }
        }
    }

    Ok(())
}

fn init_logging(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("djed_dashboard={}", logging.level))
    });
    let json = logging.format == "json";

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .init();
}

fn build_session(
    config: &Config,
    rpc: RpcConfig,
    ephemeral: bool,
) -> anyhow::Result<SessionController> {
    let gateway = RpcGateway::new(rpc)?;
    tracing::debug!(
        rpc = %gateway.config().rpc_url,
        wallet = %gateway.config().wallet_url,
        "Gateway configured"
    );

    let prefs: Arc<dyn PreferenceStore> = if ephemeral {
        Arc::new(MemoryStore::new())
    } else {
        Arc::new(FileStore::new(config.prefs_path()))
    };

    Ok(SessionController::new(
        Arc::new(gateway),
        prefs,
        Arc::new(SystemOpener),
        config.session_config(),
    ))
}

async fn watch(session: SessionController, connect: bool) -> anyhow::Result<()> {
    let mut updates = session.subscribe();
    session.start().await;

    if connect && !session.snapshot().is_wallet_connected() {
        if let Err(e) = session.connect().await {
            tracing::warn!(error = %e, "Continuing without a wallet connection");
        }
    }
    log_snapshot(&updates.borrow_and_update());

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                log_snapshot(&updates.borrow_and_update());
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Shutting down...");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

fn log_snapshot(snapshot: &SessionSnapshot) {
    if let Some(coins) = &snapshot.coins_details {
        tracing::info!(
            sc_supply = %coins.sc_supply,
            sc_price = %coins.sc_price,
            rc_supply = %coins.rc_supply,
            reserve = %coins.reserve,
            reserve_ratio = coins.reserve_ratio,
            oracle_price = ?coins.oracle_price.map(|p| p.to_string()),
            "Coin details"
        );
    }

    match (snapshot.active_account(), snapshot.account_details()) {
        (Some(account), Some(details)) => tracing::info!(
            %account,
            sc_balance = %details.sc_balance,
            rc_balance = %details.rc_balance,
            bc_balance = %details.bc_balance,
            sc_budget = ?snapshot.coin_budgets().map(|b| b.sc_budget.to_string()),
            rc_budget = ?snapshot.coin_budgets().map(|b| b.rc_budget.to_string()),
            wrong_chain = snapshot.is_wrong_chain,
            "Account details"
        ),
        (Some(account), None) => tracing::info!(%account, "Account connected, details pending"),
        (None, _) => tracing::info!(
            installed = snapshot.is_wallet_installed(),
            phase = ?snapshot.phase,
            "No wallet connected"
        ),
    }
}
