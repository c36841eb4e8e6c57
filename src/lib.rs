//! # Djed Dashboard
//!
//! Session layer for a Djed stablecoin dashboard: wallet connection,
//! chain-mismatch detection, and periodic refresh of protocol and account
//! figures.
//!
//! ## Modules
//!
//! - [`gateway`]: Chain access (JSON-RPC node + wallet bridge) behind a trait
//! - [`prefs`]: Persistent storage of the connected account list
//! - [`interval`]: Reconfigurable periodic task
//! - [`session`]: The session controller and its published snapshot
//! - [`config`]: TOML + environment configuration
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use djed_dashboard::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load_default();
//!
//!     let gateway = Arc::new(RpcGateway::new(config.rpc_config()?)?);
//!     let prefs = Arc::new(FileStore::new(config.storage.prefs_path.clone()));
//!     let session = SessionController::new(
//!         gateway,
//!         prefs,
//!         Arc::new(SystemOpener),
//!         config.session_config(),
//!     );
//!
//!     session.start().await;
//!     if !session.snapshot().is_wallet_connected() {
//!         session.connect().await?;
//!     }
//!
//!     let snapshot = session.snapshot();
//!     println!("Wrong chain: {}", snapshot.is_wrong_chain);
//!
//!     session.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod gateway;
pub mod interval;
pub mod prefs;
pub mod session;

pub use config::{
    ChainConfig, Config, ConfigError, LoggingConfig, PollingConfig, StorageConfig, WalletConfig,
};

pub use gateway::{
    AccountDetails, Amount, ChainGateway, ChainHandle, CoinBudgets, CoinsDetails, ContractBundle,
    ContractHandles, Decimals, GatewayError, GatewayResult, RpcConfig, RpcGateway, SystemParams,
};

pub use interval::Interval;

pub use prefs::{FileStore, MemoryStore, PreferenceStore, PrefsError};

pub use session::{
    OpenError, PageOpener, Phase, SessionConfig, SessionController, SessionError, SessionResult,
    SessionSnapshot, SystemOpener,
};
