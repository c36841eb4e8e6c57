//! Application Session Controller
//!
//! Owns the wallet session and everything derived from it:
//!
//! - **SessionController**: lifecycle, commands, and the two polling tasks
//! - **SessionSnapshot**: the read-only state published to the presentation
//!   layer through a `tokio::sync::watch` channel
//! - **PageOpener**: side-effect seam for opening the wallet install page
//!
//! ## Lifecycle
//!
//! ```text
//! Uninitialized → Loading → Ready(disconnected) ⇄ Ready(connected: chain ok | wrong chain)
//! ```
//!
//! `start()` discovers the contracts once. Every change of the account list
//! re-checks the chain, reloads the account figures, and arms or disarms the
//! polling tasks.

mod controller;
mod opener;
mod snapshot;

#[cfg(test)]
mod mock;

pub use controller::SessionController;
pub use opener::{OpenError, PageOpener, SystemOpener};
pub use snapshot::{Phase, SessionSnapshot};

use crate::gateway::GatewayError;
use crate::prefs::PrefsError;
use std::time::Duration;
use thiserror::Error;

/// Default page for users without a wallet
pub const DEFAULT_INSTALL_URL: &str = "https://metamask.io/";

/// Runtime settings of a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Chain the dashboard expects the wallet to be on
    pub expected_chain_id: u64,
    /// Period of the account details + budgets refresh
    pub account_details_interval: Duration,
    /// Period of the coin details refresh
    pub coin_details_interval: Duration,
    /// Page opened by `redirect_to_install`
    pub install_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            expected_chain_id: 1,
            account_details_interval: Duration::from_secs(10),
            coin_details_interval: Duration::from_secs(15),
            install_url: DEFAULT_INSTALL_URL.to_string(),
        }
    }
}

/// Errors returned by session commands
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Preference store error: {0}")]
    Prefs(#[from] PrefsError),

    #[error(transparent)]
    Open(#[from] OpenError),

    #[error("Session has been shut down")]
    Closed,
}

/// Result type alias for session commands
pub type SessionResult<T> = Result<T, SessionError>;
