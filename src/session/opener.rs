//! Install page opener

use thiserror::Error;

/// Opens an external page in a new browsing context
pub trait PageOpener: Send + Sync {
    fn open(&self, url: &str) -> Result<(), OpenError>;
}

#[derive(Error, Debug)]
#[error("Failed to open {url}: {reason}")]
pub struct OpenError {
    pub url: String,
    pub reason: String,
}

/// Opens pages in the desktop's default browser
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl PageOpener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), OpenError> {
        opener::open_browser(url).map_err(|e| OpenError {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
