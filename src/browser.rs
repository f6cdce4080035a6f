//! Launching the authorization URL.
//!
//! Login talks to the browser only through [`Opener`], which lets the flow be
//! driven without a desktop (tests simulate the provider redirect instead).

use std::io;

use crate::info;

/// Something able to send the user to a URL.
pub trait Opener: Send + Sync {
    fn open(&self, url: &str) -> io::Result<()>;
}

/// Opens the URL with the platform's default browser.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserOpener;

impl Opener for BrowserOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        webbrowser::open(url)
    }
}

/// Prints the URL for the user to open by hand, e.g. over SSH.
#[derive(Debug, Default, Clone, Copy)]
pub struct ManualOpener;

impl Opener for ManualOpener {
    fn open(&self, url: &str) -> io::Result<()> {
        info!("Open the following URL in your browser to continue:\n{}", url);
        Ok(())
    }
}
