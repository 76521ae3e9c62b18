//! Browser Launcher
//!
//! Opens the authorization URL in the user's default browser.

use std::sync::Mutex;

use crate::error::{ListenerError, OAuth2Error};

/// Browser launcher interface (for dependency injection).
#[cfg_attr(test, mockall::automock)]
pub trait BrowserLauncher: Send + Sync {
    /// Open `url` in a browser. Failure is reported, never retried.
    fn open(&self, url: &str) -> Result<(), OAuth2Error>;
}

/// Launches the platform browser via the `open` crate.
#[derive(Debug, Default)]
pub struct SystemBrowserLauncher;

impl BrowserLauncher for SystemBrowserLauncher {
    fn open(&self, url: &str) -> Result<(), OAuth2Error> {
        open::that(url).map_err(|e| {
            ListenerError::BrowserLaunch {
                message: e.to_string(),
            }
            .into()
        })
    }
}

/// Records opened URLs instead of launching anything.
#[derive(Debug, Default)]
pub struct RecordingBrowserLauncher {
    opened: Mutex<Vec<String>>,
}

impl RecordingBrowserLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    /// URLs opened so far.
    pub fn opened_urls(&self) -> Vec<String> {
        self.opened
            .lock()
            .map(|urls| urls.clone())
            .unwrap_or_default()
    }
}

impl BrowserLauncher for RecordingBrowserLauncher {
    fn open(&self, url: &str) -> Result<(), OAuth2Error> {
        if let Ok(mut urls) = self.opened.lock() {
            urls.push(url.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_launcher() {
        let launcher = RecordingBrowserLauncher::new();
        launcher.open("https://auth.example.com/authorize?a=1").unwrap();
        launcher.open("https://auth.example.com/authorize?a=2").unwrap();

        assert_eq!(
            launcher.opened_urls(),
            vec![
                "https://auth.example.com/authorize?a=1".to_string(),
                "https://auth.example.com/authorize?a=2".to_string(),
            ]
        );
    }

    #[test]
    fn test_automock_launcher_failure() {
        let mut launcher = MockBrowserLauncher::new();
        launcher
            .expect_open()
            .withf(|url| url.starts_with("https://"))
            .times(1)
            .returning(|_| {
                Err(ListenerError::BrowserLaunch {
                    message: "no display".to_string(),
                }
                .into())
            });

        let result = launcher.open("https://auth.example.com/authorize");
        assert!(result.is_err());
    }
}
