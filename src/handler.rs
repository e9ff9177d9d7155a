//! Consent-gated crash report flow.
//!
//! When Breakpad reports a freshly written minidump, the handler asks the
//! user whether to send it and, on consent, uploads it together with the
//! configured metadata. Nothing leaves the machine without an explicit
//! [`Consent::Send`].

use std::path::Path;

use reqwest::StatusCode;
use thiserror::Error;

use crate::config::{ConfigError, UploaderConfig};
use crate::multipart::{MultipartBody, MultipartError};
use crate::report::build_report;
use crate::upload::{UploadError, Uploader};

/// The user's answer to the upload prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consent {
    Send,
    Declined,
}

/// Asks the user whether a crash report may be sent.
///
/// `ask` blocks until the user answers. Implementations decide how the
/// question is presented (terminal, dialog, policy file, ...).
pub trait ConsentPrompt: Send + Sync {
    fn ask(&self, dump: &Path) -> Consent;
}

/// Sends every report without asking.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysSend;

impl ConsentPrompt for AlwaysSend {
    fn ask(&self, _dump: &Path) -> Consent {
        Consent::Send
    }
}

/// Declines every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeverSend;

impl ConsentPrompt for NeverSend {
    fn ask(&self, _dump: &Path) -> Consent {
        Consent::Declined
    }
}

/// What happened to a crash dump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashOutcome {
    /// The report was accepted by the server.
    Uploaded(StatusCode),
    /// The user declined; nothing was sent.
    Declined,
}

/// Crash handling errors.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Failed to build crash report: {0}")]
    Report(#[from] MultipartError),

    #[error("Failed to send crash report: {0}")]
    Upload(#[from] UploadError),
}

/// Turns crash dump notifications into uploads.
///
/// Create one at startup and keep it for the lifetime of the application.
#[derive(Debug, Clone)]
pub struct CrashHandler {
    config: UploaderConfig,
    uploader: Uploader,
}

impl CrashHandler {
    /// Validates `config` and creates a handler posting to its endpoint.
    pub fn new(config: UploaderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let uploader = Uploader::new(config.endpoint.clone());
        Ok(Self { config, uploader })
    }

    /// Creates a handler with a preconfigured uploader.
    pub fn with_uploader(config: UploaderConfig, uploader: Uploader) -> Self {
        Self { config, uploader }
    }

    /// Configuration the handler was built with.
    pub fn config(&self) -> &UploaderConfig {
        &self.config
    }

    /// Builds the finished report body for `dump` without sending it.
    pub fn build_report(&self, dump: &str) -> Result<MultipartBody, MultipartError> {
        let path = self.config.resolve_dump(dump);
        build_report(&self.config, dump, &path)
    }

    /// Handles a freshly written minidump.
    ///
    /// `dump` is the name Breakpad reported, relative to the configured dump
    /// directory or absolute. Blocks on `prompt`, then uploads if allowed.
    pub async fn on_crashed(
        &self,
        dump: &str,
        prompt: &dyn ConsentPrompt,
    ) -> Result<CrashOutcome, HandlerError> {
        let path = self.config.resolve_dump(dump);
        tracing::info!(dump = %path.display(), "native crash dump written");

        if prompt.ask(&path) == Consent::Declined {
            tracing::info!("crash report declined");
            return Ok(CrashOutcome::Declined);
        }

        let mut body = build_report(&self.config, dump, &path)?;
        let status = self.uploader.upload(&mut body).await?;
        Ok(CrashOutcome::Uploaded(status))
    }
}
