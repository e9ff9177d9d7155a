//! breakpad-upload - Consent-gated upload of Breakpad minidumps
//!
//! Receives notice of a freshly written native crash dump, asks the user
//! for permission, and sends the dump with application metadata as a single
//! streamed multipart/form-data POST.
//!
//! # Features
//!
//! - Streaming multipart encoder with up-front `Content-Length`
//! - File attachments read from disk while sending, never buffered whole
//! - Pluggable consent prompt
//! - JSON configuration for endpoint, metadata and extra files
//!
//! # Example
//!
//! ```rust,no_run
//! use breakpad_upload::{AlwaysSend, CrashHandler, UploaderConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = UploaderConfig {
//!     endpoint: "https://crashes.example.com/breakpad".into(),
//!     dump_dir: "/var/lib/mygame/dumps".into(),
//!     ..Default::default()
//! };
//! let handler = CrashHandler::new(config)?;
//!
//! // Called when Breakpad reports a new minidump.
//! let outcome = handler.on_crashed("3f2a.dmp", &AlwaysSend).await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dumps;
pub mod handler;
pub mod multipart;
pub mod report;
pub mod upload;

pub use config::{ConfigError, UploaderConfig};
pub use dumps::{list_dumps, DumpInfo};
pub use handler::{AlwaysSend, Consent, ConsentPrompt, CrashHandler, CrashOutcome, HandlerError, NeverSend};
pub use multipart::{BodyState, BodyStream, MultipartBody, MultipartError, CHUNK_SIZE};
pub use report::{build_report, sanitize_device};
pub use upload::{UploadError, Uploader};
