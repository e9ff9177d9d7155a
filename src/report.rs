//! Crash report form layout.
//!
//! The collection endpoint expects these parts, in this order:
//!
//! | Field | Content |
//! |-------|---------|
//! | `device` | device description, non-word characters replaced by `_` |
//! | `version` | application version or `UnknownVersion` |
//! | `product_name` | application name |
//! | `symbol_file` | the minidump |
//! | `optional` | extra JSON parameters (only if configured) |
//! | *name* | one part per extra file |

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::config::UploaderConfig;
use crate::multipart::{MultipartBody, MultipartError};

pub const FIELD_DEVICE: &str = "device";
pub const FIELD_VERSION: &str = "version";
pub const FIELD_PRODUCT_NAME: &str = "product_name";
pub const FIELD_SYMBOL_FILE: &str = "symbol_file";
pub const FIELD_OPTIONAL: &str = "optional";

/// Sent when no application version is configured.
pub const UNKNOWN_VERSION: &str = "UnknownVersion";

/// Replaces every character outside `[A-Za-z0-9_]` with `_`.
///
/// ```
/// use breakpad_upload::report::sanitize_device;
///
/// assert_eq!(sanitize_device("Acme,X1 Pro"), "Acme_X1_Pro");
/// ```
pub fn sanitize_device(device: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^A-Za-z0-9_]").expect("valid regex"));
    re.replace_all(device, "_").into_owned()
}

/// Builds the finished multipart body for one minidump.
///
/// The `symbol_file` part is named after the last component of `dump_name`,
/// so no local directory layout is sent; the bytes come from `dump_path`.
/// Extra files are attached under their own file names. Any file that can't
/// be opened aborts the whole report.
pub fn build_report(
    config: &UploaderConfig,
    dump_name: &str,
    dump_path: &Path,
) -> Result<MultipartBody, MultipartError> {
    let mut body = MultipartBody::new();

    body.add_field(FIELD_DEVICE, &sanitize_device(&config.device))?;
    body.add_field(
        FIELD_VERSION,
        config.version.as_deref().unwrap_or(UNKNOWN_VERSION),
    )?;
    body.add_field(FIELD_PRODUCT_NAME, &config.product_name)?;
    let dump_file_name = file_name_of(Path::new(dump_name), dump_name);
    body.add_file(FIELD_SYMBOL_FILE, &dump_file_name, dump_path)?;

    if let Some(optional) = &config.optional {
        let json = serde_json::Value::Object(optional.clone()).to_string();
        body.add_field(FIELD_OPTIONAL, &json)?;
    }

    for (name, path) in &config.extra_files {
        body.add_file(name, &file_name_of(path, name), path)?;
    }

    body.finish()?;
    Ok(body)
}

fn file_name_of(path: &Path, fallback: &str) -> String {
    path.file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}
