//! Service version resolution from the packaging manifest.

use std::fs;
use std::path::Path;

use tracing::warn;

/// Reported when the manifest is missing or unreadable. Never fatal.
pub const FALLBACK_VERSION: &str = "0.0.0";

/// Reads the service version from this crate's `Cargo.toml`.
///
/// Called once at startup; the result is carried in shared state afterwards.
#[must_use]
pub fn app_version() -> String {
    manifest_version(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/Cargo.toml")))
}

/// Reads `[package].version` from the manifest at `path`, logging a warning
/// and returning [`FALLBACK_VERSION`] when the file is absent, unparseable,
/// or missing the key.
#[must_use]
pub fn manifest_version(path: &Path) -> String {
    match read_version(path) {
        Ok(version) => version,
        Err(err) => {
            warn!(
                manifest = %path.display(),
                error = %err,
                "could not read version from manifest, using fallback"
            );
            FALLBACK_VERSION.to_owned()
        }
    }
}

fn read_version(path: &Path) -> anyhow::Result<String> {
    let raw = fs::read_to_string(path)?;
    let manifest: toml::Value = toml::from_str(&raw)?;
    manifest
        .get("package")
        .and_then(|package| package.get("version"))
        .and_then(toml::Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| anyhow::anyhow!("manifest has no [package] version"))
}
