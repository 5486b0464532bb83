//! Expands an [`AssetLocation`] plus a relative path into an absolute filesystem path or URL.
//!
//! * `PersistentStore` paths live under the writable per-user data root
//! * `BundledStore` paths live under the read-only content shipped next to the application
//! * `PathOrUrl` is either a full URL (anything containing `://`, used verbatim), an absolute path
//!   used as-is, or a path relative to the install directory
//!
//! Backslashes are normalized to forward slashes before joining.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use url::Url;

const SCHEME_SEPARATOR: &str = "://";
const BUNDLED_DIR_NAME: &str = "bundled_assets";
const PERSISTENT_FALLBACK_DIR_NAME: &str = "persistent";

#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash, Default, Serialize, Deserialize)]
pub enum AssetLocation {
    PersistentStore,
    BundledStore,
    #[default]
    PathOrUrl,
}

/// A path that could not be turned into a usable URL or filesystem path. No IO is attempted for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocationError {
    pub location: AssetLocation,
    pub path: String,
    pub reason: String,
}

impl LocationError {
    fn new(
        location: AssetLocation,
        path: &str,
        reason: impl Into<String>,
    ) -> Self {
        LocationError {
            location,
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl std::error::Error for LocationError {}

impl fmt::Display for LocationError {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(
            f,
            "malformed location {:?} {:?}: {}",
            self.location, self.path, self.reason
        )
    }
}

/// The three directories relative paths can be resolved against
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreRoots {
    pub persistent_root: PathBuf,
    pub bundled_root: PathBuf,
    pub install_root: PathBuf,
}

impl Default for StoreRoots {
    fn default() -> Self {
        StoreRoots::for_application("stowage")
    }
}

impl StoreRoots {
    pub fn new(
        persistent_root: impl Into<PathBuf>,
        bundled_root: impl Into<PathBuf>,
        install_root: impl Into<PathBuf>,
    ) -> Self {
        StoreRoots {
            persistent_root: persistent_root.into(),
            bundled_root: bundled_root.into(),
            install_root: install_root.into(),
        }
    }

    /// Roots for a running application: install root is the executable's directory, bundled
    /// content sits beside it and persistent data goes in the user's data directory.
    pub fn for_application(application_name: &str) -> Self {
        let install_root = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));

        let persistent_root = match dirs::data_dir() {
            Some(data_dir) => data_dir.join(application_name),
            None => {
                log::info!(
                    "No user data directory, persistent data goes next to the executable"
                );
                install_root.join(PERSISTENT_FALLBACK_DIR_NAME)
            }
        };

        StoreRoots {
            bundled_root: install_root.join(BUNDLED_DIR_NAME),
            persistent_root,
            install_root,
        }
    }

    fn root_for(
        &self,
        location: AssetLocation,
    ) -> &Path {
        match location {
            AssetLocation::PersistentStore => &self.persistent_root,
            AssetLocation::BundledStore => &self.bundled_root,
            AssetLocation::PathOrUrl => &self.install_root,
        }
    }

    /// Produces the URL form, with local files using the `file://` scheme
    pub fn resolve_url(
        &self,
        location: AssetLocation,
        path: &str,
    ) -> Result<Url, LocationError> {
        if location == AssetLocation::PathOrUrl && path.contains(SCHEME_SEPARATOR) {
            return Url::parse(path).map_err(|e| LocationError::new(location, path, e.to_string()));
        }

        let file_path = self.join_relative(location, path);
        Url::from_file_path(&file_path).map_err(|_| {
            LocationError::new(
                location,
                path,
                format!("{:?} is not an absolute file path", file_path),
            )
        })
    }

    /// Produces the bare filesystem form. URLs that do not point at a local file have no such form.
    pub fn resolve_path(
        &self,
        location: AssetLocation,
        path: &str,
    ) -> Result<PathBuf, LocationError> {
        if location == AssetLocation::PathOrUrl && path.contains(SCHEME_SEPARATOR) {
            let url =
                Url::parse(path).map_err(|e| LocationError::new(location, path, e.to_string()))?;
            if url.scheme() != "file" {
                return Err(LocationError::new(
                    location,
                    path,
                    format!("scheme {} has no filesystem path", url.scheme()),
                ));
            }
            return url
                .to_file_path()
                .map_err(|_| LocationError::new(location, path, "URL is not a local file path"));
        }

        Ok(self.join_relative(location, path))
    }

    // Store paths always live under their root. PathOrUrl keeps absolute paths as they are.
    fn join_relative(
        &self,
        location: AssetLocation,
        path: &str,
    ) -> PathBuf {
        let normalized = normalize_separators(path);
        if location == AssetLocation::PathOrUrl && Path::new(&normalized).is_absolute() {
            return PathBuf::from(normalized);
        }

        self.root_for(location).join(normalized.trim_start_matches('/'))
    }
}

pub fn normalize_separators(path: &str) -> String {
    path.replace('\\', "/")
}
