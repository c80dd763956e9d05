//! Runtime settings, resolved once at startup and passed into server
//! construction. There is deliberately no config file and no module-level
//! state; environment flags in `main` are the only source.

use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};

/// Settings for one server run.
#[derive(Debug, Clone)]
pub struct ServeSettings {
    /// Bind address for the listener.
    pub host: String,
    /// Preferred port; 0 asks the OS for any free port at bind time.
    pub port: u16,
    /// Directory the server is rooted at.
    pub root: PathBuf,
    /// Serve generated HTML listings for directories without an index file.
    pub dir_listings: bool,
    /// Open the default browser once the listener is up.
    pub open_browser: bool,
}

impl ServeSettings {
    /// Resolve the root directory flag: empty means the current execution
    /// directory, `~/` is expanded, and the result must name an existing
    /// directory.
    pub fn resolve_root(raw: &str) -> Result<PathBuf> {
        let root = if raw.is_empty() {
            std::env::current_dir().context("cannot determine current directory")?
        } else {
            expand_home(raw)
        };
        if !root.is_dir() {
            bail!("{} does not exist or is not a directory", root.display());
        }
        Ok(root)
    }

    /// URL shown in the banner and opened in the browser. Wildcard binds
    /// are rewritten to localhost so the link is reachable.
    pub fn display_url(&self, port: u16) -> String {
        let host = match self.host.as_str() {
            "0.0.0.0" | "::" | "[::]" => "localhost",
            other => other,
        };
        format!("http://{host}:{port}")
    }
}

pub fn expand_home(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
