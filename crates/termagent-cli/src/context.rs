use anyhow::Result;
use std::path::{Path, PathBuf};
use termagent_client::HttpAgentClient;
use termagent_core::AppConfig;
use termagent_observe::Observer;

/// Everything a command needs: merged settings, the resolved server URL and
/// the session observer.
pub(crate) struct CliContext {
    pub(crate) cfg: AppConfig,
    pub(crate) base_url: String,
    pub(crate) observer: Observer,
}

impl CliContext {
    pub(crate) fn load(cwd: &Path, server: Option<&str>, verbose: bool) -> Result<Self> {
        let cfg = AppConfig::load(cwd)?;
        let base_url = server
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| cfg.server.resolve_base_url());

        let mut observer = Observer::new(cwd)?;
        observer.set_verbose(verbose);
        observer.verbose_log(&format!("agent server: {base_url}"));

        Ok(Self {
            cfg,
            base_url,
            observer,
        })
    }

    pub(crate) fn client(&self) -> Result<HttpAgentClient> {
        Ok(
            HttpAgentClient::new(&self.base_url, self.cfg.server.timeout_seconds)?
                .with_observer(self.observer.clone()),
        )
    }

    /// Key bindings file from settings, with a leading `~/` expanded.
    pub(crate) fn keybindings_path(&self) -> Option<PathBuf> {
        let raw = self.cfg.ui.keybindings_path.trim();
        if raw.is_empty() {
            return AppConfig::keybindings_path();
        }
        if let Some(rest) = raw.strip_prefix("~/") {
            let home = std::env::var("HOME")
                .ok()
                .or_else(|| std::env::var("USERPROFILE").ok())?;
            return Some(Path::new(&home).join(rest));
        }
        Some(PathBuf::from(raw))
    }
}
