use anyhow::Result;
use chrono::Utc;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use termagent_core::runtime_dir;

/// Append-only, timestamped log for a client session.
///
/// Every line lands in `.termagent/observe.log`. Verbose lines are mirrored
/// to stderr when verbose mode is on; warnings are mirrored unless the
/// observer is quiet (the TUI owns the terminal).
#[derive(Debug, Clone)]
pub struct Observer {
    log_path: PathBuf,
    verbose: bool,
    quiet: bool,
}

impl Observer {
    pub fn new(workspace: &Path) -> Result<Self> {
        let dir = runtime_dir(workspace);
        fs::create_dir_all(&dir)?;
        Ok(Self::at_path(dir.join("observe.log")))
    }

    pub fn at_path(log_path: PathBuf) -> Self {
        Self {
            log_path,
            verbose: false,
            quiet: false,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Record a structured event line: `<ts> EVENT <kind> <json>`.
    pub fn record(&self, kind: &str, payload: Value) -> Result<()> {
        self.append_log_line(&format!(
            "{} EVENT {kind} {}",
            Utc::now().to_rfc3339(),
            serde_json::to_string(&payload)?
        ))
    }

    /// Enable or disable verbose logging to stderr.
    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Suppress all stderr output; lines still reach the log file.
    pub fn set_quiet(&mut self, quiet: bool) {
        self.quiet = quiet;
    }

    /// Log a message to stderr with `[termagent]` prefix when verbose mode is on.
    pub fn verbose_log(&self, msg: &str) {
        if self.verbose && !self.quiet {
            eprintln!("[termagent] {msg}");
        }
        let _ = self.append_log_line(&format!("{} DEBUG {msg}", Utc::now().to_rfc3339()));
    }

    /// Log a warning. Always written to the log file, and to stderr unless quiet.
    pub fn warn_log(&self, msg: &str) {
        if !self.quiet {
            eprintln!("[termagent WARN] {msg}");
        }
        let _ = self.append_log_line(&format!("{} WARN {msg}", Utc::now().to_rfc3339()));
    }

    fn append_log_line(&self, line: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}
