//! Command line arguments.

use std::path::PathBuf;

use clap::Parser;
use msgbridge_core::Config;

/// Convert Outlook MSG files into EML files.
///
/// Items are read from the input container, rendered into the output
/// container, and the originals are moved to the archive or failed
/// container depending on the result.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Root directory holding one directory per container
    #[arg(long)]
    pub storage_root: Option<PathBuf>,

    /// Maximum accepted input size in MiB
    #[arg(long)]
    pub max_file_size_mb: Option<u64>,

    /// Processing budget per item, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Log level used when RUST_LOG is not set
    #[arg(long)]
    pub log_level: Option<String>,

    /// Print one JSON report per item on stdout
    #[arg(long)]
    pub json: bool,

    /// Items to process; every item in the input container when omitted
    pub items: Vec<String>,
}

impl Cli {
    /// Applies flag overrides, the last configuration layer.
    pub fn apply(&self, config: &mut Config) {
        if let Some(root) = &self.storage_root {
            config.storage_root.clone_from(root);
        }
        if let Some(max) = self.max_file_size_mb {
            config.max_file_size_mb = max;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(level) = &self.log_level {
            config.log_level.clone_from(level);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from([
            "msgbridge",
            "--storage-root",
            "/tmp/store",
            "--timeout",
            "5",
            "--json",
            "a.msg",
            "b.msg",
        ])
        .unwrap();
        let mut config = Config::default();
        cli.apply(&mut config);

        assert_eq!(config.storage_root, PathBuf::from("/tmp/store"));
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_file_size_mb, 25);
        assert!(cli.json);
        assert_eq!(cli.items, vec!["a.msg", "b.msg"]);
    }

    #[test]
    fn test_no_items_means_all() {
        let cli = Cli::try_parse_from(["msgbridge"]).unwrap();
        assert!(cli.items.is_empty());
        assert!(cli.config.is_none());
    }
}
