//! Command-line interface for one aggregation run.
//!
//! Every option can also come from the environment.

use clap::Parser;
use std::path::PathBuf;

/// Aggregate trending repositories, Hacker News stories and tech feeds into
/// a JSON snapshot.
///
/// # Examples
///
/// ```sh
/// # Embedded source registry, default output locations
/// tech_digest
///
/// # Alternate registry and output roots
/// tech_digest -c ./sources.yaml -d ./out/data -p ./site/data
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a sources.yaml replacing the embedded configuration
    #[arg(short, long, env = "TECH_DIGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory for per-source files, latest.json and the archive
    #[arg(short, long, env = "TECH_DIGEST_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Directory that receives a copy of latest.json
    #[arg(short, long, env = "TECH_DIGEST_PUBLISH_DIR")]
    pub publish_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults_to_embedded_config() {
        let cli = Cli::parse_from(["tech_digest"]);

        assert!(cli.config.is_none());
        assert!(cli.data_dir.is_none());
        assert!(cli.publish_dir.is_none());
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "tech_digest",
            "--config",
            "./sources.yaml",
            "--data-dir",
            "./out/data",
            "--publish-dir",
            "./site/data",
        ]);

        assert_eq!(cli.config, Some(PathBuf::from("./sources.yaml")));
        assert_eq!(cli.data_dir, Some(PathBuf::from("./out/data")));
        assert_eq!(cli.publish_dir, Some(PathBuf::from("./site/data")));
    }

    #[test]
    fn test_cli_short_flags() {
        let cli = Cli::parse_from(["tech_digest", "-c", "/tmp/s.yaml", "-d", "/tmp/d", "-p", "/tmp/p"]);

        assert_eq!(cli.config, Some(PathBuf::from("/tmp/s.yaml")));
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/d")));
        assert_eq!(cli.publish_dir, Some(PathBuf::from("/tmp/p")));
    }
}
