use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use quire_core::ArtifactKind;

#[derive(Parser, Debug)]
#[command(
    name = "quire",
    version,
    about = "Replay artifact streams and work with document version histories"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding local document histories
    #[arg(long, global = true, default_value = ".quire", env = "QUIRE_DATA_DIR")]
    pub data_dir: PathBuf,

    /// User the versions are recorded for
    #[arg(long, global = true, default_value = "anonymous")]
    pub user: String,

    /// Document API base URL. Server ids go there; without it every
    /// history lives in the data directory.
    #[arg(long, global = true, env = "QUIRE_REMOTE_URL")]
    pub remote_url: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    /// Human-readable logs instead of JSON lines
    #[arg(long, global = true)]
    pub pretty_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fold a JSONL file of stream deltas into a document and store it
    Replay {
        /// File with one delta per line, `-` for stdin
        path: PathBuf,
        /// Chat the stream belongs to
        #[arg(long, default_value = "cli")]
        chat: String,
    },
    /// List the versions of a document
    History {
        id: String,
        /// Print versions as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print one version of a document (the latest by default)
    Show {
        id: String,
        #[arg(long)]
        index: Option<usize>,
    },
    /// Store new content as a version of a document
    Save {
        id: String,
        /// File with the content, `-` for stdin
        path: PathBuf,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        kind: Option<ArtifactKind>,
    },
    /// Truncate a document's history so the version at INDEX is the newest
    Restore { id: String, index: usize },
    /// Structural diff between two versions
    Diff {
        id: String,
        from: usize,
        to: usize,
        #[arg(long, value_enum, default_value_t = DiffFormat::Terminal)]
        format: DiffFormat,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum DiffFormat {
    /// Inline `{+inserted+}` and `[-deleted-]` markers
    Terminal,
    Html,
    /// The annotated tree as JSON
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_diff() {
        let cli = Cli::try_parse_from(["quire", "diff", "local-notes", "0", "2", "--format", "html"])
            .unwrap();
        match cli.command {
            Command::Diff {
                id,
                from,
                to,
                format,
            } => {
                assert_eq!(id, "local-notes");
                assert_eq!((from, to), (0, 2));
                assert_eq!(format, DiffFormat::Html);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "quire",
            "history",
            "doc",
            "--data-dir",
            "/tmp/q",
            "--user",
            "ada",
        ])
        .unwrap();
        assert_eq!(cli.global.data_dir, PathBuf::from("/tmp/q"));
        assert_eq!(cli.global.user, "ada");
        assert!(cli.global.remote_url.is_none());
    }

    #[test]
    fn test_parse_kind() {
        let cli = Cli::try_parse_from(["quire", "save", "doc", "-", "--kind", "code"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Save {
                kind: Some(ArtifactKind::Code),
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_unknown_kind() {
        assert!(Cli::try_parse_from(["quire", "save", "doc", "-", "--kind", "video"]).is_err());
    }
}
