use clap::Parser;
use quire_cli::{App, Cli, Command, format_history, read_source};
use quire_core::DocumentId;
use quire_engine::SaveOutcome;
use quire_logging::{LogConfig, QuireSubscriberBuilder};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.global.pretty_logs {
        LogConfig::development()
    } else {
        LogConfig::default()
    };
    let _log_guard = QuireSubscriberBuilder::new()
        .with_config(log_config)
        .with_level(&cli.global.log_level)
        .init();

    let app = App::open(&cli.global)?;

    match cli.command {
        Command::Replay { path, chat } => {
            let source = read_source(&path).await?;
            let summary = app.replay(&source, &chat).await?;
            println!(
                "{} ({}): {} events, {} skipped, {} versions",
                summary.document_id,
                summary.kind,
                summary.processed,
                summary.skipped,
                summary.versions
            );
        }

        Command::History { id, json } => {
            let versions = app.versions(&DocumentId::new(id)).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&versions)?);
            } else {
                print!("{}", format_history(&versions));
            }
        }

        Command::Show { id, index } => {
            println!("{}", app.show(&DocumentId::new(id), index).await?);
        }

        Command::Save {
            id,
            path,
            title,
            kind,
        } => {
            let content = read_source(&path).await?;
            match app.save(&DocumentId::new(id), content, title, kind).await? {
                SaveOutcome::Written(document) => {
                    println!("Saved version at {}", document.created_at.to_rfc3339())
                }
                _ => println!("Unchanged, no version written"),
            }
        }

        Command::Restore { id, index } => {
            let outcome = app.restore(&DocumentId::new(id), index).await?;
            println!(
                "Restored version {index}: removed {}, {} remaining",
                outcome.removed,
                outcome.versions.len()
            );
        }

        Command::Diff {
            id,
            from,
            to,
            format,
        } => {
            let rendered = app.diff(&DocumentId::new(id), from, to, format).await?;
            println!("{}", rendered.trim_end_matches('\n'));
        }
    }

    Ok(())
}
