#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI that sweeps unseen messages out of one or more IMAP folders

use clap::Parser;
use mailsweep::{
    ConnectionParams, FolderList, ImapStore, LogReporter, OutcomeStatus, ParsedMessage,
    RetrievalPolicy, RetrievalSession,
};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mailsweep")]
#[command(about = "Fetch unseen messages from IMAP folders")]
struct Args {
    /// Comma separated folders to sweep (overrides IMAP_FOLDERS)
    #[arg(long)]
    folders: Option<String>,

    /// Leave fetched messages unread
    #[arg(long)]
    peek: bool,

    /// Output messages and the summary as JSON lines
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let params = ConnectionParams::from_env()?;
    let folders = match &args.folders {
        Some(list) => FolderList::parse(list)?,
        None => FolderList::from_env()?,
    };
    let policy = if args.peek {
        RetrievalPolicy::peek()
    } else {
        RetrievalPolicy::from_env()?
    };

    let (tx, mut rx) = mpsc::unbounded_channel::<ParsedMessage>();
    let json = args.json;
    let printer = tokio::spawn(async move {
        let mut printed = 0usize;
        while let Some(message) = rx.recv().await {
            if json {
                match serde_json::to_string(&message) {
                    Ok(line) => println!("{line}"),
                    Err(e) => eprintln!("Could not serialize message: {e}"),
                }
            } else {
                print_message(&message);
            }
            printed += 1;
        }
        printed
    });

    let mut session = RetrievalSession::new(ImapStore::new(), LogReporter, tx);
    let summary = session.start(&params, &folders, policy).await?;
    // Dropping the session drops the sender so the printer can finish.
    drop(session);
    let printed = printer.await?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!("\n{} ({printed} printed)", summary.headline());
    }

    anyhow::ensure!(
        summary.status != OutcomeStatus::Error,
        "retrieval failed: {}",
        summary.errors.join("; ")
    );
    Ok(())
}

fn print_message(message: &ParsedMessage) {
    println!("{}", "-".repeat(72));
    println!("Folder:  {}", message.folder);
    println!(
        "Date:    {}",
        message
            .date
            .map_or_else(|| "-".to_string(), |d| d.format("%Y-%m-%d %H:%M:%S").to_string())
    );
    println!("From:    {}", message.from.as_deref().unwrap_or("-"));
    println!("Subject: {}", message.subject.as_deref().unwrap_or(""));

    if !message.attachments.is_empty() {
        println!("Attachments:");
        for a in &message.attachments {
            println!(
                "  {} ({}, {} bytes)",
                a.file_name.as_deref().unwrap_or(&a.generated_file_name),
                a.content_type,
                a.length
            );
        }
    }

    println!("\n{}", truncate(message.text.as_deref().unwrap_or(""), 2000));
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{truncated}...")
    }
}
