//! Command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chunkup_api::Client;
use chunkup_protocol::{FileRecord, UploadState};
use chunkup_transfer::format_file_size;
use chunkup_uploader::{RunOutcome, UploadController, UploadEvent, UploadHandle};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::transport::HttpTransport;

/// A parsed subcommand.
pub enum Command {
    Upload { path: PathBuf },
    List,
    Info { id: i64 },
    Download { id: i64, out: Option<PathBuf> },
    Delete { id: i64 },
}

/// Runs one command against the configured service.
pub async fn run(command: Command, config: Config) -> anyhow::Result<()> {
    let client = Client::with_timeout(&config.token, config.request_timeout())?
        .with_base_url(config.base_url.clone());

    match command {
        Command::Upload { path } => upload(&client, &config, &path).await,
        Command::List => {
            print_files(&client.list_files().await?);
            Ok(())
        }
        Command::Info { id } => {
            let record = client.file_metadata(id).await?;
            print_record(&record);
            Ok(())
        }
        Command::Download { id, out } => {
            let dir = out.unwrap_or_else(|| PathBuf::from(&config.download_dir));
            tokio::fs::create_dir_all(&dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
            let path = client.download(id, &dir).await?;
            println!("Saved to {}", path.display());
            Ok(())
        }
        Command::Delete { id } => {
            client.delete(id).await?;
            println!("Deleted file {id}");
            Ok(())
        }
    }
}

async fn upload(client: &Client, config: &Config, path: &Path) -> anyhow::Result<()> {
    let transport = Arc::new(HttpTransport::new(client.clone()));
    let mut controller = UploadController::from_path(transport, path, config.uploader_config())
        .await
        .with_context(|| format!("preparing {}", path.display()))?;

    let session = controller.session();
    println!(
        "Uploading {} ({}) in {} chunk(s)",
        session.file_name(),
        format_file_size(session.total_size()),
        session.total_ranges()
    );
    println!("Press Ctrl-C to pause.");

    let handle = controller.handle();
    let printer = controller
        .take_events()
        .map(|events| tokio::spawn(print_events(events, handle.clone())));
    let signals = tokio::spawn(watch_ctrl_c(handle.clone()));

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut result = controller.start().await;
    let result = loop {
        match result {
            Ok(RunOutcome::Paused) => {
                let p = handle.progress();
                println!(
                    "Paused after {}/{} chunks. Press Enter to resume, Ctrl-C to cancel.",
                    p.sent_chunks, p.total_chunks
                );
                tokio::select! {
                    line = stdin.next_line() => match paused_input(line?) {
                        PausedInput::Resume => {
                            println!("Resuming...");
                            result = controller.resume().await;
                        }
                        PausedInput::Cancel => {
                            println!("stdin closed; cancelling upload.");
                            result = controller.cancel().map(|_| RunOutcome::Cancelled);
                        }
                    },
                    _ = handle.cancelled() => {
                        result = controller.cancel().map(|_| RunOutcome::Cancelled);
                    }
                }
            }
            other => break other,
        }
    };

    signals.abort();
    drop(controller);
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    match result? {
        RunOutcome::Completed => {
            println!("Upload complete.");
            print_files(&client.list_files().await?);
        }
        RunOutcome::Cancelled => println!("Upload cancelled."),
        RunOutcome::Paused => {}
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum PausedInput {
    Resume,
    Cancel,
}

/// A line resumes a paused upload; end of input cancels it.
fn paused_input(line: Option<String>) -> PausedInput {
    match line {
        Some(_) => PausedInput::Resume,
        None => PausedInput::Cancel,
    }
}

/// First Ctrl-C pauses; another one while paused or pausing cancels.
async fn watch_ctrl_c(handle: UploadHandle) {
    while tokio::signal::ctrl_c().await.is_ok() {
        let state = handle.state();
        if state.is_terminal() {
            break;
        }
        if state == UploadState::Uploading && !handle.pause_requested() && handle.pause().is_ok() {
            println!("\nPausing after the current chunk (Ctrl-C again to cancel)...");
            continue;
        }
        handle.cancel();
        break;
    }
}

async fn print_events(mut events: mpsc::Receiver<UploadEvent>, handle: UploadHandle) {
    while let Some(event) = events.recv().await {
        match event {
            UploadEvent::ChunkAccepted {
                sent,
                total,
                progress,
                ..
            } => {
                let p = handle.progress();
                let eta = p
                    .eta_secs
                    .map(|s| format!("  ETA {:.0}s", s.ceil()))
                    .unwrap_or_default();
                println!(
                    "[{progress:>5.1}%] chunk {sent}/{total}  {}/{}  {}/s{eta}",
                    format_file_size(p.sent_bytes),
                    format_file_size(p.total_bytes),
                    format_file_size(p.bytes_per_second as u64),
                );
            }
            UploadEvent::Retrying {
                order,
                attempt,
                delay,
                reason,
            } => println!(
                "  chunk {} failed ({reason}); retry {attempt} in {} ms",
                order + 1,
                delay.as_millis()
            ),
            UploadEvent::StateChanged { .. }
            | UploadEvent::Completed { .. }
            | UploadEvent::Failed { .. } => {}
        }
    }
}

fn print_files(files: &[FileRecord]) {
    if files.is_empty() {
        println!("No files.");
        return;
    }
    println!("{:>6}  {:<32}  {:>10}  {:<24}  CREATED", "ID", "NAME", "SIZE", "TYPE");
    for f in files {
        println!(
            "{:>6}  {:<32}  {:>10}  {:<24}  {}",
            f.id,
            f.filename,
            format_file_size(f.size),
            f.mime_type,
            f.created_at
        );
    }
}

fn print_record(record: &FileRecord) {
    println!("ID:       {}", record.id);
    println!("Name:     {}", record.filename);
    println!("Size:     {} ({} bytes)", format_file_size(record.size), record.size);
    println!("Type:     {}", record.mime_type);
    println!("Created:  {}", record.created_at);
    if !record.path.is_empty() {
        println!("URL:      {}", record.path);
    }
}
