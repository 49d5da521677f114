use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use cairn_datas::{pull, DatasError, PullProgress};
use cairn_remote::{ChunkServer, ServerConfig};
use cairn_spec::{discover, Resolver};
use cairn_value::{render, Ref};
use colored::Colorize;
use tokio::signal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cli::*;
use crate::pager;
use crate::status::{bytes_per_sec, format_bytes, format_elapsed, StatusLine};

const PROGRESS_BUFFER: usize = 1024;

pub async fn run_command(cli: Cli) -> anyhow::Result<()> {
    let cwd = std::env::current_dir().context("reading working directory")?;
    let resolver = discover(cwd)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(&resolver, args).await,
        Command::Show(args) => cmd_show(&resolver, args).await,
        Command::Sync(args) => cmd_sync(&resolver, args).await,
    }
}

async fn cmd_serve(resolver: &Resolver, args: ServeArgs) -> anyhow::Result<()> {
    let store = resolver.get_chunk_store(&args.db).await?;
    let config = ServerConfig::with_port(args.port);
    println!("Serving on {}", config.bind_addr.to_string().bold());

    let shutdown = CancellationToken::new();
    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            shutdown_signal().await;
            shutdown.cancel();
        }
    });

    ChunkServer::new(config, store).serve(shutdown).await?;
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", err);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => error!("failed to install SIGTERM handler: {}", err),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

async fn cmd_show(resolver: &Resolver, args: ShowArgs) -> anyhow::Result<()> {
    let (db, value) = resolver.get_path(&args.object).await?;
    let Some(value) = value else {
        eprintln!("Object not found: {}", args.object);
        return Ok(());
    };

    let mut text = Vec::new();
    render::write_encoded_value(&mut text, &value)?;
    let no_pager = args.no_pager;
    tokio::task::spawn_blocking(move || pager::page(&text, no_pager)).await??;

    db.close().await?;
    Ok(())
}

async fn cmd_sync(resolver: &Resolver, args: SyncArgs) -> anyhow::Result<()> {
    let (source_db, source_value, sink_db, sink_ds) = resolver
        .get_sync_pair(&args.source, &args.destination)
        .await?;
    let Some(source_value) = source_value else {
        bail!("Object not found: {}", args.source);
    };

    let source_ref = Ref::new(&source_value);
    let sink_ref = sink_ds.head().copied();
    let start = Instant::now();

    let (tx, rx) = mpsc::channel(PROGRESS_BUFFER);
    let reporter = tokio::spawn(report_progress(rx, start));

    let pulled = pull(
        Arc::clone(source_db.store()),
        Arc::clone(sink_db.store()),
        &source_ref,
        sink_ref.as_ref(),
        args.parallelism,
        &tx,
    )
    .await;
    drop(tx);
    let last = reporter.await?;
    pulled?;

    let mut non_ff = false;
    match sink_db.fast_forward(&sink_ds, source_ref).await {
        Ok(_) => {}
        Err(DatasError::MergeNeeded { .. }) => {
            sink_db.set_head(&sink_ds, source_ref).await?;
            non_ff = true;
        }
        Err(err) => return Err(err.into()),
    }

    let abandoned = non_ff && sink_ref.map(|r| r.target()) != Some(source_ref.target());
    if let Some(last) = last.filter(|p| p.done > 0) {
        println!(
            "{} - Synced {} in {} ({}/s)",
            "Done".green().bold(),
            format_bytes(last.approx_written_bytes),
            format_elapsed(start.elapsed()),
            bytes_per_sec(last.approx_written_bytes, start.elapsed()),
        );
        if abandoned {
            print_abandoned(sink_ref, &source_ref);
        }
    } else if sink_ref.is_none() {
        println!(
            "All chunks already exist at destination! Created new dataset {}.",
            args.destination.bold()
        );
    } else if abandoned {
        print_abandoned(sink_ref, &source_ref);
    } else {
        println!("Dataset {} is already up to date.", args.destination.bold());
    }

    source_db.close().await?;
    sink_db.close().await?;
    Ok(())
}

fn print_abandoned(old: Option<Ref>, new: &Ref) {
    if let Some(old) = old {
        println!(
            "{} {}; new head is {}",
            "Abandoning".yellow(),
            old.target(),
            new.target()
        );
    }
}

/// Draw the live progress line; return the last snapshot that copied data.
async fn report_progress(
    mut rx: mpsc::Receiver<PullProgress>,
    start: Instant,
) -> Option<PullProgress> {
    let mut line = StatusLine::new();
    let mut last = None;
    while let Some(progress) = rx.recv().await {
        // "Up to date" reads better than "100% (1/1)".
        if progress.is_degenerate() {
            continue;
        }
        last = Some(progress);
        if line.will_print() {
            line.print(&format!(
                "Syncing - {:.2}% ({}/s)",
                progress.percent(),
                bytes_per_sec(progress.approx_written_bytes, start.elapsed())
            ));
        }
    }
    line.done();
    last
}
