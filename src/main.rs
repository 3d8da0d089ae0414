//! Dupfinder: find byte-identical duplicate files.
//!
//! Thin binary entry point. Scanning and watching live in `dupfinder-core`;
//! this crate parses the command line, prints reports and runs the optional
//! watch loop.
mod cli;
mod live;
mod report;

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;
use cli::Cli;
use crossbeam_channel::{never, select, unbounded};
use dupfinder_core::{log, start_scan, FileWatcher, ScanResult, WatchError, WatcherConfig};
use live::LiveResults;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, warn};

/// How often the watch loop checks that the watcher is still alive.
const WATCH_HEARTBEAT: Duration = Duration::from_secs(1);

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_writer(io::stderr)
        .init();

    info!("dupfinder starting");

    let scanned_at = Local::now();
    let result = run_scan(&cli)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if cli.json {
        report::write_json(&mut out, &cli.root, &result, scanned_at)
            .context("failed to write the JSON report")?;
        writeln!(out)?;
    } else {
        report::write_text(&mut out, &result)?;
    }
    out.flush()?;
    drop(out);

    if let Some(path) = &cli.csv {
        let file = File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        report::write_csv(BufWriter::new(file), &result)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote {}", path.display());
    }

    if cli.watch && !result.is_empty() {
        watch(&result)?;
    }

    Ok(())
}

fn run_scan(cli: &Cli) -> anyhow::Result<ScanResult> {
    let handle = start_scan(cli.root.clone(), cli.scan_options());
    let quiet = cli.quiet;
    handle
        .wait_with(|msg| {
            if quiet {
                return;
            }
            if let Some(line) = msg.log_line() {
                // Locked per line: the scan thread's tracing output shares
                // stderr.
                let _ = io::stderr().lock().write_all(line.as_bytes());
            }
        })
        .with_context(|| format!("scan of {} failed", cli.root.display()))
}

/// Watch every duplicate until each class is down to one copy.
fn watch(result: &ScanResult) -> anyhow::Result<()> {
    let (line_tx, line_rx) = unbounded::<String>();
    let watcher = FileWatcher::start(WatcherConfig::default(), log::forward_to(line_tx))
        .context("cannot start the file watcher")?;

    let (gone_tx, gone_rx) = unbounded::<PathBuf>();
    watcher.set_callback(move |path| {
        let _ = gone_tx.send(path.to_path_buf());
    });

    let mut live = LiveResults::new(result);
    let mut dropped = 0usize;
    for path in live.paths() {
        // An earlier member's class may have been dropped already.
        if !live.contains(&path) {
            continue;
        }
        match watcher.add_file(&path) {
            Ok(()) => {}
            // Gone between the scan and now.
            Err(WatchError::NotARegularFile { .. }) => announce(&mut live, path),
            Err(e) => {
                warn!("not watching {}: {e}", path.display());
                // The class could never resolve without this member.
                if let Some((digest, members)) = live.abandon(&path) {
                    dropped += 1;
                    eprintln!(
                        "{} Cannot watch {}: {e}; dropped class {digest} ({members} copies)",
                        stamp(),
                        path.display()
                    );
                }
            }
        }
    }

    if live.is_empty() && dropped > 0 {
        bail!("{dropped} duplicate classes cannot be watched");
    }

    println!(
        "{} Watching {} duplicate classes; remove copies to resolve them.",
        stamp(),
        live.len()
    );

    let mut lines_open = true;
    while !live.is_empty() {
        let lines = if lines_open { line_rx.clone() } else { never() };
        select! {
            recv(gone_rx) -> msg => match msg {
                Ok(path) => announce(&mut live, path),
                Err(_) => break,
            },
            recv(lines) -> msg => match msg {
                Ok(line) => eprint!("{line}"),
                Err(_) => lines_open = false,
            },
            default(WATCH_HEARTBEAT) => {
                if !watcher.is_running() {
                    break;
                }
            }
        }
    }

    if live.is_empty() {
        println!("{} All duplicate classes resolved.", stamp());
        watcher.shutdown().context("the watcher stopped with an error")?;
        return Ok(());
    }

    match watcher.shutdown() {
        Ok(()) => bail!("the watcher stopped with {} classes open", live.len()),
        Err(e) => Err(e).context("the watcher stopped unexpectedly"),
    }
}

fn announce(live: &mut LiveResults, path: PathBuf) {
    if let Some(line) = live.remove(&path).describe(&path) {
        println!("{} {line}", stamp());
    }
}

fn stamp() -> String {
    Local::now().format("[%H:%M:%S]").to_string()
}
