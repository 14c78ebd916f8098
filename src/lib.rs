// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod fingerprint;
pub mod fs;
pub mod hash;
pub mod logging;
pub mod snapshot;
pub mod types;
pub mod vfs;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{InputTracker, Session, SessionEvent, SessionOptions, StdoutReportSink};
use crate::fs::{FileSystem, RealFileSystem};
use crate::hash::{CachingFileHasher, ContentFileHasher};
use crate::snapshot::DefaultExcludes;
use crate::vfs::{ChangeBatch, ChannelChangeListener, WatchingOptions, WatchingVirtualFileSystem, coalesce_changes};
use crate::watch::{
    DefaultFileSystemDetector, FileSystemDetector, NativeWatcherFactory, NotifyWatcherFactory, WatcherPlatform,
};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the watching virtual file system and its native watcher
/// - quiet-period coalescing of handled changes
/// - the build session
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut cfg = load_and_validate(&config_path)?;
    args.apply_overrides(&mut cfg)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let fs: Arc<dyn FileSystem> = Arc::new(RealFileSystem);
    let detector: Arc<dyn FileSystemDetector> = Arc::new(DefaultFileSystemDetector::default());
    let factory: Arc<dyn NativeWatcherFactory> = Arc::new(NotifyWatcherFactory {
        queue_capacity: cfg.config.queue_capacity,
    });
    let vfs = vfs_from_config(&cfg, fs, detector, factory)?;
    let tracker = InputTracker::from_config(&cfg)?;

    // Session event channel.
    let (session_tx, session_rx) = mpsc::channel::<SessionEvent>(16);

    if !args.once {
        // Handled changes → quiet-period batches → session events.
        let (change_tx, change_rx) = mpsc::unbounded_channel();
        let (batch_tx, mut batch_rx) = mpsc::channel::<ChangeBatch>(16);
        vfs.add_change_listener(Arc::new(ChannelChangeListener::new(change_tx)));
        tokio::spawn(coalesce_changes(
            change_rx,
            batch_tx,
            cfg.config.quiet_period(),
            cfg.config.max_wait(),
        ));

        let tx = session_tx.clone();
        tokio::spawn(async move {
            while let Some(batch) = batch_rx.recv().await {
                if tx.send(SessionEvent::ChangesDetected(batch)).await.is_err() {
                    break;
                }
            }
        });
    }

    // Ctrl-C → graceful shutdown.
    {
        let tx = session_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            let _ = tx.send(SessionEvent::ShutdownRequested).await;
        });
    }

    let options = SessionOptions {
        exit_after_first_build: args.once,
    };
    info!(inputs = tracker.inputs().len(), once = args.once, "starting session");

    let session = Session::new(vfs, tracker, cfg, session_rx, StdoutReportSink, options);
    session.run().await?;
    Ok(())
}

/// Build the virtual file system described by `cfg` on top of the given
/// collaborators.
pub fn vfs_from_config(
    cfg: &ConfigFile,
    fs: Arc<dyn FileSystem>,
    detector: Arc<dyn FileSystemDetector>,
    factory: Arc<dyn NativeWatcherFactory>,
) -> Result<Arc<WatchingVirtualFileSystem>> {
    let hasher = Arc::new(CachingFileHasher::new(Arc::new(ContentFileHasher::new(Arc::clone(&fs)))));
    let platform = WatcherPlatform::current();
    let options = WatchingOptions {
        strategy: platform.resolve(cfg.config.watch_strategy),
        platform,
        probe_dir: cfg.config.probe_dir.clone(),
        immutable_locations: cfg.immutable_locations(),
    };
    let default_excludes = DefaultExcludes::new(cfg.default_excludes())?;
    Ok(Arc::new(WatchingVirtualFileSystem::new(
        fs,
        hasher,
        default_excludes,
        detector,
        factory,
        options,
    )))
}

/// Simple dry-run output: print the watch settings and resolved inputs.
fn print_dry_run(cfg: &ConfigFile) {
    let settings = &cfg.config;
    println!("vfswatch dry-run");
    println!("  config.watch_mode = {:?}", settings.watch_mode);
    println!("  config.watch_strategy = {:?}", settings.watch_strategy);
    println!("  config.vfs_logging = {:?}", settings.vfs_logging);
    println!("  config.max_hierarchies = {}", settings.max_hierarchies);
    println!(
        "  config.quiet_period_ms = {} (max wait {})",
        settings.quiet_period_ms, settings.max_wait_ms
    );
    println!("  hierarchies: {:?}", cfg.watchable_hierarchies());
    println!("  default excludes: {:?}", cfg.default_excludes());
    println!();

    println!("inputs ({}):", cfg.input.len());
    for (name, input) in cfg.input.iter() {
        println!("  - {name}");
        println!("      roots: {:?}", cfg.input_roots(input));
        println!("      normalizer: {:?}", input.normalizer);
        if !input.include.is_empty() {
            println!("      include: {:?}", input.include);
        }
        if !input.exclude.is_empty() {
            println!("      exclude: {:?}", input.exclude);
        }
        if input.include_missing {
            println!("      include_missing: true");
        }
        if input.ignore_directories {
            println!("      ignore_directories: true");
        }
        if input.ordered {
            println!("      ordered: true");
        }
    }

    debug!("dry-run complete (nothing snapshotted)");
}
