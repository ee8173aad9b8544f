// Subcommand implementations
// Each command returns the process exit code

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use spider_lock::{DistributedLock, KeyTtl, LockOptions, LockSettings, LockStore};

use crate::cli::{Command, KeyArgs, ProlongArgs, RunArgs};
use crate::settings::Settings;

/// Exit code when the lock could not be acquired (EX_TEMPFAIL)
pub const EXIT_NOT_ACQUIRED: i32 = 75;

/// Exit code reported when the child was killed by a signal
pub const EXIT_CHILD_SIGNALED: i32 = 1;

pub async fn execute(
    command: &Command,
    settings: &Settings,
    store: Arc<dyn LockStore>,
) -> anyhow::Result<i32> {
    match command {
        Command::Run(args) => run(args, &settings.lock, store).await,
        Command::Ttl(args) => ttl(args, &settings.lock, store).await,
        Command::Prolong(args) => prolong(args, &settings.lock, store).await,
        Command::ForceRelease(args) => force_release(args, &settings.lock, store).await,
    }
}

/// Options for `run`: settings with the command line values applied on top
pub fn run_options(args: &RunArgs, settings: &LockSettings) -> LockOptions {
    let mut settings = settings.clone();
    if let Some(timeout) = args.timeout {
        settings.timeout_secs = timeout;
    }
    if let Some(wait_timeout) = args.wait_timeout {
        settings.wait_timeout_secs = wait_timeout;
    }
    LockOptions::from(&settings)
}

pub fn render_ttl(ttl: &KeyTtl) -> String {
    match ttl {
        KeyTtl::Expires(remaining) => format!("{:.3}s", remaining.as_secs_f64()),
        KeyTtl::Persistent => "persistent (no expiry)".to_string(),
        KeyTtl::Missing => "missing".to_string(),
    }
}

/// Acquire, run the child command, release
///
/// Ctrl-C while waiting stops the wait. Ctrl-C while the child runs is left
/// to the child; the lock is released once it exits.
pub async fn run(
    args: &RunArgs,
    settings: &LockSettings,
    store: Arc<dyn LockStore>,
) -> anyhow::Result<i32> {
    let Some((program, program_args)) = args.command.split_first() else {
        anyhow::bail!("no command given");
    };

    let interrupted = Arc::new(AtomicBool::new(false));
    let signal_flag = interrupted.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_flag.store(true, Ordering::SeqCst);
        }
    });

    let options = run_options(args, settings);
    let break_flag = interrupted.clone();
    let mut lock = DistributedLock::new(&args.key.key, options, store)?
        .with_break_wait(move || break_flag.load(Ordering::SeqCst));

    let outcome = lock
        .scoped(|held| async move {
            if held {
                run_child(program, program_args).await.map(Some)
            } else {
                Ok(None)
            }
        })
        .await;
    signal_task.abort();

    match outcome?? {
        Some(code) => Ok(code),
        None => {
            if interrupted.load(Ordering::SeqCst) {
                warn!(lock = %lock, "Interrupted while waiting for lock");
            } else {
                warn!(lock = %lock, "Lock not acquired");
            }
            Ok(EXIT_NOT_ACQUIRED)
        }
    }
}

async fn run_child(program: &str, args: &[String]) -> anyhow::Result<i32> {
    info!(program = %program, "Running command under lock");
    let status = tokio::process::Command::new(program)
        .args(args)
        .status()
        .await
        .with_context(|| format!("failed to run {}", program))?;
    Ok(status.code().unwrap_or(EXIT_CHILD_SIGNALED))
}

pub async fn ttl(
    args: &KeyArgs,
    settings: &LockSettings,
    store: Arc<dyn LockStore>,
) -> anyhow::Result<i32> {
    let key = LockOptions::from(settings).namespaced_key(&args.key);
    let ttl = store.ttl(&key).await?;
    println!("{} {}", key, render_ttl(&ttl));
    Ok(if ttl.is_sentinel() { 1 } else { 0 })
}

pub async fn prolong(
    args: &ProlongArgs,
    settings: &LockSettings,
    store: Arc<dyn LockStore>,
) -> anyhow::Result<i32> {
    let lock = DistributedLock::new(&args.key.key, LockOptions::from(settings), store)?;
    let ttl = lock.prolong(Duration::from_secs(args.extra)).await?;
    println!("{} {}", lock.key(), render_ttl(&ttl));
    if ttl.is_sentinel() {
        warn!(lock = %lock, ttl = %ttl, "Nothing to prolong");
        return Ok(1);
    }
    Ok(0)
}

pub async fn force_release(
    args: &KeyArgs,
    settings: &LockSettings,
    store: Arc<dyn LockStore>,
) -> anyhow::Result<i32> {
    let key = LockOptions::from(settings).namespaced_key(&args.key);
    store.delete(&key).await?;
    info!(key = %key, "Lock entry deleted");
    Ok(0)
}
