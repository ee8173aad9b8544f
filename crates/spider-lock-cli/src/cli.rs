//! Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Command line arguments for `spider-lock`
#[derive(Debug, Parser)]
#[command(
    name = "spider-lock",
    version,
    about = "Serialize work across processes with a Redis-coordinated lock"
)]
pub struct Cli {
    /// Configuration file (default: conf/spider-lock.yml if present)
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Redis connection URL
    #[arg(long = "redis-url", env = "SPIDER_LOCK_REDIS_URL", global = true)]
    pub redis_url: Option<String>,

    /// Log level or filter directive (RUST_LOG takes precedence)
    #[arg(long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a command while holding the lock
    Run(RunArgs),
    /// Show the remaining lease of a lock
    Ttl(KeyArgs),
    /// Extend the lease of a lock
    Prolong(ProlongArgs),
    /// Delete a lock entry regardless of who holds it
    ForceRelease(KeyArgs),
}

#[derive(Debug, Clone, Args)]
pub struct KeyArgs {
    /// Lock name
    #[arg(short = 'k', long = "key")]
    pub key: String,
}

#[derive(Debug, Clone, Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Lease in seconds
    #[arg(short = 't', long = "timeout")]
    pub timeout: Option<u64>,

    /// Maximum wait in seconds; <= 0 tries once
    #[arg(short = 'w', long = "wait-timeout", allow_negative_numbers = true)]
    pub wait_timeout: Option<i64>,

    /// Command and arguments to run under the lock
    #[arg(required = true, last = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Clone, Args)]
pub struct ProlongArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// Seconds to add to the current lease
    #[arg(short = 'e', long = "extra")]
    pub extra: u64,
}
