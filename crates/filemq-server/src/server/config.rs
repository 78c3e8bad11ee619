use anyhow::bail;
use clap::{Parser, ValueEnum};
use core::time::Duration;
use filemq::{IdMode, StoreConfig};
use std::path::PathBuf;

/// Runtime configuration for the `filemq-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file in the working directory is loaded first). Everything is fixed at
/// startup; changing a value requires a restart.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "filemq-server",
    version,
    about = "An HTTP message broker backed by a shared filesystem"
)]
pub struct CliArgs {
    /// Storage root holding the `new`, `delay`, `queues` and `remove` folders.
    ///
    /// Every process that shares this root (see `--peers`) must point at the
    /// same directory on the same filesystem, since claims rely on atomic
    /// renames.
    ///
    /// Environment variable: `FILEMQ_ROOT`
    #[arg(long, env = "FILEMQ_ROOT")]
    pub root: PathBuf,

    /// Number of workers in each of the saver and fetcher pools.
    ///
    /// Fetches are pinned to a worker by a checksum of the queue id, so every
    /// process sharing a root should use the same value.
    ///
    /// Environment variable: `NUM_WORKERS`
    #[arg(long, env = "NUM_WORKERS", default_value_t = 4)]
    pub workers: usize,

    /// Expected number of other processes sharing the storage root.
    ///
    /// Zero selects the single-node fetch path. Anything higher enables the
    /// randomized, race-tolerant claim.
    ///
    /// Environment variable: `PEERS`
    #[arg(long, env = "PEERS", default_value_t = 0)]
    pub peers: usize,

    /// Upper bound, in milliseconds, of the random pause taken before
    /// claiming from a queue that peers are likely to be reading too.
    ///
    /// Environment variable: `MAX_JITTER_MS`
    #[arg(long, env = "MAX_JITTER_MS", default_value_t = 5)]
    pub max_jitter_ms: u64,

    /// Address to listen on.
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:8080"))]
    pub server_addr: String,

    /// Which message id form to produce. `time` fails startup when no
    /// hardware node id exists; `auto` falls back to random ids.
    ///
    /// Environment variable: `ID_MODE`
    #[arg(long, env = "ID_MODE", value_enum, default_value_t = IdModeArg::Auto)]
    pub id_mode: IdModeArg,

    /// How often, in milliseconds, to run the built-in mover and reaper.
    ///
    /// Zero leaves the `new`, `delay` and `remove` folders to external
    /// daemons.
    ///
    /// Environment variable: `SWEEP_INTERVAL_MS`
    #[arg(long, env = "SWEEP_INTERVAL_MS", default_value_t = 0)]
    pub sweep_interval_ms: u64,

    /// Seconds a claimed message stays in `delay` before the built-in mover
    /// requeues it for redelivery.
    ///
    /// Environment variable: `VISIBILITY_TIMEOUT_SECS`
    #[arg(long, env = "VISIBILITY_TIMEOUT_SECS", default_value_t = 30)]
    pub visibility_timeout_secs: u64,

    /// Minimum age, in milliseconds, of a file in `new` before the built-in
    /// mover queues it.
    ///
    /// Environment variable: `PROMOTE_AFTER_MS`
    #[arg(long, env = "PROMOTE_AFTER_MS", default_value_t = 1000)]
    pub promote_after_ms: u64,

    /// Seconds to wait for each worker to acknowledge shutdown.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT_SECS`
    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdModeArg {
    Auto,
    Time,
    Random,
}

impl From<IdModeArg> for IdMode {
    fn from(mode: IdModeArg) -> Self {
        match mode {
            IdModeArg::Auto => Self::Auto,
            IdModeArg::Time => Self::Time,
            IdModeArg::Random => Self::Random,
        }
    }
}

/// Timing of the built-in mover and reaper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub interval: Duration,
    pub promote_after: Duration,
    pub visibility_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub store: StoreConfig,
    pub server_addr: String,
    pub id_mode: IdMode,
    /// `None` when external daemons own the folder transitions.
    pub sweep: Option<SweepConfig>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.root.as_os_str().is_empty() {
            bail!("FILEMQ_ROOT must not be empty");
        }

        if args.workers == 0 {
            bail!("NUM_WORKERS must be greater than 0");
        }

        let sweep = if args.sweep_interval_ms == 0 {
            None
        } else {
            if args.visibility_timeout_secs == 0 {
                bail!("VISIBILITY_TIMEOUT_SECS must be greater than 0 when sweeping");
            }
            Some(SweepConfig {
                interval: Duration::from_millis(args.sweep_interval_ms),
                promote_after: Duration::from_millis(args.promote_after_ms),
                visibility_timeout: Duration::from_secs(args.visibility_timeout_secs),
            })
        };

        let store = StoreConfig::new(args.root)
            .with_workers(args.workers)
            .with_peers(args.peers)
            .with_max_jitter(Duration::from_millis(args.max_jitter_ms))
            .with_shutdown_timeout(Duration::from_secs(args.shutdown_timeout_secs));

        Ok(Self {
            store,
            server_addr: args.server_addr,
            id_mode: args.id_mode.into(),
            sweep,
        })
    }
}
