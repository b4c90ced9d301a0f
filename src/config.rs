use crate::models::Limits;
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, path::PathBuf, str::FromStr, time::Duration};

const GIB: u64 = 1024 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub files_dir: PathBuf,
    pub meta_dir: PathBuf,
    pub limits: Limits,
    pub cleanup_every_minutes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Ephemeral file store")]
pub struct Args {
    /// Host to bind to (overrides FILEDROP_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides FILEDROP_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding object data (overrides FILEDROP_FILES_DIR)
    #[arg(long)]
    pub files_dir: Option<PathBuf>,

    /// Directory holding metadata sidecars (overrides FILEDROP_META_DIR)
    #[arg(long)]
    pub meta_dir: Option<PathBuf>,

    /// Reject uploads of this many bytes or more (overrides FILEDROP_MAX_SIZE)
    #[arg(long)]
    pub max_size: Option<u64>,

    /// Longest lifetime in seconds for large uploads, 0 for none
    /// (overrides FILEDROP_MAX_EXPIRY)
    #[arg(long)]
    pub max_expiry: Option<u64>,

    /// Uploads above this many bytes are held to max-expiry
    /// (overrides FILEDROP_MAX_DURATION_SIZE)
    #[arg(long)]
    pub max_duration_size: Option<u64>,

    /// Sweep expired objects every N minutes, 0 to disable
    /// (overrides FILEDROP_CLEANUP_EVERY_MINUTES)
    #[arg(long)]
    pub cleanup_every_minutes: Option<u64>,

    /// Delete expired objects once and exit
    #[arg(long)]
    pub sweep: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and sweep flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let sweep = args.sweep;
        Ok((Self::from_args(args)?, sweep))
    }

    /// Merge parsed CLI args over environment values and defaults.
    pub fn from_args(args: Args) -> Result<Self> {
        let defaults = Limits::default();

        let env_host = env::var("FILEDROP_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = env_or("FILEDROP_PORT", 8080)?;
        let env_files = env::var("FILEDROP_FILES_DIR").unwrap_or_else(|_| "./data/files".into());
        let env_meta = env::var("FILEDROP_META_DIR").unwrap_or_else(|_| "./data/meta".into());
        let env_max_size = env_or("FILEDROP_MAX_SIZE", defaults.max_size)?;
        let env_max_expiry = env_or("FILEDROP_MAX_EXPIRY", 0)?;
        let env_max_duration_size = env_or("FILEDROP_MAX_DURATION_SIZE", 4 * GIB)?;
        let env_cleanup = env_or("FILEDROP_CLEANUP_EVERY_MINUTES", 0)?;

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            files_dir: args.files_dir.unwrap_or_else(|| env_files.into()),
            meta_dir: args.meta_dir.unwrap_or_else(|| env_meta.into()),
            limits: Limits {
                max_size: args.max_size.unwrap_or(env_max_size),
                max_expiry: Duration::from_secs(args.max_expiry.unwrap_or(env_max_expiry)),
                max_duration_size: args.max_duration_size.unwrap_or(env_max_duration_size),
            },
            cleanup_every_minutes: args.cleanup_every_minutes.unwrap_or(env_cleanup),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse an environment variable, falling back to `default` only
/// when it is unset.
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
