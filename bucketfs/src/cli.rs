use bucketfs::SeekMode;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Browse an object store bucket as a filesystem", long_about = None)]
pub(crate) struct Args {
    /// Serve a local directory as the bucket instead of talking to S3
    #[arg(long, env = "BUCKETFS_LOCAL", conflicts_with = "bucket")]
    pub(crate) local: Option<PathBuf>,

    /// Bucket name
    #[arg(long, env = "BUCKETFS_BUCKET")]
    pub(crate) bucket: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack, ...)
    #[arg(long, env = "BUCKETFS_ENDPOINT")]
    pub(crate) endpoint: Option<String>,

    /// Region; falls back to the AWS environment/profile
    #[arg(long, env = "BUCKETFS_REGION")]
    pub(crate) region: Option<String>,

    /// Use path-style addressing
    #[arg(long, env = "BUCKETFS_PATH_STYLE", default_value_t = false)]
    pub(crate) path_style: bool,

    /// Attempts per request, including the first
    #[arg(long, env = "BUCKETFS_MAX_ATTEMPTS", default_value_t = 3)]
    pub(crate) max_attempts: u32,

    /// Per-operation timeout in seconds
    #[arg(long, env = "BUCKETFS_TIMEOUT_SECS", default_value_t = 30)]
    pub(crate) timeout_secs: u64,

    /// Seek semantics of opened files: "arithmetic" or "reopen"
    #[arg(long, env = "BUCKETFS_SEEK_MODE", default_value_t = SeekMode::Arithmetic)]
    pub(crate) seek_mode: SeekMode,

    /// Keys requested per listing page (1-1000)
    #[arg(
        long,
        env = "BUCKETFS_PAGE_SIZE",
        default_value_t = 1000,
        value_parser = clap::value_parser!(i32).range(1..=1000)
    )]
    pub(crate) page_size: i32,

    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Show type, size and modification time of a path
    Stat { path: String },
    /// List a directory ("." is the bucket root)
    Ls {
        #[arg(default_value = ".")]
        path: String,
        /// Stop after this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print a file to stdout
    Cat {
        path: String,
        /// Start reading at this byte offset
        #[arg(long, default_value_t = 0)]
        offset: u64,
    },
    /// Upload a local file
    Put { path: String, file: PathBuf },
    /// Rename an object (copy, then delete)
    Mv { old: String, new: String },
}
