use anyhow::{Context, bail};
use bucketfs::cadapter::localfs::LocalFsBackend;
use bucketfs::cadapter::s3::{S3Backend, S3Config};
use bucketfs::{BucketFs, FileInfo, FsOptions, ObjectBackend};
use clap::Parser;
use cli::{Args, Command};
use std::io::{SeekFrom, Write};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

mod cli;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let options = FsOptions {
        seek_mode: args.seek_mode,
        list_page_size: args.page_size,
    };

    if let Some(root) = &args.local {
        tracing::info!(root = %root.display(), "using local directory backend");
        let fs = BucketFs::with_options(LocalFsBackend::new(root), options);
        return run(&fs, args.command).await;
    }

    let Some(bucket) = args.bucket.clone() else {
        bail!("either --bucket or --local is required");
    };
    let config = S3Config {
        region: args.region.clone(),
        endpoint: args.endpoint.clone(),
        force_path_style: args.path_style,
        max_attempts: args.max_attempts,
        operation_timeout: Duration::from_secs(args.timeout_secs),
    };
    tracing::info!(%bucket, endpoint = ?config.endpoint, "using S3 backend");
    let fs = BucketFs::with_options(S3Backend::from_config(bucket, &config).await, options);
    run(&fs, args.command).await
}

async fn run<B: ObjectBackend>(fs: &BucketFs<B>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Stat { path } => {
            let info = fs.stat(&path).await?;
            println!("{}", describe(&info));
        }
        Command::Ls { path, limit } => {
            for entry in fs.read_dir(&path, limit).await? {
                println!("{}", describe(&entry));
            }
        }
        Command::Cat { path, offset } => {
            let node = fs.open(&path).await?;
            let Some(mut file) = node.into_file() else {
                bail!("{path} is a directory");
            };
            file.seek(SeekFrom::Start(offset)).await?;
            let mut data = Vec::new();
            file.read_to_end(&mut data).await?;
            std::io::stdout().lock().write_all(&data)?;
        }
        Command::Put { path, file } => {
            let data = tokio::fs::read(&file)
                .await
                .with_context(|| format!("reading {}", file.display()))?;
            fs.write_file(&path, &data).await?;
            tracing::info!(%path, bytes = data.len(), "uploaded");
        }
        Command::Mv { old, new } => {
            fs.rename(&old, &new).await?;
            tracing::info!(%old, %new, "renamed");
        }
    }
    Ok(())
}

fn describe(info: &FileInfo) -> String {
    let kind = if info.is_dir() { "dir " } else { "file" };
    let modified = info
        .mod_time()
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string());
    format!("{kind} {:>12} {modified:>19} {}", info.size(), info.name())
}
