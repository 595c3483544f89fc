use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use futures_util::StreamExt;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use afs_client::api::{FileApi, UploadFile};
use afs_client::auth::{AuthService, LoginOutcome};
use afs_client::config::Config;
use afs_client::gateway::HttpGateway;
use afs_client::listing::DirectoryService;
use afs_client::models::{OperationProgress, OperationStatus};
use afs_client::session::SessionStore;
use afs_client::status::StatusMonitor;
use afs_client::storage::FileStore;
use afs_client::tracker::OperationTracker;
use afs_client::utils::{format_duration, format_file_size, shutdown_signal};

// use mimalloc as the global allocator
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(
    name = "afs",
    about = "Advanced File Server client",
    version,
    long_about = "Browse and manage files on an Advanced File Server.\nConfiguration is read from AFS_* environment variables or a .env file."
)]
struct Cli {
    /// Override AFS_API_BASE_URL
    #[arg(long, global = true)]
    api_url: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in (prompts for a one-time code when the server asks for one)
    Login {
        #[arg(short, long)]
        username: String,
        /// Password (default: AFS_PASSWORD, then prompt)
        #[arg(short, long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Show the signed-in user
    Whoami,
    /// Check the server status
    Status {
        /// Keep polling and print every change until Ctrl-C
        #[arg(short, long)]
        watch: bool,
    },
    /// List a remote directory
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Create a directory inside PARENT
    Mkdir { parent: String, name: String },
    /// Rename a file or directory
    Rename { path: String, new_name: String },
    /// Move a file or directory
    Mv { source: String, target: String },
    /// Delete a file or directory
    Rm { path: String },
    /// Upload local files into a remote directory
    Upload {
        target: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Download a remote file
    Download {
        remote: String,
        /// Local destination (default: the remote file name)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    // load .env file if it exists (fails silently if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(url) = &cli.api_url {
        config.api_base_url = url.trim_end_matches('/').to_string();
    }

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.worker_threads.max(1))
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to build Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "warn".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();

        run(cli.command, config).await
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(command: Commands, config: Config) -> anyhow::Result<()> {
    let session = Arc::new(SessionStore::open(FileStore::new(&config.session_dir)));
    let gateway = Arc::new(HttpGateway::new(config.api_base_url.clone(), session.clone())?);
    let tracker = OperationTracker::from_config(gateway.clone() as Arc<dyn FileApi>, &config);

    match command {
        Commands::Login { username, password } => {
            let password = match password.or_else(|| std::env::var("AFS_PASSWORD").ok()) {
                Some(password) => password,
                None => prompt("Password: ")?,
            };
            let auth = AuthService::new(gateway);
            let user = match auth.login(&username, &password).await? {
                LoginOutcome::Authenticated(user) => user,
                LoginOutcome::OtpRequired => {
                    let code = prompt("One-time code: ")?;
                    auth.submit_otp(&code).await?
                }
            };
            println!("Signed in as {} ({:?})", user.username, user.user_type);
        }
        Commands::Logout => {
            AuthService::new(gateway).logout();
            println!("Signed out");
        }
        Commands::Whoami => match session.current_user() {
            Some(user) => println!("{} ({:?})", user.username, user.user_type),
            None => println!("Not signed in"),
        },
        Commands::Status { watch } => {
            let monitor = Arc::new(StatusMonitor::new(gateway, config.status_poll_interval()));
            println!("{:?}", monitor.check().await);
            if watch {
                watch_status(monitor).await?;
            }
        }
        Commands::Ls { path } => {
            let nodes = DirectoryService::new(gateway).list(&path).await?;
            for node in nodes {
                let modified = node
                    .modified_at
                    .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                let size = if node.is_directory {
                    "-".to_string()
                } else {
                    format_file_size(node.size)
                };
                let marker = if node.is_directory { 'd' } else { '-' };
                println!("{} {:>10}  {}  {}", marker, size, modified, node.path);
            }
        }
        Commands::Mkdir { parent, name } => {
            tracker.create_directory(&parent, &name).await?;
            println!("Created {}", name);
        }
        Commands::Rename { path, new_name } => {
            tracker.rename(&path, &new_name).await?;
            println!("Renamed {} to {}", path, new_name);
        }
        Commands::Mv { source, target } => {
            tracker.move_item(&source, &target).await?;
            println!("Moved {} to {}", source, target);
        }
        Commands::Rm { path } => {
            tracker.delete(&path).await?;
            println!("Deleted {}", path);
        }
        Commands::Upload { target, files } => upload(&tracker, &target, files).await?,
        Commands::Download { remote, output } => download(&tracker, &remote, output).await?,
    }

    Ok(())
}

async fn upload(tracker: &OperationTracker, target: &str, paths: Vec<PathBuf>) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = UploadFile::from_path(&path)
            .await
            .with_context(|| format!("cannot read {}", path.display()))?;
        files.push(file);
    }

    let bars = MultiProgress::new();
    let style = bar_style()?;
    let mut batch = tracker.upload_many(files, target);
    let cancel_on_signal = spawn_canceller(tracker.clone());

    let mut rendered: Vec<ProgressBar> = Vec::new();
    let mut last = Vec::new();
    while let Some(snapshots) = batch.next().await {
        if rendered.is_empty() {
            rendered = snapshots
                .iter()
                .map(|p| {
                    let bar = bars.add(ProgressBar::new(p.total_bytes.unwrap_or(0)));
                    bar.set_style(style.clone());
                    bar.set_prefix(p.file_name.clone());
                    bar
                })
                .collect();
        }
        for (bar, progress) in rendered.iter().zip(&snapshots) {
            render(bar, progress);
        }
        last = snapshots;
    }
    cancel_on_signal.abort();

    report(&last)
}

async fn download(tracker: &OperationTracker, remote: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    let destination = match output {
        Some(path) => path,
        None => PathBuf::from(
            remote
                .rsplit('/')
                .find(|segment| !segment.is_empty())
                .context("remote path has no file name")?,
        ),
    };

    let bar = ProgressBar::new(0);
    bar.set_style(bar_style()?);
    let mut stream = tracker.download(remote, &destination);
    let cancel_on_signal = spawn_canceller(tracker.clone());

    let mut last: Option<OperationProgress> = None;
    while let Some(progress) = stream.next().await {
        if last.is_none() {
            bar.set_prefix(progress.file_name.clone());
        }
        render(&bar, &progress);
        last = Some(progress);
    }
    cancel_on_signal.abort();

    report(&last.into_iter().collect::<Vec<_>>())?;
    println!("Saved to {}", destination.display());
    Ok(())
}

async fn watch_status(monitor: Arc<StatusMonitor>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let mut states = monitor.subscribe();
    let poller = tokio::spawn(monitor.clone().run(shutdown.clone()));

    let signal = shutdown_signal();
    tokio::pin!(signal);
    loop {
        tokio::select! {
            _ = &mut signal => break,
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *states.borrow_and_update();
                println!("{:?}", state);
            }
        }
    }

    shutdown.cancel();
    poller.await?;
    Ok(())
}

fn bar_style() -> anyhow::Result<ProgressStyle> {
    Ok(ProgressStyle::with_template("{prefix:20!} [{bar:30}] {bytes}/{total_bytes} {msg}")?
        .progress_chars("=> "))
}

fn render(bar: &ProgressBar, progress: &OperationProgress) {
    if let Some(total) = progress.total_bytes {
        bar.set_length(total);
    }
    bar.set_position(progress.bytes_transferred.unwrap_or(0));

    match progress.status {
        OperationStatus::Pending => bar.set_message("waiting..."),
        OperationStatus::InProgress => bar.set_message(match progress.estimated_seconds_remaining {
            Some(eta) => format!("{}% ~{} left", progress.progress_percent, format_duration(eta)),
            None => format!("{}%", progress.progress_percent),
        }),
        OperationStatus::Completed => bar.finish_with_message("done"),
        OperationStatus::Error => {
            bar.abandon_with_message(progress.error.clone().unwrap_or_else(|| "failed".to_string()))
        }
        OperationStatus::Cancelled => bar.abandon_with_message("cancelled"),
    }
}

fn report(finished: &[OperationProgress]) -> anyhow::Result<()> {
    let failed: Vec<&OperationProgress> = finished
        .iter()
        .filter(|p| p.status != OperationStatus::Completed)
        .collect();
    if failed.is_empty() {
        return Ok(());
    }
    for progress in &failed {
        eprintln!(
            "{}: {}",
            progress.file_name,
            progress.error.as_deref().unwrap_or("cancelled")
        );
    }
    bail!("{} of {} transfers did not complete", failed.len(), finished.len())
}

// ctrl-c cancels whatever is still running
fn spawn_canceller(tracker: OperationTracker) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        for operation in tracker.active_operations() {
            tracker.cancel(&operation.id);
        }
    })
}

fn prompt(label: &str) -> anyhow::Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{}", label)?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    let value = line.trim().to_string();
    if value.is_empty() {
        bail!("no input given");
    }
    Ok(value)
}
