use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use vfsh::{
    config::Config,
    sandbox::{SandboxedShell, Sandbox, Session},
    terminal::Terminal,
    VFSH_VERSION,
};

#[derive(Parser)]
#[command(name = "vfsh")]
#[command(about = "Virtual Folder Shell: a confined shell over a ZIP archive")]
#[command(version)]
struct Cli {
    /// Name shown in the prompt
    hostname: String,

    /// ZIP archive holding the virtual filesystem
    archive: PathBuf,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let code = match run(cli).await {
        Ok(()) => 0,
        Err(e) => {
            error!("{:#}", e);
            eprintln!("vfsh: {:#}", e);
            1
        }
    };

    // Exit explicitly: a pending stdin read must not keep the runtime alive.
    std::process::exit(code);
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("vfsh={}", level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(explicit: Option<PathBuf>) -> anyhow::Result<Config> {
    let config = match explicit {
        Some(path) => Config::load_from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => match Config::get_default_config_path() {
            Ok(path) => Config::load_or_default(&path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
            Err(e) => {
                warn!("{}, using defaults", e);
                Config::default()
            }
        },
    };

    config.validate().context("Configuration validation failed")?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    info!("Starting vfsh {}", VFSH_VERSION);

    // Registered before the sandbox exists.
    let mut shutdown = Shutdown::install()?;
    let config = load_config(cli.config)?;

    let sandbox = {
        let archive = cli.archive.clone();
        let sandbox_config = config.sandbox.clone();
        let cancel = Arc::new(AtomicBool::new(false));
        let extraction = tokio::task::spawn_blocking({
            let cancel = Arc::clone(&cancel);
            move || Sandbox::create_cancellable(&archive, &sandbox_config, &cancel)
        });
        tokio::pin!(extraction);

        tokio::select! {
            created = &mut extraction => created
                .context("Extraction task failed")?
                .with_context(|| format!("Failed to load {}", cli.archive.display()))?,
            _ = shutdown.recv() => {
                cancel.store(true, Ordering::Relaxed);
                if let Ok(Ok(sandbox)) = extraction.await {
                    sandbox.destroy().context("Failed to remove sandbox")?;
                }
                anyhow::bail!("Interrupted while loading {}", cli.archive.display());
            }
        }
    };

    let session = Session::new(sandbox)?;
    let shell = SandboxedShell::new(cli.hostname, session, &config);

    if let Err(e) = shell.audit().log_session_started(&cli.archive.display().to_string()) {
        warn!(error = %e, "Failed to write audit event");
    }

    let input = BufReader::new(tokio::io::stdin());
    let mut output = tokio::io::stdout();

    let termination = Terminal::new(shell)
        .run(input, &mut output, shutdown.recv())
        .await?;

    info!(%termination, "Session ended");
    Ok(())
}

/// SIGINT and SIGTERM listeners, registered eagerly.
struct Shutdown {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Shutdown {
    #[cfg(unix)]
    fn install() -> anyhow::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt()).context("Failed to listen for SIGINT")?,
            terminate: signal(SignalKind::terminate()).context("Failed to listen for SIGTERM")?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> anyhow::Result<Self> {
        Ok(Self {})
    }

    #[cfg(unix)]
    async fn recv(&mut self) {
        tokio::select! {
            _ = self.interrupt.recv() => info!("Received SIGINT, shutting down"),
            _ = self.terminate.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    }
}
