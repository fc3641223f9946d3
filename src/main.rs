use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use periph_diag::monitor::SelectorState;
use periph_diag::render::{self, Display};
use periph_diag::{
    create_router, AppState, AudioHost, Config, CpalHost, DeviceCatalog, FileHost, LogNotifier,
    MonitorCommand, MonitorController,
};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "periph-diag")]
#[command(about = "Peripheral diagnostics panel with live microphone monitoring")]
struct Cli {
    /// Configuration file (extension optional)
    #[arg(long, default_value = "config/periph-diag")]
    config: String,

    /// Replay WAV files as virtual microphones instead of using hardware
    #[arg(long = "input-file", global = true)]
    input_files: Vec<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List audio input devices and exit
    Devices,
    /// Run the microphone monitor
    Monitor {
        /// Do not start capturing automatically after enumeration
        #[arg(long)]
        no_auto_start: bool,

        /// Stop after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Write the canvas to this PNG before exiting
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Serve the HTTP panel API
        #[arg(long)]
        http: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("{} v{}", cfg.service.name, env!("CARGO_PKG_VERSION"));

    let host: Arc<dyn AudioHost> = if cli.input_files.is_empty() {
        Arc::new(CpalHost::new(cfg.device_poll_interval()))
    } else {
        Arc::new(FileHost::open(&cli.input_files)?)
    };
    info!("Using audio host: {}", host.name());

    match cli.command {
        Command::Devices => list_devices(host).await,
        Command::Monitor {
            no_auto_start,
            duration,
            snapshot,
            http,
        } => {
            run_monitor(
                host,
                cfg,
                MonitorArgs {
                    auto_start: !no_auto_start,
                    duration: duration.map(Duration::from_secs),
                    snapshot,
                    http,
                },
            )
            .await
        }
    }
}

async fn list_devices(host: Arc<dyn AudioHost>) -> Result<()> {
    let mut catalog = DeviceCatalog::new(host);

    match catalog.refresh().await {
        Ok(devices) if devices.is_empty() => println!("No microphones found"),
        Ok(devices) => {
            for (index, device) in devices.iter().enumerate() {
                println!("[{}] {} ({})", index, device.label, device.id);
            }
        }
        Err(e) => println!("{}", e),
    }
    println!("Permission: {:?}", catalog.permission());

    Ok(())
}

struct MonitorArgs {
    auto_start: bool,
    duration: Option<Duration>,
    snapshot: Option<PathBuf>,
    http: bool,
}

async fn run_monitor(host: Arc<dyn AudioHost>, cfg: Config, args: MonitorArgs) -> Result<()> {
    let display = render::shared(Display::raster(cfg.display.width, cfg.display.height)?);

    let mut settings = cfg.monitor_settings();
    settings.auto_start = settings.auto_start && args.auto_start;

    let controller = MonitorController::new(
        host,
        Arc::clone(&display),
        Arc::new(LogNotifier),
        settings,
    );
    let mut status = controller.subscribe_status();

    let (commands, command_rx) = mpsc::channel(32);
    let mut controller_task = tokio::spawn(controller.run(command_rx));

    if args.http || cfg.service.http.enabled {
        let state = AppState::new(commands.clone(), status.clone(), Arc::clone(&display));
        let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind HTTP API to {}", addr))?;
        info!("HTTP API listening on http://{}", addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, create_router(state)).await {
                error!("HTTP server stopped: {}", e);
            }
        });
    }

    spawn_console(commands.clone());
    info!("Commands: [enter]/t toggle, s start, x stop, r refresh, <n> select device, q quit");

    let deadline = async {
        match args.duration {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending().await,
        }
    };
    tokio::pin!(deadline);

    let mut meter_tick = tokio::time::interval(Duration::from_secs(1));
    let mut controller_done = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
            _ = &mut deadline => {
                info!("Monitor duration elapsed");
                break;
            }
            _ = &mut controller_task => {
                controller_done = true;
                break;
            }
            changed = status.changed() => {
                if changed.is_ok() {
                    report_status(&status.borrow_and_update());
                }
            }
            _ = meter_tick.tick() => {
                let level = render::lock(&display).meter().text();
                if status.borrow().session.is_some() {
                    info!("Level: {}", level);
                }
            }
        }
    }

    if let Some(path) = &args.snapshot {
        let png = render::lock(&display).surface().encode_png()?;
        std::fs::write(path, png)
            .with_context(|| format!("Failed to write snapshot: {}", path.display()))?;
        info!("Snapshot written to {}", path.display());
    }

    if !controller_done {
        let _ = commands.send(MonitorCommand::Shutdown).await;
        if let Err(e) = controller_task.await {
            warn!("Controller task failed: {}", e);
        }
    }

    Ok(())
}

fn report_status(status: &periph_diag::MonitorStatus) {
    info!("State: {:?}", status.state);
    match &status.panel.selector {
        SelectorState::Devices { options, selected } => {
            for (index, device) in options.iter().enumerate() {
                let marker = if Some(index) == *selected { '*' } else { ' ' };
                info!("{} [{}] {}", marker, index, device.label);
            }
        }
        other => {
            if let Some(text) = other.placeholder() {
                info!("{}", text);
            }
        }
    }
}

/// Translate console lines into monitor commands
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime shutdown.
fn spawn_console(commands: mpsc::Sender<MonitorCommand>) {
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            let command = match line.trim() {
                "" | "t" => MonitorCommand::Toggle,
                "s" => MonitorCommand::Start,
                "x" => MonitorCommand::Stop,
                "r" => MonitorCommand::Refresh,
                "q" => MonitorCommand::Shutdown,
                other => match other.parse::<usize>() {
                    Ok(index) => MonitorCommand::Select(index),
                    Err(_) => {
                        warn!("Unknown command: {}", other);
                        continue;
                    }
                },
            };

            if commands.blocking_send(command).is_err() {
                break;
            }
        }
    });
}
