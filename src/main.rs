use anyhow::{anyhow, bail, Context};
use clap::{Parser, Subcommand};
#[cfg(unix)]
use daemonize::Daemonize;
use std::env;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use sysinfo::{Pid, System};

use tunepick::config::{apply_env_overrides, config_path, load_config, load_config_from};
use tunepick::models::{MediaKind, RawMediaInfo};
use tunepick::selector::selector_for;
use tunepick::{media_info, router, AppState};

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Format selection and download API on top of yt-dlp.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manages the server process.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Print the reduced catalog and download menu for a saved `yt-dlp --dump-single-json` file.
    Preview {
        /// Path to the JSON dump, or `-` for stdin.
        file: PathBuf,
    },
    /// Print the yt-dlp selector for a format and quality tier.
    Selector {
        /// `mp3` or `mp4`.
        format: String,
        /// Quality tier, e.g. `192kbps` or `720p`.
        quality: String,
    },
}

#[derive(Subcommand, Debug)]
enum ServerAction {
    /// Start the server as a background process.
    Start,
    /// Stop the background server process.
    Stop,
    /// Restart the background server process.
    Restart,
    /// Run the server in the foreground.
    Run,
    /// Check the status of the background server process.
    Status,
}

// --- Main Application Logic ---
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Server { action } => match action {
            ServerAction::Start => start_server()?,
            ServerAction::Stop => stop_server()?,
            ServerAction::Restart => {
                stop_server()?;
                std::thread::sleep(std::time::Duration::from_secs(1));
                start_server()?;
            }
            ServerAction::Run => run_server().await?,
            ServerAction::Status => check_status()?,
        },
        Commands::Preview { file } => preview(file).await?,
        Commands::Selector { format, quality } => print_selector(format, quality).await?,
    }

    Ok(())
}

// --- Server Action Functions ---

/// Runs the Axum web server in the foreground.
async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let path = config_path().await?;
    let mut config = load_config_from(&path).await?;
    apply_env_overrides(&mut config);

    let addr = format!("{}:{}", config.host, config.port);
    let app = router(AppState::new(config, path));

    tracing::info!("Starting server in foreground, listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Starts the server as a background process using platform-specific logic.
fn start_server() -> anyhow::Result<()> {
    if is_running()? {
        println!("Server is already running.");
        return Ok(());
    }

    let pid_file = get_pid_path()?;
    let myself = env::current_exe()?;
    println!("Starting server in the background...");

    #[cfg(unix)]
    {
        let daemonize = Daemonize::new().pid_file(&pid_file);
        match daemonize.start() {
            Ok(_) => {
                // Runs in the detached process.
                Command::new(&myself).arg("server").arg("run").spawn()?;
            }
            Err(e) => eprintln!("Error, failed to daemonize: {}", e),
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        const CREATE_NO_WINDOW: u32 = 0x08000000;

        let child = Command::new(&myself)
            .arg("server")
            .arg("run")
            .creation_flags(CREATE_NO_WINDOW)
            .spawn()?;

        fs::write(&pid_file, child.id().to_string())?;
    }

    println!("Server started successfully. PID file at: {}", pid_file.display());
    Ok(())
}

/// Stops the background server process.
fn stop_server() -> anyhow::Result<()> {
    let pid_file = get_pid_path()?;
    if !pid_file.exists() {
        println!("Server is not running (no PID file).");
        return Ok(());
    }
    let pid = read_pid(&pid_file)?;
    let s = System::new_all();
    if let Some(process) = s.process(Pid::from_u32(pid)) {
        println!("Stopping server process with PID: {}", pid);
        process.kill();
    } else {
        println!("Process with PID {} not found. It may have already stopped.", pid);
    }
    fs::remove_file(&pid_file)?;
    println!("Server stopped.");
    Ok(())
}

/// Checks if the server process is running.
fn check_status() -> anyhow::Result<()> {
    if is_running()? {
        println!("Server is running with PID: {}", read_pid(&get_pid_path()?)?);
    } else {
        println!("Server is not running.");
    }
    Ok(())
}

// --- Offline Commands ---

/// Reduces a saved info dump without calling yt-dlp.
async fn preview(file: &Path) -> anyhow::Result<()> {
    let content = if file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?
    };

    let raw: RawMediaInfo =
        serde_json::from_str(&content).context("Input is not a yt-dlp JSON dump")?;
    let config = load_config().await?;
    let info = media_info(raw, &config.preferences);
    println!("{}", serde_json::to_string_pretty(&info)?);
    Ok(())
}

async fn print_selector(format: &str, quality: &str) -> anyhow::Result<()> {
    let Some(kind) = MediaKind::parse(format) else {
        bail!("Unsupported format '{}', expected mp3 or mp4", format);
    };
    let config = load_config().await?;
    println!("{}", selector_for(kind, quality, &config.preferences));
    Ok(())
}

// --- Helper Functions ---

/// Gets the path for the server's PID file.
fn get_pid_path() -> anyhow::Result<PathBuf> {
    let project_dirs = directories::ProjectDirs::from("com", "Tunepick", "tunepick")
        .ok_or_else(|| anyhow!("Could not find a valid project directory"))?;
    let data_dir = project_dirs.data_local_dir();
    fs::create_dir_all(data_dir)?;
    Ok(data_dir.join("server.pid"))
}

fn read_pid(pid_file: &Path) -> anyhow::Result<u32> {
    let pid_str = fs::read_to_string(pid_file)?;
    pid_str
        .trim()
        .parse()
        .with_context(|| format!("Corrupt PID file at {}", pid_file.display()))
}

/// Checks if the server is running by checking the PID file and the process list.
fn is_running() -> anyhow::Result<bool> {
    let pid_file = get_pid_path()?;
    if !pid_file.exists() {
        return Ok(false);
    }
    let pid = read_pid(&pid_file)?;
    let s = System::new_all();
    Ok(s.process(Pid::from_u32(pid)).is_some())
}
