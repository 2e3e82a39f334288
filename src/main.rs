//! herakles-proc-monitor - version 0.1.0
//!
//! Process inventory and classification monitor with tracing logging.
//! This is the main entry point that resolves configuration, dispatches
//! subcommands and runs the HTTP server in serve mode.

mod cli;
mod commands;
mod config;
mod handlers;
mod metrics;
mod state;

use axum::{
    routing::{get, post},
    Router,
};
use clap::Parser;
use herakles_proc_monitor::ProcessManager;
use prometheus::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::{net::TcpListener, signal};
use tracing::{debug, error, info, Level};

use cli::{Args, Commands, LogLevel};
use commands::{
    command_check, command_config, command_inspect, command_kill, command_list, command_system,
    command_top, command_watch,
};
use config::{
    resolve_config, show_config, validate_effective_config, Config, DEFAULT_BIND_ADDR,
    DEFAULT_PORT,
};
use handlers::{
    health_handler, kill_handler, list_handler, metrics_handler, process_handler, root_handler,
    system_handler, top_handler,
};
use metrics::MonitorMetrics;
use state::{AppState, SharedState};

/// Initializes tracing logging subsystem with configured log level.
///
/// An explicit `--log-level` wins; otherwise the config file's `log_level` applies.
fn setup_logging(config: &Config, args: &Args) {
    let cli_default = matches!(args.log_level, LogLevel::Warn);
    let level = if cli_default {
        config.log_level.as_deref().unwrap_or("warn").to_ascii_lowercase()
    } else {
        format!("{:?}", args.log_level).to_ascii_lowercase()
    };

    if level == "off" {
        return;
    }
    let log_level = match level.as_str() {
        "error" => Level::ERROR,
        "info" => Level::INFO,
        "debug" => Level::DEBUG,
        "trace" => Level::TRACE,
        _ => Level::WARN,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return;
    }

    info!("Logging initialized with level: {}", level);
}

/// Helper function to load and validate configuration.
/// Exits the process with error code 1 if validation fails.
fn load_validated_config(args: &Args) -> Result<Config, Box<dyn std::error::Error>> {
    let config = resolve_config(args)?;
    if let Err(e) = validate_effective_config(&config) {
        eprintln!("❌ Configuration invalid: {}", e);
        std::process::exit(1);
    }
    Ok(config)
}

/// Sizes the global rayon pool used for classification.
fn configure_parallelism(config: &Config) {
    if let Some(threads) = config.parallelism {
        if threads > 0 {
            match rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build_global()
            {
                Ok(()) => debug!("Rayon thread pool configured with {} threads", threads),
                Err(e) => error!("Failed to set rayon thread pool: {}", e),
            }
        }
    }
}

/// Main application entry point.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Early config resolution for show/check modes
    if args.show_config || args.check_config {
        let config = resolve_config(&args)?;

        if args.check_config {
            if let Err(e) = validate_effective_config(&config) {
                eprintln!("❌ Configuration invalid: {}", e);
                std::process::exit(1);
            }
            println!("✅ Configuration is valid");
            return Ok(());
        }

        return show_config(&config, args.config_format);
    }

    // Config generation does not need a valid effective config
    if let Some(Commands::Config {
        output,
        format,
        commented,
    }) = &args.command
    {
        return command_config(output.clone(), format.clone(), *commented);
    }

    let config = load_validated_config(&args)?;
    setup_logging(&config, &args);
    configure_parallelism(&config);

    let manager = Arc::new(ProcessManager::new(config.manager_config()));

    match args.command {
        Some(Commands::List {
            category,
            process_type,
            format,
        }) => command_list(&manager, category, process_type, format).await?,
        Some(Commands::Top { count, by, format }) => {
            command_top(&manager, count, by, format).await?
        }
        Some(Commands::Kill { pid, force }) => command_kill(&manager, pid, force).await?,
        Some(Commands::Inspect { pid, format }) => command_inspect(&manager, pid, format).await?,
        Some(Commands::System { format }) => command_system(&manager, format).await?,
        Some(Commands::Watch {
            interval,
            count,
            iterations,
        }) => {
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| config.refresh_interval());
            command_watch(&manager, interval, count, iterations).await?
        }
        Some(Commands::Check { scan }) => command_check(scan, &config).await?,
        Some(Commands::Config { .. }) => unreachable!("Config handled above"),
        Some(Commands::Serve) | None => serve(manager, config).await?,
    }

    Ok(())
}

/// Runs the HTTP server until SIGINT/SIGTERM.
async fn serve(manager: Arc<ProcessManager>, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting herakles-proc-monitor");

    let bind_ip_str = config
        .bind
        .clone()
        .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
    let port = config.port.unwrap_or(DEFAULT_PORT);

    // Initialize Prometheus metrics registry
    let registry = Registry::new();
    let metrics = MonitorMetrics::new(&registry)?;
    debug!("All metrics registered successfully");

    // Perform initial inventory scan
    info!("Performing initial inventory scan");
    let records = manager.get_all(true).await;
    info!("Initial inventory: {} processes", records.len());

    let state: SharedState = Arc::new(AppState {
        manager,
        registry,
        metrics,
        config: Arc::new(config.clone()),
        start_time: Instant::now(),
    });

    // Setup graceful shutdown signal handlers
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = signal::ctrl_c().await {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
            }
            _ = terminate => {
                info!("Received SIGTERM, shutting down gracefully...");
            }
        }
    };

    // Configure HTTP server routes
    let addr: SocketAddr = format!("{}:{}", bind_ip_str, port).parse()?;

    let mut app = Router::new()
        .route("/", get(root_handler))
        .route("/processes", get(list_handler))
        .route("/processes/top", get(top_handler))
        .route("/processes/{pid}", get(process_handler))
        .route("/processes/{pid}/kill", post(kill_handler))
        .route("/system", get(system_handler));

    if config.enable_health.unwrap_or(true) {
        app = app.route("/health", get(health_handler));
    }
    if config.enable_telemetry.unwrap_or(true) {
        app = app.route("/metrics", get(metrics_handler));
    }

    let app = app.with_state(state);

    let listener = TcpListener::bind(addr).await?;
    info!(
        "herakles-proc-monitor listening on http://{}:{}",
        bind_ip_str, port
    );

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = shutdown_signal => {
            info!("Shutdown signal received, exiting...");
        }
    }

    info!("herakles-proc-monitor stopped gracefully");
    Ok(())
}
