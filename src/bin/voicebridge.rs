use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{
    fmt::time::LocalTime, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};
use voicebridge::{
    app::{create_router, AppStateBuilder},
    config::Config,
    handler::middleware::request_log::AccessLogEventFormat,
    version,
};

#[derive(Parser, Debug)]
#[command(
    author,
    version = version::get_short_version(),
    about = "Backend for a browser softphone on a hosted voice provider",
    long_about = version::get_version_info()
)]
struct Cli {
    /// Path to the configuration file
    #[clap(
        long,
        global = true,
        help = "Path to the configuration file (TOML format)"
    )]
    conf: Option<String>,
    #[clap(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate configuration and exit without starting the server
    CheckConfig,
}

fn init_tracing(config: &Config) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let mut env_filter = EnvFilter::from_default_env();
    if let Some(Ok(level)) = config
        .log_level
        .as_ref()
        .map(|level| level.parse::<LevelFilter>())
    {
        env_filter = env_filter.add_directive(level.into());
    }

    if let Some(ref log_file) = config.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_file)
            .map_err(|e| anyhow::anyhow!("failed to open log file {}: {}", log_file, e))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(AccessLogEventFormat::new(LocalTime::rfc_3339()))
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .try_init()?;
        Ok(Some(guard))
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .event_format(AccessLogEventFormat::new(LocalTime::rfc_3339())),
            )
            .try_init()?;
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let mut config = if let Some(ref path) = cli.conf {
        println!("Loading config from: {}", path);
        Config::load(path)?
    } else {
        println!("Loading default config");
        Config::default()
    };
    config.apply_env();

    if let Err(err) = config.validate() {
        eprintln!("Configuration validation failed:");
        for issue in err.issues {
            eprintln!("- {}: {}", issue.field, issue.message);
        }
        std::process::exit(1);
    }
    if matches!(cli.command, Some(Commands::CheckConfig)) {
        println!("Configuration is valid.");
        return Ok(());
    }

    println!("Start at {}", Local::now());
    println!("{}", version::get_version_info());
    let _guard = init_tracing(&config)?;

    let state = AppStateBuilder::new().with_config(config).build()?;
    info!(
        "call history: {}, contacts: {}",
        state.history.path().display(),
        state.contacts.path().display()
    );
    for (label, number) in state.config().caller_id.as_map() {
        info!("caller ID {}: {}", label, number.as_deref().unwrap_or("-"));
    }

    info!("starting voicebridge on {}", state.config().http_addr);
    let router = create_router(state.clone());
    let mut app_future = Box::pin(voicebridge::app::run(state.clone(), router));

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm_stream = signal(SignalKind::terminate())?;
        tokio::select! {
            result = &mut app_future => return result,
            _ = tokio::signal::ctrl_c() => info!("received CTRL+C, shutting down"),
            _ = sigterm_stream.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = &mut app_future => return result,
            _ = tokio::signal::ctrl_c() => info!("received CTRL+C, shutting down"),
        }
    }

    state.token().cancel();
    app_future.await
}
