use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "sleepwell-cli", version, about = "SleepWell CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, sign up, sign out
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
    /// Weekly sleep windows
    Window {
        #[command(subcommand)]
        action: commands::window::WindowAction,
    },
    /// Motion samples and statistics
    Motion {
        #[command(subcommand)]
        action: commands::motion::MotionAction,
    },
    /// Reconcile windows with the remote mirror
    Sync,
    /// Display preferences
    Prefs {
        #[command(subcommand)]
        action: commands::prefs::PrefsAction,
    },
    /// Local and remote data
    Data {
        #[command(subcommand)]
        action: commands::data::DataAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run boundary notifications, the sampler and cleanup until Ctrl-C
    Daemon,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("SLEEPWELL_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Auth { action } => commands::auth::run(action).await,
        Commands::Window { action } => commands::window::run(action).await,
        Commands::Motion { action } => commands::motion::run(action).await,
        Commands::Sync => commands::sync::run().await,
        Commands::Prefs { action } => commands::prefs::run(action),
        Commands::Data { action } => commands::data::run(action).await,
        Commands::Config { action } => commands::config::run(action),
        Commands::Daemon => commands::daemon::run().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
