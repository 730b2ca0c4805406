//! Trawler CLI - runs repository providers and replays what they found.

mod commands;
mod config;
#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
mod progress;
#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
mod shutdown;

use std::fmt;
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use console::Term;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "trawler")]
#[command(version)]
#[command(about = "Resumable repository discovery across code hosts")]
#[command(
    long_about = "Trawler walks public repository listings (GitHub, Bitbucket) and scrapes \
self-hosted cgit instances, emitting one JSON line per discovered repository. Progress is \
checkpointed in a local database, so an interrupted run resumes where it stopped and never \
emits an acknowledged repository twice."
)]
#[command(after_long_help = r#"EXAMPLES
    Watch every configured provider, appending mentions to a file:
        $ trawler run >> mentions.jsonl

    Watch GitHub only:
        $ trawler run --provider github

    Scrape two cgit instances:
        $ trawler run -p cgit --site https://git.kernel.org/ --site https://git.zx2c4.com/

    Re-emit everything GitHub delivered after id 1000:
        $ trawler replay github --after 1000

    Generate shell completions:
        $ trawler completions bash > ~/.local/share/bash-completion/completions/trawler

CONFIGURATION
    Trawler reads configuration from:
      1. ~/.config/trawler/config.toml (or $XDG_CONFIG_HOME/trawler/config.toml)
      2. ./trawler.toml
      3. Environment variables (TRAWLER_* prefix, e.g., TRAWLER_GITHUB_TOKEN)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    TRAWLER_DATABASE_URL      Database connection string (default: ~/.local/state/trawler/trawler.db)
    TRAWLER_GITHUB_TOKEN      GitHub personal access token
    TRAWLER_CGIT_SITES        Comma separated cgit seed URLs
    TRAWLER_WATCHER_RETRIES   Acknowledgement attempts before a provider is stopped
    RUST_LOG                  Log filter (default: trawler=info,trawler_cli=info)
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch providers and print each discovered repository as a JSON line
    #[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
    Run {
        /// Provider(s) to run (default: all)
        #[arg(short, long = "provider", value_enum)]
        providers: Vec<ProviderKind>,

        /// Extra cgit seed URL(s), added after the configured ones
        #[arg(short, long = "site")]
        sites: Vec<String>,
    },
    /// Re-emit mentions that were already delivered, as JSON lines
    #[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
    Replay {
        /// Provider whose stored mentions to replay
        #[arg(value_enum)]
        provider: ProviderKind,

        /// Resume after this cursor (GitHub id, Bitbucket sequence, cgit page URL)
        #[arg(short, long)]
        after: Option<String>,

        /// Stop after this many mentions
        #[arg(short, long)]
        limit: Option<usize>,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show applied and pending migrations
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ProviderKind {
    Github,
    Bitbucket,
    Cgit,
}

#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
impl ProviderKind {
    fn all() -> &'static [ProviderKind] {
        Self::value_variants()
    }

    /// Whether this build includes the provider.
    fn is_enabled(self) -> bool {
        match self {
            Self::Github => cfg!(feature = "github"),
            Self::Bitbucket => cfg!(feature = "bitbucket"),
            Self::Cgit => cfg!(feature = "cgit"),
        }
    }
}

#[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Mentions own stdout; logs go to stderr unless spinners are drawn there.
    if !Term::stderr().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("trawler=info,trawler_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Handle commands that don't require database access first
    match &cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(*shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output.clone())?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("could not determine a database URL, set TRAWLER_DATABASE_URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        // Strip query parameters (e.g., ?mode=rwc) before path operations
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        #[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
        Commands::Run { providers, sites } => {
            let cancel = shutdown::setup_shutdown_handler();
            let options = commands::run::RunOptions { providers, sites };
            commands::run::handle_run(options, &config, &database_url, cancel).await?;
        }
        #[cfg(any(feature = "github", feature = "bitbucket", feature = "cgit"))]
        Commands::Replay {
            provider,
            after,
            limit,
        } => {
            let options = commands::replay::ReplayOptions {
                provider,
                after,
                limit,
            };
            commands::replay::handle_replay(options, &database_url).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

#[cfg(all(test, feature = "github", feature = "bitbucket", feature = "cgit"))]
mod tests {
    use super::*;

    #[test]
    fn run_accepts_repeated_providers_and_sites() {
        let cli = Cli::try_parse_from([
            "trawler",
            "run",
            "-p",
            "github",
            "--provider",
            "cgit",
            "--site",
            "https://git.example.org/",
        ])
        .expect("valid arguments");

        let Commands::Run { providers, sites } = cli.command else {
            panic!("expected run");
        };
        assert_eq!(providers, vec![ProviderKind::Github, ProviderKind::Cgit]);
        assert_eq!(sites, vec!["https://git.example.org/"]);
    }

    #[test]
    fn replay_requires_a_provider() {
        assert!(Cli::try_parse_from(["trawler", "replay"]).is_err());
        assert!(Cli::try_parse_from(["trawler", "replay", "bitbucket", "--limit", "5"]).is_ok());
    }

    #[test]
    fn provider_kind_displays_its_cli_name() {
        assert_eq!(ProviderKind::Bitbucket.to_string(), "bitbucket");
        assert_eq!(ProviderKind::all().len(), 3);
    }
}
