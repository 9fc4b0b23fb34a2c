use std::path::{Path, PathBuf};
use std::process::ExitCode;

use acadify_backend::auth::CredentialHasher;
use acadify_backend::config::{Settings, CONFIG_FILE};
use acadify_backend::AppState;
use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "acadify", version, about = "Acadify auth core operations")]
struct Cli {
    /// Settings file layered under the environment
    #[arg(long, global = true, default_value = CONFIG_FILE)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load settings and open the connection pool, then exit
    Check,
    /// Print the stored form of a password
    HashPassword {
        password: String,
        /// Override the configured iteration count
        #[arg(long)]
        iterations: Option<u32>,
    },
    /// Exit with status 0 if the password matches the stored hash
    VerifyHash { password: String, hash: String },
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Settings for commands that never touch the database
fn offline_settings(path: &Path) -> anyhow::Result<Settings> {
    Settings::figment(path)
        .extract()
        .with_context(|| format!("reading settings from {}", path.display()))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    match cli.command {
        Command::Check => {
            let settings = Settings::load_from(&cli.config)
                .with_context(|| format!("loading settings from {}", cli.config.display()))?;
            init_tracing(&settings.log_level);

            let state = AppState::initialize(settings)
                .await
                .context("initializing auth core")?;
            info!(
                idle = state.pool.idle_count(),
                capacity = state.pool.capacity(),
                "database reachable"
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::HashPassword { password, iterations } => {
            let settings = offline_settings(&cli.config)?;
            init_tracing(&settings.log_level);

            let hasher = CredentialHasher::new(iterations.unwrap_or(settings.hashing.iterations));
            println!("{}", hasher.hash(&password));
            Ok(ExitCode::SUCCESS)
        }
        Command::VerifyHash { password, hash } => {
            let settings = offline_settings(&cli.config)?;
            init_tracing(&settings.log_level);

            if settings.credential_hasher().verify(&password, &hash) {
                println!("match");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("no match");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_offline_settings_reads_file_without_database() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "[hashing]\niterations = 50000\n")?;
            let settings = offline_settings(Path::new(CONFIG_FILE)).unwrap();
            assert_eq!(settings.hashing.iterations, 50_000);
            Ok(())
        });
    }

    #[test]
    fn test_offline_settings_rejects_malformed_file() {
        Jail::expect_with(|jail| {
            jail.create_file(CONFIG_FILE, "[hashing]\niterations = \"many\"\n")?;
            let err = offline_settings(Path::new(CONFIG_FILE)).unwrap_err();
            assert!(err.to_string().contains(CONFIG_FILE));
            Ok(())
        });
    }
}
