use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod prompt;

/// Spind - encrypted password vaults synced through a spind server
#[derive(Parser)]
#[command(name = "spind")]
#[command(about = "Encrypted password vaults synced through a spind server", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
pub struct GlobalArgs {
    /// Directory for the vault list and the encrypted cache
    #[arg(long, global = true, env = "SPIND_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, global = true, default_value_t = 30)]
    pub timeout: u64,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage saved vault pointers
    Vaults {
        #[command(subcommand)]
        command: VaultCommands,
    },

    /// Set up a provisioned vault with a master password
    Setup {
        /// Saved vault name
        vault: String,

        /// Security question for recovery (repeatable)
        #[arg(long = "question")]
        questions: Vec<String>,
    },

    /// Unlock a vault and list its entries
    Show {
        /// Saved vault name
        vault: String,

        /// Print field values in plain text
        #[arg(long)]
        reveal: bool,
    },

    /// Add an entry to a vault
    AddEntry {
        /// Saved vault name
        vault: String,

        /// Entry name
        name: String,

        /// Extra field as key=value (repeatable)
        #[arg(long = "field", value_parser = commands::parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Remove an entry by its index in `show`
    RemoveEntry {
        /// Saved vault name
        vault: String,

        /// Entry index
        index: usize,
    },

    /// Change the master password
    Passwd {
        /// Saved vault name
        vault: String,
    },

    /// Replace the security questions
    Security {
        /// Saved vault name
        vault: String,

        /// Security question (repeatable, none disables recovery)
        #[arg(long = "question")]
        questions: Vec<String>,
    },

    /// Unlock with security answers and set a new master password
    Recover {
        /// Saved vault name
        vault: String,
    },
}

#[derive(Subcommand)]
enum VaultCommands {
    /// Save a vault pointer
    Add {
        /// Local display name
        name: String,

        /// Server address, e.g. https://vault.example.com
        address: String,

        /// Account name on the server
        username: String,
    },

    /// List saved vault pointers
    List,

    /// Forget a vault pointer
    Remove {
        /// Local display name
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Cancelled");
            std::process::exit(130);
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let global = &cli.global;

    match cli.command {
        Commands::Vaults { command } => match command {
            VaultCommands::Add {
                name,
                address,
                username,
            } => commands::vaults_add(global, name, address, username),
            VaultCommands::List => commands::vaults_list(global),
            VaultCommands::Remove { name } => commands::vaults_remove(global, &name),
        },
        Commands::Setup { vault, questions } => commands::setup(global, &vault, questions).await,
        Commands::Show { vault, reveal } => commands::show(global, &vault, reveal).await,
        Commands::AddEntry {
            vault,
            name,
            fields,
        } => commands::add_entry(global, &vault, name, fields).await,
        Commands::RemoveEntry { vault, index } => {
            commands::remove_entry(global, &vault, index).await
        }
        Commands::Passwd { vault } => commands::passwd(global, &vault).await,
        Commands::Security { vault, questions } => {
            commands::security(global, &vault, questions).await
        }
        Commands::Recover { vault } => commands::recover(global, &vault).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_repeated_questions() {
        let cli = Cli::try_parse_from([
            "spind",
            "setup",
            "home",
            "--question",
            "First pet?",
            "--question",
            "Birth city?",
        ])
        .unwrap();
        match cli.command {
            Commands::Setup { vault, questions } => {
                assert_eq!(vault, "home");
                assert_eq!(questions, ["First pet?", "Birth city?"]);
            }
            _ => panic!("expected setup"),
        }
    }

    #[test]
    fn parses_entry_fields() {
        let cli = Cli::try_parse_from([
            "spind",
            "add-entry",
            "home",
            "gitlab",
            "--field",
            "username=alice",
            "--field",
            "url=https://gitlab.com",
        ])
        .unwrap();
        match cli.command {
            Commands::AddEntry { fields, .. } => {
                assert_eq!(fields[0], ("username".to_string(), "alice".to_string()));
                assert_eq!(fields[1].1, "https://gitlab.com");
            }
            _ => panic!("expected add-entry"),
        }
    }
}
