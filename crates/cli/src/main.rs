//! Neoays CLI - Operator tools for username and profile records.
//!
//! # Usage
//!
//! ```bash
//! # Check whether a username is free
//! neoays-cli username check alice
//!
//! # Show who reserved a username
//! neoays-cli username show alice
//!
//! # Re-point a username at another identity
//! neoays-cli username reassign alice --owner u9
//!
//! # Show or write a profile
//! neoays-cli profile show u9
//! neoays-cli profile write u9 --username alice --email a@b.com --mobile 555-0100
//! ```
//!
//! # Commands
//!
//! - `username` - Inspect and repair username records
//! - `profile` - Inspect and repair profile records
//!
//! Signup creates the account before it re-points the username and writes
//! the profile. When either later step fails the server logs the orphaned
//! account; `username reassign` and `profile write` finish the job by hand.

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

use commands::Target;

#[derive(Parser)]
#[command(name = "neoays-cli")]
#[command(author, version, about = "Neoays ID operator tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect and repair username records
    Username {
        #[command(subcommand)]
        action: UsernameAction,
    },
    /// Inspect and repair profile records
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand)]
enum UsernameAction {
    /// Report whether a username is available
    Check {
        /// Username to check
        name: String,
    },
    /// Show the record of a reserved username
    Show {
        /// Reserved username
        name: String,
    },
    /// Re-point a reserved username at another identity
    Reassign {
        /// Reserved username
        name: String,

        /// Identity id of the new owner
        #[arg(short, long)]
        owner: String,
    },
}

#[derive(Subcommand)]
enum ProfileAction {
    /// Show the profile of an identity
    Show {
        /// Identity id
        owner: String,
    },
    /// Write the profile of an identity
    Write {
        /// Identity id
        owner: String,

        /// Username the identity owns
        #[arg(short, long)]
        username: String,

        /// Account email address
        #[arg(short, long)]
        email: String,

        /// Mobile number
        #[arg(short, long)]
        mobile: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let (store, paths) = commands::connect()?;
    let target = Target {
        store: &store,
        paths: &paths,
    };

    let output = match cli.command {
        Commands::Username { action } => match action {
            UsernameAction::Check { name } => commands::username::check(&target, &name).await?,
            UsernameAction::Show { name } => commands::username::show(&target, &name).await?,
            UsernameAction::Reassign { name, owner } => {
                commands::username::reassign(&target, &name, &owner).await?
            }
        },
        Commands::Profile { action } => match action {
            ProfileAction::Show { owner } => commands::profile::show(&target, &owner).await?,
            ProfileAction::Write {
                owner,
                username,
                email,
                mobile,
            } => commands::profile::write(&target, &owner, &username, &email, &mobile).await?,
        },
    };

    #[allow(clippy::print_stdout)]
    {
        println!("{output}");
    }
    Ok(())
}
