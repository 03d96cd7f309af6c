//! `selfkey`: SelfKey agent demo servers and identity tools.
//!
//! # Quick start
//!
//! ```sh
//! # A secret box key for sealing private keys:
//! selfkey generate-kms-key
//!
//! # Issuer on port 3000, holder and bank next to it:
//! ISSUER_SECRET_BOX_KEY=… selfkey issuer
//! HOLDER_PORT=3001 selfkey holder
//! BANK_PORT=3002 selfkey bank
//!
//! # Identifiers in the holder's database:
//! selfkey create-identifier --alias alice
//! selfkey list-identifiers
//! ```
//!
//! # Environment variables
//!
//! A `.env` file in the working directory is loaded first. See
//! [`selfkey_demo::DemoConfig`] for the full list.

use std::process;

use clap::{Parser, Subcommand};

use selfkey_agent::{Agent, DidProvider};
use selfkey_demo::{build_agent, serve, DemoConfig, DemoError, Role};

/// selfkey: SelfKey identity agent demos
#[derive(Parser)]
#[command(name = "selfkey", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the issuer server.
    Issuer,

    /// Run the holder server.
    Holder,

    /// Run the bank server.
    Bank,

    /// Print a fresh secret box key for sealing private keys.
    GenerateKmsKey,

    /// Create an identifier in a role's database and print it as JSON.
    CreateIdentifier {
        /// Whose database to use.
        #[arg(long, value_enum, default_value_t = Role::Holder)]
        role: Role,

        /// `did:key` or `did:web`.
        #[arg(long, default_value = "did:key")]
        provider: DidProvider,

        /// Alias; required for did:web, where it is the host name.
        #[arg(long)]
        alias: Option<String>,
    },

    /// List the identifiers in a role's database.
    ListIdentifiers {
        /// Whose database to use.
        #[arg(long, value_enum, default_value_t = Role::Holder)]
        role: Role,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine.
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "selfkey_demo=info,selfkey_agent=info,tower_http=debug".into()
            }),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        process::exit(2);
    }
}

async fn run(command: Command) -> Result<(), DemoError> {
    match command {
        Command::Issuer => serve(DemoConfig::from_env(Role::Issuer)?).await,
        Command::Holder => serve(DemoConfig::from_env(Role::Holder)?).await,
        Command::Bank => serve(DemoConfig::from_env(Role::Bank)?).await,
        Command::GenerateKmsKey => {
            println!("{}", Agent::generate_kms_key());
            Ok(())
        }
        Command::CreateIdentifier { role, provider, alias } => {
            let agent = build_agent(&DemoConfig::from_env(role)?)?;
            let identifier = agent.create_identifier(provider, alias.as_deref()).await?;
            println!("{}", serde_json::to_string_pretty(&identifier)?);
            Ok(())
        }
        Command::ListIdentifiers { role } => {
            let agent = build_agent(&DemoConfig::from_env(role)?)?;
            let identifiers = agent.identifiers(None, None).await?;
            println!("There are {} identifiers", identifiers.len());
            for identifier in &identifiers {
                println!("{}", serde_json::to_string_pretty(identifier)?);
                println!("..................");
            }
            Ok(())
        }
    }
}
