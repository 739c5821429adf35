//! CLI module for Mentora
//!
//! Provides commands:
//! - `chat`: Talk to the tutor (one message or an interactive session)
//! - `profile`: Show or edit the agent profile
//! - `history`: List conversations or print one
//! - `archive`: Archive a conversation
//! - `providers`: Configured providers, breaker states and counters

use crate::app::{load_config, App};
use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

pub mod chat;
pub mod history;
pub mod profile;
pub mod providers;

/// Mentora AI tutor CLI
#[derive(Parser, Debug)]
#[command(name = "mentora")]
#[command(about = "AI tutor with provider fallback")]
#[command(version)]
pub struct Cli {
    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// User the command acts for
    #[arg(long, global = true, env = "MENTORA_USER", default_value = "local")]
    pub user: String,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chat with the tutor
    Chat(ChatArgs),
    /// Show or edit the agent profile
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },
    /// List conversations, or print one
    History {
        /// Conversation to print
        conversation: Option<Uuid>,
        /// Include archived conversations
        #[arg(long)]
        all: bool,
    },
    /// Archive a conversation
    Archive {
        /// Conversation to archive
        conversation: Uuid,
    },
    /// Show providers, breaker states and counters
    Providers,
}

#[derive(Args, Debug)]
pub struct ChatArgs {
    /// Continue this conversation
    #[arg(long, short)]
    pub conversation: Option<Uuid>,
    /// Course the student is working in
    #[arg(long)]
    pub course: Option<String>,
    /// Free-form notes for this session
    #[arg(long)]
    pub notes: Option<String>,
    /// Send one message and exit; interactive when omitted
    pub message: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Print the current profile
    Show,
    /// Update profile fields
    Set(ProfileSetArgs),
}

#[derive(Args, Debug)]
pub struct ProfileSetArgs {
    /// Name the tutor introduces itself with
    #[arg(long)]
    pub name: Option<String>,
    /// Persona description
    #[arg(long)]
    pub persona: Option<String>,
    /// Answer language (ISO 639-1 code)
    #[arg(long)]
    pub language: Option<String>,
    /// concise, detailed, conversational or academic
    #[arg(long)]
    pub style: Option<String>,
    /// Add an expertise tag (repeatable)
    #[arg(long = "expertise")]
    pub expertise: Vec<String>,
    /// Remove all expertise tags before adding
    #[arg(long)]
    pub clear_expertise: bool,
    /// Add a quick action as "label=prompt" (repeatable)
    #[arg(long = "quick-action")]
    pub quick_actions: Vec<String>,
    /// Remove all quick actions before adding
    #[arg(long)]
    pub clear_quick_actions: bool,
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let Some(command) = cli.command else {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        cmd.print_help()?;
        println!();
        return Ok(());
    };

    let app = App::init(load_config()?).await?;
    match command {
        Commands::Chat(args) => chat::run(&app, &cli.user, args).await,
        Commands::Profile { command } => profile::run(&app, &cli.user, command).await,
        Commands::History { conversation, all } => {
            history::run(&app, &cli.user, conversation, all).await
        }
        Commands::Archive { conversation } => history::archive(&app, &cli.user, conversation).await,
        Commands::Providers => providers::run(&app),
    }
}
