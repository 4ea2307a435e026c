use clap::{Parser, Subcommand};
use rag_chat::Result;
use rag_chat::commands::{
    delete_chat, list_chats, new_chat, open_chat, rename_chat, show_status,
};
use rag_chat::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "rag-chat")]
#[command(about = "A terminal chat assistant that retrieves your earlier messages for context")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a chat (the default when no command is given)
    Chat {
        /// Chat ID or name to open
        chat: Option<String>,
    },
    /// Create a new chat
    New {
        /// Optional name for the chat
        #[arg(long)]
        name: Option<String>,
    },
    /// List all chats
    List,
    /// Rename a chat
    Rename {
        /// Chat ID or name to rename
        chat: String,
        /// New name for the chat
        name: String,
    },
    /// Delete a chat and its stored messages
    Delete {
        /// Chat ID or name to delete
        chat: String,
    },
    /// Configure Ollama connection and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Show connection status and an overview of stored chats
    Status,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Chat { chat: None }) {
        Commands::Chat { chat } => {
            open_chat(chat)?;
        }
        Commands::New { name } => {
            new_chat(name)?;
        }
        Commands::List => {
            list_chats()?;
        }
        Commands::Rename { chat, name } => {
            rename_chat(chat, name)?;
        }
        Commands::Delete { chat } => {
            delete_chat(chat)?;
        }
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Status => {
            show_status()?;
        }
    }

    Ok(())
}
