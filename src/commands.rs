use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use uuid::Uuid;

use crate::chat::store::ConversationStore;
use crate::chat::{ChatHistory, ChatMessage, InputDirective, Role, TRIGGER_TOKEN, parse_directive};
use crate::config::{Config, get_config_dir};
use crate::generator::{GeneratedResponse, ResponseGenerator};
use crate::providers::OllamaClient;
use crate::retrieval::RetrievalEngine;
use crate::session::SessionRegistry;

/// What a single line of user input produced once it went through the pipeline.
#[derive(Debug, PartialEq)]
pub enum TurnOutcome {
    /// The input was stored as a plain message; no model was involved.
    Stored,
    /// The trigger produced an answer, now appended to the chat.
    Answered { answer: String },
    /// The trigger token arrived without a question; nothing was stored.
    NeedsQuery,
}

/// Run one line of user input through the store and, when triggered, the model.
///
/// Plain input is appended verbatim and nothing else happens. Triggered input
/// is appended verbatim first, then the question after the trigger is used to
/// retrieve context and generate a reply, which is appended with the exact
/// prompt that produced it. A failed completion therefore still leaves the
/// user's message in the chat.
#[inline]
pub fn run_turn(
    store: &mut ConversationStore,
    engine: &RetrievalEngine,
    generator: &ResponseGenerator,
    top_k: usize,
    input: &str,
) -> crate::Result<TurnOutcome> {
    match parse_directive(input) {
        InputDirective::BareTrigger => Ok(TurnOutcome::NeedsQuery),
        InputDirective::Plain => {
            store.append(Role::User, input, None)?;
            Ok(TurnOutcome::Stored)
        }
        InputDirective::Ask(query) => {
            store.append(Role::User, input, None)?;

            let context = engine.retrieve_context(store, query, top_k)?;
            let GeneratedResponse { answer, prompt } = generator.generate(query, context)?;

            store.append(Role::Assistant, &answer, Some(prompt))?;
            Ok(TurnOutcome::Answered { answer })
        }
    }
}

/// Open a chat and run the interactive loop
#[inline]
pub fn open_chat(identifier: Option<String>) -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let client = Arc::new(OllamaClient::new(&config).context("Failed to create Ollama client")?);

    let mut registry = SessionRegistry::open(
        &config,
        Arc::clone(&client) as Arc<dyn crate::providers::EmbeddingProvider>,
    )?;
    let id = resolve_chat(&mut registry, identifier)?;

    let entry = registry
        .find_entry(&id.to_string())
        .ok_or_else(|| anyhow::anyhow!("Chat not found: {}", id))?;
    let name = entry.name.clone();

    info!("Opening chat {} ({})", name, id);

    if let Err(e) = client.health_check() {
        println!(
            "{}",
            style(format!(
                "⚠ Ollama is not ready: {}. You can still take notes, but {} questions will fail.",
                e, TRIGGER_TOKEN
            ))
            .yellow()
        );
        println!("Use 'rag-chat config' to update connection settings.");
    }

    let engine = RetrievalEngine::new(
        Arc::clone(&client) as Arc<dyn crate::providers::EmbeddingProvider>
    );
    let generator = ResponseGenerator::new(
        Arc::clone(&client) as Arc<dyn crate::providers::CompletionProvider>
    );
    let top_k = config.retrieval.top_k;
    let store = registry.session(id)?;

    println!();
    println!("💬 {} (ID: {})", name, id);
    let (indexed, total) = store.index_coverage();
    if indexed < total {
        println!(
            "{}",
            style(format!(
                "⚠ {} of {} stored messages could not be re-embedded and are excluded from retrieval.",
                total - indexed,
                total
            ))
            .yellow()
        );
    }
    println!(
        "Type a note, or start with {} to ask a question. /help lists commands.",
        TRIGGER_TOKEN
    );
    println!();

    render_history(store);

    loop {
        let line = match Input::<String>::new()
            .with_prompt("you")
            .allow_empty(true)
            .interact_text()
        {
            Ok(line) => line,
            Err(_) => {
                println!("Goodbye!");
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match trimmed {
            "/quit" | "/exit" => {
                println!("Goodbye!");
                break;
            }
            "/help" => {
                print_repl_help();
                continue;
            }
            "/clear" => {
                let confirmed = Confirm::new()
                    .with_prompt("Delete every message in this chat?")
                    .default(false)
                    .interact()?;
                if confirmed {
                    store.clear();
                    println!("{}", style("✓ Chat cleared").green());
                }
                continue;
            }
            _ => {}
        }

        let spinner = thinking_spinner();
        let outcome = run_turn(store, &engine, &generator, top_k, &line);
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match outcome {
            Ok(TurnOutcome::Stored) => {}
            Ok(TurnOutcome::Answered { answer }) => {
                println!("{} {}", style("assistant:").bold().cyan(), answer);
            }
            Ok(TurnOutcome::NeedsQuery) => {
                println!(
                    "{}",
                    style(format!(
                        "⚠ Add a question after {} to ask the assistant.",
                        TRIGGER_TOKEN
                    ))
                    .yellow()
                );
            }
            Err(e) => {
                error!("Turn failed: {}", e);
                println!("{}", style(format!("Error: {}", e)).red());
            }
        }
    }

    Ok(())
}

/// Create a new chat
#[inline]
pub fn new_chat(name: Option<String>) -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let client = Arc::new(OllamaClient::new(&config).context("Failed to create Ollama client")?);
    let mut registry = SessionRegistry::open(&config, client)?;

    let name = name.filter(|name| !name.trim().is_empty());
    let id = registry.create_chat(name)?;
    let entry = registry
        .entries()
        .last()
        .ok_or_else(|| anyhow::anyhow!("Registry is empty after creating a chat"))?;

    println!("✓ Created chat: {} (ID: {})", entry.name, id);
    println!("Open it with 'rag-chat chat {}'", id);

    Ok(())
}

/// List all chats with their stored message counts
#[inline]
pub fn list_chats() -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let client = Arc::new(OllamaClient::new(&config).context("Failed to create Ollama client")?);
    let registry = SessionRegistry::open(&config, client)?;

    if registry.entries().is_empty() {
        println!("No chats yet.");
        println!("Use 'rag-chat new' to start one, or just run 'rag-chat'.");
        return Ok(());
    }

    println!("Chats ({} total):", registry.entries().len());
    println!();

    for entry in registry.entries() {
        println!("💬 {} (ID: {})", entry.name, entry.id);
        println!(
            "   Created: {}",
            entry.created_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let path = registry.chat_path(entry.id);
        if path.exists() {
            match ChatHistory::read(&path) {
                Ok(history) => println!("   Messages: {}", history.messages.len()),
                Err(e) => println!("   Messages: Error - {}", e),
            }
        } else {
            println!("   Messages: 0");
        }
        println!();
    }

    Ok(())
}

/// Rename a chat
#[inline]
pub fn rename_chat(identifier: String, new_name: String) -> Result<()> {
    if new_name.trim().is_empty() {
        anyhow::bail!("Chat name cannot be empty");
    }

    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let client = Arc::new(OllamaClient::new(&config).context("Failed to create Ollama client")?);
    let mut registry = SessionRegistry::open(&config, client)?;

    let entry = registry
        .find_entry(&identifier)
        .ok_or_else(|| anyhow::anyhow!("Chat not found: {}", identifier))?;
    let id = entry.id;
    let old_name = entry.name.clone();

    registry.rename_chat(id, new_name.clone())?;
    println!("✓ Renamed '{}' to '{}'", old_name, new_name);

    Ok(())
}

/// Delete a chat and its stored messages
#[inline]
pub fn delete_chat(identifier: String) -> Result<()> {
    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir)?;
    let client = Arc::new(OllamaClient::new(&config).context("Failed to create Ollama client")?);
    let mut registry = SessionRegistry::open(&config, client)?;

    let entry = registry
        .find_entry(&identifier)
        .ok_or_else(|| anyhow::anyhow!("Chat not found: {}", identifier))?;
    let id = entry.id;
    let name = entry.name.clone();

    println!("Found chat: {} (ID: {})", name, id);
    println!("This will delete the chat and all of its stored messages.");

    let confirmed = Confirm::new()
        .with_prompt("Delete this chat? This action cannot be undone.")
        .default(false)
        .interact()?;
    if !confirmed {
        println!("Deletion cancelled.");
        return Ok(());
    }

    registry.delete_chat(id)?;
    println!("✓ Chat deleted: {}", name);

    Ok(())
}

/// Show the status of the Ollama connection and all stored chats
#[inline]
pub fn show_status() -> Result<()> {
    println!("📊 RAG Chat Status Report");
    println!("{}", "=".repeat(50));

    let config_dir = get_config_dir()?;
    let config = Config::load(&config_dir).unwrap_or_else(|_| Config {
        base_dir: config_dir.clone(),
        ..Config::default()
    });

    println!();
    println!("🤖 Ollama Status:");
    let client = match OllamaClient::new(&config) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            println!("   ❌ Ollama: Failed to initialize - {}", e);
            println!();
            println!("💡 Use 'rag-chat config' to fix the connection settings.");
            return Ok(());
        }
    };

    match client.health_check() {
        Ok(()) => {
            println!(
                "   ✅ Ollama: Connected ({}:{})",
                config.ollama.host, config.ollama.port
            );
            println!("   📋 Embedding model: {}", config.ollama.embedding_model);
            println!("   📋 Chat model: {}", config.ollama.chat_model);
        }
        Err(e) => {
            println!("   ⚠️  Ollama: Unavailable or unhealthy - {}", e);
            println!(
                "      Chats still open, but {} questions will fail.",
                TRIGGER_TOKEN
            );
        }
    }

    println!();
    println!("📚 Chat Overview:");
    let registry = SessionRegistry::open(&config, client)?;

    if registry.entries().is_empty() {
        println!("   No chats yet.");
    } else {
        let mut total_messages = 0;
        for entry in registry.entries() {
            let path = registry.chat_path(entry.id);
            if path.exists() {
                match ChatHistory::read(&path) {
                    Ok(history) => {
                        let from_user = history
                            .messages
                            .iter()
                            .filter(|message| message.role == Role::User)
                            .count();
                        total_messages += history.messages.len();
                        println!("   💬 {} (ID: {})", entry.name, entry.id);
                        println!(
                            "      Messages: {} ({} from you, {} indexed at last save)",
                            history.messages.len(),
                            from_user,
                            history.embedding_to_message_idx.len()
                        );
                    }
                    Err(e) => {
                        println!(
                            "   ⚠️  {} (ID: {}): unreadable - {}",
                            entry.name, entry.id, e
                        );
                    }
                }
            } else {
                println!("   💬 {} (ID: {}) - empty", entry.name, entry.id);
            }
        }

        println!();
        println!("   Summary:");
        println!("      Total Chats: {}", registry.entries().len());
        println!("      Total Messages: {}", total_messages);
    }

    println!();
    println!("💡 Next Steps:");
    println!("   • Run 'rag-chat' to open a chat");
    println!("   • Use 'rag-chat new --name <name>' to start another chat");
    println!(
        "   • Start a message with '{}' to ask the assistant a question",
        TRIGGER_TOKEN
    );

    Ok(())
}

fn resolve_chat(registry: &mut SessionRegistry, identifier: Option<String>) -> Result<Uuid> {
    if let Some(identifier) = identifier {
        let entry = registry
            .find_entry(&identifier)
            .ok_or_else(|| anyhow::anyhow!("Chat not found: {}", identifier))?;
        return Ok(entry.id);
    }

    if registry.entries().is_empty() {
        println!("No chats yet, starting your first one.");
        return Ok(registry.create_chat(None)?);
    }

    if registry.entries().len() == 1 {
        return Ok(registry.entries()[0].id);
    }

    let mut choices: Vec<String> = registry
        .entries()
        .iter()
        .map(|entry| entry.name.clone())
        .collect();
    choices.push("(start a new chat)".to_string());

    let selection = Select::new()
        .with_prompt("Which chat?")
        .default(0)
        .items(&choices)
        .interact()?;

    if selection == registry.entries().len() {
        return Ok(registry.create_chat(None)?);
    }

    Ok(registry.entries()[selection].id)
}

fn render_history(store: &ConversationStore) {
    for message in store.all_messages() {
        print_message(message);
    }
    if !store.all_messages().is_empty() {
        println!();
    }
}

fn print_message(message: &ChatMessage) {
    match message.role {
        Role::User => println!("{} {}", style("you:").bold().green(), message.content),
        Role::Assistant => {
            println!("{} {}", style("assistant:").bold().cyan(), message.content);
        }
        Role::System => {}
    }
}

fn print_repl_help() {
    println!("Commands:");
    println!("  /help   Show this message");
    println!("  /clear  Delete every message in this chat");
    println!("  /quit   Leave the chat");
    println!();
    println!(
        "Start a line with {} followed by a question to ask the assistant.",
        TRIGGER_TOKEN
    );
    println!("Anything else is stored as a note for later retrieval.");
}

fn thinking_spinner() -> Option<ProgressBar> {
    if !console::user_attended_stderr() {
        return None;
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}").expect("spinner template should be valid"),
    );
    spinner.set_message("Thinking...");
    spinner.enable_steady_tick(Duration::from_millis(120));
    Some(spinner)
}
