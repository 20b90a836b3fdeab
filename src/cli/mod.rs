//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat_list;
pub mod model_list;
pub mod repl;
pub mod say;

use std::error::Error;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::warn;

use crate::cli::chat_list::{delete_chat, list_chats, new_chat, rename_chat, switch_chat};
use crate::cli::model_list::{list_catalog, list_remote_models};
use crate::cli::repl::run_repl;
use crate::cli::say::run_say;
use crate::core::app::{App, AppOptions};
use crate::core::config::data::{path_display, Config, CredentialStoreKind, SETTING_KEYS};
use crate::core::dispatcher::Dispatcher;
use crate::core::persistence::Persistence;
use crate::core::providers::Provider;
use crate::core::storage::{FileStore, KeyValueStore, KeyringStore, MemoryStore};
use crate::logging::init_tracing;

#[derive(Parser)]
#[command(name = "confab")]
#[command(version, about = "Chat with OpenAI, Anthropic, Gemini, DeepSeek and OpenRouter models from one place")]
#[command(
    long_about = "confab keeps any number of conversations with large-language-model providers \
and stores them between runs. Each conversation remembers the model it last used.\n\n\
Add a model with its API key first:\n\
  confab add-model openai gpt-4o --name \"GPT-4o\"\n\n\
Models without a key can still be selected; they answer with a placeholder and no \
request is sent.\n\n\
Interactive commands:\n\
  /new /chats /switch <id> /rename <title> /delete [id]\n\
  /models /model <id> /add <provider> <model> <key> [name] /remove <id>\n\
  /help /quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for this run (overrides the chat's last model)
    #[arg(short = 'm', long, global = true, value_name = "MODEL")]
    pub model: Option<String>,

    /// Write diagnostics to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,

    /// Keep everything in memory; nothing is read from or written to disk
    #[arg(long, global = true)]
    pub memory: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one message to the active chat and print the reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        prompt: Vec<String>,
    },
    /// List configured models
    Models,
    /// Store an API key for a model, adding it to the catalog
    AddModel {
        /// One of: openai, anthropic, gemini, deepseek, openrouter
        provider: Provider,
        /// Model identifier sent to the provider (e.g. gpt-4o)
        model_id: String,
        /// Name shown in listings (defaults to the model id)
        #[arg(long)]
        name: Option<String>,
        /// API key (read from stdin when omitted)
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove a model and its API key
    RemoveModel { model_id: String },
    /// Select the model used by the active chat
    Select { model_id: String },
    /// List the models a provider offers
    RemoteModels {
        provider: Provider,
        /// API key (defaults to a stored key for this provider)
        #[arg(long)]
        key: Option<String>,
    },
    /// List chats, newest first
    Chats,
    /// Start a new chat
    New,
    /// Make another chat active
    Switch { id: u64 },
    /// Rename a chat
    Rename {
        id: u64,
        #[arg(trailing_var_arg = true, required = true)]
        title: Vec<String>,
    },
    /// Delete a chat
    Delete { id: u64 },
    /// Show the current configuration
    Config,
    /// Set a configuration value
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        value: Vec<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let mut config = Config::load()?;

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Config => {
            config.print_all();
            Ok(())
        }
        Commands::Set { key, value } => {
            config.set_value(&key, &value.join(" ")).inspect_err(|_| print_setting_keys())?;
            config.save()?;
            println!("✅ Set {key}");
            Ok(())
        }
        Commands::Unset { key } => {
            config.unset_value(&key).inspect_err(|_| print_setting_keys())?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
        command => {
            let mut app = open_app(&config, args.memory, args.model.as_deref())?;
            run_app_command(&mut app, command).await
        }
    }
}

async fn run_app_command(app: &mut App, command: Commands) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Chat => run_repl(app).await,
        Commands::Say { prompt } => run_say(app, &prompt.join(" ")).await,
        Commands::Models => {
            list_catalog(app);
            Ok(())
        }
        Commands::AddModel {
            provider,
            model_id,
            name,
            key,
        } => {
            let secret = match key {
                Some(key) => key,
                None => prompt_line(&format!("{} API key for {model_id}: ", provider.display_name()))?,
            };
            let is_new =
                app.add_credential(provider, &model_id, &secret, name.as_deref().unwrap_or(""))?;
            if is_new {
                println!("✅ Added {model_id} ({})", provider.display_name());
            } else {
                println!("✅ Updated {model_id} ({})", provider.display_name());
            }
            Ok(())
        }
        Commands::RemoveModel { model_id } => {
            if app.remove_model(&model_id) {
                println!("✅ Removed {model_id}");
                Ok(())
            } else {
                Err(format!("No configured model '{model_id}'").into())
            }
        }
        Commands::Select { model_id } => {
            app.select_model(&model_id)?;
            println!("✅ Selected {}", app.model_display_name(&model_id));
            Ok(())
        }
        Commands::RemoteModels { provider, key } => {
            list_remote_models(app, provider, key.as_deref()).await
        }
        Commands::Chats => {
            list_chats(app);
            Ok(())
        }
        Commands::New => {
            new_chat(app);
            Ok(())
        }
        Commands::Switch { id } => switch_chat(app, id),
        Commands::Rename { id, title } => rename_chat(app, id, &title.join(" ")),
        Commands::Delete { id } => delete_chat(app, id),
        Commands::Config | Commands::Set { .. } | Commands::Unset { .. } => Ok(()),
    }
}

/// Wire storage, dispatcher and options from configuration into an [`App`].
pub fn open_app(
    config: &Config,
    in_memory: bool,
    model: Option<&str>,
) -> Result<App, Box<dyn Error>> {
    let (records, secrets): (Box<dyn KeyValueStore>, Box<dyn KeyValueStore>) = if in_memory {
        (Box::new(MemoryStore::new()), Box::new(MemoryStore::new()))
    } else {
        let data_dir = config.resolved_data_dir()?;
        let secrets: Box<dyn KeyValueStore> = match config.credential_store() {
            CredentialStoreKind::File => Box::new(FileStore::new(&data_dir)),
            CredentialStoreKind::Keyring => Box::new(KeyringStore::new()),
        };
        (Box::new(FileStore::new(data_dir)), secrets)
    };

    let mut dispatcher = Dispatcher::new(Dispatcher::build_client(config.request_timeout())?);
    for (provider, base_url) in config.provider_base_urls() {
        dispatcher = dispatcher.with_base_url(provider, base_url);
    }

    let options = AppOptions {
        window_size: config.window_size(),
        default_model: config.default_model.clone(),
    };
    let mut app = App::bootstrap(Persistence::new(records, secrets), dispatcher, options);

    for failure in app.load_failures() {
        if failure.is_recoverable() {
            eprintln!("⚠️  {failure} (try again once the keyring is unlocked)");
        } else {
            eprintln!("⚠️  {failure}");
        }
    }
    if let Some(model) = model {
        app.select_model(model)?;
    }
    Ok(app)
}

fn print_setting_keys() {
    eprintln!("Available keys: {}", SETTING_KEYS.join(", "));
    if let Ok(path) = Config::config_path() {
        eprintln!("Config file: {}", path_display(path));
    }
}

fn prompt_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        warn!("stdin closed before a value was entered");
    }
    Ok(line.trim().to_string())
}
