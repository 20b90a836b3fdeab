//! Line-oriented interactive chat.
//!
//! Plain lines are sent to the selected model. Lines starting with `/` are
//! commands for managing chats and models.

use std::error::Error;
use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::cli::chat_list::{delete_chat, list_chats, new_chat, rename_chat, switch_chat};
use crate::cli::model_list::list_catalog;
use crate::core::app::App;
use crate::core::message::Message;
use crate::core::providers::Provider;

const HELP: &str = "\
Commands:
  /new                                   Start a new chat
  /chats                                 List chats (* marks the active one)
  /switch <id>                           Make another chat active
  /rename <title>                        Rename the active chat
  /delete [id]                           Delete a chat (default: the active one)
  /models                                List configured models
  /model <id>                            Select a model for the active chat
  /add <provider> <model> <key> [name]   Store an API key for a model
  /remove <model>                        Remove a model and its key
  /help                                  Show this help
  /quit                                  Leave";

/// One parsed line of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplInput {
    Message(String),
    New,
    Chats,
    Switch(u64),
    Rename(String),
    Delete(Option<u64>),
    Models,
    Model(String),
    Add {
        provider: Provider,
        model_id: String,
        secret: String,
        display_name: Option<String>,
    },
    Remove(String),
    Help,
    Quit,
    Empty,
    /// A command that could not be understood, with a usage hint.
    Invalid(String),
}

pub fn parse_input(line: &str) -> ReplInput {
    let line = line.trim();
    if line.is_empty() {
        return ReplInput::Empty;
    }
    let Some(command_line) = line.strip_prefix('/') else {
        return ReplInput::Message(line.to_string());
    };

    let (command, rest) = match command_line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (command_line, ""),
    };

    match command.to_ascii_lowercase().as_str() {
        "new" => ReplInput::New,
        "chats" => ReplInput::Chats,
        "switch" => match rest.parse::<u64>() {
            Ok(id) => ReplInput::Switch(id),
            Err(_) => ReplInput::Invalid("Usage: /switch <id>".to_string()),
        },
        "rename" if !rest.is_empty() => ReplInput::Rename(rest.to_string()),
        "rename" => ReplInput::Invalid("Usage: /rename <title>".to_string()),
        "delete" if rest.is_empty() => ReplInput::Delete(None),
        "delete" => match rest.parse::<u64>() {
            Ok(id) => ReplInput::Delete(Some(id)),
            Err(_) => ReplInput::Invalid("Usage: /delete [id]".to_string()),
        },
        "models" => ReplInput::Models,
        "model" if !rest.is_empty() => ReplInput::Model(rest.to_string()),
        "model" => ReplInput::Invalid("Usage: /model <id>".to_string()),
        "add" => parse_add(rest),
        "remove" if !rest.is_empty() => ReplInput::Remove(rest.to_string()),
        "remove" => ReplInput::Invalid("Usage: /remove <model>".to_string()),
        "help" => ReplInput::Help,
        "quit" | "exit" => ReplInput::Quit,
        other => ReplInput::Invalid(format!("Unknown command /{other}. Try /help.")),
    }
}

fn parse_add(rest: &str) -> ReplInput {
    let mut parts = rest.split_whitespace();
    let (Some(provider), Some(model_id), Some(secret)) = (parts.next(), parts.next(), parts.next())
    else {
        return ReplInput::Invalid("Usage: /add <provider> <model> <key> [name]".to_string());
    };
    let provider = match provider.parse::<Provider>() {
        Ok(provider) => provider,
        Err(err) => return ReplInput::Invalid(err.to_string()),
    };
    let name: Vec<&str> = parts.collect();
    ReplInput::Add {
        provider,
        model_id: model_id.to_string(),
        secret: secret.to_string(),
        display_name: (!name.is_empty()).then(|| name.join(" ")),
    }
}

pub async fn run_repl(app: &mut App) -> Result<(), Box<dyn Error>> {
    print_header(app);
    for message in app.active_messages() {
        print_message(app, message);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            println!();
            return Ok(());
        };

        match parse_input(&line) {
            ReplInput::Empty => {}
            ReplInput::Quit => return Ok(()),
            ReplInput::Message(text) => match app.send(&text).await {
                Ok(_) => {
                    if let Some(reply) = app.active_messages().last() {
                        print_message(app, reply);
                    }
                }
                Err(err) => eprintln!("⚠️  {err}"),
            },
            input => {
                if let Err(err) = run_command(app, input) {
                    eprintln!("❌ {err}");
                }
            }
        }
    }
}

fn run_command(app: &mut App, input: ReplInput) -> Result<(), Box<dyn Error>> {
    match input {
        ReplInput::New => new_chat(app),
        ReplInput::Chats => list_chats(app),
        ReplInput::Switch(id) => {
            switch_chat(app, id)?;
            for message in app.active_messages() {
                print_message(app, message);
            }
        }
        ReplInput::Rename(title) => {
            let id = app.active_chat_id().ok_or("No active chat")?;
            rename_chat(app, id, &title)?;
        }
        ReplInput::Delete(id) => {
            let id = id.or(app.active_chat_id()).ok_or("No active chat")?;
            delete_chat(app, id)?;
        }
        ReplInput::Models => list_catalog(app),
        ReplInput::Model(model_id) => {
            app.select_model(&model_id)?;
            println!("✅ Selected {}", app.model_display_name(&model_id));
        }
        ReplInput::Add {
            provider,
            model_id,
            secret,
            display_name,
        } => {
            app.add_credential(
                provider,
                &model_id,
                &secret,
                display_name.as_deref().unwrap_or(""),
            )?;
            println!("✅ Saved key for {model_id} ({})", provider.display_name());
        }
        ReplInput::Remove(model_id) => {
            if !app.remove_model(&model_id) {
                return Err(format!("No configured model '{model_id}'").into());
            }
            println!("✅ Removed {model_id}");
        }
        ReplInput::Help => println!("{HELP}"),
        ReplInput::Invalid(hint) => return Err(hint.into()),
        ReplInput::Message(_) | ReplInput::Empty | ReplInput::Quit => {}
    }
    Ok(())
}

fn print_header(app: &App) {
    let title = app
        .active_chat()
        .map(|chat| chat.title.as_str())
        .unwrap_or("(no chat)");
    let model = app
        .selected_model()
        .map(|id| app.model_display_name(id))
        .unwrap_or("no model selected");
    println!("confab · {title} · {model}");
    println!("Type /help for commands.");
    println!();
}

fn print_message(app: &App, message: &Message) {
    if message.is_user() {
        println!("you: {}", message.text);
        return;
    }
    let name = message
        .model_id
        .as_deref()
        .map(|id| app.model_display_name(id))
        .unwrap_or("assistant");
    println!("{name}: {}", message.text);
    println!();
}
