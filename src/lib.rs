//! confab is a terminal client for chatting with several LLM providers
//! while keeping multiple conversations persisted between runs.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns chats, credentials, model selection, request dispatch and
//!   persistence, all reached through [`core::app::App`].
//! - [`api`] defines the provider wire payloads and remote model listing.
//! - [`cli`] parses arguments and runs one-shot commands or the interactive
//!   loop.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod utils;
