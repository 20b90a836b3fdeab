pub mod app;
pub mod chat;
pub mod config;
pub mod credentials;
pub mod dispatcher;
pub mod message;
pub mod persistence;
pub mod providers;
pub mod session;
pub mod storage;
