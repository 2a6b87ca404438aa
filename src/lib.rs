pub mod client;
pub mod commands;
pub mod config;
pub mod db;
pub mod encoder;
pub mod llm;
pub mod logging;
pub mod message;
pub mod profile;
pub mod prompt;
pub mod quiz;
pub mod server;
pub mod wire;

pub use encoder::StreamEncoder;
pub use server::{create_router, start_server, AppState};
