pub mod chat;
pub mod context;
pub mod core;
pub mod history;
pub mod llm;
pub mod provisioning;
pub mod server;
pub mod state;
pub mod users;
