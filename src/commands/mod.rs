// src/commands/mod.rs
pub mod init;
mod api;

pub use api::{Pipeline, TurnReport};

pub use init::{InitReport, ensure_initialized};
