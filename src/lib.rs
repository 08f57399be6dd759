// Public API for integration tests and potential library usage

pub mod api;
pub mod auth;
pub mod error;
pub mod game;
pub mod gate;
pub mod llm;
pub mod persona;
pub mod protocol;
pub mod room;
pub mod state;
pub mod store;
pub mod types;
pub mod ws;
