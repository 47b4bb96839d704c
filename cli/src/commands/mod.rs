pub mod chat;
pub mod log;
pub mod plan;
pub mod state;
