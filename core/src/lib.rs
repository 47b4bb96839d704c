pub mod agent;
pub mod chat;
pub mod error;
pub mod logs;
pub mod plans;
pub mod state;
pub mod time;
