pub mod config;
pub mod conversation;
pub mod conversation_store;
pub mod coordinator;
pub mod models;
pub mod protocol;
pub mod segments;
pub mod speech;
pub mod stream;
