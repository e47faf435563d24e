pub mod chat;
pub mod models;
pub mod onboard;
pub mod retrieve;
