pub mod chat;
pub mod extract;
pub mod fill;
pub mod health;
pub mod upload;
