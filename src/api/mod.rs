pub mod auth;
pub mod catalog;
pub mod chat;
pub mod client;
pub mod events;
pub mod models;
pub mod orders;
pub mod socket;
pub mod users;
