//! Request handlers for the facade's HTTP surface (spec §6).

pub mod chat;
pub mod feedback;
pub mod health;
pub mod models;
