//! BlogCraft backend: token-based authentication and contact submissions
//! over Postgres, plus the client-side session holder that drives them.

pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod contact;
pub mod db;
pub mod error;
pub mod health;
pub mod rate_limit;
pub mod state;

#[cfg(test)]
mod testing;
