//! Crediya loan application service
//!
//! Core use cases live in [`application`]; the remaining modules wire them to
//! PostgreSQL, the identity service, the notifications queue and HTTP.

pub mod application;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod notification;
pub mod persistence;
pub mod routes;
pub mod state;
