//! ToiletPass backend
//!
//! Payment-reservation confirmation service: creates payment
//! authorizations with the card provider, verifies provider callbacks,
//! persists reservations and wallet top-ups exactly once, and emails
//! access tickets.

pub mod api;
pub mod auth;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
