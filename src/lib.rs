//! Grundy checkout backend
//!
//! Order lifecycle and payment reconciliation for a storefront that supports
//! two payment flows: pay-now (`standard`) and pay-on-delivery (`POD`).

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod health;
pub mod logging;
pub mod middleware;
pub mod payments;
pub mod services;
pub mod workers;
