//! # ReelAgents Client Core
//!
//! Headless core of the ReelAgents dashboard: session and profile resolution,
//! role-based routing, async job polling, tenant-scoped data hooks and payment
//! redirects, wired together by [`context::AppContext`].

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod context;
pub mod error;
pub mod hooks;
pub mod jobs;
pub mod models;
pub mod payments;
pub mod session_store;
pub mod store;
pub mod telemetry;
pub mod ui_store;
