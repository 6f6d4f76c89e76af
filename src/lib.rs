//! papergate - a moderated past-paper library
//!
//! Documents move through moderation (pending, approved, rejected). Free
//! accounts may unlock a fixed number of distinct documents, subscribers
//! unlock everything, and payment-provider webhooks keep subscription state
//! current. Every granted download is audited.

pub mod config;
pub mod errors;
pub mod observability;
pub mod store;

pub mod auth;
pub mod documents;
pub mod ledger;
pub mod entitlement;
pub mod billing;
pub mod file_storage;
pub mod audit;
pub mod notify;
pub mod feedback;
pub mod access;

pub mod http_server;
pub mod cli;
