//! Operator client for the CI healing agent.
//!
//! Submits a repository for healing, waits for the single result, classifies
//! it and renders it. Credentials for pushing fixes are acquired through the
//! backend's GitHub authorization redirect and kept in a local file.

pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod narrator;
pub mod outcome;
pub mod request;
pub mod session;
pub mod storage;
pub mod views;

mod orchestrator;
mod text_summary;
