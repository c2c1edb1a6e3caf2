//! Core domain types and logic.

pub mod backtest;
pub mod bar;
pub mod config_validation;
pub mod cost;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod orchestrator;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod strategy;
pub mod sweep;
pub mod timeline;
