//! Core domain types and logic.

pub mod cache;
pub mod config_validation;
pub mod constituent;
pub mod error;
pub mod indicator;
pub mod indicator_helpers;
pub mod market_data;
pub mod ohlcv;
pub mod orchestrator;
pub mod ranker;
pub mod regime;
pub mod screener;
pub mod sizing;
pub mod valuation;
