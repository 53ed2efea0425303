//! Perpetual-futures research and execution platform: candle ingestion,
//! multi-timeframe state, backtesting, grid-search optimization, and a
//! concurrent paper-trade runner for a single instrument.

pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;
