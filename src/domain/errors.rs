use thiserror::Error;

/// Errors surfaced by the ingest engine. Configuration/store-catastrophic
/// errors aside, these never abort the process — see spec §7 propagation
/// policy (per-timeframe isolation).
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("exchange unavailable: {reason}")]
    ExchangeUnavailable { reason: String },

    #[error("invalid candle dropped: {reason}")]
    InvalidCandle { reason: String },

    #[error("timeframe {timeframe_min}m aborted after {pages} pages")]
    TooManyPages { timeframe_min: i64, pages: u32 },
}

#[derive(Debug, Error)]
pub enum StateBuilderError {
    #[error("insufficient history: have {have} candles, need {need}")]
    InsufficientHistory { have: usize, need: usize },
}

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("invalid strategy config: {reason}")]
    InvalidConfig { reason: String },
}

#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("no 1-minute candles in range")]
    NoCandlesInRange,

    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}

#[derive(Debug, Error)]
pub enum OptimizerError {
    #[error("parameter grid is empty after pruning")]
    GridEmpty,

    #[error("persistence failed at stage '{stage}': {reason}")]
    PersistenceFailed { stage: String, reason: String },
}

#[derive(Debug, Error)]
pub enum PaperRunnerError {
    #[error("paper run not found: {id}")]
    RunNotFound { id: uuid::Uuid },

    #[error("optimizer run not found: {id}")]
    OptimizerRunNotFound { id: uuid::Uuid },

    #[error("store unavailable: {reason}")]
    StoreUnavailable { reason: String },
}
