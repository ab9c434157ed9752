use std::fmt;

use thiserror::Error;

/// Which of the two compared windows a fetch belonged to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKind {
    Current,
    Previous,
}

impl fmt::Display for PeriodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodKind::Current => f.write_str("current"),
            PeriodKind::Previous => f.write_str("previous"),
        }
    }
}

/// Which collection a fetch read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Tracking,
    Events,
}

impl fmt::Display for StoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKind::Tracking => f.write_str("tracking_records"),
            StoreKind::Events => f.write_str("conversion_events"),
        }
    }
}

#[derive(Debug, Error)]
pub enum KpiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid pageId: {0}")]
    ReferenceParse(#[from] PageRefError),

    #[error("{store} fetch for {period} period failed: {source}")]
    StoreFetch {
        period: PeriodKind,
        store: StoreKind,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PageRefError {
    #[error("expected 24 hex characters, got {0}")]
    Length(usize),

    #[error("non-hex character in reference")]
    NotHex,
}
