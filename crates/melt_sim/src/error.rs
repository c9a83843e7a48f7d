//! Engine errors.

use chrono::NaiveDate;
use melt_model::IncidentType;
use thiserror::Error;

/// Boxed error returned by a day sink.
pub type SinkError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the simulation engine.
#[derive(Debug, Error)]
pub enum Error {
    /// The configuration or topology is invalid.
    #[error("configuration error: {0}")]
    Config(#[from] melt_model::Error),

    /// The perturbation table does not cover every incident type.
    #[error("perturbation table has no entry for {0}")]
    MissingPerturbation(IncidentType),

    /// A day outside the configured window was requested.
    #[error("day {day} is outside the configured window of {days} days")]
    DayOutOfRange {
        /// Requested day.
        day: u32,
        /// Configured day count.
        days: u32,
    },

    /// The sink rejected a finished day.
    #[error("sink failed for {date}: {source}")]
    Sink {
        /// Date of the rejected day.
        date: NaiveDate,
        /// Underlying error.
        #[source]
        source: SinkError,
    },
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
