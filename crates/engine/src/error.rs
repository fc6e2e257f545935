//! The module contains the errors the engine can return.
//!
//! The errors are:
//!
//! - [`AlreadyRegistered`] returned when a member id is registered twice.
//! - [`InsufficientData`] and [`NoMeals`] returned when a settlement cannot
//!   be computed (see [`Unsettled`]).
//! - [`NoSubmissionYet`] returned when a single meal count is adjusted before
//!   the period has a meal submission.
//! - [`Persistence`] returned when the store could not be read or written.
//!
//!  [`AlreadyRegistered`]: EngineError::AlreadyRegistered
//!  [`InsufficientData`]: EngineError::InsufficientData
//!  [`NoMeals`]: EngineError::NoMeals
//!  [`NoSubmissionYet`]: EngineError::NoSubmissionYet
//!  [`Persistence`]: EngineError::Persistence
use thiserror::Error;

use crate::store::StoreError;

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("\"{0}\" already registered!")]
    AlreadyRegistered(String),
    #[error("settlement needs both expenses and meal data")]
    InsufficientData,
    #[error("meal data sums to zero meals")]
    NoMeals,
    #[error("no meal submission for period {0}")]
    NoSubmissionYet(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl EngineError {
    /// Informational outcomes that leave state valid and need no retry.
    #[must_use]
    pub fn is_informational(&self) -> bool {
        matches!(self, Self::AlreadyRegistered(_))
    }
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::AlreadyRegistered(a), Self::AlreadyRegistered(b)) => a == b,
            (Self::InsufficientData, Self::InsufficientData) => true,
            (Self::NoMeals, Self::NoMeals) => true,
            (Self::NoSubmissionYet(a), Self::NoSubmissionYet(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::InvalidPeriod(a), Self::InvalidPeriod(b)) => a == b,
            (Self::Persistence(a), Self::Persistence(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

/// Why a settlement could not be produced for a period.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unsettled {
    #[error("settlement needs both expenses and meal data")]
    InsufficientData,
    #[error("meal data sums to zero meals")]
    NoMeals,
}

impl From<Unsettled> for EngineError {
    fn from(value: Unsettled) -> Self {
        match value {
            Unsettled::InsufficientData => Self::InsufficientData,
            Unsettled::NoMeals => Self::NoMeals,
        }
    }
}
