//! Unified error type for the canteen core.
//!
//! Every operation returns [`Result`]. Business failures (missing rows, bad
//! amounts, state conflicts) are distinct variants so the HTTP collaborator can
//! map them to status codes through [`Error::kind`]. Store failures are
//! classified on conversion from [`DbErr`] so that only transient ones are
//! retried.

use rust_decimal::Decimal;
use sea_orm::{DbErr, SqlErr};
use strum::{Display, EnumString, IntoStaticStr};
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Amount was zero or negative
    #[error("Invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount { amount: i64 },

    /// Weight was NaN or infinite
    #[error("Invalid weight: {weight}")]
    InvalidWeight { weight: f64 },

    #[error("Wallet not found for user: {user_id}")]
    WalletNotFound { user_id: String },

    #[error("Insufficient funds: current balance {current}, required {required}")]
    InsufficientFunds { current: Decimal, required: Decimal },

    #[error("User not found: {user_id}")]
    UserNotFound { user_id: String },

    #[error("Plate not found: {plate_id}")]
    PlateNotFound { plate_id: String },

    #[error("Plate {plate_id} is already bound to another user")]
    PlateAlreadyBound { plate_id: String },

    #[error("Plate {plate_id} is not bound to user {user_id}")]
    PlateBindingMismatch { plate_id: String, user_id: String },

    #[error("Plate {plate_id} is not bound to user {user_id}")]
    NotBound { plate_id: String, user_id: String },

    /// Plate is out of the pool (maintenance or cleaning)
    #[error("Plate {plate_id} is unavailable (status: {status})")]
    PlateUnavailable { plate_id: String, status: String },

    #[error("Plate {plate_id} cannot apply {event} while {from}")]
    InvalidPlateTransition {
        plate_id: String,
        from: String,
        event: String,
    },

    #[error("Food not found: {food_id}")]
    FoodNotFound { food_id: String },

    #[error("Food unavailable: {name} ({food_id})")]
    FoodUnavailable { food_id: String, name: String },

    #[error("Order must contain at least one item")]
    EmptyOrder,

    #[error("Order not found: {order_id}")]
    OrderNotFound { order_id: String },

    #[error("Order {order_id} cannot move from {from} to {to}")]
    InvalidOrderTransition {
        order_id: String,
        from: String,
        to: String,
    },

    #[error("Worker not found: {worker_id}")]
    WorkerNotFound { worker_id: String },

    #[error("Exception log not found: {id}")]
    ExceptionNotFound { id: i64 },

    #[error("Plate depot not found: {depot_id}")]
    DepotNotFound { depot_id: String },

    #[error("Plate depot {depot_id} has no plates available")]
    DepotEmpty { depot_id: String },

    #[error("Plate depot {depot_id} is at capacity")]
    DepotFull { depot_id: String },

    /// A caller-supplied field failed validation
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// A row with the same unique key already exists
    #[error("Already exists: {message}")]
    AlreadyExists { message: String },

    /// A guarded write lost a race, or the store reported a busy/serialization abort
    #[error("Concurrent modification: {message}")]
    Conflict { message: String },

    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation deadline exceeded")]
    DeadlineExceeded,

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Database error: {0}")]
    Database(DbErr),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

/// Flat discriminant of [`Error`], rendered in snake_case for transport layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ErrorKind {
    InvalidAmount,
    InvalidWeight,
    WalletNotFound,
    InsufficientFunds,
    UserNotFound,
    PlateNotFound,
    PlateAlreadyBound,
    PlateBindingMismatch,
    NotBound,
    PlateUnavailable,
    InvalidPlateTransition,
    FoodNotFound,
    FoodUnavailable,
    EmptyOrder,
    OrderNotFound,
    InvalidOrderTransition,
    WorkerNotFound,
    ExceptionNotFound,
    DepotNotFound,
    DepotEmpty,
    DepotFull,
    InvalidInput,
    AlreadyExists,
    Conflict,
    StoreUnavailable,
    Cancelled,
    DeadlineExceeded,
    Config,
    Internal,
}

impl Error {
    /// Returns the kind used by callers to pick a transport status.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidAmount { .. } => ErrorKind::InvalidAmount,
            Self::InvalidWeight { .. } => ErrorKind::InvalidWeight,
            Self::WalletNotFound { .. } => ErrorKind::WalletNotFound,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::UserNotFound { .. } => ErrorKind::UserNotFound,
            Self::PlateNotFound { .. } => ErrorKind::PlateNotFound,
            Self::PlateAlreadyBound { .. } => ErrorKind::PlateAlreadyBound,
            Self::PlateBindingMismatch { .. } => ErrorKind::PlateBindingMismatch,
            Self::NotBound { .. } => ErrorKind::NotBound,
            Self::PlateUnavailable { .. } => ErrorKind::PlateUnavailable,
            Self::InvalidPlateTransition { .. } => ErrorKind::InvalidPlateTransition,
            Self::FoodNotFound { .. } => ErrorKind::FoodNotFound,
            Self::FoodUnavailable { .. } => ErrorKind::FoodUnavailable,
            Self::EmptyOrder => ErrorKind::EmptyOrder,
            Self::OrderNotFound { .. } => ErrorKind::OrderNotFound,
            Self::InvalidOrderTransition { .. } => ErrorKind::InvalidOrderTransition,
            Self::WorkerNotFound { .. } => ErrorKind::WorkerNotFound,
            Self::ExceptionNotFound { .. } => ErrorKind::ExceptionNotFound,
            Self::DepotNotFound { .. } => ErrorKind::DepotNotFound,
            Self::DepotEmpty { .. } => ErrorKind::DepotEmpty,
            Self::DepotFull { .. } => ErrorKind::DepotFull,
            Self::InvalidInput { .. } => ErrorKind::InvalidInput,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::StoreUnavailable { .. } => ErrorKind::StoreUnavailable,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Self::Config { .. } | Self::EnvVar(_) => ErrorKind::Config,
            Self::Database(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// Only infrastructure contention is eligible for automatic retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict { .. } | Self::StoreUnavailable { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(message)) = err.sql_err() {
            return Self::AlreadyExists { message };
        }

        match err {
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::StoreUnavailable {
                message: err.to_string(),
            },
            other => {
                let message = other.to_string();
                let lowered = message.to_lowercase();
                if lowered.contains("database is locked")
                    || lowered.contains("database is busy")
                    || lowered.contains("could not serialize")
                    || lowered.contains("deadlock detected")
                {
                    Self::Conflict { message }
                } else {
                    Self::Database(other)
                }
            }
        }
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
