pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::CliArgs;

pub use adapters::{
    sendgrid::{HttpConnector, SendGridSource},
    sqlite::SqliteDirectory,
};
pub use config::Settings;
pub use core::{classifier::BounceClassifier, reconcile::ReconciliationJob};
pub use domain::model::{
    AcknowledgePolicy, Account, BounceNotification, Classification, FailureKind, JobState,
    RunOutcome, RunStatus, SkipReason,
};
pub use utils::error::{BounceError, Result};
