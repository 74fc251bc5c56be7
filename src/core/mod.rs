pub mod classifier;
pub mod reconcile;

pub use crate::domain::model::{BounceNotification, Classification, RunOutcome, RunStatus};
pub use crate::domain::ports::{AccountDirectory, BounceSource, ReconcileConfig, SourceConnector};
pub use crate::utils::error::Result;
