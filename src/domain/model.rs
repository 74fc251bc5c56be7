use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One outstanding bounce reported by the mail provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BounceNotification {
    pub address: String,
    pub reason: String,
    pub status_code: Option<String>,
    pub observed_at: DateTime<Utc>,
}

impl BounceNotification {
    pub fn new(
        address: impl Into<String>,
        reason: impl Into<String>,
        status_code: Option<&str>,
    ) -> Self {
        Self {
            address: address.into(),
            reason: reason.into(),
            status_code: status_code.map(str::to_string),
            observed_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }

    /// 去重與比對帳號時使用的地址
    pub fn normalized_address(&self) -> String {
        self.address.trim().to_lowercase()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Classification {
    Hard,
    Soft,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Hard => write!(f, "hard"),
            Classification::Soft => write!(f, "soft"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: i64,
    pub username: String,
    pub address: String,
    pub active: bool,
}

/// Whether soft bounces are cleared at the provider as well as hard ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcknowledgePolicy {
    /// Clear every examined notification so the backlog keeps shrinking.
    #[default]
    All,
    HardOnly,
}

impl AcknowledgePolicy {
    pub fn should_acknowledge(self, classification: Classification) -> bool {
        match self {
            AcknowledgePolicy::All => true,
            AcknowledgePolicy::HardOnly => classification == Classification::Hard,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutcome {
    pub examined_count: usize,
    pub deactivated_count: usize,
    pub hard_count: usize,
    pub soft_count: usize,
    pub duplicate_count: usize,
    pub acknowledged_count: usize,
    pub acknowledge_failures: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingCredential,
    ClientUnavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    SourceUnavailable,
    Directory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Idle,
    Guarding,
    Fetching,
    Processing,
    Completed,
    Skipped,
    Failed,
}

impl JobState {
    pub fn can_advance_to(self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Idle, JobState::Guarding)
                | (JobState::Guarding, JobState::Fetching)
                | (JobState::Guarding, JobState::Skipped)
                | (JobState::Fetching, JobState::Processing)
                | (JobState::Fetching, JobState::Completed)
                | (JobState::Fetching, JobState::Failed)
                | (JobState::Processing, JobState::Completed)
                | (JobState::Processing, JobState::Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Skipped | JobState::Failed
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Guarding => "guarding",
            JobState::Fetching => "fetching",
            JobState::Processing => "processing",
            JobState::Completed => "completed",
            JobState::Skipped => "skipped",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Terminal result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunStatus {
    Skipped(SkipReason),
    Failed { kind: FailureKind, message: String },
    Completed(RunOutcome),
}

impl RunStatus {
    pub fn state(&self) -> JobState {
        match self {
            RunStatus::Skipped(_) => JobState::Skipped,
            RunStatus::Failed { .. } => JobState::Failed,
            RunStatus::Completed(_) => JobState::Completed,
        }
    }

    pub fn outcome(&self) -> Option<&RunOutcome> {
        match self {
            RunStatus::Completed(outcome) => Some(outcome),
            _ => None,
        }
    }

    /// 只有帳號目錄的非預期錯誤會回傳非零
    pub fn exit_code(&self) -> i32 {
        match self {
            RunStatus::Failed {
                kind: FailureKind::Directory,
                ..
            } => 1,
            _ => 0,
        }
    }
}
