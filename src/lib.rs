use std::{fmt::Display, str::FromStr};

use serde::{de, Deserialize, Deserializer};

use std::collections::{BTreeMap, HashSet};

pub type Map<K, V> = BTreeMap<K, V>;
pub type Set<K> = HashSet<K>;

pub use anyhow::{anyhow, bail, Context, Result};
pub use std::result::Result as StdResult;

/// Base job states reported by `squeue`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum JobState {
    BootFail,
    Cancelled,
    Completed,
    Completing,
    Configuring,
    Deadline,
    Failed,
    LaunchFailed,
    NodeFail,
    OutOfMemory,
    Pending,
    PowerUpNode,
    Preempted,
    ReconfigFail,
    Requeued,
    RequeueFed,
    RequeueHold,
    Resizing,
    ResvDelHold,
    Revoked,
    Running,
    Signaling,
    SpecialExit,
    StageOut,
    Stopped,
    Suspended,
    Timeout,
    UpdateDb,
}

impl JobState {
    pub const fn as_str(self) -> &'static str {
        use JobState::*;
        match self {
            BootFail => "BOOT_FAIL",
            Cancelled => "CANCELLED",
            Completed => "COMPLETED",
            Completing => "COMPLETING",
            Configuring => "CONFIGURING",
            Deadline => "DEADLINE",
            Failed => "FAILED",
            LaunchFailed => "LAUNCH_FAILED",
            NodeFail => "NODE_FAIL",
            OutOfMemory => "OUT_OF_MEMORY",
            Pending => "PENDING",
            PowerUpNode => "POWER_UP_NODE",
            Preempted => "PREEMPTED",
            ReconfigFail => "RECONFIG_FAIL",
            Requeued => "REQUEUED",
            RequeueFed => "REQUEUE_FED",
            RequeueHold => "REQUEUE_HOLD",
            Resizing => "RESIZING",
            ResvDelHold => "RESV_DEL_HOLD",
            Revoked => "REVOKED",
            Running => "RUNNING",
            Signaling => "SIGNALING",
            SpecialExit => "SPECIAL_EXIT",
            StageOut => "STAGE_OUT",
            Stopped => "STOPPED",
            Suspended => "SUSPENDED",
            Timeout => "TIMEOUT",
            UpdateDb => "UPDATE_DB",
        }
    }

    const ALL: &'static [JobState] = &[
        JobState::BootFail,
        JobState::Cancelled,
        JobState::Completed,
        JobState::Completing,
        JobState::Configuring,
        JobState::Deadline,
        JobState::Failed,
        JobState::LaunchFailed,
        JobState::NodeFail,
        JobState::OutOfMemory,
        JobState::Pending,
        JobState::PowerUpNode,
        JobState::Preempted,
        JobState::ReconfigFail,
        JobState::Requeued,
        JobState::RequeueFed,
        JobState::RequeueHold,
        JobState::Resizing,
        JobState::ResvDelHold,
        JobState::Revoked,
        JobState::Running,
        JobState::Signaling,
        JobState::SpecialExit,
        JobState::StageOut,
        JobState::Stopped,
        JobState::Suspended,
        JobState::Timeout,
        JobState::UpdateDb,
    ];
}

impl Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive, so `running`, `Running` and `RUNNING` are the same state.
impl FromStr for JobState {
    type Err = ParseError;

    fn from_str(s: &str) -> ParseResult<Self> {
        JobState::ALL
            .iter()
            .copied()
            .find(|state| state.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseError::JobState(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for JobState {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    JobState(String),
    ResourceCount(String),
    UsernameTooLong { user: String, max: usize },
}

pub type ParseResult<T> = StdResult<T, ParseError>;

impl Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use ParseError::*;
        match self {
            JobState(s) => write!(f, "unable to parse job state ({})", s),
            ResourceCount(s) => write!(f, "unable to parse resource count ({})", s),
            UsernameTooLong { user, max } => write!(
                f,
                "username is longer than {} characters ({:?})",
                max, user
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Restore the default SIGPIPE disposition, so writing to a closed pipe
/// (e.g. `| head`) terminates the process instead of panicking in `println!`.
pub fn reset_sigpipe() {
    unsafe {
        libc::signal(libc::SIGPIPE, libc::SIG_DFL);
    }
}

pub mod cli;
pub mod command;
pub mod filter;
pub mod groups;
pub mod logging;
pub mod render;
pub mod report;
pub mod resources;
pub mod snapshot;
pub mod usage;

mod config;
pub use config::*;
