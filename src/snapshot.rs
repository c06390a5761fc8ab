//! Taking, parsing and caching the `squeue` job snapshot.
use crate::command::output_with_timeout;
use crate::resources::Tres;
use crate::*;
use once_cell::unsync::OnceCell;
use serde::Deserialize;
use std::{
    io::{IsTerminal, Write},
    process::Command,
    time::{Duration, SystemTime},
};

/// One job from the queue.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobRecord {
    pub account: String,
    pub partition: String,
    pub user: String,
    pub state: JobState,
    pub cpus: u64,
    /// Resources allocated to the job; empty until it is scheduled
    pub tres_alloc: Tres,
    /// Resources requested by the job
    pub tres_req: Tres,
}

impl JobRecord {
    /// The allocated resources if there are any, otherwise the requested ones.
    pub fn authoritative_tres(&self) -> &Tres {
        if self.tres_alloc.is_empty() {
            &self.tres_req
        } else {
            &self.tres_alloc
        }
    }
}

/// Newer Slurm versions report the state as a list (base state followed by flags).
#[derive(Deserialize)]
#[serde(untagged)]
enum RawState {
    One(String),
    Many(Vec<String>),
}

/// Newer Slurm versions wrap numbers as `{"set": true, "infinite": false, "number": 4}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawCount {
    Plain(u64),
    Number { number: u64 },
}

#[derive(Deserialize)]
struct RawJob {
    account: String,
    partition: String,
    user_name: String,
    job_state: RawState,
    cpus: RawCount,
    tres_alloc_str: Tres,
    tres_req_str: Tres,
}

#[derive(Deserialize)]
struct RawSnapshot {
    jobs: Vec<RawJob>,
}

impl RawJob {
    fn into_record(self, max_username_length: usize) -> ParseResult<JobRecord> {
        if self.user_name.chars().count() > max_username_length {
            return Err(ParseError::UsernameTooLong {
                user: self.user_name,
                max: max_username_length,
            });
        }
        let state = match &self.job_state {
            RawState::One(s) => s.as_str(),
            RawState::Many(states) => states.first().map(String::as_str).unwrap_or_default(),
        };
        let state = state.parse()?;
        let cpus = match self.cpus {
            RawCount::Plain(n) | RawCount::Number { number: n } => n,
        };
        Ok(JobRecord {
            account: self.account,
            partition: self.partition,
            user: self.user_name,
            state,
            cpus,
            tres_alloc: self.tres_alloc_str,
            tres_req: self.tres_req_str,
        })
    }
}

/// All jobs in the cluster queue at one point in time.
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub jobs: Vec<JobRecord>,
    pub captured_at: SystemTime,
}

impl Snapshot {
    pub fn new(jobs: Vec<JobRecord>) -> Self {
        Snapshot {
            jobs,
            captured_at: SystemTime::now(),
        }
    }

    /// Parse the output of `squeue --json`.
    pub fn from_json(bytes: &[u8], max_username_length: usize) -> Result<Self> {
        let raw: RawSnapshot =
            serde_json::from_slice(bytes).context("failed to parse squeue output")?;
        let jobs = raw
            .jobs
            .into_iter()
            .enumerate()
            .map(|(idx, j)| {
                j.into_record(max_username_length)
                    .with_context(|| format!("invalid job at index {} in squeue output", idx))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot::new(jobs))
    }
}

/// Something that can produce a full queue snapshot.
pub trait SnapshotSource {
    fn fetch(&self) -> Result<Snapshot>;
}

/// Takes the snapshot by running `squeue --all --json`.
#[derive(Clone, Debug)]
pub struct Squeue {
    pub program: String,
    pub timeout: Duration,
    pub max_username_length: usize,
}

impl Squeue {
    pub fn from_settings(s: &Settings) -> Self {
        Squeue {
            program: s.squeue.clone(),
            timeout: s.squeue_timeout(),
            max_username_length: s.max_username_length,
        }
    }
}

const PROGRESS_MSG: &'static str = "collecting info from slurm...";

impl SnapshotSource for Squeue {
    fn fetch(&self) -> Result<Snapshot> {
        let mut stderr = std::io::stderr();
        let progress = stderr.is_terminal();
        if progress {
            let _ = write!(stderr, "{}\r", PROGRESS_MSG);
        }
        let mut squeue = Command::new(&self.program);
        squeue.args(&["--all", "--json"]);
        let output = output_with_timeout(squeue, self.timeout);
        if progress {
            let _ = write!(stderr, "{:width$}\r", "", width = PROGRESS_MSG.len());
        }
        let snapshot = Snapshot::from_json(&output?, self.max_username_length)?;
        tracing::info!(jobs = snapshot.jobs.len(), "took queue snapshot");
        Ok(snapshot)
    }
}

/// Fetches the snapshot on first use and hands out the same one for the rest of the run.
pub struct SnapshotCache<S> {
    source: S,
    snapshot: OnceCell<Snapshot>,
}

impl<S: SnapshotSource> SnapshotCache<S> {
    pub fn new(source: S) -> Self {
        SnapshotCache {
            source,
            snapshot: OnceCell::new(),
        }
    }

    /// A cache that is already populated and never consults its source.
    pub fn with_snapshot(source: S, snapshot: Snapshot) -> Self {
        SnapshotCache {
            source,
            snapshot: OnceCell::with_value(snapshot),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn is_populated(&self) -> bool {
        self.snapshot.get().is_some()
    }

    pub fn get(&self) -> Result<&Snapshot> {
        self.snapshot.get_or_try_init(|| self.source.fetch())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::Cell;

    pub fn job(
        account: &str,
        partition: &str,
        user: &str,
        state: JobState,
        cpus: u64,
        alloc: &str,
        req: &str,
    ) -> JobRecord {
        JobRecord {
            account: account.to_string(),
            partition: partition.to_string(),
            user: user.to_string(),
            state,
            cpus,
            tres_alloc: Tres::parse(alloc).unwrap(),
            tres_req: Tres::parse(req).unwrap(),
        }
    }

    /// Counts how often it is asked for a snapshot.
    pub struct FakeSource {
        pub jobs: Vec<JobRecord>,
        pub fetches: Cell<usize>,
    }

    impl FakeSource {
        pub fn new(jobs: Vec<JobRecord>) -> Self {
            FakeSource {
                jobs,
                fetches: Cell::new(0),
            }
        }
    }

    impl SnapshotSource for FakeSource {
        fn fetch(&self) -> Result<Snapshot> {
            self.fetches.set(self.fetches.get() + 1);
            Ok(Snapshot::new(self.jobs.clone()))
        }
    }

    struct FailingSource;

    impl SnapshotSource for FailingSource {
        fn fetch(&self) -> Result<Snapshot> {
            bail!("squeue failed")
        }
    }

    const SQUEUE_JSON_NEW: &str = r#"{
        "meta": { "plugin": { "type": "openapi/v0.0.39" } },
        "jobs": [
            {
                "account": "pi_x",
                "partition": "gpu",
                "user_name": "alice",
                "job_id": 101,
                "job_state": ["RUNNING"],
                "cpus": { "set": true, "infinite": false, "number": 8 },
                "tres_alloc_str": "cpu=8,mem=32G,node=1,billing=8,gres/gpu=2,gres/gpu:a100=2",
                "tres_req_str": "cpu=8,mem=32G,node=1,billing=8,gres/gpu=2"
            },
            {
                "account": "pi_x",
                "partition": "cpu",
                "user_name": "bob",
                "job_id": 102,
                "job_state": ["PENDING"],
                "cpus": { "set": true, "infinite": false, "number": 1 },
                "tres_alloc_str": "",
                "tres_req_str": "cpu=1,mem=4G,node=1,billing=1"
            }
        ],
        "errors": []
    }"#;

    const SQUEUE_JSON_OLD: &str = r#"{
        "jobs": [
            {
                "account": "pi_y",
                "partition": "cpu-preempt",
                "user_name": "carol",
                "job_state": "COMPLETING",
                "cpus": 4,
                "tres_alloc_str": "cpu=4",
                "tres_req_str": "cpu=4"
            }
        ]
    }"#;

    #[test]
    fn parse_current_squeue_format() {
        let s = Snapshot::from_json(SQUEUE_JSON_NEW.as_bytes(), MAX_USERNAME_LENGTH).unwrap();
        assert_eq!(s.jobs.len(), 2);
        let alice = &s.jobs[0];
        assert_eq!(alice.account, "pi_x");
        assert_eq!(alice.partition, "gpu");
        assert_eq!(alice.user, "alice");
        assert_eq!(alice.state, JobState::Running);
        assert_eq!(alice.cpus, 8);
        assert_eq!(alice.tres_alloc.count("gres/gpu"), 2);

        let bob = &s.jobs[1];
        assert_eq!(bob.state, JobState::Pending);
        assert!(bob.tres_alloc.is_empty());
        assert_eq!(bob.authoritative_tres(), &bob.tres_req);
    }

    #[test]
    fn parse_older_squeue_format() {
        let s = Snapshot::from_json(SQUEUE_JSON_OLD.as_bytes(), MAX_USERNAME_LENGTH).unwrap();
        assert_eq!(s.jobs.len(), 1);
        assert_eq!(s.jobs[0].state, JobState::Completing);
        assert_eq!(s.jobs[0].cpus, 4);
    }

    #[test]
    fn malformed_snapshots() {
        let parse = |s: &str| Snapshot::from_json(s.as_bytes(), MAX_USERNAME_LENGTH);
        assert!(parse("not json").is_err());
        assert!(parse(r#"{"nojobs": []}"#).is_err());
        // missing user_name
        assert!(parse(
            r#"{"jobs": [{"account": "a", "partition": "p", "job_state": "RUNNING",
                "cpus": 1, "tres_alloc_str": "", "tres_req_str": ""}]}"#
        )
        .is_err());
        // unknown state
        assert!(parse(
            r#"{"jobs": [{"account": "a", "partition": "p", "user_name": "u", "job_state": "NAPPING",
                "cpus": 1, "tres_alloc_str": "", "tres_req_str": ""}]}"#
        )
        .is_err());
        // empty state list
        assert!(parse(
            r#"{"jobs": [{"account": "a", "partition": "p", "user_name": "u", "job_state": [],
                "cpus": 1, "tres_alloc_str": "", "tres_req_str": ""}]}"#
        )
        .is_err());
        // bad gpu count
        assert!(parse(
            r#"{"jobs": [{"account": "a", "partition": "p", "user_name": "u", "job_state": "RUNNING",
                "cpus": 1, "tres_alloc_str": "gres/gpu=x", "tres_req_str": ""}]}"#
        )
        .is_err());
    }

    #[test]
    fn username_length_is_enforced() {
        let json = |user: &str| {
            format!(
                r#"{{"jobs": [{{"account": "a", "partition": "p", "user_name": "{}",
                    "job_state": "RUNNING", "cpus": 1, "tres_alloc_str": "", "tres_req_str": ""}}]}}"#,
                user
            )
        };
        assert!(Snapshot::from_json(json(&"u".repeat(5)).as_bytes(), 5).is_ok());
        let err = Snapshot::from_json(json(&"u".repeat(6)).as_bytes(), 5).unwrap_err();
        assert_eq!(
            err.root_cause().downcast_ref::<ParseError>(),
            Some(&ParseError::UsernameTooLong {
                user: "uuuuuu".to_string(),
                max: 5
            })
        );
    }

    #[test]
    fn cache_fetches_once() {
        let cache = SnapshotCache::new(FakeSource::new(vec![job(
            "pi_x",
            "cpu",
            "alice",
            JobState::Running,
            4,
            "cpu=4",
            "",
        )]));
        assert!(!cache.is_populated());
        let first = cache.get().unwrap() as *const Snapshot;
        for _ in 0..5 {
            assert!(std::ptr::eq(first, cache.get().unwrap()));
        }
        assert!(cache.is_populated());
        assert_eq!(cache.source.fetches.get(), 1);
    }

    #[test]
    fn preseeded_cache_never_fetches() {
        let cache = SnapshotCache::with_snapshot(FakeSource::new(vec![]), Snapshot::new(vec![]));
        assert!(cache.get().unwrap().jobs.is_empty());
        assert_eq!(cache.source.fetches.get(), 0);
    }

    #[test]
    fn failed_fetch_propagates() {
        let cache = SnapshotCache::new(FailingSource);
        assert!(cache.get().is_err());
        assert!(!cache.is_populated());
    }

    #[test]
    fn squeue_failure_is_fatal() {
        let s = Squeue {
            program: "false".to_string(),
            timeout: Duration::from_secs(5),
            max_username_length: MAX_USERNAME_LENGTH,
        };
        assert!(s.fetch().is_err());
    }
}
