use crate::snapshot::{JobRecord, Snapshot};
use crate::*;

/// Selects jobs by account, partition and state.
///
/// Accounts and partitions match exactly but ignore case.  A dimension left as `None` matches
/// everything, and the dimensions are combined with AND.
#[derive(Clone, Debug, Default)]
pub struct JobFilter {
    accounts: Option<Set<String>>,
    partitions: Option<Set<String>>,
    states: Option<Vec<JobState>>,
}

fn lowercase_set<I, S>(values: I) -> Set<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| v.as_ref().to_lowercase())
        .collect()
}

impl JobFilter {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn accounts<I, S>(mut self, accounts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.accounts = Some(lowercase_set(accounts));
        self
    }

    pub fn partitions<I, S>(mut self, partitions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.partitions = Some(lowercase_set(partitions));
        self
    }

    pub fn states(mut self, states: impl IntoIterator<Item = JobState>) -> Self {
        self.states = Some(states.into_iter().collect());
        self
    }

    pub fn matches(&self, job: &JobRecord) -> bool {
        fn in_set(set: &Option<Set<String>>, value: &str) -> bool {
            set.as_ref()
                .map_or(true, |s| s.contains(&value.to_lowercase()))
        }

        in_set(&self.accounts, &job.account)
            && in_set(&self.partitions, &job.partition)
            && self
                .states
                .as_ref()
                .map_or(true, |s| s.contains(&job.state))
    }

    /// Matching jobs, in snapshot order.
    pub fn apply<'a>(&self, snapshot: &'a Snapshot) -> Vec<&'a JobRecord> {
        snapshot.jobs.iter().filter(|j| self.matches(j)).collect()
    }
}
