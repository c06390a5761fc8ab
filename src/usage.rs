use crate::resources::{extract, Usage};
use crate::snapshot::JobRecord;
use crate::*;

/// Per-user CPU/GPU totals over a set of jobs, with the grand total kept separately.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UsageTotals {
    /// Only users with at least one job appear here
    pub users: Map<String, Usage>,
    pub total: Usage,
}

impl UsageTotals {
    /// Totals for `user`, zero if they had no jobs.
    pub fn get(&self, user: &str) -> Usage {
        self.users.get(user).copied().unwrap_or_default()
    }
}

pub fn aggregate<'a, I>(jobs: I) -> UsageTotals
where
    I: IntoIterator<Item = &'a JobRecord>,
{
    let mut totals = UsageTotals::default();
    for job in jobs {
        let usage = extract(job);
        *totals.users.entry(job.user.clone()).or_default() += usage;
        totals.total += usage;
    }
    debug_assert_eq!(totals.total, totals.users.values().copied().sum::<Usage>());
    totals
}
