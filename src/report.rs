//! Net per-user usage of an account group, with ignored partitions taken out.
use crate::filter::JobFilter;
use crate::resources::Usage;
use crate::snapshot::{Snapshot, SnapshotCache, SnapshotSource};
use crate::usage::{aggregate, UsageTotals};
use crate::*;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetUsage {
    pub allocated: Usage,
    pub pending: Usage,
}

impl NetUsage {
    pub const fn new(
        cpus_allocated: u64,
        gpus_allocated: u64,
        cpus_pending: u64,
        gpus_pending: u64,
    ) -> Self {
        NetUsage {
            allocated: Usage::new(cpus_allocated, gpus_allocated),
            pending: Usage::new(cpus_pending, gpus_pending),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountUsageReport {
    pub account: String,
    /// Sorted by username
    pub users: Map<String, NetUsage>,
    pub total: NetUsage,
}

impl AccountUsageReport {
    /// True if the account has no running or pending jobs at all.
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// `all - ignored`, which can't underflow as long as the ignored jobs are a subset of `all`.
fn subtract(all: Usage, ignored: Usage, account: &str, user: &str, what: &str) -> Result<Usage> {
    all.checked_sub(ignored).ok_or_else(|| {
        anyhow!(
            "{} usage of {:?} in ignored partitions exceeds their overall usage under {:?}: {:?} > {:?}",
            what,
            user,
            account,
            ignored,
            all
        )
    })
}

/// Build the report for one account group from a single snapshot.
pub fn compose<S: AsRef<str>>(
    snapshot: &Snapshot,
    account: &str,
    ignore_partitions: &[S],
) -> Result<AccountUsageReport> {
    let totals = |ignored: bool, state: JobState| -> UsageTotals {
        let mut f = JobFilter::new().accounts([account]).states([state]);
        if ignored {
            f = f.partitions(ignore_partitions);
        }
        aggregate(f.apply(snapshot))
    };

    let running = totals(false, JobState::Running);
    let pending = totals(false, JobState::Pending);
    let running_ignored = totals(true, JobState::Running);
    let pending_ignored = totals(true, JobState::Pending);

    let mut users = Map::new();
    for user in running.users.keys().chain(pending.users.keys()) {
        if users.contains_key(user) {
            continue;
        }
        let net = NetUsage {
            allocated: subtract(
                running.get(user),
                running_ignored.get(user),
                account,
                user,
                "running",
            )?,
            pending: subtract(
                pending.get(user),
                pending_ignored.get(user),
                account,
                user,
                "pending",
            )?,
        };
        users.insert(user.clone(), net);
    }

    let total = NetUsage {
        allocated: subtract(running.total, running_ignored.total, account, "total", "running")?,
        pending: subtract(pending.total, pending_ignored.total, account, "total", "pending")?,
    };
    debug_assert_eq!(total.allocated, users.values().map(|u| u.allocated).sum::<Usage>());
    debug_assert_eq!(total.pending, users.values().map(|u| u.pending).sum::<Usage>());

    tracing::debug!(account, users = users.len(), ?total, "composed account usage");
    Ok(AccountUsageReport {
        account: account.to_string(),
        users,
        total,
    })
}

/// Reports for each account group, all computed from the same cached snapshot.
pub fn account_reports<G, S, P>(
    groups: &[G],
    snapshots: &SnapshotCache<S>,
    ignore_partitions: &[P],
) -> Result<Vec<AccountUsageReport>>
where
    G: AsRef<str>,
    S: SnapshotSource,
    P: AsRef<str>,
{
    groups
        .iter()
        .map(|g| compose(snapshots.get()?, g.as_ref(), ignore_partitions))
        .collect()
}
