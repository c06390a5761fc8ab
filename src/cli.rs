//! Command line shared by the binaries, and the run they drive.
use crate::groups::account_groups;
use crate::report::{account_reports, AccountUsageReport};
use crate::snapshot::{SnapshotCache, Squeue};
use crate::*;
use clap::Args;

#[derive(Args, Clone, Debug, Default)]
pub struct Options {
    /// Report on this account instead of the account groups you belong to.  May be repeated.
    #[clap(short = 'A', long = "account", value_name = "ACCOUNT")]
    pub accounts: Vec<String>,

    /// Leave jobs in this partition out of the totals (default: cpu-preempt, gpu-preempt).
    /// May be repeated.
    #[clap(long = "ignore-partition", value_name = "PARTITION")]
    pub ignore_partitions: Vec<String>,

    /// Location of the `squeue` executable
    #[clap(long, value_name = "PATH")]
    pub squeue: Option<String>,

    /// Print debug logging to stderr
    #[clap(short, long)]
    pub verbose: bool,
}

impl Options {
    /// Command line options take precedence over the config file.
    pub fn apply_to(&self, settings: &mut Settings) {
        if !self.ignore_partitions.is_empty() {
            settings.ignore_partitions = self.ignore_partitions.clone();
        }
        if let Some(squeue) = &self.squeue {
            settings.squeue = squeue.clone();
        }
    }
}

/// Everything a binary needs to print its output.
pub struct Run {
    pub settings: Settings,
    pub reports: Vec<AccountUsageReport>,
}

/// Resolve settings and account groups, take the snapshot and build one report per group.
pub fn run(options: &Options) -> Result<Run> {
    let mut settings = Settings::load()?;
    options.apply_to(&mut settings);
    tracing::debug!(?settings, "resolved settings");

    let groups = if options.accounts.is_empty() {
        account_groups(
            &settings.groups,
            &settings.group_prefix,
            settings.groups_timeout(),
        )?
    } else {
        options.accounts.clone()
    };
    if groups.is_empty() {
        tracing::warn!(
            prefix = %settings.group_prefix,
            "you are not a member of any account group"
        );
    }

    let snapshots = SnapshotCache::new(Squeue::from_settings(&settings));
    let reports = account_reports(
        groups.as_slice(),
        &snapshots,
        settings.ignore_partitions.as_slice(),
    )?;
    Ok(Run { settings, reports })
}
