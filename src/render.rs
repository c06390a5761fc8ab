//! Text output for account usage reports.
use crate::report::{AccountUsageReport, NetUsage};
use comfy_table::{presets, Attribute, Cell, CellAlignment, Table};
use std::fmt::Write;

pub const COLUMNS: [&'static str; 5] = [
    "username",
    "CPUs allocated",
    "GPUs allocated",
    "CPUs pending",
    "GPUs pending",
];

pub const TOTAL_LABEL: &'static str = "total";

fn usage_row(label: &str, u: &NetUsage) -> [Cell; 5] {
    let count = |n: u64| Cell::new(n).set_alignment(CellAlignment::Right);
    [
        label.into(),
        count(u.allocated.cpus),
        count(u.allocated.gpus),
        count(u.pending.cpus),
        count(u.pending.gpus),
    ]
}

/// Borderless table of the report, one row per user (by name) and the total last.
///
/// Styling (the underlined header) is only emitted if `styled` is set and stdout is a terminal.
pub fn usage_table(report: &AccountUsageReport, styled: bool) -> Table {
    let mut t = Table::new();
    t.load_preset(presets::NOTHING);
    if !styled {
        t.force_no_tty();
    }
    t.set_header(COLUMNS.map(|c| {
        Cell::new(c)
            .set_alignment(CellAlignment::Center)
            .add_attribute(Attribute::Underlined)
    }));
    for (user, u) in &report.users {
        t.add_row(usage_row(user, u));
    }
    t.add_row(usage_row(TOTAL_LABEL, &report.total));
    t
}

fn header_line(account: &str) -> String {
    format!("Current resource allocation under account \"{}\":", account)
}

/// Heading and table for one account, or the heading and `(none)` if it has no jobs.
pub fn render_report(report: &AccountUsageReport, styled: bool) -> String {
    let mut s = header_line(&report.account);
    if report.is_empty() {
        s.push_str(" (none)\n\n");
    } else {
        let _ = write!(s, "\n{}\n\n", usage_table(report, styled));
    }
    s
}

/// Closing note explaining which partitions the numbers leave out.
pub fn disclaimer<S: AsRef<str>>(ignore_partitions: &[S], default_partitions: bool) -> String {
    let excluded = if default_partitions {
        "preempt queues".to_string()
    } else {
        let names: Vec<&str> = ignore_partitions.iter().map(|p| p.as_ref()).collect();
        format!("the {} partitions", names.join(", "))
    };
    format!(
        "Note: CPU count and GPU count do not include those in {}.\n\
         This means that the total applies directly to your account based CPU and GPU limits.\n\n",
        excluded
    )
}

/// Short form: heading plus the net allocated CPU and GPU totals.
pub fn render_total_summary(report: &AccountUsageReport) -> String {
    let mut s = header_line(&report.account);
    if report.is_empty() {
        s.push_str(" (none)\n\n");
    } else {
        let _ = write!(
            s,
            "\n* CPU count: {}\n* GPU count: {}\n\n",
            report.total.allocated.cpus, report.total.allocated.gpus
        );
    }
    s
}

pub fn total_summary_hint() -> &'static str {
    "use the `slurm-account-usage` command for more info.\n\n"
}
