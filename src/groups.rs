use crate::command::output_with_timeout;
use crate::*;
use std::{process::Command, time::Duration};

/// Names in the whitespace-separated output of `groups` that start with `prefix`, in order and
/// without duplicates.
pub fn parse_groups(output: &str, prefix: &str) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for g in output.split_whitespace().filter(|g| g.starts_with(prefix)) {
        if !groups.iter().any(|x| x == g) {
            groups.push(g.to_string());
        }
    }
    groups
}

/// Account groups of the invoking user, as reported by `program` (normally `groups`).
pub fn account_groups(program: &str, prefix: &str, timeout: Duration) -> Result<Vec<String>> {
    let output = output_with_timeout(Command::new(program), timeout)
        .context("failed to list the current user's groups")?;
    let output = String::from_utf8(output).context("groups output is not valid UTF-8")?;
    let groups = parse_groups(&output, prefix);
    tracing::debug!(?groups, prefix, "found account groups");
    Ok(groups)
}
