use serde::Deserialize;
use std::{path::PathBuf, time::Duration};
use crate::*;

pub const DEFAULT_IGNORE_PARTITIONS: &'static [&'static str] = &["cpu-preempt", "gpu-preempt"];
pub const DEFAULT_GROUP_PREFIX: &'static str = "pi_";
pub const MAX_USERNAME_LENGTH: usize = 100;

/// Runtime settings, built from defaults, the optional config file and then the command line.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// `squeue` executable used to take the job snapshot
    pub squeue: String,
    /// `groups` executable used to list the invoking user's groups
    pub groups: String,
    /// Only groups starting with this prefix are treated as account groups
    pub group_prefix: String,
    /// Jobs in these partitions are left out of the reported usage
    pub ignore_partitions: Vec<String>,
    pub squeue_timeout_secs: u64,
    pub groups_timeout_secs: u64,
    pub max_username_length: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            squeue: "squeue".to_string(),
            groups: "/usr/bin/groups".to_string(),
            group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
            ignore_partitions: DEFAULT_IGNORE_PARTITIONS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            squeue_timeout_secs: 10,
            groups_timeout_secs: 1,
            max_username_length: MAX_USERNAME_LENGTH,
        }
    }
}

impl Settings {
    /// Load settings from the user's config file, falling back to defaults if there is none.
    pub fn load() -> Result<Self> {
        match config_file() {
            Some(p) if p.exists() => Settings::read(&p),
            _ => Ok(Settings::default()),
        }
    }

    pub fn read(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings: Settings = read_json(path)?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(settings)
    }

    pub fn squeue_timeout(&self) -> Duration {
        Duration::from_secs(self.squeue_timeout_secs)
    }

    pub fn groups_timeout(&self) -> Duration {
        Duration::from_secs(self.groups_timeout_secs)
    }

    /// True if the ignored partitions are the built-in preempt queues.
    pub fn ignores_default_partitions(&self) -> bool {
        self.ignore_partitions
            .iter()
            .map(String::as_str)
            .eq(DEFAULT_IGNORE_PARTITIONS.iter().copied())
    }
}

pub fn config_directory() -> Result<PathBuf> {
    let mut p = dirs::config_dir()
        .ok_or_else(|| anyhow!("unable to determine user config directory"))?;
    p.push("slurm-account-usage");
    Ok(p)
}

fn config_file() -> Option<PathBuf> {
    let mut p = config_directory().ok()?;
    p.push("config.json");
    Some(p)
}

pub fn read_json<T, P>(path: P) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
        P: AsRef<std::path::Path>,
{
    let path = path.as_ref();
    let f = std::fs::File::open(path)
        .with_context(|| format!("failed to read {:?}", path))?;
    serde_json::from_reader(std::io::BufReader::new(f))
        .with_context(|| format!("failed to parse {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_config(dir: &Path, contents: &str) -> PathBuf {
        let p = dir.join("config.json");
        std::fs::write(&p, contents).unwrap();
        p
    }

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.ignore_partitions, vec!["cpu-preempt", "gpu-preempt"]);
        assert_eq!(s.group_prefix, "pi_");
        assert_eq!(s.squeue_timeout(), Duration::from_secs(10));
        assert_eq!(s.groups_timeout(), Duration::from_secs(1));
        assert_eq!(s.max_username_length, 100);
        assert!(s.ignores_default_partitions());
    }

    #[test]
    fn partial_config_file() {
        let dir = TempDir::new().unwrap();
        let p = write_config(
            dir.path(),
            r#"{ "ignore_partitions": ["scavenge"], "squeue_timeout_secs": 30 }"#,
        );
        let s = Settings::read(&p).unwrap();

        assert_eq!(s.ignore_partitions, vec!["scavenge"]);
        assert_eq!(s.squeue_timeout(), Duration::from_secs(30));
        assert_eq!(s.squeue, "squeue");
        assert_eq!(s.group_prefix, "pi_");
        assert!(!s.ignores_default_partitions());
    }

    #[test]
    fn unknown_field_is_rejected() {
        let dir = TempDir::new().unwrap();
        let p = write_config(dir.path(), r#"{ "ignore_partition": ["scavenge"] }"#);
        assert!(Settings::read(&p).is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let p = write_config(dir.path(), "{ ignore_partitions = scavenge }");
        let err = Settings::read(&p).unwrap_err();
        assert!(format!("{:#}", err).contains("failed to parse"), "{:#}", err);
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(Settings::read("/nonexistent/slurm-account-usage/config.json").is_err());
    }
}
