//! Trackable-resource (TRES) strings and per-job resource extraction.
use crate::*;
use crate::snapshot::JobRecord;
use serde::Deserialize;
use std::ops::{Add, AddAssign};

/// TRES key under which Slurm reports the total number of GPUs.
///
/// Typed entries (`gres/gpu:a100=2`) are reported alongside this total and are deliberately not
/// matched.
pub const GPU_KEY: &'static str = "gres/gpu";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TresValue {
    Count(u64),
    /// Anything that isn't a plain count, e.g. memory (`4G`)
    Other(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TresItem {
    pub key: String,
    pub value: TresValue,
}

/// A parsed `key=value,key=value` resource string, such as `cpu=4,mem=16G,node=1,gres/gpu=2`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Tres {
    items: Vec<TresItem>,
}

impl Tres {
    pub fn parse(s: &str) -> ParseResult<Self> {
        let mut items = Vec::new();
        for token in s.split(',').filter(|t| !t.is_empty()) {
            // A bare token without `=` is kept with an empty value.
            let (key, value) = token.split_once('=').unwrap_or((token, ""));
            let value = match value.parse() {
                Ok(n) => TresValue::Count(n),
                Err(_) if key == GPU_KEY => return Err(ParseError::ResourceCount(token.to_string())),
                Err(_) => TresValue::Other(value.to_string()),
            };
            items.push(TresItem {
                key: key.to_string(),
                value,
            });
        }
        Ok(Tres { items })
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[TresItem] {
        &self.items
    }

    /// Sum of all counts recorded under exactly `key`.
    pub fn count(&self, key: &str) -> u64 {
        self.items
            .iter()
            .filter(|i| i.key == key)
            .map(|i| match i.value {
                TresValue::Count(n) => n,
                TresValue::Other(_) => 0,
            })
            .sum()
    }
}

impl<'de> Deserialize<'de> for Tres {
    fn deserialize<D>(deserializer: D) -> StdResult<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Tres::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// CPUs and GPUs held (or requested) by one or more jobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    pub cpus: u64,
    pub gpus: u64,
}

impl Usage {
    pub const fn new(cpus: u64, gpus: u64) -> Self {
        Usage { cpus, gpus }
    }

    pub fn checked_sub(self, rhs: Usage) -> Option<Usage> {
        Some(Usage {
            cpus: self.cpus.checked_sub(rhs.cpus)?,
            gpus: self.gpus.checked_sub(rhs.gpus)?,
        })
    }
}

impl Add for Usage {
    type Output = Usage;

    fn add(self, rhs: Usage) -> Usage {
        Usage {
            cpus: self.cpus + rhs.cpus,
            gpus: self.gpus + rhs.gpus,
        }
    }
}

impl AddAssign for Usage {
    fn add_assign(&mut self, rhs: Usage) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for Usage {
    fn sum<I: Iterator<Item = Usage>>(iter: I) -> Usage {
        iter.fold(Usage::default(), Add::add)
    }
}

/// CPU and GPU count of a single job.
///
/// Pending jobs have nothing allocated yet, so their GPUs are taken from the requested resources.
pub fn extract(job: &JobRecord) -> Usage {
    Usage {
        cpus: job.cpus,
        gpus: job.authoritative_tres().count(GPU_KEY),
    }
}
