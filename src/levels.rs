use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Mapping from level name to numeric priority.
///
/// Lower numbers are more severe (RFC5424 style). The table is owned by the
/// producer and shared with transports behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityTable {
    priorities: BTreeMap<String, u32>,
}

impl SeverityTable {
    /// Build a table from names listed most severe first.
    pub fn from_ordered<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        names
            .into_iter()
            .enumerate()
            .map(|(i, name)| (name.into(), i as u32))
            .collect()
    }

    /// Levels used by the Node.js `winston` family (`npm` preset).
    pub fn npm() -> Self {
        Self::from_ordered(["error", "warn", "info", "http", "verbose", "debug", "silly"])
    }

    /// RFC5424 syslog levels.
    pub fn syslog() -> Self {
        Self::from_ordered([
            "emerg", "alert", "crit", "error", "warning", "notice", "info", "debug",
        ])
    }

    /// The five `tracing` levels, lowercased.
    pub fn tracing() -> Self {
        Self::from_ordered(["error", "warn", "info", "debug", "trace"])
    }

    pub fn priority(&self, name: &str) -> Option<u32> {
        self.priorities.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.priorities.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.priorities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.priorities.is_empty()
    }

    /// Whether a record at `level` passes a transport whose threshold is
    /// `threshold`. A name missing from the table never passes.
    pub fn permits(&self, threshold: &str, level: &str) -> bool {
        match (self.priority(threshold), self.priority(level)) {
            (Some(max), Some(p)) => max >= p,
            _ => false,
        }
    }

    /// Level names ordered from most to least severe.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<(&str, u32)> =
            self.priorities.iter().map(|(k, v)| (k.as_str(), *v)).collect();
        names.sort_by_key(|(name, p)| (*p, *name));
        names.into_iter().map(|(name, _)| name).collect()
    }
}

impl<S: Into<String>> FromIterator<(S, u32)> for SeverityTable {
    fn from_iter<I: IntoIterator<Item = (S, u32)>>(iter: I) -> Self {
        SeverityTable {
            priorities: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}
