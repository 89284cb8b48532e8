//! Hierarchical resource identifiers
//!
//! A resource identifier (or cost scope) is a slash-delimited path of alternating
//! segment-name / segment-value pairs:
//!
//! ```text
//! /subscriptions/1/resourceGroups/g/providers/Microsoft.Web/sites/siteA
//!  └── name ──┘ └┘ └─── name ───┘ └┘ └─ name ─┘ └── value ──┘ └name┘ └value┘
//! ```

use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceId {
    raw: String,
    segments: Vec<String>,
}

impl ResourceId {
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the segment following the segment-name `name`.
    ///
    /// Only name positions (even indices) are considered, so a resource that happens
    /// to be called like a segment name is never mistaken for one. Names are compared
    /// ASCII case-insensitively because the resource manager does not normalize the
    /// casing of ids it hands out (`resourceGroups` vs `resourcegroups`).
    ///
    /// Returns `None` if the name is absent or is the final segment.
    pub fn value_of(&self, name: &str) -> Option<&str> {
        self.segments
            .iter()
            .enumerate()
            .step_by(2)
            .find(|(_, segment)| segment.eq_ignore_ascii_case(name))
            .and_then(|(idx, _)| self.segments.get(idx + 1))
            .map(String::as_str)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Splits a comma-separated identifier list as sent by callers.
///
/// Each entry is trimmed and may be wrapped in single quotes. Empty entries are dropped.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .map(|entry| {
            entry
                .strip_prefix('\'')
                .and_then(|e| e.strip_suffix('\''))
                .unwrap_or(entry)
                .trim()
        })
        .filter(|entry| !entry.is_empty())
        .map(str::to_string)
        .collect()
}
