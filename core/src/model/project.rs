use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::proxy::ProxyMeta;

/// A named, slugged scan configuration that can be run repeatedly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Stable unique identifier derived from `name`.
    pub slug: String,
    pub name: String,
    /// Ordered, deduplicated at submission time.
    pub targets: Vec<String>,
    /// Proxy metadata only; credentials are never persisted.
    pub proxy: ProxyMeta,
    /// True while a run is active. Rejects modify/delete while set.
    pub locked: bool,
    pub created_at: DateTime<Utc>,
}

impl Project {
    pub fn new(name: &str, targets: Vec<String>, proxy: ProxyMeta) -> Self {
        Self {
            slug: slugify(name),
            name: name.to_string(),
            targets,
            proxy,
            locked: false,
            created_at: Utc::now(),
        }
    }
}

/// Derive a stable slug from a display name: lowercase alphanumerics with
/// single hyphens between word runs.
pub fn slugify(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            out.push('-');
            last_hyphen = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Normalize a submitted target list: lowercase, trim, drop empties,
/// deduplicate preserving first-seen order.
pub fn normalize_targets(raw: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for t in raw {
        let t = t.trim().to_ascii_lowercase();
        if t.is_empty() {
            continue;
        }
        if seen.insert(t.clone()) {
            out.push(t);
        }
    }
    out
}
