//! Helm repository index and version resolution
//!
//! Index entries are published by third parties and their version strings are
//! not always strict semver (`v1.2`, `1.14`). Versions are coerced before
//! matching; entries that still fail to parse never become candidates.

use semver::{Version, VersionReq};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use url::Url;

use crate::error::{RepoError, Result};

/// Repository index (`index.yaml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRepoIndex {
    #[serde(default)]
    pub api_version: String,

    /// Releases by chart name
    #[serde(default)]
    pub entries: HashMap<String, Vec<ChartRepoRelease>>,
}

/// One published release of a chart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartRepoRelease {
    #[serde(default)]
    pub name: String,

    pub version: String,

    /// Download URLs, absolute or relative to the index
    #[serde(default)]
    pub urls: Vec<String>,

    /// Chart API version (v1 or v2)
    #[serde(default)]
    pub api_version: Option<String>,

    #[serde(default)]
    pub app_version: Option<String>,

    #[serde(default)]
    pub digest: Option<String>,
}

impl ChartRepoIndex {
    /// Parse index from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| RepoError::IndexParseError {
            message: e.to_string(),
        })
    }

    /// Parse index from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let yaml = std::str::from_utf8(bytes).map_err(|e| RepoError::IndexParseError {
            message: format!("Invalid UTF-8: {}", e),
        })?;
        Self::from_yaml(yaml)
    }

    /// Select the highest release of `name` satisfying `constraint`
    ///
    /// When `api_version` is set, only entries declaring that chart API
    /// version are considered. `index_url` is only used in error messages.
    pub fn resolve(
        &self,
        index_url: &str,
        name: &str,
        api_version: Option<&str>,
        constraint: &VersionConstraint,
    ) -> Result<ResolvedRelease> {
        let releases = self
            .entries
            .get(name)
            .ok_or_else(|| RepoError::ChartNotInIndex {
                name: name.to_string(),
                url: index_url.to_string(),
            })?;

        let candidates: Vec<(Version, &ChartRepoRelease)> = releases
            .iter()
            .filter(|r| api_version.is_none_or(|wanted| r.api_version.as_deref() == Some(wanted)))
            .filter_map(|r| coerce_version(&r.version).map(|v| (v, r)))
            .collect();

        let best = candidates
            .iter()
            .filter(|(v, _)| constraint.matches(v))
            .max_by(|(a, _), (b, _)| a.cmp(b));

        let Some((version, release)) = best else {
            return Err(RepoError::VersionResolution {
                name: name.to_string(),
                constraint: constraint.to_string(),
                available: candidates.iter().map(|(v, _)| v.to_string()).collect(),
            });
        };

        Ok(ResolvedRelease {
            version: version.clone(),
            release: (*release).clone(),
        })
    }
}

/// Outcome of a successful resolution
#[derive(Debug, Clone)]
pub struct ResolvedRelease {
    /// Coerced version used for matching
    pub version: Version,

    /// The index entry as published
    pub release: ChartRepoRelease,
}

impl ResolvedRelease {
    /// Absolute download URL of the release
    ///
    /// Relative URLs are resolved against the index URL.
    pub fn download_url(&self, index_url: &str) -> Result<Url> {
        let first = self
            .release
            .urls
            .first()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| RepoError::EmptyReleaseUrl {
                name: self.release.name.clone(),
                version: self.release.version.clone(),
            })?;

        let base = Url::parse(index_url).map_err(|e| RepoError::InvalidUrl {
            url: index_url.to_string(),
            reason: e.to_string(),
        })?;

        base.join(first).map_err(|e| RepoError::InvalidUrl {
            url: first.clone(),
            reason: e.to_string(),
        })
    }
}

/// URL of the index document of a repository
///
/// Accepts either the index URL itself or the repository base URL.
pub fn index_url(remote_repo_url: &str) -> String {
    let trimmed = remote_repo_url.trim();
    let lower = trimmed.to_ascii_lowercase();
    if lower.ends_with(".yaml") || lower.ends_with(".yml") {
        trimmed.to_string()
    } else {
        format!("{}/index.yaml", trimmed.trim_end_matches('/'))
    }
}

/// Parse a version leniently
///
/// Strict semver is tried first. Otherwise a leading `v` or `=` is dropped and
/// the leading `major[.minor[.patch]]` numbers are taken, padding missing
/// components with zero. Returns `None` when no leading number exists.
pub fn coerce_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let stripped = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('='))
        .unwrap_or(trimmed);

    if let Ok(version) = Version::parse(stripped) {
        return Some(version);
    }

    let mut numbers = [0u64; 3];
    let mut found = 0;
    for part in stripped.splitn(4, '.').take(3) {
        let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
        if digits.is_empty() {
            break;
        }
        numbers[found] = digits.parse().ok()?;
        found += 1;
        if digits.len() != part.len() {
            break;
        }
    }

    if found == 0 {
        return None;
    }

    Some(Version::new(numbers[0], numbers[1], numbers[2]))
}

/// A version range with optional `||` alternatives
///
/// Accepts Cargo-style requirements (`^1.2, <1.5`) as well as the Helm/npm
/// habits of space-separated comparators (`>=1.0.0 <2.0.0`), hyphen ranges
/// (`1.0.0 - 1.4.0`) and bare exact versions (`1.2.3`).
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionConstraint {
    pub fn parse(raw: &str) -> Result<Self> {
        let alternatives = raw
            .split("||")
            .map(|alt| {
                let normalized = normalize_comparators(alt);
                VersionReq::parse(&normalized).map_err(|e| RepoError::InvalidConstraint {
                    constraint: raw.to_string(),
                    message: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            raw: raw.trim().to_string(),
            alternatives,
        })
    }

    /// Whether any alternative accepts `version`
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

const OPERATORS: [&str; 7] = [">=", "<=", ">", "<", "=", "~", "^"];

fn normalize_comparators(alt: &str) -> String {
    let tokens: Vec<&str> = alt
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return "*".to_string();
    }

    // `a - b` is an inclusive range
    if let [low, "-", high] = tokens.as_slice() {
        return format!(">={}, <={}", strip_v(low), strip_v(high));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;

    for token in tokens {
        if OPERATORS.contains(&token) {
            pending_op = Some(token);
            continue;
        }

        let comparator = match pending_op.take() {
            Some(op) => format!("{}{}", op, strip_v(token)),
            None => exact_if_bare(token),
        };
        comparators.push(comparator);
    }

    comparators.join(", ")
}

/// Bare full versions are exact pins, as in Helm
fn exact_if_bare(token: &str) -> String {
    let op_len = token
        .find(|c: char| !matches!(c, '>' | '<' | '=' | '~' | '^'))
        .unwrap_or(token.len());
    let (op, version) = token.split_at(op_len);
    let version = strip_v(version);

    let is_wildcard = version.contains(['*', 'x', 'X']);
    if op.is_empty() && !is_wildcard && version.starts_with(|c: char| c.is_ascii_digit()) {
        format!("={}", version)
    } else {
        format!("{}{}", op, version)
    }
}

fn strip_v(version: &str) -> &str {
    version.strip_prefix('v').unwrap_or(version)
}
