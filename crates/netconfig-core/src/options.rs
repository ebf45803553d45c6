//! Option layers and their three-tier precedence.
//!
//! Each tier is an `OptionLayer` whose fields are all optional. Resolution
//! takes, per field, the per-call value if set, else the process-wide value,
//! else the compiled default.

use serde::{Deserialize, Deserializer, Serialize};

/// One tier of change options. `None` means "not set at this tier".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLayer {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replace: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_verify: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debug: Option<bool>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_directive"
    )]
    pub commit_in: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_directive"
    )]
    pub commit_at: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_directive"
    )]
    pub revert_in: Option<String>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_directive"
    )]
    pub revert_at: Option<String>,
}

impl OptionLayer {
    /// The compiled defaults: commit immediately, merge, verify, no dry run.
    pub fn compiled() -> Self {
        Self {
            test: Some(false),
            commit: Some(true),
            replace: Some(false),
            skip_verify: Some(false),
            debug: Some(false),
            commit_in: None,
            commit_at: None,
            revert_in: None,
            revert_at: None,
        }
    }

    /// Overlay `self` on top of `lower`: fields set in `self` win.
    pub fn over(&self, lower: &OptionLayer) -> OptionLayer {
        OptionLayer {
            test: self.test.or(lower.test),
            commit: self.commit.or(lower.commit),
            replace: self.replace.or(lower.replace),
            skip_verify: self.skip_verify.or(lower.skip_verify),
            debug: self.debug.or(lower.debug),
            commit_in: self.commit_in.clone().or_else(|| lower.commit_in.clone()),
            commit_at: self.commit_at.clone().or_else(|| lower.commit_at.clone()),
            revert_in: self.revert_in.clone().or_else(|| lower.revert_in.clone()),
            revert_at: self.revert_at.clone().or_else(|| lower.revert_at.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == OptionLayer::default()
    }
}

/// Final option values after precedence has been applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedOptions {
    pub test: bool,
    pub commit: bool,
    pub replace: bool,
    pub skip_verify: bool,
    pub debug: bool,
    pub commit_in: Option<String>,
    pub commit_at: Option<String>,
    pub revert_in: Option<String>,
    pub revert_at: Option<String>,
}

/// Merge the three tiers: `call` > `process` > `compiled`.
pub fn resolve(
    call: &OptionLayer,
    process: &OptionLayer,
    compiled: &OptionLayer,
) -> ResolvedOptions {
    let merged = call.over(&process.over(compiled));
    ResolvedOptions {
        test: merged.test.unwrap_or(false),
        commit: merged.commit.unwrap_or(true),
        replace: merged.replace.unwrap_or(false),
        skip_verify: merged.skip_verify.unwrap_or(false),
        debug: merged.debug.unwrap_or(false),
        commit_in: merged.commit_in,
        commit_at: merged.commit_at,
        revert_in: merged.revert_in,
        revert_at: merged.revert_at,
    }
}

// ---------------------------------------------------------------------------
// Serde helper: directives may be written as bare integers (minutes)
// ---------------------------------------------------------------------------

fn deserialize_directive<'de, D>(d: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Minutes(u64),
    }

    let raw: Option<Raw> = Option::deserialize(d)?;
    Ok(raw.map(|r| match r {
        Raw::Text(s) => s,
        Raw::Minutes(m) => m.to_string(),
    }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
