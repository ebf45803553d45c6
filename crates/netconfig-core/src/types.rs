use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{ErrorKind, NetconfigError};
use crate::options::OptionLayer;

pub const MSG_ALREADY_CONFIGURED: &str = "Already configured.";
pub const MSG_TEST_DISCARDED: &str = "Testing mode: Configuration discarded.";
pub const MSG_CHANGED: &str = "Configuration changed!";
pub const MSG_STAGED: &str = "Configuration loaded, not committed.";

// ---------------------------------------------------------------------------
// ChangeRequest
// ---------------------------------------------------------------------------

/// Input to an apply operation; also the declarative change description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    /// Local path, remote URL, or label for an inline source.
    #[serde(alias = "template_name")]
    pub template_ref: String,
    /// Inline template body. When set, `template_ref` is a label only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_source: Option<String>,
    /// Expected sha256 of the template body (`sha256:<hex>` or `<hex>`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_hash: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: BTreeMap<String, serde_json::Value>,
    /// Variables used when `variables` does not bind the same name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub defaults: BTreeMap<String, serde_json::Value>,
    #[serde(flatten)]
    pub options: OptionLayer,
}

impl ChangeRequest {
    pub fn new(template_ref: impl Into<String>) -> Self {
        Self {
            template_ref: template_ref.into(),
            ..Default::default()
        }
    }

    pub fn inline(label: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            template_ref: label.into(),
            template_source: Some(source.into()),
            ..Default::default()
        }
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    pub fn with_options(mut self, options: OptionLayer) -> Self {
        self.options = options;
        self
    }

    /// `defaults` overlaid by `variables`.
    pub fn render_context(&self) -> BTreeMap<String, serde_json::Value> {
        let mut ctx = self.defaults.clone();
        ctx.extend(self.variables.iter().map(|(k, v)| (k.clone(), v.clone())));
        ctx
    }
}

// ---------------------------------------------------------------------------
// OutcomeRecord
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Changes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
}

/// Uniform result of apply, cancel, and confirm.
///
/// `succeeded` is tri-state: `None` means dry run or not yet determined.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeRecord {
    #[serde(rename = "result")]
    pub succeeded: Option<bool>,
    #[serde(rename = "comment")]
    pub message: String,
    pub changes: Changes,
    #[serde(rename = "already_configured")]
    pub already_applied: bool,
    #[serde(
        rename = "loaded_config",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub rendered_config: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
}

impl OutcomeRecord {
    pub fn already_applied() -> Self {
        Self {
            succeeded: Some(true),
            message: MSG_ALREADY_CONFIGURED.to_string(),
            already_applied: true,
            ..Default::default()
        }
    }

    pub fn dry_run(diff: String) -> Self {
        Self {
            succeeded: None,
            message: MSG_TEST_DISCARDED.to_string(),
            changes: Changes { diff: Some(diff) },
            ..Default::default()
        }
    }

    pub fn committed(diff: String) -> Self {
        Self {
            succeeded: Some(true),
            message: MSG_CHANGED.to_string(),
            changes: Changes { diff: Some(diff) },
            ..Default::default()
        }
    }

    pub fn staged(diff: String) -> Self {
        Self {
            succeeded: Some(true),
            message: MSG_STAGED.to_string(),
            changes: Changes { diff: Some(diff) },
            ..Default::default()
        }
    }

    /// Outcome not yet determined: a deferred or revertible commit.
    pub fn pending(commit_id: String, diff: String, message: String) -> Self {
        Self {
            succeeded: None,
            message,
            changes: Changes { diff: Some(diff) },
            commit_id: Some(commit_id),
            ..Default::default()
        }
    }

    /// A dry-run report for cancel/confirm: intent only.
    pub fn intent(message: String) -> Self {
        Self {
            succeeded: None,
            message,
            ..Default::default()
        }
    }

    pub fn ok(message: String) -> Self {
        Self {
            succeeded: Some(true),
            message,
            ..Default::default()
        }
    }

    pub fn failed(err: &NetconfigError) -> Self {
        Self {
            succeeded: Some(false),
            message: err.to_string(),
            error_kind: Some(err.kind()),
            ..Default::default()
        }
    }

    pub fn with_rendered(mut self, rendered: Option<String>) -> Self {
        self.rendered_config = rendered;
        self
    }

    pub fn diff(&self) -> &str {
        self.changes.diff.as_deref().unwrap_or("")
    }

    pub fn is_failure(&self) -> bool {
        self.succeeded == Some(false)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
