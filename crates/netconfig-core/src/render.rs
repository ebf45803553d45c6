//! Template rendering contract and the built-in `{{ var }}` renderer.

use regex::{Captures, Regex};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::{NetconfigError, Result};
use crate::types::ChangeRequest;

const REMOTE_SCHEMES: &[&str] = &["http://", "https://", "salt://", "ftp://", "s3://"];

/// Everything a renderer needs from a `ChangeRequest`.
#[derive(Debug, Clone)]
pub struct RenderRequest<'a> {
    pub template_ref: &'a str,
    pub template_source: Option<&'a str>,
    pub template_hash: Option<&'a str>,
    pub variables: BTreeMap<String, Value>,
    pub skip_verify: bool,
}

impl<'a> RenderRequest<'a> {
    pub fn from_change(req: &'a ChangeRequest, skip_verify: bool) -> Self {
        Self {
            template_ref: &req.template_ref,
            template_source: req.template_source.as_deref(),
            template_hash: req.template_hash.as_deref(),
            variables: req.render_context(),
            skip_verify,
        }
    }
}

/// Turns a template reference plus variables into final configuration text.
pub trait TemplateRenderer: Send + Sync {
    fn render(&self, req: &RenderRequest<'_>) -> Result<String>;
}

// ---------------------------------------------------------------------------
// SimpleRenderer
// ---------------------------------------------------------------------------

/// Renders inline sources or local files, substituting `{{ name }}` and
/// `{{ a.b.c }}` from the variable map.
#[derive(Debug, Clone)]
pub struct SimpleRenderer {
    base_dir: PathBuf,
}

impl SimpleRenderer {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn load(&self, req: &RenderRequest<'_>) -> Result<String> {
        if let Some(source) = req.template_source {
            return Ok(source.to_string());
        }
        if REMOTE_SCHEMES.iter().any(|s| req.template_ref.starts_with(s)) {
            return Err(NetconfigError::Template(format!(
                "cannot fetch remote template '{}': only local paths and inline sources are supported",
                req.template_ref
            )));
        }
        let path = self.base_dir.join(req.template_ref);
        std::fs::read_to_string(&path).map_err(|e| {
            NetconfigError::Template(format!("cannot read template {}: {e}", path.display()))
        })
    }
}

impl TemplateRenderer for SimpleRenderer {
    fn render(&self, req: &RenderRequest<'_>) -> Result<String> {
        let body = self.load(req)?;
        if let (Some(expected), false) = (req.template_hash, req.skip_verify) {
            verify_hash(req.template_ref, &body, expected)?;
        }
        substitute(&body, &req.variables)
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z0-9_]+)*)\s*\}\}")
            .expect("valid regex")
    })
}

fn verify_hash(template_ref: &str, body: &str, expected: &str) -> Result<()> {
    let expected = expected
        .strip_prefix("sha256:")
        .or_else(|| expected.strip_prefix("sha256="))
        .unwrap_or(expected)
        .to_ascii_lowercase();
    let actual = format!("{:x}", Sha256::digest(body.as_bytes()));
    if actual != expected {
        return Err(NetconfigError::Template(format!(
            "hash mismatch for '{template_ref}': expected sha256 {expected}, got {actual}"
        )));
    }
    Ok(())
}

fn substitute(body: &str, vars: &BTreeMap<String, Value>) -> Result<String> {
    let mut missing: Option<String> = None;
    let rendered = placeholder_re().replace_all(body, |caps: &Captures<'_>| {
        let path = &caps[1];
        match lookup(vars, path) {
            Some(value) => display(value),
            None => {
                missing.get_or_insert_with(|| path.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(NetconfigError::Template(format!(
            "undefined variable '{name}'"
        ))),
        None => Ok(rendered.into_owned()),
    }
}

fn lookup<'v>(vars: &'v BTreeMap<String, Value>, path: &str) -> Option<&'v Value> {
    let mut parts = path.split('.');
    let mut current = vars.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn display(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(display).collect::<Vec<_>>().join("\n"),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use tempfile::TempDir;

    fn render(req: &ChangeRequest, skip_verify: bool) -> Result<String> {
        SimpleRenderer::new(".").render(&RenderRequest::from_change(req, skip_verify))
    }

    #[test]
    fn inline_source_substitutes_variables() {
        let req = ChangeRequest::inline("ntp", "ntp server {{ server }}\nhostname {{host.name}}")
            .var("server", "10.0.0.1")
            .var("host", serde_json::json!({"name": "edge1"}));
        assert_eq!(render(&req, false).unwrap(), "ntp server 10.0.0.1\nhostname edge1");
    }

    #[test]
    fn arrays_render_one_item_per_line() {
        let req = ChangeRequest::inline("peers", "{{ peers }}")
            .var("peers", serde_json::json!(["peer 1.1.1.1", "peer 2.2.2.2"]));
        assert_eq!(render(&req, false).unwrap(), "peer 1.1.1.1\npeer 2.2.2.2");
    }

    #[test]
    fn undefined_variable_is_template_error() {
        let req = ChangeRequest::inline("x", "ntp server {{ server }}");
        let err = render(&req, false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TemplateError);
        assert!(err.to_string().contains("server"));
    }

    #[test]
    fn inline_source_never_fetches_ref() {
        let req = ChangeRequest::inline("https://example.com/never-fetched.j2", "static");
        assert_eq!(render(&req, false).unwrap(), "static");
    }

    #[test]
    fn remote_ref_without_source_is_rejected() {
        let req = ChangeRequest::new("salt://router/ntp.j2");
        assert_eq!(render(&req, false).unwrap_err().kind(), ErrorKind::TemplateError);
    }

    #[test]
    fn local_file_is_read_relative_to_base() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("bgp.conf"), "router bgp {{ asn }}\n").unwrap();
        let renderer = SimpleRenderer::new(dir.path());
        let req = ChangeRequest::new("bgp.conf").var("asn", 65001);
        let out = renderer
            .render(&RenderRequest::from_change(&req, false))
            .unwrap();
        assert_eq!(out, "router bgp 65001\n");
    }

    #[test]
    fn hash_mismatch_fails_unless_skipped() {
        let mut req = ChangeRequest::inline("x", "hostname edge1");
        req.template_hash = Some("sha256:deadbeef".into());
        assert_eq!(render(&req, false).unwrap_err().kind(), ErrorKind::TemplateError);
        assert_eq!(render(&req, true).unwrap(), "hostname edge1");
    }

    #[test]
    fn matching_hash_passes() {
        let body = "hostname edge1";
        let digest = format!("{:x}", Sha256::digest(body.as_bytes()));
        let mut req = ChangeRequest::inline("x", body);
        req.template_hash = Some(format!("sha256:{digest}"));
        assert_eq!(render(&req, false).unwrap(), body);
    }
}
