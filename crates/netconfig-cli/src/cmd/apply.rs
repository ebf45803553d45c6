use anyhow::{bail, Context};
use clap::Args;
use netconfig_core::options::OptionLayer;
use netconfig_core::timer::TimerTable;
use netconfig_core::{ChangeRequest, OutcomeRecord};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{report, Ctx, OutcomeFailed};
use crate::output::{print_json, print_outcome};

#[derive(Args)]
pub struct ApplyArgs {
    /// Device name from config.yaml
    pub device: String,

    /// Template path (relative to templates_dir), remote reference, or label for --source
    #[arg(required_unless_present = "file")]
    pub template_ref: Option<String>,

    /// Apply every change described in a YAML file (resource name -> change)
    #[arg(long, conflicts_with = "template_ref")]
    pub file: Option<PathBuf>,

    /// Inline template body; the template reference becomes a label only
    #[arg(long)]
    pub source: Option<String>,

    /// Template variable (repeatable); values are read as YAML scalars
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// YAML mapping of template variables; --var entries win
    #[arg(long)]
    pub vars_file: Option<PathBuf>,

    /// Expected sha256 of the template body
    #[arg(long)]
    pub template_hash: Option<String>,

    /// Replace the whole configuration instead of merging
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub replace: Option<bool>,

    /// Commit the change (--commit=false leaves it staged)
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub commit: Option<bool>,

    /// Skip template hash verification
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub skip_verify: Option<bool>,

    /// Include the rendered configuration in the output
    #[arg(long, num_args = 0..=1, require_equals = true, default_missing_value = "true")]
    pub debug: Option<bool>,

    /// Commit after a delay (5, 2m, 1h30m)
    #[arg(long)]
    pub commit_in: Option<String>,

    /// Commit at a clock time (1am, 13:20, 1:20am)
    #[arg(long)]
    pub commit_at: Option<String>,

    /// Revert after a delay unless confirmed
    #[arg(long)]
    pub revert_in: Option<String>,

    /// Revert at a clock time unless confirmed
    #[arg(long)]
    pub revert_at: Option<String>,
}

impl ApplyArgs {
    fn options(&self) -> OptionLayer {
        OptionLayer {
            test: None,
            commit: self.commit,
            replace: self.replace,
            skip_verify: self.skip_verify,
            debug: self.debug,
            commit_in: self.commit_in.clone(),
            commit_at: self.commit_at.clone(),
            revert_in: self.revert_in.clone(),
            revert_at: self.revert_at.clone(),
        }
    }

    fn change_request(&self, template_ref: &str) -> anyhow::Result<ChangeRequest> {
        let mut variables = match &self.vars_file {
            Some(path) => read_vars_file(path)?,
            None => BTreeMap::new(),
        };
        for pair in &self.vars {
            let (key, value) = parse_var(pair)?;
            variables.insert(key, value);
        }
        Ok(ChangeRequest {
            template_ref: template_ref.to_string(),
            template_source: self.source.clone(),
            template_hash: self.template_hash.clone(),
            variables,
            defaults: BTreeMap::new(),
            options: self.options(),
        })
    }
}

pub fn run(ctx: &Ctx<'_>, args: ApplyArgs) -> anyhow::Result<()> {
    let workflow = ctx.open_workflow(TimerTable::disabled())?;

    if let Some(path) = &args.file {
        let changes = read_changes_file(path)?;
        let overrides = args.options();
        let mut results: Vec<(String, OutcomeRecord)> = Vec::with_capacity(changes.len());
        for (name, mut change) in changes {
            change.options = overrides.over(&change.options);
            // One bad change must not hide the outcomes (and commit ids) of
            // the ones already applied.
            let outcome = workflow.apply(&args.device, &change).unwrap_or_else(|e| {
                warn!(resource = %name, error = %e, "change failed");
                OutcomeRecord::failed(&e)
            });
            results.push((name, outcome));
        }

        if ctx.json {
            let mut map = serde_json::Map::new();
            for (name, outcome) in &results {
                map.insert(name.clone(), serde_json::to_value(outcome)?);
            }
            print_json(&map)?;
        } else {
            for (i, (name, outcome)) in results.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_outcome(Some(name), outcome);
            }
        }
        if results.iter().any(|(_, o)| o.is_failure()) {
            return Err(OutcomeFailed.into());
        }
        return Ok(());
    }

    let Some(template_ref) = args.template_ref.as_deref() else {
        bail!("a template reference or --file is required");
    };
    let change = args.change_request(template_ref)?;
    let outcome = workflow.apply(&args.device, &change)?;
    report(ctx, &outcome)
}

fn parse_var(pair: &str) -> anyhow::Result<(String, Value)> {
    let Some((key, raw)) = pair.split_once('=') else {
        bail!("invalid --var '{pair}': expected KEY=VALUE");
    };
    let key = key.trim();
    if key.is_empty() {
        bail!("invalid --var '{pair}': empty key");
    }
    let value = if raw.trim().is_empty() {
        Value::String(String::new())
    } else {
        serde_yaml::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
    };
    Ok((key.to_string(), value))
}

fn read_vars_file(path: &Path) -> anyhow::Result<BTreeMap<String, Value>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&data).with_context(|| format!("invalid variables in {}", path.display()))
}

/// Resource name -> change, in file order.
fn read_changes_file(path: &Path) -> anyhow::Result<Vec<(String, ChangeRequest)>> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mapping: serde_yaml::Mapping = serde_yaml::from_str(&data)
        .with_context(|| format!("{} must be a mapping of resource name to change", path.display()))?;
    let mut changes = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let Some(name) = key.as_str().map(str::to_string) else {
            bail!("resource names in {} must be strings", path.display());
        };
        let change: ChangeRequest = serde_yaml::from_value(value)
            .with_context(|| format!("invalid change '{name}'"))?;
        changes.push((name, change));
    }
    Ok(changes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn var_values_are_typed() {
        assert_eq!(parse_var("asn=65001").unwrap().1, Value::from(65001));
        assert_eq!(
            parse_var("server=10.0.0.1").unwrap().1,
            Value::from("10.0.0.1")
        );
        assert_eq!(parse_var("empty=").unwrap().1, Value::from(""));
        assert!(parse_var("novalue").is_err());
    }

    #[test]
    fn changes_file_keeps_order() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("changes.yaml");
        std::fs::write(
            &path,
            "zeta:\n  template_name: a\n  template_source: x\nalpha:\n  template_name: b\n  template_source: y\n  revert_in: 5\n",
        )
        .unwrap();
        let changes = read_changes_file(&path).unwrap();
        let names: Vec<_> = changes.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["zeta", "alpha"]);
        assert_eq!(changes[1].1.options.revert_in.as_deref(), Some("5"));
    }
}
