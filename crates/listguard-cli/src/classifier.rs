//! `Classifier` backed by a local model runner.
//!
//! Each call runs `<program> run <model> <prompt>` and hands stdout back to
//! the quorum engine, which reduces it to a verdict.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::process::Command;

use listguard_core::error::{GuardError, Result};
use listguard_core::{Classifier, GuardConfig};
use serde::Deserialize;
use tracing::debug;

/// Term lists for one rules category.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RuleGroup {
    #[serde(default)]
    pub downvote: Vec<String>,
    #[serde(default)]
    pub upvote: Vec<String>,
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Rules file contents: category name to term lists.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    downvote: BTreeSet<String>,
    upvote: BTreeSet<String>,
    ignore: BTreeSet<String>,
}

impl RuleSet {
    /// Parse a rules JSON document, merging every category.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] if the document is not a map of rule groups.
    pub fn parse(json: &str) -> Result<Self> {
        let groups: BTreeMap<String, RuleGroup> = serde_json::from_str(json)
            .map_err(|e| GuardError::Configuration(format!("invalid rules file: {e}")))?;
        let mut rules = Self::default();
        for group in groups.into_values() {
            rules.downvote.extend(group.downvote);
            rules.upvote.extend(group.upvote);
            rules.ignore.extend(group.ignore);
        }
        Ok(rules)
    }

    /// # Errors
    ///
    /// [`GuardError::Configuration`] if the file is missing or invalid.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path).map_err(|e| {
            GuardError::Configuration(format!("cannot read rules file {}: {e}", path.display()))
        })?;
        Self::parse(&json)
    }

    /// The category guidance block of the prompt.
    pub fn guidance(&self) -> String {
        let join = |terms: &BTreeSet<String>| terms.iter().cloned().collect::<Vec<_>>().join(", ");
        let mut lines = Vec::new();
        if self.downvote.is_empty() {
            lines.push("- Nothing belongs in the 'false' category; never answer 'false'.".to_string());
        } else {
            lines.push(format!(
                "- 'false': the title or description matches or closely relates to any of: {}.",
                join(&self.downvote)
            ));
        }
        if self.upvote.is_empty() {
            lines.push("- Nothing belongs in the 'true' category; never answer 'true'.".to_string());
        } else {
            lines.push(format!(
                "- 'true': the title or description matches or closely relates to any of: {}.",
                join(&self.upvote)
            ));
        }
        if !self.ignore.is_empty() {
            lines.push(format!(
                "- 'ignore': nothing above applies, or the listing relates to any of: {}.",
                join(&self.ignore)
            ));
        }
        lines.join("\n")
    }
}

/// Full prompt for one listing.
pub fn build_prompt(rules: &RuleSet, title: &str, description: &str) -> String {
    format!(
        "You classify online marketplace listings into exactly one of three categories: \
'true', 'false' or 'ignore'. Reply with one of those words only. Compare the listing \
title and description against the terms of each category:\n\n\
{guidance}\n\n\
Listing title: {title}\n\
Listing description: {description}\n\n\
When a listing clearly fits neither 'false' nor 'true', answer 'ignore'.\n\n\
Category:\n",
        guidance = rules.guidance(),
    )
}

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    program: String,
    model: String,
    rules: RuleSet,
}

impl CommandClassifier {
    pub const fn new(program: String, model: String, rules: RuleSet) -> Self {
        Self {
            program,
            model,
            rules,
        }
    }

    /// Build from config, loading the rules file when one is configured.
    ///
    /// # Errors
    ///
    /// [`GuardError::Configuration`] if the configured rules file cannot be used.
    pub fn from_config(config: &GuardConfig) -> Result<Self> {
        let rules = match config.rules_path() {
            Some(path) => RuleSet::load(&path)?,
            None => RuleSet::default(),
        };
        Ok(Self::new(
            config.classifier.program.clone(),
            config.classifier.model.clone(),
            rules,
        ))
    }
}

impl Classifier for CommandClassifier {
    fn classify(&self, title: &str, description: &str) -> Result<String> {
        let prompt = build_prompt(&self.rules, title, description);
        let output = Command::new(&self.program)
            .arg("run")
            .arg(&self.model)
            .arg(&prompt)
            .output()
            .map_err(|e| GuardError::ExternalCall {
                command: self.program.clone(),
                reason: format!("could not start classifier: {e}"),
            })?;
        if !output.status.success() {
            return Err(GuardError::ExternalCall {
                command: self.program.clone(),
                reason: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let answer = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(model = %self.model, answer = %answer.trim(), "classifier answered");
        Ok(answer)
    }
}
