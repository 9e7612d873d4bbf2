//! Subject/body templates with `Var…` placeholders.
//!
//! Substitution is a plain substring replacement of every key, so callers
//! must keep their placeholder names free of overlaps: no name may be a
//! substring of another (see [`check_placeholder_names`]). Keys ending in
//! `Gender` additionally produce `…SubjectPronoun`, `…ObjectPronoun` and
//! `…PossessivePronoun`. A rendered message never contains a leftover
//! placeholder: that is reported as `RouletteError::TemplateError`.

use crate::domain::model::Gender;
use crate::utils::error::{Result, RouletteError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::OnceLock;

pub const PLACEHOLDER_MARKER: &str = "Var";
const GENDER_SUFFIX: &str = "Gender";

/// Placeholder name → replacement text.
pub type Values = BTreeMap<String, String>;

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"Var[A-Za-z]+").expect("placeholder pattern is valid"))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage {
    pub subject: String,
    pub body: String,
}

impl Template {
    pub fn new(subject: &str, body: &str) -> Self {
        Self {
            subject: subject.to_string(),
            body: body.to_string(),
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&content).map_err(|e| match e {
            RouletteError::ConfigError { message } => RouletteError::ConfigError {
                message: format!("{}: {}", path.as_ref().display(), message),
            },
            other => other,
        })
    }

    /// Parses a TOML document with `subject` and `body` string keys.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RouletteError::ConfigError {
            message: format!("template parsing error: {}", e),
        })
    }

    pub fn render(&self, values: &Values) -> Result<RenderedMessage> {
        let effective = with_pronouns(values)?;

        let mut subject = self.subject.clone();
        let mut body = self.body.clone();
        for (name, value) in &effective {
            subject = subject.replace(name.as_str(), value);
            body = body.replace(name.as_str(), value);
        }

        // Scans the output, so placeholder text carried in by a value is
        // caught as well.
        let unresolved: BTreeSet<String> = placeholder_pattern()
            .find_iter(&subject)
            .chain(placeholder_pattern().find_iter(&body))
            .map(|m| m.as_str().to_string())
            .collect();
        if !unresolved.is_empty() {
            return Err(RouletteError::TemplateError {
                unresolved: unresolved.into_iter().collect(),
            });
        }

        Ok(RenderedMessage { subject, body })
    }
}

/// Adds the three pronoun placeholders for every `…Gender` key.
pub fn with_pronouns(values: &Values) -> Result<Values> {
    let mut effective = values.clone();
    for (name, value) in values {
        let Some(stem) = name.strip_suffix(GENDER_SUFFIX) else {
            continue;
        };
        let gender: Gender = value.parse().map_err(|_| {
            RouletteError::validation(
                None,
                name,
                format!(
                    "'{}' is not a recognized gender (expected one of: {})",
                    value,
                    Gender::RECOGNIZED.join(", ")
                ),
            )
        })?;
        let pronouns = gender.pronouns();
        effective.insert(format!("{stem}SubjectPronoun"), pronouns.subject.to_string());
        effective.insert(format!("{stem}ObjectPronoun"), pronouns.object.to_string());
        effective.insert(format!("{stem}PossessivePronoun"), pronouns.possessive.to_string());
    }
    Ok(effective)
}

/// Verifies the naming contract substitution relies on: every name matches
/// the placeholder pattern and none is a substring of another.
pub fn check_placeholder_names<'a, I>(names: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let names: Vec<&str> = names.into_iter().collect();
    for name in &names {
        let whole_match = placeholder_pattern()
            .find(name)
            .map(|m| m.start() == 0 && m.end() == name.len())
            .unwrap_or(false);
        if !whole_match {
            return Err(RouletteError::validation(
                None,
                name,
                format!("placeholder names must look like {}Name", PLACEHOLDER_MARKER),
            ));
        }
    }
    for a in &names {
        for b in &names {
            if a != b && b.contains(a) {
                return Err(RouletteError::validation(
                    None,
                    a,
                    format!("placeholder is a substring of {}", b),
                ));
            }
        }
    }
    Ok(())
}
