//! Validation gate for provider naming and labelling constraints.
//!
//! Compute Engine rejects snapshot names and labels that break its character
//! set, length, or case rules, but only once the remote call is made. The gate
//! checks the configuration-derived names and labels up front and reports
//! every violation in one pass.

use std::fmt::{self, Write as _};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use thiserror::Error;
use tracing::Span;

use crate::config::{FieldMetadata, GCLOUD_PROJECT, KEYFILE_NAME, KEYFILE_STRING, SnapshotConfig};

/// Pattern a snapshot name has to match, as reported by the provider's
/// `createSnapshot` error response.
pub const SNAPSHOT_NAME_REGEX: &str = r"^(?:[a-z](?:[-a-z0-9]{0,61}[a-z0-9])?)$";

/// Pattern label keys and values have to match. Keys must additionally be
/// lowercase and start with a letter.
pub const LABEL_REGEX: &str = r"^(?:[-\w]{0,63})$";

/// Prefix of the sample snapshot name rendered during validation.
pub const SAMPLE_SNAPSHOT_PREFIX: &str = "dummy-snapshot";

// A pattern that fails to compile matches nothing, so every value is
// rejected rather than silently accepted.
static SNAPSHOT_NAME: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(SNAPSHOT_NAME_REGEX).ok());
static LABEL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(LABEL_REGEX).ok());

fn matches(pattern: &LazyLock<Option<Regex>>, value: &str) -> bool {
    pattern.as_ref().is_some_and(|regex| regex.is_match(value))
}

/// Why a configuration value was rejected.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ViolationReason {
    /// A required field is empty.
    Missing,
    /// The datetime format is not a valid strftime pattern.
    InvalidDatetimeFormat,
    /// The rendered snapshot name breaks the provider name rule.
    InvalidSnapshotName,
    /// The value is not a valid label key.
    InvalidLabelKey,
    /// The value is not a valid label value.
    InvalidLabelValue,
    /// More than one credential source is configured.
    ConflictingCredentials,
}

impl fmt::Display for ViolationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Missing => "required value is empty",
            Self::InvalidDatetimeFormat => "datetime format is not a valid strftime pattern",
            Self::InvalidSnapshotName => {
                "datetime format renders an invalid snapshot name; uppercase characters are forbidden"
            }
            Self::InvalidLabelKey => {
                "not a valid label key: must match the label pattern, be lowercase, and start with a letter"
            }
            Self::InvalidLabelValue => "not a valid label value: must match the label pattern",
            Self::ConflictingCredentials => "only one credential source may be configured",
        };
        f.write_str(text)
    }
}

/// One rejected configuration value.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigViolation {
    /// Configuration key holding the value.
    pub key: String,
    /// Why the value was rejected.
    pub reason: ViolationReason,
    /// Pattern the value was checked against, when one applies.
    pub regex: Option<String>,
    /// Offending value (or the name rendered from it).
    pub value: String,
    /// How to fix the value, when the field has a documented source.
    pub hint: Option<String>,
}

impl ConfigViolation {
    fn new(key: &str, reason: ViolationReason, value: &str) -> Self {
        Self {
            key: key.to_owned(),
            reason,
            regex: None,
            value: value.to_owned(),
            hint: None,
        }
    }

    fn with_regex(mut self, regex: &str) -> Self {
        self.regex = Some(regex.to_owned());
        self
    }

    fn with_hint(mut self, field: &FieldMetadata) -> Self {
        self.hint = Some(format!("{}: {}", field.description, field.guidance()));
        self
    }
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (value `{}`", self.key, self.reason, self.value)?;
        if let Some(regex) = &self.regex {
            write!(f, ", regex `{regex}`")?;
        }
        f.write_str(")")?;
        if let Some(hint) = &self.hint {
            write!(f, "; {hint}")?;
        }
        Ok(())
    }
}

/// Aggregated report of every violation found in a configuration.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("{}", render_violations(.violations))]
pub struct ConfigValidationError {
    /// Violations in the order they were found.
    pub violations: Vec<ConfigViolation>,
}

impl ConfigValidationError {
    /// Returns the violations reported for `key`.
    pub fn for_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a ConfigViolation> + 'a {
        self.violations
            .iter()
            .filter(move |violation| violation.key == key)
    }
}

fn render_violations(violations: &[ConfigViolation]) -> String {
    let mut rendered = format!("invalid configuration ({} violation(s))", violations.len());
    for violation in violations {
        rendered.push_str("; ");
        rendered.push_str(&violation.to_string());
    }
    rendered
}

/// Renders `at` with a strftime `format`.
///
/// # Errors
///
/// Returns [`fmt::Error`] when `format` contains an invalid specifier.
pub fn render_timestamp(format: &str, at: DateTime<Utc>) -> Result<String, fmt::Error> {
    let mut rendered = String::new();
    write!(rendered, "{}", at.format(format))?;
    Ok(rendered)
}

/// Builds `<prefix>-<timestamp>` using the configured datetime format.
///
/// # Errors
///
/// Returns [`fmt::Error`] when `format` contains an invalid specifier.
pub fn build_snapshot_name(
    prefix: &str,
    format: &str,
    at: DateTime<Utc>,
) -> Result<String, fmt::Error> {
    Ok(format!("{prefix}-{}", render_timestamp(format, at)?))
}

/// Returns `true` when `name` is accepted as a snapshot name.
#[must_use]
pub fn is_valid_snapshot_name(name: &str) -> bool {
    matches(&SNAPSHOT_NAME, name)
}

/// Returns `true` when `key` is a valid label key: it matches
/// [`LABEL_REGEX`], contains no uppercase characters, and starts with a
/// letter. The empty key is rejected.
#[must_use]
pub fn is_valid_label_key(key: &str) -> bool {
    let starts_with_letter = key.chars().next().is_some_and(char::is_alphabetic);
    matches(&LABEL, key) && !key.chars().any(char::is_uppercase) && starts_with_letter
}

/// Returns `true` when `value` is a valid label value. Only the character set
/// and length apply; the empty value is accepted.
#[must_use]
pub fn is_valid_label_value(value: &str) -> bool {
    matches(&LABEL, value)
}

/// Checks `config` as of `now` and returns every violation found.
#[must_use]
pub fn collect_violations(config: &SnapshotConfig, now: DateTime<Utc>) -> Vec<ConfigViolation> {
    let mut violations = Vec::new();

    if config.gcloud_project.trim().is_empty() {
        violations.push(
            ConfigViolation::new(
                GCLOUD_PROJECT.toml_key,
                ViolationReason::Missing,
                &config.gcloud_project,
            )
            .with_hint(&GCLOUD_PROJECT),
        );
    }

    match build_snapshot_name(
        SAMPLE_SNAPSHOT_PREFIX,
        &config.snapshot_datetime_format,
        now,
    ) {
        Ok(name) if !is_valid_snapshot_name(&name) => violations.push(
            ConfigViolation::new(
                "snapshot_datetime_format",
                ViolationReason::InvalidSnapshotName,
                &name,
            )
            .with_regex(SNAPSHOT_NAME_REGEX),
        ),
        Ok(_) => {}
        Err(_) => violations.push(ConfigViolation::new(
            "snapshot_datetime_format",
            ViolationReason::InvalidDatetimeFormat,
            &config.snapshot_datetime_format,
        )),
    }

    if !is_valid_label_key(&config.snapshot_author_label) {
        violations.push(
            ConfigViolation::new(
                "snapshot_author_label",
                ViolationReason::InvalidLabelKey,
                &config.snapshot_author_label,
            )
            .with_regex(LABEL_REGEX),
        );
    }

    if !is_valid_label_value(&config.snapshot_author_label_key) {
        violations.push(
            ConfigViolation::new(
                "snapshot_author_label_key",
                ViolationReason::InvalidLabelValue,
                &config.snapshot_author_label_key,
            )
            .with_regex(LABEL_REGEX),
        );
    }

    collect_credential_violations(config, &mut violations);
    violations
}

fn collect_credential_violations(config: &SnapshotConfig, violations: &mut Vec<ConfigViolation>) {
    let name = config.gcloud_json_keyfile_name.as_deref();
    let inline = config.gcloud_json_keyfile_string.as_deref();

    for (value, field) in [(name, &KEYFILE_NAME), (inline, &KEYFILE_STRING)] {
        if let Some(text) = value.filter(|text| text.trim().is_empty()) {
            violations.push(
                ConfigViolation::new(field.toml_key, ViolationReason::Missing, text)
                    .with_hint(field),
            );
        }
    }

    if let (Some(path), Some(_)) = (name, inline) {
        violations.push(ConfigViolation::new(
            KEYFILE_STRING.toml_key,
            ViolationReason::ConflictingCredentials,
            path,
        ));
    }
}

/// Checks configuration before any snapshot operation is attempted, logging
/// each violation on the injected span.
#[derive(Clone, Debug)]
pub struct ValidationGate {
    span: Span,
}

impl Default for ValidationGate {
    fn default() -> Self {
        Self::new(tracing::debug_span!("gce_snapshots.validation"))
    }
}

impl ValidationGate {
    /// Creates a gate reporting through `span`.
    #[must_use]
    pub const fn new(span: Span) -> Self {
        Self { span }
    }

    /// Validates `config` as of `now`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigValidationError`] listing every violation when any
    /// rule fails.
    pub fn check(
        &self,
        config: &SnapshotConfig,
        now: DateTime<Utc>,
    ) -> Result<(), ConfigValidationError> {
        let violations = collect_violations(config, now);
        if violations.is_empty() {
            return Ok(());
        }

        for violation in &violations {
            tracing::error!(
                parent: &self.span,
                key = %violation.key,
                value = %violation.value,
                regex = violation.regex.as_deref().unwrap_or(""),
                reason = %violation.reason,
                "config.error"
            );
        }
        Err(ConfigValidationError { violations })
    }
}

#[cfg(test)]
mod tests;
