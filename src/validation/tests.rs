//! Unit tests for the validation gate.

use chrono::TimeZone;
use rstest::{fixture, rstest};

use super::*;

#[fixture]
fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 7, 14, 5, 9)
        .single()
        .unwrap_or_else(|| panic!("fixed timestamp should be unambiguous"))
}

#[fixture]
fn valid_config() -> SnapshotConfig {
    SnapshotConfig::new("my-project")
}

#[rstest]
fn default_config_passes(valid_config: SnapshotConfig, now: DateTime<Utc>) {
    assert_eq!(collect_violations(&valid_config, now), Vec::new());
    assert!(ValidationGate::default().check(&valid_config, now).is_ok());
}

#[rstest]
fn sample_name_uses_configured_format(now: DateTime<Utc>) {
    let name = build_snapshot_name(SAMPLE_SNAPSHOT_PREFIX, "%d%m%y-%H%M%S", now)
        .expect("format should render");
    assert_eq!(name, "dummy-snapshot-070324-140509");
}

#[rstest]
#[case::month_name("%b-%d")]
#[case::weekday_name("%A")]
#[case::am_pm("%p")]
#[case::underscore("%Y_%m_%d")]
#[case::colon("%H:%M")]
#[case::too_long("%Y%m%d%H%M%S%Y%m%d%H%M%S%Y%m%d%H%M%S%Y%m%d%H%M%S")]
fn datetime_formats_rendering_invalid_names_are_rejected(
    valid_config: SnapshotConfig,
    now: DateTime<Utc>,
    #[case] format: &str,
) {
    let config = SnapshotConfig {
        snapshot_datetime_format: format.to_owned(),
        ..valid_config
    };

    let violations = collect_violations(&config, now);
    assert_eq!(violations.len(), 1, "unexpected violations: {violations:?}");
    let violation = violations.first().expect("one violation");
    assert_eq!(violation.key, "snapshot_datetime_format");
    assert_eq!(violation.reason, ViolationReason::InvalidSnapshotName);
    assert_eq!(violation.regex.as_deref(), Some(SNAPSHOT_NAME_REGEX));
    assert!(violation.value.starts_with("dummy-snapshot-"));
}

#[rstest]
#[case("%Y%m%d-%H%M%S")]
#[case("%s")]
#[case("%y%j")]
fn lowercase_datetime_formats_are_accepted(
    valid_config: SnapshotConfig,
    now: DateTime<Utc>,
    #[case] format: &str,
) {
    let config = SnapshotConfig {
        snapshot_datetime_format: format.to_owned(),
        ..valid_config
    };
    assert!(collect_violations(&config, now).is_empty());
}

#[rstest]
fn malformed_strftime_is_reported(valid_config: SnapshotConfig, now: DateTime<Utc>) {
    let config = SnapshotConfig {
        snapshot_datetime_format: String::from("%Q"),
        ..valid_config
    };
    let violations = collect_violations(&config, now);
    assert_eq!(
        violations
            .iter()
            .map(|violation| violation.reason)
            .collect::<Vec<_>>(),
        vec![ViolationReason::InvalidDatetimeFormat]
    );
}

#[rstest]
#[case("a", true)]
#[case("snap-2024", true)]
#[case("a-", false)]
#[case("1snap", false)]
#[case("Snap", false)]
#[case("snap_1", false)]
#[case("", false)]
fn snapshot_name_rule(#[case] name: &str, #[case] expected: bool) {
    assert_eq!(is_valid_snapshot_name(name), expected, "name `{name}`");
}

#[test]
fn snapshot_name_length_limit_is_sixty_three() {
    let longest = format!("a{}", "b".repeat(62));
    assert!(is_valid_snapshot_name(&longest));
    assert!(!is_valid_snapshot_name(&format!("{longest}c")));
}

#[rstest]
#[case("created-by", true)]
#[case("created_by", true)]
#[case("ünicode-key", true)]
#[case("Created-by", false)]
#[case("created-By", false)]
#[case("1created", false)]
#[case("-created", false)]
#[case("_created", false)]
#[case("created by", false)]
#[case("created.by", false)]
#[case("", false)]
fn label_key_rule(#[case] key: &str, #[case] expected: bool) {
    assert_eq!(is_valid_label_key(key), expected, "key `{key}`");
}

#[test]
fn label_key_length_limit_is_sixty_three() {
    let longest = format!("k{}", "e".repeat(62));
    assert!(is_valid_label_key(&longest));
    assert!(!is_valid_label_key(&format!("{longest}y")));
}

#[rstest]
#[case("k8s-snapshots", true)]
#[case("K8s-Snapshots", true)]
#[case("1234", true)]
#[case("-leading-dash", true)]
#[case("", true)]
#[case("has space", false)]
#[case("dotted.value", false)]
fn label_value_rule(#[case] value: &str, #[case] expected: bool) {
    assert_eq!(is_valid_label_value(value), expected, "value `{value}`");
}

#[rstest]
#[case("Created-By")]
#[case("9lives")]
#[case("bad key")]
fn invalid_author_label_key_is_reported(
    valid_config: SnapshotConfig,
    now: DateTime<Utc>,
    #[case] key: &str,
) {
    let config = SnapshotConfig {
        snapshot_author_label: key.to_owned(),
        ..valid_config
    };
    let err = ValidationGate::default()
        .check(&config, now)
        .expect_err("label key should be rejected");
    let violation = err
        .for_key("snapshot_author_label")
        .next()
        .expect("violation for snapshot_author_label");
    assert_eq!(violation.reason, ViolationReason::InvalidLabelKey);
    assert_eq!(violation.value, key);
    assert_eq!(violation.regex.as_deref(), Some(LABEL_REGEX));
}

#[rstest]
fn uppercase_author_value_is_accepted(valid_config: SnapshotConfig, now: DateTime<Utc>) {
    let config = SnapshotConfig {
        snapshot_author_label_key: String::from("K8s-Snapshots"),
        ..valid_config
    };
    assert!(collect_violations(&config, now).is_empty());
}

#[rstest]
fn every_violation_is_reported_together(valid_config: SnapshotConfig, now: DateTime<Utc>) {
    let config = SnapshotConfig {
        snapshot_datetime_format: String::from("%B"),
        snapshot_author_label: String::from("Author"),
        snapshot_author_label_key: String::from("not valid"),
        gcloud_project: String::from("  "),
        ..valid_config
    };

    let err = ValidationGate::default()
        .check(&config, now)
        .expect_err("configuration should be rejected");
    let keys = err
        .violations
        .iter()
        .map(|violation| violation.key.as_str())
        .collect::<Vec<_>>();
    assert_eq!(
        keys,
        vec![
            "gcloud_project",
            "snapshot_datetime_format",
            "snapshot_author_label",
            "snapshot_author_label_key",
        ]
    );

    let message = err.to_string();
    assert!(message.contains("4 violation(s)"), "message: {message}");
    assert!(
        message.contains("GCE_SNAPSHOTS_GCLOUD_PROJECT"),
        "message: {message}"
    );
    assert!(message.contains("not valid"), "message: {message}");
}

#[rstest]
fn conflicting_and_blank_credentials_are_reported(
    valid_config: SnapshotConfig,
    now: DateTime<Utc>,
) {
    let config = SnapshotConfig {
        gcloud_json_keyfile_name: Some(String::from(" ")),
        gcloud_json_keyfile_string: Some(String::from("{}")),
        ..valid_config
    };
    let reasons = collect_violations(&config, now)
        .into_iter()
        .map(|violation| (violation.key, violation.reason))
        .collect::<Vec<_>>();
    assert_eq!(
        reasons,
        vec![
            (
                String::from("gcloud_json_keyfile_name"),
                ViolationReason::Missing
            ),
            (
                String::from("gcloud_json_keyfile_string"),
                ViolationReason::ConflictingCredentials
            ),
        ]
    );
}
