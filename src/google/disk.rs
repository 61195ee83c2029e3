//! Mapping between Kubernetes volumes, source-disk URLs and disk identifiers.

use crate::backend::DiskIdentifier;
use crate::volume::PersistentVolume;

use super::GoogleBackendError;

/// Provisioner name of the in-tree GCE persistent disk driver.
pub const PROVISIONER: &str = "kubernetes.io/gce-pd";

/// Annotation naming the provisioner of a volume.
pub const PROVISIONED_BY_ANNOTATION: &str = "pv.kubernetes.io/provisioned-by";

/// Zone label written by older clusters.
pub const LEGACY_ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";

/// Zone label written by current clusters.
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Returns `true` iff the volume was provisioned by [`PROVISIONER`].
#[must_use]
pub fn supports_volume(volume: &PersistentVolume) -> bool {
    volume.annotation(PROVISIONED_BY_ANNOTATION) == Some(PROVISIONER)
}

/// Zone label of the volume. Empty values count as absent.
///
/// [`LEGACY_ZONE_LABEL`] is read first. When it is absent the GA
/// [`ZONE_LABEL`] is read as well, so clusters that only write the
/// `topology.kubernetes.io` label still resolve. No other label is trusted.
#[must_use]
pub fn volume_zone(volume: &PersistentVolume) -> Option<&str> {
    [LEGACY_ZONE_LABEL, ZONE_LABEL]
        .into_iter()
        .filter_map(|label| volume.label(label))
        .find(|zone| !zone.trim().is_empty())
}

/// Resolves the disk behind a volume.
///
/// The zone is only ever taken from the two zone labels read by
/// [`volume_zone`]; region or node labels are not consulted.
///
/// # Errors
///
/// Returns [`GoogleBackendError::UnsupportedVolume`] when the zone label is
/// absent, or [`GoogleBackendError::MissingDiskName`] when the zone is known
/// but `spec.gcePersistentDisk.pdName` is missing.
pub fn resolve_disk_identifier(
    volume: &PersistentVolume,
) -> Result<DiskIdentifier, GoogleBackendError> {
    let zone = volume_zone(volume).ok_or_else(|| GoogleBackendError::UnsupportedVolume {
        volume: volume.name().to_owned(),
        reason: format!("missing zone label ({LEGACY_ZONE_LABEL} or {ZONE_LABEL})"),
    })?;
    let name = volume
        .gce_disk_name()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| GoogleBackendError::MissingDiskName {
            volume: volume.name().to_owned(),
        })?;
    Ok(DiskIdentifier::new(name, zone))
}

/// Parses a source-disk URL (`.../zones/{zone}/disks/{disk}`) from its last
/// four path segments.
///
/// Only the positions are read: the collection names are not checked, so a
/// regional disk (`.../regions/{region}/disks/{disk}`) yields its region as
/// the zone.
///
/// # Errors
///
/// Returns [`GoogleBackendError::InvalidResponse`] when the URL has fewer than
/// four segments or an empty disk or zone segment.
pub fn parse_source_disk(source_disk: &str) -> Result<DiskIdentifier, GoogleBackendError> {
    let segments: Vec<&str> = source_disk.trim_end_matches('/').rsplit('/').take(4).collect();
    match segments.as_slice() {
        [disk, _, zone, _] if !disk.is_empty() && !zone.is_empty() => {
            Ok(DiskIdentifier::new(*disk, *zone))
        }
        _ => Err(GoogleBackendError::InvalidResponse {
            field: String::from("sourceDisk"),
            message: format!("expected .../zones/<zone>/disks/<disk>, got `{source_disk}`"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(
        "https://www.googleapis.com/compute/v1/projects/p/zones/europe-west1-b/disks/pvc-123",
        "pvc-123",
        "europe-west1-b"
    )]
    #[case("projects/p/zones/us-central1-a/disks/data", "data", "us-central1-a")]
    #[case("zones/us-east1-c/disks/d/", "d", "us-east1-c")]
    #[case("projects/p/regions/europe-west1/disks/rd", "rd", "europe-west1")]
    fn parses_last_four_segments(#[case] url: &str, #[case] disk: &str, #[case] zone: &str) {
        assert_eq!(
            parse_source_disk(url).expect("url should parse"),
            DiskIdentifier::new(disk, zone)
        );
    }

    #[rstest]
    #[case("")]
    #[case("disks/d")]
    #[case("zones/d")]
    #[case("projects/p/zones//disks/d")]
    fn rejects_malformed_source_disks(#[case] url: &str) {
        let err = parse_source_disk(url).expect_err("url should be rejected");
        assert!(matches!(
            err,
            GoogleBackendError::InvalidResponse { ref field, .. } if field == "sourceDisk"
        ));
    }
}
