//! Read-only view of a Kubernetes `PersistentVolume`.
//!
//! Only the fields snapshot backends consult are modelled: annotations,
//! labels, and the in-tree GCE persistent disk source. Unknown fields are
//! ignored so full API objects deserialise directly.

use std::collections::BTreeMap;

use serde::Deserialize;

/// Persistent volume record supplied by the volume source.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct PersistentVolume {
    /// Object metadata.
    #[serde(default)]
    pub metadata: VolumeMetadata,
    /// Volume specification.
    #[serde(default)]
    pub spec: VolumeSpec,
}

/// Subset of Kubernetes object metadata.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct VolumeMetadata {
    /// Object name.
    #[serde(default)]
    pub name: String,
    /// Object annotations.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// Object labels.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Subset of the persistent volume specification.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct VolumeSpec {
    /// In-tree GCE persistent disk source, when the volume uses one.
    #[serde(default, rename = "gcePersistentDisk")]
    pub gce_persistent_disk: Option<GcePersistentDiskSource>,
}

/// GCE persistent disk source of a volume.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct GcePersistentDiskSource {
    /// Name of the backing Compute Engine disk.
    #[serde(rename = "pdName")]
    pub pd_name: String,
}

impl PersistentVolume {
    /// Parses a volume from its JSON API representation.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error when the payload is not a valid volume
    /// object.
    pub fn from_json(payload: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(payload)
    }

    /// Volume name, used in diagnostics.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Looks up an annotation.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.metadata.annotations.get(key).map(String::as_str)
    }

    /// Looks up a label.
    #[must_use]
    pub fn label(&self, key: &str) -> Option<&str> {
        self.metadata.labels.get(key).map(String::as_str)
    }

    /// Name of the backing GCE disk, if any.
    #[must_use]
    pub fn gce_disk_name(&self) -> Option<&str> {
        self.spec
            .gce_persistent_disk
            .as_ref()
            .map(|source| source.pd_name.as_str())
    }
}
