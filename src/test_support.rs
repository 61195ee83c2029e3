//! Test support utilities shared across unit and integration tests.

use std::cell::RefCell;
use std::collections::{BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::rc::Rc;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::backend::Labels;
use crate::google::GoogleBackendError;
use crate::google::api::{
    ComputeApi, CreateSnapshotRequest, Operation, SetLabelsRequest, SnapshotPage,
    SnapshotResource,
};
use crate::google::disk::{LEGACY_ZONE_LABEL, PROVISIONED_BY_ANNOTATION, ZONE_LABEL};
use crate::volume::{GcePersistentDiskSource, PersistentVolume, VolumeMetadata, VolumeSpec};

type Script<T> = Rc<RefCell<VecDeque<Result<T, GoogleBackendError>>>>;

/// Scripted Compute Engine API that returns pre-seeded responses in FIFO
/// order, one queue per remote method.
///
/// Every call is recorded, so tests can assert exactly which remote reads a
/// poll performed. A call with no queued response fails with
/// [`GoogleBackendError::Transport`].
#[derive(Clone, Debug, Default)]
pub struct ScriptedComputeApi {
    pages: Script<SnapshotPage>,
    operations: Script<Operation>,
    creates: Script<Operation>,
    snapshots: Script<SnapshotResource>,
    label_writes: Script<Operation>,
    deletes: Script<Operation>,
    calls: Rc<RefCell<Vec<ApiCall>>>,
}

/// Records a single call made through [`ScriptedComputeApi`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ApiCall {
    /// `snapshots.list`.
    ListSnapshots {
        /// Project argument.
        project: String,
        /// Filter expression.
        filter: String,
        /// Page token, absent for the first page.
        page_token: Option<String>,
    },
    /// `zoneOperations.get`.
    GetZoneOperation {
        /// Project argument.
        project: String,
        /// Zone argument.
        zone: String,
        /// Operation name.
        operation: String,
    },
    /// `disks.createSnapshot`.
    CreateDiskSnapshot {
        /// Project argument.
        project: String,
        /// Zone argument.
        zone: String,
        /// Disk name.
        disk: String,
        /// Request body.
        request: CreateSnapshotRequest,
    },
    /// `snapshots.get`.
    GetSnapshot {
        /// Project argument.
        project: String,
        /// Snapshot name.
        name: String,
    },
    /// `snapshots.setLabels`.
    SetSnapshotLabels {
        /// Project argument.
        project: String,
        /// Snapshot name.
        name: String,
        /// Request body.
        request: SetLabelsRequest,
    },
    /// `snapshots.delete`.
    DeleteSnapshot {
        /// Project argument.
        project: String,
        /// Snapshot name.
        name: String,
    },
}

impl ScriptedComputeApi {
    /// Creates an API with no queued responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.borrow().clone()
    }

    /// Number of operation reads recorded.
    #[must_use]
    pub fn operation_reads(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::GetZoneOperation { .. }))
    }

    /// Number of snapshot resource reads recorded.
    #[must_use]
    pub fn snapshot_reads(&self) -> usize {
        self.count(|call| matches!(call, ApiCall::GetSnapshot { .. }))
    }

    fn count(&self, predicate: impl Fn(&ApiCall) -> bool) -> usize {
        self.calls.borrow().iter().filter(|call| predicate(call)).count()
    }

    /// Queues one listing page.
    pub fn push_page(&self, items: Vec<SnapshotResource>, next_page_token: Option<&str>) {
        self.pages.borrow_mut().push_back(Ok(SnapshotPage {
            items,
            next_page_token: next_page_token.map(str::to_owned),
        }));
    }

    /// Queues an operation read reporting `status`.
    pub fn push_operation_status(&self, name: &str, status: &str) {
        self.operations
            .borrow_mut()
            .push_back(Ok(operation(name, status)));
    }

    /// Queues an operation read returning `value` verbatim.
    pub fn push_operation(&self, value: Operation) {
        self.operations.borrow_mut().push_back(Ok(value));
    }

    /// Queues a successful create returning a pending operation.
    pub fn push_create(&self, operation_name: &str) {
        self.creates
            .borrow_mut()
            .push_back(Ok(operation(operation_name, "PENDING")));
    }

    /// Queues a snapshot read.
    pub fn push_snapshot(&self, resource: SnapshotResource) {
        self.snapshots.borrow_mut().push_back(Ok(resource));
    }

    /// Queues a snapshot read reporting `status`.
    pub fn push_snapshot_status(&self, name: &str, status: &str) {
        self.push_snapshot(snapshot_resource(name, status));
    }

    /// Queues a successful label write.
    pub fn push_set_labels(&self) {
        self.label_writes
            .borrow_mut()
            .push_back(Ok(operation("set-labels", "DONE")));
    }

    /// Queues a successful delete.
    pub fn push_delete(&self) {
        self.deletes
            .borrow_mut()
            .push_back(Ok(operation("delete", "PENDING")));
    }

    /// Queues a failing listing.
    pub fn push_list_error(&self, err: GoogleBackendError) {
        self.pages.borrow_mut().push_back(Err(err));
    }

    /// Queues a failing operation read.
    pub fn push_operation_error(&self, err: GoogleBackendError) {
        self.operations.borrow_mut().push_back(Err(err));
    }

    /// Queues a failing create.
    pub fn push_create_error(&self, err: GoogleBackendError) {
        self.creates.borrow_mut().push_back(Err(err));
    }

    /// Queues a failing snapshot read.
    pub fn push_snapshot_error(&self, err: GoogleBackendError) {
        self.snapshots.borrow_mut().push_back(Err(err));
    }

    /// Queues a failing label write.
    pub fn push_set_labels_error(&self, err: GoogleBackendError) {
        self.label_writes.borrow_mut().push_back(Err(err));
    }

    /// Queues a failing delete.
    pub fn push_delete_error(&self, err: GoogleBackendError) {
        self.deletes.borrow_mut().push_back(Err(err));
    }

    fn record(&self, call: ApiCall) {
        self.calls.borrow_mut().push(call);
    }
}

fn next<T>(script: &Script<T>, method: &str) -> Result<T, GoogleBackendError> {
    script
        .borrow_mut()
        .pop_front()
        .unwrap_or_else(|| {
            Err(GoogleBackendError::Transport {
                message: format!("no scripted response available for {method}"),
            })
        })
}

impl ComputeApi for ScriptedComputeApi {
    fn list_snapshots(
        &self,
        project: &str,
        filter: &str,
        page_token: Option<&str>,
    ) -> Result<SnapshotPage, GoogleBackendError> {
        self.record(ApiCall::ListSnapshots {
            project: project.to_owned(),
            filter: filter.to_owned(),
            page_token: page_token.map(str::to_owned),
        });
        next(&self.pages, "list_snapshots")
    }

    fn get_zone_operation(
        &self,
        project: &str,
        zone: &str,
        operation: &str,
    ) -> Result<Operation, GoogleBackendError> {
        self.record(ApiCall::GetZoneOperation {
            project: project.to_owned(),
            zone: zone.to_owned(),
            operation: operation.to_owned(),
        });
        next(&self.operations, "get_zone_operation")
    }

    fn create_disk_snapshot(
        &self,
        project: &str,
        zone: &str,
        disk: &str,
        request: &CreateSnapshotRequest,
    ) -> Result<Operation, GoogleBackendError> {
        self.record(ApiCall::CreateDiskSnapshot {
            project: project.to_owned(),
            zone: zone.to_owned(),
            disk: disk.to_owned(),
            request: request.clone(),
        });
        next(&self.creates, "create_disk_snapshot")
    }

    fn get_snapshot(
        &self,
        project: &str,
        name: &str,
    ) -> Result<SnapshotResource, GoogleBackendError> {
        self.record(ApiCall::GetSnapshot {
            project: project.to_owned(),
            name: name.to_owned(),
        });
        next(&self.snapshots, "get_snapshot")
    }

    fn set_snapshot_labels(
        &self,
        project: &str,
        name: &str,
        request: &SetLabelsRequest,
    ) -> Result<Operation, GoogleBackendError> {
        self.record(ApiCall::SetSnapshotLabels {
            project: project.to_owned(),
            name: name.to_owned(),
            request: request.clone(),
        });
        next(&self.label_writes, "set_snapshot_labels")
    }

    fn delete_snapshot(&self, project: &str, name: &str) -> Result<Operation, GoogleBackendError> {
        self.record(ApiCall::DeleteSnapshot {
            project: project.to_owned(),
            name: name.to_owned(),
        });
        next(&self.deletes, "delete_snapshot")
    }
}

/// Builds an operation resource.
#[must_use]
pub fn operation(name: &str, status: &str) -> Operation {
    Operation {
        name: name.to_owned(),
        status: status.to_owned(),
        error: None,
    }
}

/// Builds a snapshot resource with a fixed creation time, source disk and
/// label fingerprint.
#[must_use]
pub fn snapshot_resource(name: &str, status: &str) -> SnapshotResource {
    SnapshotResource {
        name: name.to_owned(),
        status: status.to_owned(),
        creation_timestamp: String::from("2024-03-07T06:05:09.123-08:00"),
        source_disk: String::from(
            "https://www.googleapis.com/compute/v1/projects/my-project/zones/europe-west1-b/disks/pvc-disk",
        ),
        labels: Labels::new(),
        label_fingerprint: Some(String::from("42WmSpB8rSM=")),
    }
}

/// Describes the fields of a test volume.
#[derive(Clone, Copy, Debug, Default)]
pub struct VolumeFixture<'a> {
    /// Volume name.
    pub name: &'a str,
    /// Value of the provisioner annotation.
    pub provisioner: Option<&'a str>,
    /// Value of the current zone label.
    pub zone: Option<&'a str>,
    /// Value of the legacy zone label.
    pub legacy_zone: Option<&'a str>,
    /// GCE disk name.
    pub pd_name: Option<&'a str>,
}

impl VolumeFixture<'_> {
    /// Builds the volume.
    #[must_use]
    pub fn build(&self) -> PersistentVolume {
        let mut metadata = VolumeMetadata {
            name: self.name.to_owned(),
            ..VolumeMetadata::default()
        };
        if let Some(provisioner) = self.provisioner {
            metadata
                .annotations
                .insert(PROVISIONED_BY_ANNOTATION.to_owned(), provisioner.to_owned());
        }
        if let Some(zone) = self.zone {
            metadata
                .labels
                .insert(ZONE_LABEL.to_owned(), zone.to_owned());
        }
        if let Some(zone) = self.legacy_zone {
            metadata
                .labels
                .insert(LEGACY_ZONE_LABEL.to_owned(), zone.to_owned());
        }
        PersistentVolume {
            metadata,
            spec: VolumeSpec {
                gce_persistent_disk: self.pd_name.map(|pd_name| GcePersistentDiskSource {
                    pd_name: pd_name.to_owned(),
                }),
            },
        }
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: Mutex<()> = Mutex::new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: MutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets and removes environment variables while holding a global mutex.
    /// A `None` value removes the variable.
    pub fn set_vars(pairs: &[(&str, Option<&str>)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().unwrap_or_else(PoisonError::into_inner);
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe {
                match value {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
