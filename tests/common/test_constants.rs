//! Shared constants for integration tests.
//!
//! Integration tests are compiled as separate crates (one per top-level file in
//! `tests/`). Placing shared constants under `tests/common/` avoids creating an
//! additional integration test binary while still allowing reuse via:
//!
//! ```rust
//! #[path = "common/test_constants.rs"]
//! mod test_constants;
//! ```

/// Project used by scripted backends.
pub const PROJECT: &str = "my-project";

/// Zone of the scripted disk.
pub const ZONE: &str = "europe-west1-b";

/// Name of the scripted snapshot.
pub const SNAPSHOT_NAME: &str = "pvc-disk-070324-140509";

/// Name of the scripted creation operation.
pub const OPERATION_NAME: &str = "operation-1709820309-abc";
