//! Snapshot schema migration.

use crate::snapshot::Snapshot;
use crate::StoreError;

pub const LATEST_VERSION: u32 = 1;

pub fn migrate_to_latest(mut snapshot: Snapshot) -> Result<Snapshot, StoreError> {
    if snapshot.version > LATEST_VERSION {
        return Err(StoreError::Migration {
            what: format!(
                "snapshot version {} is newer than supported version {}",
                snapshot.version, LATEST_VERSION
            ),
        });
    }
    while snapshot.version < LATEST_VERSION {
        snapshot = migrate_one_version(snapshot)?;
    }
    Ok(snapshot)
}

fn migrate_one_version(snapshot: Snapshot) -> Result<Snapshot, StoreError> {
    match snapshot.version {
        0 => migrate_v0_to_v1(snapshot),
        v => Err(StoreError::Migration {
            what: format!("No migration path from version {}", v),
        }),
    }
}

/// Version 0 snapshots predate the version field; the layout is
/// otherwise identical.
fn migrate_v0_to_v1(mut snapshot: Snapshot) -> Result<Snapshot, StoreError> {
    snapshot.version = 1;
    Ok(snapshot)
}
