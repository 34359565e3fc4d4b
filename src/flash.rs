use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use redb::{Database, ReadableTable, TableDefinition, TableError, TableHandle};
use tracing::{debug, info, trace};

use crate::error::DelegateError;
use crate::session::{Session, Sessions, copy_out};
use crate::traits::{Handle, Limits, NvsDelegate, OpenMode};

/// Bytes per partition entry.
pub const ENTRY_SIZE: usize = 32;
/// Entries in a 4 KiB flash page, minus the page header and bitmap.
pub const ENTRIES_PER_PAGE: usize = 126;
/// Default partition geometry: four usable pages.
pub const DEFAULT_PARTITION_ENTRIES: usize = 4 * ENTRIES_PER_PAGE;

type Namespace<'a> = TableDefinition<'a, &'static str, &'static str>;

/// Number of partition entries a stored string occupies: one header entry
/// plus the data entries holding the value and its terminator.
pub fn entry_span(value: &str) -> usize {
    1 + (value.len() + 1).div_ceil(ENTRY_SIZE)
}

/// FlashDelegate binds the NVS primitives to an emulated flash partition
/// backed by redb, a pure-Rust embedded database.
///
/// Each namespace is a redb table. Mutations are staged per handle and
/// written in a single write transaction on `commit`, so an uncommitted
/// session never changes the partition.
pub struct FlashDelegate {
    db: Database,
    partition_entries: usize,
    limits: Limits,
    sessions: Mutex<Sessions>,
}

impl FlashDelegate {
    /// Open or create a partition image at `path`.
    pub fn mount(path: &Path, partition_entries: usize, limits: Limits) -> Result<Self, DelegateError> {
        let db = Database::create(path).map_err(|e| DelegateError::Storage(e.to_string()))?;
        debug!(
            "FlashDelegate: mounted {:?} ({} entries, values < {} bytes)",
            path, partition_entries, limits.value_len
        );
        Ok(Self {
            db,
            partition_entries,
            limits,
            sessions: Mutex::new(Sessions::default()),
        })
    }

    /// Mount with the default geometry and limits.
    pub fn mount_default(path: &Path) -> Result<Self, DelegateError> {
        Self::mount(path, DEFAULT_PARTITION_ENTRIES, Limits::default())
    }

    /// Entries currently used by committed data across all namespaces.
    pub fn used_entries(&self) -> Result<usize, DelegateError> {
        let mut used = 0;
        for name in self.namespaces()? {
            used += self.read_namespace(&name)?.values().map(|v| entry_span(v)).sum::<usize>();
        }
        Ok(used)
    }

    pub fn partition_entries(&self) -> usize {
        self.partition_entries
    }

    fn sessions(&self) -> MutexGuard<'_, Sessions> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn namespaces(&self) -> Result<Vec<String>, DelegateError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        let tables = read_txn
            .list_tables()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        Ok(tables.map(|t| t.name().to_string()).collect())
    }

    fn read_committed(&self, namespace: &str, key: &str) -> Result<Option<String>, DelegateError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        let table = match read_txn.open_table(Namespace::new(namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(None),
            Err(e) => return Err(DelegateError::Storage(e.to_string())),
        };
        match table.get(key) {
            Ok(Some(val)) => Ok(Some(val.value().to_string())),
            Ok(None) => Ok(None),
            Err(e) => Err(DelegateError::Storage(e.to_string())),
        }
    }

    fn read_namespace(&self, namespace: &str) -> Result<BTreeMap<String, String>, DelegateError> {
        let read_txn = self
            .db
            .begin_read()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        let table = match read_txn.open_table(Namespace::new(namespace)) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return Ok(BTreeMap::new()),
            Err(e) => return Err(DelegateError::Storage(e.to_string())),
        };

        let mut entries = BTreeMap::new();
        let iter = table
            .iter()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        for entry in iter {
            let entry = entry.map_err(|e| DelegateError::Storage(e.to_string()))?;
            entries.insert(entry.0.value().to_string(), entry.1.value().to_string());
        }
        Ok(entries)
    }

    fn lookup(&self, session: &Session, key: &str) -> Result<Option<String>, DelegateError> {
        match session.staged(key) {
            Some(value) => Ok(value.map(str::to_string)),
            None => self.read_committed(session.namespace(), key),
        }
    }

    /// Partition usage if `key = value` were committed together with
    /// everything already staged in `session`.
    fn projected_entries(&self, session: &Session, key: &str, value: &str) -> Result<usize, DelegateError> {
        let mut used = 0;
        for name in self.namespaces()? {
            if name != session.namespace() {
                used += self.read_namespace(&name)?.values().map(|v| entry_span(v)).sum::<usize>();
            }
        }

        let mut own = if session.is_cleared() {
            BTreeMap::new()
        } else {
            self.read_namespace(session.namespace())?
        };
        for (k, v) in session.staged_entries() {
            match v {
                Some(v) => {
                    own.insert(k.to_string(), v.to_string());
                }
                None => {
                    own.remove(k);
                }
            }
        }
        own.insert(key.to_string(), value.to_string());
        used += own.values().map(|v| entry_span(v)).sum::<usize>();
        Ok(used)
    }
}

impl NvsDelegate for FlashDelegate {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn open(&self, namespace: &str, mode: OpenMode) -> Result<Handle, DelegateError> {
        if !self.limits.namespace_ok(namespace) {
            return Err(DelegateError::NamespaceInvalid);
        }

        match mode {
            OpenMode::ReadOnly => {
                let read_txn = self
                    .db
                    .begin_read()
                    .map_err(|e| DelegateError::Storage(e.to_string()))?;
                match read_txn.open_table(Namespace::new(namespace)) {
                    Ok(_) => {}
                    Err(TableError::TableDoesNotExist(_)) => return Err(DelegateError::KeyNotFound),
                    Err(e) => return Err(DelegateError::Storage(e.to_string())),
                }
            }
            OpenMode::ReadWrite => {
                // Creating the table registers the namespace on first use.
                let write_txn = self
                    .db
                    .begin_write()
                    .map_err(|e| DelegateError::Storage(e.to_string()))?;
                {
                    let _table = write_txn
                        .open_table(Namespace::new(namespace))
                        .map_err(|e| DelegateError::Storage(e.to_string()))?;
                }
                write_txn
                    .commit()
                    .map_err(|e| DelegateError::Storage(e.to_string()))?;
            }
        }

        let handle = self.sessions().insert(Session::new(namespace, mode));
        trace!("FlashDelegate: opened {:?} as {:?} ({:?})", namespace, handle, mode);
        Ok(handle)
    }

    fn close(&self, handle: Handle) {
        trace!("FlashDelegate: closing {:?}", handle);
        self.sessions().remove(handle);
    }

    fn set_str(&self, handle: Handle, key: &str, value: &str) -> Result<(), DelegateError> {
        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }
        if !self.limits.value_ok(value) {
            return Err(DelegateError::ValueInvalid);
        }

        let mut sessions = self.sessions();
        let session = sessions.get_mut(handle)?;
        session.ensure_writable()?;

        let projected = self.projected_entries(session, key, value)?;
        if projected > self.partition_entries {
            debug!(
                "FlashDelegate: {:?} needs {} entries, partition has {}",
                key, projected, self.partition_entries
            );
            return Err(DelegateError::NotEnoughSpace);
        }

        trace!("FlashDelegate: staging {:?} in {:?}", key, session.namespace());
        session.stage_set(key, value);
        Ok(())
    }

    fn get_str(
        &self,
        handle: Handle,
        key: &str,
        out: Option<&mut [u8]>,
        length: &mut usize,
    ) -> Result<(), DelegateError> {
        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }

        let sessions = self.sessions();
        let session = sessions.get(handle)?;
        match self.lookup(session, key)? {
            Some(value) => copy_out(&value, out, length),
            None => Err(DelegateError::KeyNotFound),
        }
    }

    fn erase_key(&self, handle: Handle, key: &str) -> Result<(), DelegateError> {
        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }

        let mut sessions = self.sessions();
        let session = sessions.get_mut(handle)?;
        session.ensure_writable()?;
        if self.lookup(session, key)?.is_none() {
            return Err(DelegateError::KeyNotFound);
        }
        session.stage_erase(key);
        Ok(())
    }

    fn erase_all(&self, handle: Handle) -> Result<(), DelegateError> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(handle)?;
        session.ensure_writable()?;
        session.stage_erase_all();
        Ok(())
    }

    fn erase_backend_all(&self) -> Result<(), DelegateError> {
        let names = self.namespaces()?;

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        for name in &names {
            write_txn
                .delete_table(Namespace::new(name))
                .map_err(|e| DelegateError::Storage(e.to_string()))?;
        }
        write_txn
            .commit()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;

        self.sessions().clear();
        info!("FlashDelegate: partition erased ({} namespaces)", names.len());
        Ok(())
    }

    fn commit(&self, handle: Handle) -> Result<(), DelegateError> {
        let mut sessions = self.sessions();
        let session = sessions.get_mut(handle)?;
        session.ensure_writable()?;

        let namespace = session.namespace().to_string();
        let changes = session.take_changes();
        if changes.is_empty() {
            return Ok(());
        }

        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;
        {
            if changes.cleared {
                write_txn
                    .delete_table(Namespace::new(&namespace))
                    .map_err(|e| DelegateError::Storage(e.to_string()))?;
            }
            let mut table = write_txn
                .open_table(Namespace::new(&namespace))
                .map_err(|e| DelegateError::Storage(e.to_string()))?;
            for (key, value) in &changes.staged {
                match value {
                    Some(v) => {
                        table
                            .insert(key.as_str(), v.as_str())
                            .map_err(|e| DelegateError::Storage(e.to_string()))?;
                    }
                    None => {
                        table
                            .remove(key.as_str())
                            .map_err(|e| DelegateError::Storage(e.to_string()))?;
                    }
                }
            }
        }
        write_txn
            .commit()
            .map_err(|e| DelegateError::Storage(e.to_string()))?;

        trace!(
            "FlashDelegate: committed {} change(s) to {:?}",
            changes.staged.len(),
            namespace
        );
        Ok(())
    }
}
