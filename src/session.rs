use std::collections::{BTreeMap, HashMap};

use crate::error::DelegateError;
use crate::traits::{Handle, OpenMode};

/// Session is the state behind one open handle: the namespace it is bound
/// to, its access mode, and a staging layer of uncommitted mutations.
///
/// The staging layer shadows the committed namespace the same way a
/// read-only overlay shadows a database: a staged entry wins, `None` marks a
/// staged removal, and after `erase_all` anything not staged reads as absent.
#[derive(Debug)]
pub(crate) struct Session {
    namespace: String,
    mode: OpenMode,
    staged: BTreeMap<String, Option<String>>,
    cleared: bool,
}

/// Mutations drained from a session at commit time.
#[derive(Debug, Default)]
pub(crate) struct Changes {
    pub cleared: bool,
    pub staged: BTreeMap<String, Option<String>>,
}

impl Changes {
    pub fn is_empty(&self) -> bool {
        !self.cleared && self.staged.is_empty()
    }

    /// Apply to an in-memory namespace.
    pub fn apply(self, entries: &mut BTreeMap<String, String>) {
        if self.cleared {
            entries.clear();
        }
        for (key, value) in self.staged {
            match value {
                Some(v) => {
                    entries.insert(key, v);
                }
                None => {
                    entries.remove(&key);
                }
            }
        }
    }
}

impl Session {
    pub fn new(namespace: &str, mode: OpenMode) -> Self {
        Self {
            namespace: namespace.to_string(),
            mode,
            staged: BTreeMap::new(),
            cleared: false,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn is_cleared(&self) -> bool {
        self.cleared
    }

    pub fn ensure_writable(&self) -> Result<(), DelegateError> {
        match self.mode {
            OpenMode::ReadWrite => Ok(()),
            OpenMode::ReadOnly => Err(DelegateError::ReadOnly),
        }
    }

    /// Resolve a key against the staging layer only.
    ///
    /// `Some(v)` means the session decides the answer (`v == None` is a
    /// staged removal); `None` means the committed namespace must be read.
    pub fn staged(&self, key: &str) -> Option<Option<&str>> {
        match self.staged.get(key) {
            Some(value) => Some(value.as_deref()),
            None if self.cleared => Some(None),
            None => None,
        }
    }

    pub fn staged_entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.staged.iter().map(|(k, v)| (k.as_str(), v.as_deref()))
    }

    pub fn stage_set(&mut self, key: &str, value: &str) {
        self.staged.insert(key.to_string(), Some(value.to_string()));
    }

    pub fn stage_erase(&mut self, key: &str) {
        self.staged.insert(key.to_string(), None);
    }

    pub fn stage_erase_all(&mut self) {
        self.staged.clear();
        self.cleared = true;
    }

    pub fn take_changes(&mut self) -> Changes {
        let changes = Changes {
            cleared: self.cleared,
            staged: std::mem::take(&mut self.staged),
        };
        self.cleared = false;
        changes
    }
}

/// Table of open sessions keyed by handle. Handle 0 is never issued.
#[derive(Debug, Default)]
pub(crate) struct Sessions {
    next: u32,
    open: HashMap<u32, Session>,
}

impl Sessions {
    pub fn insert(&mut self, session: Session) -> Handle {
        self.next = self.next.wrapping_add(1).max(1);
        while self.open.contains_key(&self.next) {
            self.next = self.next.wrapping_add(1).max(1);
        }
        self.open.insert(self.next, session);
        Handle(self.next)
    }

    pub fn get(&self, handle: Handle) -> Result<&Session, DelegateError> {
        self.open.get(&handle.0).ok_or(DelegateError::HandleInvalid)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Result<&mut Session, DelegateError> {
        self.open
            .get_mut(&handle.0)
            .ok_or(DelegateError::HandleInvalid)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<Session> {
        self.open.remove(&handle.0)
    }

    pub fn clear(&mut self) {
        self.open.clear();
    }

    pub fn len(&self) -> usize {
        self.open.len()
    }
}

/// Copy `value` out following the `get_str` probe/read contract.
pub(crate) fn copy_out(
    value: &str,
    out: Option<&mut [u8]>,
    length: &mut usize,
) -> Result<(), DelegateError> {
    let required = value.len() + 1;
    let Some(buf) = out else {
        *length = required;
        return Ok(());
    };
    if *length < required || buf.len() < required {
        return Err(DelegateError::ValueInvalid);
    }
    buf[..value.len()].copy_from_slice(value.as_bytes());
    buf[value.len()] = 0;
    *length = required;
    Ok(())
}
