use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::DelegateError;
use crate::session::{Session, Sessions, copy_out};
use crate::traits::{Handle, Limits, NvsDelegate, OpenMode};

/// One primitive call observed by a `RecordingDelegate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Open { namespace: String, mode: OpenMode },
    Close(Handle),
    SetStr { handle: Handle, key: String, value: String },
    GetStr { handle: Handle, key: String, probe: bool },
    EraseKey { handle: Handle, key: String },
    EraseAll(Handle),
    EraseBackendAll,
    Commit(Handle),
}

/// Primitive selector for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Open,
    SetStr,
    GetStr,
    EraseKey,
    EraseAll,
    EraseBackendAll,
    Commit,
}

#[derive(Default)]
struct State {
    namespaces: BTreeMap<String, BTreeMap<String, String>>,
    sessions: Sessions,
    journal: Vec<Call>,
    failures: HashMap<Primitive, VecDeque<DelegateError>>,
    probe_lengths: VecDeque<usize>,
}

impl State {
    fn injected(&mut self, primitive: Primitive) -> Result<(), DelegateError> {
        match self.failures.get_mut(&primitive).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn lookup(&self, session: &Session, key: &str) -> Option<String> {
        match session.staged(key) {
            Some(value) => value.map(str::to_string),
            None => self
                .namespaces
                .get(session.namespace())
                .and_then(|entries| entries.get(key))
                .cloned(),
        }
    }
}

/// RecordingDelegate is an in-memory `NvsDelegate` that journals every
/// primitive call so tests can verify how a caller sequences them.
///
/// It behaves like the flash binding (namespace creation on read-write open,
/// staged writes applied on commit, read-only enforcement) and can be told
/// to fail the next call of a given primitive.
pub struct RecordingDelegate {
    limits: Limits,
    state: Mutex<State>,
}

impl Default for RecordingDelegate {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDelegate {
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    pub fn with_limits(limits: Limits) -> Self {
        Self {
            limits,
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a committed value directly, bypassing the journal.
    pub fn seed(&self, namespace: &str, key: &str, value: &str) {
        self.state()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    /// Committed value of `key`, if any.
    pub fn value(&self, namespace: &str, key: &str) -> Option<String> {
        self.state()
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .cloned()
    }

    /// Make the next call of `primitive` fail with `err`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, primitive: Primitive, err: DelegateError) {
        self.state()
            .failures
            .entry(primitive)
            .or_default()
            .push_back(err);
    }

    /// Make the next successful length probe report `length` instead of the
    /// stored value's size.
    pub fn report_probe_length(&self, length: usize) {
        self.state().probe_lengths.push_back(length);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().journal.clone()
    }

    pub fn clear_calls(&self) {
        self.state().journal.clear();
    }

    /// Handles opened and not yet closed.
    pub fn open_handles(&self) -> usize {
        self.state().sessions.len()
    }
}

impl NvsDelegate for RecordingDelegate {
    fn limits(&self) -> Limits {
        self.limits
    }

    fn open(&self, namespace: &str, mode: OpenMode) -> Result<Handle, DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::Open {
            namespace: namespace.to_string(),
            mode,
        });
        state.injected(Primitive::Open)?;

        if !self.limits.namespace_ok(namespace) {
            return Err(DelegateError::NamespaceInvalid);
        }
        match mode {
            OpenMode::ReadOnly if !state.namespaces.contains_key(namespace) => {
                return Err(DelegateError::KeyNotFound);
            }
            OpenMode::ReadOnly => {}
            OpenMode::ReadWrite => {
                state.namespaces.entry(namespace.to_string()).or_default();
            }
        }
        Ok(state.sessions.insert(Session::new(namespace, mode)))
    }

    fn close(&self, handle: Handle) {
        let mut state = self.state();
        state.journal.push(Call::Close(handle));
        state.sessions.remove(handle);
    }

    fn set_str(&self, handle: Handle, key: &str, value: &str) -> Result<(), DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::SetStr {
            handle,
            key: key.to_string(),
            value: value.to_string(),
        });
        state.injected(Primitive::SetStr)?;

        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }
        if !self.limits.value_ok(value) {
            return Err(DelegateError::ValueInvalid);
        }
        let session = state.sessions.get_mut(handle)?;
        session.ensure_writable()?;
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
        let mut state = self.state();
        state.journal.push(Call::GetStr {
            handle,
            key: key.to_string(),
            probe: out.is_none(),
        });
        state.injected(Primitive::GetStr)?;

        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }
        let session = state.sessions.get(handle)?;
        let value = state.lookup(session, key).ok_or(DelegateError::KeyNotFound)?;
        let probe = out.is_none();
        copy_out(&value, out, length)?;
        if probe {
            if let Some(reported) = state.probe_lengths.pop_front() {
                *length = reported;
            }
        }
        Ok(())
    }

    fn erase_key(&self, handle: Handle, key: &str) -> Result<(), DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::EraseKey {
            handle,
            key: key.to_string(),
        });
        state.injected(Primitive::EraseKey)?;

        if !self.limits.key_ok(key) {
            return Err(DelegateError::KeyInvalid);
        }
        let session = state.sessions.get(handle)?;
        session.ensure_writable()?;
        if state.lookup(session, key).is_none() {
            return Err(DelegateError::KeyNotFound);
        }
        state.sessions.get_mut(handle)?.stage_erase(key);
        Ok(())
    }

    fn erase_all(&self, handle: Handle) -> Result<(), DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::EraseAll(handle));
        state.injected(Primitive::EraseAll)?;

        let session = state.sessions.get_mut(handle)?;
        session.ensure_writable()?;
        session.stage_erase_all();
        Ok(())
    }

    fn erase_backend_all(&self) -> Result<(), DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::EraseBackendAll);
        state.injected(Primitive::EraseBackendAll)?;

        state.namespaces.clear();
        state.sessions.clear();
        Ok(())
    }

    fn commit(&self, handle: Handle) -> Result<(), DelegateError> {
        let mut state = self.state();
        state.journal.push(Call::Commit(handle));
        state.injected(Primitive::Commit)?;

        let session = state.sessions.get_mut(handle)?;
        session.ensure_writable()?;
        let namespace = session.namespace().to_string();
        let changes = session.take_changes();
        changes.apply(state.namespaces.entry(namespace).or_default());
        Ok(())
    }
}
