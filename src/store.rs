use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::error::{DelegateError, StoreError};
use crate::traits::{Handle, Limits, NvsDelegate, OpenMode};

/// Namespace used when the requested one is empty or too long.
pub const DEFAULT_NAMESPACE: &str = "DEFAULT_NVS";

/// Smallest buffer `error_to_string` writes into.
pub const MIN_ERROR_STRING_LENGTH: usize = 50;

/// Which write operations a store instance accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteContract {
    /// `set` inserts or overwrites.
    #[default]
    Upsert,
    /// `insert` requires the key to be absent, `update` requires it present.
    InsertUpdate,
}

/// KeyValueStore is a string key-value store bound to one namespace of an
/// `NvsDelegate`.
///
/// Every operation validates its arguments first, then runs one
/// open → primitive → commit → close cycle on the delegate and maps the
/// outcome to a `StoreError`. No handle outlives the call that opened it.
///
/// Not thread-safe as a protocol: callers sharing a namespace across threads
/// must serialize operations themselves.
pub struct KeyValueStore {
    delegate: Option<Arc<dyn NvsDelegate>>,
    namespace: String,
    contract: WriteContract,
}

/// Open handle that is closed when dropped.
struct Session<'a> {
    delegate: &'a dyn NvsDelegate,
    handle: Handle,
}

impl Session<'_> {
    /// Length probe. Returns the required size, terminator included.
    fn probe(&self, key: &str) -> Result<usize, StoreError> {
        let mut length = 0;
        self.delegate
            .get_str(self.handle, key, None, &mut length)
            .map_err(map_error)?;
        Ok(length)
    }

    /// Commit staged mutations. Any failure here is reported as `Error`:
    /// the data cannot be assumed durable.
    fn commit(&self) -> Result<(), StoreError> {
        self.delegate.commit(self.handle).map_err(|e| {
            error!("commit failed: {}", e);
            StoreError::Error
        })
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.delegate.close(self.handle);
    }
}

fn map_error(err: DelegateError) -> StoreError {
    match &err {
        DelegateError::KeyNotFound => debug!("{}", err),
        _ => error!("{}", err),
    }
    StoreError::from(err)
}

impl KeyValueStore {
    /// Create a store over `delegate` bound to `namespace`. An invalid
    /// namespace is replaced by `DEFAULT_NAMESPACE`.
    pub fn new(delegate: Arc<dyn NvsDelegate>, namespace: &str) -> Self {
        Self::with_contract(Some(delegate), namespace, WriteContract::default())
    }

    /// Create a store with an explicit write contract. A `None` delegate is
    /// accepted; every operation on such a store fails with `Error`.
    pub fn with_contract(
        delegate: Option<Arc<dyn NvsDelegate>>,
        namespace: &str,
        contract: WriteContract,
    ) -> Self {
        let limits = delegate.as_ref().map(|d| d.limits()).unwrap_or_default();
        let namespace = if limits.namespace_ok(namespace) {
            namespace.to_string()
        } else {
            warn!(
                "namespace {:?} is invalid, using {:?}",
                namespace, DEFAULT_NAMESPACE
            );
            DEFAULT_NAMESPACE.to_string()
        };
        debug!("KeyValueStore created for namespace {:?} ({:?})", namespace, contract);
        Self {
            delegate,
            namespace,
            contract,
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn contract(&self) -> WriteContract {
        self.contract
    }

    /// Read the value of `key` into `buf` as a NUL-terminated string and
    /// return its length (terminator excluded).
    ///
    /// Fails with `ValueInvalid` when `buf` is empty or too small for the
    /// stored value; `buf` is left untouched in that case.
    pub fn get(&self, key: &str, buf: &mut [u8]) -> Result<usize, StoreError> {
        let delegate = self.delegate()?;
        check_key(&delegate.limits(), key)?;
        if buf.is_empty() {
            error!("value buffer is empty");
            return Err(StoreError::ValueInvalid);
        }

        let session = self.open(delegate, OpenMode::ReadOnly)?;
        let required = session.probe(key)?;
        if required > buf.len() {
            warn!(
                "value of {:?} needs {} bytes, buffer holds {}",
                key,
                required,
                buf.len()
            );
            return Err(StoreError::ValueInvalid);
        }

        let mut length = buf.len();
        delegate
            .get_str(session.handle, key, Some(buf), &mut length)
            .map_err(map_error)?;
        trace!("key {:?} retrieved", key);
        Ok(length.saturating_sub(1))
    }

    /// Read the value of `key` into a freshly sized `String`.
    pub fn get_string(&self, key: &str) -> Result<String, StoreError> {
        let delegate = self.delegate()?;
        check_key(&delegate.limits(), key)?;

        let session = self.open(delegate, OpenMode::ReadOnly)?;
        let required = session.probe(key)?;
        let mut buf = vec![0u8; required.max(1)];
        let mut length = buf.len();
        delegate
            .get_str(session.handle, key, Some(&mut buf), &mut length)
            .map_err(map_error)?;

        buf.truncate(length.saturating_sub(1));
        String::from_utf8(buf).map_err(|e| {
            error!("value of {:?} is not UTF-8: {}", key, e);
            StoreError::Error
        })
    }

    /// Set `key` to `value`, overwriting any existing value.
    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        self.require(WriteContract::Upsert, "set")?;
        check_entry(&delegate.limits(), key, value)?;

        let session = self.open(delegate, OpenMode::ReadWrite)?;
        delegate
            .set_str(session.handle, key, value)
            .map_err(map_error)?;
        session.commit()?;
        trace!("key {:?} set", key);
        Ok(())
    }

    /// Add `key`; fails with `KeyAlreadyExists` if it is present.
    pub fn insert(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        self.require(WriteContract::InsertUpdate, "insert")?;
        check_entry(&delegate.limits(), key, value)?;

        let session = self.open(delegate, OpenMode::ReadWrite)?;
        delegate
            .insert_str(session.handle, key, value)
            .map_err(map_error)?;
        session.commit()?;
        trace!("key {:?} inserted", key);
        Ok(())
    }

    /// Replace the value of `key`; fails with `KeyNotFound` if it is absent.
    pub fn update(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        self.require(WriteContract::InsertUpdate, "update")?;
        check_entry(&delegate.limits(), key, value)?;

        let session = self.open(delegate, OpenMode::ReadWrite)?;
        delegate
            .update_str(session.handle, key, value)
            .map_err(map_error)?;
        session.commit()?;
        trace!("key {:?} updated", key);
        Ok(())
    }

    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        check_key(&delegate.limits(), key)?;

        let session = self.open(delegate, OpenMode::ReadWrite)?;
        delegate
            .erase_key(session.handle, key)
            .map_err(map_error)?;
        session.commit()?;
        trace!("key {:?} removed", key);
        Ok(())
    }

    /// Succeeds when `key` holds a value.
    pub fn is_exist(&self, key: &str) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        check_key(&delegate.limits(), key)?;

        let session = self.open(delegate, OpenMode::ReadOnly)?;
        let length = session.probe(key)?;
        // Stored strings always carry a terminator; a zero length means the
        // backend holds nothing usable under this key.
        if length == 0 {
            return Err(map_error(DelegateError::KeyNotFound));
        }
        Ok(())
    }

    /// Size needed to read the value of `key`, terminator included.
    pub fn get_value_length(&self, key: &str) -> Result<usize, StoreError> {
        let delegate = self.delegate()?;
        check_key(&delegate.limits(), key)?;

        let session = self.open(delegate, OpenMode::ReadOnly)?;
        let length = session.probe(key)?;
        trace!("value of {:?} needs {} bytes", key, length);
        Ok(length)
    }

    /// Remove every key in this store's namespace. Other namespaces are not
    /// touched.
    pub fn erase_all(&self) -> Result<(), StoreError> {
        let delegate = self.delegate()?;

        let session = self.open(delegate, OpenMode::ReadWrite)?;
        delegate.erase_all(session.handle).map_err(map_error)?;
        session.commit()?;
        debug!("namespace {:?} erased", self.namespace);
        Ok(())
    }

    /// Destroy and reinitialize the whole storage partition, every namespace
    /// included. This cannot be undone.
    pub fn erase_flash_all(&self) -> Result<(), StoreError> {
        let delegate = self.delegate()?;
        delegate.erase_backend_all().map_err(map_error)?;
        warn!("storage partition erased");
        Ok(())
    }

    /// Write a fixed, NUL-terminated description of an operation outcome
    /// into `buf`. `None` stands for success. Does nothing if `buf` is
    /// shorter than `MIN_ERROR_STRING_LENGTH`.
    pub fn error_to_string(error: Option<StoreError>, buf: &mut [u8]) {
        if buf.len() < MIN_ERROR_STRING_LENGTH {
            return;
        }
        let message = match error {
            None => "No Error.".to_string(),
            Some(err) => err.to_string(),
        };
        let n = message.len().min(buf.len() - 1);
        buf[..n].copy_from_slice(&message.as_bytes()[..n]);
        buf[n..].fill(0);
    }

    fn delegate(&self) -> Result<&dyn NvsDelegate, StoreError> {
        self.delegate.as_deref().ok_or_else(|| {
            error!("no storage delegate configured");
            StoreError::Error
        })
    }

    fn require(&self, contract: WriteContract, op: &str) -> Result<(), StoreError> {
        if self.contract == contract {
            return Ok(());
        }
        error!("{} is not available under the {:?} contract", op, self.contract);
        Err(StoreError::Error)
    }

    fn open<'a>(&self, delegate: &'a dyn NvsDelegate, mode: OpenMode) -> Result<Session<'a>, StoreError> {
        let handle = delegate.open(&self.namespace, mode).map_err(map_error)?;
        Ok(Session { delegate, handle })
    }
}

fn check_key(limits: &Limits, key: &str) -> Result<(), StoreError> {
    if limits.key_ok(key) {
        Ok(())
    } else {
        error!("invalid key {:?}", key);
        Err(StoreError::KeyInvalid)
    }
}

fn check_entry(limits: &Limits, key: &str, value: &str) -> Result<(), StoreError> {
    check_key(limits, key)?;
    if limits.value_ok(value) {
        Ok(())
    } else {
        error!("invalid value ({} bytes) for key {:?}", value.len(), key);
        Err(StoreError::ValueInvalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recording::{Call, Primitive, RecordingDelegate};
    use crate::traits::{MAX_KEY_LENGTH, MAX_VALUE_LENGTH};

    const NS: &str = "TEST_NVS";

    fn test_store() -> (Arc<RecordingDelegate>, KeyValueStore) {
        let delegate = Arc::new(RecordingDelegate::new());
        let store = KeyValueStore::new(delegate.clone(), NS);
        (delegate, store)
    }

    fn strict_store() -> (Arc<RecordingDelegate>, KeyValueStore) {
        let delegate = Arc::new(RecordingDelegate::new());
        let store = KeyValueStore::with_contract(
            Some(delegate.clone() as Arc<dyn NvsDelegate>),
            NS,
            WriteContract::InsertUpdate,
        );
        (delegate, store)
    }

    fn open(mode: OpenMode) -> Call {
        Call::Open { namespace: NS.into(), mode }
    }

    fn probe(handle: Handle, key: &str) -> Call {
        Call::GetStr { handle, key: key.into(), probe: true }
    }

    fn read(handle: Handle, key: &str) -> Call {
        Call::GetStr { handle, key: key.into(), probe: false }
    }

    #[test]
    fn test_namespace_defaulting() {
        let delegate: Arc<dyn NvsDelegate> = Arc::new(RecordingDelegate::new());
        assert_eq!(KeyValueStore::new(delegate.clone(), "").namespace(), DEFAULT_NAMESPACE);
        assert_eq!(
            KeyValueStore::new(delegate.clone(), "0123456789abcdef").namespace(),
            DEFAULT_NAMESPACE
        );
        assert_eq!(
            KeyValueStore::new(delegate.clone(), "0123456789abcde").namespace(),
            "0123456789abcde"
        );
        let detached = KeyValueStore::with_contract(None, "", WriteContract::Upsert);
        assert_eq!(detached.namespace(), DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_get_sequence() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");

        let mut buf = [0u8; 32];
        assert_eq!(store.get("key", &mut buf), Ok(5));
        assert_eq!(&buf[..6], b"value\0");

        let h = Handle(1);
        assert_eq!(
            delegate.calls(),
            vec![open(OpenMode::ReadOnly), probe(h, "key"), read(h, "key"), Call::Close(h)]
        );
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_get_missing_key_closes_handle() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "other", "x");

        let mut buf = [0u8; 32];
        assert_eq!(store.get("key", &mut buf), Err(StoreError::KeyNotFound));
        let h = Handle(1);
        assert_eq!(
            delegate.calls(),
            vec![open(OpenMode::ReadOnly), probe(h, "key"), Call::Close(h)]
        );
    }

    #[test]
    fn test_get_small_buffer_does_not_read() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");

        let mut buf = [0xaau8; 5];
        assert_eq!(store.get("key", &mut buf), Err(StoreError::ValueInvalid));
        assert_eq!(buf, [0xaa; 5]);
        let h = Handle(1);
        assert_eq!(
            delegate.calls(),
            vec![open(OpenMode::ReadOnly), probe(h, "key"), Call::Close(h)]
        );
    }

    #[test]
    fn test_get_validates_before_open() {
        let (delegate, store) = test_store();
        let mut buf = [0u8; 8];
        assert_eq!(store.get("", &mut buf), Err(StoreError::KeyInvalid));
        assert_eq!(
            store.get(&"k".repeat(MAX_KEY_LENGTH), &mut buf),
            Err(StoreError::KeyInvalid)
        );
        assert_eq!(store.get("key", &mut []), Err(StoreError::ValueInvalid));
        assert!(delegate.calls().is_empty());
    }

    #[test]
    fn test_get_open_failure() {
        let (delegate, store) = test_store();
        let mut buf = [0u8; 8];
        // Namespace never written.
        assert_eq!(store.get("key", &mut buf), Err(StoreError::KeyNotFound));
        assert_eq!(delegate.calls(), vec![open(OpenMode::ReadOnly)]);

        delegate.fail_next(Primitive::Open, DelegateError::Storage("io".into()));
        assert_eq!(store.get("key", &mut buf), Err(StoreError::Error));
    }

    #[test]
    fn test_get_probe_failure_still_closes() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");
        delegate.fail_next(Primitive::GetStr, DelegateError::HandleInvalid);
        let mut buf = [0u8; 32];
        assert_eq!(store.get("key", &mut buf), Err(StoreError::Error));
        assert_eq!(delegate.open_handles(), 0);
        assert!(matches!(delegate.calls().last(), Some(Call::Close(_))));
    }

    #[test]
    fn test_get_string() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "hello");
        assert_eq!(store.get_string("key").as_deref(), Ok("hello"));
        assert_eq!(store.get_string("nope"), Err(StoreError::KeyNotFound));
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_set_sequence() {
        let (delegate, store) = test_store();
        assert_eq!(store.set("key", "value"), Ok(()));

        let h = Handle(1);
        assert_eq!(
            delegate.calls(),
            vec![
                open(OpenMode::ReadWrite),
                Call::SetStr { handle: h, key: "key".into(), value: "value".into() },
                Call::Commit(h),
                Call::Close(h),
            ]
        );
        assert_eq!(delegate.value(NS, "key").as_deref(), Some("value"));
    }

    #[test]
    fn test_set_validation() {
        let (delegate, store) = test_store();
        assert_eq!(store.set("", "value"), Err(StoreError::KeyInvalid));
        assert_eq!(store.set("key", ""), Err(StoreError::ValueInvalid));
        assert_eq!(
            store.set("key", &"v".repeat(MAX_VALUE_LENGTH)),
            Err(StoreError::ValueInvalid)
        );
        assert!(delegate.calls().is_empty());
        assert_eq!(store.set("key", &"v".repeat(MAX_VALUE_LENGTH - 1)), Ok(()));
    }

    #[test]
    fn test_validation_follows_delegate_limits() {
        let delegate = Arc::new(RecordingDelegate::with_limits(Limits {
            value_len: 4000,
            ..Limits::default()
        }));
        let store = KeyValueStore::new(delegate.clone(), NS);

        assert_eq!(store.set("blob", &"x".repeat(3999)), Ok(()));
        assert_eq!(delegate.value(NS, "blob").map(|v| v.len()), Some(3999));

        delegate.clear_calls();
        assert_eq!(
            store.set("blob", &"x".repeat(4000)),
            Err(StoreError::ValueInvalid)
        );
        assert!(delegate.calls().is_empty());
    }

    #[test]
    fn test_set_commit_failure_is_error() {
        let (delegate, store) = test_store();
        delegate.fail_next(Primitive::Commit, DelegateError::NotEnoughSpace);
        assert_eq!(store.set("key", "value"), Err(StoreError::Error));
        assert_eq!(delegate.value(NS, "key"), None);
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_set_write_failure_skips_commit() {
        let (delegate, store) = test_store();
        delegate.fail_next(Primitive::SetStr, DelegateError::NotEnoughSpace);
        assert_eq!(store.set("key", "value"), Err(StoreError::NotEnoughSpace));
        let calls = delegate.calls();
        assert!(!calls.iter().any(|c| matches!(c, Call::Commit(_))));
        assert!(matches!(calls.last(), Some(Call::Close(_))));
    }

    #[test]
    fn test_read_only_violation_is_error() {
        let (delegate, store) = test_store();
        delegate.fail_next(Primitive::EraseKey, DelegateError::ReadOnly);
        delegate.seed(NS, "key", "value");
        assert_eq!(store.remove("key"), Err(StoreError::Error));
    }

    #[test]
    fn test_remove() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");
        assert_eq!(store.remove("key"), Ok(()));
        assert_eq!(delegate.value(NS, "key"), None);
        assert_eq!(store.remove("key"), Err(StoreError::KeyNotFound));
        assert_eq!(store.remove(""), Err(StoreError::KeyInvalid));
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_is_exist() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");
        assert_eq!(store.is_exist("key"), Ok(()));
        assert_eq!(store.is_exist("nope"), Err(StoreError::KeyNotFound));
        assert_eq!(store.is_exist(""), Err(StoreError::KeyInvalid));

        delegate.clear_calls();
        store.is_exist("key").unwrap();
        let h = delegate
            .calls()
            .iter()
            .find_map(|c| match c {
                Call::Close(h) => Some(*h),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            delegate.calls(),
            vec![open(OpenMode::ReadOnly), probe(h, "key"), Call::Close(h)]
        );
    }

    #[test]
    fn test_is_exist_zero_length_probe() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");
        delegate.report_probe_length(0);
        assert_eq!(store.is_exist("key"), Err(StoreError::KeyNotFound));
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_get_value_length() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "key", "value");
        assert_eq!(store.get_value_length("key"), Ok(6));
        assert_eq!(store.get_value_length("nope"), Err(StoreError::KeyNotFound));
        assert_eq!(store.get_value_length(""), Err(StoreError::KeyInvalid));
    }

    #[test]
    fn test_erase_all() {
        let (delegate, store) = test_store();
        delegate.seed(NS, "a", "1");
        delegate.seed(NS, "b", "2");
        delegate.seed("OTHER", "a", "3");

        assert_eq!(store.erase_all(), Ok(()));
        assert_eq!(store.erase_all(), Ok(()));
        assert_eq!(delegate.value(NS, "a"), None);
        assert_eq!(delegate.value(NS, "b"), None);
        assert_eq!(delegate.value("OTHER", "a").as_deref(), Some("3"));

        let h = Handle(1);
        assert_eq!(
            delegate.calls()[..4],
            [
                open(OpenMode::ReadWrite),
                Call::EraseAll(h),
                Call::Commit(h),
                Call::Close(h),
            ]
        );
    }

    #[test]
    fn test_erase_flash_all_has_no_handle() {
        let (delegate, store) = test_store();
        delegate.seed("OTHER", "a", "3");
        assert_eq!(store.erase_flash_all(), Ok(()));
        assert_eq!(delegate.calls(), vec![Call::EraseBackendAll]);
        assert_eq!(delegate.value("OTHER", "a"), None);

        delegate.fail_next(Primitive::EraseBackendAll, DelegateError::Storage("flash".into()));
        assert_eq!(store.erase_flash_all(), Err(StoreError::Error));
    }

    #[test]
    fn test_insert_update_contract() {
        let (delegate, store) = strict_store();
        assert_eq!(store.update("key", "v1"), Err(StoreError::KeyNotFound));
        assert_eq!(store.insert("key", "v1"), Ok(()));
        assert_eq!(store.insert("key", "v2"), Err(StoreError::KeyAlreadyExists));
        assert_eq!(delegate.value(NS, "key").as_deref(), Some("v1"));
        assert_eq!(store.update("key", "v3"), Ok(()));
        assert_eq!(delegate.value(NS, "key").as_deref(), Some("v3"));
        assert_eq!(delegate.open_handles(), 0);
    }

    #[test]
    fn test_contract_is_exclusive() {
        let (delegate, store) = test_store();
        assert_eq!(store.insert("key", "value"), Err(StoreError::Error));
        assert_eq!(store.update("key", "value"), Err(StoreError::Error));

        let (strict_delegate, strict) = strict_store();
        assert_eq!(strict.set("key", "value"), Err(StoreError::Error));

        assert!(delegate.calls().is_empty());
        assert!(strict_delegate.calls().is_empty());
    }

    #[test]
    fn test_null_delegate() {
        let store = KeyValueStore::with_contract(None, NS, WriteContract::Upsert);
        let mut buf = [0u8; 8];
        assert_eq!(store.get("key", &mut buf), Err(StoreError::Error));
        assert_eq!(store.get_string("key"), Err(StoreError::Error));
        assert_eq!(store.set("key", "value"), Err(StoreError::Error));
        assert_eq!(store.insert("key", "value"), Err(StoreError::Error));
        assert_eq!(store.update("key", "value"), Err(StoreError::Error));
        assert_eq!(store.remove("key"), Err(StoreError::Error));
        assert_eq!(store.is_exist("key"), Err(StoreError::Error));
        assert_eq!(store.get_value_length("key"), Err(StoreError::Error));
        assert_eq!(store.erase_all(), Err(StoreError::Error));
        assert_eq!(store.erase_flash_all(), Err(StoreError::Error));
        // Invalid arguments still report the missing delegate first.
        assert_eq!(store.set("", ""), Err(StoreError::Error));
    }

    #[test]
    fn test_error_to_string() {
        let mut buf = [0xffu8; 64];
        KeyValueStore::error_to_string(None, &mut buf);
        assert!(buf.starts_with(b"No Error.\0"));

        KeyValueStore::error_to_string(Some(StoreError::KeyNotFound), &mut buf);
        assert!(buf.starts_with(b"Key not found.\0"));

        KeyValueStore::error_to_string(Some(StoreError::Error), &mut buf);
        assert!(buf.starts_with(b"Internal Error.\0"));

        let mut small = [0xffu8; MIN_ERROR_STRING_LENGTH - 1];
        KeyValueStore::error_to_string(Some(StoreError::KeyInvalid), &mut small);
        assert!(small.iter().all(|b| *b == 0xff));
    }

    #[test]
    fn test_scenario() {
        let (_delegate, store) = test_store();
        let mut buf = [0u8; 50];
        assert_eq!(store.set("bbbbbbb", "lll"), Ok(()));
        assert_eq!(store.get("bbbbbbb", &mut buf), Ok(3));
        assert_eq!(&buf[..4], b"lll\0");
        assert_eq!(store.remove("bbbbbbb"), Ok(()));
        assert_eq!(store.get("bbbbbbb", &mut buf), Err(StoreError::KeyNotFound));
    }
}
