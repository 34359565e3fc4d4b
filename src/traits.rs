use crate::error::DelegateError;

/// Maximum namespace length, including the terminator.
pub const MAX_NAMESPACE_LENGTH: usize = 16;
/// Maximum key length, including the terminator.
pub const MAX_KEY_LENGTH: usize = 16;
/// Maximum value length, including the terminator.
pub const MAX_VALUE_LENGTH: usize = 1024;

/// Opaque token for an open namespace session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpenMode {
    ReadOnly,
    ReadWrite,
}

/// Size bounds enforced by a backend. Every bound is exclusive and counts the
/// string terminator, so a key is valid when `1 <= key.len() < key_len`.
/// Strings are stored NUL-terminated, so an interior `'\0'` is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub namespace_len: usize,
    pub key_len: usize,
    pub value_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            namespace_len: MAX_NAMESPACE_LENGTH,
            key_len: MAX_KEY_LENGTH,
            value_len: MAX_VALUE_LENGTH,
        }
    }
}

impl Limits {
    pub fn namespace_ok(&self, name: &str) -> bool {
        c_str_fits(name, self.namespace_len)
    }

    pub fn key_ok(&self, key: &str) -> bool {
        c_str_fits(key, self.key_len)
    }

    pub fn value_ok(&self, value: &str) -> bool {
        c_str_fits(value, self.value_len)
    }
}

fn c_str_fits(s: &str, bound: usize) -> bool {
    !s.is_empty() && s.len() < bound && !s.as_bytes().contains(&0)
}

/// NvsDelegate exposes the primitive, handle-scoped operations of a
/// non-volatile string store.
///
/// A handle moves `Closed -> open -> Open -> close -> Closed`. Mutations and
/// `commit` are only accepted on `ReadWrite` handles; mutations that are not
/// committed before `close` are discarded.
pub trait NvsDelegate: Send + Sync {
    /// Bounds this backend enforces on names, keys and values.
    fn limits(&self) -> Limits {
        Limits::default()
    }

    /// Open a session on `namespace`. Opening a namespace that was never
    /// written fails with `KeyNotFound` in `ReadOnly` mode and creates it in
    /// `ReadWrite` mode.
    fn open(&self, namespace: &str, mode: OpenMode) -> Result<Handle, DelegateError>;

    /// Release a handle. Unknown handles are ignored.
    fn close(&self, handle: Handle);

    /// Stage `key = value`, overwriting any existing value.
    fn set_str(&self, handle: Handle, key: &str, value: &str) -> Result<(), DelegateError>;

    /// Read a string value.
    ///
    /// With `out == None` this is a length probe: on success `length` holds
    /// the required buffer size, terminator included. With a buffer, `length`
    /// is the usable capacity on input and the copied size on output; the
    /// copy is terminated with a NUL byte.
    fn get_str(
        &self,
        handle: Handle,
        key: &str,
        out: Option<&mut [u8]>,
        length: &mut usize,
    ) -> Result<(), DelegateError>;

    /// Stage removal of one key. Fails with `KeyNotFound` if it is absent.
    fn erase_key(&self, handle: Handle, key: &str) -> Result<(), DelegateError>;

    /// Stage removal of every key in the handle's namespace.
    fn erase_all(&self, handle: Handle) -> Result<(), DelegateError>;

    /// Destroy and reinitialize the whole partition, all namespaces included.
    /// Not reversible. Open handles become invalid.
    fn erase_backend_all(&self) -> Result<(), DelegateError>;

    /// Persist every staged mutation of the handle atomically.
    fn commit(&self, handle: Handle) -> Result<(), DelegateError>;

    /// Stage `key = value` only if the key is absent.
    fn insert_str(&self, handle: Handle, key: &str, value: &str) -> Result<(), DelegateError> {
        let mut length = 0;
        match self.get_str(handle, key, None, &mut length) {
            Ok(()) => Err(DelegateError::KeyAlreadyExists),
            Err(DelegateError::KeyNotFound) => self.set_str(handle, key, value),
            Err(e) => Err(e),
        }
    }

    /// Stage `key = value` only if the key is present.
    fn update_str(&self, handle: Handle, key: &str, value: &str) -> Result<(), DelegateError> {
        let mut length = 0;
        self.get_str(handle, key, None, &mut length)?;
        self.set_str(handle, key, value)
    }
}
