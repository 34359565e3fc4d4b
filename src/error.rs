use thiserror::Error;

/// Outcome of a backend primitive that did not succeed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DelegateError {
    #[error("invalid key")]
    KeyInvalid,

    #[error("invalid value")]
    ValueInvalid,

    #[error("invalid namespace name")]
    NamespaceInvalid,

    #[error("invalid namespace handle")]
    HandleInvalid,

    #[error("attempt to write in read-only mode")]
    ReadOnly,

    #[error("key not found")]
    KeyNotFound,

    #[error("key already exists")]
    KeyAlreadyExists,

    #[error("not enough space")]
    NotEnoughSpace,

    #[error("storage error: {0}")]
    Storage(String),
}

/// Backend-neutral error surfaced by `KeyValueStore`.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreError {
    #[error("Key is invalid.")]
    KeyInvalid,

    #[error("Value is invalid.")]
    ValueInvalid,

    #[error("Key not found.")]
    KeyNotFound,

    #[error("Key already exists.")]
    KeyAlreadyExists,

    #[error("Namespace is invalid.")]
    NamespaceInvalid,

    #[error("Not enough space.")]
    NotEnoughSpace,

    #[error("Internal Error.")]
    Error,
}

impl StoreError {
    /// Stable numeric code. Zero is reserved for success.
    pub fn code(self) -> u8 {
        match self {
            StoreError::KeyInvalid => 1,
            StoreError::ValueInvalid => 2,
            StoreError::KeyNotFound => 3,
            StoreError::KeyAlreadyExists => 4,
            StoreError::NamespaceInvalid => 5,
            StoreError::NotEnoughSpace => 6,
            StoreError::Error => 7,
        }
    }
}

impl From<DelegateError> for StoreError {
    fn from(err: DelegateError) -> Self {
        match err {
            DelegateError::KeyInvalid => StoreError::KeyInvalid,
            DelegateError::ValueInvalid => StoreError::ValueInvalid,
            DelegateError::NamespaceInvalid => StoreError::NamespaceInvalid,
            DelegateError::KeyNotFound => StoreError::KeyNotFound,
            DelegateError::KeyAlreadyExists => StoreError::KeyAlreadyExists,
            DelegateError::NotEnoughSpace => StoreError::NotEnoughSpace,
            DelegateError::HandleInvalid
            | DelegateError::ReadOnly
            | DelegateError::Storage(_) => StoreError::Error,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("storage error: {0}")]
    Storage(#[from] DelegateError),
}
