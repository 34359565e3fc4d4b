pub mod config;
pub mod error;
pub mod flash;
pub mod recording;
mod session;
pub mod store;
pub mod traits;

pub use config::{FlashConfig, StoreConfig};
pub use error::{ConfigError, DelegateError, StoreError};
pub use flash::FlashDelegate;
pub use recording::{Call, Primitive, RecordingDelegate};
pub use store::{DEFAULT_NAMESPACE, KeyValueStore, WriteContract};
pub use traits::{Handle, Limits, NvsDelegate, OpenMode};
