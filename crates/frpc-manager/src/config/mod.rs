//! Configuration document model and persistence.

mod error;
mod model;
mod store;

pub use error::{StoreError, StoreResult};
pub use model::{
    ConfigDocument, ConfigOverrides, ConfigValue, DEFAULT_PROXY_TYPE, DEFAULT_SERVER_PORT,
    ProxyEntry, Settings,
};
pub use store::{ConfigStore, JsonConfigStore};
