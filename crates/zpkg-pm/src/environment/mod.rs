//! Search-path variable maintenance across machine, user and process scopes.

mod path_list;
mod store;

pub use path_list::{EnvironmentUpdate, PathChange, PathListEnvironment, DEFAULT_SEPARATOR, PATH_KEY};
pub use store::{
    EnvironmentScope, EnvironmentStores, JsonFileStore, KeyValueStore, MemoryStore, ProcessEnvironment,
};
