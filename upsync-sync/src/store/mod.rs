//! Object store implementations shipped with the engine.
//!
//! - [`LocalDirStore`]: a directory served by a web server or a mounted bucket
//! - [`MemoryStore`]: in-process store with failure injection, for tests and embedding

mod local;
mod memory;

pub use local::LocalDirStore;
pub use memory::MemoryStore;

/// `<domain>/<key>` without doubled slashes.
pub(crate) fn public_url(domain: &str, key: &str) -> String {
    format!(
        "{}/{}",
        domain.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}
