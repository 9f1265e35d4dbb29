// ── Resource storage ──

pub(crate) mod collection;
mod watch;

pub(crate) use collection::ResourceCollection;
pub use watch::{ResourceWatch, Snapshot};
