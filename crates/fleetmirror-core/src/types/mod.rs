pub mod change;
pub mod document;

pub use change::{ChangeKind, RemoteChange, Version, NO_VERSION};
pub use document::{DocId, Document};
