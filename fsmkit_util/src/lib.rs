mod host;

pub use host::{HostType, KeyIter};
