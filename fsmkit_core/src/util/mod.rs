mod mutils;
mod state_set;

pub use mutils::{IndexTwice, index_twice};
pub use state_set::StateSet;
