//! Construction core for finite state machines over integer alphabets.
//!
//! Machines are built from leaf machines with the regular operators, get
//! actions, priorities and run-time conditions embedded, and are finally
//! flattened for a code generator. Every machine of one construction session
//! shares an [`FsmCtx`].

pub mod action;
pub mod cond;
mod condition;
pub mod ctx;
mod embed;
pub mod error;
mod exec;
pub mod export;
pub mod graph;
pub mod key;
pub mod merge;
pub mod nfa;
mod ops;
mod reduce;
pub mod util;

#[cfg(test)]
mod test_util;

pub use action::{ActionId, ActionTable, PriorDesc, PriorTable};
pub use cond::{CondKey, CondSet, CondSpace, CondSpaceId, KeySpaceAllocator};
pub use ctx::{FsmCtx, MinimizeLevel};
pub use error::{FsmError, Result};
pub use export::{FinishedMachine, MachineStats};
pub use graph::{EntryId, FsmGraph, State, StateId};
pub use key::{Key, KeyOps};
pub use nfa::{NfaRepeatActions, NfaRound};
