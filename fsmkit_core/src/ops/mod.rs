//! Regular operators over [`FsmGraph`](crate::graph::FsmGraph).
//!
//! Every binary operator consumes its right-hand machine and leaves the result
//! in the left one. On error the machine is left half-built and must be
//! discarded.

mod builders;
mod epsilon;
mod regular;
mod repeat;
