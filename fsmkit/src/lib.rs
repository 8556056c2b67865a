pub mod context;
pub mod error;

use std::str::FromStr;

use fsmkit_core::{FinishedMachine, FsmCtx, FsmGraph, MachineStats, MinimizeLevel, NfaRound};
use fsmkit_util::HostType;
use tracing::{debug, info};

use crate::context::{Context, Pattern};
use crate::error::DriverError;

/// How the pattern list is compiled.
#[derive(Clone, Debug)]
pub struct Options {
    pub host: HostType,
    pub rounds: Vec<NfaRound>,
    pub minimize: MinimizeLevel,
    /// Largest acceptable number of states of the final machine.
    pub state_limit: Option<usize>,
    pub ignore_case: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            host: HostType::UChar,
            rounds: Vec::new(),
            minimize: MinimizeLevel::End,
            state_limit: None,
            ignore_case: false,
        }
    }
}

/// Parses a round given as `<depth>:<groups>`.
pub fn parse_round(text: &str) -> Result<NfaRound, DriverError> {
    let invalid = || DriverError::InvalidRound(text.to_owned());
    let (depth, groups) = text.split_once(':').ok_or_else(invalid)?;
    let depth = u32::from_str(depth.trim()).map_err(|_| invalid())?;
    let groups = usize::from_str(groups.trim()).map_err(|_| invalid())?;
    if groups < 2 {
        return Err(invalid());
    }
    Ok(NfaRound::new(depth, groups))
}

pub struct Compiled {
    pub ctx: FsmCtx,
    pub fsm: FsmGraph,
}

impl Compiled {
    pub fn finish(&self) -> FinishedMachine {
        self.fsm.finish(&self.ctx)
    }

    pub fn stats(&self) -> MachineStats {
        self.fsm.stats()
    }

    /// Whether the compiled machine matches `word` exactly.
    pub fn matches(&self, word: &[u8]) -> bool {
        let keys = Pattern { line: 0, text: word.to_vec() }.keys(self.ctx.key_ops.host);
        self.fsm.run_keys(&self.ctx, &keys, |_| false)
            .iter()
            .any(|s| self.fsm.is_final(*s))
    }
}

/// Compiles the alternatives of `context` into a single machine.
pub fn run(context: &Context, options: &Options) -> Result<Compiled, DriverError> {
    let patterns = context.patterns()?;
    if patterns.is_empty() {
        return Err(DriverError::EmptyPatternList);
    }

    let mut ctx = FsmCtx::new(options.host)
        .with_minimize(options.minimize)
        .with_nfa_rounds(options.rounds.clone());

    let machines: Vec<FsmGraph> = patterns.iter()
        .map(|p| {
            let keys = p.keys(options.host);
            if options.ignore_case {
                FsmGraph::concat_fsm_ci(&keys)
            } else {
                FsmGraph::concat_fsm(&keys)
            }
        })
        .collect();
    debug!(patterns = machines.len(), host = %options.host, "loaded patterns");

    let mut fsm = FsmGraph::nfa_union(&mut ctx, machines)?;
    if options.minimize != MinimizeLevel::Never {
        fsm.remove_unreachable_states();
        fsm.minimize_partition();
    }

    let states = fsm.state_count();
    info!(states, nfa_transitions = fsm.stats().nfa_transitions, "compiled");
    if let Some(limit) = options.state_limit {
        if states > limit {
            return Err(DriverError::TooManyStates { states, limit });
        }
    }
    Ok(Compiled { ctx, fsm })
}
