use std::path::PathBuf;

use anyhow::{anyhow, Context as _};
use clap::{Parser, ValueEnum};
use fsmkit::context::{Context, TextProvider};
use fsmkit::{parse_round, run, Options};
use fsmkit_core::{MinimizeLevel, NfaRound};
use fsmkit_util::HostType;
use tracing_subscriber::EnvFilter;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Emit {
    Json,
    Stats,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Minimize {
    Never,
    End,
    Every,
}

/// Compiles a list of literal patterns into a single state machine.
#[derive(Debug, Parser)]
#[command(name = "fsmkit", version)]
struct Args {
    /// File with one pattern per line.
    patterns: PathBuf,
    /// Union round as <depth>:<groups>, repeatable.
    #[arg(long = "round", value_parser = parse_round_arg)]
    rounds: Vec<NfaRound>,
    /// Alphabet type (char, uchar, short, ushort, int, uint, long).
    #[arg(long, default_value = "uchar", value_parser = parse_host)]
    alphtype: HostType,
    /// Fail when the machine has more states than this.
    #[arg(long)]
    state_limit: Option<usize>,
    #[arg(long, value_enum, default_value = "end")]
    minimize: Minimize,
    #[arg(short = 'i', long)]
    ignore_case: bool,
    #[arg(long, value_enum, default_value = "stats")]
    emit: Emit,
    /// Check these words against the machine.
    #[arg(long = "check")]
    check: Vec<String>,
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn parse_round_arg(text: &str) -> Result<NfaRound, String> {
    parse_round(text).map_err(|e| e.to_string())
}

fn parse_host(text: &str) -> Result<HostType, String> {
    HostType::from_name(text).ok_or_else(|| format!("unknown alphabet type `{}`", text))
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let context = Context::new(TextProvider::File(args.patterns.clone()))
        .with_context(|| format!("cannot read {}", args.patterns.display()))?;
    let options = Options {
        host: args.alphtype,
        rounds: args.rounds,
        minimize: match args.minimize {
            Minimize::Never => MinimizeLevel::Never,
            Minimize::End => MinimizeLevel::End,
            Minimize::Every => MinimizeLevel::EveryOp,
        },
        state_limit: args.state_limit,
        ignore_case: args.ignore_case,
    };

    let compiled = match run(&context, &options) {
        Ok(compiled) => compiled,
        Err(err) => {
            context.print_error(&err);
            return Err(anyhow!(err));
        }
    };

    match args.emit {
        Emit::Json => println!("{}", serde_json::to_string_pretty(&compiled.finish())?),
        Emit::Stats => {
            let stats = compiled.stats();
            println!("states\t{}", stats.states);
            println!("finals\t{}", stats.finals);
            println!("transitions\t{}", stats.transitions);
            println!("nfa-transitions\t{}", stats.nfa_transitions);
            println!("nondeterministic\t{}", stats.nondeterministic);
        }
    }

    for word in args.check.iter() {
        let verdict = if compiled.matches(word.as_bytes()) { "match" } else { "no match" };
        println!("{}\t{}", word, verdict);
    }
    Ok(())
}
