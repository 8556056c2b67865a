use fsmkit_core::FsmError;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ErrorLoc {
    NoLocation(),
    /// Zero-based line of the pattern source.
    Line(usize),
}

pub trait CompilationError {
    fn error_type(&self) -> String;

    fn loc(&self) -> ErrorLoc;

    fn summarize(&self) -> String;

    fn description(&self) -> String;
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("machine has {states} states, the limit is {limit}")]
    TooManyStates { states: usize, limit: usize },
    #[error("no patterns to compile")]
    EmptyPatternList,
    #[error("invalid escape sequence on line {}", line + 1)]
    InvalidEscape { line: usize },
    #[error("invalid round `{0}`, expected <depth>:<groups>")]
    InvalidRound(String),
    #[error("cannot read pattern source: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Construction(#[from] FsmError),
}

impl CompilationError for DriverError {
    fn error_type(&self) -> String {
        match self {
            DriverError::TooManyStates { .. } => "State limit",
            DriverError::EmptyPatternList => "Empty input",
            DriverError::InvalidEscape { .. } => "Syntax error",
            DriverError::InvalidRound(_) => "Invalid argument",
            DriverError::Io(_) => "Input error",
            DriverError::Construction(_) => "Construction error",
        }.to_owned()
    }

    fn loc(&self) -> ErrorLoc {
        match self {
            DriverError::InvalidEscape { line } => ErrorLoc::Line(*line),
            DriverError::Construction(source) => source.loc(),
            _ => ErrorLoc::NoLocation(),
        }
    }

    fn summarize(&self) -> String {
        match self {
            DriverError::TooManyStates { .. } => "Too many states".to_owned(),
            DriverError::EmptyPatternList => "Nothing to compile".to_owned(),
            DriverError::InvalidEscape { .. } => "Bad escape".to_owned(),
            DriverError::InvalidRound(_) => "Cannot parse round".to_owned(),
            DriverError::Io(_) => "Cannot read input".to_owned(),
            DriverError::Construction(source) => source.summarize(),
        }
    }

    fn description(&self) -> String {
        match self {
            DriverError::Construction(source) => source.description(),
            _ => self.to_string(),
        }
    }
}

impl CompilationError for FsmError {
    fn error_type(&self) -> String {
        "Construction error".to_owned()
    }

    fn loc(&self) -> ErrorLoc {
        ErrorLoc::NoLocation()
    }

    fn summarize(&self) -> String {
        match self {
            FsmError::KeySpaceExhausted { .. } => "Too many conditions".to_owned(),
        }
    }

    fn description(&self) -> String {
        self.to_string()
    }
}
