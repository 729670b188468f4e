//! Compile-time diagnostics: one hand-rolled enum per phase, collected into
//! a single `Error` with a stable `code()` string per variant so a front
//! end can render them without pattern-matching on `Display` text.

use std::fmt;

/// A location in the original source text, carried on every diagnostic.
#[derive(Clone, Copy, PartialEq, Eq, Debug, serde::Serialize)]
pub struct Position {
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Position {
    pub fn start() -> Position {
        Position { line: 1, column: 1, offset: 0 }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum LexError {
    UnexpectedCharacter(char),
    UnterminatedString,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LexError::UnexpectedCharacter(c) => write!(f, "unexpected character '{}'", c),
            LexError::UnterminatedString => write!(f, "unterminated string literal"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ParseError {
    ExpectedToken { expected: &'static str, found: String },
    DuplicatedLabel(String),
    EndMustBeLast,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::ExpectedToken { expected, found } => {
                write!(f, "expected {}, found {}", expected, found)
            }
            ParseError::DuplicatedLabel(name) => write!(f, "label \"{}\" is already defined", name),
            ParseError::EndMustBeLast => write!(f, "END must be the last statement"),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ValidateError {
    SizeMismatch,
    DoubleMemoryAccess,
    ExpectsImmediate,
    UnknownSize,
    LabelShouldBeWritable(String),
    LabelShouldBeANumber(String),
    DestinationCannotBeImmediate,
}

impl fmt::Display for ValidateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ValidateError::SizeMismatch => write!(f, "operand sizes do not match"),
            ValidateError::DoubleMemoryAccess => write!(f, "both operands refer to memory"),
            ValidateError::ExpectsImmediate => write!(f, "this instruction requires an immediate operand"),
            ValidateError::UnknownSize => {
                write!(f, "cannot infer operand size, add BYTE PTR or WORD PTR")
            }
            ValidateError::LabelShouldBeWritable(name) => {
                write!(f, "label \"{}\" cannot be used as a destination", name)
            }
            ValidateError::LabelShouldBeANumber(name) => {
                write!(f, "label \"{}\" does not name a number (EQU) constant", name)
            }
            ValidateError::DestinationCannotBeImmediate => {
                write!(f, "an immediate value cannot be a destination")
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ResolveError {
    MissingOrg,
    InstructionOutOfRange,
    OccupiedAddress { address: u16 },
    LabelNotFound(String),
    LabelUndefinedChain(Vec<String>),
    ValueOutOfRange { value: i64, bits: u32 },
}

impl fmt::Display for ResolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResolveError::MissingOrg => write!(f, "no ORG directive before the first statement"),
            ResolveError::InstructionOutOfRange => {
                write!(f, "instruction does not fit before the top of memory")
            }
            ResolveError::OccupiedAddress { address } => {
                write!(f, "address {:04X}h is already occupied", address)
            }
            ResolveError::LabelNotFound(name) => write!(f, "label \"{}\" is not defined", name),
            ResolveError::LabelUndefinedChain(chain) => {
                write!(f, "EQU cycle detected: {}", chain.join(" -> "))
            }
            ResolveError::ValueOutOfRange { value, bits } => {
                write!(f, "value {} does not fit in {} bits", value, bits)
            }
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ErrorKind {
    Lex(LexError),
    Parse(ParseError),
    Validate(ValidateError),
    Resolve(ResolveError),
}

/// One compile diagnostic: a phase-specific `kind` plus the position it
/// anchors to. `code()` is the stable string a frontend matches on; the
/// `Display` impl is human text, not meant to be parsed.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub position: Position,
}

impl Error {
    pub fn new(kind: ErrorKind, position: Position) -> Error {
        Error { kind, position }
    }

    pub fn lex(e: LexError, position: Position) -> Error {
        Error::new(ErrorKind::Lex(e), position)
    }

    pub fn parse(e: ParseError, position: Position) -> Error {
        Error::new(ErrorKind::Parse(e), position)
    }

    pub fn validate(e: ValidateError, position: Position) -> Error {
        Error::new(ErrorKind::Validate(e), position)
    }

    pub fn resolve(e: ResolveError, position: Position) -> Error {
        Error::new(ErrorKind::Resolve(e), position)
    }

    pub fn code(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Lex(LexError::UnexpectedCharacter(_)) => "unexpected-character",
            ErrorKind::Lex(LexError::UnterminatedString) => "unterminated-string",
            ErrorKind::Parse(ParseError::ExpectedToken { .. }) => "expected-token",
            ErrorKind::Parse(ParseError::DuplicatedLabel(_)) => "duplicated-label",
            ErrorKind::Parse(ParseError::EndMustBeLast) => "end-must-be-last",
            ErrorKind::Validate(ValidateError::SizeMismatch) => "size-mismatch",
            ErrorKind::Validate(ValidateError::DoubleMemoryAccess) => "double-memory-access",
            ErrorKind::Validate(ValidateError::ExpectsImmediate) => "expects-immediate",
            ErrorKind::Validate(ValidateError::UnknownSize) => "unknown-size",
            ErrorKind::Validate(ValidateError::LabelShouldBeWritable(_)) => "label-should-be-writable",
            ErrorKind::Validate(ValidateError::LabelShouldBeANumber(_)) => "label-should-be-a-number",
            ErrorKind::Validate(ValidateError::DestinationCannotBeImmediate) => {
                "destination-cannot-be-immediate"
            }
            ErrorKind::Resolve(ResolveError::MissingOrg) => "missing-org",
            ErrorKind::Resolve(ResolveError::InstructionOutOfRange) => "instruction-out-of-range",
            ErrorKind::Resolve(ResolveError::OccupiedAddress { .. }) => "occupied-address",
            ErrorKind::Resolve(ResolveError::LabelNotFound(_)) => "label-not-found",
            ErrorKind::Resolve(ResolveError::LabelUndefinedChain(_)) => "label-undefined-chain",
            ErrorKind::Resolve(ResolveError::ValueOutOfRange { .. }) => "value-out-of-range",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.kind {
            ErrorKind::Lex(e) => write!(f, "{}: {}", self.position, e),
            ErrorKind::Parse(e) => write!(f, "{}: {}", self.position, e),
            ErrorKind::Validate(e) => write!(f, "{}: {}", self.position, e),
            ErrorKind::Resolve(e) => write!(f, "{}: {}", self.position, e),
        }
    }
}

impl std::error::Error for Error {}

/// The JSON-facing shape of an `Error`, matching the `compile()` external
/// interface's `{code, message, position}` report.
#[derive(Clone, PartialEq, serde::Serialize)]
pub struct ErrorReport {
    pub code: &'static str,
    pub message: String,
    pub position: Position,
}

impl From<&Error> for ErrorReport {
    fn from(e: &Error) -> ErrorReport {
        ErrorReport { code: e.code(), message: e.to_string(), position: e.position }
    }
}
