//! `vonsim-asm`: lexer, parser, semantic validator, address resolver and
//! encoder for the assembly dialect `vonsim-core`'s ISA defines.
//!
//! The pipeline is `lex -> parse -> validate -> resolve -> encode`, each
//! its own module. Hand-rolled recursive descent rather than a `pest`
//! grammar: per-statement error codes are easier to produce by hand than
//! to thread back out of a declarative grammar's generated parse tree.

pub mod ast;
pub mod disassemble;
pub mod encode;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod resolve;
pub mod source_map;
pub mod validate;

use error::{Error, ErrorReport};
use resolve::Program;

/// Runs the full pipeline. Lex and parse errors from every line are
/// collected before validation and resolution run over whatever statements
/// did parse, so a single call surfaces as many problems as it can rather
/// than stopping at the first one.
pub fn compile(source: &str) -> Result<Program, Vec<Error>> {
    let (tokens, mut errors) = lexer::Lexer::new(source).tokenize();
    let (statements, parse_errors) = parser::parse(tokens);
    errors.extend(parse_errors);

    match resolve::resolve(&statements) {
        Ok(program) => {
            if errors.is_empty() {
                Ok(program)
            } else {
                Err(errors)
            }
        }
        Err(resolve_errors) => {
            errors.extend(resolve_errors);
            Err(errors)
        }
    }
}

/// `compile()`'s JSON-facing external interface: `{success, program,
/// errors}`, errors reported as `{code, message, position}`.
#[derive(serde::Serialize)]
pub struct CompileResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub program: Option<Program>,
    pub errors: Vec<ErrorReport>,
}

pub fn compile_to_report(source: &str) -> CompileResult {
    match compile(source) {
        Ok(program) => CompileResult { success: true, program: Some(program), errors: Vec::new() },
        Err(errors) => {
            let errors = errors.iter().map(ErrorReport::from).collect();
            CompileResult { success: false, program: None, errors }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compiles_hello_counter_scenario() {
        let source = "\
            ORG 2000h\n\
            counter: DB 0\n\
            start:\n\
            MOV AL, counter\n\
            ADD AL, 1\n\
            MOV counter, AL\n\
            HLT\n\
            END\n";
        let program = compile(source).expect("should compile");
        assert_eq!(program.labels["COUNTER"], 0x2000);
    }

    #[test]
    fn reports_every_lex_and_parse_error_together() {
        let errors = compile("MOV AX, @\nADD AX\n").unwrap_err();
        assert!(errors.iter().any(|e| e.code() == "unexpected-character"));
    }

    #[test]
    fn compile_to_report_serializes_errors() {
        let report = compile_to_report("ADD\n");
        assert!(!report.success);
        assert!(!report.errors.is_empty());
    }
}
