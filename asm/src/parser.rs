//! Hand-rolled recursive-descent parser over the token stream, collecting
//! labels as statements are parsed rather than in a separate pass. Reads
//! the grammar straight off tokens instead of walking a `pest::Pair` tree,
//! since the per-statement error codes this dialect needs don't fall out
//! of a declarative grammar without a fight.

use std::collections::HashSet;

use util::EnumFromStr;
use vonsim_core::isa::{AnyRegister, ByteRegister, WordRegister};

use crate::ast::{BinaryOp, DataValue, DataWidth, Expr, Operand, SizeHint, Statement, Stmt, UnaryOp};
use crate::error::{Error, ParseError, Position};
use crate::lexer::{Token, TokenKind};

pub fn parse(tokens: Vec<Token>) -> (Vec<Statement>, Vec<Error>) {
    let mut parser = Parser { tokens, cursor: 0, errors: Vec::new(), seen_labels: HashSet::new() };
    let statements = parser.parse_program();
    (statements, parser.errors)
}

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    errors: Vec<Error>,
    seen_labels: HashSet<String>,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.cursor.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, n: usize) -> &Token {
        let i = (self.cursor + n).min(self.tokens.len() - 1);
        &self.tokens[i]
    }

    fn position(&self) -> Position {
        self.peek().position
    }

    fn advance(&mut self) -> Token {
        let tok = self.peek().clone();
        if self.cursor < self.tokens.len() - 1 {
            self.cursor += 1;
        }
        tok
    }

    fn at_eof(&self) -> bool {
        self.peek().kind == TokenKind::Eof
    }

    fn ident_text(tok: &Token) -> Option<&str> {
        match &tok.kind {
            TokenKind::Ident(s) => Some(s.as_str()),
            _ => None,
        }
    }

    fn peek_ident_is(&self, text: &str) -> bool {
        Self::ident_text(self.peek()) == Some(text)
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<Token, Error> {
        if self.peek().kind == kind {
            Ok(self.advance())
        } else {
            let found = self.peek().describe();
            let pos = self.position();
            Err(Error::parse(ParseError::ExpectedToken { expected, found }, pos))
        }
    }

    fn expect_ident(&mut self, expected: &'static str) -> Result<String, Error> {
        match &self.peek().kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => {
                let found = self.peek().describe();
                let pos = self.position();
                Err(Error::parse(ParseError::ExpectedToken { expected, found }, pos))
            }
        }
    }

    fn skip_blank_lines(&mut self) {
        while self.peek().kind == TokenKind::Eol {
            self.advance();
        }
    }

    fn end_statement(&mut self) -> Result<(), Error> {
        match self.peek().kind {
            TokenKind::Eol | TokenKind::Eof => {
                if self.peek().kind == TokenKind::Eol {
                    self.advance();
                }
                Ok(())
            }
            _ => {
                let found = self.peek().describe();
                let pos = self.position();
                Err(Error::parse(ParseError::ExpectedToken { expected: "end of line", found }, pos))
            }
        }
    }

    fn recover(&mut self) {
        while self.peek().kind != TokenKind::Eol && self.peek().kind != TokenKind::Eof {
            self.advance();
        }
        if self.peek().kind == TokenKind::Eol {
            self.advance();
        }
    }

    fn declare_label(&mut self, name: &str, position: Position) {
        if !self.seen_labels.insert(name.to_string()) {
            self.errors.push(Error::parse(ParseError::DuplicatedLabel(name.to_string()), position));
        }
    }

    fn parse_program(&mut self) -> Vec<Statement> {
        let mut statements = Vec::new();
        let mut seen_end = false;
        loop {
            self.skip_blank_lines();
            if self.at_eof() {
                break;
            }
            let pos = self.position();
            if seen_end {
                self.errors.push(Error::parse(ParseError::EndMustBeLast, pos));
            }
            match self.parse_statement() {
                Ok(stmt) => {
                    if let Stmt::End = stmt {
                        seen_end = true;
                    }
                    statements.push(Statement { stmt, position: pos });
                }
                Err(e) => {
                    self.errors.push(e);
                    self.recover();
                }
            }
        }
        statements
    }

    fn try_register(text: &str) -> Option<AnyRegister> {
        if let Ok(r) = WordRegister::from_str(text) {
            return Some(AnyRegister::Word(r));
        }
        if let Ok(r) = ByteRegister::from_str(text) {
            return Some(AnyRegister::Byte(r));
        }
        None
    }

    fn parse_statement(&mut self) -> Result<Stmt, Error> {
        // `IDENT EQU expr`
        if let Some(name) = Self::ident_text(self.peek()).map(|s| s.to_string()) {
            if Self::ident_text(self.peek_at(1)) == Some("EQU") {
                let pos = self.position();
                self.advance(); // name
                self.advance(); // EQU
                let expr = self.parse_expr()?;
                self.end_statement()?;
                self.declare_label(&name, pos);
                return Ok(Stmt::Equ { label: name, expr });
            }
        }

        let label = if Self::ident_text(self.peek()).is_some()
            && self.peek_at(1).kind == TokenKind::Colon
            && Self::try_register(Self::ident_text(self.peek()).unwrap()).is_none()
        {
            let pos = self.position();
            let name = self.expect_ident("label")?;
            self.expect(TokenKind::Colon, ":")?;
            self.declare_label(&name, pos);
            Some(name)
        } else {
            None
        };

        match Self::ident_text(self.peek()) {
            Some("ORG") => {
                self.advance();
                let expr = self.parse_expr()?;
                self.end_statement()?;
                Ok(Stmt::Org(expr))
            }
            Some("END") => {
                self.advance();
                self.end_statement()?;
                Ok(Stmt::End)
            }
            Some("DB") => {
                self.advance();
                let values = self.parse_data_values()?;
                self.end_statement()?;
                Ok(Stmt::Data { label, width: DataWidth::Byte, values })
            }
            Some("DW") => {
                self.advance();
                let values = self.parse_data_values()?;
                self.end_statement()?;
                Ok(Stmt::Data { label, width: DataWidth::Word, values })
            }
            Some(_) => {
                let pos = self.position();
                let mnemonic = self.expect_ident("mnemonic")?;
                let operands = self.parse_operand_list()?;
                self.end_statement()?;
                Ok(Stmt::Instruction { label, mnemonic, operands, position: pos })
            }
            None => {
                let found = self.peek().describe();
                let pos = self.position();
                Err(Error::parse(ParseError::ExpectedToken { expected: "statement", found }, pos))
            }
        }
    }

    fn parse_data_values(&mut self) -> Result<Vec<DataValue>, Error> {
        let mut values = Vec::new();
        loop {
            let value = match &self.peek().kind {
                TokenKind::Str(s) => {
                    let s = s.clone();
                    self.advance();
                    DataValue::Str(s)
                }
                TokenKind::Question => {
                    self.advance();
                    DataValue::Unassigned
                }
                _ => DataValue::Expr(self.parse_expr()?),
            };
            values.push(value);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(values)
    }

    fn parse_operand_list(&mut self) -> Result<Vec<Operand>, Error> {
        let mut operands = Vec::new();
        if matches!(self.peek().kind, TokenKind::Eol | TokenKind::Eof) {
            return Ok(operands);
        }
        loop {
            operands.push(self.parse_operand()?);
            if self.peek().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        Ok(operands)
    }

    fn parse_operand(&mut self) -> Result<Operand, Error> {
        let mut size = SizeHint::Auto;
        if self.peek_ident_is("BYTE") && Self::ident_text(self.peek_at(1)) == Some("PTR") {
            self.advance();
            self.advance();
            size = SizeHint::Byte;
        } else if self.peek_ident_is("WORD") && Self::ident_text(self.peek_at(1)) == Some("PTR") {
            self.advance();
            self.advance();
            size = SizeHint::Word;
        }

        if self.peek().kind == TokenKind::LBracket {
            self.advance();
            if self.peek_ident_is("BX") && self.peek_at(1).kind == TokenKind::RBracket {
                self.advance();
                self.advance();
                return Ok(Operand::Bracket { indirect: true, expr: None, size });
            }
            let expr = self.parse_expr()?;
            self.expect(TokenKind::RBracket, "]")?;
            return Ok(Operand::Bracket { indirect: false, expr: Some(expr), size });
        }

        if size != SizeHint::Auto {
            let found = self.peek().describe();
            let pos = self.position();
            return Err(Error::parse(ParseError::ExpectedToken { expected: "[", found }, pos));
        }

        if let Some(text) = Self::ident_text(self.peek()) {
            if let Some(reg) = Self::try_register(text) {
                self.advance();
                return Ok(Operand::Register(reg));
            }
        }

        let expr = self.parse_expr()?;
        Ok(match expr {
            Expr::Number(n) => Operand::Immediate(Expr::Number(n)),
            Expr::Label { name, offset: false } => Operand::BareLabel(name),
            other => Operand::Immediate(other),
        })
    }

    // term := factor (('+'|'-') factor)*
    fn parse_expr(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = Expr::Binary { op, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // factor := unary ('*' unary)*
    fn parse_factor(&mut self) -> Result<Expr, Error> {
        let mut left = self.parse_unary()?;
        while self.peek().kind == TokenKind::Star {
            self.advance();
            let right = self.parse_unary()?;
            left = Expr::Binary { op: BinaryOp::Mul, left: Box::new(left), right: Box::new(right) };
        }
        Ok(left)
    }

    // unary := ('+'|'-') unary | primary
    fn parse_unary(&mut self) -> Result<Expr, Error> {
        let op = match self.peek().kind {
            TokenKind::Plus => Some(UnaryOp::Pos),
            TokenKind::Minus => Some(UnaryOp::Neg),
            _ => None,
        };
        if let Some(op) = op {
            self.advance();
            let expr = self.parse_unary()?;
            return Ok(Expr::Unary { op, expr: Box::new(expr) });
        }
        self.parse_primary()
    }

    // primary := number | 'OFFSET' ident | ident | '(' term ')'
    fn parse_primary(&mut self) -> Result<Expr, Error> {
        match self.peek().kind.clone() {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::LParen => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(TokenKind::RParen, ")")?;
                Ok(expr)
            }
            TokenKind::Ident(ref s) if s == "OFFSET" => {
                self.advance();
                let name = self.expect_ident("label")?;
                Ok(Expr::Label { name, offset: true })
            }
            TokenKind::Ident(s) => {
                self.advance();
                Ok(Expr::Label { name: s, offset: false })
            }
            _ => {
                let found = self.peek().describe();
                let pos = self.position();
                Err(Error::parse(ParseError::ExpectedToken { expected: "expression", found }, pos))
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lexer::Lexer;

    fn parse_ok(src: &str) -> Vec<Statement> {
        let (tokens, lex_errors) = Lexer::new(src).tokenize();
        assert!(lex_errors.is_empty());
        let (statements, errors) = parse(tokens);
        assert!(errors.is_empty(), "unexpected parse errors: {:?}", errors);
        statements
    }

    #[test]
    fn parses_org_and_end() {
        let statements = parse_ok("ORG 2000h\nEND\n");
        assert!(matches!(statements[0].stmt, Stmt::Org(Expr::Number(0x2000))));
        assert!(matches!(statements[1].stmt, Stmt::End));
    }

    #[test]
    fn parses_labeled_instruction_with_two_operands() {
        let statements = parse_ok("loop: MOV AX, BX\n");
        match &statements[0].stmt {
            Stmt::Instruction { label, mnemonic, operands, .. } => {
                assert_eq!(label.as_deref(), Some("LOOP"));
                assert_eq!(mnemonic, "MOV");
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[0], Operand::Register(AnyRegister::Word(WordRegister::AX))));
                assert!(matches!(operands[1], Operand::Register(AnyRegister::Word(WordRegister::BX))));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn parses_bx_indirect_and_byte_ptr() {
        let statements = parse_ok("INC BYTE PTR [BX]\n");
        match &statements[0].stmt {
            Stmt::Instruction { operands, .. } => {
                assert_eq!(operands.len(), 1);
                assert!(matches!(
                    operands[0],
                    Operand::Bracket { indirect: true, expr: None, size: SizeHint::Byte }
                ));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn parses_data_directive() {
        let statements = parse_ok("x: DB 1, 2, ?\n");
        match &statements[0].stmt {
            Stmt::Data { label, width, values } => {
                assert_eq!(label.as_deref(), Some("X"));
                assert_eq!(*width, DataWidth::Byte);
                assert_eq!(values.len(), 3);
                assert!(matches!(values[2], DataValue::Unassigned));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }

    #[test]
    fn parses_equ() {
        let statements = parse_ok("SIZE EQU 10\n");
        assert!(matches!(&statements[0].stmt, Stmt::Equ { label, .. } if label == "SIZE"));
    }

    #[test]
    fn duplicated_label_is_reported() {
        let (tokens, _) = Lexer::new("x: DB 1\nx: DB 2\n").tokenize();
        let (_, errors) = parse(tokens);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code(), "duplicated-label");
    }

    #[test]
    fn end_must_be_last_is_reported() {
        let (tokens, _) = Lexer::new("END\nNOP\n").tokenize();
        let (_, errors) = parse(tokens);
        assert_eq!(errors.iter().any(|e| e.code() == "end-must-be-last"), true);
    }

    #[test]
    fn bare_label_operand_is_distinct_from_offset() {
        let statements = parse_ok("MOV AL, X\nMOV AX, OFFSET X\n");
        match &statements[0].stmt {
            Stmt::Instruction { operands, .. } => {
                assert!(matches!(&operands[1], Operand::BareLabel(name) if name == "X"));
            }
            other => panic!("unexpected statement {:?}", other),
        }
        match &statements[1].stmt {
            Stmt::Instruction { operands, .. } => {
                assert!(matches!(&operands[1], Operand::Immediate(Expr::Label { offset: true, .. })));
            }
            other => panic!("unexpected statement {:?}", other),
        }
    }
}
