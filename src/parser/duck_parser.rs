use super::reduction::{Reduction, ReductionSink};
use crate::compiler::types::{BinaryOp, ValueType};
use crate::error::{Error, ErrorPhase, Result};
use crate::lexer::{Token, TokenKind};

/// Deepest nesting of parentheses, unary signs and blocks the parser accepts
pub const MAX_NESTING: usize = 128;

/// Recursive-descent parser for Little Duck
///
/// The parser does not build a tree. Each completed rule is reported to the
/// sink as a [`Reduction`], in the order a bottom-up parser would reduce it.
///
/// Statements are parsed into a buffer and handed to the sink only once they
/// are complete, so a statement discarded by error recovery never leaves
/// half-built control flow behind in the sink. Errors in the program header,
/// declarations or function signatures are not recovered: parsing stops at
/// the first one.
pub struct Parser<'s, S: ReductionSink> {
    tokens: Vec<Token>,
    current: usize,
    sink: &'s mut S,
    errors: Vec<Error>,
    /// Current nesting of expressions and blocks
    depth: usize,
}

impl<'s, S: ReductionSink> Parser<'s, S> {
    /// Creates a parser over a token stream ending in [`TokenKind::Eof`]
    pub fn new(mut tokens: Vec<Token>, sink: &'s mut S) -> Self {
        if !matches!(tokens.last(), Some(t) if t.kind == TokenKind::Eof) {
            let (line, column) = tokens.last().map(|t| (t.line, t.column)).unwrap_or((1, 1));
            tokens.push(Token::new(TokenKind::Eof, String::new(), line, column));
        }
        Parser {
            tokens,
            current: 0,
            sink,
            errors: Vec::new(),
            depth: 0,
        }
    }

    /// Parses the whole program, feeding reductions to the sink.
    ///
    /// Syntax errors are accumulated (see [`Parser::errors`]); only fatal
    /// errors raised by the sink are returned.
    pub fn parse(&mut self) -> Result<()> {
        match self.program() {
            Ok(()) => Ok(()),
            Err(err) if err.phase() == ErrorPhase::Syntax => {
                self.record(err);
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    /// Syntax errors recorded so far
    pub fn errors(&self) -> &[Error] {
        &self.errors
    }

    /// Move the recorded syntax errors out of the parser
    pub fn take_errors(&mut self) -> Vec<Error> {
        std::mem::take(&mut self.errors)
    }

    // Program structure

    fn program(&mut self) -> Result<()> {
        self.consume(TokenKind::Program, "'program'")?;
        let name = self.identifier("program name")?;
        self.consume(TokenKind::Semicolon, "';'")?;
        self.emit(Reduction::ProgramStart { name })?;

        if self.check(&TokenKind::Var) {
            self.var_section()?;
        }
        while self.check(&TokenKind::Void) {
            self.function()?;
        }

        self.consume(TokenKind::Main, "'main' or 'void'")?;
        self.emit(Reduction::MainStart)?;
        self.top_block()?;
        self.consume(TokenKind::End, "'end'")?;
        self.emit(Reduction::ProgramEnd)?;

        if !self.is_at_end() {
            return Err(self.expected("end of file"));
        }
        Ok(())
    }

    fn var_section(&mut self) -> Result<()> {
        self.consume(TokenKind::Var, "'var'")?;
        loop {
            let mut names = vec![self.identifier("variable name")?];
            while self.match_kind(&TokenKind::Comma) {
                names.push(self.identifier("variable name")?);
            }
            self.consume(TokenKind::Colon, "':'")?;
            let ty = self.value_type()?;
            self.consume(TokenKind::Semicolon, "';'")?;
            self.emit(Reduction::VarDecl { names, ty })?;

            if !matches!(self.peek().kind, TokenKind::Identifier(_)) {
                return Ok(());
            }
        }
    }

    fn function(&mut self) -> Result<()> {
        self.consume(TokenKind::Void, "'void'")?;
        let name = self.identifier("function name")?;
        self.consume(TokenKind::LeftParen, "'('")?;
        self.emit(Reduction::FunctionStart { name })?;

        if !self.check(&TokenKind::RightParen) {
            loop {
                let name = self.identifier("parameter name")?;
                self.consume(TokenKind::Colon, "':'")?;
                let ty = self.value_type()?;
                self.emit(Reduction::Param { name, ty })?;
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')'")?;
        self.emit(Reduction::FunctionSignature)?;

        self.consume(TokenKind::LeftBracket, "'['")?;
        if self.check(&TokenKind::Var) {
            self.var_section()?;
        }
        self.top_block()?;
        self.consume(TokenKind::RightBracket, "']'")?;
        self.match_kind(&TokenKind::Semicolon);
        self.emit(Reduction::FunctionEnd)
    }

    fn value_type(&mut self) -> Result<ValueType> {
        let ty = match self.peek().kind {
            TokenKind::Int => ValueType::Int,
            TokenKind::FloatType => ValueType::Float,
            TokenKind::StringType => ValueType::String,
            _ => return Err(self.expected("type")),
        };
        self.advance();
        Ok(ty)
    }

    // Blocks and statements

    /// Body of `main` or of a function: each statement goes to the sink as
    /// soon as it is complete
    fn top_block(&mut self) -> Result<()> {
        self.consume(TokenKind::LeftBrace, "'{'")?;
        let mut events = Vec::new();
        self.statements(&mut events, true)?;
        self.consume(TokenKind::RightBrace, "'}'")?;
        Ok(())
    }

    /// Body nested inside a statement: events join the enclosing buffer
    fn block(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.nested(|p| {
            p.consume(TokenKind::LeftBrace, "'{'")?;
            p.statements(out, false)?;
            p.consume(TokenKind::RightBrace, "'}'")?;
            Ok(())
        })
    }

    fn statements(&mut self, out: &mut Vec<Reduction>, flush: bool) -> Result<()> {
        while !self.check(&TokenKind::RightBrace) && !self.is_at_end() {
            let mut buffer = Vec::new();
            match self.statement(&mut buffer) {
                Ok(()) => out.append(&mut buffer),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    self.record(err);
                    self.synchronize();
                    out.push(Reduction::Recover);
                }
            }
            if flush {
                for event in out.drain(..) {
                    self.sink.reduce(event)?;
                }
            }
        }
        Ok(())
    }

    fn statement(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        match self.peek().kind {
            TokenKind::Identifier(_) if self.peek_next().kind == TokenKind::LeftParen => {
                self.call(out)
            }
            TokenKind::Identifier(_) => self.assignment(out),
            TokenKind::If => self.if_statement(out),
            TokenKind::While => self.while_statement(out),
            TokenKind::Do => self.do_statement(out),
            TokenKind::Print => self.print_statement(out),
            _ => Err(self.expected("statement")),
        }
    }

    fn assignment(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        let target = self.identifier("variable name")?;
        self.consume(TokenKind::Assign, "'='")?;
        self.expression(out)?;
        self.consume(TokenKind::Semicolon, "';'")?;
        out.push(Reduction::Assign { target });
        Ok(())
    }

    fn call(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        let name = self.identifier("function name")?;
        self.consume(TokenKind::LeftParen, "'('")?;
        out.push(Reduction::CallStart { name });
        if !self.check(&TokenKind::RightParen) {
            loop {
                self.expression(out)?;
                out.push(Reduction::CallArgument);
                if !self.match_kind(&TokenKind::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenKind::RightParen, "')'")?;
        self.consume(TokenKind::Semicolon, "';'")?;
        out.push(Reduction::CallEnd);
        Ok(())
    }

    fn if_statement(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.consume(TokenKind::If, "'if'")?;
        self.condition(out)?;
        out.push(Reduction::IfCondition);
        self.block(out)?;
        if self.match_kind(&TokenKind::Else) {
            out.push(Reduction::Else);
            self.block(out)?;
        }
        self.match_kind(&TokenKind::Semicolon);
        out.push(Reduction::IfEnd);
        Ok(())
    }

    fn while_statement(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.consume(TokenKind::While, "'while'")?;
        out.push(Reduction::WhileStart);
        self.condition(out)?;
        out.push(Reduction::WhileCondition);
        self.match_kind(&TokenKind::Do);
        self.block(out)?;
        self.match_kind(&TokenKind::Semicolon);
        out.push(Reduction::WhileEnd);
        Ok(())
    }

    fn do_statement(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.consume(TokenKind::Do, "'do'")?;
        out.push(Reduction::DoStart);
        self.block(out)?;
        self.consume(TokenKind::While, "'while'")?;
        self.condition(out)?;
        self.consume(TokenKind::Semicolon, "';'")?;
        out.push(Reduction::DoEnd);
        Ok(())
    }

    fn print_statement(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.consume(TokenKind::Print, "'print'")?;
        self.consume(TokenKind::LeftParen, "'('")?;
        loop {
            self.expression(out)?;
            out.push(Reduction::PrintItem);
            if !self.match_kind(&TokenKind::Comma) {
                break;
            }
        }
        self.consume(TokenKind::RightParen, "')'")?;
        self.consume(TokenKind::Semicolon, "';'")?;
        Ok(())
    }

    fn condition(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.consume(TokenKind::LeftParen, "'('")?;
        self.expression(out)?;
        self.consume(TokenKind::RightParen, "')'")?;
        Ok(())
    }

    // Expressions

    fn expression(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.exp(out)?;
        let op = match self.peek().kind {
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::GtEq => BinaryOp::Ge,
            TokenKind::LtEq => BinaryOp::Le,
            TokenKind::Eq => BinaryOp::Eq,
            TokenKind::NotEq => BinaryOp::Ne,
            _ => return Ok(()),
        };
        self.advance();
        out.push(Reduction::Operator(op));
        self.exp(out)?;
        out.push(Reduction::Binary);
        Ok(())
    }

    fn exp(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.term(out)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(()),
            };
            self.advance();
            out.push(Reduction::Operator(op));
            self.term(out)?;
            out.push(Reduction::Binary);
        }
    }

    fn term(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        self.factor(out)?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(()),
            };
            self.advance();
            out.push(Reduction::Operator(op));
            self.factor(out)?;
            out.push(Reduction::Binary);
        }
    }

    fn factor(&mut self, out: &mut Vec<Reduction>) -> Result<()> {
        let event = match &self.peek().kind {
            TokenKind::LeftParen => {
                self.advance();
                self.nested(|p| p.expression(out))?;
                self.consume(TokenKind::RightParen, "')'")?;
                return Ok(());
            }
            TokenKind::Plus => {
                self.advance();
                return self.nested(|p| p.factor(out));
            }
            TokenKind::Minus => {
                self.advance();
                self.nested(|p| p.factor(out))?;
                out.push(Reduction::Negate);
                return Ok(());
            }
            TokenKind::Identifier(name) => Reduction::Identifier(name.clone()),
            TokenKind::Integer(n) => Reduction::IntLiteral(*n),
            TokenKind::Float(f) => Reduction::FloatLiteral(*f),
            TokenKind::String(s) => Reduction::StringLiteral(s.clone()),
            _ => return Err(self.expected("expression")),
        };
        self.advance();
        out.push(event);
        Ok(())
    }

    // Error recovery

    /// Skip the rest of a broken statement.
    ///
    /// Stops after a `;` at brace depth zero, before a `}` that closes the
    /// enclosing block, or after the `}` that closes a block opened inside the
    /// statement (also swallowing a following `else` block or `;`).
    fn synchronize(&mut self) {
        let mut depth = 0usize;
        while !self.is_at_end() {
            match self.peek().kind {
                TokenKind::Semicolon if depth == 0 => {
                    self.advance();
                    return;
                }
                TokenKind::RightBrace if depth == 0 => return,
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => {
                    depth -= 1;
                    if depth == 0 {
                        self.advance();
                        if self.match_kind(&TokenKind::Else) {
                            continue;
                        }
                        self.match_kind(&TokenKind::Semicolon);
                        return;
                    }
                }
                _ => {}
            }
            self.advance();
        }
    }

    /// Runs `parse` one nesting level deeper, refusing to go past [`MAX_NESTING`]
    fn nested<T>(&mut self, parse: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        if self.depth >= MAX_NESTING {
            return Err(self.expected(&format!("at most {} nesting levels", MAX_NESTING)));
        }
        self.depth += 1;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    fn record(&mut self, err: Error) {
        tracing::warn!(%err, "syntax error");
        self.errors.push(err);
    }

    fn emit(&mut self, event: Reduction) -> Result<()> {
        self.sink.reduce(event)
    }

    // Helper methods

    fn is_at_end(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn peek_next(&self) -> &Token {
        let index = (self.current + 1).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.tokens[self.current - 1].clone()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        if self.is_at_end() {
            return false;
        }
        std::mem::discriminant(&self.peek().kind) == std::mem::discriminant(kind)
    }

    fn match_kind(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn consume(&mut self, kind: TokenKind, expected: &str) -> Result<Token> {
        if self.check(&kind) {
            Ok(self.advance())
        } else {
            Err(self.expected(expected))
        }
    }

    fn identifier(&mut self, expected: &str) -> Result<String> {
        match &self.peek().kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(self.expected(expected)),
        }
    }

    /// Syntax error at the current token
    fn expected(&self, expected: &str) -> Error {
        let token = self.peek();
        if token.kind == TokenKind::Eof {
            return Error::UnexpectedEof {
                expected: expected.to_string(),
            };
        }
        Error::SyntaxError {
            line: token.line,
            col: token.column,
            expected: expected.to_string(),
            got: token.lexeme.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Scanner;

    fn reduce(source: &str) -> (Vec<Reduction>, Vec<Error>) {
        let tokens = Scanner::new(source).scan_tokens();
        let mut events = Vec::new();
        let mut parser = Parser::new(tokens, &mut events);
        parser.parse().unwrap();
        let errors = parser.take_errors();
        (events, errors)
    }

    fn wrap(body: &str) -> String {
        format!("program p; var x, y: int; main {{ {} }} end", body)
    }

    #[test]
    fn test_precedence_order() {
        let (events, errors) = reduce(&wrap("x = 2 + 3 * 4;"));
        assert!(errors.is_empty());
        assert_eq!(
            &events[3..events.len() - 1],
            &[
                Reduction::IntLiteral(2),
                Reduction::Operator(BinaryOp::Add),
                Reduction::IntLiteral(3),
                Reduction::Operator(BinaryOp::Mul),
                Reduction::IntLiteral(4),
                Reduction::Binary,
                Reduction::Binary,
                Reduction::Assign {
                    target: "x".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_program_structure() {
        let (events, errors) = reduce(
            "program demo; var g: float; \
             void f(a: int, b: string) [ var t: int; { t = a; } ]; \
             main { f(1, \"s\"); } end",
        );
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(
            events,
            vec![
                Reduction::ProgramStart {
                    name: "demo".to_string()
                },
                Reduction::VarDecl {
                    names: vec!["g".to_string()],
                    ty: ValueType::Float
                },
                Reduction::FunctionStart {
                    name: "f".to_string()
                },
                Reduction::Param {
                    name: "a".to_string(),
                    ty: ValueType::Int
                },
                Reduction::Param {
                    name: "b".to_string(),
                    ty: ValueType::String
                },
                Reduction::FunctionSignature,
                Reduction::VarDecl {
                    names: vec!["t".to_string()],
                    ty: ValueType::Int
                },
                Reduction::Identifier("a".to_string()),
                Reduction::Assign {
                    target: "t".to_string()
                },
                Reduction::FunctionEnd,
                Reduction::MainStart,
                Reduction::CallStart {
                    name: "f".to_string()
                },
                Reduction::IntLiteral(1),
                Reduction::CallArgument,
                Reduction::StringLiteral("s".to_string()),
                Reduction::CallArgument,
                Reduction::CallEnd,
                Reduction::ProgramEnd,
            ]
        );
    }

    #[test]
    fn test_control_flow_markers() {
        let (events, errors) =
            reduce(&wrap("if (x > 1) { y = 1; } else { y = 2; } while (x < 3) do { x = x + 1; };"));
        assert!(errors.is_empty(), "{:?}", errors);
        let markers: Vec<&Reduction> = events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    Reduction::IfCondition
                        | Reduction::Else
                        | Reduction::IfEnd
                        | Reduction::WhileStart
                        | Reduction::WhileCondition
                        | Reduction::WhileEnd
                )
            })
            .collect();
        assert_eq!(
            markers,
            vec![
                &Reduction::IfCondition,
                &Reduction::Else,
                &Reduction::IfEnd,
                &Reduction::WhileStart,
                &Reduction::WhileCondition,
                &Reduction::WhileEnd,
            ]
        );
    }

    #[test]
    fn test_do_while_and_negation() {
        let (events, errors) = reduce(&wrap("do { x = -x; } while (x != 0);"));
        assert!(errors.is_empty(), "{:?}", errors);
        assert_eq!(events[3], Reduction::DoStart);
        assert_eq!(events[5], Reduction::Negate);
        assert_eq!(events[events.len() - 2], Reduction::DoEnd);
    }

    #[test]
    fn test_recovery_discards_broken_statement() {
        let (events, errors) = reduce(&wrap("x = 3 +; y = 1;"));
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            Error::SyntaxError { expected, got, .. } if expected == "expression" && got == ";"
        ));
        assert_eq!(
            &events[3..],
            &[
                Reduction::Recover,
                Reduction::IntLiteral(1),
                Reduction::Assign {
                    target: "y".to_string()
                },
                Reduction::ProgramEnd,
            ]
        );
    }

    #[test]
    fn test_recovery_skips_whole_block() {
        let (events, errors) = reduce(&wrap("if (x + ) { y = 1; } else { y = 2; }; print(y);"));
        assert_eq!(errors.len(), 1);
        assert!(!events.contains(&Reduction::IfCondition));
        assert!(events.contains(&Reduction::PrintItem));
    }

    #[test]
    fn test_inner_statement_recovers_inside_block() {
        let (events, errors) = reduce(&wrap("while (x < 3) { x = ; x = x + 1; }"));
        assert_eq!(errors.len(), 1);
        assert!(events.contains(&Reduction::Recover));
        assert!(events.contains(&Reduction::WhileEnd));
    }

    #[test]
    fn test_header_error_stops_parsing() {
        let (events, errors) = reduce("program ; main { x = 1; } end");
        assert!(events.is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn test_deep_parentheses_are_rejected() {
        let source = wrap(&format!("x = {}1{}; y = 2;", "(".repeat(100_000), ")".repeat(100_000)));
        let (events, errors) = reduce(&source);
        assert!(matches!(
            &errors[..],
            [Error::SyntaxError { expected, got, .. }] if expected.contains("nesting") && got == "("
        ));
        assert!(events.contains(&Reduction::Recover));
        assert!(events.contains(&Reduction::Assign {
            target: "y".to_string()
        }));
    }

    #[test]
    fn test_deep_blocks_are_rejected() {
        let body = format!(
            "{}x = 1;{} y = 2;",
            "if (x < y) { ".repeat(MAX_NESTING + 10),
            " }".repeat(MAX_NESTING + 10)
        );
        let (events, errors) = reduce(&wrap(&body));
        assert_eq!(errors.len(), 1);
        assert!(matches!(&errors[0], Error::SyntaxError { got, .. } if got == "{"));
        assert_eq!(events.last(), Some(&Reduction::ProgramEnd));
        assert!(events.contains(&Reduction::Assign {
            target: "y".to_string()
        }));
    }

    #[test]
    fn test_nesting_within_limit_is_accepted() {
        let depth = MAX_NESTING - 1;
        let source = wrap(&format!("x = {}1{};", "(".repeat(depth), ")".repeat(depth)));
        let (events, errors) = reduce(&source);
        assert!(errors.is_empty());
        assert!(events.contains(&Reduction::IntLiteral(1)));
    }

    #[test]
    fn test_unexpected_eof() {
        let (_, errors) = reduce("program p; main { ");
        assert_eq!(
            errors,
            vec![Error::UnexpectedEof {
                expected: "'}'".to_string()
            }]
        );
    }
}
