//! Recursive-descent parser for nagare.
//!
//! Consumes the token stream from [`crate::lexer`] and builds an
//! [`ast::Program`](crate::ast::Program).
//!
//! # Grammar
//!
//! ```text
//! program   := sep* (stmt (sep+ stmt)*)? sep*          sep := '\n' | ';'
//! stmt      := not (('&&' | '||') not)*
//! not       := '!' not | pipeline
//! pipeline  := stage ('|' stage)* | atoms '->' stage ('|' stage)*
//! stage     := if | while | fun | let | fetch | yield | return | break
//!            | continue | defer | spawn | join | block | call | value
//! call      := WORD atom*
//! value     := expr                       (status from truthiness)
//!
//! expr      := or ; or := and ('||' and)* ; and := cmp ('&&' cmp)*
//! cmp       := add (('=='|'!='|'<'|'<='|'>'|'>=') add)*
//! add       := mul (('+'|'-') mul)* ; mul := unary (('*'|'/'|'%') unary)*
//! unary     := ('-'|'+'|'!') unary | juxt
//! juxt      := postfix postfix*           (two or more form a list)
//! postfix   := primary | VAR '(' index ')'   ('(' directly after the name)
//! primary   := WORD | VAR | STRING | '#'NAME | '(' expr ')' | '[' stmt* ']'
//!            | ('spawn' | '&') block
//! ```
//!
//! Statement-level values (`let` right-hand sides, conditions, `return`)
//! parse without the top-level `&&`/`||`, which belong to the statement.

use std::sync::Arc;

use thiserror::Error;

use crate::ast::{
    BinaryOp, Call, Expr, FunDef, IfStmt, Index, LetStmt, Pattern, Pipeline, Program, Stmt, StringPart, UnaryOp,
    WhileLoop,
};
use crate::lexer::{Spanned, Token, line_col, tokenize};

/// Maximum nesting depth of blocks, parentheses and captures.
const MAX_DEPTH: usize = 256;

/// A parse error with its 1-based position.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Parse nagare source into a program.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    let tokens = tokenize(source).map_err(|errors| {
        let (message, offset) = match errors.first() {
            Some(e) => (e.token.to_string(), e.span.start),
            None => ("invalid input".to_string(), 0),
        };
        let (line, column) = line_col(source, offset);
        ParseError { message, line, column }
    })?;

    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
    };
    let statements = parser.statements(None)?;
    Ok(Program { statements })
}

struct Parser<'s> {
    source: &'s str,
    tokens: Vec<Spanned<Token>>,
    pos: usize,
    depth: usize,
}

type PResult<T> = Result<T, ParseError>;

impl Parser<'_> {
    // ─────────────────────────────────────────────────────────────────
    // Token plumbing
    // ─────────────────────────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    /// Consume a bare word.
    fn word(&mut self) -> Option<String> {
        match self.peek() {
            Some(Token::Word(word)) => {
                let word = word.clone();
                self.pos += 1;
                Some(word)
            }
            _ => None,
        }
    }

    fn at(&self, token: &Token) -> bool {
        self.peek() == Some(token)
    }

    fn advance(&mut self) -> Option<Spanned<Token>> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.at(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Token, context: &str) -> PResult<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.unexpected(&format!("expected {} {}", token, context)))
        }
    }

    fn skip_newlines(&mut self) {
        while self.eat(&Token::Newline) {}
    }

    fn skip_separators(&mut self) {
        while self.eat(&Token::Newline) || self.eat(&Token::Semi) {}
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> ParseError {
        let (line, column) = line_col(self.source, offset);
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }

    /// Error at the current token, naming what was found.
    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some(t) => self.error_at(t.span.start, format!("{}, found {}", expected, t.token)),
            None => self.error_at(self.source.len(), format!("{}, found end of input", expected)),
        }
    }

    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.unexpected(&format!("nesting deeper than {}", MAX_DEPTH)));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // ─────────────────────────────────────────────────────────────────
    // Statements
    // ─────────────────────────────────────────────────────────────────

    /// Statements up to `close` (or end of input when `close` is None).
    /// The closing token is not consumed.
    fn statements(&mut self, close: Option<&Token>) -> PResult<Vec<Stmt>> {
        let mut stmts = Vec::new();
        loop {
            self.skip_separators();
            match (self.peek(), close) {
                (None, None) => break,
                (None, Some(close)) => return Err(self.unexpected(&format!("expected {}", close))),
                (Some(t), Some(close)) if t == close => break,
                _ => {}
            }
            stmts.push(self.statement()?);
            match (self.peek(), close) {
                (None | Some(Token::Newline | Token::Semi), _) => {}
                (Some(t), Some(close)) if t == close => {}
                _ => return Err(self.unexpected("expected newline or ';' after statement")),
            }
        }
        Ok(stmts)
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect(&Token::LBrace, "to open a block")?;
        self.enter()?;
        let body = self.statements(Some(&Token::RBrace))?;
        self.leave();
        self.expect(&Token::RBrace, "to close the block")?;
        Ok(body)
    }

    fn statement(&mut self) -> PResult<Stmt> {
        let mut left = self.not_statement()?;
        loop {
            if self.eat(&Token::And) {
                self.skip_newlines();
                let right = self.not_statement()?;
                left = Stmt::AndChain {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else if self.eat(&Token::Or) {
                self.skip_newlines();
                let right = self.not_statement()?;
                left = Stmt::OrChain {
                    left: Box::new(left),
                    right: Box::new(right),
                };
            } else {
                return Ok(left);
            }
        }
    }

    fn not_statement(&mut self) -> PResult<Stmt> {
        if self.eat(&Token::Bang) {
            return Ok(Stmt::Not(Box::new(self.not_statement()?)));
        }
        self.pipeline()
    }

    fn pipeline(&mut self) -> PResult<Stmt> {
        let start = self.pos;
        let first = self.stage()?;

        let mut feed = None;
        let mut stages = Vec::new();
        if self.at(&Token::Arrow) {
            feed = Some(match first {
                Stmt::Call(call) => std::iter::once(Expr::Literal(call.name)).chain(call.args).collect(),
                Stmt::Value(Expr::List(items)) => items,
                Stmt::Value(expr) => vec![expr],
                other => {
                    let offset = self.tokens[start].span.start;
                    return Err(self.error_at(offset, format!("'{}' cannot feed a pipeline", other.kind_name())));
                }
            });
            self.advance();
            self.skip_newlines();
            stages.push(self.stage()?);
        } else {
            stages.push(first);
        }

        while self.eat(&Token::Pipe) {
            self.skip_newlines();
            stages.push(self.stage()?);
        }

        if feed.is_none() && stages.len() == 1 {
            return Ok(stages.remove(0));
        }
        Ok(Stmt::Pipeline(Pipeline { feed, stages }))
    }

    fn stage(&mut self) -> PResult<Stmt> {
        let Some(token) = self.peek() else {
            return Err(self.unexpected("expected a statement"));
        };
        match token {
            Token::If => self.if_statement(),
            Token::While => {
                self.advance();
                let condition = Box::new(self.statement()?);
                let body = self.block()?;
                Ok(Stmt::While(WhileLoop { condition, body }))
            }
            Token::Fun => self.fun_definition(),
            Token::Let => {
                self.advance();
                let pattern = self.pattern()?;
                self.expect(&Token::Eq, "in let")?;
                let value = self.value_expr()?;
                Ok(Stmt::Let(LetStmt { pattern, value }))
            }
            Token::Fetch => {
                self.advance();
                Ok(Stmt::Fetch(self.pattern()?))
            }
            Token::Yield => {
                self.advance();
                Ok(Stmt::Yield(self.atoms()?))
            }
            Token::Return => {
                self.advance();
                Ok(Stmt::Return(self.optional_value()?))
            }
            Token::Break => {
                self.advance();
                Ok(Stmt::Break(self.optional_value()?))
            }
            Token::Continue => {
                self.advance();
                Ok(Stmt::Continue)
            }
            Token::Defer => {
                self.advance();
                Ok(Stmt::Defer(Arc::new(self.not_statement()?)))
            }
            Token::Spawn | Token::Amp => {
                self.advance();
                Ok(Stmt::Spawn(Arc::new(self.block()?)))
            }
            Token::Join => {
                self.advance();
                Ok(Stmt::Join(self.value_expr()?))
            }
            Token::LBrace => Ok(Stmt::Block(self.block()?)),
            Token::Word(_) => self.call(),
            Token::Var(_)
            | Token::Str(_)
            | Token::RawStr(_)
            | Token::Length(_)
            | Token::LParen
            | Token::LBracket
            | Token::Minus
            | Token::Plus => Ok(Stmt::Value(self.value_expr()?)),
            _ => Err(self.unexpected("expected a statement")),
        }
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        let mut branches = Vec::new();
        let mut else_branch = None;
        self.expect(&Token::If, "")?;
        loop {
            let condition = self.statement()?;
            let body = self.block()?;
            branches.push((condition, body));

            // `else` may start the next line
            let save = self.pos;
            self.skip_newlines();
            if !self.eat(&Token::Else) {
                self.pos = save;
                break;
            }
            if self.eat(&Token::If) {
                continue;
            }
            else_branch = Some(self.block()?);
            break;
        }
        Ok(Stmt::If(IfStmt { branches, else_branch }))
    }

    fn fun_definition(&mut self) -> PResult<Stmt> {
        self.expect(&Token::Fun, "")?;
        let Some(name) = self.word() else {
            return Err(self.unexpected("expected function name"));
        };
        let params = self.pattern()?;
        let body = Arc::new(self.block()?);
        Ok(Stmt::FunDef(Arc::new(FunDef { name, params, body })))
    }

    fn call(&mut self) -> PResult<Stmt> {
        let Some(name) = self.word() else {
            return Err(self.unexpected("expected a command name"));
        };
        let args = self.atoms()?;
        Ok(Stmt::Call(Call { name, args }))
    }

    /// `$a $b ($rest)`; possibly empty.
    fn pattern(&mut self) -> PResult<Pattern> {
        let mut pattern = Pattern::default();
        loop {
            match self.peek() {
                Some(Token::Var(name)) => {
                    pattern.names.push(name.clone());
                    self.advance();
                }
                Some(Token::LParen) => {
                    self.advance();
                    let Some(Token::Var(name)) = self.peek().cloned() else {
                        return Err(self.unexpected("expected a variable in '( )'"));
                    };
                    self.advance();
                    pattern.rest = Some(name);
                    self.expect(&Token::RParen, "after the rest name")?;
                    if matches!(self.peek(), Some(Token::Var(_) | Token::LParen)) {
                        return Err(self.unexpected("the parenthesized name must come last"));
                    }
                    return Ok(pattern);
                }
                _ => return Ok(pattern),
            }
        }
    }

    /// Arguments of a call or `yield`: atoms until a statement boundary.
    fn atoms(&mut self) -> PResult<Vec<Expr>> {
        let mut atoms = Vec::new();
        loop {
            match self.peek() {
                Some(t) if starts_primary(t) => atoms.push(self.word_expr()?),
                Some(t) => match t.as_word() {
                    Some(word) => {
                        atoms.push(Expr::Literal(word.to_string()));
                        self.advance();
                    }
                    None => return Ok(atoms),
                },
                None => return Ok(atoms),
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────
    // Expressions
    // ─────────────────────────────────────────────────────────────────

    /// An expression without top-level `&&`/`||`.
    fn value_expr(&mut self) -> PResult<Expr> {
        self.comparison()
    }

    /// A value if one follows, for `return` and `break`.
    fn optional_value(&mut self) -> PResult<Option<Expr>> {
        match self.peek() {
            Some(t) if starts_primary(t) || matches!(t, Token::Minus | Token::Plus | Token::Bang) => {
                Ok(Some(self.value_expr()?))
            }
            _ => Ok(None),
        }
    }

    fn expr(&mut self) -> PResult<Expr> {
        let mut left = self.and_expr()?;
        while self.eat(&Token::Or) {
            let right = self.and_expr()?;
            left = binary(BinaryOp::Or, left, right);
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> PResult<Expr> {
        let mut left = self.comparison()?;
        while self.eat(&Token::And) {
            let right = self.comparison()?;
            left = binary(BinaryOp::And, left, right);
        }
        Ok(left)
    }

    fn comparison(&mut self) -> PResult<Expr> {
        let mut left = self.additive()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::NotEq) => BinaryOp::NotEq,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::LtEq) => BinaryOp::LtEq,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::GtEq) => BinaryOp::GtEq,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.additive()?;
            left = binary(op, left, right);
        }
    }

    fn additive(&mut self) -> PResult<Expr> {
        let mut left = self.multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.multiplicative()?;
            left = binary(op, left, right);
        }
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                Some(Token::Percent) => BinaryOp::Mod,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = binary(op, left, right);
        }
    }

    fn unary(&mut self) -> PResult<Expr> {
        let op = match self.peek() {
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Bang) => UnaryOp::Not,
            _ => return self.juxtaposition(),
        };
        self.advance();
        let expr = Box::new(self.unary()?);
        Ok(Expr::Unary { op, expr })
    }

    fn juxtaposition(&mut self) -> PResult<Expr> {
        let first = self.word_expr()?;
        if !self.peek().is_some_and(starts_primary) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.peek().is_some_and(starts_primary) {
            items.push(self.word_expr()?);
        }
        Ok(Expr::List(items))
    }

    /// Values with no whitespace between them join into one word.
    fn word_expr(&mut self) -> PResult<Expr> {
        let first = self.postfix()?;
        if !self.touching_primary() {
            return Ok(first);
        }
        let mut pieces = vec![first];
        while self.touching_primary() {
            pieces.push(self.postfix()?);
        }
        Ok(Expr::Concat(pieces))
    }

    /// A primary, plus `$xs(...)` indexing when `(` touches the name.
    fn postfix(&mut self) -> PResult<Expr> {
        let is_var = matches!(self.peek(), Some(Token::Var(_)));
        let mut expr = self.primary()?;
        if !is_var {
            return Ok(expr);
        }
        while self.touching(&Token::LParen) {
            self.advance();
            self.enter()?;
            let index = self.index()?;
            self.leave();
            self.expect(&Token::RParen, "to close the index")?;
            expr = Expr::Index {
                target: Box::new(expr),
                index,
            };
        }
        Ok(expr)
    }

    /// True if the next token is `token` with no whitespace before it.
    fn touching(&self, token: &Token) -> bool {
        match (self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)), self.tokens.get(self.pos)) {
            (Some(prev), Some(next)) => &next.token == token && prev.span.end == next.span.start,
            _ => false,
        }
    }

    fn touching_primary(&self) -> bool {
        match self.peek() {
            Some(token) if starts_primary(token) => self.touching(token),
            _ => false,
        }
    }

    /// Inside `$xs( ... )`: `i`, `a : b` (either side optional) or `a b`.
    fn index(&mut self) -> PResult<Index> {
        if self.eat(&Token::Colon) {
            let end = self.optional_bound()?;
            return Ok(Index::Slice { start: None, end });
        }
        let first = self.expr()?;
        if self.eat(&Token::Colon) {
            let end = self.optional_bound()?;
            return Ok(Index::Slice {
                start: Some(Box::new(first)),
                end,
            });
        }
        match first {
            Expr::List(mut items) if items.len() == 2 => {
                let end = items.pop().map(Box::new);
                let start = items.pop().map(Box::new);
                Ok(Index::Slice { start, end })
            }
            other => Ok(Index::At(Box::new(other))),
        }
    }

    fn optional_bound(&mut self) -> PResult<Option<Box<Expr>>> {
        if self.at(&Token::RParen) {
            return Ok(None);
        }
        Ok(Some(Box::new(self.expr()?)))
    }

    fn primary(&mut self) -> PResult<Expr> {
        let Some(token) = self.peek().cloned() else {
            return Err(self.unexpected("expected a value"));
        };
        if !starts_primary(&token) && !matches!(token, Token::Spawn | Token::Amp) {
            return Err(self.unexpected("expected a value"));
        }
        self.advance();
        match token {
            Token::Word(word) => Ok(Expr::Literal(word)),
            Token::RawStr(text) => Ok(Expr::Literal(text)),
            Token::Str(parts) => Ok(string_expr(parts)),
            Token::Var(name) => Ok(Expr::Var(name)),
            Token::Length(name) => Ok(Expr::Length(name)),
            Token::LParen => {
                self.enter()?;
                self.skip_newlines();
                let expr = if self.at(&Token::RParen) {
                    Expr::List(Vec::new())
                } else {
                    self.expr()?
                };
                self.skip_newlines();
                self.leave();
                self.expect(&Token::RParen, "to close the expression")?;
                Ok(expr)
            }
            Token::LBracket => {
                self.enter()?;
                let body = self.statements(Some(&Token::RBracket))?;
                self.leave();
                self.expect(&Token::RBracket, "to close the capture")?;
                Ok(Expr::Capture(body))
            }
            _ => Ok(Expr::Spawn(Arc::new(self.block()?))),
        }
    }
}

/// Tokens that begin a juxtaposed value.
fn starts_primary(token: &Token) -> bool {
    matches!(
        token,
        Token::Word(_)
            | Token::Var(_)
            | Token::Str(_)
            | Token::RawStr(_)
            | Token::Length(_)
            | Token::LParen
            | Token::LBracket
    )
}

fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

fn string_expr(mut parts: Vec<StringPart>) -> Expr {
    match parts.as_slice() {
        [StringPart::Literal(_)] => match parts.pop() {
            Some(StringPart::Literal(text)) => Expr::Literal(text),
            _ => Expr::Interpolated(parts),
        },
        _ => Expr::Interpolated(parts),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stmt(source: &str) -> Stmt {
        let mut program = parse(source).expect("parse failed");
        assert_eq!(program.statements.len(), 1, "expected one statement in {:?}", source);
        program.statements.remove(0)
    }

    fn lit(s: &str) -> Expr {
        Expr::Literal(s.to_string())
    }

    fn var(s: &str) -> Expr {
        Expr::Var(s.to_string())
    }

    #[test]
    fn call_with_args() {
        assert_eq!(
            stmt("echo a $b"),
            Stmt::Call(Call {
                name: "echo".into(),
                args: vec![lit("a"), var("b")]
            })
        );
    }

    #[test]
    fn operators_are_words_in_args() {
        assert_eq!(
            stmt("echo 1 + 2 if"),
            Stmt::Call(Call {
                name: "echo".into(),
                args: vec![lit("1"), lit("+"), lit("2"), lit("if")]
            })
        );
    }

    #[test]
    fn feed_from_call_words() {
        let Stmt::Pipeline(p) = stmt("1 2 3 -> f | g") else {
            panic!("expected pipeline");
        };
        assert_eq!(p.feed, Some(vec![lit("1"), lit("2"), lit("3")]));
        assert_eq!(p.stages.len(), 2);
    }

    #[test]
    fn feed_from_values() {
        let Stmt::Pipeline(p) = stmt("$xs [f] -> g") else {
            panic!("expected pipeline");
        };
        let feed = p.feed.unwrap();
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0], var("xs"));
        assert!(matches!(feed[1], Expr::Capture(_)));
    }

    #[test]
    fn precedence() {
        // juxtaposition binds tighter than arithmetic and comparison
        let Stmt::Value(expr) = stmt("(1 2 3 % 2 == 1)") else {
            panic!("expected value statement");
        };
        let Expr::Binary { op: BinaryOp::Eq, left, .. } = expr else {
            panic!("expected ==");
        };
        let Expr::Binary { op: BinaryOp::Mod, left, .. } = *left else {
            panic!("expected %");
        };
        assert_eq!(*left, Expr::List(vec![lit("1"), lit("2"), lit("3")]));
    }

    #[test]
    fn statement_chains() {
        assert!(matches!(stmt("$x > 1 && echo yes"), Stmt::AndChain { .. }));
        assert!(matches!(stmt("f || g"), Stmt::OrChain { .. }));
        assert!(matches!(stmt("! f"), Stmt::Not(_)));
    }

    #[test]
    fn index_and_slices() {
        let index = |s: &str| match stmt(s) {
            Stmt::Value(Expr::Index { index, .. }) => index,
            other => panic!("expected index, got {:?}", other),
        };
        assert!(matches!(index("$xs(0)"), Index::At(_)));
        assert!(matches!(index("$xs(1 : 0)"), Index::Slice { start: Some(_), end: Some(_) }));
        assert!(matches!(index("$xs(: 2)"), Index::Slice { start: None, end: Some(_) }));
        assert!(matches!(index("$xs(1 :)"), Index::Slice { start: Some(_), end: None }));
        assert!(matches!(index("$xs(1 3)"), Index::Slice { start: Some(_), end: Some(_) }));
    }

    #[test]
    fn space_before_paren_is_juxtaposition() {
        assert_eq!(stmt("$xs (0)"), Stmt::Value(Expr::List(vec![var("xs"), lit("0")])));
    }

    #[test]
    fn touching_values_join() {
        let Stmt::Call(call) = stmt("echo d$i \"$a\"x $xs(0)y a b") else {
            panic!("expected a call");
        };
        assert_eq!(call.args[0], Expr::Concat(vec![lit("d"), var("i")]));
        assert!(matches!(&call.args[1], Expr::Concat(pieces) if pieces.len() == 2));
        assert!(matches!(&call.args[2], Expr::Concat(pieces) if matches!(pieces[0], Expr::Index { .. })));
        assert_eq!(call.args[3], lit("a"));
        assert_eq!(call.args.len(), 5);
    }

    #[test]
    fn let_with_patterns() {
        let Stmt::Let(l) = stmt("let $a $b ($rest) = 1 2 3") else {
            panic!("expected let");
        };
        assert_eq!(l.pattern.names, vec!["a", "b"]);
        assert_eq!(l.pattern.rest.as_deref(), Some("rest"));
        assert_eq!(l.value, Expr::List(vec![lit("1"), lit("2"), lit("3")]));
    }

    #[test]
    fn rest_must_be_last() {
        assert!(parse("let ($a) $b = 1").is_err());
    }

    #[test]
    fn fun_and_while() {
        let Stmt::FunDef(def) = stmt("fun count $n {\n  while ($n > 0) { yield $n; let $n = ($n - 1) }\n}") else {
            panic!("expected fun");
        };
        assert_eq!(def.name, "count");
        assert_eq!(def.params.names, vec!["n"]);
        assert!(matches!(def.body[0], Stmt::While(_)));
    }

    #[test]
    fn else_on_next_line() {
        let Stmt::If(i) = stmt("if f {\n  a\n}\nelse if g {\n  b\n}\nelse {\n  c\n}") else {
            panic!("expected if");
        };
        assert_eq!(i.branches.len(), 2);
        assert!(i.else_branch.is_some());
    }

    #[test]
    fn statement_after_if_is_separate() {
        let program = parse("if f { a }\necho b").unwrap();
        assert_eq!(program.statements.len(), 2);
    }

    #[test]
    fn spawn_forms() {
        assert!(matches!(stmt("spawn { f }"), Stmt::Spawn(_)));
        assert!(matches!(stmt("& { f }"), Stmt::Spawn(_)));
        let Stmt::Let(l) = stmt("let $j = spawn { f }") else {
            panic!("expected let");
        };
        assert!(matches!(l.value, Expr::Spawn(_)));
    }

    #[test]
    fn return_and_break_values() {
        assert_eq!(stmt("return"), Stmt::Return(None));
        assert_eq!(stmt("return $x"), Stmt::Return(Some(var("x"))));
        assert_eq!(stmt("break 1"), Stmt::Break(Some(lit("1"))));
    }

    #[test]
    fn interpolated_strings() {
        assert_eq!(stmt("echo \"plain\""), Stmt::Call(Call { name: "echo".into(), args: vec![lit("plain")] }));
        let Stmt::Call(call) = stmt("echo \"hi $name\"") else {
            panic!("expected call");
        };
        assert!(matches!(call.args[0], Expr::Interpolated(_)));
    }

    #[test]
    fn errors_have_positions() {
        let err = parse("echo ok\nif {").unwrap_err();
        assert_eq!(err.line, 2);
        assert!(err.to_string().starts_with("line 2"));
    }

    #[test]
    fn missing_separator() {
        assert!(parse("{ a } { b }").is_err());
    }
}
