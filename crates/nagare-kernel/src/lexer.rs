//! Lexer for nagare source code.
//!
//! Converts source text into a stream of tokens using the logos lexer generator.
//!
//! # Token Categories
//!
//! - **Keywords**: `if`, `else`, `while`, `fun`, `let`, `fetch`, `yield`,
//!   `return`, `break`, `continue`, `defer`, `spawn`, `join`
//! - **Words**: bare text such as `echo`, `42`, `-n`, `/tmp/x`, `%1`
//! - **Strings**: `"interpolated $x"` and `'raw'`
//! - **Variables**: `$name`, `${name}`, and lengths `#name`
//! - **Operators**: `| -> & && || ! = == != < <= > >= + - * / % :`
//! - **Punctuation**: `{ } ( ) [ ] ;` and newlines
//!
//! Operators only stand alone when surrounded by whitespace: `-2` and
//! `/tmp` are words, `a - 2` is a subtraction.

use logos::{FilterResult, Logos, Span};
use std::fmt;

use crate::ast::StringPart;

/// A token with its span in the source text.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub token: T,
    pub span: Span,
}

impl<T> Spanned<T> {
    pub fn new(token: T, span: Span) -> Self {
        Self { token, span }
    }
}

/// Lexer error types.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum LexerError {
    #[default]
    UnexpectedCharacter,
    UnterminatedString,
    InvalidEscape(char),
    InvalidVarRef,
}

impl fmt::Display for LexerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexerError::UnexpectedCharacter => write!(f, "unexpected character"),
            LexerError::UnterminatedString => write!(f, "unterminated string"),
            LexerError::InvalidEscape(c) => write!(f, "invalid escape sequence '\\{}'", c),
            LexerError::InvalidVarRef => write!(f, "invalid variable reference in string"),
        }
    }
}

impl std::error::Error for LexerError {}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t]+")]
pub enum Token {
    // ═══════════════════════════════════════════════════════════════════
    // Keywords (must come before Word for priority)
    // ═══════════════════════════════════════════════════════════════════
    #[token("if")]
    If,

    #[token("else")]
    Else,

    #[token("while")]
    While,

    #[token("fun")]
    Fun,

    #[token("let")]
    Let,

    #[token("fetch")]
    Fetch,

    #[token("yield")]
    Yield,

    #[token("return")]
    Return,

    #[token("break")]
    Break,

    #[token("continue")]
    Continue,

    #[token("defer")]
    Defer,

    #[token("spawn")]
    Spawn,

    #[token("join")]
    Join,

    // ═══════════════════════════════════════════════════════════════════
    // Operators
    // ═══════════════════════════════════════════════════════════════════
    #[token("&&")]
    And,

    #[token("||")]
    Or,

    #[token("==")]
    EqEq,

    #[token("!=")]
    NotEq,

    #[token("<=")]
    LtEq,

    #[token(">=")]
    GtEq,

    #[token("->")]
    Arrow,

    #[token("=")]
    Eq,

    #[token("|")]
    Pipe,

    #[token("&")]
    Amp,

    #[token("!")]
    Bang,

    #[token("<")]
    Lt,

    #[token(">")]
    Gt,

    #[token("+", priority = 10)]
    Plus,

    #[token("-", priority = 10)]
    Minus,

    #[token("*")]
    Star,

    #[token("/", priority = 10)]
    Slash,

    #[token("%", priority = 10)]
    Percent,

    #[token(":")]
    Colon,

    #[token(";")]
    Semi,

    // ═══════════════════════════════════════════════════════════════════
    // Grouping
    // ═══════════════════════════════════════════════════════════════════
    #[token("{")]
    LBrace,

    #[token("}")]
    RBrace,

    #[token("(")]
    LParen,

    #[token(")")]
    RParen,

    #[token("[")]
    LBracket,

    #[token("]")]
    RBracket,

    // ═══════════════════════════════════════════════════════════════════
    // Values
    // ═══════════════════════════════════════════════════════════════════

    /// Double-quoted string, split into literal and `$name` parts
    #[regex(r#""([^"\\]|\\.)*""#, lex_string)]
    Str(Vec<StringPart>),

    /// Single-quoted string, no escapes or interpolation
    #[regex(r"'[^']*'", lex_raw_string)]
    RawStr(String),

    /// Variable reference: `$name` or `${name}` → `name`
    #[regex(r"\$[a-zA-Z_][a-zA-Z0-9_]*", lex_var)]
    #[regex(r"\$\{[a-zA-Z_][a-zA-Z0-9_]*\}", lex_braced_var)]
    Var(String),

    /// Element count: `#name` → `name`; a comment when it opens a line
    #[regex(r"#[a-zA-Z_][a-zA-Z0-9_]*", lex_length)]
    Length(String),

    /// Bare word: command names, numbers, flags, paths, job handles.
    /// A `:` may appear after the first character (`random:choice`).
    #[regex(r"[a-zA-Z0-9_./~@%+,^-][a-zA-Z0-9_./~@%+,^=:-]*", lex_word)]
    Word(String),

    // ═══════════════════════════════════════════════════════════════════
    // Structural tokens
    // ═══════════════════════════════════════════════════════════════════

    /// Comment: `#` not followed by a name, or `//`, to end of line
    #[regex(r"#([^a-zA-Z_\n\r][^\n\r]*)?")]
    #[regex(r"//[^\n\r]*")]
    Comment,

    /// Newline (ends statements)
    #[regex(r"\n|\r\n")]
    Newline,

    /// Line continuation: backslash at end of line
    #[regex(r"\\[ \t]*(\n|\r\n)")]
    LineContinuation,
}

impl Token {
    /// Literal text of tokens that read as plain words in argument position.
    pub fn as_word(&self) -> Option<&'static str> {
        Some(match self {
            Token::If => "if",
            Token::Else => "else",
            Token::While => "while",
            Token::Fun => "fun",
            Token::Let => "let",
            Token::Fetch => "fetch",
            Token::Yield => "yield",
            Token::Return => "return",
            Token::Break => "break",
            Token::Continue => "continue",
            Token::Defer => "defer",
            Token::Spawn => "spawn",
            Token::Join => "join",
            Token::EqEq => "==",
            Token::NotEq => "!=",
            Token::LtEq => "<=",
            Token::GtEq => ">=",
            Token::Eq => "=",
            Token::Bang => "!",
            Token::Lt => "<",
            Token::Gt => ">",
            Token::Plus => "+",
            Token::Minus => "-",
            Token::Star => "*",
            Token::Slash => "/",
            Token::Percent => "%",
            Token::Colon => ":",
            _ => return None,
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(word) = self.as_word() {
            return write!(f, "'{}'", word);
        }
        match self {
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
            Token::Arrow => write!(f, "'->'"),
            Token::Pipe => write!(f, "'|'"),
            Token::Amp => write!(f, "'&'"),
            Token::Semi => write!(f, "';'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Str(_) => write!(f, "string"),
            Token::RawStr(_) => write!(f, "string"),
            Token::Var(name) => write!(f, "'${}'", name),
            Token::Length(name) => write!(f, "'#{}'", name),
            Token::Word(w) => write!(f, "'{}'", w),
            Token::Comment => write!(f, "comment"),
            Token::Newline => write!(f, "newline"),
            Token::LineContinuation => write!(f, "line continuation"),
            _ => write!(f, "{:?}", self),
        }
    }
}

/// Lex a double-quoted string literal, processing escapes and `$name`.
fn lex_string(lex: &mut logos::Lexer<Token>) -> Result<Vec<StringPart>, LexerError> {
    let s = lex.slice();
    parse_string_literal(&s[1..s.len() - 1])
}

/// Lex a single-quoted string literal (no escape processing).
fn lex_raw_string(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[1..s.len() - 1].to_string()
}

/// Lex a simple variable reference: `$NAME` → `NAME`
fn lex_var(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice()[1..].to_string()
}

/// Lex a braced variable reference: `${NAME}` → `NAME`
fn lex_braced_var(lex: &mut logos::Lexer<Token>) -> String {
    let s = lex.slice();
    s[2..s.len() - 1].to_string()
}

/// Lex a length reference: `#NAME` → `NAME`
///
/// With only whitespace before it on its line, `#NAME` starts a comment.
fn lex_length(lex: &mut logos::Lexer<Token>) -> FilterResult<String, LexerError> {
    let start = lex.span().start;
    let source = lex.source();
    let line_start = source[..start].rfind('\n').map_or(0, |i| i + 1);
    if source[line_start..start].trim().is_empty() {
        let rest = lex.remainder();
        let end = rest.find(['\n', '\r']).unwrap_or(rest.len());
        lex.bump(end);
        return FilterResult::Skip;
    }
    FilterResult::Emit(lex.slice()[1..].to_string())
}

fn lex_word(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice().to_string()
}

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Split the inside of a double-quoted string into parts.
///
/// Escapes: `\n \t \r \\ \" \$`. A `$` not followed by a name or `{name}`
/// stays literal.
pub fn parse_string_literal(body: &str) -> Result<Vec<StringPart>, LexerError> {
    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some('n') => literal.push('\n'),
                Some('t') => literal.push('\t'),
                Some('r') => literal.push('\r'),
                Some('\\') => literal.push('\\'),
                Some('"') => literal.push('"'),
                Some('$') => literal.push('$'),
                Some(other) => return Err(LexerError::InvalidEscape(other)),
                None => return Err(LexerError::UnterminatedString),
            },
            '$' => {
                let braced = chars.peek() == Some(&'{');
                if braced {
                    chars.next();
                } else if !chars.peek().copied().is_some_and(is_name_start) {
                    literal.push('$');
                    continue;
                }
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if (name.is_empty() && !is_name_start(c)) || !is_name_char(c) {
                        break;
                    }
                    name.push(c);
                    chars.next();
                }
                if (braced && chars.next() != Some('}')) || name.is_empty() {
                    return Err(LexerError::InvalidVarRef);
                }
                if !literal.is_empty() {
                    parts.push(StringPart::Literal(std::mem::take(&mut literal)));
                }
                parts.push(StringPart::Var(name));
            }
            c => literal.push(c),
        }
    }
    if !literal.is_empty() || parts.is_empty() {
        parts.push(StringPart::Literal(literal));
    }
    Ok(parts)
}

/// Tokenize source code into a vector of spanned tokens.
///
/// Skips whitespace, comments and line continuations. Returns every error
/// with its position.
pub fn tokenize(source: &str) -> Result<Vec<Spanned<Token>>, Vec<Spanned<LexerError>>> {
    let lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    for (result, span) in lexer.spanned() {
        match result {
            Ok(Token::Comment | Token::LineContinuation) => {}
            Ok(token) => tokens.push(Spanned::new(token, span)),
            Err(err) => {
                // logos reports an unterminated quote as a bad character
                let err = match (&err, source[span.clone()].chars().next()) {
                    (LexerError::UnexpectedCharacter, Some('"' | '\'')) => LexerError::UnterminatedString,
                    _ => err,
                };
                errors.push(Spanned::new(err, span));
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }
    Ok(tokens)
}

/// 1-based line and column of a byte offset.
pub fn line_col(source: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() + 1;
    let col = match before.rfind('\n') {
        Some(nl) => before[nl + 1..].chars().count() + 1,
        None => before.chars().count() + 1,
    };
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(source: &str) -> Vec<Token> {
        tokenize(source)
            .expect("lex failed")
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    fn word(s: &str) -> Token {
        Token::Word(s.to_string())
    }

    #[test]
    fn keywords_and_words() {
        assert_eq!(lex("if iffy"), vec![Token::If, word("iffy")]);
        assert_eq!(lex("fun f"), vec![Token::Fun, word("f")]);
    }

    #[test]
    fn negative_numbers_and_flags_are_words() {
        assert_eq!(lex("-2 -n --all"), vec![word("-2"), word("-n"), word("--all")]);
        assert_eq!(lex("a - 2"), vec![word("a"), Token::Minus, word("2")]);
    }

    #[test]
    fn paths_and_handles() {
        assert_eq!(lex("cd /tmp/x"), vec![word("cd"), word("/tmp/x")]);
        assert_eq!(lex("join %1"), vec![Token::Join, word("%1")]);
        assert_eq!(lex("$x % 2"), vec![Token::Var("x".into()), Token::Percent, word("2")]);
    }

    #[test]
    fn variables_and_lengths() {
        assert_eq!(
            lex("$xs ${y} #xs"),
            vec![Token::Var("xs".into()), Token::Var("y".into()), Token::Length("xs".into())]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(lex("echo hi # a comment"), vec![word("echo"), word("hi")]);
        assert_eq!(lex("echo hi // another"), vec![word("echo"), word("hi")]);
        assert_eq!(lex("#!/usr/bin/env nagare\necho"), vec![Token::Newline, word("echo")]);
    }

    #[test]
    fn hash_name_opening_a_line_is_a_comment() {
        assert_eq!(lex("#comment here\nyield #xs"), vec![Token::Newline, Token::Yield, Token::Length("xs".into())]);
        assert_eq!(lex("  #todo don't\necho"), vec![Token::Newline, word("echo")]);
    }

    #[test]
    fn slice_colon_is_separate() {
        assert_eq!(
            lex("$xs(1 : -1)"),
            vec![
                Token::Var("xs".into()),
                Token::LParen,
                word("1"),
                Token::Colon,
                word("-1"),
                Token::RParen
            ]
        );
    }

    #[test]
    fn colon_inside_a_word_is_part_of_it() {
        assert_eq!(lex("random:choice"), vec![word("random:choice")]);
        assert_eq!(lex(": 2"), vec![Token::Colon, word("2")]);
    }

    #[test]
    fn lone_operators_beat_words() {
        assert_eq!(
            lex("1 + 2 - 3 / 4 % 5"),
            vec![
                word("1"),
                Token::Plus,
                word("2"),
                Token::Minus,
                word("3"),
                Token::Slash,
                word("4"),
                Token::Percent,
                word("5")
            ]
        );
    }

    #[test]
    fn arrow_and_pipe() {
        assert_eq!(
            lex("1 2 -> f | g"),
            vec![word("1"), word("2"), Token::Arrow, word("f"), Token::Pipe, word("g")]
        );
    }

    #[test]
    fn interpolated_string() {
        assert_eq!(
            lex(r#""a $x-${y}\n""#),
            vec![Token::Str(vec![
                StringPart::Literal("a ".into()),
                StringPart::Var("x".into()),
                StringPart::Literal("-".into()),
                StringPart::Var("y".into()),
                StringPart::Literal("\n".into()),
            ])]
        );
    }

    #[test]
    fn dollar_without_name_is_literal() {
        assert_eq!(
            parse_string_literal("cost: 5$"),
            Ok(vec![StringPart::Literal("cost: 5$".into())])
        );
        assert_eq!(parse_string_literal(r"\$x"), Ok(vec![StringPart::Literal("$x".into())]));
    }

    #[test]
    fn raw_string() {
        assert_eq!(lex("'$x \\n'"), vec![Token::RawStr("$x \\n".into())]);
    }

    #[test]
    fn line_continuation() {
        assert_eq!(lex("echo a \\\n b"), vec![word("echo"), word("a"), word("b")]);
    }

    #[test]
    fn unterminated_string() {
        let errs = tokenize("echo \"oops").unwrap_err();
        assert_eq!(errs[0].token, LexerError::UnterminatedString);
    }

    #[test]
    fn line_and_column() {
        assert_eq!(line_col("ab\ncd", 0), (1, 1));
        assert_eq!(line_col("ab\ncd", 4), (2, 2));
    }
}
