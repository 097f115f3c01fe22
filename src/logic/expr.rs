//! Boolean expression grammar over proposition ids.
//!
//! Hand-rolled lexer and recursive-descent parser (no external parser
//! dependency) for the small fixed grammar the extraction and query-translation
//! collaborators emit:
//!
//! ```text
//! expr    := iff
//! iff     := implies ( IFF implies )*           left-assoc, lowest precedence
//! implies := or ( IMPLIES implies )?            right-assoc
//! or      := and ( OR and )*                    left-assoc
//! and     := unary ( AND unary )*               left-assoc
//! unary   := NOT unary | "(" expr ")" | atom
//! ```
//!
//! Operators are case-insensitive keywords; the symbolic spellings `~`/`!`,
//! `&`/`&&`, `|`/`||`, `->`/`=>`, and `<->`/`<=>` are accepted as well, since
//! upstream models emit both styles. Atoms are proposition ids:
//! `[A-Za-z_][A-Za-z0-9_]*`.

use std::fmt;

/// A parsed boolean expression tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A proposition id.
    Atom(String),
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Implies(Box<Expr>, Box<Expr>),
    Iff(Box<Expr>, Box<Expr>),
}

impl Expr {
    /// Visit every atom in the expression, left to right.
    pub fn atoms(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_atoms(&mut out);
        out
    }

    fn collect_atoms<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Atom(id) => out.push(id),
            Expr::Not(e) => e.collect_atoms(out),
            Expr::And(a, b) | Expr::Or(a, b) | Expr::Implies(a, b) | Expr::Iff(a, b) => {
                a.collect_atoms(out);
                b.collect_atoms(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    /// Canonical keyword rendering; compound subtrees are parenthesized so the
    /// output reparses to an identical tree.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Atom(id) => write!(f, "{id}"),
            Expr::Not(e) => match e.as_ref() {
                Expr::Atom(id) => write!(f, "NOT {id}"),
                inner => write!(f, "NOT ({inner})"),
            },
            Expr::And(a, b) => write!(f, "({a} AND {b})"),
            Expr::Or(a, b) => write!(f, "({a} OR {b})"),
            Expr::Implies(a, b) => write!(f, "({a} IMPLIES {b})"),
            Expr::Iff(a, b) => write!(f, "({a} IFF {b})"),
        }
    }
}

/// A parse failure, with the character position of the offending token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprParseError {
    pub message: String,
    pub position: usize,
}

impl fmt::Display for ExprParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (at position {})", self.message, self.position)
    }
}

impl std::error::Error for ExprParseError {}

// ---------------------------------------------------------------------------
// Lexer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokenKind {
    LParen,
    RParen,
    Not,
    And,
    Or,
    Implies,
    Iff,
    Ident(String),
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    /// Character offset of the token's first character.
    pos: usize,
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprParseError> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let pos = i;
        let kind = match c {
            '(' => {
                i += 1;
                TokenKind::LParen
            }
            ')' => {
                i += 1;
                TokenKind::RParen
            }
            '~' | '!' => {
                i += 1;
                TokenKind::Not
            }
            '&' => {
                i += if chars.get(i + 1) == Some(&'&') { 2 } else { 1 };
                TokenKind::And
            }
            '|' => {
                i += if chars.get(i + 1) == Some(&'|') { 2 } else { 1 };
                TokenKind::Or
            }
            '-' | '=' if chars.get(i + 1) == Some(&'>') => {
                i += 2;
                TokenKind::Implies
            }
            '<' => {
                // "<->" or "<=>"
                let mid = chars.get(i + 1);
                if (mid == Some(&'-') || mid == Some(&'=')) && chars.get(i + 2) == Some(&'>') {
                    i += 3;
                    TokenKind::Iff
                } else {
                    return Err(ExprParseError {
                        message: format!("unexpected character '{c}'"),
                        position: pos,
                    });
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                match word.to_ascii_uppercase().as_str() {
                    "NOT" => TokenKind::Not,
                    "AND" => TokenKind::And,
                    "OR" => TokenKind::Or,
                    "IMPLIES" => TokenKind::Implies,
                    "IFF" => TokenKind::Iff,
                    _ => TokenKind::Ident(word),
                }
            }
            other => {
                return Err(ExprParseError {
                    message: format!("unexpected character '{other}'"),
                    position: pos,
                });
            }
        };
        tokens.push(Token { kind, pos });
    }

    Ok(tokens)
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Token>,
    cursor: usize,
    /// Length of the input in characters, for end-of-input error positions.
    input_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.cursor).map(|t| &t.kind)
    }

    fn pos(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .map(|t| t.pos)
            .unwrap_or(self.input_len)
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.cursor).cloned();
        if tok.is_some() {
            self.cursor += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == Some(kind) {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    fn error(&self, message: impl Into<String>) -> ExprParseError {
        ExprParseError {
            message: message.into(),
            position: self.pos(),
        }
    }

    fn parse_iff(&mut self) -> Result<Expr, ExprParseError> {
        let mut lhs = self.parse_implies()?;
        while self.eat(&TokenKind::Iff) {
            let rhs = self.parse_implies()?;
            lhs = Expr::Iff(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_implies(&mut self) -> Result<Expr, ExprParseError> {
        let lhs = self.parse_or()?;
        if self.eat(&TokenKind::Implies) {
            // Right-associative: a -> b -> c parses as a -> (b -> c).
            let rhs = self.parse_implies()?;
            Ok(Expr::Implies(Box::new(lhs), Box::new(rhs)))
        } else {
            Ok(lhs)
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ExprParseError> {
        let mut lhs = self.parse_and()?;
        while self.eat(&TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Expr, ExprParseError> {
        let mut lhs = self.parse_unary()?;
        while self.eat(&TokenKind::And) {
            let rhs = self.parse_unary()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprParseError> {
        match self.peek() {
            Some(TokenKind::Not) => {
                self.cursor += 1;
                let inner = self.parse_unary()?;
                Ok(Expr::Not(Box::new(inner)))
            }
            Some(TokenKind::LParen) => {
                self.cursor += 1;
                let inner = self.parse_iff()?;
                if !self.eat(&TokenKind::RParen) {
                    return Err(self.error("expected ')'"));
                }
                Ok(inner)
            }
            Some(TokenKind::Ident(_)) => {
                let tok = self.advance().expect("peeked");
                match tok.kind {
                    TokenKind::Ident(id) => Ok(Expr::Atom(id)),
                    _ => unreachable!(),
                }
            }
            Some(TokenKind::RParen) => Err(self.error("unbalanced ')'")),
            Some(_) => Err(self.error("expected an atom, NOT, or '('")),
            None => Err(self.error("unexpected end of expression")),
        }
    }
}

/// Parse an expression string into an [`Expr`] tree.
pub fn parse(input: &str) -> Result<Expr, ExprParseError> {
    let input_len = input.chars().count();
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(ExprParseError {
            message: "empty expression".into(),
            position: 0,
        });
    }

    let mut parser = Parser {
        tokens,
        cursor: 0,
        input_len,
    };
    let expr = parser.parse_iff()?;
    if parser.peek().is_some() {
        return Err(parser.error("trailing tokens after expression"));
    }
    Ok(expr)
}
