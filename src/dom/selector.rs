//! CSS selector engine
//!
//! Supports the subset stored selector descriptors use:
//!
//! ```text
//! list      = complex ("," complex)*
//! complex   = compound (combinator compound)*
//! combinator= " " | ">" | "+" | "~"
//! compound  = [type | "*"] (id | class | attribute | pseudo)*
//! attribute = "[" name [op value] "]"      op = "=" "~=" "^=" "$=" "*=" "|="
//! pseudo    = ":first-child" | ":last-child" | ":nth-child(an+b)" | ":nth-of-type(an+b)"
//! ```
//!
//! Type selectors match tag names ASCII case-insensitively, so `foreignobject`
//! finds an SVG `foreignObject`. Anything outside this grammar (other
//! pseudo-classes, pseudo-elements, namespace prefixes) is a
//! [`SelectorError`], never a silent non-match.

use thiserror::Error;

use super::{Document, NodeId};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SelectorError {
    #[error("Empty selector")]
    Empty,

    #[error("Expected identifier at position {0}")]
    ExpectedIdent(usize),

    #[error("Unclosed attribute selector at position {0}")]
    UnclosedAttribute(usize),

    #[error("Unterminated string at position {0}")]
    UnterminatedString(usize),

    #[error("Unsupported pseudo-class '{0}'")]
    UnsupportedPseudo(String),

    #[error("Invalid nth expression '{0}'")]
    InvalidNth(String),

    #[error("Unexpected character '{0}' at position {1}")]
    UnexpectedChar(char, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals,
    Includes,
    Prefix,
    Suffix,
    Substring,
    DashMatch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrSelector {
    name: String,
    op: AttrOp,
    value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Nth {
    a: i64,
    b: i64,
}

impl Nth {
    fn matches(&self, position: i64) -> bool {
        if self.a == 0 {
            return position == self.b;
        }
        let diff = position - self.b;
        diff % self.a == 0 && diff / self.a >= 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Pseudo {
    NthChild(Nth),
    NthOfType(Nth),
    LastChild,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrSelector>,
    pseudos: Vec<Pseudo>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    NextSibling,
    SubsequentSibling,
}

/// One complex selector: the subject compound plus its ancestry, nearest first
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    subject: Compound,
    ancestry: Vec<(Combinator, Compound)>,
}

/// A parsed, comma-separated selector list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<Complex>,
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn skip_if(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.advance();
        }
        self.pos > start
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn parse_ident(&mut self) -> Result<String, SelectorError> {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '-' || ch == '_' {
                self.advance();
            } else if ch == '\\' {
                self.advance();
                self.advance();
            } else {
                break;
            }
        }
        if self.pos == start {
            return Err(SelectorError::ExpectedIdent(start));
        }
        Ok(self.input[start..self.pos].replace('\\', ""))
    }

    fn parse_string(&mut self, quote: char) -> Result<String, SelectorError> {
        let start = self.pos;
        let mut result = String::new();
        loop {
            match self.advance() {
                Some('\\') => {
                    if let Some(ch) = self.advance() {
                        result.push(ch);
                    }
                }
                Some(ch) if ch == quote => return Ok(result),
                Some(ch) => result.push(ch),
                None => return Err(SelectorError::UnterminatedString(start)),
            }
        }
    }

    fn parse_attribute(&mut self) -> Result<AttrSelector, SelectorError> {
        let open = self.pos;
        self.skip_whitespace();
        let name = self.parse_ident()?;
        self.skip_whitespace();

        let op = match self.peek() {
            Some(']') => {
                self.advance();
                return Ok(AttrSelector {
                    name,
                    op: AttrOp::Exists,
                    value: String::new(),
                });
            }
            Some('=') => AttrOp::Equals,
            Some('~') => AttrOp::Includes,
            Some('^') => AttrOp::Prefix,
            Some('$') => AttrOp::Suffix,
            Some('*') => AttrOp::Substring,
            Some('|') => AttrOp::DashMatch,
            Some(ch) => return Err(SelectorError::UnexpectedChar(ch, self.pos)),
            None => return Err(SelectorError::UnclosedAttribute(open)),
        };
        self.advance();
        if op != AttrOp::Equals && !self.skip_if('=') {
            return Err(SelectorError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos));
        }
        self.skip_whitespace();

        let value = match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.advance();
                self.parse_string(q)?
            }
            _ => self.parse_ident()?,
        };
        self.skip_whitespace();
        if !self.skip_if(']') {
            return Err(SelectorError::UnclosedAttribute(open));
        }
        Ok(AttrSelector { name, op, value })
    }

    fn parse_pseudo(&mut self) -> Result<Pseudo, SelectorError> {
        let name = self.parse_ident()?;
        match name.as_str() {
            "first-child" => Ok(Pseudo::NthChild(Nth { a: 0, b: 1 })),
            "last-child" => Ok(Pseudo::LastChild),
            "nth-child" | "nth-of-type" => {
                if !self.skip_if('(') {
                    return Err(SelectorError::UnexpectedChar(self.peek().unwrap_or('\0'), self.pos));
                }
                let start = self.pos;
                while matches!(self.peek(), Some(c) if c != ')') {
                    self.advance();
                }
                let expr = self.input[start..self.pos].to_string();
                if !self.skip_if(')') {
                    return Err(SelectorError::InvalidNth(expr));
                }
                let nth = parse_nth(&expr)?;
                Ok(if name == "nth-child" {
                    Pseudo::NthChild(nth)
                } else {
                    Pseudo::NthOfType(nth)
                })
            }
            _ => Err(SelectorError::UnsupportedPseudo(name)),
        }
    }

    fn parse_compound(&mut self) -> Result<Compound, SelectorError> {
        let start = self.pos;
        let mut compound = Compound::default();

        if self.skip_if('*') {
            // universal
        } else if matches!(self.peek(), Some(c) if c.is_alphabetic()) {
            compound.tag = Some(self.parse_ident()?.to_ascii_lowercase());
        }

        loop {
            match self.peek() {
                Some('#') => {
                    self.advance();
                    compound.ids.push(self.parse_ident()?);
                }
                Some('.') => {
                    self.advance();
                    compound.classes.push(self.parse_ident()?);
                }
                Some('[') => {
                    self.advance();
                    compound.attrs.push(self.parse_attribute()?);
                }
                Some(':') => {
                    self.advance();
                    compound.pseudos.push(self.parse_pseudo()?);
                }
                _ => break,
            }
        }

        if self.pos == start {
            return Err(match self.peek() {
                Some(ch) => SelectorError::UnexpectedChar(ch, self.pos),
                None => SelectorError::ExpectedIdent(self.pos),
            });
        }
        Ok(compound)
    }

    fn parse_complex(&mut self) -> Result<Complex, SelectorError> {
        self.skip_whitespace();
        let mut compounds = vec![self.parse_compound()?];
        let mut combinators = Vec::new();

        loop {
            let had_space = self.skip_whitespace();
            let combinator = match self.peek() {
                Some('>') => Combinator::Child,
                Some('+') => Combinator::NextSibling,
                Some('~') => Combinator::SubsequentSibling,
                Some(',') | None => break,
                Some(_) if had_space => {
                    combinators.push(Combinator::Descendant);
                    compounds.push(self.parse_compound()?);
                    continue;
                }
                Some(ch) => return Err(SelectorError::UnexpectedChar(ch, self.pos)),
            };
            self.advance();
            self.skip_whitespace();
            combinators.push(combinator);
            compounds.push(self.parse_compound()?);
        }

        let subject = compounds.pop().ok_or(SelectorError::Empty)?;
        let mut ancestry = Vec::new();
        while let Some(compound) = compounds.pop() {
            let combinator = combinators.pop().ok_or(SelectorError::Empty)?;
            ancestry.push((combinator, compound));
        }
        Ok(Complex { subject, ancestry })
    }
}

fn parse_nth(expr: &str) -> Result<Nth, SelectorError> {
    let compact: String = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let invalid = || SelectorError::InvalidNth(expr.to_string());

    match compact.as_str() {
        "odd" => return Ok(Nth { a: 2, b: 1 }),
        "even" => return Ok(Nth { a: 2, b: 0 }),
        _ => {}
    }

    match compact.split_once('n') {
        Some((a, b)) => {
            let a = match a {
                "" | "+" => 1,
                "-" => -1,
                other => other.parse().map_err(|_| invalid())?,
            };
            let b = if b.is_empty() {
                0
            } else {
                b.trim_start_matches('+').parse().map_err(|_| invalid())?
            };
            Ok(Nth { a, b })
        }
        None => Ok(Nth {
            a: 0,
            b: compact.parse().map_err(|_| invalid())?,
        }),
    }
}

impl SelectorList {
    pub fn parse(input: &str) -> Result<Self, SelectorError> {
        if input.trim().is_empty() {
            return Err(SelectorError::Empty);
        }
        let mut parser = Parser::new(input);
        let mut selectors = vec![parser.parse_complex()?];
        while parser.skip_if(',') {
            selectors.push(parser.parse_complex()?);
        }
        parser.skip_whitespace();
        if !parser.at_end() {
            let ch = parser.peek().unwrap_or('\0');
            return Err(SelectorError::UnexpectedChar(ch, parser.pos));
        }
        Ok(Self { selectors })
    }

    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.selectors.iter().any(|s| s.matches(doc, node))
    }
}

impl Complex {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        self.subject.matches(doc, node) && matches_ancestry(doc, node, &self.ancestry)
    }
}

fn element_siblings(doc: &Document, node: NodeId) -> Vec<NodeId> {
    doc.parent(node)
        .map(|p| {
            doc.children(p)
                .iter()
                .copied()
                .filter(|&c| doc.is_element(c))
                .collect()
        })
        .unwrap_or_default()
}

fn previous_elements(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let siblings = element_siblings(doc, node);
    let idx = siblings.iter().position(|&s| s == node).unwrap_or(0);
    siblings[..idx].iter().rev().copied().collect()
}

fn matches_ancestry(doc: &Document, node: NodeId, rest: &[(Combinator, Compound)]) -> bool {
    let Some(((combinator, compound), tail)) = rest.split_first() else {
        return true;
    };

    match combinator {
        Combinator::Child => doc
            .parent(node)
            .is_some_and(|p| compound.matches(doc, p) && matches_ancestry(doc, p, tail)),
        Combinator::Descendant => doc
            .ancestors(node)
            .into_iter()
            .any(|a| compound.matches(doc, a) && matches_ancestry(doc, a, tail)),
        Combinator::NextSibling => previous_elements(doc, node)
            .first()
            .is_some_and(|&s| compound.matches(doc, s) && matches_ancestry(doc, s, tail)),
        Combinator::SubsequentSibling => previous_elements(doc, node)
            .into_iter()
            .any(|s| compound.matches(doc, s) && matches_ancestry(doc, s, tail)),
    }
}

impl Compound {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let Some(el) = doc.element(node) else {
            return false;
        };
        if let Some(tag) = &self.tag {
            if !el.name.eq_ignore_ascii_case(tag) {
                return false;
            }
        }
        if !self.ids.iter().all(|id| doc.attr(node, "id") == Some(id.as_str())) {
            return false;
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        if !self.attrs.iter().all(|a| a.matches(doc.attr(node, &a.name))) {
            return false;
        }
        self.pseudos.iter().all(|p| p.matches(doc, node))
    }
}

impl AttrSelector {
    fn matches(&self, actual: Option<&str>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        let value = self.value.as_str();
        match self.op {
            AttrOp::Exists => true,
            AttrOp::Equals => actual == value,
            AttrOp::Includes => actual.split_whitespace().any(|t| t == value),
            AttrOp::Prefix => !value.is_empty() && actual.starts_with(value),
            AttrOp::Suffix => !value.is_empty() && actual.ends_with(value),
            AttrOp::Substring => !value.is_empty() && actual.contains(value),
            AttrOp::DashMatch => actual == value || actual.starts_with(&format!("{}-", value)),
        }
    }
}

impl Pseudo {
    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        let siblings = element_siblings(doc, node);
        let Some(idx) = siblings.iter().position(|&s| s == node) else {
            return false;
        };
        match self {
            Pseudo::NthChild(nth) => nth.matches(idx as i64 + 1),
            Pseudo::LastChild => idx + 1 == siblings.len(),
            Pseudo::NthOfType(nth) => {
                let tag = doc.tag_name(node);
                let position = siblings[..=idx]
                    .iter()
                    .filter(|&&s| doc.tag_name(s) == tag)
                    .count();
                nth.matches(position as i64)
            }
        }
    }
}
