//! Event/marker recursive-descent parser for Slate.
//!
//! The grammar functions drive a [`Parser`] that records a flat event stream
//! (`Open` / `Token` / `Close`); the stream is then replayed into the node
//! arena. Markers allow wrapping already-parsed nodes (`open_before`), which
//! is how left-associative expressions are built.
//!
//! The parser is error tolerant: it never panics and always produces a tree
//! for any input, attaching `Error` nodes and collecting [`ParseError`]s
//! where the grammar could not make progress.

mod expressions;
mod items;
mod statements;
mod types;

use serde::Serialize;
use slate_common::Span;

use crate::kind::{Field, SyntaxKind};
use crate::lexer::{lex, Token};
use crate::tree::{NodeData, SyntaxTree};

pub(crate) use expressions::expr;

/// A parse error with location information. Collected, never thrown.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

/// Result of parsing one file: the tree plus all lex and parse errors.
#[derive(Debug)]
pub struct Parse {
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

/// Parse `text` into a syntax tree rooted at a `SourceFile` node.
pub fn parse_file(text: &str) -> Parse {
    let (tokens, lex_errors) = lex(text);
    let mut p = Parser {
        tokens,
        pos: 0,
        split_gt: None,
        fuel: 256,
        events: Vec::new(),
        marker_pos: Vec::new(),
        errors: Vec::new(),
    };
    for err in lex_errors {
        p.errors.push(ParseError {
            message: err.message,
            span: err.span,
        });
    }
    items::source_file(&mut p);
    let tree = build_tree(p.events, text.to_owned());
    Parse {
        tree,
        errors: p.errors,
    }
}

#[derive(Debug, Clone)]
enum Event {
    Open {
        kind: SyntaxKind,
        field: Option<Field>,
    },
    Token {
        kind: SyntaxKind,
        span: Span,
    },
    Close,
}

/// Stable id of a pending `Open` event.
pub(crate) struct MarkerOpened(usize);

/// Stable id of a completed `Open` event; can be wrapped or field-tagged.
#[derive(Clone, Copy)]
pub(crate) struct MarkerClosed(usize);

pub(crate) struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    /// Remainder of a `>>`-style token whose leading `>` was consumed while
    /// closing a type argument list. Logically sits before `tokens[pos]`.
    split_gt: Option<Token>,
    fuel: u32,
    events: Vec<Event>,
    /// Marker id → index of its `Open` event. Indirection keeps markers
    /// valid across the event insertion `open_before` performs.
    marker_pos: Vec<usize>,
    errors: Vec<ParseError>,
}

impl Parser {
    pub(crate) fn open(&mut self) -> MarkerOpened {
        let m = MarkerOpened(self.marker_pos.len());
        self.marker_pos.push(self.events.len());
        self.events.push(Event::Open {
            kind: SyntaxKind::Error,
            field: None,
        });
        m
    }

    pub(crate) fn close(&mut self, m: MarkerOpened, kind: SyntaxKind) -> MarkerClosed {
        let at = self.marker_pos[m.0];
        if let Event::Open { kind: slot, .. } = &mut self.events[at] {
            *slot = kind;
        }
        self.events.push(Event::Close);
        MarkerClosed(m.0)
    }

    /// Open a new node that adopts the already-closed node `m` as its first
    /// child. Used for left-associative constructs (binary, dot, call, ...).
    pub(crate) fn open_before(&mut self, m: MarkerClosed) -> MarkerOpened {
        let at = self.marker_pos[m.0];
        self.events.insert(
            at,
            Event::Open {
                kind: SyntaxKind::Error,
                field: None,
            },
        );
        for pos in &mut self.marker_pos {
            if *pos >= at {
                *pos += 1;
            }
        }
        let id = MarkerOpened(self.marker_pos.len());
        self.marker_pos.push(at);
        id
    }

    /// Tag a completed node with the role it plays in its parent.
    pub(crate) fn tag(&mut self, m: MarkerClosed, field: Field) {
        let at = self.marker_pos[m.0];
        if let Event::Open { field: slot, .. } = &mut self.events[at] {
            *slot = Some(field);
        }
    }

    pub(crate) fn current(&mut self) -> SyntaxKind {
        if self.fuel == 0 {
            // Grammar bug guard: force forward progress instead of spinning.
            self.fuel = 256;
            self.advance_with_error("parser stuck, skipping token");
        }
        self.fuel = self.fuel.saturating_sub(1);
        self.nth(0)
    }

    pub(crate) fn nth(&self, n: usize) -> SyntaxKind {
        if let Some(t) = self.split_gt {
            if n == 0 {
                return t.kind;
            }
            return self
                .tokens
                .get(self.pos + n - 1)
                .map_or(SyntaxKind::Eof, |t| t.kind);
        }
        self.tokens
            .get(self.pos + n)
            .map_or(SyntaxKind::Eof, |t| t.kind)
    }

    pub(crate) fn at(&mut self, kind: SyntaxKind) -> bool {
        self.current() == kind
    }

    pub(crate) fn at_any(&mut self, kinds: &[SyntaxKind]) -> bool {
        kinds.contains(&self.current())
    }

    pub(crate) fn at_eof(&self) -> bool {
        self.split_gt.is_none() && self.pos >= self.tokens.len()
    }

    pub(crate) fn current_span(&self) -> Span {
        if let Some(t) = self.split_gt {
            return t.span;
        }
        self.tokens.get(self.pos).map_or_else(
            || {
                let end = self.tokens.last().map_or(0, |t| t.span.end);
                Span::at(end)
            },
            |t| t.span,
        )
    }

    pub(crate) fn advance(&mut self) {
        if let Some(t) = self.split_gt.take() {
            self.events.push(Event::Token {
                kind: t.kind,
                span: t.span,
            });
            self.fuel = 256;
            return;
        }
        if let Some(t) = self.tokens.get(self.pos) {
            self.events.push(Event::Token {
                kind: t.kind,
                span: t.span,
            });
            self.pos += 1;
            self.fuel = 256;
        }
    }

    pub(crate) fn eat(&mut self, kind: SyntaxKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, kind: SyntaxKind) {
        if !self.eat(kind) {
            self.error(format!("expected {kind:?}"));
        }
    }

    /// Consume one `>`, splitting `>>`, `>>=` and `>=` tokens when a type
    /// argument list closes inside a longer operator. The unconsumed tail is
    /// parked in `split_gt` so the token stream itself stays untouched and
    /// checkpoints can restore it.
    pub(crate) fn expect_gt(&mut self) {
        let current = self.split_gt.or_else(|| self.tokens.get(self.pos).copied());
        let t = match current {
            Some(t) => t,
            None => {
                self.error("expected `>`");
                return;
            }
        };
        let rest = match t.kind {
            SyntaxKind::Gt => {
                self.advance();
                return;
            }
            SyntaxKind::Shr => SyntaxKind::Gt,
            SyntaxKind::ShrEq => SyntaxKind::GtEq,
            SyntaxKind::GtEq => SyntaxKind::Eq,
            _ => {
                self.error("expected `>`");
                return;
            }
        };
        self.events.push(Event::Token {
            kind: SyntaxKind::Gt,
            span: Span::new(t.span.start, t.span.start + 1),
        });
        if self.split_gt.is_none() {
            self.pos += 1;
        }
        self.split_gt = Some(Token {
            kind: rest,
            span: Span::new(t.span.start + 1, t.span.end),
        });
        self.fuel = 256;
    }

    pub(crate) fn error_count(&self) -> usize {
        self.errors.len()
    }

    pub(crate) fn error(&mut self, message: impl Into<String>) {
        let span = self.current_span();
        self.errors.push(ParseError {
            message: message.into(),
            span,
        });
    }

    /// Report an error and consume the offending token under an `Error` node.
    pub(crate) fn advance_with_error(&mut self, message: impl Into<String>) {
        self.error(message);
        if !self.at_eof() {
            let m = self.open();
            self.advance();
            self.close(m, SyntaxKind::Error);
        }
    }

    // ── Speculation ──────────────────────────────────────────────────────

    /// Snapshot of the parser state for backtracking.
    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            split_gt: self.split_gt,
            events: self.events.len(),
            errors: self.errors.len(),
        }
    }

    pub(crate) fn rollback(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.split_gt = cp.split_gt;
        self.events.truncate(cp.events);
        self.errors.truncate(cp.errors);
        self.fuel = 256;
    }
}

#[derive(Clone, Copy)]
pub(crate) struct Checkpoint {
    pos: usize,
    split_gt: Option<Token>,
    events: usize,
    errors: usize,
}

// ── Tree building ────────────────────────────────────────────────────────

fn build_tree(events: Vec<Event>, text: String) -> SyntaxTree {
    let mut nodes: Vec<NodeData> = Vec::new();
    let mut stack: Vec<usize> = Vec::new();
    // Running cursor so empty nodes still get a sensible position.
    let mut cursor: u32 = 0;

    for event in events {
        match event {
            Event::Open { kind, field } => {
                let parent = stack.last().map(|&i| crate::tree::NodeId(i as u32));
                let idx = nodes.len();
                nodes.push(NodeData {
                    kind,
                    span: Span::at(cursor),
                    field,
                    parent,
                    children: Vec::new(),
                });
                if let Some(&p) = stack.last() {
                    let id = crate::tree::NodeId(idx as u32);
                    nodes[p].children.push(id);
                }
                stack.push(idx);
            }
            Event::Token { kind, span } => {
                cursor = span.end;
                let parent = stack.last().map(|&i| crate::tree::NodeId(i as u32));
                let idx = nodes.len();
                nodes.push(NodeData {
                    kind,
                    span,
                    field: None,
                    parent,
                    children: Vec::new(),
                });
                if let Some(&p) = stack.last() {
                    let id = crate::tree::NodeId(idx as u32);
                    nodes[p].children.push(id);
                }
            }
            Event::Close => {
                if let Some(idx) = stack.pop() {
                    let span = nodes[idx]
                        .children
                        .iter()
                        .map(|c| nodes[c.index()].span)
                        .reduce(|a, b| a.cover(b));
                    if let Some(span) = span {
                        nodes[idx].span = span;
                    }
                }
            }
        }
    }
    debug_assert!(stack.is_empty());
    SyntaxTree::new(nodes, text)
}
