//! Flow facts for the inference walker.
//!
//! [`FlowContext`] is a value: cloning it snapshots the facts at a program
//! point, and branches are modeled as independent clones joined back with
//! [`FlowContext::join`]. Narrowed field paths ("sinks") are addressed by a
//! packed index path below their root symbol.

use rustc_hash::FxHashMap;

use crate::decl::Decl;
use crate::ty::{join_types, Ty};

/// Why a program point cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnreachableKind {
    Unknown,
    /// A condition proved constant makes the branch impossible.
    CantHappen,
    ThrowStatement,
    ReturnStatement,
    CallNeverReturns,
    InfiniteLoop,
}

/// A narrowable location: a symbol plus a packed path of member indexes.
///
/// Each path level occupies 8 bits holding `index + 1`, packed from the
/// least significant byte outward; `path == 0` is the symbol itself. This
/// caps narrowing at 8 nesting levels and 254 members per level, which
/// mirrors what smart casts need in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SinkExpression {
    pub symbol: Decl,
    pub path: u64,
}

impl SinkExpression {
    pub fn symbol(symbol: Decl) -> SinkExpression {
        SinkExpression { symbol, path: 0 }
    }

    /// Extend the path by one member index. Returns `None` when the path is
    /// full or the index does not fit a level.
    pub fn child(self, index: usize) -> Option<SinkExpression> {
        if index >= 0xFF {
            return None;
        }
        let mut shift = 0;
        while shift < 64 && (self.path >> shift) & 0xFF != 0 {
            shift += 8;
        }
        if shift >= 64 {
            return None;
        }
        Some(SinkExpression {
            symbol: self.symbol,
            path: self.path | ((index as u64 + 1) << shift),
        })
    }

    /// Mask covering every level of `path`.
    fn level_mask(path: u64) -> u64 {
        let mut mask = 0u64;
        let mut shift = 0;
        while shift < 64 && (path >> shift) & 0xFF != 0 {
            mask |= 0xFFu64 << shift;
            shift += 8;
        }
        mask
    }

    /// Whether `other` narrows a location at or below `self`.
    fn covers(&self, other: &SinkExpression) -> bool {
        self.symbol == other.symbol && other.path & Self::level_mask(self.path) == self.path
    }
}

/// Facts known at one program point.
#[derive(Debug, Clone, Default)]
pub struct FlowContext {
    /// Name to declaration, following the most recent binding.
    symbols: FxHashMap<String, Decl>,
    /// Declared (pre-narrowing) type per symbol.
    symbol_types: FxHashMap<Decl, Ty>,
    /// Narrowed types per sink.
    sinks: FxHashMap<SinkExpression, Ty>,
    unreachable: Option<UnreachableKind>,
}

impl FlowContext {
    pub fn new() -> FlowContext {
        FlowContext::default()
    }

    /// Bind `name` to `decl` with declared type `ty`, dropping every
    /// narrowed path rooted at the declaration.
    pub fn set_symbol(&mut self, name: &str, decl: Decl, ty: Ty) {
        self.symbols.insert(name.to_owned(), decl);
        self.sinks.retain(|sink, _| sink.symbol != decl);
        self.symbol_types.insert(decl, ty);
    }

    pub fn lookup_symbol(&self, name: &str) -> Option<Decl> {
        self.symbols.get(name).copied()
    }

    pub fn symbol_type(&self, decl: &Decl) -> Option<&Ty> {
        self.symbol_types.get(decl)
    }

    /// Record a narrowed type for `sink`, invalidating narrowings of
    /// locations below it.
    pub fn set_sink(&mut self, sink: SinkExpression, ty: Ty) {
        self.sinks
            .retain(|existing, _| !(sink.covers(existing) && *existing != sink));
        self.sinks.insert(sink, ty);
    }

    pub fn sink_type(&self, sink: &SinkExpression) -> Option<&Ty> {
        self.sinks.get(sink)
    }

    pub fn mark_unreachable(&mut self, kind: UnreachableKind) {
        if self.unreachable.is_none() {
            self.unreachable = Some(kind);
        }
    }

    pub fn is_unreachable(&self) -> bool {
        self.unreachable.is_some()
    }

    pub fn unreachable_kind(&self) -> Option<UnreachableKind> {
        self.unreachable
    }

    /// Merge the facts of two control-flow edges.
    ///
    /// An unreachable edge contributes nothing: the reachable side's facts
    /// survive wholesale. When both edges are live, declared types join per
    /// symbol and only sinks narrowed on both sides survive (joined).
    pub fn join(self, other: FlowContext) -> FlowContext {
        match (self.is_unreachable(), other.is_unreachable()) {
            (true, false) => return other,
            (false, true) => return self,
            (true, true) => {
                let mut joined = self;
                joined.unreachable = joined.unreachable.or(other.unreachable);
                return joined;
            }
            (false, false) => {}
        }
        let mut joined = FlowContext {
            symbols: self.symbols,
            symbol_types: self.symbol_types,
            sinks: FxHashMap::default(),
            unreachable: None,
        };
        for (name, decl) in other.symbols {
            joined.symbols.entry(name).or_insert(decl);
        }
        for (decl, ty) in other.symbol_types {
            match joined.symbol_types.get(&decl) {
                Some(existing) => {
                    let widened = join_types(existing, &ty);
                    joined.symbol_types.insert(decl, widened);
                }
                None => {
                    joined.symbol_types.insert(decl, ty);
                }
            }
        }
        for (sink, ty) in self.sinks {
            if let Some(other_ty) = other.sinks.get(&sink) {
                joined.sinks.insert(sink, join_types(&ty, other_ty));
            }
        }
        joined
    }
}

/// Result of inferring one expression: the fall-through facts plus the
/// facts on the branches where the expression evaluated true or false.
#[derive(Debug, Clone)]
pub struct ExprFlow {
    pub out: FlowContext,
    pub true_flow: FlowContext,
    pub false_flow: FlowContext,
}

impl ExprFlow {
    /// When the expression is used as a condition the branches start as
    /// snapshots of the fall-through facts and diverge from there.
    pub fn new(out: FlowContext) -> ExprFlow {
        ExprFlow {
            true_flow: out.clone(),
            false_flow: out.clone(),
            out,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decl() -> Decl {
        Decl::synthetic()
    }

    #[test]
    fn sink_paths_nest_and_cover() {
        let root = SinkExpression::symbol(decl());
        let a = root.child(0).expect("level fits");
        let ab = a.child(3).expect("level fits");
        assert!(root.covers(&a));
        assert!(a.covers(&ab));
        assert!(!a.covers(&root));
        let b = root.child(1).expect("level fits");
        assert!(!a.covers(&b));
    }

    #[test]
    fn set_symbol_drops_sub_paths() {
        let d = decl();
        let mut flow = FlowContext::new();
        let field = SinkExpression::symbol(d).child(0).expect("level fits");
        flow.set_sink(field, Ty::Int);
        assert!(flow.sink_type(&field).is_some());
        flow.set_symbol("x", d, Ty::nullable(Ty::Int));
        assert!(flow.sink_type(&field).is_none());
    }

    #[test]
    fn set_sink_invalidates_below() {
        let d = decl();
        let mut flow = FlowContext::new();
        let root = SinkExpression::symbol(d);
        let field = root.child(2).expect("level fits");
        flow.set_sink(field, Ty::Int);
        flow.set_sink(root, Ty::nullable(Ty::Int));
        assert!(flow.sink_type(&field).is_none());
        assert!(flow.sink_type(&root).is_some());
    }

    #[test]
    fn join_keeps_sinks_present_on_both_sides() {
        let d = decl();
        let root = SinkExpression::symbol(d);
        let mut a = FlowContext::new();
        a.set_sink(root, Ty::Int);
        let mut b = FlowContext::new();
        b.set_sink(root, Ty::Null);
        let joined = a.clone().join(b);
        assert_eq!(joined.sink_type(&root), Some(&Ty::nullable(Ty::Int)));

        let empty = FlowContext::new();
        let joined = a.join(empty);
        assert_eq!(joined.sink_type(&root), None);
    }

    #[test]
    fn join_ignores_unreachable_edge() {
        let d = decl();
        let root = SinkExpression::symbol(d);
        let mut dead = FlowContext::new();
        dead.mark_unreachable(UnreachableKind::ReturnStatement);
        let mut live = FlowContext::new();
        live.set_sink(root, Ty::Int);
        let joined = dead.join(live);
        assert!(!joined.is_unreachable());
        assert_eq!(joined.sink_type(&root), Some(&Ty::Int));
    }
}
