//! Semantic analysis for Slate: symbol indexes, reference resolution,
//! structural types with union algebra, and flow-sensitive inference with
//! smart casts.
//!
//! The entry point is [`Session`]: add files, then ask for types with
//! [`Session::type_of`] and for declarations with [`Session::resolve`].
//! All queries are memoized per whole-declaration inference pass; any file
//! change drops every cache.

mod consts;
mod decl;
mod flow;
mod generics;
mod index;
mod infer;
mod resolve;
mod session;
mod ty;

pub use consts::ConstValue;
pub use decl::{Decl, DeclKind};
pub use flow::{ExprFlow, FlowContext, SinkExpression, UnreachableKind};
pub use generics::Deduction;
pub use index::{FileIndex, IndexKey, IndexRoot, IndexedDecl, ProjectIndex, RootKind};
pub use resolve::ResolveState;
pub use session::{File, Session};
pub use ty::{calc_smartcast_on_assignment, join_types, subtract_types, Ty};
