//! Flow-sensitive type inference.
//!
//! Inference runs as one pass over a whole declaration (function body,
//! constant initializer, struct defaults, ...). The pass threads a
//! [`FlowContext`] through statements, records a type for every expression
//! node and a resolution for every reference it meets, and produces an
//! [`InferenceResult`] the session memoizes. Failures never abort the pass:
//! unknown types flow through every rule.

use rustc_hash::FxHashMap;
use slate_common::FileId;
use slate_syntax::{Field, NodeId, SyntaxKind, SyntaxTree};

use crate::decl::{Decl, DeclKind};
use crate::flow::{ExprFlow, FlowContext, SinkExpression, UnreachableKind};
use crate::generics::Deduction;
use crate::index::IndexKey;
use crate::resolve::{
    self, all_methods, methods_with_receiver_text, normalize_type_name, ResolveState,
};
use crate::session::Session;
use crate::ty::{
    calc_smartcast_on_assignment, calculate_exact_variant_to_fit_rhs, join_types, subtract_types,
    Ty,
};

/// Everything one declaration pass learned.
#[derive(Debug, Default)]
pub struct InferenceResult {
    pub expr_types: FxHashMap<NodeId, Ty>,
    pub resolved: FxHashMap<NodeId, Vec<Decl>>,
    /// Computed function type for function-like declarations.
    pub fn_ty: Option<Ty>,
}

/// Nested expression budget; blowing it degrades the pass to an empty
/// result instead of overflowing the stack.
const MAX_DEPTH: u32 = 800;

pub(crate) fn infer_decl(sess: &Session, decl: Decl) -> InferenceResult {
    let Some(file) = sess.file(decl.file) else {
        return InferenceResult::default();
    };
    let tree = &file.tree;
    let mut walker = Walker {
        sess,
        file: decl.file,
        tree,
        self_ty: None,
        declared_return: None,
        return_types: Vec::new(),
        out: InferenceResult::default(),
        depth: 0,
        gave_up: false,
    };
    match decl.kind {
        DeclKind::Function | DeclKind::InstanceMethod | DeclKind::StaticMethod
        | DeclKind::GetMethod => walker.infer_function(decl),
        DeclKind::Constant => walker.infer_constant(decl),
        DeclKind::GlobalVar => walker.infer_global(decl),
        DeclKind::Struct => walker.infer_struct(decl),
        DeclKind::Enum => walker.infer_enum(decl),
        DeclKind::TypeAlias => walker.infer_alias(decl),
        _ => {}
    }
    if walker.gave_up {
        return InferenceResult::default();
    }
    walker.out
}

struct Walker<'s> {
    sess: &'s Session,
    file: FileId,
    tree: &'s SyntaxTree,
    self_ty: Option<Ty>,
    declared_return: Option<Ty>,
    return_types: Vec<Ty>,
    out: InferenceResult,
    depth: u32,
    gave_up: bool,
}

impl<'s> Walker<'s> {
    fn record(&mut self, node: NodeId, ty: Ty) -> Ty {
        self.out.expr_types.insert(node, ty.clone());
        ty
    }

    fn resolve_to(&mut self, node: NodeId, decl: Decl) {
        self.out.resolved.insert(node, vec![decl]);
    }

    // ── Declaration entry points ─────────────────────────────────────────

    fn infer_function(&mut self, decl: Decl) {
        let tree = self.tree;
        let mut flow = FlowContext::new();

        if decl.kind == DeclKind::InstanceMethod {
            if let Some(receiver) = decl.receiver_type_node(tree) {
                let ty = convert_type(self.sess, self.file, receiver, None);
                self.self_ty = Some(ty);
            }
        }

        let mut param_tys = Vec::new();
        for param in decl.parameters(tree, false) {
            let ty = if param.name(tree) == Some("self") {
                self.self_ty.clone().unwrap_or(Ty::Unknown)
            } else {
                match param.type_node(tree) {
                    Some(t) => convert_type(self.sess, self.file, t, self.self_ty.as_ref()),
                    None => Ty::Unknown,
                }
            };
            if let Some(name) = param.name(tree) {
                flow.set_symbol(name, param, ty.clone());
            }
            self.record(param.node, ty.clone());
            param_tys.push(ty);
        }

        self.declared_return = decl
            .return_type_node(tree)
            .map(|t| convert_type(self.sess, self.file, t, self.self_ty.as_ref()));

        let exit = match decl.body_node(tree) {
            Some(body) => self.process_block(body, flow),
            None => flow,
        };

        let ret = match &self.declared_return {
            Some(declared) => declared.clone(),
            None => self.implicit_return_ty(&exit),
        };
        let fn_ty = Ty::Fun {
            params: param_tys,
            ret: Box::new(ret),
        };
        self.record(decl.node, fn_ty.clone());
        self.out.fn_ty = Some(fn_ty);
    }

    /// Join of collected returns; `Never` when the exit is unreachable and
    /// nothing returned a value, `Void` for a plain fall-through.
    fn implicit_return_ty(&self, exit: &FlowContext) -> Ty {
        if self.return_types.is_empty() {
            if exit.is_unreachable() {
                return Ty::Never;
            }
            return Ty::Void;
        }
        let mut joined = self.return_types[0].clone();
        for ty in &self.return_types[1..] {
            joined = join_types(&joined, ty);
        }
        if !exit.is_unreachable() {
            joined = join_types(&joined, &Ty::Void);
        }
        joined
    }

    fn infer_constant(&mut self, decl: Decl) {
        let tree = self.tree;
        let declared = decl
            .type_node(tree)
            .map(|t| convert_type(self.sess, self.file, t, None));
        let flow = FlowContext::new();
        let ty = match decl.value_node(tree) {
            Some(value) => {
                self.infer_expr(value, flow, declared.as_ref(), false);
                self.out
                    .expr_types
                    .get(&value)
                    .cloned()
                    .unwrap_or(Ty::Unknown)
            }
            None => Ty::Unknown,
        };
        self.record(decl.node, declared.unwrap_or(ty));
    }

    fn infer_global(&mut self, decl: Decl) {
        let ty = match decl.type_node(self.tree) {
            Some(t) => convert_type(self.sess, self.file, t, None),
            None => Ty::Unknown,
        };
        self.record(decl.node, ty);
    }

    fn infer_struct(&mut self, decl: Decl) {
        let tree = self.tree;
        for field in decl.fields(tree) {
            let field_ty = match field.type_node(tree) {
                Some(t) => convert_type(self.sess, self.file, t, None),
                None => Ty::Unknown,
            };
            self.record(field.node, field_ty.clone());
            if let Some(default) = field.value_node(tree) {
                let flow = FlowContext::new();
                self.infer_expr(default, flow, Some(&field_ty), false);
            }
        }
        let ty = named_decl_ty(self.sess, decl);
        self.record(decl.node, ty);
    }

    fn infer_enum(&mut self, decl: Decl) {
        let tree = self.tree;
        let enum_ty = named_decl_ty(self.sess, decl);
        for member in decl.enum_members(tree) {
            self.record(member.node, enum_ty.clone());
            if let Some(value) = member.value_node(tree) {
                let flow = FlowContext::new();
                self.infer_expr(value, flow, Some(&Ty::Int), false);
            }
        }
        self.record(decl.node, enum_ty);
    }

    fn infer_alias(&mut self, decl: Decl) {
        let ty = named_decl_ty(self.sess, decl);
        self.record(decl.node, ty);
    }

    // ── Statements ───────────────────────────────────────────────────────

    fn process_block(&mut self, block: NodeId, mut flow: FlowContext) -> FlowContext {
        for stmt in self.tree.named_children(block).collect::<Vec<_>>() {
            flow = self.process_stmt(stmt, flow);
        }
        flow
    }

    fn process_stmt(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        if self.gave_up {
            return flow;
        }
        match self.tree.kind(stmt) {
            SyntaxKind::Block => self.process_block(stmt, flow),
            SyntaxKind::VarStmt => self.process_var_stmt(stmt, flow),
            SyntaxKind::IfStmt => self.process_if(stmt, flow),
            SyntaxKind::WhileStmt => self.process_while(stmt, flow),
            SyntaxKind::DoWhileStmt => self.process_do_while(stmt, flow),
            SyntaxKind::RepeatStmt => self.process_repeat(stmt, flow),
            SyntaxKind::ReturnStmt => self.process_return(stmt, flow),
            SyntaxKind::ThrowStmt => self.process_throw(stmt, flow),
            SyntaxKind::AssertStmt => self.process_assert(stmt, flow),
            SyntaxKind::TryStmt => self.process_try(stmt, flow),
            SyntaxKind::BreakStmt | SyntaxKind::ContinueStmt => {
                let mut flow = flow;
                flow.mark_unreachable(UnreachableKind::Unknown);
                flow
            }
            SyntaxKind::ExprStmt => {
                match self.tree.named_children(stmt).next() {
                    Some(expr) => self.infer_expr(expr, flow, None, false).out,
                    None => flow,
                }
            }
            _ => flow,
        }
    }

    fn process_var_stmt(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let Some(lhs) = tree.named_children(stmt).find(|&n| {
            matches!(
                tree.kind(n),
                SyntaxKind::VarDef | SyntaxKind::VarTensor | SyntaxKind::VarTuple
            )
        }) else {
            return flow;
        };
        let hint = self.lhs_hint(lhs);
        let value = tree.child_by_field(stmt, Field::Value);
        let (value_ty, mut flow) = match value {
            Some(v) => {
                let ef = self.infer_expr(v, flow, hint.as_ref(), false);
                (
                    self.out.expr_types.get(&v).cloned().unwrap_or(Ty::Unknown),
                    ef.out,
                )
            }
            None => (Ty::Unknown, flow),
        };
        self.bind_var_lhs(lhs, &value_ty, &mut flow);
        flow
    }

    /// Declared-type hint for a `val`/`var` left-hand side, `Unknown` for
    /// the unannotated parts.
    fn lhs_hint(&mut self, lhs: NodeId) -> Option<Ty> {
        let tree = self.tree;
        match tree.kind(lhs) {
            SyntaxKind::VarDef => tree
                .child_by_field(lhs, Field::Type)
                .map(|t| convert_type(self.sess, self.file, t, self.self_ty.as_ref())),
            SyntaxKind::VarTensor | SyntaxKind::VarTuple => {
                let items: Vec<Ty> = tree
                    .named_children(lhs)
                    .collect::<Vec<_>>()
                    .into_iter()
                    .map(|c| self.lhs_hint(c).unwrap_or(Ty::Unknown))
                    .collect();
                if items.iter().all(Ty::is_unknown) {
                    return None;
                }
                Some(if tree.kind(lhs) == SyntaxKind::VarTensor {
                    Ty::Tensor(items)
                } else {
                    Ty::Tuple(items)
                })
            }
            _ => None,
        }
    }

    fn bind_var_lhs(&mut self, lhs: NodeId, value_ty: &Ty, flow: &mut FlowContext) {
        let tree = self.tree;
        match tree.kind(lhs) {
            SyntaxKind::VarDef => {
                let Some(decl) = Decl::of(tree, self.file, lhs) else {
                    return;
                };
                let declared = match tree.child_by_field(lhs, Field::Type) {
                    Some(t) => convert_type(self.sess, self.file, t, self.self_ty.as_ref()),
                    None => value_ty.clone(),
                };
                if let Some(name) = decl.name(tree) {
                    flow.set_symbol(name, decl, declared.clone());
                    // Declared unions narrow immediately to the assigned
                    // variant.
                    if let Some(variant) = calculate_exact_variant_to_fit_rhs(&declared, value_ty)
                    {
                        flow.set_sink(SinkExpression::symbol(decl), variant);
                    }
                }
                self.record(lhs, declared);
            }
            SyntaxKind::VarTensor | SyntaxKind::VarTuple => {
                let parts = tree.named_children(lhs).collect::<Vec<_>>();
                let elems: Vec<Ty> = match value_ty.base_ty() {
                    Ty::Tensor(items) | Ty::Tuple(items) if items.len() == parts.len() => {
                        items.clone()
                    }
                    _ => vec![Ty::Unknown; parts.len()],
                };
                for (part, elem) in parts.into_iter().zip(elems) {
                    self.bind_var_lhs(part, &elem, flow);
                }
            }
            _ => {}
        }
    }

    fn process_if(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let cond = tree.child_by_field(stmt, Field::Condition);
        let ef = match cond {
            Some(c) => self.infer_expr(c, flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(flow),
        };
        let then_flow = match tree.child_by_field(stmt, Field::Then) {
            Some(then) => self.process_block(then, ef.true_flow),
            None => ef.true_flow,
        };
        let else_flow = match tree.child_by_field(stmt, Field::Else) {
            Some(els) => self.process_block(els, ef.false_flow),
            None => ef.false_flow,
        };
        then_flow.join(else_flow)
    }

    fn process_while(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let Some(cond) = tree.child_by_field(stmt, Field::Condition) else {
            return flow;
        };
        let body = tree.child_by_field(stmt, Field::Body);
        // First trip to collect the facts the body produces, then re-enter
        // with the loop-entry join so narrowing killed by the body is gone.
        let ef1 = self.infer_expr(cond, flow.clone(), Some(&Ty::bool()), true);
        let body_exit = match body {
            Some(b) => self.process_block(b, ef1.true_flow),
            None => ef1.true_flow,
        };
        let entry2 = flow.join(body_exit);
        let ef2 = self.infer_expr(cond, entry2, Some(&Ty::bool()), true);
        if let Some(b) = body {
            self.process_block(b, ef2.true_flow);
        }
        let mut exit = ef2.false_flow;
        if exit.is_unreachable() {
            // `while (true)` only completes through a break.
            exit = ef2.out;
            if !self.contains_break(stmt) {
                exit.mark_unreachable(UnreachableKind::InfiniteLoop);
            }
        }
        exit
    }

    fn process_do_while(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let body = tree.child_by_field(stmt, Field::Body);
        let cond = tree.child_by_field(stmt, Field::Condition);
        let exit1 = match body {
            Some(b) => self.process_block(b, flow.clone()),
            None => flow.clone(),
        };
        let ef1 = match cond {
            Some(c) => self.infer_expr(c, exit1, Some(&Ty::bool()), true),
            None => return flow,
        };
        let entry2 = flow.clone().join(ef1.true_flow);
        let exit2 = match body {
            Some(b) => self.process_block(b, entry2),
            None => flow,
        };
        let ef2 = match cond {
            Some(c) => self.infer_expr(c, exit2, Some(&Ty::bool()), true),
            None => return ef1.false_flow,
        };
        let mut exit = ef2.false_flow;
        if exit.is_unreachable() {
            exit = ef2.out;
            if !self.contains_break(stmt) {
                exit.mark_unreachable(UnreachableKind::InfiniteLoop);
            }
        }
        exit
    }

    fn process_repeat(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let flow = match tree.child_by_field(stmt, Field::Count) {
            Some(count) => self.infer_expr(count, flow, Some(&Ty::Int), false).out,
            None => flow,
        };
        let body_exit = match tree.child_by_field(stmt, Field::Body) {
            Some(b) => self.process_block(b, flow.clone()),
            None => flow.clone(),
        };
        let entry2 = flow.join(body_exit);
        let exit2 = match tree.child_by_field(stmt, Field::Body) {
            Some(b) => self.process_block(b, entry2.clone()),
            None => entry2.clone(),
        };
        entry2.join(exit2)
    }

    fn process_return(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let hint = self.declared_return.clone();
        let mut flow = match tree.child_by_field(stmt, Field::Value) {
            Some(value) => {
                let ef = self.infer_expr(value, flow, hint.as_ref(), false);
                let ty = self
                    .out
                    .expr_types
                    .get(&value)
                    .cloned()
                    .unwrap_or(Ty::Unknown);
                self.return_types.push(ty);
                ef.out
            }
            None => {
                self.return_types.push(Ty::Void);
                flow
            }
        };
        flow.mark_unreachable(UnreachableKind::ReturnStatement);
        flow
    }

    fn process_throw(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let mut flow = match tree.child_by_field(stmt, Field::Value) {
            Some(value) => self.infer_expr(value, flow, Some(&Ty::Int), false).out,
            None => flow,
        };
        flow.mark_unreachable(UnreachableKind::ThrowStatement);
        flow
    }

    /// `assert (cond, exc)` continues with the condition's true facts.
    fn process_assert(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let ef = match tree.child_by_field(stmt, Field::Condition) {
            Some(cond) => self.infer_expr(cond, flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(flow),
        };
        if let Some(exc) = tree.child_by_field(stmt, Field::ExcNo) {
            // The exception argument evaluates on the failing path; its
            // flow effects do not reach the success path.
            self.infer_expr(exc, ef.false_flow.clone(), Some(&Ty::Int), false);
        }
        ef.true_flow
    }

    fn process_try(&mut self, stmt: NodeId, flow: FlowContext) -> FlowContext {
        let tree = self.tree;
        let try_exit = match tree.child_by_field(stmt, Field::Body) {
            Some(b) => self.process_block(b, flow.clone()),
            None => flow.clone(),
        };
        let Some(clause) = tree.child_of_kind(stmt, SyntaxKind::CatchClause) else {
            return try_exit;
        };
        // The handler can be entered from any point of the try body, so it
        // starts from the entry facts.
        let mut catch_flow = flow;
        for (field, ty) in [(Field::CaughtErr, Ty::Int), (Field::CaughtArg, Ty::Unknown)] {
            if let Some(binder) = tree.child_by_field(clause, field) {
                if let Some(decl) = Decl::of(tree, self.file, binder) {
                    if let Some(name) = decl.name(tree) {
                        catch_flow.set_symbol(name, decl, ty.clone());
                    }
                    self.record(binder, ty);
                }
            }
        }
        let catch_exit = match tree.child_by_field(clause, Field::Body) {
            Some(b) => self.process_block(b, catch_flow),
            None => catch_flow,
        };
        try_exit.join(catch_exit)
    }

    fn contains_break(&self, stmt: NodeId) -> bool {
        let tree = self.tree;
        let mut stack = vec![stmt];
        let mut skip_root = true;
        while let Some(node) = stack.pop() {
            let kind = tree.kind(node);
            if !skip_root {
                if kind == SyntaxKind::BreakStmt {
                    return true;
                }
                // Breaks belong to the nearest enclosing loop.
                if matches!(
                    kind,
                    SyntaxKind::WhileStmt | SyntaxKind::DoWhileStmt | SyntaxKind::RepeatStmt
                ) {
                    continue;
                }
            }
            skip_root = false;
            stack.extend(tree.named_children(node));
        }
        false
    }

    // ── Expressions ──────────────────────────────────────────────────────

    fn infer_expr(
        &mut self,
        node: NodeId,
        flow: FlowContext,
        hint: Option<&Ty>,
        as_condition: bool,
    ) -> ExprFlow {
        if self.gave_up {
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        }
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            self.gave_up = true;
            self.record(node, Ty::Unknown);
            self.depth -= 1;
            return ExprFlow::new(flow);
        }
        let result = self.infer_expr_inner(node, flow, hint, as_condition);
        self.depth -= 1;
        result
    }

    fn infer_expr_inner(
        &mut self,
        node: NodeId,
        flow: FlowContext,
        hint: Option<&Ty>,
        as_condition: bool,
    ) -> ExprFlow {
        let tree = self.tree;
        match tree.kind(node) {
            SyntaxKind::Literal => self.infer_literal(node, flow, as_condition),
            SyntaxKind::RefExpr => self.infer_ref(node, flow, as_condition),
            SyntaxKind::ParenExpr => {
                let inner = tree.named_children(node).next();
                let ef = match inner {
                    Some(i) => self.infer_expr(i, flow, hint, as_condition),
                    None => ExprFlow::new(flow),
                };
                let ty = inner
                    .and_then(|i| self.out.expr_types.get(&i).cloned())
                    .unwrap_or(Ty::Unknown);
                self.record(node, ty);
                ef
            }
            SyntaxKind::TensorExpr => self.infer_sequence(node, flow, hint, false),
            SyntaxKind::TupleExpr => self.infer_sequence(node, flow, hint, true),
            SyntaxKind::UnaryExpr => self.infer_unary(node, flow, as_condition),
            SyntaxKind::BinaryExpr => self.infer_binary(node, flow, hint),
            SyntaxKind::IsExpr => self.infer_is(node, flow),
            SyntaxKind::AsExpr => self.infer_as(node, flow),
            SyntaxKind::NotNullExpr => self.infer_not_null(node, flow),
            SyntaxKind::TernaryExpr => self.infer_ternary(node, flow, hint, as_condition),
            SyntaxKind::DotExpr => self.infer_dot(node, flow, as_condition),
            SyntaxKind::CallExpr => self.infer_call(node, flow, hint),
            SyntaxKind::AssignExpr => self.infer_assign(node, flow),
            SyntaxKind::CompoundAssignExpr => self.infer_compound_assign(node, flow),
            SyntaxKind::StructLit => self.infer_struct_lit(node, flow, hint),
            SyntaxKind::GenericInstantiation => self.infer_generic_inst(node, flow),
            SyntaxKind::MatchExpr => self.infer_match(node, flow, hint),
            _ => {
                self.record(node, Ty::Unknown);
                ExprFlow::new(flow)
            }
        }
    }

    fn infer_literal(&mut self, node: NodeId, flow: FlowContext, as_condition: bool) -> ExprFlow {
        let tree = self.tree;
        let token = tree.children(node).first().copied();
        let ty = match token.map(|t| tree.kind(t)) {
            Some(SyntaxKind::IntNumber) => Ty::Int,
            Some(SyntaxKind::StringLit) => Ty::Str,
            Some(SyntaxKind::TrueKw) => Ty::bool_literal(true),
            Some(SyntaxKind::FalseKw) => Ty::bool_literal(false),
            Some(SyntaxKind::NullKw) => Ty::Null,
            _ => Ty::Unknown,
        };
        let ty = self.record(node, ty);
        let mut ef = ExprFlow::new(flow);
        if as_condition {
            if let Ty::Bool(Some(v)) = ty {
                if v {
                    ef.false_flow.mark_unreachable(UnreachableKind::CantHappen);
                } else {
                    ef.true_flow.mark_unreachable(UnreachableKind::CantHappen);
                }
            }
        }
        ef
    }

    fn infer_ref(&mut self, node: NodeId, flow: FlowContext, as_condition: bool) -> ExprFlow {
        let tree = self.tree;
        let name = tree.text(node);
        if name == "_" {
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        }
        let decl = flow.lookup_symbol(name).or_else(|| {
            let state = ResolveState::named(name, false);
            resolve::resolve_unqualified(self.sess, self.file, node, &state)
        });
        let ty = match decl {
            Some(decl) => {
                self.resolve_to(node, decl);
                self.symbol_read_ty(&decl, &flow)
            }
            None => Ty::Unknown,
        };
        let ty = self.record(node, ty);
        let mut ef = ExprFlow::new(flow);
        if let Some(decl) = decl {
            let sink = SinkExpression::symbol(decl);
            match ty.unwrap_alias() {
                // A bool literal read makes one branch impossible.
                Ty::Bool(Some(v)) if as_condition => {
                    if *v {
                        ef.false_flow.mark_unreachable(UnreachableKind::CantHappen);
                    } else {
                        ef.true_flow.mark_unreachable(UnreachableKind::CantHappen);
                    }
                }
                _ => {
                    if as_condition {
                        // `if (x)` on a plain bool refines each branch.
                        if matches!(ty.unwrap_alias(), Ty::Bool(None)) {
                            ef.true_flow.set_sink(sink, Ty::bool_literal(true));
                            ef.false_flow.set_sink(sink, Ty::bool_literal(false));
                        }
                    }
                }
            }
        }
        ef
    }

    /// Current type of a symbol read: narrowed sink, then flow-declared
    /// type, then the declaration's own type.
    fn symbol_read_ty(&mut self, decl: &Decl, flow: &FlowContext) -> Ty {
        let sink = SinkExpression::symbol(*decl);
        if let Some(narrowed) = flow.sink_type(&sink) {
            return narrowed.clone();
        }
        if let Some(declared) = flow.symbol_type(decl) {
            return declared.clone();
        }
        self.sess.decl_ty(*decl)
    }

    fn infer_sequence(
        &mut self,
        node: NodeId,
        flow: FlowContext,
        hint: Option<&Ty>,
        tuple: bool,
    ) -> ExprFlow {
        let tree = self.tree;
        let items = tree.named_children(node).collect::<Vec<_>>();
        let hints: Vec<Option<Ty>> = match hint.map(Ty::base_ty) {
            Some(Ty::Tensor(hs)) | Some(Ty::Tuple(hs)) if hs.len() == items.len() => {
                hs.iter().map(|h| Some(h.clone())).collect()
            }
            _ => vec![None; items.len()],
        };
        let mut flow = flow;
        let mut tys = Vec::with_capacity(items.len());
        for (item, item_hint) in items.into_iter().zip(hints) {
            let ef = self.infer_expr(item, flow, item_hint.as_ref(), false);
            flow = ef.out;
            tys.push(
                self.out
                    .expr_types
                    .get(&item)
                    .cloned()
                    .unwrap_or(Ty::Unknown),
            );
        }
        let ty = if tuple { Ty::Tuple(tys) } else { Ty::Tensor(tys) };
        self.record(node, ty);
        ExprFlow::new(flow)
    }

    fn infer_unary(&mut self, node: NodeId, flow: FlowContext, as_condition: bool) -> ExprFlow {
        let tree = self.tree;
        let op = tree
            .children(node)
            .iter()
            .copied()
            .find(|&c| tree.kind(c).is_token())
            .map(|c| tree.kind(c));
        let operand = tree.child_by_field(node, Field::Operand);
        match op {
            Some(SyntaxKind::Bang) => {
                let ef = match operand {
                    Some(o) => self.infer_expr(o, flow, Some(&Ty::bool()), as_condition),
                    None => ExprFlow::new(flow),
                };
                let inner_ty = operand
                    .and_then(|o| self.out.expr_types.get(&o).cloned())
                    .unwrap_or(Ty::Unknown);
                self.record(node, inner_ty.negate_bool());
                // Negation swaps the branches.
                ExprFlow {
                    out: ef.out,
                    true_flow: ef.false_flow,
                    false_flow: ef.true_flow,
                }
            }
            _ => {
                let ef = match operand {
                    Some(o) => self.infer_expr(o, flow, Some(&Ty::Int), false),
                    None => ExprFlow::new(flow),
                };
                self.record(node, Ty::Int);
                ExprFlow::new(ef.out)
            }
        }
    }

    fn binary_op(&self, node: NodeId) -> Option<SyntaxKind> {
        let tree = self.tree;
        tree.children(node)
            .iter()
            .copied()
            .find(|&c| tree.kind(c).is_token())
            .map(|c| tree.kind(c))
    }

    fn infer_binary(
        &mut self,
        node: NodeId,
        flow: FlowContext,
        hint: Option<&Ty>,
    ) -> ExprFlow {
        let tree = self.tree;
        let lhs = tree.child_by_field(node, Field::Lhs);
        let rhs = tree.child_by_field(node, Field::Rhs);
        let op = self.binary_op(node);
        match op {
            Some(SyntaxKind::AmpAmp) => self.infer_and(node, lhs, rhs, flow),
            Some(SyntaxKind::PipePipe) => self.infer_or(node, lhs, rhs, flow),
            Some(SyntaxKind::QuestionQuestion) => self.infer_coalesce(node, lhs, rhs, flow, hint),
            Some(SyntaxKind::EqEq) | Some(SyntaxKind::BangEq) => {
                self.infer_equality(node, lhs, rhs, op, flow)
            }
            Some(
                SyntaxKind::Lt | SyntaxKind::Gt | SyntaxKind::LtEq | SyntaxKind::GtEq,
            ) => {
                let flow = self.infer_operands_int(lhs, rhs, flow);
                self.record(node, Ty::bool());
                ExprFlow::new(flow)
            }
            Some(SyntaxKind::Spaceship) => {
                let flow = self.infer_operands_int(lhs, rhs, flow);
                self.record(node, Ty::Int);
                ExprFlow::new(flow)
            }
            _ => {
                let flow = self.infer_operands_int(lhs, rhs, flow);
                self.record(node, Ty::Int);
                ExprFlow::new(flow)
            }
        }
    }

    fn infer_operands_int(
        &mut self,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        flow: FlowContext,
    ) -> FlowContext {
        let mut flow = flow;
        if let Some(l) = lhs {
            flow = self.infer_expr(l, flow, Some(&Ty::Int), false).out;
        }
        if let Some(r) = rhs {
            flow = self.infer_expr(r, flow, Some(&Ty::Int), false).out;
        }
        flow
    }

    fn infer_and(
        &mut self,
        node: NodeId,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        flow: FlowContext,
    ) -> ExprFlow {
        let l = match lhs {
            Some(l) => self.infer_expr(l, flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(flow),
        };
        // The right side only evaluates when the left was true.
        let r = match rhs {
            Some(r) => self.infer_expr(r, l.true_flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(l.true_flow),
        };
        self.record(node, Ty::bool());
        ExprFlow {
            out: r.out.join(l.false_flow.clone()),
            true_flow: r.true_flow,
            false_flow: l.false_flow.join(r.false_flow),
        }
    }

    fn infer_or(
        &mut self,
        node: NodeId,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        flow: FlowContext,
    ) -> ExprFlow {
        let l = match lhs {
            Some(l) => self.infer_expr(l, flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(flow),
        };
        let r = match rhs {
            Some(r) => self.infer_expr(r, l.false_flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(l.false_flow),
        };
        self.record(node, Ty::bool());
        ExprFlow {
            out: r.out.join(l.true_flow.clone()),
            true_flow: l.true_flow.join(r.true_flow),
            false_flow: r.false_flow,
        }
    }

    /// `a ?? b`: the right side sees the left narrowed to null; the result
    /// joins the non-null left with the right.
    fn infer_coalesce(
        &mut self,
        node: NodeId,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        flow: FlowContext,
        hint: Option<&Ty>,
    ) -> ExprFlow {
        let l = match lhs {
            Some(l) => self.infer_expr(l, flow, hint, false),
            None => ExprFlow::new(flow),
        };
        let l_ty = lhs
            .and_then(|l| self.out.expr_types.get(&l).cloned())
            .unwrap_or(Ty::Unknown);
        let sink = lhs.and_then(|l| self.extract_sink(l));

        let mut rhs_entry = l.out.clone();
        if let Some(sink) = sink {
            rhs_entry.set_sink(sink, Ty::Null);
        }
        let r = match rhs {
            Some(r) => self.infer_expr(r, rhs_entry, hint, false),
            None => ExprFlow::new(rhs_entry),
        };
        let r_ty = rhs
            .and_then(|r| self.out.expr_types.get(&r).cloned())
            .unwrap_or(Ty::Unknown);

        let mut skip_path = l.out;
        if let Some(sink) = sink {
            skip_path.set_sink(sink, subtract_types(&l_ty, &Ty::Null));
        }
        let ty = join_types(&subtract_types(&l_ty, &Ty::Null), &r_ty);
        self.record(node, ty);
        ExprFlow::new(skip_path.join(r.out))
    }

    fn infer_equality(
        &mut self,
        node: NodeId,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
        op: Option<SyntaxKind>,
        flow: FlowContext,
    ) -> ExprFlow {
        let tree = self.tree;
        let is_null_literal = |n: NodeId| {
            tree.kind(n) == SyntaxKind::Literal
                && tree
                    .children(n)
                    .first()
                    .map(|&t| tree.kind(t) == SyntaxKind::NullKw)
                    .unwrap_or(false)
        };
        // Null comparison in either operand order narrows the other side.
        let null_check = match (lhs, rhs) {
            (Some(l), Some(r)) if is_null_literal(r) => Some((l, r)),
            (Some(l), Some(r)) if is_null_literal(l) => Some((r, l)),
            _ => None,
        };
        let Some((subject, null_lit)) = null_check else {
            let mut flow = flow;
            if let Some(l) = lhs {
                flow = self.infer_expr(l, flow, None, false).out;
            }
            if let Some(r) = rhs {
                flow = self.infer_expr(r, flow, None, false).out;
            }
            self.record(node, Ty::bool());
            return ExprFlow::new(flow);
        };

        let ef = self.infer_expr(subject, flow, None, false);
        self.record(null_lit, Ty::Null);
        let subject_ty = self
            .out
            .expr_types
            .get(&subject)
            .cloned()
            .unwrap_or(Ty::Unknown);
        let sink = self.extract_sink(subject);
        let negated = op == Some(SyntaxKind::BangEq);

        let always_null = subject_ty.is_null();
        let non_null = subtract_types(&subject_ty, &Ty::Null);
        let never_null = !subject_ty.is_unknown() && !always_null && non_null == subject_ty;

        let mut ef = ExprFlow::new(ef.out);
        // On the branch where the value is null, and the one where it is
        // not, narrow the subject accordingly (swapped for `!=`).
        {
            let (null_branch, other_branch) = if negated {
                (&mut ef.false_flow, &mut ef.true_flow)
            } else {
                (&mut ef.true_flow, &mut ef.false_flow)
            };
            if let Some(sink) = sink {
                null_branch.set_sink(sink, if never_null { Ty::Never } else { Ty::Null });
                other_branch.set_sink(
                    sink,
                    if always_null { Ty::Never } else { non_null.clone() },
                );
            }
            if always_null {
                other_branch.mark_unreachable(UnreachableKind::CantHappen);
            }
            if never_null {
                null_branch.mark_unreachable(UnreachableKind::CantHappen);
            }
        }
        let ty = if always_null {
            Ty::bool_literal(!negated)
        } else if never_null {
            Ty::bool_literal(negated)
        } else {
            Ty::bool()
        };
        self.record(node, ty);
        ef
    }

    fn infer_is(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let operand = tree.child_by_field(node, Field::Operand);
        let target_node = tree.child_by_field(node, Field::Type);
        let negated = tree.has_token(node, SyntaxKind::NotIsKw);

        let ef = match operand {
            Some(o) => self.infer_expr(o, flow, None, false),
            None => ExprFlow::new(flow),
        };
        let operand_ty = operand
            .and_then(|o| self.out.expr_types.get(&o).cloned())
            .unwrap_or(Ty::Unknown);
        let target = match target_node {
            Some(t) => convert_type(self.sess, self.file, t, self.self_ty.as_ref()),
            None => Ty::Unknown,
        };
        let sink = operand.and_then(|o| self.extract_sink(o));

        let always = operand_ty == target;
        let in_variants = match operand_ty.unwrap_alias() {
            Ty::Union(members) => members.iter().any(|m| *m == target),
            _ => always,
        };
        let never = !operand_ty.is_unknown() && !always && !in_variants;

        let mut ef = ExprFlow::new(ef.out);
        {
            let (match_branch, other_branch) = if negated {
                (&mut ef.false_flow, &mut ef.true_flow)
            } else {
                (&mut ef.true_flow, &mut ef.false_flow)
            };
            if let Some(sink) = sink {
                match_branch.set_sink(sink, if never { Ty::Never } else { target.clone() });
                other_branch.set_sink(
                    sink,
                    if always {
                        Ty::Never
                    } else {
                        subtract_types(&operand_ty, &target)
                    },
                );
            }
            if always {
                other_branch.mark_unreachable(UnreachableKind::CantHappen);
            }
            if never {
                match_branch.mark_unreachable(UnreachableKind::CantHappen);
            }
        }
        let ty = if always {
            Ty::bool_literal(!negated)
        } else if never {
            Ty::bool_literal(negated)
        } else {
            Ty::bool()
        };
        self.record(node, ty);
        ef
    }

    fn infer_as(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let target = match tree.child_by_field(node, Field::Type) {
            Some(t) => convert_type(self.sess, self.file, t, self.self_ty.as_ref()),
            None => Ty::Unknown,
        };
        let flow = match tree.child_by_field(node, Field::Operand) {
            Some(o) => self.infer_expr(o, flow, Some(&target), false).out,
            None => flow,
        };
        self.record(node, target);
        ExprFlow::new(flow)
    }

    /// `x!` strips null from the operand and narrows it on the way out.
    fn infer_not_null(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let operand = tree.child_by_field(node, Field::Operand);
        let ef = match operand {
            Some(o) => self.infer_expr(o, flow, None, false),
            None => ExprFlow::new(flow),
        };
        let operand_ty = operand
            .and_then(|o| self.out.expr_types.get(&o).cloned())
            .unwrap_or(Ty::Unknown);
        let ty = subtract_types(&operand_ty, &Ty::Null);
        let mut out = ef.out;
        if let Some(sink) = operand.and_then(|o| self.extract_sink(o)) {
            out.set_sink(sink, ty.clone());
        }
        self.record(node, ty);
        ExprFlow::new(out)
    }

    fn infer_ternary(
        &mut self,
        node: NodeId,
        flow: FlowContext,
        hint: Option<&Ty>,
        as_condition: bool,
    ) -> ExprFlow {
        let tree = self.tree;
        let cond = tree.child_by_field(node, Field::Condition);
        let then = tree.child_by_field(node, Field::Then);
        let els = tree.child_by_field(node, Field::Else);
        let c = match cond {
            Some(c) => self.infer_expr(c, flow, Some(&Ty::bool()), true),
            None => ExprFlow::new(flow),
        };
        let t = match then {
            Some(t) => self.infer_expr(t, c.true_flow, hint, as_condition),
            None => ExprFlow::new(c.true_flow),
        };
        let e = match els {
            Some(e) => self.infer_expr(e, c.false_flow, hint, as_condition),
            None => ExprFlow::new(c.false_flow),
        };
        let t_ty = then
            .and_then(|n| self.out.expr_types.get(&n).cloned())
            .unwrap_or(Ty::Unknown);
        let e_ty = els
            .and_then(|n| self.out.expr_types.get(&n).cloned())
            .unwrap_or(Ty::Unknown);
        // An unreachable branch (constant condition) contributes nothing.
        let ty = if t.out.is_unreachable() {
            e_ty
        } else if e.out.is_unreachable() {
            t_ty
        } else {
            join_types(&t_ty, &e_ty)
        };
        self.record(node, ty);
        ExprFlow {
            out: t.out.clone().join(e.out.clone()),
            true_flow: t.true_flow.join(e.true_flow),
            false_flow: t.false_flow.join(e.false_flow),
        }
    }

    fn infer_dot(&mut self, node: NodeId, flow: FlowContext, as_condition: bool) -> ExprFlow {
        let tree = self.tree;
        let qualifier = tree.child_by_field(node, Field::Qualifier);
        let field_name = tree.child_by_field(node, Field::FieldName);

        let ef = match qualifier {
            Some(q) => self.infer_expr(q, flow, None, false),
            None => ExprFlow::new(flow),
        };
        let flow = ef.out;
        let Some(field_name) = field_name else {
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        };
        let member = tree.text(field_name).to_owned();
        let q_ty = qualifier
            .and_then(|q| self.out.expr_types.get(&q).cloned())
            .unwrap_or(Ty::Unknown);

        // Static access through a type name: enum members and static
        // methods.
        if let Some(q) = qualifier {
            if let Some(ty_decl) = self.type_name_target(q) {
                let ty = self.infer_static_member(node, field_name, ty_decl, &member);
                self.record(node, ty.clone());
                let mut ef = ExprFlow::new(flow);
                self.condition_bool_refinement(&ty, as_condition, &mut ef);
                return ef;
            }
        }

        let sink = qualifier.and_then(|q| self.extract_sink(q));
        let ty = self.instance_member_ty(node, field_name, &q_ty, &member);
        // Narrowed member paths win over the structural answer.
        let ty = match sink {
            Some(base) => {
                let child = self
                    .member_index(&q_ty, &member)
                    .and_then(|idx| base.child(idx));
                match child.and_then(|s| flow.sink_type(&s).cloned()) {
                    Some(narrowed) => narrowed,
                    None => ty,
                }
            }
            None => ty,
        };
        let ty = self.record(node, ty);
        let member_sink = if as_condition && matches!(ty.unwrap_alias(), Ty::Bool(None)) {
            self.extract_sink(node)
        } else {
            None
        };
        let mut ef = ExprFlow::new(flow);
        self.condition_bool_refinement(&ty, as_condition, &mut ef);
        // A plain bool member used as a condition refines via its sink.
        if let Some(s) = member_sink {
            ef.true_flow.set_sink(s, Ty::bool_literal(true));
            ef.false_flow.set_sink(s, Ty::bool_literal(false));
        }
        ef
    }

    fn condition_bool_refinement(&mut self, ty: &Ty, as_condition: bool, ef: &mut ExprFlow) {
        if !as_condition {
            return;
        }
        if let Ty::Bool(Some(v)) = ty.unwrap_alias() {
            if *v {
                ef.false_flow.mark_unreachable(UnreachableKind::CantHappen);
            } else {
                ef.true_flow.mark_unreachable(UnreachableKind::CantHappen);
            }
        }
    }

    /// If `expr` is a bare reference naming a type, the type declaration.
    fn type_name_target(&mut self, expr: NodeId) -> Option<Decl> {
        let tree = self.tree;
        let name_node = match tree.kind(expr) {
            SyntaxKind::RefExpr => expr,
            SyntaxKind::GenericInstantiation => tree.child_by_field(expr, Field::Callee)?,
            _ => return None,
        };
        let name = tree.text(name_node);
        if !name.chars().next().map(char::is_alphabetic).unwrap_or(false) {
            return None;
        }
        // Locals shadow type names.
        if self.out.resolved.get(&name_node).is_some_and(|decls| {
            decls
                .first()
                .is_some_and(|d| !matches!(d.kind, DeclKind::Struct | DeclKind::Enum | DeclKind::TypeAlias))
        }) {
            return None;
        }
        let index = self.sess.index();
        index
            .element_by_name(IndexKey::Structs, name)
            .or_else(|| index.element_by_name(IndexKey::Enums, name))
            .or_else(|| index.element_by_name(IndexKey::TypeAliases, name))
    }

    fn infer_static_member(
        &mut self,
        node: NodeId,
        field_name: NodeId,
        ty_decl: Decl,
        member: &str,
    ) -> Ty {
        // Aliases forward static access to their target.
        let target = self.sess.alias_target_decl(ty_decl).unwrap_or(ty_decl);
        let Some(target_file) = self.sess.file(target.file) else {
            return Ty::Unknown;
        };
        let target_tree = &target_file.tree;
        if target.kind == DeclKind::Enum {
            for m in target.enum_members(target_tree) {
                if m.name(target_tree) == Some(member) {
                    self.resolve_to(field_name, m);
                    self.resolve_to(node, m);
                    return named_decl_ty(self.sess, target);
                }
            }
        }
        // Static methods by receiver name.
        let receiver_name = target.name(target_tree).unwrap_or_default().to_owned();
        for method in methods_with_receiver_text(self.sess, &receiver_name) {
            if method.kind != DeclKind::StaticMethod {
                continue;
            }
            let Some(m_file) = self.sess.file(method.file) else {
                continue;
            };
            if method.name(&m_file.tree) == Some(member) {
                self.resolve_to(field_name, method);
                self.resolve_to(node, method);
                return self.sess.function_ty(method);
            }
        }
        Ty::Unknown
    }

    /// Position of `member` inside the qualifier's type, for sink paths.
    fn member_index(&self, q_ty: &Ty, member: &str) -> Option<usize> {
        if let Ok(idx) = member.parse::<usize>() {
            return Some(idx);
        }
        let base = q_ty.base_ty();
        if let Ty::Struct { decl, .. } = base {
            let file = self.sess.file(decl.file)?;
            let fields = decl.fields(&file.tree);
            return fields.iter().position(|f| f.name(&file.tree) == Some(member));
        }
        None
    }

    fn instance_member_ty(
        &mut self,
        node: NodeId,
        field_name: NodeId,
        q_ty: &Ty,
        member: &str,
    ) -> Ty {
        // Numeric index into tensors and tuples.
        if let Ok(idx) = member.parse::<usize>() {
            return match q_ty.base_ty() {
                Ty::Tensor(items) | Ty::Tuple(items) => {
                    items.get(idx).cloned().unwrap_or(Ty::Unknown)
                }
                _ => Ty::Unknown,
            };
        }

        // Struct fields, with the qualifier's instantiation arguments
        // substituted into the field type.
        let base = q_ty.unwrap_alias();
        let (struct_part, inst_args) = match base {
            Ty::Instantiation { inner, args } => (inner.unwrap_alias(), Some(args.clone())),
            other => (other, None),
        };
        if let Ty::Struct { decl, .. } = struct_part {
            let decl = *decl;
            if let Some(file) = self.sess.file(decl.file) {
                let tree = &file.tree;
                let fields = decl.fields(tree);
                if let Some(field) = fields
                    .iter()
                    .find(|f| f.name(tree) == Some(member))
                    .copied()
                {
                    self.resolve_to(field_name, field);
                    self.resolve_to(node, field);
                    let raw = match field.type_node(tree) {
                        Some(t) => convert_type(self.sess, decl.file, t, None),
                        None => Ty::Unknown,
                    };
                    return self.substitute_struct_args(&decl, tree, raw, inst_args.as_deref());
                }
            }
        }

        // Method candidates, instance only.
        if let Some(method) = self.find_method(q_ty, member, false) {
            self.resolve_to(field_name, method);
            self.resolve_to(node, method);
            return self.method_call_ty(q_ty, method);
        }
        Ty::Unknown
    }

    fn substitute_struct_args(
        &self,
        decl: &Decl,
        tree: &SyntaxTree,
        raw: Ty,
        args: Option<&[Ty]>,
    ) -> Ty {
        let Some(args) = args else { return raw };
        let mut deduction = Deduction::new();
        for (tp, arg) in decl.type_parameters(tree).iter().zip(args) {
            if let Some(name) = tp.name(tree) {
                deduction.insert(name, arg.clone());
            }
        }
        deduction.substitute(&raw)
    }

    /// Escalating receiver-match strategies: receiver text, structural
    /// equality, assignability, generic unification, then bare-parameter
    /// receivers.
    fn find_method(&mut self, q_ty: &Ty, member: &str, want_static: bool) -> Option<Decl> {
        let method_matches = |sess: &Session, method: &Decl| -> bool {
            let is_static = method.kind == DeclKind::StaticMethod;
            if is_static != want_static {
                return false;
            }
            let Some(file) = sess.file(method.file) else {
                return false;
            };
            method.name(&file.tree) == Some(member)
        };

        // 1. Receiver source text equals the rendered receiver type.
        let q_text = q_ty.to_string();
        for method in methods_with_receiver_text(self.sess, &q_text) {
            if method_matches(self.sess, &method) {
                return Some(method);
            }
        }

        let candidates: Vec<Decl> = all_methods(self.sess)
            .into_iter()
            .filter(|m| method_matches(self.sess, m))
            .collect();

        // 2. Structural equality of the converted receiver type.
        for &method in &candidates {
            if let Some(receiver) = self.method_receiver_ty(method) {
                if &receiver == q_ty {
                    return Some(method);
                }
            }
        }
        // 3. Non-generic receivers the qualifier is assignable to.
        for &method in &candidates {
            if let Some(receiver) = self.method_receiver_ty(method) {
                if !receiver.has_generics() && receiver.can_accept(q_ty) {
                    return Some(method);
                }
            }
        }
        // 4. Generic receivers (not a bare parameter) that unify.
        for &method in &candidates {
            if let Some(receiver) = self.method_receiver_ty(method) {
                if receiver.has_generics() && !matches!(receiver, Ty::TypeParam { .. }) {
                    let mut deduction = Deduction::new();
                    deduction.deduce(&receiver, q_ty);
                    if !deduction.is_empty() && &deduction.substitute(&receiver) == q_ty {
                        return Some(method);
                    }
                }
            }
        }
        // 5. A bare `fun T.method(self)` accepts any receiver.
        for &method in &candidates {
            if let Some(receiver) = self.method_receiver_ty(method) {
                if matches!(receiver, Ty::TypeParam { .. }) {
                    return Some(method);
                }
            }
        }
        None
    }

    fn method_receiver_ty(&self, method: Decl) -> Option<Ty> {
        let file = self.sess.file(method.file)?;
        let node = method.receiver_type_node(&file.tree)?;
        Some(convert_type(self.sess, method.file, node, None))
    }

    /// The type a method access evaluates to: its function type with the
    /// receiver's generics substituted.
    fn method_call_ty(&mut self, q_ty: &Ty, method: Decl) -> Ty {
        let fn_ty = self.sess.function_ty(method);
        let Some(receiver) = self.method_receiver_ty(method) else {
            return fn_ty;
        };
        if !receiver.has_generics() {
            return fn_ty;
        }
        let mut deduction = Deduction::new();
        deduction.deduce(&receiver, q_ty);
        deduction.substitute(&fn_ty)
    }

    fn infer_call(&mut self, node: NodeId, flow: FlowContext, hint: Option<&Ty>) -> ExprFlow {
        let tree = self.tree;
        let callee = tree.child_by_field(node, Field::Callee);
        let args: Vec<NodeId> = tree
            .child_of_kind(node, SyntaxKind::ArgList)
            .map(|l| tree.named_children(l).collect())
            .unwrap_or_default();

        let mut flow = flow;
        let mut self_arg: Option<Ty> = None;
        let mut explicit_args: Vec<Ty> = Vec::new();
        let mut callee_fn_ty = Ty::Unknown;
        let mut callee_decl: Option<Decl> = None;

        if let Some(callee_node) = callee {
            match tree.kind(callee_node) {
                SyntaxKind::DotExpr => {
                    let ef = self.infer_expr(callee_node, flow, None, false);
                    flow = ef.out;
                    callee_fn_ty = self
                        .out
                        .expr_types
                        .get(&callee_node)
                        .cloned()
                        .unwrap_or(Ty::Unknown);
                    callee_decl = self
                        .out
                        .resolved
                        .get(&callee_node)
                        .and_then(|d| d.first().copied());
                    if callee_decl.map(|d| d.kind) == Some(DeclKind::InstanceMethod) {
                        let qualifier = tree.child_by_field(callee_node, Field::Qualifier);
                        self_arg = qualifier
                            .and_then(|q| self.out.expr_types.get(&q).cloned());
                    }
                }
                SyntaxKind::RefExpr | SyntaxKind::GenericInstantiation => {
                    let ef = self.infer_expr(callee_node, flow, None, false);
                    flow = ef.out;
                    callee_fn_ty = self
                        .out
                        .expr_types
                        .get(&callee_node)
                        .cloned()
                        .unwrap_or(Ty::Unknown);
                    let name_node = match tree.kind(callee_node) {
                        SyntaxKind::GenericInstantiation => {
                            tree.child_by_field(callee_node, Field::Callee)
                        }
                        _ => Some(callee_node),
                    };
                    callee_decl = name_node
                        .and_then(|n| self.out.resolved.get(&n).and_then(|d| d.first().copied()));
                    if let Some(inst) = tree
                        .child_of_kind(callee_node, SyntaxKind::TypeArgList)
                        .filter(|_| tree.kind(callee_node) == SyntaxKind::GenericInstantiation)
                    {
                        explicit_args = tree
                            .named_children(inst)
                            .collect::<Vec<_>>()
                            .into_iter()
                            .map(|t| convert_type(self.sess, self.file, t, self.self_ty.as_ref()))
                            .collect();
                    }
                }
                _ => {
                    let ef = self.infer_expr(callee_node, flow, None, false);
                    flow = ef.out;
                    callee_fn_ty = self
                        .out
                        .expr_types
                        .get(&callee_node)
                        .cloned()
                        .unwrap_or(Ty::Unknown);
                }
            }
        }

        let (params, ret) = match callee_fn_ty.unwrap_alias() {
            Ty::Fun { params, ret } => (params.clone(), (**ret).clone()),
            _ => (Vec::new(), Ty::Unknown),
        };

        // Seed deduction with explicit type arguments, the receiver, and
        // the expected return type.
        let mut deduction = Deduction::new();
        if let (Some(decl), false) = (callee_decl, explicit_args.is_empty()) {
            if let Some(file) = self.sess.file(decl.file) {
                for (tp, arg) in decl
                    .type_parameters(&file.tree)
                    .iter()
                    .zip(explicit_args.iter())
                {
                    if let Some(name) = tp.name(&file.tree) {
                        deduction.insert(name, arg.clone());
                    }
                }
            }
        }

        // Instance methods consume the qualifier as their first parameter.
        let mut param_iter = params.iter();
        if let Some(self_ty) = &self_arg {
            if let Some(self_param) = param_iter.next() {
                deduction.deduce(self_param, self_ty);
            }
        }
        let remaining: Vec<&Ty> = param_iter.collect();

        for (i, arg) in args.iter().enumerate() {
            let param_hint = remaining.get(i).map(|p| deduction.substitute(p));
            let ef = self.infer_expr(*arg, flow, param_hint.as_ref(), false);
            flow = ef.out;
            let arg_ty = self
                .out
                .expr_types
                .get(arg)
                .cloned()
                .unwrap_or(Ty::Unknown);
            if let Some(param) = remaining.get(i) {
                deduction.deduce(param, &arg_ty);
            }
        }

        if ret.has_generics() {
            if let Some(hint) = hint {
                deduction.deduce(&ret, hint);
            }
        }
        if let Some(decl) = callee_decl {
            if let Some(file) = self.sess.file(decl.file) {
                let tree = &file.tree;
                let tps = decl.type_parameters(tree);
                let defaults: Vec<(String, Option<Ty>)> = tps
                    .iter()
                    .map(|tp| {
                        let name = tp.name(tree).unwrap_or_default().to_owned();
                        let default = tree
                            .child_by_field(tp.node, Field::Default)
                            .map(|d| convert_type(self.sess, decl.file, d, None));
                        (name, default)
                    })
                    .collect();
                deduction
                    .fill_defaults(defaults.iter().map(|(n, d)| (n.as_str(), d.as_ref())));
            }
        }

        let result = deduction.substitute(&ret);
        // Calling a never-returning function ends the flow.
        if result.is_never() {
            flow.mark_unreachable(UnreachableKind::CallNeverReturns);
        }
        self.record(node, result);
        ExprFlow::new(flow)
    }

    fn infer_assign(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let lhs = tree.child_by_field(node, Field::Lhs);
        let rhs = tree.child_by_field(node, Field::Rhs);

        // The left side reads at its declared type: narrowing does not
        // restrict what may be assigned.
        let declared = lhs.map(|l| self.lvalue_declared_ty(l, &flow));
        let mut flow = match lhs {
            Some(l) => self.infer_expr(l, flow, None, false).out,
            None => flow,
        };
        let declared = declared.unwrap_or(Ty::Unknown);

        let ef = match rhs {
            Some(r) => self.infer_expr(r, flow, Some(&declared), false),
            None => ExprFlow::new(flow),
        };
        flow = ef.out;
        let rhs_ty = rhs
            .and_then(|r| self.out.expr_types.get(&r).cloned())
            .unwrap_or(Ty::Unknown);

        if let Some(l) = lhs {
            self.apply_assignment(l, &declared, &rhs_ty, &mut flow);
        }
        self.record(node, rhs_ty);
        ExprFlow::new(flow)
    }

    /// Declared (pre-narrowing) type of an assignable expression.
    fn lvalue_declared_ty(&mut self, lhs: NodeId, flow: &FlowContext) -> Ty {
        let tree = self.tree;
        match tree.kind(lhs) {
            SyntaxKind::RefExpr => {
                let name = tree.text(lhs);
                match flow.lookup_symbol(name) {
                    Some(decl) => flow
                        .symbol_type(&decl)
                        .cloned()
                        .unwrap_or_else(|| self.sess.decl_ty(decl)),
                    None => {
                        let state = ResolveState::named(name, false);
                        match resolve::resolve_unqualified(self.sess, self.file, lhs, &state) {
                            Some(decl) => self.sess.decl_ty(decl),
                            None => Ty::Unknown,
                        }
                    }
                }
            }
            SyntaxKind::DotExpr | SyntaxKind::ParenExpr => Ty::Unknown,
            _ => Ty::Unknown,
        }
    }

    /// Record smart casts after `lhs = rhs`, recursing into destructuring
    /// tensors and tuples.
    fn apply_assignment(&mut self, lhs: NodeId, declared: &Ty, rhs_ty: &Ty, flow: &mut FlowContext) {
        let tree = self.tree;
        match tree.kind(lhs) {
            SyntaxKind::TensorExpr | SyntaxKind::TupleExpr => {
                let parts = tree.named_children(lhs).collect::<Vec<_>>();
                let elems: Vec<Ty> = match rhs_ty.base_ty() {
                    Ty::Tensor(items) | Ty::Tuple(items) if items.len() == parts.len() => {
                        items.clone()
                    }
                    _ => vec![Ty::Unknown; parts.len()],
                };
                for (part, elem) in parts.into_iter().zip(elems) {
                    let part_declared = self.lvalue_declared_ty(part, flow);
                    self.apply_assignment(part, &part_declared, &elem, flow);
                }
            }
            _ => {
                if let Some(sink) = self.extract_sink(lhs) {
                    let declared = if declared.is_unknown() {
                        rhs_ty.clone()
                    } else {
                        declared.clone()
                    };
                    flow.set_sink(sink, calc_smartcast_on_assignment(&declared, rhs_ty));
                }
            }
        }
    }

    fn infer_compound_assign(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let lhs = tree.child_by_field(node, Field::Lhs);
        let rhs = tree.child_by_field(node, Field::Rhs);
        let declared = lhs.map(|l| self.lvalue_declared_ty(l, &flow));
        let mut flow = flow;
        if let Some(l) = lhs {
            flow = self.infer_expr(l, flow, None, false).out;
        }
        if let Some(r) = rhs {
            flow = self.infer_expr(r, flow, Some(&Ty::Int), false).out;
        }
        // The location re-widens to its declared type.
        if let (Some(l), Some(declared)) = (lhs, declared) {
            if let Some(sink) = self.extract_sink(l) {
                if !declared.is_unknown() {
                    flow.set_sink(sink, declared.clone());
                }
            }
            self.record(node, declared);
        } else {
            self.record(node, Ty::Int);
        }
        ExprFlow::new(flow)
    }

    fn infer_struct_lit(&mut self, node: NodeId, flow: FlowContext, hint: Option<&Ty>) -> ExprFlow {
        let tree = self.tree;
        let name_part = tree.child_by_field(node, Field::Name);

        // Find the struct declaration: explicit name, or the hint's base.
        let mut explicit_args: Vec<Ty> = Vec::new();
        let struct_decl = match name_part {
            Some(name_node) => {
                let name_ref = match tree.kind(name_node) {
                    SyntaxKind::GenericInstantiation => {
                        if let Some(list) = tree.child_of_kind(name_node, SyntaxKind::TypeArgList) {
                            explicit_args = tree
                                .named_children(list)
                                .collect::<Vec<_>>()
                                .into_iter()
                                .map(|t| {
                                    convert_type(self.sess, self.file, t, self.self_ty.as_ref())
                                })
                                .collect();
                        }
                        tree.child_by_field(name_node, Field::Callee)
                    }
                    _ => Some(name_node),
                };
                let found = name_ref.and_then(|n| {
                    let decl = self
                        .sess
                        .index()
                        .element_by_name(IndexKey::Structs, tree.text(n));
                    if let Some(d) = decl {
                        self.resolve_to(n, d);
                    }
                    decl
                });
                found
            }
            None => match hint.map(Ty::base_ty) {
                Some(Ty::Struct { decl, .. }) => Some(*decl),
                _ => None,
            },
        };

        let hint_args: Option<Vec<Ty>> = match hint.map(Ty::unwrap_alias) {
            Some(Ty::Instantiation { args, .. }) => Some(args.clone()),
            _ => None,
        };

        let Some(struct_decl) = struct_decl else {
            let mut flow = flow;
            for f in tree.children_of_kind(node, SyntaxKind::StructLitField).collect::<Vec<_>>() {
                if let Some(v) = tree.child_by_field(f, Field::Value) {
                    flow = self.infer_expr(v, flow, None, false).out;
                }
            }
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        };

        let Some(owner) = self.sess.file(struct_decl.file) else {
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        };
        let owner_tree = &owner.tree;
        let type_params = struct_decl.type_parameters(owner_tree);

        let mut deduction = Deduction::new();
        for (tp, arg) in type_params.iter().zip(explicit_args.iter()) {
            if let Some(name) = tp.name(owner_tree) {
                deduction.insert(name, arg.clone());
            }
        }
        if let Some(hint_args) = &hint_args {
            for (tp, arg) in type_params.iter().zip(hint_args.iter()) {
                if let Some(name) = tp.name(owner_tree) {
                    if deduction.get(name).is_none() {
                        deduction.insert(name, arg.clone());
                    }
                }
            }
        }

        let fields = struct_decl.fields(owner_tree);
        let mut flow = flow;
        for lit_field in tree
            .children_of_kind(node, SyntaxKind::StructLitField)
            .collect::<Vec<_>>()
        {
            let Some(fname_node) = tree.child_by_field(lit_field, Field::Name) else {
                continue;
            };
            let fname = tree.text(fname_node);
            let field = fields.iter().find(|f| f.name(owner_tree) == Some(fname));
            let raw_field_ty = field.and_then(|f| f.type_node(owner_tree)).map(|t| {
                convert_type(self.sess, struct_decl.file, t, None)
            });
            if let Some(field) = field {
                self.resolve_to(fname_node, *field);
            }
            let value = tree.child_by_field(lit_field, Field::Value);
            let value_ty = match value {
                Some(v) => {
                    let field_hint = raw_field_ty.as_ref().map(|t| deduction.substitute(t));
                    let ef = self.infer_expr(v, flow, field_hint.as_ref(), false);
                    flow = ef.out;
                    self.out.expr_types.get(&v).cloned().unwrap_or(Ty::Unknown)
                }
                None => {
                    // Shorthand `Foo { a }` reads the like-named local.
                    let state = ResolveState::named(fname, false);
                    let local = flow.lookup_symbol(fname).or_else(|| {
                        resolve::resolve_unqualified(self.sess, self.file, fname_node, &state)
                    });
                    match local {
                        Some(decl) => self.symbol_read_ty(&decl, &flow),
                        None => Ty::Unknown,
                    }
                }
            };
            if let Some(raw) = &raw_field_ty {
                deduction.deduce(raw, &value_ty);
            }
        }

        let base = named_decl_ty_base(self.sess, struct_decl);
        let ty = if type_params.is_empty() {
            base
        } else {
            let args: Vec<Ty> = type_params
                .iter()
                .map(|tp| {
                    tp.name(owner_tree)
                        .and_then(|n| deduction.get(n).cloned())
                        .unwrap_or(Ty::Unknown)
                })
                .collect();
            Ty::Instantiation {
                inner: Box::new(base),
                args,
            }
        };
        self.record(node, ty);
        ExprFlow::new(flow)
    }

    fn infer_generic_inst(&mut self, node: NodeId, flow: FlowContext) -> ExprFlow {
        let tree = self.tree;
        let Some(callee) = tree.child_by_field(node, Field::Callee) else {
            self.record(node, Ty::Unknown);
            return ExprFlow::new(flow);
        };
        let ef = self.infer_expr(callee, flow, None, false);
        let base_ty = self
            .out
            .expr_types
            .get(&callee)
            .cloned()
            .unwrap_or(Ty::Unknown);
        let args: Vec<Ty> = tree
            .child_of_kind(node, SyntaxKind::TypeArgList)
            .map(|l| tree.named_children(l).collect::<Vec<_>>())
            .unwrap_or_default()
            .into_iter()
            .map(|t| convert_type(self.sess, self.file, t, self.self_ty.as_ref()))
            .collect();

        // Substitute a function's type parameters positionally.
        let ty = match self
            .out
            .resolved
            .get(&callee)
            .and_then(|d| d.first().copied())
        {
            Some(decl) if decl.is_function_like() => {
                if let Some(file) = self.sess.file(decl.file) {
                    let mut deduction = Deduction::new();
                    for (tp, arg) in decl.type_parameters(&file.tree).iter().zip(args.iter()) {
                        if let Some(name) = tp.name(&file.tree) {
                            deduction.insert(name, arg.clone());
                        }
                    }
                    deduction.substitute(&base_ty)
                } else {
                    base_ty
                }
            }
            _ => Ty::Instantiation {
                inner: Box::new(base_ty),
                args,
            },
        };
        self.record(node, ty);
        ExprFlow::new(ef.out)
    }

    fn infer_match(&mut self, node: NodeId, flow: FlowContext, hint: Option<&Ty>) -> ExprFlow {
        let tree = self.tree;
        let subject = tree.child_by_field(node, Field::Subject);
        let ef = match subject {
            Some(s) => self.infer_expr(s, flow, None, false),
            None => ExprFlow::new(flow),
        };
        let subject_ty = subject
            .and_then(|s| self.out.expr_types.get(&s).cloned())
            .unwrap_or(Ty::Unknown);
        let sink = subject.and_then(|s| self.extract_sink(s));

        let mut result_ty: Option<Ty> = None;
        let mut out_flow: Option<FlowContext> = None;
        for arm in tree
            .children_of_kind(node, SyntaxKind::MatchArm)
            .collect::<Vec<_>>()
        {
            let mut arm_flow = ef.out.clone();
            if let Some(pattern) = tree.child_by_field(arm, Field::Pattern) {
                if tree.kind(pattern).is_type() {
                    let mut target =
                        convert_type(self.sess, self.file, pattern, self.self_ty.as_ref());
                    // A generic pattern picks the matching instantiated
                    // variant of the subject.
                    if target.has_generics() {
                        if let Ty::Union(members) = subject_ty.unwrap_alias() {
                            if let Some(m) = members.iter().find(|m| {
                                m.base_ty() == target.base_ty()
                            }) {
                                target = m.clone();
                            }
                        }
                    }
                    if let Some(sink) = sink {
                        arm_flow.set_sink(sink, target);
                    }
                } else {
                    arm_flow = self.infer_expr(pattern, arm_flow, Some(&subject_ty), false).out;
                }
            }
            let (arm_ty, arm_exit) = match tree.child_by_field(arm, Field::Body) {
                Some(body) if tree.kind(body) == SyntaxKind::Block => {
                    (Ty::Void, self.process_block(body, arm_flow))
                }
                Some(body) => {
                    let ef = self.infer_expr(body, arm_flow, hint, false);
                    let ty = self
                        .out
                        .expr_types
                        .get(&body)
                        .cloned()
                        .unwrap_or(Ty::Unknown);
                    (ty, ef.out)
                }
                None => (Ty::Unknown, arm_flow),
            };
            result_ty = Some(match result_ty {
                Some(prev) => join_types(&prev, &arm_ty),
                None => arm_ty,
            });
            out_flow = Some(match out_flow {
                Some(prev) => prev.join(arm_exit),
                None => arm_exit,
            });
        }
        self.record(node, result_ty.unwrap_or(Ty::Void));
        ExprFlow::new(out_flow.unwrap_or(ef.out))
    }

    /// The narrowable location an expression denotes, if any: a reference
    /// to a variable-like symbol, or a member path below one.
    fn extract_sink(&mut self, node: NodeId) -> Option<SinkExpression> {
        let tree = self.tree;
        match tree.kind(node) {
            SyntaxKind::RefExpr => {
                let decl = self.out.resolved.get(&node)?.first().copied()?;
                match decl.kind {
                    DeclKind::Var
                    | DeclKind::Parameter
                    | DeclKind::GlobalVar
                    | DeclKind::Constant => Some(SinkExpression::symbol(decl)),
                    _ => None,
                }
            }
            SyntaxKind::ParenExpr | SyntaxKind::NotNullExpr => {
                let inner = tree
                    .child_by_field(node, Field::Operand)
                    .or_else(|| tree.named_children(node).next())?;
                self.extract_sink(inner)
            }
            SyntaxKind::DotExpr => {
                let qualifier = tree.child_by_field(node, Field::Qualifier)?;
                let base = self.extract_sink(qualifier)?;
                let member = tree.child_by_field(node, Field::FieldName)?;
                let member = tree.text(member).to_owned();
                let q_ty = self.out.expr_types.get(&qualifier).cloned()?;
                let idx = self.member_index(&q_ty, &member)?;
                base.child(idx)
            }
            _ => None,
        }
    }
}

// ── Type conversion ──────────────────────────────────────────────────────

/// Convert a type node to a [`Ty`], caching per node with an `Unknown`
/// placeholder pre-seeded so self-referential aliases terminate.
pub(crate) fn convert_type(
    sess: &Session,
    file: FileId,
    node: NodeId,
    self_ty: Option<&Ty>,
) -> Ty {
    if let Some(cached) = sess.cached_type_node(file, node) {
        return cached;
    }
    sess.cache_type_node(file, node, Ty::Unknown);
    let ty = convert_type_uncached(sess, file, node, self_ty);
    sess.cache_type_node(file, node, ty.clone());
    ty
}

fn convert_type_uncached(
    sess: &Session,
    file: FileId,
    node: NodeId,
    self_ty: Option<&Ty>,
) -> Ty {
    let Some(f) = sess.file(file) else {
        return Ty::Unknown;
    };
    let tree = &f.tree;
    match tree.kind(node) {
        SyntaxKind::NamedType => {
            let text = tree.text(node);
            if text == "null" {
                return Ty::Null;
            }
            if text == "self" {
                return self_ty.cloned().unwrap_or(Ty::Unknown);
            }
            if let Some(primitive) = as_primitive_ty(text) {
                return primitive;
            }
            let Some(name_node) = tree.child_by_field(node, Field::Name) else {
                return Ty::Unknown;
            };
            let state = ResolveState::named(normalize_type_name(text), true);
            match resolve::resolve_unqualified(sess, file, name_node, &state) {
                Some(decl) => named_decl_ty(sess, decl),
                None => Ty::Unknown,
            }
        }
        SyntaxKind::NullableType => {
            let inner = tree
                .child_by_field(node, Field::Operand)
                .map(|i| convert_type(sess, file, i, self_ty))
                .unwrap_or(Ty::Unknown);
            Ty::nullable(inner)
        }
        SyntaxKind::UnionType => {
            let members: Vec<Ty> = tree
                .named_children(node)
                .collect::<Vec<_>>()
                .into_iter()
                .map(|m| convert_type(sess, file, m, self_ty))
                .collect();
            Ty::union_of(members)
        }
        SyntaxKind::TensorType => Ty::Tensor(
            tree.named_children(node)
                .collect::<Vec<_>>()
                .into_iter()
                .map(|m| convert_type(sess, file, m, self_ty))
                .collect(),
        ),
        SyntaxKind::TupleType => Ty::Tuple(
            tree.named_children(node)
                .collect::<Vec<_>>()
                .into_iter()
                .map(|m| convert_type(sess, file, m, self_ty))
                .collect(),
        ),
        SyntaxKind::ParenType => tree
            .named_children(node)
            .next()
            .map(|i| convert_type(sess, file, i, self_ty))
            .unwrap_or(Ty::Unknown),
        SyntaxKind::FunType => {
            let ret = tree
                .child_by_field(node, Field::ReturnType)
                .map(|r| convert_type(sess, file, r, self_ty))
                .unwrap_or(Ty::Unknown);
            let params: Vec<Ty> = tree
                .named_children(node)
                .filter(|&c| tree.field(c) != Some(Field::ReturnType))
                .collect::<Vec<_>>()
                .into_iter()
                .map(|p| convert_type(sess, file, p, self_ty))
                .collect();
            Ty::Fun {
                params,
                ret: Box::new(ret),
            }
        }
        SyntaxKind::InstantiationType => {
            let Some(name_node) = tree.child_by_field(node, Field::Name) else {
                return Ty::Unknown;
            };
            let state = ResolveState::named(tree.text(name_node), true);
            let Some(decl) = resolve::resolve_unqualified(sess, file, name_node, &state) else {
                return Ty::Unknown;
            };
            let mut args: Vec<Ty> = tree
                .child_of_kind(node, SyntaxKind::TypeArgList)
                .map(|l| tree.named_children(l).collect::<Vec<_>>())
                .unwrap_or_default()
                .into_iter()
                .map(|a| convert_type(sess, file, a, self_ty))
                .collect();
            // Missing trailing arguments take their declared defaults.
            if let Some(owner) = sess.file(decl.file) {
                let tps = decl.type_parameters(&owner.tree);
                for tp in tps.iter().skip(args.len()) {
                    let default = owner
                        .tree
                        .child_by_field(tp.node, Field::Default)
                        .map(|d| convert_type(sess, decl.file, d, None))
                        .unwrap_or(Ty::Unknown);
                    args.push(default);
                }
            }
            Ty::Instantiation {
                inner: Box::new(named_decl_ty_base(sess, decl)),
                args,
            }
        }
        SyntaxKind::BuiltinType => Ty::Unknown,
        _ => Ty::Unknown,
    }
}

/// `int32`, `varuint16`, `bits256` and friends, plus the spellable
/// primitives.
pub(crate) fn as_primitive_ty(name: &str) -> Option<Ty> {
    let sized = |rest: &str| rest.parse::<u32>().ok().filter(|&n| n >= 1 && n <= 1024);
    match name {
        "int" => return Some(Ty::Int),
        "bool" => return Some(Ty::bool()),
        "coins" => return Some(Ty::Coins),
        "void" => return Some(Ty::Void),
        "never" => return Some(Ty::Never),
        "string" => return Some(Ty::Str),
        _ => {}
    }
    if let Some(rest) = name.strip_prefix("uint") {
        return sized(rest).map(|width| Ty::IntN {
            width,
            unsigned: true,
        });
    }
    if let Some(rest) = name.strip_prefix("varuint") {
        return sized(rest).map(|width| Ty::VarIntN {
            width,
            unsigned: true,
        });
    }
    if let Some(rest) = name.strip_prefix("varint") {
        return sized(rest).map(|width| Ty::VarIntN {
            width,
            unsigned: false,
        });
    }
    if let Some(rest) = name.strip_prefix("int") {
        return sized(rest).map(|width| Ty::IntN {
            width,
            unsigned: false,
        });
    }
    if let Some(rest) = name.strip_prefix("bits") {
        return sized(rest).map(Ty::BitsN);
    }
    if let Some(rest) = name.strip_prefix("bytes") {
        return sized(rest).map(Ty::BytesN);
    }
    None
}

/// The type a named declaration denotes when used in type position.
/// Generic structs and aliases come wrapped in an instantiation over their
/// own parameters.
pub(crate) fn named_decl_ty(sess: &Session, decl: Decl) -> Ty {
    let base = named_decl_ty_base(sess, decl);
    let Some(file) = sess.file(decl.file) else {
        return base;
    };
    let tps = decl.type_parameters(&file.tree);
    if tps.is_empty() || decl.is_function_like() {
        return base;
    }
    let args: Vec<Ty> = tps
        .iter()
        .map(|tp| type_param_ty(sess, *tp))
        .collect();
    Ty::Instantiation {
        inner: Box::new(base),
        args,
    }
}

/// The bare named type, without the generic self-instantiation wrapper.
pub(crate) fn named_decl_ty_base(sess: &Session, decl: Decl) -> Ty {
    let Some(file) = sess.file(decl.file) else {
        return Ty::Unknown;
    };
    let tree = &file.tree;
    let name = decl.name(tree).unwrap_or_default().to_owned();
    match decl.kind {
        DeclKind::Struct => Ty::Struct { name, decl },
        DeclKind::Enum => Ty::Enum { name, decl },
        DeclKind::TypeAlias => {
            if decl.is_builtin_alias(tree) {
                return Ty::Builtin { name, decl };
            }
            let inner = decl
                .type_node(tree)
                .map(|t| convert_type(sess, decl.file, t, None))
                .unwrap_or(Ty::Unknown);
            Ty::Alias {
                name,
                decl,
                inner: Box::new(inner),
            }
        }
        DeclKind::TypeParam => type_param_ty(sess, decl),
        DeclKind::EnumMember => match decl.owner(tree) {
            Some(owner) => named_decl_ty_base(sess, owner),
            None => Ty::Unknown,
        },
        _ if decl.is_function_like() => sess.function_ty(decl),
        _ => Ty::Unknown,
    }
}

fn type_param_ty(sess: &Session, decl: Decl) -> Ty {
    let Some(file) = sess.file(decl.file) else {
        return Ty::Unknown;
    };
    let tree = &file.tree;
    let name = decl.name(tree).unwrap_or_default().to_owned();
    let default = tree
        .child_by_field(decl.node, Field::Default)
        .map(|d| Box::new(convert_type(sess, decl.file, d, None)));
    Ty::TypeParam {
        name,
        decl,
        default,
    }
}
