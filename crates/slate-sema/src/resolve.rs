//! Reference resolution.
//!
//! Unqualified names are resolved by walking the syntax spine outward from
//! the usage: enclosing blocks (statements before the usage only, so there
//! are no forward references), catch binders, parameters, type parameters,
//! then the indexed entities of the current file, the implicitly imported
//! stdlib and stubs files, and finally explicit imports.
//!
//! Qualified names (`x.y`) depend on the inferred type of the qualifier, so
//! resolving them runs the owning declaration's inference pass and reads the
//! recorded answer.

use slate_common::FileId;
use slate_syntax::{Field, NodeId, SyntaxKind, SyntaxTree};

use crate::decl::{decl_of_name, Decl};
use crate::index::IndexKey;
use crate::session::Session;

/// Search parameters threaded through scope processors.
#[derive(Debug, Clone)]
pub struct ResolveState {
    /// The name being searched; empty in completion mode.
    pub name: String,
    /// Restrict hits to type-namespace entities (structs, enums, aliases,
    /// type parameters).
    pub only_types: bool,
    /// Enumerate everything instead of stopping at the first hit.
    pub completion: bool,
}

impl ResolveState {
    pub fn named(name: impl Into<String>, only_types: bool) -> ResolveState {
        ResolveState {
            name: name.into(),
            only_types,
            completion: false,
        }
    }

    /// Whether a declaration with `name` satisfies this search.
    fn matches(&self, name: Option<&str>) -> bool {
        if self.completion {
            return true;
        }
        name == Some(self.name.as_str())
    }
}

/// Scope callback: return `false` to stop the walk (a hit was accepted).
pub type Processor<'a> = dyn FnMut(Decl, &ResolveState) -> bool + 'a;

/// Resolve the reference at `node` to a single declaration.
pub fn resolve(sess: &Session, file: FileId, node: NodeId) -> Option<Decl> {
    multi_resolve(sess, file, node).into_iter().next()
}

/// Resolve, keeping every candidate. Only struct-literal shorthand fields
/// legitimately produce more than one answer (the field and the local).
pub fn multi_resolve(sess: &Session, file: FileId, node: NodeId) -> Vec<Decl> {
    let tree = match sess.file(file) {
        Some(f) => &f.tree,
        None => return Vec::new(),
    };

    // A declaration's own name resolves to the declaration.
    if let Some(decl) = decl_of_name(tree, file, node) {
        return vec![decl];
    }

    match tree.kind(node) {
        SyntaxKind::Name => resolve_name_node(sess, file, tree, node),
        SyntaxKind::RefExpr => resolve_ref_expr(sess, file, tree, node),
        _ => Vec::new(),
    }
}

fn resolve_name_node(sess: &Session, file: FileId, tree: &SyntaxTree, node: NodeId) -> Vec<Decl> {
    let Some(parent) = tree.parent(node) else {
        return Vec::new();
    };
    match tree.kind(parent) {
        // Field side of `x.y`: the answer was recorded by the qualifier's
        // owner inference pass.
        SyntaxKind::DotExpr => {
            sess.ensure_inferred_at(file, node);
            sess.resolved_cache(file, node)
        }
        // `Pair { a }` resolves to the field, and for the shorthand form
        // also to the local variable feeding it.
        SyntaxKind::StructLitField => {
            sess.ensure_inferred_at(file, node);
            let mut out = sess.resolved_cache(file, node);
            let shorthand = tree.child_by_field(parent, Field::Value).is_none();
            if shorthand {
                let name = tree.text(node);
                let state = ResolveState::named(name, false);
                if let Some(local) = resolve_unqualified(sess, file, node, &state) {
                    if !out.contains(&local) {
                        out.push(local);
                    }
                }
            }
            out
        }
        // Name inside a type: type-namespace search.
        SyntaxKind::NamedType | SyntaxKind::InstantiationType => {
            let name = normalize_type_name(tree.text(node));
            let state = ResolveState::named(name, true);
            resolve_unqualified(sess, file, node, &state)
                .into_iter()
                .collect()
        }
        _ => Vec::new(),
    }
}

fn resolve_ref_expr(sess: &Session, file: FileId, tree: &SyntaxTree, node: NodeId) -> Vec<Decl> {
    // Inside a declaration body the inference pass has the flow-accurate
    // answer (latest shadowing binding).
    sess.ensure_inferred_at(file, node);
    let cached = sess.resolved_cache(file, node);
    if !cached.is_empty() {
        return cached;
    }
    let state = ResolveState::named(tree.text(node), false);
    resolve_unqualified(sess, file, node, &state)
        .into_iter()
        .collect()
}

/// Sized primitive names resolve to their builtin stub declaration.
pub(crate) fn normalize_type_name(name: &str) -> String {
    if let Some(rest) = name
        .strip_prefix("uint")
        .or_else(|| name.strip_prefix("int"))
        .or_else(|| name.strip_prefix("varuint"))
        .or_else(|| name.strip_prefix("varint"))
    {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return "int".to_owned();
        }
    }
    if let Some(rest) = name
        .strip_prefix("bits")
        .or_else(|| name.strip_prefix("bytes"))
    {
        if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) {
            return "slice".to_owned();
        }
    }
    name.to_owned()
}

/// First unqualified hit for `state`, walking scopes outward from `from`.
pub(crate) fn resolve_unqualified(
    sess: &Session,
    file: FileId,
    from: NodeId,
    state: &ResolveState,
) -> Option<Decl> {
    let mut found = None;
    process_unqualified(sess, file, from, state, &mut |decl, _state| {
        found = Some(decl);
        false
    });
    found
}

/// Walk every scope visible from `from`, feeding matching declarations to
/// `proc` until it declines to continue.
pub(crate) fn process_unqualified(
    sess: &Session,
    file: FileId,
    from: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) {
    let Some(f) = sess.file(file) else { return };
    let tree = &f.tree;

    let mut prev = from;
    let mut cur = tree.parent(from);
    while let Some(node) = cur {
        let keep_going = match tree.kind(node) {
            SyntaxKind::Block => process_block(tree, file, node, prev, state, proc),
            SyntaxKind::CatchClause => process_catch(tree, file, node, prev, state, proc),
            SyntaxKind::DoWhileStmt => {
                // The loop condition sees variables declared in the body.
                process_do_while_condition(tree, file, node, prev, state, proc)
            }
            SyntaxKind::FunctionDecl | SyntaxKind::MethodDecl | SyntaxKind::GetMethodDecl => {
                process_function_scope(sess, tree, file, node, state, proc)
            }
            SyntaxKind::StructDecl | SyntaxKind::EnumDecl | SyntaxKind::TypeAliasDecl => {
                process_type_parameters(tree, file, node, state, proc)
            }
            _ => true,
        };
        if !keep_going {
            return;
        }
        prev = node;
        cur = tree.parent(node);
    }

    process_all_entities(sess, file, state, proc);
}

/// Declarations introduced by statements of `block` textually before the
/// statement containing the usage.
fn process_block(
    tree: &SyntaxTree,
    file: FileId,
    block: NodeId,
    below: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    for &stmt in tree.children(block) {
        if stmt == below {
            break;
        }
        if tree.kind(stmt) == SyntaxKind::VarStmt
            && !process_var_defs(tree, file, stmt, state, proc)
        {
            return false;
        }
    }
    true
}

/// Visit every `VarDef` under `node`, descending through destructuring
/// tensors and tuples but not into the initializer.
fn process_var_defs(
    tree: &SyntaxTree,
    file: FileId,
    node: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    for child in tree.named_children(node) {
        match tree.kind(child) {
            SyntaxKind::VarDef => {
                if let Some(decl) = Decl::of(tree, file, child) {
                    if state.matches(decl.name(tree)) && !state.only_types && !proc(decl, state) {
                        return false;
                    }
                }
            }
            SyntaxKind::VarTensor | SyntaxKind::VarTuple => {
                if !process_var_defs(tree, file, child, state, proc) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

fn process_catch(
    tree: &SyntaxTree,
    file: FileId,
    clause: NodeId,
    below: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    // Binders are visible only inside the handler body.
    if tree.child_by_field(clause, Field::Body) != Some(below) {
        return true;
    }
    for field in [Field::CaughtErr, Field::CaughtArg] {
        if let Some(binder) = tree.child_by_field(clause, field) {
            if let Some(decl) = Decl::of(tree, file, binder) {
                if state.matches(decl.name(tree)) && !state.only_types && !proc(decl, state) {
                    return false;
                }
            }
        }
    }
    true
}

fn process_do_while_condition(
    tree: &SyntaxTree,
    file: FileId,
    stmt: NodeId,
    below: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    if tree.child_by_field(stmt, Field::Condition) != Some(below) {
        return true;
    }
    let Some(body) = tree.child_by_field(stmt, Field::Body) else {
        return true;
    };
    for &inner in tree.children(body) {
        if tree.kind(inner) == SyntaxKind::VarStmt
            && !process_var_defs(tree, file, inner, state, proc)
        {
            return false;
        }
    }
    true
}

fn process_function_scope(
    sess: &Session,
    tree: &SyntaxTree,
    file: FileId,
    func: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    let Some(decl) = Decl::of(tree, file, func) else {
        return true;
    };
    if !state.only_types {
        for param in decl.parameters(tree, false) {
            if state.matches(param.name(tree)) && !proc(param, state) {
                return false;
            }
        }
    }
    for tp in decl.type_parameters(tree) {
        if state.matches(tp.name(tree)) && !proc(tp, state) {
            return false;
        }
    }
    // Names in a generic receiver act as type parameters unless they name a
    // real indexed type (`Box<T>` declares `T`, `Box<int>` does not).
    for tp in decl.receiver_type_param_candidates(tree) {
        let Some(name) = tp.name(tree) else { continue };
        if !state.matches(Some(name)) {
            continue;
        }
        if is_indexed_type_name(sess, name) {
            continue;
        }
        if !proc(tp, state) {
            return false;
        }
    }
    true
}

fn process_type_parameters(
    tree: &SyntaxTree,
    file: FileId,
    node: NodeId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    let Some(decl) = Decl::of(tree, file, node) else {
        return true;
    };
    for tp in decl.type_parameters(tree) {
        if state.matches(tp.name(tree)) && !proc(tp, state) {
            return false;
        }
    }
    true
}

/// Whether `name` denotes a type declared somewhere in the project.
pub(crate) fn is_indexed_type_name(sess: &Session, name: &str) -> bool {
    let index = sess.index();
    index.element_by_name(IndexKey::Structs, name).is_some()
        || index.element_by_name(IndexKey::Enums, name).is_some()
        || index.element_by_name(IndexKey::TypeAliases, name).is_some()
}

/// Indexed entities in visibility order: current file, implicit stdlib and
/// stubs, then explicit imports.
fn process_all_entities(
    sess: &Session,
    file: FileId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) {
    let mut visited = vec![file];
    if !process_file_entities(sess, file, state, proc) {
        return;
    }
    for implicit in [sess.stdlib_common_file(), sess.stubs_file()] {
        let Some(f) = implicit else { continue };
        if visited.contains(&f) {
            continue;
        }
        visited.push(f);
        if !process_file_entities(sess, f, state, proc) {
            return;
        }
    }
    for imported in sess.imported_files(file) {
        if visited.contains(&imported) {
            continue;
        }
        visited.push(imported);
        if !process_file_entities(sess, imported, state, proc) {
            return;
        }
    }
}

/// Top-level entities of one file, value namespace before type namespace.
fn process_file_entities(
    sess: &Session,
    file: FileId,
    state: &ResolveState,
    proc: &mut Processor<'_>,
) -> bool {
    let Some(index) = sess.file_index(file) else {
        return true;
    };
    if !state.only_types {
        for key in [
            IndexKey::Functions,
            IndexKey::GetMethods,
            IndexKey::GlobalVars,
            IndexKey::Constants,
        ] {
            for entry in index.decls(key) {
                if (state.completion || entry.name == state.name) && !proc(entry.decl, state) {
                    return false;
                }
            }
        }
    }
    for key in [IndexKey::Structs, IndexKey::Enums, IndexKey::TypeAliases] {
        for entry in index.decls(key) {
            if (state.completion || entry.name == state.name) && !proc(entry.decl, state) {
                return false;
            }
        }
    }
    true
}

/// Method candidates for a receiver named `receiver_text`, instance and
/// static, across all roots in priority order.
pub(crate) fn methods_with_receiver_text(sess: &Session, receiver_text: &str) -> Vec<Decl> {
    let mut out = Vec::new();
    for root in sess.index().all_roots() {
        for entry in root.decls(IndexKey::Methods) {
            if entry.receiver.as_deref() == Some(receiver_text) {
                out.push(entry.decl);
            }
        }
    }
    out
}

/// Every indexed method in priority order; the caller applies structural
/// receiver matching.
pub(crate) fn all_methods(sess: &Session) -> Vec<Decl> {
    let mut out = Vec::new();
    for root in sess.index().all_roots() {
        for entry in root.decls(IndexKey::Methods) {
            out.push(entry.decl);
        }
    }
    out
}
