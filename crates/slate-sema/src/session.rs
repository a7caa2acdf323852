//! The analysis session: files, indexes and memoization.
//!
//! A [`Session`] owns every parsed file, the [`ProjectIndex`] over the
//! stdlib, stubs and workspace roots, and the caches the inference pass
//! fills. Queries take `&self`; caches live behind a `RefCell` and are
//! invalidated wholesale whenever any file is added, changed or removed.

use std::cell::RefCell;

use rustc_hash::{FxHashMap, FxHashSet};
use slate_common::FileId;
use slate_syntax::{parse_file, Field, NodeId, ParseError, SyntaxKind, SyntaxTree};

use crate::consts::{self, ConstValue};
use crate::decl::{Decl, DeclKind, CACHE_OWNER_KINDS};
use crate::index::{FileIndex, IndexKey, ProjectIndex};
use crate::infer::{self, named_decl_ty};
use crate::resolve;
use crate::ty::Ty;

/// One parsed file tracked by the session.
#[derive(Debug)]
pub struct File {
    pub id: FileId,
    pub uri: String,
    pub tree: SyntaxTree,
    pub errors: Vec<ParseError>,
}

impl File {
    /// Import path strings, in source order.
    pub fn imports(&self) -> Vec<String> {
        let tree = &self.tree;
        let mut out = Vec::new();
        for node in tree.named_children(tree.root()) {
            if tree.kind(node) != SyntaxKind::Import {
                continue;
            }
            if let Some(path) = tree.child_by_field(node, Field::Path) {
                out.push(tree.text(path).trim_matches('"').to_owned());
            }
        }
        out
    }

    fn directory(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[..pos],
            None => "",
        }
    }
}

#[derive(Debug, Default)]
struct Caches {
    /// Expression and declaration types, filled per whole-declaration pass.
    types: FxHashMap<(FileId, NodeId), Ty>,
    /// Reference resolutions recorded by the same passes.
    resolved: FxHashMap<(FileId, NodeId), Vec<Decl>>,
    /// Function types, pre-seeded with `Unknown` while a pass runs so
    /// recursive calls terminate.
    fn_types: FxHashMap<Decl, Ty>,
    /// Converted type nodes, same placeholder discipline.
    type_nodes: FxHashMap<(FileId, NodeId), Ty>,
    /// Declarations whose pass has started; doubles as the running-pass
    /// placeholder.
    inferred: FxHashSet<Decl>,
    const_values: FxHashMap<Decl, ConstValue>,
    /// Constants currently being folded; re-entry yields `Unknown`.
    const_stack: FxHashSet<Decl>,
}

/// Analysis session over a fixed set of roots.
#[derive(Debug)]
pub struct Session {
    files: Vec<File>,
    by_uri: FxHashMap<String, FileId>,
    index: ProjectIndex,
    stdlib_common: Option<FileId>,
    stubs: Option<FileId>,
    caches: RefCell<Caches>,
}

impl Session {
    pub fn new(stdlib_base: &str, stubs_base: &str, workspace_base: &str) -> Session {
        Session {
            files: Vec::new(),
            by_uri: FxHashMap::default(),
            index: ProjectIndex::new(stdlib_base, stubs_base, workspace_base),
            stdlib_common: None,
            stubs: None,
            caches: RefCell::new(Caches::default()),
        }
    }

    // ── File management ──────────────────────────────────────────────────

    /// Parse `text` and register it under `uri`, replacing any previous
    /// version. Every cache is dropped.
    pub fn add_file(&mut self, uri: &str, text: &str) -> FileId {
        let parse = parse_file(text);
        let id = match self.by_uri.get(uri) {
            Some(&existing) => {
                let slot = &mut self.files[existing.0 as usize];
                slot.tree = parse.tree;
                slot.errors = parse.errors;
                existing
            }
            None => {
                let id = FileId(self.files.len() as u32);
                self.files.push(File {
                    id,
                    uri: uri.to_owned(),
                    tree: parse.tree,
                    errors: parse.errors,
                });
                self.by_uri.insert(uri.to_owned(), id);
                id
            }
        };
        let file = &self.files[id.0 as usize];
        self.index.add_file(uri, id, FileIndex::build(&file.tree, id));
        self.note_special_files(uri, id);
        self.caches.replace(Caches::default());
        id
    }

    /// Replace the text of an already-registered file.
    pub fn file_changed(&mut self, uri: &str, text: &str) -> FileId {
        self.add_file(uri, text)
    }

    pub fn remove_file(&mut self, uri: &str) {
        if let Some(id) = self.by_uri.remove(uri) {
            self.index.remove_file(uri);
            if self.stdlib_common == Some(id) {
                self.stdlib_common = None;
            }
            if self.stubs == Some(id) {
                self.stubs = None;
            }
            // The file slot stays allocated; ids are never reused.
            self.caches.replace(Caches::default());
        }
    }

    fn note_special_files(&mut self, uri: &str, id: FileId) {
        if uri == format!("{}/common.slate", self.index.stdlib.base().trim_end_matches('/')) {
            self.stdlib_common = Some(id);
        }
        if self.index.stubs.contains(uri) && uri.ends_with("stubs.slate") {
            self.stubs = Some(id);
        }
    }

    pub fn file(&self, id: FileId) -> Option<&File> {
        let file = self.files.get(id.0 as usize)?;
        if self.by_uri.get(&file.uri) == Some(&id) {
            Some(file)
        } else {
            None
        }
    }

    pub fn file_by_uri(&self, uri: &str) -> Option<&File> {
        self.by_uri.get(uri).and_then(|&id| self.file(id))
    }

    pub fn index(&self) -> &ProjectIndex {
        &self.index
    }

    pub fn file_index(&self, id: FileId) -> Option<&FileIndex> {
        let file = self.file(id)?;
        self.index.root_for(&file.uri).index_of(id)
    }

    /// The implicitly visible stdlib file.
    pub fn stdlib_common_file(&self) -> Option<FileId> {
        self.stdlib_common
    }

    /// The implicitly visible compiler stubs file.
    pub fn stubs_file(&self) -> Option<FileId> {
        self.stubs
    }

    /// Files reachable through `import` directives, resolved against the
    /// importing file's location. `@stdlib/` paths rebase onto the stdlib
    /// root; a missing `.slate` extension is appended.
    pub fn imported_files(&self, id: FileId) -> Vec<FileId> {
        let Some(file) = self.file(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for raw in file.imports() {
            let mut path = if let Some(rest) = raw.strip_prefix("@stdlib/") {
                format!("{}/{}", self.index.stdlib.base().trim_end_matches('/'), rest)
            } else if raw.starts_with('/') {
                raw
            } else {
                format!("{}/{}", file.directory(), raw)
            };
            if !path.ends_with(".slate") {
                path.push_str(".slate");
            }
            if let Some(&target) = self.by_uri.get(&path) {
                out.push(target);
            }
        }
        out
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// The inferred type of any expression or declaration node. Runs the
    /// owning declaration's pass on a cache miss.
    pub fn type_of(&self, file: FileId, node: NodeId) -> Ty {
        self.ensure_inferred_at(file, node);
        self.caches
            .borrow()
            .types
            .get(&(file, node))
            .cloned()
            .unwrap_or(Ty::Unknown)
    }

    /// Resolve the reference at `node` to its declaration.
    pub fn resolve(&self, file: FileId, node: NodeId) -> Option<Decl> {
        resolve::resolve(self, file, node)
    }

    /// Like [`Session::resolve`] but keeps every candidate, for ambiguous
    /// names.
    pub fn multi_resolve(&self, file: FileId, node: NodeId) -> Vec<Decl> {
        resolve::multi_resolve(self, file, node)
    }

    pub fn element_by_name(&self, key: IndexKey, name: &str) -> Option<Decl> {
        self.index.element_by_name(key, name)
    }

    pub fn has_several_declarations(&self, name: &str) -> bool {
        self.index.has_several_declarations(name)
    }

    /// Fold a constant declaration's initializer, breaking recursion via
    /// the visiting set.
    pub fn evaluate_constant(&self, decl: Decl) -> ConstValue {
        if let Some(cached) = self.caches.borrow().const_values.get(&decl) {
            return cached.clone();
        }
        if !self.caches.borrow_mut().const_stack.insert(decl) {
            return ConstValue::Unknown;
        }
        let value = match self.file(decl.file).and_then(|f| decl.value_node(&f.tree)) {
            Some(v) => consts::evaluate(self, decl.file, v),
            None => ConstValue::Unknown,
        };
        let mut caches = self.caches.borrow_mut();
        caches.const_stack.remove(&decl);
        caches.const_values.insert(decl, value.clone());
        value
    }

    // ── Declaration types ────────────────────────────────────────────────

    /// The type a read of `decl` yields.
    pub fn decl_ty(&self, decl: Decl) -> Ty {
        match decl.kind {
            _ if decl.is_function_like() => self.function_ty(decl),
            DeclKind::Struct | DeclKind::Enum | DeclKind::TypeAlias | DeclKind::TypeParam => {
                named_decl_ty(self, decl)
            }
            _ => {
                self.ensure_inferred_at(decl.file, decl.node);
                self.caches
                    .borrow()
                    .types
                    .get(&(decl.file, decl.node))
                    .cloned()
                    .unwrap_or(Ty::Unknown)
            }
        }
    }

    /// The function type of a function-like declaration, with an `Unknown`
    /// placeholder while its own pass is still computing it.
    pub fn function_ty(&self, decl: Decl) -> Ty {
        if let Some(cached) = self.caches.borrow().fn_types.get(&decl) {
            return cached.clone();
        }
        self.caches
            .borrow_mut()
            .fn_types
            .insert(decl, Ty::Unknown);
        self.ensure_inferred(decl);
        self.caches
            .borrow()
            .fn_types
            .get(&decl)
            .cloned()
            .unwrap_or(Ty::Unknown)
    }

    /// Follow an alias chain to the struct or enum it ultimately names.
    pub fn alias_target_decl(&self, decl: Decl) -> Option<Decl> {
        let mut current = decl;
        // Alias chains are short; the bound only guards cycles.
        for _ in 0..16 {
            if current.kind != DeclKind::TypeAlias {
                return Some(current);
            }
            let file = self.file(current.file)?;
            let tree = &file.tree;
            let target = current.type_node(tree)?;
            let name_node = match tree.kind(target) {
                SyntaxKind::NamedType => tree.child_by_field(target, Field::Name)?,
                SyntaxKind::InstantiationType => tree.child_by_field(target, Field::Name)?,
                _ => return None,
            };
            let state = resolve::ResolveState::named(tree.text(name_node), true);
            current = resolve::resolve_unqualified(self, current.file, name_node, &state)?;
        }
        None
    }

    // ── Pass plumbing ────────────────────────────────────────────────────

    /// Run the inference pass owning `node`, unless it already ran.
    pub(crate) fn ensure_inferred_at(&self, file: FileId, node: NodeId) {
        let Some(f) = self.file(file) else { return };
        let tree = &f.tree;
        let mut current = Some(node);
        while let Some(n) = current {
            if CACHE_OWNER_KINDS.contains(&tree.kind(n)) {
                if let Some(decl) = Decl::of(tree, file, n) {
                    self.ensure_inferred(decl);
                }
                return;
            }
            current = tree.parent(n);
        }
    }

    pub(crate) fn ensure_inferred(&self, decl: Decl) {
        if !self.caches.borrow_mut().inferred.insert(decl) {
            return;
        }
        let result = infer::infer_decl(self, decl);
        let mut caches = self.caches.borrow_mut();
        for (node, ty) in result.expr_types {
            caches.types.insert((decl.file, node), ty);
        }
        for (node, decls) in result.resolved {
            caches.resolved.insert((decl.file, node), decls);
        }
        if let Some(fn_ty) = result.fn_ty {
            caches.fn_types.insert(decl, fn_ty);
        }
    }

    pub(crate) fn resolved_cache(&self, file: FileId, node: NodeId) -> Vec<Decl> {
        self.caches
            .borrow()
            .resolved
            .get(&(file, node))
            .cloned()
            .unwrap_or_default()
    }

    pub(crate) fn cached_type_node(&self, file: FileId, node: NodeId) -> Option<Ty> {
        self.caches.borrow().type_nodes.get(&(file, node)).cloned()
    }

    pub(crate) fn cache_type_node(&self, file: FileId, node: NodeId, ty: Ty) {
        self.caches.borrow_mut().type_nodes.insert((file, node), ty);
    }
}
