//! Symbol indexes.
//!
//! [`FileIndex`] buckets the top-level declarations of one file by
//! [`IndexKey`]; it is rebuilt wholesale when the file changes. Roots keep
//! their files in insertion order with a uri map for O(1) lookup, and the
//! [`ProjectIndex`] iterates them in priority order: stdlib, stubs, then
//! workspace.

use rustc_hash::FxHashMap;
use slate_common::FileId;
use slate_syntax::{SyntaxKind, SyntaxTree};

use crate::decl::Decl;

/// Bucket selector for indexed declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKey {
    GlobalVars,
    Constants,
    TypeAliases,
    Functions,
    Methods,
    GetMethods,
    Structs,
    Enums,
}

pub const ALL_KEYS: [IndexKey; 8] = [
    IndexKey::GlobalVars,
    IndexKey::Constants,
    IndexKey::TypeAliases,
    IndexKey::Functions,
    IndexKey::Methods,
    IndexKey::GetMethods,
    IndexKey::Structs,
    IndexKey::Enums,
];

/// One indexed declaration with its name captured at build time, so lookups
/// never need the owning tree.
#[derive(Debug, Clone)]
pub struct IndexedDecl {
    pub name: String,
    /// Receiver type text for methods (`fun Point.len` stores `"Point"`).
    pub receiver: Option<String>,
    pub decl: Decl,
}

/// Kind-bucketed declarations of a single file.
#[derive(Debug, Default)]
pub struct FileIndex {
    buckets: FxHashMap<IndexKey, Vec<IndexedDecl>>,
}

impl FileIndex {
    /// Scan the top level of `tree` and bucket every declaration.
    pub fn build(tree: &SyntaxTree, file: FileId) -> FileIndex {
        let mut index = FileIndex::default();
        for node in tree.named_children(tree.root()) {
            let key = match tree.kind(node) {
                SyntaxKind::FunctionDecl => IndexKey::Functions,
                SyntaxKind::MethodDecl => IndexKey::Methods,
                SyntaxKind::GetMethodDecl => IndexKey::GetMethods,
                SyntaxKind::StructDecl => IndexKey::Structs,
                SyntaxKind::EnumDecl => IndexKey::Enums,
                SyntaxKind::TypeAliasDecl => IndexKey::TypeAliases,
                SyntaxKind::ConstDecl => IndexKey::Constants,
                SyntaxKind::GlobalVarDecl => IndexKey::GlobalVars,
                _ => continue,
            };
            let Some(decl) = Decl::of(tree, file, node) else {
                continue;
            };
            let Some(name) = decl.name(tree) else {
                continue;
            };
            index.buckets.entry(key).or_default().push(IndexedDecl {
                name: name.to_owned(),
                receiver: decl.receiver_text(tree).map(str::to_owned),
                decl,
            });
        }
        index
    }

    pub fn decls(&self, key: IndexKey) -> &[IndexedDecl] {
        self.buckets.get(&key).map_or(&[], Vec::as_slice)
    }
}

/// Which corner of the project a root covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootKind {
    Stdlib,
    Stubs,
    Workspace,
}

#[derive(Debug)]
struct RootEntry {
    uri: String,
    file: FileId,
    index: FileIndex,
}

/// A collection of indexed files under one base uri, kept in the order the
/// files were added.
#[derive(Debug)]
pub struct IndexRoot {
    pub kind: RootKind,
    base: String,
    entries: Vec<RootEntry>,
    by_uri: FxHashMap<String, usize>,
}

impl IndexRoot {
    pub fn new(kind: RootKind, base: impl Into<String>) -> IndexRoot {
        IndexRoot {
            kind,
            base: base.into(),
            entries: Vec::new(),
            by_uri: FxHashMap::default(),
        }
    }

    /// Prefix containment test against the root's base uri.
    pub fn contains(&self, uri: &str) -> bool {
        uri.starts_with(&self.base)
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    fn set_file(&mut self, uri: &str, file: FileId, index: FileIndex) {
        match self.by_uri.get(uri) {
            Some(&slot) => {
                self.entries[slot] = RootEntry {
                    uri: uri.to_owned(),
                    file,
                    index,
                };
            }
            None => {
                self.by_uri.insert(uri.to_owned(), self.entries.len());
                self.entries.push(RootEntry {
                    uri: uri.to_owned(),
                    file,
                    index,
                });
            }
        }
    }

    fn remove_file(&mut self, uri: &str) {
        if let Some(slot) = self.by_uri.remove(uri) {
            self.entries.remove(slot);
            for (i, entry) in self.entries.iter().enumerate() {
                self.by_uri.insert(entry.uri.clone(), i);
            }
        }
    }

    /// File ids in insertion order.
    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.entries.iter().map(|e| e.file)
    }

    pub fn file_by_uri(&self, uri: &str) -> Option<FileId> {
        self.by_uri.get(uri).map(|&slot| self.entries[slot].file)
    }

    pub fn index_of(&self, file: FileId) -> Option<&FileIndex> {
        self.entries.iter().find(|e| e.file == file).map(|e| &e.index)
    }

    /// Iterate one bucket across every file of the root.
    pub fn decls(&self, key: IndexKey) -> impl Iterator<Item = &IndexedDecl> + '_ {
        self.entries.iter().flat_map(move |e| e.index.decls(key).iter())
    }
}

/// All roots of a session in priority order.
#[derive(Debug)]
pub struct ProjectIndex {
    pub stdlib: IndexRoot,
    pub stubs: IndexRoot,
    pub workspace: Vec<IndexRoot>,
}

impl ProjectIndex {
    pub fn new(stdlib_base: &str, stubs_base: &str, workspace_base: &str) -> ProjectIndex {
        ProjectIndex {
            stdlib: IndexRoot::new(RootKind::Stdlib, stdlib_base),
            stubs: IndexRoot::new(RootKind::Stubs, stubs_base),
            workspace: vec![IndexRoot::new(RootKind::Workspace, workspace_base)],
        }
    }

    /// Roots in lookup priority order: stdlib, stubs, then workspace.
    pub fn all_roots(&self) -> impl Iterator<Item = &IndexRoot> + '_ {
        std::iter::once(&self.stdlib)
            .chain(std::iter::once(&self.stubs))
            .chain(self.workspace.iter())
    }

    /// The first root whose base contains `uri`; non-matching uris land in
    /// the first workspace root.
    fn root_for_mut(&mut self, uri: &str) -> &mut IndexRoot {
        if self.stdlib.contains(uri) {
            return &mut self.stdlib;
        }
        if self.stubs.contains(uri) {
            return &mut self.stubs;
        }
        if let Some(pos) = self.workspace.iter().position(|r| r.contains(uri)) {
            return &mut self.workspace[pos];
        }
        &mut self.workspace[0]
    }

    pub fn root_for(&self, uri: &str) -> &IndexRoot {
        if self.stdlib.contains(uri) {
            return &self.stdlib;
        }
        if self.stubs.contains(uri) {
            return &self.stubs;
        }
        self.workspace
            .iter()
            .find(|r| r.contains(uri))
            .unwrap_or(&self.workspace[0])
    }

    pub fn add_file(&mut self, uri: &str, file: FileId, index: FileIndex) {
        self.root_for_mut(uri).set_file(uri, file, index);
    }

    pub fn remove_file(&mut self, uri: &str) {
        self.root_for_mut(uri).remove_file(uri);
    }

    /// First declaration with `name` in `key` buckets, searching roots in
    /// priority order.
    pub fn element_by_name(&self, key: IndexKey, name: &str) -> Option<Decl> {
        for root in self.all_roots() {
            if let Some(found) = root.decls(key).find(|d| d.name == name) {
                return Some(found.decl);
            }
        }
        None
    }

    /// Whether `name` is declared more than once across all roots and kinds.
    pub fn has_several_declarations(&self, name: &str) -> bool {
        let mut seen = 0;
        for root in self.all_roots() {
            for key in ALL_KEYS {
                for d in root.decls(key) {
                    if d.name == name {
                        seen += 1;
                        if seen > 1 {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }
}
