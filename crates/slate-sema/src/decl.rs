//! Named declarations.
//!
//! A [`Decl`] is a cheap copyable handle: the owning file, the node id of
//! the declaration and a [`DeclKind`] tag. All structure (name, type nodes,
//! parameters, fields) is read from the syntax tree on demand, so nothing
//! here holds references across passes.

use slate_common::FileId;
use slate_syntax::{Field, NodeId, SyntaxKind, SyntaxTree};

/// The closed set of declaration kinds the analyzer understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeclKind {
    Function,
    InstanceMethod,
    StaticMethod,
    GetMethod,
    Struct,
    Field,
    Enum,
    EnumMember,
    TypeAlias,
    TypeParam,
    Constant,
    GlobalVar,
    Parameter,
    Var,
}

/// A named declaration: `(file, node, kind)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Decl {
    pub file: FileId,
    pub node: NodeId,
    pub kind: DeclKind,
}

impl Decl {
    /// Classify `node` as a declaration, if it is one. Method declarations
    /// are split into instance and static by the presence of a `self`
    /// parameter.
    pub fn of(tree: &SyntaxTree, file: FileId, node: NodeId) -> Option<Decl> {
        let kind = match tree.kind(node) {
            SyntaxKind::FunctionDecl => DeclKind::Function,
            SyntaxKind::MethodDecl => {
                if has_self_param(tree, node) {
                    DeclKind::InstanceMethod
                } else {
                    DeclKind::StaticMethod
                }
            }
            SyntaxKind::GetMethodDecl => DeclKind::GetMethod,
            SyntaxKind::StructDecl => DeclKind::Struct,
            SyntaxKind::FieldDecl => DeclKind::Field,
            SyntaxKind::EnumDecl => DeclKind::Enum,
            SyntaxKind::EnumMember => DeclKind::EnumMember,
            SyntaxKind::TypeAliasDecl => DeclKind::TypeAlias,
            SyntaxKind::TypeParameter => DeclKind::TypeParam,
            SyntaxKind::ConstDecl => DeclKind::Constant,
            SyntaxKind::GlobalVarDecl => DeclKind::GlobalVar,
            SyntaxKind::Parameter => DeclKind::Parameter,
            SyntaxKind::VarDef => DeclKind::Var,
            _ => return None,
        };
        Some(Decl { file, node, kind })
    }

    /// Placeholder declaration for unit tests that need an anchor.
    #[cfg(test)]
    pub(crate) fn synthetic() -> Decl {
        Decl {
            file: FileId(u32::MAX),
            node: NodeId(u32::MAX),
            kind: DeclKind::TypeParam,
        }
    }

    /// The `Name` node of this declaration, if present.
    pub fn name_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Name)
    }

    pub fn name<'t>(&self, tree: &'t SyntaxTree) -> Option<&'t str> {
        self.name_node(tree).map(|n| tree.text(n))
    }

    /// The declared type annotation node (field type, parameter type,
    /// constant type, aliased type, ...).
    pub fn type_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Type)
    }

    /// Initializer / default value expression, where the kind has one.
    pub fn value_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Value)
            .or_else(|| tree.child_by_field(self.node, Field::Default))
    }

    pub fn is_function_like(&self) -> bool {
        matches!(
            self.kind,
            DeclKind::Function
                | DeclKind::InstanceMethod
                | DeclKind::StaticMethod
                | DeclKind::GetMethod
        )
    }

    // ── Function-like accessors ──────────────────────────────────────────

    /// Parameters in order. `skip_self` drops a leading `self`.
    pub fn parameters(&self, tree: &SyntaxTree, skip_self: bool) -> Vec<Decl> {
        let Some(list) = tree.child_of_kind(self.node, SyntaxKind::ParameterList) else {
            return Vec::new();
        };
        tree.children_of_kind(list, SyntaxKind::Parameter)
            .filter_map(|p| Decl::of(tree, self.file, p))
            .filter(|p| !(skip_self && p.name(tree) == Some("self")))
            .collect()
    }

    /// Declared `<T, U>` type parameters.
    pub fn type_parameters(&self, tree: &SyntaxTree) -> Vec<Decl> {
        let Some(list) = tree.child_of_kind(self.node, SyntaxKind::TypeParameterList) else {
            return Vec::new();
        };
        tree.children_of_kind(list, SyntaxKind::TypeParameter)
            .filter_map(|p| Decl::of(tree, self.file, p))
            .collect()
    }

    /// Receiver type node of a method (`fun Receiver.name`).
    pub fn receiver_type_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Receiver)
    }

    /// Source text of the receiver type, used for cheap receiver matching.
    pub fn receiver_text<'t>(&self, tree: &'t SyntaxTree) -> Option<&'t str> {
        self.receiver_type_node(tree).map(|n| tree.text(n))
    }

    /// Candidate type-parameter names implied by a generic receiver, e.g.
    /// `T` in `fun Box<T>.get(self)` or the whole of `fun T.copy(self)`.
    /// Callers filter out names that resolve to real types.
    pub fn receiver_type_param_candidates(&self, tree: &SyntaxTree) -> Vec<Decl> {
        let Some(receiver) = self.receiver_type_node(tree) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        match tree.kind(receiver) {
            SyntaxKind::NamedType => {
                out.push(Decl {
                    file: self.file,
                    node: receiver,
                    kind: DeclKind::TypeParam,
                });
            }
            SyntaxKind::InstantiationType => {
                if let Some(args) = tree.child_of_kind(receiver, SyntaxKind::TypeArgList) {
                    for arg in tree.children_of_kind(args, SyntaxKind::NamedType) {
                        out.push(Decl {
                            file: self.file,
                            node: arg,
                            kind: DeclKind::TypeParam,
                        });
                    }
                }
            }
            _ => {}
        }
        out
    }

    /// Return type annotation of a function-like declaration.
    pub fn return_type_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::ReturnType)
    }

    /// Body block of a function-like declaration. Builtin and asm stubs
    /// have none.
    pub fn body_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Body)
    }

    // ── Aggregate accessors ──────────────────────────────────────────────

    /// Fields of a struct, in declaration order.
    pub fn fields(&self, tree: &SyntaxTree) -> Vec<Decl> {
        tree.children_of_kind(self.node, SyntaxKind::FieldDecl)
            .filter_map(|f| Decl::of(tree, self.file, f))
            .collect()
    }

    /// Members of an enum, in declaration order.
    pub fn enum_members(&self, tree: &SyntaxTree) -> Vec<Decl> {
        tree.children_of_kind(self.node, SyntaxKind::EnumMember)
            .filter_map(|m| Decl::of(tree, self.file, m))
            .collect()
    }

    /// Backing type of an enum (`enum E : uint8`).
    pub fn backing_type_node(&self, tree: &SyntaxTree) -> Option<NodeId> {
        tree.child_by_field(self.node, Field::Backing)
    }

    /// Whether a type alias is declared as `= builtin`.
    pub fn is_builtin_alias(&self, tree: &SyntaxTree) -> bool {
        self.type_node(tree)
            .map(|t| tree.kind(t) == SyntaxKind::BuiltinType)
            .unwrap_or(false)
    }

    /// The struct or enum a field or member belongs to.
    pub fn owner(&self, tree: &SyntaxTree) -> Option<Decl> {
        let owner = tree.parent_of_kind(
            self.node,
            &[SyntaxKind::StructDecl, SyntaxKind::EnumDecl],
        )?;
        Decl::of(tree, self.file, owner)
    }
}

fn has_self_param(tree: &SyntaxTree, method: NodeId) -> bool {
    let Some(list) = tree.child_of_kind(method, SyntaxKind::ParameterList) else {
        return false;
    };
    tree.children_of_kind(list, SyntaxKind::Parameter).any(|p| {
        tree.child_by_field(p, Field::Name)
            .map(|n| tree.text(n) == "self")
            .unwrap_or(false)
    })
}

/// If `name_node` is the name of a declaration, the wrapped declaration.
pub fn decl_of_name(tree: &SyntaxTree, file: FileId, name_node: NodeId) -> Option<Decl> {
    if tree.kind(name_node) != SyntaxKind::Name {
        return None;
    }
    if tree.field(name_node) != Some(Field::Name) {
        return None;
    }
    let parent = tree.parent(name_node)?;
    Decl::of(tree, file, parent)
}

/// Node kinds that own a memoized whole-declaration inference pass.
pub const CACHE_OWNER_KINDS: &[SyntaxKind] = &[
    SyntaxKind::FunctionDecl,
    SyntaxKind::MethodDecl,
    SyntaxKind::GetMethodDecl,
    SyntaxKind::ConstDecl,
    SyntaxKind::GlobalVarDecl,
    SyntaxKind::StructDecl,
    SyntaxKind::EnumDecl,
    SyntaxKind::TypeAliasDecl,
];
