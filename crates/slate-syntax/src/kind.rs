//! Syntax kinds for the Slate grammar.
//!
//! A single [`SyntaxKind`] enum covers both tokens produced by the lexer and
//! composite nodes produced by the parser. [`Field`] tags mark the role a
//! child plays inside its parent (condition, value, receiver, ...), so
//! consumers can navigate by role instead of position.

/// Kinds of tokens and nodes in a Slate syntax tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u16)]
pub enum SyntaxKind {
    // ── Tokens ───────────────────────────────────────────────────────────
    Eof,
    ErrorToken,
    Ident,
    IntNumber,
    StringLit,
    Underscore,

    ImportKw,
    FunKw,
    GetKw,
    StructKw,
    EnumKw,
    TypeKw,
    ConstKw,
    GlobalKw,
    BuiltinKw,
    ValKw,
    VarKw,
    IfKw,
    ElseKw,
    WhileKw,
    DoKw,
    RepeatKw,
    ReturnKw,
    ThrowKw,
    AssertKw,
    TryKw,
    CatchKw,
    BreakKw,
    ContinueKw,
    MatchKw,
    IsKw,
    NotIsKw,
    AsKw,
    TrueKw,
    FalseKw,
    NullKw,

    LParen,
    RParen,
    LBrace,
    RBrace,
    LBrack,
    RBrack,
    Lt,
    Gt,
    LtEq,
    GtEq,
    Spaceship,
    Comma,
    Semicolon,
    Colon,
    Dot,
    Arrow,
    FatArrow,
    Question,
    QuestionQuestion,
    Bang,
    Tilde,
    Eq,
    EqEq,
    BangEq,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Amp,
    AmpAmp,
    Pipe,
    PipePipe,
    Caret,
    Shl,
    Shr,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    PercentEq,
    AmpEq,
    PipeEq,
    CaretEq,
    ShlEq,
    ShrEq,

    // ── Nodes ────────────────────────────────────────────────────────────
    SourceFile,
    Import,
    FunctionDecl,
    MethodDecl,
    GetMethodDecl,
    StructDecl,
    FieldDecl,
    EnumDecl,
    EnumMember,
    TypeAliasDecl,
    ConstDecl,
    GlobalVarDecl,
    Name,
    ParameterList,
    Parameter,
    TypeParameterList,
    TypeParameter,
    TypeArgList,

    NamedType,
    NullableType,
    UnionType,
    TensorType,
    TupleType,
    FunType,
    ParenType,
    InstantiationType,
    BuiltinType,

    Block,
    VarStmt,
    VarDef,
    VarTensor,
    VarTuple,
    IfStmt,
    WhileStmt,
    DoWhileStmt,
    RepeatStmt,
    ReturnStmt,
    ThrowStmt,
    AssertStmt,
    TryStmt,
    CatchClause,
    BreakStmt,
    ContinueStmt,
    ExprStmt,

    Literal,
    RefExpr,
    ParenExpr,
    TensorExpr,
    TupleExpr,
    DotExpr,
    CallExpr,
    ArgList,
    BinaryExpr,
    AssignExpr,
    CompoundAssignExpr,
    UnaryExpr,
    IsExpr,
    AsExpr,
    NotNullExpr,
    TernaryExpr,
    StructLit,
    StructLitField,
    GenericInstantiation,
    MatchExpr,
    MatchArm,

    Error,
}

impl SyntaxKind {
    /// Whether this kind is produced by the lexer (a leaf in the tree).
    pub fn is_token(self) -> bool {
        self < SyntaxKind::SourceFile
    }

    /// Whether this kind is one of the literal-bearing tokens.
    pub fn is_literal_token(self) -> bool {
        matches!(
            self,
            SyntaxKind::IntNumber
                | SyntaxKind::StringLit
                | SyntaxKind::TrueKw
                | SyntaxKind::FalseKw
                | SyntaxKind::NullKw
        )
    }

    /// Whether this kind is a top-level or nested declaration node.
    pub fn is_decl(self) -> bool {
        matches!(
            self,
            SyntaxKind::FunctionDecl
                | SyntaxKind::MethodDecl
                | SyntaxKind::GetMethodDecl
                | SyntaxKind::StructDecl
                | SyntaxKind::FieldDecl
                | SyntaxKind::EnumDecl
                | SyntaxKind::EnumMember
                | SyntaxKind::TypeAliasDecl
                | SyntaxKind::ConstDecl
                | SyntaxKind::GlobalVarDecl
                | SyntaxKind::Parameter
                | SyntaxKind::TypeParameter
                | SyntaxKind::VarDef
        )
    }

    /// Whether this kind is a type node.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            SyntaxKind::NamedType
                | SyntaxKind::NullableType
                | SyntaxKind::UnionType
                | SyntaxKind::TensorType
                | SyntaxKind::TupleType
                | SyntaxKind::FunType
                | SyntaxKind::ParenType
                | SyntaxKind::InstantiationType
                | SyntaxKind::BuiltinType
        )
    }

    /// Keyword kind for an identifier-shaped word, if it is reserved.
    pub fn from_keyword(word: &str) -> Option<SyntaxKind> {
        let kind = match word {
            "import" => SyntaxKind::ImportKw,
            "fun" => SyntaxKind::FunKw,
            "get" => SyntaxKind::GetKw,
            "struct" => SyntaxKind::StructKw,
            "enum" => SyntaxKind::EnumKw,
            "type" => SyntaxKind::TypeKw,
            "const" => SyntaxKind::ConstKw,
            "global" => SyntaxKind::GlobalKw,
            "builtin" => SyntaxKind::BuiltinKw,
            "val" => SyntaxKind::ValKw,
            "var" => SyntaxKind::VarKw,
            "if" => SyntaxKind::IfKw,
            "else" => SyntaxKind::ElseKw,
            "while" => SyntaxKind::WhileKw,
            "do" => SyntaxKind::DoKw,
            "repeat" => SyntaxKind::RepeatKw,
            "return" => SyntaxKind::ReturnKw,
            "throw" => SyntaxKind::ThrowKw,
            "assert" => SyntaxKind::AssertKw,
            "try" => SyntaxKind::TryKw,
            "catch" => SyntaxKind::CatchKw,
            "break" => SyntaxKind::BreakKw,
            "continue" => SyntaxKind::ContinueKw,
            "match" => SyntaxKind::MatchKw,
            "is" => SyntaxKind::IsKw,
            "as" => SyntaxKind::AsKw,
            "true" => SyntaxKind::TrueKw,
            "false" => SyntaxKind::FalseKw,
            "null" => SyntaxKind::NullKw,
            _ => return None,
        };
        Some(kind)
    }
}

/// Role of a child node within its parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Type,
    Value,
    Default,
    Condition,
    Then,
    Else,
    Body,
    Lhs,
    Rhs,
    Operand,
    Qualifier,
    FieldName,
    Callee,
    Receiver,
    ReturnType,
    Backing,
    Subject,
    Pattern,
    Count,
    ExcNo,
    CaughtErr,
    CaughtArg,
    Path,
}
