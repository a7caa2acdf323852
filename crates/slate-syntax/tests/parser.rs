//! Parser integration tests: tree shape, error tolerance, and the
//! comparison-versus-instantiation ambiguity.

use slate_syntax::{parse_file, SyntaxKind};

/// Parse and assert the input produced no errors.
fn parse_ok(text: &str) -> slate_syntax::Parse {
    let parse = parse_file(text);
    assert!(
        parse.errors.is_empty(),
        "unexpected parse errors: {:?}",
        parse.errors
    );
    parse
}

fn count_kind(parse: &slate_syntax::Parse, kind: SyntaxKind) -> usize {
    (0..parse.tree.len())
        .filter(|&i| parse.tree.kind(slate_syntax::NodeId(i as u32)) == kind)
        .count()
}

#[test]
fn constant_declaration() {
    let parse = parse_ok("const A = 1;");
    insta::assert_snapshot!(parse.tree.dump(), @r#"
    SourceFile
      ConstDecl
        ConstKw "const"
        Name (Name)
          Ident "A"
        Eq "="
        Literal (Value)
          IntNumber "1"
        Semicolon ";"
    "#);
}

#[test]
fn nullable_and_union_types() {
    let parse = parse_ok("global g: int | slice?;");
    insta::assert_snapshot!(parse.tree.dump(), @r#"
    SourceFile
      GlobalVarDecl
        GlobalKw "global"
        Name (Name)
          Ident "g"
        Colon ":"
        UnionType (Type)
          NamedType
            Name (Name)
              Ident "int"
          Pipe "|"
          NullableType
            NamedType (Operand)
              Name (Name)
                Ident "slice"
            Question "?"
        Semicolon ";"
    "#);
}

#[test]
fn function_with_body() {
    let parse = parse_ok("fun main(): int { return 0; }");
    assert_eq!(count_kind(&parse, SyntaxKind::FunctionDecl), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::ReturnStmt), 1);
}

#[test]
fn method_with_receiver() {
    let parse = parse_ok("fun Point.len(self): int { return 0; }");
    assert_eq!(count_kind(&parse, SyntaxKind::MethodDecl), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::FunctionDecl), 0);
}

#[test]
fn generic_receiver() {
    let parse = parse_ok("fun Box<T>.get(self): T { return self.value; }");
    assert_eq!(count_kind(&parse, SyntaxKind::MethodDecl), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::InstantiationType), 1);
}

#[test]
fn instantiation_vs_comparison() {
    let parse = parse_ok("fun f() { val x = make<int>(); val y = a < b; }");
    assert_eq!(count_kind(&parse, SyntaxKind::GenericInstantiation), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::BinaryExpr), 1);
}

#[test]
fn nested_generic_close() {
    // The `>>` at the end must split into two closing `>`.
    let parse = parse_ok("type Pairs<K> = Box<Box<K>>;");
    assert_eq!(count_kind(&parse, SyntaxKind::InstantiationType), 2);
}

#[test]
fn destructuring_declarations() {
    let parse = parse_ok("fun f() { var (a, b) = pair(); val [x, y] = t; }");
    assert_eq!(count_kind(&parse, SyntaxKind::VarTensor), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::VarTuple), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::VarDef), 4);
}

#[test]
fn match_with_type_arms() {
    let parse = parse_ok("fun f(x: int | slice) { match (x) { int => 1, slice => 2, else => 3 } }");
    assert_eq!(count_kind(&parse, SyntaxKind::MatchExpr), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::MatchArm), 3);
}

#[test]
fn garbage_still_yields_a_tree() {
    let parse = parse_file("fun ) struct ^^ {");
    assert_eq!(parse.tree.kind(parse.tree.root()), SyntaxKind::SourceFile);
    assert!(!parse.errors.is_empty());
}

#[test]
fn struct_literal_and_shorthand() {
    let parse = parse_ok("fun f(a: int) { val p = Pair { a, b: 2 }; }");
    assert_eq!(count_kind(&parse, SyntaxKind::StructLit), 1);
    assert_eq!(count_kind(&parse, SyntaxKind::StructLitField), 2);
}
