//! Top-level declaration parsers: imports, functions and methods, structs,
//! enums, type aliases, constants and globals.

use crate::kind::{Field, SyntaxKind};

use super::statements::block;
use super::types::{type_expr, type_parameter_list};
use super::{expr, Parser};

pub(crate) fn source_file(p: &mut Parser) {
    let m = p.open();
    while !p.at_eof() {
        match p.current() {
            SyntaxKind::ImportKw => import(p),
            SyntaxKind::FunKw => function(p, false),
            SyntaxKind::GetKw => function(p, true),
            SyntaxKind::StructKw => struct_decl(p),
            SyntaxKind::EnumKw => enum_decl(p),
            SyntaxKind::TypeKw => type_alias(p),
            SyntaxKind::ConstKw => const_decl(p),
            SyntaxKind::GlobalKw => global_decl(p),
            SyntaxKind::Semicolon => p.advance(),
            _ => p.advance_with_error("expected a declaration"),
        }
    }
    p.close(m, SyntaxKind::SourceFile);
}

/// `import "path";`
fn import(p: &mut Parser) {
    let m = p.open();
    p.advance(); // import
    if p.at(SyntaxKind::StringLit) {
        let lit = p.open();
        p.advance();
        let lit = p.close(lit, SyntaxKind::Literal);
        p.tag(lit, Field::Path);
    } else {
        p.error("expected import path string");
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::Import);
}

/// Parse `name` as a NAME node tagged with `field`.
pub(super) fn name(p: &mut Parser, field: Field) -> bool {
    if p.at(SyntaxKind::Ident) {
        let m = p.open();
        p.advance();
        let m = p.close(m, SyntaxKind::Name);
        p.tag(m, field);
        true
    } else {
        false
    }
}

/// Function, method (`fun Receiver.name`) or get-method declaration.
///
/// The receiver is recognized speculatively: parse a type, and commit to the
/// method form only if a `.` follows.
fn function(p: &mut Parser, is_get: bool) {
    let m = p.open();
    if is_get {
        p.advance(); // get
        if !p.eat(SyntaxKind::FunKw) {
            p.error("expected `fun` after `get`");
        }
        if !name(p, Field::Name) {
            p.error("expected get method name");
        }
        function_tail(p);
        p.close(m, SyntaxKind::GetMethodDecl);
        return;
    }

    p.advance(); // fun

    let mut is_method = false;
    if p.at(SyntaxKind::Ident) || p.current().is_literal_token() {
        let cp = p.checkpoint();
        let receiver = type_expr(p);
        if let Some(receiver) = receiver {
            if p.at(SyntaxKind::Dot) {
                p.tag(receiver, Field::Receiver);
                p.advance(); // .
                is_method = true;
            } else {
                p.rollback(cp);
            }
        } else {
            p.rollback(cp);
        }
    }

    if !name(p, Field::Name) {
        p.error("expected function name");
    }
    function_tail(p);
    p.close(
        m,
        if is_method {
            SyntaxKind::MethodDecl
        } else {
            SyntaxKind::FunctionDecl
        },
    );
}

/// Type parameters, parameter list, return type and body shared by all
/// function forms.
fn function_tail(p: &mut Parser) {
    if p.at(SyntaxKind::Lt) {
        type_parameter_list(p);
    }
    if p.at(SyntaxKind::LParen) {
        parameter_list(p);
    } else {
        p.error("expected parameter list");
    }
    if p.eat(SyntaxKind::Colon) {
        if let Some(ret) = type_expr(p) {
            p.tag(ret, Field::ReturnType);
        } else {
            p.error("expected return type");
        }
    }
    match p.current() {
        SyntaxKind::LBrace => {
            let body = block(p);
            p.tag(body, Field::Body);
        }
        // Body-less declarations (builtin and assembly stubs).
        SyntaxKind::Semicolon => p.advance(),
        _ => p.error("expected function body or `;`"),
    }
}

fn parameter_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // (
    while !p.at(SyntaxKind::RParen) && !p.at_eof() {
        parameter(p);
        if !p.at(SyntaxKind::RParen) && !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect(SyntaxKind::RParen);
    p.close(m, SyntaxKind::ParameterList);
}

/// `name: Ty = default`; a bare `self` carries no type annotation.
fn parameter(p: &mut Parser) {
    let m = p.open();
    if !name(p, Field::Name) {
        p.advance_with_error("expected parameter name");
        p.close(m, SyntaxKind::Parameter);
        return;
    }
    if p.eat(SyntaxKind::Colon) {
        match type_expr(p) {
            Some(ty) => p.tag(ty, Field::Type),
            None => p.error("expected parameter type"),
        }
    }
    if p.eat(SyntaxKind::Eq) {
        let value = expr(p);
        if let Some(value) = value {
            p.tag(value, Field::Default);
        }
    }
    p.close(m, SyntaxKind::Parameter);
}

/// `struct Name<T> { field: Ty = default; ... }`
fn struct_decl(p: &mut Parser) {
    let m = p.open();
    p.advance(); // struct
    if !name(p, Field::Name) {
        p.error("expected struct name");
    }
    if p.at(SyntaxKind::Lt) {
        type_parameter_list(p);
    }
    if p.eat(SyntaxKind::LBrace) {
        while !p.at(SyntaxKind::RBrace) && !p.at_eof() {
            if p.at(SyntaxKind::Ident) {
                field_decl(p);
            } else {
                p.advance_with_error("expected struct field");
            }
            while p.eat(SyntaxKind::Semicolon) || p.eat(SyntaxKind::Comma) {}
        }
        p.expect(SyntaxKind::RBrace);
    } else {
        p.error("expected struct body");
    }
    p.close(m, SyntaxKind::StructDecl);
}

fn field_decl(p: &mut Parser) {
    let m = p.open();
    name(p, Field::Name);
    if p.eat(SyntaxKind::Colon) {
        match type_expr(p) {
            Some(ty) => p.tag(ty, Field::Type),
            None => p.error("expected field type"),
        }
    } else {
        p.error("expected `:` after field name");
    }
    if p.eat(SyntaxKind::Eq) {
        if let Some(value) = expr(p) {
            p.tag(value, Field::Default);
        }
    }
    p.close(m, SyntaxKind::FieldDecl);
}

/// `enum Name : backing { A = 1, B }`
fn enum_decl(p: &mut Parser) {
    let m = p.open();
    p.advance(); // enum
    if !name(p, Field::Name) {
        p.error("expected enum name");
    }
    if p.eat(SyntaxKind::Colon) {
        match type_expr(p) {
            Some(backing) => p.tag(backing, Field::Backing),
            None => p.error("expected backing type"),
        }
    }
    if p.eat(SyntaxKind::LBrace) {
        while !p.at(SyntaxKind::RBrace) && !p.at_eof() {
            if p.at(SyntaxKind::Ident) {
                enum_member(p);
            } else {
                p.advance_with_error("expected enum member");
            }
            while p.eat(SyntaxKind::Comma) || p.eat(SyntaxKind::Semicolon) {}
        }
        p.expect(SyntaxKind::RBrace);
    } else {
        p.error("expected enum body");
    }
    p.close(m, SyntaxKind::EnumDecl);
}

fn enum_member(p: &mut Parser) {
    let m = p.open();
    name(p, Field::Name);
    if p.eat(SyntaxKind::Eq) {
        if let Some(value) = expr(p) {
            p.tag(value, Field::Value);
        }
    }
    p.close(m, SyntaxKind::EnumMember);
}

/// `type Name<T> = Ty;` — the right side may be the `builtin` keyword for
/// compiler-provided primitives.
fn type_alias(p: &mut Parser) {
    let m = p.open();
    p.advance(); // type
    if !name(p, Field::Name) {
        p.error("expected type alias name");
    }
    if p.at(SyntaxKind::Lt) {
        type_parameter_list(p);
    }
    p.expect(SyntaxKind::Eq);
    if p.at(SyntaxKind::BuiltinKw) {
        let b = p.open();
        p.advance();
        let b = p.close(b, SyntaxKind::BuiltinType);
        p.tag(b, Field::Type);
    } else {
        match type_expr(p) {
            Some(ty) => p.tag(ty, Field::Type),
            None => p.error("expected aliased type"),
        }
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::TypeAliasDecl);
}

/// `const NAME: Ty = expr;` — the annotation is optional.
fn const_decl(p: &mut Parser) {
    let m = p.open();
    p.advance(); // const
    if !name(p, Field::Name) {
        p.error("expected constant name");
    }
    if p.eat(SyntaxKind::Colon) {
        match type_expr(p) {
            Some(ty) => p.tag(ty, Field::Type),
            None => p.error("expected constant type"),
        }
    }
    p.expect(SyntaxKind::Eq);
    match expr(p) {
        Some(value) => p.tag(value, Field::Value),
        None => p.error("expected constant initializer"),
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::ConstDecl);
}

/// `global name: Ty;`
fn global_decl(p: &mut Parser) {
    let m = p.open();
    p.advance(); // global
    if !name(p, Field::Name) {
        p.error("expected global variable name");
    }
    if p.eat(SyntaxKind::Colon) {
        match type_expr(p) {
            Some(ty) => p.tag(ty, Field::Type),
            None => p.error("expected global variable type"),
        }
    } else {
        p.error("expected `:` after global variable name");
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::GlobalVarDecl);
}
