//! Type expression parsers.
//!
//! Handles named types, `T?`, unions `A | B`, tensors `(A, B)`, tuples
//! `[A, B]`, callable types `(A) -> R` and generic instantiations `Foo<T>`.

use crate::kind::{Field, SyntaxKind};

use super::items::name;
use super::{MarkerClosed, Parser};

/// Parse a type expression. Returns `None` without consuming anything when
/// the current token cannot start a type.
pub(crate) fn type_expr(p: &mut Parser) -> Option<MarkerClosed> {
    union_type(p)
}

/// `A | B | C` — members collected flat under one node.
fn union_type(p: &mut Parser) -> Option<MarkerClosed> {
    let first = postfix_type(p)?;
    if !p.at(SyntaxKind::Pipe) {
        return Some(first);
    }
    let m = p.open_before(first);
    while p.eat(SyntaxKind::Pipe) {
        if postfix_type(p).is_none() {
            p.error("expected type after `|`");
            break;
        }
    }
    Some(p.close(m, SyntaxKind::UnionType))
}

/// Postfix `?` for nullable types.
fn postfix_type(p: &mut Parser) -> Option<MarkerClosed> {
    let mut inner = primary_type(p)?;
    while p.at(SyntaxKind::Question) {
        let m = p.open_before(inner);
        p.tag(inner, Field::Operand);
        p.advance(); // ?
        inner = p.close(m, SyntaxKind::NullableType);
    }
    Some(inner)
}

fn primary_type(p: &mut Parser) -> Option<MarkerClosed> {
    match p.current() {
        SyntaxKind::Ident => {
            let m = p.open();
            name(p, Field::Name);
            if p.at(SyntaxKind::Lt) {
                type_arg_list(p);
                return Some(p.close(m, SyntaxKind::InstantiationType));
            }
            Some(p.close(m, SyntaxKind::NamedType))
        }
        SyntaxKind::NullKw => {
            let m = p.open();
            p.advance();
            Some(p.close(m, SyntaxKind::NamedType))
        }
        SyntaxKind::LParen => Some(paren_tensor_or_fun_type(p)),
        SyntaxKind::LBrack => Some(tuple_type(p)),
        _ => None,
    }
}

/// `(A)`, `(A, B)` or `(A, B) -> R`. The callable form is decided by the
/// arrow after the closing parenthesis.
fn paren_tensor_or_fun_type(p: &mut Parser) -> MarkerClosed {
    let m = p.open();
    p.advance(); // (
    let mut count = 0;
    while !p.at(SyntaxKind::RParen) && !p.at_eof() {
        if type_expr(p).is_none() {
            p.advance_with_error("expected type");
            break;
        }
        count += 1;
        if !p.at(SyntaxKind::RParen) && !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect(SyntaxKind::RParen);
    if p.eat(SyntaxKind::Arrow) {
        match type_expr(p) {
            Some(ret) => p.tag(ret, Field::ReturnType),
            None => p.error("expected return type after `->`"),
        }
        return p.close(m, SyntaxKind::FunType);
    }
    if count == 1 {
        p.close(m, SyntaxKind::ParenType)
    } else {
        p.close(m, SyntaxKind::TensorType)
    }
}

/// `[A, B]`
fn tuple_type(p: &mut Parser) -> MarkerClosed {
    let m = p.open();
    p.advance(); // [
    while !p.at(SyntaxKind::RBrack) && !p.at_eof() {
        if type_expr(p).is_none() {
            p.advance_with_error("expected type");
            break;
        }
        if !p.at(SyntaxKind::RBrack) && !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect(SyntaxKind::RBrack);
    p.close(m, SyntaxKind::TupleType)
}

/// `<Ty, Ty>` arguments of an instantiation.
pub(crate) fn type_arg_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // <
    while !p.at(SyntaxKind::Gt) && !p.at_eof() {
        if type_expr(p).is_none() {
            p.error("expected type argument");
            break;
        }
        if !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect_gt();
    p.close(m, SyntaxKind::TypeArgList);
}

/// `<T, U = Default>` parameters of a generic declaration.
pub(crate) fn type_parameter_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // <
    while !p.at(SyntaxKind::Gt) && !p.at_eof() {
        let tp = p.open();
        if !name(p, Field::Name) {
            p.error("expected type parameter name");
            p.close(tp, SyntaxKind::TypeParameter);
            break;
        }
        if p.eat(SyntaxKind::Eq) {
            match type_expr(p) {
                Some(def) => p.tag(def, Field::Default),
                None => p.error("expected default type"),
            }
        }
        p.close(tp, SyntaxKind::TypeParameter);
        if !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect_gt();
    p.close(m, SyntaxKind::TypeParameterList);
}
