//! Expression parsers.
//!
//! Pratt-style binary expression parsing over a postfix/primary core.
//! Generic instantiations in expression position (`Foo<int>(...)`) are
//! recognized speculatively with rollback so that comparisons like `a < b`
//! keep parsing as binary expressions.

use crate::kind::{Field, SyntaxKind};

use super::statements::block;
use super::types::{type_arg_list, type_expr};
use super::{MarkerClosed, Parser};

/// Parse one expression. Returns `None` without consuming anything when the
/// current token cannot start an expression.
pub(crate) fn expr(p: &mut Parser) -> Option<MarkerClosed> {
    assign_expr(p)
}

/// Assignment is right associative and has the lowest precedence.
fn assign_expr(p: &mut Parser) -> Option<MarkerClosed> {
    let lhs = ternary_expr(p)?;
    let kind = match p.current() {
        SyntaxKind::Eq => SyntaxKind::AssignExpr,
        SyntaxKind::PlusEq
        | SyntaxKind::MinusEq
        | SyntaxKind::StarEq
        | SyntaxKind::SlashEq
        | SyntaxKind::PercentEq
        | SyntaxKind::AmpEq
        | SyntaxKind::PipeEq
        | SyntaxKind::CaretEq
        | SyntaxKind::ShlEq
        | SyntaxKind::ShrEq => SyntaxKind::CompoundAssignExpr,
        _ => return Some(lhs),
    };
    let m = p.open_before(lhs);
    p.tag(lhs, Field::Lhs);
    p.advance(); // the assignment operator
    match assign_expr(p) {
        Some(rhs) => p.tag(rhs, Field::Rhs),
        None => p.error("expected right-hand side of assignment"),
    }
    Some(p.close(m, kind))
}

/// `cond ? a : b`
fn ternary_expr(p: &mut Parser) -> Option<MarkerClosed> {
    let cond = binary_expr(p, 0)?;
    if !p.at(SyntaxKind::Question) {
        return Some(cond);
    }
    let m = p.open_before(cond);
    p.tag(cond, Field::Condition);
    p.advance(); // ?
    match assign_expr(p) {
        Some(then) => p.tag(then, Field::Then),
        None => p.error("expected expression after `?`"),
    }
    p.expect(SyntaxKind::Colon);
    match ternary_expr(p) {
        Some(els) => p.tag(els, Field::Else),
        None => p.error("expected expression after `:`"),
    }
    Some(p.close(m, SyntaxKind::TernaryExpr))
}

/// Left binding power of a binary operator; 0 for non-operators.
fn binary_bp(kind: SyntaxKind) -> u8 {
    match kind {
        SyntaxKind::QuestionQuestion => 1,
        SyntaxKind::PipePipe => 2,
        SyntaxKind::AmpAmp => 3,
        SyntaxKind::Pipe => 4,
        SyntaxKind::Caret => 5,
        SyntaxKind::Amp => 6,
        SyntaxKind::EqEq | SyntaxKind::BangEq => 7,
        SyntaxKind::Lt
        | SyntaxKind::Gt
        | SyntaxKind::LtEq
        | SyntaxKind::GtEq
        | SyntaxKind::Spaceship
        | SyntaxKind::IsKw
        | SyntaxKind::NotIsKw => 8,
        SyntaxKind::Shl | SyntaxKind::Shr => 9,
        SyntaxKind::Plus | SyntaxKind::Minus => 10,
        SyntaxKind::Star | SyntaxKind::Slash | SyntaxKind::Percent => 11,
        _ => 0,
    }
}

fn binary_expr(p: &mut Parser, min_bp: u8) -> Option<MarkerClosed> {
    let mut lhs = unary_expr(p)?;
    loop {
        let op = p.current();
        let bp = binary_bp(op);
        if bp == 0 || bp <= min_bp {
            return Some(lhs);
        }
        if op == SyntaxKind::IsKw || op == SyntaxKind::NotIsKw {
            // Type test: the right side is a type, not an expression.
            let m = p.open_before(lhs);
            p.tag(lhs, Field::Operand);
            p.advance(); // is | !is
            match type_expr(p) {
                Some(ty) => p.tag(ty, Field::Type),
                None => p.error("expected type after `is`"),
            }
            lhs = p.close(m, SyntaxKind::IsExpr);
            continue;
        }
        let m = p.open_before(lhs);
        p.tag(lhs, Field::Lhs);
        p.advance(); // the operator
        match binary_expr(p, bp) {
            Some(rhs) => p.tag(rhs, Field::Rhs),
            None => p.error("expected right-hand side of binary operator"),
        }
        lhs = p.close(m, SyntaxKind::BinaryExpr);
    }
}

fn unary_expr(p: &mut Parser) -> Option<MarkerClosed> {
    match p.current() {
        SyntaxKind::Bang | SyntaxKind::Minus | SyntaxKind::Plus | SyntaxKind::Tilde => {
            let m = p.open();
            p.advance(); // the operator
            match unary_expr(p) {
                Some(operand) => p.tag(operand, Field::Operand),
                None => p.error("expected operand"),
            }
            Some(p.close(m, SyntaxKind::UnaryExpr))
        }
        _ => postfix_expr(p),
    }
}

fn postfix_expr(p: &mut Parser) -> Option<MarkerClosed> {
    let (mut lhs, mut lhs_kind) = primary_expr(p)?;
    loop {
        match p.current() {
            SyntaxKind::Dot => {
                let m = p.open_before(lhs);
                p.tag(lhs, Field::Qualifier);
                p.advance(); // .
                if p.at(SyntaxKind::Ident) || p.at(SyntaxKind::IntNumber) {
                    let f = p.open();
                    p.advance();
                    let f = p.close(f, SyntaxKind::Name);
                    p.tag(f, Field::FieldName);
                } else {
                    p.error("expected field or method name after `.`");
                }
                lhs = p.close(m, SyntaxKind::DotExpr);
                lhs_kind = SyntaxKind::DotExpr;
            }
            SyntaxKind::LParen => {
                let m = p.open_before(lhs);
                p.tag(lhs, Field::Callee);
                arg_list(p);
                lhs = p.close(m, SyntaxKind::CallExpr);
                lhs_kind = SyntaxKind::CallExpr;
            }
            SyntaxKind::Bang => {
                let m = p.open_before(lhs);
                p.tag(lhs, Field::Operand);
                p.advance(); // !
                lhs = p.close(m, SyntaxKind::NotNullExpr);
                lhs_kind = SyntaxKind::NotNullExpr;
            }
            SyntaxKind::AsKw => {
                let m = p.open_before(lhs);
                p.tag(lhs, Field::Operand);
                p.advance(); // as
                match type_expr(p) {
                    Some(ty) => p.tag(ty, Field::Type),
                    None => p.error("expected type after `as`"),
                }
                lhs = p.close(m, SyntaxKind::AsExpr);
                lhs_kind = SyntaxKind::AsExpr;
            }
            SyntaxKind::Lt if lhs_kind == SyntaxKind::RefExpr => {
                match try_generic_instantiation(p, lhs) {
                    Some(wrapped) => {
                        lhs = wrapped;
                        lhs_kind = SyntaxKind::GenericInstantiation;
                    }
                    None => return Some(lhs),
                }
            }
            SyntaxKind::LBrace
                if lhs_kind == SyntaxKind::RefExpr
                    || lhs_kind == SyntaxKind::GenericInstantiation =>
            {
                let m = p.open_before(lhs);
                p.tag(lhs, Field::Name);
                struct_lit_body(p);
                lhs = p.close(m, SyntaxKind::StructLit);
                lhs_kind = SyntaxKind::StructLit;
            }
            _ => return Some(lhs),
        }
    }
}

/// Try to parse `<T, ...>` after a reference as a generic instantiation.
/// Commits only when the argument list parses cleanly and is followed by a
/// token that can continue an instantiation; otherwise rewinds so `<` is
/// parsed as a comparison.
fn try_generic_instantiation(p: &mut Parser, lhs: MarkerClosed) -> Option<MarkerClosed> {
    // Dry run first: `open_before` cannot be rolled back, so decide on a
    // throwaway parse and redo it for real only on success.
    let cp = p.checkpoint();
    let errors_before = p.error_count();
    type_arg_list(p);
    let clean = p.error_count() == errors_before
        && matches!(
            p.current(),
            SyntaxKind::LParen
                | SyntaxKind::LBrace
                | SyntaxKind::Dot
                | SyntaxKind::Semicolon
                | SyntaxKind::Comma
                | SyntaxKind::RParen
                | SyntaxKind::RBrack
                | SyntaxKind::RBrace
                | SyntaxKind::Eof
        );
    p.rollback(cp);
    if !clean {
        return None;
    }
    let m = p.open_before(lhs);
    p.tag(lhs, Field::Callee);
    type_arg_list(p);
    Some(p.close(m, SyntaxKind::GenericInstantiation))
}

fn arg_list(p: &mut Parser) {
    let m = p.open();
    p.advance(); // (
    while !p.at(SyntaxKind::RParen) && !p.at_eof() {
        if expr(p).is_none() {
            p.advance_with_error("expected argument");
            continue;
        }
        if !p.at(SyntaxKind::RParen) && !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect(SyntaxKind::RParen);
    p.close(m, SyntaxKind::ArgList);
}

fn primary_expr(p: &mut Parser) -> Option<(MarkerClosed, SyntaxKind)> {
    let kind = p.current();
    match kind {
        k if k.is_literal_token() => {
            let m = p.open();
            p.advance();
            Some((p.close(m, SyntaxKind::Literal), SyntaxKind::Literal))
        }
        SyntaxKind::Ident | SyntaxKind::Underscore => {
            let m = p.open();
            p.advance();
            Some((p.close(m, SyntaxKind::RefExpr), SyntaxKind::RefExpr))
        }
        SyntaxKind::LParen => {
            let m = p.open();
            p.advance(); // (
            let mut count = 0;
            while !p.at(SyntaxKind::RParen) && !p.at_eof() {
                if expr(p).is_none() {
                    p.advance_with_error("expected expression");
                    continue;
                }
                count += 1;
                if !p.at(SyntaxKind::RParen) && !p.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            p.expect(SyntaxKind::RParen);
            let kind = if count == 1 {
                SyntaxKind::ParenExpr
            } else {
                SyntaxKind::TensorExpr
            };
            Some((p.close(m, kind), kind))
        }
        SyntaxKind::LBrack => {
            let m = p.open();
            p.advance(); // [
            while !p.at(SyntaxKind::RBrack) && !p.at_eof() {
                if expr(p).is_none() {
                    p.advance_with_error("expected expression");
                    continue;
                }
                if !p.at(SyntaxKind::RBrack) && !p.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            p.expect(SyntaxKind::RBrack);
            Some((p.close(m, SyntaxKind::TupleExpr), SyntaxKind::TupleExpr))
        }
        SyntaxKind::LBrace => {
            // Anonymous struct literal; the struct is picked from the
            // surrounding type hint.
            let m = p.open();
            struct_lit_body(p);
            Some((p.close(m, SyntaxKind::StructLit), SyntaxKind::StructLit))
        }
        SyntaxKind::MatchKw => Some((match_expr(p), SyntaxKind::MatchExpr)),
        _ => None,
    }
}

/// `{ field: value, shorthand, ... }`
fn struct_lit_body(p: &mut Parser) {
    p.expect(SyntaxKind::LBrace);
    while !p.at(SyntaxKind::RBrace) && !p.at_eof() {
        if p.at(SyntaxKind::Ident) {
            let f = p.open();
            super::items::name(p, Field::Name);
            if p.eat(SyntaxKind::Colon) {
                match expr(p) {
                    Some(value) => p.tag(value, Field::Value),
                    None => p.error("expected field value"),
                }
            }
            p.close(f, SyntaxKind::StructLitField);
        } else {
            p.advance_with_error("expected struct literal field");
        }
        if !p.at(SyntaxKind::RBrace) && !p.eat(SyntaxKind::Comma) {
            break;
        }
    }
    p.expect(SyntaxKind::RBrace);
}

/// `match (subject) { pattern => body, else => body }`
///
/// An arm pattern is a type when it parses as one directly followed by `=>`,
/// otherwise an expression.
fn match_expr(p: &mut Parser) -> MarkerClosed {
    let m = p.open();
    p.advance(); // match
    p.expect(SyntaxKind::LParen);
    match expr(p) {
        Some(subject) => p.tag(subject, Field::Subject),
        None => p.error("expected match subject"),
    }
    p.expect(SyntaxKind::RParen);
    p.expect(SyntaxKind::LBrace);
    while !p.at(SyntaxKind::RBrace) && !p.at_eof() {
        match_arm(p);
        while p.eat(SyntaxKind::Comma) || p.eat(SyntaxKind::Semicolon) {}
    }
    p.expect(SyntaxKind::RBrace);
    p.close(m, SyntaxKind::MatchExpr)
}

fn match_arm(p: &mut Parser) {
    let m = p.open();
    if p.eat(SyntaxKind::ElseKw) {
        // else arm, no pattern node
    } else {
        let cp = p.checkpoint();
        let mut matched_type = false;
        if let Some(ty) = type_expr(p) {
            if p.at(SyntaxKind::FatArrow) {
                p.tag(ty, Field::Pattern);
                matched_type = true;
            } else {
                p.rollback(cp);
            }
        }
        if !matched_type {
            match expr(p) {
                Some(pattern) => p.tag(pattern, Field::Pattern),
                None => p.advance_with_error("expected match pattern"),
            }
        }
    }
    p.expect(SyntaxKind::FatArrow);
    if p.at(SyntaxKind::LBrace) {
        let body = block(p);
        p.tag(body, Field::Body);
    } else if p.at(SyntaxKind::ThrowKw) || p.at(SyntaxKind::ReturnKw) {
        let body = p.open();
        super::statements::statement(p);
        let body = p.close(body, SyntaxKind::Block);
        p.tag(body, Field::Body);
    } else {
        match expr(p) {
            Some(body) => p.tag(body, Field::Body),
            None => p.error("expected match arm body"),
        }
    }
    p.close(m, SyntaxKind::MatchArm);
}
