//! Statement parsers: blocks, variable declarations with destructuring,
//! control flow, exception handling.

use crate::kind::{Field, SyntaxKind};

use super::items::name;
use super::types::type_expr;
use super::{expr, MarkerClosed, Parser};

/// `{ stmt* }`
pub(crate) fn block(p: &mut Parser) -> MarkerClosed {
    let m = p.open();
    p.expect(SyntaxKind::LBrace);
    while !p.at(SyntaxKind::RBrace) && !p.at_eof() {
        statement(p);
    }
    p.expect(SyntaxKind::RBrace);
    p.close(m, SyntaxKind::Block)
}

pub(crate) fn statement(p: &mut Parser) {
    match p.current() {
        SyntaxKind::ValKw | SyntaxKind::VarKw => var_stmt(p),
        SyntaxKind::IfKw => if_stmt(p),
        SyntaxKind::WhileKw => while_stmt(p),
        SyntaxKind::DoKw => do_while_stmt(p),
        SyntaxKind::RepeatKw => repeat_stmt(p),
        SyntaxKind::ReturnKw => return_stmt(p),
        SyntaxKind::ThrowKw => throw_stmt(p),
        SyntaxKind::AssertKw => assert_stmt(p),
        SyntaxKind::TryKw => try_stmt(p),
        SyntaxKind::BreakKw => terminator_stmt(p, SyntaxKind::BreakStmt),
        SyntaxKind::ContinueKw => terminator_stmt(p, SyntaxKind::ContinueStmt),
        SyntaxKind::LBrace => {
            block(p);
        }
        SyntaxKind::Semicolon => p.advance(),
        _ => expr_stmt(p),
    }
}

/// `val x = e;` / `var (a, b): (int, int) = e;` / `var [a, b] = e;`
///
/// Each definition may carry its own type annotation.
fn var_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // val | var
    var_lhs(p);
    p.expect(SyntaxKind::Eq);
    match expr(p) {
        Some(value) => p.tag(value, Field::Value),
        None => p.error("expected initializer"),
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::VarStmt);
}

fn var_lhs(p: &mut Parser) {
    match p.current() {
        SyntaxKind::LParen => {
            let m = p.open();
            p.advance(); // (
            while !p.at(SyntaxKind::RParen) && !p.at_eof() {
                var_lhs(p);
                if !p.at(SyntaxKind::RParen) && !p.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            p.expect(SyntaxKind::RParen);
            p.close(m, SyntaxKind::VarTensor);
        }
        SyntaxKind::LBrack => {
            let m = p.open();
            p.advance(); // [
            while !p.at(SyntaxKind::RBrack) && !p.at_eof() {
                var_lhs(p);
                if !p.at(SyntaxKind::RBrack) && !p.eat(SyntaxKind::Comma) {
                    break;
                }
            }
            p.expect(SyntaxKind::RBrack);
            p.close(m, SyntaxKind::VarTuple);
        }
        _ => {
            let m = p.open();
            if !name(p, Field::Name) && !p.eat(SyntaxKind::Underscore) {
                p.advance_with_error("expected variable name");
            }
            if p.eat(SyntaxKind::Colon) {
                match type_expr(p) {
                    Some(ty) => p.tag(ty, Field::Type),
                    None => p.error("expected variable type"),
                }
            }
            p.close(m, SyntaxKind::VarDef);
        }
    }
}

/// `if (cond) { } else if ... else { }`
fn if_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // if
    condition(p);
    let then = block(p);
    p.tag(then, Field::Then);
    if p.eat(SyntaxKind::ElseKw) {
        if p.at(SyntaxKind::IfKw) {
            let else_m = p.open();
            if_stmt(p);
            let else_m = p.close(else_m, SyntaxKind::Block);
            p.tag(else_m, Field::Else);
        } else {
            let else_b = block(p);
            p.tag(else_b, Field::Else);
        }
    }
    p.close(m, SyntaxKind::IfStmt);
}

/// Parenthesized condition shared by `if`, `while`, `do-while` and `repeat`.
fn condition(p: &mut Parser) {
    p.expect(SyntaxKind::LParen);
    match expr(p) {
        Some(cond) => p.tag(cond, Field::Condition),
        None => p.error("expected condition"),
    }
    p.expect(SyntaxKind::RParen);
}

fn while_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // while
    condition(p);
    let body = block(p);
    p.tag(body, Field::Body);
    p.close(m, SyntaxKind::WhileStmt);
}

/// `do { } while (cond);`
fn do_while_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // do
    let body = block(p);
    p.tag(body, Field::Body);
    p.expect(SyntaxKind::WhileKw);
    condition(p);
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::DoWhileStmt);
}

fn repeat_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // repeat
    p.expect(SyntaxKind::LParen);
    match expr(p) {
        Some(count) => p.tag(count, Field::Count),
        None => p.error("expected repeat count"),
    }
    p.expect(SyntaxKind::RParen);
    let body = block(p);
    p.tag(body, Field::Body);
    p.close(m, SyntaxKind::RepeatStmt);
}

fn return_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // return
    if !p.at(SyntaxKind::Semicolon) && !p.at(SyntaxKind::RBrace) && !p.at_eof() {
        if let Some(value) = expr(p) {
            p.tag(value, Field::Value);
        }
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::ReturnStmt);
}

fn throw_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // throw
    if !p.at(SyntaxKind::Semicolon) && !p.at(SyntaxKind::RBrace) && !p.at_eof() {
        if let Some(value) = expr(p) {
            p.tag(value, Field::Value);
        }
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::ThrowStmt);
}

/// `assert (cond, excNo);` or `assert (cond) throw excNo;`
fn assert_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // assert
    p.expect(SyntaxKind::LParen);
    match expr(p) {
        Some(cond) => p.tag(cond, Field::Condition),
        None => p.error("expected assert condition"),
    }
    if p.eat(SyntaxKind::Comma) {
        if let Some(exc) = expr(p) {
            p.tag(exc, Field::ExcNo);
        }
    }
    p.expect(SyntaxKind::RParen);
    if p.eat(SyntaxKind::ThrowKw) {
        if let Some(exc) = expr(p) {
            p.tag(exc, Field::ExcNo);
        }
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::AssertStmt);
}

/// `try { } catch (err, arg) { }` — both catch binders are optional.
fn try_stmt(p: &mut Parser) {
    let m = p.open();
    p.advance(); // try
    let body = block(p);
    p.tag(body, Field::Body);
    if p.at(SyntaxKind::CatchKw) {
        let c = p.open();
        p.advance(); // catch
        if p.eat(SyntaxKind::LParen) {
            catch_binder(p, Field::CaughtErr);
            if p.eat(SyntaxKind::Comma) {
                catch_binder(p, Field::CaughtArg);
            }
            p.expect(SyntaxKind::RParen);
        }
        let handler = block(p);
        p.tag(handler, Field::Body);
        p.close(c, SyntaxKind::CatchClause);
    } else {
        p.error("expected `catch` after try block");
    }
    p.close(m, SyntaxKind::TryStmt);
}

fn catch_binder(p: &mut Parser, field: Field) {
    if p.at(SyntaxKind::Ident) {
        let m = p.open();
        name(p, Field::Name);
        let m = p.close(m, SyntaxKind::VarDef);
        p.tag(m, field);
    } else {
        p.eat(SyntaxKind::Underscore);
    }
}

fn terminator_stmt(p: &mut Parser, kind: SyntaxKind) {
    let m = p.open();
    p.advance(); // break | continue
    p.eat(SyntaxKind::Semicolon);
    p.close(m, kind);
}

fn expr_stmt(p: &mut Parser) {
    let m = p.open();
    if expr(p).is_none() {
        p.advance_with_error("expected a statement");
    }
    p.eat(SyntaxKind::Semicolon);
    p.close(m, SyntaxKind::ExprStmt);
}
