//! Compile-time evaluation of constant initializers.
//!
//! The evaluator is deliberately partial: anything it cannot fold (calls,
//! struct values, overflow, division by zero) yields [`ConstValue::Unknown`]
//! rather than an error. Recursive constant chains are broken by a visiting
//! set the session keeps while a chain is being evaluated.

use slate_common::FileId;
use slate_syntax::{Field, NodeId, SyntaxKind};

use crate::decl::DeclKind;
use crate::resolve::{self, ResolveState};
use crate::session::Session;

/// Result of folding a constant expression. Integers use `i128`, which
/// covers every literal the wire formats care about; values outside that
/// range fold to `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConstValue {
    Int(i128),
    Bool(bool),
    Str(String),
    Unknown,
}

impl ConstValue {
    pub fn as_int(&self) -> Option<i128> {
        match self {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    fn truthy(&self) -> Option<bool> {
        match self {
            ConstValue::Bool(v) => Some(*v),
            ConstValue::Int(v) => Some(*v != 0),
            _ => None,
        }
    }
}

/// Fold `expr` in `file` to a value, if it is a constant expression.
pub fn evaluate(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let tree = &f.tree;
    match tree.kind(expr) {
        SyntaxKind::Literal => {
            let Some(&token) = tree.children(expr).first() else {
                return ConstValue::Unknown;
            };
            match tree.kind(token) {
                SyntaxKind::IntNumber => parse_int(tree.text(token)),
                SyntaxKind::TrueKw => ConstValue::Bool(true),
                SyntaxKind::FalseKw => ConstValue::Bool(false),
                SyntaxKind::StringLit => {
                    let raw = tree.text(token);
                    ConstValue::Str(raw.trim_matches('"').to_owned())
                }
                _ => ConstValue::Unknown,
            }
        }
        SyntaxKind::ParenExpr => match tree.named_children(expr).next() {
            Some(inner) => evaluate(sess, file, inner),
            None => ConstValue::Unknown,
        },
        SyntaxKind::AsExpr => match tree.child_by_field(expr, Field::Operand) {
            Some(inner) => evaluate(sess, file, inner),
            None => ConstValue::Unknown,
        },
        SyntaxKind::RefExpr => evaluate_ref(sess, file, expr),
        SyntaxKind::DotExpr => evaluate_enum_member(sess, file, expr),
        SyntaxKind::UnaryExpr => evaluate_unary(sess, file, expr),
        SyntaxKind::BinaryExpr => evaluate_binary(sess, file, expr),
        SyntaxKind::TernaryExpr => evaluate_ternary(sess, file, expr),
        _ => ConstValue::Unknown,
    }
}

/// `0x..`, `0b..` and decimal, with `_` separators.
fn parse_int(text: &str) -> ConstValue {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    let parsed = if let Some(hex) = cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X"))
    {
        i128::from_str_radix(hex, 16)
    } else if let Some(bin) = cleaned
        .strip_prefix("0b")
        .or_else(|| cleaned.strip_prefix("0B"))
    {
        i128::from_str_radix(bin, 2)
    } else {
        cleaned.parse()
    };
    match parsed {
        Ok(v) => ConstValue::Int(v),
        Err(_) => ConstValue::Unknown,
    }
}

fn evaluate_ref(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let name = f.tree.text(expr);
    let state = ResolveState::named(name, false);
    let Some(decl) = resolve::resolve_unqualified(sess, file, expr, &state) else {
        return ConstValue::Unknown;
    };
    if decl.kind != DeclKind::Constant {
        return ConstValue::Unknown;
    }
    sess.evaluate_constant(decl)
}

/// `Color.RED` folds to the member's declared or implicit ordinal value.
fn evaluate_enum_member(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let tree = &f.tree;
    let Some(member_name) = tree.child_by_field(expr, Field::FieldName) else {
        return ConstValue::Unknown;
    };
    let Some(qualifier) = tree.child_by_field(expr, Field::Qualifier) else {
        return ConstValue::Unknown;
    };
    if tree.kind(qualifier) != SyntaxKind::RefExpr {
        return ConstValue::Unknown;
    }
    let state = ResolveState::named(tree.text(qualifier), true);
    let Some(owner) = resolve::resolve_unqualified(sess, file, qualifier, &state) else {
        return ConstValue::Unknown;
    };
    if owner.kind != DeclKind::Enum {
        return ConstValue::Unknown;
    }
    let Some(owner_file) = sess.file(owner.file) else {
        return ConstValue::Unknown;
    };
    let owner_tree = &owner_file.tree;
    let wanted = tree.text(member_name);
    // Implicit values continue from the previous explicit one.
    let mut next = 0i128;
    for member in owner.enum_members(owner_tree) {
        let value = match member.value_node(owner_tree) {
            Some(v) => evaluate(sess, owner.file, v),
            None => ConstValue::Int(next),
        };
        if member.name(owner_tree) == Some(wanted) {
            return value;
        }
        next = match value.as_int() {
            Some(v) => v.saturating_add(1),
            None => return ConstValue::Unknown,
        };
    }
    ConstValue::Unknown
}

fn evaluate_unary(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let tree = &f.tree;
    let op = tree
        .children(expr)
        .iter()
        .copied()
        .find(|&c| tree.kind(c).is_token())
        .map(|c| tree.kind(c));
    let operand = match tree.child_by_field(expr, Field::Operand) {
        Some(o) => evaluate(sess, file, o),
        None => return ConstValue::Unknown,
    };
    match (op, operand) {
        (Some(SyntaxKind::Minus), ConstValue::Int(v)) => match v.checked_neg() {
            Some(v) => ConstValue::Int(v),
            None => ConstValue::Unknown,
        },
        (Some(SyntaxKind::Plus), ConstValue::Int(v)) => ConstValue::Int(v),
        (Some(SyntaxKind::Tilde), ConstValue::Int(v)) => ConstValue::Int(!v),
        (Some(SyntaxKind::Bang), ConstValue::Bool(v)) => ConstValue::Bool(!v),
        _ => ConstValue::Unknown,
    }
}

fn evaluate_binary(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let tree = &f.tree;
    let op = tree
        .children(expr)
        .iter()
        .copied()
        .find(|&c| tree.kind(c).is_token())
        .map(|c| tree.kind(c));
    let Some(op) = op else {
        return ConstValue::Unknown;
    };
    let lhs = match tree.child_by_field(expr, Field::Lhs) {
        Some(l) => evaluate(sess, file, l),
        None => return ConstValue::Unknown,
    };

    // Short-circuit forms do not require a foldable right side.
    if op == SyntaxKind::AmpAmp || op == SyntaxKind::PipePipe {
        let l = match lhs.truthy() {
            Some(v) => v,
            None => return ConstValue::Unknown,
        };
        if op == SyntaxKind::AmpAmp && !l {
            return ConstValue::Bool(false);
        }
        if op == SyntaxKind::PipePipe && l {
            return ConstValue::Bool(true);
        }
        let rhs = match tree.child_by_field(expr, Field::Rhs) {
            Some(r) => evaluate(sess, file, r),
            None => return ConstValue::Unknown,
        };
        return match rhs.truthy() {
            Some(v) => ConstValue::Bool(v),
            None => ConstValue::Unknown,
        };
    }

    let rhs = match tree.child_by_field(expr, Field::Rhs) {
        Some(r) => evaluate(sess, file, r),
        None => return ConstValue::Unknown,
    };

    match (op, &lhs, &rhs) {
        (SyntaxKind::EqEq, _, _) if lhs != ConstValue::Unknown && rhs != ConstValue::Unknown => {
            ConstValue::Bool(lhs == rhs)
        }
        (SyntaxKind::BangEq, _, _) if lhs != ConstValue::Unknown && rhs != ConstValue::Unknown => {
            ConstValue::Bool(lhs != rhs)
        }
        (_, ConstValue::Int(a), ConstValue::Int(b)) => fold_int_op(op, *a, *b),
        _ => ConstValue::Unknown,
    }
}

fn fold_int_op(op: SyntaxKind, a: i128, b: i128) -> ConstValue {
    let int = |v: Option<i128>| match v {
        Some(v) => ConstValue::Int(v),
        None => ConstValue::Unknown,
    };
    match op {
        SyntaxKind::Plus => int(a.checked_add(b)),
        SyntaxKind::Minus => int(a.checked_sub(b)),
        SyntaxKind::Star => int(a.checked_mul(b)),
        SyntaxKind::Slash => int(a.checked_div(b)),
        SyntaxKind::Percent => int(a.checked_rem(b)),
        SyntaxKind::Shl => int(u32::try_from(b).ok().and_then(|b| a.checked_shl(b))),
        SyntaxKind::Shr => int(u32::try_from(b).ok().and_then(|b| a.checked_shr(b))),
        SyntaxKind::Amp => ConstValue::Int(a & b),
        SyntaxKind::Pipe => ConstValue::Int(a | b),
        SyntaxKind::Caret => ConstValue::Int(a ^ b),
        SyntaxKind::Lt => ConstValue::Bool(a < b),
        SyntaxKind::Gt => ConstValue::Bool(a > b),
        SyntaxKind::LtEq => ConstValue::Bool(a <= b),
        SyntaxKind::GtEq => ConstValue::Bool(a >= b),
        SyntaxKind::Spaceship => ConstValue::Int(match a.cmp(&b) {
            std::cmp::Ordering::Less => -1,
            std::cmp::Ordering::Equal => 0,
            std::cmp::Ordering::Greater => 1,
        }),
        _ => ConstValue::Unknown,
    }
}

fn evaluate_ternary(sess: &Session, file: FileId, expr: NodeId) -> ConstValue {
    let Some(f) = sess.file(file) else {
        return ConstValue::Unknown;
    };
    let tree = &f.tree;
    let cond = match tree.child_by_field(expr, Field::Condition) {
        Some(c) => evaluate(sess, file, c),
        None => return ConstValue::Unknown,
    };
    let branch = match cond.truthy() {
        Some(true) => tree.child_by_field(expr, Field::Then),
        Some(false) => tree.child_by_field(expr, Field::Else),
        None => return ConstValue::Unknown,
    };
    match branch {
        Some(b) => evaluate(sess, file, b),
        None => ConstValue::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_literal_radixes() {
        assert_eq!(parse_int("42"), ConstValue::Int(42));
        assert_eq!(parse_int("0xff"), ConstValue::Int(255));
        assert_eq!(parse_int("0b1010"), ConstValue::Int(10));
        assert_eq!(parse_int("1_000_000"), ConstValue::Int(1_000_000));
    }

    #[test]
    fn int_out_of_range_is_unknown() {
        let big = "9".repeat(60);
        assert_eq!(parse_int(&big), ConstValue::Unknown);
    }

    #[test]
    fn division_by_zero_is_unknown() {
        assert_eq!(fold_int_op(SyntaxKind::Slash, 7, 0), ConstValue::Unknown);
        assert_eq!(fold_int_op(SyntaxKind::Percent, 7, 0), ConstValue::Unknown);
    }

    #[test]
    fn shift_folds() {
        assert_eq!(fold_int_op(SyntaxKind::Shl, 1, 8), ConstValue::Int(256));
        assert_eq!(fold_int_op(SyntaxKind::Shr, 256, 4), ConstValue::Int(16));
        assert_eq!(fold_int_op(SyntaxKind::Shl, 1, -1), ConstValue::Unknown);
    }

    #[test]
    fn comparison_folds() {
        assert_eq!(fold_int_op(SyntaxKind::Lt, 1, 2), ConstValue::Bool(true));
        assert_eq!(fold_int_op(SyntaxKind::Spaceship, 5, 2), ConstValue::Int(1));
    }
}
