//! The Slate type lattice.
//!
//! [`Ty`] is a closed set of variants compared structurally. Types are plain
//! values: cheap to clone, independent of any session state. Union types are
//! always kept normalized (flat, deduplicated, never a singleton), so every
//! constructor of a union goes through [`Ty::union_of`].

use std::fmt;

use rustc_hash::FxHashMap;

use crate::decl::Decl;

/// A Slate type.
#[derive(Debug, Clone)]
pub enum Ty {
    Void,
    Null,
    /// The bottom type: no values, assignable everywhere.
    Never,
    /// Absence of type information. Absorbs everything it is joined with.
    Unknown,
    /// `bool`, optionally refined to a known literal value.
    Bool(Option<bool>),
    /// The 257-bit arbitrary integer type.
    Int,
    /// Fixed-width integer, `int8` ... `uint256`.
    IntN { width: u32, unsigned: bool },
    /// Variable-length serialized integer, `varint16` / `varuint32`.
    VarIntN { width: u32, unsigned: bool },
    Coins,
    /// Fixed-width bit string, `bits256`.
    BitsN(u32),
    /// Fixed-width byte string, `bytes32`.
    BytesN(u32),
    Str,
    /// Compiler-provided opaque type declared as `type name = builtin`.
    Builtin { name: String, decl: Decl },
    Struct { name: String, decl: Decl },
    Enum { name: String, decl: Decl },
    /// A named alias wrapping its resolved target.
    Alias {
        name: String,
        decl: Decl,
        inner: Box<Ty>,
    },
    /// A type parameter of a generic declaration, with its declared default.
    TypeParam {
        name: String,
        decl: Decl,
        default: Option<Box<Ty>>,
    },
    Tensor(Vec<Ty>),
    Tuple(Vec<Ty>),
    /// Normalized union: flat, deduplicated, at least two members.
    Union(Vec<Ty>),
    Fun { params: Vec<Ty>, ret: Box<Ty> },
    /// Generic type applied to arguments, e.g. `Box<int>`.
    Instantiation { inner: Box<Ty>, args: Vec<Ty> },
}

impl Ty {
    pub fn bool() -> Ty {
        Ty::Bool(None)
    }

    pub fn bool_literal(value: bool) -> Ty {
        Ty::Bool(Some(value))
    }

    /// `T?` is represented as the union `T | null`.
    pub fn nullable(inner: Ty) -> Ty {
        Ty::union_of(vec![inner, Ty::Null])
    }

    /// Build a union: flattens nested unions, removes duplicates, unwraps a
    /// single remaining member.
    pub fn union_of(items: Vec<Ty>) -> Ty {
        let mut members: Vec<Ty> = Vec::new();
        let mut push = |ty: Ty, members: &mut Vec<Ty>| {
            if !members.iter().any(|m| m == &ty) {
                members.push(ty);
            }
        };
        for item in items {
            match item {
                Ty::Union(inner) => {
                    for m in inner {
                        push(m, &mut members);
                    }
                }
                other => push(other, &mut members),
            }
        }
        match members.len() {
            0 => Ty::Never,
            1 => members.pop().unwrap_or(Ty::Never),
            _ => Ty::Union(members),
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Ty::Unknown)
    }

    pub fn is_never(&self) -> bool {
        matches!(self, Ty::Never)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Ty::Null)
    }

    /// Strip alias wrappers.
    pub fn unwrap_alias(&self) -> &Ty {
        let mut cur = self;
        while let Ty::Alias { inner, .. } = cur {
            cur = inner;
        }
        cur
    }

    /// Strip one instantiation wrapper, if any.
    pub fn unwrap_instantiation(&self) -> &Ty {
        match self {
            Ty::Instantiation { inner, .. } => inner,
            other => other,
        }
    }

    /// Strip aliases and instantiations down to the underlying named type.
    pub fn base_ty(&self) -> &Ty {
        let mut cur = self;
        loop {
            match cur {
                Ty::Alias { inner, .. } => cur = inner,
                Ty::Instantiation { inner, .. } => cur = inner,
                other => return other,
            }
        }
    }

    /// For a nullable union `T | null`, the non-null part; otherwise `self`.
    pub fn unwrap_option(&self) -> &Ty {
        if let Some(inner) = self.as_nullable() {
            inner
        } else {
            self
        }
    }

    /// `Some(T)` when this is exactly the two-member union `T | null`.
    pub fn as_nullable(&self) -> Option<&Ty> {
        match self.unwrap_alias() {
            Ty::Union(members) if members.len() == 2 => {
                match (members[0].is_null(), members[1].is_null()) {
                    (false, true) => Some(&members[0]),
                    (true, false) => Some(&members[1]),
                    _ => None,
                }
            }
            _ => None,
        }
    }

    /// Whether any embedded type parameter remains.
    pub fn has_generics(&self) -> bool {
        match self {
            Ty::TypeParam { .. } => true,
            Ty::Alias { inner, .. } => inner.has_generics(),
            Ty::Tensor(items) | Ty::Tuple(items) | Ty::Union(items) => {
                items.iter().any(Ty::has_generics)
            }
            Ty::Fun { params, ret } => params.iter().any(Ty::has_generics) || ret.has_generics(),
            Ty::Instantiation { inner, args } => {
                inner.has_generics() || args.iter().any(Ty::has_generics)
            }
            _ => false,
        }
    }

    /// Replace type parameters by name. Unions are re-normalized after the
    /// replacement since substitution can collapse members.
    pub fn substitute(&self, mapping: &FxHashMap<String, Ty>) -> Ty {
        match self {
            Ty::TypeParam { name, .. } => match mapping.get(name) {
                Some(ty) => ty.clone(),
                None => self.clone(),
            },
            Ty::Alias { name, decl, inner } => Ty::Alias {
                name: name.clone(),
                decl: *decl,
                inner: Box::new(inner.substitute(mapping)),
            },
            Ty::Tensor(items) => {
                Ty::Tensor(items.iter().map(|t| t.substitute(mapping)).collect())
            }
            Ty::Tuple(items) => Ty::Tuple(items.iter().map(|t| t.substitute(mapping)).collect()),
            Ty::Union(items) => {
                Ty::union_of(items.iter().map(|t| t.substitute(mapping)).collect())
            }
            Ty::Fun { params, ret } => Ty::Fun {
                params: params.iter().map(|t| t.substitute(mapping)).collect(),
                ret: Box::new(ret.substitute(mapping)),
            },
            Ty::Instantiation { inner, args } => Ty::Instantiation {
                inner: Box::new(inner.substitute(mapping)),
                args: args.iter().map(|t| t.substitute(mapping)).collect(),
            },
            other => other.clone(),
        }
    }

    /// Negate a boolean literal refinement; plain `bool` stays plain.
    pub fn negate_bool(&self) -> Ty {
        match self {
            Ty::Bool(Some(v)) => Ty::Bool(Some(!v)),
            other => other.clone(),
        }
    }

    /// Structural assignability: can a value of type `rhs` be stored where
    /// `self` is declared?
    pub fn can_accept(&self, rhs: &Ty) -> bool {
        let lhs = self.unwrap_alias();
        let rhs = rhs.unwrap_alias();
        if lhs == rhs || rhs.is_never() || lhs.is_unknown() || rhs.is_unknown() {
            return true;
        }
        match (lhs, rhs) {
            (Ty::Union(members), Ty::Union(rhs_members)) => rhs_members
                .iter()
                .all(|r| members.iter().any(|m| m.can_accept(r))),
            (Ty::Union(members), _) => members.iter().any(|m| m.can_accept(rhs)),
            (Ty::Bool(None), Ty::Bool(Some(_))) => true,
            (Ty::Int, Ty::IntN { .. } | Ty::VarIntN { .. } | Ty::Coins) => true,
            (Ty::Tensor(a), Ty::Tensor(b)) | (Ty::Tuple(a), Ty::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.can_accept(y))
            }
            (
                Ty::Fun { params, ret },
                Ty::Fun {
                    params: rp,
                    ret: rr,
                },
            ) => params == rp && ret.can_accept(rr),
            (
                Ty::Instantiation { inner, args },
                Ty::Instantiation {
                    inner: ri,
                    args: ra,
                },
            ) => {
                inner.can_accept(ri)
                    && args.len() == ra.len()
                    && args.iter().zip(ra).all(|(x, y)| x.can_accept(y))
            }
            _ => false,
        }
    }
}

impl PartialEq for Ty {
    fn eq(&self, other: &Ty) -> bool {
        // Aliases are transparent for comparison; two aliases with the same
        // name are equal without unwrapping.
        if let (Ty::Alias { name: a, .. }, Ty::Alias { name: b, .. }) = (self, other) {
            if a == b {
                return true;
            }
        }
        let a = self.unwrap_alias();
        let b = other.unwrap_alias();
        match (a, b) {
            (Ty::Void, Ty::Void)
            | (Ty::Null, Ty::Null)
            | (Ty::Never, Ty::Never)
            | (Ty::Unknown, Ty::Unknown)
            | (Ty::Int, Ty::Int)
            | (Ty::Coins, Ty::Coins)
            | (Ty::Str, Ty::Str) => true,
            (Ty::Bool(x), Ty::Bool(y)) => x == y,
            (
                Ty::IntN { width, unsigned },
                Ty::IntN {
                    width: w2,
                    unsigned: u2,
                },
            ) => width == w2 && unsigned == u2,
            (
                Ty::VarIntN { width, unsigned },
                Ty::VarIntN {
                    width: w2,
                    unsigned: u2,
                },
            ) => width == w2 && unsigned == u2,
            (Ty::BitsN(x), Ty::BitsN(y)) => x == y,
            (Ty::BytesN(x), Ty::BytesN(y)) => x == y,
            (Ty::Builtin { name: x, .. }, Ty::Builtin { name: y, .. }) => x == y,
            (Ty::Struct { name: x, .. }, Ty::Struct { name: y, .. }) => x == y,
            (Ty::Enum { name: x, .. }, Ty::Enum { name: y, .. }) => x == y,
            (Ty::TypeParam { name: x, .. }, Ty::TypeParam { name: y, .. }) => x == y,
            (Ty::Tensor(x), Ty::Tensor(y)) | (Ty::Tuple(x), Ty::Tuple(y)) => x == y,
            (Ty::Union(x), Ty::Union(y)) => {
                // Set comparison: members are already deduplicated.
                x.len() == y.len() && x.iter().all(|m| y.contains(m))
            }
            (
                Ty::Fun { params, ret },
                Ty::Fun {
                    params: p2,
                    ret: r2,
                },
            ) => params == p2 && ret == r2,
            (
                Ty::Instantiation { inner, args },
                Ty::Instantiation {
                    inner: i2,
                    args: a2,
                },
            ) => inner == i2 && args == a2,
            _ => false,
        }
    }
}

impl Eq for Ty {}

/// Widening join used at control-flow merge points.
///
/// Equal types collapse; `Unknown` absorbs; `Never` is the identity; boolean
/// literals widen over their refinement; same-arity tensors and tuples join
/// elementwise; anything else becomes a union.
pub fn join_types(a: &Ty, b: &Ty) -> Ty {
    if a == b {
        return a.clone();
    }
    if a.is_unknown() || b.is_unknown() {
        return Ty::Unknown;
    }
    if a.is_never() {
        return b.clone();
    }
    if b.is_never() {
        return a.clone();
    }
    match (a.unwrap_alias(), b.unwrap_alias()) {
        (Ty::Bool(_), Ty::Bool(_)) => Ty::Bool(None),
        (Ty::Tensor(x), Ty::Tensor(y)) if x.len() == y.len() => {
            Ty::Tensor(x.iter().zip(y).map(|(l, r)| join_types(l, r)).collect())
        }
        (Ty::Tuple(x), Ty::Tuple(y)) if x.len() == y.len() => {
            Ty::Tuple(x.iter().zip(y).map(|(l, r)| join_types(l, r)).collect())
        }
        _ => Ty::union_of(vec![a.clone(), b.clone()]),
    }
}

/// Remove `subtrahend` from a union `minuend`. A non-union minuend is
/// returned unchanged; removing every member yields `Never`.
pub fn subtract_types(minuend: &Ty, subtrahend: &Ty) -> Ty {
    let members = match minuend.unwrap_alias() {
        Ty::Union(members) => members,
        _ => return minuend.clone(),
    };
    let removed: Vec<&Ty> = match subtrahend.unwrap_alias() {
        Ty::Union(subs) => subs.iter().collect(),
        single => vec![single],
    };
    let rest: Vec<Ty> = members
        .iter()
        .filter(|m| !removed.iter().any(|r| *r == m.unwrap_alias()))
        .cloned()
        .collect();
    if rest.is_empty() {
        Ty::Never
    } else {
        Ty::union_of(rest)
    }
}

/// For a union-typed declaration, the variant an assigned value narrows to.
pub fn calculate_exact_variant_to_fit_rhs(declared: &Ty, rhs: &Ty) -> Option<Ty> {
    let members = match declared.unwrap_alias() {
        Ty::Union(members) => members,
        _ => return None,
    };
    if let Some(exact) = members.iter().find(|m| *m == rhs) {
        return Some(exact.clone());
    }
    members.iter().find(|m| m.can_accept(rhs)).cloned()
}

/// Narrowed type recorded after `lhs = rhs` for a smart-castable location.
pub fn calc_smartcast_on_assignment(declared: &Ty, rhs: &Ty) -> Ty {
    match declared.unwrap_alias() {
        Ty::Union(members) => {
            if let Some(variant) = calculate_exact_variant_to_fit_rhs(declared, rhs) {
                return variant;
            }
            // A union subset narrows to itself.
            if let Ty::Union(rhs_members) = rhs.unwrap_alias() {
                if rhs_members.iter().all(|r| members.contains(r)) {
                    return rhs.clone();
                }
            }
            declared.clone()
        }
        _ => declared.clone(),
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::Void => write!(f, "void"),
            Ty::Null => write!(f, "null"),
            Ty::Never => write!(f, "never"),
            Ty::Unknown => write!(f, "unknown"),
            Ty::Bool(None) => write!(f, "bool"),
            Ty::Bool(Some(v)) => write!(f, "{v}"),
            Ty::Int => write!(f, "int"),
            Ty::IntN { width, unsigned } => {
                write!(f, "{}int{width}", if *unsigned { "u" } else { "" })
            }
            Ty::VarIntN { width, unsigned } => {
                write!(f, "var{}int{width}", if *unsigned { "u" } else { "" })
            }
            Ty::Coins => write!(f, "coins"),
            Ty::BitsN(n) => write!(f, "bits{n}"),
            Ty::BytesN(n) => write!(f, "bytes{n}"),
            Ty::Str => write!(f, "string"),
            Ty::Builtin { name, .. }
            | Ty::Struct { name, .. }
            | Ty::Enum { name, .. }
            | Ty::Alias { name, .. }
            | Ty::TypeParam { name, .. } => write!(f, "{name}"),
            Ty::Tensor(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
            Ty::Tuple(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Ty::Union(members) => {
                if let Some(inner) = self.as_nullable() {
                    return match inner {
                        Ty::Fun { .. } | Ty::Union(_) => write!(f, "({inner})?"),
                        _ => write!(f, "{inner}?"),
                    };
                }
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        write!(f, " | ")?;
                    }
                    match member {
                        Ty::Fun { .. } => write!(f, "({member})")?,
                        _ => write!(f, "{member}")?,
                    }
                }
                Ok(())
            }
            Ty::Fun { params, ret } => {
                write!(f, "(")?;
                for (i, param) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{param}")?;
                }
                write!(f, ") -> {ret}")
            }
            Ty::Instantiation { inner, args } => {
                write!(f, "{inner}<")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ">")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_normalization() {
        // Nested unions flatten, duplicates collapse, singletons unwrap.
        let ty = Ty::union_of(vec![
            Ty::Int,
            Ty::union_of(vec![Ty::Null, Ty::Int]),
            Ty::Null,
        ]);
        match &ty {
            Ty::Union(members) => assert_eq!(members.len(), 2),
            other => panic!("expected union, got {other}"),
        }
        assert_eq!(Ty::union_of(vec![Ty::Int, Ty::Int]), Ty::Int);
        assert_eq!(Ty::union_of(vec![]), Ty::Never);
    }

    #[test]
    fn union_equality_is_order_independent() {
        let a = Ty::union_of(vec![Ty::Int, Ty::Null]);
        let b = Ty::union_of(vec![Ty::Null, Ty::Int]);
        assert_eq!(a, b);
    }

    #[test]
    fn nullable_display() {
        assert_eq!(Ty::nullable(Ty::Int).to_string(), "int?");
        assert_eq!(
            Ty::union_of(vec![Ty::Int, Ty::Coins, Ty::Null]).to_string(),
            "int | coins | null"
        );
    }

    #[test]
    fn join_basics() {
        assert_eq!(join_types(&Ty::Int, &Ty::Int), Ty::Int);
        assert_eq!(join_types(&Ty::Never, &Ty::Int), Ty::Int);
        assert_eq!(join_types(&Ty::Unknown, &Ty::Int), Ty::Unknown);
        assert_eq!(
            join_types(&Ty::bool_literal(true), &Ty::bool_literal(false)),
            Ty::bool()
        );
        assert_eq!(
            join_types(&Ty::Int, &Ty::Null),
            Ty::nullable(Ty::Int)
        );
    }

    #[test]
    fn join_tensors_elementwise() {
        let a = Ty::Tensor(vec![Ty::Int, Ty::bool_literal(true)]);
        let b = Ty::Tensor(vec![Ty::Int, Ty::bool_literal(false)]);
        assert_eq!(join_types(&a, &b), Ty::Tensor(vec![Ty::Int, Ty::bool()]));
    }

    #[test]
    fn subtract_union_members() {
        let ty = Ty::union_of(vec![Ty::Int, Ty::Coins, Ty::Null]);
        assert_eq!(
            subtract_types(&ty, &Ty::Null),
            Ty::union_of(vec![Ty::Int, Ty::Coins])
        );
        assert_eq!(subtract_types(&Ty::nullable(Ty::Int), &Ty::Null), Ty::Int);
        assert_eq!(subtract_types(&Ty::Int, &Ty::Int), Ty::Int);
        assert_eq!(
            subtract_types(&Ty::nullable(Ty::Int), &Ty::nullable(Ty::Int)),
            Ty::Never
        );
    }

    #[test]
    fn substitution_is_idempotent_on_concrete_results() {
        let mut mapping = FxHashMap::default();
        mapping.insert("T".to_owned(), Ty::Int);
        let decl = Decl::synthetic();
        let ty = Ty::Tuple(vec![
            Ty::TypeParam {
                name: "T".to_owned(),
                decl,
                default: None,
            },
            Ty::Coins,
        ]);
        let once = ty.substitute(&mapping);
        assert_eq!(once, Ty::Tuple(vec![Ty::Int, Ty::Coins]));
        assert_eq!(once.substitute(&mapping), once);
        assert!(!once.has_generics());
    }

    #[test]
    fn substitution_renormalizes_unions() {
        let mut mapping = FxHashMap::default();
        mapping.insert("T".to_owned(), Ty::Int);
        let ty = Ty::Union(vec![
            Ty::TypeParam {
                name: "T".to_owned(),
                decl: Decl::synthetic(),
                default: None,
            },
            Ty::Int,
        ]);
        assert_eq!(ty.substitute(&mapping), Ty::Int);
    }

    #[test]
    fn assignability() {
        assert!(Ty::Int.can_accept(&Ty::IntN {
            width: 32,
            unsigned: false
        }));
        assert!(Ty::nullable(Ty::Int).can_accept(&Ty::Null));
        assert!(Ty::nullable(Ty::Int).can_accept(&Ty::Int));
        assert!(!Ty::Int.can_accept(&Ty::bool()));
        assert!(Ty::Int.can_accept(&Ty::Never));
    }

    #[test]
    fn exact_variant_fit() {
        let declared = Ty::union_of(vec![Ty::Int, Ty::Coins, Ty::Null]);
        assert_eq!(
            calculate_exact_variant_to_fit_rhs(&declared, &Ty::Coins),
            Some(Ty::Coins)
        );
        assert_eq!(calculate_exact_variant_to_fit_rhs(&declared, &Ty::bool()), None);
    }
}
