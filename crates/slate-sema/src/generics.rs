//! Structural deduction of generic substitutions.
//!
//! Walks a declared parameter type and an argument type in parallel and
//! collects name-to-type mappings for the type parameters encountered.
//! Deduction is best-effort: shapes that do not line up simply contribute
//! nothing, and the caller observes leftover type parameters.

use rustc_hash::FxHashMap;

use crate::ty::Ty;

#[derive(Debug, Default, Clone)]
pub struct Deduction {
    mapping: FxHashMap<String, Ty>,
}

impl Deduction {
    pub fn new() -> Deduction {
        Deduction::default()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Ty> {
        self.mapping.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: Ty) {
        self.mapping.insert(name.into(), ty);
    }

    /// Apply the collected mapping to `ty`.
    pub fn substitute(&self, ty: &Ty) -> Ty {
        ty.substitute(&self.mapping)
    }

    pub fn mapping(&self) -> &FxHashMap<String, Ty> {
        &self.mapping
    }

    /// Fill unmapped parameters from their declared defaults.
    pub fn fill_defaults<'a>(&mut self, params: impl Iterator<Item = (&'a str, Option<&'a Ty>)>) {
        for (name, default) in params {
            if !self.mapping.contains_key(name) {
                if let Some(default) = default {
                    let substituted = self.substitute(default);
                    self.mapping.insert(name.to_owned(), substituted);
                }
            }
        }
    }

    /// Deduce mappings by matching `param` against `arg`.
    pub fn deduce(&mut self, param: &Ty, arg: &Ty) {
        // A bare type parameter is handled before alias unwrapping so its
        // declared default stays visible.
        if let Ty::TypeParam { name, default, .. } = param {
            match self.mapping.get(name) {
                // A concrete earlier deduction wins over later ones.
                Some(prev) if !prev.is_never() && !matches!(prev, Ty::TypeParam { .. }) => return,
                _ => {}
            }
            match arg {
                Ty::TypeParam { name: arg_name, .. } if arg_name == name => {
                    if let Some(default) = default {
                        let d = (**default).clone();
                        self.mapping.insert(name.clone(), d);
                    }
                }
                _ => {
                    self.mapping.insert(name.clone(), arg.clone());
                }
            }
            return;
        }
        let param = param.unwrap_alias();
        let arg = arg.unwrap_alias();
        match (param, arg) {
            (
                Ty::Instantiation { args: pa, .. },
                Ty::Instantiation { args: aa, .. },
            ) => {
                for (p, a) in pa.iter().zip(aa) {
                    self.deduce(p, a);
                }
            }
            (
                Ty::Fun { params: pp, ret: pr },
                Ty::Fun { params: ap, ret: ar },
            ) => {
                for (p, a) in pp.iter().zip(ap) {
                    self.deduce(p, a);
                }
                self.deduce(pr, ar);
            }
            (Ty::Tensor(pi), Ty::Tensor(ai)) | (Ty::Tuple(pi), Ty::Tuple(ai))
                if pi.len() == ai.len() =>
            {
                for (p, a) in pi.iter().zip(ai) {
                    self.deduce(p, a);
                }
            }
            (Ty::Union(members), Ty::Union(arg_members)) => {
                self.deduce_union_vs_union(members, arg_members);
            }
            (Ty::Union(members), _) => {
                for member in members {
                    self.deduce(member, arg);
                }
            }
            _ => {}
        }
    }

    /// Union-against-union: concrete parameter members cancel equal argument
    /// members; what remains is attributed to the generic members when the
    /// shapes allow it, otherwise nothing is deduced.
    fn deduce_union_vs_union(&mut self, members: &[Ty], arg_members: &[Ty]) {
        let mut residual: Vec<&Ty> = arg_members.iter().collect();
        let mut generic_members: Vec<&Ty> = Vec::new();
        for member in members {
            if member.has_generics() {
                generic_members.push(member);
            } else if let Some(pos) = residual.iter().position(|a| *a == member) {
                residual.remove(pos);
            }
        }
        if generic_members.len() == 1 && residual.len() > 1 {
            let rest = Ty::union_of(residual.into_iter().cloned().collect());
            self.deduce(generic_members[0], &rest);
        } else if generic_members.len() == residual.len() {
            for (p, a) in generic_members.into_iter().zip(residual) {
                self.deduce(p, a);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decl::Decl;

    fn t(name: &str) -> Ty {
        Ty::TypeParam {
            name: name.to_owned(),
            decl: Decl::synthetic(),
            default: None,
        }
    }

    #[test]
    fn bare_parameter_maps_to_argument() {
        let mut d = Deduction::new();
        d.deduce(&t("T"), &Ty::Int);
        assert_eq!(d.get("T"), Some(&Ty::Int));
    }

    #[test]
    fn earlier_concrete_mapping_wins() {
        let mut d = Deduction::new();
        d.deduce(&t("T"), &Ty::Int);
        d.deduce(&t("T"), &Ty::Coins);
        assert_eq!(d.get("T"), Some(&Ty::Int));
    }

    #[test]
    fn self_mapping_uses_declared_default() {
        let param = Ty::TypeParam {
            name: "T".to_owned(),
            decl: Decl::synthetic(),
            default: Some(Box::new(Ty::Int)),
        };
        let mut d = Deduction::new();
        d.deduce(&param, &t("T"));
        assert_eq!(d.get("T"), Some(&Ty::Int));
    }

    #[test]
    fn tensors_deduce_elementwise() {
        let mut d = Deduction::new();
        d.deduce(
            &Ty::Tensor(vec![t("A"), t("B")]),
            &Ty::Tensor(vec![Ty::Int, Ty::Coins]),
        );
        assert_eq!(d.get("A"), Some(&Ty::Int));
        assert_eq!(d.get("B"), Some(&Ty::Coins));
    }

    #[test]
    fn union_parameter_distributes_over_plain_argument() {
        let mut d = Deduction::new();
        let param = Ty::Union(vec![t("T"), Ty::Null]);
        d.deduce(&param, &Ty::Int);
        assert_eq!(d.get("T"), Some(&Ty::Int));
    }

    #[test]
    fn union_vs_union_single_generic_takes_residual() {
        let mut d = Deduction::new();
        let param = Ty::Union(vec![t("T"), Ty::Null]);
        let arg = Ty::Union(vec![Ty::Int, Ty::Coins, Ty::Null]);
        d.deduce(&param, &arg);
        assert_eq!(d.get("T"), Some(&Ty::union_of(vec![Ty::Int, Ty::Coins])));
    }

    #[test]
    fn union_vs_union_positional_when_counts_match() {
        let mut d = Deduction::new();
        let param = Ty::Union(vec![t("A"), t("B"), Ty::Null]);
        let arg = Ty::Union(vec![Ty::Int, Ty::Coins, Ty::Null]);
        d.deduce(&param, &arg);
        assert_eq!(d.get("A"), Some(&Ty::Int));
        assert_eq!(d.get("B"), Some(&Ty::Coins));
    }

    #[test]
    fn ambiguous_union_shapes_deduce_nothing() {
        let mut d = Deduction::new();
        let param = Ty::Union(vec![t("A"), t("B")]);
        let arg = Ty::Union(vec![Ty::Int, Ty::Coins, Ty::Null]);
        d.deduce(&param, &arg);
        assert!(d.is_empty());
    }

    #[test]
    fn defaults_fill_unmapped_parameters() {
        let mut d = Deduction::new();
        d.deduce(&t("A"), &Ty::Int);
        let default = t("A");
        d.fill_defaults(vec![("A", None), ("B", Some(&default))].into_iter());
        // B's default refers to A, so it picks up A's deduced value.
        assert_eq!(d.get("B"), Some(&Ty::Int));
    }
}
