use indexmap::{IndexMap, IndexSet};
use std::fmt;

/// A first-order term, which doubles as a goal when resolved.
///
/// The trivial goal and two-part conjunctions are dedicated variants so the
/// resolver dispatches on term shape: once a structural case matches, no
/// clause lookup is attempted for that goal.
#[derive(Debug, Clone, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Term {
    /// The trivial goal; also the body of a fact.
    True,
    /// A logic variable (e.g. `X`), scoped per clause instantiation.
    Variable(String),
    /// An atom constant (e.g. `alice`, `1`).
    Atom(String),
    /// A functor applied to a fixed-arity argument list (e.g. `edge(a, X)`).
    Compound(String, Vec<Term>),
    /// A two-part conjunctive goal `(A, B)`.
    Conj(Box<Term>, Box<Term>),
}

impl Term {
    /// Creates a variable term.
    pub fn var(name: impl Into<String>) -> Self {
        Term::Variable(name.into())
    }

    /// Creates an atom term.
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    /// Creates a compound term from a functor and its arguments.
    pub fn app(functor: impl Into<String>, args: impl IntoIterator<Item = Term>) -> Self {
        Term::Compound(functor.into(), args.into_iter().collect())
    }

    /// Creates a two-part conjunction `(left, right)`.
    #[must_use]
    pub fn conj(left: Term, right: Term) -> Self {
        Term::Conj(Box::new(left), Box::new(right))
    }

    /// Whether the term may appear as a clause head or be resolved against
    /// the clause store.
    #[must_use]
    pub fn is_callable(&self) -> bool {
        matches!(self, Term::Atom(_) | Term::Compound(..))
    }

    /// Functor and arity of a callable term; `None` for everything else.
    #[must_use]
    pub fn indicator(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(name) => Some((name, 0)),
            Term::Compound(functor, args) => Some((functor, args.len())),
            _ => None,
        }
    }

    /// Variable names in first-occurrence order, without duplicates.
    #[must_use]
    pub fn variables(&self) -> Vec<String> {
        let mut seen = IndexSet::new();
        self.collect_variables(&mut seen);
        seen.into_iter().collect()
    }

    fn collect_variables(&self, seen: &mut IndexSet<String>) {
        match self {
            Term::Variable(name) => {
                seen.insert(name.clone());
            }
            Term::Compound(_, args) => {
                for arg in args {
                    arg.collect_variables(seen);
                }
            }
            Term::Conj(left, right) => {
                left.collect_variables(seen);
                right.collect_variables(seen);
            }
            Term::True | Term::Atom(_) => {}
        }
    }

    /// Renames every variable with a per-instantiation stamp so distinct
    /// selections of the same clause never alias bindings.
    pub(crate) fn renamed(&self, stamp: usize) -> Term {
        match self {
            Term::Variable(name) => Term::Variable(format!("{name}#{stamp}")),
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| arg.renamed(stamp)).collect(),
            ),
            Term::Conj(left, right) => Term::conj(left.renamed(stamp), right.renamed(stamp)),
            other => other.clone(),
        }
    }

    /// Canonical goal signature: variables renamed to `_0`, `_1`, ... in
    /// first-occurrence order, so goals differing only by variable names
    /// share one table entry.
    pub(crate) fn canonical(&self) -> Term {
        let mut seen = IndexMap::new();
        self.canonical_inner(&mut seen)
    }

    fn canonical_inner(&self, seen: &mut IndexMap<String, usize>) -> Term {
        match self {
            Term::Variable(name) => {
                let next = seen.len();
                let index = *seen.entry(name.clone()).or_insert(next);
                Term::Variable(format!("_{index}"))
            }
            Term::Compound(functor, args) => Term::Compound(
                functor.clone(),
                args.iter().map(|arg| arg.canonical_inner(seen)).collect(),
            ),
            Term::Conj(left, right) => Term::Conj(
                Box::new(left.canonical_inner(seen)),
                Box::new(right.canonical_inner(seen)),
            ),
            other => other.clone(),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::True => write!(f, "true"),
            Term::Variable(name) | Term::Atom(name) => write!(f, "{name}"),
            Term::Compound(functor, args) => {
                write!(f, "{functor}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Term::Conj(left, right) => write!(f, "({left}, {right})"),
        }
    }
}

/// A set of variable bindings produced by unification.
///
/// The API is persistent in style: [`Substitution::unify`] returns an
/// extended copy and leaves the receiver untouched, so a failed candidate
/// clause never contaminates the bindings the next candidate starts from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Substitution {
    bindings: IndexMap<String, Term>,
}

impl Substitution {
    /// Creates an empty substitution.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bound variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether no variable is bound.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// The binding for a variable name, if any.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Term> {
        self.bindings.get(name)
    }

    /// Dereferences a chain of variable bindings one level deep: the result
    /// is either a non-variable term or an unbound variable.
    pub(crate) fn walk(&self, term: &Term) -> Term {
        let mut current = term;
        while let Term::Variable(name) = current {
            match self.bindings.get(name) {
                Some(next) => current = next,
                None => break,
            }
        }
        current.clone()
    }

    /// Substitutes bindings throughout a term.
    ///
    /// With the occurs-check omitted, a variable bound to a structure
    /// containing itself would make this recurse without bound; such
    /// bindings do not arise from resolving well-formed clause databases.
    #[must_use]
    pub fn apply(&self, term: &Term) -> Term {
        match self.walk(term) {
            Term::Compound(functor, args) => Term::Compound(
                functor,
                args.iter().map(|arg| self.apply(arg)).collect(),
            ),
            Term::Conj(left, right) => Term::conj(self.apply(&left), self.apply(&right)),
            leaf => leaf,
        }
    }

    /// Structural unification under the current bindings.
    ///
    /// Returns the extended substitution on success and `None` on mismatch;
    /// failure is ordinary control flow driving backtracking, not an error.
    /// The occurs-check is omitted, matching the minimal semantics the
    /// engine needs.
    #[must_use]
    pub fn unify(&self, left: &Term, right: &Term) -> Option<Substitution> {
        let mut extended = self.clone();
        let ok = extended.unify_in_place(left, right);
        ok.then_some(extended)
    }

    fn unify_in_place(&mut self, left: &Term, right: &Term) -> bool {
        let left = self.walk(left);
        let right = self.walk(right);
        match (left, right) {
            (Term::True, Term::True) => true,
            (Term::Variable(x), Term::Variable(y)) if x == y => true,
            (Term::Variable(x), bound) | (bound, Term::Variable(x)) => {
                self.bindings.insert(x, bound);
                true
            }
            (Term::Atom(x), Term::Atom(y)) => x == y,
            (Term::Compound(f, xs), Term::Compound(g, ys)) => {
                f == g
                    && xs.len() == ys.len()
                    && xs.iter().zip(&ys).all(|(a, b)| self.unify_in_place(a, b))
            }
            (Term::Conj(a1, a2), Term::Conj(b1, b2)) => {
                self.unify_in_place(&a1, &b1) && self.unify_in_place(&a2, &b2)
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn f2(a: Term, b: Term) -> Term {
        Term::app("f", [a, b])
    }

    #[test]
    fn test_identical_atoms_unify() {
        let subst = Substitution::new().unify(&Term::atom("a"), &Term::atom("a"));
        assert_eq!(subst, Some(Substitution::new()));
    }

    #[test]
    fn test_distinct_atoms_fail() {
        assert!(Substitution::new()
            .unify(&Term::atom("a"), &Term::atom("b"))
            .is_none());
    }

    #[test]
    fn test_variable_binds_to_any_term() {
        let goal = Term::app("edge", [Term::atom("a"), Term::atom("b")]);
        let subst = Substitution::new().unify(&Term::var("X"), &goal).unwrap();
        assert_eq!(subst.apply(&Term::var("X")), goal);
    }

    #[test]
    fn test_compound_unification_recurses() {
        let left = f2(Term::var("X"), Term::atom("b"));
        let right = f2(Term::atom("a"), Term::var("Y"));
        let subst = Substitution::new().unify(&left, &right).unwrap();
        assert_eq!(subst.apply(&left), f2(Term::atom("a"), Term::atom("b")));
        assert_eq!(subst.apply(&left), subst.apply(&right));
    }

    #[test]
    fn test_arity_mismatch_fails() {
        let unary = Term::app("f", [Term::atom("a")]);
        let binary = f2(Term::atom("a"), Term::atom("b"));
        assert!(Substitution::new().unify(&unary, &binary).is_none());
    }

    #[test]
    fn test_functor_mismatch_fails() {
        let left = Term::app("f", [Term::atom("a")]);
        let right = Term::app("g", [Term::atom("a")]);
        assert!(Substitution::new().unify(&left, &right).is_none());
    }

    #[test]
    fn test_repeated_variable_constrains_both_positions() {
        let pattern = f2(Term::var("X"), Term::var("X"));
        assert!(Substitution::new()
            .unify(&pattern, &f2(Term::atom("a"), Term::atom("b")))
            .is_none());

        let subst = Substitution::new()
            .unify(&pattern, &f2(Term::atom("c"), Term::atom("c")))
            .unwrap();
        assert_eq!(subst.apply(&Term::var("X")), Term::atom("c"));
    }

    #[test]
    fn test_walk_follows_binding_chains() {
        let subst = Substitution::new()
            .unify(&Term::var("X"), &Term::var("Y"))
            .unwrap()
            .unify(&Term::var("Y"), &Term::atom("a"))
            .unwrap();
        assert_eq!(subst.apply(&Term::var("X")), Term::atom("a"));
    }

    #[test]
    fn test_failed_unification_leaves_input_untouched() {
        let subst = Substitution::new()
            .unify(&Term::var("X"), &Term::atom("a"))
            .unwrap();
        let before = subst.clone();
        assert!(subst.unify(&Term::var("X"), &Term::atom("b")).is_none());
        assert_eq!(subst, before);
    }

    #[test]
    fn test_apply_substitutes_deeply() {
        let subst = Substitution::new()
            .unify(&Term::var("X"), &Term::atom("a"))
            .unwrap();
        let nested = Term::app("p", [f2(Term::var("X"), Term::var("Y"))]);
        assert_eq!(
            subst.apply(&nested),
            Term::app("p", [f2(Term::atom("a"), Term::var("Y"))])
        );
    }

    #[test]
    fn test_conjunction_unifies_componentwise() {
        let left = Term::conj(Term::app("p", [Term::var("X")]), Term::app("q", [Term::var("X")]));
        let right = Term::conj(
            Term::app("p", [Term::atom("a")]),
            Term::app("q", [Term::var("Z")]),
        );
        let subst = Substitution::new().unify(&left, &right).unwrap();
        assert_eq!(subst.apply(&Term::var("Z")), Term::atom("a"));
    }

    #[test]
    fn test_canonical_identifies_renamed_variants() {
        let left = Term::app("p", [Term::var("X"), f2(Term::var("X"), Term::var("Y"))]);
        let right = Term::app("p", [Term::var("A"), f2(Term::var("A"), Term::var("B"))]);
        assert_eq!(left.canonical(), right.canonical());

        let other = Term::app("p", [Term::var("X"), f2(Term::var("Y"), Term::var("Y"))]);
        assert_ne!(left.canonical(), other.canonical());
    }

    #[test]
    fn test_canonical_preserves_ground_structure() {
        let ground = Term::app("edge", [Term::atom("a"), Term::atom("b")]);
        assert_eq!(ground.canonical(), ground);
    }

    #[test]
    fn test_renamed_stamps_every_variable() {
        let body = Term::conj(
            Term::app("a", [Term::var("X")]),
            Term::app("b", [Term::var("X")]),
        );
        let renamed = body.renamed(3);
        assert_eq!(renamed.variables(), vec!["X#3".to_string()]);
        assert_ne!(renamed, body);
    }

    #[test]
    fn test_variables_in_first_occurrence_order() {
        let term = Term::app(
            "p",
            [Term::var("Y"), Term::var("X"), f2(Term::var("Y"), Term::var("Z"))],
        );
        assert_eq!(
            term.variables(),
            vec!["Y".to_string(), "X".to_string(), "Z".to_string()]
        );
    }

    #[test]
    fn test_indicator_and_callable() {
        assert_eq!(Term::atom("a").indicator(), Some(("a", 0)));
        let edge = Term::app("edge", [Term::atom("a"), Term::atom("b")]);
        assert_eq!(edge.indicator(), Some(("edge", 2)));
        assert!(edge.is_callable());
        assert!(!Term::True.is_callable());
        assert!(!Term::var("X").is_callable());
        assert_eq!(Term::conj(Term::True, Term::True).indicator(), None);
    }

    #[test]
    fn test_display_notation() {
        let goal = Term::conj(
            Term::app("a", [Term::var("X")]),
            Term::app("b", [Term::atom("1")]),
        );
        assert_eq!(goal.to_string(), "(a(X), b(1))");
        assert_eq!(Term::True.to_string(), "true");
        assert_eq!(Term::atom("d").to_string(), "d");
    }

    fn term_strategy() -> impl Strategy<Value = Term> {
        let leaf = prop_oneof![
            "[a-d]".prop_map(|name| Term::atom(name)),
            "[X-Z]".prop_map(|name| Term::var(name)),
        ];
        leaf.prop_recursive(3, 12, 3, |inner| {
            ("[f-h]", prop::collection::vec(inner, 1..=3))
                .prop_map(|(functor, args)| Term::app(functor, args))
        })
    }

    fn ground_strategy() -> impl Strategy<Value = Term> {
        let leaf = "[a-d]".prop_map(|name| Term::atom(name));
        leaf.prop_recursive(3, 12, 3, |inner| {
            ("[f-h]", prop::collection::vec(inner, 1..=3))
                .prop_map(|(functor, args)| Term::app(functor, args))
        })
    }

    proptest! {
        #[test]
        fn prop_canonical_invariant_under_renaming(term in term_strategy(), stamp in 1usize..64) {
            prop_assert_eq!(term.canonical(), term.renamed(stamp).canonical());
        }

        #[test]
        fn prop_ground_terms_self_unify_without_bindings(term in ground_strategy()) {
            let subst = Substitution::new().unify(&term, &term);
            prop_assert_eq!(subst, Some(Substitution::new()));
        }

        #[test]
        fn prop_fresh_variable_captures_ground_term(term in ground_strategy()) {
            let subst = Substitution::new().unify(&Term::var("Goal"), &term).unwrap();
            prop_assert_eq!(subst.apply(&Term::var("Goal")), term);
        }
    }
}
