use crate::term::{Substitution, Term};
use indexmap::{IndexMap, IndexSet};
use log::{debug, trace};
use std::fmt;
use thiserror::Error;

/// Errors raised while building the clause database.
///
/// Resolution itself has no error cases: unification mismatch and goals with
/// no matching clause are finite failure, expressed as empty results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Clause heads must be an atom or a compound term.
    #[error("clause head `{0}` is not callable")]
    HeadNotCallable(Term),
}

/// A Horn clause `head :- body.`; a fact is a clause whose body is `true`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Clause {
    /// The conclusion of the clause.
    pub head: Term,
    /// The condition under which the head holds; `Term::True` for facts.
    pub body: Term,
}

impl Clause {
    /// Creates a fact `head.`.
    #[must_use]
    pub fn fact(head: Term) -> Self {
        Self {
            head,
            body: Term::True,
        }
    }

    /// Creates a rule `head :- body.`.
    #[must_use]
    pub fn rule(head: Term, body: Term) -> Self {
        Self { head, body }
    }

    /// A copy with every variable renamed for one clause selection.
    fn renamed(&self, stamp: usize) -> Clause {
        Clause {
            head: self.head.renamed(stamp),
            body: self.body.renamed(stamp),
        }
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.body {
            Term::True => write!(f, "{}.", self.head),
            body => write!(f, "{} :- {}.", self.head, body),
        }
    }
}

/// The ordered clause database.
///
/// Declaration order is load-bearing: it fixes the order in which proofs
/// are enumerated (first clause first, depth first).
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClauseStore {
    clauses: Vec<Clause>,
}

impl ClauseStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a clause, rejecting heads that are not callable.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HeadNotCallable`] if the clause head is a
    /// variable, `true`, or a conjunction.
    pub fn add(&mut self, clause: Clause) -> Result<(), EngineError> {
        if !clause.head.is_callable() {
            return Err(EngineError::HeadNotCallable(clause.head));
        }
        self.clauses.push(clause);
        Ok(())
    }

    /// Number of stored clauses.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clauses.len()
    }

    /// Whether the store holds no clauses.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Iterates over the clauses in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Clause> {
        self.clauses.iter()
    }

    /// One `(extended substitution, renamed body)` per clause whose freshly
    /// renamed head unifies with `goal` under `subst`, in declaration order.
    ///
    /// The goal is never mutated and a failed candidate's bindings are
    /// discarded before the next clause is tried. An empty result is finite
    /// failure, not an error.
    fn matching(
        &self,
        goal: &Term,
        subst: &Substitution,
        stamp: &mut usize,
    ) -> Vec<(Substitution, Term)> {
        let indicator = goal.indicator();
        let mut out = Vec::new();
        for clause in &self.clauses {
            if clause.head.indicator() != indicator {
                continue;
            }
            *stamp += 1;
            let renamed = clause.renamed(*stamp);
            if let Some(extended) = subst.unify(goal, &renamed.head) {
                out.push((extended, renamed.body));
            }
        }
        out
    }
}

/// A proof tree for one derivation of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Proof {
    /// Proof of the trivial goal `true`; the leaf under every fact.
    Axiom,
    /// Proof of a two-part conjunction, one branch per conjunct.
    Conj(Box<Proof>, Box<Proof>),
    /// A goal solved via a clause whose body is proved by the inner proof.
    Derivation(Term, Box<Proof>),
}

impl Proof {
    /// Proof of a conjunction from proofs of both conjuncts.
    #[must_use]
    pub fn conj(left: Proof, right: Proof) -> Self {
        Proof::Conj(Box::new(left), Box::new(right))
    }

    /// Proof of `goal` from a proof of the selected clause's body.
    #[must_use]
    pub fn derivation(goal: Term, body: Proof) -> Self {
        Proof::Derivation(goal, Box::new(body))
    }
}

impl fmt::Display for Proof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proof::Axiom => write!(f, "true"),
            Proof::Conj(left, right) => write!(f, "({left}, {right})"),
            Proof::Derivation(goal, body) => write!(f, "[{goal} <- {body}]"),
        }
    }
}

/// One alternative in a goal's disjunction: the instantiated goal plus the
/// proof deriving it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Answer {
    goal: Term,
    proof: Proof,
}

/// The lattice value of one table entry: the disjunction of proof
/// alternatives found so far. Join is idempotent, so structurally equal
/// alternatives collapse, and insertion order is preserved.
#[derive(Debug, Clone, Default)]
struct Alternatives {
    answers: IndexSet<Answer>,
}

impl Alternatives {
    /// Joins one alternative into the disjunction; true if it was new.
    fn join(&mut self, answer: Answer) -> bool {
        self.answers.insert(answer)
    }

    fn iter(&self) -> impl Iterator<Item = &Answer> {
        self.answers.iter()
    }

    fn len(&self) -> usize {
        self.answers.len()
    }
}

/// Outcome of a table lookup, mirroring the three cache states the resolver
/// distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheStatus {
    /// Never seen; the entry is now marked in-progress.
    Absent,
    /// Currently being expanded higher up the call stack (a cycle).
    InProgress,
    /// Fully expanded earlier in this query.
    Known,
}

#[derive(Debug, Default)]
struct TableEntry {
    complete: bool,
    value: Alternatives,
}

/// Per-query memo table keyed by canonical goal signature.
///
/// Entries only grow (by idempotent join) while a query runs; the whole
/// table is discarded when the query's enumeration completes, so partial
/// states never leak between top-level queries.
#[derive(Debug, Default)]
struct TablingCache {
    entries: IndexMap<Term, TableEntry>,
}

impl TablingCache {
    /// Looks up a signature, marking it in-progress when absent so a
    /// recursive re-entry observes the partial value instead of descending
    /// again.
    fn lookup_or_mark(&mut self, sig: &Term) -> CacheStatus {
        match self.entries.get(sig) {
            Some(entry) if entry.complete => CacheStatus::Known,
            Some(_) => CacheStatus::InProgress,
            None => {
                self.entries.insert(sig.clone(), TableEntry::default());
                CacheStatus::Absent
            }
        }
    }

    /// Joins a new alternative into the entry's lattice value.
    fn join(&mut self, sig: &Term, answer: Answer) -> bool {
        self.entries
            .get_mut(sig)
            .is_some_and(|entry| entry.value.join(answer))
    }

    /// Freezes an entry once every clause for its signature was expanded.
    fn complete(&mut self, sig: &Term) {
        if let Some(entry) = self.entries.get_mut(sig) {
            entry.complete = true;
        }
    }

    /// The alternatives accumulated for a signature so far.
    fn answers(&self, sig: &Term) -> Vec<Answer> {
        self.entries
            .get(sig)
            .map(|entry| entry.value.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn answer_count(&self, sig: &Term) -> usize {
        self.entries.get(sig).map_or(0, |entry| entry.value.len())
    }
}

/// Depth-first SLD resolution with tabling.
///
/// Owns the per-query cache and borrows the clause store; one resolver
/// serves exactly one top-level query.
#[derive(Debug)]
struct Resolver<'a> {
    store: &'a ClauseStore,
    table: TablingCache,
    stamp: usize,
}

impl<'a> Resolver<'a> {
    fn new(store: &'a ClauseStore) -> Self {
        Self {
            store,
            table: TablingCache::default(),
            stamp: 0,
        }
    }

    /// All proofs of `goal` under `subst`, in deterministic first-clause,
    /// depth-first order, paired with their answer substitutions.
    fn solve(&mut self, goal: &Term, subst: &Substitution) -> Vec<(Substitution, Proof)> {
        let goal = subst.walk(goal);
        match &goal {
            Term::True => vec![(subst.clone(), Proof::Axiom)],
            Term::Conj(left, right) => {
                // All pairings: outer loop over proofs of the left conjunct.
                let mut out = Vec::new();
                for (left_subst, left_proof) in self.solve(left, subst) {
                    for (right_subst, right_proof) in self.solve(right, &left_subst) {
                        out.push((right_subst, Proof::conj(left_proof.clone(), right_proof)));
                    }
                }
                out
            }
            // An unbound goal cannot be resolved: finite failure.
            Term::Variable(_) => Vec::new(),
            Term::Atom(_) | Term::Compound(..) => self.solve_callable(&goal, subst),
        }
    }

    fn solve_callable(&mut self, goal: &Term, subst: &Substitution) -> Vec<(Substitution, Proof)> {
        let instantiated = subst.apply(goal);
        let sig = instantiated.canonical();
        match self.table.lookup_or_mark(&sig) {
            CacheStatus::Known => {
                trace!("table hit for {instantiated}");
                self.replay(&sig, &instantiated, subst)
            }
            CacheStatus::InProgress => {
                // Cycle: yield what the in-progress entry holds so far
                // instead of descending again.
                trace!("cycle on {instantiated}; replaying partial answers");
                self.replay(&sig, &instantiated, subst)
            }
            CacheStatus::Absent => {
                trace!("expanding {instantiated}");
                let mut out = Vec::new();
                for (head_subst, body) in
                    self.store.matching(&instantiated, subst, &mut self.stamp)
                {
                    for (body_subst, body_proof) in self.solve(&body, &head_subst) {
                        let answer_goal = body_subst.apply(&instantiated);
                        let proof = Proof::derivation(answer_goal.clone(), body_proof);
                        self.table.join(
                            &sig,
                            Answer {
                                goal: answer_goal,
                                proof: proof.clone(),
                            },
                        );
                        out.push((body_subst, proof));
                    }
                }
                self.table.complete(&sig);
                trace!(
                    "completed {instantiated} with {} alternatives",
                    self.table.answer_count(&sig)
                );
                out
            }
        }
    }

    /// Replays tabled answers against the current goal instance.
    ///
    /// An answer's residual variables are stamped fresh per replay, like any
    /// other clause instantiation, so two consumers of one table entry never
    /// alias bindings.
    fn replay(&mut self, sig: &Term, goal: &Term, subst: &Substitution) -> Vec<(Substitution, Proof)> {
        let mut out = Vec::new();
        for answer in self.table.answers(sig) {
            self.stamp += 1;
            let fresh = answer.goal.renamed(self.stamp);
            if let Some(extended) = subst.unify(goal, &fresh) {
                out.push((extended, answer.proof));
            }
        }
        out
    }
}

/// One way the query holds.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Solution {
    /// The query with the answer substitution applied.
    pub goal: Term,
    /// Bindings for the query's own variables, in first-occurrence order.
    pub bindings: IndexMap<String, Term>,
    /// The proof tree deriving this answer.
    pub proof: Proof,
}

/// The tabled proof-enumeration engine.
///
/// Holds the clause database; every call to [`TablingEngine::prove`] runs
/// with a fresh memo table, so results never leak between queries.
#[derive(Debug, Clone, Default)]
pub struct TablingEngine {
    store: ClauseStore,
}

impl TablingEngine {
    /// Creates an engine with an empty clause database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine over an already populated store.
    #[must_use]
    pub fn with_store(store: ClauseStore) -> Self {
        Self { store }
    }

    /// Adds a fact `head.`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HeadNotCallable`] if `head` is not an atom or
    /// compound term.
    pub fn add_fact(&mut self, head: Term) -> Result<(), EngineError> {
        self.store.add(Clause::fact(head))
    }

    /// Adds a rule `head :- body.`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HeadNotCallable`] if `head` is not an atom or
    /// compound term.
    pub fn add_rule(&mut self, head: Term, body: Term) -> Result<(), EngineError> {
        self.store.add(Clause::rule(head, body))
    }

    /// Adds a prebuilt clause.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::HeadNotCallable`] if the clause head is not an
    /// atom or compound term.
    pub fn add_clause(&mut self, clause: Clause) -> Result<(), EngineError> {
        self.store.add(clause)
    }

    /// The clause database in declaration order.
    #[must_use]
    pub fn clauses(&self) -> &ClauseStore {
        &self.store
    }

    /// Enumerates every distinct proof of `query`.
    ///
    /// The resolver's answer sequence is drained exhaustively with a memo
    /// table created for this call alone; structurally identical proofs
    /// collapse, so each derivation appears exactly once. For a fixed
    /// database the result is deterministic: identical calls return
    /// identical ordered sequences.
    #[must_use]
    pub fn prove(&self, query: &Term) -> Vec<Solution> {
        let mut resolver = Resolver::new(&self.store);
        let empty = Substitution::new();
        let query_vars = query.variables();

        let mut seen = IndexSet::new();
        let mut out = Vec::new();
        for (subst, proof) in resolver.solve(query, &empty) {
            if !seen.insert(proof.clone()) {
                continue;
            }
            let mut bindings = IndexMap::new();
            for name in &query_vars {
                let value = subst.apply(&Term::Variable(name.clone()));
                if !matches!(value, Term::Variable(_)) {
                    bindings.insert(name.clone(), value);
                }
            }
            out.push(Solution {
                goal: subst.apply(query),
                bindings,
                proof,
            });
        }
        debug!("{} distinct proofs for {query}", out.len());
        out
    }

    /// The bare proof trees for `query`, for consumers that only need the
    /// proof set (e.g. a probability layer summing over derivations).
    #[must_use]
    pub fn proofs(&self, query: &Term) -> Vec<Proof> {
        self.prove(query).into_iter().map(|s| s.proof).collect()
    }

    /// Whether `query` has at least one proof.
    #[must_use]
    pub fn ask(&self, query: &Term) -> bool {
        !self.prove(query).is_empty()
    }
}
