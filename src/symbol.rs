//! Symbols and the runtime constant pool.
//!
//! The pool is an append-only sequence of functor and predicate symbols;
//! index 0 is reserved. Functor symbols are identified structurally by
//! (name, arity). Predicate symbols additionally point at the first record
//! of their clause chain; clause records live in a separate arena and link
//! to the next alternative by index.

/// A functor symbol: name plus arity. An atom is a functor of arity 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Functor {
    pub name: String,
    pub arity: usize,
}

impl Functor {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
        }
    }
}

impl std::fmt::Display for Functor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.name, self.arity)
    }
}

/// A predicate symbol: the set of clauses sharing one head functor.
#[derive(Debug, Clone)]
pub struct Predicate {
    pub name: String,
    pub arity: usize,
    /// First record of the clause chain, if any clause has been defined.
    pub first: Option<usize>,
    /// Last record of the chain; new clauses append here.
    pub last: Option<usize>,
}

/// A compiled clause: frame shape plus the offset of its bytecode.
#[derive(Debug, Clone)]
pub struct ClauseRec {
    /// Arity of the head literal.
    pub params: usize,
    /// Number of distinct variables in the clause.
    pub locals: usize,
    /// Offset into the code area of this clause's bytecode.
    pub code: usize,
    /// The next clause alternative for the same predicate.
    pub next: Option<usize>,
}

/// A constant-pool entry.
#[derive(Debug, Clone)]
pub enum PoolEntry {
    /// Index 0, never referenced.
    Reserved,
    Functor(Functor),
    Predicate(Predicate),
}

/// The runtime constant pool plus the clause arena.
pub struct ConstantPool {
    entries: Vec<PoolEntry>,
    clauses: Vec<ClauseRec>,
}

impl ConstantPool {
    pub fn new() -> Self {
        Self {
            entries: vec![PoolEntry::Reserved],
            clauses: Vec::new(),
        }
    }

    /// Number of pool entries, including the reserved slot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no symbols beyond the reserved slot are present.
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// Number of clause records in the arena.
    pub fn clause_count(&self) -> usize {
        self.clauses.len()
    }

    /// Returns the index of the functor symbol (name, arity), appending it
    /// if no equal entry exists.
    pub fn functor_index(&mut self, name: &str, arity: usize) -> usize {
        let found = self.entries.iter().position(|e| match e {
            PoolEntry::Functor(f) => f.name == name && f.arity == arity,
            _ => false,
        });
        match found {
            Some(index) => index,
            None => {
                self.entries
                    .push(PoolEntry::Functor(Functor::new(name, arity)));
                self.entries.len() - 1
            }
        }
    }

    /// Returns the index of the predicate symbol (name, arity), appending an
    /// entry with an empty clause chain if none exists.
    pub fn predicate_index(&mut self, name: &str, arity: usize) -> usize {
        let found = self.entries.iter().position(|e| match e {
            PoolEntry::Predicate(p) => p.name == name && p.arity == arity,
            _ => false,
        });
        match found {
            Some(index) => index,
            None => {
                self.entries.push(PoolEntry::Predicate(Predicate {
                    name: name.to_string(),
                    arity,
                    first: None,
                    last: None,
                }));
                self.entries.len() - 1
            }
        }
    }

    /// Appends a clause record for the predicate at `pred_index` and links
    /// it onto the end of the predicate's chain.
    pub fn add_clause(&mut self, pred_index: usize, params: usize) -> usize {
        let index = self.clauses.len();
        self.clauses.push(ClauseRec {
            params,
            locals: 0,
            code: 0,
            next: None,
        });
        let pred = match &mut self.entries[pred_index] {
            PoolEntry::Predicate(p) => p,
            other => panic!("pool entry {} is not a predicate: {:?}", pred_index, other),
        };
        match pred.last.replace(index) {
            Some(prev) => self.clauses[prev].next = Some(index),
            None => pred.first = Some(index),
        }
        index
    }

    /// The functor symbol at `index`. Anything else there is a bytecode
    /// invariant violation.
    pub fn functor(&self, index: usize) -> &Functor {
        match &self.entries[index] {
            PoolEntry::Functor(f) => f,
            other => panic!("pool entry {} is not a functor: {:?}", index, other),
        }
    }

    /// The predicate symbol at `index`. Anything else there is a bytecode
    /// invariant violation.
    pub fn predicate(&self, index: usize) -> &Predicate {
        match &self.entries[index] {
            PoolEntry::Predicate(p) => p,
            other => panic!("pool entry {} is not a predicate: {:?}", index, other),
        }
    }

    pub fn clause(&self, index: usize) -> &ClauseRec {
        &self.clauses[index]
    }

    pub fn clause_mut(&mut self, index: usize) -> &mut ClauseRec {
        &mut self.clauses[index]
    }

    /// Iterates over predicate entries (index, predicate).
    pub fn predicates(&self) -> impl Iterator<Item = (usize, &Predicate)> {
        self.entries.iter().enumerate().filter_map(|(i, e)| match e {
            PoolEntry::Predicate(p) => Some((i, p)),
            _ => None,
        })
    }

    /// Truncates the pool and clause arena back to the given lengths.
    /// Surviving predicates never chain into truncated clause records, as
    /// clauses are only ever added to predicates registered in the same
    /// compilation unit.
    pub fn truncate(&mut self, pool_len: usize, clause_count: usize) {
        self.entries.truncate(pool_len);
        self.clauses.truncate(clause_count);
    }
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_zero_is_reserved() {
        let mut pool = ConstantPool::new();
        assert_eq!(pool.len(), 1);
        assert!(pool.functor_index("zeus", 0) > 0);
    }

    #[test]
    fn test_functor_interning() {
        let mut pool = ConstantPool::new();
        let a = pool.functor_index("father", 2);
        let b = pool.functor_index("zeus", 0);
        let c = pool.functor_index("father", 2);
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(pool.functor(a).to_string(), "father/2");
    }

    #[test]
    fn test_same_name_different_arity() {
        let mut pool = ConstantPool::new();
        let a = pool.functor_index("father", 2);
        let b = pool.functor_index("father", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_functors_and_predicates_are_distinct() {
        let mut pool = ConstantPool::new();
        let f = pool.functor_index("father", 2);
        let p = pool.predicate_index("father", 2);
        assert_ne!(f, p);
        assert_eq!(pool.predicate_index("father", 2), p);
    }

    #[test]
    fn test_clause_chain() {
        let mut pool = ConstantPool::new();
        let pred = pool.predicate_index("father", 2);
        let c1 = pool.add_clause(pred, 2);
        let c2 = pool.add_clause(pred, 2);
        let c3 = pool.add_clause(pred, 2);
        assert_eq!(pool.predicate(pred).first, Some(c1));
        assert_eq!(pool.clause(c1).next, Some(c2));
        assert_eq!(pool.clause(c2).next, Some(c3));
        assert_eq!(pool.clause(c3).next, None);
    }

    #[test]
    fn test_truncate() {
        let mut pool = ConstantPool::new();
        pool.functor_index("zeus", 0);
        let len = pool.len();
        let clauses = pool.clause_count();
        let pred = pool.predicate_index("goal", 0);
        pool.add_clause(pred, 0);
        pool.truncate(len, clauses);
        assert_eq!(pool.len(), len);
        assert_eq!(pool.clause_count(), clauses);
        // the interning scan no longer sees the truncated entry
        assert_eq!(pool.predicate_index("goal", 0), len);
    }
}
