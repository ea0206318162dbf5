//! Symbol resolution: the pass between parsing and code generation.
//!
//! Registers predicates and clause records in the constant pool, assigns
//! every clause variable a frame offset (parameter cells first, then local
//! variables in order of first occurrence), and verifies that every called
//! predicate has at least one clause.

use indexmap::IndexMap;

use crate::ast::{Program, Query, Term};
use crate::error::CompileError;
use crate::symbol::ConstantPool;

/// Resolution results for one program clause.
#[derive(Debug)]
pub struct ClausePlan {
    /// Index of the clause record in the arena.
    pub clause: usize,
    /// Arity of the head literal.
    pub params: usize,
    /// Frame offset per variable, in order of first occurrence.
    pub offsets: IndexMap<String, usize>,
}

impl ClausePlan {
    /// Number of cells an activation frame for this clause needs.
    pub fn frame_size(&self) -> usize {
        self.params + self.offsets.len()
    }
}

/// Resolution results for a query: a clause with a zero-arity head.
#[derive(Debug)]
pub struct QueryPlan {
    /// Frame offset per variable, in order of first occurrence.
    pub offsets: IndexMap<String, usize>,
}

impl QueryPlan {
    /// Number of cells the query frame needs.
    pub fn frame_size(&self) -> usize {
        self.offsets.len()
    }
}

/// Resolves a program: registers one clause record per clause, chained in
/// source order under its predicate, and computes each clause's variable
/// layout.
pub fn resolve_program(
    pool: &mut ConstantPool,
    program: &Program,
) -> Result<Vec<ClausePlan>, CompileError> {
    let mut plans = Vec::with_capacity(program.clauses.len());
    for clause in &program.clauses {
        let (name, params) = clause
            .head
            .functor_arity()
            .expect("clause head is not a structure");
        let pred = pool.predicate_index(name, params);
        let index = pool.add_clause(pred, params);

        let mut offsets = IndexMap::new();
        for arg in clause.head.args() {
            assign_offsets(arg, params, &mut offsets);
        }
        resolve_goals(pool, &clause.body, params, &mut offsets);

        pool.clause_mut(index).locals = offsets.len();
        plans.push(ClausePlan {
            clause: index,
            params,
            offsets,
        });
    }
    verify(pool)?;
    Ok(plans)
}

/// Resolves a query. No clause record is created: the query's bytecode is
/// jumped to directly and never called.
pub fn resolve_query(pool: &mut ConstantPool, query: &Query) -> Result<QueryPlan, CompileError> {
    let mut offsets = IndexMap::new();
    resolve_goals(pool, &query.goals, 0, &mut offsets);
    verify(pool)?;
    Ok(QueryPlan { offsets })
}

fn resolve_goals(
    pool: &mut ConstantPool,
    goals: &[Term],
    params: usize,
    offsets: &mut IndexMap<String, usize>,
) {
    for goal in goals {
        let (name, arity) = goal.functor_arity().expect("goal is not a structure");
        pool.predicate_index(name, arity);
        for arg in goal.args() {
            assign_offsets(arg, params, offsets);
        }
    }
}

fn assign_offsets(term: &Term, params: usize, offsets: &mut IndexMap<String, usize>) {
    match term {
        Term::Var(name) => {
            if !offsets.contains_key(name) {
                let offset = params + offsets.len();
                offsets.insert(name.clone(), offset);
            }
        }
        Term::Compound { args, .. } => {
            for arg in args {
                assign_offsets(arg, params, offsets);
            }
        }
        _ => {}
    }
}

// Every predicate in the pool must have a clause by the time resolution
// completes; a goal naming a clauseless predicate is a semantic error.
fn verify(pool: &ConstantPool) -> Result<(), CompileError> {
    for (_, pred) in pool.predicates() {
        if pred.first.is_none() {
            return Err(CompileError::NoClauses {
                name: pred.name.clone(),
                arity: pred.arity,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_program, parse_query};

    #[test]
    fn test_ground_fact_has_no_locals() {
        let program = parse_program("father(zeus, ares).").unwrap();
        let mut pool = ConstantPool::new();
        let plans = resolve_program(&mut pool, &program).unwrap();
        assert_eq!(plans[0].params, 2);
        assert!(plans[0].offsets.is_empty());
        assert_eq!(plans[0].frame_size(), 2);
        assert_eq!(pool.clause(plans[0].clause).locals, 0);
    }

    #[test]
    fn test_offsets_follow_parameters() {
        let program =
            parse_program("grandparent(X, Y) :- parent(X, Z), parent(Z, Y).").unwrap();
        let mut pool = ConstantPool::new();
        let plans = resolve_program(&mut pool, &program).unwrap();
        let plan = &plans[0];
        assert_eq!(plan.offsets["X"], 2);
        assert_eq!(plan.offsets["Y"], 3);
        assert_eq!(plan.offsets["Z"], 4);
        assert_eq!(plan.frame_size(), 5);
    }

    #[test]
    fn test_nested_variables_are_found() {
        let program = parse_program("append(cons(X,XS),YS,cons(X,ZS)) :- append(XS,YS,ZS).")
            .unwrap();
        let mut pool = ConstantPool::new();
        let plans = resolve_program(&mut pool, &program).unwrap();
        assert_eq!(plans[0].offsets.len(), 4);
        assert_eq!(plans[0].offsets["X"], 3);
        assert_eq!(plans[0].offsets["ZS"], 6);
    }

    #[test]
    fn test_clauses_chain_in_source_order() {
        let program = parse_program("father(zeus,ares). father(zeus,dionisius).").unwrap();
        let mut pool = ConstantPool::new();
        let plans = resolve_program(&mut pool, &program).unwrap();
        let pred = pool.predicate_index("father", 2);
        assert_eq!(pool.predicate(pred).first, Some(plans[0].clause));
        assert_eq!(pool.clause(plans[0].clause).next, Some(plans[1].clause));
    }

    #[test]
    fn test_forward_references_are_allowed() {
        let program = parse_program("p(X) :- q(X). q(a).").unwrap();
        let mut pool = ConstantPool::new();
        assert!(resolve_program(&mut pool, &program).is_ok());
    }

    #[test]
    fn test_undefined_predicate_in_program() {
        let program = parse_program("p(X) :- q(X).").unwrap();
        let mut pool = ConstantPool::new();
        let err = resolve_program(&mut pool, &program).unwrap_err();
        assert_eq!(err.to_string(), "No clauses defined for predicate q/1");
    }

    #[test]
    fn test_undefined_predicate_in_query() {
        let program = parse_program("father(zeus, ares).").unwrap();
        let mut pool = ConstantPool::new();
        resolve_program(&mut pool, &program).unwrap();
        let query = parse_query("fathers(zeus, X).").unwrap();
        let err = resolve_query(&mut pool, &query).unwrap_err();
        assert_eq!(err.to_string(), "No clauses defined for predicate fathers/2");
    }

    #[test]
    fn test_query_offsets_start_at_zero() {
        let program = parse_program("father(zeus, ares).").unwrap();
        let mut pool = ConstantPool::new();
        resolve_program(&mut pool, &program).unwrap();
        let query = parse_query("father(X, Y).").unwrap();
        let plan = resolve_query(&mut pool, &query).unwrap();
        assert_eq!(plan.offsets["X"], 0);
        assert_eq!(plan.offsets["Y"], 1);
        assert_eq!(plan.frame_size(), 2);
    }
}
