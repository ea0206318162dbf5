//! Bytecode generation: the final compiler pass.
//!
//! Each clause compiles to its head-argument instructions (run in MATCH
//! mode), `ENTER` with the frame size, the body goals (each goal's argument
//! instructions followed by `CALL`), and `EXIT`. Compound terms are framed
//! by `FUNCTOR ... POP`; the first occurrence of a variable emits
//! `FIRSTVAR`, later ones `VAR`. A query is a clause with a zero-arity
//! head: no head instructions, offsets starting at zero.

use std::collections::HashSet;

use indexmap::IndexMap;
use log::debug;

use crate::analyze::{ClausePlan, QueryPlan};
use crate::ast::{Program, Query, Term};
use crate::bytecode::{CALL, CONSTANT, ENTER, EXIT, FIRSTVAR, FUNCTOR, POP, VAR};
use crate::machine::Machine;
use crate::mem::MIN_LOCAL_INDEX;

/// Emits bytecode for every clause of a resolved program, recording each
/// clause's code offset in its clause record.
pub fn generate_program(machine: &mut Machine, program: &Program, plans: &[ClausePlan]) {
    for (clause, plan) in program.clauses.iter().zip(plans) {
        let code = machine.code_top();
        machine.pool_mut().clause_mut(plan.clause).code = code;
        let mut seen = HashSet::new();
        for arg in clause.head.args() {
            emit_term(machine, arg, &plan.offsets, &mut seen);
        }
        machine.write_ins(ENTER, plan.frame_size() as u32);
        emit_goals(machine, &clause.body, &plan.offsets, &mut seen);
        machine.write_op(EXIT);
    }
    debug!(
        "compiled {} clauses, {} pool entries",
        program.clauses.len(),
        machine.pool().len()
    );
}

/// Emits bytecode for a resolved query at the current code top and returns
/// the side table mapping each query variable's local-stack address to its
/// name, in order of first occurrence.
pub fn generate_query(
    machine: &mut Machine,
    query: &Query,
    plan: &QueryPlan,
) -> IndexMap<usize, String> {
    let mut seen = HashSet::new();
    machine.write_ins(ENTER, plan.frame_size() as u32);
    emit_goals(machine, &query.goals, &plan.offsets, &mut seen);
    machine.write_op(EXIT);
    plan.offsets
        .iter()
        .map(|(name, &offset)| (MIN_LOCAL_INDEX + offset, name.clone()))
        .collect()
}

fn emit_goals(
    machine: &mut Machine,
    goals: &[Term],
    offsets: &IndexMap<String, usize>,
    seen: &mut HashSet<String>,
) {
    for goal in goals {
        for arg in goal.args() {
            emit_term(machine, arg, offsets, seen);
        }
        let (name, arity) = goal.functor_arity().expect("goal is not a structure");
        let pred = machine.pool_mut().predicate_index(name, arity);
        machine.write_ins(CALL, pred as u32);
    }
}

fn emit_term(
    machine: &mut Machine,
    term: &Term,
    offsets: &IndexMap<String, usize>,
    seen: &mut HashSet<String>,
) {
    match term {
        Term::Nil => {
            let index = machine.pool_mut().functor_index("[]", 0);
            machine.write_ins(CONSTANT, index as u32);
        }
        Term::Atom(name) => {
            let index = machine.pool_mut().functor_index(name, 0);
            machine.write_ins(CONSTANT, index as u32);
        }
        Term::Var(name) => {
            let offset = *offsets.get(name).expect("unresolved variable");
            let opcode = if seen.insert(name.clone()) {
                FIRSTVAR
            } else {
                VAR
            };
            machine.write_ins(opcode, offset as u32);
        }
        Term::Compound { functor, args } => {
            let index = machine.pool_mut().functor_index(functor, args.len());
            machine.write_ins(FUNCTOR, index as u32);
            for arg in args {
                emit_term(machine, arg, offsets, seen);
            }
            machine.write_op(POP);
        }
    }
}
