//! The fetch/decode/execute loop.
//!
//! The fetched operator is the current processor mode ored onto the stored
//! opcode, so one clause body serves both head (MATCH) and goal (ARG/COPY)
//! contexts. Most instructions advance a running address register naming
//! the word-store cell currently being matched against (MATCH) or copied
//! into (ARG/COPY); it starts at the bottom of the local stack.

use std::collections::HashMap;
use std::io::{self, Write};

use log::trace;

use crate::bytecode as bc;
use crate::compile::QueryVars;
use crate::machine::{Exhausted, Machine};
use crate::mem::MIN_LOCAL_INDEX;
use crate::repl::{LineInput, FAILURE, NEXT_ANSWER, SUCCESS};
use crate::word;

/// Runs the query whose bytecode starts at `query_addr`, writing answers to
/// `out` and reading continuation requests from `input`. Returns when the
/// user declines further answers, when the query proves true with no
/// variables, or when backtracking is exhausted (`no`).
pub fn execute(
    machine: &mut Machine,
    query_addr: usize,
    vars: &QueryVars,
    input: &mut dyn LineInput,
    out: &mut dyn Write,
) -> io::Result<()> {
    machine.reset(query_addr);
    let mut address = MIN_LOCAL_INDEX;
    loop {
        let operator = machine.read_operator();
        trace!("{}", bc::operator_name(operator));
        let step = match (bc::mode(operator), bc::opcode(operator)) {
            (bc::MATCH, bc::FUNCTOR) => match_functor(machine, address),
            (bc::MATCH, bc::CONSTANT) => match_constant(machine, address),
            (bc::MATCH, bc::FIRSTVAR) => match_variable(machine, true, address),
            (bc::MATCH, bc::VAR) => match_variable(machine, false, address),
            (bc::MATCH, bc::ENTER) => Ok(enter_clause(machine)),
            (bc::MATCH, bc::POP) | (bc::COPY, bc::POP) => Ok(machine.pop_scratchpad()),
            (bc::ARG, bc::FUNCTOR) | (bc::COPY, bc::FUNCTOR) => Ok(copy_functor(machine, address)),
            (bc::ARG, bc::CONSTANT) | (bc::COPY, bc::CONSTANT) => {
                Ok(copy_constant(machine, address))
            }
            (bc::COPY, bc::FIRSTVAR) => Ok(copy_variable(machine, true, address)),
            (bc::COPY, bc::VAR) => Ok(copy_variable(machine, false, address)),
            (bc::ARG, bc::FIRSTVAR) => Ok(arg_variable(machine, true, address)),
            (bc::ARG, bc::VAR) => Ok(arg_variable(machine, false, address)),
            (bc::ARG, bc::CALL) => Ok(call_predicate(machine)),
            (bc::ARG, bc::EXIT) => {
                if machine.pop_source_frame() {
                    if vars.is_empty() {
                        out.write_all(SUCCESS.as_bytes())?;
                        out.flush()?;
                        return Ok(());
                    }
                    write_bindings(machine, vars, out)?;
                    out.flush()?;
                    match input.read_line("", out)? {
                        Some(line) if line == NEXT_ANSWER => machine.backtrack(),
                        _ => {
                            out.write_all(SUCCESS.as_bytes())?;
                            out.flush()?;
                            return Ok(());
                        }
                    }
                } else {
                    Ok(machine.push_target_frame())
                }
            }
            _ => panic!("illegal instruction {}", bc::operator_name(operator)),
        };
        match step {
            Ok(next) => address = next,
            Err(Exhausted) => {
                out.write_all(FAILURE.as_bytes())?;
                out.flush()?;
                return Ok(());
            }
        }
    }
}

// Unify a functor against the dereferenced word at `addr`. An unbound
// variable is bound to a fresh structure which is then filled in COPY mode;
// a matching structure is descended into; anything else fails.
fn match_functor(machine: &mut Machine, addr: usize) -> Result<usize, Exhausted> {
    let f = machine.read_operand(false);
    let w = machine.get_word_at(addr);
    match word::tag(w) {
        word::REF => Ok(build_structure(machine, f, word::value(w), addr + 1, true)),
        word::STR => {
            let global_addr = word::value(w);
            let index = word::value(machine.get_word_at(global_addr));
            if index != f {
                return machine.backtrack();
            }
            machine.push_scratchpad(addr + 1);
            Ok(global_addr + 1)
        }
        _ => machine.backtrack(),
    }
}

fn match_constant(machine: &mut Machine, addr: usize) -> Result<usize, Exhausted> {
    let c = machine.read_operand(false);
    let w = machine.get_word_at(addr);
    match word::tag(w) {
        word::REF => {
            let cell = word::value(w);
            machine.write_constant(cell, c);
            machine.trail(cell);
            Ok(addr + 1)
        }
        word::CONS => {
            if word::value(w) == c {
                Ok(addr + 1)
            } else {
                machine.backtrack()
            }
        }
        _ => machine.backtrack(),
    }
}

fn match_variable(machine: &mut Machine, first: bool, addr: usize) -> Result<usize, Exhausted> {
    let local = machine.read_operand(true);
    if first {
        let w = machine.get_word_at(addr);
        machine.set_word(local, w);
    } else if !machine.unifiable(local, addr) {
        return machine.backtrack();
    }
    Ok(addr + 1)
}

fn copy_functor(machine: &mut Machine, addr: usize) -> usize {
    let f = machine.read_operand(false);
    build_structure(machine, f, addr, addr + 1, false)
}

fn copy_constant(machine: &mut Machine, addr: usize) -> usize {
    let c = machine.read_operand(false);
    machine.write_constant(addr, c);
    addr + 1
}

// ARG-mode variables move words between the source frame and the target
// frame cells: a first occurrence seeds both cells with a fresh unbound
// variable, a later one copies the existing word.
fn arg_variable(machine: &mut Machine, first: bool, addr: usize) -> usize {
    let local = machine.read_operand(true);
    let w = if first {
        let unbound = word::word(word::REF, local);
        machine.set_word(local, unbound);
        unbound
    } else {
        machine.get_word_at(local)
    };
    machine.set_word(addr, w);
    addr + 1
}

fn copy_variable(machine: &mut Machine, first: bool, addr: usize) -> usize {
    let local = machine.read_operand(true);
    if first {
        let w = machine.get_word_at(addr);
        machine.set_word(local, w);
    } else {
        machine.bind(addr, local);
    }
    addr + 1
}

// Allocate a structure for functor `f` on the global stack, write the STR
// word into `write_at`, remember where to resume once the compound is
// complete, and continue at the structure's first argument cell in COPY
// mode.
fn build_structure(
    machine: &mut Machine,
    f: usize,
    write_at: usize,
    resume_at: usize,
    bind: bool,
) -> usize {
    let w = machine.push_functor(f);
    machine.set_word(write_at, w);
    if bind {
        machine.trail(write_at);
    }
    machine.push_scratchpad(resume_at);
    machine.set_mode(bc::COPY);
    word::value(w) + 1
}

// The old target frame becomes the new source frame; a fresh target frame
// is pushed for the first goal.
fn enter_clause(machine: &mut Machine) -> usize {
    let size = machine.read_operand(false);
    machine.push_source_frame(size);
    machine.set_mode(bc::ARG);
    machine.push_target_frame()
}

// Jump to the called predicate's first clause alternative, pushing a choice
// point when another alternative exists.
fn call_predicate(machine: &mut Machine) -> usize {
    let pred = machine.read_operand(false);
    let first = machine
        .pool()
        .predicate(pred)
        .first
        .expect("predicate without clauses");
    if let Some(next) = machine.pool().clause(first).next {
        machine.push_choice_point(next);
    }
    machine.set_mode(bc::MATCH);
    let code = machine.pool().clause(first).code;
    machine.jump(code)
}

// === Answers ===

// One `name = term ` segment per query variable, in insertion order.
fn write_bindings(machine: &Machine, vars: &QueryVars, out: &mut dyn Write) -> io::Result<()> {
    let mut names = HashMap::new();
    for (&address, name) in vars {
        write!(out, "{} = ", name)?;
        walk_word(machine, address, &mut names, out)?;
        write!(out, " ")?;
    }
    Ok(())
}

// Prints the term rooted at `addr`. Unbound variables get a generated name
// `?k`, cached by dereferenced cell so aliased variables print identically
// within one answer.
fn walk_word(
    machine: &Machine,
    addr: usize,
    names: &mut HashMap<usize, String>,
    out: &mut dyn Write,
) -> io::Result<()> {
    let w = machine.get_word_at(addr);
    match word::tag(w) {
        word::REF => {
            let cell = machine.deref(addr);
            let fresh = names.len();
            let name = names.entry(cell).or_insert_with(|| format!("?{}", fresh));
            out.write_all(name.as_bytes())
        }
        word::STR => walk_word(machine, word::value(w), names, out),
        word::FUNC => {
            let index = word::value(w);
            let arity = machine.pool().functor(index).arity;
            write!(out, "{}(", machine.pool().functor(index).name)?;
            for i in 1..=arity {
                walk_word(machine, addr + i, names, out)?;
                if i < arity {
                    write!(out, ", ")?;
                }
            }
            write!(out, ")")
        }
        word::CONS => out.write_all(machine.pool().functor(word::value(w)).name.as_bytes()),
        _ => panic!("malformed cell {}", word::describe(w)),
    }
}
