//! Compilation drivers: parse, resolve, generate.

use indexmap::IndexMap;
use log::debug;

use crate::analyze;
use crate::codegen;
use crate::error::CompileError;
use crate::machine::Machine;
use crate::parser;

/// Side table mapping query-variable local-stack addresses to their names,
/// in order of first occurrence.
pub type QueryVars = IndexMap<usize, String>;

/// Compiles a program into the machine's code area and constant pool.
pub fn compile_program(machine: &mut Machine, source: &str) -> Result<(), CompileError> {
    let program = parser::parse_program(source)?;
    let plans = analyze::resolve_program(machine.pool_mut(), &program)?;
    codegen::generate_program(machine, &program, &plans);
    debug!(
        "program occupies {} code cells",
        machine.code_top() - crate::mem::MIN_CODE_INDEX
    );
    Ok(())
}

/// Compiles a query at the current code top, returning its variable table.
/// The caller is responsible for rolling the machine back to its
/// program-only memento once the query has run.
pub fn compile_query(machine: &mut Machine, source: &str) -> Result<QueryVars, CompileError> {
    let query = parser::parse_query(source)?;
    let plan = analyze::resolve_query(machine.pool_mut(), &query)?;
    Ok(codegen::generate_query(machine, &query, &plan))
}
