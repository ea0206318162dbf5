//! The instruction set: opcodes, processor modes and mnemonics.
//!
//! Processor modes occupy the high two bits of an operator byte and opcodes
//! the low six, so the two combine with a bitwise or into the operator that
//! dispatch switches on. The bytecode stream stores opcodes alone; the
//! fetch step ors in the machine's current mode.

/// The MATCH processor mode, in effect while unifying a head literal.
pub const MATCH: u32 = 1 << 6;

/// The ARG processor mode, in effect while building goal arguments.
pub const ARG: u32 = 2 << 6;

/// The COPY processor mode, in effect while writing on the global stack.
pub const COPY: u32 = 3 << 6;

pub const OPCODE_MASK: u32 = 0x3F;
pub const MODE_MASK: u32 = 0xC0;

/// Completes a compound term.
pub const POP: u32 = 1;

/// A subsequent occurrence of a variable within a clause.
pub const VAR: u32 = 4;

/// The first occurrence of a variable within a clause.
pub const FIRSTVAR: u32 = 5;

/// A functor of non-zero arity.
pub const FUNCTOR: u32 = 9;

/// A constant (functor of arity 0).
pub const CONSTANT: u32 = 11;

/// Commits the head and switches from MATCH to ARG.
pub const ENTER: u32 = 12;

/// Calls a predicate.
pub const CALL: u32 = 17;

/// Completes a clause.
pub const EXIT: u32 = 25;

/// The opcode portion of an operator: its lower six bits.
#[inline]
pub fn opcode(operator: u32) -> u32 {
    operator & OPCODE_MASK
}

/// The mode portion of an operator: its upper two bits.
#[inline]
pub fn mode(operator: u32) -> u32 {
    operator & MODE_MASK
}

/// The mnemonic for an opcode, or its hexadecimal value when unknown.
pub fn opcode_name(opcode: u32) -> String {
    match opcode {
        POP => "POP".to_string(),
        VAR => "VAR".to_string(),
        FIRSTVAR => "FIRSTVAR".to_string(),
        FUNCTOR => "FUNCTOR".to_string(),
        CONSTANT => "CONSTANT".to_string(),
        ENTER => "ENTER".to_string(),
        CALL => "CALL".to_string(),
        EXIT => "EXIT".to_string(),
        other => format!("{:#x}", other),
    }
}

/// The name of a processor mode, or its hexadecimal value when unknown.
pub fn mode_name(mode: u32) -> String {
    match mode {
        MATCH => "MATCH".to_string(),
        ARG => "ARG".to_string(),
        COPY => "COPY".to_string(),
        other => format!("{:#x}", other),
    }
}

/// Formats a full operator as `MODE | OPCODE`.
pub fn operator_name(operator: u32) -> String {
    format!(
        "{} | {}",
        mode_name(mode(operator)),
        opcode_name(opcode(operator))
    )
}

/// A snapshot of the bytecode writer: code top, constant-pool length and
/// clause-arena length. Restoring it truncates all three, so a query's
/// compilation artifacts vanish in O(1).
#[derive(Debug, Clone, Copy)]
pub struct Memento {
    pub(crate) codeptr: usize,
    pub(crate) pool_len: usize,
    pub(crate) clause_count: usize,
}
