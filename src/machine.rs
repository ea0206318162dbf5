//! The abstract machine: registers, activation frames, the bytecode writer
//! and the unification core.
//!
//! The machine owns the virtual memory, the constant pool and the clause
//! arena, and is passed explicitly through the compiler and the REPL. Frames
//! are records in an arena whose chain pointers (continuation source frame,
//! previous choice point, backtrack clause) are indices; their variable
//! cells live in local-stack memory at `local .. local + size`.

use crate::bytecode::{self, Memento};
use crate::mem::{
    Memory, CODE_AREA, GLOBAL_STACK, LOCAL_STACK, MIN_CODE_INDEX, MIN_GLOBAL_INDEX,
    MIN_LOCAL_INDEX, MIN_PDL_INDEX, MIN_SCRATCHPAD_INDEX, MIN_TRAIL_INDEX, PDL, SCRATCHPAD,
    TRAIL_STACK, WORD_STORE,
};
use crate::symbol::ConstantPool;
use crate::word;

/// Raised by [`Machine::backtrack`] when no choice point remains: the query
/// has no more answers. This is the normal end of an enumeration, not an
/// error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted;

/// An activation frame. A frame starts life as a target frame (being
/// built), may become the source frame (`cp`/`cont` meaningful, set at
/// ENTER) and may double as a choice point (`clause`/`bg`/`bl`/`bt`
/// meaningful, set at CALL).
#[derive(Debug, Clone)]
struct Frame {
    /// Local-stack address of the frame's first variable cell.
    local: usize,
    /// Number of parameter and local-variable cells.
    size: usize,
    /// Continuation program counter.
    cp: usize,
    /// Continuation source frame.
    cont: Option<usize>,
    /// Backtrack clause: the alternative to try on failure.
    clause: Option<usize>,
    /// Backtrack global-stack top.
    bg: usize,
    /// Previous choice point.
    bl: Option<usize>,
    /// Backtrack trail top.
    bt: usize,
}

impl Frame {
    fn new(local: usize) -> Self {
        Self {
            local,
            size: 0,
            cp: 0,
            cont: None,
            clause: None,
            bg: 0,
            bl: None,
            bt: 0,
        }
    }
}

/// The ZIP machine state.
pub struct Machine {
    mem: Memory,
    pool: ConstantPool,
    /// Next free code cell; the bytecode writer's cursor.
    codeptr: usize,
    frames: Vec<Frame>,
    /// Processor mode (PM).
    mode: u32,
    /// Program counter (PC).
    pc: usize,
    /// Target frame (L).
    target: Option<usize>,
    /// Source frame (CL).
    source: Option<usize>,
    /// Current choice point (BL).
    choice: Option<usize>,
    /// Global-stack top (G0).
    globalptr: usize,
    /// Trail top (TR0).
    trailptr: usize,
    /// Push-down list top.
    pdlptr: usize,
    /// Scratchpad top.
    scratchptr: usize,
}

impl Machine {
    pub fn new() -> Self {
        Self {
            mem: Memory::new(),
            pool: ConstantPool::new(),
            codeptr: MIN_CODE_INDEX,
            frames: Vec::new(),
            mode: bytecode::MATCH,
            pc: MIN_CODE_INDEX,
            target: None,
            source: None,
            choice: None,
            globalptr: MIN_GLOBAL_INDEX,
            trailptr: MIN_TRAIL_INDEX,
            pdlptr: MIN_PDL_INDEX,
            scratchptr: MIN_SCRATCHPAD_INDEX,
        }
    }

    pub fn pool(&self) -> &ConstantPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut ConstantPool {
        &mut self.pool
    }

    // === Bytecode writer ===

    /// Writes an instruction taking an operand, advancing the code cursor
    /// by two cells.
    pub fn write_ins(&mut self, opcode: u32, operand: u32) {
        match opcode {
            bytecode::FUNCTOR
            | bytecode::CONSTANT
            | bytecode::FIRSTVAR
            | bytecode::VAR
            | bytecode::CALL
            | bytecode::ENTER => {}
            other => panic!("opcode {} takes no operand", bytecode::opcode_name(other)),
        }
        self.mem.write(CODE_AREA, self.codeptr, opcode);
        self.mem.write(CODE_AREA, self.codeptr + 1, operand);
        self.codeptr += 2;
    }

    /// Writes an operand-less instruction, advancing the code cursor by one
    /// cell.
    pub fn write_op(&mut self, opcode: u32) {
        match opcode {
            bytecode::POP | bytecode::EXIT => {}
            other => panic!("opcode {} requires an operand", bytecode::opcode_name(other)),
        }
        self.mem.write(CODE_AREA, self.codeptr, opcode);
        self.codeptr += 1;
    }

    /// The first unwritten code-area address.
    pub fn code_top(&self) -> usize {
        self.codeptr
    }

    /// Reads a raw code cell.
    pub fn read_code(&self, address: usize) -> u32 {
        self.mem.read(CODE_AREA, address)
    }

    /// Snapshots the code cursor, pool length and clause count.
    pub fn create_memento(&self) -> Memento {
        Memento {
            codeptr: self.codeptr,
            pool_len: self.pool.len(),
            clause_count: self.pool.clause_count(),
        }
    }

    /// Rolls the writer back to a snapshot, truncating the pool and clause
    /// arena.
    pub fn set_memento(&mut self, memento: &Memento) {
        self.codeptr = memento.codeptr;
        self.pool.truncate(memento.pool_len, memento.clause_count);
    }

    // === Initialization ===

    /// Readies the machine to run the query at `query_addr`: MATCH mode,
    /// empty stacks, and an initial target frame at the bottom of the local
    /// stack.
    pub fn reset(&mut self, query_addr: usize) {
        if !CODE_AREA.contains(query_addr) {
            panic!("query address {} outside the code area", query_addr);
        }
        self.mode = bytecode::MATCH;
        self.pc = query_addr;
        self.target = None;
        self.source = None;
        self.choice = None;
        self.globalptr = MIN_GLOBAL_INDEX;
        self.trailptr = MIN_TRAIL_INDEX;
        self.pdlptr = MIN_PDL_INDEX;
        self.scratchptr = MIN_SCRATCHPAD_INDEX;
        self.frames.clear();
        self.push_target_frame();
    }

    // === Machine mode ===

    pub fn mode(&self) -> u32 {
        self.mode
    }

    pub fn set_mode(&mut self, mode: u32) {
        debug_assert!(matches!(
            mode,
            bytecode::MATCH | bytecode::ARG | bytecode::COPY
        ));
        self.mode = mode;
    }

    // === Code memory ===

    /// Fetches the next operator: the current mode ored onto the opcode at
    /// the program counter.
    pub fn read_operator(&mut self) -> u32 {
        let opcode = self.mem.read(CODE_AREA, self.pc);
        self.pc += 1;
        self.mode | opcode
    }

    /// Fetches the next operand. Variable operands are frame-relative
    /// offsets and are resolved to an absolute local-stack address against
    /// the mode-appropriate frame; other operands are returned verbatim.
    pub fn read_operand(&mut self, is_variable: bool) -> usize {
        let operand = self.mem.read(CODE_AREA, self.pc) as usize;
        self.pc += 1;
        if !is_variable {
            return operand;
        }
        operand + self.frame_base()
    }

    // In MATCH mode offsets are relative to the target frame, in ARG mode
    // to the source frame. In COPY mode the governing frame is the one for
    // the mode in effect when the outermost compound was entered, found by
    // climbing the scratchpad past COPY entries.
    fn frame_base(&self) -> usize {
        let mut top = self.scratchptr;
        let mut mode = self.mode;
        loop {
            match mode {
                bytecode::MATCH => return self.frames[self.target.expect("no target frame")].local,
                bytecode::ARG => return self.frames[self.source.expect("no source frame")].local,
                bytecode::COPY => {
                    mode = self.mem.read(SCRATCHPAD, top - 1);
                    top -= 2;
                }
                other => panic!("invalid processor mode {}", bytecode::mode_name(other)),
            }
        }
    }

    /// Saves the continuation into the target frame and transfers control
    /// to `address`. Returns the target frame's first cell address.
    pub fn jump(&mut self, address: usize) -> usize {
        debug_assert!(CODE_AREA.contains(address));
        let target = self.target.expect("no target frame");
        self.frames[target].cp = self.pc;
        self.pc = address;
        self.frames[target].local
    }

    // === Global stack ===

    /// Allocates a structure for the functor at pool index `index` on the
    /// global stack: a FUNC cell followed by one unbound cell per argument.
    /// Returns the STR word addressing it.
    pub fn push_functor(&mut self, index: usize) -> u32 {
        let arity = self.pool.functor(index).arity;
        debug_assert!(arity > 0);
        let result = word::word(word::STR, self.globalptr);
        self.mem
            .write(GLOBAL_STACK, self.globalptr, word::word(word::FUNC, index));
        self.globalptr += 1;
        for _ in 0..arity {
            let unbound = word::word(word::REF, self.globalptr);
            self.mem.write(GLOBAL_STACK, self.globalptr, unbound);
            self.globalptr += 1;
        }
        result
    }

    /// Writes the CONS word for the constant at pool index `index` into the
    /// cell at `address`.
    pub fn write_constant(&mut self, address: usize, index: usize) {
        debug_assert_eq!(self.pool.functor(index).arity, 0);
        self.mem
            .write(WORD_STORE, address, word::word(word::CONS, index));
    }

    // === Local stack ===

    /// Allocates a new target frame at the smallest local-stack address not
    /// occupied by a live frame: just above the source frame, or above the
    /// choice point when one sits above the source frame.
    pub fn push_target_frame(&mut self) -> usize {
        let mut address = MIN_LOCAL_INDEX;
        if let Some(source) = self.source {
            let above = self
                .choice
                .filter(|&c| self.frames[source].local < self.frames[c].local);
            let frame = &self.frames[above.unwrap_or(source)];
            address = frame.local + frame.size;
        }
        self.frames.push(Frame::new(address));
        self.target = Some(self.frames.len() - 1);
        address
    }

    /// Turns the target frame into a choice point capturing `clause` as the
    /// alternative to try on failure.
    pub fn push_choice_point(&mut self, clause: usize) {
        let target = self.target.expect("no target frame");
        let frame = &mut self.frames[target];
        frame.clause = Some(clause);
        frame.bg = self.globalptr;
        frame.bt = self.trailptr;
        frame.bl = self.choice;
        self.choice = Some(target);
    }

    /// Turns the target frame into the new source frame with the given cell
    /// count, chaining the previous source frame as its continuation.
    pub fn push_source_frame(&mut self, size: usize) {
        let target = self.target.expect("no target frame");
        self.frames[target].size = size;
        self.frames[target].cont = self.source;
        self.source = Some(target);
    }

    /// Pops the source frame, restoring the continuation. Returns true when
    /// the popped frame was the initial query frame, i.e. execution is
    /// complete.
    pub fn pop_source_frame(&mut self) -> bool {
        let source = self.source.expect("no source frame");
        match self.frames[source].cont {
            None => true,
            Some(cont) => {
                self.pc = self.frames[source].cp;
                self.source = Some(cont);
                false
            }
        }
    }

    // === Scratchpad ===

    /// Saves `address` together with the current mode.
    pub fn push_scratchpad(&mut self, address: usize) {
        self.mem.write(SCRATCHPAD, self.scratchptr, address as u32);
        self.mem.write(SCRATCHPAD, self.scratchptr + 1, self.mode);
        self.scratchptr += 2;
    }

    /// Restores the mode saved by the matching push and returns the saved
    /// address.
    pub fn pop_scratchpad(&mut self) -> usize {
        self.scratchptr -= 2;
        self.mode = self.mem.read(SCRATCHPAD, self.scratchptr + 1);
        self.mem.read(SCRATCHPAD, self.scratchptr) as usize
    }

    // === Trail ===

    /// The backtrack global-stack top: the current choice point's, or the
    /// bottom of the global stack when there is none.
    pub fn backtrack_global(&self) -> usize {
        self.choice
            .map_or(MIN_GLOBAL_INDEX, |c| self.frames[c].bg)
    }

    /// The current trail top.
    pub fn trail_top(&self) -> usize {
        self.trailptr
    }

    /// The current global-stack top.
    pub fn global_top(&self) -> usize {
        self.globalptr
    }

    /// Records `address` on the trail if its binding must be undone at
    /// backtracking: global cells older than the last choice point, and all
    /// local cells. Anything younger on the global stack is reclaimed
    /// wholesale by the global-top reset.
    pub(crate) fn trail(&mut self, address: usize) {
        if address < self.backtrack_global() || LOCAL_STACK.contains(address) {
            self.mem
                .write(TRAIL_STACK, self.trailptr, address as u32);
            self.trailptr += 1;
        }
    }

    // Resets every cell recorded between `from` (inclusive) and `to`
    // (exclusive) to an unbound variable and pops the trail back to `from`.
    fn unwind_trail(&mut self, from: usize, to: usize) {
        for i in from..to {
            let address = self.mem.read(TRAIL_STACK, i) as usize;
            self.mem
                .write(WORD_STORE, address, word::word(word::REF, address));
        }
        self.trailptr = from;
    }

    // === Dereferencing, binding, unification ===

    /// Follows the reference chain from `address` to a non-REF cell or an
    /// unbound variable.
    pub fn deref(&self, mut address: usize) -> usize {
        loop {
            let w = self.mem.read(WORD_STORE, address);
            if word::tag(w) == word::REF && word::value(w) != address {
                address = word::value(w);
            } else {
                return address;
            }
        }
    }

    /// The word at the end of the reference chain from `address`.
    pub fn get_word_at(&self, address: usize) -> u32 {
        self.mem.read(WORD_STORE, self.deref(address))
    }

    /// Writes a word into the cell at `address` (no dereferencing).
    pub fn set_word(&mut self, address: usize, word: u32) {
        self.mem.write(WORD_STORE, address, word);
    }

    /// Binds the variable among the two dereferenced cells, preferring to
    /// bind the younger (higher) address to the older so that chains only
    /// ever point at older cells. Returns the address that was bound.
    /// At least one side must dereference to a variable.
    pub fn bind(&mut self, address1: usize, address2: usize) -> usize {
        let d1 = self.deref(address1);
        let d2 = self.deref(address2);
        let w1 = self.mem.read(WORD_STORE, d1);
        let w2 = self.mem.read(WORD_STORE, d2);
        if word::tag(w1) == word::REF && (word::tag(w2) != word::REF || d2 < d1) {
            self.mem.write(WORD_STORE, d1, w2);
            self.trail(d1);
            d1
        } else if word::tag(w2) == word::REF {
            self.mem.write(WORD_STORE, d2, w1);
            self.trail(d2);
            d2
        } else {
            panic!(
                "bind: neither {} nor {} holds a variable",
                word::describe(w1),
                word::describe(w2)
            );
        }
    }

    /// Unifies the terms rooted at the two addresses, binding variables as
    /// needed. Iterative, with the pending pairs kept on the push-down
    /// list. A failed unification is always followed by a backtrack, which
    /// clears the leftover worklist.
    pub fn unifiable(&mut self, address1: usize, address2: usize) -> bool {
        self.pdl_push(address1);
        self.pdl_push(address2);
        while self.pdlptr != MIN_PDL_INDEX {
            let popped = self.pdl_pop();
            let d1 = self.deref(popped);
            let popped = self.pdl_pop();
            let d2 = self.deref(popped);
            let w1 = self.mem.read(WORD_STORE, d1);
            if word::tag(w1) == word::REF {
                self.bind(d1, d2);
                continue;
            }
            let w2 = self.mem.read(WORD_STORE, d2);
            let v1 = word::value(w1);
            let v2 = word::value(w2);
            match word::tag(w2) {
                word::REF => {
                    self.bind(d1, d2);
                }
                word::CONS => {
                    if word::tag(w1) != word::CONS || v1 != v2 {
                        return false;
                    }
                }
                word::LIS => {
                    if word::tag(w1) != word::LIS {
                        return false;
                    }
                    self.pdl_push(v1);
                    self.pdl_push(v2);
                    self.pdl_push(v1 + 1);
                    self.pdl_push(v2 + 1);
                }
                word::STR => {
                    if word::tag(w1) != word::STR {
                        return false;
                    }
                    let f1 = word::value(self.mem.read(WORD_STORE, v1));
                    let f2 = word::value(self.mem.read(WORD_STORE, v2));
                    if f1 != f2 {
                        return false;
                    }
                    let arity = self.pool.functor(f1).arity;
                    for i in 1..=arity {
                        self.pdl_push(v1 + i);
                        self.pdl_push(v2 + i);
                    }
                }
                _ => panic!("unifiable: malformed cell {}", word::describe(w2)),
            }
        }
        true
    }

    fn pdl_push(&mut self, address: usize) {
        self.mem.write(PDL, self.pdlptr, address as u32);
        self.pdlptr += 1;
    }

    fn pdl_pop(&mut self) -> usize {
        self.pdlptr -= 1;
        self.mem.read(PDL, self.pdlptr) as usize
    }

    // === Backtracking ===

    /// Restores the machine to the current choice point: MATCH mode, the
    /// backtrack clause's code address, the saved frame registers, the
    /// trail unwound and the global stack cut back. The choice point's
    /// clause pointer advances to the next alternative, or the choice point
    /// is popped when none remains. Returns the target frame's first cell
    /// address.
    ///
    /// The push-down list and scratchpad are empty at every choice point
    /// (neither unification nor compound processing spans a CALL), so both
    /// tops are reset here.
    pub fn backtrack(&mut self) -> Result<usize, Exhausted> {
        let choice = self.choice.ok_or(Exhausted)?;
        self.mode = bytecode::MATCH;
        let clause = self.frames[choice]
            .clause
            .expect("choice point without a backtrack clause");
        self.pc = self.pool.clause(clause).code;
        if self.frames[choice].cont.is_some() {
            self.source = self.frames[choice].cont;
            self.target = Some(choice);
        }
        let bt = self.frames[choice].bt;
        self.unwind_trail(bt, self.trailptr);
        self.globalptr = self.frames[choice].bg;
        self.trailptr = bt;
        self.pdlptr = MIN_PDL_INDEX;
        self.scratchptr = MIN_SCRATCHPAD_INDEX;
        match self.pool.clause(clause).next {
            Some(next) => self.frames[choice].clause = Some(next),
            None => self.choice = self.frames[choice].bl,
        }
        Ok(self.frames[self.target.expect("no target frame")].local)
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::MAX_CODE_INDEX;

    #[test]
    fn test_reset() {
        let mut machine = Machine::new();
        machine.reset(MIN_CODE_INDEX);
        assert_eq!(machine.mode(), bytecode::MATCH);
        assert_eq!(machine.global_top(), MIN_GLOBAL_INDEX);
        assert_eq!(machine.trail_top(), MIN_TRAIL_INDEX);
        assert_eq!(machine.frames.len(), 1);
        assert_eq!(machine.frames[0].local, MIN_LOCAL_INDEX);
    }

    #[test]
    #[should_panic(expected = "outside the code area")]
    fn test_reset_rejects_bad_address() {
        let mut machine = Machine::new();
        machine.reset(MAX_CODE_INDEX + 1);
    }

    #[test]
    fn test_writer_and_memento() {
        let mut machine = Machine::new();
        let memento = machine.create_memento();
        let f = machine.pool_mut().functor_index("f", 2);
        machine.write_ins(bytecode::FUNCTOR, f as u32);
        machine.write_op(bytecode::POP);
        assert_eq!(machine.code_top(), MIN_CODE_INDEX + 3);
        assert_eq!(machine.read_code(MIN_CODE_INDEX), bytecode::FUNCTOR);
        assert_eq!(machine.read_code(MIN_CODE_INDEX + 1), f as u32);
        assert_eq!(machine.read_code(MIN_CODE_INDEX + 2), bytecode::POP);

        machine.set_memento(&memento);
        assert_eq!(machine.code_top(), MIN_CODE_INDEX);
        assert_eq!(machine.pool().len(), 1);
    }

    #[test]
    #[should_panic(expected = "takes no operand")]
    fn test_write_ins_rejects_pop() {
        let mut machine = Machine::new();
        machine.write_ins(bytecode::POP, 0);
    }

    #[test]
    #[should_panic(expected = "requires an operand")]
    fn test_write_op_rejects_call() {
        let mut machine = Machine::new();
        machine.write_op(bytecode::CALL);
    }

    #[test]
    fn test_push_functor() {
        let mut machine = Machine::new();
        let f = machine.pool_mut().functor_index("f", 2);
        let w = machine.push_functor(f);
        assert_eq!(w, word::word(word::STR, 0));
        assert_eq!(machine.get_word_at(0), word::word(word::FUNC, f));
        assert_eq!(machine.get_word_at(1), word::word(word::REF, 1));
        assert_eq!(machine.get_word_at(2), word::word(word::REF, 2));
        assert_eq!(machine.global_top(), 3);
    }

    #[test]
    fn test_deref_follows_chains() {
        let mut machine = Machine::new();
        machine.set_word(5, word::word(word::REF, 2));
        machine.set_word(2, word::word(word::REF, 2));
        machine.set_word(9, word::word(word::REF, 5));
        assert_eq!(machine.deref(9), 2);
        assert_eq!(machine.deref(5), 2);
        assert_eq!(machine.deref(2), 2);
        // the result is unbound or holds a non-REF word
        assert_eq!(machine.get_word_at(9), word::word(word::REF, 2));
    }

    #[test]
    fn test_bind_prefers_older_cell() {
        let mut machine = Machine::new();
        let global = 7;
        let local = MIN_LOCAL_INDEX + 3;
        machine.set_word(global, word::word(word::REF, global));
        machine.set_word(local, word::word(word::REF, local));
        let bound = machine.bind(global, local);
        assert_eq!(bound, local);
        assert_eq!(machine.deref(local), global);
        assert_eq!(machine.deref(global), global);
    }

    #[test]
    fn test_bind_variable_to_constant() {
        let mut machine = Machine::new();
        let c = machine.pool_mut().functor_index("zeus", 0);
        machine.set_word(0, word::word(word::CONS, c));
        machine.set_word(1, word::word(word::REF, 1));
        let bound = machine.bind(0, 1);
        assert_eq!(bound, 1);
        assert_eq!(machine.get_word_at(1), word::word(word::CONS, c));
    }

    #[test]
    #[should_panic(expected = "holds a variable")]
    fn test_bind_rejects_two_nonvariables() {
        let mut machine = Machine::new();
        let c = machine.pool_mut().functor_index("zeus", 0);
        machine.set_word(0, word::word(word::CONS, c));
        machine.set_word(1, word::word(word::CONS, c));
        machine.bind(0, 1);
    }

    #[test]
    fn test_trail_rule() {
        let mut machine = Machine::new();
        machine.reset(MIN_CODE_INDEX);
        // without a choice point, global bindings are not trailed
        machine.set_word(4, word::word(word::REF, 4));
        machine.set_word(5, word::word(word::REF, 5));
        machine.bind(4, 5);
        assert_eq!(machine.trail_top(), MIN_TRAIL_INDEX);
        // local cells are always trailed
        let local = MIN_LOCAL_INDEX + 1;
        machine.set_word(local, word::word(word::REF, local));
        machine.set_word(3, word::word(word::REF, 3));
        machine.bind(local, 3);
        assert_eq!(machine.trail_top(), MIN_TRAIL_INDEX + 1);
    }

    #[test]
    fn test_unifiable_constants() {
        let mut machine = Machine::new();
        let zeus = machine.pool_mut().functor_index("zeus", 0);
        let ares = machine.pool_mut().functor_index("ares", 0);
        machine.set_word(0, word::word(word::CONS, zeus));
        machine.set_word(1, word::word(word::CONS, zeus));
        machine.set_word(2, word::word(word::CONS, ares));
        assert!(machine.unifiable(0, 1));
        assert!(!machine.unifiable(0, 2));
    }

    #[test]
    fn test_unifiable_structures() {
        let mut machine = Machine::new();
        let f = machine.pool_mut().functor_index("f", 2);
        let zeus = machine.pool_mut().functor_index("zeus", 0);

        // f(zeus, X) at one structure, f(Y, zeus) at another
        let s1 = machine.push_functor(f);
        let s2 = machine.push_functor(f);
        let base1 = word::value(s1);
        let base2 = word::value(s2);
        machine.write_constant(base1 + 1, zeus);
        machine.write_constant(base2 + 2, zeus);

        let a1 = MIN_LOCAL_INDEX;
        let a2 = MIN_LOCAL_INDEX + 1;
        machine.set_word(a1, s1);
        machine.set_word(a2, s2);
        assert!(machine.unifiable(a1, a2));
        // both variables were bound to zeus
        assert_eq!(machine.get_word_at(base1 + 2), word::word(word::CONS, zeus));
        assert_eq!(machine.get_word_at(base2 + 1), word::word(word::CONS, zeus));
        // the worklist drained
        assert_eq!(machine.pdlptr, MIN_PDL_INDEX);
    }

    #[test]
    fn test_unifiable_functor_mismatch() {
        let mut machine = Machine::new();
        let f = machine.pool_mut().functor_index("f", 1);
        let g = machine.pool_mut().functor_index("g", 1);
        let s1 = machine.push_functor(f);
        let s2 = machine.push_functor(g);
        let a1 = MIN_LOCAL_INDEX;
        let a2 = MIN_LOCAL_INDEX + 1;
        machine.set_word(a1, s1);
        machine.set_word(a2, s2);
        assert!(!machine.unifiable(a1, a2));
    }

    #[test]
    fn test_scratchpad_restores_mode() {
        let mut machine = Machine::new();
        machine.reset(MIN_CODE_INDEX);
        machine.push_scratchpad(42);
        machine.set_mode(bytecode::COPY);
        machine.push_scratchpad(43);
        machine.set_mode(bytecode::COPY);
        assert_eq!(machine.pop_scratchpad(), 43);
        assert_eq!(machine.mode(), bytecode::COPY);
        assert_eq!(machine.pop_scratchpad(), 42);
        assert_eq!(machine.mode(), bytecode::MATCH);
    }

    #[test]
    fn test_push_target_frame_above_choice_point() {
        let mut machine = Machine::new();
        machine.reset(MIN_CODE_INDEX);
        // the initial frame becomes the source frame with three cells
        machine.push_source_frame(3);
        // a second frame becomes a choice point with two cells
        let pred = machine.pool_mut().predicate_index("p", 0);
        let clause = machine.pool_mut().add_clause(pred, 0);
        let second = machine.push_target_frame();
        assert_eq!(second, MIN_LOCAL_INDEX + 3);
        machine.push_choice_point(clause);
        machine.push_source_frame(2);
        machine.push_target_frame();
        // pop back to the initial source frame, leaving the choice point
        // above it: the next target frame goes above the choice point
        machine.source = Some(0);
        let third = machine.push_target_frame();
        assert_eq!(third, MIN_LOCAL_INDEX + 5);
    }

    #[test]
    fn test_backtrack_restores_state() {
        let mut machine = Machine::new();
        let pred = machine.pool_mut().predicate_index("p", 0);
        let c1 = machine.pool_mut().add_clause(pred, 0);
        let c2 = machine.pool_mut().add_clause(pred, 0);
        machine.pool_mut().clause_mut(c1).code = MIN_CODE_INDEX;
        machine.pool_mut().clause_mut(c2).code = MIN_CODE_INDEX + 5;

        machine.reset(MIN_CODE_INDEX);
        machine.push_choice_point(c2);
        let saved_global = machine.global_top();

        // bind a local cell (trailed) and allocate on the global stack
        let local = MIN_LOCAL_INDEX;
        machine.set_word(local, word::word(word::REF, local));
        let f = machine.pool_mut().functor_index("f", 1);
        let s = machine.push_functor(f);
        machine.set_word(local, s);
        machine.trail(local);
        assert!(machine.trail_top() > MIN_TRAIL_INDEX);

        let resumed = machine.backtrack().unwrap();
        assert_eq!(resumed, MIN_LOCAL_INDEX);
        assert_eq!(machine.mode(), bytecode::MATCH);
        assert_eq!(machine.pc, MIN_CODE_INDEX + 5);
        assert_eq!(machine.global_top(), saved_global);
        assert_eq!(machine.trail_top(), MIN_TRAIL_INDEX);
        // the trailed cell is unbound again
        assert_eq!(machine.get_word_at(local), word::word(word::REF, local));
        // c2 had no next alternative, so the choice point was popped
        assert_eq!(machine.backtrack(), Err(Exhausted));
    }

    #[test]
    fn test_backtrack_advances_clause_chain() {
        let mut machine = Machine::new();
        let pred = machine.pool_mut().predicate_index("p", 0);
        let c1 = machine.pool_mut().add_clause(pred, 0);
        let c2 = machine.pool_mut().add_clause(pred, 0);
        let c3 = machine.pool_mut().add_clause(pred, 0);
        machine.pool_mut().clause_mut(c1).code = MIN_CODE_INDEX;
        machine.pool_mut().clause_mut(c2).code = MIN_CODE_INDEX + 10;
        machine.pool_mut().clause_mut(c3).code = MIN_CODE_INDEX + 20;

        machine.reset(MIN_CODE_INDEX);
        machine.push_choice_point(c2);
        machine.backtrack().unwrap();
        assert_eq!(machine.pc, MIN_CODE_INDEX + 10);
        // the chain advanced to c3; the choice point is still live
        machine.backtrack().unwrap();
        assert_eq!(machine.pc, MIN_CODE_INDEX + 20);
        assert_eq!(machine.backtrack(), Err(Exhausted));
    }

    #[test]
    fn test_operand_fetch() {
        let mut machine = Machine::new();
        machine.write_ins(bytecode::VAR, 2);
        machine.write_ins(bytecode::ENTER, 4);
        machine.reset(MIN_CODE_INDEX);

        // MATCH: resolved against the target frame
        assert_eq!(machine.read_operator(), bytecode::MATCH | bytecode::VAR);
        assert_eq!(machine.read_operand(true), MIN_LOCAL_INDEX + 2);
        // non-variable operands come back verbatim
        assert_eq!(machine.read_operator(), bytecode::MATCH | bytecode::ENTER);
        assert_eq!(machine.read_operand(false), 4);
    }

    #[test]
    fn test_copy_mode_operand_resolution() {
        let mut machine = Machine::new();
        machine.write_ins(bytecode::VAR, 1);
        machine.reset(MIN_CODE_INDEX);
        // entering nested compounds from MATCH mode: the saved non-COPY
        // ancestor governs the frame choice
        machine.push_scratchpad(99);
        machine.set_mode(bytecode::COPY);
        machine.push_scratchpad(100);
        machine.set_mode(bytecode::COPY);
        machine.read_operator();
        assert_eq!(machine.read_operand(true), MIN_LOCAL_INDEX + 1);
    }
}
