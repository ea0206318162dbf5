//! The read-eval-print loop.
//!
//! Reads a query per line, compiles it against the loaded program, runs it,
//! and rolls the code area and constant pool back to their program-only
//! state so queries leave no residue. Line input is abstracted so the
//! interactive path can use a line editor while piped input (and tests)
//! reads plain lines, with prompts echoed into the output transcript.

use std::io::{self, BufRead, Write};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::compile::compile_query;
use crate::interp::execute;
use crate::machine::Machine;

/// The prompt written before each query.
pub const PROMPT: &str = "?- ";

/// Indicates the query was found to be true.
pub const SUCCESS: &str = "yes\n";

/// Indicates the query was found to be false.
pub const FAILURE: &str = "no\n";

/// User input requesting backtracking into another answer.
pub const NEXT_ANSWER: &str = ";";

/// User command exiting the REPL.
pub const HALT: &str = "halt";

/// A source of user lines for the REPL and for answer continuation.
pub trait LineInput {
    /// Presents `prompt` and reads one line, stripped of its line ending.
    /// Returns None at end of input.
    fn read_line(&mut self, prompt: &str, out: &mut dyn Write) -> io::Result<Option<String>>;
}

/// Plain line input over any buffered reader. The prompt is written to the
/// output stream, making transcripts self-contained.
pub struct BufferInput<R> {
    reader: R,
}

impl<R: BufRead> BufferInput<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: BufRead> LineInput for BufferInput<R> {
    fn read_line(&mut self, prompt: &str, out: &mut dyn Write) -> io::Result<Option<String>> {
        out.write_all(prompt.as_bytes())?;
        out.flush()?;
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(Some(line))
    }
}

/// Interactive line input with editing and history.
pub struct EditorInput {
    editor: DefaultEditor,
}

impl EditorInput {
    pub fn new() -> rustyline::Result<Self> {
        Ok(Self {
            editor: DefaultEditor::new()?,
        })
    }
}

impl LineInput for EditorInput {
    fn read_line(&mut self, prompt: &str, _out: &mut dyn Write) -> io::Result<Option<String>> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if !line.trim().is_empty() {
                    let _ = self.editor.add_history_entry(line.as_str());
                }
                Ok(Some(line))
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => Ok(None),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e)),
        }
    }
}

/// Runs the REPL until `halt` or end of input. The machine must already
/// hold the compiled program; each query is compiled at the code top and
/// rolled back afterwards, including queries that fail to compile.
pub fn run(
    machine: &mut Machine,
    input: &mut dyn LineInput,
    out: &mut dyn Write,
) -> io::Result<()> {
    let query_addr = machine.code_top();
    let memento = machine.create_memento();
    while let Some(line) = input.read_line(PROMPT, out)? {
        if line == HALT {
            break;
        }
        match compile_query(machine, &line) {
            Ok(vars) => execute(machine, query_addr, &vars, input, out)?,
            Err(e) => writeln!(out, "{}", e)?,
        }
        machine.set_memento(&memento);
    }
    out.flush()
}
