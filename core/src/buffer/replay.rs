//! Flushing a buffer into a backend and describing it as text.

use hashbrown::HashMap;

use crate::backend::Backend;
use crate::buffer::InstructionBuffer;
use crate::error::BufferError;
use crate::identity::LocalScope;
use crate::opcode::{LocalSlot, OpCode};
use crate::options::DescribeOptions;
use crate::step::{ReplayMode, Trace};
use crate::{String, ToString, Vec};

impl InstructionBuffer {
    /// Replay every step into `backend`, in order, and return the trace.
    ///
    /// The backend receives the same call sequence it would have received had
    /// the steps been emitted directly. The buffer itself is left unchanged
    /// and can be flushed again into another backend.
    pub fn flush<B: Backend>(&self, backend: &mut B) -> String {
        tracing::debug!(steps = self.len(), backend = ?backend.target(), "flushing buffer");
        let mut trace = Trace::new();
        let mut mode = ReplayMode::Real(backend);
        for step in self.iter() {
            step.replay(&mut mode, &mut trace);
        }
        trace.into_string()
    }

    /// One line per step, with local loads and stores annotated from
    /// `locals`.
    pub fn describe(&self, locals: &[LocalScope]) -> Result<Vec<String>, BufferError> {
        self.describe_with(locals, &DescribeOptions::default())
    }

    pub fn describe_with(
        &self,
        locals: &[LocalScope],
        options: &DescribeOptions,
    ) -> Result<Vec<String>, BufferError> {
        tracing::debug!(steps = self.len(), scopes = locals.len(), "describing buffer");
        let mut trace = Trace::new();
        let mut lines = Vec::with_capacity(self.len());
        for (index, step) in self.iter().enumerate() {
            trace.clear();
            step.replay(&mut ReplayMode::DescribeOnly, &mut trace);
            let mut line = trace.as_str().trim_end().to_string();
            if options.annotate_locals {
                annotate(&mut line, index, locals)?;
            }
            lines.push(line);
        }
        Ok(lines)
    }
}

/// Append ` // name` to a local load/store line.
fn annotate(line: &mut String, index: usize, locals: &[LocalScope]) -> Result<(), BufferError> {
    let slot = {
        let mut tokens = line.split_whitespace();
        let Some(op) = tokens.next().and_then(OpCode::from_name) else {
            return Ok(());
        };
        match op.local_slot() {
            Some(LocalSlot::Fixed(slot)) => slot,
            Some(LocalSlot::Operand) => match tokens.next() {
                Some(token) if is_numeric(token) => {
                    token.parse::<u16>().map_err(|_| BufferError::InvalidSlot {
                        operand: token.to_string(),
                        index,
                    })?
                }
                // Steps holding a local reference render its name, not a number.
                _ => return Ok(()),
            },
            None => return Ok(()),
        }
    };

    let scopes = active_scopes(locals, index)?;
    let scope = scopes
        .get(&slot)
        .ok_or(BufferError::MissingScope { slot, index })?;
    line.push_str(" // ");
    line.push_str(scope.local.name());
    Ok(())
}

fn is_numeric(token: &str) -> bool {
    token
        .trim_start_matches(['-', '+'])
        .starts_with(|c: char| c.is_ascii_digit())
}

/// Slot -> scope map of the records active at step `index`.
fn active_scopes(
    locals: &[LocalScope],
    index: usize,
) -> Result<HashMap<u16, &LocalScope>, BufferError> {
    let mut scopes: HashMap<u16, &LocalScope> = HashMap::new();
    for scope in locals.iter().filter(|scope| scope.is_active_at(index)) {
        let slot = scope.local.slot();
        if let Some(first) = scopes.insert(slot, scope) {
            return Err(BufferError::ConflictingScopes {
                slot,
                index,
                first: first.local.name().to_string(),
                second: scope.local.name().to_string(),
            });
        }
    }
    Ok(scopes)
}
