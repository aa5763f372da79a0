#![cfg_attr(all(not(feature = "std"), not(test)), no_std)]

//! Deferred instruction buffer for stack-machine code generation.
//!
//! Code is recorded into an [`InstructionBuffer`] instead of being written
//! straight to a backend. While recorded, steps can be inserted and removed,
//! branch opcodes can be upgraded, and byte offsets can be queried. A final
//! [`flush`](InstructionBuffer::flush) replays everything into a [`Backend`]
//! in order; [`describe`](InstructionBuffer::describe) renders the same steps
//! as annotated text.

extern crate alloc;

// Re-export for convenience so other modules don't need alloc:: prefix
#[allow(unused_imports)]
pub(crate) use alloc::{rc::Rc, string::String, string::ToString, vec::Vec};

pub mod backend;
pub mod binder;
pub mod buffer;
pub mod error;
pub mod identity;
pub mod metadata;
pub mod opcode;
pub mod options;
pub mod step;

pub use backend::{Backend, BackendCall, NativeLabel, NativeLocal, RecordingBackend, TargetId};
pub use buffer::InstructionBuffer;
pub use error::BufferError;
pub use identity::{ExceptionBlock, Label, Local, LocalScope};
pub use opcode::OpCode;
pub use options::{BufferOptions, DescribeOptions};
pub use step::{OpcodeUpdate, ReplayMode, Step, StepKind, Trace};

/// Test utilities for enabling logging in tests
#[cfg(test)]
pub mod test_utils {
    /// Initialize tracing subscriber for tests with TRACE level
    /// Call this at the start of tests where you want to see logging output
    ///
    /// # Example
    /// ```ignore
    /// #[test]
    /// fn test_branch_upgrade() {
    ///     test_utils::init_test_logging();
    ///     // ... your test code
    /// }
    /// ```
    pub fn init_test_logging() {
        use tracing_subscriber::{EnvFilter, fmt};

        // Try to initialize, ignore error if already initialized
        let _ = fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("trace")),
            )
            .with_test_writer()
            .try_init();
    }
}
