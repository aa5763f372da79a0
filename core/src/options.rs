//! Buffer and description options.

use crate::String;

/// Options for creating an [`InstructionBuffer`](crate::buffer::InstructionBuffer).
///
/// # Example
///
/// ```
/// use ilstage_core::buffer::InstructionBuffer;
/// use ilstage_core::options::BufferOptions;
///
/// let options = BufferOptions {
///     entry_anchor: Some("entry".into()),
///     ..Default::default()
/// };
/// let buffer = InstructionBuffer::with_options(&options);
/// assert_eq!(buffer.len(), 1);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BufferOptions {
    /// Name of an anchor label placed as the first step.
    ///
    /// The anchor describes like a marked label and is skipped by flushes.
    /// It is an ordinary step otherwise: it counts toward `len()` and can
    /// be removed.
    pub entry_anchor: Option<String>,

    /// Number of steps to reserve room for.
    pub initial_capacity: usize,
}

/// Options for [`InstructionBuffer::describe_with`](crate::buffer::InstructionBuffer::describe_with).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DescribeOptions {
    /// Append ` // name` to local loads and stores whose slot has a scope
    /// record. When disabled, scope records are not consulted at all.
    pub annotate_locals: bool,
}

impl Default for DescribeOptions {
    fn default() -> Self {
        Self {
            annotate_locals: true,
        }
    }
}
