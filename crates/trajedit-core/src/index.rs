//! Step number to array position arithmetic.
//!
//! Step `j` (1-based) lives at positions `2j` (assistant) and `2j + 1` (tool)
//! of every array that flattens the step sequence, and at `j - 1` of the
//! `trajectory` array. Bounds are checked by callers against the array they
//! actually touch.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Position of the assistant message for `step`, and of its tool reply.
pub const fn step_message_indices(step: usize) -> (usize, usize) {
    let assistant = 2 * step;
    (assistant, assistant + 1)
}

/// Zero-based `trajectory` index for `step`. Step 0 maps to 0 as well; it has
/// no trajectory record and is rejected before this is ever consulted.
pub const fn step_array_index(step: usize) -> usize {
    step.saturating_sub(1)
}

/// A validated, editable step number (`>= 1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct StepNumber(usize);

/// Assistant/tool positions of one step inside a flattened message array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessagePair {
    pub assistant: usize,
    pub tool: usize,
}

impl StepNumber {
    /// Validate a caller-supplied step number. `steps` is only used to
    /// describe the failure.
    pub fn new(step: i64, steps: usize) -> Result<Self> {
        match usize::try_from(step) {
            Ok(value) if value >= 1 => Ok(Self(value)),
            _ => Err(EngineError::OutOfRange { step, steps }),
        }
    }

    pub fn get(self) -> usize {
        self.0
    }

    pub fn messages(self) -> MessagePair {
        let (assistant, tool) = step_message_indices(self.0);
        MessagePair { assistant, tool }
    }

    pub fn trajectory_index(self) -> usize {
        step_array_index(self.0)
    }
}

impl TryFrom<i64> for StepNumber {
    type Error = EngineError;

    fn try_from(step: i64) -> Result<Self> {
        Self::new(step, 0)
    }
}

impl From<StepNumber> for i64 {
    fn from(step: StepNumber) -> Self {
        step.0 as i64
    }
}

impl fmt::Display for StepNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
