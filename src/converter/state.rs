//! Pipeline states
//!
//! ```text
//! Init → InitializingSchema → Streaming
//!      → (BatchFull → Validating → Writing → CommitCheck)*
//!      → Finalizing → Done
//! ```
//!
//! `Failed` is reachable from every step; `Interrupted` from `Streaming`
//! and `CommitCheck`.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Init,
    InitializingSchema,
    Streaming,
    BatchFull,
    Validating,
    Writing,
    CommitCheck,
    Finalizing,
    Done,
    Interrupted,
    Failed,
}

impl PipelineState {
    /// The run is over in this state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Done | PipelineState::Interrupted | PipelineState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Init => "init",
            PipelineState::InitializingSchema => "initializing_schema",
            PipelineState::Streaming => "streaming",
            PipelineState::BatchFull => "batch_full",
            PipelineState::Validating => "validating",
            PipelineState::Writing => "writing",
            PipelineState::CommitCheck => "commit_check",
            PipelineState::Finalizing => "finalizing",
            PipelineState::Done => "done",
            PipelineState::Interrupted => "interrupted",
            PipelineState::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(PipelineState::Done.is_terminal());
        assert!(PipelineState::Interrupted.is_terminal());
        assert!(PipelineState::Failed.is_terminal());
        assert!(!PipelineState::Writing.is_terminal());
        assert_eq!(PipelineState::default(), PipelineState::Init);
    }
}
