//! 核心编排层：错误、工作流阶段、Coordinator（阶段 → 决策）

pub mod coordinator;
pub mod error;
pub mod phase;

pub use coordinator::{Coordinator, Decision};
pub use error::ChecklistError;
pub use phase::WorkflowPhase;

/// 细化提问总数上限
pub const MAX_REFINEMENT_QUESTIONS: u32 = 3;
