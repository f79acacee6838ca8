//! 工作流阶段定义
//!
//! 任一时刻恰有一个阶段处于激活状态；阶段是 Coordinator 唯一的路由键。

use serde::{Deserialize, Serialize};

/// 清单生命周期中的每个确定性步骤
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    #[default]
    Idle,
    ReceivingDescription,
    GeneratingChecklist,
    PresentingInitialChecklist,
    AskingRefinementQuestions,
    AwaitingUserResponse,
    ProcessingFeedback,
    UpdatingChecklist,
    PresentingRevisedChecklist,
    CheckApproval,
    SavingChecklist,
    ConfirmingSave,
    ListeningForProgress,
    ReceivingUserInput,
    InterpretingIntent,
    AskingClarification,
    LoggingContext,
    PersistingUpdate,
    AcknowledgingProgress,
    CheckingCompletion,
    GeneratingSummary,
    PresentingSummary,
    SessionComplete,
}

impl WorkflowPhase {
    /// 全部阶段（按工作流顺序）
    pub const ALL: [WorkflowPhase; 23] = [
        WorkflowPhase::Idle,
        WorkflowPhase::ReceivingDescription,
        WorkflowPhase::GeneratingChecklist,
        WorkflowPhase::PresentingInitialChecklist,
        WorkflowPhase::AskingRefinementQuestions,
        WorkflowPhase::AwaitingUserResponse,
        WorkflowPhase::ProcessingFeedback,
        WorkflowPhase::UpdatingChecklist,
        WorkflowPhase::PresentingRevisedChecklist,
        WorkflowPhase::CheckApproval,
        WorkflowPhase::SavingChecklist,
        WorkflowPhase::ConfirmingSave,
        WorkflowPhase::ListeningForProgress,
        WorkflowPhase::ReceivingUserInput,
        WorkflowPhase::InterpretingIntent,
        WorkflowPhase::AskingClarification,
        WorkflowPhase::LoggingContext,
        WorkflowPhase::PersistingUpdate,
        WorkflowPhase::AcknowledgingProgress,
        WorkflowPhase::CheckingCompletion,
        WorkflowPhase::GeneratingSummary,
        WorkflowPhase::PresentingSummary,
        WorkflowPhase::SessionComplete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WorkflowPhase::Idle => "idle",
            WorkflowPhase::ReceivingDescription => "receiving_description",
            WorkflowPhase::GeneratingChecklist => "generating_checklist",
            WorkflowPhase::PresentingInitialChecklist => "presenting_initial_checklist",
            WorkflowPhase::AskingRefinementQuestions => "asking_refinement_questions",
            WorkflowPhase::AwaitingUserResponse => "awaiting_user_response",
            WorkflowPhase::ProcessingFeedback => "processing_feedback",
            WorkflowPhase::UpdatingChecklist => "updating_checklist",
            WorkflowPhase::PresentingRevisedChecklist => "presenting_revised_checklist",
            WorkflowPhase::CheckApproval => "check_approval",
            WorkflowPhase::SavingChecklist => "saving_checklist",
            WorkflowPhase::ConfirmingSave => "confirming_save",
            WorkflowPhase::ListeningForProgress => "listening_for_progress",
            WorkflowPhase::ReceivingUserInput => "receiving_user_input",
            WorkflowPhase::InterpretingIntent => "interpreting_intent",
            WorkflowPhase::AskingClarification => "asking_clarification",
            WorkflowPhase::LoggingContext => "logging_context",
            WorkflowPhase::PersistingUpdate => "persisting_update",
            WorkflowPhase::AcknowledgingProgress => "acknowledging_progress",
            WorkflowPhase::CheckingCompletion => "checking_completion",
            WorkflowPhase::GeneratingSummary => "generating_summary",
            WorkflowPhase::PresentingSummary => "presenting_summary",
            WorkflowPhase::SessionComplete => "session_complete",
        }
    }

    /// 会话是否已终结
    pub fn is_terminal(&self) -> bool {
        matches!(self, WorkflowPhase::SessionComplete)
    }
}

impl std::fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_all_phases_are_distinct() {
        let set: HashSet<_> = WorkflowPhase::ALL.iter().collect();
        assert_eq!(set.len(), 23);
    }

    #[test]
    fn test_wire_name_matches_as_str() {
        for phase in WorkflowPhase::ALL {
            let json = serde_json::to_string(&phase).unwrap();
            assert_eq!(json, format!("\"{}\"", phase.as_str()));
        }
    }

    #[test]
    fn test_default_is_idle() {
        assert_eq!(WorkflowPhase::default(), WorkflowPhase::Idle);
        assert!(WorkflowPhase::SessionComplete.is_terminal());
    }
}
