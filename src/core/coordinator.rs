//! Coordinator：阶段 → 下一步动作
//!
//! 纯只读函数：只看 workflow.phase（以及细化阶段的提问计数），从不修改状态。
//! 需要外部 LLM 调用时返回 LlmSkill，由调用方执行后交给技能分派表。

use serde::Serialize;
use serde_json::{Map, Value};

use crate::core::WorkflowPhase;
use crate::memory::ResearchState;
use crate::skills::SkillName;

/// Coordinator 给出的控制流指令
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// 需要调用某个 LLM 技能
    LlmSkill {
        skill: SkillName,
        reason: String,
        metadata: Map<String, Value>,
    },
    /// 需要调用某个工具
    Tool {
        name: String,
        reason: String,
        metadata: Map<String, Value>,
    },
    /// 会话已完成
    Complete { reason: String },
    /// 无需动作（等待用户输入）
    Noop { reason: String },
}

impl Decision {
    pub fn llm(skill: SkillName, reason: impl Into<String>) -> Self {
        Decision::LlmSkill {
            skill,
            reason: reason.into(),
            metadata: Map::new(),
        }
    }

    pub fn tool(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let name = name.into();
        let mut metadata = Map::new();
        metadata.insert("tool".to_string(), Value::String(name.clone()));
        Decision::Tool {
            name,
            reason: reason.into(),
            metadata,
        }
    }

    pub fn complete(reason: impl Into<String>) -> Self {
        Decision::Complete {
            reason: reason.into(),
        }
    }

    pub fn noop(reason: impl Into<String>) -> Self {
        Decision::Noop {
            reason: reason.into(),
        }
    }

    /// 若为 LlmSkill 则返回技能名
    pub fn skill(&self) -> Option<SkillName> {
        match self {
            Decision::LlmSkill { skill, .. } => Some(*skill),
            _ => None,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Decision::LlmSkill { reason, .. }
            | Decision::Tool { reason, .. }
            | Decision::Complete { reason }
            | Decision::Noop { reason } => reason,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Decision::Noop { .. })
    }
}

/// 确定性状态机：决定下一步系统动作
#[derive(Debug, Clone, Copy, Default)]
pub struct Coordinator;

impl Coordinator {
    pub fn new() -> Self {
        Self
    }

    pub fn next_action(&self, state: &ResearchState) -> Decision {
        let workflow = &state.workflow;
        match workflow.phase {
            WorkflowPhase::GeneratingChecklist => Decision::llm(
                SkillName::GenerateInitialChecklist,
                "Transform the goal description into a checklist",
            ),
            WorkflowPhase::AskingRefinementQuestions => {
                if workflow.questions_asked >= workflow.max_refinement_questions {
                    Decision::noop(
                        "Awaiting user responses because refinement question limit was reached",
                    )
                } else {
                    Decision::llm(
                        SkillName::GenerateRefinementQuestions,
                        "Need up to three clarifying questions",
                    )
                }
            }
            WorkflowPhase::ProcessingFeedback => Decision::llm(
                SkillName::IncorporateRefinements,
                "User provided refinement feedback",
            ),
            WorkflowPhase::InterpretingIntent => Decision::llm(
                SkillName::InterpretProgressUpdate,
                "Interpret the latest progress update",
            ),
            WorkflowPhase::GeneratingSummary => Decision::llm(
                SkillName::GenerateCompletionSummary,
                "All items complete; compile the final summary",
            ),
            // 其余阶段等待用户事件，不需要 LLM
            WorkflowPhase::Idle
            | WorkflowPhase::ReceivingDescription
            | WorkflowPhase::PresentingInitialChecklist
            | WorkflowPhase::AwaitingUserResponse
            | WorkflowPhase::UpdatingChecklist
            | WorkflowPhase::PresentingRevisedChecklist
            | WorkflowPhase::CheckApproval
            | WorkflowPhase::SavingChecklist
            | WorkflowPhase::ConfirmingSave
            | WorkflowPhase::ListeningForProgress
            | WorkflowPhase::ReceivingUserInput
            | WorkflowPhase::AskingClarification
            | WorkflowPhase::LoggingContext
            | WorkflowPhase::PersistingUpdate
            | WorkflowPhase::AcknowledgingProgress
            | WorkflowPhase::CheckingCompletion
            | WorkflowPhase::PresentingSummary
            | WorkflowPhase::SessionComplete => {
                Decision::noop("No LLM action required for the current phase")
            }
        }
    }
}
