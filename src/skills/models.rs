//! 技能结构化输出 Schema
//!
//! 每个技能对应一种固定输出结构；schemars 生成的 JSON Schema 会注入 system prompt，
//! serde 反序列化即校验（未知字段一律拒绝）。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::memory::ChecklistItemStatus;

/// 子任务提案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChecklistSubBullet {
    pub summary: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
}

/// 单个清单条目提案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ChecklistBullet {
    pub summary: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub sub_items: Vec<ChecklistSubBullet>,
}

/// generate_initial_checklist 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateInitialChecklistOutput {
    pub ai_response: String,
    #[serde(default)]
    pub items: Vec<ChecklistBullet>,
    #[serde(default)]
    pub risks: Vec<String>,
}

/// 单个追问
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RefinementQuestionModel {
    pub question: String,
    pub intent: String,
    #[serde(default)]
    pub missing_detail: Option<String>,
}

/// generate_refinement_questions 的输出（最多三个问题）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct GenerateRefinementQuestionsOutput {
    pub ai_response: String,
    #[serde(default)]
    pub questions: Vec<RefinementQuestionModel>,
}

/// 细化指令动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RefinementAction {
    Add,
    Update,
    Remove,
}

/// 子条目级细化指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RefinementSubItemUpdateModel {
    #[serde(default)]
    pub sub_item_id: Option<String>,
    pub action: RefinementAction,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
}

/// 条目级细化指令
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RefinementUpdateModel {
    #[serde(default)]
    pub item_id: Option<String>,
    pub action: RefinementAction,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub sub_items: Vec<ChecklistSubBullet>,
    #[serde(default)]
    pub sub_item_updates: Vec<RefinementSubItemUpdateModel>,
}

/// incorporate_refinements 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct IncorporateRefinementsOutput {
    pub ai_response: String,
    #[serde(default)]
    pub updates: Vec<RefinementUpdateModel>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// 从用户描述中推断出的一条进度信号
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ProgressSignalModel {
    #[serde(default)]
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub sub_item_ids: Vec<String>,
    #[serde(default)]
    pub new_status: Option<ChecklistItemStatus>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

/// interpret_progress_update 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InterpretProgressUpdateOutput {
    pub ai_response: String,
    #[serde(default)]
    pub signals: Vec<ProgressSignalModel>,
    #[serde(default)]
    pub needs_clarification: bool,
    #[serde(default)]
    pub clarification_prompt: Option<String>,
}

/// generate_completion_summary 的输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CompletionSummaryOutput {
    pub ai_response: String,
    #[serde(default)]
    pub accomplishments: Vec<String>,
    #[serde(default)]
    pub highlights: Vec<String>,
    #[serde(default)]
    pub timeline: Vec<String>,
}
