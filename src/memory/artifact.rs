//! 清单快照（面向持久化的派生视图）
//!
//! 按需从 ResearchState 构建，从不存回状态本身。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::ChecklistError;
use crate::memory::{
    ChecklistItemStatus, ChecklistSubItem, ConversationEntry, ProgressLogEntry,
    RefinementExchange, ResearchState,
};

/// 快照中保留的最近对话条数
pub const CONVERSATION_EXCERPT_LEN: usize = 10;

/// 落盘的条目（不要求内部 ID）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistArtifactItem {
    pub summary: String,
    #[serde(default)]
    pub detail: Option<String>,
    pub status: ChecklistItemStatus,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub sub_items: Vec<ChecklistSubItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistArtifact {
    pub task_description: String,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ChecklistArtifactItem>,
    #[serde(default)]
    pub refinement_context: Vec<RefinementExchange>,
    #[serde(default)]
    pub progress_log: Vec<ProgressLogEntry>,
    #[serde(default)]
    pub completion_notes: Option<String>,
    #[serde(default)]
    pub conversation_excerpt: Vec<ConversationEntry>,
}

impl ChecklistArtifact {
    /// 从当前状态投影出快照；缺少原始描述时返回 MissingDescription
    pub fn from_state(state: &ResearchState) -> Result<Self, ChecklistError> {
        let working = &state.working;
        let task_description = working
            .original_description
            .clone()
            .ok_or(ChecklistError::MissingDescription)?;

        let items = working
            .checklist_items
            .iter()
            .map(|item| ChecklistArtifactItem {
                summary: item.summary.clone(),
                detail: item.detail.clone(),
                status: item.status,
                success_criteria: item.success_criteria.clone(),
                notes: item.notes.clone(),
                sub_items: item.sub_items.clone(),
            })
            .collect();

        Ok(Self {
            task_description,
            created_at: Utc::now(),
            items,
            refinement_context: working.refinement_exchanges.clone(),
            progress_log: working.progress_log.clone(),
            completion_notes: working.completion_summary.clone(),
            conversation_excerpt: state.recent_conversation(CONVERSATION_EXCERPT_LEN).to_vec(),
        })
    }

    pub fn completed_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ChecklistItemStatus::Complete)
            .count()
    }
}
