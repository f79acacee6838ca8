//! 记忆模型：清单条目、细化问答、进度日志与聚合状态 ResearchState
//!
//! 整棵树可序列化，除结构校验外不含行为。ResearchState 是各操作之间传递的唯一事实来源，
//! 每次迁移都返回一个新值（Clone 即深拷贝，不与输入共享可变子结构）。

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{ChecklistError, WorkflowPhase, MAX_REFINEMENT_QUESTIONS};
use crate::memory::{ConversationEntry, WorkingMemory};

/// 清单条目的生命周期状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChecklistItemStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
}

impl ChecklistItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChecklistItemStatus::Pending => "pending",
            ChecklistItemStatus::InProgress => "in_progress",
            ChecklistItemStatus::Complete => "complete",
        }
    }

    /// 终端展示用符号
    pub fn symbol(&self) -> char {
        match self {
            ChecklistItemStatus::Pending => ' ',
            ChecklistItemStatus::InProgress => '~',
            ChecklistItemStatus::Complete => 'x',
        }
    }
}

/// 父条目下的子清单条目
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistSubItem {
    pub sub_item_id: String,
    pub summary: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub status: ChecklistItemStatus,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
}

/// 单个可执行的清单条目
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChecklistItem {
    pub item_id: String,
    pub summary: String,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub status: ChecklistItemStatus,
    #[serde(default)]
    pub success_criteria: Option<String>,
    #[serde(default)]
    pub notes: Vec<String>,
    #[serde(default)]
    pub sub_items: Vec<ChecklistSubItem>,
    /// 已分配的最大子条目序号（`<item_id>-K`），只增不减
    #[serde(default)]
    pub next_sub_seq: u32,
}

impl ChecklistItem {
    pub fn new(item_id: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            summary: summary.into(),
            detail: None,
            status: ChecklistItemStatus::Pending,
            success_criteria: None,
            notes: Vec::new(),
            sub_items: Vec::new(),
            next_sub_seq: 0,
        }
    }

    /// 分配下一个子条目 ID；计数器落后于已有子条目时跳过已占用的 ID
    pub fn allocate_sub_item_id(&mut self) -> String {
        loop {
            self.next_sub_seq += 1;
            let candidate = format!("{}-{}", self.item_id, self.next_sub_seq);
            if !self.has_sub_item(&candidate) {
                return candidate;
            }
        }
    }

    /// 子条目 ID 是否为本条目的 `<item_id>-N` 形式
    pub fn owns_sub_item_id(&self, sub_item_id: &str) -> bool {
        parse_seq(sub_item_id, &format!("{}-", self.item_id)).is_some()
    }

    /// 登记外部给出的子条目 ID，保证之后生成的 ID 不会与之冲突
    pub fn observe_sub_item_id(&mut self, sub_item_id: &str) {
        let prefix = format!("{}-", self.item_id);
        if let Some(seq) = parse_seq(sub_item_id, &prefix) {
            self.next_sub_seq = self.next_sub_seq.max(seq);
        }
    }

    pub fn has_sub_item(&self, sub_item_id: &str) -> bool {
        self.sub_items.iter().any(|s| s.sub_item_id == sub_item_id)
    }

    /// 条目及其全部子条目是否均已完成
    pub fn is_complete(&self) -> bool {
        self.status == ChecklistItemStatus::Complete
            && self
                .sub_items
                .iter()
                .all(|s| s.status == ChecklistItemStatus::Complete)
    }
}

/// 从 `<prefix>N` 形式的 ID 中解析序号
pub(crate) fn parse_seq(id: &str, prefix: &str) -> Option<u32> {
    id.strip_prefix(prefix)?.parse().ok()
}

/// 等待用户回答的细化问题（仅在「已提问」到「已处理反馈」之间存在）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefinementPrompt {
    pub question: String,
    pub intent: String,
}

/// 细化问答的历史记录，创建后不可变
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefinementExchange {
    pub question: String,
    pub intent: String,
    pub answer: String,
    pub collected_at: DateTime<Utc>,
}

/// 一条被解读出状态变化的进度信号
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProgressLogEntry {
    pub entry_id: String,
    pub user_text: String,
    #[serde(default)]
    pub referenced_item_ids: Vec<String>,
    #[serde(default)]
    pub status_transitions: BTreeMap<String, ChecklistItemStatus>,
    #[serde(default)]
    pub sub_status_transitions: BTreeMap<String, ChecklistItemStatus>,
    #[serde(default)]
    pub contextual_notes: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// 固定身份（persona / mission / version）
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoreMemory {
    pub persona_name: String,
    pub mission: String,
    pub version: String,
}

impl Default for CoreMemory {
    fn default() -> Self {
        Self {
            persona_name: "AI Checklist Agent".to_string(),
            mission: "Transform user goals into measurable checklists, guide execution through \
                      dialogue, and summarize outcomes with documented context."
                .to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// 用户偏好
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SemanticMemory {
    #[serde(default)]
    pub user_handle: Option<String>,
    #[serde(default = "default_tone")]
    pub preferred_tone: String,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub saved_preferences: BTreeMap<String, Value>,
}

fn default_tone() -> String {
    "collaborative".to_string()
}

impl Default for SemanticMemory {
    fn default() -> Self {
        Self {
            user_handle: None,
            preferred_tone: default_tone(),
            timezone: None,
            saved_preferences: BTreeMap::new(),
        }
    }
}

/// 状态机的确定性标志位
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowState {
    pub phase: WorkflowPhase,
    pub questions_asked: u32,
    pub max_refinement_questions: u32,
    pub checklist_finalized: bool,
    pub pending_save: bool,
    #[serde(default)]
    pub listening_started_at: Option<DateTime<Utc>>,
    pub last_transition_at: DateTime<Utc>,
    pub awaiting_clarification: bool,
}

impl Default for WorkflowState {
    fn default() -> Self {
        Self {
            phase: WorkflowPhase::Idle,
            questions_asked: 0,
            max_refinement_questions: MAX_REFINEMENT_QUESTIONS,
            checklist_finalized: false,
            pending_save: false,
            listening_started_at: None,
            last_transition_at: Utc::now(),
            awaiting_clarification: false,
        }
    }
}

/// 聚合记忆树：identity + preferences + workflow + working
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResearchState {
    #[serde(default)]
    pub core: CoreMemory,
    #[serde(default)]
    pub semantic: SemanticMemory,
    #[serde(default)]
    pub workflow: WorkflowState,
    #[serde(default)]
    pub working: WorkingMemory,
}

impl ResearchState {
    /// 从 JSON 恢复状态并做结构校验；缺省或落后的 ID 计数器按已有 ID 补齐
    pub fn from_json(raw: &str) -> Result<Self, ChecklistError> {
        let mut state: ResearchState = serde_json::from_str(raw)?;
        state.validate()?;
        state.working.sync_id_counters();
        Ok(state)
    }

    /// 结构校验：条目 ID 在清单内唯一，子条目 ID 在整个清单内唯一，对话条目 ID 唯一
    ///
    /// 进度信号只按子条目 ID 定位，因此子条目 ID 不能跨父条目重复。
    pub fn validate(&self) -> Result<(), ChecklistError> {
        let mut item_ids = HashSet::new();
        let mut sub_ids = HashSet::new();
        for item in &self.working.checklist_items {
            if !item_ids.insert(item.item_id.as_str()) {
                return Err(ChecklistError::ValidationFailure(format!(
                    "duplicate checklist item id: {}",
                    item.item_id
                )));
            }
            for sub in &item.sub_items {
                if !sub_ids.insert(sub.sub_item_id.as_str()) {
                    return Err(ChecklistError::ValidationFailure(format!(
                        "duplicate sub-item id {} under {}",
                        sub.sub_item_id, item.item_id
                    )));
                }
            }
        }
        let mut entry_ids = HashSet::new();
        for entry in &self.working.conversation_log {
            if !entry_ids.insert(entry.entry_id.as_str()) {
                return Err(ChecklistError::ValidationFailure(format!(
                    "duplicate conversation entry id: {}",
                    entry.entry_id
                )));
            }
        }
        Ok(())
    }

    /// 最近 n 条对话
    pub fn recent_conversation(&self, n: usize) -> &[ConversationEntry] {
        let log = &self.working.conversation_log;
        &log[log.len().saturating_sub(n)..]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sub_item_id_allocation_skips_observed() {
        let mut item = ChecklistItem::new("item-2", "Ship it");
        assert_eq!(item.allocate_sub_item_id(), "item-2-1");
        item.observe_sub_item_id("item-2-7");
        item.observe_sub_item_id("item-3-9");
        item.observe_sub_item_id("item-2-x");
        assert_eq!(item.allocate_sub_item_id(), "item-2-8");
    }

    #[test]
    fn test_parse_seq() {
        assert_eq!(parse_seq("item-12", "item-"), Some(12));
        assert_eq!(parse_seq("item-1-2", "item-"), None);
        assert_eq!(parse_seq("task-1", "item-"), None);
    }

    #[test]
    fn test_state_json_roundtrip_validates() {
        let mut state = ResearchState::default();
        let item_id = state.working.allocate_item_id();
        state.working.checklist_items.push(ChecklistItem::new(item_id, "a"));
        let raw = serde_json::to_string(&state).unwrap();
        let restored = ResearchState::from_json(&raw).unwrap();
        assert_eq!(restored, state);
    }

    #[test]
    fn test_from_json_raises_lagging_counters() {
        let mut state = ResearchState::default();
        let mut item = ChecklistItem::new("item-3", "a");
        item.sub_items.push(ChecklistSubItem {
            sub_item_id: "item-3-2".into(),
            summary: "b".into(),
            detail: None,
            status: ChecklistItemStatus::Pending,
            success_criteria: None,
            notes: vec![],
        });
        state.working.checklist_items.push(item);
        let raw = serde_json::to_string(&state).unwrap();
        let mut restored = ResearchState::from_json(&raw).unwrap();
        assert_eq!(restored.working.next_item_seq, 3);
        assert_eq!(restored.working.allocate_item_id(), "item-4");
        assert_eq!(
            restored.working.checklist_items[0].allocate_sub_item_id(),
            "item-3-3"
        );
    }

    #[test]
    fn test_sub_item_ids_unique_across_items() {
        let mut state = ResearchState::default();
        for item_id in ["item-1", "item-2"] {
            let mut item = ChecklistItem::new(item_id, "a");
            item.sub_items.push(ChecklistSubItem {
                sub_item_id: "qa".into(),
                summary: "b".into(),
                detail: None,
                status: ChecklistItemStatus::Pending,
                success_criteria: None,
                notes: vec![],
            });
            state.working.checklist_items.push(item);
        }
        assert!(matches!(
            state.validate(),
            Err(ChecklistError::ValidationFailure(_))
        ));
        assert!(!state.working.checklist_items[0].owns_sub_item_id("qa"));
        assert!(state.working.checklist_items[0].owns_sub_item_id("item-1-4"));
        assert!(!state.working.checklist_items[0].owns_sub_item_id("item-2-4"));
    }

    #[test]
    fn test_duplicate_item_ids_rejected() {
        let mut state = ResearchState::default();
        state.working.checklist_items.push(ChecklistItem::new("item-1", "a"));
        state.working.checklist_items.push(ChecklistItem::new("item-1", "b"));
        let raw = serde_json::to_string(&state).unwrap();
        assert!(matches!(
            ResearchState::from_json(&raw),
            Err(ChecklistError::ValidationFailure(_))
        ));
    }

    #[test]
    fn test_item_complete_requires_sub_items() {
        let mut item = ChecklistItem::new("item-1", "a");
        item.status = ChecklistItemStatus::Complete;
        item.sub_items.push(ChecklistSubItem {
            sub_item_id: "item-1-1".into(),
            summary: "b".into(),
            detail: None,
            status: ChecklistItemStatus::InProgress,
            success_criteria: None,
            notes: vec![],
        });
        assert!(!item.is_complete());
        item.sub_items[0].status = ChecklistItemStatus::Complete;
        assert!(item.is_complete());
    }

    #[test]
    fn test_enum_membership_enforced() {
        let raw = r#"{"sub_item_id":"item-1-1","summary":"s","status":"blocked"}"#;
        assert!(serde_json::from_str::<ChecklistSubItem>(raw).is_err());
    }
}
