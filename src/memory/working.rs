//! 工作记忆：当前会话的清单、细化问答、对话与进度日志
//!
//! 每个会话一份，随 ResearchState 一起在迁移函数之间传递。

use serde::{Deserialize, Serialize};

use crate::memory::models::parse_seq;
use crate::memory::{
    ChecklistItem, ConversationEntry, ProgressLogEntry, RefinementExchange, RefinementPrompt,
};

const ITEM_PREFIX: &str = "item-";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkingMemory {
    #[serde(default)]
    pub original_description: Option<String>,
    #[serde(default)]
    pub checklist_items: Vec<ChecklistItem>,
    /// 待回答的细化问题
    #[serde(default)]
    pub refinement_questions: Vec<RefinementPrompt>,
    #[serde(default)]
    pub refinement_exchanges: Vec<RefinementExchange>,
    #[serde(default)]
    pub latest_user_message: Option<String>,
    #[serde(default)]
    pub conversation_log: Vec<ConversationEntry>,
    #[serde(default)]
    pub progress_log: Vec<ProgressLogEntry>,
    /// 已保存快照的位置（对核心不透明）
    #[serde(default)]
    pub checklist_file_path: Option<String>,
    #[serde(default)]
    pub completion_summary: Option<String>,
    #[serde(default)]
    pub clarification_prompt: Option<String>,
    /// 已分配的最大条目序号（`item-N`），只增不减
    #[serde(default)]
    pub next_item_seq: u32,
}

impl WorkingMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// 分配下一个条目 ID；计数器落后于已有条目时跳过已占用的 ID
    pub fn allocate_item_id(&mut self) -> String {
        loop {
            self.next_item_seq += 1;
            let candidate = format!("{}{}", ITEM_PREFIX, self.next_item_seq);
            if self.item_index(&candidate).is_none() {
                return candidate;
            }
        }
    }

    /// 把条目与子条目计数器抬到不低于已有 ID 的序号
    pub fn sync_id_counters(&mut self) {
        let ids: Vec<String> = self
            .checklist_items
            .iter()
            .map(|i| i.item_id.clone())
            .collect();
        for id in &ids {
            self.observe_item_id(id);
        }
        for item in &mut self.checklist_items {
            let sub_ids: Vec<String> = item
                .sub_items
                .iter()
                .map(|s| s.sub_item_id.clone())
                .collect();
            for id in &sub_ids {
                item.observe_sub_item_id(id);
            }
        }
    }

    /// 登记外部给出的条目 ID，保证之后生成的 ID 不会与之冲突
    pub fn observe_item_id(&mut self, item_id: &str) {
        if let Some(seq) = parse_seq(item_id, ITEM_PREFIX) {
            self.next_item_seq = self.next_item_seq.max(seq);
        }
    }

    pub fn item_index(&self, item_id: &str) -> Option<usize> {
        self.checklist_items.iter().position(|i| i.item_id == item_id)
    }

    /// 清单的文本视图（终端展示用）
    pub fn checklist_section(&self) -> String {
        let mut s = String::new();
        for item in &self.checklist_items {
            let detail = item
                .detail
                .as_deref()
                .map(|d| format!(" ({})", d))
                .unwrap_or_default();
            s.push_str(&format!(
                " [{}] {}: {}{}\n",
                item.status.symbol(),
                item.item_id,
                item.summary,
                detail
            ));
            if let Some(criteria) = &item.success_criteria {
                s.push_str(&format!("        success: {}\n", criteria));
            }
            if !item.notes.is_empty() {
                s.push_str(&format!("        notes: {}\n", item.notes.join("; ")));
            }
            if !item.sub_items.is_empty() {
                s.push_str("        sub-checklist:\n");
            }
            for sub in &item.sub_items {
                s.push_str(&format!(
                    "          [{}] {}: {}\n",
                    sub.status.symbol(),
                    sub.sub_item_id,
                    sub.summary
                ));
                if !sub.notes.is_empty() {
                    s.push_str(&format!("              notes: {}\n", sub.notes.join("; ")));
                }
            }
        }
        s
    }
}
