//! 会话日志：只追加的对话条目
//!
//! 插入顺序即时间顺序；每条用户或智能体发出的逻辑消息对应一条 ConversationEntry。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 对话条目类别
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationEntryKind {
    System,
    User,
    Agent,
    Progress,
}

/// 单条对话记录
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConversationEntry {
    /// 生成的唯一 ID（uuid simple 形式）
    pub entry_id: String,
    pub kind: ConversationEntryKind,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl ConversationEntry {
    pub fn new(kind: ConversationEntryKind, content: impl Into<String>) -> Self {
        Self {
            entry_id: uuid::Uuid::new_v4().simple().to_string(),
            kind,
            content: content.into(),
            created_at: Utc::now(),
            metadata: Map::new(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(ConversationEntryKind::User, content)
    }

    pub fn agent(content: impl Into<String>) -> Self {
        Self::new(ConversationEntryKind::Agent, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(ConversationEntryKind::System, content)
    }

    /// 附加一条元数据（链式）
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}
