//! 记忆层：记忆模型、对话日志、工作记忆、状态迁移、清单快照与持久化

pub mod artifact;
pub mod conversation;
pub mod models;
pub mod persistence;
pub mod state_manager;
pub mod working;

pub use artifact::{ChecklistArtifact, ChecklistArtifactItem};
pub use conversation::{ConversationEntry, ConversationEntryKind};
pub use models::{
    ChecklistItem, ChecklistItemStatus, ChecklistSubItem, CoreMemory, ProgressLogEntry,
    RefinementExchange, RefinementPrompt, ResearchState, SemanticMemory, WorkflowState,
};
pub use persistence::{ArtifactStore, ChecklistRepository, InMemoryArtifactStore};
pub use working::WorkingMemory;
