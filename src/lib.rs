//! Checklist Agent - 清单智能体
//!
//! 模块划分：
//! - **agent**: 会话门面（ChecklistAgent），串起 Coordinator / Executor / 持久化
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误、工作流阶段、Coordinator（阶段 → 下一步动作）
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Mock）及结构化输出
//! - **memory**: 记忆模型、纯函数状态迁移、清单快照与持久化
//! - **observability**: 日志初始化
//! - **prompting**: Prompt 模板渲染
//! - **skills**: 技能定义、输出 Schema、技能分派表

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod prompting;
pub mod skills;

pub use agent::{ChecklistAgent, SkillExecutor};
pub use core::{ChecklistError, Coordinator, Decision, WorkflowPhase};
pub use memory::{state_manager, ChecklistArtifact, ResearchState};
pub use skills::{SkillName, SkillOutput};
