//! 技能系统
//!
//! 技能（Skill）是一次结构化 LLM 调用：Prompt 模板 + 输出 Schema + 状态处理函数。
//! 协调器只给出技能名；执行器渲染模板、调用模型、校验输出，再经分发表写回状态。
//!
//! ```text
//! SkillName ──► skill_definition() ──► template_id ──► PromptRenderer
//!     │
//!     └──► SkillOutput::parse() ──► dispatch::apply() ──► state_manager
//! ```

pub mod definitions;
pub mod dispatch;
pub mod models;

pub use definitions::{all_skills, skill_definition, SkillDefinition, SkillName};
pub use dispatch::{apply, apply_json, output_schema, output_schema_json, SkillOutput};
