//! 结构化生成：Prompt + 技能 Schema → 已校验的 SkillOutput
//!
//! system 消息携带 schemars 生成的 JSON Schema；回复中提取 JSON（```json 代码块或最外层花括号），
//! 再按技能的输出类型反序列化。解析失败或 Schema 不符一律为 ValidationFailure，传输失败为 LlmError。

use std::sync::Arc;

use crate::core::ChecklistError;
use crate::llm::{LlmClient, Message};
use crate::skills::{output_schema_json, skill_definition, SkillName, SkillOutput};

/// 从模型回复中提取 JSON 文本
pub fn extract_json(output: &str) -> Option<&str> {
    let trimmed = output.trim();

    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        return Some(rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim()));
    }
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| &trimmed[start..=end])
}

/// 结构化生成器：持有 LLM，负责拼 system prompt、调用并校验
pub struct StructuredGenerator {
    llm: Arc<dyn LlmClient>,
}

impl StructuredGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        &self.llm
    }

    /// 构建携带输出 Schema 的 system prompt
    pub fn system_prompt(skill: SkillName) -> String {
        let def = skill_definition(skill);
        format!(
            "You are the AI Checklist Agent running skill {}.\n\
             Reply with a single JSON object and nothing else. \
             It must match this JSON Schema exactly; unknown fields are rejected.\n\n{}",
            def.summary(),
            output_schema_json(skill)
        )
    }

    /// 单次调用：不重试，重试由调用方决定
    pub async fn invoke(&self, prompt: &str, skill: SkillName) -> Result<SkillOutput, ChecklistError> {
        let messages = [Message::system(Self::system_prompt(skill)), Message::user(prompt)];
        let reply = self
            .llm
            .complete(&messages)
            .await
            .map_err(ChecklistError::LlmError)?;

        let json_str = extract_json(&reply).ok_or_else(|| {
            ChecklistError::ValidationFailure(format!("{} reply contains no JSON object", skill))
        })?;
        let value: serde_json::Value = serde_json::from_str(json_str).map_err(|e| {
            ChecklistError::ValidationFailure(format!("{} reply is not valid JSON: {}", skill, e))
        })?;
        SkillOutput::parse(skill, value)
    }
}
