//! 清单智能体错误类型
//!
//! 与调用方的重试策略配合：ValidationFailure / LlmError / LlmTimeout 可对同一决策重试；
//! UnregisteredSkill 属于编程错误，不应重试。

use thiserror::Error;

/// 核心与外部协作者（LLM、模板、持久化）可能产生的错误
#[derive(Error, Debug)]
pub enum ChecklistError {
    /// 结构化输出不符合技能 Schema；状态未改变，可重试同一决策
    #[error("Structured output failed validation: {0}")]
    ValidationFailure(String),

    /// 技能名没有对应的处理函数
    #[error("No handler registered for skill: {0}")]
    UnregisteredSkill(String),

    /// 生成清单快照时缺少原始任务描述
    #[error("Cannot build checklist artifact without an original description")]
    MissingDescription,

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM request timed out after {0}s")]
    LlmTimeout(u64),

    #[error("Prompt template error: {0}")]
    TemplateError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    ConfigError(#[from] config::ConfigError),
}

impl ChecklistError {
    /// 是否属于外部调用边界上的瞬时失败（调用方可对同一决策重试）
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ChecklistError::ValidationFailure(_)
                | ChecklistError::LlmError(_)
                | ChecklistError::LlmTimeout(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(ChecklistError::ValidationFailure("bad".into()).is_retryable());
        assert!(ChecklistError::LlmTimeout(60).is_retryable());
        assert!(!ChecklistError::UnregisteredSkill("x".into()).is_retryable());
        assert!(!ChecklistError::MissingDescription.is_retryable());
    }

    #[test]
    fn test_error_messages() {
        let err = ChecklistError::UnregisteredSkill("summarize_everything".into());
        assert!(err.to_string().contains("summarize_everything"));
    }
}
