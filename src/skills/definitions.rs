//! 技能定义：技能名、模板 ID 与描述
//!
//! 技能集合是封闭的；每个技能对应一个 Prompt 模板与一种输出 Schema（见 skills::models）。

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::core::ChecklistError;

/// 已注册的技能
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillName {
    GenerateInitialChecklist,
    GenerateRefinementQuestions,
    IncorporateRefinements,
    InterpretProgressUpdate,
    GenerateCompletionSummary,
}

impl SkillName {
    pub const ALL: [SkillName; 5] = [
        SkillName::GenerateInitialChecklist,
        SkillName::GenerateRefinementQuestions,
        SkillName::IncorporateRefinements,
        SkillName::InterpretProgressUpdate,
        SkillName::GenerateCompletionSummary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SkillName::GenerateInitialChecklist => "generate_initial_checklist",
            SkillName::GenerateRefinementQuestions => "generate_refinement_questions",
            SkillName::IncorporateRefinements => "incorporate_refinements",
            SkillName::InterpretProgressUpdate => "interpret_progress_update",
            SkillName::GenerateCompletionSummary => "generate_completion_summary",
        }
    }
}

impl std::fmt::Display for SkillName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillName {
    type Err = ChecklistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SkillName::ALL
            .into_iter()
            .find(|skill| skill.as_str() == s.trim())
            .ok_or_else(|| ChecklistError::UnregisteredSkill(s.to_string()))
    }
}

/// 技能的声明式元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SkillDefinition {
    pub name: SkillName,
    /// Prompt 模板 ID（相对 prompts 目录，不含扩展名）
    pub template_id: &'static str,
    pub description: &'static str,
}

impl SkillDefinition {
    /// 用于日志与 Prompt 的简短描述
    pub fn summary(&self) -> String {
        format!("[{}] {}", self.name, self.description)
    }
}

/// 获取技能定义（封闭集合，按技能名穷举）
pub fn skill_definition(name: SkillName) -> SkillDefinition {
    match name {
        SkillName::GenerateInitialChecklist => SkillDefinition {
            name,
            template_id: "skills/generate_initial_checklist",
            description: "Create a measurable checklist from the user's description.",
        },
        SkillName::GenerateRefinementQuestions => SkillDefinition {
            name,
            template_id: "skills/generate_refinement_questions",
            description: "Ask up to three high-value refinement questions.",
        },
        SkillName::IncorporateRefinements => SkillDefinition {
            name,
            template_id: "skills/incorporate_refinements",
            description: "Adjust the checklist based on user feedback.",
        },
        SkillName::InterpretProgressUpdate => SkillDefinition {
            name,
            template_id: "skills/interpret_progress_update",
            description: "Map user input to checklist progress and context logs.",
        },
        SkillName::GenerateCompletionSummary => SkillDefinition {
            name,
            template_id: "skills/completion_summary",
            description: "Summarize the completed work using checklist data and logs.",
        },
    }
}

pub fn all_skills() -> Vec<SkillDefinition> {
    SkillName::ALL.into_iter().map(skill_definition).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_roundtrip() {
        for skill in SkillName::ALL {
            assert_eq!(skill.as_str().parse::<SkillName>().unwrap(), skill);
        }
    }

    #[test]
    fn test_unknown_skill_is_unregistered() {
        let err = "draw_diagram".parse::<SkillName>().unwrap_err();
        assert!(matches!(err, ChecklistError::UnregisteredSkill(name) if name == "draw_diagram"));
    }

    #[test]
    fn test_all_skills_have_templates() {
        let defs = all_skills();
        assert_eq!(defs.len(), 5);
        for def in defs {
            assert!(def.template_id.starts_with("skills/"));
            assert!(def.summary().contains(def.name.as_str()));
        }
    }
}
