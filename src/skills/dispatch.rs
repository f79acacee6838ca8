//! 技能分发表：技能名 → 输出 Schema → 状态处理函数
//!
//! 分发是对 SkillName 的穷举 match，新增技能时编译器会指出所有需要补全的位置。

use schemars::schema_for;
use serde::Serialize;
use serde_json::Value;

use crate::core::ChecklistError;
use crate::memory::{state_manager, ResearchState};
use crate::skills::models::{
    CompletionSummaryOutput, GenerateInitialChecklistOutput, GenerateRefinementQuestionsOutput,
    IncorporateRefinementsOutput, InterpretProgressUpdateOutput,
};
use crate::skills::SkillName;

/// 已校验的技能输出
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SkillOutput {
    InitialChecklist(GenerateInitialChecklistOutput),
    RefinementQuestions(GenerateRefinementQuestionsOutput),
    Refinements(IncorporateRefinementsOutput),
    ProgressUpdate(InterpretProgressUpdateOutput),
    CompletionSummary(CompletionSummaryOutput),
}

impl SkillOutput {
    /// 产生该输出的技能
    pub fn skill_name(&self) -> SkillName {
        match self {
            SkillOutput::InitialChecklist(_) => SkillName::GenerateInitialChecklist,
            SkillOutput::RefinementQuestions(_) => SkillName::GenerateRefinementQuestions,
            SkillOutput::Refinements(_) => SkillName::IncorporateRefinements,
            SkillOutput::ProgressUpdate(_) => SkillName::InterpretProgressUpdate,
            SkillOutput::CompletionSummary(_) => SkillName::GenerateCompletionSummary,
        }
    }

    /// 面向用户的回复文本
    pub fn ai_response(&self) -> &str {
        match self {
            SkillOutput::InitialChecklist(o) => &o.ai_response,
            SkillOutput::RefinementQuestions(o) => &o.ai_response,
            SkillOutput::Refinements(o) => &o.ai_response,
            SkillOutput::ProgressUpdate(o) => &o.ai_response,
            SkillOutput::CompletionSummary(o) => &o.ai_response,
        }
    }

    /// 按技能的 Schema 校验原始 JSON；形状不符返回 ValidationFailure
    pub fn parse(skill: SkillName, value: Value) -> Result<Self, ChecklistError> {
        fn typed<T: serde::de::DeserializeOwned>(
            skill: SkillName,
            value: Value,
        ) -> Result<T, ChecklistError> {
            serde_json::from_value(value).map_err(|e| {
                ChecklistError::ValidationFailure(format!("{} output: {}", skill, e))
            })
        }

        Ok(match skill {
            SkillName::GenerateInitialChecklist => {
                SkillOutput::InitialChecklist(typed(skill, value)?)
            }
            SkillName::GenerateRefinementQuestions => {
                SkillOutput::RefinementQuestions(typed(skill, value)?)
            }
            SkillName::IncorporateRefinements => SkillOutput::Refinements(typed(skill, value)?),
            SkillName::InterpretProgressUpdate => SkillOutput::ProgressUpdate(typed(skill, value)?),
            SkillName::GenerateCompletionSummary => {
                SkillOutput::CompletionSummary(typed(skill, value)?)
            }
        })
    }
}

/// 技能输出的 JSON Schema（注入 system prompt）
pub fn output_schema(skill: SkillName) -> Value {
    let schema = match skill {
        SkillName::GenerateInitialChecklist => schema_for!(GenerateInitialChecklistOutput),
        SkillName::GenerateRefinementQuestions => schema_for!(GenerateRefinementQuestionsOutput),
        SkillName::IncorporateRefinements => schema_for!(IncorporateRefinementsOutput),
        SkillName::InterpretProgressUpdate => schema_for!(InterpretProgressUpdateOutput),
        SkillName::GenerateCompletionSummary => schema_for!(CompletionSummaryOutput),
    };
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

/// Schema 的格式化 JSON 文本
pub fn output_schema_json(skill: SkillName) -> String {
    serde_json::to_string_pretty(&output_schema(skill)).unwrap_or_else(|_| "{}".to_string())
}

/// 将已校验的技能输出应用到状态；输出类型与技能名不一致时返回 ValidationFailure
pub fn apply(
    state: &ResearchState,
    skill: SkillName,
    output: &SkillOutput,
) -> Result<ResearchState, ChecklistError> {
    if output.skill_name() != skill {
        return Err(ChecklistError::ValidationFailure(format!(
            "{} cannot consume output of {}",
            skill,
            output.skill_name()
        )));
    }

    tracing::debug!(skill = %skill, "Applying skill output");
    let next = match output {
        SkillOutput::InitialChecklist(o) => state_manager::apply_initial_checklist(state, o),
        SkillOutput::RefinementQuestions(o) => state_manager::apply_refinement_questions(state, o),
        SkillOutput::Refinements(o) => state_manager::apply_refinements(state, o),
        SkillOutput::ProgressUpdate(o) => state_manager::apply_progress_update(state, o),
        SkillOutput::CompletionSummary(o) => state_manager::apply_completion_summary(state, o),
    };
    Ok(next)
}

/// 以技能名字符串分发原始 JSON：未注册 → UnregisteredSkill，形状不符 → ValidationFailure
pub fn apply_json(
    state: &ResearchState,
    skill_name: &str,
    value: Value,
) -> Result<ResearchState, ChecklistError> {
    let skill: SkillName = skill_name.parse()?;
    let output = SkillOutput::parse(skill, value)?;
    apply(state, skill, &output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::WorkflowPhase;
    use crate::memory::state_manager::{create_initial_state, ingest_user_description};
    use serde_json::json;

    fn described() -> ResearchState {
        ingest_user_description(&create_initial_state(None), "Launch v2")
    }

    #[test]
    fn test_apply_json_initial_checklist() {
        let state = described();
        let next = apply_json(
            &state,
            "generate_initial_checklist",
            json!({"ai_response": "Here is a plan", "items": [{"summary": "Draft outline"}]}),
        )
        .unwrap();
        assert_eq!(next.working.checklist_items[0].item_id, "item-1");
        assert_eq!(next.workflow.phase, WorkflowPhase::AskingRefinementQuestions);
    }

    #[test]
    fn test_unregistered_skill() {
        let state = described();
        let err = apply_json(&state, "draw_diagram", json!({"ai_response": "x"})).unwrap_err();
        assert!(matches!(err, ChecklistError::UnregisteredSkill(_)));
    }

    #[test]
    fn test_invalid_shape_is_validation_failure() {
        let state = described();
        let err = apply_json(
            &state,
            "generate_initial_checklist",
            json!({"ai_response": "x", "items": "not a list"}),
        )
        .unwrap_err();
        assert!(matches!(err, ChecklistError::ValidationFailure(_)));

        let err = apply_json(
            &state,
            "generate_completion_summary",
            json!({"ai_response": "x", "unexpected": true}),
        )
        .unwrap_err();
        assert!(matches!(err, ChecklistError::ValidationFailure(_)));
    }

    #[test]
    fn test_mismatched_output_is_rejected() {
        let state = described();
        let output = SkillOutput::CompletionSummary(CompletionSummaryOutput {
            ai_response: "done".into(),
            accomplishments: vec![],
            highlights: vec![],
            timeline: vec![],
        });
        let err = apply(&state, SkillName::GenerateInitialChecklist, &output).unwrap_err();
        assert!(matches!(err, ChecklistError::ValidationFailure(_)));
    }

    #[test]
    fn test_every_skill_has_object_schema() {
        for skill in SkillName::ALL {
            let schema = output_schema(skill);
            assert_eq!(schema["type"], json!("object"), "{}", skill);
            assert!(schema["properties"].get("ai_response").is_some());
        }
        assert!(output_schema_json(SkillName::InterpretProgressUpdate).contains("needs_clarification"));
    }
}
