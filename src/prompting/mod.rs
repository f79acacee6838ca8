//! Prompt 渲染
//!
//! 模板为 Markdown，占位符写作 `{{path}}`，path 是对上下文的点号路径查找
//! （如 `{{state.working.original_description}}`，数组可用下标 `{{state.working.checklist_items.0.summary}}`）。
//! 字符串原样输出，其它值输出为格式化 JSON，路径不存在或为 null 时输出空串。
//!
//! 查找顺序：`<prompts_dir>/<template_id>.md` → 编译期内置模板。

use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::core::ChecklistError;

/// Prompt 渲染能力：同一模板与上下文总是得到同一结果
pub trait PromptRenderer: Send + Sync {
    fn render(&self, template_id: &str, context: &Map<String, Value>) -> Result<String, ChecklistError>;
}

/// 内置模板（与 config/prompts 下的文件一致）
fn builtin_template(template_id: &str) -> Option<&'static str> {
    match template_id {
        "skills/generate_initial_checklist" => Some(include_str!(
            "../../config/prompts/skills/generate_initial_checklist.md"
        )),
        "skills/generate_refinement_questions" => Some(include_str!(
            "../../config/prompts/skills/generate_refinement_questions.md"
        )),
        "skills/incorporate_refinements" => Some(include_str!(
            "../../config/prompts/skills/incorporate_refinements.md"
        )),
        "skills/interpret_progress_update" => Some(include_str!(
            "../../config/prompts/skills/interpret_progress_update.md"
        )),
        "skills/completion_summary" => Some(include_str!(
            "../../config/prompts/skills/completion_summary.md"
        )),
        _ => None,
    }
}

/// 文件 + 内置模板渲染器
#[derive(Debug, Clone, Default)]
pub struct TemplateRenderer {
    prompts_dir: Option<PathBuf>,
}

impl TemplateRenderer {
    pub fn new(prompts_dir: Option<PathBuf>) -> Self {
        Self { prompts_dir }
    }

    /// 读取模板文本：覆盖目录优先，其次内置
    pub fn load_template(&self, template_id: &str) -> Result<String, ChecklistError> {
        if let Some(dir) = &self.prompts_dir {
            let path = dir.join(format!("{}.md", template_id));
            if let Ok(text) = std::fs::read_to_string(&path) {
                tracing::debug!(template = %template_id, path = %path.display(), "Loaded prompt override");
                return Ok(text);
            }
        }
        builtin_template(template_id)
            .map(str::to_string)
            .ok_or_else(|| ChecklistError::TemplateError(format!("unknown template: {}", template_id)))
    }
}

impl PromptRenderer for TemplateRenderer {
    fn render(&self, template_id: &str, context: &Map<String, Value>) -> Result<String, ChecklistError> {
        let template = self.load_template(template_id)?;
        Ok(render_str(&template, context))
    }
}

/// 按点号路径在上下文中查找
pub fn lookup<'a>(context: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = context.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

fn render_value(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// 替换模板中的 `{{path}}` 占位符；未闭合的 `{{` 原样保留
pub fn render_str(template: &str, context: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                out.push_str(&render_value(lookup(context, after[..end].trim())));
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn test_render_placeholders() {
        let context = ctx(json!({
            "state": {"working": {"original_description": "Launch v2", "items": [{"summary": "a"}]}},
            "count": 3
        }));
        let out = render_str(
            "Goal: {{ state.working.original_description }} / first: {{state.working.items.0.summary}} / n={{count}} / missing=[{{nope.x}}]",
            &context,
        );
        assert_eq!(out, "Goal: Launch v2 / first: a / n=3 / missing=[]");
    }

    #[test]
    fn test_unterminated_placeholder_kept() {
        assert_eq!(render_str("a {{b", &Map::new()), "a {{b");
    }

    #[test]
    fn test_builtin_templates_exist() {
        let renderer = TemplateRenderer::default();
        for def in crate::skills::all_skills() {
            let text = renderer.load_template(def.template_id).unwrap();
            assert!(text.contains("{{state."), "{}", def.template_id);
        }
        assert!(matches!(
            renderer.load_template("skills/unknown"),
            Err(ChecklistError::TemplateError(_))
        ));
    }

    #[test]
    fn test_prompts_dir_override() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("skills")).unwrap();
        std::fs::write(
            dir.path().join("skills/completion_summary.md"),
            "Custom for {{who}}",
        )
        .unwrap();
        let renderer = TemplateRenderer::new(Some(dir.path().to_path_buf()));
        let out = renderer
            .render("skills/completion_summary", &ctx(json!({"who": "ada"})))
            .unwrap();
        assert_eq!(out, "Custom for ada");
        // 未覆盖的模板回退到内置
        assert!(renderer.load_template("skills/incorporate_refinements").is_ok());
    }
}
