//! 会话门面：ChecklistAgent
//!
//! 持有唯一一份 ResearchState（单写者，`&mut self`），串起：
//! Coordinator（下一步做什么）→ SkillExecutor（渲染模板 + 结构化调用 LLM）→ 技能分派表（写回状态），
//! 以及清单快照的持久化。外部调用失败时状态保持不变，错误原样返回给调用方。

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::config::AppConfig;
use crate::core::{ChecklistError, Coordinator, Decision, WorkflowPhase};
use crate::llm::{LlmClient, MockLlmClient, OpenAiClient, StructuredGenerator};
use crate::memory::{state_manager, ArtifactStore, ChecklistArtifact, ChecklistRepository, ResearchState};
use crate::prompting::{PromptRenderer, TemplateRenderer};
use crate::skills::{self, skill_definition, SkillName, SkillOutput};

/// 根据配置创建 LLM 客户端：provider = mock 或缺少 API Key 时回退到 Mock
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM (configured)");
        return Arc::new(MockLlmClient::new());
    }

    match cfg.api_key() {
        Some(key) if provider == "openrouter" || provider == "openai" => {
            tracing::info!(provider = %provider, model = %cfg.llm.model, "Using OpenAI-compatible LLM");
            Arc::new(OpenAiClient::new(
                cfg.llm.base_url.as_deref(),
                &cfg.llm.model,
                &key,
                cfg.llm.temperature,
            ))
        }
        _ => {
            tracing::warn!(provider = %provider, "No API key set or provider unknown, using Mock LLM");
            Arc::new(MockLlmClient::new())
        }
    }
}

/// 技能执行器：渲染技能模板并调用结构化生成
pub struct SkillExecutor {
    renderer: Arc<dyn PromptRenderer>,
    generator: StructuredGenerator,
}

impl SkillExecutor {
    pub fn new(llm: Arc<dyn LlmClient>, renderer: Arc<dyn PromptRenderer>) -> Self {
        Self {
            renderer,
            generator: StructuredGenerator::new(llm),
        }
    }

    /// 使用内置模板的执行器
    pub fn with_builtin_templates(llm: Arc<dyn LlmClient>) -> Self {
        Self::new(llm, Arc::new(TemplateRenderer::default()))
    }

    pub fn llm(&self) -> &Arc<dyn LlmClient> {
        self.generator.llm()
    }

    /// 渲染技能 Prompt：上下文总含 `state`，调用方的同名键不会覆盖它
    pub fn build_prompt(
        &self,
        skill: SkillName,
        state: &ResearchState,
        context: Option<&Map<String, Value>>,
    ) -> Result<String, ChecklistError> {
        let mut prompt_context = Map::new();
        if let Some(extra) = context {
            prompt_context.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        prompt_context.insert("state".to_string(), serde_json::to_value(state)?);

        let def = skill_definition(skill);
        self.renderer.render(def.template_id, &prompt_context)
    }

    pub async fn run_skill(
        &self,
        skill: SkillName,
        state: &ResearchState,
        context: Option<&Map<String, Value>>,
    ) -> Result<SkillOutput, ChecklistError> {
        let prompt = self.build_prompt(skill, state, context)?;
        tracing::debug!(skill = %skill, prompt_len = prompt.len(), "Running skill");
        self.generator.invoke(&prompt, skill).await
    }
}

/// 清单会话
pub struct ChecklistAgent {
    coordinator: Coordinator,
    executor: SkillExecutor,
    store: Arc<dyn ArtifactStore>,
    state: ResearchState,
    request_timeout: Duration,
    max_retries: u32,
}

impl ChecklistAgent {
    pub fn new(executor: SkillExecutor, store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            coordinator: Coordinator::default(),
            executor,
            store,
            state: state_manager::create_initial_state(None),
            request_timeout: Duration::from_secs(60),
            max_retries: 1,
        }
    }

    /// 以既有状态恢复会话
    pub fn with_state(mut self, state: ResearchState) -> Self {
        self.state = state;
        self
    }

    /// 单次 LLM 请求超时与额外重试次数
    pub fn with_call_policy(mut self, request_timeout: Duration, max_retries: u32) -> Self {
        self.request_timeout = request_timeout;
        self.max_retries = max_retries;
        self
    }

    /// 按配置装配：LLM、模板目录、存储目录、用户偏好
    pub fn from_config(cfg: &AppConfig) -> Self {
        let llm = create_llm_from_config(cfg);
        let renderer = Arc::new(TemplateRenderer::new(cfg.app.prompts_dir.clone()));
        let store = Arc::new(ChecklistRepository::new(cfg.storage_dir()));

        let mut state = state_manager::create_initial_state(cfg.user.handle.as_deref());
        state.semantic.preferred_tone = cfg.user.tone.clone();
        state.semantic.timezone = cfg.user.timezone.clone();

        Self::new(SkillExecutor::new(llm, renderer), store)
            .with_state(state)
            .with_call_policy(
                Duration::from_secs(cfg.llm.timeouts.request),
                cfg.llm.max_retries,
            )
    }

    fn swap_state(&mut self, next: ResearchState) {
        if next.workflow.phase != self.state.workflow.phase {
            tracing::info!(
                from = %self.state.workflow.phase,
                to = %next.workflow.phase,
                "Workflow phase changed"
            );
        }
        self.state = next;
    }

    pub fn ingest_description(&mut self, description: &str) {
        let next = state_manager::ingest_user_description(&self.state, description);
        self.swap_state(next);
    }

    pub fn record_refinement_feedback(&mut self, feedback: &str) {
        let next = state_manager::record_user_feedback(&self.state, feedback);
        self.swap_state(next);
    }

    pub fn approve_checklist(&mut self) {
        let next = state_manager::mark_checklist_approved(&self.state);
        self.swap_state(next);
    }

    pub fn request_more_changes(&mut self, reason: &str) {
        let next = state_manager::mark_checklist_rejected(&self.state, reason);
        self.swap_state(next);
    }

    pub fn start_tracking(&mut self) {
        let next = state_manager::activate_tracking_mode(&self.state);
        self.swap_state(next);
    }

    pub fn ingest_progress_update(&mut self, update: &str) {
        let next = state_manager::ingest_progress_input(&self.state, update);
        self.swap_state(next);
    }

    pub fn acknowledge_progress(&mut self) {
        let next = state_manager::acknowledge_progress(&self.state);
        self.swap_state(next);
    }

    pub fn acknowledge_summary(&mut self) {
        let next = state_manager::acknowledge_summary_delivery(&self.state);
        self.swap_state(next);
    }

    /// 构建快照 → 写入存储 → 记录保存结果 → 进入进度监听；返回保存位置
    pub fn save_checklist(&mut self) -> Result<String, ChecklistError> {
        let artifact = state_manager::build_artifact(&self.state)?;
        let location = self.store.save(&artifact)?;
        tracing::info!(location = %location, items = artifact.items.len(), "Checklist saved");

        let next = state_manager::record_save_result(&self.state, &artifact, &location);
        self.swap_state(next);
        self.start_tracking();
        Ok(location)
    }

    pub fn next_decision(&self) -> Decision {
        self.coordinator.next_action(&self.state)
    }

    /// 执行一轮「决策 → 技能 → 写回」。非 LlmSkill 决策直接返回；
    /// 外部调用按配置的超时与重试执行，最终失败时状态不变并返回错误
    pub async fn run_planned_action(
        &mut self,
        context: Option<Map<String, Value>>,
    ) -> Result<Decision, ChecklistError> {
        let decision = self.next_decision();
        let Decision::LlmSkill { skill, metadata, .. } = &decision else {
            tracing::debug!(reason = %decision.reason(), "No skill to run");
            return Ok(decision);
        };

        let mut prompt_context = metadata.clone();
        if let Some(extra) = context {
            prompt_context.extend(extra);
        }

        let output = self.invoke_with_retries(*skill, &prompt_context).await?;
        let next = skills::apply(&self.state, *skill, &output)?;
        self.swap_state(next);
        Ok(decision)
    }

    async fn invoke_with_retries(
        &self,
        skill: SkillName,
        context: &Map<String, Value>,
    ) -> Result<SkillOutput, ChecklistError> {
        let attempts = self.max_retries + 1;
        let mut attempt = 1;
        loop {
            let result = match tokio::time::timeout(
                self.request_timeout,
                self.executor.run_skill(skill, &self.state, Some(context)),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(ChecklistError::LlmTimeout(self.request_timeout.as_secs())),
            };

            match result {
                Ok(output) => return Ok(output),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    tracing::warn!(skill = %skill, attempt, error = %e, "Skill call failed, retrying");
                    attempt += 1;
                }
                Err(e) => {
                    tracing::warn!(skill = %skill, attempt, error = %e, "Skill call failed");
                    return Err(e);
                }
            }
        }
    }

    pub fn build_artifact(&self) -> Result<ChecklistArtifact, ChecklistError> {
        state_manager::build_artifact(&self.state)
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.state.workflow.phase
    }

    pub fn state(&self) -> &ResearchState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryArtifactStore;
    use serde_json::json;

    fn agent_with(mock: Arc<MockLlmClient>) -> ChecklistAgent {
        ChecklistAgent::new(
            SkillExecutor::with_builtin_templates(mock),
            Arc::new(InMemoryArtifactStore::new()),
        )
    }

    #[test]
    fn test_build_prompt_keeps_state_key() {
        let executor = SkillExecutor::with_builtin_templates(Arc::new(MockLlmClient::new()));
        let state = state_manager::ingest_user_description(
            &state_manager::create_initial_state(None),
            "Plan a team offsite",
        );
        let mut ctx = Map::new();
        ctx.insert("state".into(), json!("overridden"));
        let prompt = executor
            .build_prompt(SkillName::GenerateInitialChecklist, &state, Some(&ctx))
            .unwrap();
        assert!(prompt.contains("Plan a team offsite"));
        assert!(!prompt.contains("overridden"));
    }

    #[tokio::test]
    async fn test_noop_decision_does_not_call_llm() {
        let mock = Arc::new(MockLlmClient::new());
        let mut agent = agent_with(mock.clone());
        let decision = agent.run_planned_action(None).await.unwrap();
        assert!(decision.is_noop());
        assert_eq!(mock.call_count(), 0);
        assert_eq!(agent.phase(), WorkflowPhase::Idle);
    }

    #[tokio::test]
    async fn test_retry_after_invalid_output() {
        let mock = Arc::new(MockLlmClient::with_replies([
            "not json at all",
            r#"{"ai_response": "Draft", "items": [{"summary": "Book venue"}]}"#,
        ]));
        let mut agent = agent_with(mock.clone());
        agent.ingest_description("Plan a team offsite");

        let decision = agent.run_planned_action(None).await.unwrap();
        assert_eq!(decision.skill(), Some(SkillName::GenerateInitialChecklist));
        assert_eq!(mock.call_count(), 2);
        assert_eq!(agent.phase(), WorkflowPhase::AskingRefinementQuestions);
        assert_eq!(agent.state().working.checklist_items[0].summary, "Book venue");
    }

    #[tokio::test]
    async fn test_failure_leaves_state_untouched() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_error("503");
        mock.push_error("503");
        let mut agent = agent_with(mock.clone());
        agent.ingest_description("Plan a team offsite");
        let before = agent.state().clone();

        let err = agent.run_planned_action(None).await.unwrap_err();
        assert!(matches!(err, ChecklistError::LlmError(_)));
        assert_eq!(agent.state(), &before);
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_save_checklist_starts_tracking() {
        let store = Arc::new(InMemoryArtifactStore::new());
        let mock = Arc::new(MockLlmClient::with_replies([
            r#"{"ai_response": "Draft", "items": [{"summary": "Book venue"}]}"#,
        ]));
        let mut agent = ChecklistAgent::new(SkillExecutor::with_builtin_templates(mock), store.clone());
        agent.ingest_description("Plan a team offsite");
        agent.run_planned_action(None).await.unwrap();
        agent.approve_checklist();

        let location = agent.save_checklist().unwrap();
        assert!(location.starts_with("memory://"));
        assert_eq!(store.len(), 1);
        assert_eq!(agent.phase(), WorkflowPhase::ListeningForProgress);
        assert_eq!(agent.state().working.checklist_file_path.as_deref(), Some(location.as_str()));
        assert!(agent.state().workflow.listening_started_at.is_some());
    }

    #[test]
    fn test_save_without_description_fails() {
        let mut agent = agent_with(Arc::new(MockLlmClient::new()));
        assert!(matches!(agent.save_checklist(), Err(ChecklistError::MissingDescription)));
    }

    #[test]
    fn test_from_config_applies_user_preferences() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".into();
        cfg.user.handle = Some("ada".into());
        cfg.user.tone = "concise".into();
        let agent = ChecklistAgent::from_config(&cfg);
        assert_eq!(agent.state().semantic.user_handle.as_deref(), Some("ada"));
        assert_eq!(agent.state().semantic.preferred_tone, "concise");
        assert_eq!(agent.phase(), WorkflowPhase::Idle);
    }
}
