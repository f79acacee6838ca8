//! 状态迁移：纯函数 (ResearchState, 事件) → ResearchState
//!
//! 约定：
//! - 入参只读，返回全新的状态值（先 clone 再在副本上修改）
//! - 空白文本输入视为无操作，返回未改变的副本
//! - 阶段或工作记忆确有变化时才刷新 last_transition_at
//! - 不做 I/O、不阻塞；要么完整生效，要么是无操作

use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::{json, Value};

use crate::core::{ChecklistError, WorkflowPhase, MAX_REFINEMENT_QUESTIONS};
use crate::memory::{
    ChecklistArtifact, ChecklistItem, ChecklistSubItem, ConversationEntry, ProgressLogEntry,
    RefinementExchange, RefinementPrompt, ResearchState,
};
use crate::skills::models::{
    ChecklistSubBullet, CompletionSummaryOutput, GenerateInitialChecklistOutput,
    GenerateRefinementQuestionsOutput, IncorporateRefinementsOutput,
    InterpretProgressUpdateOutput, RefinementAction, RefinementSubItemUpdateModel,
};
use crate::skills::SkillName;

const DEFAULT_QUESTIONS_INTRO: &str = "Here are a few clarification questions.";

/// 去除首尾空白；空文本返回 None
fn sanitize(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Option<String> 中的非空文本
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().and_then(sanitize)
}

/// 若新状态与旧状态不同则刷新迁移时间
fn commit(before: &ResearchState, mut after: ResearchState) -> ResearchState {
    if after != *before {
        after.workflow.last_transition_at = Utc::now();
    }
    after
}

fn skill_entry(skill: SkillName, content: &str) -> ConversationEntry {
    ConversationEntry::agent(content).with_metadata("skill", skill.as_str())
}

/// 创建初始状态：phase = idle，提问计数为 0，上限为 3
pub fn create_initial_state(user_handle: Option<&str>) -> ResearchState {
    let mut state = ResearchState::default();
    state.semantic.user_handle = user_handle.and_then(sanitize).map(str::to_string);
    state.workflow.max_refinement_questions = MAX_REFINEMENT_QUESTIONS;
    state
}

/// 记录用户的初始目标描述，进入 generating_checklist
pub fn ingest_user_description(state: &ResearchState, description: &str) -> ResearchState {
    let Some(text) = sanitize(description) else {
        return state.clone();
    };
    let mut next = state.clone();
    next.working.original_description = Some(text.to_string());
    next.workflow.phase = WorkflowPhase::GeneratingChecklist;
    next.working.conversation_log.push(ConversationEntry::user(text));
    commit(state, next)
}

/// 记录用户对细化问题的回答，进入 processing_feedback
pub fn record_user_feedback(state: &ResearchState, feedback: &str) -> ResearchState {
    let Some(text) = sanitize(feedback) else {
        return state.clone();
    };
    let mut next = state.clone();
    next.working.latest_user_message = Some(text.to_string());
    next.workflow.phase = WorkflowPhase::ProcessingFeedback;
    next.working.conversation_log.push(ConversationEntry::user(text));
    commit(state, next)
}

/// 记录自然语言进度描述，进入 interpreting_intent
pub fn ingest_progress_input(state: &ResearchState, user_message: &str) -> ResearchState {
    let Some(text) = sanitize(user_message) else {
        return state.clone();
    };
    let mut next = state.clone();
    next.working.latest_user_message = Some(text.to_string());
    next.workflow.phase = WorkflowPhase::InterpretingIntent;
    next.working.conversation_log.push(ConversationEntry::user(text));
    commit(state, next)
}

/// 用户批准清单：标记定稿并等待保存
pub fn mark_checklist_approved(state: &ResearchState) -> ResearchState {
    let mut next = state.clone();
    next.workflow.checklist_finalized = true;
    next.workflow.pending_save = true;
    next.workflow.phase = WorkflowPhase::SavingChecklist;
    commit(state, next)
}

/// 用户要求继续修改：回到 processing_feedback
///
/// 有理由时记入对话，并作为最新用户消息交给下一轮 incorporate_refinements。
pub fn mark_checklist_rejected(state: &ResearchState, reason: &str) -> ResearchState {
    let mut next = state.clone();
    if let Some(text) = sanitize(reason) {
        next.working.latest_user_message = Some(text.to_string());
        next.working.conversation_log.push(ConversationEntry::user(text));
    }
    next.workflow.phase = WorkflowPhase::ProcessingFeedback;
    commit(state, next)
}

/// 快照写入后记录保存位置，进入 confirming_save
pub fn record_save_result(
    state: &ResearchState,
    artifact: &ChecklistArtifact,
    location: &str,
) -> ResearchState {
    let Some(location) = sanitize(location) else {
        return state.clone();
    };
    let mut next = state.clone();
    next.working.checklist_file_path = Some(location.to_string());
    next.workflow.pending_save = false;
    next.workflow.phase = WorkflowPhase::ConfirmingSave;
    next.working.conversation_log.push(
        ConversationEntry::system(format!("Checklist saved to {}", location)).with_metadata(
            "artifact_summary",
            json!({
                "location": location,
                "task_description": artifact.task_description,
                "item_count": artifact.items.len(),
                "completed_items": artifact.completed_count(),
            }),
        ),
    );
    commit(state, next)
}

/// 进入进度监听；listening_started_at 只在首次设置
pub fn activate_tracking_mode(state: &ResearchState) -> ResearchState {
    let mut next = state.clone();
    next.workflow.phase = WorkflowPhase::ListeningForProgress;
    next.workflow.listening_started_at.get_or_insert_with(Utc::now);
    commit(state, next)
}

/// 确认进度后回到监听，清除澄清状态与最新消息
pub fn acknowledge_progress(state: &ResearchState) -> ResearchState {
    let mut next = state.clone();
    next.workflow.phase = WorkflowPhase::ListeningForProgress;
    next.workflow.awaiting_clarification = false;
    next.working.clarification_prompt = None;
    next.working.latest_user_message = None;
    commit(state, next)
}

/// 完成总结已展示：会话结束
pub fn acknowledge_summary_delivery(state: &ResearchState) -> ResearchState {
    let mut next = state.clone();
    next.workflow.phase = WorkflowPhase::SessionComplete;
    commit(state, next)
}

/// 清单非空，且所有条目及子条目均为 complete
pub fn checklist_is_complete(state: &ResearchState) -> bool {
    let items = &state.working.checklist_items;
    !items.is_empty() && items.iter().all(ChecklistItem::is_complete)
}

/// 构建可持久化的清单快照
pub fn build_artifact(state: &ResearchState) -> Result<ChecklistArtifact, ChecklistError> {
    ChecklistArtifact::from_state(state)
}

fn build_sub_items(item: &mut ChecklistItem, bullets: &[ChecklistSubBullet]) -> Vec<ChecklistSubItem> {
    bullets
        .iter()
        .map(|bullet| ChecklistSubItem {
            sub_item_id: item.allocate_sub_item_id(),
            summary: bullet.summary.clone(),
            detail: bullet.detail.clone(),
            status: Default::default(),
            success_criteria: bullet.success_criteria.clone(),
            notes: Vec::new(),
        })
        .collect()
}

fn overwrite(target: &mut String, value: &Option<String>) {
    if let Some(v) = non_empty(value) {
        *target = v.to_string();
    }
}

fn overwrite_opt(target: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = non_empty(value) {
        *target = Some(v.to_string());
    }
}

/// 子条目级 add / update / remove
///
/// add 只接受本条目 `<item_id>-N` 形式且未被占用的显式 ID，其余一律重新分配，
/// 这样子条目 ID 在整个清单内唯一，进度信号按 ID 定位时不会落到别的父条目上。
fn apply_sub_item_updates(item: &mut ChecklistItem, updates: &[RefinementSubItemUpdateModel]) {
    for change in updates {
        let target_id = non_empty(&change.sub_item_id);
        match change.action {
            RefinementAction::Add => {
                let Some(summary) = non_empty(&change.summary) else {
                    tracing::debug!(item_id = %item.item_id, "Skipping sub-item add without summary");
                    continue;
                };
                let sub_item_id = match target_id {
                    Some(id) if item.owns_sub_item_id(id) && !item.has_sub_item(id) => {
                        item.observe_sub_item_id(id);
                        id.to_string()
                    }
                    _ => item.allocate_sub_item_id(),
                };
                item.sub_items.push(ChecklistSubItem {
                    sub_item_id,
                    summary: summary.to_string(),
                    detail: change.detail.clone(),
                    status: Default::default(),
                    success_criteria: change.success_criteria.clone(),
                    notes: Vec::new(),
                });
            }
            RefinementAction::Remove => match target_id {
                Some(id) if item.has_sub_item(id) => item.sub_items.retain(|s| s.sub_item_id != id),
                _ => tracing::debug!(item_id = %item.item_id, ?target_id, "Ignoring removal of unknown sub-item"),
            },
            RefinementAction::Update => {
                let Some(sub) = target_id
                    .and_then(|id| item.sub_items.iter_mut().find(|s| s.sub_item_id == id))
                else {
                    tracing::debug!(item_id = %item.item_id, ?target_id, "Ignoring update of unknown sub-item");
                    continue;
                };
                overwrite(&mut sub.summary, &change.summary);
                overwrite_opt(&mut sub.detail, &change.detail);
                overwrite_opt(&mut sub.success_criteria, &change.success_criteria);
            }
        }
    }
}

/// 技能结果：初始清单（item-1..n，子条目 item-k-1..m），进入 asking_refinement_questions
pub(crate) fn apply_initial_checklist(
    state: &ResearchState,
    output: &GenerateInitialChecklistOutput,
) -> ResearchState {
    let mut next = state.clone();
    let items = output
        .items
        .iter()
        .enumerate()
        .map(|(index, bullet)| {
            let mut item = ChecklistItem::new(format!("item-{}", index + 1), bullet.summary.clone());
            item.detail = bullet.detail.clone();
            item.success_criteria = bullet.success_criteria.clone();
            item.sub_items = build_sub_items(&mut item, &bullet.sub_items);
            item
        })
        .collect();
    next.working.checklist_items = items;
    next.working.next_item_seq = output.items.len() as u32;
    next.workflow.questions_asked = 0;
    next.workflow.phase = WorkflowPhase::AskingRefinementQuestions;

    let mut entry = skill_entry(SkillName::GenerateInitialChecklist, &output.ai_response);
    if !output.risks.is_empty() {
        entry = entry.with_metadata("risks", output.risks.clone());
    }
    next.working.conversation_log.push(entry);
    commit(state, next)
}

/// 技能结果：细化问题；有问题则等待用户回答，否则直接进入审批
pub(crate) fn apply_refinement_questions(
    state: &ResearchState,
    output: &GenerateRefinementQuestionsOutput,
) -> ResearchState {
    let mut next = state.clone();
    let prompts: Vec<RefinementPrompt> = output
        .questions
        .iter()
        .map(|q| RefinementPrompt {
            question: q.question.clone(),
            intent: q.intent.clone(),
        })
        .collect();

    next.workflow.questions_asked += prompts.len() as u32;
    next.workflow.phase = if prompts.is_empty() {
        WorkflowPhase::CheckApproval
    } else {
        WorkflowPhase::AwaitingUserResponse
    };

    let intro = sanitize(&output.ai_response).unwrap_or(DEFAULT_QUESTIONS_INTRO);
    next.working
        .conversation_log
        .push(skill_entry(SkillName::GenerateRefinementQuestions, intro));
    for prompt in &prompts {
        next.working
            .conversation_log
            .push(ConversationEntry::agent(prompt.question.clone()));
    }
    next.working.refinement_questions = prompts;
    commit(state, next)
}

/// 技能结果：按 add / update / remove 指令修改清单，并把待答问题归档为问答记录
pub(crate) fn apply_refinements(
    state: &ResearchState,
    output: &IncorporateRefinementsOutput,
) -> ResearchState {
    let mut next = state.clone();
    let working = &mut next.working;

    for update in &output.updates {
        let target_id = non_empty(&update.item_id);
        match update.action {
            RefinementAction::Add => {
                let Some(summary) = non_empty(&update.summary) else {
                    tracing::debug!("Skipping checklist add without summary");
                    continue;
                };
                let item_id = match target_id {
                    Some(id) if working.item_index(id).is_none() => {
                        working.observe_item_id(id);
                        id.to_string()
                    }
                    _ => working.allocate_item_id(),
                };
                let mut item = ChecklistItem::new(item_id, summary);
                item.detail = update.detail.clone();
                item.success_criteria = update.success_criteria.clone();
                item.sub_items = build_sub_items(&mut item, &update.sub_items);
                apply_sub_item_updates(&mut item, &update.sub_item_updates);
                working.checklist_items.push(item);
            }
            RefinementAction::Remove => match target_id.and_then(|id| working.item_index(id)) {
                Some(index) => {
                    working.checklist_items.remove(index);
                }
                None => tracing::debug!(?target_id, "Ignoring removal of unknown checklist item"),
            },
            RefinementAction::Update => {
                let Some(index) = target_id.and_then(|id| working.item_index(id)) else {
                    tracing::debug!(?target_id, "Ignoring update of unknown checklist item");
                    continue;
                };
                let item = &mut working.checklist_items[index];
                overwrite(&mut item.summary, &update.summary);
                overwrite_opt(&mut item.detail, &update.detail);
                overwrite_opt(&mut item.success_criteria, &update.success_criteria);
                if !update.sub_items.is_empty() {
                    let subs = build_sub_items(item, &update.sub_items);
                    item.sub_items = subs;
                }
                apply_sub_item_updates(item, &update.sub_item_updates);
            }
        }
    }

    let answer = working.latest_user_message.take().unwrap_or_default();
    let collected_at = Utc::now();
    for prompt in std::mem::take(&mut working.refinement_questions) {
        working.refinement_exchanges.push(RefinementExchange {
            question: prompt.question,
            intent: prompt.intent,
            answer: answer.clone(),
            collected_at,
        });
    }

    let mut entry = skill_entry(SkillName::IncorporateRefinements, &output.ai_response);
    if !output.notes.is_empty() {
        entry = entry.with_metadata("notes", output.notes.clone());
    }
    working.conversation_log.push(entry);
    next.workflow.phase = WorkflowPhase::CheckApproval;
    commit(state, next)
}

/// 技能结果：解读进度信号，更新状态与备注，写进度日志，决定澄清 / 总结 / 确认
pub(crate) fn apply_progress_update(
    state: &ResearchState,
    output: &InterpretProgressUpdateOutput,
) -> ResearchState {
    let mut next = state.clone();
    let user_text = next.working.latest_user_message.clone().unwrap_or_default();
    let recorded_at = Utc::now();

    for signal in &output.signals {
        let mut referenced: Vec<String> = Vec::new();
        let mut transitions = BTreeMap::new();
        let mut sub_transitions = BTreeMap::new();

        for item_id in &signal.item_ids {
            let Some(item) = next
                .working
                .checklist_items
                .iter_mut()
                .find(|i| &i.item_id == item_id)
            else {
                tracing::debug!(item_id = %item_id, "Progress signal references unknown item");
                continue;
            };
            if let Some(status) = signal.new_status {
                if item.status != status {
                    item.status = status;
                }
            }
            if let Some(note) = signal.note.as_deref().filter(|n| !n.is_empty()) {
                item.notes.push(note.to_string());
            }
            transitions.insert(item_id.clone(), item.status);
            if !referenced.contains(item_id) {
                referenced.push(item_id.clone());
            }
        }

        // 子条目 ID 在整个清单内唯一，首个匹配即目标
        for sub_item_id in &signal.sub_item_ids {
            let Some(sub) = next
                .working
                .checklist_items
                .iter_mut()
                .flat_map(|i| i.sub_items.iter_mut())
                .find(|s| &s.sub_item_id == sub_item_id)
            else {
                tracing::debug!(sub_item_id = %sub_item_id, "Progress signal references unknown sub-item");
                continue;
            };
            if let Some(status) = signal.new_status {
                if sub.status != status {
                    sub.status = status;
                }
            }
            if let Some(note) = signal.note.as_deref().filter(|n| !n.is_empty()) {
                sub.notes.push(note.to_string());
            }
            sub_transitions.insert(sub_item_id.clone(), sub.status);
        }

        // 条目级变化优先：同时存在时记在条目分支下
        let entry = if !transitions.is_empty() {
            Some((referenced, transitions, sub_transitions))
        } else if !sub_transitions.is_empty() {
            Some((Vec::new(), BTreeMap::new(), sub_transitions))
        } else {
            None
        };
        if let Some((referenced_item_ids, status_transitions, sub_status_transitions)) = entry {
            next.working.progress_log.push(ProgressLogEntry {
                entry_id: uuid::Uuid::new_v4().simple().to_string(),
                user_text: user_text.clone(),
                referenced_item_ids,
                status_transitions,
                sub_status_transitions,
                contextual_notes: signal.context.clone(),
                recorded_at,
            });
        }
    }

    next.working
        .conversation_log
        .push(skill_entry(SkillName::InterpretProgressUpdate, &output.ai_response));

    if output.needs_clarification {
        next.workflow.awaiting_clarification = true;
        next.workflow.phase = WorkflowPhase::AskingClarification;
        next.working.clarification_prompt = output.clarification_prompt.clone();
    } else {
        next.workflow.awaiting_clarification = false;
        next.working.clarification_prompt = None;
        next.workflow.phase = if checklist_is_complete(&next) {
            WorkflowPhase::GeneratingSummary
        } else {
            WorkflowPhase::AcknowledgingProgress
        };
    }
    commit(state, next)
}

/// 技能结果：完成总结，进入 presenting_summary
pub(crate) fn apply_completion_summary(
    state: &ResearchState,
    output: &CompletionSummaryOutput,
) -> ResearchState {
    let mut next = state.clone();
    next.working.completion_summary = Some(output.ai_response.clone());
    next.workflow.phase = WorkflowPhase::PresentingSummary;

    let mut entry = skill_entry(SkillName::GenerateCompletionSummary, &output.ai_response);
    for (key, values) in [
        ("accomplishments", &output.accomplishments),
        ("highlights", &output.highlights),
        ("timeline", &output.timeline),
    ] {
        if !values.is_empty() {
            entry = entry.with_metadata(key, Value::from(values.clone()));
        }
    }
    next.working.conversation_log.push(entry);
    commit(state, next)
}
