//! Checklist Agent - 交互式手动会话
//!
//! 入口：加载配置、初始化日志、创建 ChecklistAgent，然后在终端中依次完成
//! 目标描述 → 细化问答与审批 → 保存清单 → 进度追踪 → 完成总结。

use anyhow::Context;
use checklist_agent::config::load_config;
use checklist_agent::memory::ConversationEntryKind;
use checklist_agent::{observability, ChecklistAgent, Decision, WorkflowPhase};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

/// 终端输入：按行读取 stdin，EOF 视为空输入
struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Console {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    async fn read_line(&mut self, prompt: &str) -> anyhow::Result<Option<String>> {
        if !prompt.is_empty() {
            println!("{}", prompt);
        }
        Ok(self.lines.next_line().await.context("Failed to read stdin")?)
    }

    /// 读取多行文本，空行结束
    async fn capture_block(&mut self, prompt: &str) -> anyhow::Result<String> {
        println!("{}", prompt);
        println!("Enter text. Submit an empty line to finish.");
        let mut collected = Vec::new();
        while let Some(line) = self.read_line("").await? {
            if line.trim().is_empty() {
                break;
            }
            collected.push(line);
        }
        Ok(collected.join("\n").trim().to_string())
    }

    async fn choice(&mut self, prompt: &str) -> anyhow::Result<String> {
        Ok(self
            .read_line(prompt)
            .await?
            .unwrap_or_default()
            .trim()
            .to_lowercase())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = load_config(None).context("Failed to load config")?;
    observability::init();

    let mut agent = ChecklistAgent::from_config(&cfg);
    let mut console = Console::new();
    println!("AI Checklist Agent manual session. Press Ctrl+C to exit.\n");

    let description = console
        .capture_block("Describe the objective you want to tackle:")
        .await?;
    if description.is_empty() {
        println!("No description provided. Exiting.");
        return Ok(());
    }

    agent.ingest_description(&description);
    if !run_step(&mut agent, &mut console).await? {
        return Ok(());
    }
    print_latest_agent_turn(&agent, 3);
    print_checklist(&agent);

    if !run_refinement_dialog(&mut agent, &mut console).await? {
        println!("Checklist was not approved. Exiting without persistence.");
        return Ok(());
    }

    let location = agent.save_checklist().context("Failed to save checklist")?;
    println!("Checklist snapshot saved to {}", location);
    println!("Tracking mode: you can log progress updates to keep the agent in sync.\n");
    tracking_loop(&mut agent, &mut console).await?;
    println!("Session complete.");
    Ok(())
}

/// 执行一轮计划动作；失败时询问是否重试。返回 false 表示用户放弃
async fn run_step(agent: &mut ChecklistAgent, console: &mut Console) -> anyhow::Result<bool> {
    loop {
        match agent.run_planned_action(None).await {
            Ok(_) => return Ok(true),
            Err(e) => {
                println!("Agent call failed: {}", e);
                let choice = console.choice("[r]etry or [q]uit?").await?;
                if !choice.starts_with('r') {
                    return Ok(false);
                }
            }
        }
    }
}

/// 审批：a 批准 / r 继续修改 / q 退出。返回 Some(true) 批准，Some(false) 退出，None 继续对话
async fn approval_prompt(
    agent: &mut ChecklistAgent,
    console: &mut Console,
) -> anyhow::Result<Option<bool>> {
    let choice = console
        .choice("Approve checklist? [a]pprove/[r]efine/[q]uit: ")
        .await?;
    if choice.starts_with('a') {
        agent.approve_checklist();
        return Ok(Some(true));
    }
    if choice.starts_with('r') {
        let mut reason = console
            .capture_block("Describe what still needs to change:")
            .await?;
        if reason.is_empty() {
            reason = "Please refine further.".to_string();
        }
        agent.request_more_changes(&reason);
        return Ok(None);
    }
    if choice.starts_with('q') {
        return Ok(Some(false));
    }
    println!("Please choose a, r, or q.");
    Ok(None)
}

async fn run_refinement_dialog(
    agent: &mut ChecklistAgent,
    console: &mut Console,
) -> anyhow::Result<bool> {
    loop {
        match agent.phase() {
            WorkflowPhase::AskingRefinementQuestions => {
                if matches!(agent.next_decision(), Decision::Noop { .. }) {
                    // 提问额度已用完，直接进入审批
                    print_checklist(agent);
                    if let Some(approved) = approval_prompt(agent, console).await? {
                        return Ok(approved);
                    }
                    continue;
                }
                if !run_step(agent, console).await? {
                    return Ok(false);
                }
                if !agent.state().working.refinement_questions.is_empty() {
                    print_refinement_questions(agent);
                    let answer = console
                        .capture_block("Respond to the agent's questions (blank line to skip):")
                        .await?;
                    if answer.is_empty() {
                        println!("No response captured. You can approve or request more changes.");
                    } else {
                        agent.record_refinement_feedback(&answer);
                    }
                }
            }
            WorkflowPhase::AwaitingUserResponse => {
                let answer = console.capture_block("Provide your clarification:").await?;
                if answer.is_empty() {
                    println!("No response captured.");
                    print_checklist(agent);
                    if let Some(approved) = approval_prompt(agent, console).await? {
                        return Ok(approved);
                    }
                } else {
                    agent.record_refinement_feedback(&answer);
                }
            }
            WorkflowPhase::ProcessingFeedback => {
                if !run_step(agent, console).await? {
                    return Ok(false);
                }
                print_latest_agent_turn(agent, 1);
                print_checklist(agent);
            }
            WorkflowPhase::CheckApproval => {
                if let Some(approved) = approval_prompt(agent, console).await? {
                    return Ok(approved);
                }
            }
            WorkflowPhase::SavingChecklist | WorkflowPhase::ConfirmingSave => return Ok(true),
            _ => return Ok(false),
        }
    }
}

async fn tracking_loop(agent: &mut ChecklistAgent, console: &mut Console) -> anyhow::Result<()> {
    while !agent.phase().is_terminal() {
        let choice = console.choice("Log a progress update now? [y/N]: ").await?;
        if choice != "y" {
            break;
        }
        let update = console.capture_block("Describe recent progress:").await?;
        if update.is_empty() {
            println!("No progress captured.");
            continue;
        }
        agent.ingest_progress_update(&update);
        if !run_step(agent, console).await? {
            break;
        }
        print_latest_agent_turn(agent, 1);
        if handle_progress_followups(agent, console).await? {
            break;
        }
    }
    Ok(())
}

/// 处理澄清 / 确认 / 完成总结；返回 true 表示会话结束
async fn handle_progress_followups(
    agent: &mut ChecklistAgent,
    console: &mut Console,
) -> anyhow::Result<bool> {
    while agent.phase() == WorkflowPhase::AskingClarification {
        let prompt = agent
            .state()
            .working
            .clarification_prompt
            .clone()
            .unwrap_or_else(|| "Please clarify your previous update.".to_string());
        let clarification = console.capture_block(&prompt).await?;
        if clarification.is_empty() {
            println!("No clarification supplied; returning to listening mode.");
            agent.acknowledge_progress();
            return Ok(false);
        }
        agent.ingest_progress_update(&clarification);
        if !run_step(agent, console).await? {
            agent.acknowledge_progress();
            return Ok(false);
        }
        print_latest_agent_turn(agent, 1);
    }

    match agent.phase() {
        WorkflowPhase::GeneratingSummary => {
            if run_step(agent, console).await? {
                print_latest_agent_turn(agent, 1);
            }
            agent.acknowledge_summary();
            Ok(true)
        }
        WorkflowPhase::PresentingSummary => {
            print_latest_agent_turn(agent, 1);
            agent.acknowledge_summary();
            Ok(true)
        }
        WorkflowPhase::AcknowledgingProgress => {
            print_checklist(agent);
            agent.acknowledge_progress();
            Ok(false)
        }
        WorkflowPhase::SessionComplete => Ok(true),
        _ => Ok(false),
    }
}

fn print_checklist(agent: &ChecklistAgent) {
    println!("\nCurrent Checklist:");
    println!("{}", agent.state().working.checklist_section());
}

fn print_refinement_questions(agent: &ChecklistAgent) {
    println!("\nAgent Clarification Questions:");
    for (idx, prompt) in agent.state().working.refinement_questions.iter().enumerate() {
        println!(" {}. {} (intent: {})", idx + 1, prompt.question, prompt.intent);
    }
    println!();
}

fn print_latest_agent_turn(agent: &ChecklistAgent, limit: usize) {
    let entries: Vec<_> = agent
        .state()
        .working
        .conversation_log
        .iter()
        .filter(|e| e.kind == ConversationEntryKind::Agent)
        .collect();
    for entry in &entries[entries.len().saturating_sub(limit)..] {
        println!("Agent:\n------");
        println!("{}\n", entry.content.trim());
    }
}
