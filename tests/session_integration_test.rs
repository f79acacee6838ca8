//! 会话集成测试：用脚本化 Mock LLM 跑通完整清单会话

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use checklist_agent::llm::MockLlmClient;
    use checklist_agent::memory::{
        ArtifactStore, ChecklistItemStatus, ChecklistRepository, InMemoryArtifactStore,
    };
    use checklist_agent::{ChecklistAgent, Decision, SkillExecutor, SkillName, WorkflowPhase};
    use serde_json::json;

    fn scripted_session() -> Arc<MockLlmClient> {
        let mock = MockLlmClient::new();
        mock.push_json(json!({
            "ai_response": "Here is a first draft.",
            "items": [
                {"summary": "Book venue", "success_criteria": "Contract signed"},
                {"summary": "Send invites", "sub_items": [{"summary": "Draft email"}, {"summary": "Collect RSVPs"}]}
            ],
            "risks": ["Venue availability"]
        }));
        mock.push_json(json!({
            "ai_response": "A couple of questions.",
            "questions": [
                {"question": "How many people?", "intent": "scope"},
                {"question": "Which date?", "intent": "timeline"}
            ]
        }));
        mock.push_json(json!({
            "ai_response": "Added catering.",
            "updates": [
                {"action": "add", "summary": "Order catering"},
                {"action": "update", "item_id": "item-1", "detail": "For 25 people on June 3"}
            ]
        }));
        mock.push_json(json!({
            "ai_response": "Nice, venue is booked.",
            "signals": [{"item_ids": ["item-1"], "new_status": "complete", "note": "Signed"}]
        }));
        mock.push_json(json!({
            "ai_response": "Everything is done!",
            "signals": [
                {"item_ids": ["item-2", "item-3"], "sub_item_ids": ["item-2-1", "item-2-2"], "new_status": "complete"}
            ]
        }));
        mock.push_json(json!({
            "ai_response": "The offsite is fully planned.",
            "accomplishments": ["Venue", "Invites", "Catering"]
        }));
        Arc::new(mock)
    }

    #[tokio::test]
    async fn test_full_session_with_file_repository() {
        let dir = tempfile::tempdir().unwrap();
        let repository = Arc::new(ChecklistRepository::new(dir.path()));
        let mock = scripted_session();
        let mut agent = ChecklistAgent::new(
            SkillExecutor::with_builtin_templates(mock.clone()),
            repository.clone(),
        );

        assert!(agent.next_decision().is_noop());
        agent.ingest_description("Plan a team offsite for June");
        assert_eq!(
            agent.next_decision().skill(),
            Some(SkillName::GenerateInitialChecklist)
        );

        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::AskingRefinementQuestions);
        assert_eq!(agent.state().working.checklist_items.len(), 2);

        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::AwaitingUserResponse);
        assert_eq!(agent.state().workflow.questions_asked, 2);

        agent.record_refinement_feedback("25 people, June 3rd");
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::CheckApproval);
        let ids: Vec<_> = agent
            .state()
            .working
            .checklist_items
            .iter()
            .map(|i| i.item_id.clone())
            .collect();
        assert_eq!(ids, vec!["item-1", "item-2", "item-3"]);
        assert_eq!(agent.state().working.refinement_exchanges.len(), 2);

        agent.approve_checklist();
        let location = agent.save_checklist().unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::ListeningForProgress);
        let saved = repository.load(&location).unwrap();
        assert_eq!(saved.task_description, "Plan a team offsite for June");
        assert_eq!(saved.items.len(), 3);
        assert_eq!(
            saved.items[0].detail.as_deref(),
            Some("For 25 people on June 3")
        );

        agent.ingest_progress_update("Venue contract is signed");
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::AcknowledgingProgress);
        assert_eq!(
            agent.state().working.checklist_items[0].status,
            ChecklistItemStatus::Complete
        );
        agent.acknowledge_progress();
        assert_eq!(agent.phase(), WorkflowPhase::ListeningForProgress);

        agent.ingest_progress_update("Invites are out, RSVPs in, catering ordered");
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::GeneratingSummary);

        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::PresentingSummary);
        assert_eq!(
            agent.state().working.completion_summary.as_deref(),
            Some("The offsite is fully planned.")
        );

        agent.acknowledge_summary();
        assert_eq!(agent.phase(), WorkflowPhase::SessionComplete);
        assert!(matches!(agent.next_decision(), Decision::Noop { .. }));
        assert_eq!(mock.remaining(), 0);
        assert_eq!(agent.state().working.progress_log.len(), 2);
        assert!(agent.state().validate().is_ok());
    }

    #[tokio::test]
    async fn test_clarification_round_trip() {
        let mock = MockLlmClient::new();
        mock.push_json(json!({"ai_response": "Draft", "items": [{"summary": "A"}, {"summary": "B"}]}));
        mock.push_json(json!({
            "ai_response": "Which one did you finish?",
            "needs_clarification": true,
            "clarification_prompt": "Did you mean A or B?"
        }));
        mock.push_json(json!({
            "ai_response": "Got it, B is done.",
            "signals": [{"item_ids": ["item-2"], "new_status": "complete"}]
        }));
        let mut agent = ChecklistAgent::new(
            SkillExecutor::with_builtin_templates(Arc::new(mock)),
            Arc::new(InMemoryArtifactStore::new()),
        );

        agent.ingest_description("Two things");
        agent.run_planned_action(None).await.unwrap();
        agent.approve_checklist();
        agent.save_checklist().unwrap();

        agent.ingest_progress_update("finished one of them");
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::AskingClarification);
        assert!(agent.next_decision().is_noop());
        assert_eq!(
            agent.state().working.clarification_prompt.as_deref(),
            Some("Did you mean A or B?")
        );

        agent.ingest_progress_update("B");
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::AcknowledgingProgress);
        assert!(!agent.state().workflow.awaiting_clarification);
        assert_eq!(
            agent.state().working.checklist_items[1].status,
            ChecklistItemStatus::Complete
        );
    }

    #[tokio::test]
    async fn test_rejection_loops_back_to_refinement() {
        let mock = Arc::new(MockLlmClient::new());
        mock.push_json(json!({"ai_response": "Draft", "items": [{"summary": "A"}]}));
        mock.push_json(json!({"ai_response": "No questions", "questions": []}));
        mock.push_json(json!({
            "ai_response": "Removed A, added B",
            "updates": [{"action": "remove", "item_id": "item-1"}, {"action": "add", "summary": "B"}]
        }));
        let mut agent = ChecklistAgent::new(
            SkillExecutor::with_builtin_templates(mock.clone()),
            Arc::new(InMemoryArtifactStore::new()),
        );

        agent.ingest_description("Something");
        agent.run_planned_action(None).await.unwrap();
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::CheckApproval);

        agent.request_more_changes("Replace A with B");
        assert_eq!(agent.phase(), WorkflowPhase::ProcessingFeedback);
        agent.run_planned_action(None).await.unwrap();
        assert_eq!(agent.phase(), WorkflowPhase::CheckApproval);
        // 修改理由进入 incorporate_refinements 的 prompt
        let prompt = mock.last_call().unwrap();
        assert!(prompt.iter().any(|m| m.content.contains("Replace A with B")));
        let items = &agent.state().working.checklist_items;
        assert_eq!(items.len(), 1);
        // 生成的 ID 不复用已删除的 item-1
        assert_eq!(items[0].item_id, "item-2");
    }
}
