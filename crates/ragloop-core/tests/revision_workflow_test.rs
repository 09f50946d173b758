// Integration tests for the response revision workflow
//
// Drafts come either from submit_draft or from the LLM port via submit;
// commits land in a session owned by a ConversationStore.

use ragloop_core::{
    memory::{MockLlmDriver, MockLlmResponse, MockWebSearch},
    AgentConfig, AgentError, ConversationStore, MessageRole, RevisionError, RevisionStage,
    RevisionWorkflow, SearchHit, Session, WebSearch,
};

fn assistant_messages(session: &Session) -> Vec<String> {
    session
        .messages()
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .map(|m| m.content.clone())
        .collect()
}

// Accepting a draft directly commits exactly one assistant message.
#[tokio::test]
async fn test_scenario_accept_draft_in_validate() {
    let mut store = ConversationStore::new();
    let llm = MockLlmDriver::with_responses(vec![MockLlmResponse::text(
        "Gradient descent follows the negative gradient. It repeats until convergence.",
    )]);
    let mut workflow = RevisionWorkflow::new();

    let mut streamed = String::new();
    let draft = workflow
        .submit(
            store.active_mut(),
            "What is gradient descent?",
            &llm,
            &AgentConfig::default(),
            None,
            |delta| streamed.push_str(delta),
        )
        .await
        .unwrap();

    assert_eq!(streamed, draft);
    assert_eq!(workflow.stage(), RevisionStage::Validate);
    assert_eq!(store.active().len(), 1);

    let before = store.active().len();
    workflow.accept(store.active_mut()).unwrap();

    let session = store.active();
    assert_eq!(session.len(), before + 1);
    assert_eq!(assistant_messages(session), vec![draft]);
    assert_eq!(workflow.pending_answer(), None);
    assert!(workflow.sentences().is_empty());
    assert_eq!(workflow.stage(), RevisionStage::User);
}

#[test]
fn test_committed_text_is_joined_edited_sentences() {
    let mut session = Session::new();
    let mut workflow = RevisionWorkflow::new();
    workflow
        .submit_draft(
            &mut session,
            "q",
            "CNNs use convolutions. They are slow. RNNs handle sequences. Transformers use attention",
        )
        .unwrap();
    workflow.edit_sentences().unwrap();

    workflow.skip_sentence().unwrap();
    workflow.delete_sentence().unwrap();
    workflow.update_sentence("RNNs process sequences step by step...").unwrap();
    workflow.skip_sentence().unwrap();
    workflow.accept(&mut session).unwrap();

    assert_eq!(
        assistant_messages(&session),
        vec!["CNNs use convolutions. RNNs process sequences step by step. Transformers use attention."]
    );
    assert_eq!(workflow.stage(), RevisionStage::User);
    assert!(workflow.sentence_approved().is_empty());
}

#[test]
fn test_redo_all_then_accept() {
    let mut session = Session::new();
    let mut workflow = RevisionWorkflow::new();
    workflow.submit_draft(&mut session, "q", "A. B.").unwrap();
    workflow.edit_sentences().unwrap();
    workflow.update_sentence("Alpha").unwrap();
    workflow.skip_sentence().unwrap();

    workflow.redo_all().unwrap();
    assert_eq!(workflow.focus(), Some(0));
    // edits survive a redo
    assert_eq!(workflow.sentences(), &["Alpha.", "B."]);

    workflow.skip_sentence().unwrap();
    workflow.update_sentence("Beta.").unwrap();
    workflow.accept(&mut session).unwrap();
    assert_eq!(assistant_messages(&session), vec!["Alpha. Beta."]);
}

#[test]
fn test_no_assistant_message_before_commit() {
    let mut session = Session::new();
    let mut workflow = RevisionWorkflow::new();
    workflow.submit_draft(&mut session, "q", "One. Two.").unwrap();
    workflow.edit_sentences().unwrap();
    workflow.update_sentence("Uno").unwrap();
    workflow.skip_sentence().unwrap();
    assert!(assistant_messages(&session).is_empty());

    workflow.reset();
    assert!(workflow.accepts_input());
    assert!(assistant_messages(&session).is_empty());
}

#[tokio::test]
async fn test_submit_rejected_while_reviewing() {
    let mut session = Session::new();
    let llm = MockLlmDriver::new();
    let mut workflow = RevisionWorkflow::new();
    workflow.submit_draft(&mut session, "q", "draft").unwrap();

    let err = workflow
        .submit(&mut session, "another", &llm, &AgentConfig::default(), None, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AgentError::Revision(RevisionError::WrongStage {
            expected: RevisionStage::User,
            actual: RevisionStage::Validate
        })
    ));
    assert_eq!(llm.call_count().await, 0);
    assert_eq!(session.len(), 1);
}

#[tokio::test]
async fn test_submit_with_search_annotates_and_augments() {
    let mut session = Session::new();
    session.set_system_prompt("Answer concisely.");
    let llm = MockLlmDriver::with_responses(vec![MockLlmResponse::text("It rained.")]);
    let search = MockWebSearch::with_hits(vec![SearchHit {
        title: "Weather".into(),
        content: "Rain in Seoul".into(),
        url: "https://weather.example".into(),
    }]);
    let mut workflow = RevisionWorkflow::new();

    workflow
        .submit(
            &mut session,
            "Weather in Seoul today?",
            &llm,
            &AgentConfig::default(),
            Some(&search as &dyn WebSearch),
            |_| {},
        )
        .await
        .unwrap();

    // The stored user message is the plain question
    assert_eq!(session.messages()[0].content, "Weather in Seoul today?");
    let annotation = session.search_annotations.get(&0).unwrap();
    assert!(annotation.contains("Rain in Seoul"));

    let calls = llm.calls().await;
    assert_eq!(calls[0][0].content, "Answer concisely.");
    let prompt = &calls[0][1].content;
    assert!(prompt.starts_with("Weather in Seoul today?\n\n"));
    assert!(prompt.contains("https://weather.example"));
    assert!(prompt.ends_with("Please answer with reference to the search results above."));
}

#[tokio::test]
async fn test_submit_search_failure_falls_back_to_plain_prompt() {
    let mut session = Session::new();
    let llm = MockLlmDriver::with_responses(vec![MockLlmResponse::text("draft")]);
    let search = MockWebSearch::failing("quota exceeded");
    let mut workflow = RevisionWorkflow::new();

    workflow
        .submit(
            &mut session,
            "q",
            &llm,
            &AgentConfig::default(),
            Some(&search as &dyn WebSearch),
            |_| {},
        )
        .await
        .unwrap();

    assert!(session.search_annotations.is_empty());
    assert_eq!(llm.calls().await[0][0].content, "q");
    assert_eq!(workflow.stage(), RevisionStage::Validate);
}

#[tokio::test]
async fn test_submit_llm_failure_leaves_everything_unchanged() {
    let mut session = Session::new();
    let llm = MockLlmDriver::with_responses(vec![MockLlmResponse::error("unauthorized")]);
    let mut workflow = RevisionWorkflow::new();

    let err = workflow
        .submit(&mut session, "q", &llm, &AgentConfig::default(), None, |_| {})
        .await
        .unwrap_err();

    assert!(matches!(err, AgentError::Llm(_)));
    assert!(session.is_empty());
    assert!(workflow.accepts_input());
}

// A discarded draft takes its question with it; the next draft sees only
// answered turns.
#[tokio::test]
async fn test_discarded_draft_leaves_no_unanswered_question() {
    let mut session = Session::new();
    let llm = MockLlmDriver::with_responses(vec![
        MockLlmResponse::text("Searched draft."),
        MockLlmResponse::text("Second draft."),
    ]);
    let search = MockWebSearch::with_hits(vec![SearchHit {
        title: "News".into(),
        content: "Headline".into(),
        url: "https://news.example".into(),
    }]);
    let mut workflow = RevisionWorkflow::new();

    workflow
        .submit(
            &mut session,
            "What happened today?",
            &llm,
            &AgentConfig::default(),
            Some(&search as &dyn WebSearch),
            |_| {},
        )
        .await
        .unwrap();
    assert_eq!(session.title, "What happened today?");
    workflow.discard(&mut session).unwrap();

    assert!(session.is_empty());
    assert!(session.search_annotations.is_empty());
    assert_eq!(session.title, ragloop_core::PLACEHOLDER_TITLE);

    workflow
        .submit(
            &mut session,
            "Explain backpropagation",
            &llm,
            &AgentConfig::default(),
            None,
            |_| {},
        )
        .await
        .unwrap();
    workflow.accept(&mut session).unwrap();

    let calls = llm.calls().await;
    assert_eq!(calls[1].len(), 1);
    assert_eq!(calls[1][0].content, "Explain backpropagation");

    let roles: Vec<_> = session.messages().iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![MessageRole::User, MessageRole::Assistant]);
    assert_eq!(session.title, "Explain backpropagation");
}
