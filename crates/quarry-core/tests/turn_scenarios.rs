use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;
use quarry_core::{
    ChatRequest, ChatService, Checkpointer, InMemoryCheckpointer, IntentClassifier, NOT_FOUND_ANSWER, Node,
    Orchestrator, RetrievalAgent, SynthesisAgent, TurnRequest, WebFallbackAgent,
};
use quarry_llm::Role;
use quarry_llm::mock::MockProvider;
use quarry_memory::{DomainIndex, EmbeddingGateway, InMemoryTranscriptStore, InMemoryVectorStore};
use quarry_tools::WebResult;
use quarry_tools::mock::MockWebSearch;

const DIM: u64 = 256;

fn index() -> DomainIndex<MockProvider> {
    DomainIndex::new(
        Arc::new(InMemoryVectorStore::new()),
        EmbeddingGateway::new(
            Arc::new(MockProvider::embedder(DIM as usize)),
            Duration::from_secs(5),
        ),
        DIM,
    )
}

fn orchestrator(
    llm: &MockProvider,
    index: &DomainIndex<MockProvider>,
    web: &MockWebSearch,
    checkpointer: Arc<InMemoryCheckpointer>,
) -> Orchestrator<MockProvider, MockWebSearch> {
    let llm = Arc::new(llm.clone());
    Orchestrator::new(
        IntentClassifier::new(Some(Arc::clone(&llm)), Duration::from_secs(5)),
        RetrievalAgent::new(index.clone(), 5),
        WebFallbackAgent::new(web.clone(), 5, 300),
        SynthesisAgent::new(Some(llm), Duration::from_secs(5), 1000),
        checkpointer,
    )
    .with_default_domain("default")
}

#[tokio::test]
async fn hr_vacation_question_is_answered_from_documents() {
    let llm = MockProvider::with_responses(vec![
        "DOCUMENT".into(),
        "Employees get 15 days of vacation per year.".into(),
    ]);
    let idx = index();
    idx.upsert_chunks("hr", &["Vacation policy: 15 days/year.".into()], None)
        .await
        .unwrap();
    let web = MockWebSearch::default();
    let orch = orchestrator(&llm, &idx, &web, Arc::new(InMemoryCheckpointer::new()));

    let outcome = orch
        .run_turn(TurnRequest {
            query: "how many vacation days?".into(),
            domain: Some("hr".into()),
            chat_id: "hr-1".into(),
            previous_context: None,
        })
        .await;

    assert!(outcome.answer.contains("15 days"));
    assert_eq!(outcome.sources.len(), 1);
    assert!(web.queries().is_empty());

    let synthesis_prompt = &llm.recorded_prompts()[1];
    let user = &synthesis_prompt[1].content;
    assert!(user.contains("Document Context:\nVacation policy: 15 days/year."));
    assert!(!user.contains("Web Search Results:"));
}

#[tokio::test]
async fn unknown_topic_uses_web_results() {
    let llm = MockProvider::with_responses(vec![
        "DOCUMENT".into(),
        "Shares closed higher today.".into(),
    ]);
    let web = MockWebSearch::with_results(vec![WebResult {
        title: "Markets".into(),
        url: "https://news.example/markets".into(),
        content: "Shares closed higher today after the announcement.".into(),
    }]);
    let orch = orchestrator(&llm, &index(), &web, Arc::new(InMemoryCheckpointer::new()));

    let outcome = orch
        .run_turn(TurnRequest {
            query: "latest stock market news".into(),
            chat_id: "w-1".into(),
            ..TurnRequest::default()
        })
        .await;

    assert_eq!(outcome.answer, "Shares closed higher today.");
    assert!(outcome.sources.is_empty());
    assert_eq!(web.queries(), vec!["latest stock market news"]);
    let user = &llm.recorded_prompts()[1][1].content;
    assert!(user.contains("Web Search Results:"));
    assert!(user.contains("https://news.example/markets"));
}

#[tokio::test]
async fn nothing_anywhere_is_not_found() {
    let llm = MockProvider::with_responses(vec!["DOCUMENT".into()]);
    let web = MockWebSearch::with_results(Vec::new());
    let orch = orchestrator(&llm, &index(), &web, Arc::new(InMemoryCheckpointer::new()));

    let outcome = orch
        .run_turn(TurnRequest {
            query: "what is the parking policy?".into(),
            domain: Some("hr".into()),
            chat_id: "n-1".into(),
            previous_context: None,
        })
        .await;

    assert_eq!(outcome.answer, NOT_FOUND_ANSWER);
    assert!(outcome.sources.is_empty());
    assert_eq!(llm.recorded_prompts().len(), 1);
}

#[tokio::test]
async fn follow_up_question_resolves_to_previous_subject() {
    let llm = MockProvider::with_responses(vec![
        "DOCUMENT".into(),
        "The temple of the tooth is in Kandy.".into(),
        "DOCUMENT".into(),
        "You can visit the Temple of the Tooth and Kandy Lake.".into(),
    ]);
    let idx = index();
    idx.upsert_chunks(
        "travel",
        &[
            "Kandy is home to the Temple of the Tooth.".into(),
            "Kandy Lake is a short walk from the temple.".into(),
        ],
        None,
    )
    .await
    .unwrap();
    let web = MockWebSearch::default();
    let checkpointer = Arc::new(InMemoryCheckpointer::new());
    let chat = ChatService::new(
        Arc::new(orchestrator(&llm, &idx, &web, Arc::clone(&checkpointer))),
        Arc::new(InMemoryTranscriptStore::new()),
        10,
    );

    let first = chat
        .handle(ChatRequest {
            query: "Tell me about Kandy".into(),
            domain: Some("travel".into()),
            chat_id: None,
        })
        .await
        .unwrap();
    assert!(!first.chat_id.is_empty());

    let second = chat
        .handle(ChatRequest {
            query: "what can I visit there?".into(),
            domain: Some("travel".into()),
            chat_id: Some(first.chat_id.clone()),
        })
        .await
        .unwrap();
    assert_eq!(second.chat_id, first.chat_id);
    assert_eq!(
        second.answer,
        "You can visit the Temple of the Tooth and Kandy Lake."
    );

    let classification = &llm.recorded_prompts()[2][0].content;
    assert!(classification.contains("what can I visit there? Kandy"));

    let history = chat.history(&first.chat_id).await.unwrap();
    let roles: Vec<Role> = history.iter().map(|e| e.role).collect();
    assert_eq!(
        roles,
        vec![Role::User, Role::Assistant, Role::User, Role::Assistant]
    );
    assert_eq!(history[3].text, second.answer);

    let sessions = chat.sessions().await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].message_count, 4);

    assert_eq!(checkpointer.load(&first.chat_id).unwrap().next, Node::Done);
    assert_eq!(chat.delete_session(&first.chat_id).await.unwrap(), 4);
    assert!(checkpointer.load(&first.chat_id).is_none());
    assert!(chat.history(&first.chat_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn separate_chats_do_not_share_history() {
    let llm = MockProvider::default();
    let web = MockWebSearch::failing();
    let chat = ChatService::new(
        Arc::new(orchestrator(
            &llm,
            &index(),
            &web,
            Arc::new(InMemoryCheckpointer::new()),
        )),
        Arc::new(InMemoryTranscriptStore::new()),
        10,
    );

    for chat_id in ["a", "b"] {
        chat.handle(ChatRequest {
            query: "hello".into(),
            domain: None,
            chat_id: Some(chat_id.into()),
        })
        .await
        .unwrap();
    }

    assert_eq!(chat.history("a").await.unwrap().len(), 2);
    assert_eq!(chat.history("b").await.unwrap().len(), 2);
    assert_eq!(chat.sessions().await.unwrap().len(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn turn_always_ends_with_an_answer(query in "\\PC{0,60}") {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let outcome = runtime.block_on(async {
            let orch = orchestrator(
                &MockProvider::failing(),
                &index(),
                &MockWebSearch::failing(),
                Arc::new(InMemoryCheckpointer::new()),
            );
            orch.run_turn(TurnRequest {
                query,
                chat_id: "p".into(),
                ..TurnRequest::default()
            })
            .await
        });
        prop_assert!(!outcome.answer.trim().is_empty());
        prop_assert!(outcome.sources.is_empty());
    }
}
