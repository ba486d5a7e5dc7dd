//! The per-turn state machine.
//!
//! `Coordinator -> Retrieval -> [WebFallback] -> Synthesis -> Done`, with a
//! conversational short-circuit from `Coordinator` straight to `Synthesis`.
//! Every stage runs under a deadline; stage failures are recovered here and
//! recorded in the reasoning chain, so a turn always ends with an answer.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use quarry_llm::LlmProvider;
use quarry_tools::WebSearch;
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::agents::{RetrievalAgent, SynthesisAgent, WebFallbackAgent};
use crate::checkpoint::Checkpointer;
use crate::error::StageError;
use crate::intent::{Intent, IntentClassifier, extract_subject};
use crate::state::{TurnOutcome, TurnState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Node {
    Coordinator,
    Retrieval,
    WebFallback,
    Synthesis,
    Done,
}

impl Node {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Coordinator => "coordinator",
            Self::Retrieval => "retrieval",
            Self::WebFallback => "web_fallback",
            Self::Synthesis => "synthesis",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input of one turn.
#[derive(Debug, Clone, Default)]
pub struct TurnRequest {
    pub query: String,
    /// Falls back to the orchestrator's default domain when absent or blank.
    pub domain: Option<String>,
    pub chat_id: String,
    /// Recent conversation as `User: …`/`Assistant: …` lines.
    pub previous_context: Option<String>,
}

pub struct Orchestrator<P, W> {
    classifier: IntentClassifier<P>,
    retrieval: RetrievalAgent<P>,
    web: WebFallbackAgent<W>,
    synthesis: SynthesisAgent<P>,
    checkpointer: Arc<dyn Checkpointer>,
    default_domain: String,
    stage_timeout: Duration,
}

impl<P, W: fmt::Debug> fmt::Debug for Orchestrator<P, W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("classifier", &self.classifier)
            .field("retrieval", &self.retrieval)
            .field("web", &self.web)
            .field("synthesis", &self.synthesis)
            .field("default_domain", &self.default_domain)
            .field("stage_timeout", &self.stage_timeout)
            .finish_non_exhaustive()
    }
}

impl<P: LlmProvider, W: WebSearch> Orchestrator<P, W> {
    #[must_use]
    pub fn new(
        classifier: IntentClassifier<P>,
        retrieval: RetrievalAgent<P>,
        web: WebFallbackAgent<W>,
        synthesis: SynthesisAgent<P>,
        checkpointer: Arc<dyn Checkpointer>,
    ) -> Self {
        Self {
            classifier,
            retrieval,
            web,
            synthesis,
            checkpointer,
            default_domain: "default".into(),
            stage_timeout: Duration::from_secs(90),
        }
    }

    #[must_use]
    pub fn with_default_domain(mut self, domain: impl Into<String>) -> Self {
        self.default_domain = domain.into();
        self
    }

    #[must_use]
    pub fn with_stage_timeout(mut self, timeout: Duration) -> Self {
        self.stage_timeout = timeout;
        self
    }

    #[must_use]
    pub fn checkpointer(&self) -> &Arc<dyn Checkpointer> {
        &self.checkpointer
    }

    /// Run one conversational turn to completion.
    ///
    /// Never fails: upstream outages degrade the answer rather than abort the turn.
    pub async fn run_turn(&self, request: TurnRequest) -> TurnOutcome {
        let domain = request
            .domain
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| self.default_domain.clone());
        let span = tracing::info_span!("turn", chat_id = %request.chat_id, domain = %domain);
        let state = TurnState::new(request.query, domain, request.chat_id)
            .with_previous_context(request.previous_context);
        self.drive(state).instrument(span).await.into_outcome()
    }

    async fn drive(&self, mut state: TurnState) -> TurnState {
        let mut node = Node::Coordinator;
        while node != Node::Done {
            tracing::debug!(node = %node, "entering node");
            let next = match node {
                Node::Coordinator => self.coordinate(&mut state).await,
                Node::Retrieval => self.retrieve(&mut state).await,
                Node::WebFallback => self.web_fallback(&mut state).await,
                Node::Synthesis => self.synthesize(&mut state).await,
                Node::Done => Node::Done,
            };
            node = if state.is_answered() { Node::Done } else { next };
            tracing::debug!(next = %node, "leaving node");
            self.checkpointer.save(&state, node);
        }
        state
    }

    async fn with_deadline<T>(
        &self,
        stage: &'static str,
        fut: impl Future<Output = Result<T, StageError>>,
    ) -> Result<T, StageError> {
        tokio::time::timeout(self.stage_timeout, fut)
            .await
            .map_err(|_| StageError::Timeout {
                stage,
                seconds: self.stage_timeout.as_secs(),
            })?
    }

    async fn coordinate(&self, state: &mut TurnState) -> Node {
        let hint = state.previous_context.as_deref().and_then(extract_subject);
        let classify = self.classifier.classify(state.query(), hint.as_deref());
        let result = self
            .with_deadline("coordinator", async { Ok(classify.await) })
            .await;
        let intent = match result {
            Ok(intent) => intent,
            Err(e) => {
                tracing::warn!(error = %e, "intent classification did not finish, defaulting to retrieval");
                state.note(format!("Coordinator: {e}, defaulting to document search"));
                Intent::None
            }
        };
        state.intent = Some(intent);

        if intent.is_conversational() {
            state.note("Coordinator: conversational message, skipping retrieval");
            tracing::info!(intent = %intent, "routing to synthesis");
            return Node::Synthesis;
        }
        state.note(format!("Coordinator: intent {intent}, routing to document search"));
        tracing::info!(intent = %intent, "routing to retrieval");
        Node::Retrieval
    }

    async fn retrieve(&self, state: &mut TurnState) -> Node {
        let result = self
            .with_deadline("retrieval", self.retrieval.retrieve(state))
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "retrieval failed, treating as not found");
            state.document_found = false;
            state.note(format!("Retrieval: failed ({e})"));
        }

        if state.document_found {
            return Node::Synthesis;
        }
        if self.web.admits(state.query()) {
            Node::WebFallback
        } else {
            state.note("Web Fallback: skipped, query is not time-sensitive");
            Node::Synthesis
        }
    }

    async fn web_fallback(&self, state: &mut TurnState) -> Node {
        let result = self
            .with_deadline("web_fallback", self.web.fallback_search(state))
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "web fallback failed");
            state.search_results = Some(String::new());
            state.note(format!("Web Fallback: failed ({e})"));
        }
        Node::Synthesis
    }

    async fn synthesize(&self, state: &mut TurnState) -> Node {
        if state.intent.is_some_and(Intent::is_conversational) {
            SynthesisAgent::<P>::respond_canned(state);
            return Node::Done;
        }
        let result = self
            .with_deadline("synthesis", self.synthesis.synthesize(state))
            .await;
        if let Err(e) = result {
            tracing::warn!(error = %e, "synthesis failed, quoting raw context");
            state.answer = Some(self.synthesis.fallback_answer(state));
            state.note(format!("Synthesis: failed ({e}), quoted raw context"));
        }
        Node::Done
    }
}

#[cfg(test)]
mod tests {
    use quarry_llm::mock::MockProvider;
    use quarry_memory::{DomainIndex, EmbeddingGateway, InMemoryVectorStore};
    use quarry_tools::WebResult;
    use quarry_tools::mock::MockWebSearch;

    use super::*;
    use crate::agents::NOT_FOUND_ANSWER;
    use crate::checkpoint::InMemoryCheckpointer;

    const DIM: u64 = 128;

    struct Harness {
        index: DomainIndex<MockProvider>,
        llm: MockProvider,
        web: MockWebSearch,
        checkpointer: Arc<InMemoryCheckpointer>,
    }

    impl Harness {
        fn new(llm: MockProvider, web: MockWebSearch) -> Self {
            #[allow(clippy::cast_possible_truncation)]
            let embedder = Arc::new(MockProvider::embedder(DIM as usize));
            Self {
                index: DomainIndex::new(
                    Arc::new(InMemoryVectorStore::new()),
                    EmbeddingGateway::new(embedder, Duration::from_secs(5)),
                    DIM,
                ),
                llm,
                web,
                checkpointer: Arc::new(InMemoryCheckpointer::new()),
            }
        }

        fn orchestrator(&self) -> Orchestrator<MockProvider, MockWebSearch> {
            let llm = Arc::new(self.llm.clone());
            Orchestrator::new(
                IntentClassifier::new(Some(Arc::clone(&llm)), Duration::from_secs(5)),
                RetrievalAgent::new(self.index.clone(), 5),
                WebFallbackAgent::new(self.web.clone(), 5, 300),
                SynthesisAgent::new(Some(llm), Duration::from_secs(5), 1000),
                self.checkpointer.clone(),
            )
            .with_default_domain("hr")
        }
    }

    fn request(query: &str) -> TurnRequest {
        TurnRequest {
            query: query.into(),
            domain: None,
            chat_id: "chat-1".into(),
            previous_context: None,
        }
    }

    #[tokio::test]
    async fn greeting_skips_retrieval_and_llm_answer() {
        let harness = Harness::new(MockProvider::default(), MockWebSearch::default());
        let outcome = harness.orchestrator().run_turn(request("hello")).await;

        assert!(outcome.answer.starts_with("Hello") || outcome.answer.starts_with("Hi"));
        assert!(outcome.sources.is_empty());
        assert!(harness.llm.recorded_prompts().is_empty());
        assert!(harness.web.queries().is_empty());
    }

    #[tokio::test]
    async fn found_documents_skip_web() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into(), "15 days per year.".into()]);
        let harness = Harness::new(llm, MockWebSearch::default());
        harness
            .index
            .upsert_chunks("hr", &["Vacation policy: 15 days/year.".into()], None)
            .await
            .unwrap();

        let outcome = harness.orchestrator().run_turn(request("how many vacation days?")).await;
        assert_eq!(outcome.answer, "15 days per year.");
        assert_eq!(outcome.sources.len(), 1);
        assert!(harness.web.queries().is_empty());
    }

    #[tokio::test]
    async fn not_found_goes_to_web_before_synthesis() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into(), "From the web.".into()]);
        let web = MockWebSearch::with_results(vec![WebResult {
            title: "t".into(),
            url: "https://t.example".into(),
            content: "c".into(),
        }]);
        let harness = Harness::new(llm, web);

        let outcome = harness.orchestrator().run_turn(request("latest merger news")).await;
        assert_eq!(outcome.answer, "From the web.");
        assert_eq!(harness.web.queries(), vec!["latest merger news"]);
        let trail = outcome.reasoning_chain.join("\n");
        let retrieval_at = trail.find("Retrieval:").unwrap();
        let web_at = trail.find("Web Fallback:").unwrap();
        let synthesis_at = trail.find("Synthesis:").unwrap();
        assert!(retrieval_at < web_at && web_at < synthesis_at);
    }

    #[tokio::test]
    async fn empty_everything_is_not_found() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into()]);
        let harness = Harness::new(llm, MockWebSearch::failing());
        let outcome = harness.orchestrator().run_turn(request("what is the dress code?")).await;
        assert_eq!(outcome.answer, NOT_FOUND_ANSWER);
        assert!(outcome.sources.is_empty());
        assert!(outcome.reasoning_chain.iter().any(|r| r.starts_with("Web Fallback: failed")));
    }

    #[tokio::test]
    async fn freshness_gate_skips_web_for_static_queries() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into()]);
        let harness = Harness::new(llm, MockWebSearch::default());
        let orchestrator = Orchestrator {
            web: WebFallbackAgent::new(harness.web.clone(), 5, 300).with_freshness_gate(true),
            ..harness.orchestrator()
        };
        let outcome = orchestrator.run_turn(request("what is the dress code?")).await;
        assert_eq!(outcome.answer, NOT_FOUND_ANSWER);
        assert!(harness.web.queries().is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_quotes_context() {
        let llm = MockProvider::failing();
        let harness = Harness::new(llm, MockWebSearch::default());
        harness
            .index
            .upsert_chunks("hr", &["Vacation policy: 15 days/year.".into()], None)
            .await
            .unwrap();
        let outcome = harness.orchestrator().run_turn(request("vacation policy days")).await;
        assert!(outcome.answer.starts_with("Based on the available information:"));
        assert!(outcome.answer.contains("15 days/year."));
        assert_eq!(outcome.sources.len(), 1);
    }

    #[tokio::test]
    async fn stage_timeout_degrades_instead_of_hanging() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into()]).with_delay(2_000);
        let harness = Harness::new(llm, MockWebSearch::failing());
        let orchestrator = harness
            .orchestrator()
            .with_stage_timeout(Duration::from_millis(50));
        let outcome = orchestrator.run_turn(request("what is the dress code?")).await;
        assert_eq!(outcome.answer, NOT_FOUND_ANSWER);
        assert!(outcome.reasoning_chain[0].contains("timed out"));
    }

    #[tokio::test]
    async fn explicit_domain_overrides_default() {
        let llm = MockProvider::with_responses(vec!["DOCUMENT".into(), "Travel answer.".into()]);
        let harness = Harness::new(llm, MockWebSearch::failing());
        harness
            .index
            .upsert_chunks("travel", &["Kandy has the Temple of the Tooth.".into()], None)
            .await
            .unwrap();

        let outcome = harness
            .orchestrator()
            .run_turn(TurnRequest {
                domain: Some("Travel".into()),
                ..request("temple in Kandy")
            })
            .await;
        assert_eq!(outcome.answer, "Travel answer.");
        assert_eq!(outcome.sources.len(), 1);
    }

    #[tokio::test]
    async fn final_checkpoint_is_done() {
        let harness = Harness::new(MockProvider::default(), MockWebSearch::default());
        harness.orchestrator().run_turn(request("thanks")).await;
        let checkpoint = harness.checkpointer.load("chat-1").unwrap();
        assert_eq!(checkpoint.next, Node::Done);
        assert!(checkpoint.state.is_answered());
    }
}
