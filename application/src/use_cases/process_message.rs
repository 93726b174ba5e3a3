//! Process Message use case: the orchestration loop.
//!
//! Given one inbound user message, drives the LLM-call/tool-call cycle to
//! completion or failure:
//!
//! ```text
//! AwaitingUserInput ──▶ CallingLlm ──▶ Responding ──▶ Done
//!                          │  ▲
//!                          ▼  │ (all results appended)
//!                    AwaitingToolResults
//! ```
//!
//! `Failed` is reachable from any state when the provider errors out; the
//! in-flight guard is released on every path so the user can retry.
//!
//! Tool faults never abort the loop. An unknown tool, a disconnected
//! backend, or a deadline miss each become a fault [`ToolOutcome`]
//! appended to the conversation, and the model decides what to do with
//! the partial information.

use crate::config::ExecutionParams;
use crate::ports::conversation_logger::{ConversationEvent, ConversationLogger};
use crate::ports::llm_client::{LlmClient, LlmReply, ProviderError};
use crate::ports::session_store::{SessionError, SessionStorePort};
use crate::ports::tool_invoker::{InvokeError, ToolInvoker};
use crate::ports::tool_registry::{RegistryError, ToolRegistryPort};
use crate::stats::GatewayStats;
use crossbar_domain::{
    ConversationId, InboundMessage, OutboundMessage, ToolFault, ToolInvocation, ToolOutcome, Turn,
    truncate_str,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Synthetic assistant reply appended when the step ceiling is reached.
const CUTOFF_REPLY: &str = "I couldn't finish this request within the allowed number of tool \
     steps. Please try again, or split the request into smaller parts.";

/// Errors that end processing of one inbound message.
#[derive(Error, Debug)]
pub enum ProcessMessageError {
    /// The conversation already has a message in flight.
    #[error("conversation is busy")]
    Busy,

    /// The LLM provider failed; fatal to this step only.
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Unexpected session store failure.
    #[error("session error: {0}")]
    Session(#[from] SessionError),
}

/// Map a processing error to the text shown to the user.
///
/// Only `Busy` carries specifics; everything else is deliberately generic
/// (the underlying cause goes to the log, not the user).
pub fn error_reply(err: &ProcessMessageError) -> String {
    match err {
        ProcessMessageError::Busy => {
            "Still working on your previous message. Give it a moment and try again.".to_string()
        }
        _ => "Something went wrong while preparing a reply. Please try again.".to_string(),
    }
}

/// Orchestrator state for one inbound message.
#[derive(Debug)]
enum StepState {
    /// Ready to send the turn history to the provider.
    CallingLlm,
    /// Tool calls were requested; dispatch and await them all.
    AwaitingToolResults(Vec<ToolInvocation>),
    /// A final answer exists; append and deliver it.
    Responding(String),
    /// The step ceiling was hit; reply synthetically.
    CutOff,
}

/// Use case driving one conversation turn end to end.
pub struct ProcessMessageUseCase {
    store: Arc<dyn SessionStorePort>,
    registry: Arc<dyn ToolRegistryPort>,
    llm: Arc<dyn LlmClient>,
    invoker: Arc<dyn ToolInvoker>,
    logger: Arc<dyn ConversationLogger>,
    stats: Arc<GatewayStats>,
    params: ExecutionParams,
}

impl ProcessMessageUseCase {
    pub fn new(
        store: Arc<dyn SessionStorePort>,
        registry: Arc<dyn ToolRegistryPort>,
        llm: Arc<dyn LlmClient>,
        invoker: Arc<dyn ToolInvoker>,
        logger: Arc<dyn ConversationLogger>,
        stats: Arc<GatewayStats>,
        params: ExecutionParams,
    ) -> Self {
        Self {
            store,
            registry,
            llm,
            invoker,
            logger,
            stats,
            params,
        }
    }

    pub fn stats(&self) -> &Arc<GatewayStats> {
        &self.stats
    }

    pub fn store(&self) -> &Arc<dyn SessionStorePort> {
        &self.store
    }

    /// Process one inbound message to a final reply.
    ///
    /// Fails fast with [`ProcessMessageError::Busy`] when the conversation
    /// is mid-orchestration; the second message is never queued.
    pub async fn execute(
        &self,
        inbound: InboundMessage,
    ) -> Result<OutboundMessage, ProcessMessageError> {
        let id = inbound.conversation_id.clone();
        self.stats.record_message(id.transport);

        if self.store.load_or_create(&id).await {
            debug!(conversation = %id, "created conversation");
        }

        let _guard = match self.store.try_acquire(&id).await {
            Ok(guard) => guard,
            Err(SessionError::Busy) => {
                info!(conversation = %id, "rejected message: conversation busy");
                return Err(ProcessMessageError::Busy);
            }
            Err(SessionError::NotFound) => {
                // Evicted between load_or_create and acquire, recreate.
                self.store.load_or_create(&id).await;
                self.store.try_acquire(&id).await.map_err(|e| match e {
                    SessionError::Busy => ProcessMessageError::Busy,
                    other => ProcessMessageError::Session(other),
                })?
            }
        };

        info!(
            conversation = %id,
            message_id = %inbound.id,
            text = %truncate_str(&inbound.text, 80),
            "processing message"
        );
        self.logger.log(ConversationEvent::new(
            "user_message",
            serde_json::json!({
                "conversation": id.to_string(),
                "message_id": inbound.id.clone(),
                "sender": inbound.sender_name.clone(),
                "text": inbound.text.clone(),
            }),
        ));

        self.append(&id, Turn::user(&inbound.text)).await?;

        match self.run_loop(&id).await {
            Ok(reply) => Ok(OutboundMessage::new(id, reply)),
            Err(e) => {
                self.stats.record_error();
                error!(conversation = %id, error = %e, "message processing failed");
                self.logger.log(ConversationEvent::new(
                    "step_failed",
                    serde_json::json!({
                        "conversation": id.to_string(),
                        "error": e.to_string(),
                    }),
                ));
                Err(e)
            }
        }
        // _guard drops here, released on success and failure alike
    }

    /// The bounded LLM/tool loop. Returns the final reply text.
    async fn run_loop(&self, id: &ConversationId) -> Result<String, ProcessMessageError> {
        let mut state = StepState::CallingLlm;
        let mut steps = 0u32;

        loop {
            state = match state {
                StepState::CallingLlm => {
                    steps += 1;
                    if steps > self.params.max_steps {
                        StepState::CutOff
                    } else {
                        let history = self.store.history(id).await?;
                        let tools = self.registry.descriptors();
                        debug!(
                            conversation = %id,
                            step = steps,
                            turns = history.len(),
                            tools = tools.len(),
                            "calling provider"
                        );
                        match self.llm.complete(&history, &tools).await? {
                            LlmReply::Final { text } => StepState::Responding(text),
                            LlmReply::ToolCalls { calls } => StepState::AwaitingToolResults(calls),
                        }
                    }
                }

                StepState::AwaitingToolResults(calls) => {
                    self.dispatch_tool_calls(id, calls).await?;
                    StepState::CallingLlm
                }

                StepState::Responding(text) => {
                    self.append(id, Turn::assistant(&text)).await?;
                    self.logger.log(ConversationEvent::new(
                        "assistant_message",
                        serde_json::json!({
                            "conversation": id.to_string(),
                            "text": text.clone(),
                        }),
                    ));
                    info!(
                        conversation = %id,
                        steps,
                        reply = %truncate_str(&text, 80),
                        "conversation settled"
                    );
                    return Ok(text);
                }

                StepState::CutOff => {
                    warn!(conversation = %id, max_steps = self.params.max_steps, "step ceiling reached");
                    self.append(id, Turn::assistant(CUTOFF_REPLY)).await?;
                    return Ok(CUTOFF_REPLY.to_string());
                }
            };
        }
    }

    /// Dispatch one step's tool calls concurrently and append every
    /// settled outcome. Unknown tools short-circuit to a fault without
    /// touching any backend; the rest run against their deadline.
    async fn dispatch_tool_calls(
        &self,
        id: &ConversationId,
        calls: Vec<ToolInvocation>,
    ) -> Result<(), ProcessMessageError> {
        for call in &calls {
            self.logger.log(ConversationEvent::new(
                "tool_call",
                serde_json::json!({
                    "conversation": id.to_string(),
                    "call_id": call.call_id.to_string(),
                    "tool": call.tool_name.clone(),
                    "arguments": call.arguments.clone(),
                }),
            ));
            self.append(id, Turn::tool_call(call.clone())).await?;
        }

        let deadline = self.params.tool_timeout;
        let dispatches = calls.into_iter().map(|call| {
            let resolved = self.registry.resolve(&call.tool_name);
            async move {
                match resolved {
                    Err(RegistryError::UnknownTool(name)) => {
                        warn!(tool = %name, "model requested unknown tool");
                        ToolOutcome::fault(
                            call.call_id.clone(),
                            &call.tool_name,
                            ToolFault::unknown_tool(&name),
                        )
                    }
                    Ok((_descriptor, backend)) => {
                        debug!(tool = %call.tool_name, backend = %backend, "dispatching tool call");
                        match self.invoker.invoke(&backend, &call, deadline).await {
                            Ok(outcome) => outcome,
                            Err(InvokeError::Timeout) => {
                                warn!(tool = %call.tool_name, backend = %backend, "tool call timed out");
                                ToolOutcome::fault(
                                    call.call_id.clone(),
                                    &call.tool_name,
                                    ToolFault::timeout(&call.tool_name),
                                )
                            }
                            Err(InvokeError::BackendUnavailable(b)) => {
                                warn!(tool = %call.tool_name, backend = %b, "backend unavailable");
                                ToolOutcome::fault(
                                    call.call_id.clone(),
                                    &call.tool_name,
                                    ToolFault::backend_unavailable(b.as_str()),
                                )
                            }
                        }
                    }
                }
            }
        });

        let outcomes = futures::future::join_all(dispatches).await;

        for outcome in outcomes {
            self.logger.log(ConversationEvent::new(
                "tool_result",
                serde_json::json!({
                    "conversation": id.to_string(),
                    "call_id": outcome.call_id.to_string(),
                    "tool": outcome.tool_name.clone(),
                    "success": outcome.is_success(),
                }),
            ));
            self.append(id, Turn::tool_result(outcome)).await?;
        }

        Ok(())
    }

    /// Append, recreating the conversation if eviction raced us.
    async fn append(&self, id: &ConversationId, turn: Turn) -> Result<(), ProcessMessageError> {
        match self.store.append(id, turn.clone()).await {
            Ok(()) => Ok(()),
            Err(SessionError::NotFound) => {
                debug!(conversation = %id, "conversation evicted mid-flight, recreating");
                self.store.load_or_create(id).await;
                Ok(self.store.append(id, turn).await?)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::conversation_logger::NoConversationLogger;
    use crate::ports::session_store::InFlightGuard;
    use async_trait::async_trait;
    use crossbar_domain::{BackendId, CallId, ToolDescriptor};
    use std::collections::{HashMap, VecDeque};
    use std::sync::Mutex;
    use tokio::sync::{Notify, Semaphore};

    // -- test doubles --------------------------------------------------

    #[derive(Default)]
    struct TestStore {
        entries: Mutex<HashMap<ConversationId, (Vec<Turn>, Arc<Semaphore>)>>,
    }

    impl TestStore {
        fn turns(&self, id: &ConversationId) -> Vec<Turn> {
            self.entries
                .lock()
                .unwrap()
                .get(id)
                .map(|(turns, _)| turns.clone())
                .unwrap_or_default()
        }
    }

    #[async_trait]
    impl SessionStorePort for TestStore {
        async fn load_or_create(&self, id: &ConversationId) -> bool {
            let mut entries = self.entries.lock().unwrap();
            if entries.contains_key(id) {
                false
            } else {
                entries.insert(id.clone(), (Vec::new(), Arc::new(Semaphore::new(1))));
                true
            }
        }

        async fn try_acquire(&self, id: &ConversationId) -> Result<InFlightGuard, SessionError> {
            let semaphore = {
                let entries = self.entries.lock().unwrap();
                entries
                    .get(id)
                    .map(|(_, s)| s.clone())
                    .ok_or(SessionError::NotFound)?
            };
            semaphore
                .try_acquire_owned()
                .map(InFlightGuard::new)
                .map_err(|_| SessionError::Busy)
        }

        async fn append(&self, id: &ConversationId, turn: Turn) -> Result<(), SessionError> {
            let mut entries = self.entries.lock().unwrap();
            let (turns, _) = entries.get_mut(id).ok_or(SessionError::NotFound)?;
            turns.push(turn);
            Ok(())
        }

        async fn history(&self, id: &ConversationId) -> Result<Vec<Turn>, SessionError> {
            let entries = self.entries.lock().unwrap();
            entries
                .get(id)
                .map(|(turns, _)| turns.clone())
                .ok_or(SessionError::NotFound)
        }

        async fn active_count(&self) -> usize {
            self.entries.lock().unwrap().len()
        }
    }

    #[derive(Default)]
    struct TestRegistry {
        tools: Mutex<HashMap<String, BackendId>>,
    }

    impl TestRegistry {
        fn with_tool(self, name: &str, backend: &str) -> Self {
            self.tools
                .lock()
                .unwrap()
                .insert(name.to_string(), BackendId::new(backend));
            self
        }
    }

    impl ToolRegistryPort for TestRegistry {
        fn register(&self, backend: BackendId, tools: Vec<ToolDescriptor>) {
            let mut map = self.tools.lock().unwrap();
            for tool in tools {
                map.insert(tool.name, backend.clone());
            }
        }

        fn unregister(&self, backend: &BackendId) {
            self.tools.lock().unwrap().retain(|_, b| b != backend);
        }

        fn resolve(&self, tool_name: &str) -> Result<(ToolDescriptor, BackendId), RegistryError> {
            self.tools
                .lock()
                .unwrap()
                .get(tool_name)
                .map(|b| (ToolDescriptor::new(tool_name, ""), b.clone()))
                .ok_or_else(|| RegistryError::UnknownTool(tool_name.to_string()))
        }

        fn descriptors(&self) -> Vec<ToolDescriptor> {
            self.tools
                .lock()
                .unwrap()
                .keys()
                .map(|name| ToolDescriptor::new(name, ""))
                .collect()
        }
    }

    /// Plays back a fixed sequence of provider replies; can optionally
    /// block the first call until released (for the Busy scenario).
    struct ScriptedLlm {
        replies: Mutex<VecDeque<Result<LlmReply, ProviderError>>>,
        gate: Option<Arc<Notify>>,
    }

    impl ScriptedLlm {
        fn new(replies: Vec<Result<LlmReply, ProviderError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                gate: None,
            }
        }

        fn gated(replies: Vec<Result<LlmReply, ProviderError>>, gate: Arc<Notify>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                gate: Some(gate),
            }
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        async fn complete(
            &self,
            _turns: &[Turn],
            _tools: &[ToolDescriptor],
        ) -> Result<LlmReply, ProviderError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(LlmReply::final_text("out of script")))
        }
    }

    /// Invoker that records dispatched backends and answers per mode.
    struct StubInvoker {
        mode: InvokerMode,
        invoked: Mutex<Vec<BackendId>>,
    }

    enum InvokerMode {
        Succeed(&'static str),
        Timeout,
        Unavailable,
    }

    impl StubInvoker {
        fn new(mode: InvokerMode) -> Self {
            Self {
                mode,
                invoked: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ToolInvoker for StubInvoker {
        async fn invoke(
            &self,
            backend: &BackendId,
            invocation: &ToolInvocation,
            _deadline: std::time::Duration,
        ) -> Result<ToolOutcome, InvokeError> {
            self.invoked.lock().unwrap().push(backend.clone());
            match self.mode {
                InvokerMode::Succeed(output) => Ok(ToolOutcome::success(
                    invocation.call_id.clone(),
                    &invocation.tool_name,
                    output,
                )),
                InvokerMode::Timeout => Err(InvokeError::Timeout),
                InvokerMode::Unavailable => Err(InvokeError::BackendUnavailable(backend.clone())),
            }
        }
    }

    fn use_case(
        store: Arc<TestStore>,
        registry: Arc<TestRegistry>,
        llm: Arc<ScriptedLlm>,
        invoker: Arc<StubInvoker>,
    ) -> ProcessMessageUseCase {
        ProcessMessageUseCase::new(
            store,
            registry,
            llm,
            invoker,
            Arc::new(NoConversationLogger),
            Arc::new(GatewayStats::new()),
            ExecutionParams::default(),
        )
    }

    fn tool_call_reply(name: &str, args: serde_json::Value) -> LlmReply {
        LlmReply::ToolCalls {
            calls: vec![
                ToolInvocation::new(name, args).with_call_id(CallId::new(format!("call-{name}"))),
            ],
        }
    }

    // -- scenarios -----------------------------------------------------

    #[tokio::test]
    async fn plain_answer_appends_user_and_assistant_turns() {
        let store = Arc::new(TestStore::default());
        let uc = use_case(
            store.clone(),
            Arc::new(TestRegistry::default()),
            Arc::new(ScriptedLlm::new(vec![Ok(LlmReply::final_text("hi there"))])),
            Arc::new(StubInvoker::new(InvokerMode::Succeed(""))),
        );

        let id = ConversationId::cli("alice");
        let out = uc
            .execute(InboundMessage::new(id.clone(), "hello"))
            .await
            .unwrap();

        assert_eq!(out.reply, "hi there");
        let roles: Vec<_> = store.turns(&id).iter().map(|t| t.role()).collect();
        assert_eq!(roles, ["user", "assistant"]);
    }

    #[tokio::test]
    async fn tool_call_round_trip_orders_turns() {
        let store = Arc::new(TestStore::default());
        let registry = Arc::new(TestRegistry::default().with_tool("get_weather", "weather-bot"));
        let invoker = Arc::new(StubInvoker::new(InvokerMode::Succeed("{\"temp\": 18}")));
        let uc = use_case(
            store.clone(),
            registry,
            Arc::new(ScriptedLlm::new(vec![
                Ok(tool_call_reply("get_weather", serde_json::json!({"city": "Paris"}))),
                Ok(LlmReply::final_text("It's 18°C in Paris.")),
            ])),
            invoker.clone(),
        );

        let id = ConversationId::web("w1");
        let out = uc
            .execute(InboundMessage::new(id.clone(), "weather in Paris?"))
            .await
            .unwrap();

        assert_eq!(out.reply, "It's 18°C in Paris.");
        let turns = store.turns(&id);
        let roles: Vec<_> = turns.iter().map(|t| t.role()).collect();
        assert_eq!(roles, ["user", "tool_call", "tool_result", "assistant"]);

        // the result correlates to the call
        assert_eq!(turns[1].call_id(), turns[2].call_id());
        assert_eq!(
            invoker.invoked.lock().unwrap().as_slice(),
            [BackendId::new("weather-bot")]
        );
    }

    #[tokio::test]
    async fn unknown_tool_faults_without_contacting_backends() {
        let store = Arc::new(TestStore::default());
        let invoker = Arc::new(StubInvoker::new(InvokerMode::Succeed("")));
        let uc = use_case(
            store.clone(),
            Arc::new(TestRegistry::default()), // nothing registered
            Arc::new(ScriptedLlm::new(vec![
                Ok(tool_call_reply("get_stock", serde_json::json!({"symbol": "ACME"}))),
                Ok(LlmReply::final_text("Sorry, I can't look up stocks.")),
            ])),
            invoker.clone(),
        );

        let id = ConversationId::web("w2");
        let out = uc
            .execute(InboundMessage::new(id.clone(), "ACME stock price?"))
            .await
            .unwrap();

        assert!(out.reply.contains("Sorry"));
        assert!(invoker.invoked.lock().unwrap().is_empty());

        let turns = store.turns(&id);
        match &turns[2] {
            Turn::ToolResult { outcome } => {
                assert_eq!(
                    outcome.fault.as_ref().unwrap().code,
                    crossbar_domain::FaultCode::UnknownTool
                );
            }
            other => panic!("expected tool result, got {:?}", other.role()),
        }
    }

    #[tokio::test]
    async fn backend_loss_surfaces_as_fault_and_releases_guard() {
        let store = Arc::new(TestStore::default());
        let registry = Arc::new(TestRegistry::default().with_tool("get_weather", "weather-bot"));
        let uc = use_case(
            store.clone(),
            registry,
            Arc::new(ScriptedLlm::new(vec![
                Ok(tool_call_reply("get_weather", serde_json::json!({"city": "Oslo"}))),
                Ok(LlmReply::final_text("The weather service is down right now.")),
            ])),
            Arc::new(StubInvoker::new(InvokerMode::Unavailable)),
        );

        let id = ConversationId::telegram("t1");
        let out = uc
            .execute(InboundMessage::new(id.clone(), "weather?"))
            .await
            .unwrap();
        assert!(out.reply.contains("down"));

        let turns = store.turns(&id);
        match &turns[2] {
            Turn::ToolResult { outcome } => {
                assert_eq!(
                    outcome.fault.as_ref().unwrap().code,
                    crossbar_domain::FaultCode::BackendUnavailable
                );
            }
            other => panic!("expected tool result, got {:?}", other.role()),
        }

        // the guard must be free again
        assert!(store.try_acquire(&id).await.is_ok());
    }

    #[tokio::test]
    async fn timeout_becomes_fault_result() {
        let store = Arc::new(TestStore::default());
        let registry = Arc::new(TestRegistry::default().with_tool("slow_tool", "slow-bot"));
        let uc = use_case(
            store.clone(),
            registry,
            Arc::new(ScriptedLlm::new(vec![
                Ok(tool_call_reply("slow_tool", serde_json::json!({}))),
                Ok(LlmReply::final_text("That took too long.")),
            ])),
            Arc::new(StubInvoker::new(InvokerMode::Timeout)),
        );

        let id = ConversationId::web("w3");
        uc.execute(InboundMessage::new(id.clone(), "go slow"))
            .await
            .unwrap();

        let turns = store.turns(&id);
        match &turns[2] {
            Turn::ToolResult { outcome } => {
                assert_eq!(
                    outcome.fault.as_ref().unwrap().code,
                    crossbar_domain::FaultCode::Timeout
                );
            }
            other => panic!("expected tool result, got {:?}", other.role()),
        }
    }

    #[tokio::test]
    async fn second_message_gets_busy_while_first_is_in_flight() {
        let store = Arc::new(TestStore::default());
        let gate = Arc::new(Notify::new());
        let llm = Arc::new(ScriptedLlm::gated(
            vec![Ok(LlmReply::final_text("done"))],
            gate.clone(),
        ));
        let uc = Arc::new(use_case(
            store.clone(),
            Arc::new(TestRegistry::default()),
            llm,
            Arc::new(StubInvoker::new(InvokerMode::Succeed(""))),
        ));

        let id = ConversationId::cli("bob");
        let first = tokio::spawn({
            let uc = uc.clone();
            let id = id.clone();
            async move { uc.execute(InboundMessage::new(id, "first")).await }
        });

        // wait until the first message holds the guard (it blocks in the LLM)
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let second = uc.execute(InboundMessage::new(id.clone(), "second")).await;
        assert!(matches!(second, Err(ProcessMessageError::Busy)));

        gate.notify_one();
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.reply, "done");
    }

    #[tokio::test]
    async fn step_ceiling_terminates_with_synthetic_reply() {
        let store = Arc::new(TestStore::default());
        let registry = Arc::new(TestRegistry::default().with_tool("loop_tool", "loop-bot"));
        // provider asks for a tool forever; the default is out of script → final,
        // so script more tool calls than max_steps allows
        let replies = (0..20)
            .map(|_| Ok(tool_call_reply("loop_tool", serde_json::json!({}))))
            .collect();
        let uc = use_case(
            store.clone(),
            registry,
            Arc::new(ScriptedLlm::new(replies)),
            Arc::new(StubInvoker::new(InvokerMode::Succeed("again"))),
        );

        let id = ConversationId::web("w4");
        let out = uc
            .execute(InboundMessage::new(id.clone(), "loop forever"))
            .await
            .unwrap();

        assert_eq!(out.reply, CUTOFF_REPLY);
        // last turn is the synthetic assistant message
        let turns = store.turns(&id);
        assert_eq!(turns.last().unwrap().role(), "assistant");
        // every tool call still has a correlated result
        let calls = turns
            .iter()
            .filter(|t| t.role() == "tool_call")
            .count();
        let results = turns
            .iter()
            .filter(|t| t.role() == "tool_result")
            .count();
        assert_eq!(calls, results);
        assert_eq!(calls, ExecutionParams::default().max_steps as usize);
    }

    #[tokio::test]
    async fn provider_failure_aborts_but_frees_the_conversation() {
        let store = Arc::new(TestStore::default());
        let uc = use_case(
            store.clone(),
            Arc::new(TestRegistry::default()),
            Arc::new(ScriptedLlm::new(vec![Err(ProviderError::Transport(
                "connection refused".into(),
            ))])),
            Arc::new(StubInvoker::new(InvokerMode::Succeed(""))),
        );

        let id = ConversationId::web("w5");
        let err = uc
            .execute(InboundMessage::new(id.clone(), "hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessMessageError::Provider(_)));
        assert!(!error_reply(&err).contains("connection refused"));

        // retry works: the guard was released on abort
        assert!(store.try_acquire(&id).await.is_ok());
    }

    #[tokio::test]
    async fn concurrent_first_messages_share_one_conversation() {
        let store = Arc::new(TestStore::default());
        let id = ConversationId::web("race");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let id = id.clone();
            handles.push(tokio::spawn(async move { store.load_or_create(&id).await }));
        }
        let created: usize = futures::future::join_all(handles)
            .await
            .into_iter()
            .map(|r| r.unwrap() as usize)
            .sum();

        assert_eq!(created, 1);
        assert_eq!(store.active_count().await, 1);
    }
}
