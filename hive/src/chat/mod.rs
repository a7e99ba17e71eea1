//! Agent Chat Engine: the per-agent conversation loop.
//!
//! One [`AgentChat`] owns one conversation. `ask` appends the user prompt and
//! runs the LLM/tool loop to completion: each round trips through the
//! provider (behind the optional around-wrapper and the retry policy),
//! appends the assistant message, then fans out any requested tool calls
//! under the configured [`ConcurrencyStrategy`]. Tool results are appended in
//! request order; the first halt sentinel in request order terminates the
//! turn with its payload as the reply.
//!
//! Concurrency: a turn-level mutex serializes `ask` calls; message appends go
//! through the per-chat state monitor, so `replace_messages` and readers stay
//! consistent mid-turn. Cancellation is two-level: the chat's own
//! `turn_timeout` and the execution-wide token installed by the swarm.

mod callbacks;
mod context_state;
pub mod executor;

pub use callbacks::{
    AroundLlmRequest, AroundToolExecution, CallbackHandle, ChatCallbacks, ChatEvent,
    LlmContinuation, ToolContinuation,
};
pub use context_state::{ContextBudget, ContextState};
pub use executor::{execute_batch, ConcurrencyStrategy, ToolRunner};

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log_event::LogEvent;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::agent::AgentDefinition;
use crate::error::ChatError;
use crate::hooks::{HookAction, HookDispatcher, HookEvent};
use crate::llm::{
    complete_with_retry, ApiShape, CompletionRequest, CompletionResponse, LlmError, Provider,
    ResponseContinuity, RetryPolicy,
};
use crate::logstream::LogStream;
use crate::message::{Message, ToolCall};
use crate::tools::{Tool, ToolContext, ToolError, ToolOutcome};

/// Everything a chat needs at construction. Built by the swarm.
pub struct ChatParams {
    pub definition: Arc<AgentDefinition>,
    pub provider: Arc<dyn Provider>,
    pub retry: RetryPolicy,
    /// Tool set snapshot: built-ins + plugin-provided + delegation tools.
    pub tools: Vec<Arc<dyn Tool>>,
    pub tool_context: ToolContext,
    pub hooks: HookDispatcher,
    pub stream: Arc<LogStream>,
    /// Scope chain for emitted events, e.g. `"exec-1/worker@lead"`.
    pub scope: String,
    /// Effective system prompt (definition prompt plus plugin contributions).
    pub system_prompt: Option<String>,
    /// Delegation nesting depth of this chat (0 for primaries).
    pub depth: usize,
    /// Execution-wide cancellation installed by the swarm.
    pub cancel: CancellationToken,
    pub execution_timeout: Option<Duration>,
}

struct ChatState {
    messages: Vec<Message>,
    context: ContextState,
    continuity: ResponseContinuity,
}

#[derive(Default)]
struct Wrappers {
    llm: Option<Arc<dyn AroundLlmRequest>>,
    tool: Option<Arc<dyn AroundToolExecution>>,
}

/// A single agent conversation, owned by exactly one swarm.
pub struct AgentChat {
    definition: Arc<AgentDefinition>,
    provider: Arc<dyn Provider>,
    retry: RetryPolicy,
    tools: Vec<Arc<dyn Tool>>,
    tool_context: ToolContext,
    hooks: HookDispatcher,
    stream: Arc<LogStream>,
    scope: String,
    system_prompt: Option<String>,
    depth: usize,
    cancel: CancellationToken,
    execution_timeout: Option<Duration>,
    /// Serializes whole turns.
    turn: tokio::sync::Mutex<()>,
    /// Per-chat monitor for message and context-state access.
    state: StdMutex<ChatState>,
    callbacks: Arc<ChatCallbacks>,
    wrappers: StdMutex<Wrappers>,
}

impl AgentChat {
    pub fn new(params: ChatParams) -> Arc<Self> {
        let mut messages = Vec::new();
        if let Some(prompt) = &params.system_prompt {
            messages.push(Message::system(prompt.clone()));
        }
        let mut tool_context = params.tool_context;
        tool_context.delegation_depth = params.depth;
        Arc::new(Self {
            definition: params.definition,
            provider: params.provider,
            retry: params.retry,
            tools: params.tools,
            tool_context,
            hooks: params.hooks,
            stream: params.stream,
            scope: params.scope,
            system_prompt: params.system_prompt,
            depth: params.depth,
            cancel: params.cancel,
            execution_timeout: params.execution_timeout,
            turn: tokio::sync::Mutex::new(()),
            state: StdMutex::new(ChatState {
                messages,
                context: ContextState::default(),
                continuity: ResponseContinuity::new(),
            }),
            callbacks: Arc::new(ChatCallbacks::new()),
            wrappers: StdMutex::new(Wrappers::default()),
        })
    }

    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &Arc<AgentDefinition> {
        &self.definition
    }

    pub fn system_prompt(&self) -> Option<&str> {
        self.system_prompt.as_deref()
    }

    pub fn delegation_depth(&self) -> usize {
        self.depth
    }

    /// A point-in-time copy of the conversation.
    pub fn messages(&self) -> Vec<Message> {
        self.state().messages.clone()
    }

    /// Messages excluding system entries; handy in tests and transcripts.
    pub fn non_system_messages(&self) -> Vec<Message> {
        self.state()
            .messages
            .iter()
            .filter(|m| !m.is_system())
            .cloned()
            .collect()
    }

    /// Atomic replacement of the whole conversation (used by restore).
    pub fn replace_messages(&self, messages: Vec<Message>) {
        self.state().messages = messages;
    }

    /// Wipes the conversation, optionally keeping system messages.
    pub fn reset(&self, preserve_system: bool) {
        let mut state = self.state();
        if preserve_system {
            state.messages.retain(Message::is_system);
        } else {
            state.messages.clear();
        }
    }

    pub fn context_state(&self) -> ContextState {
        self.state().context.clone()
    }

    pub fn restore_context_state(&self, context: ContextState) {
        self.state().context = context;
    }

    /// Notes that an external compactor rewrote history; resets threshold
    /// warnings.
    pub fn note_compression(&self) {
        self.state().context.note_compression();
    }

    /// Registers a chat-event callback. The filter is a field-equality map
    /// over the event payload; the tag is a caller-side label.
    pub fn subscribe(
        &self,
        event: ChatEvent,
        filter: Option<std::collections::BTreeMap<String, Value>>,
        tag: Option<String>,
        callback: impl Fn(&Value) + Send + Sync + 'static,
    ) -> CallbackHandle {
        self.callbacks.subscribe(event, filter, tag, callback)
    }

    /// Installs the single wrapper around LLM requests, replacing any
    /// previous one.
    pub fn around_llm_request(&self, wrapper: Arc<dyn AroundLlmRequest>) {
        self.wrappers().llm = Some(wrapper);
    }

    /// Installs the single wrapper around tool executions, replacing any
    /// previous one.
    pub fn around_tool_execution(&self, wrapper: Arc<dyn AroundToolExecution>) {
        self.wrappers().tool = Some(wrapper);
    }

    /// Appends the prompt and runs the LLM/tool loop to completion, returning
    /// the final assistant message.
    pub async fn ask(&self, prompt: &str) -> Result<Message, ChatError> {
        let _turn = self.turn.lock().await;
        let budget = self.definition.timeout;
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ChatError::ExecutionTimeout(
                self.execution_timeout.map(|d| d.as_secs()).unwrap_or_default(),
            )),
            outcome = tokio::time::timeout(budget, self.run_turn(prompt)) => match outcome {
                Ok(result) => result,
                Err(_) => Err(ChatError::TurnTimeout(budget.as_secs())),
            },
        }
    }

    async fn run_turn(&self, prompt: &str) -> Result<Message, ChatError> {
        let prompt = match self
            .hooks
            .dispatch(HookEvent::UserPrompt, None, &json!({ "prompt": prompt }))
            .await
        {
            HookAction::Continue => prompt.to_string(),
            HookAction::Replace(replaced) => replaced,
            HookAction::Halt(message) => {
                // The prompt never reaches the LLM; the halt message is the
                // reply.
                let reply = Message::assistant(message);
                self.append(reply.clone());
                self.finish_turn(&reply).await;
                return Ok(reply);
            }
        };

        self.emit(&LogEvent::UserPrompt {
            agent: self.name().to_string(),
            prompt: prompt.clone(),
        });
        self.append(Message::user(prompt));

        loop {
            let payload = self.emit(&LogEvent::NewMessage {
                agent: self.name().to_string(),
                role: "assistant".to_string(),
            });
            self.callbacks.fire(ChatEvent::NewMessage, &payload);

            let response = self.complete().await?;
            let assistant = response.into_message();
            self.record_continuity(&assistant);
            self.append(assistant.clone());

            let payload = self.emit(&LogEvent::EndMessage {
                agent: self.name().to_string(),
                role: "assistant".to_string(),
                content: assistant.content.as_text(),
            });
            self.callbacks.fire(ChatEvent::EndMessage, &payload);

            self.account_context().await;

            let calls = assistant.tool_calls.clone().unwrap_or_default();
            if calls.is_empty() {
                self.finish_turn(&assistant).await;
                return Ok(assistant);
            }

            for call in &calls {
                let payload = self.emit(&LogEvent::NewMessage {
                    agent: self.name().to_string(),
                    role: "tool".to_string(),
                });
                self.callbacks.fire(ChatEvent::NewMessage, &payload);
                let payload = self.emit(&LogEvent::ToolCall {
                    agent: self.name().to_string(),
                    tool: call.name.clone(),
                    call_id: call.id.clone(),
                    arguments: call.arguments.clone(),
                });
                self.callbacks.fire(ChatEvent::ToolCall, &payload);
            }

            let outcomes =
                execute_batch(self.definition.concurrency, &calls, self.tool_runner()).await;

            let mut halt: Option<String> = None;
            for (call, outcome) in calls.iter().zip(outcomes) {
                let text = outcome.as_text();
                self.append(Message::tool_result(call.id.clone(), text.clone()));
                let payload = self.emit(&LogEvent::EndMessage {
                    agent: self.name().to_string(),
                    role: "tool".to_string(),
                    content: text,
                });
                self.callbacks.fire(ChatEvent::EndMessage, &payload);
                if halt.is_none() {
                    if let ToolOutcome::Halt(message) = outcome {
                        halt = Some(message);
                    }
                }
            }

            if let Some(message) = halt {
                let reply = Message::assistant(message);
                self.append(reply.clone());
                self.finish_turn(&reply).await;
                return Ok(reply);
            }
        }
    }

    /// One provider round-trip through the optional wrapper and the retry
    /// policy, with response-continuity fallback for stateful providers.
    async fn complete(&self) -> Result<CompletionResponse, ChatError> {
        let mut request = self.build_request();
        if self.provider.api_shape() == ApiShape::Responses {
            request.previous_response_id = self.state().continuity.previous_response_id();
        }
        loop {
            let wrapper = self.wrappers().llm.clone();
            let provider = Arc::clone(&self.provider);
            let retry = self.retry;
            let attempt = request.clone();
            let continuation: LlmContinuation = Box::pin(async move {
                complete_with_retry(provider.as_ref(), attempt, &retry).await
            });
            let result = match wrapper {
                Some(wrapper) => wrapper.around(&request.messages, continuation).await,
                None => continuation.await,
            };
            match result {
                Ok(response) => return Ok(response),
                Err(LlmError::ResponseNotFound(_)) if request.previous_response_id.is_some() => {
                    let disabled = self.state().continuity.note_not_found();
                    if disabled {
                        tracing::warn!(
                            agent = self.name(),
                            "response continuity disabled after repeated not-found"
                        );
                    }
                    request.previous_response_id = None;
                }
                Err(err) => return Err(ChatError::Llm(err)),
            }
        }
    }

    fn build_request(&self) -> CompletionRequest {
        CompletionRequest {
            messages: self.messages(),
            tools: self.tools.iter().map(|t| t.spec()).collect(),
            model: self.definition.model.clone(),
            temperature: self.definition.temperature,
            reasoning_effort: self.definition.reasoning_effort.clone(),
            headers: self.definition.headers.clone(),
            params: self.definition.provider_params.clone(),
            previous_response_id: None,
        }
    }

    fn record_continuity(&self, assistant: &Message) {
        if let Some(id) = &assistant.response_id {
            self.state().continuity.record(id.clone());
        }
    }

    /// Builds the per-call runner handed to [`execute_batch`]. The closure
    /// owns clones of everything it needs so executions can outlive `&self`
    /// borrows inside spawned tasks.
    fn tool_runner(&self) -> ToolRunner {
        let tools: HashMap<String, Arc<dyn Tool>> = self
            .tools
            .iter()
            .map(|t| (t.name().to_string(), Arc::clone(t)))
            .collect();
        let ctx = self.tool_context.clone();
        let hooks = self.hooks.clone();
        let wrapper = self.wrappers().tool.clone();
        let callbacks = Arc::clone(&self.callbacks);
        let stream = Arc::clone(&self.stream);
        let scope = self.scope.clone();
        let agent = self.name().to_string();

        Arc::new(move |call: ToolCall| {
            let tools = tools.clone();
            let ctx = ctx.clone();
            let hooks = hooks.clone();
            let wrapper = wrapper.clone();
            let callbacks = Arc::clone(&callbacks);
            let stream = Arc::clone(&stream);
            let scope = scope.clone();
            let agent = agent.clone();
            Box::pin(async move {
                let outcome =
                    run_one_tool(&tools, &ctx, &hooks, wrapper.as_deref(), call.clone()).await;
                let payload = stream.emit_scoped(
                    &LogEvent::ToolResult {
                        agent,
                        tool: call.name.clone(),
                        call_id: call.id.clone(),
                        result: outcome.as_text(),
                    },
                    &scope,
                );
                callbacks.fire(ChatEvent::ToolResult, &payload);
                outcome
            })
        })
    }

    async fn account_context(&self) {
        let budget = ContextBudget {
            window: self.definition.context_window,
            thresholds: self.definition.warning_thresholds.clone(),
        };
        let (fired, remaining) = {
            let mut state = self.state();
            let used = ContextBudget::used_tokens(&state.messages);
            let fired = budget.crossed(used, &mut state.context);
            (fired, budget.remaining(used))
        };
        for threshold in fired {
            self.emit(&LogEvent::ContextWarning {
                agent: self.name().to_string(),
                threshold,
                remaining_tokens: remaining,
            });
            self.hooks
                .dispatch(
                    HookEvent::ContextWarning,
                    None,
                    &json!({ "threshold": threshold, "remaining_tokens": remaining }),
                )
                .await;
        }
    }

    async fn finish_turn(&self, reply: &Message) {
        let content = reply.content.as_text();
        self.emit(&LogEvent::AgentStop {
            agent: self.name().to_string(),
            content: content.clone(),
        });
        self.hooks
            .dispatch(HookEvent::AgentStop, None, &json!({ "content": content }))
            .await;
    }

    fn append(&self, message: Message) {
        self.state().messages.push(message);
    }

    fn emit(&self, event: &LogEvent) -> Value {
        self.stream.emit_scoped(event, &self.scope)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wrappers(&self) -> std::sync::MutexGuard<'_, Wrappers> {
        self.wrappers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Executes one tool call: pre hook, body (through the optional wrapper),
/// post hook. Errors are stringified here so the executor only ever sees
/// outcomes.
async fn run_one_tool(
    tools: &HashMap<String, Arc<dyn Tool>>,
    ctx: &ToolContext,
    hooks: &HookDispatcher,
    wrapper: Option<&dyn AroundToolExecution>,
    call: ToolCall,
) -> ToolOutcome {
    let mut arguments = call.arguments.clone();
    match hooks
        .dispatch(
            HookEvent::PreToolUse,
            Some(&call.name),
            &json!({ "parameters": call.arguments }),
        )
        .await
    {
        HookAction::Halt(message) => {
            return ToolOutcome::Text(ToolError::Blocked(message).into_result_text());
        }
        HookAction::Replace(content) => {
            // A pre hook may rewrite the arguments; non-JSON replacements are
            // ignored.
            if let Ok(rewritten) = serde_json::from_str(&content) {
                arguments = rewritten;
            }
        }
        HookAction::Continue => {}
    }

    let result = match tools.get(&call.name) {
        None => Err(ToolError::InvalidInput(format!(
            "unknown tool: {}",
            call.name
        ))),
        Some(tool) => {
            let effective = ToolCall {
                arguments: arguments.clone(),
                ..call.clone()
            };
            let exec_tool = Arc::clone(tool);
            let exec_ctx = ctx.clone();
            let continuation: ToolContinuation = Box::new(move |args| {
                Box::pin(async move { exec_tool.call(args, &exec_ctx).await })
            });
            match wrapper {
                Some(wrapper) => wrapper.around(&effective, continuation).await,
                None => continuation(arguments).await,
            }
        }
    };

    let mut outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => ToolOutcome::Text(err.into_result_text()),
    };

    match hooks
        .dispatch(
            HookEvent::PostToolUse,
            Some(&call.name),
            &json!({ "result": outcome.as_text() }),
        )
        .await
    {
        HookAction::Replace(content) => {
            outcome = match outcome {
                ToolOutcome::Halt(_) => ToolOutcome::Halt(content),
                _ => ToolOutcome::Text(content),
            };
        }
        HookAction::Halt(message) => outcome = ToolOutcome::Halt(message),
        HookAction::Continue => {}
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedProvider;
    use crate::tools::ToolSpec;
    use async_trait::async_trait;

    struct StaticTool {
        name: &'static str,
        reply: ToolOutcome,
    }

    #[async_trait]
    impl Tool for StaticTool {
        fn name(&self) -> &str {
            self.name
        }

        fn spec(&self) -> ToolSpec {
            ToolSpec::single_string_arg(self.name, "test tool", "input", "input")
        }

        async fn call(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutcome, ToolError> {
            Ok(self.reply.clone())
        }
    }

    fn chat_with(
        script: Vec<CompletionResponse>,
        tools: Vec<Arc<dyn Tool>>,
        hooks: Vec<crate::hooks::HookDefinition>,
    ) -> Arc<AgentChat> {
        let definition = Arc::new(
            AgentDefinition::builder("tester")
                .directory(std::env::temp_dir())
                .system_prompt("You are a test agent.")
                .build()
                .unwrap(),
        );
        AgentChat::new(ChatParams {
            system_prompt: definition.system_prompt.clone(),
            provider: Arc::new(ScriptedProvider::new(script)),
            retry: RetryPolicy::none(),
            tools,
            tool_context: ToolContext::new("tester", std::env::temp_dir()),
            hooks: HookDispatcher::new(hooks, crate::hooks::HookEnvironment::default()),
            stream: LogStream::new("exec-test"),
            scope: "exec-test".to_string(),
            depth: 0,
            cancel: CancellationToken::new(),
            execution_timeout: None,
            definition,
        })
    }

    #[tokio::test]
    async fn plain_reply_appends_user_and_assistant() {
        let chat = chat_with(vec![CompletionResponse::text("hello back")], vec![], vec![]);
        let reply = chat.ask("hello").await.unwrap();
        assert_eq!(reply.content.as_text(), "hello back");

        let messages = chat.messages();
        assert_eq!(messages.len(), 3);
        assert!(messages[0].is_system());
        assert_eq!(messages[1].content.as_text(), "hello");
        assert_eq!(messages[2].content.as_text(), "hello back");
    }

    #[tokio::test]
    async fn tool_round_pairs_every_call_with_a_result() {
        let chat = chat_with(
            vec![
                CompletionResponse::with_tool_calls(
                    "",
                    vec![
                        ToolCall::new("1", "alpha", json!({})),
                        ToolCall::new("2", "beta", json!({})),
                    ],
                ),
                CompletionResponse::text("done"),
            ],
            vec![
                Arc::new(StaticTool {
                    name: "alpha",
                    reply: ToolOutcome::Text("a-result".into()),
                }),
                Arc::new(StaticTool {
                    name: "beta",
                    reply: ToolOutcome::Text("b-result".into()),
                }),
            ],
            vec![],
        );
        let reply = chat.ask("go").await.unwrap();
        assert_eq!(reply.content.as_text(), "done");

        // Every requested call id has exactly one matching tool result before
        // the next assistant message.
        let messages = chat.messages();
        let call_ids: Vec<String> = messages
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .map(|c| c.id.clone())
            .collect();
        let result_ids: Vec<String> = messages
            .iter()
            .filter_map(|m| m.tool_call_id.clone())
            .collect();
        assert_eq!(call_ids, result_ids);
        assert_eq!(result_ids, vec!["1", "2"]);
    }

    #[tokio::test]
    async fn halt_outcome_ends_turn_with_payload() {
        let chat = chat_with(
            vec![
                CompletionResponse::with_tool_calls(
                    "",
                    vec![ToolCall::new("1", "stopper", json!({}))],
                ),
                CompletionResponse::text("must never be reached"),
            ],
            vec![Arc::new(StaticTool {
                name: "stopper",
                reply: ToolOutcome::Halt("halted payload".into()),
            })],
            vec![],
        );
        let reply = chat.ask("go").await.unwrap();
        assert_eq!(reply.content.as_text(), "halted payload");
    }

    #[tokio::test]
    async fn unknown_tool_becomes_error_result_not_failure() {
        let chat = chat_with(
            vec![
                CompletionResponse::with_tool_calls(
                    "",
                    vec![ToolCall::new("1", "ghost", json!({}))],
                ),
                CompletionResponse::text("recovered"),
            ],
            vec![],
            vec![],
        );
        let reply = chat.ask("go").await.unwrap();
        assert_eq!(reply.content.as_text(), "recovered");

        let results: Vec<String> = chat
            .messages()
            .iter()
            .filter(|m| m.tool_call_id.is_some())
            .map(|m| m.content.as_text())
            .collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("unknown tool: ghost"));
    }

    #[tokio::test]
    async fn pre_hook_halt_blocks_the_tool_only() {
        let hook = crate::hooks::HookDefinition::callable(HookEvent::PreToolUse, |_| {
            HookAction::Halt("nope".into())
        });
        let chat = chat_with(
            vec![
                CompletionResponse::with_tool_calls(
                    "",
                    vec![ToolCall::new("1", "alpha", json!({}))],
                ),
                CompletionResponse::text("after block"),
            ],
            vec![Arc::new(StaticTool {
                name: "alpha",
                reply: ToolOutcome::Text("never".into()),
            })],
            vec![hook],
        );
        let reply = chat.ask("go").await.unwrap();
        assert_eq!(reply.content.as_text(), "after block");

        let result = chat
            .messages()
            .iter()
            .find(|m| m.tool_call_id.is_some())
            .map(|m| m.content.as_text())
            .unwrap();
        assert!(result.contains("nope"));
    }

    #[tokio::test]
    async fn user_prompt_hook_replace_rewrites_prompt() {
        let hook = crate::hooks::HookDefinition::callable(HookEvent::UserPrompt, |_| {
            HookAction::Replace("rewritten".into())
        });
        let chat = chat_with(vec![CompletionResponse::text("ok")], vec![], vec![hook]);
        chat.ask("original").await.unwrap();
        assert_eq!(chat.messages()[1].content.as_text(), "rewritten");
    }

    #[tokio::test]
    async fn reset_preserving_system_keeps_only_system() {
        let chat = chat_with(vec![CompletionResponse::text("ok")], vec![], vec![]);
        chat.ask("hi").await.unwrap();
        assert!(chat.messages().len() > 1);
        chat.reset(true);
        let messages = chat.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_system());
        chat.reset(false);
        assert!(chat.messages().is_empty());
    }

    #[tokio::test]
    async fn turn_timeout_raises_typed_error() {
        struct SlowProvider;
        #[async_trait]
        impl Provider for SlowProvider {
            async fn complete(
                &self,
                _request: CompletionRequest,
            ) -> Result<CompletionResponse, LlmError> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(CompletionResponse::text("late"))
            }
        }

        let definition = Arc::new(
            AgentDefinition::builder("slow")
                .directory(std::env::temp_dir())
                .timeout(Duration::from_millis(50))
                .build()
                .unwrap(),
        );
        let chat = AgentChat::new(ChatParams {
            system_prompt: None,
            provider: Arc::new(SlowProvider),
            retry: RetryPolicy::none(),
            tools: vec![],
            tool_context: ToolContext::new("slow", std::env::temp_dir()),
            hooks: HookDispatcher::default(),
            stream: LogStream::new("exec-test"),
            scope: "exec-test".to_string(),
            depth: 0,
            cancel: CancellationToken::new(),
            execution_timeout: None,
            definition,
        });
        let err = chat.ask("hi").await.unwrap_err();
        assert!(matches!(err, ChatError::TurnTimeout(_)));
    }

    #[tokio::test]
    async fn around_tool_execution_wraps_the_call() {
        struct Doubler;
        #[async_trait]
        impl AroundToolExecution for Doubler {
            async fn around(
                &self,
                call: &ToolCall,
                execute: ToolContinuation,
            ) -> Result<ToolOutcome, ToolError> {
                let inner = execute(call.arguments.clone()).await?;
                Ok(ToolOutcome::Text(format!(
                    "{}+{}",
                    inner.as_text(),
                    inner.as_text()
                )))
            }
        }

        let chat = chat_with(
            vec![
                CompletionResponse::with_tool_calls(
                    "",
                    vec![ToolCall::new("1", "alpha", json!({}))],
                ),
                CompletionResponse::text("done"),
            ],
            vec![Arc::new(StaticTool {
                name: "alpha",
                reply: ToolOutcome::Text("x".into()),
            })],
            vec![],
        );
        chat.around_tool_execution(Arc::new(Doubler));
        chat.ask("go").await.unwrap();

        let result = chat
            .messages()
            .iter()
            .find(|m| m.tool_call_id.is_some())
            .map(|m| m.content.as_text())
            .unwrap();
        assert_eq!(result, "x+x");
    }
}
