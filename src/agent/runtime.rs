//! The core conversational agent runtime: a single state machine per
//! process subscribed to `input.text`, driving the LLM/tool loop described
//! in spec.md §4.8. Grounded in the teacher's `agent::loop_::AgentLoop` for
//! the overall shape (config struct, bounded tool-call iteration, message
//! history threaded through an LLM provider) but replaces its
//! session-router/skills machinery with the flat two-state contract the
//! specification calls for.

use std::sync::Arc;

use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::ai::{CompletionRequest, LLMProvider, LLMToolCall, Message as LlmMessage, MessageRole};
use crate::bus::traits::{EventBus, topics, typed_handler};
use crate::state::traits::{Message as StateMessage, Role, StateStore};
use crate::tools::gateway::{GatewayError, ToolGateway};
use crate::tools::registry::ToolRegistry;
use crate::tools::schema::render_tools;
use crate::tools::traits::ToolCall;

use super::events::OutputText;

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Model id passed straight through to the configured LLM provider.
    pub model: String,
    /// Maximum number of tool-call round trips within a single turn before
    /// the runtime gives up and reports `"Tool loop exceeded max steps."`.
    pub max_tool_steps: usize,
    /// How many of the most recent persisted messages are replayed into a
    /// freshly assembled prompt.
    pub history_window: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model: "default".to_string(),
            max_tool_steps: 3,
            history_window: 40,
        }
    }
}

/// The one outstanding confirm-class tool call the runtime is waiting on,
/// if any. A singleton by design per spec.md §9(a): a second session's
/// `input.text` arriving while one is pending is handled as an ordinary
/// IDLE turn, since a single-process runtime only ever serves one
/// foreground conversation at a time.
struct PendingConfirmation {
    session_id: String,
    tool_call: ToolCall,
    llm_tool_call_id: String,
    /// The working prompt (system + history + assistant tool-call message),
    /// snapshotted so the post-confirmation LLM round trip preserves the
    /// exact `tool_call_id` linkage the provider requires.
    snapshotted_messages: Vec<LlmMessage>,
}

pub struct AgentRuntime {
    bus: Arc<dyn EventBus>,
    state: Arc<dyn StateStore>,
    registry: Arc<ToolRegistry>,
    gateway: Arc<ToolGateway>,
    llm: Option<Arc<dyn LLMProvider>>,
    system_prompt: String,
    config: RuntimeConfig,
    pending: Mutex<Option<PendingConfirmation>>,
}

impl AgentRuntime {
    pub fn new(
        bus: Arc<dyn EventBus>,
        state: Arc<dyn StateStore>,
        registry: Arc<ToolRegistry>,
        gateway: Arc<ToolGateway>,
        llm: Option<Arc<dyn LLMProvider>>,
        system_prompt: String,
        config: RuntimeConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            bus,
            state,
            registry,
            gateway,
            llm,
            system_prompt,
            config,
            pending: Mutex::new(None),
        })
    }

    /// Subscribe this runtime to `input.text`. Takes `self: &Arc<Self>` so
    /// the handler closure can hold its own strong reference.
    pub fn attach(self: &Arc<Self>) {
        let this = Arc::clone(self);
        self.bus.subscribe(
            topics::INPUT_TEXT,
            typed_handler(move |input: super::events::InputText| {
                let this = Arc::clone(&this);
                async move { this.on_input_text(input).await }
            }),
        );
    }

    async fn emit(&self, session_id: &str, text: impl Into<String>) -> Result<(), String> {
        let message = OutputText::new(session_id, text);
        let value = serde_json::to_value(&message).map_err(|e| format!("serialize: {e}"))?;
        self.bus.publish(topics::OUTPUT_TEXT, value).await
    }

    async fn on_input_text(&self, input: super::events::InputText) -> Result<(), String> {
        let mut pending = self.pending.lock().await;
        if let Some(confirmation) = pending.as_ref() {
            if confirmation.session_id == input.session_id {
                return self.handle_confirmation_reply(&mut pending, input).await;
            }
        }
        drop(pending);
        self.handle_idle_turn(input).await
    }

    async fn handle_idle_turn(&self, input: super::events::InputText) -> Result<(), String> {
        self.state
            .add_message(&input.session_id, Role::User, &input.text)
            .await?;

        let Some(llm) = self.llm.clone() else {
            self.emit(&input.session_id, format!("Received: {}", input.text))
                .await?;
            return Ok(());
        };

        let history = self.load_history(&input.session_id).await?;
        let mut working_prompt = history;

        self.run_llm_loop(&input.session_id, llm, &mut working_prompt, 0)
            .await
    }

    async fn handle_confirmation_reply(
        &self,
        pending: &mut Option<PendingConfirmation>,
        input: super::events::InputText,
    ) -> Result<(), String> {
        let reply = input.text.trim().to_ascii_lowercase();
        match reply.as_str() {
            "y" | "yes" => {
                let confirmation = pending.take().expect("checked Some above");
                self.run_confirmed_tool_call(confirmation).await
            }
            "n" | "no" => {
                *pending = None;
                self.emit(&input.session_id, "Cancelled tool call.").await
            }
            _ => self.emit(&input.session_id, "Confirm with yes/no.").await,
        }
    }

    async fn run_confirmed_tool_call(&self, confirmation: PendingConfirmation) -> Result<(), String> {
        let PendingConfirmation {
            session_id,
            mut tool_call,
            llm_tool_call_id,
            mut snapshotted_messages,
        } = confirmation;
        tool_call.requires_confirm = false;

        let Some(llm) = self.llm.clone() else {
            return self.emit(&session_id, "LLM error: no provider configured").await;
        };

        let result = match self.gateway.execute(tool_call).await {
            Ok(result) => result,
            Err(err) => return self.emit(&session_id, format!("LLM error: {err}")).await,
        };

        let tool_content = tool_result_content(&result.result, &result.error);
        self.state
            .add_message(&session_id, Role::Tool, &tool_content)
            .await?;
        snapshotted_messages.push(LlmMessage::tool(llm_tool_call_id, tool_content));

        self.run_llm_loop(&session_id, llm, &mut snapshotted_messages, 0)
            .await
    }

    /// Drive the LLM/tool iteration from `working_prompt` for up to
    /// `max_tool_steps` round trips, starting at `step`.
    async fn run_llm_loop(
        &self,
        session_id: &str,
        llm: Arc<dyn LLMProvider>,
        working_prompt: &mut Vec<LlmMessage>,
        step: usize,
    ) -> Result<(), String> {
        if step >= self.config.max_tool_steps {
            return self.emit(session_id, "Tool loop exceeded max steps.").await;
        }

        let tools = render_tools(&self.registry);
        let request = CompletionRequest::new(self.config.model.clone(), working_prompt.clone())
            .with_tools(tools)
            .with_temperature(0.2);

        let response = match llm.complete(request).await {
            Ok(response) => response,
            Err(err) => return self.emit(session_id, format!("LLM error: {err}")).await,
        };

        if response.tool_calls.is_empty() {
            self.state
                .add_message(session_id, Role::Assistant, &response.content)
                .await?;
            return self.emit(session_id, response.content).await;
        }

        working_prompt.push(LlmMessage::assistant_with_tool_calls(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        for llm_call in response.tool_calls {
            match self
                .dispatch_tool_call(session_id, &llm_call, working_prompt)
                .await?
            {
                DispatchOutcome::AwaitingConfirm => return Ok(()),
                DispatchOutcome::Continue => {}
            }
        }

        Box::pin(self.run_llm_loop(session_id, llm, working_prompt, step + 1))
            .await
    }

    async fn dispatch_tool_call(
        &self,
        session_id: &str,
        llm_call: &LLMToolCall,
        working_prompt: &mut Vec<LlmMessage>,
    ) -> Result<DispatchOutcome, String> {
        let spec = self.registry.get_spec(&llm_call.name);
        let requires_confirm = spec.map(|s| s.risk != crate::tools::traits::RiskLevel::Safe).unwrap_or(true);

        let tool_call = ToolCall {
            session_id: session_id.to_string(),
            call_id: ToolCall::new_call_id(),
            tool_name: llm_call.name.clone(),
            args: llm_call.arguments.clone(),
            requires_confirm,
        };

        match self.gateway.execute(tool_call.clone()).await {
            Ok(result) => {
                let tool_content = tool_result_content(&result.result, &result.error);
                self.state
                    .add_message(session_id, Role::Tool, &tool_content)
                    .await?;
                working_prompt.push(LlmMessage::tool(llm_call.id.clone(), tool_content));
                Ok(DispatchOutcome::Continue)
            }
            Err(GatewayError::ConfirmationRequired { reason: _, tool_name }) => {
                let mut pending = self.pending.lock().await;
                *pending = Some(PendingConfirmation {
                    session_id: session_id.to_string(),
                    tool_call,
                    llm_tool_call_id: llm_call.id.clone(),
                    snapshotted_messages: working_prompt.clone(),
                });
                drop(pending);
                self.emit(session_id, format!("Confirm tool call {tool_name}? (yes/no)"))
                    .await?;
                Ok(DispatchOutcome::AwaitingConfirm)
            }
            Err(GatewayError::NotRegistered(name)) => {
                let tool_content = json!({ "error": format!("tool '{name}' is not registered") }).to_string();
                self.state
                    .add_message(session_id, Role::Tool, &tool_content)
                    .await?;
                working_prompt.push(LlmMessage::tool(llm_call.id.clone(), tool_content));
                Ok(DispatchOutcome::Continue)
            }
        }
    }

    async fn load_history(&self, session_id: &str) -> Result<Vec<LlmMessage>, String> {
        let persisted = self.state.list_messages(session_id).await?;
        let start = persisted.len().saturating_sub(self.config.history_window);

        let mut prompt = Vec::with_capacity(persisted.len() - start + 1);
        prompt.push(LlmMessage::system(self.system_prompt.clone()));
        for message in &persisted[start..] {
            prompt.push(state_message_to_llm(message));
        }
        Ok(prompt)
    }
}

enum DispatchOutcome {
    Continue,
    AwaitingConfirm,
}

fn state_message_to_llm(message: &StateMessage) -> LlmMessage {
    match message.role {
        Role::User => LlmMessage::user(message.content.clone()),
        Role::Assistant => LlmMessage::assistant(message.content.clone()),
        // The provider-assigned tool_call_id only needs to round-trip within
        // the turn that created it; once a tool exchange has been persisted
        // and is being replayed as plain history, a fresh role/content
        // mapping is all spec.md §4.8 step 3 requires.
        Role::Tool => LlmMessage {
            role: MessageRole::Tool,
            content: message.content.clone(),
            tool_call_id: None,
            tool_calls: vec![],
        },
    }
}

fn tool_result_content(result: &Option<Value>, error: &Option<String>) -> String {
    let payload = match (result, error) {
        (Some(value), _) => value.get("data").cloned().unwrap_or_else(|| value.clone()),
        (None, Some(err)) => json!({ "error": err }),
        (None, None) => json!({}),
    };
    payload.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::events::{InputSource, InputText};
    use crate::ai::CompletionResponse;
    use crate::bus::in_memory::InMemoryBus;
    use crate::state::in_memory::InMemoryStateStore;
    use crate::tools::policy::ToolPolicy;
    use crate::tools::traits::{RiskLevel, Tool, ToolSpec};
    use async_trait::async_trait;
    use chrono::Utc;
    use futures::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn input(session_id: &str, text: &str) -> InputText {
        InputText {
            session_id: session_id.to_string(),
            message_id: "m1".to_string(),
            ts: Utc::now(),
            text: text.to_string(),
            source: InputSource::Cli,
        }
    }

    struct EchoArgsTool(ToolSpec);

    #[async_trait]
    impl Tool for EchoArgsTool {
        fn spec(&self) -> &ToolSpec {
            &self.0
        }
        async fn execute(&self, args: Value) -> Result<Value, String> {
            Ok(args)
        }
    }

    fn safe_spec(name: &str) -> ToolSpec {
        ToolSpec {
            name: name.to_string(),
            description: "test".to_string(),
            args_schema: json!({"type": "object"}),
            risk: RiskLevel::Safe,
            timeout_ms: 1000,
            caps: vec![],
        }
    }

    fn confirm_spec(name: &str) -> ToolSpec {
        ToolSpec {
            risk: RiskLevel::Confirm,
            ..safe_spec(name)
        }
    }

    /// A scripted provider: returns each queued response in order, looping
    /// the last one if asked more times than scripted.
    struct ScriptedProvider {
        responses: Mutex<Vec<CompletionResponse>>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(responses: Vec<CompletionResponse>) -> Self {
            Self {
                responses: Mutex::new(responses),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LLMProvider for ScriptedProvider {
        async fn complete(&self, _request: CompletionRequest) -> Result<CompletionResponse, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().await;
            if responses.len() > 1 {
                Ok(responses.remove(0))
            } else {
                Ok(responses[0].clone())
            }
        }

        async fn stream(
            &self,
            _request: CompletionRequest,
        ) -> Result<crate::ai::provider::StreamResponse, String> {
            Err("not implemented".to_string())
        }

        fn context_limit(&self) -> usize {
            8192
        }

        fn supports_tools(&self) -> bool {
            true
        }

        fn provider_name(&self) -> &str {
            "scripted"
        }
    }

    fn plain_reply(text: &str) -> CompletionResponse {
        CompletionResponse {
            content: text.to_string(),
            model: "test".to_string(),
            usage: None,
            finish_reason: Some("stop".to_string()),
            tool_calls: vec![],
        }
    }

    fn tool_call_reply(call_id: &str, tool: &str, args: Value) -> CompletionResponse {
        CompletionResponse {
            content: String::new(),
            model: "test".to_string(),
            usage: None,
            finish_reason: Some("tool_calls".to_string()),
            tool_calls: vec![LLMToolCall {
                id: call_id.to_string(),
                name: tool.to_string(),
                arguments: args,
            }],
        }
    }

    fn outputs_collector(bus: &InMemoryBus) -> Arc<Mutex<Vec<String>>> {
        let outputs = Arc::new(Mutex::new(Vec::new()));
        let collected = Arc::clone(&outputs);
        bus.subscribe(
            topics::OUTPUT_TEXT,
            typed_handler(move |msg: OutputText| {
                let collected = Arc::clone(&collected);
                let fut: BoxFuture<'static, Result<(), String>> = Box::pin(async move {
                    collected.lock().await.push(msg.text);
                    Ok(())
                });
                fut
            }),
        );
        outputs
    }

    fn runtime_with(
        llm: Option<Arc<dyn LLMProvider>>,
        registry: ToolRegistry,
    ) -> (Arc<AgentRuntime>, Arc<InMemoryBus>, Arc<Mutex<Vec<String>>>) {
        let bus = Arc::new(InMemoryBus::new());
        let outputs = outputs_collector(&bus);
        let state = Arc::new(InMemoryStateStore::new());
        let registry = Arc::new(registry);
        let gateway = Arc::new(ToolGateway::with_null_audit_log(
            Arc::clone(&registry),
            ToolPolicy::default(),
        ));
        let runtime = AgentRuntime::new(
            bus.clone() as Arc<dyn EventBus>,
            state,
            registry,
            gateway,
            llm,
            "be helpful".to_string(),
            RuntimeConfig::default(),
        );
        runtime.attach();
        (runtime, bus, outputs)
    }

    #[tokio::test]
    async fn no_provider_echoes_received() {
        let (_runtime, bus, outputs) = runtime_with(None, ToolRegistry::new());
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "hi"))
            .await
            .unwrap();
        assert_eq!(outputs.lock().await.as_slice(), ["Received: hi"]);
    }

    #[tokio::test]
    async fn reply_with_no_tool_calls_is_emitted_directly() {
        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![plain_reply("hello there")]));
        let (_runtime, bus, outputs) = runtime_with(Some(llm), ToolRegistry::new());
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "hi"))
            .await
            .unwrap();
        assert_eq!(outputs.lock().await.as_slice(), ["hello there"]);
    }

    #[tokio::test]
    async fn safe_tool_call_resolves_within_one_turn() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoArgsTool(safe_spec("echo"))))
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_reply("call_1", "echo", json!({"x": 1})),
            plain_reply("done"),
        ]));
        let (_runtime, bus, outputs) = runtime_with(Some(llm), registry);
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "echo 1"))
            .await
            .unwrap();
        assert_eq!(outputs.lock().await.as_slice(), ["done"]);
    }

    #[tokio::test]
    async fn confirm_tool_then_yes_completes_the_turn() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoArgsTool(confirm_spec("fs.write"))))
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_reply("call_1", "fs.write", json!({"path": "a.txt"})),
            plain_reply("wrote it"),
        ]));
        let (_runtime, bus, outputs) = runtime_with(Some(llm), registry);

        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "write a file"))
            .await
            .unwrap();
        assert_eq!(
            outputs.lock().await.as_slice(),
            ["Confirm tool call fs.write? (yes/no)"]
        );

        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "yes"))
            .await
            .unwrap();
        assert_eq!(
            outputs.lock().await.as_slice(),
            ["Confirm tool call fs.write? (yes/no)", "wrote it"]
        );
    }

    #[tokio::test]
    async fn confirm_tool_then_no_cancels() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoArgsTool(confirm_spec("fs.write"))))
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![tool_call_reply(
            "call_1",
            "fs.write",
            json!({}),
        )]));
        let (_runtime, bus, outputs) = runtime_with(Some(llm), registry);

        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "write a file"))
            .await
            .unwrap();
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "no"))
            .await
            .unwrap();

        assert_eq!(
            outputs.lock().await.as_slice(),
            [
                "Confirm tool call fs.write? (yes/no)",
                "Cancelled tool call."
            ]
        );
    }

    #[tokio::test]
    async fn unclear_confirmation_reply_reprompts() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoArgsTool(confirm_spec("fs.write"))))
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![
            tool_call_reply("call_1", "fs.write", json!({})),
            plain_reply("wrote it"),
        ]));
        let (_runtime, bus, outputs) = runtime_with(Some(llm), registry);

        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "write a file"))
            .await
            .unwrap();
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "maybe"))
            .await
            .unwrap();
        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "yes"))
            .await
            .unwrap();

        assert_eq!(
            outputs.lock().await.as_slice(),
            [
                "Confirm tool call fs.write? (yes/no)",
                "Confirm with yes/no.",
                "wrote it"
            ]
        );
    }

    #[tokio::test]
    async fn tool_loop_cap_is_enforced() {
        let mut registry = ToolRegistry::new();
        registry
            .register(Arc::new(EchoArgsTool(safe_spec("echo"))))
            .unwrap();

        let llm: Arc<dyn LLMProvider> = Arc::new(ScriptedProvider::new(vec![tool_call_reply(
            "call_1",
            "echo",
            json!({}),
        )]));
        let mut config = RuntimeConfig::default();
        config.max_tool_steps = 2;
        let bus = Arc::new(InMemoryBus::new());
        let outputs = outputs_collector(&bus);
        let state = Arc::new(InMemoryStateStore::new());
        let registry = Arc::new(registry);
        let gateway = Arc::new(ToolGateway::with_null_audit_log(
            Arc::clone(&registry),
            ToolPolicy::default(),
        ));
        let runtime = AgentRuntime::new(
            bus.clone() as Arc<dyn EventBus>,
            state,
            registry,
            gateway,
            Some(llm),
            "be helpful".to_string(),
            config,
        );
        runtime.attach();

        bus.publish_typed(topics::INPUT_TEXT, &input("s1", "loop"))
            .await
            .unwrap();
        assert_eq!(
            outputs.lock().await.as_slice(),
            ["Tool loop exceeded max steps."]
        );
    }
}
