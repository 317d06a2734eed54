//! `zenii` — wiring entry point for the agent runtime.
//!
//! Loads config, initializes logging, constructs the bus/state store/tool
//! registry/policy/gateway/LLM client/MCP client/scheduler/agent runtime,
//! subscribes the runtime to `input.text`, subscribes a stdout printer to
//! `output.text`, reads lines from stdin and publishes them as `input.text`
//! events, and runs until EOF. No UI rendering, no interactive config —
//! pure wiring, per SPEC_FULL.md §5.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use zenii_runtime::agent::{AgentRuntime, InputSource, InputText, RuntimeConfig};
use zenii_runtime::ai::provider::LLMProvider;
use zenii_runtime::ai::providers::{OpenAICompatibleConfig, OpenAICompatibleProvider};
use zenii_runtime::bus::{EventBus, InMemoryBus};
use zenii_runtime::bus::traits::{topics, typed_handler};
use zenii_runtime::config::load_default_config;
use zenii_runtime::mcp::{McpClient, load_mcp_config};
use zenii_runtime::prompts::load_system_prompt;
use zenii_runtime::scheduler::{SqliteTaskRepository, TokioScheduler};
use zenii_runtime::state::{SqliteStateStore, StateStore};
use zenii_runtime::tools::{ToolGateway, ToolPolicy, ToolRegistry};
use zenii_runtime::tools::local::fs::{FsReadTool, FsWriteTool};
use zenii_runtime::tools::local::notes::{NotesAppendTool, NotesSearchTool};
use zenii_runtime::tools::local::tasks::TaskCreateTool;
use zenii_runtime::tools::local::web_search::WebSearchTool;

#[derive(Parser, Debug)]
#[command(name = "zenii", about = "Local conversational agent runtime", version)]
struct Cli {
    /// Session id to attribute stdin input to.
    #[arg(long, default_value = "local")]
    session: String,
}

#[tokio::main]
async fn main() {
    zenii_runtime::logging::init();
    let cli = Cli::parse();
    let config = load_default_config();

    let data_dir = dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("zenii");
    std::fs::create_dir_all(&data_dir).ok();

    let bus: Arc<dyn EventBus> = Arc::new(InMemoryBus::new());

    let state: Arc<dyn StateStore> = match SqliteStateStore::open(
        data_dir.join("state.sqlite3").to_string_lossy().as_ref(),
    ) {
        Ok(store) => Arc::new(store),
        Err(e) => {
            tracing::warn!(error = %e, "falling back to in-memory state store");
            Arc::new(zenii_runtime::state::InMemoryStateStore::new())
        }
    };

    let workspace_root = PathBuf::from(&config.workspace.root);
    std::fs::create_dir_all(&workspace_root).ok();

    let task_repo: Arc<dyn zenii_runtime::scheduler::TaskRepository> =
        match SqliteTaskRepository::open(data_dir.join("tasks.sqlite3").to_string_lossy().as_ref()) {
            Ok(repo) => Arc::new(repo),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to in-memory task repository");
                Arc::new(zenii_runtime::scheduler::InMemoryTaskRepository::new())
            }
        };

    let mut registry = ToolRegistry::new();
    register_or_warn(&mut registry, Arc::new(FsReadTool::new(workspace_root.clone())));
    register_or_warn(&mut registry, Arc::new(FsWriteTool::new(workspace_root.clone())));
    register_or_warn(&mut registry, Arc::new(WebSearchTool::new(None)));
    let notes_append = NotesAppendTool::new();
    register_or_warn(&mut registry, Arc::new(NotesSearchTool::new(notes_append.store())));
    register_or_warn(&mut registry, Arc::new(notes_append));
    register_or_warn(&mut registry, Arc::new(TaskCreateTool::new(Arc::clone(&task_repo))));

    let mcp_client = if let Some(path) = &config.mcp_config_path {
        match load_mcp_config(&PathBuf::from(path)) {
            Ok(mcp_config) => Some(McpClient::connect_all(&mcp_config, &mut registry).await),
            Err(e) => {
                tracing::warn!(error = %e, path, "failed to load MCP config, continuing without MCP");
                None
            }
        }
    } else {
        None
    };

    let registry = Arc::new(registry);
    let policy = ToolPolicy::new(
        config.policy.confirm_tools.clone(),
        config.policy.deny_tools.clone(),
    );
    let gateway = Arc::new(ToolGateway::with_null_audit_log(Arc::clone(&registry), policy));

    let llm: Option<Arc<dyn LLMProvider>> = config.provider.base_url.as_ref().map(|base_url| {
        let mut provider_config = OpenAICompatibleConfig::new("", base_url.clone())
            .default_model(config.provider.default_model.clone());
        provider_config.timeout = std::time::Duration::from_secs(config.provider.request_timeout_secs);
        match OpenAICompatibleProvider::new(provider_config, "configured") {
            Ok(provider) => Some(Arc::new(provider) as Arc<dyn LLMProvider>),
            Err(e) => {
                tracing::warn!(error = %e, "failed to construct LLM provider, running tool-less");
                None
            }
        }
    }).flatten();

    let system_prompt = load_system_prompt();
    let runtime = AgentRuntime::new(
        Arc::clone(&bus),
        Arc::clone(&state),
        Arc::clone(&registry),
        gateway,
        llm,
        system_prompt,
        RuntimeConfig {
            model: config.provider.default_model.clone(),
            ..RuntimeConfig::default()
        },
    );
    runtime.attach();

    let scheduler = TokioScheduler::with_interval(
        task_repo,
        Arc::clone(&bus),
        std::time::Duration::from_secs(config.scheduler.interval_secs),
    );
    scheduler.start();

    bus.subscribe(
        topics::OUTPUT_TEXT,
        typed_handler(move |msg: zenii_runtime::agent::OutputText| async move {
            println!("{}", msg.text);
            Ok(())
        }),
    );

    let session_id = cli.session.clone();
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let Ok(text) = line else { break };
        if text.is_empty() {
            continue;
        }
        let input = InputText {
            session_id: session_id.clone(),
            message_id: format!("msg_{}", uuid::Uuid::new_v4().simple()),
            ts: chrono::Utc::now(),
            text,
            source: InputSource::Cli,
        };
        let value = match serde_json::to_value(&input) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize stdin input");
                continue;
            }
        };
        if let Err(e) = bus.publish(topics::INPUT_TEXT, value).await {
            tracing::warn!(error = %e, "failed to publish input.text");
        }
    }

    scheduler.stop();
    if let Some(client) = mcp_client {
        tracing::info!(servers = ?client.connected_servers(), "shutting down with MCP servers connected");
    }
}

fn register_or_warn(registry: &mut ToolRegistry, tool: Arc<dyn zenii_runtime::tools::Tool>) {
    let name = tool.spec().name.clone();
    if let Err(e) = registry.register(tool) {
        tracing::warn!(error = %e, tool = name, "failed to register tool");
    }
}
