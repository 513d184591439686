//! `cclaw` — command-line entry point wiring config, provider, agent loop,
//! and the optional WebSocket gateway / Telegram front-ends together.

use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use corvid_agent::{default_tools, turn, TurnContext};
use corvid_core::config::Dialect;
use corvid_core::CorvidConfig;
use corvid_provider::{AnthropicProvider, LlmProvider, OpenAiProvider};
use corvid_scheduler::Scheduler;
use corvid_sessions::Session;

const VERSION: &str = "0.1.0";
const DEFAULT_MAX_TOKENS: u32 = 4096;

struct AgentRuntime {
    provider: Box<dyn LlmProvider>,
    model: String,
    system_prompt: String,
    temperature: f32,
    tools: Vec<Box<dyn corvid_agent::Tool>>,
    workspace: PathBuf,
}

impl AgentRuntime {
    async fn run_turn(
        &self,
        session: &mut Session,
        user_msg: &str,
        streaming: bool,
        on_delta: impl FnMut(&str) -> bool,
    ) -> corvid_provider::Result<String> {
        let ctx = TurnContext {
            provider: self.provider.as_ref(),
            model: self.model.clone(),
            system_prompt: self.system_prompt.clone(),
            temperature: self.temperature,
            max_tokens: DEFAULT_MAX_TOKENS,
            tools: &self.tools,
        };
        turn(&ctx, session, user_msg, streaming, on_delta).await
    }
}

struct WsBridge {
    runtime: Arc<AgentRuntime>,
}

#[async_trait::async_trait]
impl corvid_ws::WsHandler for WsBridge {
    async fn on_connect(&self, client_id: u64) {
        info!(client_id, "gateway client connected");
    }

    async fn on_message(&self, client_id: u64, text: &str) -> Option<String> {
        let session_id = format!("ws_{client_id}");
        let mut session = match Session::new(&self.runtime.workspace, Some(&session_id)) {
            Ok(s) => s,
            Err(e) => {
                warn!(client_id, error = %e, "failed to open gateway session");
                return None;
            }
        };

        match self.runtime.run_turn(&mut session, text, false, |_| true).await {
            Ok(reply) => Some(reply),
            Err(e) => {
                warn!(client_id, error = %e, "agent turn failed for gateway client");
                None
            }
        }
    }

    async fn on_disconnect(&self, client_id: u64) {
        info!(client_id, "gateway client disconnected");
    }
}

struct TelegramBridge {
    runtime: Arc<AgentRuntime>,
}

#[async_trait::async_trait]
impl corvid_telegram::TelegramHandler for TelegramBridge {
    async fn handle(&self, msg: corvid_telegram::IncomingMessage) -> String {
        let session_id = format!("tg_{}", msg.chat_id);
        let mut session = match Session::new(&self.runtime.workspace, Some(&session_id)) {
            Ok(s) => s,
            Err(e) => {
                warn!(chat_id = msg.chat_id, error = %e, "failed to open telegram session");
                return String::new();
            }
        };

        match self.runtime.run_turn(&mut session, &msg.text, false, |_| true).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(chat_id = msg.chat_id, error = %e, "agent turn failed for telegram chat");
                String::new()
            }
        }
    }
}

fn print_usage() {
    println!("CClaw v{VERSION} — OpenClaw in Rust\n");
    println!("Usage:");
    println!("  cclaw                            Interactive CLI");
    println!("  cclaw \"prompt\"                    One-shot query");
    println!("  cclaw --telegram                  Start Telegram bot");
    println!("  cclaw --config <file>              Config file");
    println!("  cclaw --workspace <dir>            Workspace directory");
    println!("  cclaw --model <model>              Override model");
    println!("  cclaw --gateway-port <port>        Start WebSocket gateway");
    println!("  cclaw --version                    Print version");
}

struct Args {
    config_path: Option<String>,
    workspace: Option<String>,
    model: Option<String>,
    telegram_mode: bool,
    gateway_port: Option<u16>,
    one_shot: Option<String>,
}

fn parse_args() -> Result<Option<Args>, i32> {
    let argv: Vec<String> = std::env::args().collect();
    let mut args = Args {
        config_path: None,
        workspace: None,
        model: None,
        telegram_mode: false,
        gateway_port: None,
        one_shot: None,
    };

    let mut i = 1;
    while i < argv.len() {
        match argv[i].as_str() {
            "--help" | "-h" => {
                print_usage();
                return Ok(None);
            }
            "--version" | "-v" => {
                println!("cclaw {VERSION}");
                return Ok(None);
            }
            "--config" if i + 1 < argv.len() => {
                i += 1;
                args.config_path = Some(argv[i].clone());
            }
            "--workspace" if i + 1 < argv.len() => {
                i += 1;
                args.workspace = Some(argv[i].clone());
            }
            "--model" if i + 1 < argv.len() => {
                i += 1;
                args.model = Some(argv[i].clone());
            }
            "--telegram" => args.telegram_mode = true,
            "--gateway-port" if i + 1 < argv.len() => {
                i += 1;
                args.gateway_port = argv[i].parse().ok();
            }
            other if !other.starts_with('-') => args.one_shot = Some(other.to_string()),
            _ => {}
        }
        i += 1;
    }

    Ok(Some(args))
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(Some(args)) => args,
        Ok(None) => return,
        Err(code) => std::process::exit(code),
    };

    let mut cfg = match CorvidConfig::load(args.config_path.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error: failed to load config: {e}");
            std::process::exit(1);
        }
    };

    if let Some(workspace) = args.workspace {
        cfg.workspace = Some(workspace);
    }
    if let Some(model) = args.model {
        cfg.provider.model = model;
    }
    if let Some(port) = args.gateway_port {
        cfg.gateway.port = Some(port);
    }

    corvid_core::logging::init(&cfg.log_level);

    if cfg.provider.api_key.is_empty() {
        eprintln!("Error: no API key. Set ANTHROPIC_API_KEY or CCLAW_API_KEY.");
        std::process::exit(1);
    }

    let workspace = cfg.workspace_dir();
    info!(workspace = %workspace.display(), model = %cfg.provider.model, "starting cclaw");

    let system_prompt = corvid_agent::build_system_prompt(&workspace, &cfg.provider.model);
    let tools = default_tools(workspace.clone());

    let provider: Box<dyn LlmProvider> = match cfg.provider.dialect {
        Dialect::Anthropic => Box::new(AnthropicProvider::new(
            cfg.provider.api_key.clone(),
            cfg.provider.base_url.clone(),
        )),
        Dialect::Openai => Box::new(OpenAiProvider::new(
            cfg.provider.api_key.clone(),
            cfg.provider.base_url.clone(),
        )),
    };

    let runtime = Arc::new(AgentRuntime {
        provider,
        model: cfg.provider.model.clone(),
        system_prompt,
        temperature: cfg.provider.temperature,
        tools,
        workspace: workspace.clone(),
    });

    // Cron scheduler always runs in the background; jobs can be registered
    // programmatically. No jobs are pre-registered by default.
    let scheduler = Arc::new(Scheduler::new());
    tokio::spawn(scheduler.clone().run());
    info!("cron scheduler started in background");

    if let Some(port) = cfg.gateway.port {
        let addr = format!("0.0.0.0:{port}");
        let bridge = Arc::new(WsBridge {
            runtime: runtime.clone(),
        });
        let token = cfg.gateway.token.clone();
        tokio::spawn(async move {
            if let Err(e) = corvid_ws::serve(&addr, token, bridge).await {
                warn!(error = %e, "WebSocket gateway exited");
            }
        });
        info!(port, "WebSocket gateway starting");
    }

    if args.telegram_mode {
        let Some(token) = cfg.messenger.token.clone() else {
            eprintln!("Error: no Telegram token. Set CCLAW_TELEGRAM_TOKEN.");
            std::process::exit(1);
        };
        let client = corvid_telegram::TelegramClient::new(token);
        let handler = TelegramBridge {
            runtime: runtime.clone(),
        };
        info!("starting Telegram bot");
        corvid_telegram::poll_loop(&client, &cfg.messenger.allow_users, &handler).await;
    } else if let Some(one_shot) = args.one_shot {
        let mut session = match Session::new(&workspace, None) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("Error: failed to open session: {e}");
                std::process::exit(1);
            }
        };

        let result = runtime
            .run_turn(&mut session, &one_shot, true, |delta| {
                print!("{delta}");
                let _ = std::io::stdout().flush();
                true
            })
            .await;

        println!();
        if let Err(e) = result {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    } else {
        cli_mode(&runtime, &workspace).await;
    }
}

async fn cli_mode(runtime: &AgentRuntime, workspace: &std::path::Path) {
    let mut session = match Session::new(workspace, Some("cli")) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error: failed to open session: {e}");
            return;
        }
    };

    println!("CClaw v{VERSION} — type /quit to exit\n");

    let stdin = std::io::stdin();
    loop {
        print!("\x1b[1;36myou>\x1b[0m ");
        let _ = std::io::stdout().flush();

        let mut input = String::new();
        if stdin.read_line(&mut input).unwrap_or(0) == 0 {
            break;
        }
        let input = input.trim();
        if input.is_empty() {
            continue;
        }
        if input == "/quit" || input == "/exit" {
            break;
        }

        print!("\x1b[1;33mcclaw>\x1b[0m ");
        let _ = std::io::stdout().flush();

        let result = runtime
            .run_turn(&mut session, input, true, |delta| {
                print!("{delta}");
                let _ = std::io::stdout().flush();
                true
            })
            .await;

        println!("\n");

        if let Err(e) = result {
            eprintln!("Error: {e}");
        }
    }
}
