//! Coach Chat terminal client
//!
//! Entry point: loads configuration, wires the HTTP backend into a
//! [`ChatController`] and drives it from stdin.

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]

use mimalloc::MiMalloc;

/// Global allocator for improved performance (M-MIMALLOC-APPS).
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use coach_chat::api::{ChatBackend, HttpBackend};
use coach_chat::chat::{ChatController, InitOutcome};
use coach_chat::config::AppConfig;
use coach_chat::storage::FileStore;
use coach_chat::stream::{MalformedLine, MalformedLineHook};
use coach_chat::ui::{ChatCommand, MessageId, Osc52Clipboard, QUICK_REPLIES, Role, ViewEvent};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env (if present)
    let _ = dotenv();

    let config = AppConfig::load().context("Failed to load configuration")?;
    init_tracing(config.log_json);

    info!(
        name: "config.loaded",
        base_url = %config.server.base_url,
        module = %config.chat.module,
        model = %config.chat.model,
        storage = %config.storage.path.display(),
        "Configuration loaded"
    );

    let storage = Arc::new(
        FileStore::open(&config.storage.path)
            .with_context(|| format!("Failed to open {}", config.storage.path.display()))?,
    );

    let hook: MalformedLineHook = Arc::new(|line: &MalformedLine| {
        tracing::warn!(name: "stream.line.skipped", reason = %line.reason, "Skipped malformed stream line");
    });
    let backend = HttpBackend::new(&config.server.base_url)?
        .with_stream_timeout(config.stream_timeout())
        .with_malformed_hook(hook);

    let mut controller = ChatController::new(
        Arc::new(backend),
        storage,
        config.chat.module.clone(),
        config.chat.model.clone(),
    )
    .with_clipboard(Arc::new(Osc52Clipboard))
    .with_session_ttl_days(config.chat.session_ttl_days)
    .with_export_dir(config.export.dir.clone());

    let events = controller.view_mut().subscribe();
    let renderer = tokio::spawn(render(events));

    if controller.initialize().await == InitOutcome::Failed {
        eprintln!("Could not start a session; type /new to retry.");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "/quit" {
            break;
        }
        if let Err(e) = handle_line(&mut controller, line).await {
            eprintln!("! {e}");
        }
    }

    drop(controller);
    let _ = renderer.await;
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}

async fn handle_line(controller: &mut ChatController, line: &str) -> Result<()> {
    let Some(command) = line.strip_prefix('/') else {
        controller.send_message(line).await;
        return Ok(());
    };

    let mut parts = command.split_whitespace();
    let name = parts.next().unwrap_or_default();
    let args: Vec<&str> = parts.collect();

    match name {
        "send" => {
            controller.submit().await;
        }
        "new" => controller.dispatch(ChatCommand::NewSession).await?,
        "model" => {
            let model = args.first().context("usage: /model <id>")?;
            controller.select_model(*model);
        }
        "models" => {
            for model in controller.backend().list_models().await? {
                println!(
                    "  {:<12} {}  {}",
                    model.id,
                    model.name,
                    model.description.unwrap_or_default()
                );
            }
        }
        "modules" => {
            for module in controller.backend().list_modules().await? {
                println!(
                    "  {:<12} {} {}",
                    module.id,
                    module.icon.unwrap_or_default(),
                    module.name
                );
            }
        }
        "like" => controller.dispatch(ChatCommand::Like(message_arg(&args)?)).await?,
        "dislike" => {
            controller
                .dispatch(ChatCommand::Dislike(message_arg(&args)?))
                .await?;
        }
        "copy" => controller.dispatch(ChatCommand::Copy(message_arg(&args)?)).await?,
        "regen" => {
            controller
                .dispatch(ChatCommand::Regenerate(message_arg(&args)?))
                .await?;
        }
        "table" => {
            let id = message_arg(&args)?;
            let nth: usize = match args.get(1) {
                Some(k) => k.parse().context("table number must be a positive integer")?,
                None => 1,
            };
            let index = nth.checked_sub(1).context("tables are numbered from 1")?;
            controller
                .dispatch(ChatCommand::CopyTable { id, index })
                .await?;
        }
        "export" => controller.dispatch(ChatCommand::ExportDocument).await?,
        "history" => controller.refresh_history().await,
        "open" => {
            let id = args.first().context("usage: /open <session-id>")?;
            controller.open_session(id).await?;
        }
        "credits" => {
            controller.refresh_credits().await?;
        }
        "redeem" => {
            controller
                .redeem(args.first().copied().unwrap_or_default())
                .await?;
        }
        "login" => {
            let (Some(user), Some(password)) = (args.first(), args.get(1)) else {
                anyhow::bail!("usage: /login <user> <password>");
            };
            controller.login(user, password).await?;
        }
        "logout" => controller.logout().await?,
        "quick" => {
            let n: usize = args
                .first()
                .context("usage: /quick <1-4>")?
                .parse()
                .context("usage: /quick <1-4>")?;
            let phrase = n
                .checked_sub(1)
                .and_then(|i| QUICK_REPLIES.get(i))
                .context("no such quick reply")?;
            controller
                .dispatch(ChatCommand::QuickReply((*phrase).to_string()))
                .await?;
        }
        other => anyhow::bail!("unknown command /{other}"),
    }
    Ok(())
}

fn message_arg(args: &[&str]) -> Result<MessageId> {
    let raw = args
        .first()
        .context("missing message number")?
        .trim_start_matches('#');
    Ok(MessageId::from_raw(raw.parse().context("message number must be an integer")?))
}

/// Print view changes as they happen; streamed text is written incrementally.
async fn render(mut events: mpsc::UnboundedReceiver<ViewEvent>) {
    let mut printed: HashMap<MessageId, usize> = HashMap::new();
    let mut out = std::io::stdout();

    while let Some(event) = events.recv().await {
        match event {
            ViewEvent::MessageAppended(msg) if msg.is_streaming() => {
                print!("{} coach: ", msg.id);
                printed.insert(msg.id, 0);
            }
            ViewEvent::MessageAppended(msg) => {
                let who = match msg.role {
                    Role::User => "you",
                    Role::Assistant => "coach",
                    Role::System => "system",
                    Role::Error => "error",
                };
                println!("{} {who}: {}", msg.id, msg.content);
            }
            ViewEvent::MessageStreaming { id, content } => {
                let seen = printed.entry(id).or_insert(0);
                if let Some(delta) = content.get(*seen..) {
                    print!("{delta}");
                }
                *seen = content.len();
            }
            ViewEvent::MessageFinalized(msg) => {
                let seen = printed.remove(&msg.id).unwrap_or(0);
                if let Some(rest) = msg.content.get(seen..) {
                    print!("{rest}");
                }
                println!();
            }
            ViewEvent::MessageRemoved(id) => {
                if printed.remove(&id).is_some() {
                    println!();
                }
                println!("  ({id} withdrawn)");
            }
            ViewEvent::Toast(toast) => println!("  [{:?}] {}", toast.kind, toast.text),
            ViewEvent::CreditsChanged(credits) => println!("  credits: {credits}"),
            ViewEvent::HistoryChanged(sessions) => {
                for s in sessions {
                    println!(
                        "  {} [{}] {}",
                        s.id,
                        s.module.unwrap_or_default(),
                        s.preview.unwrap_or_default()
                    );
                }
            }
            ViewEvent::LoginPrompt(_) => println!("  use /login <user> <password>"),
            ViewEvent::QuickRepliesShown { replies, .. } => {
                let listed: Vec<String> = replies
                    .iter()
                    .enumerate()
                    .map(|(i, r)| format!("{}. {r}", i + 1))
                    .collect();
                println!("  /quick  {}", listed.join("  "));
            }
            ViewEvent::InputChanged(text) if !text.is_empty() => {
                println!("  input: {text}  (/send to resend)");
            }
            ViewEvent::ModelChanged(model) => println!("  model: {model}"),
            _ => {}
        }
        let _ = out.flush();
    }
}
