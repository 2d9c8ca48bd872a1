//! Telegram front end: rate-limited dispatcher, handlers and runtime wiring.

/// Rate-limited request dispatcher
pub mod dispatcher;
/// Command and message handlers
pub mod handlers;
/// Message formatting and delivery helpers
pub mod messaging;
/// User dialogue state
pub mod state;

pub use dispatcher::{Dispatcher, Outcome, SlidingWindow};

use crate::config::{CrewConfig, Settings};
use crate::llm::LlmClient;
use crate::pipeline::crew::TestingCrew;
use anyhow::Result;
use handlers::{BotDialogue, Command};
use state::State;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use teloxide::dispatching::dialogue::InMemStorage;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use tracing::{error, info};

/// Run the Telegram bot until shutdown.
///
/// Fails fast (before polling starts) when the bot token, an LLM key or
/// the crew documents are missing.
///
/// # Errors
///
/// Returns a startup error for missing configuration; runtime handler
/// errors are logged and swallowed per update.
pub async fn run_bot(settings: Arc<Settings>, config_dir: &Path) -> Result<()> {
    let token = settings.require_bot_token()?.to_string();
    settings.require_llm_key()?;

    let crew_config = CrewConfig::load(config_dir)?;
    let llm = LlmClient::new(&settings)?;
    info!(provider = llm.provider_name(), "LLM client initialized");

    let crew = TestingCrew::new(llm, crew_config);
    let request_dispatcher = Arc::new(Dispatcher::new(
        Arc::new(crew),
        Duration::from_secs(settings.rate_limit_window_secs),
        settings.rate_limit_max_requests,
    ));
    info!(
        limit = settings.rate_limit_max_requests,
        window_secs = settings.rate_limit_window_secs,
        "Rate limiter initialized"
    );

    let bot = Bot::new(token);
    let bot_state = InMemStorage::<State>::new();
    let handler = setup_handler();

    info!("Bot is running...");

    teloxide::dispatching::Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![
            settings,
            request_dispatcher,
            bot_state
        ])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    Update::filter_message()
        .enter_dialogue::<Message, InMemStorage<State>, State>()
        .branch(
            dptree::entry()
                .filter_command::<Command>()
                .endpoint(handle_command),
        )
        .branch(
            dptree::filter(|msg: Message| msg.document().is_some()).endpoint(handle_document),
        )
        .branch(
            dptree::filter(|msg: Message| msg.text().is_some()).endpoint(handle_code_message),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    request_dispatcher: Arc<Dispatcher>,
    settings: Arc<Settings>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => handlers::start(bot, msg).await,
        Command::Help => handlers::help(bot, msg).await,
        Command::Status => handlers::status(bot, msg, request_dispatcher, settings).await,
        Command::Test => handlers::test_mode(bot, msg, dialogue).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_code_message(
    bot: Bot,
    msg: Message,
    request_dispatcher: Arc<Dispatcher>,
    dialogue: BotDialogue,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = Box::pin(handlers::handle_code_message(
        bot,
        msg,
        request_dispatcher,
        dialogue,
    ))
    .await
    {
        error!("Code message handler error: {}", e);
    }
    respond(())
}

async fn handle_document(
    bot: Bot,
    msg: Message,
    request_dispatcher: Arc<Dispatcher>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = Box::pin(handlers::handle_document(bot, msg, request_dispatcher)).await {
        error!("Document handler error: {}", e);
    }
    respond(())
}
