//! Command and message handlers for the Telegram bot.

use super::dispatcher::{Dispatcher, Outcome};
use super::messaging::{reply_file_name, send_tests, send_tests_as_document};
use super::state::State;
use crate::config::Settings;
use crate::pipeline::{Language, PipelineError};
use crate::utils::{extract_code, looks_like_code};
use anyhow::{anyhow, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::dialogue::InMemStorage,
    net::Download,
    prelude::*,
    utils::command::BotCommands,
};
use tracing::{info, warn};

/// Dialogue handle shared by the message handlers
pub type BotDialogue = Dialogue<State, InMemStorage<State>>;

/// Supported commands for the bot
#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase", description = "Supported commands:")]
pub enum Command {
    /// Show the welcome message
    #[command(description = "Start the bot.")]
    Start,
    /// Show detailed usage help
    #[command(description = "Detailed help and examples.")]
    Help,
    /// Show provider and rate-limit status
    #[command(description = "Check bot and API status.")]
    Status,
    /// Enter test-generation mode
    #[command(description = "Start test generation mode.")]
    Test,
}

/// Safe extraction of user ID from a message.
/// Returns 0 if the user information is missing.
#[must_use]
pub fn get_user_id_safe(msg: &Message) -> i64 {
    msg.from.as_ref().map_or(0, |u| u.id.0.cast_signed())
}

fn welcome_text() -> String {
    "*Testsmith* — AI-powered test generation\n\n\
     Send me source code and I'll generate tests for it.\n\n\
     *Commands:*\n\
     /start — show this welcome message\n\
     /help — detailed help and examples\n\
     /status — check bot and API status\n\
     /test — start test generation mode\n\n\
     *Quick start:* just send any code and I'll analyze it and write tests."
        .to_string()
}

fn help_text() -> String {
    "*How to use Testsmith*\n\n\
     *Method 1: direct code* — paste code straight into a message.\n\n\
     *Method 2: code block* — wrap it in markdown fences for better formatting.\n\n\
     *Method 3: file upload* — send a .py file and I'll generate tests for it.\n\n\
     *What you get:*\n\
     - unit tests (pytest by default)\n\
     - edge case coverage\n\
     - error handling tests\n\n\
     *Rate limits:* 5 requests per minute. Complex code may take 1-2 minutes."
        .to_string()
}

/// Handle /start
///
/// # Errors
///
/// Returns an error if sending the reply fails.
pub async fn start(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, welcome_text())
        .parse_mode(teloxide::types::ParseMode::Markdown)
        .await?;
    Ok(())
}

/// Handle /help
///
/// # Errors
///
/// Returns an error if sending the reply fails.
pub async fn help(bot: Bot, msg: Message) -> Result<()> {
    bot.send_message(msg.chat.id, help_text())
        .parse_mode(teloxide::types::ParseMode::Markdown)
        .await?;
    Ok(())
}

/// Label for the active LLM provider, in configuration priority order.
#[must_use]
pub fn provider_label(settings: &Settings) -> &'static str {
    if settings.openrouter_api_key.is_some() {
        "OpenRouter"
    } else if settings.groq_api_key.is_some() {
        "Groq"
    } else if settings.openai_api_key.is_some() {
        "OpenAI"
    } else {
        "Not configured"
    }
}

/// Handle /status
///
/// # Errors
///
/// Returns an error if sending the reply fails.
pub async fn status(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<Dispatcher>,
    settings: Arc<Settings>,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let used = dispatcher.used(user_id).await;
    let limit = dispatcher.limit().await;

    let text = format!(
        "System status\n\n\
         LLM provider: {provider}\n\
         Bot: online\n\n\
         Your requests this minute: {used}/{limit}",
        provider = provider_label(&settings),
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

/// Handle /test: switch the dialogue into code-awaiting mode
///
/// # Errors
///
/// Returns an error if the dialogue update or the reply fails.
pub async fn test_mode(bot: Bot, msg: Message, dialogue: BotDialogue) -> Result<()> {
    dialogue
        .update(State::AwaitingCode)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    bot.send_message(
        msg.chat.id,
        "Test generation mode. Send me your code (plain or in a markdown block), \
         or upload a .py file.",
    )
    .await?;
    Ok(())
}

/// Handle an inbound text message as a code submission.
///
/// # Errors
///
/// Returns an error if a Telegram call or dialogue update fails.
pub async fn handle_code_message(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<Dispatcher>,
    dialogue: BotDialogue,
) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let text = msg.text().unwrap_or_default();

    // Reject chatter before it consumes a rate-limit slot.
    if !looks_like_code(text) {
        bot.send_message(
            msg.chat.id,
            "This doesn't look like code. Send me source code, a markdown code block, \
             or a .py file.",
        )
        .await?;
        return Ok(());
    }

    let code = extract_code(text);
    if code.is_empty() {
        bot.send_message(msg.chat.id, "I couldn't find any code in your message.")
            .await?;
        return Ok(());
    }

    info!(user_id, code_chars = code.len(), "Code submission received");

    let status_msg = bot
        .send_message(
            msg.chat.id,
            "Processing your code...\n\nThis may take 1-2 minutes for complex code.",
        )
        .await?;

    let outcome = dispatcher.submit(user_id, code).await;
    deliver_outcome(&bot, &msg, status_msg.id, outcome, None).await?;

    dialogue
        .update(State::Start)
        .await
        .map_err(|e| anyhow!(e.to_string()))?;
    Ok(())
}

/// Handle an uploaded source file.
///
/// # Errors
///
/// Returns an error if downloading the file or a Telegram call fails.
pub async fn handle_document(bot: Bot, msg: Message, dispatcher: Arc<Dispatcher>) -> Result<()> {
    let user_id = get_user_id_safe(&msg);
    let Some(document) = msg.document() else {
        return Ok(());
    };

    let file_name = document
        .file_name
        .clone()
        .unwrap_or_else(|| "upload".to_string());
    if !file_name.ends_with(".py") {
        bot.send_message(msg.chat.id, "Please upload a Python file (.py extension).")
            .await?;
        return Ok(());
    }

    let file = bot.get_file(document.file.id.clone()).await?;
    let mut buf: Vec<u8> = Vec::new();
    bot.download_file(&file.path, &mut buf).await?;
    let code = String::from_utf8_lossy(&buf).to_string();

    info!(user_id, file = %file_name, code_chars = code.len(), "File submission received");

    let status_msg = bot
        .send_message(
            msg.chat.id,
            format!("Processing {file_name}...\n\nThis may take 1-2 minutes for complex code."),
        )
        .await?;

    let outcome = dispatcher.submit(user_id, code).await;
    // File uploads always get a file back, named after the upload.
    let document_name = reply_file_name(&file_name);
    deliver_outcome(&bot, &msg, status_msg.id, outcome, Some(document_name)).await?;
    Ok(())
}

async fn deliver_outcome(
    bot: &Bot,
    msg: &Message,
    status_msg_id: teloxide::types::MessageId,
    outcome: Outcome,
    document_name: Option<String>,
) -> Result<()> {
    match outcome {
        Outcome::Completed { tests } => {
            bot.edit_message_text(msg.chat.id, status_msg_id, "Tests generated successfully!")
                .await?;
            if let Some(name) = document_name {
                send_tests_as_document(bot, msg.chat.id, &tests, &name).await?;
            } else {
                send_tests(bot, msg.chat.id, &tests, Language::Python).await?;
            }
        }
        Outcome::RateLimited { retry_after } => {
            bot.edit_message_text(
                msg.chat.id,
                status_msg_id,
                format!(
                    "Rate limit reached. Please wait {} seconds.",
                    retry_after.as_secs()
                ),
            )
            .await?;
        }
        Outcome::Failed(error) => {
            warn!(error = %error, "Delivering pipeline failure to user");
            let detail = match error {
                PipelineError::EmptyResult => {
                    "the model returned no usable test code. Try again or simplify the input."
                        .to_string()
                }
                other => format!("{other}"),
            };
            bot.edit_message_text(
                msg.chat.id,
                status_msg_id,
                format!("Sorry, I couldn't generate tests: {detail}"),
            )
            .await?;
        }
    }
    Ok(())
}
