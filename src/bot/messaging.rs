//! Messaging utilities for the Telegram bot.
//!
//! Generated tests go out as an HTML `<pre><code>` block when they fit,
//! or as an attached file when they exceed the Telegram length budget.

use crate::pipeline::Language;
use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatId, InputFile, ParseMode};

/// Length budget for a single message, measured on the final HTML payload
/// (tags plus escaped code). Telegram's hard limit is 4096.
pub const TELEGRAM_MESSAGE_LIMIT: usize = 3500;

/// File name stem used when tests are delivered as a document and no
/// upload name is available.
pub const TESTS_FILE_NAME: &str = "generated_tests";

/// Document name for tests generated from an uploaded file.
#[must_use]
pub fn reply_file_name(upload_name: &str) -> String {
    format!("test_{upload_name}")
}

/// The inline HTML payload for a test result, or `None` when the escaped
/// form would not fit in one message. Escaping can grow `<`/`>`-dense code
/// well past its raw length, so the check runs on the escaped text.
fn inline_payload(tests: &str, language: Language) -> Option<String> {
    let html = format!(
        "<pre><code class=\"language-{language}\">{code}</code></pre>",
        code = html_escape::encode_text(tests)
    );
    (html.len() <= TELEGRAM_MESSAGE_LIMIT).then_some(html)
}

/// Send generated test code to a chat.
///
/// Short results are sent inline as a syntax-highlighted code block;
/// anything over [`TELEGRAM_MESSAGE_LIMIT`] is attached as a file instead,
/// since Telegram would reject or mangle it inline.
///
/// # Errors
///
/// Returns an error if sending fails.
pub async fn send_tests(bot: &Bot, chat_id: ChatId, tests: &str, language: Language) -> Result<()> {
    match inline_payload(tests, language) {
        Some(html) => {
            bot.send_message(chat_id, html)
                .parse_mode(ParseMode::Html)
                .await?;
            Ok(())
        }
        None => {
            let file_name = format!("{TESTS_FILE_NAME}.{}", language.test_file_extension());
            send_tests_as_document(bot, chat_id, tests, &file_name).await
        }
    }
}

/// Send generated test code as an attached file named `file_name`.
///
/// # Errors
///
/// Returns an error if sending fails.
pub async fn send_tests_as_document(
    bot: &Bot,
    chat_id: ChatId,
    tests: &str,
    file_name: &str,
) -> Result<()> {
    let document = InputFile::memory(tests.as_bytes().to_vec()).file_name(file_name.to_string());
    bot.send_document(chat_id, document)
        .caption("Here are your generated tests!")
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_file_name_keeps_upload_name() {
        assert_eq!(reply_file_name("calculator.py"), "test_calculator.py");
    }

    #[test]
    fn test_short_tests_go_inline() {
        let html = inline_payload("def test_add():\n    assert add(1, 2) == 3", Language::Python)
            .expect("short code fits inline");
        assert!(html.starts_with("<pre><code class=\"language-python\">"));
        assert!(html.contains("assert add(1, 2) == 3"));
    }

    #[test]
    fn test_escape_expansion_falls_back_to_document() {
        // Raw text is under the budget, but every character escapes to
        // four bytes, pushing the payload past the limit.
        let dense = "<".repeat(TELEGRAM_MESSAGE_LIMIT - 100);
        assert!(dense.len() <= TELEGRAM_MESSAGE_LIMIT);
        assert!(inline_payload(&dense, Language::Typescript).is_none());
    }
}
