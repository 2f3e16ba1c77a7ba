use crate::consts::{
    CANCEL_DATA, CONFIRM_DATA, LONG_POLL_TIMEOUT_SECS, TELEGRAM_API_BASE, TELEGRAM_REQUEST_TIMEOUT,
};
use crate::conversation_state::{IntakeWorkflow, Reply};
use crate::error::{AppError, TELEGRAM_UNAUTHORIZED};
use crate::store::IdentityStore;
use crate::telegram_types::{
    AnswerCallbackQuery, ApiResponse, GetUpdates, InlineKeyboardButton, InlineKeyboardMarkup,
    SendMessage, Update,
};

use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, trace};

pub struct AppState {
    pub bot_token: String,
    pub http_client: reqwest::Client,
    pub store: Arc<dyn IdentityStore>,
    pub workflow: IntakeWorkflow,
}

impl AppState {
    /// POST a Bot API method and unwrap the `{ok, result}` envelope.
    async fn call_telegram<P, R>(
        &self,
        method: &'static str,
        payload: &P,
        timeout: Duration,
    ) -> Result<R, AppError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        // the token is part of the url; never log it
        let url = format!("{TELEGRAM_API_BASE}/bot{}/{method}", self.bot_token);
        let resp = self
            .http_client
            .post(url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                error!(error=%e.without_url(), method, "failed to send request to Telegram");
                AppError("Failed to send request to Telegram")
            })?;
        let status = resp.status();
        let body = resp.json::<ApiResponse<R>>().await.map_err(|e| {
            error!(error=%e.without_url(), method, %status, "failed to deserialize Telegram response");
            AppError("deserialize")
        })?;
        match body {
            ApiResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            ApiResponse {
                error_code: Some(401),
                ..
            } => Err(TELEGRAM_UNAUTHORIZED),
            ApiResponse {
                description,
                error_code,
                ..
            } => {
                error!(method, ?error_code, ?description, "Telegram returned an error");
                Err(AppError("telegram api error"))
            }
        }
    }

    pub async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, AppError> {
        let payload = GetUpdates {
            offset,
            timeout: LONG_POLL_TIMEOUT_SECS,
            allowed_updates: &["message", "callback_query"],
        };
        let timeout = Duration::from_secs(LONG_POLL_TIMEOUT_SECS) + TELEGRAM_REQUEST_TIMEOUT;
        self.call_telegram("getUpdates", &payload, timeout).await
    }

    pub async fn send_reply(&self, chat_id: i64, reply: &Reply) -> Result<(), AppError> {
        let payload = SendMessage {
            chat_id,
            text: &reply.text,
            reply_markup: reply.confirm_options.then(confirm_keyboard),
        };
        let _: serde_json::Value = self
            .call_telegram("sendMessage", &payload, TELEGRAM_REQUEST_TIMEOUT)
            .await?;
        trace!(chat_id, "sent reply");
        Ok(())
    }

    /// Stops the client's spinner on the pressed button.
    pub async fn answer_callback_query(&self, callback_query_id: &str) -> Result<(), AppError> {
        let payload = AnswerCallbackQuery { callback_query_id };
        let _: bool = self
            .call_telegram("answerCallbackQuery", &payload, TELEGRAM_REQUEST_TIMEOUT)
            .await?;
        Ok(())
    }
}

pub fn confirm_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup {
        inline_keyboard: vec![vec![
            InlineKeyboardButton {
                text: "✅ Confirm".to_string(),
                callback_data: CONFIRM_DATA.to_string(),
            },
            InlineKeyboardButton {
                text: "❌ Cancel".to_string(),
                callback_data: CANCEL_DATA.to_string(),
            },
        ]],
    }
}
