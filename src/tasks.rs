use crate::consts::{HELP_TEXT, POLL_ERROR_DELAY};
use crate::conversation_state::{notices, Confirmation, Entry, Reply};
use crate::error::{handle_error, AppError, TELEGRAM_UNAUTHORIZED};
use crate::telegram_types::{BotCommand, Inbound};
use crate::types::AppState;

use futures_util::future::{join_all, FutureExt};
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

/// Task that long-polls Telegram for updates and hands them to the intake workflow.  Only returns
/// when Telegram rejects the bot token.
pub async fn poll_updates(app_state: Arc<AppState>) -> Result<(), AppError> {
    let mut offset = 0;
    info!("polling Telegram for updates");
    loop {
        let updates = match app_state.get_updates(offset).await {
            Ok(updates) => updates,
            Err(e) if e == TELEGRAM_UNAUTHORIZED => break Err(e),
            Err(e) => {
                handle_error(e).await;
                sleep(POLL_ERROR_DELAY).await;
                continue;
            }
        };
        if let Some(last) = updates.last() {
            offset = last.update_id + 1;
        }
        debug!(count = updates.len(), offset, "got updates");

        // Actors are independent of each other, but one actor's messages must be seen in order.
        let mut by_actor: HashMap<i64, Vec<Inbound>> = HashMap::new();
        for inbound in updates.into_iter().filter_map(|u| u.into_inbound()) {
            by_actor.entry(inbound.actor_id()).or_default().push(inbound);
        }
        let handles = by_actor.into_values().map(|events| {
            let app_state = app_state.clone();
            tokio::spawn(async move {
                for inbound in events {
                    let (chat_id, actor_id) = (inbound.chat_id(), inbound.actor_id());
                    if panicked(handle_inbound(&app_state, inbound)).await {
                        error!(actor_id, "update handler panicked");
                        let reply = Reply::text(notices::UNAVAILABLE);
                        if let Err(e) = app_state.send_reply(chat_id, &reply).await {
                            warn!(error=%e, actor_id, "failed to deliver reply");
                        }
                    }
                }
            })
        });
        for res in join_all(handles).await {
            if let Err(e) = res {
                error!(error=%e, "update handler task failed");
            }
        }
    }
}

/// Drive `handler` to completion, reporting whether it panicked instead of unwinding further.
async fn panicked<F: Future<Output = ()>>(handler: F) -> bool {
    AssertUnwindSafe(handler).catch_unwind().await.is_err()
}

/// Route one inbound event through the workflow and deliver the reply.  Never fails: anything
/// that goes wrong is logged here.
pub async fn handle_inbound(app_state: &AppState, inbound: Inbound) {
    let chat_id = inbound.chat_id();
    let actor_id = inbound.actor_id();
    let reply = match dispatch(app_state, inbound).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return,
        Err(e) => {
            warn!(error=%e, actor_id, "failed to handle update");
            Reply::text(notices::UNAVAILABLE)
        }
    };
    if let Err(e) = app_state.send_reply(chat_id, &reply).await {
        warn!(error=%e, actor_id, "failed to deliver reply");
    }
}

async fn dispatch(app_state: &AppState, inbound: Inbound) -> Result<Option<Reply>, AppError> {
    let workflow = &app_state.workflow;
    let reply = match inbound {
        Inbound::Command {
            actor_id,
            username,
            command,
            ..
        } => match command {
            BotCommand::Start => Some(workflow.start(actor_id, username, Entry::Start).await),
            BotCommand::Register => {
                Some(workflow.start(actor_id, username, Entry::Register).await)
            }
            BotCommand::Cancel => Some(workflow.cancel(actor_id)),
            BotCommand::Help => Some(Reply::text(HELP_TEXT)),
            BotCommand::Unknown(name) => {
                debug!(actor_id, command=%name, "unknown command");
                Some(Reply::text(HELP_TEXT))
            }
        },
        Inbound::Text { actor_id, text, .. } => workflow.handle_text(actor_id, &text),
        Inbound::Callback {
            callback_query_id,
            actor_id,
            data,
            ..
        } => {
            if let Err(e) = app_state.answer_callback_query(&callback_query_id).await {
                debug!(error=%e, "failed to answer callback query");
            }
            match Confirmation::from_callback_data(&data) {
                Some(confirmation) => Some(workflow.confirm(actor_id, confirmation).await),
                None => {
                    warn!(actor_id, data=%data, "unexpected callback data");
                    return Err(AppError("unexpected callback data"));
                }
            }
        }
    };
    Ok(reply)
}
