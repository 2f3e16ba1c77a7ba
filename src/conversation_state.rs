use crate::consts::{CANCEL_DATA, CONFIRM_DATA, MAX_NAME_CHARS};
use crate::db_types::{activity, NewIdentity};
use crate::store::IdentityStore;
use crate::utils::{parse_email, parse_name, parse_phone};

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

/// Where an actor is in the intake conversation.  `End` is not represented: a finished
/// conversation is simply removed from the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingName,
    AwaitingPhone,
    AwaitingEmail,
    AwaitingConfirmation,
}

/// Answers collected so far.  Never persisted until confirmed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Draft {
    pub actor_id: i64,
    pub username: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl Draft {
    fn new(actor_id: i64, username: Option<String>) -> Self {
        Self {
            actor_id,
            username,
            ..Default::default()
        }
    }

    fn complete(&self) -> Option<NewIdentity> {
        Some(NewIdentity {
            user_id: self.actor_id,
            telegram_username: self.username.clone(),
            full_name: self.name.clone()?,
            phone_number: self.phone.clone()?,
            email: self.email.clone()?,
        })
    }

    fn summary(&self) -> String {
        format!(
            "Name: {}\nPhone: {}\nEmail: {}",
            self.name.as_deref().unwrap_or_default(),
            self.phone.as_deref().unwrap_or_default(),
            self.email.as_deref().unwrap_or_default(),
        )
    }
}

#[derive(Debug, Clone)]
struct Conversation {
    stage: Stage,
    draft: Draft,
}

/// How the conversation was entered.  `Register` skips the "already registered" check so an
/// existing record can be overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entry {
    Start,
    Register,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Accept,
    Cancel,
}

impl Confirmation {
    pub fn from_callback_data(data: &str) -> Option<Self> {
        match data {
            CONFIRM_DATA => Some(Confirmation::Accept),
            CANCEL_DATA => Some(Confirmation::Cancel),
            _ => None,
        }
    }
}

/// One outbound message.  `confirm_options` asks the transport to attach the confirm/cancel
/// buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub confirm_options: bool,
}

impl Reply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confirm_options: false,
        }
    }

    fn with_confirm_options(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confirm_options: true,
        }
    }
}

pub mod notices {
    pub const ALREADY_REGISTERED: &str =
        "You are already registered. Send /register to update your details.";
    pub const ASK_NAME: &str = "Please enter your full name:";
    pub const NAME_TOO_SHORT: &str =
        "That name is too short. Please enter your full name (at least 5 characters):";
    pub const NAME_TOO_LONG: &str =
        "That name is too long. Please enter your full name (at most 200 characters):";
    pub const ASK_PHONE: &str = "Please enter your phone number:";
    pub const PHONE_INVALID: &str =
        "That phone number does not look right. Please enter a number with at least 8 digits:";
    pub const ASK_EMAIL: &str = "Please enter your email address:";
    pub const EMAIL_INVALID: &str =
        "That email address does not look right. Please enter an address like name@example.com:";
    pub const CONFIRM_HEADER: &str = "Please confirm your details:";
    pub const USE_BUTTONS: &str = "Please use the buttons below to confirm or cancel.";
    pub const REGISTERED: &str = "Registration complete!";
    pub const SAVE_FAILED: &str =
        "Sorry, we could not save your registration. Please try again later with /start.";
    pub const CANCELLED: &str = "Registration cancelled. Send /start to begin again.";
    pub const NOTHING_TO_CANCEL: &str = "There is no registration in progress.";
    pub const EXPIRED: &str = "This registration is no longer active. Send /start to begin again.";
    pub const UNAVAILABLE: &str = "Sorry, something went wrong. Please try again later.";
}

/// Drives each actor through name, phone, email and confirmation.  Drafts are keyed by actor id;
/// the map lock is never held across a store call.
pub struct IntakeWorkflow {
    store: Arc<dyn IdentityStore>,
    phone_country_code: String,
    conversations: Mutex<HashMap<i64, Conversation>>,
}

impl IntakeWorkflow {
    pub fn new(store: Arc<dyn IdentityStore>, phone_country_code: impl Into<String>) -> Self {
        Self {
            store,
            phone_country_code: phone_country_code.into(),
            conversations: Mutex::new(HashMap::new()),
        }
    }

    fn conversations(&self) -> MutexGuard<'_, HashMap<i64, Conversation>> {
        self.conversations
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn active_conversations(&self) -> usize {
        self.conversations().len()
    }

    pub async fn start(&self, actor_id: i64, username: Option<String>, entry: Entry) -> Reply {
        if entry == Entry::Start {
            match self.store.exists(actor_id).await {
                Ok(true) => {
                    debug!(actor_id, "actor already registered");
                    return Reply::text(notices::ALREADY_REGISTERED);
                }
                Ok(false) => (),
                Err(e) => {
                    warn!(error=%e, actor_id, "could not check registration");
                    return Reply::text(notices::UNAVAILABLE);
                }
            }
        }

        let conversation = Conversation {
            stage: Stage::AwaitingName,
            draft: Draft::new(actor_id, username),
        };
        if self
            .conversations()
            .insert(actor_id, conversation)
            .is_some()
        {
            debug!(actor_id, "replaced in-flight draft");
        }
        info!(actor_id, ?entry, "registration started");
        Reply::text(notices::ASK_NAME)
    }

    /// `None` when the actor has no conversation in progress.
    pub fn handle_text(&self, actor_id: i64, text: &str) -> Option<Reply> {
        let mut conversations = self.conversations();
        let conversation = conversations.get_mut(&actor_id)?;
        let reply = match conversation.stage {
            Stage::AwaitingName => match parse_name(text) {
                Some(name) => {
                    conversation.draft.name = Some(name);
                    conversation.stage = Stage::AwaitingPhone;
                    Reply::text(notices::ASK_PHONE)
                }
                None if text.trim().chars().count() > MAX_NAME_CHARS => {
                    Reply::text(notices::NAME_TOO_LONG)
                }
                None => Reply::text(notices::NAME_TOO_SHORT),
            },
            Stage::AwaitingPhone => match parse_phone(text, &self.phone_country_code) {
                Some(phone) => {
                    conversation.draft.phone = Some(phone);
                    conversation.stage = Stage::AwaitingEmail;
                    Reply::text(notices::ASK_EMAIL)
                }
                None => Reply::text(notices::PHONE_INVALID),
            },
            Stage::AwaitingEmail => match parse_email(text) {
                Some(email) => {
                    conversation.draft.email = Some(email);
                    conversation.stage = Stage::AwaitingConfirmation;
                    Reply::with_confirm_options(format!(
                        "{}\n\n{}",
                        notices::CONFIRM_HEADER,
                        conversation.draft.summary()
                    ))
                }
                None => Reply::text(notices::EMAIL_INVALID),
            },
            Stage::AwaitingConfirmation => Reply::with_confirm_options(format!(
                "{}\n\n{}",
                notices::USE_BUTTONS,
                conversation.draft.summary()
            )),
        };
        debug!(actor_id, stage=?conversation.stage, "handled answer");
        Some(reply)
    }

    pub async fn confirm(&self, actor_id: i64, confirmation: Confirmation) -> Reply {
        let draft = {
            let mut conversations = self.conversations();
            let awaiting = conversations.get(&actor_id).map(|c| c.stage)
                == Some(Stage::AwaitingConfirmation);
            if awaiting {
                conversations.remove(&actor_id).map(|c| c.draft)
            } else {
                None
            }
        };
        let Some(draft) = draft else {
            return Reply::text(notices::EXPIRED);
        };

        match confirmation {
            Confirmation::Cancel => {
                info!(actor_id, "registration cancelled at confirmation");
                Reply::text(notices::CANCELLED)
            }
            Confirmation::Accept => self.commit(draft).await,
        }
    }

    async fn commit(&self, draft: Draft) -> Reply {
        let Some(identity) = draft.complete() else {
            warn!(actor_id = draft.actor_id, "confirmation reached with incomplete draft");
            return Reply::text(notices::UNAVAILABLE);
        };
        match self.store.upsert(&identity).await {
            Ok(id) => {
                info!(id, actor_id = identity.user_id, "registration saved");
                if let Err(e) = self
                    .store
                    .log_activity(
                        identity.user_id,
                        activity::REGISTRATION,
                        Some("registered via intake conversation"),
                    )
                    .await
                {
                    warn!(error=%e, actor_id = identity.user_id, "failed to log activity");
                }
                Reply::text(format!("{}\n\n{}", notices::REGISTERED, draft.summary()))
            }
            Err(e) => {
                warn!(error=%e, actor_id = identity.user_id, "registration not saved");
                Reply::text(notices::SAVE_FAILED)
            }
        }
    }

    pub fn cancel(&self, actor_id: i64) -> Reply {
        match self.conversations().remove(&actor_id) {
            Some(conversation) => {
                info!(actor_id, stage=?conversation.stage, "registration cancelled");
                Reply::text(notices::CANCELLED)
            }
            None => Reply::text(notices::NOTHING_TO_CANCEL),
        }
    }

    #[cfg(test)]
    fn snapshot(&self, actor_id: i64) -> Option<(Stage, Draft)> {
        self.conversations()
            .get(&actor_id)
            .map(|c| (c.stage, c.draft.clone()))
    }
}
