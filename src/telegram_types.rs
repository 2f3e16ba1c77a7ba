mod api {
    use serde::{Deserialize, Serialize};

    /// Envelope around every Bot API response.
    #[derive(Deserialize, Debug)]
    pub struct ApiResponse<T> {
        pub ok: bool,
        pub result: Option<T>,
        pub description: Option<String>,
        pub error_code: Option<u16>,
    }

    #[derive(Serialize, Debug)]
    pub struct GetUpdates {
        pub offset: i64,
        pub timeout: u64,
        pub allowed_updates: &'static [&'static str],
    }

    #[derive(Serialize, Debug)]
    pub struct SendMessage<'a> {
        pub chat_id: i64,
        pub text: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        pub reply_markup: Option<InlineKeyboardMarkup>,
    }

    #[derive(Serialize, Debug)]
    pub struct AnswerCallbackQuery<'a> {
        pub callback_query_id: &'a str,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    pub struct InlineKeyboardMarkup {
        pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
    }

    #[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
    pub struct InlineKeyboardButton {
        pub text: String,
        pub callback_data: String,
    }
}
pub use api::*;

mod updates {
    use serde::Deserialize;

    #[derive(Deserialize, Debug, Clone)]
    pub struct Update {
        pub update_id: i64,
        pub message: Option<Message>,
        pub callback_query: Option<CallbackQuery>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, Debug, Clone)]
    pub struct Message {
        pub message_id: i64,
        pub from: Option<User>,
        pub chat: Chat,
        pub text: Option<String>,
    }

    #[allow(dead_code)]
    #[derive(Deserialize, Debug, Clone)]
    pub struct User {
        pub id: i64,
        #[serde(default)]
        pub is_bot: bool,
        pub first_name: String,
        pub username: Option<String>,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct Chat {
        pub id: i64,
    }

    #[derive(Deserialize, Debug, Clone)]
    pub struct CallbackQuery {
        pub id: String,
        pub from: User,
        pub message: Option<Message>,
        pub data: Option<String>,
    }
}
pub use updates::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotCommand {
    Start,
    Register,
    Cancel,
    Help,
    Unknown(String),
}

impl BotCommand {
    /// Parse `/name[@bot] [args]`.  Anything not starting with `/` is not a command.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?.strip_prefix('/')?;
        let name = word.split('@').next().unwrap_or_default().to_lowercase();
        let command = match name.as_str() {
            "start" => BotCommand::Start,
            "register" => BotCommand::Register,
            "cancel" => BotCommand::Cancel,
            "help" => BotCommand::Help,
            _ => BotCommand::Unknown(name),
        };
        Some(command)
    }
}

/// What an update means to the bot, stripped of the Bot API's shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    Command {
        actor_id: i64,
        chat_id: i64,
        username: Option<String>,
        command: BotCommand,
    },
    Text {
        actor_id: i64,
        chat_id: i64,
        text: String,
    },
    Callback {
        callback_query_id: String,
        actor_id: i64,
        chat_id: i64,
        data: String,
    },
}

impl Inbound {
    pub fn actor_id(&self) -> i64 {
        match self {
            Inbound::Command { actor_id, .. }
            | Inbound::Text { actor_id, .. }
            | Inbound::Callback { actor_id, .. } => *actor_id,
        }
    }

    pub fn chat_id(&self) -> i64 {
        match self {
            Inbound::Command { chat_id, .. }
            | Inbound::Text { chat_id, .. }
            | Inbound::Callback { chat_id, .. } => *chat_id,
        }
    }
}

impl Update {
    /// `None` for anything the bot does not react to: non-text messages, messages from bots,
    /// channel posts and other update kinds.
    pub fn into_inbound(self) -> Option<Inbound> {
        if let Some(callback) = self.callback_query {
            if callback.from.is_bot {
                return None;
            }
            let chat_id = callback
                .message
                .as_ref()
                .map(|m| m.chat.id)
                .unwrap_or(callback.from.id);
            return Some(Inbound::Callback {
                callback_query_id: callback.id,
                actor_id: callback.from.id,
                chat_id,
                data: callback.data.unwrap_or_default(),
            });
        }

        let message = self.message?;
        let from = message.from.filter(|u| !u.is_bot)?;
        let text = message.text?;
        match BotCommand::parse(&text) {
            Some(command) => Some(Inbound::Command {
                actor_id: from.id,
                chat_id: message.chat.id,
                username: from.username,
                command,
            }),
            None => Some(Inbound::Text {
                actor_id: from.id,
                chat_id: message.chat.id,
                text,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(json: &str) -> Update {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn commands_accept_bot_suffix_and_arguments() {
        assert_eq!(BotCommand::parse("/start"), Some(BotCommand::Start));
        assert_eq!(BotCommand::parse(" /Register@intake_bot now"), Some(BotCommand::Register));
        assert_eq!(BotCommand::parse("/cancel"), Some(BotCommand::Cancel));
        assert_eq!(
            BotCommand::parse("/stats"),
            Some(BotCommand::Unknown("stats".to_string()))
        );
        assert_eq!(BotCommand::parse("Ahmad Khaled"), None);
        assert_eq!(BotCommand::parse(""), None);
    }

    #[test]
    fn text_message_becomes_text_or_command() {
        let inbound = update(
            r#"{"update_id": 10, "message": {"message_id": 1,
                "from": {"id": 42, "is_bot": false, "first_name": "Ahmad", "username": "ahmad"},
                "chat": {"id": 42, "type": "private"}, "date": 0, "text": "/start"}}"#,
        )
        .into_inbound();
        assert_eq!(
            inbound,
            Some(Inbound::Command {
                actor_id: 42,
                chat_id: 42,
                username: Some("ahmad".to_string()),
                command: BotCommand::Start,
            })
        );

        let inbound = update(
            r#"{"update_id": 11, "message": {"message_id": 2,
                "from": {"id": 42, "is_bot": false, "first_name": "Ahmad"},
                "chat": {"id": 42, "type": "private"}, "date": 0, "text": "Ahmad Khaled Omar"}}"#,
        )
        .into_inbound();
        assert_eq!(
            inbound,
            Some(Inbound::Text {
                actor_id: 42,
                chat_id: 42,
                text: "Ahmad Khaled Omar".to_string(),
            })
        );
    }

    #[test]
    fn callback_query_carries_its_id_and_data() {
        let inbound = update(
            r#"{"update_id": 12, "callback_query": {"id": "cb-1",
                "from": {"id": 42, "is_bot": false, "first_name": "Ahmad"},
                "message": {"message_id": 3, "chat": {"id": 77, "type": "private"}, "date": 0},
                "chat_instance": "x", "data": "confirm"}}"#,
        )
        .into_inbound()
        .unwrap();
        assert_eq!(inbound.actor_id(), 42);
        assert_eq!(inbound.chat_id(), 77);
        assert!(matches!(
            inbound,
            Inbound::Callback { ref callback_query_id, ref data, .. }
                if callback_query_id == "cb-1" && data == "confirm"
        ));
    }

    #[test]
    fn non_text_and_bot_messages_are_ignored() {
        let photo = update(
            r#"{"update_id": 13, "message": {"message_id": 4,
                "from": {"id": 42, "is_bot": false, "first_name": "Ahmad"},
                "chat": {"id": 42, "type": "private"}, "date": 0, "photo": []}}"#,
        );
        assert_eq!(photo.into_inbound(), None);

        let bot = update(
            r#"{"update_id": 14, "message": {"message_id": 5,
                "from": {"id": 7, "is_bot": true, "first_name": "Other"},
                "chat": {"id": 42, "type": "private"}, "date": 0, "text": "/start"}}"#,
        );
        assert_eq!(bot.into_inbound(), None);

        let edited = update(r#"{"update_id": 15, "edited_message": {}}"#);
        assert_eq!(edited.into_inbound(), None);
    }

    #[test]
    fn send_message_omits_absent_keyboard() {
        let json = serde_json::to_value(SendMessage {
            chat_id: 42,
            text: "hi",
            reply_markup: None,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"chat_id": 42, "text": "hi"}));
    }
}
