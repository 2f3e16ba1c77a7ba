use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppError(pub &'static str);

/// Returned by the Bot API client when Telegram refuses the configured token.  The poller treats
/// it as fatal; every other transport error is retried on the next poll.
pub const TELEGRAM_UNAUTHORIZED: AppError = AppError("telegram rejected the bot token");

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for AppError {}

pub async fn handle_error(e: impl std::error::Error) {
    error!("ERROR: {e}")
}
