use axum::extract::State;
use axum::response::IntoResponse;

use crate::error::AppError;
use crate::extractors::{CurrentUser, session_user};
use crate::session::Session;
use crate::state::AppState;
use crate::views;

/// トップページ
///
/// GET /
pub async fn home(
    State(state): State<AppState>,
    mut session: Session,
) -> Result<impl IntoResponse, AppError> {
    let message = match session_user(&state, &session).await? {
        Some(user) => format!("Logged in as {}.", user.email),
        None => "Welcome. Please log in or register.".to_string(),
    };

    let flashes = session.take_flashes();
    let page = views::message_page("Home", &flashes, &message);
    Ok((session, page))
}

/// ログイン必須ページ
///
/// GET /secrets
pub async fn secrets(CurrentUser(user): CurrentUser) -> &'static str {
    tracing::debug!(user_id = %user.id, "secrets へのアクセス");
    "Authorization successful"
}
