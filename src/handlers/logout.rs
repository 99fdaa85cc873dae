use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect};

use crate::extractors::CurrentUser;
use crate::handlers::NextQuery;
use crate::session::Session;
use crate::state::AppState;
use crate::views;

/// ログアウトハンドラー
///
/// GET /logout
pub async fn logout(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<NextQuery>,
) -> impl IntoResponse {
    session.logout();
    tracing::info!(user_id = %user.id, "ログアウト");

    let target = views::safe_next(query.next.as_deref())
        .unwrap_or(state.config.post_logout_view.as_str())
        .to_string();
    (session, Redirect::to(&target))
}
