//! アクセス制御用の extractor

use axum::extract::FromRequestParts;
use axum::response::{IntoResponse, Redirect, Response};
use http::request::Parts;

use crate::error::AppError;
use crate::models::User;
use crate::services::{TokenKind, TokenStatus};
use crate::session::{FlashCategory, Session};
use crate::state::AppState;
use crate::views;

pub const AUTH_TOKEN_HEADER: &str = "Authentication-Token";
pub const LOGIN_REQUIRED: &str = "Please log in to access this page.";

/// ログイン状態として扱えるユーザーか（無効化・未確認は不可）
fn may_authenticate(state: &AppState, user: &User) -> bool {
    user.active && !state.config.requires_confirmation(user)
}

/// セッションのユーザーを取得（無効化・未確認のユーザーは匿名扱い）
pub async fn session_user(state: &AppState, session: &Session) -> Result<Option<User>, AppError> {
    let Some(user_id) = session.user_id() else {
        return Ok(None);
    };
    let user = state.datastore.find_user_by_id(user_id).await?;
    Ok(user.filter(|u| may_authenticate(state, u)))
}

/// Authentication-Token ヘッダーのユーザーを取得
async fn token_user(state: &AppState, parts: &Parts) -> Result<Option<User>, AppError> {
    let Some(token) = parts
        .headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
    else {
        return Ok(None);
    };

    match state.tokens.verify(TokenKind::Authentication, token).await? {
        TokenStatus::Valid(user) if may_authenticate(state, &user) => Ok(Some(user)),
        _ => Ok(None),
    }
}

/// ログイン必須
///
/// 未ログインならフラッシュを付けてログインページへリダイレクトする。
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(mut session) = Session::from_request_parts(parts, state).await;

        let user = match session_user(state, &session).await {
            Ok(Some(user)) => Some(user),
            Ok(None) => token_user(state, parts)
                .await
                .map_err(IntoResponse::into_response)?,
            Err(e) => return Err(e.into_response()),
        };

        if let Some(user) = user {
            return Ok(Self(user));
        }

        let next = parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        tracing::debug!(path = %next, "未ログインのためリダイレクト");

        session.flash(FlashCategory::Info, LOGIN_REQUIRED);
        let target = views::login_redirect_url(&state.config, next);
        Err((session, Redirect::to(&target)).into_response())
    }
}

/// 未ログイン必須
///
/// ログイン済みならログイン後のページへリダイレクトする。
#[derive(Debug, Clone, Copy)]
pub struct Anonymous;

impl FromRequestParts<AppState> for Anonymous {
    type Rejection = Response;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Ok(session) = Session::from_request_parts(parts, state).await;

        match session_user(state, &session).await {
            Ok(None) => Ok(Self),
            Ok(Some(_)) => Err(Redirect::to(&state.config.post_login_view).into_response()),
            Err(e) => Err(e.into_response()),
        }
    }
}
