use axum::extract::{Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::error::AppError;
use crate::extractors::Anonymous;
use crate::forms::{FormError, FormErrors, LoginForm, Submission};
use crate::handlers::NextQuery;
use crate::services::TokenKind;
use crate::session::{Flash, Session};
use crate::state::AppState;
use crate::views::{self, Field, FormView};

fn login_page(state: &AppState, flashes: &[Flash], form: &LoginForm, errors: &FormErrors) -> Html<String> {
    views::form_page(
        "Login",
        flashes,
        FormView {
            action: &state.config.login_url,
            submit: "Login",
            fields: vec![
                Field::email(&form.email),
                Field::password("password", "Password"),
                Field::checkbox("remember", "Remember Me"),
                Field::hidden("next", form.next.as_deref()),
            ],
            errors,
        },
    )
}

/// ログインフォーム表示
///
/// GET /login
pub async fn login_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<NextQuery>,
) -> impl IntoResponse {
    let flashes = session.take_flashes();
    let form = LoginForm {
        next: query.next,
        ..Default::default()
    };
    let page = login_page(&state, &flashes, &form, &FormErrors::new());
    (session, page)
}

/// ログインハンドラー
///
/// POST /login
///
/// 処理フロー:
/// 1. フォームバリデーション（形式 → ユーザー照合）
/// 2. セッションにユーザーを記録（remember なら永続Cookie）
/// 3. JSON なら認証トークン、フォームなら next へリダイレクト
pub async fn login(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Submission { form, json }: Submission<LoginForm>,
) -> Result<Response, AppError> {
    let user = match form.authenticate(&state).await {
        Ok(user) => user,
        Err(FormError::Invalid(errors)) => {
            tracing::info!("ログイン失敗（入力エラー）");
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = login_page(&state, &flashes, &form, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    };

    session.login(user.id, form.remember);
    tracing::info!(user_id = %user.id, remember = form.remember, "ログイン成功");

    if json {
        let token = state.tokens.issue(TokenKind::Authentication, &user)?;
        return Ok((session, views::json_user(&user, &token)).into_response());
    }

    let target = views::redirect_target(&state.config, form.next.as_deref(), None);
    Ok((session, Redirect::to(target)).into_response())
}
