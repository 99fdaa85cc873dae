use axum::extract::{Path, Query, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::config::describe_window;
use crate::error::AppError;
use crate::extractors::Anonymous;
use crate::forms::validators::{CONFIRMATION_REQUIRED, DISABLED_ACCOUNT};
use crate::forms::{FormError, FormErrors, PasswordlessLoginForm, Submission};
use crate::handlers::NextQuery;
use crate::services::{TokenKind, TokenStatus};
use crate::session::{Flash, FlashCategory, Session};
use crate::state::AppState;
use crate::views::{self, Field, FormView};

fn send_login_page(
    state: &AppState,
    flashes: &[Flash],
    form: &PasswordlessLoginForm,
    errors: &FormErrors,
) -> Html<String> {
    views::form_page(
        "Login",
        flashes,
        FormView {
            action: &state.config.login_url,
            submit: "Send Login Link",
            fields: vec![
                Field::email(&form.email),
                Field::hidden("next", form.next.as_deref()),
            ],
            errors,
        },
    )
}

/// ログインリンク送信フォーム表示
///
/// GET /login（パスワードなしモード）
pub async fn send_login_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Query(query): Query<NextQuery>,
) -> impl IntoResponse {
    let flashes = session.take_flashes();
    let form = PasswordlessLoginForm {
        next: query.next,
        ..Default::default()
    };
    let page = send_login_page(&state, &flashes, &form, &FormErrors::new());
    (session, page)
}

/// ログインリンク送信
///
/// POST /login（パスワードなしモード）
pub async fn send_login(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Submission { form, json }: Submission<PasswordlessLoginForm>,
) -> Result<Response, AppError> {
    let user = match form.find_active(&state).await {
        Ok(user) => user,
        Err(FormError::Invalid(errors)) => {
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = send_login_page(&state, &flashes, &form, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    };

    state
        .passwordless_service()
        .send_login_instructions(&user)
        .await?;

    if json {
        return Ok(views::json_ok());
    }

    session.flash(
        FlashCategory::Success,
        format!("Instructions to login have been sent to {}.", user.email),
    );
    let flashes = session.take_flashes();
    let page = send_login_page(&state, &flashes, &form, &FormErrors::new());
    Ok((session, page).into_response())
}

/// ログインリンクでのログイン
///
/// GET /login/{token}
pub async fn token_login(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Path(token): Path<String>,
    Query(query): Query<NextQuery>,
) -> Result<Response, AppError> {
    let user = match state.tokens.verify(TokenKind::Login, &token).await? {
        TokenStatus::Valid(user) => user,
        TokenStatus::Invalid => {
            session.flash(FlashCategory::Error, "Invalid login token.");
            return Ok((session, Redirect::to(&state.config.login_url)).into_response());
        }
        TokenStatus::Expired(user) => {
            state
                .passwordless_service()
                .send_login_instructions(&user)
                .await?;
            session.flash(
                FlashCategory::Error,
                format!(
                    "You did not login within {}. New instructions to login have been sent to {}.",
                    describe_window(state.config.login_within_secs),
                    user.email
                ),
            );
            return Ok((session, Redirect::to(&state.config.login_url)).into_response());
        }
    };

    if !user.active {
        session.flash(FlashCategory::Error, DISABLED_ACCOUNT);
        return Ok((session, Redirect::to(&state.config.login_url)).into_response());
    }
    if state.config.requires_confirmation(&user) {
        session.flash(FlashCategory::Error, CONFIRMATION_REQUIRED);
        return Ok((session, Redirect::to(&state.config.login_url)).into_response());
    }

    session.login(user.id, true);
    session.flash(FlashCategory::Success, "You have successfully logged in.");
    tracing::info!(user_id = %user.id, "ログインリンクでログイン");

    let target = views::redirect_target(&state.config, query.next.as_deref(), None);
    Ok((session, Redirect::to(target)).into_response())
}
