use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::config::describe_window;
use crate::error::AppError;
use crate::extractors::Anonymous;
use crate::forms::{FormError, FormErrors, SendConfirmationForm, Submission};
use crate::repositories::UnitOfWork;
use crate::services::{TokenKind, TokenStatus};
use crate::session::{Flash, FlashCategory, Session};
use crate::state::AppState;
use crate::views::{self, Field, FormView};

fn send_confirmation_page(
    state: &AppState,
    flashes: &[Flash],
    form: &SendConfirmationForm,
    errors: &FormErrors,
) -> Html<String> {
    views::form_page(
        "Resend confirmation instructions",
        flashes,
        FormView {
            action: &state.config.confirm_url,
            submit: "Resend Confirmation Instructions",
            fields: vec![Field::email(&form.email)],
            errors,
        },
    )
}

/// 確認メール再送フォーム表示
///
/// GET /confirm
pub async fn send_confirmation_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
) -> impl IntoResponse {
    let flashes = session.take_flashes();
    let page = send_confirmation_page(
        &state,
        &flashes,
        &SendConfirmationForm::default(),
        &FormErrors::new(),
    );
    (session, page)
}

/// 確認メール再送
///
/// POST /confirm
pub async fn send_confirmation(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Submission { form, json }: Submission<SendConfirmationForm>,
) -> Result<Response, AppError> {
    let user = match form.find_unconfirmed(&state).await {
        Ok(user) => user,
        Err(FormError::Invalid(errors)) => {
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = send_confirmation_page(&state, &flashes, &form, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    };

    state
        .confirmation_service()
        .send_confirmation_instructions(&user)
        .await?;

    if json {
        return Ok(views::json_ok());
    }

    session.flash(
        FlashCategory::Info,
        format!("Confirmation instructions have been sent to {}.", user.email),
    );
    let flashes = session.take_flashes();
    let page = send_confirmation_page(&state, &flashes, &form, &FormErrors::new());
    Ok((session, page).into_response())
}

/// メールアドレス確認
///
/// GET /confirm/{token}
///
/// 処理フロー:
/// 1. トークン検証（無効ならエラー表示、期限切れなら再送）
/// 2. 確認日時をコミット
/// 3. ログインして確認後のページへ
pub async fn confirm_email(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    let service = state.confirmation_service();
    let error_view = state
        .config
        .confirm_error_view
        .as_deref()
        .unwrap_or(state.config.confirm_url.as_str());

    let user = match state.tokens.verify(TokenKind::ConfirmEmail, &token).await? {
        TokenStatus::Valid(user) => user,
        TokenStatus::Invalid => {
            session.flash(FlashCategory::Error, "Invalid confirmation token.");
            return Ok((session, Redirect::to(error_view)).into_response());
        }
        TokenStatus::Expired(user) => {
            service.send_confirmation_instructions(&user).await?;
            session.flash(
                FlashCategory::Error,
                format!(
                    "You did not confirm your email within {}. New instructions to confirm your email have been sent to {}.",
                    describe_window(state.config.confirm_email_within_secs),
                    user.email
                ),
            );
            return Ok((session, Redirect::to(error_view)).into_response());
        }
    };

    let mut work = UnitOfWork::new();
    service.confirm_user(&user, &mut work);
    state.datastore.commit(work).await?;
    tracing::info!(user_id = %user.id, "メールアドレス確認完了");

    session.login(user.id, true);
    session.flash(
        FlashCategory::Success,
        "Thank you. Your email has been confirmed.",
    );

    let target = views::redirect_target(
        &state.config,
        None,
        state.config.post_confirm_view.as_deref(),
    );
    Ok((session, Redirect::to(target)).into_response())
}
