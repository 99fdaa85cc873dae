use axum::extract::{Path, State};
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::config::describe_window;
use crate::error::AppError;
use crate::extractors::Anonymous;
use crate::forms::{FormError, FormErrors, ForgotPasswordForm, ResetPasswordForm, Submission};
use crate::models::User;
use crate::repositories::UnitOfWork;
use crate::services::{TokenKind, TokenStatus};
use crate::session::{Flash, FlashCategory, Session};
use crate::state::AppState;
use crate::views::{self, Field, FormView};

fn forgot_password_page(
    state: &AppState,
    flashes: &[Flash],
    form: &ForgotPasswordForm,
    errors: &FormErrors,
) -> Html<String> {
    views::form_page(
        "Send password reset instructions",
        flashes,
        FormView {
            action: &state.config.reset_url,
            submit: "Recover Password",
            fields: vec![Field::email(&form.email)],
            errors,
        },
    )
}

fn reset_password_page(
    state: &AppState,
    flashes: &[Flash],
    token: &str,
    errors: &FormErrors,
) -> Html<String> {
    let action = format!("{}/{}", state.config.reset_url, token);
    views::form_page(
        "Reset password",
        flashes,
        FormView {
            action: &action,
            submit: "Reset Password",
            fields: vec![
                Field::password("password", "Password"),
                Field::password("password_confirm", "Retype Password"),
            ],
            errors,
        },
    )
}

/// パスワード再設定申請フォーム表示
///
/// GET /reset
pub async fn forgot_password_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
) -> impl IntoResponse {
    let flashes = session.take_flashes();
    let page = forgot_password_page(
        &state,
        &flashes,
        &ForgotPasswordForm::default(),
        &FormErrors::new(),
    );
    (session, page)
}

/// パスワード再設定申請
///
/// POST /reset
pub async fn forgot_password(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Submission { form, json }: Submission<ForgotPasswordForm>,
) -> Result<Response, AppError> {
    let user = match form.find_user(&state).await {
        Ok(user) => user,
        Err(FormError::Invalid(errors)) => {
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = forgot_password_page(&state, &flashes, &form, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    };

    state
        .password_reset_service()
        .send_reset_instructions(&user)
        .await?;

    if json {
        return Ok(views::json_ok());
    }

    session.flash(
        FlashCategory::Info,
        format!(
            "Instructions to reset your password have been sent to {}.",
            user.email
        ),
    );
    let flashes = session.take_flashes();
    let page = forgot_password_page(&state, &flashes, &form, &FormErrors::new());
    Ok((session, page).into_response())
}

/// リセットトークンを検証
///
/// 無効・期限切れならフラッシュを積んで None を返す。期限切れの場合は手順メールを再送する。
async fn reset_token_user(
    state: &AppState,
    session: &mut Session,
    token: &str,
) -> Result<Option<User>, AppError> {
    match state.tokens.verify(TokenKind::ResetPassword, token).await? {
        TokenStatus::Valid(user) => Ok(Some(user)),
        TokenStatus::Invalid => {
            session.flash(FlashCategory::Error, "Invalid reset password token.");
            Ok(None)
        }
        TokenStatus::Expired(user) => {
            state
                .password_reset_service()
                .send_reset_instructions(&user)
                .await?;
            session.flash(
                FlashCategory::Error,
                format!(
                    "You did not reset your password within {}. New instructions have been sent to {}.",
                    describe_window(state.config.reset_password_within_secs),
                    user.email
                ),
            );
            Ok(None)
        }
    }
}

/// 新パスワード入力フォーム表示
///
/// GET /reset/{token}
pub async fn reset_password_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Path(token): Path<String>,
) -> Result<Response, AppError> {
    if reset_token_user(&state, &mut session, &token).await?.is_none() {
        return Ok((session, Redirect::to(&state.config.reset_url)).into_response());
    }

    let flashes = session.take_flashes();
    let page = reset_password_page(&state, &flashes, &token, &FormErrors::new());
    Ok((session, page).into_response())
}

/// パスワード再設定
///
/// POST /reset/{token}
///
/// 処理フロー:
/// 1. トークン検証（無効・期限切れなら申請ページへ）
/// 2. フォームバリデーション
/// 3. パスワード更新をコミット
/// 4. 変更通知メール送信、ログイン
pub async fn reset_password(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Path(token): Path<String>,
    Submission { form, json }: Submission<ResetPasswordForm>,
) -> Result<Response, AppError> {
    let Some(user) = reset_token_user(&state, &mut session, &token).await? else {
        return Ok((session, Redirect::to(&state.config.reset_url)).into_response());
    };

    match form.check() {
        Ok(()) => {}
        Err(FormError::Invalid(errors)) => {
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = reset_password_page(&state, &flashes, &token, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    }

    let service = state.password_reset_service();
    let mut work = UnitOfWork::new();
    service.update_password(&user, &form.password, &mut work)?;
    state.datastore.commit(work).await?;
    tracing::info!(user_id = %user.id, "パスワードリセット完了");

    // コミット済みのため通知の失敗はログのみ
    if let Err(e) = service.send_reset_notice(&user).await {
        tracing::warn!(user_id = %user.id, error = ?e, "パスワード変更通知の送信に失敗");
    }
    session.login(user.id, true);

    if json {
        let user = state
            .datastore
            .find_user_by_id(user.id)
            .await?
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("reset user missing")))?;
        let auth_token = state.tokens.issue(TokenKind::Authentication, &user)?;
        return Ok((session, views::json_user(&user, &auth_token)).into_response());
    }

    session.flash(
        FlashCategory::Success,
        "You successfully reset your password and you have been logged in automatically.",
    );
    let target = views::redirect_target(
        &state.config,
        None,
        state.config.post_reset_view.as_deref(),
    );
    Ok((session, Redirect::to(target)).into_response())
}
