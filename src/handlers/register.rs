use axum::extract::State;
use axum::response::{Html, IntoResponse, Redirect, Response};

use crate::error::AppError;
use crate::extractors::Anonymous;
use crate::forms::{FormError, FormErrors, RegisterForm, Submission};
use crate::services::TokenKind;
use crate::session::{Flash, FlashCategory, Session};
use crate::state::AppState;
use crate::views::{self, Field, FormView};

fn register_page(
    state: &AppState,
    flashes: &[Flash],
    form: &RegisterForm,
    errors: &FormErrors,
) -> Html<String> {
    let mut fields = vec![
        Field::email(&form.email),
        Field::password("password", "Password"),
    ];
    if !state.config.confirmable {
        fields.push(Field::password("password_confirm", "Retype Password"));
    }

    views::form_page(
        "Register",
        flashes,
        FormView {
            action: &state.config.register_url,
            submit: "Register",
            fields,
            errors,
        },
    )
}

/// 登録フォーム表示
///
/// GET /register
pub async fn register_form(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
) -> impl IntoResponse {
    let flashes = session.take_flashes();
    let page = register_page(&state, &flashes, &RegisterForm::default(), &FormErrors::new());
    (session, page)
}

/// 登録ハンドラー
///
/// POST /register
///
/// 処理フロー:
/// 1. フォームバリデーション（形式 → 重複チェック）
/// 2. ユーザー作成（argon2 ハッシュ）とコミット
/// 3. 登録メール送信（確認が有効なら確認リンク付き）
/// 4. 確認不要な構成ならそのままログイン
pub async fn register(
    _: Anonymous,
    State(state): State<AppState>,
    mut session: Session,
    Submission { form, json }: Submission<RegisterForm>,
) -> Result<Response, AppError> {
    match form.check_available(&state).await {
        Ok(()) => {}
        Err(FormError::Invalid(errors)) => {
            tracing::info!("ユーザー登録失敗（入力エラー）");
            if json {
                return Ok(views::json_errors(&errors));
            }
            let flashes = session.take_flashes();
            let page = register_page(&state, &flashes, &form, &errors);
            return Ok((session, page).into_response());
        }
        Err(FormError::App(e)) => return Err(e),
    }

    let user = state
        .registration_service()
        .register_user(form.email(), &form.password)
        .await?;

    if state.config.confirmation_blocks_login() {
        // 確認前は認証トークンを発行しない
        if json {
            return Ok(views::json_user_id(&user));
        }
        session.flash(
            FlashCategory::Info,
            format!(
                "Thank you. Confirmation instructions have been sent to {}.",
                user.email
            ),
        );
    } else {
        session.login(user.id, false);
        if json {
            let token = state.tokens.issue(TokenKind::Authentication, &user)?;
            return Ok((session, views::json_user(&user, &token)).into_response());
        }
    }

    let target = views::redirect_target(
        &state.config,
        None,
        state.config.post_register_view.as_deref(),
    );
    Ok((session, Redirect::to(target)).into_response())
}
