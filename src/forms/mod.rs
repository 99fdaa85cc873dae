//! 入力フォーム
//!
//! 形式チェックは garde、存在確認などデータストアを見るチェックは各フォームの
//! async メソッドで行う。データストアのチェックは形式チェックが通った後だけ実行する。

pub mod confirm;
pub mod login;
pub mod passwordless;
pub mod password_reset;
pub mod register;
pub mod validators;

use std::collections::BTreeMap;

use axum::extract::{FromRequest, Request};
use axum::{Form, Json};
use garde::Validate;
use http::HeaderMap;
use http::header::CONTENT_TYPE;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::AppError;
use crate::models::User;
use crate::repositories::{DatastoreError, UserDatastore};

pub use confirm::SendConfirmationForm;
pub use login::LoginForm;
pub use password_reset::{ForgotPasswordForm, ResetPasswordForm};
pub use passwordless::PasswordlessLoginForm;
pub use register::RegisterForm;

/// フィールド名 → エラーメッセージ一覧
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormErrors(BTreeMap<String, Vec<String>>);

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// garde の検証結果から変換
    pub fn from_validation(result: Result<(), garde::Report>) -> Self {
        let mut errors = Self::new();
        if let Err(report) = result {
            for (path, error) in report.iter() {
                errors.add(path.to_string(), error.message());
            }
        }
        errors
    }

    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    /// 空でなければ Err にする
    pub fn into_result(self) -> Result<(), FormError> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(FormError::Invalid(self))
        }
    }
}

/// フォーム処理の失敗
#[derive(Debug)]
pub enum FormError {
    /// 入力エラー（フォームを再表示する）
    Invalid(FormErrors),
    /// 処理エラー
    App(AppError),
}

impl From<FormErrors> for FormError {
    fn from(errors: FormErrors) -> Self {
        Self::Invalid(errors)
    }
}

impl From<AppError> for FormError {
    fn from(error: AppError) -> Self {
        Self::App(error)
    }
}

impl From<DatastoreError> for FormError {
    fn from(error: DatastoreError) -> Self {
        Self::App(error.into())
    }
}

/// garde の形式チェックのみ実行
pub fn check<T>(form: &T) -> Result<(), FormError>
where
    T: Validate<Context = ()>,
{
    FormErrors::from_validation(form.validate()).into_result()
}

/// メールアドレスからユーザーを取得（不在なら email フィールドのエラー）
pub async fn existing_user(datastore: &dyn UserDatastore, email: &str) -> Result<User, FormError> {
    match datastore.find_user_by_email(email.trim()).await? {
        Some(user) => Ok(user),
        None => {
            let mut errors = FormErrors::new();
            errors.add("email", validators::USER_DOES_NOT_EXIST);
            Err(errors.into())
        }
    }
}

/// `application/json` のリクエストか
pub fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("application/json"))
}

/// フォーム or JSON のボディ
///
/// Content-Type で切り替え、`json` に記録する。レスポンス形式もこれに従う。
#[derive(Debug)]
pub struct Submission<T> {
    pub form: T,
    pub json: bool,
}

impl<S, T> FromRequest<S> for Submission<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_json(req.headers()) {
            let Json(form) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| AppError::BadRequest(e.body_text()))?;
            return Ok(Self { form, json: true });
        }

        let Form(form) = Form::<T>::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        Ok(Self { form, json: false })
    }
}

/// チェックボックス値（HTMLフォームの "y" / "on" 等と JSON の bool を受け付ける）
pub fn checkbox<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Bool(bool),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Bool(value)) => value,
        Some(Raw::Text(value)) => matches!(
            value.to_ascii_lowercase().as_str(),
            "y" | "yes" | "on" | "true" | "1"
        ),
        None => false,
    })
}
