use garde::Validate;
use serde::Deserialize;

use crate::forms::validators::{
    CONFIRMATION_REQUIRED, DISABLED_ACCOUNT, INVALID_PASSWORD, email_address, password_present,
};
use crate::forms::{FormError, FormErrors, checkbox, check, existing_user};
use crate::models::User;
use crate::services::auth::verify_user_password;
use crate::state::AppState;

/// ログインフォーム
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct LoginForm {
    #[garde(custom(email_address))]
    pub email: String,
    #[garde(custom(password_present))]
    pub password: String,
    #[garde(skip)]
    #[serde(deserialize_with = "checkbox")]
    pub remember: bool,
    #[garde(skip)]
    pub next: Option<String>,
}

impl LoginForm {
    /// 認証してユーザーを返す
    ///
    /// エラーの優先順: 不在 → パスワード不一致 → 未確認 → 無効化
    pub async fn authenticate(&self, state: &AppState) -> Result<User, FormError> {
        check(self)?;

        let user = existing_user(state.datastore.as_ref(), &self.email).await?;
        let mut errors = FormErrors::new();

        if !verify_user_password(&user, &self.password)? {
            errors.add("password", INVALID_PASSWORD);
        } else if state.config.requires_confirmation(&user) {
            errors.add("email", CONFIRMATION_REQUIRED);
        } else if !user.active {
            errors.add("email", DISABLED_ACCOUNT);
        }

        errors.into_result()?;
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::{add_user, errors_of, state_with};
    use crate::forms::validators;
    use crate::repositories::{Change, UnitOfWork};

    fn form(email: &str, password: &str) -> LoginForm {
        LoginForm {
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_missing_fields() {
        let (state, _) = state_with(&[]);
        let errors = errors_of(form("", "").authenticate(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [validators::EMAIL_NOT_PROVIDED]);
        assert_eq!(errors.field("password"), [validators::PASSWORD_NOT_PROVIDED]);
    }

    #[tokio::test]
    async fn test_unknown_user() {
        let (state, _) = state_with(&[]);
        let errors = errors_of(
            form("nobody@lp.com", "password")
                .authenticate(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("email"), [validators::USER_DOES_NOT_EXIST]);
    }

    #[tokio::test]
    async fn test_password_checked_before_confirmation() {
        let (state, store) = state_with(&[]);
        add_user(&store, "matt@lp.com", "password").await;

        let errors = errors_of(
            form("matt@lp.com", "wrong")
                .authenticate(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("password"), [INVALID_PASSWORD]);
        assert!(!errors.has("email"));

        let errors = errors_of(
            form("matt@lp.com", "password")
                .authenticate(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("email"), [CONFIRMATION_REQUIRED]);
    }

    #[tokio::test]
    async fn test_disabled_account() {
        let (state, store) = state_with(&[("CONFIRMABLE", "false")]);
        let user = add_user(&store, "tiya@lp.com", "password").await;
        let mut work = UnitOfWork::new();
        work.push(Change::SetActive {
            user_id: user.id,
            active: false,
        });
        state.datastore.commit(work).await.unwrap();

        let errors = errors_of(
            form("tiya@lp.com", "password")
                .authenticate(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("email"), [DISABLED_ACCOUNT]);
    }

    #[tokio::test]
    async fn test_success() {
        let (state, store) = state_with(&[("LOGIN_WITHOUT_CONFIRMATION", "true")]);
        add_user(&store, "matt@lp.com", "password").await;

        let user = form("MATT@lp.com", "password")
            .authenticate(&state)
            .await
            .unwrap();
        assert_eq!(user.email, "matt@lp.com");
    }
}
