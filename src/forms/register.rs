use garde::Validate;
use serde::Deserialize;

use crate::forms::validators::{
    PASSWORDS_DO_NOT_MATCH, email_address, email_already_registered, new_password,
};
use crate::forms::{FormError, FormErrors};
use crate::state::AppState;

/// 登録フォーム
///
/// 確認メールを使わない構成では `password_confirm` も必須。
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterForm {
    #[garde(custom(email_address))]
    pub email: String,
    #[garde(custom(new_password))]
    pub password: String,
    #[garde(skip)]
    pub password_confirm: String,
}

impl RegisterForm {
    pub fn email(&self) -> &str {
        self.email.trim()
    }

    /// 形式チェックと重複チェック
    pub async fn check_available(&self, state: &AppState) -> Result<(), FormError> {
        let mut errors = FormErrors::from_validation(self.validate());
        if !state.config.confirmable && self.password_confirm != self.password {
            errors.add("password_confirm", PASSWORDS_DO_NOT_MATCH);
        }
        if !errors.is_empty() {
            return Err(errors.into());
        }

        if state.datastore.find_user_by_email(self.email()).await?.is_some() {
            errors.add("email", email_already_registered(self.email()));
        }
        errors.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::{add_user, errors_of, state_with};
    use crate::forms::validators::{INVALID_EMAIL, PASSWORD_LENGTH};

    fn form(email: &str, password: &str, confirm: &str) -> RegisterForm {
        RegisterForm {
            email: email.to_string(),
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        }
    }

    #[tokio::test]
    async fn test_format_errors_skip_existence_check() {
        let (state, store) = state_with(&[]);
        add_user(&store, "matt@lp.com", "password").await;

        let errors = errors_of(
            form("matt@lp.com", "pw", "")
                .check_available(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("password"), [PASSWORD_LENGTH]);
        assert!(!errors.has("email"));
    }

    #[tokio::test]
    async fn test_duplicate_email() {
        let (state, store) = state_with(&[]);
        add_user(&store, "matt@lp.com", "password").await;

        let errors = errors_of(
            form("matt@lp.com", "password", "")
                .check_available(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(
            errors.field("email"),
            ["matt@lp.com is already associated with an account"]
        );
    }

    #[tokio::test]
    async fn test_confirm_required_without_confirmable() {
        let (state, _) = state_with(&[("CONFIRMABLE", "false")]);

        let errors = errors_of(
            form("dude@lp.com", "password", "passw0rd")
                .check_available(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("password_confirm"), [PASSWORDS_DO_NOT_MATCH]);

        assert!(
            form("dude@lp.com", "password", "password")
                .check_available(&state)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_confirm_ignored_with_confirmable() {
        let (state, _) = state_with(&[]);
        assert!(
            form("dude@lp.com", "password", "")
                .check_available(&state)
                .await
                .is_ok()
        );
    }

    #[tokio::test]
    async fn test_invalid_email_format() {
        let (state, _) = state_with(&[]);
        let errors = errors_of(
            form("dude", "password", "")
                .check_available(&state)
                .await
                .unwrap_err(),
        );
        assert_eq!(errors.field("email"), [INVALID_EMAIL]);
    }
}
