use garde::Validate;
use serde::Deserialize;

use crate::forms::validators::{email_address, matches_password, new_password};
use crate::forms::{FormError, check, existing_user};
use crate::models::User;
use crate::state::AppState;

/// パスワード再設定の申請フォーム
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ForgotPasswordForm {
    #[garde(custom(email_address))]
    pub email: String,
}

impl ForgotPasswordForm {
    pub async fn find_user(&self, state: &AppState) -> Result<User, FormError> {
        check(self)?;
        existing_user(state.datastore.as_ref(), &self.email).await
    }
}

/// 新しいパスワードの入力フォーム
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordForm {
    #[garde(custom(new_password))]
    pub password: String,
    #[garde(custom(matches_password(&self.password)))]
    pub password_confirm: String,
}

impl ResetPasswordForm {
    pub fn check(&self) -> Result<(), FormError> {
        check(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::{add_user, errors_of, state_with};
    use crate::forms::validators::{
        PASSWORD_LENGTH, PASSWORDS_DO_NOT_MATCH, USER_DOES_NOT_EXIST,
    };

    #[tokio::test]
    async fn test_forgot_password_lookup() {
        let (state, store) = state_with(&[]);
        add_user(&store, "joe@lp.com", "password").await;

        let form = ForgotPasswordForm {
            email: "joe@lp.com".to_string(),
        };
        assert_eq!(form.find_user(&state).await.unwrap().email, "joe@lp.com");

        let form = ForgotPasswordForm {
            email: "bogus@lp.com".to_string(),
        };
        let errors = errors_of(form.find_user(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [USER_DOES_NOT_EXIST]);
    }

    #[test]
    fn test_reset_password_rules() {
        let form = |password: &str, confirm: &str| ResetPasswordForm {
            password: password.to_string(),
            password_confirm: confirm.to_string(),
        };

        assert!(form("newpassword", "newpassword").check().is_ok());

        let errors = errors_of(form("newpassword", "other").check().unwrap_err());
        assert_eq!(errors.field("password_confirm"), [PASSWORDS_DO_NOT_MATCH]);

        let errors = errors_of(form("short", "short").check().unwrap_err());
        assert_eq!(errors.field("password"), [PASSWORD_LENGTH]);
    }
}
