use garde::Validate;
use serde::Deserialize;

use crate::forms::validators::{DISABLED_ACCOUNT, email_address};
use crate::forms::{FormError, FormErrors, check, existing_user};
use crate::models::User;
use crate::state::AppState;

/// ログインリンク送信フォーム
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct PasswordlessLoginForm {
    #[garde(custom(email_address))]
    pub email: String,
    #[garde(skip)]
    pub next: Option<String>,
}

impl PasswordlessLoginForm {
    /// 有効なユーザーを返す
    pub async fn find_active(&self, state: &AppState) -> Result<User, FormError> {
        check(self)?;
        let user = existing_user(state.datastore.as_ref(), &self.email).await?;

        if !user.active {
            let mut errors = FormErrors::new();
            errors.add("email", DISABLED_ACCOUNT);
            return Err(errors.into());
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::{add_user, errors_of, state_with};
    use crate::forms::validators::{INVALID_EMAIL, USER_DOES_NOT_EXIST};
    use crate::repositories::{Change, UnitOfWork};

    fn form(email: &str) -> PasswordlessLoginForm {
        PasswordlessLoginForm {
            email: email.to_string(),
            next: None,
        }
    }

    #[tokio::test]
    async fn test_lookup_rules() {
        let (state, store) = state_with(&[("PASSWORDLESS", "true")]);
        let user = add_user(&store, "matt@lp.com", "password").await;

        assert_eq!(form("matt@lp.com").find_active(&state).await.unwrap().id, user.id);

        let errors = errors_of(form("bogus").find_active(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [INVALID_EMAIL]);

        let errors = errors_of(form("bogus@lp.com").find_active(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [USER_DOES_NOT_EXIST]);

        let mut work = UnitOfWork::new();
        work.push(Change::SetActive {
            user_id: user.id,
            active: false,
        });
        state.datastore.commit(work).await.unwrap();

        let errors = errors_of(form("matt@lp.com").find_active(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [DISABLED_ACCOUNT]);
    }
}
