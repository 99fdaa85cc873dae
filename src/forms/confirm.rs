use garde::Validate;
use serde::Deserialize;

use crate::forms::validators::{ALREADY_CONFIRMED, email_address};
use crate::forms::{FormError, FormErrors, check, existing_user};
use crate::models::User;
use crate::state::AppState;

/// 確認メール再送フォーム
#[derive(Debug, Default, Clone, Deserialize, Validate)]
#[serde(default)]
pub struct SendConfirmationForm {
    #[garde(custom(email_address))]
    pub email: String,
}

impl SendConfirmationForm {
    /// 未確認のユーザーを返す
    pub async fn find_unconfirmed(&self, state: &AppState) -> Result<User, FormError> {
        check(self)?;
        let user = existing_user(state.datastore.as_ref(), &self.email).await?;

        if user.is_confirmed() {
            let mut errors = FormErrors::new();
            errors.add("email", ALREADY_CONFIRMED);
            return Err(errors.into());
        }
        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forms::tests::{add_user, errors_of, state_with};
    use crate::repositories::{Change, UnitOfWork};
    use time::OffsetDateTime;

    #[tokio::test]
    async fn test_already_confirmed() {
        let (state, store) = state_with(&[]);
        let user = add_user(&store, "matt@lp.com", "password").await;
        let form = SendConfirmationForm {
            email: "matt@lp.com".to_string(),
        };
        assert!(form.find_unconfirmed(&state).await.is_ok());

        let mut work = UnitOfWork::new();
        work.push(Change::Confirm {
            user_id: user.id,
            at: OffsetDateTime::now_utc(),
        });
        state.datastore.commit(work).await.unwrap();

        let errors = errors_of(form.find_unconfirmed(&state).await.unwrap_err());
        assert_eq!(errors.field("email"), [ALREADY_CONFIRMED]);
    }
}
