use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::{Change, NewUser, UnitOfWork, UserDatastore};
use crate::services::auth::hash_password;
use crate::services::{ConfirmationService, EmailService};

/// ユーザー登録サービス
#[derive(Clone)]
pub struct RegistrationService {
    datastore: Arc<dyn UserDatastore>,
    confirmation: ConfirmationService,
    email_service: EmailService,
    config: Arc<Config>,
}

impl RegistrationService {
    pub fn new(
        datastore: Arc<dyn UserDatastore>,
        confirmation: ConfirmationService,
        email_service: EmailService,
        config: Arc<Config>,
    ) -> Self {
        Self {
            datastore,
            confirmation,
            email_service,
            config,
        }
    }

    /// ユーザーを作成してコミットし、登録メールを送る
    ///
    /// パスワードはログに出力しない
    pub async fn register_user(&self, email: &str, password: &str) -> Result<User, AppError> {
        let mut work = UnitOfWork::new();
        work.push(Change::CreateUser(NewUser {
            email: email.to_string(),
            password: hash_password(password)?,
            active: true,
            roles: Vec::new(),
        }));

        let user = self
            .datastore
            .commit(work)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("created user missing")))?;

        tracing::info!(user_id = %user.id, "ユーザー登録完了");

        if self.config.send_register_email {
            let confirmation_link = if self.config.confirmable {
                Some(self.confirmation.confirmation_link(&user)?)
            } else {
                None
            };
            // ユーザーはコミット済みのため送信失敗はログのみ
            if let Err(e) = self
                .email_service
                .send_welcome(&user, confirmation_link.as_deref())
                .await
            {
                tracing::warn!(user_id = %user.id, error = ?e, "登録メールの送信に失敗");
            }
        }

        Ok(user)
    }
}
