use std::sync::Arc;

use time::OffsetDateTime;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::{Change, UnitOfWork};
use crate::services::EmailService;
use crate::services::token::{TokenKind, TokenService};

/// メールアドレス確認サービス
#[derive(Clone)]
pub struct ConfirmationService {
    tokens: TokenService,
    email_service: EmailService,
    config: Arc<Config>,
}

impl ConfirmationService {
    pub fn new(tokens: TokenService, email_service: EmailService, config: Arc<Config>) -> Self {
        Self {
            tokens,
            email_service,
            config,
        }
    }

    /// 確認用の絶対URL
    pub fn confirmation_link(&self, user: &User) -> Result<String, AppError> {
        let token = self.tokens.issue(TokenKind::ConfirmEmail, user)?;
        Ok(self
            .config
            .external_link(&format!("{}/{}", self.config.confirm_url, token)))
    }

    /// 確認手順メールを送信
    pub async fn send_confirmation_instructions(&self, user: &User) -> Result<(), AppError> {
        let link = self.confirmation_link(user)?;
        self.email_service
            .send_confirmation_instructions(user, &link)
            .await?;

        tracing::info!(user_id = %user.id, "確認メール送信完了");
        Ok(())
    }

    /// 確認日時を変更セットに積む（確認済みなら何もしない）
    pub fn confirm_user(&self, user: &User, work: &mut UnitOfWork) {
        if user.is_confirmed() {
            return;
        }
        work.push(Change::Confirm {
            user_id: user.id,
            at: OffsetDateTime::now_utc(),
        });
    }
}
