use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::services::EmailService;
use crate::services::token::{TokenKind, TokenService};

/// パスワードなしログイン（メールのリンクでログイン）
#[derive(Clone)]
pub struct PasswordlessService {
    tokens: TokenService,
    email_service: EmailService,
    config: Arc<Config>,
}

impl PasswordlessService {
    pub fn new(tokens: TokenService, email_service: EmailService, config: Arc<Config>) -> Self {
        Self {
            tokens,
            email_service,
            config,
        }
    }

    pub async fn send_login_instructions(&self, user: &User) -> Result<(), AppError> {
        let token = self.tokens.issue(TokenKind::Login, user)?;
        let link = self
            .config
            .external_link(&format!("{}/{}", self.config.login_url, token));

        self.email_service
            .send_login_instructions(user, &link)
            .await?;

        tracing::info!(user_id = %user.id, "ログイン手順メール送信完了");
        Ok(())
    }
}
