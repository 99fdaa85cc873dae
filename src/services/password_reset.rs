use std::sync::Arc;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::{Change, UnitOfWork};
use crate::services::token::{TokenKind, TokenService};
use crate::services::{EmailService, auth::hash_password};

/// パスワードリセットサービス
#[derive(Clone)]
pub struct PasswordResetService {
    tokens: TokenService,
    email_service: EmailService,
    config: Arc<Config>,
}

impl PasswordResetService {
    /// 新しい PasswordResetService を作成
    pub fn new(tokens: TokenService, email_service: EmailService, config: Arc<Config>) -> Self {
        Self {
            tokens,
            email_service,
            config,
        }
    }

    /// リセット手順メールを送信
    ///
    /// トークン（平文）はログに出力しない
    pub async fn send_reset_instructions(&self, user: &User) -> Result<(), AppError> {
        let token = self.tokens.issue(TokenKind::ResetPassword, user)?;
        let reset_link = self.reset_link(&token);

        self.email_service
            .send_reset_instructions(user, &reset_link)
            .await?;

        tracing::info!(user_id = %user.id, "パスワードリセットメール送信完了");
        Ok(())
    }

    /// 新しいパスワードを変更セットに積む
    ///
    /// コミット後に `send_reset_notice` を呼ぶこと。
    pub fn update_password(
        &self,
        user: &User,
        new_password: &str,
        work: &mut UnitOfWork,
    ) -> Result<(), AppError> {
        let password = hash_password(new_password)?;
        work.push(Change::SetPassword {
            user_id: user.id,
            password,
        });
        Ok(())
    }

    /// 変更通知メール（設定で無効化可能）
    pub async fn send_reset_notice(&self, user: &User) -> Result<(), AppError> {
        if !self.config.send_password_reset_notice_email {
            return Ok(());
        }
        self.email_service.send_reset_notice(user).await
    }

    /// リセットURLを構築
    fn reset_link(&self, token: &str) -> String {
        self.config
            .external_link(&format!("{}/{}", self.config.reset_url, token))
    }
}
