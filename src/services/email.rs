use std::sync::Arc;

use async_trait::async_trait;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;

/// 送信するメール1通分
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// メールの配送手段
#[async_trait]
pub trait MailTransport: Send + Sync {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), AppError>;
}

/// ログ出力のみの配送手段（開発環境用）
///
/// 本文にはトークン入りのリンクが含まれるため debug レベルで出す。
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl MailTransport for LogTransport {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), AppError> {
        tracing::info!(to = %mail.to, subject = %mail.subject, "メール送信（開発モード）");
        tracing::debug!(body = %mail.body, "メール本文");
        Ok(())
    }
}

pub const SUBJECT_REGISTER: &str = "Welcome";
pub const SUBJECT_CONFIRM: &str = "Please confirm your email";
pub const SUBJECT_RESET: &str = "Password reset instructions";
pub const SUBJECT_RESET_NOTICE: &str = "Your password has been reset";
pub const SUBJECT_PASSWORDLESS: &str = "Login instructions";

/// メール送信サービス
#[derive(Clone)]
pub struct EmailService {
    config: Arc<Config>,
    transport: Arc<dyn MailTransport>,
}

impl EmailService {
    /// 新しい EmailService を作成
    pub fn new(config: Arc<Config>, transport: Arc<dyn MailTransport>) -> Self {
        Self { config, transport }
    }

    async fn send(&self, user: &User, subject: &str, body: String) -> Result<(), AppError> {
        let mail = OutgoingMail {
            from: self.config.default_mail_sender.clone(),
            to: user.email.clone(),
            subject: subject.to_string(),
            body,
        };
        self.transport.deliver(mail).await
    }

    /// 登録完了メール（確認が必要なら確認リンクを含める）
    pub async fn send_welcome(
        &self,
        user: &User,
        confirmation_link: Option<&str>,
    ) -> Result<(), AppError> {
        let mut body = format!("Welcome {}!\n", user.email);
        if let Some(link) = confirmation_link {
            body.push_str(&format!(
                "\nYou can confirm your email through the link below:\n\n{link}\n"
            ));
        }
        self.send(user, SUBJECT_REGISTER, body).await
    }

    pub async fn send_confirmation_instructions(
        &self,
        user: &User,
        confirmation_link: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "Please confirm your email through the link below:\n\n{confirmation_link}\n"
        );
        self.send(user, SUBJECT_CONFIRM, body).await
    }

    pub async fn send_reset_instructions(
        &self,
        user: &User,
        reset_link: &str,
    ) -> Result<(), AppError> {
        let body = format!("Click the link below to reset your password:\n\n{reset_link}\n");
        self.send(user, SUBJECT_RESET, body).await
    }

    pub async fn send_reset_notice(&self, user: &User) -> Result<(), AppError> {
        let body = "Your password has been reset.\n".to_string();
        self.send(user, SUBJECT_RESET_NOTICE, body).await
    }

    pub async fn send_login_instructions(
        &self,
        user: &User,
        login_link: &str,
    ) -> Result<(), AppError> {
        let body = format!(
            "Welcome {}!\n\nYou can log into your account through the link below:\n\n{login_link}\n",
            user.email
        );
        self.send(user, SUBJECT_PASSWORDLESS, body).await
    }
}
