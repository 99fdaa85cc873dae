use std::sync::Arc;

use cookie::Key;
use secrecy::ExposeSecret;

use crate::config::Config;
use crate::error::AppError;
use crate::repositories::UserDatastore;
use crate::services::{
    ConfirmationService, EmailService, MailTransport, PasswordResetService, PasswordlessService,
    RegistrationService, TokenService, TokenSigner,
};
use crate::session::derive_session_key;

/// アプリケーション共有状態
///
/// axum の State として全ハンドラーで共有される。
/// Clone は必須（axum が内部で clone するため）。
#[derive(Clone)]
pub struct AppState {
    /// アプリケーション設定（Arc で共有）
    pub config: Arc<Config>,
    /// ユーザー/ロールのデータストア
    pub datastore: Arc<dyn UserDatastore>,
    /// 署名付きトークン
    pub tokens: TokenService,
    /// メールサービス
    pub email_service: EmailService,
    /// セッションCookieの署名鍵
    pub session_key: Key,
}

impl AppState {
    /// 新しい AppState を作成
    pub fn new(
        config: Config,
        datastore: Arc<dyn UserDatastore>,
        transport: Arc<dyn MailTransport>,
    ) -> Result<Self, AppError> {
        let config = Arc::new(config);
        let secret = config.secret_key.expose_secret().as_bytes();

        let session_key = derive_session_key(secret)?;
        let tokens = TokenService::new(TokenSigner::new(secret), datastore.clone(), config.clone());
        let email_service = EmailService::new(config.clone(), transport);

        Ok(Self {
            config,
            datastore,
            tokens,
            email_service,
            session_key,
        })
    }

    pub fn confirmation_service(&self) -> ConfirmationService {
        ConfirmationService::new(
            self.tokens.clone(),
            self.email_service.clone(),
            self.config.clone(),
        )
    }

    pub fn password_reset_service(&self) -> PasswordResetService {
        PasswordResetService::new(
            self.tokens.clone(),
            self.email_service.clone(),
            self.config.clone(),
        )
    }

    pub fn passwordless_service(&self) -> PasswordlessService {
        PasswordlessService::new(
            self.tokens.clone(),
            self.email_service.clone(),
            self.config.clone(),
        )
    }

    pub fn registration_service(&self) -> RegistrationService {
        RegistrationService::new(
            self.datastore.clone(),
            self.confirmation_service(),
            self.email_service.clone(),
            self.config.clone(),
        )
    }
}
