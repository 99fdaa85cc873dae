use std::sync::Arc;

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use time::OffsetDateTime;

use crate::config::Config;
use crate::error::AppError;
use crate::models::User;
use crate::repositories::UserDatastore;
use crate::services::auth::password_fingerprint;

type HmacSha256 = Hmac<Sha256>;

/// トークンの用途
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    ResetPassword,
    ConfirmEmail,
    Login,
    Authentication,
}

impl TokenKind {
    /// 用途ごとの署名ソルト（用途間でのトークン流用を防ぐ）
    fn salt(self) -> &'static str {
        match self {
            Self::ResetPassword => "reset-salt",
            Self::ConfirmEmail => "confirm-salt",
            Self::Login => "login-salt",
            Self::Authentication => "remember-salt",
        }
    }

    /// パスワード指紋を埋め込むか
    fn binds_password(self) -> bool {
        matches!(self, Self::ResetPassword | Self::Authentication)
    }
}

/// トークンのペイロード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct Claims {
    uid: i64,
    iat: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    fp: Option<String>,
}

/// トークン検証結果
///
/// 無効（改ざん・形式不正・ユーザー不在・パスワード変更済み）は期限切れより優先される。
#[derive(Debug, Clone)]
pub enum TokenStatus {
    Valid(User),
    Expired(User),
    Invalid,
}

impl TokenStatus {
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired(_))
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Self::Invalid)
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Valid(user) | Self::Expired(user) => Some(user),
            Self::Invalid => None,
        }
    }
}

/// 署名の検証に失敗した理由（ログ用）
#[derive(Debug, PartialEq, Eq)]
enum Unsigned {
    Malformed,
    BadSignature,
}

/// HMAC-SHA256 署名器
///
/// 形式: `base64url(json payload) "." base64url(hmac(salt "." payload))`
#[derive(Clone)]
pub struct TokenSigner {
    key: Arc<Vec<u8>>,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            key: Arc::new(secret.to_vec()),
        }
    }

    fn mac(&self, salt: &str, payload: &str) -> Result<HmacSha256, AppError> {
        let mut mac = HmacSha256::new_from_slice(&self.key).map_err(|e| {
            tracing::error!(error = ?e, "HMAC初期化エラー");
            AppError::Internal(anyhow::anyhow!("hmac key error"))
        })?;
        mac.update(salt.as_bytes());
        mac.update(b".");
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    fn sign(&self, salt: &str, claims: &Claims) -> Result<String, AppError> {
        let json = serde_json::to_vec(claims)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("token encode error: {e}")))?;
        let payload = URL_SAFE_NO_PAD.encode(json);
        let signature = self.mac(salt, &payload)?.finalize().into_bytes();
        Ok(format!("{}.{}", payload, URL_SAFE_NO_PAD.encode(signature)))
    }

    /// 署名を検証してからペイロードを復元する
    fn unsign(&self, salt: &str, token: &str) -> Result<Result<Claims, Unsigned>, AppError> {
        let Some((payload, signature)) = token.split_once('.') else {
            return Ok(Err(Unsigned::Malformed));
        };
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return Ok(Err(Unsigned::Malformed));
        };

        if self.mac(salt, payload)?.verify_slice(&signature).is_err() {
            return Ok(Err(Unsigned::BadSignature));
        }

        let claims = URL_SAFE_NO_PAD
            .decode(payload)
            .ok()
            .and_then(|bytes| serde_json::from_slice::<Claims>(&bytes).ok());

        Ok(claims.ok_or(Unsigned::Malformed))
    }
}

/// 用途別トークンの発行・検証
#[derive(Clone)]
pub struct TokenService {
    signer: TokenSigner,
    datastore: Arc<dyn UserDatastore>,
    config: Arc<Config>,
}

impl TokenService {
    pub fn new(signer: TokenSigner, datastore: Arc<dyn UserDatastore>, config: Arc<Config>) -> Self {
        Self {
            signer,
            datastore,
            config,
        }
    }

    /// 用途ごとの有効期間（秒）。None は無期限
    pub fn window_secs(&self, kind: TokenKind) -> Option<i64> {
        match kind {
            TokenKind::ResetPassword => Some(self.config.reset_password_within_secs),
            TokenKind::ConfirmEmail => Some(self.config.confirm_email_within_secs),
            TokenKind::Login => Some(self.config.login_within_secs),
            TokenKind::Authentication => self.config.auth_token_max_age_secs,
        }
    }

    /// 現在時刻で発行
    pub fn issue(&self, kind: TokenKind, user: &User) -> Result<String, AppError> {
        self.issue_at(kind, user, OffsetDateTime::now_utc())
    }

    /// 指定時刻で発行
    pub fn issue_at(
        &self,
        kind: TokenKind,
        user: &User,
        issued_at: OffsetDateTime,
    ) -> Result<String, AppError> {
        let claims = Claims {
            uid: user.id,
            iat: issued_at.unix_timestamp(),
            fp: kind.binds_password().then(|| password_fingerprint(user)),
        };
        self.signer.sign(kind.salt(), &claims)
    }

    /// 現在時刻で検証
    pub async fn verify(&self, kind: TokenKind, token: &str) -> Result<TokenStatus, AppError> {
        self.verify_at(kind, token, OffsetDateTime::now_utc()).await
    }

    /// 指定時刻で検証
    ///
    /// # Security
    /// トークン本体はログに出力しない
    pub async fn verify_at(
        &self,
        kind: TokenKind,
        token: &str,
        now: OffsetDateTime,
    ) -> Result<TokenStatus, AppError> {
        let claims = match self.signer.unsign(kind.salt(), token)? {
            Ok(claims) => claims,
            Err(reason) => {
                tracing::warn!(kind = ?kind, reason = ?reason, "トークン署名検証失敗");
                return Ok(TokenStatus::Invalid);
            }
        };

        let Some(user) = self.datastore.find_user_by_id(claims.uid).await? else {
            tracing::warn!(kind = ?kind, user_id = %claims.uid, "トークンのユーザー不在");
            return Ok(TokenStatus::Invalid);
        };

        if kind.binds_password() && claims.fp.as_deref() != Some(password_fingerprint(&user).as_str())
        {
            tracing::warn!(kind = ?kind, user_id = %user.id, "パスワード変更済みのトークン");
            return Ok(TokenStatus::Invalid);
        }

        if let Some(window) = self.window_secs(kind)
            && now.unix_timestamp() - claims.iat > window
        {
            tracing::info!(kind = ?kind, user_id = %user.id, "期限切れトークン");
            return Ok(TokenStatus::Expired(user));
        }

        Ok(TokenStatus::Valid(user))
    }
}
