//! 署名付きCookieによるセッション
//!
//! ログイン中のユーザーID、remember フラグ、未表示のフラッシュメッセージを保持する。
//! 値は `cookie` クレートの署名付きJar（HMAC-SHA256）で改ざん検知される。

use axum::extract::FromRequestParts;
use axum::response::{IntoResponseParts, ResponseParts};
use cookie::{Cookie, CookieJar, Key, SameSite};
use http::header::{COOKIE, SET_COOKIE};
use http::request::Parts;
use http::HeaderValue;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::convert::Infallible;

use crate::error::AppError;
use crate::state::AppState;

pub const SESSION_COOKIE: &str = "session";

/// フラッシュメッセージの種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashCategory {
    Success,
    Info,
    Error,
}

impl FlashCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Error => "error",
        }
    }
}

/// 次に描画されるページで一度だけ表示するメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub category: FlashCategory,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
struct SessionData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    uid: Option<i64>,
    #[serde(default)]
    remember: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    flashes: Vec<Flash>,
}

impl SessionData {
    fn is_empty(&self) -> bool {
        self.uid.is_none() && self.flashes.is_empty()
    }
}

/// シークレットからCookie署名鍵を導出（64バイト必要）
pub fn derive_session_key(secret: &[u8]) -> Result<Key, AppError> {
    let mut hasher = Sha512::new();
    hasher.update(b"warden.session");
    hasher.update(secret);
    let digest = hasher.finalize();

    Key::try_from(digest.as_slice()).map_err(|e| {
        tracing::error!(error = ?e, "セッション鍵の導出エラー");
        AppError::Internal(anyhow::anyhow!("session key error"))
    })
}

/// リクエスト単位のセッション
///
/// 変更した場合はレスポンスに含めること（`IntoResponseParts`）。
/// レスポンスに含めなければ状態は変わらない。
#[derive(Clone)]
pub struct Session {
    data: SessionData,
    key: Key,
    remember_secs: i64,
    dirty: bool,
}

impl Session {
    pub fn new(key: Key, remember_secs: i64) -> Self {
        Self {
            data: SessionData::default(),
            key,
            remember_secs,
            dirty: false,
        }
    }

    /// Cookie ヘッダー群から復元（署名不正なら空セッション）
    pub fn from_headers<'a>(
        headers: impl IntoIterator<Item = &'a HeaderValue>,
        key: Key,
        remember_secs: i64,
    ) -> Self {
        let mut jar = CookieJar::new();
        for value in headers {
            let Ok(raw) = value.to_str() else { continue };
            for cookie in Cookie::split_parse_encoded(raw).flatten() {
                jar.add_original(cookie.into_owned());
            }
        }

        let data = match jar.signed(&key).get(SESSION_COOKIE) {
            Some(cookie) => serde_json::from_str(cookie.value()).unwrap_or_else(|e| {
                tracing::warn!(error = %e, "セッションCookieのデコードエラー");
                SessionData::default()
            }),
            None => SessionData::default(),
        };

        Self {
            data,
            key,
            remember_secs,
            dirty: false,
        }
    }

    pub fn user_id(&self) -> Option<i64> {
        self.data.uid
    }

    pub fn is_remembered(&self) -> bool {
        self.data.remember
    }

    /// ログイン状態にする
    pub fn login(&mut self, user_id: i64, remember: bool) {
        self.data.uid = Some(user_id);
        self.data.remember = remember;
        self.dirty = true;
    }

    /// ログアウト（未表示のフラッシュは残す）
    pub fn logout(&mut self) {
        self.data.uid = None;
        self.data.remember = false;
        self.dirty = true;
    }

    pub fn flash(&mut self, category: FlashCategory, message: impl Into<String>) {
        self.data.flashes.push(Flash {
            category,
            message: message.into(),
        });
        self.dirty = true;
    }

    /// 表示用にフラッシュを取り出す
    pub fn take_flashes(&mut self) -> Vec<Flash> {
        if self.data.flashes.is_empty() {
            return Vec::new();
        }
        self.dirty = true;
        std::mem::take(&mut self.data.flashes)
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Set-Cookie に載せる値
    pub fn to_set_cookie(&self) -> Result<String, AppError> {
        if self.data.is_empty() {
            let removal = Cookie::build((SESSION_COOKIE, ""))
                .path("/")
                .http_only(true)
                .max_age(cookie::time::Duration::ZERO)
                .build();
            return Ok(removal.encoded().to_string());
        }

        let value = serde_json::to_string(&self.data)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("session encode error: {e}")))?;

        let mut builder = Cookie::build((SESSION_COOKIE, value))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax);
        if self.data.remember {
            builder = builder.max_age(cookie::time::Duration::seconds(self.remember_secs));
        }

        let mut jar = CookieJar::new();
        jar.signed_mut(&self.key).add(builder);

        jar.get(SESSION_COOKIE)
            .map(|cookie| cookie.encoded().to_string())
            .ok_or_else(|| AppError::Internal(anyhow::anyhow!("session cookie missing")))
    }
}

impl FromRequestParts<AppState> for Session {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(Session::from_headers(
            parts.headers.get_all(COOKIE),
            state.session_key.clone(),
            state.config.remember_cookie_secs,
        ))
    }
}

impl IntoResponseParts for Session {
    type Error = AppError;

    fn into_response_parts(self, mut res: ResponseParts) -> Result<ResponseParts, Self::Error> {
        if !self.dirty {
            return Ok(res);
        }

        let value = HeaderValue::from_str(&self.to_set_cookie()?).map_err(|e| {
            tracing::error!(error = ?e, "Set-Cookie ヘッダー生成エラー");
            AppError::Internal(anyhow::anyhow!("invalid set-cookie header"))
        })?;
        res.headers_mut().append(SET_COOKIE, value);

        Ok(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> Key {
        derive_session_key(b"test-secret-key-0123456789").unwrap()
    }

    /// Set-Cookie の値から Cookie ヘッダーの値を作る
    fn cookie_header(set_cookie: &str) -> HeaderValue {
        let pair = set_cookie.split(';').next().unwrap();
        HeaderValue::from_str(pair).unwrap()
    }

    #[test]
    fn test_roundtrip_login() {
        let mut session = Session::new(key(), 3600);
        session.login(42, true);
        session.flash(FlashCategory::Success, "You have successfully logged in.");
        assert!(session.is_dirty());

        let set_cookie = session.to_set_cookie().unwrap();
        assert!(set_cookie.contains("Max-Age=3600"));

        let header = cookie_header(&set_cookie);
        let mut restored = Session::from_headers([&header], key(), 3600);
        assert_eq!(restored.user_id(), Some(42));
        assert!(restored.is_remembered());
        assert!(!restored.is_dirty());

        let flashes = restored.take_flashes();
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes[0].category, FlashCategory::Success);
        assert!(restored.take_flashes().is_empty());
    }

    #[test]
    fn test_session_cookie_without_remember_has_no_max_age() {
        let mut session = Session::new(key(), 3600);
        session.login(1, false);
        let set_cookie = session.to_set_cookie().unwrap();
        assert!(!set_cookie.contains("Max-Age"));
        assert!(set_cookie.contains("HttpOnly"));
    }

    #[test]
    fn test_tampered_cookie_is_ignored() {
        let mut session = Session::new(key(), 3600);
        session.login(42, false);
        let set_cookie = session.to_set_cookie().unwrap();

        let other_key = derive_session_key(b"another-secret-key-98765").unwrap();
        let header = cookie_header(&set_cookie);
        let restored = Session::from_headers([&header], other_key, 3600);
        assert_eq!(restored.user_id(), None);

        let forged = HeaderValue::from_static("session=%7B%22uid%22%3A1%7D");
        let restored = Session::from_headers([&forged], key(), 3600);
        assert_eq!(restored.user_id(), None);
    }

    #[test]
    fn test_logout_removes_cookie() {
        let mut session = Session::new(key(), 3600);
        session.login(7, false);
        session.logout();
        let set_cookie = session.to_set_cookie().unwrap();
        assert!(set_cookie.starts_with("session=;"));
        assert!(set_cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_logout_keeps_flashes() {
        let mut session = Session::new(key(), 3600);
        session.login(7, false);
        session.flash(FlashCategory::Info, "bye");
        session.logout();

        let header = cookie_header(&session.to_set_cookie().unwrap());
        let mut restored = Session::from_headers([&header], key(), 3600);
        assert_eq!(restored.user_id(), None);
        assert_eq!(restored.take_flashes()[0].message, "bye");
    }
}
