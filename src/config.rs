use secrecy::{ExposeSecret, SecretBox};
use serde::Deserialize;

use crate::models::User;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub database_url: SecretBox<String>,
    /// セッションCookie・トークン署名用のサーバーシークレット
    pub secret_key: SecretBox<String>,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// メール内リンクの組み立てに使う外部公開URL
    #[serde(default = "default_external_url")]
    pub external_url: String,

    // 機能フラグ
    #[serde(default = "enabled")]
    pub registerable: bool,
    #[serde(default = "enabled")]
    pub confirmable: bool,
    #[serde(default = "enabled")]
    pub recoverable: bool,
    #[serde(default)]
    pub passwordless: bool,
    #[serde(default)]
    pub login_without_confirmation: bool,
    #[serde(default = "enabled")]
    pub send_register_email: bool,
    #[serde(default = "enabled")]
    pub send_password_reset_notice_email: bool,

    // ルートパス
    #[serde(default = "default_login_url")]
    pub login_url: String,
    #[serde(default = "default_logout_url")]
    pub logout_url: String,
    #[serde(default = "default_register_url")]
    pub register_url: String,
    #[serde(default = "default_reset_url")]
    pub reset_url: String,
    #[serde(default = "default_confirm_url")]
    pub confirm_url: String,

    // 遷移先
    #[serde(default = "default_root_view")]
    pub post_login_view: String,
    #[serde(default = "default_root_view")]
    pub post_logout_view: String,
    #[serde(default)]
    pub post_register_view: Option<String>,
    #[serde(default)]
    pub post_confirm_view: Option<String>,
    #[serde(default)]
    pub post_reset_view: Option<String>,
    #[serde(default)]
    pub confirm_error_view: Option<String>,

    // トークン有効期間（秒）
    #[serde(default = "default_confirm_email_within_secs")]
    pub confirm_email_within_secs: i64,
    #[serde(default = "default_reset_password_within_secs")]
    pub reset_password_within_secs: i64,
    #[serde(default = "default_login_within_secs")]
    pub login_within_secs: i64,
    /// 認証トークンの有効期間（未設定なら無期限、パスワード変更で失効）
    #[serde(default)]
    pub auth_token_max_age_secs: Option<i64>,
    #[serde(default = "default_remember_cookie_secs")]
    pub remember_cookie_secs: i64,

    // メール設定
    #[serde(default = "default_mail_sender")]
    pub default_mail_sender: String,
    #[serde(default)]
    pub smtp_host: Option<String>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    pub smtp_username: Option<SecretBox<String>>,
    pub smtp_password: Option<SecretBox<String>>,
}

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_EXTERNAL_URL: &str = "http://localhost:3000";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_MAIL_SENDER: &str = "info@site.com";
const DAY_SECS: i64 = 24 * 60 * 60;
const DEFAULT_CONFIRM_EMAIL_WITHIN_SECS: i64 = 5 * DAY_SECS;
const DEFAULT_RESET_PASSWORD_WITHIN_SECS: i64 = 5 * DAY_SECS;
const DEFAULT_LOGIN_WITHIN_SECS: i64 = DAY_SECS;
const DEFAULT_REMEMBER_COOKIE_SECS: i64 = 365 * DAY_SECS;
const MIN_SECRET_KEY_LEN: usize = 16;

fn enabled() -> bool {
    true
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_external_url() -> String {
    DEFAULT_EXTERNAL_URL.to_string()
}

fn default_login_url() -> String {
    "/login".to_string()
}

fn default_logout_url() -> String {
    "/logout".to_string()
}

fn default_register_url() -> String {
    "/register".to_string()
}

fn default_reset_url() -> String {
    "/reset".to_string()
}

fn default_confirm_url() -> String {
    "/confirm".to_string()
}

fn default_root_view() -> String {
    "/".to_string()
}

fn default_confirm_email_within_secs() -> i64 {
    DEFAULT_CONFIRM_EMAIL_WITHIN_SECS
}

fn default_reset_password_within_secs() -> i64 {
    DEFAULT_RESET_PASSWORD_WITHIN_SECS
}

fn default_login_within_secs() -> i64 {
    DEFAULT_LOGIN_WITHIN_SECS
}

fn default_remember_cookie_secs() -> i64 {
    DEFAULT_REMEMBER_COOKIE_SECS
}

fn default_mail_sender() -> String {
    DEFAULT_MAIL_SENDER.to_string()
}

fn default_smtp_port() -> u16 {
    DEFAULT_SMTP_PORT
}

/// 設定値の検証エラー
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("環境変数の読み込みに失敗: {0}")]
    Env(#[from] envy::Error),

    #[error("SECRET_KEY は16バイト以上必要です")]
    SecretKeyTooShort,

    #[error("{name} は '/' で始まるパスで指定してください: {value}")]
    InvalidPath { name: &'static str, value: String },
}

impl Config {
    /// 環境変数から設定を読み込み、検証する
    pub fn load() -> Result<Self, ConfigError> {
        let config: Self = envy::from_env()?;
        config.validate()?;
        Ok(config)
    }

    /// 任意のキー/値の組から設定を構築（テスト・埋め込み用）
    pub fn from_pairs<I>(pairs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let config: Self = envy::from_iter(pairs)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.expose_secret().len() < MIN_SECRET_KEY_LEN {
            return Err(ConfigError::SecretKeyTooShort);
        }

        let paths = [
            ("LOGIN_URL", &self.login_url),
            ("LOGOUT_URL", &self.logout_url),
            ("REGISTER_URL", &self.register_url),
            ("RESET_URL", &self.reset_url),
            ("CONFIRM_URL", &self.confirm_url),
        ];
        for (name, value) in paths {
            if !value.starts_with('/') || value.len() < 2 {
                return Err(ConfigError::InvalidPath {
                    name,
                    value: value.clone(),
                });
            }
        }

        Ok(())
    }

    /// 確認メール再送が必要か（未確認ユーザーのログインを拒否するか）
    pub fn confirmation_blocks_login(&self) -> bool {
        self.confirmable && !self.login_without_confirmation
    }

    /// このユーザーのログインに確認が必要か
    pub fn requires_confirmation(&self, user: &User) -> bool {
        self.confirmation_blocks_login() && !user.is_confirmed()
    }

    /// 外部公開URL + パスで絶対URLを組み立てる
    pub fn external_link(&self, path: &str) -> String {
        format!("{}{}", self.external_url.trim_end_matches('/'), path)
    }
}

/// 有効期間を人間向けの文字列にする（"5 days" など）
pub fn describe_window(secs: i64) -> String {
    let (amount, unit) = if secs % DAY_SECS == 0 {
        (secs / DAY_SECS, "day")
    } else if secs % 3600 == 0 {
        (secs / 3600, "hour")
    } else if secs % 60 == 0 {
        (secs / 60, "minute")
    } else {
        (secs, "second")
    };

    if amount == 1 {
        format!("{amount} {unit}")
    } else {
        format!("{amount} {unit}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(extra: &[(&str, &str)]) -> Vec<(String, String)> {
        let mut base = vec![
            ("DATABASE_URL".to_string(), "postgres://localhost/warden".to_string()),
            ("SECRET_KEY".to_string(), "0123456789abcdef0123".to_string()),
        ];
        base.extend(extra.iter().map(|(k, v)| (k.to_string(), v.to_string())));
        base
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_pairs(pairs(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.login_url, "/login");
        assert!(config.registerable);
        assert!(config.confirmable);
        assert!(!config.passwordless);
        assert_eq!(config.reset_password_within_secs, 5 * DAY_SECS);
        assert_eq!(config.login_within_secs, DAY_SECS);
        assert!(config.auth_token_max_age_secs.is_none());
        assert!(config.confirmation_blocks_login());
    }

    #[test]
    fn test_short_secret_rejected() {
        let mut p = pairs(&[]);
        p[1].1 = "short".to_string();
        let result = Config::from_pairs(p);
        assert!(matches!(result, Err(ConfigError::SecretKeyTooShort)));
    }

    #[test]
    fn test_relative_path_rejected() {
        let result = Config::from_pairs(pairs(&[("LOGIN_URL", "login")]));
        assert!(matches!(result, Err(ConfigError::InvalidPath { .. })));
    }

    #[test]
    fn test_login_without_confirmation() {
        let config =
            Config::from_pairs(pairs(&[("LOGIN_WITHOUT_CONFIRMATION", "true")])).unwrap();
        assert!(!config.confirmation_blocks_login());
    }

    #[test]
    fn test_external_link() {
        let config =
            Config::from_pairs(pairs(&[("EXTERNAL_URL", "https://example.com/")])).unwrap();
        assert_eq!(
            config.external_link("/confirm/abc"),
            "https://example.com/confirm/abc"
        );
    }

    #[test]
    fn test_describe_window() {
        assert_eq!(describe_window(5 * DAY_SECS), "5 days");
        assert_eq!(describe_window(DAY_SECS), "1 day");
        assert_eq!(describe_window(7200), "2 hours");
        assert_eq!(describe_window(90), "90 seconds");
    }
}
