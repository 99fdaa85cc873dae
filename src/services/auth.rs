use argon2::password_hash::SaltString;
use argon2::password_hash::rand_core::OsRng;
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};

use crate::error::AppError;
use crate::models::User;

/// パスワードをargon2idでハッシュ化
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!(error = ?e, "パスワードハッシュ生成エラー");
            AppError::Internal(anyhow::anyhow!("password hash error"))
        })?;
    Ok(hash.to_string())
}

/// パスワードを検証
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| {
        tracing::error!(error = ?e, "パスワードハッシュのパースエラー");
        AppError::Internal(anyhow::anyhow!("password hash parse error"))
    })?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// ユーザーのパスワードを検証（パスワード未設定なら常に不一致）
pub fn verify_user_password(user: &User, password: &str) -> Result<bool, AppError> {
    match &user.password {
        Some(hash) => verify_password(password, hash),
        None => Ok(false),
    }
}

/// 現在のパスワードハッシュの指紋
///
/// トークンに埋め込み、パスワード変更後の再利用を防ぐ。
pub fn password_fingerprint(user: &User) -> String {
    let mut hasher = Sha256::new();
    hasher.update(user.password.as_deref().unwrap_or_default().as_bytes());
    URL_SAFE_NO_PAD.encode(&hasher.finalize()[..16])
}
