//! garde のカスタムルールと固定メッセージ

use regex::Regex;

pub const EMAIL_NOT_PROVIDED: &str = "Email not provided";
pub const INVALID_EMAIL: &str = "Invalid email address";
pub const USER_DOES_NOT_EXIST: &str = "Specified user does not exist";
pub const PASSWORD_NOT_PROVIDED: &str = "Password not provided";
pub const PASSWORD_LENGTH: &str = "Password must be between 6 and 128 characters";
pub const PASSWORDS_DO_NOT_MATCH: &str = "Passwords do not match";
pub const INVALID_PASSWORD: &str = "Invalid password";
pub const CONFIRMATION_REQUIRED: &str = "Email requires confirmation.";
pub const DISABLED_ACCOUNT: &str = "Account is disabled.";
pub const ALREADY_CONFIRMED: &str = "Your email has already been confirmed.";

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MAX_PASSWORD_LEN: usize = 128;

const EMAIL_PATTERN: &str = r"^[^@\s]+@[^@\s]+\.[^@\s]+$";

pub fn email_already_registered(email: &str) -> String {
    format!("{email} is already associated with an account")
}

/// 簡易的なメール形式チェック
pub fn is_valid_email(email: &str) -> bool {
    Regex::new(EMAIL_PATTERN).is_ok_and(|re| re.is_match(email))
}

/// 必須 + メール形式
pub fn email_address(value: &str, _: &()) -> garde::Result {
    let value = value.trim();
    if value.is_empty() {
        return Err(garde::Error::new(EMAIL_NOT_PROVIDED));
    }
    if !is_valid_email(value) {
        return Err(garde::Error::new(INVALID_EMAIL));
    }
    Ok(())
}

/// 必須のみ（ログイン時）
pub fn password_present(value: &str, _: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new(PASSWORD_NOT_PROVIDED));
    }
    Ok(())
}

/// 必須 + 文字数（新規パスワード）
pub fn new_password(value: &str, _: &()) -> garde::Result {
    if value.is_empty() {
        return Err(garde::Error::new(PASSWORD_NOT_PROVIDED));
    }
    let len = value.chars().count();
    if !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&len) {
        return Err(garde::Error::new(PASSWORD_LENGTH));
    }
    Ok(())
}

/// 確認用パスワードの一致
pub fn matches_password(password: &str) -> impl FnOnce(&str, &()) -> garde::Result + '_ {
    move |value, _| {
        if value != password {
            return Err(garde::Error::new(PASSWORDS_DO_NOT_MATCH));
        }
        Ok(())
    }
}
