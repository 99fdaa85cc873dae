pub mod confirm;
pub mod health;
pub mod home;
pub mod login;
pub mod logout;
pub mod password_reset;
pub mod passwordless;
pub mod register;

use serde::Deserialize;

pub use confirm::{confirm_email, send_confirmation, send_confirmation_form};
pub use health::health_check;
pub use home::{home, secrets};
pub use login::{login, login_form};
pub use logout::logout;
pub use password_reset::{forgot_password, forgot_password_form, reset_password, reset_password_form};
pub use passwordless::{send_login, send_login_form, token_login};
pub use register::{register, register_form};

/// `?next=` クエリ
#[derive(Debug, Default, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}
