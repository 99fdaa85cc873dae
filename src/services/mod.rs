pub mod auth;
pub mod confirmation;
pub mod email;
pub mod password_reset;
pub mod passwordless;
pub mod registration;
#[cfg(feature = "email")]
pub mod smtp;
pub mod token;

pub use confirmation::ConfirmationService;
pub use email::{EmailService, LogTransport, MailTransport, OutgoingMail};
pub use password_reset::PasswordResetService;
pub use passwordless::PasswordlessService;
pub use registration::RegistrationService;
pub use token::{TokenKind, TokenService, TokenSigner, TokenStatus};
