//! Router の構築
//!
//! 本番バイナリと結合テストで同じ Router を使う。
//! 無効化された機能のルートはマウントしない。

use axum::Router;
use axum::routing::get;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::handlers;
use crate::state::AppState;

fn token_path(base: &str) -> String {
    format!("{base}/{{token}}")
}

/// Router の構築
pub fn create_router(state: AppState) -> Router {
    let config = state.config.clone();

    let mut router = Router::new()
        .route("/", get(handlers::home))
        .route("/secrets", get(handlers::secrets))
        .route("/health", get(handlers::health_check))
        .route(&config.logout_url, get(handlers::logout));

    router = if config.passwordless {
        router
            .route(
                &config.login_url,
                get(handlers::send_login_form).post(handlers::send_login),
            )
            .route(&token_path(&config.login_url), get(handlers::token_login))
    } else {
        router.route(
            &config.login_url,
            get(handlers::login_form).post(handlers::login),
        )
    };

    if config.registerable {
        router = router.route(
            &config.register_url,
            get(handlers::register_form).post(handlers::register),
        );
    }

    if config.recoverable {
        router = router
            .route(
                &config.reset_url,
                get(handlers::forgot_password_form).post(handlers::forgot_password),
            )
            .route(
                &token_path(&config.reset_url),
                get(handlers::reset_password_form).post(handlers::reset_password),
            );
    }

    if config.confirmable {
        router = router
            .route(
                &config.confirm_url,
                get(handlers::send_confirmation_form).post(handlers::send_confirmation),
            )
            .route(&token_path(&config.confirm_url), get(handlers::confirm_email));
    }

    tracing::debug!(
        passwordless = config.passwordless,
        registerable = config.registerable,
        recoverable = config.recoverable,
        confirmable = config.confirmable,
        "ルート構築"
    );

    router
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}
