#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tokio::sync::Mutex;
use tower::ServiceExt;

use warden::config::Config;
use warden::error::AppError;
use warden::models::User;
use warden::repositories::{Change, MemoryUserDatastore, NewUser, UnitOfWork, UserDatastore};
use warden::routes::create_router;
use warden::services::auth::hash_password;
use warden::services::{MailTransport, OutgoingMail};
use warden::state::AppState;

pub const EXTERNAL_URL: &str = "http://localhost";
pub const PASSWORD: &str = "password";

/// 送信されたメールを記録する配送手段
#[derive(Default)]
pub struct Outbox {
    mails: Mutex<Vec<OutgoingMail>>,
    fail_subject: Option<&'static str>,
}

impl Outbox {
    /// 指定した件名のメールだけ配送に失敗する
    pub fn failing_on(subject: &'static str) -> Self {
        Self {
            fail_subject: Some(subject),
            ..Default::default()
        }
    }

    pub async fn mails(&self) -> Vec<OutgoingMail> {
        self.mails.lock().await.clone()
    }

    pub async fn count(&self) -> usize {
        self.mails.lock().await.len()
    }

    pub async fn clear(&self) {
        self.mails.lock().await.clear();
    }

    /// 最後のメール本文に含まれるリンクのパス部分
    pub async fn last_link_path(&self) -> Option<String> {
        let mails = self.mails.lock().await;
        let body = &mails.last()?.body;
        let start = body.find(EXTERNAL_URL)?;
        let link = body[start..].split_whitespace().next()?;
        Some(link.trim_start_matches(EXTERNAL_URL).to_string())
    }
}

#[async_trait]
impl MailTransport for Outbox {
    async fn deliver(&self, mail: OutgoingMail) -> Result<(), AppError> {
        if self.fail_subject == Some(mail.subject.as_str()) {
            return Err(AppError::Mail("relay unavailable".to_string()));
        }
        self.mails.lock().await.push(mail);
        Ok(())
    }
}

/// Build a test `Config` with safe defaults plus overrides.
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut pairs = vec![
        ("DATABASE_URL", "postgres://localhost/warden_test"),
        ("SECRET_KEY", "integration-test-secret-key"),
        ("EXTERNAL_URL", EXTERNAL_URL),
    ];
    pairs.extend_from_slice(extra);

    Config::from_pairs(
        pairs
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string())),
    )
    .expect("test config should be valid")
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: MemoryUserDatastore,
    pub outbox: Arc<Outbox>,
}

/// Build the full application router backed by the in-memory datastore.
pub fn build_test_app(extra: &[(&str, &str)]) -> TestApp {
    build_test_app_with_outbox(extra, Outbox::default())
}

/// 配送手段を差し替えて構築
pub fn build_test_app_with_outbox(extra: &[(&str, &str)], outbox: Outbox) -> TestApp {
    let store = MemoryUserDatastore::new();
    let outbox = Arc::new(outbox);
    let state = AppState::new(test_config(extra), Arc::new(store.clone()), outbox.clone())
        .expect("state should build");

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        outbox,
    }
}

impl TestApp {
    /// Cookie を引き継ぐクライアント
    pub fn client(&self) -> Client {
        Client {
            router: self.router.clone(),
            cookie: None,
        }
    }

    pub async fn create_user(&self, email: &str) -> User {
        let mut work = UnitOfWork::new();
        work.push(Change::CreateUser(NewUser {
            email: email.to_string(),
            password: hash_password(PASSWORD).expect("hashing should succeed"),
            active: true,
            roles: Vec::new(),
        }));
        self.store
            .commit(work)
            .await
            .expect("user creation should succeed")
            .remove(0)
    }

    pub async fn create_confirmed_user(&self, email: &str) -> User {
        let user = self.create_user(email).await;
        let mut work = UnitOfWork::new();
        work.push(Change::Confirm {
            user_id: user.id,
            at: time::OffsetDateTime::now_utc(),
        });
        self.store.commit(work).await.expect("confirm should succeed");
        self.find_user(email).await
    }

    pub async fn deactivate(&self, user: &User) {
        let mut work = UnitOfWork::new();
        work.deactivate_user(user);
        self.store.commit(work).await.expect("deactivate should succeed");
    }

    pub async fn find_user(&self, email: &str) -> User {
        self.store
            .find_user_by_email(email)
            .await
            .expect("lookup should succeed")
            .expect("user should exist")
    }
}

/// セッションCookieを保持してリクエストを送る
pub struct Client {
    router: Router,
    pub cookie: Option<String>,
}

impl Client {
    pub async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(COOKIE, cookie.parse().expect("valid cookie header"));
        }

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request should complete");

        if let Some(set_cookie) = session_set_cookie(&response) {
            self.cookie = if set_cookie.contains("Max-Age=0") {
                None
            } else {
                set_cookie.split(';').next().map(str::to_string)
            };
        }
        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        let request = Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    pub async fn get_with_token(&mut self, uri: &str, token: &str) -> Response<Body> {
        let request = Request::builder()
            .uri(uri)
            .header("Authentication-Token", token)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    pub async fn post_form(&mut self, uri: &str, fields: &[(&str, &str)]) -> Response<Body> {
        let body = fields
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .expect("valid request");
        self.send(request).await
    }

    pub async fn post_json(&mut self, uri: &str, json: serde_json::Value) -> Response<Body> {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    /// フォームでログインする
    pub async fn login(&mut self, email: &str) -> Response<Body> {
        self.post_form("/login", &[("email", email), ("password", PASSWORD)])
            .await
    }
}

pub fn session_set_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("session="))
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("response should redirect")
        .to_string()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    String::from_utf8(bytes.to_vec()).expect("body should be utf-8")
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should be readable")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("body should be json")
}
