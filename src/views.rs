//! レスポンスの組み立て
//!
//! HTML はフォームとフラッシュを並べるだけの最小構成。
//! JSON は `{"meta": {"code": N}, "response": {...}}` の封筒形式。

use axum::Json;
use axum::response::{Html, IntoResponse, Response};
use http::StatusCode;
use serde_json::{Value, json};

use crate::config::Config;
use crate::forms::FormErrors;
use crate::models::User;
use crate::session::Flash;

/// HTML エスケープ
pub fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// 入力欄の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Email,
    Password,
    Checkbox,
    Hidden,
}

#[derive(Debug, Clone)]
pub struct Field<'a> {
    pub name: &'a str,
    pub label: &'a str,
    pub kind: FieldKind,
    pub value: Option<&'a str>,
}

impl<'a> Field<'a> {
    pub fn email(value: &'a str) -> Self {
        Self {
            name: "email",
            label: "Email Address",
            kind: FieldKind::Email,
            value: Some(value),
        }
    }

    pub fn password(name: &'a str, label: &'a str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Password,
            value: None,
        }
    }

    pub fn checkbox(name: &'a str, label: &'a str) -> Self {
        Self {
            name,
            label,
            kind: FieldKind::Checkbox,
            value: None,
        }
    }

    /// 値が無ければ出力しない
    pub fn hidden(name: &'a str, value: Option<&'a str>) -> Self {
        Self {
            name,
            label: "",
            kind: FieldKind::Hidden,
            value,
        }
    }

    fn render(&self, errors: &FormErrors, out: &mut String) {
        let name = escape(self.name);
        let value = escape(self.value.unwrap_or_default());

        match self.kind {
            FieldKind::Hidden => {
                if self.value.is_some_and(|v| !v.is_empty()) {
                    out.push_str(&format!(
                        "<input type=\"hidden\" name=\"{name}\" value=\"{value}\">\n"
                    ));
                }
                return;
            }
            FieldKind::Checkbox => out.push_str(&format!(
                "<p><label><input type=\"checkbox\" name=\"{name}\" value=\"y\"> {}</label></p>\n",
                escape(self.label)
            )),
            FieldKind::Email => out.push_str(&format!(
                "<p><label for=\"{name}\">{}</label> <input type=\"email\" id=\"{name}\" name=\"{name}\" value=\"{value}\"></p>\n",
                escape(self.label)
            )),
            FieldKind::Password => out.push_str(&format!(
                "<p><label for=\"{name}\">{}</label> <input type=\"password\" id=\"{name}\" name=\"{name}\"></p>\n",
                escape(self.label)
            )),
        }

        let messages = errors.field(self.name);
        if !messages.is_empty() {
            out.push_str("<ul class=\"errors\">\n");
            for message in messages {
                out.push_str(&format!("<li>{}</li>\n", escape(message)));
            }
            out.push_str("</ul>\n");
        }
    }
}

/// フォームの描画内容
pub struct FormView<'a> {
    pub action: &'a str,
    pub submit: &'a str,
    pub fields: Vec<Field<'a>>,
    pub errors: &'a FormErrors,
}

fn layout(title: &str, flashes: &[Flash], body: &str) -> Html<String> {
    let mut page = format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>{0}</title></head>\n<body>\n<h1>{0}</h1>\n",
        escape(title)
    );

    if !flashes.is_empty() {
        page.push_str("<ul class=\"flashes\">\n");
        for flash in flashes {
            page.push_str(&format!(
                "<li class=\"{}\">{}</li>\n",
                flash.category.as_str(),
                escape(&flash.message)
            ));
        }
        page.push_str("</ul>\n");
    }

    page.push_str(body);
    page.push_str("</body>\n</html>\n");
    Html(page)
}

/// フォームページ
pub fn form_page(title: &str, flashes: &[Flash], form: FormView<'_>) -> Html<String> {
    let mut body = format!(
        "<form action=\"{}\" method=\"post\">\n",
        escape(form.action)
    );
    for field in &form.fields {
        field.render(form.errors, &mut body);
    }
    body.push_str(&format!(
        "<p><input type=\"submit\" value=\"{}\"></p>\n</form>\n",
        escape(form.submit)
    ));
    layout(title, flashes, &body)
}

/// 本文のみのページ
pub fn message_page(title: &str, flashes: &[Flash], message: &str) -> Html<String> {
    layout(title, flashes, &format!("<p>{}</p>\n", escape(message)))
}

/// 成功時の JSON（ユーザーIDと認証トークン）
pub fn json_user(user: &User, authentication_token: &str) -> Response {
    json_envelope(
        StatusCode::OK,
        json!({
            "user": {
                "id": user.id.to_string(),
                "authentication_token": authentication_token,
            }
        }),
    )
}

/// 確認待ちユーザーの JSON（トークンなし）
pub fn json_user_id(user: &User) -> Response {
    json_envelope(
        StatusCode::OK,
        json!({ "user": { "id": user.id.to_string() } }),
    )
}

/// 成功時の JSON（本文なし）
pub fn json_ok() -> Response {
    json_envelope(StatusCode::OK, json!({}))
}

/// 入力エラーの JSON
pub fn json_errors(errors: &FormErrors) -> Response {
    json_envelope(StatusCode::BAD_REQUEST, json!({ "errors": errors }))
}

fn json_envelope(status: StatusCode, response: Value) -> Response {
    let body = json!({
        "meta": { "code": status.as_u16() },
        "response": response,
    });
    (status, Json(body)).into_response()
}

/// 同一オリジン内のパスだけを遷移先として許可
pub fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|path| {
        path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
    })
}

/// `next` → 指定の遷移先 → ログイン後の既定
pub fn redirect_target<'a>(
    config: &'a Config,
    next: Option<&'a str>,
    configured: Option<&'a str>,
) -> &'a str {
    safe_next(next)
        .or(configured)
        .unwrap_or(config.post_login_view.as_str())
}

/// ログインページのURL（戻り先付き）
pub fn login_redirect_url(config: &Config, next: &str) -> String {
    format!("{}?next={}", config.login_url, urlencoding::encode(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::FlashCategory;

    #[test]
    fn test_escape() {
        assert_eq!(
            escape(r#"<a href="x">'&'</a>"#),
            "&lt;a href=&quot;x&quot;&gt;&#x27;&amp;&#x27;&lt;/a&gt;"
        );
    }

    #[test]
    fn test_safe_next() {
        assert_eq!(safe_next(Some("/secrets")), Some("/secrets"));
        assert_eq!(safe_next(Some("/a?b=c")), Some("/a?b=c"));
        assert_eq!(safe_next(Some("http://evil.com/")), None);
        assert_eq!(safe_next(Some("//evil.com")), None);
        assert_eq!(safe_next(Some("/\\evil.com")), None);
        assert_eq!(safe_next(Some("")), None);
        assert_eq!(safe_next(None), None);
    }

    #[test]
    fn test_form_page_renders_errors_and_flashes() {
        let mut errors = FormErrors::new();
        errors.add("email", "Invalid email address");
        let flashes = [Flash {
            category: FlashCategory::Error,
            message: "Invalid login token.".to_string(),
        }];

        let Html(page) = form_page(
            "Login",
            &flashes,
            FormView {
                action: "/login",
                submit: "Login",
                fields: vec![
                    Field::email("<bad>"),
                    Field::password("password", "Password"),
                    Field::hidden("next", Some("/secrets")),
                    Field::hidden("skipped", None),
                ],
                errors: &errors,
            },
        );

        assert!(page.contains("<li class=\"error\">Invalid login token.</li>"));
        assert!(page.contains("<li>Invalid email address</li>"));
        assert!(page.contains("value=\"&lt;bad&gt;\""));
        assert!(page.contains("name=\"next\" value=\"/secrets\""));
        assert!(!page.contains("skipped"));
    }

    #[tokio::test]
    async fn test_json_envelope() {
        use http_body_util::BodyExt;

        let mut errors = FormErrors::new();
        errors.add("email", "Specified user does not exist");
        let response = json_errors(&errors);
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["meta"]["code"], 400);
        assert_eq!(
            body["response"]["errors"]["email"][0],
            "Specified user does not exist"
        );
    }
}
