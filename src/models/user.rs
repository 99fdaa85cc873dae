use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

use crate::models::Role;

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    /// argon2id の PHC 文字列
    #[serde(skip)]
    pub password: Option<String>,
    pub active: bool,
    #[serde(with = "time::serde::rfc3339::option")]
    pub confirmed_at: Option<OffsetDateTime>,
    #[sqlx(skip)]
    pub roles: Vec<Role>,
}

impl User {
    pub fn is_confirmed(&self) -> bool {
        self.confirmed_at.is_some()
    }

    pub fn has_role(&self, name: &str) -> bool {
        self.roles.iter().any(|role| role.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_role() {
        let user = User {
            id: 1,
            email: "matt@example.com".to_string(),
            password: None,
            active: true,
            confirmed_at: None,
            roles: vec![Role {
                id: 1,
                name: "admin".to_string(),
                description: None,
            }],
        };

        assert!(user.has_role("admin"));
        assert!(!user.has_role("editor"));
        assert!(!user.is_confirmed());
    }

    #[test]
    fn test_password_not_serialized() {
        let user = User {
            id: 7,
            email: "joe@example.com".to_string(),
            password: Some("$argon2id$secret".to_string()),
            active: true,
            confirmed_at: Some(OffsetDateTime::UNIX_EPOCH),
            roles: Vec::new(),
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert_eq!(json["email"], "joe@example.com");
        assert_eq!(json["confirmed_at"], "1970-01-01T00:00:00Z");
    }
}
