use serde::{Deserialize, Serialize};

/// User record as persisted under the `users` key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: i64,          // creation-time id
    pub email: String,    // unique, compared exactly
    pub password: String, // stored as entered
}

/// User as handed out to callers: no password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PublicUser {
    pub id: i64,
    pub email: String,
}

impl From<&User> for PublicUser {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
        }
    }
}

/// The logged-in identity. Persisted under `currentUser`, never carries a password.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub email: String,
}

impl From<&User> for Session {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
        }
    }
}
