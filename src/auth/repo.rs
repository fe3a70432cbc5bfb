use tracing::{info, warn};

use crate::auth::repo_types::{PublicUser, Session, User};
use crate::records::{RecordStore, StoreError, StoreResult, CURRENT_USER, USERS};

impl User {
    /// Appends a new user. Fails with `DuplicateEmail` when the exact email exists.
    pub async fn register(store: &RecordStore, email: &str, password: &str) -> StoreResult<PublicUser> {
        let _guard = store.lock(USERS).await;
        let mut users: Vec<User> = store.load(USERS).await?;

        if users.iter().any(|u| u.email == email) {
            warn!(email, "email already registered");
            return Err(StoreError::DuplicateEmail);
        }

        let floor = users.iter().map(|u| u.id).max().unwrap_or(0);
        let user = User {
            id: store.next_id(floor),
            email: email.to_string(),
            password: password.to_string(),
        };
        users.push(user.clone());
        store.save(USERS, &users).await?;

        info!(user_id = user.id, email = %user.email, "user registered");
        Ok(PublicUser::from(&user))
    }

    /// Exact email + password match. A match also becomes the current session.
    pub async fn validate(store: &RecordStore, email: &str, password: &str) -> StoreResult<Option<Session>> {
        let users: Vec<User> = store.load(USERS).await?;
        let Some(user) = users
            .iter()
            .find(|u| u.email == email && u.password == password)
        else {
            warn!(email, "invalid credentials");
            return Ok(None);
        };

        let session = Session::from(user);
        store.save_slot(CURRENT_USER, &session).await?;
        info!(user_id = session.id, "session started");
        Ok(Some(session))
    }
}

impl Session {
    /// Session persisted by the last successful login, if any.
    pub async fn current(store: &RecordStore) -> StoreResult<Option<Session>> {
        store.load_slot(CURRENT_USER).await
    }

    /// Session guard: the persisted slot must still name this session's user.
    pub async fn require(store: &RecordStore, session: &Session) -> StoreResult<Session> {
        match Self::current(store).await? {
            Some(current) if current.id == session.id => Ok(current),
            Some(current) => {
                warn!(expected = session.id, current = current.id, "stale session");
                Err(StoreError::NoUserLoggedIn)
            }
            None => Err(StoreError::NoUserLoggedIn),
        }
    }

    pub async fn logout(store: &RecordStore) -> StoreResult<()> {
        store.clear_slot(CURRENT_USER).await?;
        info!("session cleared");
        Ok(())
    }
}
