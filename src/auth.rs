use crate::models::{AppData, PublicUser, SessionResponse, User};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Username already exists")]
    UsernameTaken,
    #[error("Invalid username or password")]
    InvalidCredentials,
    #[error("Username and password are required")]
    InvalidUsername,
}

pub fn register(
    data: &mut AppData,
    username: &str,
    password: &str,
) -> Result<SessionResponse, AuthError> {
    let username = username.trim();
    if username.is_empty() || password.is_empty() {
        return Err(AuthError::InvalidUsername);
    }
    if data.users.iter().any(|user| user.username == username) {
        return Err(AuthError::UsernameTaken);
    }

    let salt = Uuid::new_v4().simple().to_string();
    let user = User {
        id: Uuid::new_v4().to_string(),
        username: username.to_string(),
        password_hash: hash_password(&salt, password),
        salt,
    };
    let session = open_session(data, &user);
    data.users.push(user);
    Ok(session)
}

pub fn login(
    data: &mut AppData,
    username: &str,
    password: &str,
) -> Result<SessionResponse, AuthError> {
    let username = username.trim();
    let user = data
        .users
        .iter()
        .find(|user| {
            user.username == username && user.password_hash == hash_password(&user.salt, password)
        })
        .cloned()
        .ok_or(AuthError::InvalidCredentials)?;
    Ok(open_session(data, &user))
}

pub fn logout(data: &mut AppData, token: &str) -> bool {
    data.sessions.remove(token).is_some()
}

pub fn session_user(data: &AppData, token: &str) -> Option<PublicUser> {
    let user_id = data.sessions.get(token)?;
    data.users
        .iter()
        .find(|user| &user.id == user_id)
        .map(PublicUser::from)
}

fn open_session(data: &mut AppData, user: &User) -> SessionResponse {
    let token = Uuid::new_v4().to_string();
    data.sessions.insert(token.clone(), user.id.clone());
    SessionResponse {
        token,
        user: PublicUser::from(user),
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}
