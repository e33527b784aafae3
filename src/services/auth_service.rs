use tracing::{error, info, warn};

use crate::db::{AuthError, AuthStore, User};
use crate::db::auth_store::personal_group_name;
use crate::sessions::{SessionError, SessionStore};

pub const AUTH_USER_KEY: &str = "_auth_user_id";
pub const USERNAME_KEY: &str = "username";
pub const FIRST_NAME_KEY: &str = "first_name";
pub const LAST_NAME_KEY: &str = "last_name";
pub const PERSONAL_GROUP_KEY: &str = "personal_group_id";

/// Lifetime of a freshly logged-in session, in seconds
pub const LOGIN_SESSION_EXPIRY: u64 = 300;

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("account created but login failed")]
    Login,
}

// Validate credentials and populate the session for the user.
// Shared by login and signup. Returns false without touching the session
// when the credentials are wrong or the user has no personal group.
pub async fn auth_login_session(
    auth: &dyn AuthStore,
    session: &mut SessionStore,
    username: &str,
    password: &str,
) -> bool {
    let user = match auth.authenticate(username, password).await {
        Ok(Some(user)) => user,
        Ok(None) => return false,
        Err(e) => {
            error!("Authentication failed for '{}': {}", username, e);
            return false;
        }
    };

    let group = match auth.personal_group(&user).await {
        Ok(Some(group)) => group,
        Ok(None) => {
            warn!("User '{}' has no personal group '{}'", user.username, personal_group_name(&user));
            return false;
        }
        Err(e) => {
            error!("Failed to look up personal group for '{}': {}", user.username, e);
            return false;
        }
    };

    match establish_session(session, &user, group.id).await {
        Ok(()) => {
            info!("User '{}' logged in", user.username);
            true
        }
        Err(e) => {
            error!("Failed to establish session for '{}': {}", user.username, e);
            false
        }
    }
}

// The key cycle is the only step that writes to the backend, and it leaves
// the session as it was on failure. The inserts that follow run against the
// already loaded data.
async fn establish_session(session: &mut SessionStore, user: &User, group_id: i64) -> Result<(), SessionError> {
    session.cycle_key().await?;
    session.insert(AUTH_USER_KEY, user.id.to_string()).await?;
    session.set_expiry(LOGIN_SESSION_EXPIRY).await?;
    session.insert(USERNAME_KEY, user.username.clone()).await?;
    session.insert(FIRST_NAME_KEY, user.first_name.clone()).await?;
    session.insert(LAST_NAME_KEY, user.last_name.clone()).await?;
    session.insert(PERSONAL_GROUP_KEY, group_id.to_string()).await?;
    Ok(())
}

/// Create the account, its profile and its personal group, then log in.
pub async fn signup(
    auth: &dyn AuthStore,
    session: &mut SessionStore,
    username: &str,
    password: &str,
    bio: &str,
) -> Result<User, SignupError> {
    let user = auth.create_user(username, password).await?;
    auth.create_profile(&user, bio).await?;

    // A group of one, so data is owned at group level from the start.
    let group = auth.get_or_create_group(&personal_group_name(&user)).await?;
    auth.add_user_to_group(&user, &group).await?;

    if !auth_login_session(auth, session, username, password).await {
        return Err(SignupError::Login);
    }
    Ok(user)
}

/// Drop all session data and the stored entry.
pub async fn logout(session: &mut SessionStore) -> Result<(), SessionError> {
    session.flush().await
}
