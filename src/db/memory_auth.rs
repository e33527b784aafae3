use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::auth_store::{
    hash_password, personal_group_name, verify_password, AuthError, AuthStore, Group, User,
};

#[derive(Default)]
struct Tables {
    users: Vec<(User, String)>,
    profiles: HashMap<i64, String>,
    groups: Vec<Group>,
    memberships: HashSet<(i64, i64)>,
}

/// In-process authentication store, used when no database URL is configured
#[derive(Default)]
pub struct MemoryAuthStore {
    tables: Mutex<Tables>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn profile_bio(&self, user: &User) -> Option<String> {
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.profiles.get(&user.id).cloned()
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn authenticate(&self, username: &str, password: &str) -> Result<Option<User>, AuthError> {
        let candidate = {
            let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
            tables.users.iter().find(|(user, _)| user.username == username).cloned()
        };
        let Some((user, hash)) = candidate else {
            return Ok(None);
        };
        Ok(verify_password(password, &hash).await.then_some(user))
    }

    async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let password_hash = hash_password(password).await?;
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if tables.users.iter().any(|(u, _)| u.username == username) {
            return Err(AuthError::DuplicateUser(username.to_string()));
        }
        let user = User {
            id: tables.users.len() as i64 + 1,
            username: username.to_string(),
            first_name: String::new(),
            last_name: String::new(),
        };
        tables.users.push((user.clone(), password_hash));
        Ok(user)
    }

    async fn create_profile(&self, user: &User, bio: &str) -> Result<(), AuthError> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.profiles.insert(user.id, bio.to_string());
        Ok(())
    }

    async fn get_or_create_group(&self, name: &str) -> Result<Group, AuthError> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(group) = tables.groups.iter().find(|g| g.name == name) {
            return Ok(group.clone());
        }
        let group = Group {
            id: tables.groups.len() as i64 + 1,
            name: name.to_string(),
        };
        tables.groups.push(group.clone());
        Ok(group)
    }

    async fn add_user_to_group(&self, user: &User, group: &Group) -> Result<(), AuthError> {
        let mut tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        tables.memberships.insert((user.id, group.id));
        Ok(())
    }

    async fn personal_group(&self, user: &User) -> Result<Option<Group>, AuthError> {
        let name = personal_group_name(user);
        let tables = self.tables.lock().unwrap_or_else(|e| e.into_inner());
        Ok(tables
            .groups
            .iter()
            .find(|g| g.name == name && tables.memberships.contains(&(user.id, g.id)))
            .cloned())
    }
}
