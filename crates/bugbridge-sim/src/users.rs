use bugbridge_core::User;

/// A registered account. Accounts without a password accept any password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub user: User,
    pub password: Option<String>,
}

/// Accounts known to the backend, in registration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserDirectory {
    accounts: Vec<Account>,
}

impl UserDirectory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an account. Re-registering a username replaces it.
    pub fn add(&mut self, user: User, password: Option<String>) {
        self.accounts.retain(|a| a.user.username != user.username);
        self.accounts.push(Account { user, password });
    }

    /// Look up by username, display name, or any email.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&User> {
        self.accounts
            .iter()
            .map(|a| &a.user)
            .find(|user| user.matches(key))
    }

    /// Resolve a login/password pair to its account.
    #[must_use]
    pub fn authenticate(&self, login: &str, password: &str) -> Option<&User> {
        self.accounts
            .iter()
            .find(|a| a.user.matches(login))
            .filter(|a| a.password.as_deref().is_none_or(|expected| expected == password))
            .map(|a| &a.user)
    }

    pub fn iter(&self) -> impl Iterator<Item = &User> {
        self.accounts.iter().map(|a| &a.user)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> UserDirectory {
        let mut users = UserDirectory::new();
        users.add(
            User::new("Tim Contributor", "tcontributor@example.com", vec!["tcontributor@example.com".into()]),
            Some("password".into()),
        );
        users.add(User::new("Felix Filer", "ffiler@example.com", vec![]), None);
        users
    }

    #[test]
    fn lookup_by_any_identifier() {
        let users = directory();
        assert_eq!(users.get("Tim Contributor").map(|u| u.username.as_str()), Some("tcontributor@example.com"));
        assert!(users.get("nobody@example.com").is_none());
    }

    #[test]
    fn password_checked_when_registered() {
        let users = directory();
        assert!(users.authenticate("tcontributor@example.com", "password").is_some());
        assert!(users.authenticate("tcontributor@example.com", "wrong").is_none());
        assert!(users.authenticate("ffiler@example.com", "anything").is_some());
        assert!(users.authenticate("ghost@example.com", "password").is_none());
    }
}
