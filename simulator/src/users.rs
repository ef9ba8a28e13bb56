//! Simulated marketplace users.

use escrowcore_common::UserId;

/// A simulated marketplace user.
#[derive(Debug, Clone)]
pub struct SimulatedUser {
    /// Identity on the ledger.
    pub id: UserId,
    /// Display name for logs.
    pub name: String,
}

impl SimulatedUser {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: UserId::new(id),
            name: name.into(),
        }
    }
}

/// Factory for creating simulated user populations.
pub struct UserFactory;

impl UserFactory {
    /// Create the requested number of users. The first few get fixed
    /// handles so logs stay readable across runs.
    pub fn create_users(count: usize) -> Vec<SimulatedUser> {
        let named = [
            ("alice", "Alice Navarro"),
            ("bruno", "Bruno Feld"),
            ("chen", "Chen Osei"),
            ("dalia", "Dalia Reyes"),
            ("elio", "Elio Stamm"),
            ("farah", "Farah Iqbal"),
            ("gus", "Gus Moreau"),
            ("hana", "Hana Volkov"),
            ("ivo", "Ivo Sandoval"),
            ("june", "June Akintola"),
        ];

        (0..count)
            .map(|i| {
                if i < named.len() {
                    let (id, name) = named[i];
                    SimulatedUser::new(id, name)
                } else {
                    SimulatedUser::new(format!("user_{}", i + 1), format!("User {}", i + 1))
                }
            })
            .collect()
    }
}
