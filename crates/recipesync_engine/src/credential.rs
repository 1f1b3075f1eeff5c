//! Credential gate and sign-in session.
//!
//! Tokens and the user profile are single-slot tables: storing a new value
//! retires every previous one in the same transaction.

use recipesync_store::{
    now_millis, Credential, Filter, LocalStore, Model, Profile, StoreResult, Table, WriteTxn,
};
use std::sync::Arc;
use tracing::debug;

fn replace_slot<M: Model>(txn: &mut WriteTxn<'_>, model: &M) -> StoreResult<()> {
    retire_all(txn, M::TABLE)?;
    txn.create(M::TABLE, model.to_fields());
    Ok(())
}

fn retire_all(txn: &mut WriteTxn<'_>, table: Table) -> StoreResult<usize> {
    let live = txn.query(table, &Filter::all());
    for record in &live {
        txn.retire(record)?;
    }
    Ok(live.len())
}

fn newest<M: Model>(store: &LocalStore) -> Option<M> {
    store
        .query(M::TABLE, &Filter::all())
        .last()
        .and_then(|r| M::from_record(r).ok())
}

/// Reads and writes the session credential.
#[derive(Clone)]
pub struct CredentialGate {
    store: Arc<LocalStore>,
}

impl CredentialGate {
    /// Creates a gate over `store`.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Returns the live credential, if signed in.
    pub fn get(&self) -> Option<Credential> {
        newest(&self.store)
    }

    /// Stores `jwt` as the only live credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn set(&self, jwt: &str) -> StoreResult<()> {
        let credential = Credential {
            jwt: jwt.to_string(),
            created_at: now_millis(),
        };
        self.store.atomically(|txn| replace_slot(txn, &credential))?;
        debug!("credential stored");
        Ok(())
    }

    /// Retires every credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn clear(&self) -> StoreResult<()> {
        let cleared = self.store.atomically(|txn| retire_all(txn, Table::Tokens))?;
        debug!(cleared, "credentials cleared");
        Ok(())
    }
}

/// Sign-in state: credential plus profile.
#[derive(Clone)]
pub struct Session {
    store: Arc<LocalStore>,
}

impl Session {
    /// Creates a session view over `store`.
    pub fn new(store: Arc<LocalStore>) -> Self {
        Self { store }
    }

    /// Returns the credential gate of this session.
    pub fn gate(&self) -> CredentialGate {
        CredentialGate::new(Arc::clone(&self.store))
    }

    /// Stores the credential and profile together.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails; nothing is stored then.
    pub fn sign_in(&self, jwt: &str, name: &str, email: &str) -> StoreResult<()> {
        let now = now_millis();
        let credential = Credential {
            jwt: jwt.to_string(),
            created_at: now,
        };
        let profile = Profile {
            name: name.to_string(),
            email: email.to_string(),
            created_at: now,
        };

        self.store.atomically(|txn| {
            replace_slot(txn, &credential)?;
            replace_slot(txn, &profile)
        })?;
        debug!(email, "signed in");
        Ok(())
    }

    /// Returns true if a credential is stored.
    pub fn is_signed_in(&self) -> bool {
        self.gate().get().is_some()
    }

    /// Returns the stored profile.
    pub fn profile(&self) -> Option<Profile> {
        newest(&self.store)
    }

    /// Renames the profile, keeping the stored email unless a new one is
    /// given. Returns the stored profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn update_profile_name(&self, name: &str, email: Option<&str>) -> StoreResult<Profile> {
        let current = self.profile();
        let profile = Profile {
            name: name.to_string(),
            email: email
                .map(str::to_string)
                .or_else(|| current.map(|p| p.email))
                .unwrap_or_default(),
            created_at: now_millis(),
        };
        self.store.atomically(|txn| replace_slot(txn, &profile))?;
        Ok(profile)
    }

    /// Clears credential and profile together.
    ///
    /// This only touches local state. Use the coordinator's `sign_out` to
    /// flush pending changes first.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal write fails.
    pub fn clear(&self) -> StoreResult<()> {
        self.store.atomically(|txn| {
            retire_all(txn, Table::Tokens)?;
            retire_all(txn, Table::Users).map(|_| ())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Arc<LocalStore> {
        Arc::new(LocalStore::open_in_memory().unwrap())
    }

    #[test]
    fn gate_is_single_slot() {
        let store = store();
        let gate = CredentialGate::new(Arc::clone(&store));
        assert!(gate.get().is_none());

        gate.set("first").unwrap();
        gate.set("second").unwrap();

        assert_eq!(gate.get().unwrap().jwt, "second");
        assert_eq!(store.query(Table::Tokens, &Filter::all()).len(), 1);

        gate.clear().unwrap();
        assert!(gate.get().is_none());
    }

    #[test]
    fn sign_in_and_out() {
        let session = Session::new(store());
        session.sign_in("jwt", "Ada", "ada@example.com").unwrap();

        assert!(session.is_signed_in());
        assert_eq!(session.profile().unwrap().email, "ada@example.com");

        session.clear().unwrap();
        assert!(!session.is_signed_in());
        assert!(session.profile().is_none());
    }

    #[test]
    fn rename_keeps_email() {
        let session = Session::new(store());
        session.sign_in("jwt", "Ada", "ada@example.com").unwrap();

        let renamed = session.update_profile_name("Ada L.", None).unwrap();
        assert_eq!(renamed.email, "ada@example.com");
        assert_eq!(session.profile().unwrap().name, "Ada L.");

        let moved = session.update_profile_name("Ada", Some("ada@new.example")).unwrap();
        assert_eq!(moved.email, "ada@new.example");
    }
}
