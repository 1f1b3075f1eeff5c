//! Login and logout commands.

use super::{coordinator, open_store, Remote};
use recipesync_engine::Session;
use std::path::Path;
use std::sync::Arc;

/// Stores the credential and profile.
pub fn login(path: &Path, token: &str, name: &str, email: &str) -> Result<(), Box<dyn std::error::Error>> {
    if token.trim().is_empty() {
        return Err("token must not be empty".into());
    }

    let session = Session::new(Arc::new(open_store(path)?));
    session.sign_in(token, name, email)?;

    match session.profile() {
        Some(profile) if !profile.name.is_empty() => println!("Signed in as {}", profile.name),
        _ => println!("Signed in"),
    }
    Ok(())
}

/// Flushes pending changes, then signs out.
///
/// The local session is cleared even when the final push fails.
pub fn logout(path: &Path, remote: &Remote) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = coordinator(open_store(path)?, remote)?;
    if coordinator.gate().get().is_none() {
        println!("Not signed in");
        return Ok(());
    }

    match coordinator.sign_out() {
        Ok(pushed) => {
            println!("Pushed {pushed} pending change(s)");
            println!("Signed out");
            Ok(())
        }
        Err(e) => {
            println!("Signed out locally; final push failed");
            Err(e.into())
        }
    }
}
