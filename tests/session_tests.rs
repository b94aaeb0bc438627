//! Session store lifecycle tests: hydrate, persist, clear.

use anyhow::Result;
use tempfile::tempdir;

use gemgate::identity::SessionStore;

#[test]
fn missing_state_file_starts_logged_out() -> Result<()> {
    let tmp = tempdir()?;
    let store = SessionStore::hydrate(tmp.path().join("session.json"));
    assert!(!store.is_authenticated());
    assert_eq!(store.auth_header(), None);
    assert_eq!(store.role(), None);
    Ok(())
}

#[test]
fn login_persists_and_rehydrates() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("session.json");
    {
        let store = SessionStore::hydrate(&path);
        store.store_login("tok-123", "bearer");
        store.cache_identity(Some("sales"), Some("Meera Jain"));
    }
    let store = SessionStore::hydrate(&path);
    assert!(store.is_authenticated());
    assert_eq!(store.auth_header().as_deref(), Some("Bearer tok-123"));
    assert_eq!(store.role().as_deref(), Some("sales"));
    assert_eq!(store.full_name().as_deref(), Some("Meera Jain"));
    Ok(())
}

#[test]
fn state_file_keeps_the_legacy_key_names() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("session.json");
    let store = SessionStore::hydrate(&path);
    store.store_login("tok-123", "bearer");
    store.cache_identity(Some("sales"), Some("Meera Jain"));
    store.set_profile(Some("meera"), Some("meera@example.com"), None);
    let text = std::fs::read_to_string(&path)?;
    for key in ["jwt_token", "token_type", "userRole", "userFullName", "userUsername", "userEmail"] {
        assert!(text.contains(key), "state file missing key {}", key);
    }
    Ok(())
}

#[test]
fn clear_is_idempotent() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("session.json");
    let store = SessionStore::hydrate(&path);
    store.store_login("tok-123", "bearer");
    store.cache_identity(Some("admin"), Some("Root"));
    store.clear();
    assert!(!store.is_authenticated());
    assert_eq!(store.role(), None);
    // Second clear must be a no-op, not an error.
    store.clear();
    assert!(!store.is_authenticated());
    // And the cleared state is what rehydrates.
    let again = SessionStore::hydrate(&path);
    assert!(!again.is_authenticated());
    assert_eq!(again.full_name(), None);
    Ok(())
}

#[test]
fn corrupt_state_file_recovers_logged_out() -> Result<()> {
    let tmp = tempdir()?;
    let path = tmp.path().join("session.json");
    std::fs::write(&path, "not json {")?;
    let store = SessionStore::hydrate(&path);
    assert!(!store.is_authenticated());
    Ok(())
}

#[test]
fn auth_header_uses_the_stored_token_type() {
    let store = SessionStore::in_memory();
    store.store_login("abc", "bearer");
    assert_eq!(store.auth_header().as_deref(), Some("Bearer abc"));
    store.store_login("abc", "Token");
    assert_eq!(store.auth_header().as_deref(), Some("Token abc"));
    // Empty token type falls back to bearer.
    store.store_login("abc", "");
    assert_eq!(store.auth_header().as_deref(), Some("Bearer abc"));
}

#[test]
fn clones_share_state() {
    let store = SessionStore::in_memory();
    let clone = store.clone();
    store.store_login("tok", "bearer");
    assert!(clone.is_authenticated());
    clone.clear();
    assert!(!store.is_authenticated());
}
