use afs_client::models::UserType;
use afs_client::session::{token_fingerprint, AuthState, SessionStore};
use afs_client::storage::{FileStore, KeyValueStore, MemoryStore, TOKEN_KEY, USER_KEY};

#[test]
fn test_empty_storage_is_anonymous() {
    let session = SessionStore::open(MemoryStore::new());
    assert_eq!(session.state(), AuthState::Anonymous);
    assert!(!session.is_authenticated());
    assert!(session.token().is_none());
    assert!(session.current_user().is_none());
}

#[test]
fn test_restores_stored_session() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "abc").unwrap();
    store
        .set(USER_KEY, r#"{"username":"bob","userType":"INTERNAL"}"#)
        .unwrap();

    let session = SessionStore::open(store);
    assert!(session.is_authenticated());
    assert_eq!(session.token().as_deref(), Some("abc"));

    let user = session.current_user().unwrap();
    assert_eq!(user.username, "bob");
    assert_eq!(user.user_type, UserType::Internal);
}

#[test]
fn test_corrupt_user_clears_session() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "abc").unwrap();
    store.set(USER_KEY, "{not json").unwrap();

    let session = SessionStore::open(store);
    assert_eq!(session.state(), AuthState::Anonymous);
    assert!(session.token().is_none());
}

#[test]
fn test_unknown_role_is_tolerated() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "abc").unwrap();
    store
        .set(USER_KEY, r#"{"username":"eve","userType":"AUDITOR"}"#)
        .unwrap();

    let session = SessionStore::open(store);
    assert_eq!(session.current_user().unwrap().user_type, UserType::Unknown);
    assert!(!session.has_role(&[UserType::Admin, UserType::Internal]));
}

#[test]
fn test_has_role() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "abc").unwrap();
    store
        .set(USER_KEY, r#"{"username":"root","userType":"ADMIN"}"#)
        .unwrap();
    let session = SessionStore::open(store);

    assert!(session.has_role(&[UserType::Admin]));
    assert!(session.has_role(&[UserType::External, UserType::Admin]));
    assert!(!session.has_role(&[UserType::External]));
    assert!(!session.has_role(&[]));

    session.logout();
    assert!(!session.has_role(&[UserType::Admin]));
}

#[tokio::test]
async fn test_logout_notifies_subscribers() {
    let store = MemoryStore::new();
    store.set(TOKEN_KEY, "abc").unwrap();
    store
        .set(USER_KEY, r#"{"username":"bob","userType":"EXTERNAL"}"#)
        .unwrap();
    let session = SessionStore::open(store);
    let mut rx = session.subscribe();

    session.logout();

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), AuthState::Anonymous);
    assert!(session.token().is_none());

    // logging out twice is harmless
    session.logout();
    assert_eq!(session.state(), AuthState::Anonymous);
}

#[test]
fn test_file_store_persists_between_opens() {
    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join("session");

    let store = FileStore::new(&dir);
    store.set(TOKEN_KEY, "persisted").unwrap();
    store
        .set(USER_KEY, r#"{"username":"carol","userType":"EXTERNAL"}"#)
        .unwrap();
    assert!(dir.join("token").exists());

    let session = SessionStore::open(FileStore::new(&dir));
    assert_eq!(session.current_user().unwrap().username, "carol");
    assert_eq!(session.token().as_deref(), Some("persisted"));

    session.logout();
    assert!(!dir.join("token").exists());
    assert!(!dir.join("user").exists());

    let reopened = SessionStore::open(FileStore::new(&dir));
    assert_eq!(reopened.state(), AuthState::Anonymous);
}

#[test]
fn test_file_store_missing_keys() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = FileStore::new(temp_dir.path().join("never-created"));

    assert!(store.get(TOKEN_KEY).is_none());
    // removing an absent entry is not an error
    assert!(store.remove(TOKEN_KEY).is_ok());
}

#[test]
fn test_token_fingerprint() {
    let fingerprint = token_fingerprint("secret-token");
    assert_eq!(fingerprint.len(), 12);
    assert!(fingerprint.chars().all(|c| c.is_ascii_hexdigit()));

    // deterministic
    assert_eq!(fingerprint, token_fingerprint("secret-token"));
    assert_ne!(fingerprint, token_fingerprint("other-token"));
}

#[cfg(unix)]
#[test]
fn test_file_store_is_private_to_owner() {
    use std::os::unix::fs::PermissionsExt;

    let temp_dir = tempfile::tempdir().unwrap();
    let dir = temp_dir.path().join("session");
    let store = FileStore::new(&dir);

    store.set(TOKEN_KEY, "secret-bearer").unwrap();
    store
        .set(USER_KEY, r#"{"username":"carol","userType":"EXTERNAL"}"#)
        .unwrap();

    let dir_mode = std::fs::metadata(&dir).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700);
    for key in [TOKEN_KEY, USER_KEY] {
        let mode = std::fs::metadata(dir.join(key)).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600, "{}", key);
    }

    // overwriting an existing entry keeps it private
    std::fs::set_permissions(dir.join(TOKEN_KEY), std::fs::Permissions::from_mode(0o644)).unwrap();
    store.set(TOKEN_KEY, "rotated").unwrap();
    let mode = std::fs::metadata(dir.join(TOKEN_KEY)).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0);
}
