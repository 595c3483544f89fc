use afs_client::config::Config;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

// helper to clear env vars
fn clear_env() {
    env::remove_var("AFS_API_BASE_URL");
    env::remove_var("AFS_SESSION_DIR");
    env::remove_var("AFS_MUTATION_TIMEOUT_SECS");
    env::remove_var("AFS_MAX_RETRIES");
    env::remove_var("AFS_RETRY_DELAY_MS");
    env::remove_var("AFS_CLEANUP_GRACE_MS");
    env::remove_var("AFS_STATUS_POLL_SECS");
    env::remove_var("WORKER_THREADS");
}

#[test]
fn test_config_behavior() {
    // Run these sequentially to avoid race conditions with environment variables

    // 1. Test Defaults
    clear_env();

    let config = Config::from_env();

    assert_eq!(config.api_base_url, "http://localhost:8080/api");
    assert_eq!(config.mutation_timeout_secs, 10);
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.retry_delay_ms, 1000);
    assert_eq!(config.cleanup_grace_ms, 1000);
    assert_eq!(config.status_poll_secs, 5);
    assert_eq!(config.worker_threads, 2);

    let policy = config.retry_policy();
    assert_eq!(policy.max_retries, 2);
    assert_eq!(policy.base_delay, Duration::from_millis(1000));
    assert_eq!(policy.attempt_timeout, Some(Duration::from_secs(10)));
    assert_eq!(config.cleanup_grace(), Duration::from_secs(1));

    // 2. Test Overrides
    env::set_var("AFS_API_BASE_URL", "https://files.example.com/api/");
    env::set_var("AFS_SESSION_DIR", "/tmp/afs-test-session");
    env::set_var("AFS_MUTATION_TIMEOUT_SECS", "0");
    env::set_var("AFS_MAX_RETRIES", "5");
    env::set_var("AFS_RETRY_DELAY_MS", "250");
    env::set_var("AFS_CLEANUP_GRACE_MS", "50");
    env::set_var("AFS_STATUS_POLL_SECS", "0");
    env::set_var("WORKER_THREADS", "8");

    let config = Config::from_env();

    assert_eq!(config.api_base_url, "https://files.example.com/api");
    assert_eq!(config.session_dir, PathBuf::from("/tmp/afs-test-session"));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.worker_threads, 8);
    assert_eq!(config.retry_policy().delay_for(2), Duration::from_millis(500));
    // zero disables the per-attempt timeout
    assert_eq!(config.retry_policy().attempt_timeout, None);
    assert_eq!(config.cleanup_grace(), Duration::from_millis(50));
    assert_eq!(config.status_poll_interval(), Duration::from_secs(1));

    // 3. Test Invalid Values fall back to defaults
    env::set_var("AFS_MAX_RETRIES", "many");
    env::set_var("WORKER_THREADS", "-1");

    let config = Config::from_env();
    assert_eq!(config.max_retries, 2);
    assert_eq!(config.worker_threads, 2);

    clear_env();
}
