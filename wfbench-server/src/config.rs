use std::time::Duration;

/// Maximum time to wait when acquiring the service state's read or write lock.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// How long a task-queue poll waits for work before answering 204.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Address the development service listens on when none is given.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:7233";
