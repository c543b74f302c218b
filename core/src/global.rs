//! Process-wide session accessor.
//!
//! Code that can pass a `Session` around should do so. This module exists for
//! hosts that want one session per process reachable from anywhere.
//!
//! - `initialize` installs a session the first time it is called. Later calls
//!   return the installed session and ignore their `config`. Concurrent
//!   first calls build exactly one session.
//! - `get_instance` fails with `UninitializedError` until `initialize` has
//!   succeeded.
//! - `teardown` destroys the installed session and clears the slot, after
//!   which `initialize` may install a new one.

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ConfigError, UninitializedError};
use crate::session::Session;

static INSTANCE: RwLock<Option<Session>> = RwLock::new(None);

/// Install the process-wide session built by `Session::new`, or return the
/// one already installed.
pub fn initialize(config: Config) -> Result<Session, ConfigError> {
    initialize_with(config, Session::new)
}

/// Like `initialize`, with a caller-supplied constructor. `build` runs at most
/// once per installed session and never while another caller is installing.
pub fn initialize_with<F>(config: Config, build: F) -> Result<Session, ConfigError>
where
    F: FnOnce(Config) -> Result<Session, ConfigError>,
{
    if let Some(existing) = INSTANCE.read().clone() {
        debug!("shop SDK already initialized; ignoring new config");
        return Ok(existing);
    }

    let mut slot = INSTANCE.write();
    if let Some(existing) = slot.as_ref() {
        debug!("shop SDK initialized concurrently; ignoring new config");
        return Ok(existing.clone());
    }
    let session = build(config)?;
    *slot = Some(session.clone());
    info!(base_url = %session.config().base_url, "shop SDK initialized");
    Ok(session)
}

pub fn get_instance() -> Result<Session, UninitializedError> {
    INSTANCE.read().clone().ok_or(UninitializedError)
}

pub fn is_initialized() -> bool {
    INSTANCE.read().is_some()
}

/// Destroy and uninstall the process-wide session. Returns whether one was
/// installed. Handles obtained earlier keep working as destroyed sessions.
pub fn teardown() -> bool {
    let Some(session) = INSTANCE.write().take() else {
        return false;
    };
    session.destroy();
    info!("shop SDK torn down");
    true
}
