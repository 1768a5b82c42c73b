use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::datastore::DataStore;
use crate::datetime::stamp_serde;

/// Who is operating the dashboard. Persisted between invocations; no
/// credential check happens here, the session only records the operator.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub user: Option<String>,

    #[serde(default, with = "stamp_serde::option")]
    pub since: Option<DateTime<Utc>>,
}

/// Explicit session lifecycle: `init` loads the persisted session,
/// `login`/`logout` mutate it, `teardown` persists it back. Commands
/// receive the context instead of reading ambient state.
#[derive(Debug)]
pub struct SessionContext {
    session: Session,
    dirty: bool,
}

impl SessionContext {
    #[tracing::instrument(skip(store))]
    pub fn init(store: &DataStore) -> anyhow::Result<Self> {
        let session = store.load_session()?.unwrap_or_default();
        Ok(Self {
            session,
            dirty: false,
        })
    }

    pub fn login(&mut self, username: &str, now: DateTime<Utc>) {
        info!(user = username, "session login");
        self.session.user = Some(username.to_string());
        self.session.since = Some(now);
        self.dirty = true;
    }

    pub fn logout(&mut self) {
        if let Some(user) = self.session.user.take() {
            info!(user = %user, "session logout");
        }
        self.session.since = None;
        self.dirty = true;
    }

    pub fn current_user(&self) -> Option<&str> {
        self.session.user.as_deref()
    }

    pub fn since(&self) -> Option<DateTime<Utc>> {
        self.session.since
    }

    #[tracing::instrument(skip(self, store))]
    pub fn teardown(self, store: &DataStore) -> anyhow::Result<()> {
        if self.dirty {
            store.save_session(&self.session)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use tempfile::tempdir;

    use super::SessionContext;
    use crate::datastore::DataStore;

    #[test]
    fn session_survives_teardown_and_init() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");

        let mut ctx = SessionContext::init(&store).expect("init");
        assert!(ctx.current_user().is_none());

        ctx.login("frontdesk", Utc::now());
        assert_eq!(ctx.current_user(), Some("frontdesk"));
        ctx.teardown(&store).expect("teardown");

        let restored = SessionContext::init(&store).expect("re-init");
        assert_eq!(restored.current_user(), Some("frontdesk"));
        assert!(restored.since().is_some());
    }

    #[test]
    fn logout_clears_the_operator() {
        let temp = tempdir().expect("tempdir");
        let store = DataStore::open(temp.path()).expect("open datastore");

        let mut ctx = SessionContext::init(&store).expect("init");
        ctx.login("frontdesk", Utc::now());
        ctx.logout();
        ctx.teardown(&store).expect("teardown");

        let restored = SessionContext::init(&store).expect("re-init");
        assert!(restored.current_user().is_none());
    }
}
