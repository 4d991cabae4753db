//! session state: current tube, watch set, reserved job.
use std::collections::BTreeSet;

use itertools::Itertools;

use crate::client::{ClientError, Queue};
use crate::types::job::Job;

/// Client-side view of one connection's server state. Owned by the dispatch
/// loop and passed explicitly; there is no global state.
///
/// `current_tube` and `watched` are only ever set from the server's own
/// replies, so they cannot drift from what the server believes.
pub struct Session<Q> {
    queue: Q,
    addr: String,
    current_tube: String,
    watched: BTreeSet<String>,
    reserved: Option<Job>,
}

impl<Q: Queue> Session<Q> {
    /// Wraps a fresh connection, syncing the used tube and watch list from
    /// the server.
    pub async fn open(
        mut queue: Q,
        host: &str,
        port: u16,
    ) -> Result<Self, ClientError> {
        let current_tube = queue.used_tube().await?;
        let watched = queue.list_watched().await?.into_iter().collect();

        Ok(Self {
            queue,
            addr: format!("{host}:{port}"),
            current_tube,
            watched,
            reserved: None,
        })
    }

    /// Direct access to the facade, for commands that don't touch session
    /// state.
    pub fn queue(&mut self) -> &mut Q {
        &mut self.queue
    }

    pub fn current_tube(&self) -> &str {
        &self.current_tube
    }

    pub fn watched(&self) -> &BTreeSet<String> {
        &self.watched
    }

    pub fn reserved(&self) -> Option<&Job> {
        self.reserved.as_ref()
    }

    /// Selects `tube`, recording the server-confirmed name. Session state is
    /// untouched when the call fails.
    pub async fn select_tube(
        &mut self,
        tube: &str,
    ) -> Result<(), ClientError> {
        self.current_tube = self.queue.use_tube(tube).await?;
        Ok(())
    }

    /// Watches `tube`, then refreshes the watch set from the server.
    pub async fn watch(&mut self, tube: &str) -> Result<(), ClientError> {
        self.queue.watch(tube).await?;
        self.refresh_watched().await
    }

    /// Stops watching `tube`. Ignoring the last watched tube fails and
    /// leaves the set untouched: a session always watches at least one.
    pub async fn ignore(&mut self, tube: &str) -> Result<(), ClientError> {
        self.queue.ignore(tube).await?;
        self.refresh_watched().await
    }

    async fn refresh_watched(&mut self) -> Result<(), ClientError> {
        self.watched =
            self.queue.list_watched().await?.into_iter().collect();
        Ok(())
    }

    /// Replaces the reserved-job handle. The previous handle is merely
    /// forgotten; the job itself stays with the server.
    pub fn set_reserved(&mut self, job: Option<Job>) {
        self.reserved = job;
    }

    /// Comma-joined watch list for display, sorted.
    pub fn watching_display(&self) -> String {
        self.watched.iter().join(",")
    }

    /// Prompt text: `beanstalk host:port (tube)`, with the reserved job id
    /// appended as `(tube:id)` while one is held.
    pub fn render_prompt(&self) -> String {
        match &self.reserved {
            Some(job) => {
                format!(
                    "beanstalk {} ({}:{})",
                    self.addr, self.current_tube, job.id
                )
            },
            None => {
                format!("beanstalk {} ({})", self.addr, self.current_tube)
            },
        }
    }

    /// Closes the underlying connection. Safe to call more than once.
    pub async fn close(&mut self) {
        self.queue.close().await;
    }
}
