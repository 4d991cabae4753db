//! a scripted in-memory queue for exercising the shell without a server.
use std::collections::BTreeSet;

use bytes::Bytes;

use crate::client::{ClientError, Queue};
use crate::types::job::Job;
use crate::types::states::{JobState, PeekState};
use crate::types::stats::{JobStats, TubeStats};

pub(crate) struct FakeJob {
    pub id: u64,
    pub tube: String,
    pub state: JobState,
    pub body: Bytes,
}

/// In-memory `Queue` that records every facade call it receives, so tests
/// can assert not just on outcomes but on which calls were (not) made.
pub(crate) struct FakeQueue {
    pub used: String,
    pub watched: BTreeSet<String>,
    pub tubes: BTreeSet<String>,
    /// All jobs, oldest first within a tube and state.
    pub jobs: Vec<FakeJob>,
    /// Ids whose delete always fails with INTERNAL_ERROR.
    pub undeletable: BTreeSet<u64>,
    /// Tube names whose selection fails, to model an unreachable tube.
    pub unusable: BTreeSet<String>,
    /// Every facade call, in order.
    pub calls: Vec<String>,
    pub closed: bool,
}

impl FakeQueue {
    pub fn new() -> Self {
        Self {
            used: "default".into(),
            watched: ["default".to_owned()].into(),
            tubes: ["default".to_owned()].into(),
            jobs: Vec::new(),
            undeletable: BTreeSet::new(),
            unusable: BTreeSet::new(),
            calls: Vec::new(),
            closed: false,
        }
    }

    pub fn push_job(&mut self, tube: &str, state: JobState, id: u64) {
        self.tubes.insert(tube.to_owned());
        self.jobs.push(FakeJob {
            id,
            tube: tube.to_owned(),
            state,
            body: Bytes::from_static(b"body"),
        });
    }

    fn next_id(&self) -> u64 {
        self.jobs.iter().map(|j| j.id).max().unwrap_or(0) + 1
    }

    fn job_mut(&mut self, id: u64) -> Option<&mut FakeJob> {
        self.jobs.iter_mut().find(|j| j.id == id)
    }
}

impl Queue for FakeQueue {
    async fn use_tube(&mut self, tube: &str) -> Result<String, ClientError> {
        self.calls.push(format!("use {tube}"));

        if self.unusable.contains(tube) {
            return Err(ClientError::Server("INTERNAL_ERROR"));
        }

        self.tubes.insert(tube.to_owned());
        self.used = tube.to_owned();
        Ok(tube.to_owned())
    }

    async fn used_tube(&mut self) -> Result<String, ClientError> {
        self.calls.push("list-tube-used".into());
        Ok(self.used.clone())
    }

    async fn watch(&mut self, tube: &str) -> Result<u32, ClientError> {
        self.calls.push(format!("watch {tube}"));
        self.tubes.insert(tube.to_owned());
        self.watched.insert(tube.to_owned());
        Ok(self.watched.len() as u32)
    }

    async fn ignore(&mut self, tube: &str) -> Result<u32, ClientError> {
        self.calls.push(format!("ignore {tube}"));

        if self.watched.len() == 1 && self.watched.contains(tube) {
            return Err(ClientError::NotIgnored);
        }

        self.watched.remove(tube);
        Ok(self.watched.len() as u32)
    }

    async fn list_tubes(&mut self) -> Result<Vec<String>, ClientError> {
        self.calls.push("list-tubes".into());
        Ok(self.tubes.iter().cloned().collect())
    }

    async fn list_watched(&mut self) -> Result<Vec<String>, ClientError> {
        self.calls.push("list-tubes-watched".into());
        Ok(self.watched.iter().cloned().collect())
    }

    async fn put(&mut self, body: &[u8]) -> Result<u64, ClientError> {
        self.calls.push(format!("put {}", body.len()));

        let id = self.next_id();
        let tube = self.used.clone();
        self.jobs.push(FakeJob {
            id,
            tube,
            state: JobState::Ready,
            body: Bytes::copy_from_slice(body),
        });
        Ok(id)
    }

    async fn reserve(
        &mut self,
        timeout: Option<u32>,
    ) -> Result<Option<Job>, ClientError> {
        self.calls.push(match timeout {
            None => "reserve".into(),
            Some(t) => format!("reserve-with-timeout {t}"),
        });

        let watched = self.watched.clone();
        match self.jobs.iter_mut().find(|j| {
            j.state == JobState::Ready && watched.contains(&j.tube)
        }) {
            Some(job) => {
                job.state = JobState::Reserved;
                Ok(Some(Job {
                    id: job.id,
                    body: job.body.clone(),
                }))
            },
            None => Ok(None),
        }
    }

    async fn delete(&mut self, id: u64) -> Result<(), ClientError> {
        self.calls.push(format!("delete {id}"));

        if self.undeletable.contains(&id) {
            return Err(ClientError::Server("INTERNAL_ERROR"));
        }

        let before = self.jobs.len();
        self.jobs.retain(|j| j.id != id);
        if self.jobs.len() == before {
            return Err(ClientError::NotFound);
        }
        Ok(())
    }

    async fn bury(&mut self, id: u64) -> Result<(), ClientError> {
        self.calls.push(format!("bury {id}"));

        match self.job_mut(id) {
            Some(job) => {
                job.state = JobState::Buried;
                Ok(())
            },
            None => Err(ClientError::NotFound),
        }
    }

    async fn release(&mut self, id: u64) -> Result<(), ClientError> {
        self.calls.push(format!("release {id}"));

        match self.job_mut(id) {
            Some(job) => {
                job.state = JobState::Ready;
                Ok(())
            },
            None => Err(ClientError::NotFound),
        }
    }

    async fn kick(&mut self, bound: u64) -> Result<u64, ClientError> {
        self.calls.push(format!("kick {bound}"));

        let used = self.used.clone();
        let mut kicked = 0;
        for job in self
            .jobs
            .iter_mut()
            .filter(|j| j.tube == used && j.state == JobState::Buried)
            .take(bound as usize)
        {
            job.state = JobState::Ready;
            kicked += 1;
        }
        Ok(kicked)
    }

    async fn kick_job(&mut self, id: u64) -> Result<(), ClientError> {
        self.calls.push(format!("kick-job {id}"));

        match self.job_mut(id) {
            Some(job)
                if matches!(
                    job.state,
                    JobState::Buried | JobState::Delayed
                ) =>
            {
                job.state = JobState::Ready;
                Ok(())
            },
            _ => Err(ClientError::NotFound),
        }
    }

    async fn peek(&mut self, id: u64) -> Result<Option<Job>, ClientError> {
        self.calls.push(format!("peek {id}"));

        Ok(self.jobs.iter().find(|j| j.id == id).map(|j| Job {
            id: j.id,
            body: j.body.clone(),
        }))
    }

    async fn peek_state(
        &mut self,
        state: PeekState,
    ) -> Result<Option<Job>, ClientError> {
        self.calls.push(format!("peek-{state}"));

        let want = match state {
            PeekState::Ready => JobState::Ready,
            PeekState::Delayed => JobState::Delayed,
            PeekState::Buried => JobState::Buried,
        };
        Ok(self
            .jobs
            .iter()
            .find(|j| j.tube == self.used && j.state == want)
            .map(|j| Job {
                id: j.id,
                body: j.body.clone(),
            }))
    }

    async fn stats(&mut self) -> Result<serde_yaml::Value, ClientError> {
        self.calls.push("stats".into());

        let mut map = serde_yaml::Mapping::new();
        map.insert("total-jobs".into(), (self.jobs.len() as u64).into());
        Ok(serde_yaml::Value::Mapping(map))
    }

    async fn stats_tube(
        &mut self,
        tube: &str,
    ) -> Result<TubeStats, ClientError> {
        self.calls.push(format!("stats-tube {tube}"));

        if !self.tubes.contains(tube) {
            return Err(ClientError::NotFound);
        }

        let count = |state: JobState| {
            self.jobs
                .iter()
                .filter(|j| j.tube == tube && j.state == state)
                .count() as u64
        };
        Ok(TubeStats {
            name: tube.to_owned(),
            current_jobs_urgent: 0,
            current_jobs_ready: count(JobState::Ready),
            current_jobs_reserved: count(JobState::Reserved),
            current_jobs_delayed: count(JobState::Delayed),
            current_jobs_buried: count(JobState::Buried),
            total_jobs: self.jobs.iter().filter(|j| j.tube == tube).count()
                as u64,
            current_using: 1,
            current_waiting: 0,
            current_watching: 1,
            pause: 0,
            cmd_delete: 0,
            cmd_pause_tube: 0,
            pause_time_left: 0,
        })
    }

    async fn stats_job(&mut self, id: u64) -> Result<JobStats, ClientError> {
        self.calls.push(format!("stats-job {id}"));

        match self.jobs.iter().find(|j| j.id == id) {
            Some(job) => Ok(JobStats {
                id: job.id,
                tube: job.tube.clone(),
                state: job.state,
                pri: 0,
                age: 0,
                delay: 0,
                ttr: 120,
                time_left: 0,
                file: 0,
                reserves: 0,
                timeouts: 0,
                releases: 0,
                buries: 0,
                kicks: 0,
            }),
            None => Err(ClientError::NotFound),
        }
    }

    async fn close(&mut self) {
        self.calls.push("close".into());
        self.closed = true;
    }
}
