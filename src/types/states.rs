use std::fmt;

use serde::{Deserialize, Serialize};

/// State of a job as reported in `stats-job` responses. The server is
/// authoritative; a client never transitions these itself.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Ready,
    Delayed,
    Reserved,
    Buried,
}

/// The three states a job can be inspected in (and drained from) without
/// holding a reservation on it.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PeekState {
    Ready,
    Delayed,
    Buried,
}

impl PeekState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Delayed => "delayed",
            Self::Buried => "buried",
        }
    }
}

impl fmt::Display for PeekState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
