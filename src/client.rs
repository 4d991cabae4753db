//! the queue facade: a typed client for the beanstalkd TCP protocol.
use std::fmt;
use std::io;

use bytes::Bytes;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use crate::codec::FrameReader;
use crate::types::command::Command;
use crate::types::job::Job;
use crate::types::response::{ParseError, Reply};
use crate::types::states::PeekState;
use crate::types::stats::{JobStats, TubeStats};

/// Priority given to jobs when the operator does not choose one.
pub const DEFAULT_PRIORITY: u32 = 1 << 31;
/// Time-to-run, in seconds, for operator-submitted jobs.
pub const DEFAULT_TTR: u32 = 120;

#[derive(Debug)]
pub enum ClientError {
    Io(io::Error),
    /// The connection was already closed locally.
    Closed,
    /// The server sent a line this client cannot parse.
    BadReply(ParseError),
    /// `NOT_FOUND` for a command that needs the job to exist.
    NotFound,
    /// The server refused to ignore the last watched tube.
    NotIgnored,
    /// A general failure word such as `OUT_OF_MEMORY` or `DRAINING`.
    Server(&'static str),
    /// A well-formed reply the issued command cannot produce.
    Unexpected {
        command: &'static str,
        reply: String,
    },
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "{e}"),
            Self::Closed => f.write_str("connection closed"),
            Self::BadReply(e) => write!(f, "{e} from server"),
            Self::NotFound => f.write_str("NOT_FOUND"),
            Self::NotIgnored => {
                f.write_str("cannot ignore the only watched tube")
            },
            Self::Server(word) => f.write_str(word),
            Self::Unexpected { command, reply } => {
                write!(f, "unexpected reply to {command}: {reply}")
            },
        }
    }
}

impl std::error::Error for ClientError {}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

/// The queue operations the shell is written against.
///
/// `Connection` is the TCP implementation; tests substitute a scripted
/// in-memory fake. Peek and reserve report "no job" as `Ok(None)`, never as
/// an error.
#[allow(async_fn_in_trait)]
pub trait Queue {
    /// Selects the tube that put, peek-by-state, and kick operate on,
    /// returning the server-confirmed name.
    async fn use_tube(&mut self, tube: &str) -> Result<String, ClientError>;
    /// Asks the server which tube is currently in use.
    async fn used_tube(&mut self) -> Result<String, ClientError>;
    /// Adds a tube to the watch list, returning the new watch count.
    async fn watch(&mut self, tube: &str) -> Result<u32, ClientError>;
    /// Removes a tube from the watch list. Fails with `NotIgnored` when the
    /// tube is the last one watched.
    async fn ignore(&mut self, tube: &str) -> Result<u32, ClientError>;
    async fn list_tubes(&mut self) -> Result<Vec<String>, ClientError>;
    async fn list_watched(&mut self) -> Result<Vec<String>, ClientError>;
    /// Inserts a job on the currently-used tube, returning its id.
    async fn put(&mut self, body: &[u8]) -> Result<u64, ClientError>;
    /// Reserves the next ready job from the watched tubes, blocking until
    /// one appears or, with a timeout, until the server gives up.
    async fn reserve(
        &mut self,
        timeout: Option<u32>,
    ) -> Result<Option<Job>, ClientError>;
    async fn delete(&mut self, id: u64) -> Result<(), ClientError>;
    async fn bury(&mut self, id: u64) -> Result<(), ClientError>;
    async fn release(&mut self, id: u64) -> Result<(), ClientError>;
    /// Kicks up to `bound` buried (else delayed) jobs back to ready on the
    /// currently-used tube, returning how many moved.
    async fn kick(&mut self, bound: u64) -> Result<u64, ClientError>;
    async fn kick_job(&mut self, id: u64) -> Result<(), ClientError>;
    async fn peek(&mut self, id: u64) -> Result<Option<Job>, ClientError>;
    /// Peeks the oldest job in `state` on the currently-used tube.
    async fn peek_state(
        &mut self,
        state: PeekState,
    ) -> Result<Option<Job>, ClientError>;
    async fn stats(&mut self) -> Result<serde_yaml::Value, ClientError>;
    async fn stats_tube(
        &mut self,
        tube: &str,
    ) -> Result<TubeStats, ClientError>;
    async fn stats_job(&mut self, id: u64) -> Result<JobStats, ClientError>;
    /// Closes the connection. Safe to call more than once.
    async fn close(&mut self);
}

/// A TCP connection to a beanstalkd server.
pub struct Connection {
    inner: Option<Halves>,
}

struct Halves {
    reader: FrameReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Connection {
    /// Connects and disables Nagle, as interactive round-trips want.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;

        debug!(peer = %stream.peer_addr()?, "connected");

        let (r, w) = stream.into_split();
        Ok(Self {
            inner: Some(Halves {
                reader: r.into(),
                writer: w,
            }),
        })
    }

    /// Sends one request and reads the matching status line. General
    /// failure words become errors here; command-specific replies are left
    /// for the caller to interpret.
    async fn call(&mut self, cmd: &Command) -> Result<Reply, ClientError> {
        let halves = self.inner.as_mut().ok_or(ClientError::Closed)?;

        halves.writer.write_all(&cmd.serialise()).await?;
        halves.writer.flush().await?;

        let line = halves.reader.read_line().await?.ok_or_else(|| {
            ClientError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "server closed the connection",
            ))
        })?;

        match Reply::try_from(&line as &[u8])
            .map_err(ClientError::BadReply)?
        {
            Reply::OutOfMemory => Err(ClientError::Server("OUT_OF_MEMORY")),
            Reply::InternalError => {
                Err(ClientError::Server("INTERNAL_ERROR"))
            },
            Reply::BadFormat => Err(ClientError::Server("BAD_FORMAT")),
            Reply::UnknownCommand => {
                Err(ClientError::Server("UNKNOWN_COMMAND"))
            },
            Reply::ExpectedCrlf => Err(ClientError::Server("EXPECTED_CRLF")),
            Reply::JobTooBig => Err(ClientError::Server("JOB_TOO_BIG")),
            Reply::Draining => Err(ClientError::Server("DRAINING")),
            Reply::DeadlineSoon => Err(ClientError::Server("DEADLINE_SOON")),
            reply => Ok(reply),
        }
    }

    /// Reads the data chunk a `RESERVED`/`FOUND`/`OK` line announced.
    async fn chunk(&mut self, n_bytes: u32) -> Result<Bytes, ClientError> {
        let halves = self.inner.as_mut().ok_or(ClientError::Closed)?;
        Ok(halves.reader.read_chunk(n_bytes as usize).await?)
    }

    /// Issues a command whose success reply is `OK <n>` plus a YAML payload.
    async fn call_yaml<D: serde::de::DeserializeOwned>(
        &mut self,
        cmd: &Command,
        name: &'static str,
    ) -> Result<D, ClientError> {
        match self.call(cmd).await? {
            Reply::Data { n_bytes } => {
                let data = self.chunk(n_bytes).await?;
                serde_yaml::from_slice(&data).map_err(|e| {
                    ClientError::Unexpected {
                        command: name,
                        reply: format!("unparseable YAML payload: {e}"),
                    }
                })
            },
            reply => Err(unexpected(name, reply)),
        }
    }
}

fn unexpected(command: &'static str, reply: Reply) -> ClientError {
    ClientError::Unexpected {
        command,
        reply: format!("{reply:?}"),
    }
}

impl Queue for Connection {
    async fn use_tube(&mut self, tube: &str) -> Result<String, ClientError> {
        match self.call(&Command::Use { tube: tube.into() }).await? {
            Reply::Using { tube } => Ok(tube),
            reply => Err(unexpected("use", reply)),
        }
    }

    async fn used_tube(&mut self) -> Result<String, ClientError> {
        match self.call(&Command::ListTubeUsed).await? {
            Reply::Using { tube } => Ok(tube),
            reply => Err(unexpected("list-tube-used", reply)),
        }
    }

    async fn watch(&mut self, tube: &str) -> Result<u32, ClientError> {
        match self.call(&Command::Watch { tube: tube.into() }).await? {
            Reply::Watching { count } => Ok(count),
            reply => Err(unexpected("watch", reply)),
        }
    }

    async fn ignore(&mut self, tube: &str) -> Result<u32, ClientError> {
        match self.call(&Command::Ignore { tube: tube.into() }).await? {
            Reply::Watching { count } => Ok(count),
            Reply::NotIgnored => Err(ClientError::NotIgnored),
            reply => Err(unexpected("ignore", reply)),
        }
    }

    async fn list_tubes(&mut self) -> Result<Vec<String>, ClientError> {
        self.call_yaml(&Command::ListTubes, "list-tubes").await
    }

    async fn list_watched(&mut self) -> Result<Vec<String>, ClientError> {
        self.call_yaml(&Command::ListTubesWatched, "list-tubes-watched")
            .await
    }

    async fn put(&mut self, body: &[u8]) -> Result<u64, ClientError> {
        let cmd = Command::Put {
            pri: DEFAULT_PRIORITY,
            delay: 0,
            ttr: DEFAULT_TTR,
            body: body.to_vec(),
        };

        match self.call(&cmd).await? {
            Reply::Inserted { id } => Ok(id),
            // The job exists but went straight to buried: the server ran
            // out of room growing the ready queue.
            Reply::Buried { id: Some(id) } => {
                warn!(id, "job buried on insert");
                Ok(id)
            },
            reply => Err(unexpected("put", reply)),
        }
    }

    async fn reserve(
        &mut self,
        timeout: Option<u32>,
    ) -> Result<Option<Job>, ClientError> {
        let cmd = match timeout {
            None => Command::Reserve,
            Some(timeout) => Command::ReserveWithTimeout { timeout },
        };

        match self.call(&cmd).await? {
            Reply::Reserved { id, n_bytes } => {
                let body = self.chunk(n_bytes).await?;
                Ok(Some(Job { id, body }))
            },
            Reply::TimedOut => Ok(None),
            reply => Err(unexpected("reserve", reply)),
        }
    }

    async fn delete(&mut self, id: u64) -> Result<(), ClientError> {
        match self.call(&Command::Delete { id }).await? {
            Reply::Deleted => Ok(()),
            Reply::NotFound => Err(ClientError::NotFound),
            reply => Err(unexpected("delete", reply)),
        }
    }

    async fn bury(&mut self, id: u64) -> Result<(), ClientError> {
        let cmd = Command::Bury {
            id,
            pri: DEFAULT_PRIORITY,
        };

        match self.call(&cmd).await? {
            Reply::Buried { id: None } => Ok(()),
            Reply::NotFound => Err(ClientError::NotFound),
            reply => Err(unexpected("bury", reply)),
        }
    }

    async fn release(&mut self, id: u64) -> Result<(), ClientError> {
        let cmd = Command::Release {
            id,
            pri: DEFAULT_PRIORITY,
            delay: 0,
        };

        match self.call(&cmd).await? {
            Reply::Released => Ok(()),
            Reply::Buried { id: None } => Err(ClientError::Server("BURIED")),
            Reply::NotFound => Err(ClientError::NotFound),
            reply => Err(unexpected("release", reply)),
        }
    }

    async fn kick(&mut self, bound: u64) -> Result<u64, ClientError> {
        match self.call(&Command::Kick { bound }).await? {
            Reply::Kicked { count: Some(count) } => Ok(count),
            reply => Err(unexpected("kick", reply)),
        }
    }

    async fn kick_job(&mut self, id: u64) -> Result<(), ClientError> {
        match self.call(&Command::KickJob { id }).await? {
            Reply::Kicked { .. } => Ok(()),
            Reply::NotFound => Err(ClientError::NotFound),
            reply => Err(unexpected("kick-job", reply)),
        }
    }

    async fn peek(&mut self, id: u64) -> Result<Option<Job>, ClientError> {
        match self.call(&Command::Peek { id }).await? {
            Reply::Found { id, n_bytes } => {
                let body = self.chunk(n_bytes).await?;
                Ok(Some(Job { id, body }))
            },
            Reply::NotFound => Ok(None),
            reply => Err(unexpected("peek", reply)),
        }
    }

    async fn peek_state(
        &mut self,
        state: PeekState,
    ) -> Result<Option<Job>, ClientError> {
        let cmd = match state {
            PeekState::Ready => Command::PeekReady,
            PeekState::Delayed => Command::PeekDelayed,
            PeekState::Buried => Command::PeekBuried,
        };

        match self.call(&cmd).await? {
            Reply::Found { id, n_bytes } => {
                let body = self.chunk(n_bytes).await?;
                Ok(Some(Job { id, body }))
            },
            Reply::NotFound => Ok(None),
            reply => Err(unexpected("peek-by-state", reply)),
        }
    }

    async fn stats(&mut self) -> Result<serde_yaml::Value, ClientError> {
        self.call_yaml(&Command::Stats, "stats").await
    }

    async fn stats_tube(
        &mut self,
        tube: &str,
    ) -> Result<TubeStats, ClientError> {
        self.call_yaml(
            &Command::StatsTube { tube: tube.into() },
            "stats-tube",
        )
        .await
    }

    async fn stats_job(&mut self, id: u64) -> Result<JobStats, ClientError> {
        self.call_yaml(&Command::StatsJob { id }, "stats-job").await
    }

    async fn close(&mut self) {
        if let Some(mut halves) = self.inner.take() {
            // Best-effort goodbye: the server releases our resources either
            // way once the socket drops.
            let _ = halves.writer.write_all(&Command::Quit.serialise()).await;
            let _ = halves.writer.shutdown().await;

            debug!("closed connection");
        }
    }
}
