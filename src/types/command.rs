//! requests the client can issue, and their wire form.

/// A request sent to the server over the beanstalkd TCP protocol.
///
/// Each variant notes its wire form; `put` is the only request that carries
/// a data chunk after the command line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// On the wire: `use <tube>`
    Use { tube: String },
    /// On the wire: `watch <tube>`
    Watch { tube: String },
    /// On the wire: `ignore <tube>`
    Ignore { tube: String },
    /// On the wire: `put <pri> <delay> <ttr> <n_bytes>` followed by the job
    /// body and a trailing CRLF.
    Put {
        pri: u32,
        delay: u32,
        ttr: u32,
        body: Vec<u8>,
    },
    /// Blocks until a job from a watched tube can be reserved.
    ///
    /// On the wire: `reserve`
    Reserve,
    /// As `reserve`, but the server replies `TIMED_OUT` after `timeout`
    /// seconds with no job. A timeout of zero returns at once.
    ///
    /// On the wire: `reserve-with-timeout <seconds>`
    ReserveWithTimeout { timeout: u32 },
    /// On the wire: `delete <id>`
    Delete { id: u64 },
    /// On the wire: `release <id> <pri> <delay>`
    Release { id: u64, pri: u32, delay: u32 },
    /// On the wire: `bury <id> <pri>`
    Bury { id: u64, pri: u32 },
    /// Promotes up to `bound` buried (or, failing that, delayed) jobs on the
    /// currently-used tube back to ready.
    ///
    /// On the wire: `kick <bound>`
    Kick { bound: u64 },
    /// On the wire: `kick-job <id>`
    KickJob { id: u64 },
    /// On the wire: `peek <id>`
    Peek { id: u64 },
    /// On the wire: `peek-ready`
    PeekReady,
    /// On the wire: `peek-delayed`
    PeekDelayed,
    /// On the wire: `peek-buried`
    PeekBuried,
    /// On the wire: `stats-job <id>`
    StatsJob { id: u64 },
    /// On the wire: `stats-tube <tube>`
    StatsTube { tube: String },
    /// On the wire: `stats`
    Stats,
    /// On the wire: `list-tubes`
    ListTubes,
    /// On the wire: `list-tube-used`
    ListTubeUsed,
    /// On the wire: `list-tubes-watched`
    ListTubesWatched,
    /// On the wire: `quit`
    Quit,
}

impl Command {
    /// Wire bytes for this request, trailing CRLF included.
    pub fn serialise(&self) -> Vec<u8> {
        use Command::*;

        match self {
            Use { tube } => format!("use {tube}\r\n").into(),
            Watch { tube } => format!("watch {tube}\r\n").into(),
            Ignore { tube } => format!("ignore {tube}\r\n").into(),
            Put {
                pri,
                delay,
                ttr,
                body,
            } => {
                let mut buf =
                    format!("put {pri} {delay} {ttr} {}\r\n", body.len())
                        .into_bytes();
                buf.extend_from_slice(body);
                buf.extend_from_slice(b"\r\n");
                buf
            },
            Reserve => b"reserve\r\n".to_vec(),
            ReserveWithTimeout { timeout } => {
                format!("reserve-with-timeout {timeout}\r\n").into()
            },
            Delete { id } => format!("delete {id}\r\n").into(),
            Release { id, pri, delay } => {
                format!("release {id} {pri} {delay}\r\n").into()
            },
            Bury { id, pri } => format!("bury {id} {pri}\r\n").into(),
            Kick { bound } => format!("kick {bound}\r\n").into(),
            KickJob { id } => format!("kick-job {id}\r\n").into(),
            Peek { id } => format!("peek {id}\r\n").into(),
            PeekReady => b"peek-ready\r\n".to_vec(),
            PeekDelayed => b"peek-delayed\r\n".to_vec(),
            PeekBuried => b"peek-buried\r\n".to_vec(),
            StatsJob { id } => format!("stats-job {id}\r\n").into(),
            StatsTube { tube } => format!("stats-tube {tube}\r\n").into(),
            Stats => b"stats\r\n".to_vec(),
            ListTubes => b"list-tubes\r\n".to_vec(),
            ListTubeUsed => b"list-tube-used\r\n".to_vec(),
            ListTubesWatched => b"list-tubes-watched\r\n".to_vec(),
            Quit => b"quit\r\n".to_vec(),
        }
    }
}
