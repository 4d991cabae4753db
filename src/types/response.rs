//! parses status lines sent by the server.
use std::fmt;

/// A response line the client could not make sense of.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParseError {
    /// The first word is not a known reply.
    UnknownReply,
    /// The line is structurally wrong for its reply word.
    BadReply,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::UnknownReply => "unknown reply",
            Self::BadReply => "malformed reply",
        })
    }
}

/// A status line from the server. Variants carrying `n_bytes` announce a
/// data chunk of that many bytes (plus CRLF) following the line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reply {
    /// `INSERTED <id>`: a put created this job.
    Inserted { id: u64 },
    /// `BURIED` in response to a bury; `BURIED <id>` in response to a put
    /// the server could only handle by burying the new job.
    Buried { id: Option<u64> },
    /// `USING <tube>`
    Using { tube: String },
    /// `RESERVED <id> <n_bytes>` plus the job body.
    Reserved { id: u64, n_bytes: u32 },
    /// `FOUND <id> <n_bytes>` plus the job body.
    Found { id: u64, n_bytes: u32 },
    /// `OK <n_bytes>` plus a YAML payload (stats and tube lists).
    Data { n_bytes: u32 },
    /// `WATCHING <count>`
    Watching { count: u32 },
    /// `KICKED <count>` in response to a kick; bare `KICKED` for kick-job.
    Kicked { count: Option<u64> },
    /// `DELETED`
    Deleted,
    /// `RELEASED`
    Released,
    /// `NOT_FOUND`: no such job, or the job doesn't satisfy the command's
    /// precondition. For the peek family this is the normal "no job" answer.
    NotFound,
    /// `NOT_IGNORED`: the ignore would have emptied the watch list.
    NotIgnored,
    /// `TIMED_OUT`: a reserve-with-timeout expired with no job.
    TimedOut,
    /// `DEADLINE_SOON`: a held reservation is about to expire.
    DeadlineSoon,
    /// `EXPECTED_CRLF`
    ExpectedCrlf,
    /// `JOB_TOO_BIG`
    JobTooBig,
    /// `DRAINING`
    Draining,
    /// `OUT_OF_MEMORY`
    OutOfMemory,
    /// `INTERNAL_ERROR`
    InternalError,
    /// `BAD_FORMAT`
    BadFormat,
    /// `UNKNOWN_COMMAND`
    UnknownCommand,
}

/// Minimal zero-copy token reader over a single response line.
struct Tokens<'a> {
    rest: &'a [u8],
    /// Set when the line ended on a separator, which no reply allows.
    dangling: bool,
}

impl<'a> From<&'a [u8]> for Tokens<'a> {
    fn from(rest: &'a [u8]) -> Self {
        Tokens {
            rest,
            dangling: false,
        }
    }
}

impl<'a> Tokens<'a> {
    /// Takes the next space-delimited token, which must be non-empty.
    fn word(&mut self) -> Result<&'a [u8], ParseError> {
        if self.rest.is_empty() {
            return Err(ParseError::BadReply);
        }

        let idx = self
            .rest
            .iter()
            .position(|c| *c == b' ')
            .unwrap_or(self.rest.len());
        let token = &self.rest[..idx];

        if idx < self.rest.len() {
            self.rest = &self.rest[idx + 1..];
            self.dangling = self.rest.is_empty();
        } else {
            self.rest = &[];
        }

        if token.is_empty() {
            Err(ParseError::BadReply)
        } else {
            Ok(token)
        }
    }

    fn u32(&mut self) -> Result<u32, ParseError> {
        let mut r = 0u32;
        for v in self.word()? {
            match v {
                b'0'..=b'9' => {
                    r = r
                        .checked_mul(10)
                        .and_then(|r| r.checked_add((*v - b'0') as u32))
                        .ok_or(ParseError::BadReply)?
                },
                _ => return Err(ParseError::BadReply),
            };
        }

        Ok(r)
    }

    fn u64(&mut self) -> Result<u64, ParseError> {
        let mut r = 0u64;
        for v in self.word()? {
            match v {
                b'0'..=b'9' => {
                    r = r
                        .checked_mul(10)
                        .and_then(|r| r.checked_add((*v - b'0') as u64))
                        .ok_or(ParseError::BadReply)?
                },
                _ => return Err(ParseError::BadReply),
            };
        }

        Ok(r)
    }

    /// A trailing number some replies carry and some omit.
    fn opt_u64(&mut self) -> Result<Option<u64>, ParseError> {
        if self.rest.is_empty() && !self.dangling {
            Ok(None)
        } else {
            self.u64().map(Some)
        }
    }

    fn tube(&mut self) -> Result<String, ParseError> {
        let token = self.word()?;
        let name =
            std::str::from_utf8(token).map_err(|_| ParseError::BadReply)?;

        if super::is_valid_tube_name(name) {
            Ok(name.to_owned())
        } else {
            Err(ParseError::BadReply)
        }
    }

    /// Asserts the line is fully consumed, returning `reply` if so.
    fn finish<R>(self, reply: R) -> Result<R, ParseError> {
        if self.rest.is_empty() && !self.dangling {
            Ok(reply)
        } else {
            Err(ParseError::BadReply)
        }
    }
}

impl TryFrom<&[u8]> for Reply {
    type Error = ParseError;

    fn try_from(line: &[u8]) -> Result<Self, Self::Error> {
        use Reply::*;

        let mut t: Tokens = line.into();

        let reply = match t.word()? {
            b"INSERTED" => Inserted { id: t.u64()? },
            b"BURIED" => Buried { id: t.opt_u64()? },
            b"USING" => Using { tube: t.tube()? },
            b"RESERVED" => Reserved {
                id: t.u64()?,
                n_bytes: t.u32()?,
            },
            b"FOUND" => Found {
                id: t.u64()?,
                n_bytes: t.u32()?,
            },
            b"OK" => Data {
                n_bytes: t.u32()?,
            },
            b"WATCHING" => Watching { count: t.u32()? },
            b"KICKED" => Kicked { count: t.opt_u64()? },
            b"DELETED" => Deleted,
            b"RELEASED" => Released,
            b"NOT_FOUND" => NotFound,
            b"NOT_IGNORED" => NotIgnored,
            b"TIMED_OUT" => TimedOut,
            b"DEADLINE_SOON" => DeadlineSoon,
            b"EXPECTED_CRLF" => ExpectedCrlf,
            b"JOB_TOO_BIG" => JobTooBig,
            b"DRAINING" => Draining,
            b"OUT_OF_MEMORY" => OutOfMemory,
            b"INTERNAL_ERROR" => InternalError,
            b"BAD_FORMAT" => BadFormat,
            b"UNKNOWN_COMMAND" => UnknownCommand,
            _ => return Err(ParseError::UnknownReply),
        };

        t.finish(reply)
    }
}
