use bytes::Bytes;

/// A job as handed over by the server in a `RESERVED` or `FOUND` reply.
///
/// This is a weak handle: the job's lifecycle stays with the server, and
/// holding one does not keep the job alive or reserved.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Job {
    pub id: u64,
    pub body: Bytes,
}
