//! the command dispatcher: one input line in, one handler out.
use std::fmt;
use std::io;

use itertools::Itertools;

use crate::clear::{self, DeletePolicy};
use crate::client::{ClientError, Queue};
use crate::session::Session;
use crate::types::is_valid_tube_name;
use crate::types::states::PeekState;

/// Whether the loop keeps reading after a dispatch step.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Asks the operator a question and returns the raw answer line. The
/// interactive loop reads stdin; tests script the answers.
#[allow(async_fn_in_trait)]
pub trait Confirm {
    async fn ask(&mut self, question: &str) -> io::Result<String>;
}

#[derive(Debug)]
pub enum CommandError {
    Client(ClientError),
    /// Malformed operator input, e.g. a non-numeric job id.
    Usage(String),
    Io(io::Error),
    /// A value that would not render as YAML.
    Render(serde_yaml::Error),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Client(e) => write!(f, "{e}"),
            Self::Usage(msg) => f.write_str(msg),
            Self::Io(e) => write!(f, "{e}"),
            Self::Render(e) => write!(f, "{e}"),
        }
    }
}

impl From<ClientError> for CommandError {
    fn from(e: ClientError) -> Self {
        Self::Client(e)
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

type CmdResult = Result<(), CommandError>;

/// The interactive shell: session state plus this session's line history.
pub struct Shell<Q> {
    pub session: Session<Q>,
    history: Vec<String>,
}

impl<Q: Queue> Shell<Q> {
    pub fn new(session: Session<Q>) -> Self {
        Self {
            session,
            history: Vec::new(),
        }
    }

    /// Records an input line for `hist`. The loop calls this for every line
    /// it reads, dispatched or not.
    pub fn record(&mut self, line: &str) {
        self.history.push(line.trim().to_owned());
    }

    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// Runs one input line. The first whitespace-delimited token picks the
    /// handler; the untokenised remainder is the handler's to parse.
    /// Handler failures are caught here, printed as one diagnostic line,
    /// and never stop the loop: only exit/quit (and EOF, which the loop
    /// maps to exit) do.
    pub async fn dispatch(
        &mut self,
        line: &str,
        confirm: &mut impl Confirm,
    ) -> Flow {
        let line = line.trim();
        if line.is_empty() {
            return Flow::Continue;
        }

        let (cmd, rest) = match line.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (line, ""),
        };

        let result = match cmd {
            "exit" | "quit" => {
                self.session.close().await;
                return Flow::Quit;
            },
            "stats" => self.do_stats().await,
            "tubes" => self.do_tubes().await,
            "use" => self.do_use(rest).await,
            "stats_tube" => self.do_stats_tube(rest).await,
            "watch" => self.do_watch(rest).await,
            "ignore" => self.do_ignore(rest).await,
            "watching" => {
                println!("{}", self.session.watching_display());
                Ok(())
            },
            "put" => self.do_put(rest).await,
            "reserve" => self.do_reserve(rest).await,
            "stats_job" => self.do_stats_job(rest).await,
            "peek" => self.do_peek(rest).await,
            "peek_ready" => self.do_peek_state(PeekState::Ready).await,
            "peek_delayed" => self.do_peek_state(PeekState::Delayed).await,
            "peek_buried" => self.do_peek_state(PeekState::Buried).await,
            "clear_ready" => {
                self.do_clear(rest, PeekState::Ready, confirm).await
            },
            "clear_delayed" => {
                self.do_clear(rest, PeekState::Delayed, confirm).await
            },
            "clear_buried" => {
                self.do_clear(rest, PeekState::Buried, confirm).await
            },
            "bury" => self.do_bury(rest).await,
            "release" => self.do_release(rest).await,
            "kick" => self.do_kick(rest).await,
            "kick_job" => self.do_kick_job(rest).await,
            "body" => self.do_body(rest),
            "hist" => {
                for line in &self.history {
                    println!("{line}");
                }
                Ok(())
            },
            "shell" => self.do_shell(rest).await,
            _ => {
                println!("Bad command: {cmd}");
                Ok(())
            },
        };

        if let Err(e) = result {
            println!("ERROR: {e}");
        }

        Flow::Continue
    }

    async fn do_stats(&mut self) -> CmdResult {
        let stats = self.session.queue().stats().await?;
        print_yaml(&stats)
    }

    async fn do_tubes(&mut self) -> CmdResult {
        let tubes = self.session.queue().list_tubes().await?;
        let tubes: Vec<_> = tubes.iter().sorted().collect();
        let width = tubes.iter().map(|t| t.len()).max().unwrap_or(0);

        for tube in tubes {
            let st = self.session.queue().stats_tube(tube).await?;
            println!(
                "{tube:>width$} (buried: {}, delayed: {}, ready: {}, reserved: {}, urgent: {})",
                st.current_jobs_buried,
                st.current_jobs_delayed,
                st.current_jobs_ready,
                st.current_jobs_reserved,
                st.current_jobs_urgent,
            );
        }
        Ok(())
    }

    async fn do_use(&mut self, rest: &str) -> CmdResult {
        let tube = tube_arg(rest)?;
        self.session.select_tube(tube).await?;
        Ok(())
    }

    async fn do_stats_tube(&mut self, rest: &str) -> CmdResult {
        let tube = if rest.is_empty() {
            self.session.current_tube().to_owned()
        } else {
            tube_arg(rest)?.to_owned()
        };

        let stats = self.session.queue().stats_tube(&tube).await?;
        print_yaml(&stats)
    }

    async fn do_watch(&mut self, rest: &str) -> CmdResult {
        self.session.watch(tube_arg(rest)?).await?;
        println!(
            "OK, Current watching: {}",
            self.session.watching_display()
        );
        Ok(())
    }

    async fn do_ignore(&mut self, rest: &str) -> CmdResult {
        self.session.ignore(tube_arg(rest)?).await?;
        println!(
            "OK, Current watching: {}",
            self.session.watching_display()
        );
        Ok(())
    }

    async fn do_put(&mut self, rest: &str) -> CmdResult {
        let id = self.session.queue().put(rest.as_bytes()).await?;
        println!("{id}");
        Ok(())
    }

    async fn do_reserve(&mut self, rest: &str) -> CmdResult {
        let timeout = match rest {
            "" => None,
            arg => Some(parse_timeout(arg)?),
        };

        // A new reserve invalidates whatever handle we held.
        self.session.set_reserved(None);

        match self.session.queue().reserve(timeout).await? {
            None => println!("No job now"),
            Some(job) => {
                let stats = self.session.queue().stats_job(job.id).await?;
                self.session.set_reserved(Some(job));
                print_yaml(&stats)?;
            },
        }
        Ok(())
    }

    async fn do_stats_job(&mut self, rest: &str) -> CmdResult {
        let id = if !rest.is_empty() {
            parse_id(rest)?
        } else {
            match self.session.reserved() {
                Some(job) => job.id,
                None => {
                    println!("No job reserved now");
                    return Ok(());
                },
            }
        };

        let stats = self.session.queue().stats_job(id).await?;
        print_yaml(&stats)
    }

    async fn do_peek(&mut self, rest: &str) -> CmdResult {
        if rest.is_empty() {
            println!("Usage: peek id");
            return Ok(());
        }

        let id = parse_id(rest)?;
        match self.session.queue().peek(id).await? {
            None => println!("No such job"),
            Some(job) => {
                let stats = self.session.queue().stats_job(job.id).await?;
                print_yaml(&stats)?;
            },
        }
        Ok(())
    }

    async fn do_peek_state(&mut self, state: PeekState) -> CmdResult {
        match self.session.queue().peek_state(state).await? {
            None => println!("No job {state} now"),
            Some(job) => {
                let stats = self.session.queue().stats_job(job.id).await?;
                print_yaml(&stats)?;
            },
        }
        Ok(())
    }

    async fn do_clear(
        &mut self,
        rest: &str,
        state: PeekState,
        confirm: &mut impl Confirm,
    ) -> CmdResult {
        let mut words: Vec<_> = rest.split_whitespace().collect();
        let force = words.last() == Some(&"-f");
        if force {
            words.pop();
        }

        let target = match words.as_slice() {
            [] => None,
            [tube] => Some(tube_arg(tube)?.to_owned()),
            _ => {
                return Err(CommandError::Usage(format!(
                    "Usage: clear_{state} [tube] [-f]"
                )))
            },
        };

        let named = match &target {
            Some(tube) => tube.clone(),
            None => self.session.current_tube().to_owned(),
        };

        if !force {
            let question =
                format!("Clear all {state} jobs in {named} now? (y/N)");
            // Exactly "y": anything else, capital Y included, aborts with
            // no queue traffic.
            if confirm.ask(&question).await? != "y" {
                return Ok(());
            }
        }

        let outcome = clear::clear_state(
            &mut self.session,
            target.as_deref(),
            state,
            DeletePolicy::SkipFailures,
        )
        .await?;

        if outcome.cleared > 0 {
            println!("OK, {} {state} jobs cleared!", outcome.cleared);
        } else {
            println!("No {state} jobs to be cleared now");
        }
        Ok(())
    }

    async fn do_bury(&mut self, rest: &str) -> CmdResult {
        let id = self.job_id_or_reserved(rest)?;
        self.session.queue().bury(id).await?;
        println!("OK");
        Ok(())
    }

    async fn do_release(&mut self, rest: &str) -> CmdResult {
        let id = self.job_id_or_reserved(rest)?;
        self.session.queue().release(id).await?;
        println!("OK");
        Ok(())
    }

    async fn do_kick(&mut self, rest: &str) -> CmdResult {
        let bound = if rest.is_empty() { 1 } else { parse_id(rest)? };
        let n = self.session.queue().kick(bound).await?;
        println!("kicked {n} jobs to ready queue");
        Ok(())
    }

    async fn do_kick_job(&mut self, rest: &str) -> CmdResult {
        if rest.is_empty() {
            println!("Usage: kick_job jid");
            return Ok(());
        }

        self.session.queue().kick_job(parse_id(rest)?).await?;
        println!("OK");
        Ok(())
    }

    fn do_body(&mut self, rest: &str) -> CmdResult {
        if !rest.is_empty() {
            println!("** THIS PRINTS CURRENT RESERVED JOB **");
            return Ok(());
        }

        match self.session.reserved() {
            None => println!("No current job."),
            Some(job) => println!("{}", String::from_utf8_lossy(&job.body)),
        }
        Ok(())
    }

    async fn do_shell(&mut self, rest: &str) -> CmdResult {
        if rest.is_empty() {
            return Err(CommandError::Usage("Usage: shell cmd".into()));
        }

        tokio::process::Command::new("sh")
            .arg("-c")
            .arg(rest)
            .status()
            .await?;
        Ok(())
    }

    /// The job id argument `bury` and `release` take, falling back to the
    /// reserved job when none is given.
    fn job_id_or_reserved(&self, rest: &str) -> Result<u64, CommandError> {
        if rest.is_empty() {
            self.session.reserved().map(|j| j.id).ok_or_else(|| {
                CommandError::Usage("No job specified.".into())
            })
        } else {
            parse_id(rest)
        }
    }
}

fn print_yaml<T: serde::Serialize>(value: &T) -> CmdResult {
    println!(
        "{}",
        serde_yaml::to_string(value).map_err(CommandError::Render)?
    );
    Ok(())
}

fn tube_arg(rest: &str) -> Result<&str, CommandError> {
    if rest.is_empty() {
        return Err(CommandError::Usage("tube name required".into()));
    }
    if !is_valid_tube_name(rest) {
        return Err(CommandError::Usage(format!(
            "invalid tube name: {rest}"
        )));
    }
    Ok(rest)
}

fn parse_id(rest: &str) -> Result<u64, CommandError> {
    rest.parse().map_err(|_| {
        CommandError::Usage(format!("invalid job id: {rest}"))
    })
}

/// Timeouts are given in seconds and may be fractional; the wire command
/// takes whole seconds, so the fraction truncates away as the legacy
/// client's did.
fn parse_timeout(arg: &str) -> Result<u32, CommandError> {
    let seconds: f64 = arg.parse().map_err(|_| {
        CommandError::Usage(format!("invalid timeout: {arg}"))
    })?;

    if !seconds.is_finite() || seconds < 0.0 {
        return Err(CommandError::Usage(format!("invalid timeout: {arg}")));
    }

    Ok(seconds.trunc() as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_queue::FakeQueue;
    use crate::types::states::JobState;

    /// Scripted confirmation answers, recording each question asked.
    struct Answers {
        answers: Vec<&'static str>,
        asked: Vec<String>,
    }

    impl Answers {
        fn new(answers: &[&'static str]) -> Self {
            Self {
                answers: answers.to_vec(),
                asked: Vec::new(),
            }
        }
    }

    impl Confirm for Answers {
        async fn ask(&mut self, question: &str) -> io::Result<String> {
            self.asked.push(question.to_owned());
            Ok(self.answers.remove(0).to_owned())
        }
    }

    /// For dispatches that must not prompt at all.
    struct NoPrompt;

    impl Confirm for NoPrompt {
        async fn ask(&mut self, question: &str) -> io::Result<String> {
            panic!("unexpected confirmation prompt: {question}");
        }
    }

    async fn shell(queue: FakeQueue) -> Shell<FakeQueue> {
        Shell::new(
            Session::open(queue, "localhost", 11300).await.unwrap(),
        )
    }

    #[tokio::test]
    async fn test_unknown_command_continues() {
        let mut sh = shell(FakeQueue::new()).await;

        let flow = sh.dispatch("frobnicate now", &mut NoPrompt).await;
        assert_eq!(flow, Flow::Continue);

        // The same session keeps working afterwards.
        sh.dispatch("use elsewhere", &mut NoPrompt).await;
        assert_eq!(sh.session.current_tube(), "elsewhere");
    }

    #[tokio::test]
    async fn test_empty_line_is_a_noop() {
        let mut sh = shell(FakeQueue::new()).await;
        let baseline = sh.session.queue().calls.len();

        assert_eq!(sh.dispatch("", &mut NoPrompt).await, Flow::Continue);
        assert_eq!(sh.dispatch("   ", &mut NoPrompt).await, Flow::Continue);
        assert_eq!(sh.session.queue().calls.len(), baseline);
    }

    #[tokio::test]
    async fn test_exit_closes_and_stops() {
        let mut sh = shell(FakeQueue::new()).await;

        assert_eq!(sh.dispatch("exit", &mut NoPrompt).await, Flow::Quit);
        assert!(sh.session.queue().closed);

        // Quitting an already-closed session must not blow up.
        assert_eq!(sh.dispatch("quit", &mut NoPrompt).await, Flow::Quit);
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_loop() {
        let mut sh = shell(FakeQueue::new()).await;

        // Ignoring the last watched tube fails...
        let flow = sh.dispatch("ignore default", &mut NoPrompt).await;
        assert_eq!(flow, Flow::Continue);
        assert_eq!(sh.session.watching_display(), "default");

        // ...and bad ids are caught the same way.
        let flow = sh.dispatch("peek x", &mut NoPrompt).await;
        assert_eq!(flow, Flow::Continue);
    }

    #[tokio::test]
    async fn test_clear_declined_makes_no_calls() {
        let mut queue = FakeQueue::new();
        queue.push_job("default", JobState::Buried, 1);
        let mut sh = shell(queue).await;
        let baseline = sh.session.queue().calls.len();

        let mut confirm = Answers::new(&["n"]);
        sh.dispatch("clear_buried", &mut confirm).await;

        assert_eq!(
            confirm.asked,
            ["Clear all buried jobs in default now? (y/N)"]
        );
        // Declining touched the queue not at all.
        assert_eq!(sh.session.queue().calls.len(), baseline);
        assert_eq!(sh.session.queue().jobs.len(), 1);
        assert_eq!(sh.session.current_tube(), "default");
    }

    #[tokio::test]
    async fn test_clear_confirmation_is_exactly_y() {
        let mut queue = FakeQueue::new();
        queue.push_job("default", JobState::Buried, 1);
        let mut sh = shell(queue).await;

        // A capital Y is a refusal.
        sh.dispatch("clear_buried", &mut Answers::new(&["Y"])).await;
        assert_eq!(sh.session.queue().jobs.len(), 1);

        sh.dispatch("clear_buried", &mut Answers::new(&["y"])).await;
        assert_eq!(sh.session.queue().jobs.len(), 0);
    }

    #[tokio::test]
    async fn test_clear_force_skips_confirmation() {
        let mut queue = FakeQueue::new();
        queue.push_job("work", JobState::Delayed, 3);
        queue.push_job("work", JobState::Delayed, 4);
        let mut sh = shell(queue).await;

        // NoPrompt panics if asked; -f must not ask.
        sh.dispatch("clear_delayed work -f", &mut NoPrompt).await;
        assert_eq!(sh.session.queue().jobs.len(), 0);
        assert_eq!(sh.session.current_tube(), "default");
    }

    #[tokio::test]
    async fn test_clear_named_tube_restores_current() {
        let mut queue = FakeQueue::new();
        queue.push_job("work", JobState::Buried, 10);
        queue.push_job("work", JobState::Buried, 11);
        queue.push_job("work", JobState::Buried, 12);
        let mut sh = shell(queue).await;
        sh.dispatch("use elsewhere", &mut NoPrompt).await;

        sh.dispatch("clear_buried work", &mut Answers::new(&["y"])).await;

        assert_eq!(sh.session.queue().jobs.len(), 0);
        assert_eq!(sh.session.current_tube(), "elsewhere");
    }

    #[tokio::test]
    async fn test_reserve_updates_session() {
        let mut queue = FakeQueue::new();
        queue.push_job("default", JobState::Ready, 5);
        let mut sh = shell(queue).await;

        sh.dispatch("reserve 0", &mut NoPrompt).await;
        assert_eq!(sh.session.reserved().map(|j| j.id), Some(5));

        // A fresh reserve that times out drops the old handle.
        sh.dispatch("reserve 0.1", &mut NoPrompt).await;
        assert_eq!(sh.session.reserved(), None);
    }

    #[tokio::test]
    async fn test_bury_defaults_to_reserved_job() {
        let mut queue = FakeQueue::new();
        queue.push_job("default", JobState::Ready, 6);
        let mut sh = shell(queue).await;

        sh.dispatch("reserve 0", &mut NoPrompt).await;
        sh.dispatch("bury", &mut NoPrompt).await;
        assert_eq!(sh.session.queue().jobs[0].state, JobState::Buried);
    }

    #[tokio::test]
    async fn test_bury_without_job_makes_no_call() {
        let mut sh = shell(FakeQueue::new()).await;
        let baseline = sh.session.queue().calls.len();

        sh.dispatch("bury", &mut NoPrompt).await;
        assert_eq!(sh.session.queue().calls.len(), baseline);
    }

    #[tokio::test]
    async fn test_watch_and_watching() {
        let mut sh = shell(FakeQueue::new()).await;

        sh.dispatch("watch other", &mut NoPrompt).await;
        assert_eq!(sh.session.watching_display(), "default,other");
    }

    #[tokio::test]
    async fn test_kick_defaults_to_one() {
        let mut queue = FakeQueue::new();
        queue.push_job("default", JobState::Buried, 1);
        queue.push_job("default", JobState::Buried, 2);
        let mut sh = shell(queue).await;

        sh.dispatch("kick", &mut NoPrompt).await;
        assert_eq!(
            sh.session.queue().calls.last().unwrap(),
            "kick 1"
        );
    }

    #[tokio::test]
    async fn test_history_is_recorded_as_entered() {
        let mut sh = shell(FakeQueue::new()).await;

        sh.record("stats ");
        sh.record("frobnicate");
        assert_eq!(sh.history(), ["stats", "frobnicate"]);
    }
}
