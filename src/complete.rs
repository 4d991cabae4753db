//! tube-name completion for line editors.
use itertools::Itertools;

use crate::client::{ClientError, Queue};

/// Which tube names a completion draws from. `ignore` completes over the
/// watched subset; every other tube-taking command completes over all
/// known tubes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Scope {
    AllTubes,
    WatchedTubes,
}

/// Returns the names starting with `prefix`, sorted; the whole scope when
/// the prefix is empty.
pub fn complete_tube<'a, I>(prefix: &str, names: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    names
        .into_iter()
        .filter(|name| name.starts_with(prefix))
        .map(str::to_owned)
        .sorted()
        .collect()
}

/// Completion candidates for `prefix`, querying the server's current tube
/// or watch list each time. Nothing is cached: completions reflect the
/// queue as it is now, not as it was at some earlier keystroke.
pub async fn candidates<Q: Queue>(
    queue: &mut Q,
    scope: Scope,
    prefix: &str,
) -> Result<Vec<String>, ClientError> {
    let names = match scope {
        Scope::AllTubes => queue.list_tubes().await?,
        Scope::WatchedTubes => queue.list_watched().await?,
    };

    Ok(complete_tube(prefix, names.iter().map(String::as_str)))
}
