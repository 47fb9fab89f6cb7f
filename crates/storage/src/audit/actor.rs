//! Identity of the caller behind a mutation.

use std::future::Future;

/// Acting user, client and subject recorded on audit events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actor {
    /// Acting user.
    pub user: Option<String>,
    /// Acting OAuth client.
    pub client: Option<String>,
    /// Acting subject.
    pub subject: Option<String>,
}

impl Actor {
    /// The identity used for work the process does on its own behalf.
    #[must_use]
    pub fn system() -> Self {
        Self { user: Some("system".to_owned()), client: None, subject: None }
    }

    /// An actor identified by user name only.
    #[must_use]
    pub fn user(user: impl Into<String>) -> Self {
        Self { user: Some(user.into()), ..Self::default() }
    }

    /// Sets the acting client.
    #[must_use]
    pub fn with_client(mut self, client: impl Into<String>) -> Self {
        self.client = Some(client.into());
        self
    }

    /// Sets the acting subject.
    #[must_use]
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

/// Supplies the actor for the call currently in progress.
pub trait ActorSource: Send + Sync {
    /// Returns the current actor.
    fn current(&self) -> Actor;
}

impl ActorSource for Actor {
    fn current(&self) -> Actor {
        self.clone()
    }
}

impl<A: ActorSource + ?Sized> ActorSource for std::sync::Arc<A> {
    fn current(&self) -> Actor {
        (**self).current()
    }
}

tokio::task_local! {
    static CURRENT_ACTOR: Actor;
}

/// Reads the actor scoped around the current task with [`TaskLocalActor::scope`].
///
/// Outside any scope the fallback actor is reported.
///
/// ```
/// use idp_storage::audit::{Actor, ActorSource, TaskLocalActor};
///
/// # tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(async {
/// let source = TaskLocalActor::default();
/// let seen = TaskLocalActor::scope(Actor::user("alice"), async { source.current() }).await;
/// assert_eq!(seen.user.as_deref(), Some("alice"));
/// assert_eq!(source.current(), Actor::system());
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct TaskLocalActor {
    fallback: Actor,
}

impl TaskLocalActor {
    /// Creates a source reporting `fallback` outside any scope.
    #[must_use]
    pub fn new(fallback: Actor) -> Self {
        Self { fallback }
    }

    /// Runs `fut` with `actor` as the current actor.
    pub async fn scope<F: Future>(actor: Actor, fut: F) -> F::Output {
        CURRENT_ACTOR.scope(actor, fut).await
    }
}

impl Default for TaskLocalActor {
    fn default() -> Self {
        Self::new(Actor::system())
    }
}

impl ActorSource for TaskLocalActor {
    fn current(&self) -> Actor {
        CURRENT_ACTOR.try_with(Clone::clone).unwrap_or_else(|_| self.fallback.clone())
    }
}
