use crate::config::Engine;
use crate::db::connector::Connector;
use crate::db::statement::{ResultSet, Statement};
use crate::error::TagVaultError;
use ractor::{Actor, ActorProcessingErr, ActorRef};
use std::sync::Arc;
use tokio::sync::{Semaphore, oneshot};
use tracing::{Instrument, Span, debug, info, warn};

/// Callback invoked with the raw rows of a successful query, on a worker task.
pub type ResultHandler = Box<dyn FnOnce(ResultSet) + Send + 'static>;

/// Callback invoked instead of the [`ResultHandler`] when the query fails.
pub type FailureHandler = Box<dyn FnOnce() + Send + 'static>;

pub enum ExecutorMessage {
    /// Run a mutating statement; report success on `done`.
    Execute {
        statement: Statement,
        done: oneshot::Sender<bool>,
    },

    /// Run a read statement and hand the rows to `handler`; report success on `done`.
    Query {
        statement: Statement,
        handler: ResultHandler,
        on_failure: Option<FailureHandler>,
        done: oneshot::Sender<bool>,
    },

    /// Create the profile relation if missing.
    EnsureSchema { done: oneshot::Sender<bool> },

    /// Reply once every statement received before this message has finished.
    Drain(oneshot::Sender<()>),

    /// Drain, close the connector, then stop.
    Shutdown(oneshot::Sender<()>),
}

/// Resolves to `true` when the dispatched statement succeeded.
///
/// Dropping it leaves the statement running; this is the fire-and-forget path.
pub struct Completion {
    rx: oneshot::Receiver<bool>,
}

impl Completion {
    /// Waits for the statement to finish. A failed statement, or one that never
    /// ran because the executor stopped, yields `false`.
    pub async fn wait(self) -> bool {
        self.rx.await.unwrap_or(false)
    }
}

/// Cloneable handle to the executor actor. Every scheduling call returns
/// immediately; statements run on worker tasks, bounded by `max_in_flight`.
#[derive(Clone)]
pub struct ExecutorHandle {
    actor: ActorRef<ExecutorMessage>,
    connector: Arc<dyn Connector>,
}

impl ExecutorHandle {
    /// Spawn the executor for an already constructed connector.
    pub async fn spawn(
        connector: Arc<dyn Connector>,
        max_in_flight: u32,
    ) -> Result<Self, TagVaultError> {
        let span = tracing::info_span!("db", engine = %connector.engine());
        let args = ExecutorArgs {
            connector: connector.clone(),
            max_in_flight: max_in_flight.max(1),
            span,
        };
        let (actor, _jh) = Actor::spawn(None, DbExecutor, args)
            .await
            .map_err(|e| TagVaultError::RactorError(format!("DbExecutor spawn failed: {e}")))?;

        Ok(Self { actor, connector })
    }

    pub fn engine(&self) -> Engine {
        self.connector.engine()
    }

    pub fn is_connected(&self) -> bool {
        self.connector.is_connected()
    }

    pub fn execute(&self, statement: Statement) -> Result<Completion, TagVaultError> {
        self.ensure_ready()?;
        let (done, rx) = oneshot::channel();
        ractor::cast!(self.actor, ExecutorMessage::Execute { statement, done })
            .map_err(|e| TagVaultError::RactorError(format!("Execute cast failed: {e}")))?;
        Ok(Completion { rx })
    }

    /// `handler` runs on a worker task and must not assume any particular thread.
    pub fn query<F>(&self, statement: Statement, handler: F) -> Result<Completion, TagVaultError>
    where
        F: FnOnce(ResultSet) + Send + 'static,
    {
        self.dispatch_query(statement, Box::new(handler), None)
    }

    /// Like [`query`](Self::query), but `on_failure` runs (on the worker task)
    /// when the statement fails.
    pub fn query_or_else<F, E>(
        &self,
        statement: Statement,
        handler: F,
        on_failure: E,
    ) -> Result<Completion, TagVaultError>
    where
        F: FnOnce(ResultSet) + Send + 'static,
        E: FnOnce() + Send + 'static,
    {
        self.dispatch_query(statement, Box::new(handler), Some(Box::new(on_failure)))
    }

    fn dispatch_query(
        &self,
        statement: Statement,
        handler: ResultHandler,
        on_failure: Option<FailureHandler>,
    ) -> Result<Completion, TagVaultError> {
        self.ensure_ready()?;
        let (done, rx) = oneshot::channel();
        ractor::cast!(
            self.actor,
            ExecutorMessage::Query {
                statement,
                handler,
                on_failure,
                done
            }
        )
        .map_err(|e| TagVaultError::RactorError(format!("Query cast failed: {e}")))?;
        Ok(Completion { rx })
    }

    pub fn ensure_schema(&self) -> Result<Completion, TagVaultError> {
        self.ensure_ready()?;
        let (done, rx) = oneshot::channel();
        ractor::cast!(self.actor, ExecutorMessage::EnsureSchema { done })
            .map_err(|e| TagVaultError::RactorError(format!("EnsureSchema cast failed: {e}")))?;
        Ok(Completion { rx })
    }

    /// Wait for every statement scheduled so far to finish.
    pub async fn drain(&self) -> Result<(), TagVaultError> {
        let (tx, rx) = oneshot::channel();
        ractor::cast!(self.actor, ExecutorMessage::Drain(tx))
            .map_err(|e| TagVaultError::RactorError(format!("Drain cast failed: {e}")))?;
        rx.await
            .map_err(|e| TagVaultError::RactorError(format!("Drain reply dropped: {e}")))
    }

    /// Finish outstanding statements, close the connector and stop the executor.
    pub async fn shutdown(&self) -> Result<(), TagVaultError> {
        let (tx, rx) = oneshot::channel();
        ractor::cast!(self.actor, ExecutorMessage::Shutdown(tx))
            .map_err(|e| TagVaultError::RactorError(format!("Shutdown cast failed: {e}")))?;
        rx.await
            .map_err(|e| TagVaultError::RactorError(format!("Shutdown reply dropped: {e}")))
    }

    fn ensure_ready(&self) -> Result<(), TagVaultError> {
        if self.connector.is_connected() {
            Ok(())
        } else {
            Err(TagVaultError::ConnectionNotReady)
        }
    }
}

struct ExecutorArgs {
    connector: Arc<dyn Connector>,
    max_in_flight: u32,
    span: Span,
}

struct DbExecutorState {
    connector: Arc<dyn Connector>,
    permits: Arc<Semaphore>,
    max_in_flight: u32,
    span: Span,
}

struct DbExecutor;

#[ractor::async_trait]
impl Actor for DbExecutor {
    type Msg = ExecutorMessage;
    type State = DbExecutorState;
    type Arguments = ExecutorArgs;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        args: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let permits = Arc::new(Semaphore::new(args.max_in_flight as usize));
        args.span.in_scope(|| {
            info!(max_in_flight = args.max_in_flight, "DbExecutor initialized");
        });
        Ok(DbExecutorState {
            connector: args.connector,
            permits,
            max_in_flight: args.max_in_flight,
            span: args.span,
        })
    }

    async fn handle(
        &self,
        myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            ExecutorMessage::Execute { statement, done } => {
                let Ok(permit) = state.permits.clone().acquire_owned().await else {
                    return Ok(());
                };
                let connector = state.connector.clone();
                tokio::spawn(
                    async move {
                        let ok = match connector.execute(&statement).await {
                            Ok(affected) => {
                                debug!(statement = %statement, affected, "statement executed");
                                true
                            }
                            Err(e) => {
                                warn!(statement = %statement, error = %e, "An error occurred while executing an update on the database");
                                false
                            }
                        };
                        drop(permit);
                        let _ = done.send(ok);
                    }
                    .instrument(state.span.clone()),
                );
            }
            ExecutorMessage::Query {
                statement,
                handler,
                on_failure,
                done,
            } => {
                let Ok(permit) = state.permits.clone().acquire_owned().await else {
                    return Ok(());
                };
                let connector = state.connector.clone();
                tokio::spawn(
                    async move {
                        let ok = match connector.query(&statement).await {
                            Ok(rows) => {
                                debug!(statement = %statement, rows = rows.len(), "query returned");
                                handler(rows);
                                true
                            }
                            Err(e) => {
                                warn!(statement = %statement, error = %e, "An error occurred while executing a query on the database");
                                if let Some(on_failure) = on_failure {
                                    on_failure();
                                }
                                false
                            }
                        };
                        // Held through the handler so `Drain` also covers result processing.
                        drop(permit);
                        let _ = done.send(ok);
                    }
                    .instrument(state.span.clone()),
                );
            }
            ExecutorMessage::EnsureSchema { done } => {
                let Ok(permit) = state.permits.clone().acquire_owned().await else {
                    return Ok(());
                };
                let connector = state.connector.clone();
                tokio::spawn(
                    async move {
                        let ok = match connector.ensure_schema().await {
                            Ok(()) => true,
                            Err(e) => {
                                warn!(error = %e, "An error occurred while creating the database table");
                                false
                            }
                        };
                        drop(permit);
                        let _ = done.send(ok);
                    }
                    .instrument(state.span.clone()),
                );
            }
            ExecutorMessage::Drain(reply) => {
                drain(state).await;
                let _ = reply.send(());
            }
            ExecutorMessage::Shutdown(reply) => {
                drain(state).await;
                state.permits.close();
                state.connector.close().await;
                state.span.in_scope(|| info!("DbExecutor shut down"));
                let _ = reply.send(());
                myself.stop(None);
            }
        }
        Ok(())
    }
}

/// Take every permit once, which only succeeds after all in-flight tasks released theirs.
async fn drain(state: &DbExecutorState) {
    if let Ok(all) = state.permits.acquire_many(state.max_in_flight).await {
        drop(all);
    }
}
