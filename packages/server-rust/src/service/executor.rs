//! Task executor: per-batch scheduling, ordered execution, and result
//! assembly.
//!
//! Every task is classified sync/async before any task runs. A batch whose
//! tasks all classify `Sync` is driven through the synchronous path: the
//! one shared pipeline is polled to immediate completion, so no executor
//! hop or suspension occurs. Any other batch awaits each task through the
//! asynchronous path. Paths are never mixed inside one batch, tasks run
//! strictly sequentially in submission order, and a later task observes
//! every side effect of the earlier ones.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{debug, warn};

use synchub_core::tasks::query::CloseCursorsResult;
use synchub_core::tasks::keys::ReserveKeysResult;
use synchub_core::tasks::messaging::{
    SubscribeChanges, SubscribeChangesResult, SubscribeMessage, SubscribeMessageResult,
};
use synchub_core::{SyncRequest, SyncResponse, SyncTask, TaskError, TaskErrorKind, TaskResult};

use crate::cursors::CursorRegistry;
use crate::database::Database;
use crate::sequence::{KeySequencer, MemorySequenceStore};
use crate::service::classify::{classify, TaskSchedule};
use crate::service::context::ExecutionContext;
use crate::service::crud;
use crate::service::dispatch::MessageDispatcher;
use crate::service::events::EventDispatcher;

/// The engine root: executes submitted batches against one database.
pub struct TaskExecutor {
    database: Arc<Database>,
    cursors: Arc<CursorRegistry>,
    sequencer: Arc<KeySequencer>,
    dispatcher: Arc<MessageDispatcher>,
    events: Option<Arc<dyn EventDispatcher>>,
}

impl TaskExecutor {
    /// An executor over the database, with in-memory cursor and sequence
    /// state and an empty handler registry.
    pub fn new(database: Arc<Database>) -> Self {
        Self {
            database,
            cursors: Arc::new(CursorRegistry::new()),
            sequencer: Arc::new(KeySequencer::new(Arc::new(MemorySequenceStore::new()))),
            dispatcher: Arc::new(MessageDispatcher::new()),
            events: None,
        }
    }

    /// Replace the key sequencer (e.g. to use a durable sequence store).
    #[must_use]
    pub fn with_sequencer(mut self, sequencer: Arc<KeySequencer>) -> Self {
        self.sequencer = sequencer;
        self
    }

    /// Replace the message/command dispatcher.
    #[must_use]
    pub fn with_dispatcher(mut self, dispatcher: Arc<MessageDispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Attach the external event dispatcher enabling subscriptions and
    /// targeted push events.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventDispatcher>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.database
    }

    pub fn cursors(&self) -> &Arc<CursorRegistry> {
        &self.cursors
    }

    pub fn dispatcher(&self) -> &Arc<MessageDispatcher> {
        &self.dispatcher
    }

    /// Classify one task against the engine's current capabilities.
    #[must_use]
    pub fn classify(&self, task: &SyncTask) -> TaskSchedule {
        classify(task, &self.database, &self.dispatcher, &self.sequencer)
    }

    /// Execute one batch and assemble its ordered response.
    ///
    /// The response carries exactly one result per submitted task, in
    /// submission order. A fault in one task is contained at the task
    /// boundary; sibling tasks still execute.
    pub async fn run_batch(&self, request: SyncRequest) -> SyncResponse {
        let ctx = self.batch_context(&request);

        // Schedule side table, indexed by batch position. Computed for every
        // task before any task runs.
        let schedules: Vec<TaskSchedule> =
            request.tasks.iter().map(|task| self.classify(task)).collect();
        let all_sync = schedules.iter().all(|s| *s == TaskSchedule::Sync);
        debug!(
            tasks = request.tasks.len(),
            all_sync,
            user = %ctx.user,
            "executing batch"
        );

        let mut results = Vec::with_capacity(request.tasks.len());
        for (index, task) in request.tasks.into_iter().enumerate() {
            let discriminator = task.discriminator();
            let guarded = AssertUnwindSafe(self.execute(task, &ctx)).catch_unwind();
            let result = if all_sync {
                match guarded.now_or_never() {
                    Some(Ok(result)) => result,
                    Some(Err(payload)) => panic_result(index, discriminator, &payload),
                    None => {
                        warn!(index, discriminator, "sync-classified task suspended");
                        TaskResult::Error(TaskError::new(
                            TaskErrorKind::SyncError,
                            format!("synchronously classified task '{discriminator}' suspended"),
                        ))
                    }
                }
            } else {
                match guarded.await {
                    Ok(result) => result,
                    Err(payload) => panic_result(index, discriminator, &payload),
                }
            };
            results.push(result);
        }
        SyncResponse { results }
    }

    /// Drop all cursors the identity owns; called when its connection ends.
    pub fn end_connection(&self, user: &str) {
        let swept = self.cursors.sweep_owner(user);
        if swept > 0 {
            debug!(user, swept, "swept cursors on connection end");
        }
    }

    fn batch_context(&self, request: &SyncRequest) -> ExecutionContext {
        let mut ctx = ExecutionContext::new(
            request.user.clone().unwrap_or_else(|| "anonymous".to_string()),
            self.cursors.clone(),
        );
        ctx.client_id = request.client_id.clone();
        ctx
    }

    /// The one shared per-task pipeline; sync batches poll it to immediate
    /// completion, async batches await it.
    async fn execute(&self, task: SyncTask, ctx: &ExecutionContext) -> TaskResult {
        match task {
            SyncTask::Create(t) => crud::execute_create(&self.database, ctx, t).await,
            SyncTask::Upsert(t) => crud::execute_upsert(&self.database, ctx, t).await,
            SyncTask::Read(t) => crud::execute_read(&self.database, ctx, t).await,
            SyncTask::Query(t) => crud::execute_query(&self.database, ctx, t).await,
            SyncTask::Aggregate(t) => crud::execute_aggregate(&self.database, ctx, t).await,
            SyncTask::Merge(t) => crud::execute_merge(&self.database, ctx, t).await,
            SyncTask::Delete(t) => crud::execute_delete(&self.database, ctx, t).await,

            SyncTask::Message(t) => {
                self.dispatcher
                    .dispatch(&t, false, ctx, self.events.as_deref())
                    .await
            }
            SyncTask::Command(t) => {
                self.dispatcher
                    .dispatch(&t, true, ctx, self.events.as_deref())
                    .await
            }

            SyncTask::CloseCursors(t) => {
                if t.container.is_empty() {
                    return TaskResult::Error(TaskError::missing_field("container"));
                }
                let count = ctx
                    .cursors
                    .close(&t.container, t.cursors.as_deref(), &ctx.user);
                TaskResult::CloseCursors(CloseCursorsResult { count })
            }

            SyncTask::SubscribeChanges(t) => self.subscribe_changes(&t, ctx),
            SyncTask::SubscribeMessage(t) => self.subscribe_message(&t, ctx),

            SyncTask::ReserveKeys(t) => {
                if t.container.is_empty() {
                    return TaskResult::Error(TaskError::missing_field("container"));
                }
                if t.count == 0 {
                    return TaskResult::Error(TaskError::new(
                        TaskErrorKind::InvalidTask,
                        "count must be positive",
                    ));
                }
                match self.sequencer.reserve(&t.container, t.count, &ctx.user).await {
                    Ok(reservation) => TaskResult::ReserveKeys(ReserveKeysResult {
                        start: reservation.start,
                        count: reservation.count,
                        token: reservation.token,
                    }),
                    Err(err) => TaskResult::Error(err),
                }
            }
        }
    }

    fn subscribe_changes(&self, task: &SubscribeChanges, ctx: &ExecutionContext) -> TaskResult {
        if task.container.is_empty() {
            return TaskResult::Error(TaskError::missing_field("container"));
        }
        let Some(events) = &self.events else {
            return TaskResult::Error(TaskError::not_implemented(
                "event dispatching is not configured",
            ));
        };
        let Some(client) = &ctx.client_id else {
            return TaskResult::Error(TaskError::new(
                TaskErrorKind::InvalidTask,
                "subscriptions require a client id",
            ));
        };
        match events.subscribe_changes(&task.container, task, &ctx.user, client) {
            Ok(()) => TaskResult::SubscribeChanges(SubscribeChangesResult {}),
            Err(err) => TaskResult::Error(err),
        }
    }

    fn subscribe_message(&self, task: &SubscribeMessage, ctx: &ExecutionContext) -> TaskResult {
        if task.name.is_empty() {
            return TaskResult::Error(TaskError::missing_field("name"));
        }
        let Some(events) = &self.events else {
            return TaskResult::Error(TaskError::not_implemented(
                "event dispatching is not configured",
            ));
        };
        let Some(client) = &ctx.client_id else {
            return TaskResult::Error(TaskError::new(
                TaskErrorKind::InvalidTask,
                "subscriptions require a client id",
            ));
        };
        match events.subscribe_message(task, &ctx.user, client) {
            Ok(()) => TaskResult::SubscribeMessage(SubscribeMessageResult {}),
            Err(err) => TaskResult::Error(err),
        }
    }
}

/// Convert a caught panic into an `unhandledException` result for the
/// failing task alone.
fn panic_result(
    index: usize,
    discriminator: &'static str,
    payload: &(dyn Any + Send),
) -> TaskResult {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "task panicked".to_string());
    warn!(index, discriminator, %message, "task panicked");
    TaskResult::Error(TaskError {
        kind: TaskErrorKind::UnhandledException,
        message,
        stacktrace: Some(format!("task {index} ({discriminator})")),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use super::*;
    use crate::service::dispatch::{EchoHandler, MessageHandler};
    use crate::service::events::EventTargets;
    use synchub_core::tasks::crud::{CreateEntities, UpsertEntities};
    use synchub_core::tasks::keys::ReserveKeys;
    use synchub_core::tasks::messaging::{ChangeType, SendMessage};
    use synchub_core::tasks::query::{CloseCursors, QueryEntities, ReadEntities};
    use synchub_core::{Entity, EntityKey};

    fn executor() -> TaskExecutor {
        TaskExecutor::new(Arc::new(Database::in_memory()))
    }

    fn request(user: &str, tasks: Vec<SyncTask>) -> SyncRequest {
        SyncRequest {
            tasks,
            user: Some(user.to_string()),
            client_id: None,
            token: None,
        }
    }

    fn create(container: &str, entities: Vec<Entity>) -> SyncTask {
        SyncTask::Create(CreateEntities {
            container: container.to_string(),
            entities,
        })
    }

    fn read(container: &str, ids: &[&str]) -> SyncTask {
        SyncTask::Read(ReadEntities {
            container: container.to_string(),
            ids: ids.iter().map(|id| EntityKey::new(*id)).collect(),
            references: vec![],
        })
    }

    fn paged_query(container: &str, max_count: u32, cursor: Option<String>) -> SyncTask {
        SyncTask::Query(QueryEntities {
            container: container.to_string(),
            filter: None,
            order_by_key: None,
            limit: None,
            max_count: Some(max_count),
            cursor,
            references: vec![],
        })
    }

    fn msg(name: &str) -> SyncTask {
        SyncTask::Message(SendMessage {
            name: name.to_string(),
            param: None,
            users: vec![],
            clients: vec![],
            groups: vec![],
        })
    }

    /// Async-classified handler used to force batches onto the async path.
    struct AsyncEcho;
    #[async_trait]
    impl MessageHandler for AsyncEcho {
        fn is_synchronous(&self) -> bool {
            false
        }
        async fn invoke(
            &self,
            _name: &str,
            param: Option<&Value>,
            _ctx: &ExecutionContext,
        ) -> Result<Value, TaskError> {
            tokio::task::yield_now().await;
            Ok(param.cloned().unwrap_or(Value::Null))
        }
    }

    struct PanicHandler;
    #[async_trait]
    impl MessageHandler for PanicHandler {
        async fn invoke(
            &self,
            _name: &str,
            _param: Option<&Value>,
            _ctx: &ExecutionContext,
        ) -> Result<Value, TaskError> {
            panic!("handler exploded");
        }
    }

    #[tokio::test]
    async fn batch_of_n_yields_n_ordered_results() {
        let executor = executor();
        executor.dispatcher().register("std.Echo", Arc::new(EchoHandler));

        let response = executor
            .run_batch(request(
                "alice",
                vec![
                    create("articles", vec![Entity::unkeyed(json!({"id": "a-1"}))]),
                    msg("std.Echo"),
                    read("articles", &["a-1"]),
                ],
            ))
            .await;

        assert_eq!(response.results.len(), 3);
        assert!(matches!(response.results[0], TaskResult::Create(_)));
        assert!(matches!(response.results[1], TaskResult::Message(_)));
        assert!(matches!(response.results[2], TaskResult::Read(_)));
    }

    #[tokio::test]
    async fn same_batch_visibility_create_then_read() {
        let executor = executor();
        let response = executor
            .run_batch(request(
                "alice",
                vec![
                    create(
                        "items",
                        vec![Entity::unkeyed(json!({"id": "a", "v": 1}))],
                    ),
                    read("items", &["a"]),
                ],
            ))
            .await;

        match &response.results[1] {
            TaskResult::Read(r) => {
                assert_eq!(r.entities.len(), 1);
                assert_eq!(r.entities[0].value["v"], json!(1));
            }
            other => panic!("expected read result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn async_batch_preserves_order_and_results() {
        let executor = executor();
        executor.dispatcher().register("slow", Arc::new(AsyncEcho));

        let tasks = vec![
            create("items", vec![Entity::unkeyed(json!({"id": "a"}))]),
            msg("slow"),
            read("items", &["a"]),
        ];
        // The "slow" handler classifies async, so the whole batch takes the
        // asynchronous path.
        assert_eq!(executor.classify(&tasks[1]), TaskSchedule::Async);

        let response = executor.run_batch(request("alice", tasks)).await;
        assert_eq!(response.results.len(), 3);
        assert!(matches!(response.results[1], TaskResult::Message(_)));
        match &response.results[2] {
            TaskResult::Read(r) => assert_eq!(r.entities.len(), 1),
            other => panic!("expected read result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn panicking_task_is_contained() {
        let executor = executor();
        executor.dispatcher().register("boom", Arc::new(PanicHandler));

        let response = executor
            .run_batch(request(
                "alice",
                vec![
                    create("items", vec![Entity::unkeyed(json!({"id": "a"}))]),
                    msg("boom"),
                    read("items", &["a"]),
                ],
            ))
            .await;

        let err = response.results[1].error().unwrap();
        assert_eq!(err.kind, TaskErrorKind::UnhandledException);
        assert!(err.message.contains("handler exploded"));
        assert!(err.stacktrace.is_some());
        // Siblings are unaffected.
        assert!(matches!(response.results[0], TaskResult::Create(_)));
        match &response.results[2] {
            TaskResult::Read(r) => assert_eq!(r.entities.len(), 1),
            other => panic!("expected read result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cursor_ownership_is_opaque_across_identities() {
        let executor = executor();
        executor
            .run_batch(request(
                "alice",
                vec![SyncTask::Upsert(UpsertEntities {
                    container: "items".to_string(),
                    entities: (1..=4)
                        .map(|i| Entity::unkeyed(json!({"id": format!("a-{i}")})))
                        .collect(),
                })],
            ))
            .await;

        let opened = executor
            .run_batch(request("alice", vec![paged_query("items", 2, None)]))
            .await;
        let token = match &opened.results[0] {
            TaskResult::Query(r) => r.cursor.clone().unwrap(),
            other => panic!("expected query result, got {other:?}"),
        };

        // Another identity continuing the cursor sees "not found".
        let foreign = executor
            .run_batch(request(
                "bob",
                vec![paged_query("items", 2, Some(token.clone()))],
            ))
            .await;
        assert_eq!(
            foreign.results[0].error().unwrap().kind,
            TaskErrorKind::InvalidTask
        );

        // Another identity closing it closes nothing.
        let foreign_close = executor
            .run_batch(request(
                "bob",
                vec![SyncTask::CloseCursors(CloseCursors {
                    container: "items".to_string(),
                    cursors: Some(vec![token.clone()]),
                })],
            ))
            .await;
        match &foreign_close.results[0] {
            TaskResult::CloseCursors(r) => assert_eq!(r.count, 0),
            other => panic!("expected closeCursors result, got {other:?}"),
        }

        // The owner still iterates.
        let second = executor
            .run_batch(request("alice", vec![paged_query("items", 2, Some(token))]))
            .await;
        match &second.results[0] {
            TaskResult::Query(r) => assert_eq!(r.entities.len(), 2),
            other => panic!("expected query result, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn close_cursors_without_tokens_closes_all_owned() {
        let executor = executor();
        executor
            .run_batch(request(
                "alice",
                vec![SyncTask::Upsert(UpsertEntities {
                    container: "items".to_string(),
                    entities: (1..=6)
                        .map(|i| Entity::unkeyed(json!({"id": format!("a-{i}")})))
                        .collect(),
                })],
            ))
            .await;
        executor
            .run_batch(request(
                "alice",
                vec![
                    paged_query("items", 2, None),
                    paged_query("items", 2, None),
                ],
            ))
            .await;
        assert_eq!(executor.cursors().active("items"), 2);

        let closed = executor
            .run_batch(request(
                "alice",
                vec![SyncTask::CloseCursors(CloseCursors {
                    container: "items".to_string(),
                    cursors: None,
                })],
            ))
            .await;
        match &closed.results[0] {
            TaskResult::CloseCursors(r) => assert_eq!(r.count, 2),
            other => panic!("expected closeCursors result, got {other:?}"),
        }
        assert_eq!(executor.cursors().active("items"), 0);
    }

    #[tokio::test]
    async fn reserve_keys_returns_contiguous_ranges() {
        let executor = executor();
        let response = executor
            .run_batch(request(
                "alice",
                vec![
                    SyncTask::ReserveKeys(ReserveKeys {
                        container: "items".to_string(),
                        count: 5,
                    }),
                    SyncTask::ReserveKeys(ReserveKeys {
                        container: "items".to_string(),
                        count: 7,
                    }),
                ],
            ))
            .await;

        let (first, second) = match (&response.results[0], &response.results[1]) {
            (TaskResult::ReserveKeys(a), TaskResult::ReserveKeys(b)) => (a, b),
            other => panic!("expected reserveKeys results, got {other:?}"),
        };
        assert_eq!(first.start, 1);
        assert_eq!(second.start, 6);
        assert_ne!(first.token, second.token);
    }

    #[tokio::test]
    async fn subscriptions_require_events_and_a_client_id() {
        #[derive(Default)]
        struct Recording {
            changes: Mutex<Vec<String>>,
        }
        impl EventDispatcher for Recording {
            fn subscribe_changes(
                &self,
                container: &str,
                _subscribe: &SubscribeChanges,
                _user: &str,
                _client: &str,
            ) -> Result<(), TaskError> {
                self.changes.lock().push(container.to_string());
                Ok(())
            }
            fn subscribe_message(
                &self,
                _subscribe: &SubscribeMessage,
                _user: &str,
                _client: &str,
            ) -> Result<(), TaskError> {
                Ok(())
            }
            fn enqueue_message_event(
                &self,
                _name: &str,
                _param: Option<&Value>,
                _targets: &EventTargets,
            ) {
            }
        }

        let subscribe = SyncTask::SubscribeChanges(SubscribeChanges {
            container: "items".to_string(),
            changes: vec![ChangeType::Create],
            filter: None,
        });

        // No event dispatcher configured.
        let bare = executor();
        let response = bare.run_batch(request("alice", vec![subscribe.clone()])).await;
        assert_eq!(
            response.results[0].error().unwrap().kind,
            TaskErrorKind::NotImplemented
        );

        // Dispatcher configured but no client id on the request.
        let events = Arc::new(Recording::default());
        let executor =
            TaskExecutor::new(Arc::new(Database::in_memory())).with_events(events.clone());
        let response = executor
            .run_batch(request("alice", vec![subscribe.clone()]))
            .await;
        assert_eq!(
            response.results[0].error().unwrap().kind,
            TaskErrorKind::InvalidTask
        );

        // Fully specified subscription registers.
        let mut with_client = request("alice", vec![subscribe]);
        with_client.client_id = Some("client-1".to_string());
        let response = executor.run_batch(with_client).await;
        assert!(matches!(
            response.results[0],
            TaskResult::SubscribeChanges(_)
        ));
        assert_eq!(events.changes.lock().as_slice(), ["items"]);
    }

    #[tokio::test]
    async fn sync_and_async_paths_produce_identical_results() {
        let tasks = || {
            vec![
                create("items", vec![Entity::unkeyed(json!({"id": "a"}))]),
                read("items", &["a"]),
                msg("unknown"),
            ]
        };

        let sync_exec = executor();
        let sync_response = sync_exec.run_batch(request("alice", tasks())).await;

        let async_exec = executor();
        // An async-classified handler somewhere in the registry does not
        // change per-task outcomes, only the chosen path.
        async_exec.dispatcher().register("slow", Arc::new(AsyncEcho));
        let mut with_async = tasks();
        with_async.push(SyncTask::Message(SendMessage {
            name: "slow".to_string(),
            param: None,
            users: vec![],
            clients: vec![],
            groups: vec![],
        }));
        let async_response = async_exec.run_batch(request("alice", with_async)).await;

        assert_eq!(sync_response.results.len(), 3);
        assert_eq!(async_response.results.len(), 4);
        assert_eq!(sync_response.results[..], async_response.results[..3]);
    }

    #[tokio::test]
    async fn end_connection_sweeps_the_identitys_cursors() {
        let executor = executor();
        executor
            .run_batch(request(
                "alice",
                vec![SyncTask::Upsert(UpsertEntities {
                    container: "items".to_string(),
                    entities: (1..=4)
                        .map(|i| Entity::unkeyed(json!({"id": format!("a-{i}")})))
                        .collect(),
                })],
            ))
            .await;
        executor
            .run_batch(request("alice", vec![paged_query("items", 2, None)]))
            .await;
        assert_eq!(executor.cursors().active("items"), 1);

        executor.end_connection("alice");
        assert_eq!(executor.cursors().active("items"), 0);
    }
}
