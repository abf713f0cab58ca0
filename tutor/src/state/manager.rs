//! StateManager - actor that owns the document store
//!
//! Processes commands via channels for thread-safe access to persistent
//! state. All persistence from the dialogue flow and the pipeline goes
//! through this handle.

use std::path::Path;

use lessonstore::{Filter, Store};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::{ContentItem, LearningRequest, LessonPlan};

use super::messages::{StateCommand, StateError, StateResponse};

/// Handle to send commands to the StateManager
#[derive(Clone)]
pub struct StateManager {
    tx: mpsc::Sender<StateCommand>,
}

impl StateManager {
    /// Spawn a new StateManager actor over a store at the given path
    pub fn spawn(store_path: impl AsRef<Path>) -> eyre::Result<Self> {
        debug!(store_path = %store_path.as_ref().display(), "spawn: called");
        let store = Store::open(store_path.as_ref())?;

        let (tx, rx) = mpsc::channel(256);
        tokio::spawn(actor_loop(store, rx));

        info!("StateManager spawned");
        Ok(Self { tx })
    }

    async fn send<T>(
        &self,
        make: impl FnOnce(tokio::sync::oneshot::Sender<StateResponse<T>>) -> StateCommand,
    ) -> StateResponse<T> {
        let (reply_tx, reply_rx) = tokio::sync::oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| StateError::ChannelError)?;
        reply_rx.await.map_err(|_| StateError::ChannelError)?
    }

    // === LearningRequest operations ===

    /// Create a new LearningRequest
    pub async fn create_request(&self, request: LearningRequest) -> StateResponse<String> {
        debug!(request_id = %request.id, "create_request: called");
        self.send(|reply| StateCommand::CreateRequest { request, reply }).await
    }

    /// Get a LearningRequest by id
    pub async fn get_request(&self, id: &str) -> StateResponse<Option<LearningRequest>> {
        debug!(%id, "get_request: called");
        let id = id.to_string();
        self.send(|reply| StateCommand::GetRequest { id, reply }).await
    }

    /// Get a LearningRequest by id, returning an error if not found
    pub async fn get_request_required(&self, id: &str) -> Result<LearningRequest, StateError> {
        debug!(%id, "get_request_required: called");
        self.get_request(id)
            .await?
            .ok_or_else(|| StateError::NotFound(format!("LearningRequest {}", id)))
    }

    /// Update a LearningRequest
    pub async fn update_request(&self, request: LearningRequest) -> StateResponse<()> {
        debug!(request_id = %request.id, status = %request.status, "update_request: called");
        self.send(|reply| StateCommand::UpdateRequest { request, reply }).await
    }

    /// List LearningRequests, optionally by status
    pub async fn list_requests(&self, status_filter: Option<String>) -> StateResponse<Vec<LearningRequest>> {
        debug!(?status_filter, "list_requests: called");
        self.send(|reply| StateCommand::ListRequests { status_filter, reply })
            .await
    }

    /// Delete a LearningRequest and every LessonPlan referencing it
    ///
    /// Returns the number of dependent plans removed.
    pub async fn delete_request(&self, id: &str) -> StateResponse<usize> {
        debug!(%id, "delete_request: called");
        let id = id.to_string();
        self.send(|reply| StateCommand::DeleteRequest { id, reply }).await
    }

    // === LessonPlan operations ===

    /// Create a new LessonPlan
    pub async fn create_plan(&self, plan: LessonPlan) -> StateResponse<String> {
        debug!(plan_id = %plan.id, request_id = %plan.learning_request_id, "create_plan: called");
        self.send(|reply| StateCommand::CreatePlan { plan, reply }).await
    }

    /// Get a LessonPlan by id
    pub async fn get_plan(&self, id: &str) -> StateResponse<Option<LessonPlan>> {
        debug!(%id, "get_plan: called");
        let id = id.to_string();
        self.send(|reply| StateCommand::GetPlan { id, reply }).await
    }

    /// Update a LessonPlan
    pub async fn update_plan(&self, plan: LessonPlan) -> StateResponse<()> {
        debug!(plan_id = %plan.id, "update_plan: called");
        self.send(|reply| StateCommand::UpdatePlan { plan, reply }).await
    }

    /// List LessonPlans, optionally for one request
    pub async fn list_plans(&self, request_filter: Option<String>) -> StateResponse<Vec<LessonPlan>> {
        debug!(?request_filter, "list_plans: called");
        self.send(|reply| StateCommand::ListPlans { request_filter, reply })
            .await
    }

    // === ContentItem operations ===

    /// Create a new ContentItem
    pub async fn create_content(&self, item: ContentItem) -> StateResponse<String> {
        debug!(item_id = %item.id, "create_content: called");
        self.send(|reply| StateCommand::CreateContent { item, reply }).await
    }

    /// List ContentItems, optionally for one plan
    pub async fn list_content(&self, plan_filter: Option<String>) -> StateResponse<Vec<ContentItem>> {
        debug!(?plan_filter, "list_content: called");
        self.send(|reply| StateCommand::ListContent { plan_filter, reply }).await
    }

    /// Delete a ContentItem by id
    pub async fn delete_content(&self, id: &str) -> StateResponse<()> {
        debug!(%id, "delete_content: called");
        let id = id.to_string();
        self.send(|reply| StateCommand::DeleteContent { id, reply }).await
    }

    // === Store operations ===

    /// Reload the store from its JSONL files
    pub async fn sync(&self) -> StateResponse<()> {
        debug!("sync: called");
        self.send(|reply| StateCommand::Sync { reply }).await
    }

    /// Shutdown the StateManager
    pub async fn shutdown(&self) -> Result<(), StateError> {
        debug!("shutdown: called");
        self.tx
            .send(StateCommand::Shutdown)
            .await
            .map_err(|_| StateError::ChannelError)
    }
}

/// The actor loop that owns the Store and processes commands
async fn actor_loop(mut store: Store, mut rx: mpsc::Receiver<StateCommand>) {
    debug!("StateManager actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            StateCommand::CreateRequest { request, reply } => {
                let result = store.create(request).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetRequest { id, reply } => {
                let result: StateResponse<Option<LearningRequest>> =
                    store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::UpdateRequest { request, reply } => {
                let result = store.update(request).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::ListRequests { status_filter, reply } => {
                let mut filters = Vec::new();
                if let Some(status) = status_filter {
                    filters.push(Filter::eq("status", status));
                }
                let result: StateResponse<Vec<LearningRequest>> =
                    store.list(&filters).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::DeleteRequest { id, reply } => {
                let _ = reply.send(delete_request_cascade(&mut store, &id));
            }

            StateCommand::CreatePlan { plan, reply } => {
                let result = store.create(plan).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::GetPlan { id, reply } => {
                let result: StateResponse<Option<LessonPlan>> =
                    store.get(&id).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::UpdatePlan { plan, reply } => {
                let result = store.update(plan).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::ListPlans { request_filter, reply } => {
                let mut filters = Vec::new();
                if let Some(request_id) = request_filter {
                    filters.push(Filter::eq("learning_request_id", request_id));
                }
                let result: StateResponse<Vec<LessonPlan>> =
                    store.list(&filters).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::CreateContent { item, reply } => {
                let result = store.create(item).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::ListContent { plan_filter, reply } => {
                let mut filters = Vec::new();
                if let Some(plan_id) = plan_filter {
                    filters.push(Filter::eq("lesson_plan_id", plan_id));
                }
                let result: StateResponse<Vec<ContentItem>> =
                    store.list(&filters).map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::DeleteContent { id, reply } => {
                let result = store
                    .delete::<ContentItem>(&id)
                    .map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::Sync { reply } => {
                let result = store.sync().map_err(|e| StateError::StoreError(e.to_string()));
                let _ = reply.send(result);
            }

            StateCommand::Shutdown => {
                info!("StateManager shutting down");
                break;
            }
        }
    }

    debug!("StateManager actor stopped");
}

/// Delete a request and cascade to every plan referencing it
fn delete_request_cascade(store: &mut Store, id: &str) -> StateResponse<usize> {
    let request: Option<LearningRequest> = store.get(id).map_err(|e| StateError::StoreError(e.to_string()))?;
    if request.is_none() {
        return Err(StateError::NotFound(format!("LearningRequest {}", id)));
    }

    let dependents: Vec<LessonPlan> = store
        .list(&[Filter::eq("learning_request_id", id)])
        .map_err(|e| StateError::StoreError(e.to_string()))?;

    let mut removed = 0;
    for plan in dependents {
        store
            .delete::<LessonPlan>(&plan.id)
            .map_err(|e| StateError::StoreError(e.to_string()))?;
        removed += 1;
    }

    store
        .delete::<LearningRequest>(id)
        .map_err(|e| StateError::StoreError(e.to_string()))?;

    info!(request_id = %id, plans_removed = removed, "Deleted request with cascade");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LearningPreference, RequestStatus};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_request_crud() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        // Create
        let request = LearningRequest::with_id("req-1", "Kubernetes", "DevOps", LearningPreference::CoreConcepts);
        let id = manager.create_request(request).await.unwrap();
        assert_eq!(id, "req-1");

        // Get
        let retrieved = manager.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(retrieved.subject, "Kubernetes");

        // Update
        let mut updated = retrieved;
        updated.set_status(RequestStatus::Processing);
        manager.update_request(updated).await.unwrap();

        let retrieved = manager.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(retrieved.status, RequestStatus::Processing);

        // List with status filter
        let processing = manager.list_requests(Some("processing".to_string())).await.unwrap();
        assert_eq!(processing.len(), 1);
        let pending = manager.list_requests(Some("pending".to_string())).await.unwrap();
        assert!(pending.is_empty());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_get_request_required() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let result = manager.get_request_required("nonexistent").await;
        assert!(matches!(result.unwrap_err(), StateError::NotFound(_)));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_request_cascades_to_plans() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let request = LearningRequest::with_id("req-1", "Rust", "Programming", LearningPreference::Basics);
        manager.create_request(request).await.unwrap();

        let plan = LessonPlan::with_id("plan-1", "req-1", vec![]);
        manager.create_plan(plan).await.unwrap();

        let removed = manager.delete_request("req-1").await.unwrap();
        assert_eq!(removed, 1);

        assert!(manager.get_request("req-1").await.unwrap().is_none());
        assert!(manager.get_plan("plan-1").await.unwrap().is_none());

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_missing_request_not_found() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let result = manager.delete_request("ghost").await;
        assert!(matches!(result.unwrap_err(), StateError::NotFound(_)));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_list_plans_for_request() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        manager
            .create_plan(LessonPlan::with_id("plan-1", "req-1", vec![]))
            .await
            .unwrap();
        manager
            .create_plan(LessonPlan::with_id("plan-2", "req-2", vec![]))
            .await
            .unwrap();

        let plans = manager.list_plans(Some("req-1".to_string())).await.unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].id, "plan-1");

        let all = manager.list_plans(None).await.unwrap();
        assert_eq!(all.len(), 2);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_content_items() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let item = ContentItem::new("Guide", "https://example.com", "good intro").with_plan("plan-1");
        let id = manager.create_content(item).await.unwrap();

        let items = manager.list_content(Some("plan-1".to_string())).await.unwrap();
        assert_eq!(items.len(), 1);

        manager.delete_content(&id).await.unwrap();
        let items = manager.list_content(None).await.unwrap();
        assert!(items.is_empty());

        manager.shutdown().await.unwrap();
    }
}
