//! Orphaned lesson-plan reconciliation
//!
//! The pipeline creates a LessonPlan before completing its LearningRequest.
//! If the second write is lost, a valid plan exists while the request still
//! says pending. This pass finds those plans and completes their requests;
//! it is idempotent and safe to run any number of times.

use tracing::{debug, info, warn};

use super::StateManager;

/// Repair statistics
#[derive(Debug, Default)]
pub struct RepairStats {
    /// Number of lesson plans scanned
    pub plans_scanned: usize,
    /// Number of requests completed by the pass
    pub requests_repaired: usize,
    /// Plans whose owning request no longer exists
    pub orphaned_plans: usize,
}

impl std::fmt::Display for RepairStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "plans scanned: {}, requests repaired: {}, orphaned plans: {}",
            self.plans_scanned, self.requests_repaired, self.orphaned_plans
        )
    }
}

/// Reconcile requests whose lesson plan exists but whose completion was lost
pub async fn reconcile(state: &StateManager) -> eyre::Result<RepairStats> {
    info!("Starting lesson-plan reconciliation");
    let mut stats = RepairStats::default();

    let plans = state
        .list_plans(None)
        .await
        .map_err(|e| eyre::eyre!("Failed to list lesson plans: {}", e))?;

    for plan in plans {
        stats.plans_scanned += 1;

        let request = state
            .get_request(&plan.learning_request_id)
            .await
            .map_err(|e| eyre::eyre!("Failed to look up request {}: {}", plan.learning_request_id, e))?;

        let Some(mut request) = request else {
            // The owning request was deleted without cascading; nothing to
            // repair, just surface it
            warn!(plan_id = %plan.id, request_id = %plan.learning_request_id, "Plan has no owning request");
            stats.orphaned_plans += 1;
            continue;
        };

        if request.is_completed() && request.lesson_plan_id.as_deref() == Some(plan.id.as_str()) {
            debug!(request_id = %request.id, "Request already consistent");
            continue;
        }

        warn!(
            request_id = %request.id,
            plan_id = %plan.id,
            status = %request.status,
            "Completing request with existing plan"
        );
        request.complete_with_plan(plan.id.clone());
        state
            .update_request(request)
            .await
            .map_err(|e| eyre::eyre!("Failed to update request: {}", e))?;
        stats.requests_repaired += 1;
    }

    info!("Reconciliation complete: {}", stats);
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{LearningPreference, LearningRequest, LessonPlan, RequestStatus};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_reconcile_empty_store() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let stats = reconcile(&manager).await.unwrap();
        assert_eq!(stats.plans_scanned, 0);
        assert_eq!(stats.requests_repaired, 0);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_completes_stale_request() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        // A plan exists but the request never got its completion update
        let request = LearningRequest::with_id("req-1", "Rust", "Programming", LearningPreference::Basics);
        manager.create_request(request).await.unwrap();
        manager
            .create_plan(LessonPlan::with_id("plan-1", "req-1", vec![]))
            .await
            .unwrap();

        let stats = reconcile(&manager).await.unwrap();
        assert_eq!(stats.requests_repaired, 1);

        let request = manager.get_request("req-1").await.unwrap().unwrap();
        assert_eq!(request.status, RequestStatus::Completed);
        assert_eq!(request.lesson_plan_id.as_deref(), Some("plan-1"));

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        let request = LearningRequest::with_id("req-1", "Rust", "Programming", LearningPreference::Basics);
        manager.create_request(request).await.unwrap();
        manager
            .create_plan(LessonPlan::with_id("plan-1", "req-1", vec![]))
            .await
            .unwrap();

        let first = reconcile(&manager).await.unwrap();
        assert_eq!(first.requests_repaired, 1);

        let second = reconcile(&manager).await.unwrap();
        assert_eq!(second.requests_repaired, 0);
        assert_eq!(second.plans_scanned, 1);

        manager.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_reconcile_counts_orphaned_plans() {
        let temp = tempdir().unwrap();
        let manager = StateManager::spawn(temp.path()).unwrap();

        manager
            .create_plan(LessonPlan::with_id("plan-1", "req-gone", vec![]))
            .await
            .unwrap();

        let stats = reconcile(&manager).await.unwrap();
        assert_eq!(stats.orphaned_plans, 1);
        assert_eq!(stats.requests_repaired, 0);

        manager.shutdown().await.unwrap();
    }
}
