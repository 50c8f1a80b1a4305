//! Plan runner: applies a release plan step by step.
//!
//! Every completed step records its inverse. When a step fails the
//! recorded inverses run newest first, returning the cluster to the state
//! it was in before the plan started.

use kube::core::DynamicObject;
use seaman_core::plan::Step;
use seaman_core::{Action, Identifier, ReleasePlan};

use crate::backend::ClusterBackend;
use crate::ExecutorError;

/// The inverse of a completed step.
#[derive(Debug, Clone, Copy)]
enum Undo<'p> {
    Delete(&'p Identifier, &'p DynamicObject),
    Apply(&'p Identifier, &'p DynamicObject),
    Create(&'p Identifier, &'p DynamicObject),
}

impl<'p> Undo<'p> {
    fn of(step: Step<'p>) -> Self {
        match step {
            Step::Create(c) => Undo::Delete(&c.identifier, &c.new),
            Step::Upgrade(u) => Undo::Apply(&u.identifier, &u.old),
            Step::Delete(d) => Undo::Create(&d.identifier, &d.old),
        }
    }
}

/// Executes [`ReleasePlan`]s against a backend with rollback on failure.
///
/// # Cancel Safety
/// Not cancel safe. Dropping the future mid-plan skips the rollback and
/// leaves the plan partially applied.
pub struct PlanRunner<'a, B: ClusterBackend + ?Sized> {
    backend: &'a B,
}

impl<'a, B: ClusterBackend + ?Sized> PlanRunner<'a, B> {
    /// Create a runner over `backend`.
    #[must_use]
    pub fn new(backend: &'a B) -> Self {
        Self { backend }
    }

    /// Run every step of `plan` in order.
    ///
    /// # Errors
    /// Returns [`ExecutorError::RolledBack`] if a step failed and all
    /// completed steps were undone, or [`ExecutorError::RollbackFailed`] if
    /// undoing failed as well.
    pub async fn execute(&self, plan: &ReleasePlan) -> Result<(), ExecutorError> {
        let mut completed: Vec<Undo<'_>> = Vec::with_capacity(plan.len());

        for step in plan.steps() {
            let action = step.action();
            let identifier = step.identifier();

            tracing::debug!(%action, %identifier, "running plan step");

            if let Err(cause) = self.run(step).await {
                tracing::warn!(
                    %action,
                    %identifier,
                    error = %cause,
                    undo_steps = completed.len(),
                    "plan step failed, rolling back"
                );

                return Err(match self.rollback(&completed).await {
                    Ok(()) => ExecutorError::RolledBack {
                        action,
                        identifier: identifier.clone(),
                        source: Box::new(cause),
                    },
                    Err(rollback) => ExecutorError::RollbackFailed {
                        action,
                        identifier: identifier.clone(),
                        cause: Box::new(cause),
                        rollback: Box::new(rollback),
                    },
                });
            }

            completed.push(Undo::of(step));
        }

        tracing::info!(steps = plan.len(), "plan applied");
        Ok(())
    }

    async fn run(&self, step: Step<'_>) -> Result<(), ExecutorError> {
        match step {
            Step::Create(c) => self.backend.create(&c.new).await.map(|_| ()),
            Step::Upgrade(u) => self.backend.apply(&u.new).await.map(|_| ()),
            Step::Delete(d) => self.backend.delete(&d.old).await,
        }
    }

    /// Undo completed steps newest first.
    ///
    /// Every undo step is attempted; the first failure is returned.
    async fn rollback(&self, completed: &[Undo<'_>]) -> Result<(), ExecutorError> {
        let mut first_error = None;

        for undo in completed.iter().rev() {
            let (action, identifier, result) = match *undo {
                Undo::Delete(id, object) => (Action::Delete, id, self.backend.delete(object).await),
                Undo::Apply(id, object) => {
                    (Action::Upgrade, id, self.backend.apply(object).await.map(|_| ()))
                }
                Undo::Create(id, object) => {
                    (Action::Create, id, self.backend.create(object).await.map(|_| ()))
                }
            };

            if let Err(e) = result {
                tracing::error!(%action, %identifier, error = %e, "rollback step failed");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
