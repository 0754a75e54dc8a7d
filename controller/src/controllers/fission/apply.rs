use tokio_util::sync::CancellationToken;

use crate::error::ApplyErrors;
use crate::work::apply_work_set;

use super::{FissionBackend, FissionWork};

impl FissionBackend {
    /// Packages go first so that Functions never reference a missing
    /// package, and triggers last so they never point at a missing Function.
    pub(super) async fn apply_work(
        &self,
        work: FissionWork,
        cancel: &CancellationToken,
    ) -> Result<(), ApplyErrors> {
        let mut errors = ApplyErrors::default();
        apply_work_set(&self.packages, work.packages, cancel, &mut errors).await;
        apply_work_set(&self.functions, work.functions, cancel, &mut errors).await;
        apply_work_set(&self.triggers, work.triggers, cancel, &mut errors).await;
        errors.into_result()
    }
}
