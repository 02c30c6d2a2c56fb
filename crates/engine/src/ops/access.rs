use sea_orm::{ConnectionTrait, prelude::*};
use uuid::Uuid;

use crate::{
    BulkAllocation, CelebrationEvent, EngineError, Owner, ResultEngine, allocations, celebrations,
    owners,
};

use super::Engine;

/// Generates a `require_*` lookup that resolves an owner-scoped row or fails
/// with `KeyNotFound`. Rows of another owner are reported as missing.
macro_rules! impl_require_owned {
    ($require_fn:ident, $entity:path, $domain:ty, $err_msg:literal) => {
        pub(super) async fn $require_fn<C: ConnectionTrait>(
            &self,
            db: &C,
            owner_id: &str,
            id: Uuid,
        ) -> ResultEngine<$domain> {
            let model = <$entity>::find_by_id(id.to_string())
                .one(db)
                .await?
                .filter(|model| model.owner_id == owner_id)
                .ok_or_else(|| EngineError::KeyNotFound($err_msg.to_string()))?;
            <$domain>::try_from(model)
        }
    };
}

impl Engine {
    impl_require_owned!(
        require_allocation,
        allocations::Entity,
        BulkAllocation,
        "allocation not exists"
    );

    impl_require_owned!(
        require_celebration,
        celebrations::Entity,
        CelebrationEvent,
        "celebration not exists"
    );

    pub(super) async fn require_owner<C: ConnectionTrait>(
        &self,
        db: &C,
        owner_id: &str,
    ) -> ResultEngine<Owner> {
        owners::Entity::find_by_id(owner_id.to_string())
            .one(db)
            .await?
            .map(Owner::from)
            .ok_or_else(|| EngineError::KeyNotFound("owner not exists".to_string()))
    }

    /// Allocation lookup for callers that only hold its id.
    pub(super) async fn require_allocation_by_id<C: ConnectionTrait>(
        &self,
        db: &C,
        id: Uuid,
    ) -> ResultEngine<BulkAllocation> {
        let model = allocations::Entity::find_by_id(id.to_string())
            .one(db)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("allocation not exists".to_string()))?;
        BulkAllocation::try_from(model)
    }
}
