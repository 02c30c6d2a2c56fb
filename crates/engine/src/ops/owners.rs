use chrono::Utc;
use sea_orm::{TransactionTrait, prelude::*};

use crate::{EngineError, Owner, ResultEngine, owners, util::normalize_required};

use super::{Engine, with_tx};

impl Engine {
    /// Register an owner. Ids are caller-chosen and unique.
    pub async fn new_owner(&self, owner_id: &str, display_name: &str) -> ResultEngine<Owner> {
        let owner = Owner {
            id: normalize_required(owner_id, "owner id")?,
            display_name: normalize_required(display_name, "display name")?,
            created_at: Utc::now(),
        };

        with_tx!(self, |db_tx| {
            let exists = owners::Entity::find_by_id(owner.id.clone())
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(owner.id));
            }
            owners::ActiveModel::from(&owner).insert(&db_tx).await?;
            tracing::info!(owner_id = %owner.id, "owner created");
            Ok(owner)
        })
    }

    pub async fn owner(&self, owner_id: &str) -> ResultEngine<Owner> {
        self.require_owner(&self.database, owner_id).await
    }
}
