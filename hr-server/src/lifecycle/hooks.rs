//! Lifecycle hooks
//!
//! Injected into [`EntityLifecycle`](super::EntityLifecycle) instead of being
//! attached to each record type.

use async_trait::async_trait;

use super::LifecycleError;
use crate::audit_log;
use crate::db::{EntityRecord, EntityTx, ResourceDef, UpdateEntity};

/// Who is acting on which resource
#[derive(Debug, Clone, Copy)]
pub struct HookContext<'a> {
    pub def: &'static ResourceDef,
    pub actor: &'a str,
}

#[async_trait]
pub trait LifecycleHooks: Send + Sync {
    /// Runs for every update-batch item before it is applied.
    ///
    /// An error aborts the whole batch.
    async fn before_update(
        &self,
        tx: &mut dyn EntityTx,
        ctx: &HookContext<'_>,
        item: &UpdateEntity,
    ) -> Result<(), LifecycleError>;

    /// Runs after each successful insert, inside the same transaction
    async fn after_create(
        &self,
        ctx: &HookContext<'_>,
        created: &EntityRecord,
    ) -> Result<(), LifecycleError>;
}

/// Referential check on update plus audit records
#[derive(Debug, Clone, Default)]
pub struct StandardHooks {
    super_admin: Option<String>,
}

impl StandardHooks {
    pub fn new(super_admin: Option<String>) -> Self {
        Self { super_admin }
    }

    fn is_super_admin(&self, actor: &str) -> bool {
        self.super_admin.as_deref() == Some(actor)
    }
}

#[async_trait]
impl LifecycleHooks for StandardHooks {
    async fn before_update(
        &self,
        tx: &mut dyn EntityTx,
        ctx: &HookContext<'_>,
        item: &UpdateEntity,
    ) -> Result<(), LifecycleError> {
        if self.is_super_admin(ctx.actor) {
            audit_log!(ctx.actor, "update", ctx.def.name, "super admin");
        }

        let Some(parent) = ctx.def.parent else {
            return Ok(());
        };
        let parent_id = item.fields.parent_id.unwrap_or(0);
        if !tx.exists(parent, parent_id).await? {
            return Err(LifecycleError::Referential(format!(
                "{} {} does not exist",
                parent.name, parent_id
            )));
        }
        Ok(())
    }

    async fn after_create(
        &self,
        ctx: &HookContext<'_>,
        created: &EntityRecord,
    ) -> Result<(), LifecycleError> {
        let resource = format!("{}:{}", ctx.def.name, created.id);
        if self.is_super_admin(ctx.actor) {
            audit_log!(ctx.actor, "create", resource, "super admin");
        } else {
            audit_log!(ctx.actor, "create", resource);
        }
        Ok(())
    }
}
