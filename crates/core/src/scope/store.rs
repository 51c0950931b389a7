use async_trait::async_trait;

use crate::domain::catalog::CatalogEntry;
use crate::domain::inspection::{RoomId, SessionId};
use crate::domain::scope::{NewScopeItem, ScopeItem};
use crate::errors::StoreError;

/// Persistence collaborator used by the scope assembler.
///
/// Stores must reject a second active item for the same (room, catalog code)
/// pair with [`StoreError::Conflict`]; the assembler relies on this when two
/// assemblies for one room race.
#[async_trait]
pub trait ScopeStore: Send + Sync {
    async fn active_catalog(&self) -> Result<Vec<CatalogEntry>, StoreError>;

    async fn scope_items_for_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Vec<ScopeItem>, StoreError>;

    async fn active_scope_items_for_room(
        &self,
        session_id: &SessionId,
        room_id: &RoomId,
    ) -> Result<Vec<ScopeItem>, StoreError> {
        let items = self.scope_items_for_session(session_id).await?;
        Ok(items.into_iter().filter(|item| item.is_active() && &item.room_id == room_id).collect())
    }

    async fn create_scope_items(
        &self,
        items: Vec<NewScopeItem>,
    ) -> Result<Vec<ScopeItem>, StoreError>;

    async fn create_scope_item(&self, item: NewScopeItem) -> Result<ScopeItem, StoreError> {
        let mut created = self.create_scope_items(vec![item]).await?;
        created.pop().ok_or_else(|| StoreError::Decode("store returned no created item".to_string()))
    }

    async fn recalculate_scope_summary(&self, session_id: &SessionId) -> Result<(), StoreError>;
}
