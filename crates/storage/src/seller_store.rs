use alebaz_domain::model::{SellerId, SellerProfile};
use alebaz_domain::storage::{SellerStore, StorageError, StorageResult};
use sea_orm::sea_query::OnConflict;
use sea_orm::{EntityTrait, Set};

use crate::entity::sellers;
use crate::SeaOrmStorage;

#[async_trait::async_trait]
impl SellerStore for SeaOrmStorage {
    async fn find_seller(&self, seller: &SellerId) -> StorageResult<Option<SellerProfile>> {
        let maybe = sellers::Entity::find_by_id(seller.get())
            .one(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(maybe.map(|model| SellerProfile {
            id: SellerId::new(model.id),
            email: model.email,
            shop_name: model.shop_name,
            verified: model.verified,
            created_at: model.created_at,
        }))
    }

    async fn upsert_seller(&self, profile: SellerProfile) -> StorageResult<()> {
        let active = sellers::ActiveModel {
            id: Set(profile.id.get()),
            email: Set(profile.email),
            shop_name: Set(profile.shop_name),
            verified: Set(profile.verified),
            created_at: Set(profile.created_at),
        };
        sellers::Entity::insert(active)
            .on_conflict(
                OnConflict::column(sellers::Column::Id)
                    .update_columns([
                        sellers::Column::Email,
                        sellers::Column::ShopName,
                        sellers::Column::Verified,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.connection())
            .await
            .map_err(StorageError::from_source)?;
        Ok(())
    }
}
