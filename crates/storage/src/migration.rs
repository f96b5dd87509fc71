use sea_orm::sea_query::{
    ColumnDef, Expr, Index, IndexCreateStatement, Table, TableCreateStatement,
};
use sea_orm::{ConnectionTrait, DatabaseConnection};

use crate::entity::{promotions, sellers, subscriptions, verification_payments};
use alebaz_domain::storage::{StorageError, StorageResult};

pub async fn run_migrations(db: &DatabaseConnection) -> StorageResult<()> {
    let promotions_table = Table::create()
        .if_not_exists()
        .table(promotions::Entity)
        .col(
            ColumnDef::new(promotions::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(promotions::Column::SellerId)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::Plan)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::DurationDays)
                .integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::StartsAt)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::EndsAt)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::Active)
                .boolean()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::Approved)
                .boolean()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::PaymentMethod)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::Reference)
                .string_len(96)
                .null(),
        )
        .col(
            ColumnDef::new(promotions::Column::ProofHash)
                .string_len(160)
                .null(),
        )
        .col(
            ColumnDef::new(promotions::Column::AmountMinor)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(promotions::Column::ApprovedAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(promotions::Column::ExpiredAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(promotions::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, promotions_table).await?;

    let promotions_reference_index = Index::create()
        .if_not_exists()
        .name("ux_promotions_reference")
        .table(promotions::Entity)
        .col(promotions::Column::Reference)
        .unique()
        .to_owned();
    create_index(db, promotions_reference_index).await?;

    let verifications_table = Table::create()
        .if_not_exists()
        .table(verification_payments::Entity)
        .col(
            ColumnDef::new(verification_payments::Column::Id)
                .big_integer()
                .not_null()
                .auto_increment()
                .primary_key(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::SellerId)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::Reference)
                .string_len(96)
                .not_null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::AmountMinor)
                .big_integer()
                .not_null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::Status)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::StartsAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::EndsAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::ExpiresAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::PaidAt)
                .date_time()
                .null(),
        )
        .col(
            ColumnDef::new(verification_payments::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, verifications_table).await?;

    let verifications_reference_index = Index::create()
        .if_not_exists()
        .name("ux_verification_payments_reference")
        .table(verification_payments::Entity)
        .col(verification_payments::Column::Reference)
        .unique()
        .to_owned();
    create_index(db, verifications_reference_index).await?;

    let subscriptions_table = Table::create()
        .if_not_exists()
        .table(subscriptions::Entity)
        .col(
            ColumnDef::new(subscriptions::Column::SellerId)
                .big_integer()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(subscriptions::Column::Plan)
                .string_len(16)
                .not_null(),
        )
        .col(
            ColumnDef::new(subscriptions::Column::StartsAt)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(subscriptions::Column::ExpiresAt)
                .date_time()
                .not_null(),
        )
        .col(
            ColumnDef::new(subscriptions::Column::Active)
                .boolean()
                .not_null(),
        )
        .col(
            ColumnDef::new(subscriptions::Column::Reference)
                .string_len(96)
                .null(),
        )
        .to_owned();
    create_table(db, subscriptions_table).await?;

    let sellers_table = Table::create()
        .if_not_exists()
        .table(sellers::Entity)
        .col(
            ColumnDef::new(sellers::Column::Id)
                .big_integer()
                .not_null()
                .primary_key(),
        )
        .col(
            ColumnDef::new(sellers::Column::Email)
                .string_len(255)
                .not_null(),
        )
        .col(
            ColumnDef::new(sellers::Column::ShopName)
                .string_len(255)
                .not_null(),
        )
        .col(
            ColumnDef::new(sellers::Column::Verified)
                .boolean()
                .not_null(),
        )
        .col(
            ColumnDef::new(sellers::Column::CreatedAt)
                .date_time()
                .not_null()
                .default(Expr::current_timestamp()),
        )
        .to_owned();
    create_table(db, sellers_table).await?;

    Ok(())
}

async fn create_table(db: &DatabaseConnection, statement: TableCreateStatement) -> StorageResult<()> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}

async fn create_index(db: &DatabaseConnection, statement: IndexCreateStatement) -> StorageResult<()> {
    let backend = db.get_database_backend();
    db.execute(backend.build(&statement))
        .await
        .map_err(StorageError::from_source)?;
    Ok(())
}
