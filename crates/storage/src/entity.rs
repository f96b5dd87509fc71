use alebaz_domain::model::{PaymentMethod, PlanName, VerificationStatus};

pub mod promotions {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "promotions")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub seller_id: i64,
        pub plan: PlanDb,
        pub duration_days: i32,
        pub starts_at: DateTimeUtc,
        pub ends_at: DateTimeUtc,
        pub active: bool,
        pub approved: bool,
        pub payment_method: PaymentMethodDb,
        pub reference: Option<String>,
        pub proof_hash: Option<String>,
        pub amount_minor: i64,
        pub approved_at: Option<DateTimeUtc>,
        pub expired_at: Option<DateTimeUtc>,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum PlanDb {
        #[sea_orm(string_value = "basic")]
        Basic,
        #[sea_orm(string_value = "standard")]
        Standard,
        #[sea_orm(string_value = "premium")]
        Premium,
    }

    #[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum PaymentMethodDb {
        #[sea_orm(string_value = "gateway")]
        Gateway,
        #[sea_orm(string_value = "crypto_proof")]
        CryptoProof,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod verification_payments {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "verification_payments")]
    pub struct Model {
        #[sea_orm(primary_key)]
        pub id: i64,
        pub seller_id: i64,
        pub reference: String,
        pub amount_minor: i64,
        pub status: VerificationStatusDb,
        pub starts_at: Option<DateTimeUtc>,
        pub ends_at: Option<DateTimeUtc>,
        pub expires_at: Option<DateTimeUtc>,
        pub paid_at: Option<DateTimeUtc>,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Clone, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum)]
    #[sea_orm(rs_type = "String", db_type = "String(Some(16))")]
    pub enum VerificationStatusDb {
        #[sea_orm(string_value = "pending")]
        Pending,
        #[sea_orm(string_value = "success")]
        Success,
        #[sea_orm(string_value = "failed")]
        Failed,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod subscriptions {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "subscriptions")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub seller_id: i64,
        pub plan: String,
        pub starts_at: DateTimeUtc,
        pub expires_at: DateTimeUtc,
        pub active: bool,
        pub reference: Option<String>,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub mod sellers {
    use sea_orm::entity::prelude::*;
    use sea_orm::sea_query::Expr;

    #[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
    #[sea_orm(table_name = "sellers")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: i64,
        pub email: String,
        pub shop_name: String,
        pub verified: bool,
        #[sea_orm(default_expr = "Expr::current_timestamp()")]
        pub created_at: DateTimeUtc,
    }

    #[derive(Debug, Clone, Copy, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

impl From<PlanName> for promotions::PlanDb {
    fn from(value: PlanName) -> Self {
        match value {
            PlanName::Basic => Self::Basic,
            PlanName::Standard => Self::Standard,
            PlanName::Premium => Self::Premium,
        }
    }
}

impl From<promotions::PlanDb> for PlanName {
    fn from(value: promotions::PlanDb) -> Self {
        match value {
            promotions::PlanDb::Basic => Self::Basic,
            promotions::PlanDb::Standard => Self::Standard,
            promotions::PlanDb::Premium => Self::Premium,
        }
    }
}

impl From<PaymentMethod> for promotions::PaymentMethodDb {
    fn from(value: PaymentMethod) -> Self {
        match value {
            PaymentMethod::Gateway => Self::Gateway,
            PaymentMethod::CryptoProof => Self::CryptoProof,
        }
    }
}

impl From<promotions::PaymentMethodDb> for PaymentMethod {
    fn from(value: promotions::PaymentMethodDb) -> Self {
        match value {
            promotions::PaymentMethodDb::Gateway => Self::Gateway,
            promotions::PaymentMethodDb::CryptoProof => Self::CryptoProof,
        }
    }
}

impl From<verification_payments::VerificationStatusDb> for VerificationStatus {
    fn from(value: verification_payments::VerificationStatusDb) -> Self {
        match value {
            verification_payments::VerificationStatusDb::Pending => Self::Pending,
            verification_payments::VerificationStatusDb::Success => Self::Success,
            verification_payments::VerificationStatusDb::Failed => Self::Failed,
        }
    }
}
