use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_listings_table::Migration),
            Box::new(m20250101_000002_create_transactions_table::Migration),
        ]
    }
}

mod m20250101_000001_create_listings_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000001_create_listings_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Listings::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Listings::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Listings::Title).string().not_null())
                        .col(ColumnDef::new(Listings::Price).decimal().not_null())
                        .col(ColumnDef::new(Listings::Category).string().not_null())
                        .col(ColumnDef::new(Listings::Condition).string().not_null())
                        .col(ColumnDef::new(Listings::AgeRange).string().null())
                        .col(ColumnDef::new(Listings::Location).string().null())
                        .col(ColumnDef::new(Listings::Description).text().null())
                        .col(ColumnDef::new(Listings::ImageUrl).string().null())
                        .col(ColumnDef::new(Listings::SellerId).string().not_null())
                        .col(ColumnDef::new(Listings::SellerEmail).string().not_null())
                        .col(
                            ColumnDef::new(Listings::Status)
                                .string_len(16)
                                .not_null()
                                .default("available"),
                        )
                        .col(ColumnDef::new(Listings::BuyerId).string().null())
                        .col(ColumnDef::new(Listings::BuyerEmail).string().null())
                        .col(ColumnDef::new(Listings::SoldAt).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Listings::StripeSessionId).string().null())
                        .col(
                            ColumnDef::new(Listings::StripePaymentIntentId)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Listings::CreatedAt).timestamp_with_time_zone().not_null())
                        .col(ColumnDef::new(Listings::UpdatedAt).timestamp_with_time_zone().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_listings_status")
                        .table(Listings::Table)
                        .col(Listings::Status)
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_listings_seller_id")
                        .table(Listings::Table)
                        .col(Listings::SellerId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Listings::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Listings {
        Table,
        Id,
        Title,
        Price,
        Category,
        Condition,
        AgeRange,
        Location,
        Description,
        ImageUrl,
        SellerId,
        SellerEmail,
        Status,
        BuyerId,
        BuyerEmail,
        SoldAt,
        StripeSessionId,
        StripePaymentIntentId,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20250101_000002_create_transactions_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20250101_000002_create_transactions_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transactions::ListingId).uuid().not_null())
                        .col(ColumnDef::new(Transactions::BuyerId).string().not_null())
                        .col(ColumnDef::new(Transactions::BuyerEmail).string().not_null())
                        .col(ColumnDef::new(Transactions::SellerId).string().not_null())
                        .col(ColumnDef::new(Transactions::Amount).decimal().not_null())
                        .col(ColumnDef::new(Transactions::Currency).string().not_null())
                        .col(
                            ColumnDef::new(Transactions::StripeSessionId)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::StripePaymentIntentId)
                                .string()
                                .null(),
                        )
                        .col(ColumnDef::new(Transactions::ShippingName).string().null())
                        .col(
                            ColumnDef::new(Transactions::ShippingAddress)
                                .text()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::ShippingCost)
                                .decimal()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_transactions_listing_id")
                                .from(Transactions::Table, Transactions::ListingId)
                                .to(Listings::Table, Listings::Id),
                        )
                        .to_owned(),
                )
                .await?;

            // The provider may deliver the same completed-checkout event more
            // than once; the session id is the idempotency key.
            manager
                .create_index(
                    Index::create()
                        .name("idx_transactions_stripe_session_id")
                        .table(Transactions::Table)
                        .col(Transactions::StripeSessionId)
                        .unique()
                        .if_not_exists()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_transactions_buyer_id")
                        .table(Transactions::Table)
                        .col(Transactions::BuyerId)
                        .if_not_exists()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Transactions::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Transactions {
        Table,
        Id,
        ListingId,
        BuyerId,
        BuyerEmail,
        SellerId,
        Amount,
        Currency,
        StripeSessionId,
        StripePaymentIntentId,
        ShippingName,
        ShippingAddress,
        ShippingCost,
        CreatedAt,
    }

    #[derive(Iden)]
    enum Listings {
        Table,
        Id,
    }
}
