use sea_orm_migration::prelude::*;
use uuid::Uuid;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
pub enum Plans {
    Table,
    Id,
    Name,
    PriceCents,
    DisplayOrder,
}

#[derive(Iden)]
enum PlanFeatures {
    Table,
    PlanId,
    Key,
    Value,
    Label,
    SortOrder,
}

#[derive(Iden)]
enum PlanStickers {
    Table,
    PlanId,
    StickerId,
}

async fn seed_plan(
    manager: &SchemaManager<'_>,
    name: &str,
    price_cents: i64,
    display_order: i32,
    features: &[(&str, &str, &str, i32)],
) -> Result<(), DbErr> {
    let plan_id = Uuid::new_v4().to_string();

    manager
        .exec_stmt(
            Query::insert()
                .into_table(Plans::Table)
                .columns([
                    Plans::Id,
                    Plans::Name,
                    Plans::PriceCents,
                    Plans::DisplayOrder,
                ])
                .values_panic([
                    plan_id.clone().into(),
                    name.into(),
                    price_cents.into(),
                    display_order.into(),
                ])
                .to_owned(),
        )
        .await?;

    for (key, value, label, sort_order) in features {
        manager
            .exec_stmt(
                Query::insert()
                    .into_table(PlanFeatures::Table)
                    .columns([
                        PlanFeatures::PlanId,
                        PlanFeatures::Key,
                        PlanFeatures::Value,
                        PlanFeatures::Label,
                        PlanFeatures::SortOrder,
                    ])
                    .values_panic([
                        plan_id.clone().into(),
                        (*key).into(),
                        (*value).into(),
                        (*label).into(),
                        (*sort_order).into(),
                    ])
                    .to_owned(),
            )
            .await?;
    }

    Ok(())
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Plans::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Plans::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Plans::Name).string().not_null())
                    .col(
                        ColumnDef::new(Plans::PriceCents)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Plans::DisplayOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-plans-name-unique")
                    .table(Plans::Table)
                    .col(Plans::Name)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlanFeatures::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PlanFeatures::PlanId).string().not_null())
                    .col(ColumnDef::new(PlanFeatures::Key).string().not_null())
                    .col(ColumnDef::new(PlanFeatures::Value).string().not_null())
                    .col(ColumnDef::new(PlanFeatures::Label).string())
                    .col(
                        ColumnDef::new(PlanFeatures::SortOrder)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .primary_key(
                        Index::create()
                            .col(PlanFeatures::PlanId)
                            .col(PlanFeatures::Key),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-plan_features-plan_id")
                            .from(PlanFeatures::Table, PlanFeatures::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(PlanStickers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(PlanStickers::PlanId).string().not_null())
                    .col(ColumnDef::new(PlanStickers::StickerId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(PlanStickers::PlanId)
                            .col(PlanStickers::StickerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-plan_stickers-plan_id")
                            .from(PlanStickers::Table, PlanStickers::PlanId)
                            .to(Plans::Table, Plans::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Default catalog. Saving drafts is gated on `share`; Basic users
        // browse and place stickers but cannot persist drafts.
        seed_plan(
            manager,
            "Basic",
            0,
            0,
            &[
                ("drafts_limit", "1", "Drafts", 0),
                ("share", "false", "Share your wall", 1),
            ],
        )
        .await?;
        seed_plan(
            manager,
            "Advanced",
            499,
            1,
            &[
                ("drafts_limit", "10", "Drafts", 0),
                ("share", "true", "Share your wall", 1),
            ],
        )
        .await?;
        seed_plan(
            manager,
            "Premium",
            999,
            2,
            &[("share", "true", "Share your wall", 0)],
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PlanStickers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PlanFeatures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Plans::Table).to_owned())
            .await?;
        Ok(())
    }
}
