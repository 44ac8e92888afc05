use sea_orm_migration::prelude::*;

use crate::m20240112_103000_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum Drafts {
    Table,
    Id,
    UserId,
    Name,
    State,
    Public,
    Revision,
    CreatedAt,
    UpdatedAt,
}

#[derive(Iden)]
enum DraftEditors {
    Table,
    DraftId,
    Username,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Drafts::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Drafts::Id).string().not_null().primary_key())
                    .col(ColumnDef::new(Drafts::UserId).string().not_null())
                    .col(ColumnDef::new(Drafts::Name).string().not_null())
                    .col(ColumnDef::new(Drafts::State).text().not_null())
                    .col(
                        ColumnDef::new(Drafts::Public)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Drafts::Revision)
                            .big_integer()
                            .not_null()
                            .default(1),
                    )
                    .col(ColumnDef::new(Drafts::CreatedAt).timestamp().not_null())
                    .col(ColumnDef::new(Drafts::UpdatedAt).timestamp().not_null())
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-drafts-user_id")
                            .from(Drafts::Table, Drafts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-drafts-user_id")
                    .table(Drafts::Table)
                    .col(Drafts::UserId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(DraftEditors::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(DraftEditors::DraftId).string().not_null())
                    .col(ColumnDef::new(DraftEditors::Username).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(DraftEditors::DraftId)
                            .col(DraftEditors::Username),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-draft_editors-draft_id")
                            .from(DraftEditors::Table, DraftEditors::DraftId)
                            .to(Drafts::Table, Drafts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-draft_editors-username")
                            .from(DraftEditors::Table, DraftEditors::Username)
                            .to(Users::Table, Users::Username)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // "Shared with me" resolves through this index, not a drafts scan.
        manager
            .create_index(
                Index::create()
                    .name("idx-draft_editors-username")
                    .table(DraftEditors::Table)
                    .col(DraftEditors::Username)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DraftEditors::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Drafts::Table).to_owned())
            .await?;
        Ok(())
    }
}
