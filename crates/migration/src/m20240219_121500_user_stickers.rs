use sea_orm_migration::prelude::*;

use crate::m20240112_103000_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum UserStickers {
    Table,
    UserId,
    StickerId,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(UserStickers::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(UserStickers::UserId).string().not_null())
                    .col(ColumnDef::new(UserStickers::StickerId).string().not_null())
                    .primary_key(
                        Index::create()
                            .col(UserStickers::UserId)
                            .col(UserStickers::StickerId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-user_stickers-user_id")
                            .from(UserStickers::Table, UserStickers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-user_stickers-sticker_id")
                    .table(UserStickers::Table)
                    .col(UserStickers::StickerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(UserStickers::Table).to_owned())
            .await?;
        Ok(())
    }
}
