pub use sea_orm_migration::prelude::*;

mod m20240112_103000_users;
mod m20240126_183000_plans;
mod m20240219_094500_subscriptions;
mod m20240219_121500_user_stickers;
mod m20240308_160000_drafts;
mod m20240321_110000_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240112_103000_users::Migration),
            Box::new(m20240126_183000_plans::Migration),
            Box::new(m20240219_094500_subscriptions::Migration),
            Box::new(m20240219_121500_user_stickers::Migration),
            Box::new(m20240308_160000_drafts::Migration),
            Box::new(m20240321_110000_sessions::Migration),
        ]
    }
}
