pub use sea_orm_migration::prelude::*;

mod m20250601_000001_initial;
mod m20250702_000001_add_audit_logs;
mod m20250718_000001_add_draw_date_unique;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_initial::Migration),
            Box::new(m20250702_000001_add_audit_logs::Migration),
            Box::new(m20250718_000001_add_draw_date_unique::Migration),
        ]
    }
}
