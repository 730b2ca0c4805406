use trawler::db;
use trawler::migration::{Migrator, MigratorTrait};

use crate::MigrateAction;

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            eprintln!("Applying migrations...");
            Migrator::up(&db, None).await?;
            eprintln!("Migrations applied successfully.");
        }
        MigrateAction::Down => {
            eprintln!("Rolling back last migration...");
            Migrator::down(&db, Some(1)).await?;
            eprintln!("Rollback complete.");
        }
        MigrateAction::Status => {
            let pending = Migrator::get_pending_migrations(&db).await?;
            let applied = Migrator::get_applied_migrations(&db).await?;
            println!("Applied: {}", applied.len());
            for migration in &applied {
                println!("  {}", migration.name());
            }
            println!("Pending: {}", pending.len());
            for migration in &pending {
                println!("  {}", migration.name());
            }
        }
        MigrateAction::Fresh => {
            eprintln!("Dropping all tables and reapplying migrations...");
            Migrator::fresh(&db).await?;
            eprintln!("Fresh migration complete.");
        }
    }

    Ok(())
}
