//! Bookstore application library
//!
//! Hosts the project modules and the bootstrap shared by the binary and the
//! integration tests.

pub mod modules;

pub use modules::*;

use bookstore_db::Database;
use bookstore_kernel::{settings::Settings, InitCtx, ModuleRegistry};

/// Register every module and run its `init` against `db`.
pub async fn bootstrap(settings: &Settings, db: &Database) -> anyhow::Result<ModuleRegistry> {
    let mut registry = ModuleRegistry::new();
    modules::register_all(&mut registry);

    let ctx = InitCtx { settings, db };
    registry.init_all(&ctx).await?;

    Ok(registry)
}
