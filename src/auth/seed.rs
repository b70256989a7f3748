// Start-up role provisioning
// Idempotent: roles already present are left untouched

use sqlx::PgPool;
use tracing::{debug, info};

use crate::auth::Role;

/// Ensure every role of `Role::ALL` exists, returning how many were created
pub async fn reconcile_roles(pool: &PgPool) -> Result<usize, sqlx::Error> {
    let mut created = 0;

    for role in Role::ALL {
        let result = sqlx::query("INSERT INTO roles (name) VALUES ($1) ON CONFLICT (name) DO NOTHING")
            .bind(role.authority())
            .execute(pool)
            .await?;

        if result.rows_affected() > 0 {
            info!("Provisioned role {}", role.authority());
            created += 1;
        } else {
            debug!("Role {} already present", role.authority());
        }
    }

    Ok(created)
}
