//! Admin user management commands.

use zagros_core::{Phone, UserRole};
use zagros_server::db::UserStore;
use zagros_server::db::postgres::PgUserStore;
use zagros_server::models::NewUser;
use zagros_server::services::accounts::hash_password;

use super::CommandError;

/// Create an admin user directly in the database.
///
/// Admin accounts skip the SMS flow; the phone is marked verified on
/// creation.
pub async fn create_user(
    phone: &str,
    name: &str,
    last_name: &str,
    password: &str,
) -> Result<(), CommandError> {
    let phone = Phone::parse(phone).map_err(|e| CommandError::InvalidInput(e.to_string()))?;
    if password.len() < 6 {
        return Err(CommandError::InvalidInput(
            "password must be at least 6 characters".to_owned(),
        ));
    }
    let password_hash =
        hash_password(password).map_err(|e| CommandError::InvalidInput(e.to_string()))?;

    let pool = super::connect().await?;
    let users = PgUserStore::new(pool);

    let user = users
        .create(NewUser {
            name: name.to_owned(),
            last_name: last_name.to_owned(),
            phone,
            password_hash,
            phone_verified: true,
            role: UserRole::Admin,
        })
        .await?;

    tracing::info!(user_id = %user.id, phone = %user.phone, "admin user created");
    Ok(())
}
