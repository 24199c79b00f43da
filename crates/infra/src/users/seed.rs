use launchpad_auth::Password;
use tracing::{info, warn};

use super::{NewUser, RepositoryError, UserRepository};

pub const ADMIN_USERNAME: &str = "admin";
const ADMIN_PASSWORD: &str = "admin";

/// Create the default `admin/admin` account if it does not exist yet.
///
/// Returns `true` when the account was created.
pub async fn seed_admin(repo: &dyn UserRepository, pepper: &str) -> anyhow::Result<bool> {
    let password_hash = Password::hash(ADMIN_PASSWORD, pepper)?;

    let created = match repo
        .create(NewUser {
            username: ADMIN_USERNAME.to_string(),
            password_hash,
        })
        .await
    {
        Ok(_) => {
            info!(username = ADMIN_USERNAME, "admin user created");
            true
        }
        Err(RepositoryError::Conflict(_)) => {
            warn!(username = ADMIN_USERNAME, "admin user already exists");
            false
        }
        Err(e) => return Err(e.into()),
    };

    warn!(
        username = ADMIN_USERNAME,
        "default admin credentials are active; change the password before deploying"
    );
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::users::InMemoryUserRepository;

    #[tokio::test]
    async fn seeding_is_repeatable() {
        let repo = InMemoryUserRepository::new();

        assert!(seed_admin(&repo, "pepper").await.unwrap());
        assert!(!seed_admin(&repo, "pepper").await.unwrap());

        let admin = repo.find_by_username(ADMIN_USERNAME).await.unwrap().unwrap();
        assert!(Password::verify("admin", &admin.password_hash, "pepper"));
    }
}
