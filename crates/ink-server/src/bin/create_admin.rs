//! Seed an admin account. Reads `ADMIN_EMAIL`, `ADMIN_PASSWORD` and
//! `ADMIN_NAME`; does nothing if the email is already registered.

use tracing::{info, warn};

use ink_api::auth::hash_password;
use ink_db::Database;
use ink_db::models::NewUser;
use ink_server::Config;
use ink_types::models::Role;

const DEFAULT_EMAIL: &str = "admin@inkconnect.com";
const DEFAULT_PASSWORD: &str = "admin123";
const DEFAULT_NAME: &str = "Administrator";

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    ink_server::init_logging();

    let config = Config::from_env()?;
    let db = Database::open(&config.db_path)?;

    let email = env_or("ADMIN_EMAIL", DEFAULT_EMAIL).to_lowercase();
    let password = env_or("ADMIN_PASSWORD", DEFAULT_PASSWORD);
    let name = env_or("ADMIN_NAME", DEFAULT_NAME);

    if let Some(existing) = db.get_user_by_email(&email)? {
        info!("{} already exists (role {}), nothing to do", email, existing.role);
        return Ok(());
    }

    if password == DEFAULT_PASSWORD {
        warn!("Creating admin with the default password; change it after signing in");
    }

    let password_hash = hash_password(&password)?;
    let admin = db.create_user(&NewUser {
        email,
        password_hash,
        artist_name: name,
        bio: String::new(),
        specialties: vec![],
        profile_image: String::new(),
        role: Role::Admin,
        verified: true,
    })?;

    info!("Created admin {} ({})", admin.email, admin.id);
    Ok(())
}
