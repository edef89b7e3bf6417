use crate::core::{security, state::AppState, time};
use crate::db::models::{Role, User};
use crate::repositories::{self, routes, users};

const DEFAULT_ROLES: &[(&str, u32)] = &[("student", 1), ("teacher", 2), ("admin", 4)];
const ADMIN_ROLE: &str = "admin";

/// Seeds roles and the superuser, registers every route, then loads the role registry.
pub(crate) async fn prepare(state: &AppState, route_identities: &[String]) -> anyhow::Result<()> {
    seed_default_roles(state).await?;

    if let Err(err) = ensure_superuser(state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }

    let added = routes::sync(state.store(), route_identities).await?;
    tracing::info!(added, total = route_identities.len(), "route permissions synced");

    let loaded = state.roles().reload(state.store()).await?;
    tracing::info!(roles = loaded, "role registry loaded");
    Ok(())
}

pub(crate) async fn seed_default_roles(state: &AppState) -> anyhow::Result<()> {
    let existing: Vec<Role> = repositories::list(state.store()).await?;
    if !existing.is_empty() {
        return Ok(());
    }

    for (name, numeric_value) in DEFAULT_ROLES {
        let mut role =
            Role { name: (*name).to_string(), numeric_value: *numeric_value, ..Role::default() };
        repositories::create(state.store(), &mut role).await?;
    }

    tracing::info!(count = DEFAULT_ROLES.len(), "Seeded default roles");
    Ok(())
}

pub(crate) async fn ensure_superuser(state: &AppState) -> anyhow::Result<()> {
    let admin = state.settings().admin();
    if admin.first_superuser_password.is_empty() {
        tracing::warn!("FIRST_SUPERUSER_PASSWORD not configured; skipping superuser creation");
        return Ok(());
    }

    let username = &admin.first_superuser_username;

    if let Some(mut user) = users::find_by_username(state.store(), username).await? {
        let mut needs_update = false;

        let verified = security::verify_password(&admin.first_superuser_password, &user.password)
            .unwrap_or(false);
        if !verified {
            user.password = security::hash_password(&admin.first_superuser_password)?;
            needs_update = true;
        }

        if !user.roles.iter().any(|role| role == ADMIN_ROLE) {
            user.roles.push(ADMIN_ROLE.to_string());
            needs_update = true;
        }

        if needs_update {
            repositories::save(state.store(), &user).await?;
            tracing::info!("Updated default superuser {username}");
        } else {
            tracing::info!("Default superuser already up to date");
        }

        return Ok(());
    }

    let mut user = User {
        username: username.clone(),
        password: security::hash_password(&admin.first_superuser_password)?,
        firstname: "Super".to_string(),
        lastname: "Admin".to_string(),
        roles: vec![ADMIN_ROLE.to_string()],
        created_on: time::now_rfc3339(),
        ..User::default()
    };
    repositories::create(state.store(), &mut user).await?;

    tracing::info!("Created default superuser {username}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::Route;
    use crate::services::permissions::PermissionMask;
    use crate::test_support;

    #[tokio::test]
    async fn prepare_seeds_roles_superuser_and_routes() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("FIRST_SUPERUSER_PASSWORD", "super-secret");
        let state = test_support::build_state();
        std::env::remove_var("FIRST_SUPERUSER_PASSWORD");

        let identities = vec!["/module/{id}/start_GET".to_string(), "/login_POST".to_string()];
        prepare(&state, &identities).await.expect("prepare");
        prepare(&state, &identities).await.expect("prepare is repeatable");

        let roles: Vec<Role> = repositories::list(state.store()).await.unwrap();
        assert_eq!(roles.len(), 3);

        let routes: Vec<Route> = repositories::list(state.store()).await.unwrap();
        assert_eq!(routes.len(), 2);
        assert!(routes.iter().all(|route| route.permission_level == 0));

        let admin = users::find_by_username(state.store(), "admin").await.unwrap().expect("admin");
        assert_eq!(admin.roles, vec!["admin".to_string()]);
        assert!(security::verify_password("super-secret", &admin.password).unwrap());
        assert_eq!(state.roles().role_key(&admin.roles).await, PermissionMask::new(4));
    }

    #[tokio::test]
    async fn existing_roles_are_left_alone() {
        let ctx = test_support::setup_test_context().await;
        let mut custom = Role { name: "reviewer".to_string(), numeric_value: 8, ..Role::default() };
        let store = ctx.state.store();
        let before: Vec<Role> = repositories::list(store).await.unwrap();
        for role in before {
            repositories::remove::<Role>(store, role.id).await.unwrap();
        }
        repositories::create(store, &mut custom).await.unwrap();

        seed_default_roles(&ctx.state).await.unwrap();

        let after: Vec<Role> = repositories::list(store).await.unwrap();
        assert_eq!(after, vec![custom]);
    }
}
