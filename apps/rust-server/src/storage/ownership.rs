// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership enforcement for all storage operations.
//!
//! Every entity resolves upward to a project, and every project has exactly
//! one owner. A resolution that fails at any level, including a project
//! owned by someone else, is reported as not found so callers cannot
//! discover resources of other tenants. Storage failures pass through
//! unchanged.

use crate::auth::AuthenticatedUser;

use super::database::{Reader, StoreError, StoreResult};
use super::repository::{
    ConfigRepository, EnvironmentRepository, ProjectRepository, Secret, SecretRepository,
    StoredConfig, StoredEnvironment, StoredProject,
};
use super::Sealer;

/// Trait for resources that have an owner.
pub trait OwnedResource {
    /// Get the owner's user ID.
    fn owner_user_id(&self) -> &str;
}

/// Trait for enforcing ownership on storage operations.
pub trait OwnershipEnforcer {
    /// Verify that the user owns this resource.
    ///
    /// # Errors
    /// Returns `StoreError::NotFound` if the user doesn't own the resource.
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StoreResult<()>;
}

impl<T: OwnedResource> OwnershipEnforcer for T {
    fn verify_ownership(&self, user: &AuthenticatedUser) -> StoreResult<()> {
        if self.owner_user_id() == user.user_id {
            Ok(())
        } else {
            Err(StoreError::NotFound("Project not found".to_string()))
        }
    }
}

/// Extension trait for lookups that may have found nothing.
pub trait OwnershipCheck<T> {
    /// Verify ownership and return the resource if authorized.
    fn verify_owner(self, user: &AuthenticatedUser) -> StoreResult<T>;
}

impl<T: OwnedResource> OwnershipCheck<T> for Option<T> {
    fn verify_owner(self, user: &AuthenticatedUser) -> StoreResult<T> {
        match self {
            Some(resource) => {
                resource.verify_ownership(user)?;
                Ok(resource)
            }
            None => Err(StoreError::NotFound("Project not found".to_string())),
        }
    }
}

/// Rewrites the message of a `NotFound`; storage errors pass through.
fn not_found_as(message: &'static str) -> impl Fn(StoreError) -> StoreError {
    move |e| match e {
        StoreError::NotFound(_) => StoreError::NotFound(message.to_string()),
        other => other,
    }
}

/// Resolves entities through their parent chain up to a project.
pub struct OwnershipChain<'a, T> {
    txn: &'a T,
}

impl<'a, T: Reader> OwnershipChain<'a, T> {
    pub fn new(txn: &'a T) -> Self {
        Self { txn }
    }

    /// The project, if `user` owns it.
    pub fn project(&self, user: &AuthenticatedUser, project_id: &str) -> StoreResult<StoredProject> {
        ProjectRepository::new(self.txn)
            .find(project_id)?
            .verify_owner(user)
    }

    /// An environment of the project.
    pub fn environment(
        &self,
        project: &StoredProject,
        environment_id: &str,
    ) -> StoreResult<StoredEnvironment> {
        match EnvironmentRepository::new(self.txn).find(environment_id)? {
            Some(environment) if environment.project_id == project.id => Ok(environment),
            _ => Err(StoreError::NotFound("Environment not found".to_string())),
        }
    }

    /// A config of the project, with its environment.
    pub fn config(
        &self,
        project: &StoredProject,
        config_id: &str,
    ) -> StoreResult<(StoredEnvironment, StoredConfig)> {
        let config = ConfigRepository::new(self.txn).get(config_id)?;
        let environment = self
            .environment(project, &config.environment_id)
            .map_err(not_found_as("Secret config not found"))?;
        Ok((environment, config))
    }

    /// A config that must also sit in the given environment.
    pub fn config_in_environment(
        &self,
        project: &StoredProject,
        environment_id: &str,
        config_id: &str,
    ) -> StoreResult<(StoredEnvironment, StoredConfig)> {
        let environment = self.environment(project, environment_id)?;
        let (_, config) = self.config(project, config_id)?;
        if config.environment_id != environment.id {
            return Err(StoreError::NotFound("Secret config not found".to_string()));
        }
        Ok((environment, config))
    }

    /// A secret of the project, with its config and environment.
    pub fn secret(
        &self,
        project: &StoredProject,
        secret_id: &str,
        sealer: &Sealer,
    ) -> StoreResult<(StoredEnvironment, StoredConfig, Secret)> {
        let secret = SecretRepository::new(self.txn, sealer).get(secret_id)?;
        let (environment, config) = self
            .config(project, &secret.secret_config_id)
            .map_err(not_found_as("Secret not found"))?;
        Ok((environment, config, secret))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::database::tests::temp_store;
    use crate::storage::database::{Writer, ENVIRONMENTS};
    use crate::storage::repository::{NewSecret, SecretType};

    struct TestResource {
        owner: String,
    }

    impl OwnedResource for TestResource {
        fn owner_user_id(&self) -> &str {
            &self.owner
        }
    }

    fn make_user(user_id: &str) -> AuthenticatedUser {
        AuthenticatedUser {
            user_id: user_id.to_string(),
            email: None,
            name: None,
            session_id: None,
            expires_at: 0,
        }
    }

    #[test]
    fn ownership_verification_passes_for_owner() {
        let resource = TestResource {
            owner: "user_123".to_string(),
        };
        assert!(resource.verify_ownership(&make_user("user_123")).is_ok());
    }

    #[test]
    fn non_owner_sees_not_found() {
        let resource = TestResource {
            owner: "user_123".to_string(),
        };
        let result = resource.verify_ownership(&make_user("user_456"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn ownership_check_on_option_none() {
        let option: Option<TestResource> = None;
        let result = option.verify_owner(&make_user("user_123"));
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[test]
    fn chain_rejects_cross_project_children() {
        let (store, _dir) = temp_store();
        let mine = StoredProject::new("owner", "Mine", None, None);
        let theirs = StoredProject::new("other", "Theirs", None, None);

        let (their_env, their_secret) = store
            .write(|txn| {
                let projects = ProjectRepository::new(txn);
                projects.create(&mine)?;
                let envs = projects.create(&theirs)?;
                let config = ConfigRepository::new(txn)
                    .find_by_name(&envs[0].id, "dev")?
                    .ok_or_else(|| StoreError::NotFound("config".into()))?;
                let secret = SecretRepository::new(txn, store.sealer()).insert(NewSecret {
                    secret_config_id: &config.id,
                    key: "K",
                    value: "v",
                    secret_type: SecretType::Text,
                    order: 1,
                })?;
                Ok::<_, StoreError>((envs[0].clone(), secret))
            })
            .unwrap();

        store
            .read(|txn| {
                let chain = OwnershipChain::new(txn);
                let owner = make_user("owner");

                assert!(matches!(
                    chain.project(&owner, &theirs.id),
                    Err(StoreError::NotFound(_))
                ));

                let project = chain.project(&owner, &mine.id)?;
                assert!(matches!(
                    chain.environment(&project, &their_env.id),
                    Err(StoreError::NotFound(_))
                ));
                assert!(matches!(
                    chain.config(&project, &their_secret.secret_config_id),
                    Err(StoreError::NotFound(_))
                ));
                assert!(matches!(
                    chain.secret(&project, &their_secret.id, store.sealer()),
                    Err(StoreError::NotFound(_))
                ));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }

    #[test]
    fn chain_keeps_storage_errors_distinct_from_not_found() {
        let (store, _dir) = temp_store();
        let project = StoredProject::new("owner", "Mine", None, None);

        let secret = store
            .write(|txn| {
                let envs = ProjectRepository::new(txn).create(&project)?;
                let config = ConfigRepository::new(txn)
                    .find_by_name(&envs[0].id, "dev")?
                    .ok_or_else(|| StoreError::NotFound("config".into()))?;
                let secret = SecretRepository::new(txn, store.sealer()).insert(NewSecret {
                    secret_config_id: &config.id,
                    key: "K",
                    value: "v",
                    secret_type: SecretType::Text,
                    order: 1,
                })?;
                txn.put_record(ENVIRONMENTS, &envs[0].id, &serde_json::json!({"broken": true}))?;
                Ok::<_, StoreError>(secret)
            })
            .unwrap();

        store
            .read(|txn| {
                let chain = OwnershipChain::new(txn);
                assert!(matches!(
                    chain.config(&project, &secret.secret_config_id),
                    Err(StoreError::Serde(_))
                ));
                assert!(matches!(
                    chain.secret(&project, &secret.id, store.sealer()),
                    Err(StoreError::Serde(_))
                ));
                assert!(matches!(
                    chain.config(&project, "missing"),
                    Err(StoreError::NotFound(msg)) if msg == "Secret config not found"
                ));
                Ok::<_, StoreError>(())
            })
            .unwrap();
    }
}
