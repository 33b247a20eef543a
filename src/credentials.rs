//! Resolution of warehouse connection details.
//!
//! The resolver is a seam: the static resolver reads everything from
//! settings and the environment, while deployments that mint short-lived
//! credentials can plug in their own implementation.

use async_trait::async_trait;
use redmon_core::storage::adbc::Credentials;
use std::fmt;

use crate::config::WarehouseConfig;
use crate::error::{Error, Result};

/// Everything needed to open a warehouse session.
#[derive(Clone, PartialEq)]
pub struct ConnectionDetails {
    pub endpoint: String,
    pub port: u16,
    pub db_name: String,
    pub user: String,
    pub password: String,
}

impl ConnectionDetails {
    /// PostgreSQL wire URI without credentials; those travel as driver options.
    pub fn uri(&self) -> String {
        format!("postgresql://{}:{}/{}", self.endpoint, self.port, self.db_name)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            username: self.user.clone(),
            password: self.password.clone(),
        }
    }
}

impl fmt::Debug for ConnectionDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDetails")
            .field("endpoint", &self.endpoint)
            .field("port", &self.port)
            .field("db_name", &self.db_name)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

#[async_trait]
pub trait CredentialResolver: Send + Sync {
    async fn resolve(&self, warehouse: &WarehouseConfig) -> Result<ConnectionDetails>;
}

/// Takes host, user and password straight from the configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct StaticCredentialResolver;

#[async_trait]
impl CredentialResolver for StaticCredentialResolver {
    async fn resolve(&self, warehouse: &WarehouseConfig) -> Result<ConnectionDetails> {
        let user = warehouse
            .db_user
            .clone()
            .filter(|u| !u.trim().is_empty())
            .ok_or(Error::MissingSetting("warehouse.db_user"))?;
        let password = warehouse
            .password
            .clone()
            .ok_or(Error::MissingSetting("warehouse.password"))?;

        tracing::info!(user = %user, "Fetched credentials");

        Ok(ConnectionDetails {
            endpoint: warehouse.host.clone(),
            port: warehouse.port,
            db_name: warehouse.db_name.clone(),
            user,
            password,
        })
    }
}
