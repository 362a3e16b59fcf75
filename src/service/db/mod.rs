mod insert_image_metadata;

use std::{fmt, sync::Arc, time::Duration};

#[cfg(test)]
use mockall::automock;
use thiserror::Error;

use insert_image_metadata::{Deadline, Handoff};

use crate::{
    env::{ORACLE_PASSWORD, ORACLE_SERVICENAME, ORACLE_USERNAME, VarNameErr, read_env},
    metadata::ImageMetadata,
};

#[cfg(not(test))]
pub use DBClient as DB;
#[cfg(test)]
pub use MockDBClient as DB;

/// How long a single insert, connect included, may take before the invocation gives up on it
pub const STATEMENT_TIMEOUT: Duration = Duration::from_secs(55);

/// Stands in for the password whenever a [Dsn] is printed
const REDACTED_PASSWORD: &str = "secret";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("could not connect to database: {0}")]
    Connect(#[source] oracle::Error),
    #[error("could not insert image metadata: {0}")]
    Execute(#[source] oracle::Error),
    #[error("database call did not complete within {0:?}")]
    Timeout(Duration),
    #[error("database task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Credentials and service name of the metadata database.
///
/// The real connection string is only available through [Dsn::connection_string]. The
/// `Display` and `Debug` renderings replace the password, so a `Dsn` is safe to log.
#[derive(Clone, PartialEq, Eq)]
pub struct Dsn {
    username: String,
    password: String,
    service_name: String,
}

impl Dsn {
    pub fn new(username: &str, password: &str, service_name: &str) -> Self {
        Self {
            username: username.to_string(),
            password: password.to_string(),
            service_name: service_name.to_string(),
        }
    }

    /// Reads `ORACLE_USERNAME`, `ORACLE_PASSWORD` and `ORACLE_SERVICENAME`, in that order
    #[tracing::instrument(err)]
    pub fn from_env() -> Result<Self, VarNameErr> {
        let username = read_env(ORACLE_USERNAME)?;
        let password = read_env(ORACLE_PASSWORD)?;
        let service_name = read_env(ORACLE_SERVICENAME)?;

        let dsn = Self {
            username,
            password,
            service_name,
        };

        tracing::info!(dsn = %dsn, "generated connect descriptor");

        Ok(dsn)
    }

    /// `username/password@serviceName`. Never log this
    pub fn connection_string(&self) -> String {
        format!("{}/{}@{}", self.username, self.password, self.service_name)
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}@{}",
            self.username, REDACTED_PASSWORD, self.service_name
        )
    }
}

impl fmt::Debug for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dsn")
            .field("username", &self.username)
            .field("password", &REDACTED_PASSWORD)
            .field("service_name", &self.service_name)
            .finish()
    }
}

/// Writes image metadata to Oracle. Opens one connection per insert, there is no pool.
#[derive(Clone, Debug)]
pub struct DBClient {
    statement_timeout: Duration,
}

#[cfg_attr(test, automock)]
impl DBClient {
    pub fn new(statement_timeout: Duration) -> Self {
        Self { statement_timeout }
    }

    /// Inserts `image` into `IMAGES`. Fails with [StorageError::Timeout] if the database
    /// does not answer within the statement timeout, in which case nothing is committed.
    /// Nothing is retried.
    pub async fn insert_image_metadata(
        &self,
        dsn: &Dsn,
        image: &ImageMetadata,
    ) -> Result<(), StorageError> {
        let deadline = Deadline::after(self.statement_timeout);
        let handoff = Arc::new(Handoff::default());

        let mut task = {
            let dsn = dsn.clone();
            let image = image.clone();
            let handoff = handoff.clone();
            tokio::task::spawn_blocking(move || {
                insert_image_metadata::insert_image_metadata(&dsn, &image, deadline, &handoff)
            })
        };

        let at = tokio::time::Instant::from_std(deadline.at);
        match tokio::time::timeout_at(at, &mut task).await {
            Ok(joined) => joined?,
            Err(_) if handoff.abandon() => {
                // the blocking call may still be running, it will roll back instead of committing
                tracing::error!(timeout=?deadline.budget, "insert timed out");
                Err(StorageError::Timeout(deadline.budget))
            }
            Err(_) => {
                tracing::warn!("deadline reached during commit, waiting for its outcome");
                task.await?
            }
        }
    }
}
