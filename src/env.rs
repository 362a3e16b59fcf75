//! Typed access to the environment variables this function is configured with.

use std::str::FromStr;
use thiserror::Error;

/// Name of the bucket holding the uploaded images
pub const OCI_BUCKETNAME: &str = "OCI_BUCKETNAME";
/// Region the bucket lives in, e.g. `us-ashburn-1`
pub const OCI_SOURCE_REGION: &str = "OCI_SOURCE_REGION";
/// Object storage namespace of the tenancy
pub const OCI_TENANCY_NAME: &str = "OCI_TENANCY_NAME";
/// Database user the metadata is inserted as
pub const ORACLE_USERNAME: &str = "ORACLE_USERNAME";
/// Password for [ORACLE_USERNAME]
pub const ORACLE_PASSWORD: &str = "ORACLE_PASSWORD";
/// Net service name (tns alias or easy connect string) of the database
pub const ORACLE_SERVICENAME: &str = "ORACLE_SERVICENAME";
/// `prod`, `dev` or `local`. Selects the log format
pub const ENVIRONMENT: &str = "ENVIRONMENT";
/// `strict` or `lenient`, see [crate::event::DecodePolicy]
pub const EVENT_DECODE_POLICY: &str = "EVENT_DECODE_POLICY";
/// Set by the Fn platform to the unix socket the function must listen on
pub const FN_LISTENER: &str = "FN_LISTENER";
/// Set by the Fn platform to the invocation protocol in use
pub const FN_FORMAT: &str = "FN_FORMAT";


#[cfg(test)]
pub use testing_harness::read_env;

/// Reads `s` from the process environment, remembering the name on failure
#[cfg(not(test))]
pub fn read_env(s: &'static str) -> Result<String, VarNameErr> {
    std::env::var(s).map_err(|err| VarNameErr { var_name: s, err })
}

/// A required environment variable could not be read
#[derive(Debug, Error)]
#[error("can not read environment variable {var_name}: {err}")]
pub struct VarNameErr {
    var_name: &'static str,
    err: std::env::VarError,
}

impl VarNameErr {
    /// The name of the variable that was missing
    pub fn var_name(&self) -> &'static str {
        self.var_name
    }
}

/// The environment the function is deployed in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Production environment
    Production,
    /// Dev and or staging environment
    Develop,
    /// Running on a workstation
    Local,
}

impl Environment {
    /// Reads `ENVIRONMENT`. Runs before logging is set up, so a missing or unknown
    /// value quietly selects [Environment::Production].
    pub fn from_env() -> Self {
        read_env(ENVIRONMENT)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Environment::Production)
    }
}

/// Represents a value which cannot be converted into an [Environment]
#[derive(Debug, Error)]
#[error("Could not convert {0} into an environment value")]
pub struct UnknownValue(String);

impl FromStr for Environment {
    type Err = UnknownValue;

    fn from_str(environment: &str) -> Result<Self, UnknownValue> {
        match environment {
            "prod" => Ok(Environment::Production),
            "dev" => Ok(Environment::Develop),
            "local" => Ok(Environment::Local),
            s => Err(UnknownValue(s.to_string())),
        }
    }
}
