//! Public object storage urls for uploaded images.

use crate::env::{OCI_BUCKETNAME, OCI_SOURCE_REGION, OCI_TENANCY_NAME, VarNameErr, read_env};

/// Where images are stored: region, tenancy namespace and bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectStorageLocation {
    pub region: String,
    pub tenancy: String,
    pub bucket: String,
}

impl ObjectStorageLocation {
    /// Reads the location from `OCI_SOURCE_REGION`, `OCI_TENANCY_NAME` and
    /// `OCI_BUCKETNAME`, in that order.
    #[tracing::instrument(err)]
    pub fn from_env() -> Result<Self, VarNameErr> {
        let region = read_env(OCI_SOURCE_REGION)?;
        let tenancy = read_env(OCI_TENANCY_NAME)?;
        let bucket = read_env(OCI_BUCKETNAME)?;

        Ok(Self {
            region,
            tenancy,
            bucket,
        })
    }

    /// The object name is used verbatim, no percent encoding is applied.
    pub fn object_url(&self, object_name: &str) -> String {
        format!(
            "https://objectstorage.{}.oraclecloud.com/n/{}/b/{}/o/{}",
            self.region, self.tenancy, self.bucket, object_name
        )
    }
}

/// Builds the public url of `image_name` in the configured bucket
#[tracing::instrument(err)]
pub fn image_url(image_name: &str) -> Result<String, VarNameErr> {
    let location = ObjectStorageLocation::from_env()?;
    let url = location.object_url(image_name);

    tracing::info!(image_url = %url, "generated image url");

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::testing_harness::{vars, with_mock_env};

    const LOCATION: &[(&str, &str)] = &[
        (OCI_SOURCE_REGION, "us-ashburn-1"),
        (OCI_TENANCY_NAME, "acme"),
        (OCI_BUCKETNAME, "images"),
    ];

    #[test]
    fn builds_exact_url() {
        let url = with_mock_env(vars(LOCATION), || image_url("photo1.png")).unwrap();

        assert_eq!(
            url,
            "https://objectstorage.us-ashburn-1.oraclecloud.com/n/acme/b/images/o/photo1.png"
        );
    }

    #[test]
    fn object_name_is_not_encoded() {
        let location = ObjectStorageLocation {
            region: "ap-tokyo-1".to_string(),
            tenancy: "tenant".to_string(),
            bucket: "bkt".to_string(),
        };

        assert_eq!(
            location.object_url("dir/my photo?.png"),
            "https://objectstorage.ap-tokyo-1.oraclecloud.com/n/tenant/b/bkt/o/dir/my photo?.png"
        );
        assert_eq!(
            location.object_url(""),
            "https://objectstorage.ap-tokyo-1.oraclecloud.com/n/tenant/b/bkt/o/"
        );
    }

    #[test]
    fn each_missing_variable_is_named() {
        for missing in [OCI_SOURCE_REGION, OCI_TENANCY_NAME, OCI_BUCKETNAME] {
            let present: Vec<(&'static str, &'static str)> = LOCATION
                .iter()
                .copied()
                .filter(|(name, _)| *name != missing)
                .collect();

            let err = with_mock_env(vars(&present), || image_url("photo1.png")).unwrap_err();

            assert_eq!(err.var_name(), missing);
        }
    }
}
