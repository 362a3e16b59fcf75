use chrono::{DateTime, FixedOffset, Utc};

use crate::{env::VarNameErr, url};

/// Format used when logging [ImageMetadata::create_date]
pub const CREATE_DATE_FORMAT: &str = "%Y%m%d-%H%M";

/// Rows are stamped in Japan standard time
const JST_OFFSET_SECONDS: i32 = 9 * 60 * 60;

/// Value of [ImageMetadata::deleted] for a live image
pub const ACTIVE: i32 = 0;

/// The fixed UTC+9 offset used for [ImageMetadata::create_date]
pub fn jst() -> FixedOffset {
    FixedOffset::east_opt(JST_OFFSET_SECONDS).expect("UTC+9 is within a day")
}

/// One row of the `IMAGES` table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageMetadata {
    /// uuid v4, primary key of the row
    pub id: String,
    pub image_name: String,
    pub detail: String,
    pub image_url: String,
    /// stored in the `UserName` column
    pub owner: String,
    pub create_date: DateTime<FixedOffset>,
    /// `0` ([ACTIVE]) for a live image, `1` once removed
    pub deleted: i32,
}

impl ImageMetadata {
    /// Builds the record for a freshly uploaded image.
    ///
    /// The url is derived from the configured object storage location, so this fails if
    /// any of its variables is missing. The creation date is the current time, not the
    /// time carried by the event.
    #[tracing::instrument(err)]
    pub fn build(image_name: &str) -> Result<Self, VarNameErr> {
        let image_url = url::image_url(image_name)?;
        let image = Self::new(image_name, image_url, Utc::now());

        tracing::info!(
            id = %image.id,
            image_name = %image.image_name,
            image_url = %image.image_url,
            create_date = %image.create_date.format(CREATE_DATE_FORMAT),
            "generated image metadata"
        );

        Ok(image)
    }

    pub fn new(image_name: &str, image_url: String, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            image_name: image_name.to_string(),
            detail: String::new(),
            image_url,
            owner: String::new(),
            create_date: now.with_timezone(&jst()),
            deleted: ACTIVE,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::TimeZone;
    use uuid::{Uuid, Version};

    use super::*;
    use crate::env::{
        OCI_BUCKETNAME, OCI_SOURCE_REGION, OCI_TENANCY_NAME,
        testing_harness::{vars, with_mock_env},
    };

    const LOCATION: &[(&str, &str)] = &[
        (OCI_SOURCE_REGION, "us-ashburn-1"),
        (OCI_TENANCY_NAME, "acme"),
        (OCI_BUCKETNAME, "images"),
    ];

    #[test]
    fn builds_active_record_with_empty_owner_and_detail() {
        let image = with_mock_env(vars(LOCATION), || ImageMetadata::build("photo1.png")).unwrap();

        assert_eq!(image.image_name, "photo1.png");
        assert_eq!(
            image.image_url,
            "https://objectstorage.us-ashburn-1.oraclecloud.com/n/acme/b/images/o/photo1.png"
        );
        assert_eq!(image.detail, "");
        assert_eq!(image.owner, "");
        assert_eq!(image.deleted, ACTIVE);
    }

    #[test]
    fn ids_are_unique_v4_uuids() {
        let ids: HashSet<String> = (0..256)
            .map(|_| ImageMetadata::new("a.png", String::new(), Utc::now()).id)
            .collect();

        assert_eq!(ids.len(), 256);
        for id in ids {
            let parsed = Uuid::parse_str(&id).unwrap();
            assert_eq!(parsed.get_version(), Some(Version::Random));
            assert_eq!(parsed.hyphenated().to_string(), id);
        }
    }

    #[test]
    fn create_date_is_in_utc_plus_nine() {
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 20, 30, 0).unwrap();
        let image = ImageMetadata::new("a.png", String::new(), now);

        assert_eq!(image.create_date.offset().local_minus_utc(), 9 * 60 * 60);
        assert_eq!(image.create_date, now);
        assert_eq!(
            image.create_date.format(CREATE_DATE_FORMAT).to_string(),
            "20240201-0530"
        );
    }

    #[test]
    fn missing_location_is_propagated() {
        let err = with_mock_env(vars(&[(OCI_SOURCE_REGION, "us-ashburn-1")]), || {
            ImageMetadata::build("photo1.png")
        })
        .unwrap_err();

        assert_eq!(err.var_name(), OCI_TENANCY_NAME);
    }
}
