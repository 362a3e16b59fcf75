use crate::{
    context::Context,
    error::HandlerError,
    event::StorageEvent,
    metadata::ImageMetadata,
    service::db::{DB, Dsn},
};

/// Handles one invocation: decode the event, build the metadata and insert it.
///
/// Any failure aborts the invocation. Nothing that already happened is undone and
/// nothing is retried.
#[tracing::instrument(skip(ctx, input), fields(input_len = input.len()))]
pub async fn handle_invocation(
    ctx: &Context,
    input: &[u8],
) -> Result<ImageMetadata, HandlerError> {
    tracing::trace!("processing event");

    let event = StorageEvent::decode_with(input, ctx.decode_policy).map_err(|err| {
        tracing::error!(error=?err, "unable to decode event");
        HandlerError::from(err)
    })?;

    tracing::info!(
        event_id = %event.event_id,
        event_kind = ?event.kind(),
        resource_name = %event.data.resource_name,
        "processing storage event"
    );

    let image = ImageMetadata::build(&event.data.resource_name).map_err(|err| {
        tracing::error!(error=?err, "unable to build image metadata");
        HandlerError::from(err)
    })?;

    save_image_metadata(&ctx.db, &image).await.inspect_err(|err| {
        tracing::error!(error=?err, "unable to save image metadata");
    })?;

    tracing::trace!("processing complete");

    Ok(image)
}

/// Resolves the database credentials and inserts `image`. No connection is attempted
/// when the credentials are incomplete.
#[tracing::instrument(skip(db, image), fields(id = %image.id), err)]
pub async fn save_image_metadata(db: &DB, image: &ImageMetadata) -> Result<(), HandlerError> {
    let dsn = Dsn::from_env()?;

    db.insert_image_metadata(&dsn, image).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::{
        env::{
            OCI_BUCKETNAME, OCI_SOURCE_REGION, OCI_TENANCY_NAME, ORACLE_PASSWORD,
            ORACLE_SERVICENAME, ORACLE_USERNAME,
            testing_harness::{vars, with_mock_env_async},
        },
        event::DecodePolicy,
        metadata::ACTIVE,
        service::db::StorageError,
    };

    const FULL_ENV: &[(&str, &str)] = &[
        (OCI_SOURCE_REGION, "us-ashburn-1"),
        (OCI_TENANCY_NAME, "acme"),
        (OCI_BUCKETNAME, "images"),
        (ORACLE_USERNAME, "admin"),
        (ORACLE_PASSWORD, "hunter2"),
        (ORACLE_SERVICENAME, "imagesdb_high"),
    ];

    const PHOTO_EVENT: &[u8] = br#"{
        "eventType": "com.oraclecloud.objectstorage.createobject",
        "eventID": "1",
        "data": {"resourceName": "photo1.png"}
    }"#;

    const PHOTO_URL: &str =
        "https://objectstorage.us-ashburn-1.oraclecloud.com/n/acme/b/images/o/photo1.png";

    fn env_without(missing: &str) -> Vec<(&'static str, &'static str)> {
        FULL_ENV
            .iter()
            .copied()
            .filter(|(name, _)| *name != missing)
            .collect()
    }

    #[tokio::test]
    async fn inserts_metadata_for_uploaded_photo() {
        let mut db = DB::default();
        db.expect_insert_image_metadata()
            .withf(|dsn, image| {
                dsn.connection_string() == "admin/hunter2@imagesdb_high"
                    && image.image_name == "photo1.png"
                    && image.image_url == PHOTO_URL
                    && image.deleted == ACTIVE
                    && image.owner.is_empty()
                    && image.detail.is_empty()
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = Context::new(db, DecodePolicy::Strict);

        let image = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, PHOTO_EVENT))
            .await
            .unwrap();

        assert_eq!(image.image_name, "photo1.png");
        assert_eq!(image.image_url, PHOTO_URL);
    }

    #[tokio::test]
    async fn missing_username_skips_the_database() {
        let mut db = DB::default();
        db.expect_insert_image_metadata().never();
        let ctx = Context::new(db, DecodePolicy::Strict);

        let err = with_mock_env_async(
            vars(&env_without(ORACLE_USERNAME)),
            handle_invocation(&ctx, PHOTO_EVENT),
        )
        .await
        .unwrap_err();

        match err {
            HandlerError::MissingConfiguration(err) => {
                assert_eq!(err.var_name(), ORACLE_USERNAME)
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_bucket_aborts_before_saving() {
        let mut db = DB::default();
        db.expect_insert_image_metadata().never();
        let ctx = Context::new(db, DecodePolicy::Strict);

        let err = with_mock_env_async(
            vars(&env_without(OCI_BUCKETNAME)),
            handle_invocation(&ctx, PHOTO_EVENT),
        )
        .await
        .unwrap_err();

        assert!(
            matches!(err, HandlerError::MissingConfiguration(ref e) if e.var_name() == OCI_BUCKETNAME)
        );
    }

    #[tokio::test]
    async fn strict_policy_rejects_malformed_input() {
        let mut db = DB::default();
        db.expect_insert_image_metadata().never();
        let ctx = Context::new(db, DecodePolicy::Strict);

        let err = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, b"{not json"))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn lenient_policy_continues_with_empty_name() {
        let mut db = DB::default();
        db.expect_insert_image_metadata()
            .withf(|_, image| image.image_name.is_empty())
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = Context::new(db, DecodePolicy::Lenient);

        let image = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, b""))
            .await
            .unwrap();

        assert_eq!(image.image_name, "");
        assert_eq!(
            image.image_url,
            "https://objectstorage.us-ashburn-1.oraclecloud.com/n/acme/b/images/o/"
        );
    }

    #[tokio::test]
    async fn lenient_policy_keeps_name_next_to_mistyped_tag() {
        let mut db = DB::default();
        db.expect_insert_image_metadata()
            .withf(|_, image| image.image_name == "photo1.png" && image.image_url == PHOTO_URL)
            .times(1)
            .returning(|_, _| Ok(()));
        let ctx = Context::new(db, DecodePolicy::Lenient);

        let input = br#"{"data":{"resourceName":"photo1.png","freeFormTags":{"Department":5}}}"#;
        let image = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, input))
            .await
            .unwrap();

        assert_eq!(image.image_name, "photo1.png");
        assert_eq!(image.image_url, PHOTO_URL);
    }

    #[tokio::test]
    async fn strict_policy_rejects_mistyped_tag() {
        let mut db = DB::default();
        db.expect_insert_image_metadata().never();
        let ctx = Context::new(db, DecodePolicy::Strict);

        let input = br#"{"data":{"resourceName":"photo1.png","freeFormTags":{"Department":5}}}"#;
        let err = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, input))
            .await
            .unwrap_err();

        assert!(matches!(err, HandlerError::Decode(_)));
    }

    #[tokio::test]
    async fn storage_errors_are_returned() {
        let mut db = DB::default();
        db.expect_insert_image_metadata()
            .times(1)
            .returning(|_, _| Err(StorageError::Timeout(Duration::from_secs(55))));
        let ctx = Context::new(db, DecodePolicy::Strict);

        let err = with_mock_env_async(vars(FULL_ENV), handle_invocation(&ctx, PHOTO_EVENT))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            HandlerError::Storage(StorageError::Timeout(_))
        ));
    }
}
