use std::{
    sync::{Mutex, MutexGuard, PoisonError},
    time::{Duration, Instant},
};

use chrono::{DateTime, FixedOffset};
use oracle::sql_type::ToSql;

use crate::metadata::ImageMetadata;

use super::{Dsn, StorageError};

const INSERT_IMAGE_METADATA: &str = "INSERT INTO IMAGES (id, ImageName, Detail, ImageURL, UserName, CREATE_DATE, DELETED) \
     values (:1, :2, :3, :4, :5, :6, :7)";

/// A value bound to one column of the insert
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Param<'a> {
    Text(&'a String),
    Timestamp(&'a DateTime<FixedOffset>),
    Int(&'a i32),
}

impl Param<'_> {
    fn as_sql(&self) -> &dyn ToSql {
        match self {
            Param::Text(v) => *v,
            Param::Timestamp(v) => *v,
            Param::Int(v) => *v,
        }
    }
}

/// The bind values of [INSERT_IMAGE_METADATA], keyed by column, in placeholder order
pub(super) fn image_params(image: &ImageMetadata) -> [(&'static str, Param<'_>); 7] {
    [
        ("id", Param::Text(&image.id)),
        ("ImageName", Param::Text(&image.image_name)),
        ("Detail", Param::Text(&image.detail)),
        ("ImageURL", Param::Text(&image.image_url)),
        ("UserName", Param::Text(&image.owner)),
        ("CREATE_DATE", Param::Timestamp(&image.create_date)),
        ("DELETED", Param::Int(&image.deleted)),
    ]
}

/// The point in time the whole insert, connect included, has to be done by
#[derive(Debug, Clone, Copy)]
pub(super) struct Deadline {
    pub at: Instant,
    pub budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            at: Instant::now() + budget,
            budget,
        }
    }

    /// Time left, or [StorageError::Timeout] once it has passed
    pub fn remaining(&self) -> Result<Duration, StorageError> {
        match self.at.checked_duration_since(Instant::now()) {
            Some(left) if !left.is_zero() => Ok(left),
            _ => Err(StorageError::Timeout(self.budget)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum Phase {
    #[default]
    Pending,
    Committing,
    Abandoned,
}

/// Decides, exactly once, whether the insert commits or the waiting caller gives up.
///
/// A caller that reported a timeout never has a row committed behind it, and a commit
/// that already started is always waited for.
#[derive(Debug, Default)]
pub(super) struct Handoff {
    phase: Mutex<Phase>,
}

impl Handoff {
    /// Worker side. `false` means the caller is gone and the insert must be rolled back
    pub fn begin_commit(&self) -> bool {
        let mut phase = self.lock();
        if *phase == Phase::Abandoned {
            return false;
        }
        *phase = Phase::Committing;
        true
    }

    /// Caller side. `false` means a commit is in flight and its outcome must be awaited
    pub fn abandon(&self) -> bool {
        let mut phase = self.lock();
        if *phase == Phase::Committing {
            return false;
        }
        *phase = Phase::Abandoned;
        true
    }

    fn lock(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Inserts `image` as a new row of `IMAGES` and commits it.
///
/// This blocks on the database. Once connected, every driver call is bounded by the
/// time left until `deadline`. The connection is closed when it goes out of scope,
/// whether or not the insert succeeded.
#[tracing::instrument(skip(dsn, image, handoff), fields(id = %image.id), err)]
pub(super) fn insert_image_metadata(
    dsn: &Dsn,
    image: &ImageMetadata,
    deadline: Deadline,
    handoff: &Handoff,
) -> Result<(), StorageError> {
    let conn = oracle::Connection::connect(dsn.username(), dsn.password(), dsn.service_name())
        .map_err(StorageError::Connect)?;

    conn.set_call_timeout(Some(deadline.remaining()?))
        .map_err(StorageError::Execute)?;

    let params = image_params(image);
    let binds: Vec<&dyn ToSql> = params.iter().map(|(_, param)| param.as_sql()).collect();
    conn.execute(INSERT_IMAGE_METADATA, &binds)
        .map_err(StorageError::Execute)?;

    conn.set_call_timeout(Some(deadline.remaining()?))
        .map_err(StorageError::Execute)?;

    if !handoff.begin_commit() {
        tracing::warn!("caller stopped waiting, rolling back");
        conn.rollback().map_err(StorageError::Execute)?;
        return Err(StorageError::Timeout(deadline.budget));
    }

    conn.commit().map_err(StorageError::Execute)?;

    tracing::info!("inserted image metadata");

    Ok(())
}
