//! Maintenance business logic - Exception reports and plate reclamation (GC).
//!
//! Both workflows force plate status changes outside the bind/unbind path.
//! They still go through the plate state machine, as the `Quarantine` and
//! `Reclaim` events.

use crate::{
    core::{
        plate::{BindingChange, require_plate, write_plate},
        plate_state::PlateEvent,
        retry::expect_single_row,
        store::begin_write,
    },
    entities::{ExceptionLog, GcProcessLog, Plate, Worker, exception_log, gc_process_log, plate},
    errors::{Error, Result},
};
use sea_orm::{Set, prelude::*, sea_query::Expr};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use tracing::{error, info, warn};

/// Status of an exception report.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ExceptionStatus {
    Pending,
    Resolved,
}

/// What a reclamation run clears.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GcKind {
    /// Return the tray to the pool: weight, binding and status are reset
    Plate,
    /// Empty the tray: only the weight is reset
    FoodWaste,
}

/// Status of a reclamation run. Only ever moves forward.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GcStatus {
    Pending,
    Processing,
    Completed,
}

/// A recorded exception and the plate it quarantined, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionReport {
    pub log: exception_log::Model,
    pub quarantined: Option<plate::Model>,
}

/// A completed reclamation run and the plate it left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct GcReport {
    pub log: gc_process_log::Model,
    pub plate: plate::Model,
}

/// Records an anomaly reported by a worker.
///
/// The log is always written. When `plate_id` names an existing plate, that
/// plate is moved to `maintenance` with its binding left as it is. Both happen
/// in one transaction.
///
/// # Errors
/// - [`Error::WorkerNotFound`] if the worker does not exist
pub async fn handle_exception(
    db: &DatabaseConnection,
    worker_id: &str,
    plate_id: Option<&str>,
    exception: &str,
    action: &str,
) -> Result<ExceptionReport> {
    let txn = begin_write(db).await?;

    Worker::find_by_id(worker_id.to_string())
        .one(&txn)
        .await?
        .ok_or_else(|| Error::WorkerNotFound {
            worker_id: worker_id.to_string(),
        })?;

    let now = chrono::Utc::now();
    let log = exception_log::ActiveModel {
        worker_id: Set(worker_id.to_string()),
        plate_id: Set(plate_id.map(ToString::to_string)),
        exception: Set(exception.to_string()),
        action: Set(action.to_string()),
        status: Set(ExceptionStatus::Pending.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    let quarantined = match plate_id {
        Some(plate_id) => match Plate::find_by_id(plate_id.to_string()).one(&txn).await? {
            Some(current) => Some(
                write_plate(
                    &txn,
                    &current,
                    PlateEvent::Quarantine,
                    BindingChange::Keep,
                    false,
                )
                .await?,
            ),
            None => {
                warn!(plate_id, log_id = log.id, "exception names an unknown plate");
                None
            }
        },
        None => None,
    };

    txn.commit().await?;

    info!(
        worker_id,
        log_id = log.id,
        plate_id = plate_id.unwrap_or_default(),
        quarantined = quarantined.is_some(),
        "exception recorded"
    );
    Ok(ExceptionReport { log, quarantined })
}

/// Marks an exception report as resolved. Resolving twice is a no-op.
pub async fn resolve_exception(db: &DatabaseConnection, log_id: i64) -> Result<exception_log::Model> {
    let txn = begin_write(db).await?;
    let log = ExceptionLog::find_by_id(log_id)
        .one(&txn)
        .await?
        .ok_or(Error::ExceptionNotFound { id: log_id })?;

    if log.status == ExceptionStatus::Resolved.as_ref() {
        return Ok(log);
    }

    let result = ExceptionLog::update_many()
        .col_expr(
            exception_log::Column::Status,
            Expr::value(ExceptionStatus::Resolved.to_string()),
        )
        .col_expr(exception_log::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(exception_log::Column::Id.eq(log_id))
        .filter(exception_log::Column::Status.eq(log.status.clone()))
        .exec(&txn)
        .await?;
    expect_single_row(result.rows_affected, &format!("exception log {log_id}"))?;

    let resolved = ExceptionLog::find_by_id(log_id)
        .one(&txn)
        .await?
        .ok_or(Error::ExceptionNotFound { id: log_id })?;
    txn.commit().await?;

    info!(log_id, "exception resolved");
    Ok(resolved)
}

async fn reclaim<C>(db: &C, plate_id: &str, log_id: i64, kind: GcKind) -> Result<GcReport>
where
    C: ConnectionTrait,
{
    let current = require_plate(db, plate_id).await?;
    let plate = match kind {
        GcKind::Plate => {
            write_plate(db, &current, PlateEvent::Reclaim, BindingChange::Clear, true).await?
        }
        GcKind::FoodWaste => {
            let result = Plate::update_many()
                .col_expr(plate::Column::Weight, Expr::value(0.0_f64))
                .col_expr(plate::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
                .filter(plate::Column::Id.eq(plate_id))
                .exec(db)
                .await?;
            expect_single_row(result.rows_affected, &format!("plate {plate_id}"))?;
            require_plate(db, plate_id).await?
        }
    };

    let result = GcProcessLog::update_many()
        .col_expr(
            gc_process_log::Column::Status,
            Expr::value(GcStatus::Completed.to_string()),
        )
        .col_expr(gc_process_log::Column::UpdatedAt, Expr::value(chrono::Utc::now()))
        .filter(gc_process_log::Column::Id.eq(log_id))
        .filter(gc_process_log::Column::Status.eq(GcStatus::Processing.to_string()))
        .exec(db)
        .await?;
    expect_single_row(result.rows_affected, &format!("gc log {log_id}"))?;

    let log = GcProcessLog::find_by_id(log_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::Database(DbErr::RecordNotFound(format!("gc log {log_id}"))))?;
    Ok(GcReport { log, plate })
}

/// Runs one reclamation pass on a plate.
///
/// The `processing` log is committed on its own before the plate is touched.
/// The plate update and the flip to `completed` then share a transaction, so a
/// failed plate write leaves the log at `processing` for an operator to follow up.
///
/// # Errors
/// - [`Error::PlateNotFound`] if the plate does not exist
pub async fn process_gc(db: &DatabaseConnection, plate_id: &str, kind: GcKind) -> Result<GcReport> {
    require_plate(db, plate_id).await?;

    let now = chrono::Utc::now();
    let log = gc_process_log::ActiveModel {
        plate_id: Set(plate_id.to_string()),
        gc_type: Set(kind.to_string()),
        status: Set(GcStatus::Processing.to_string()),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    let outcome = async {
        let txn = begin_write(db).await?;
        let report = reclaim(&txn, plate_id, log.id, kind).await?;
        txn.commit().await?;
        Ok::<_, Error>(report)
    }
    .await;

    match outcome {
        Ok(report) => {
            info!(plate_id, log_id = log.id, gc_type = %kind, "gc completed");
            Ok(report)
        }
        Err(err) => {
            error!(
                plate_id,
                log_id = log.id,
                gc_type = %kind,
                error = %err,
                "gc failed, log left in processing"
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::float_cmp)]
    use super::*;
    use crate::core::plate::{bind_plate, get_plate_info};
    use crate::entities::PlateColumn;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_exception_quarantines_plate_and_keeps_binding() -> Result<()> {
        let db = setup_with_bound_plate("u1", "p1").await?;
        create_test_worker(&db, "w1").await?;

        let report = handle_exception(&db, "w1", Some("p1"), "cracked tray", "pulled").await?;
        assert_eq!(report.log.status, "pending");
        assert_eq!(report.log.plate_id.as_deref(), Some("p1"));

        let plate = report.quarantined.unwrap();
        assert_eq!(plate.status, "maintenance");
        assert!(plate.is_bound);
        assert_eq!(plate.bound_user_id.as_deref(), Some("u1"));

        // quarantined plates refuse new bindings
        create_test_user(&db, "u2").await?;
        create_test_plate(&db, "p2").await?;
        bind_plate(&db, "u2", "p2").await?;
        assert!(matches!(
            bind_plate(&db, "u1", "p1").await,
            Err(Error::PlateUnavailable { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_exception_without_resolvable_plate() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_worker(&db, "w1").await?;

        let report = handle_exception(&db, "w1", None, "spill", "mopped").await?;
        assert!(report.quarantined.is_none());

        let report = handle_exception(&db, "w1", Some("ghost"), "odd tag", "logged").await?;
        assert!(report.quarantined.is_none());
        assert_eq!(report.log.plate_id.as_deref(), Some("ghost"));

        assert_eq!(ExceptionLog::find().all(&db).await?.len(), 2);

        Ok(())
    }

    #[tokio::test]
    async fn test_exception_unknown_worker_writes_nothing() -> Result<()> {
        let db = setup_test_db().await?;

        let result = handle_exception(&db, "nobody", None, "spill", "mopped").await;
        assert!(matches!(result, Err(Error::WorkerNotFound { .. })));
        assert!(ExceptionLog::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_resolve_exception() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_worker(&db, "w1").await?;
        let report = handle_exception(&db, "w1", None, "spill", "mopped").await?;

        let resolved = resolve_exception(&db, report.log.id).await?;
        assert_eq!(resolved.status, "resolved");
        let again = resolve_exception(&db, report.log.id).await?;
        assert_eq!(again.status, "resolved");

        assert!(matches!(
            resolve_exception(&db, 9_999).await,
            Err(Error::ExceptionNotFound { id: 9_999 })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn test_plate_gc_is_idempotent() -> Result<()> {
        let db = setup_with_bound_plate("u1", "p1").await?;
        create_test_worker(&db, "w1").await?;
        handle_exception(&db, "w1", Some("p1"), "cracked tray", "pulled").await?;
        Plate::update_many()
            .col_expr(PlateColumn::Weight, Expr::value(412.5_f64))
            .filter(PlateColumn::Id.eq("p1"))
            .exec(&db)
            .await?;

        let once = process_gc(&db, "p1", GcKind::Plate).await?;
        assert_eq!(once.log.status, "completed");
        assert_eq!(once.log.gc_type, "plate");
        assert_eq!(once.plate.weight, 0.0);
        assert_eq!(once.plate.status, "available");
        assert!(!once.plate.is_bound);
        assert!(once.plate.bound_user_id.is_none());
        assert!(once.plate.bound_at.is_none());

        let twice = process_gc(&db, "p1", GcKind::Plate).await?;
        assert_eq!(twice.plate.weight, once.plate.weight);
        assert_eq!(twice.plate.status, once.plate.status);
        assert_eq!(twice.plate.is_bound, once.plate.is_bound);
        assert_eq!(twice.plate.bound_user_id, once.plate.bound_user_id);
        assert_eq!(twice.plate.bound_at, once.plate.bound_at);

        Ok(())
    }

    #[tokio::test]
    async fn test_food_waste_gc_only_clears_weight() -> Result<()> {
        let db = setup_with_bound_plate("u1", "p1").await?;
        Plate::update_many()
            .col_expr(PlateColumn::Weight, Expr::value(80.0_f64))
            .filter(PlateColumn::Id.eq("p1"))
            .exec(&db)
            .await?;

        let report = process_gc(&db, "p1", GcKind::FoodWaste).await?;
        assert_eq!(report.log.gc_type, "food_waste");
        assert_eq!(report.plate.weight, 0.0);
        assert_eq!(report.plate.status, "in_use");
        assert!(report.plate.is_bound);
        assert_eq!(report.plate.bound_user_id.as_deref(), Some("u1"));

        Ok(())
    }

    #[tokio::test]
    async fn test_gc_unknown_plate() -> Result<()> {
        let db = setup_test_db().await?;

        let result = process_gc(&db, "ghost", GcKind::Plate).await;
        assert!(matches!(result, Err(Error::PlateNotFound { .. })));
        assert!(GcProcessLog::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_failed_plate_write_leaves_log_processing() -> Result<()> {
        let db = setup_with_bound_plate("u1", "p1").await?;
        db.execute_unprepared(
            "CREATE TRIGGER fail_plate_write BEFORE UPDATE ON plates \
             BEGIN SELECT RAISE(ABORT, 'plate write failed'); END;",
        )
        .await?;

        let result = process_gc(&db, "p1", GcKind::Plate).await;
        assert!(result.is_err());

        let logs = GcProcessLog::find().all(&db).await?;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, "processing");

        let plate = get_plate_info(&db, "p1").await?;
        assert!(plate.is_bound);
        assert_eq!(plate.status, "in_use");

        Ok(())
    }
}
