//! Plate status state machine.
//!
//! Every status write on a plate is decided here. The ordinary path is
//! `Bind`/`Unbind`; the exception workflow uses `Quarantine` and reclamation
//! uses `Reclaim`, both of which are allowed from any state.

use crate::errors::{Error, Result};
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Physical status of a tray.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PlateStatus {
    Available,
    InUse,
    Cleaning,
    Maintenance,
}

/// Something that happens to a plate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PlateEvent {
    /// A user takes the tray
    Bind,
    /// The user (or the idle sweep) releases the tray
    Unbind,
    /// Staff reported an anomaly on the tray
    Quarantine,
    /// GC returned the tray to the pool
    Reclaim,
}

impl PlateStatus {
    /// Statuses a plate may be bound from.
    pub const BINDABLE: [Self; 2] = [Self::Available, Self::InUse];

    /// Applies `event`, returning the next status.
    ///
    /// `Bind` out of `cleaning` or `maintenance` is refused with
    /// [`Error::PlateUnavailable`]; a released tray that is out of the pool keeps
    /// its status until it is reclaimed.
    pub fn apply(self, event: PlateEvent, plate_id: &str) -> Result<Self> {
        match (self, event) {
            (Self::Available | Self::InUse, PlateEvent::Bind) => Ok(Self::InUse),
            (Self::Cleaning | Self::Maintenance, PlateEvent::Bind) => {
                Err(Error::PlateUnavailable {
                    plate_id: plate_id.to_string(),
                    status: self.to_string(),
                })
            }
            (Self::InUse, PlateEvent::Unbind) => Ok(Self::Available),
            (Self::Cleaning | Self::Maintenance, PlateEvent::Unbind) => Ok(self),
            (_, PlateEvent::Quarantine) => Ok(Self::Maintenance),
            (_, PlateEvent::Reclaim) => Ok(Self::Available),
            (Self::Available, PlateEvent::Unbind) => Err(Error::InvalidPlateTransition {
                plate_id: plate_id.to_string(),
                from: self.to_string(),
                event: event.to_string(),
            }),
        }
    }

    /// Parses a stored status column.
    pub fn from_column(value: &str, plate_id: &str) -> Result<Self> {
        value.parse().map_err(|_| {
            Error::Database(DbErr::Type(format!(
                "plate {plate_id} has unknown status {value:?}"
            )))
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_bind_moves_to_in_use() {
        assert_eq!(
            PlateStatus::Available.apply(PlateEvent::Bind, "p1").unwrap(),
            PlateStatus::InUse
        );
        // rebinding by the same holder keeps it in use
        assert_eq!(
            PlateStatus::InUse.apply(PlateEvent::Bind, "p1").unwrap(),
            PlateStatus::InUse
        );
    }

    #[test]
    fn test_bind_refused_out_of_pool() {
        let err = PlateStatus::Maintenance
            .apply(PlateEvent::Bind, "p1")
            .unwrap_err();
        assert!(matches!(err, Error::PlateUnavailable { ref status, .. } if status == "maintenance"));

        assert!(matches!(
            PlateStatus::Cleaning.apply(PlateEvent::Bind, "p1"),
            Err(Error::PlateUnavailable { .. })
        ));
    }

    #[test]
    fn test_unbind_keeps_quarantined_status() {
        assert_eq!(
            PlateStatus::InUse.apply(PlateEvent::Unbind, "p1").unwrap(),
            PlateStatus::Available
        );
        assert_eq!(
            PlateStatus::Maintenance
                .apply(PlateEvent::Unbind, "p1")
                .unwrap(),
            PlateStatus::Maintenance
        );
        assert!(matches!(
            PlateStatus::Available.apply(PlateEvent::Unbind, "p1"),
            Err(Error::InvalidPlateTransition { .. })
        ));
    }

    #[test]
    fn test_forced_transitions_apply_from_any_status() {
        for status in [
            PlateStatus::Available,
            PlateStatus::InUse,
            PlateStatus::Cleaning,
            PlateStatus::Maintenance,
        ] {
            assert_eq!(
                status.apply(PlateEvent::Quarantine, "p1").unwrap(),
                PlateStatus::Maintenance
            );
            assert_eq!(
                status.apply(PlateEvent::Reclaim, "p1").unwrap(),
                PlateStatus::Available
            );
        }
    }

    #[test]
    fn test_status_column_round_trip() {
        assert_eq!(PlateStatus::InUse.as_ref(), "in_use");
        assert_eq!(
            PlateStatus::from_column("maintenance", "p1").unwrap(),
            PlateStatus::Maintenance
        );
        assert!(PlateStatus::from_column("broken", "p1").is_err());
    }
}
