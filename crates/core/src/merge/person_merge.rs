use crate::people::{DirectoryPerson, PersonDataSource, PersonRecord, TrackingPerson};

use super::first_present;

/// This run's source records for one email.
#[derive(Debug, Clone, Default)]
pub struct PersonSources {
    /// Normalized join key.
    pub email: String,
    pub directory: Option<DirectoryPerson>,
    pub tracking: Option<TrackingPerson>,
}

/// Merges one person.
///
/// Account attributes come from the directory. Location, role, student id and
/// grade prefer a non-empty tracking-system value, then the directory value,
/// then what was stored. Fee fields are owned by the fee phase and are carried
/// over unchanged. `assigned_devices` is the current set of device ids whose
/// annotated user is this person.
pub fn merge_person(
    existing: Option<&PersonRecord>,
    sources: PersonSources,
    mut assigned_devices: Vec<String>,
    synced_at: &str,
) -> PersonRecord {
    let PersonSources {
        email,
        directory,
        tracking,
    } = sources;
    let dir = directory.as_ref();
    let trk = tracking.as_ref();
    let old = existing;

    let directory_user_id = dir
        .map(|d| d.directory_user_id.clone())
        .or_else(|| old.and_then(|o| o.directory_user_id.clone()));
    let tracking_user_id = trk
        .map(|t| t.tracking_user_id.clone())
        .or_else(|| old.and_then(|o| o.tracking_user_id.clone()));

    let data_source = match (&directory_user_id, &tracking_user_id) {
        (Some(_), Some(_)) => PersonDataSource::Merged,
        (None, Some(_)) => PersonDataSource::TrackingOnly,
        _ => PersonDataSource::DirectoryOnly,
    };

    assigned_devices.sort();
    assigned_devices.dedup();

    PersonRecord {
        full_name: first_present(&[
            dir.and_then(|d| d.full_name.as_ref()),
            trk.and_then(|t| t.full_name.as_ref()),
            old.and_then(|o| o.full_name.as_ref()),
        ]),
        first_name: first_present(&[
            dir.and_then(|d| d.first_name.as_ref()),
            trk.and_then(|t| t.first_name.as_ref()),
            old.and_then(|o| o.first_name.as_ref()),
        ]),
        last_name: first_present(&[
            dir.and_then(|d| d.last_name.as_ref()),
            trk.and_then(|t| t.last_name.as_ref()),
            old.and_then(|o| o.last_name.as_ref()),
        ]),
        org_unit_path: match dir {
            Some(d) => d.org_unit_path.clone(),
            None => old.and_then(|o| o.org_unit_path.clone()),
        },
        is_admin: dir.map_or_else(|| old.is_some_and(|o| o.is_admin), |d| d.is_admin),
        is_suspended: dir.map_or_else(|| old.is_some_and(|o| o.is_suspended), |d| d.is_suspended),
        last_login: match dir {
            Some(d) => d.last_login.clone(),
            None => old.and_then(|o| o.last_login.clone()),
        },
        student_id: first_present(&[
            trk.and_then(|t| t.student_id.as_ref()),
            dir.and_then(|d| d.student_id.as_ref()),
            old.and_then(|o| o.student_id.as_ref()),
        ]),
        student_grade: first_present(&[
            trk.and_then(|t| t.grade.as_ref()),
            dir.and_then(|d| d.student_grade.as_ref()),
            old.and_then(|o| o.student_grade.as_ref()),
        ]),
        tracking_location: first_present(&[
            trk.and_then(|t| t.location.as_ref()),
            old.and_then(|o| o.tracking_location.as_ref()),
        ]),
        tracking_role: first_present(&[
            trk.and_then(|t| t.role_name.as_ref()),
            old.and_then(|o| o.tracking_role.as_ref()),
        ]),
        tracking_username: first_present(&[
            trk.and_then(|t| t.username.as_ref()),
            old.and_then(|o| o.tracking_username.as_ref()),
        ]),
        tracking_active: trk
            .and_then(|t| t.is_active)
            .or_else(|| old.and_then(|o| o.tracking_active)),
        device_count: i32::try_from(assigned_devices.len()).unwrap_or(i32::MAX),
        assigned_devices,
        total_fee_balance: old.map(|o| o.total_fee_balance).unwrap_or_default(),
        has_outstanding_fees: old.is_some_and(|o| o.has_outstanding_fees),
        fee_last_synced_at: old.and_then(|o| o.fee_last_synced_at.clone()),
        is_merged: data_source == PersonDataSource::Merged,
        data_source,
        directory_user_id,
        tracking_user_id,
        directory_synced_at: if dir.is_some() {
            Some(synced_at.to_string())
        } else {
            old.and_then(|o| o.directory_synced_at.clone())
        },
        tracking_synced_at: if trk.is_some() {
            Some(synced_at.to_string())
        } else {
            old.and_then(|o| o.tracking_synced_at.clone())
        },
        created_at: old.and_then(|o| o.created_at.clone()),
        updated_at: old.and_then(|o| o.updated_at.clone()),
        email,
    }
}
