use crate::assets::{NormalizedAsset, TARGET_DEVICE_CATEGORY};
use crate::errors::Result;
use crate::people::TrackingPerson;
use crate::upstream::{AssetRaw, RawRecord, TrackingUserRaw};

use super::decode_raw;

/// Role name under which the tracking system files students.
const STUDENT_ROLE: &str = "student";

/// Normalizes one asset-service asset of any category.
pub fn extract_asset(record: &RawRecord) -> Result<Option<NormalizedAsset>> {
    let raw: AssetRaw = decode_raw(record)?;
    let Some(asset_id) = raw.asset_id else {
        return Ok(None);
    };

    let model = raw.model.unwrap_or_default();
    let device_type = model.category.and_then(|category| category.name);
    let is_target_type = device_type.as_deref() == Some(TARGET_DEVICE_CATEGORY);
    let owner = raw.owner.unwrap_or_default();

    Ok(Some(NormalizedAsset {
        asset_id,
        asset_tag: raw.asset_tag,
        serial_number: raw.serial_number,
        device_type,
        is_target_type,
        model: model.name,
        status: raw.status.and_then(|status| status.name),
        owner_name: owner.full_name,
        owner_email: owner.email.map(|email| email.to_lowercase()),
        owner_student_id: owner.school_id_number,
        owner_grade: owner.grade,
        location: raw
            .location
            .and_then(|location| location.name)
            .or(raw.location_name),
        room: raw.room_name.or(raw.location_room_id),
        notes: raw.notes,
    }))
}

/// Normalizes one tracking-system user.
///
/// The school id is only a student id for users in the student role, or for
/// users whose role the tracking system did not report.
pub fn extract_tracking_person(record: &RawRecord) -> Result<Option<TrackingPerson>> {
    let raw: TrackingUserRaw = decode_raw(record)?;
    let Some(tracking_user_id) = raw.user_id else {
        return Ok(None);
    };

    let role_name = raw.role.and_then(|role| role.name);
    let is_student = role_name
        .as_deref()
        .map_or(true, |role| role.eq_ignore_ascii_case(STUDENT_ROLE));

    Ok(Some(TrackingPerson {
        tracking_user_id,
        email: raw.email,
        full_name: raw.name,
        first_name: raw.first_name,
        last_name: raw.last_name,
        username: raw.username,
        location: raw.location_name,
        role_name,
        student_id: if is_student { raw.school_id_number } else { None },
        grade: raw.grade,
        is_active: raw.is_active,
    }))
}
