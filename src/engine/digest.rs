//! Once-a-day report of missed doses and reminder slots for emergency
//! contacts.

use serde::Serialize;
use time::{Date, OffsetDateTime};

use super::period::day_of;
use super::reconcile::reconcile;
use super::schedule::due_doses;
use crate::alerts::repo_types::{Alert, AlertCondition, AlertKey, AlertKind, AlertSettings};
use crate::medicines::repo_types::MedicineRecord;
use crate::reminders::repo_types::Reminder;

pub const MEDICINE_DIGEST_SUBJECT: &str = "Daily Report: Missed Medicines";
pub const REMINDER_DIGEST_SUBJECT: &str = "Daily Report: Missed Checkups";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissedItem {
    pub title: String,
    pub detail: String,
    pub times: Vec<String>,
}

/// Per medicine, the due doses of today that were not taken.
pub fn missed_doses(records: &[MedicineRecord], now: OffsetDateTime) -> Vec<MissedItem> {
    let today = day_of(now);
    records
        .iter()
        .filter_map(|record| {
            let due = due_doses(record, today, now);
            let times: Vec<String> = reconcile(&due, &record.events, today)
                .into_iter()
                .filter(|r| r.state.is_missed())
                .map(|r| r.time.to_string())
                .collect();
            (!times.is_empty()).then(|| MissedItem {
                title: record.medicine.name.clone(),
                detail: record.medicine.dosage.clone(),
                times,
            })
        })
        .collect()
}

/// Per live reminder, the slots of today that passed without completion.
pub fn missed_reminder_slots(reminders: &[Reminder], now: OffsetDateTime) -> Vec<MissedItem> {
    reminders
        .iter()
        .filter_map(|reminder| {
            let times: Vec<String> = reminder
                .missed_slots(now)
                .into_iter()
                .map(|t| t.to_string())
                .collect();
            (!times.is_empty()).then(|| MissedItem {
                title: reminder.title.clone(),
                detail: reminder.kind.as_str().to_string(),
                times,
            })
        })
        .collect()
}

fn render(heading: &str, patient: &str, day: Date, items: &[MissedItem]) -> String {
    let mut body = format!("{heading}\n\nPatient: {patient}\nDate: {day}\n\n");
    for item in items {
        body.push_str(&format!(
            "- {} ({}): missed at {}\n",
            item.title,
            item.detail,
            item.times.join(", ")
        ));
    }
    body.push_str("\nPlease check in with the patient.\n");
    body
}

struct DigestSpec {
    kind: AlertKind,
    condition: AlertCondition,
    subject: &'static str,
}

const MEDICINE_DIGEST: DigestSpec = DigestSpec {
    kind: AlertKind::Report,
    condition: AlertCondition::MissedDoses,
    subject: MEDICINE_DIGEST_SUBJECT,
};

const REMINDER_DIGEST: DigestSpec = DigestSpec {
    kind: AlertKind::Reminder,
    condition: AlertCondition::MissedReminders,
    subject: REMINDER_DIGEST_SUBJECT,
};

fn compose(
    spec: &DigestSpec,
    items: Vec<MissedItem>,
    settings: &AlertSettings,
    raised_today: &[Alert],
    patient: &str,
    now: OffsetDateTime,
) -> Option<Alert> {
    if settings.emergency_contacts.is_empty() || items.is_empty() {
        return None;
    }
    let key = AlertKey {
        user_id: settings.user_id,
        kind: spec.kind,
        condition: spec.condition,
        day: day_of(now),
    };
    if raised_today.iter().any(|a| a.key() == key) {
        return None;
    }
    let body = render(spec.subject, patient, key.day, &items);
    Some(Alert::compose(
        key,
        settings.emergency_contacts.clone(),
        spec.subject.to_string(),
        body,
        now,
    ))
}

/// Report alert listing today's missed doses, unless one was already raised
/// today, nothing was missed or nobody would receive it.
pub fn compose_medicine_digest(
    records: &[MedicineRecord],
    settings: &AlertSettings,
    raised_today: &[Alert],
    patient: &str,
    now: OffsetDateTime,
) -> Option<Alert> {
    compose(
        &MEDICINE_DIGEST,
        missed_doses(records, now),
        settings,
        raised_today,
        patient,
        now,
    )
}

/// Same as [`compose_medicine_digest`] for reminder slots.
pub fn compose_reminder_digest(
    reminders: &[Reminder],
    settings: &AlertSettings,
    raised_today: &[Alert],
    patient: &str,
    now: OffsetDateTime,
) -> Option<Alert> {
    compose(
        &REMINDER_DIGEST,
        missed_reminder_slots(reminders, now),
        settings,
        raised_today,
        patient,
        now,
    )
}
