//! New vs returning-device classification from a marker event

use super::types::Event;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOrigin {
    TrulyNew,
    ReturningDevice,
    Unclassified,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewVsReturning {
    pub truly_new: usize,
    pub returning_device: usize,
    pub unclassified: usize,
    pub users: BTreeMap<String, UserOrigin>,
}

/// Classify users by the flags on their earliest `marker_event`
///
/// `new_flag = true` marks a truly new user, `returning_flag = true` a
/// returning device; an event carrying both counts as new. Only the earliest
/// occurrence per user is consulted (input order breaks timestamp ties), so
/// conflicting flags on later events are ignored.
pub fn classify_new_vs_returning(records: &[Event], marker_event: &str, new_flag: &str, returning_flag: &str) -> NewVsReturning {
    let mut first: BTreeMap<&str, &Event> = BTreeMap::new();
    for e in records.iter().filter(|e| e.name == marker_event) {
        first
            .entry(e.user_id.as_str())
            .and_modify(|cur| {
                if e.timestamp < cur.timestamp {
                    *cur = e;
                }
            })
            .or_insert(e);
    }

    let mut result = NewVsReturning {
        truly_new: 0,
        returning_device: 0,
        unclassified: 0,
        users: BTreeMap::new(),
    };

    for (user, event) in first {
        let origin = if event.properties.get_bool(new_flag) == Some(true) {
            result.truly_new += 1;
            UserOrigin::TrulyNew
        } else if event.properties.get_bool(returning_flag) == Some(true) {
            result.returning_device += 1;
            UserOrigin::ReturningDevice
        } else {
            result.unclassified += 1;
            UserOrigin::Unclassified
        };
        result.users.insert(user.to_string(), origin);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::PropValue;
    use chrono::{DateTime, TimeZone, Utc};

    fn at(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, h, 0, 0).unwrap()
    }

    fn install(h: u32, user: &str, flags: &[(&str, bool)]) -> Event {
        flags.iter().fold(Event::new(at(h), user, "app_installed"), |e, (k, v)| {
            e.with_property(*k, PropValue::Bool(*v))
        })
    }

    #[test]
    fn test_classification_counts() {
        let events = vec![
            install(1, "a", &[("is_new_user", true)]),
            install(2, "b", &[("is_returning_device", true)]),
            install(3, "c", &[]),
            install(4, "d", &[("is_new_user", true), ("is_returning_device", true)]),
            Event::new(at(5), "e", "app_opened"),
        ];

        let result = classify_new_vs_returning(&events, "app_installed", "is_new_user", "is_returning_device");
        assert_eq!(result.truly_new, 2);
        assert_eq!(result.returning_device, 1);
        assert_eq!(result.unclassified, 1);
        assert!(!result.users.contains_key("e"));
        assert_eq!(result.users["d"], UserOrigin::TrulyNew);
    }

    #[test]
    fn test_earliest_occurrence_wins() {
        // out of order input: the 01:00 event decides
        let events = vec![
            install(9, "a", &[("is_new_user", true)]),
            install(1, "a", &[("is_returning_device", true)]),
        ];

        let result = classify_new_vs_returning(&events, "app_installed", "is_new_user", "is_returning_device");
        assert_eq!(result.users["a"], UserOrigin::ReturningDevice);
        assert_eq!(result.truly_new, 0);
    }
}
