//! The on-wiki admin list and the rules deciding who is due for
//! reconfirmation.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Duration, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::error::ContentError;
use crate::localtime::anniversary_in;

/// Days past both anchors before a one-time override is dropped.
pub const OVERRIDE_GRACE_DAYS: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Group {
    Sysop,
    Bureaucrat,
    Checkuser,
}

impl Group {
    pub const ALL: [Group; 3] = [Group::Sysop, Group::Bureaucrat, Group::Checkuser];

    pub fn as_str(self) -> &'static str {
        match self {
            Group::Sysop => "sysop",
            Group::Bureaucrat => "bureaucrat",
            Group::Checkuser => "checkuser",
        }
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Group {
    type Err = ContentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Group::ALL
            .into_iter()
            .find(|g| g.as_str() == s)
            .ok_or_else(|| ContentError::MalformedList(format!("unknown group `{s}`")))
    }
}

/// A recurring `dd/mm` date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

impl DayMonth {
    /// This date in `year`, with the leap-day fallback of anniversaries.
    pub fn in_year(self, year: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, self.month, self.day)
            .unwrap_or_else(|| anniversary_in(leap_reference(self), year))
    }

    /// The first occurrence of this date not before `day`.
    pub fn on_or_after(self, day: NaiveDate) -> NaiveDate {
        let this_year = self.in_year(day.year());
        if this_year >= day {
            this_year
        } else {
            self.in_year(day.year() + 1)
        }
    }
}

// Any valid day/month exists in 2000.
fn leap_reference(dm: DayMonth) -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, dm.month, dm.day).unwrap_or(NaiveDate::MIN)
}

impl TryFrom<String> for DayMonth {
    type Error = ContentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let invalid = || ContentError::InvalidDate(value.clone());
        let (day, month) = value.trim().split_once('/').ok_or_else(invalid)?;
        let dm = DayMonth {
            day: day.parse().map_err(|_| invalid())?,
            month: month.parse().map_err(|_| invalid())?,
        };
        NaiveDate::from_ymd_opt(2000, dm.month, dm.day).ok_or_else(invalid)?;
        Ok(dm)
    }
}

impl From<DayMonth> for String {
    fn from(value: DayMonth) -> Self {
        format!("{:02}/{:02}", value.day, value.month)
    }
}

mod short_date {
    use chrono::NaiveDate;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use crate::localtime::{format_short_date, parse_short_date};

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(date) => s.serialize_str(&format_short_date(*date)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        Option::<String>::deserialize(d)?
            .map(|text| parse_short_date(&text).map_err(de::Error::custom))
            .transpose()
    }
}

/// One admin list entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default, with = "short_date", skip_serializing_if = "Option::is_none")]
    pub sysop: Option<NaiveDate>,
    #[serde(default, with = "short_date", skip_serializing_if = "Option::is_none")]
    pub bureaucrat: Option<NaiveDate>,
    #[serde(default, with = "short_date", skip_serializing_if = "Option::is_none")]
    pub checkuser: Option<NaiveDate>,
    #[serde(
        rename = "override",
        default,
        with = "short_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub override_once: Option<NaiveDate>,
    #[serde(rename = "override-perm", default, skip_serializing_if = "Option::is_none")]
    pub override_perm: Option<DayMonth>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

impl UserInfo {
    pub fn group_date(&self, group: Group) -> Option<NaiveDate> {
        match group {
            Group::Sysop => self.sysop,
            Group::Bureaucrat => self.bureaucrat,
            Group::Checkuser => self.checkuser,
        }
    }

    pub fn set_group_date(&mut self, group: Group, date: Option<NaiveDate>) {
        match group {
            Group::Sysop => self.sysop = date,
            Group::Bureaucrat => self.bureaucrat = date,
            Group::Checkuser => self.checkuser = date,
        }
    }

    pub fn groups(&self) -> impl Iterator<Item = Group> + '_ {
        Group::ALL
            .into_iter()
            .filter(|g| self.group_date(*g).is_some())
    }

    pub fn has_groups(&self) -> bool {
        self.groups().next().is_some()
    }

    /// Latest of the bureaucrat and checkuser dates, else the sysop date.
    pub fn valid_flag_date(&self) -> Option<NaiveDate> {
        self.bureaucrat.max(self.checkuser).or(self.sysop)
    }

    /// The override in force on `today`, if any. A pending one-time
    /// override wins; otherwise the permanent one, rolled to next year
    /// once this year's date has passed.
    pub fn override_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(once) = self.override_once {
            if once >= today || self.override_perm.is_none() {
                return Some(once);
            }
        }
        self.override_perm.map(|perm| perm.on_or_after(today))
    }

    pub fn is_due(&self, today: NaiveDate) -> bool {
        if let Some(date) = self.override_date(today) {
            return date.day() == today.day() && date.month() == today.month();
        }
        self.valid_flag_date()
            .is_some_and(|flag| flag != today && anniversary_in(flag, today.year()) == today)
    }

    /// The next date on which the user will be due, strictly after `today`.
    pub fn next_due_date(&self, today: NaiveDate) -> Option<NaiveDate> {
        if let Some(once) = self.override_once.filter(|once| *once > today) {
            return Some(once);
        }
        if let Some(perm) = self.override_perm {
            return Some(perm.on_or_after(today + Duration::days(1)));
        }
        let flag = self.valid_flag_date()?;
        let this_year = anniversary_in(flag, today.year());
        if this_year > today {
            Some(this_year)
        } else {
            Some(anniversary_in(flag, today.year() + 1))
        }
    }

    pub fn is_override_expired(&self, today: NaiveDate) -> bool {
        let Some(once) = self.override_once else {
            return false;
        };
        let grace = Duration::days(OVERRIDE_GRACE_DAYS);
        let usual_passed = self
            .valid_flag_date()
            .map(|flag| today > anniversary_in(flag, today.year()) + grace)
            .unwrap_or(true);
        usual_passed && today > once + grace
    }

    /// Fills fields missing here from `other` and unions the aliases.
    pub fn absorb(&mut self, other: UserInfo) {
        self.sysop = self.sysop.or(other.sysop);
        self.bureaucrat = self.bureaucrat.or(other.bureaucrat);
        self.checkuser = self.checkuser.or(other.checkuser);
        self.override_once = self.override_once.or(other.override_once);
        self.override_perm = self.override_perm.or(other.override_perm);
        for alias in other.aliases {
            if !self.aliases.contains(&alias) {
                self.aliases.push(alias);
            }
        }
    }
}

/// Users and their entries, written with keys sorted case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct AdminList(BTreeMap<String, UserInfo>);

impl AdminList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(text: &str) -> Result<Self, ContentError> {
        serde_json::from_str(text).map_err(|err| ContentError::MalformedList(err.to_string()))
    }

    pub fn to_json(&self) -> Result<String, ContentError> {
        serde_json::to_string_pretty(self)
            .map_err(|err| ContentError::MalformedList(err.to_string()))
    }

    pub fn get(&self, user: &str) -> Option<&UserInfo> {
        self.0.get(user)
    }

    pub fn get_mut(&mut self, user: &str) -> Option<&mut UserInfo> {
        self.0.get_mut(user)
    }

    pub fn insert(&mut self, user: impl Into<String>, info: UserInfo) -> Option<UserInfo> {
        self.0.insert(user.into(), info)
    }

    pub fn remove(&mut self, user: &str) -> Option<UserInfo> {
        self.0.remove(user)
    }

    pub fn contains(&self, user: &str) -> bool {
        self.0.contains_key(user)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &UserInfo)> {
        self.0.iter().map(|(name, info)| (name.as_str(), info))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn users_due(&self, today: NaiveDate) -> Vec<String> {
        self.iter()
            .filter(|(_, info)| info.is_due(today))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    fn sorted_entries(&self) -> Vec<(&String, &UserInfo)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|(a, _), (b, _)| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| a.cmp(b))
        });
        entries
    }
}

impl Serialize for AdminList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = self.sorted_entries();
        let mut map = serializer.serialize_map(Some(entries.len()))?;
        for (name, info) in entries {
            map.serialize_entry(name, info)?;
        }
        map.end()
    }
}

/// Groups actually held, per user, as reported by the wiki.
pub type ActualGroups = BTreeMap<String, BTreeSet<Group>>;

/// Groups held on the wiki but not dated in the list.
pub fn missing_groups(list: &AdminList, actual: &ActualGroups) -> BTreeMap<String, Vec<Group>> {
    actual
        .iter()
        .filter_map(|(user, held)| {
            let missing: Vec<Group> = held
                .iter()
                .copied()
                .filter(|g| list.get(user).and_then(|i| i.group_date(*g)).is_none())
                .collect();
            (!missing.is_empty()).then(|| (user.clone(), missing))
        })
        .collect()
}

/// Groups dated in the list but no longer held.
pub fn extra_groups(list: &AdminList, actual: &ActualGroups) -> BTreeMap<String, Vec<Group>> {
    list.iter()
        .filter_map(|(user, info)| {
            let held = actual.get(user);
            let extra: Vec<Group> = info
                .groups()
                .filter(|g| !held.is_some_and(|h| h.contains(g)))
                .collect();
            (!extra.is_empty()).then(|| (user.to_string(), extra))
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub old: String,
    pub new: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListChanges {
    pub missing: BTreeMap<String, BTreeMap<Group, NaiveDate>>,
    pub extra: BTreeMap<String, Vec<Group>>,
    pub renames: Vec<Rename>,
}

impl ListChanges {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.extra.is_empty() && self.renames.is_empty()
    }
}

/// Applies `changes` to `current`.
///
/// Expired overrides are dropped, renamed entries are merged under the new
/// name with the old one kept as alias, groups no longer held are removed
/// (with entries left empty), and missing groups are dated without touching
/// dates already present.
pub fn compute_new_list(current: &AdminList, changes: &ListChanges, today: NaiveDate) -> AdminList {
    let mut list = current.clone();

    for info in list.0.values_mut() {
        if info.is_override_expired(today) {
            info.override_once = None;
        }
    }

    let mut renamed = BTreeSet::new();
    for rename in &changes.renames {
        let Some(mut old) = list.remove(&rename.old) else {
            continue;
        };
        if !old.aliases.contains(&rename.old) {
            old.aliases.push(rename.old.clone());
        }
        match list.get_mut(&rename.new) {
            Some(existing) => existing.absorb(old),
            None => {
                list.insert(rename.new.clone(), old);
            }
        }
        renamed.insert(rename.old.as_str());
    }

    for (user, groups) in &changes.extra {
        if renamed.contains(user.as_str()) {
            continue;
        }
        let Some(info) = list.get_mut(user) else {
            continue;
        };
        for group in groups {
            info.set_group_date(*group, None);
        }
        if !info.has_groups() {
            list.remove(user);
        }
    }

    for (user, dates) in &changes.missing {
        let info = list.0.entry(user.clone()).or_default();
        for (group, date) in dates {
            if info.group_date(*group).is_none() {
                info.set_group_date(*group, Some(*date));
            }
        }
    }

    list
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(d: u32, m: u32, y: i32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sysop(since: NaiveDate) -> UserInfo {
        UserInfo {
            sysop: Some(since),
            ..UserInfo::default()
        }
    }

    #[test]
    fn bob_is_due_on_anniversary_but_not_on_flag_day() {
        let bob = sysop(date(1, 3, 2020));
        assert!(bob.is_due(date(1, 3, 2024)));
        assert!(!bob.is_due(date(1, 3, 2020)));
        assert!(!bob.is_due(date(2, 3, 2024)));
    }

    #[test]
    fn leap_day_flag_is_due_on_first_of_march_in_common_years() {
        let info = sysop(date(29, 2, 2020));
        assert!(!info.is_due(date(28, 2, 2023)));
        assert!(info.is_due(date(1, 3, 2023)));
        assert!(info.is_due(date(29, 2, 2024)));
        assert!(!info.is_due(date(1, 3, 2024)));
        assert_eq!(info.next_due_date(date(1, 3, 2024)), Some(date(1, 3, 2025)));
    }

    #[test]
    fn valid_flag_date_prefers_latest_extra_group() {
        let info = UserInfo {
            sysop: Some(date(1, 1, 2015)),
            bureaucrat: Some(date(5, 6, 2018)),
            checkuser: Some(date(7, 2, 2019)),
            ..UserInfo::default()
        };
        assert_eq!(info.valid_flag_date(), Some(date(7, 2, 2019)));
        assert!(info.is_due(date(7, 2, 2024)));
        assert!(!info.is_due(date(1, 1, 2024)));
    }

    #[test]
    fn one_time_override_fires_even_when_it_is_today() {
        let info = UserInfo {
            override_once: Some(date(10, 4, 2024)),
            ..sysop(date(1, 3, 2020))
        };
        assert!(info.is_due(date(10, 4, 2024)));
        assert!(!info.is_due(date(1, 3, 2024)));
    }

    #[test]
    fn permanent_override_replaces_the_flag_anniversary_all_year() {
        let info = UserInfo {
            override_perm: Some(DayMonth { day: 15, month: 1 }),
            ..sysop(date(1, 3, 2020))
        };
        let due: Vec<NaiveDate> = date(1, 1, 2024)
            .iter_days()
            .take_while(|day| day.year() == 2024)
            .filter(|day| info.is_due(*day))
            .collect();
        assert_eq!(due, vec![date(15, 1, 2024)]);
        assert_eq!(info.override_date(date(20, 5, 2024)), Some(date(15, 1, 2025)));
        assert_eq!(info.next_due_date(date(15, 1, 2024)), Some(date(15, 1, 2025)));
        assert_eq!(info.next_due_date(date(10, 1, 2024)), Some(date(15, 1, 2024)));
    }

    #[test]
    fn passed_one_time_override_yields_to_permanent_one() {
        let info = UserInfo {
            override_once: Some(date(1, 2, 2024)),
            override_perm: Some(DayMonth { day: 15, month: 5 }),
            ..sysop(date(1, 3, 2020))
        };
        assert_eq!(info.override_date(date(1, 4, 2024)), Some(date(15, 5, 2024)));
        assert_eq!(info.override_date(date(20, 1, 2024)), Some(date(1, 2, 2024)));
    }

    #[test]
    fn override_expires_after_both_anchors_plus_grace() {
        let info = UserInfo {
            override_once: Some(date(10, 3, 2024)),
            ..sysop(date(1, 3, 2020))
        };
        assert!(!info.is_override_expired(date(13, 3, 2024)));
        assert!(info.is_override_expired(date(14, 3, 2024)));
        assert!(!sysop(date(1, 3, 2020)).is_override_expired(date(14, 3, 2024)));

        let early = UserInfo {
            override_once: Some(date(10, 1, 2024)),
            ..sysop(date(1, 3, 2020))
        };
        assert!(!early.is_override_expired(date(1, 3, 2024)));
        assert!(early.is_override_expired(date(5, 3, 2024)));
    }

    #[test]
    fn next_due_date_is_strictly_after_today() {
        let bob = sysop(date(1, 3, 2020));
        assert_eq!(bob.next_due_date(date(1, 3, 2024)), Some(date(1, 3, 2025)));
        assert_eq!(bob.next_due_date(date(28, 2, 2024)), Some(date(1, 3, 2024)));
    }

    #[test]
    fn json_keys_are_sorted_case_insensitively() {
        let list = AdminList::from_json(
            r#"{"bob": {"sysop": "01/03/2020"},
                "Alice": {"sysop": "02/04/2019", "override-perm": "05/06"},
                "Carol": {"sysop": "03/05/2018", "aliases": ["Caroline"]}}"#,
        )
        .unwrap();
        let json = list.to_json().unwrap();
        let alice = json.find("\"Alice\"").unwrap();
        let bob = json.find("\"bob\"").unwrap();
        let carol = json.find("\"Carol\"").unwrap();
        assert!(alice < bob && bob < carol);
        assert!(json.contains("\"override-perm\": \"05/06\""));
        assert!(!json.contains("\"override\":"));
        assert_eq!(AdminList::from_json(&json).unwrap(), list);
    }

    #[test]
    fn malformed_dates_are_rejected() {
        assert!(matches!(
            AdminList::from_json(r#"{"bob": {"sysop": "2020-03-01"}}"#),
            Err(ContentError::MalformedList(_))
        ));
        assert!(AdminList::from_json(r#"{"bob": {"override-perm": "31/02"}}"#).is_err());
    }

    #[test]
    fn unchanged_groups_leave_list_untouched() {
        let list = AdminList::from_json(
            r#"{"bob": {"sysop": "01/03/2020"}, "Alice": {"sysop": "02/04/2019", "bureaucrat": "02/04/2021"}}"#,
        )
        .unwrap();
        let actual: ActualGroups = [
            ("bob".to_string(), BTreeSet::from([Group::Sysop])),
            (
                "Alice".to_string(),
                BTreeSet::from([Group::Sysop, Group::Bureaucrat]),
            ),
        ]
        .into_iter()
        .collect();
        assert!(missing_groups(&list, &actual).is_empty());
        assert!(extra_groups(&list, &actual).is_empty());

        let new_list = compute_new_list(&list, &ListChanges::default(), date(1, 1, 2024));
        assert_eq!(new_list, list);
        assert_eq!(new_list.to_json().unwrap(), list.to_json().unwrap());
    }

    #[test]
    fn new_list_applies_renames_removals_and_additions() {
        let mut list = AdminList::new();
        list.insert("Old", sysop(date(1, 3, 2020)));
        list.insert(
            "Leaving",
            UserInfo {
                bureaucrat: Some(date(2, 2, 2021)),
                ..sysop(date(1, 1, 2019))
            },
        );
        list.insert("Gone", sysop(date(5, 5, 2018)));
        list.insert(
            "Expired",
            UserInfo {
                override_once: Some(date(1, 1, 2023)),
                ..sysop(date(1, 6, 2017))
            },
        );

        let actual: ActualGroups = [
            ("New", vec![Group::Sysop]),
            ("Leaving", vec![Group::Sysop]),
            ("Expired", vec![Group::Sysop]),
            ("Fresh", vec![Group::Sysop, Group::Checkuser]),
        ]
        .into_iter()
        .map(|(u, g)| (u.to_string(), g.into_iter().collect()))
        .collect();

        let mut changes = ListChanges {
            extra: extra_groups(&list, &actual),
            renames: vec![Rename {
                old: "Old".into(),
                new: "New".into(),
            }],
            ..ListChanges::default()
        };
        for (user, groups) in missing_groups(&list, &actual) {
            let dates = groups.into_iter().map(|g| (g, date(9, 9, 2023))).collect();
            changes.missing.insert(user, dates);
        }

        let new_list = compute_new_list(&list, &changes, date(1, 7, 2024));

        let renamed = new_list.get("New").unwrap();
        assert_eq!(renamed.sysop, Some(date(1, 3, 2020)));
        assert_eq!(renamed.aliases, vec!["Old".to_string()]);
        assert!(!new_list.contains("Old"));
        assert!(!new_list.contains("Gone"));
        assert_eq!(new_list.get("Leaving").unwrap().bureaucrat, None);
        assert_eq!(new_list.get("Expired").unwrap().override_once, None);
        let fresh = new_list.get("Fresh").unwrap();
        assert_eq!(fresh.sysop, Some(date(9, 9, 2023)));
        assert_eq!(fresh.checkuser, Some(date(9, 9, 2023)));
    }
}
