//! Frontend Models
//!
//! Data structures matching backend payloads. Records keep every field the
//! backend sends so newer backend fields survive a round trip.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

// ========================
// Identifiers
// ========================

/// Backend identifier; arrives as a JSON number or string
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Read an id from a JSON value (number or non-empty string)
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => Some(Self(n.to_string())),
            Value::String(s) if !s.trim().is_empty() => Some(Self(s.trim().to_string())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self.0.parse::<i64>() {
            Ok(n) => Value::from(n),
            Err(_) => Value::from(self.0.clone()),
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<i32> for TaskId {
    fn from(id: i32) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // The backend uses numeric (Long) ids; keep them numeric on the wire
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        TaskId::from_value(&value).ok_or_else(|| D::Error::custom("id must be a number or string"))
    }
}

// ========================
// Weekdays and Time Slots
// ========================

/// Day of week in backend order (Sunday = 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Sunday,
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
    ];

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }

    /// Backend day name, e.g. `"MONDAY"`
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Sunday => "SUNDAY",
            Weekday::Monday => "MONDAY",
            Weekday::Tuesday => "TUESDAY",
            Weekday::Wednesday => "WEDNESDAY",
            Weekday::Thursday => "THURSDAY",
            Weekday::Friday => "FRIDAY",
            Weekday::Saturday => "SATURDAY",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|day| day.name().eq_ignore_ascii_case(name))
    }

    /// Grouped schedules key days by name or by numeric string
    pub fn from_key(key: &str) -> Option<Self> {
        Self::from_name(key).or_else(|| key.trim().parse::<u8>().ok().and_then(Self::from_index))
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Canonical `"HH:mm"` time of day
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeSlot(String);

impl TimeSlot {
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        NaiveTime::parse_from_str(raw, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
            .ok()
            .map(|time| Self(time.format("%H:%M").to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for TimeSlot {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::parse(s)
            .ok_or_else(|| crate::error::Error::Validation(format!("invalid time slot: {}", s)))
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for TimeSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for TimeSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        TimeSlot::parse(&raw).ok_or_else(|| D::Error::custom(format!("invalid time slot: {}", raw)))
    }
}

// ========================
// Tasks
// ========================

/// Family task (matches backend task template)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Minute reward
    #[serde(default, rename = "screenTime", alias = "time", alias = "minutesReward")]
    pub screen_time: u32,
    #[serde(default, rename = "assignedTo", skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn new(id: impl Into<TaskId>, title: &str, screen_time: u32) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            description: None,
            screen_time,
            assigned_to: None,
            extra: Map::new(),
        }
    }
}

/// Fields sent when creating or editing a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "screenTime")]
    pub screen_time: u32,
}

impl TaskDraft {
    pub fn new(title: &str, description: &str, screen_time: u32) -> Self {
        Self {
            title: title.trim().to_string(),
            description: description.trim().to_string(),
            screen_time,
        }
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.title.trim().is_empty() {
            return Err(crate::error::Error::Validation("task title is required".into()));
        }
        if self.screen_time == 0 {
            return Err(crate::error::Error::Validation(
                "reward must be at least one minute".into(),
            ));
        }
        Ok(())
    }
}

/// One grid entry: a task as scheduled on the weekly plan.
///
/// Holds the complete source object; typed accessors read the known fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTask {
    id: TaskId,
    fields: Map<String, Value>,
}

impl ScheduledTask {
    /// Build from a JSON object carrying an `id`
    pub fn from_map(fields: Map<String, Value>) -> Option<Self> {
        let id = fields.get("id").and_then(TaskId::from_value)?;
        Some(Self { id, fields })
    }

    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(fields) => Self::from_map(fields),
            _ => None,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        let fields = match serde_json::to_value(task) {
            Ok(Value::Object(fields)) => fields,
            _ => {
                let mut fields = Map::new();
                fields.insert("id".into(), task.id.to_value());
                fields
            }
        };
        Self { id: task.id.clone(), fields }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    /// Template id for schedule entries, the plain id otherwise
    pub fn template_id(&self) -> TaskId {
        self.fields
            .get("taskTemplateId")
            .and_then(TaskId::from_value)
            .unwrap_or_else(|| self.id.clone())
    }

    /// True if this entry was scheduled from template `task_id`.
    ///
    /// Instance ids live in their own namespace and are never compared.
    pub fn refers_to(&self, task_id: &TaskId) -> bool {
        &self.template_id() == task_id
    }

    pub fn title(&self) -> &str {
        self.str_field("title").unwrap_or_default()
    }

    pub fn description(&self) -> Option<&str> {
        self.str_field("description")
    }

    pub fn minutes_reward(&self) -> Option<u64> {
        ["minutesReward", "screenTime", "time"]
            .iter()
            .find_map(|key| self.fields.get(*key).and_then(Value::as_u64))
    }

    pub fn family_member_id(&self) -> Option<String> {
        self.fields
            .get("familyMemberId")
            .and_then(TaskId::from_value)
            .map(|id| id.to_string())
    }

    pub fn local_time(&self) -> Option<&str> {
        self.str_field("localTime")
    }

    pub fn was_complete_today(&self) -> bool {
        self.fields
            .get("wasCompleteToday")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub(crate) fn set(&mut self, key: &str, value: Value) {
        self.fields.insert(key.to_string(), value);
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }
}

impl Serialize for ScheduledTask {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}

// ========================
// Accounts
// ========================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    Parent,
    Child,
}

/// `auth/me` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub family_id: Option<String>,
    #[serde(default)]
    pub total_time: f64,
    #[serde(default)]
    pub pending_time: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Profile fields the user can edit; unset fields are left untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// ========================
// Time Control and Devices
// ========================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyTime {
    #[serde(default)]
    pub daily_time_minutes: u32,
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Allowed usage window on given days
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleTime {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<TaskId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub days: Vec<Weekday>,
    pub start: TimeSlot,
    pub end: TimeSlot,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default)]
    pub name: String,
    pub device_id: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_weekday_lookup() {
        assert_eq!(Weekday::from_name("SUNDAY"), Some(Weekday::Sunday));
        assert_eq!(Weekday::from_name("wednesday"), Some(Weekday::Wednesday));
        assert_eq!(Weekday::from_name("FUNDAY"), None);
        assert_eq!(Weekday::from_key("6"), Some(Weekday::Saturday));
        assert_eq!(Weekday::from_key("7"), None);
        assert_eq!(Weekday::Monday.index(), 1);
    }

    #[test]
    fn test_time_slot_canonical_form() {
        assert_eq!(TimeSlot::parse("18:00").unwrap().as_str(), "18:00");
        assert_eq!(TimeSlot::parse("9:05").unwrap().as_str(), "09:05");
        assert_eq!(TimeSlot::parse("07:30:00").unwrap().as_str(), "07:30");
        assert!(TimeSlot::parse("25:00").is_none());
        assert!(TimeSlot::parse("soon").is_none());
    }

    #[test]
    fn test_task_id_accepts_numbers_and_strings() {
        let numeric: TaskId = serde_json::from_value(json!(12)).unwrap();
        let text: TaskId = serde_json::from_value(json!("abc")).unwrap();
        assert_eq!(numeric.as_str(), "12");
        assert_eq!(serde_json::to_value(&numeric).unwrap(), json!(12));
        assert_eq!(serde_json::to_value(&text).unwrap(), json!("abc"));
        assert!(serde_json::from_value::<TaskId>(json!(null)).is_err());
    }

    #[test]
    fn test_task_keeps_unknown_fields() {
        let task: Task = serde_json::from_value(json!({
            "id": 3,
            "title": "Homework",
            "time": 20,
            "color": "blue"
        }))
        .unwrap();

        assert_eq!(task.screen_time, 20);
        assert_eq!(task.extra.get("color"), Some(&json!("blue")));

        let entry = ScheduledTask::from_task(&task);
        assert_eq!(entry.minutes_reward(), Some(20));
        assert_eq!(entry.get("color"), Some(&json!("blue")));
    }

    #[test]
    fn test_template_id_falls_back_to_id() {
        let instance = ScheduledTask::from_value(json!({"id": 55, "taskTemplateId": 7})).unwrap();
        let plain = ScheduledTask::from_value(json!({"id": 7})).unwrap();

        assert_eq!(instance.template_id(), TaskId::from(7));
        assert!(instance.refers_to(&TaskId::from(7)));
        assert!(!instance.refers_to(&TaskId::from(55)));
        assert_eq!(plain.template_id(), TaskId::from(7));
        assert!(plain.refers_to(&TaskId::from(7)));
        assert!(ScheduledTask::from_value(json!({"title": "no id"})).is_none());
    }

    #[test]
    fn test_draft_validation() {
        assert!(TaskDraft::new("Dishes", "", 10).validate().is_ok());
        assert!(TaskDraft::new("  ", "", 10).validate().is_err());
        assert!(TaskDraft::new("Dishes", "", 0).validate().is_err());
    }
}
