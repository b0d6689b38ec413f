//! Weekly Schedule Grid
//!
//! Normalizes weekly-schedule payloads into one grid:
//! weekday → time slot → tasks scheduled there.
//!
//! The backend answers in two shapes: a flat list of task records carrying
//! `days` + `localTime` (or `toDoAt`), or an object already grouped by day.
//! Both are accepted. Normalization never fails; bad records are skipped.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::{Map, Value};

use crate::models::{ScheduledTask, TaskId, TimeSlot, Weekday};

pub type Cell = Vec<Arc<ScheduledTask>>;
pub type DaySlots = BTreeMap<TimeSlot, Cell>;

/// Derived day × time-slot view of the weekly plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    days: BTreeMap<Weekday, DaySlots>,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, day: Weekday, slot: TimeSlot, task: Arc<ScheduledTask>) {
        self.days
            .entry(day)
            .or_default()
            .entry(slot)
            .or_default()
            .push(task);
    }

    /// Tasks at `(day, slot)`; empty if nothing is scheduled there
    pub fn cell(&self, day: Weekday, slot: &TimeSlot) -> &[Arc<ScheduledTask>] {
        self.days
            .get(&day)
            .and_then(|slots| slots.get(slot))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn day(&self, day: Weekday) -> Option<&DaySlots> {
        self.days.get(&day)
    }

    pub fn contains_task(&self, task_id: &TaskId) -> bool {
        self.entries().any(|(_, _, task)| task.refers_to(task_id))
    }

    /// Template id of the entry whose own id is `instance_id`
    pub fn template_of(&self, instance_id: &TaskId) -> Option<TaskId> {
        self.entries()
            .find(|(_, _, task)| task.id() == instance_id)
            .map(|(_, _, task)| task.template_id())
    }

    /// Remove a task from every cell, dropping cells and days left empty.
    /// Returns how many entries were removed.
    pub fn remove_task(&mut self, task_id: &TaskId) -> usize {
        let before = self.len();
        for slots in self.days.values_mut() {
            for cell in slots.values_mut() {
                cell.retain(|task| !task.refers_to(task_id));
            }
            slots.retain(|_, cell| !cell.is_empty());
        }
        self.days.retain(|_, slots| !slots.is_empty());
        before - self.len()
    }

    /// All `(day, slot, task)` entries in day and time order
    pub fn entries(&self) -> impl Iterator<Item = (Weekday, &TimeSlot, &Arc<ScheduledTask>)> + '_ {
        self.days.iter().flat_map(|(day, slots)| {
            slots
                .iter()
                .flat_map(move |(slot, cell)| cell.iter().map(move |task| (*day, slot, task)))
        })
    }

    pub fn len(&self) -> usize {
        self.days
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    /// One flat record per entry, in the backend's flat-list shape
    pub fn flatten(&self) -> Vec<Value> {
        self.entries()
            .map(|(day, slot, task)| {
                let mut record = task.fields().clone();
                record.insert("days".into(), Value::from(vec![day.name()]));
                record.insert("localTime".into(), Value::from(slot.as_str()));
                Value::Object(record)
            })
            .collect()
    }
}

/// Weekly response, classified by shape
#[derive(Debug, Clone, PartialEq)]
pub enum WeeklyPayload {
    /// Task records each carrying `days` and a time
    FlatList(Vec<Value>),
    /// `{ day: { "HH:mm": [task, ...] } }`
    Grouped(Map<String, Value>),
    Empty,
}

/// Envelope keys the backend wraps schedules in
const ENVELOPE_KEYS: [&str; 3] = ["weeklySchedule", "familyTasksList", "tasks"];

impl WeeklyPayload {
    pub fn from_response(raw: Value) -> Self {
        match raw {
            Value::Array(records) => WeeklyPayload::FlatList(records),
            Value::Object(mut object) => {
                for key in ENVELOPE_KEYS {
                    match object.remove(key) {
                        Some(Value::Array(records)) => return WeeklyPayload::FlatList(records),
                        Some(Value::Object(grouped)) => return WeeklyPayload::Grouped(grouped),
                        Some(other) => {
                            object.insert(key.to_string(), other);
                        }
                        None => {}
                    }
                }
                WeeklyPayload::Grouped(object)
            }
            _ => WeeklyPayload::Empty,
        }
    }

    pub fn into_grid(self) -> Grid {
        match self {
            WeeklyPayload::FlatList(records) => build_from_records(records),
            WeeklyPayload::Grouped(grouped) => build_from_grouped(grouped),
            WeeklyPayload::Empty => Grid::new(),
        }
    }
}

/// Normalize any supported weekly response into a grid
pub fn normalize(raw: Value) -> Grid {
    WeeklyPayload::from_response(raw).into_grid()
}

fn build_from_records(records: Vec<Value>) -> Grid {
    let mut grid = Grid::new();
    for record in records {
        let Value::Object(fields) = record else {
            tracing::debug!("skipping non-object weekly record");
            continue;
        };
        let Some((days, slot, task)) = fan_out_record(fields) else {
            continue;
        };
        let task = Arc::new(task);
        for day in days {
            grid.insert(day, slot.clone(), Arc::clone(&task));
        }
    }
    grid
}

/// Days, slot and payload of one flat record, or `None` if it is unusable
fn fan_out_record(fields: Map<String, Value>) -> Option<(BTreeSet<Weekday>, TimeSlot, ScheduledTask)> {
    let raw_time = match fields.get("localTime").and_then(Value::as_str) {
        Some(time) => time.to_string(),
        None => fields
            .get("toDoAt")
            .and_then(Value::as_str)
            .map(|time| time.chars().take(5).collect())?,
    };
    let Some(slot) = TimeSlot::parse(&raw_time) else {
        tracing::debug!(time = %raw_time, "skipping weekly record with invalid time");
        return None;
    };

    let names = fields.get("days").and_then(Value::as_array)?;
    let days: BTreeSet<Weekday> = names
        .iter()
        .filter_map(|name| {
            let day = name.as_str().and_then(Weekday::from_name);
            if day.is_none() {
                tracing::debug!(day = %name, "dropping unrecognized weekday");
            }
            day
        })
        .collect();

    let mut task = ScheduledTask::from_map(fields)?;
    if task.local_time().is_none() {
        task.set("localTime", Value::from(slot.as_str()));
    }
    Some((days, slot, task))
}

fn build_from_grouped(grouped: Map<String, Value>) -> Grid {
    let mut grid = Grid::new();
    for (key, slots) in grouped {
        let Some(day) = Weekday::from_key(&key) else {
            tracing::debug!(key = %key, "dropping unrecognized weekday key");
            continue;
        };
        let Value::Object(slots) = slots else {
            continue;
        };
        for (raw_slot, tasks) in slots {
            let Some(slot) = TimeSlot::parse(&raw_slot) else {
                tracing::debug!(slot = %raw_slot, "dropping invalid time slot");
                continue;
            };
            let Value::Array(tasks) = tasks else {
                continue;
            };
            for task in tasks.into_iter().filter_map(ScheduledTask::from_value) {
                grid.insert(day, slot.clone(), Arc::new(task));
            }
        }
    }
    grid
}
