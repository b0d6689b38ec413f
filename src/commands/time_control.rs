//! Time Control Commands
//!
//! Bindings for `/api/time_control`: extra minutes, daily allowances and
//! allowed usage windows.

use reqwest::Method;
use serde::Serialize;
use serde_json::Value;

use super::{parse_list, segment, ApiClient, Area};
use crate::error::{Error, Result};
use crate::models::{DailyTime, ScheduleTime, TaskId, TimeSlot, Weekday};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddTimeArgs<'a> {
    child_id: &'a str,
    time: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DailyTimeArgs<'a> {
    daily_time_minutes: u32,
    days: &'a [Weekday],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleTimeArgs<'a> {
    child_id: &'a str,
    name: &'a str,
    days: &'a [Weekday],
    start: &'a TimeSlot,
    end: &'a TimeSlot,
}

fn require_days(days: &[Weekday]) -> Result<()> {
    if days.is_empty() {
        return Err(Error::Validation("select at least one day".into()));
    }
    Ok(())
}

impl ApiClient {
    pub async fn add_time_to_child(&self, child_id: &str, minutes: u32) -> Result<Value> {
        if minutes == 0 {
            return Err(Error::Validation("minutes must be positive".into()));
        }
        let path = format!("add_time_to_child/{}", segment(child_id));
        let args = AddTimeArgs { child_id, time: minutes };
        self.call(Method::PATCH, Area::TimeControl, &path, &[], Some(&args))
            .await
    }

    pub async fn update_daily_time(&self, child_id: &str, minutes: u32, days: &[Weekday]) -> Result<()> {
        if minutes == 0 {
            return Err(Error::Validation("daily time must be positive".into()));
        }
        require_days(days)?;
        let path = format!("update_daily_time/{}", segment(child_id));
        let args = DailyTimeArgs {
            daily_time_minutes: minutes,
            days,
        };
        self.call(Method::POST, Area::TimeControl, &path, &[], Some(&args))
            .await
            .map(|_| ())
    }

    pub async fn update_schedule_time(&self, child_id: &str, schedule: &ScheduleTime) -> Result<()> {
        require_days(&schedule.days)?;
        if schedule.start >= schedule.end {
            return Err(Error::Validation("schedule must end after it starts".into()));
        }
        let path = format!("update_schedule_time/{}", segment(child_id));
        let args = ScheduleTimeArgs {
            child_id,
            name: &schedule.name,
            days: &schedule.days,
            start: &schedule.start,
            end: &schedule.end,
        };
        self.call(Method::POST, Area::TimeControl, &path, &[], Some(&args))
            .await
            .map(|_| ())
    }

    pub async fn daily_times(&self, child_id: &str) -> Result<Vec<DailyTime>> {
        let path = format!("get_daily_times/{}", segment(child_id));
        let body = self.get(Area::TimeControl, &path, &[]).await?;
        Ok(parse_list(body, "dailyTimeList"))
    }

    pub async fn schedule_times(&self, child_id: &str) -> Result<Vec<ScheduleTime>> {
        let path = format!("get_schedule_times/{}", segment(child_id));
        let body = self.get(Area::TimeControl, &path, &[]).await?;
        Ok(parse_list(body, "scheduleTimeList"))
    }

    pub async fn delete_schedule_time(&self, schedule_id: &TaskId) -> Result<()> {
        let path = format!("delete_schedule_time/{}", segment(schedule_id.as_str()));
        self.call(Method::DELETE, Area::TimeControl, &path, &[], None::<&()>)
            .await
            .map(|_| ())
    }
}
