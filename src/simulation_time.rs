use crate::core::units::HOURS_PER_YEAR;
use chrono::{NaiveDateTime, TimeDelta};
use serde::Deserialize;

/// The common hourly timeline that every series of a run is aligned to.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct HourlyCalendar {
    start: NaiveDateTime,
    #[serde(default = "default_hours")]
    hours: usize,
}

fn default_hours() -> usize {
    HOURS_PER_YEAR
}

impl HourlyCalendar {
    pub fn new(start: NaiveDateTime, hours: usize) -> Self {
        Self { start, hours }
    }

    pub fn total_steps(&self) -> usize {
        self.hours
    }

    pub fn iter(&self) -> HourlyCalendarIterator {
        HourlyCalendarIterator {
            current_index: 0,
            calendar: self.clone(),
        }
    }

    /// Timestamps for every hour of the calendar, in order.
    pub fn timestamps(&self) -> Vec<NaiveDateTime> {
        self.iter().collect()
    }
}

#[derive(Clone, Debug)]
pub struct HourlyCalendarIterator {
    current_index: usize,
    calendar: HourlyCalendar,
}

impl Iterator for HourlyCalendarIterator {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_index >= self.calendar.hours {
            return None;
        }
        let index = self.current_index;
        self.current_index += 1;
        Some(self.calendar.start + TimeDelta::hours(index as i64))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.calendar.hours - self.current_index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for HourlyCalendarIterator {}
