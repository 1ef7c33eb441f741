use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::datemath::add_days;
use crate::domain::{Appointment, AppointmentType};

/// Per-type visibility. Only changes what is displayed, never what is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterState {
    visible: BTreeMap<AppointmentType, bool>,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            visible: AppointmentType::ALL
                .into_iter()
                .map(|kind| (kind, true))
                .collect(),
        }
    }
}

impl FilterState {
    pub fn toggle(&mut self, kind: AppointmentType) {
        let entry = self.visible.entry(kind).or_insert(true);
        *entry = !*entry;
    }

    pub fn set(&mut self, kind: AppointmentType, visible: bool) {
        self.visible.insert(kind, visible);
    }

    pub fn is_visible(&self, kind: AppointmentType) -> bool {
        self.visible.get(&kind).copied().unwrap_or(true)
    }

    pub fn hidden_from(kinds: &[AppointmentType]) -> Self {
        let mut filter = Self::default();
        for kind in kinds {
            filter.set(*kind, false);
        }
        filter
    }
}

/// Read-only, filtered view over the appointment collection.
pub struct AppointmentIndex<'a> {
    appointments: &'a [Appointment],
    filter: &'a FilterState,
}

impl<'a> AppointmentIndex<'a> {
    pub fn new(appointments: &'a [Appointment], filter: &'a FilterState) -> Self {
        Self {
            appointments,
            filter,
        }
    }

    fn visible(&self) -> impl Iterator<Item = &'a Appointment> + use<'a> {
        let filter = self.filter;
        self.appointments
            .iter()
            .filter(move |appointment| filter.is_visible(appointment.kind))
    }

    /// Visible appointments on `date`, ascending by start time. Ties keep collection order.
    pub fn for_date(&self, date: NaiveDate) -> Vec<&'a Appointment> {
        let mut rows = self
            .visible()
            .filter(|appointment| appointment.date == date)
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| left.time.cmp(&right.time));
        rows
    }

    /// One bucket per day in the inclusive range.
    pub fn for_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<(NaiveDate, Vec<&'a Appointment>)> {
        let mut days = Vec::new();
        let mut day = start;
        while day <= end {
            days.push((day, self.for_date(day)));
            day = add_days(day, 1);
        }
        days
    }

    /// Visible appointments sorted by `(date, time)` and grouped per date.
    pub fn agenda_ordered(&self) -> Vec<(NaiveDate, Vec<&'a Appointment>)> {
        let mut rows = self.visible().collect::<Vec<_>>();
        rows.sort_by(|left, right| {
            left.date
                .cmp(&right.date)
                .then_with(|| left.time.cmp(&right.time))
        });

        let mut groups: Vec<(NaiveDate, Vec<&'a Appointment>)> = Vec::new();
        for appointment in rows {
            match groups.last_mut() {
                Some((date, bucket)) if *date == appointment.date => bucket.push(appointment),
                _ => groups.push((appointment.date, vec![appointment])),
            }
        }
        groups
    }

    pub fn visible_ids(&self) -> Vec<&'a str> {
        self.visible()
            .map(|appointment| appointment.id.as_str())
            .collect()
    }
}
