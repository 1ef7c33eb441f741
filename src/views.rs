use std::fmt::{Display, Formatter};

use chrono::{Datelike, NaiveDate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::datemath::{add_days, days_in_month, first_weekday_of_month, shift_month, start_of_week};
use crate::domain::{Appointment, AppointmentType};
use crate::index::AppointmentIndex;
use crate::layout::{GridDensity, LayoutEngine};

pub const MONTH_GRID_CELLS: usize = 42;
pub const DEFAULT_CREATE_TIME: &str = "09:00";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Month,
    Week,
    Day,
    Agenda,
}

impl ViewMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ViewMode::Month => "month",
            ViewMode::Week => "week",
            ViewMode::Day => "day",
            ViewMode::Agenda => "agenda",
        }
    }

    /// Anchor after one navigation step in `direction` (+1 next, -1 previous).
    pub fn step(self, anchor: NaiveDate, direction: i32) -> NaiveDate {
        match self {
            ViewMode::Month | ViewMode::Agenda => shift_month(anchor, direction),
            ViewMode::Week => add_days(anchor, 7 * i64::from(direction)),
            ViewMode::Day => add_days(anchor, i64::from(direction)),
        }
    }

    pub fn render(
        self,
        anchor: NaiveDate,
        today: NaiveDate,
        index: &AppointmentIndex<'_>,
        layout: &LayoutEngine,
    ) -> RenderModel {
        match self {
            ViewMode::Month => RenderModel::Month(render_month(anchor, today, index)),
            ViewMode::Week => RenderModel::Week(render_week(anchor, today, index, layout)),
            ViewMode::Day => RenderModel::Day(render_day(anchor, today, index, layout)),
            ViewMode::Agenda => RenderModel::Agenda(render_agenda(index)),
        }
    }
}

impl Display for ViewMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a click lands on in any view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    EmptySlot { date: NaiveDate, time: Option<String> },
    Appointment { id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum RenderModel {
    Month(MonthGrid),
    Week(WeekGrid),
    Day(DayGrid),
    Agenda(AgendaList),
}

impl RenderModel {
    pub fn mode(&self) -> ViewMode {
        match self {
            RenderModel::Month(_) => ViewMode::Month,
            RenderModel::Week(_) => ViewMode::Week,
            RenderModel::Day(_) => ViewMode::Day,
            RenderModel::Agenda(_) => ViewMode::Agenda,
        }
    }

    /// Appointment ids in render order.
    pub fn appointment_ids(&self) -> Vec<&str> {
        match self {
            RenderModel::Month(grid) => grid
                .cells
                .iter()
                .flat_map(|cell| cell.items())
                .map(|item| item.id.as_str())
                .collect(),
            RenderModel::Week(grid) => grid
                .columns
                .iter()
                .flat_map(|column| column.blocks.iter())
                .map(|block| block.id.as_str())
                .collect(),
            RenderModel::Day(grid) => grid
                .column
                .blocks
                .iter()
                .map(|block| block.id.as_str())
                .collect(),
            RenderModel::Agenda(AgendaList::Empty) => Vec::new(),
            RenderModel::Agenda(AgendaList::Groups(groups)) => groups
                .iter()
                .flat_map(|group| group.items.iter())
                .map(|item| item.id.as_str())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthItem {
    pub id: String,
    pub time: String,
    pub title: String,
    pub kind: AppointmentType,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonthCell {
    Padding,
    Day {
        date: NaiveDate,
        is_today: bool,
        items: Vec<MonthItem>,
    },
}

impl MonthCell {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            MonthCell::Padding => None,
            MonthCell::Day { date, .. } => Some(*date),
        }
    }

    pub fn items(&self) -> &[MonthItem] {
        match self {
            MonthCell::Padding => &[],
            MonthCell::Day { items, .. } => items,
        }
    }

    pub fn click(&self) -> Option<ClickTarget> {
        self.date().map(|date| ClickTarget::EmptySlot { date, time: None })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthGrid {
    pub year: i32,
    pub month: u32,
    pub cells: Vec<MonthCell>,
}

impl MonthGrid {
    pub fn cell_for(&self, date: NaiveDate) -> Option<&MonthCell> {
        self.cells.iter().find(|cell| cell.date() == Some(date))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[MonthCell]> {
        self.cells.chunks(7)
    }
}

/// An absolutely positioned appointment block in a time grid.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeBlock {
    pub id: String,
    pub title: String,
    pub time: String,
    pub end_time: Option<String>,
    pub kind: AppointmentType,
    pub top: f32,
    pub height: f32,
    pub description: Option<String>,
    pub has_meet_link: bool,
}

impl TimeBlock {
    pub fn bottom(&self) -> f32 {
        self.top + self.height
    }

    pub fn covers(&self, offset: f32) -> bool {
        offset >= self.top && offset < self.bottom()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimeColumn {
    pub date: NaiveDate,
    pub is_today: bool,
    pub blocks: Vec<TimeBlock>,
}

impl TimeColumn {
    /// Later blocks are drawn over earlier ones, so the topmost hit is the last match.
    pub fn click(&self, offset: f32, layout: &LayoutEngine) -> ClickTarget {
        match self.blocks.iter().rev().find(|block| block.covers(offset)) {
            Some(block) => ClickTarget::Appointment {
                id: block.id.clone(),
            },
            None => ClickTarget::EmptySlot {
                date: self.date,
                time: Some(crate::datemath::hour_label(layout.hour_at(offset))),
            },
        }
    }

    pub fn blocks_in_hour(&self, hour: u32, layout: &LayoutEngine) -> Vec<&TimeBlock> {
        let start = hour as f32 * layout.cell_height();
        let end = start + layout.cell_height();
        self.blocks
            .iter()
            .filter(|block| block.top < end && block.bottom() > start)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekGrid {
    pub week_start: NaiveDate,
    pub columns: Vec<TimeColumn>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayGrid {
    pub column: TimeColumn,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaItem {
    pub id: String,
    pub title: String,
    pub time_range: String,
    pub kind: AppointmentType,
    pub location: Option<String>,
    pub has_meet_link: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgendaGroup {
    pub date: NaiveDate,
    pub items: Vec<AgendaItem>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgendaList {
    Empty,
    Groups(Vec<AgendaGroup>),
}

pub fn render_month(anchor: NaiveDate, today: NaiveDate, index: &AppointmentIndex<'_>) -> MonthGrid {
    let year = anchor.year();
    let month = anchor.month();
    let leading = first_weekday_of_month(year, month) as usize;
    let total_days = days_in_month(year, month);

    let mut cells = Vec::with_capacity(MONTH_GRID_CELLS);
    cells.extend((0..leading).map(|_| MonthCell::Padding));
    for day in 1..=total_days {
        let Some(date) = NaiveDate::from_ymd_opt(year, month, day) else {
            continue;
        };
        let items = index
            .for_date(date)
            .into_iter()
            .map(|appointment| MonthItem {
                id: appointment.id.clone(),
                time: appointment.time.clone(),
                title: appointment.display_title().to_string(),
                kind: appointment.kind,
            })
            .collect();
        cells.push(MonthCell::Day {
            date,
            is_today: date == today,
            items,
        });
    }
    cells.resize(MONTH_GRID_CELLS, MonthCell::Padding);

    MonthGrid { year, month, cells }
}

pub fn render_week(
    anchor: NaiveDate,
    today: NaiveDate,
    index: &AppointmentIndex<'_>,
    layout: &LayoutEngine,
) -> WeekGrid {
    let week_start = start_of_week(anchor);
    let columns = index
        .for_range(week_start, add_days(week_start, 6))
        .into_iter()
        .map(|(date, appointments)| TimeColumn {
            date,
            is_today: date == today,
            blocks: appointments
                .into_iter()
                .map(|appointment| time_block(appointment, layout, GridDensity::Week))
                .collect(),
        })
        .collect();

    WeekGrid {
        week_start,
        columns,
    }
}

pub fn render_day(
    anchor: NaiveDate,
    today: NaiveDate,
    index: &AppointmentIndex<'_>,
    layout: &LayoutEngine,
) -> DayGrid {
    let blocks = index
        .for_date(anchor)
        .into_iter()
        .map(|appointment| time_block(appointment, layout, GridDensity::Day))
        .collect();

    DayGrid {
        column: TimeColumn {
            date: anchor,
            is_today: anchor == today,
            blocks,
        },
    }
}

pub fn render_agenda(index: &AppointmentIndex<'_>) -> AgendaList {
    let groups = index
        .agenda_ordered()
        .into_iter()
        .map(|(date, appointments)| AgendaGroup {
            date,
            items: appointments
                .into_iter()
                .map(|appointment| AgendaItem {
                    id: appointment.id.clone(),
                    title: appointment.display_title().to_string(),
                    time_range: appointment.time_range(),
                    kind: appointment.kind,
                    location: appointment.location.clone(),
                    has_meet_link: appointment.has_meet_link(),
                })
                .collect(),
        })
        .collect::<Vec<_>>();

    if groups.is_empty() {
        AgendaList::Empty
    } else {
        AgendaList::Groups(groups)
    }
}

fn time_block(appointment: &Appointment, layout: &LayoutEngine, density: GridDensity) -> TimeBlock {
    let description = match density {
        GridDensity::Day if !appointment.description.trim().is_empty() => {
            Some(appointment.description.clone())
        }
        _ => None,
    };

    TimeBlock {
        id: appointment.id.clone(),
        title: appointment.display_title().to_string(),
        time: appointment.time.clone(),
        end_time: appointment.end_time.clone(),
        kind: appointment.kind,
        top: layout.top_offset(&appointment.time),
        height: layout.height(&appointment.time, appointment.end_time.as_deref(), density),
        description,
        has_meet_link: appointment.has_meet_link(),
    }
}
