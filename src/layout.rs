use crate::datemath::minutes_of_day;

pub const DEFAULT_CELL_HEIGHT: f32 = 60.0;
pub const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Grid the block is placed in; each has its own minimum visible height.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridDensity {
    Week,
    Day,
}

impl GridDensity {
    pub fn min_height(self) -> f32 {
        match self {
            GridDensity::Week => 20.0,
            GridDensity::Day => 40.0,
        }
    }
}

/// Converts wall-clock times into vertical pixel geometry for the week and day grids.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutEngine {
    cell_height: f32,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_HEIGHT)
    }
}

impl LayoutEngine {
    pub fn new(cell_height: f32) -> Self {
        let cell_height = if cell_height.is_finite() && cell_height > 0.0 {
            cell_height
        } else {
            DEFAULT_CELL_HEIGHT
        };
        Self { cell_height }
    }

    pub fn cell_height(&self) -> f32 {
        self.cell_height
    }

    /// Full 24 hour column height.
    pub fn column_height(&self) -> f32 {
        24.0 * self.cell_height
    }

    /// Unparseable times are placed at midnight.
    pub fn top_offset(&self, time: &str) -> f32 {
        let minutes = minutes_of_day(time).unwrap_or(0);
        let hour = (minutes / 60) as f32;
        let minute = (minutes % 60) as f32;
        hour * self.cell_height + (minute / 60.0) * self.cell_height
    }

    pub fn height(&self, time: &str, end_time: Option<&str>, density: GridDensity) -> f32 {
        let duration = duration_minutes(time, end_time) as f32;
        (duration / 60.0 * self.cell_height).max(density.min_height())
    }

    /// Hour slot under a vertical pixel offset, clamped to the day.
    pub fn hour_at(&self, offset: f32) -> u32 {
        if !offset.is_finite() || offset <= 0.0 {
            return 0;
        }
        ((offset / self.cell_height) as u32).min(23)
    }
}

/// Minutes between start and end, or the one hour default when the end is missing,
/// unparseable, or not after the start. The stored record is never corrected.
pub fn duration_minutes(time: &str, end_time: Option<&str>) -> u32 {
    let start = minutes_of_day(time);
    let end = end_time.and_then(minutes_of_day);
    match (start, end) {
        (Some(start), Some(end)) if end > start => end - start,
        _ => DEFAULT_DURATION_MINUTES,
    }
}
