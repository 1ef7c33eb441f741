use chrono::{Datelike, Local, NaiveDate};
use tracing::debug;

use crate::datemath::{add_days, start_of_week};
use crate::views::ViewMode;

/// Anchor date plus active view mode. Every transition is total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavigationController {
    anchor: NaiveDate,
    mode: ViewMode,
}

impl NavigationController {
    pub fn new(anchor: NaiveDate, mode: ViewMode) -> Self {
        Self { anchor, mode }
    }

    pub fn anchor(&self) -> NaiveDate {
        self.anchor
    }

    pub fn mode(&self) -> ViewMode {
        self.mode
    }

    pub fn go_to_today(&mut self) {
        self.go_to(Local::now().date_naive());
    }

    pub fn go_to(&mut self, date: NaiveDate) {
        self.anchor = date;
        debug!(anchor = %self.anchor, "anchor moved");
    }

    pub fn go_prev(&mut self) {
        self.go_to(self.mode.step(self.anchor, -1));
    }

    pub fn go_next(&mut self) {
        self.go_to(self.mode.step(self.anchor, 1));
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.mode = mode;
        debug!(mode = %mode, "view mode changed");
    }

    pub fn title(&self) -> String {
        match self.mode {
            ViewMode::Agenda => "Agenda".to_string(),
            ViewMode::Month | ViewMode::Day => month_title(self.anchor),
            ViewMode::Week => {
                let week_start = start_of_week(self.anchor);
                let week_end = add_days(week_start, 6);
                if week_start.month() == week_end.month() {
                    month_title(week_start)
                } else if week_start.year() == week_end.year() {
                    format!(
                        "{} - {} {}",
                        week_start.format("%b"),
                        week_end.format("%b"),
                        week_end.year()
                    )
                } else {
                    format!("{} - {}", week_start.format("%b %Y"), week_end.format("%b %Y"))
                }
            }
        }
    }
}

fn month_title(date: NaiveDate) -> String {
    date.format("%B %Y").to_string()
}

#[cfg(test)]
mod tests {
    use chrono::{Local, NaiveDate};

    use crate::views::ViewMode;

    use super::NavigationController;

    fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    #[test]
    fn steps_depend_on_mode() {
        let mut nav = NavigationController::new(date(2024, 3, 5), ViewMode::Month);
        nav.go_next();
        assert_eq!(nav.anchor(), date(2024, 4, 5));

        nav.set_view_mode(ViewMode::Week);
        assert_eq!(nav.anchor(), date(2024, 4, 5));
        nav.go_prev();
        assert_eq!(nav.anchor(), date(2024, 3, 29));

        nav.set_view_mode(ViewMode::Day);
        nav.go_next();
        assert_eq!(nav.anchor(), date(2024, 3, 30));

        nav.set_view_mode(ViewMode::Agenda);
        nav.go_prev();
        assert_eq!(nav.anchor(), date(2024, 2, 29));
    }

    #[test]
    fn today_resets_anchor_only() {
        let mut nav = NavigationController::new(date(2001, 1, 1), ViewMode::Week);
        nav.go_to_today();
        assert_eq!(nav.anchor(), Local::now().date_naive());
        assert_eq!(nav.mode(), ViewMode::Week);
    }

    #[test]
    fn titles_per_mode() {
        let mut nav = NavigationController::new(date(2024, 3, 5), ViewMode::Month);
        assert_eq!(nav.title(), "March 2024");
        nav.set_view_mode(ViewMode::Agenda);
        assert_eq!(nav.title(), "Agenda");
        nav.set_view_mode(ViewMode::Week);
        nav.go_to(date(2024, 3, 1));
        assert_eq!(nav.title(), "Feb - Mar 2024");
        nav.go_to(date(2024, 12, 31));
        assert_eq!(nav.title(), "Dec 2024 - Jan 2025");
    }
}
