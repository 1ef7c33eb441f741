use std::collections::HashSet;
use std::error::Error;
use std::io;
use std::time::Duration as StdDuration;

use chrono::{Datelike, Local, NaiveDate};
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, ExecutableCommand};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph};
use ratatui::{Frame, Terminal};
use tracing::{error, info};

use crate::config::Settings;
use crate::datemath::{
    add_days, date_key, days_in_month, first_day_of_month, first_weekday_of_month, hour_label, parse_date_key,
};
use crate::domain::{AppointmentType, Calendar};
use crate::editor::{EditorDraft, EventEditor};
use crate::index::{AppointmentIndex, FilterState};
use crate::layout::LayoutEngine;
use crate::navigation::NavigationController;
use crate::storage::AppointmentStore;
use crate::views::{AgendaList, ClickTarget, MonthCell, RenderModel, TimeBlock, TimeColumn, ViewMode};

const FOCUSED_PANEL_BORDER_COLOR: Color = Color::Yellow;
const INACTIVE_PANEL_BORDER_COLOR: Color = Color::DarkGray;
const HIGHLIGHT_BACKGROUND_COLOR: Color = Color::Rgb(42, 45, 52);
const TIME_AXIS_WIDTH: u16 = 6;
const WEEKDAY_HEADERS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

pub fn run_dashboard(
    calendar: &mut Calendar,
    store: &mut impl AppointmentStore,
    settings: &Settings,
) -> Result<(), Box<dyn Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_event_loop(&mut terminal, calendar, store, settings);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    calendar: &mut Calendar,
    store: &mut impl AppointmentStore,
    settings: &Settings,
) -> Result<(), Box<dyn Error>> {
    let mut app = App::new(settings);
    let layout = app.layout;

    loop {
        let today = Local::now().date_naive();
        let view = build_view(&app, calendar, &layout, today);
        app.clamp_selection(&view);
        terminal.draw(|frame| draw_dashboard(frame, &app, calendar, &view, &layout, today))?;

        if event::poll(StdDuration::from_millis(250))? {
            if let CEvent::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }

                let should_quit = if app.editor.is_open() {
                    handle_editor_key(&mut app, key.code, calendar, store);
                    false
                } else {
                    handle_normal_key(&mut app, key.code, calendar, &view, today)
                };

                if should_quit {
                    break;
                }
            }
        }
    }

    Ok(())
}

fn draw_dashboard(
    frame: &mut Frame,
    app: &App,
    calendar: &Calendar,
    view: &ViewModel,
    layout: &LayoutEngine,
    today: NaiveDate,
) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(12), Constraint::Length(4)])
        .split(frame.area());

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(24), Constraint::Min(40)])
        .split(rows[1]);

    let sidebar = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(10), Constraint::Min(6)])
        .split(body[0]);

    render_header(frame, rows[0], app, view.visible_count);
    render_mini_calendar(frame, sidebar[0], app, &view.active_days, today);
    render_filters(frame, sidebar[1], app);
    match &view.model {
        RenderModel::Month(_) => render_month_panel(frame, body[1], app, view),
        RenderModel::Week(grid) => render_time_grid(frame, body[1], app, view, &grid.columns, layout, false),
        RenderModel::Day(grid) => {
            render_time_grid(frame, body[1], app, view, std::slice::from_ref(&grid.column), layout, true)
        }
        RenderModel::Agenda(list) => render_agenda_panel(frame, body[1], app, list),
    }
    render_footer(frame, rows[2], app);

    if let Some(draft) = app.editor.draft() {
        render_editor_popup(frame, app, draft, calendar);
    }
}

fn render_header(frame: &mut Frame, area: Rect, app: &App, visible_count: usize) {
    let modes = [ViewMode::Month, ViewMode::Week, ViewMode::Day, ViewMode::Agenda]
        .into_iter()
        .flat_map(|mode| {
            let style = if mode == app.nav.mode() {
                Style::default().fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(Color::Gray)
            };
            [Span::styled(format!(" {} ", mode.as_str()), style), Span::raw(" ")]
        })
        .collect::<Vec<_>>();

    let mut spans = vec![
        Span::styled(app.nav.title(), Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("   "),
    ];
    spans.extend(modes);
    spans.push(Span::styled(
        format!("  {visible_count} appointments"),
        Style::default().fg(Color::DarkGray),
    ));

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL).title("Calendar"));
    frame.render_widget(header, area);
}

fn render_mini_calendar(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    active_days: &HashSet<NaiveDate>,
    today: NaiveDate,
) {
    let anchor = app.nav.anchor();
    let month = first_day_of_month(anchor);
    let mut lines = Vec::new();
    lines.push(Line::from(month.format("%B %Y").to_string()));
    lines.push(Line::from("Su Mo Tu We Th Fr Sa"));

    let leading = first_weekday_of_month(month.year(), month.month()) as usize;
    let total = days_in_month(month.year(), month.month());
    let mut day_counter = 1u32;
    for week in 0..6 {
        let mut spans = Vec::new();
        for weekday_index in 0..7 {
            let before_first = week == 0 && weekday_index < leading;
            if before_first || day_counter > total {
                spans.push(Span::raw("   "));
                continue;
            }

            let Some(date) = NaiveDate::from_ymd_opt(month.year(), month.month(), day_counter) else {
                break;
            };
            let mut style = Style::default();
            if date == anchor {
                style = style.fg(Color::Black).bg(Color::Yellow).add_modifier(Modifier::BOLD);
            } else if date == today {
                style = style.fg(Color::LightCyan).add_modifier(Modifier::BOLD);
            } else if active_days.contains(&date) {
                style = style.fg(Color::LightYellow).add_modifier(Modifier::BOLD);
            }

            spans.push(Span::styled(format!("{:>2} ", day_counter), style));
            day_counter += 1;
        }
        lines.push(Line::from(spans));
    }

    let calendar = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Month"));
    frame.render_widget(calendar, area);
}

fn render_filters(frame: &mut Frame, area: Rect, app: &App) {
    let mut lines = Vec::new();
    for (index, kind) in AppointmentType::ALL.into_iter().enumerate() {
        let checked = if app.filter.is_visible(kind) { "x" } else { " " };
        lines.push(Line::from(vec![
            Span::raw(format!("{} [{checked}] ", index + 1)),
            Span::styled(kind.label(), kind_style(kind)),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled("n  new for today", Style::default().fg(Color::DarkGray))));

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("My calendars"));
    frame.render_widget(panel, area);
}

fn render_month_panel(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel) {
    let RenderModel::Month(grid) = &view.model else {
        return;
    };

    let outer = Block::default()
        .borders(Borders::ALL)
        .title("Month")
        .border_style(border_style(false));
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Ratio(1, 6),
            Constraint::Ratio(1, 6),
            Constraint::Ratio(1, 6),
            Constraint::Ratio(1, 6),
            Constraint::Ratio(1, 6),
            Constraint::Ratio(1, 6),
        ])
        .split(inner);

    let header_cells = week_columns(rows[0]);
    for (index, name) in WEEKDAY_HEADERS.iter().enumerate() {
        frame.render_widget(
            Paragraph::new(Span::styled(*name, Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD))),
            header_cells[index],
        );
    }

    for (row_index, week) in grid.rows().enumerate() {
        let cells = week_columns(rows[row_index + 1]);
        for (column_index, cell) in week.iter().enumerate() {
            render_month_cell(frame, cells[column_index], app, view, cell);
        }
    }
}

fn render_month_cell(frame: &mut Frame, area: Rect, app: &App, view: &ViewModel, cell: &MonthCell) {
    let MonthCell::Day { date, is_today, items } = cell else {
        let padding = Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Black));
        frame.render_widget(padding, area);
        return;
    };

    let is_cursor = *date == app.nav.anchor();
    let title_style = if *is_today {
        Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };
    let focused_id = app.focused_id(view);
    let width = area.width.saturating_sub(2) as usize;
    let lines = items
        .iter()
        .map(|item| {
            let mut style = kind_style(item.kind);
            if is_cursor && focused_id == Some(item.id.as_str()) {
                style = style.bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD);
            }
            Line::from(Span::styled(fit(&format!("{} {}", item.time, item.title), width), style))
        })
        .collect::<Vec<_>>();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(Span::styled(format!("{}", date.day()), title_style))
        .border_style(border_style(is_cursor));
    frame.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_time_grid(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    view: &ViewModel,
    columns: &[TimeColumn],
    layout: &LayoutEngine,
    detailed: bool,
) {
    let title = if detailed { "Day" } else { "Week" };
    let outer = Block::default().borders(Borders::ALL).title(title);
    let inner = outer.inner(area);
    frame.render_widget(outer, area);

    let mut constraints = vec![Constraint::Length(TIME_AXIS_WIDTH)];
    constraints.extend(columns.iter().map(|_| Constraint::Ratio(1, columns.len() as u32)));
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(inner);

    let body_rows = inner.height.saturating_sub(1);
    let rows_per_hour = app.rows_per_hour.max(1);
    let first_hour = first_visible_hour(app.cursor_hour, body_rows, rows_per_hour);

    let mut axis = vec![Line::from("")];
    for row in 0..body_rows {
        let hour = first_hour + u32::from(row / rows_per_hour);
        if hour > 23 {
            break;
        }
        if row % rows_per_hour == 0 {
            axis.push(Line::from(Span::styled(hour_label(hour), Style::default().fg(Color::DarkGray))));
        } else {
            axis.push(Line::from(""));
        }
    }
    frame.render_widget(Paragraph::new(axis), parts[0]);

    let focused_id = app.focused_id(view);
    for (index, column) in columns.iter().enumerate() {
        let area = parts[index + 1];
        let is_cursor_day = column.date == app.nav.anchor();
        let header_style = if column.is_today {
            Style::default().fg(Color::LightCyan).add_modifier(Modifier::BOLD)
        } else if is_cursor_day {
            Style::default().fg(FOCUSED_PANEL_BORDER_COLOR).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };

        let mut lines = vec![Line::from(Span::styled(
            fit(&column.date.format("%a %d").to_string(), area.width as usize),
            header_style,
        ))];
        let grid = GridPaint {
            layout,
            first_hour,
            rows: body_rows,
            rows_per_hour,
            width: area.width.saturating_sub(1) as usize,
            cursor_hour: is_cursor_day.then_some(app.cursor_hour),
            focused_id: if is_cursor_day { focused_id } else { None },
            detailed,
        };
        lines.extend(grid.column_lines(column));
        frame.render_widget(Paragraph::new(lines), area);
    }
}

/// Rasterises absolutely positioned blocks into terminal rows.
struct GridPaint<'a> {
    layout: &'a LayoutEngine,
    first_hour: u32,
    rows: u16,
    rows_per_hour: u16,
    width: usize,
    cursor_hour: Option<u32>,
    focused_id: Option<&'a str>,
    detailed: bool,
}

impl GridPaint<'_> {
    fn row_span(&self, row: u16) -> (f32, f32) {
        let row_height = self.layout.cell_height() / f32::from(self.rows_per_hour);
        let start = self.first_hour as f32 * self.layout.cell_height() + f32::from(row) * row_height;
        (start, start + row_height)
    }

    fn column_lines(&self, column: &TimeColumn) -> Vec<Line<'static>> {
        let mut lines = Vec::new();
        for row in 0..self.rows {
            let (start, end) = self.row_span(row);
            if start >= self.layout.column_height() {
                break;
            }
            let hour = self.layout.hour_at(start);

            // later blocks paint over earlier ones
            let block = column
                .blocks
                .iter()
                .rev()
                .find(|block| block.top < end && block.bottom() > start);

            let line = match block {
                Some(block) => {
                    let visible_top = block.top.max(self.row_span(0).0);
                    let line_index = ((start - visible_top) / (end - start)).max(0.0).floor() as usize;
                    let text = self.block_text(block, line_index);
                    let mut style = kind_style(block.kind).add_modifier(Modifier::REVERSED);
                    if self.focused_id == Some(block.id.as_str()) {
                        style = style.add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
                    }
                    Line::from(Span::styled(fit(&text, self.width), style))
                }
                None => {
                    let marker = if row % self.rows_per_hour == 0 { "·" } else { " " };
                    let mut style = Style::default().fg(Color::DarkGray);
                    if self.cursor_hour == Some(hour) {
                        style = style.bg(HIGHLIGHT_BACKGROUND_COLOR);
                    }
                    Line::from(Span::styled(fit(marker, self.width), style))
                }
            };
            lines.push(line);
        }
        lines
    }

    fn block_text(&self, block: &TimeBlock, line_index: usize) -> String {
        let range = match &block.end_time {
            Some(end_time) => format!("{} - {}", block.time, end_time),
            None => block.time.clone(),
        };
        match line_index {
            0 if self.detailed && block.has_meet_link => format!("{} [video]", block.title),
            0 => block.title.clone(),
            1 => range,
            2 if self.detailed => block.description.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }
}

fn render_agenda_panel(frame: &mut Frame, area: Rect, app: &App, list: &AgendaList) {
    let block = Block::default().borders(Borders::ALL).title("Agenda");
    let groups = match list {
        AgendaList::Empty => {
            let empty = Paragraph::new(vec![
                Line::from(""),
                Line::from(Span::styled("No events scheduled", Style::default().add_modifier(Modifier::BOLD))),
                Line::from("Press c to create one."),
            ])
            .block(block);
            frame.render_widget(empty, area);
            return;
        }
        AgendaList::Groups(groups) => groups,
    };

    let mut items = Vec::new();
    let mut selected_row = None;
    let mut item_index = 0usize;
    for group in groups {
        items.push(ListItem::new(Line::from(Span::styled(
            group.date.format("%a, %d %B %Y").to_string(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::BOLD),
        ))));
        for item in &group.items {
            if item_index == app.agenda_index {
                selected_row = Some(items.len());
            }
            let mut spans = vec![
                Span::raw(format!("  {:<13} ", item.time_range)),
                Span::styled("▌", kind_style(item.kind)),
                Span::styled(format!(" {}", item.title), Style::default().add_modifier(Modifier::BOLD)),
            ];
            if item.has_meet_link {
                spans.push(Span::styled(" [video]", Style::default().fg(Color::LightBlue)));
            }
            if let Some(location) = &item.location {
                spans.push(Span::raw(format!(" @ {location}")));
            }
            items.push(ListItem::new(Line::from(spans)));
            item_index += 1;
        }
    }

    let mut state = ListState::default();
    state.select(selected_row);
    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_footer(frame: &mut Frame, area: Rect, app: &App) {
    let footer_lines = if app.editor.is_open() {
        vec![
            Line::from("Tab/arrows field | type to edit | Left/Right type or suggestion | Enter save | Esc cancel"),
            Line::from("meet link: Enter generate, Del clear | guests: Enter add, Backspace on empty removes last"),
            Line::from(app.status.clone()),
        ]
    } else {
        vec![
            Line::from("[ ] prev/next | t today | m/w/d/a view | 1/2/3 filters | arrows/hjkl move | q quit"),
            Line::from("Tab focus appointment | Enter open | c create at cursor | n create today"),
            Line::from(app.status.clone()),
        ]
    };

    let footer = Paragraph::new(footer_lines).block(Block::default().borders(Borders::ALL).title("Shortcuts"));
    frame.render_widget(footer, area);
}

fn render_editor_popup(frame: &mut Frame, app: &App, draft: &EditorDraft, calendar: &Calendar) {
    let area = centered_rect(64, 70, frame.area());
    frame.render_widget(Clear, area);

    let field_line = |field: EditorField, value: Line<'static>| -> Line<'static> {
        let focused = field == app.editor_field;
        let label_style = if focused {
            Style::default().fg(FOCUSED_PANEL_BORDER_COLOR).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(Color::Gray)
        };
        let mut spans = vec![Span::styled(format!("{:<12}", field.label()), label_style)];
        spans.extend(value.spans);
        if focused && field.is_text() {
            spans.push(Span::styled("_", Style::default().fg(FOCUSED_PANEL_BORDER_COLOR)));
        }
        Line::from(spans)
    };

    let kinds = AppointmentType::ALL
        .into_iter()
        .map(|kind| {
            let style = if kind == draft.kind {
                kind_style(kind).add_modifier(Modifier::REVERSED | Modifier::BOLD)
            } else {
                kind_style(kind)
            };
            Span::styled(format!(" {} ", kind.label()), style)
        })
        .collect::<Vec<_>>();

    let meet_link = if draft.meet_link.is_empty() && app.editor_field != EditorField::MeetLink {
        Line::from(Span::styled("(none, Enter to add a video call)", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(draft.meet_link.clone())
    };

    let mut lines = vec![
        field_line(EditorField::Title, Line::from(draft.title.clone())),
        field_line(EditorField::Type, Line::from(kinds)),
        field_line(EditorField::Date, Line::from(app.date_input.clone())),
        field_line(EditorField::Start, Line::from(draft.time.clone())),
        field_line(EditorField::End, Line::from(draft.end_time.clone())),
        field_line(EditorField::Location, Line::from(draft.location.clone())),
        field_line(EditorField::MeetLink, meet_link),
        field_line(EditorField::Description, Line::from(draft.description.clone())),
        field_line(EditorField::Guests, Line::from(draft.guest_query.clone())),
    ];

    if !draft.guests.is_empty() {
        let chips = draft
            .guests
            .iter()
            .flat_map(|id| {
                let (initial, name) = calendar.guest_label(id);
                [
                    Span::styled(format!("({initial})"), Style::default().fg(Color::Black).bg(Color::Gray)),
                    Span::raw(format!(" {name}  ")),
                ]
            })
            .collect::<Vec<_>>();
        let mut spans = vec![Span::raw(" ".repeat(12))];
        spans.extend(chips);
        lines.push(Line::from(spans));
    }

    if app.editor_field == EditorField::Guests && !draft.guest_query.trim().is_empty() {
        let suggestions = draft.guest_suggestions(&calendar.contacts);
        if suggestions.is_empty() {
            lines.push(Line::from(Span::styled(
                "            no matching contacts",
                Style::default().fg(Color::DarkGray),
            )));
        }
        for (index, contact) in suggestions.iter().enumerate() {
            let style = if index == app.suggestion_index {
                Style::default().bg(HIGHLIGHT_BACKGROUND_COLOR).add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            lines.push(Line::from(Span::styled(
                format!("            {} <{}>", contact.name, contact.email),
                style,
            )));
        }
    }

    let title = if draft.is_edit() { "Edit appointment" } else { "New appointment" };
    let popup = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(title)
            .border_style(border_style(true)),
    );
    frame.render_widget(popup, area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn week_columns(area: Rect) -> Vec<Rect> {
    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 7); 7])
        .split(area)
        .to_vec()
}

fn handle_normal_key(app: &mut App, code: KeyCode, calendar: &Calendar, view: &ViewModel, today: NaiveDate) -> bool {
    match code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('t') => {
            app.nav.go_to_today();
            app.reset_focus();
        }
        KeyCode::Char('[') | KeyCode::PageUp => {
            app.nav.go_prev();
            app.reset_focus();
        }
        KeyCode::Char(']') | KeyCode::PageDown => {
            app.nav.go_next();
            app.reset_focus();
        }
        KeyCode::Char('m') => app.set_mode(ViewMode::Month),
        KeyCode::Char('w') => app.set_mode(ViewMode::Week),
        KeyCode::Char('d') => app.set_mode(ViewMode::Day),
        KeyCode::Char('a') => app.set_mode(ViewMode::Agenda),
        KeyCode::Char(digit @ '1'..='3') => {
            let index = digit as usize - '1' as usize;
            let kind = AppointmentType::ALL[index];
            app.filter.toggle(kind);
            app.reset_focus();
            app.status = format!(
                "{} {}",
                kind.label(),
                if app.filter.is_visible(kind) { "shown" } else { "hidden" }
            );
        }
        KeyCode::Left | KeyCode::Char('h') => app.move_cursor(CursorMove::Left),
        KeyCode::Right | KeyCode::Char('l') => app.move_cursor(CursorMove::Right),
        KeyCode::Up | KeyCode::Char('k') => app.move_cursor(CursorMove::Up),
        KeyCode::Down | KeyCode::Char('j') => app.move_cursor(CursorMove::Down),
        KeyCode::Tab => app.cycle_focus(view),
        KeyCode::Enter => {
            let target = match app.focused_id(view) {
                Some(id) => ClickTarget::Appointment { id: id.to_string() },
                None => app.click_at_cursor(view),
            };
            app.open_target(target, calendar);
        }
        KeyCode::Char('c') => {
            let target = app.cursor_slot();
            app.open_target(target, calendar);
        }
        KeyCode::Char('n') => app.open_target(ClickTarget::EmptySlot { date: today, time: None }, calendar),
        _ => {}
    }

    false
}

fn handle_editor_key(app: &mut App, code: KeyCode, calendar: &mut Calendar, store: &mut impl AppointmentStore) {
    let field = app.editor_field;
    match code {
        KeyCode::Esc => {
            app.editor.cancel();
            app.status = "Edit cancelled".to_string();
        }
        KeyCode::Tab | KeyCode::Down => app.change_field(field.next()),
        KeyCode::BackTab | KeyCode::Up => app.change_field(field.prev()),
        KeyCode::Left | KeyCode::Right => {
            let forward = code == KeyCode::Right;
            match field {
                EditorField::Type => {
                    if let Some(draft) = app.editor.draft_mut() {
                        draft.kind = if forward { draft.kind.next() } else { draft.kind.prev() };
                    }
                }
                EditorField::Guests => {
                    app.suggestion_index = if forward {
                        app.suggestion_index.saturating_add(1)
                    } else {
                        app.suggestion_index.saturating_sub(1)
                    };
                }
                _ => {}
            }
        }
        KeyCode::Delete => {
            if field == EditorField::MeetLink {
                if let Some(draft) = app.editor.draft_mut() {
                    draft.clear_meet_link();
                }
            }
        }
        KeyCode::Backspace => match field {
            EditorField::Date => {
                app.date_input.pop();
            }
            EditorField::Guests => {
                if let Some(draft) = app.editor.draft_mut() {
                    if draft.guest_query.is_empty() {
                        if let Some(last) = draft.guests.last().cloned() {
                            draft.remove_guest(&last);
                        }
                    } else {
                        draft.guest_query.pop();
                    }
                }
                app.suggestion_index = 0;
            }
            _ => {
                if let Some(text) = app.editor.draft_mut().and_then(|draft| field.text_mut(draft)) {
                    text.pop();
                }
            }
        },
        KeyCode::Char(value) => match field {
            EditorField::Type => {}
            EditorField::Date => app.date_input.push(value),
            _ => {
                if let Some(text) = app.editor.draft_mut().and_then(|draft| field.text_mut(draft)) {
                    text.push(value);
                }
                if field == EditorField::Guests {
                    app.suggestion_index = 0;
                }
            }
        },
        KeyCode::Enter => match field {
            EditorField::MeetLink if app.editor.draft().is_some_and(|draft| draft.meet_link.is_empty()) => {
                if let Some(draft) = app.editor.draft_mut() {
                    draft.generate_meet_link();
                }
            }
            EditorField::Guests if app.editor.draft().is_some_and(|draft| !draft.guest_query.trim().is_empty()) => {
                app.add_suggested_guest(calendar);
            }
            _ => submit_editor(app, calendar, store),
        },
        _ => {}
    }
}

fn submit_editor(app: &mut App, calendar: &mut Calendar, store: &mut impl AppointmentStore) {
    if !app.commit_date_input() {
        return;
    }

    let Some(appointment) = app.editor.submit(calendar) else {
        return;
    };
    app.nav.go_to(appointment.date);
    app.reset_focus();

    match store.save_appointments(&calendar.appointments) {
        Ok(()) => app.status = format!("saved: {}", appointment.display_title()),
        Err(err) => {
            error!(%err, "failed to persist appointments");
            app.status = format!("error: {err}");
        }
    }
}

fn build_view(app: &App, calendar: &Calendar, layout: &LayoutEngine, today: NaiveDate) -> ViewModel {
    let index = AppointmentIndex::new(&calendar.appointments, &app.filter);
    let anchor = app.nav.anchor();
    let model = app.nav.mode().render(anchor, today, &index, layout);

    let month_start = first_day_of_month(anchor);
    let month_end = add_days(month_start, i64::from(days_in_month(anchor.year(), anchor.month())) - 1);
    let active_days = index
        .for_range(month_start, month_end)
        .into_iter()
        .filter(|(_, appointments)| !appointments.is_empty())
        .map(|(date, _)| date)
        .collect();

    let slot_ids = match &model {
        RenderModel::Month(grid) => grid
            .cell_for(anchor)
            .map(|cell| cell.items().iter().map(|item| item.id.clone()).collect())
            .unwrap_or_default(),
        RenderModel::Week(grid) => grid
            .columns
            .iter()
            .find(|column| column.date == anchor)
            .map(|column| slot_block_ids(column, app.cursor_hour, layout))
            .unwrap_or_default(),
        RenderModel::Day(grid) => slot_block_ids(&grid.column, app.cursor_hour, layout),
        RenderModel::Agenda(_) => model.appointment_ids().into_iter().map(str::to_string).collect(),
    };

    ViewModel {
        visible_count: index.visible_ids().len(),
        model,
        slot_ids,
        active_days,
    }
}

fn slot_block_ids(column: &TimeColumn, hour: u32, layout: &LayoutEngine) -> Vec<String> {
    column
        .blocks_in_hour(hour, layout)
        .into_iter()
        .map(|block| block.id.clone())
        .collect()
}

fn first_visible_hour(cursor_hour: u32, body_rows: u16, rows_per_hour: u16) -> u32 {
    let visible_hours = u32::from(body_rows / rows_per_hour.max(1)).max(1);
    if visible_hours >= 24 {
        return 0;
    }
    cursor_hour
        .saturating_sub(visible_hours / 2)
        .min(24 - visible_hours)
}

fn kind_style(kind: AppointmentType) -> Style {
    let color = match kind {
        AppointmentType::Meeting => Color::Blue,
        AppointmentType::Call => Color::Green,
        AppointmentType::Demo => Color::Magenta,
    };
    Style::default().fg(color)
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default()
            .fg(FOCUSED_PANEL_BORDER_COLOR)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(INACTIVE_PANEL_BORDER_COLOR)
    }
}

fn fit(text: &str, width: usize) -> String {
    let mut out = text.chars().take(width).collect::<String>();
    let len = out.chars().count();
    if len < width {
        out.push_str(&" ".repeat(width - len));
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CursorMove {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorField {
    Title,
    Type,
    Date,
    Start,
    End,
    Location,
    MeetLink,
    Description,
    Guests,
}

impl EditorField {
    const ORDER: [EditorField; 9] = [
        EditorField::Title,
        EditorField::Type,
        EditorField::Date,
        EditorField::Start,
        EditorField::End,
        EditorField::Location,
        EditorField::MeetLink,
        EditorField::Description,
        EditorField::Guests,
    ];

    fn position(self) -> usize {
        Self::ORDER.iter().position(|field| *field == self).unwrap_or(0)
    }

    fn next(self) -> Self {
        Self::ORDER[(self.position() + 1) % Self::ORDER.len()]
    }

    fn prev(self) -> Self {
        Self::ORDER[(self.position() + Self::ORDER.len() - 1) % Self::ORDER.len()]
    }

    fn label(self) -> &'static str {
        match self {
            EditorField::Title => "Title",
            EditorField::Type => "Type",
            EditorField::Date => "Date",
            EditorField::Start => "Start",
            EditorField::End => "End",
            EditorField::Location => "Location",
            EditorField::MeetLink => "Video call",
            EditorField::Description => "Description",
            EditorField::Guests => "Guests",
        }
    }

    fn is_text(self) -> bool {
        self != EditorField::Type
    }

    fn text_mut(self, draft: &mut EditorDraft) -> Option<&mut String> {
        match self {
            EditorField::Title => Some(&mut draft.title),
            EditorField::Start => Some(&mut draft.time),
            EditorField::End => Some(&mut draft.end_time),
            EditorField::Location => Some(&mut draft.location),
            EditorField::MeetLink => Some(&mut draft.meet_link),
            EditorField::Description => Some(&mut draft.description),
            EditorField::Guests => Some(&mut draft.guest_query),
            EditorField::Type | EditorField::Date => None,
        }
    }
}

#[derive(Debug, Clone)]
struct App {
    nav: NavigationController,
    filter: FilterState,
    editor: EventEditor,
    editor_field: EditorField,
    date_input: String,
    suggestion_index: usize,
    cursor_hour: u32,
    focus_index: Option<usize>,
    agenda_index: usize,
    rows_per_hour: u16,
    layout: LayoutEngine,
    status: String,
}

impl App {
    fn new(settings: &Settings) -> Self {
        Self {
            nav: NavigationController::new(Local::now().date_naive(), settings.default_view),
            filter: FilterState::default(),
            editor: EventEditor::default(),
            editor_field: EditorField::Title,
            date_input: String::new(),
            suggestion_index: 0,
            cursor_hour: settings.day_start_hour,
            focus_index: None,
            agenda_index: 0,
            rows_per_hour: settings.rows_per_hour,
            layout: settings.layout(),
            status: "Ready".to_string(),
        }
    }

    fn clamp_selection(&mut self, view: &ViewModel) {
        if let Some(index) = self.focus_index {
            if index >= view.slot_ids.len() {
                self.focus_index = None;
            }
        }
        if view.slot_ids.is_empty() {
            self.agenda_index = 0;
        } else {
            self.agenda_index = self.agenda_index.min(view.slot_ids.len() - 1);
        }
    }

    fn set_mode(&mut self, mode: ViewMode) {
        self.nav.set_view_mode(mode);
        self.reset_focus();
        self.status = format!("{mode} view");
    }

    fn reset_focus(&mut self) {
        self.focus_index = None;
    }

    fn move_cursor(&mut self, direction: CursorMove) {
        let anchor = self.nav.anchor();
        match (self.nav.mode(), direction) {
            (ViewMode::Agenda, CursorMove::Up | CursorMove::Left) => {
                self.agenda_index = self.agenda_index.saturating_sub(1);
            }
            (ViewMode::Agenda, CursorMove::Down | CursorMove::Right) => {
                self.agenda_index = self.agenda_index.saturating_add(1);
            }
            (_, CursorMove::Left) => self.nav.go_to(add_days(anchor, -1)),
            (_, CursorMove::Right) => self.nav.go_to(add_days(anchor, 1)),
            (ViewMode::Month, CursorMove::Up) => self.nav.go_to(add_days(anchor, -7)),
            (ViewMode::Month, CursorMove::Down) => self.nav.go_to(add_days(anchor, 7)),
            (_, CursorMove::Up) => self.cursor_hour = self.cursor_hour.saturating_sub(1),
            (_, CursorMove::Down) => self.cursor_hour = (self.cursor_hour + 1).min(23),
        }
        if self.nav.mode() != ViewMode::Agenda {
            self.reset_focus();
        }
    }

    fn cycle_focus(&mut self, view: &ViewModel) {
        if self.nav.mode() == ViewMode::Agenda {
            return;
        }
        self.focus_index = match self.focus_index {
            None if !view.slot_ids.is_empty() => Some(0),
            Some(index) if index + 1 < view.slot_ids.len() => Some(index + 1),
            _ => None,
        };
    }

    fn focused_id<'v>(&self, view: &'v ViewModel) -> Option<&'v str> {
        let index = if self.nav.mode() == ViewMode::Agenda {
            Some(self.agenda_index)
        } else {
            self.focus_index
        };
        index
            .and_then(|index| view.slot_ids.get(index))
            .map(String::as_str)
    }

    fn cursor_slot(&self) -> ClickTarget {
        let time = match self.nav.mode() {
            ViewMode::Week | ViewMode::Day => Some(hour_label(self.cursor_hour)),
            ViewMode::Month | ViewMode::Agenda => None,
        };
        ClickTarget::EmptySlot {
            date: self.nav.anchor(),
            time,
        }
    }

    /// What a pointer click at the cursor would hit: the topmost block there, else the empty slot.
    fn click_at_cursor(&self, view: &ViewModel) -> ClickTarget {
        let anchor = self.nav.anchor();
        let offset = self.cursor_hour as f32 * self.layout.cell_height();
        let hit = match &view.model {
            RenderModel::Month(grid) => grid.cell_for(anchor).and_then(MonthCell::click),
            RenderModel::Week(grid) => grid
                .columns
                .iter()
                .find(|column| column.date == anchor)
                .map(|column| column.click(offset, &self.layout)),
            RenderModel::Day(grid) => Some(grid.column.click(offset, &self.layout)),
            RenderModel::Agenda(_) => None,
        };
        hit.unwrap_or_else(|| self.cursor_slot())
    }

    fn open_target(&mut self, target: ClickTarget, calendar: &Calendar) {
        match target {
            ClickTarget::EmptySlot { date, time } => self.editor.open_create(date, time.as_deref()),
            ClickTarget::Appointment { id } => match calendar.appointment(&id) {
                Some(appointment) => self.editor.open_edit(appointment),
                None => {
                    self.status = format!("appointment not found: {id}");
                    return;
                }
            },
        }
        self.editor_field = EditorField::Title;
        self.suggestion_index = 0;
        self.date_input = self.editor.draft().map(|draft| date_key(draft.date)).unwrap_or_default();
        self.status = if self.editor.draft().is_some_and(EditorDraft::is_edit) {
            "Editing appointment".to_string()
        } else {
            "New appointment".to_string()
        };
    }

    fn change_field(&mut self, field: EditorField) {
        if self.editor_field == EditorField::Date && !self.commit_date_input() {
            return;
        }
        self.editor_field = field;
        self.suggestion_index = 0;
    }

    /// Applies the typed date. Leaves the draft untouched and reports when it does not parse.
    fn commit_date_input(&mut self) -> bool {
        let Some(date) = parse_date_key(&self.date_input) else {
            self.status = format!("error: invalid date {:?}, use YYYY-MM-DD", self.date_input);
            return false;
        };
        if let Some(draft) = self.editor.draft_mut() {
            draft.date = date;
        }
        true
    }

    fn add_suggested_guest(&mut self, calendar: &Calendar) {
        let Some(draft) = self.editor.draft_mut() else {
            return;
        };
        let suggestions = draft.guest_suggestions(&calendar.contacts);
        if suggestions.is_empty() {
            self.status = "no matching contacts".to_string();
            return;
        }
        let contact = suggestions[self.suggestion_index.min(suggestions.len() - 1)];
        let name = contact.name.clone();
        draft.add_guest(&contact.id);
        self.suggestion_index = 0;
        info!(guest = %contact.id, "guest added");
        self.status = format!("added guest: {name}");
    }
}

struct ViewModel {
    model: RenderModel,
    slot_ids: Vec<String>,
    active_days: HashSet<NaiveDate>,
    visible_count: usize,
}
