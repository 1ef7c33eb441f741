mod config;
mod datemath;
mod domain;
mod editor;
mod index;
mod layout;
mod logging;
mod navigation;
mod storage;
mod stores;
mod ui;
mod views;

use std::error::Error;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use crate::config::{config_path, load_settings, save_settings, Settings};
use crate::datemath::{default_end_time, format_clock, minutes_of_day, parse_date_key};
use crate::domain::{Appointment, AppointmentType, Calendar, CalendarError, seed_calendar};
use crate::editor::{EditorDraft, EventEditor, search_contacts};
use crate::index::{AppointmentIndex, FilterState};
use crate::layout::LayoutEngine;
use crate::logging::init_logging;
use crate::navigation::NavigationController;
use crate::storage::{AppointmentStore, FileStore};
use crate::stores::{prune_recent_stores, recent_stores, remember_store, resolve_store_path, state_dir};
use crate::ui::run_dashboard;
use crate::views::{AgendaList, MonthCell, RenderModel, TimeColumn, ViewMode};

#[derive(Debug, Parser)]
#[command(name = "chronos-agenda", about = "Terminal calendar for CRM appointments")]
struct Cli {
    #[arg(long)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    Init,
    Dashboard,
    Show {
        #[arg(long, value_enum)]
        view: Option<ViewMode>,
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        hide: Vec<AppointmentType>,
    },
    Add {
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: AppointmentFields,
    },
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        date: Option<String>,
        #[command(flatten)]
        fields: AppointmentFields,
        #[arg(long, conflicts_with_all = ["meet_link", "generate_meet"])]
        clear_meet: bool,
        #[arg(long)]
        remove_guest: Vec<String>,
    },
    Guests {
        #[arg(long, default_value = "")]
        query: String,
        #[arg(long)]
        exclude: Vec<String>,
    },
    AddContact {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        company: Option<String>,
    },
    Contacts,
    Stores {
        #[arg(long, default_value_t = 20)]
        limit: usize,
        #[arg(long)]
        prune: bool,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    Show,
    Init,
}

#[derive(Debug, clap::Args)]
struct AppointmentFields {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    time: Option<String>,
    #[arg(long)]
    end_time: Option<String>,
    #[arg(long = "type")]
    kind: Option<AppointmentType>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long = "guest")]
    guests: Vec<String>,
    #[arg(long, conflicts_with = "generate_meet")]
    meet_link: Option<String>,
    #[arg(long)]
    generate_meet: bool,
}

impl AppointmentFields {
    fn apply(self, draft: &mut EditorDraft, calendar: &Calendar) -> Result<(), CalendarError> {
        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(time) = self.time {
            draft.time = checked_time(time)?;
            if self.end_time.is_none() {
                draft.end_time = default_end_time(&draft.time);
            }
        }
        if let Some(end_time) = self.end_time {
            draft.end_time = checked_time(end_time)?;
        }
        if let Some(kind) = self.kind {
            draft.kind = kind;
        }
        if let Some(location) = self.location {
            draft.location = location;
        }
        if let Some(description) = self.description {
            draft.description = description;
        }
        for guest in &self.guests {
            if calendar.contact(guest).is_none() {
                return Err(CalendarError::ContactNotFound(guest.clone()));
            }
            draft.add_guest(guest);
        }
        if let Some(meet_link) = self.meet_link {
            draft.meet_link = meet_link;
        }
        if self.generate_meet {
            draft.generate_meet_link();
        }
        Ok(())
    }
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let settings = match load_settings(&config_path()) {
        Ok(settings) => settings,
        Err(err) => {
            eprintln!("warning: {err}; using default settings");
            Settings::default()
        }
    };
    match init_logging(&state_dir(), &settings.log_level) {
        Ok(log_path) => debug!(path = %log_path.display(), "logging initialised"),
        Err(err) => eprintln!("warning: failed to initialise logging: {err}"),
    }

    match &cli.command {
        Some(Command::Stores { limit, prune }) => return print_recent_stores(*limit, *prune),
        Some(Command::Config { action }) => return run_config(action, &settings),
        _ => {}
    }

    let (store_path, source) = resolve_store_path(cli.store)?;
    debug!(path = %store_path.display(), ?source, "using store");
    let mut store = FileStore::new(&store_path);
    let mut calendar = store.load_calendar()?;
    if let Err(err) = remember_store(&store_path) {
        eprintln!("warning: failed to store recent store: {err}");
    }

    let today = Local::now().date_naive();
    match cli.command.unwrap_or(Command::Dashboard) {
        Command::Init => {
            if !store.exists() || (calendar.appointments.is_empty() && calendar.contacts.is_empty()) {
                calendar = seed_calendar(today);
                info!(path = %store_path.display(), "seeding new store");
            }
            store.save_calendar(&calendar)?;
            println!("initialized store at {}", store.path().display());
        }
        Command::Dashboard => {
            run_dashboard(&mut calendar, &mut store, &settings)?;
        }
        Command::Show { view, date, hide } => {
            let anchor = date.as_deref().map(checked_date).transpose()?.unwrap_or(today);
            let mode = view.unwrap_or(settings.default_view);
            let filter = FilterState::hidden_from(&hide);
            print_view(&calendar, &filter, NavigationController::new(anchor, mode), today, &settings.layout());
        }
        command @ (Command::Add { .. } | Command::Edit { .. }) => {
            let before = calendar.appointments.len();
            if let Some(appointment) = submit_command(&mut calendar, command, today)? {
                store.save_appointments(&calendar.appointments)?;
                if calendar.appointments.len() > before {
                    println!("created appointment {}", appointment.id);
                } else {
                    println!("updated appointment {}", appointment.id);
                }
            }
        }
        Command::Guests { query, exclude } => {
            let matches = search_contacts(&calendar.contacts, &query, &exclude);
            if matches.is_empty() {
                println!("no matching contacts");
            }
            for contact in matches {
                println!("{} | {} | {}", contact.id, contact.name, contact.email);
            }
        }
        Command::AddContact { name, email, company } => {
            let contact_id = calendar.add_contact(name, email, company);
            store.save_contacts(&calendar.contacts)?;
            println!("created contact {contact_id}");
        }
        Command::Contacts => print_contacts(&calendar),
        Command::Stores { .. } | Command::Config { .. } => {}
    }

    Ok(())
}

/// Runs `add` or `edit` through the editor workflow and submits into `calendar`.
fn submit_command(
    calendar: &mut Calendar,
    command: Command,
    today: NaiveDate,
) -> Result<Option<Appointment>, CalendarError> {
    let mut editor = EventEditor::default();
    match command {
        Command::Add { date, fields } => {
            let date = date.as_deref().map(checked_date).transpose()?.unwrap_or(today);
            editor.open_create(date, None);
            if let Some(draft) = editor.draft_mut() {
                fields.apply(draft, calendar)?;
            }
        }
        Command::Edit {
            id,
            date,
            fields,
            clear_meet,
            remove_guest,
        } => {
            let appointment = calendar
                .appointment(&id)
                .ok_or_else(|| CalendarError::AppointmentNotFound(id.clone()))?;
            editor.open_edit(appointment);
            if let Some(draft) = editor.draft_mut() {
                if let Some(date) = date.as_deref() {
                    draft.date = checked_date(date)?;
                }
                for guest in &remove_guest {
                    draft.remove_guest(guest);
                }
                fields.apply(draft, calendar)?;
                if clear_meet {
                    draft.clear_meet_link();
                }
            }
        }
        _ => return Ok(None),
    }

    Ok(editor.submit(calendar))
}

fn checked_date(raw: &str) -> Result<NaiveDate, CalendarError> {
    parse_date_key(raw).ok_or_else(|| CalendarError::InvalidDate(raw.to_string()))
}

fn checked_time(raw: String) -> Result<String, CalendarError> {
    match minutes_of_day(&raw) {
        Some(minutes) => Ok(format_clock(minutes)),
        None => Err(CalendarError::InvalidTime(raw)),
    }
}

fn run_config(action: &ConfigAction, settings: &Settings) -> Result<(), Box<dyn Error>> {
    let path = config_path();
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(settings)?);
        }
        ConfigAction::Init => {
            if path.exists() {
                println!("config already exists at {}", path.display());
            } else {
                save_settings(&path, &Settings::default())?;
                println!("wrote default config to {}", path.display());
            }
        }
    }
    Ok(())
}

fn print_recent_stores(limit: usize, prune: bool) -> Result<(), Box<dyn Error>> {
    if prune {
        let removed = prune_recent_stores()?;
        println!("removed {removed} missing stores");
    }

    let rows = recent_stores(limit)?;
    if rows.is_empty() {
        println!("no recent stores");
        return Ok(());
    }

    for (index, row) in rows.iter().enumerate() {
        let marker = if row.exists { "" } else { " (missing)" };
        println!("{:>2}. {}{}", index + 1, row.path.display(), marker);
    }

    Ok(())
}

fn print_contacts(calendar: &Calendar) {
    if calendar.contacts.is_empty() {
        println!("no contacts yet");
        return;
    }

    for contact in &calendar.contacts {
        println!(
            "{} | {} | {} | {}",
            contact.id,
            contact.name,
            contact.email,
            contact.company.as_deref().unwrap_or("-")
        );
    }
}

fn print_view(
    calendar: &Calendar,
    filter: &FilterState,
    nav: NavigationController,
    today: NaiveDate,
    layout: &LayoutEngine,
) {
    let index = AppointmentIndex::new(&calendar.appointments, filter);
    let model = nav.mode().render(nav.anchor(), today, &index, layout);
    println!("{} ({} view)", nav.title(), model.mode());

    match model {
        RenderModel::Month(grid) => {
            println!("Sun Mon Tue Wed Thu Fri Sat");
            for week in grid.rows() {
                let row = week
                    .iter()
                    .map(|cell| match cell {
                        MonthCell::Padding => "   ".to_string(),
                        MonthCell::Day { date, is_today, .. } => {
                            format!("{:>2}{}", date.format("%-d"), if *is_today { "*" } else { " " })
                        }
                    })
                    .collect::<Vec<_>>();
                println!("{}", row.join(" "));
            }
            for cell in &grid.cells {
                let (Some(date), false) = (cell.date(), cell.items().is_empty()) else {
                    continue;
                };
                println!("\n{}", date.format("%a %d %b"));
                for item in cell.items() {
                    println!("  {} {} [{}] ({})", item.time, item.title, item.kind.label(), item.id);
                }
            }
        }
        RenderModel::Week(grid) => {
            for column in &grid.columns {
                print_column(column, false);
            }
        }
        RenderModel::Day(grid) => print_column(&grid.column, true),
        RenderModel::Agenda(AgendaList::Empty) => println!("No events scheduled"),
        RenderModel::Agenda(AgendaList::Groups(groups)) => {
            for group in groups {
                println!("\n{}", group.date.format("%a, %d %B %Y"));
                for item in group.items {
                    let video = if item.has_meet_link { " [video]" } else { "" };
                    let location = item.location.map(|location| format!(" @ {location}")).unwrap_or_default();
                    println!(
                        "  {:<13} {} [{}]{video}{location} ({})",
                        item.time_range,
                        item.title,
                        item.kind.label(),
                        item.id
                    );
                }
            }
        }
    }
}

fn print_column(column: &TimeColumn, detailed: bool) {
    let today = if column.is_today { " (today)" } else { "" };
    println!("\n{}{today}", column.date.format("%a %d %b"));
    if column.blocks.is_empty() {
        println!("  -");
    }
    for block in &column.blocks {
        let range = match &block.end_time {
            Some(end_time) => format!("{} - {}", block.time, end_time),
            None => block.time.clone(),
        };
        println!(
            "  {:<13} {} [{}] top={}px height={}px ({})",
            range,
            block.title,
            block.kind.label(),
            block.top,
            block.height,
            block.id
        );
        if detailed {
            if let Some(description) = &block.description {
                println!("                {description}");
            }
            if block.has_meet_link {
                println!("                video call");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use clap::Parser;

    use crate::domain::{Appointment, AppointmentType, Calendar, CalendarError, seed_calendar};
    use crate::index::{AppointmentIndex, FilterState};

    use super::{Cli, submit_command};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date")
    }

    fn command(args: &[&str]) -> super::Command {
        let mut argv = vec!["chronos-agenda"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv)
            .expect("arguments parse")
            .command
            .expect("subcommand")
    }

    fn submit(calendar: &mut Calendar, args: &[&str]) -> Result<Appointment, CalendarError> {
        submit_command(calendar, command(args), date(1)).map(|appointment| appointment.expect("submitted"))
    }

    #[test]
    fn add_with_time_derives_end_from_it() {
        let mut calendar = seed_calendar(date(1));
        let created = submit(
            &mut calendar,
            &[
                "add", "--date", "2024-03-05", "--time", "14:00", "--title", "Pricing", "--type", "call",
                "--guest", "2",
            ],
        )
        .expect("created");
        assert_eq!(created.date, date(5));
        assert_eq!(created.time, "14:00");
        assert_eq!(created.end_time.as_deref(), Some("15:00"));
        assert_eq!(created.kind, AppointmentType::Call);
        assert_eq!(created.contact_id.as_deref(), Some("2"));
        assert_eq!(calendar.appointments.len(), 2);

        let explicit = submit(
            &mut calendar,
            &["add", "--date", "2024-03-05", "--time", "16:00", "--end-time", "16:30"],
        )
        .expect("created");
        assert_eq!(explicit.end_time.as_deref(), Some("16:30"));
    }

    #[test]
    fn add_pads_short_times_so_day_order_holds() {
        let mut calendar = seed_calendar(date(1));
        for time in ["10:00", "9:05"] {
            submit(&mut calendar, &["add", "--date", "2024-03-05", "--time", time]).expect("created");
        }
        let filter = FilterState::default();
        let index = AppointmentIndex::new(&calendar.appointments, &filter);
        let times = index
            .for_date(date(5))
            .into_iter()
            .map(|appointment| appointment.time.as_str())
            .collect::<Vec<_>>();
        assert_eq!(times, vec!["09:05", "10:00"]);
    }

    #[test]
    fn add_rejects_bad_input() {
        let mut calendar = seed_calendar(date(1));
        let err = submit(&mut calendar, &["add", "--time", "25:00"]).expect_err("bad time");
        assert!(matches!(err, CalendarError::InvalidTime(_)));
        let err = submit(&mut calendar, &["add", "--guest", "99"]).expect_err("bad guest");
        assert!(matches!(err, CalendarError::ContactNotFound(ref id) if id == "99"));
        let err = submit(&mut calendar, &["add", "--date", "2024-02-30"]).expect_err("bad date");
        assert!(matches!(err, CalendarError::InvalidDate(_)));
        assert_eq!(calendar.appointments.len(), 1);
    }

    #[test]
    fn edit_replaces_fields_in_place() {
        let mut calendar = seed_calendar(date(1));
        let created = submit(
            &mut calendar,
            &["add", "--date", "2024-03-05", "--guest", "1", "--guest", "3", "--generate-meet"],
        )
        .expect("created");
        assert!(created.has_meet_link());

        let edited = submit(
            &mut calendar,
            &[
                "edit", "--id", created.id.as_str(), "--remove-guest", "1", "--clear-meet", "--time", "11:00",
                "--date", "2024-03-06",
            ],
        )
        .expect("edited");
        assert_eq!(edited.id, created.id);
        assert_eq!(edited.guests, vec!["3".to_string()]);
        assert_eq!(edited.contact_id.as_deref(), Some("3"));
        assert_eq!(edited.meet_link, None);
        assert_eq!(edited.date, date(6));
        assert_eq!(edited.time, "11:00");
        assert_eq!(edited.end_time.as_deref(), Some("12:00"));
        assert_eq!(calendar.appointments.len(), 2);
        assert_eq!(calendar.appointment(&created.id), Some(&edited));
    }

    #[test]
    fn edit_of_missing_id_fails() {
        let mut calendar = seed_calendar(date(1));
        let err = submit(&mut calendar, &["edit", "--id", "nope"]).expect_err("missing");
        assert!(matches!(err, CalendarError::AppointmentNotFound(ref id) if id == "nope"));
    }
}
