use std::fmt::{Display, Formatter};
use std::str::FromStr;

use chrono::NaiveDate;
use rand::{Rng, distributions::Alphanumeric, thread_rng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const ID_LEN: usize = 8;
pub const UNTITLED: &str = "(untitled)";
pub const UNKNOWN_CONTACT: &str = "Unknown contact";

#[derive(Debug, Error)]
pub enum CalendarError {
    #[error("appointment not found: {0}")]
    AppointmentNotFound(String),
    #[error("contact not found: {0}")]
    ContactNotFound(String),
    #[error("invalid date {0:?}, expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time {0:?}, expected HH:MM")]
    InvalidTime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentType {
    Meeting,
    Call,
    Demo,
}

impl AppointmentType {
    pub const ALL: [AppointmentType; 3] = [
        AppointmentType::Meeting,
        AppointmentType::Call,
        AppointmentType::Demo,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AppointmentType::Meeting => "meeting",
            AppointmentType::Call => "call",
            AppointmentType::Demo => "demo",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AppointmentType::Meeting => "Event",
            AppointmentType::Call => "Call",
            AppointmentType::Demo => "Demo",
        }
    }

    pub fn next(self) -> Self {
        match self {
            AppointmentType::Meeting => AppointmentType::Call,
            AppointmentType::Call => AppointmentType::Demo,
            AppointmentType::Demo => AppointmentType::Meeting,
        }
    }

    pub fn prev(self) -> Self {
        match self {
            AppointmentType::Meeting => AppointmentType::Demo,
            AppointmentType::Call => AppointmentType::Meeting,
            AppointmentType::Demo => AppointmentType::Call,
        }
    }
}

impl Display for AppointmentType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AppointmentType {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "meeting" | "event" => Ok(AppointmentType::Meeting),
            "call" => Ok(AppointmentType::Call),
            "demo" => Ok(AppointmentType::Demo),
            other => Err(format!("unknown appointment type: {other}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meet_link: Option<String>,
    #[serde(default)]
    pub guests: Vec<String>,
    #[serde(rename = "type")]
    pub kind: AppointmentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_id: Option<String>,
}

impl Appointment {
    pub fn display_title(&self) -> &str {
        if self.title.trim().is_empty() {
            UNTITLED
        } else {
            &self.title
        }
    }

    pub fn time_range(&self) -> String {
        match &self.end_time {
            Some(end_time) => format!("{} - {}", self.time, end_time),
            None => self.time.clone(),
        }
    }

    pub fn has_meet_link(&self) -> bool {
        self.meet_link
            .as_deref()
            .is_some_and(|link| !link.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub company: Option<String>,
}

impl Contact {
    pub fn initial(&self) -> char {
        self.name.chars().next().unwrap_or('?')
    }
}

/// Receives fully formed records from the editor.
pub trait AppointmentSink {
    fn on_add_appointment(&mut self, appointment: Appointment);
    fn on_edit_appointment(&mut self, appointment: Appointment);

    fn contains_id(&self, _id: &str) -> bool {
        false
    }
}

/// The in-memory appointment collection plus the contact directory it references.
#[derive(Debug, Clone, Default)]
pub struct Calendar {
    pub appointments: Vec<Appointment>,
    pub contacts: Vec<Contact>,
}

impl Calendar {
    pub fn new(appointments: Vec<Appointment>, contacts: Vec<Contact>) -> Self {
        Self {
            appointments,
            contacts,
        }
    }

    pub fn appointment(&self, id: &str) -> Option<&Appointment> {
        self.appointments
            .iter()
            .find(|appointment| appointment.id == id)
    }

    pub fn contact(&self, id: &str) -> Option<&Contact> {
        self.contacts.iter().find(|contact| contact.id == id)
    }

    pub fn add_contact(&mut self, name: String, email: String, company: Option<String>) -> String {
        let id = fresh_id(|candidate| self.contact(candidate).is_some());
        self.contacts.push(Contact {
            id: id.clone(),
            name,
            email,
            company,
        });
        id
    }

    /// Initial/name pair for a guest chip.
    pub fn guest_label(&self, id: &str) -> (char, String) {
        match self.contact(id) {
            Some(contact) => (contact.initial(), contact.name.clone()),
            None => ('?', UNKNOWN_CONTACT.to_string()),
        }
    }
}

impl AppointmentSink for Calendar {
    fn on_add_appointment(&mut self, appointment: Appointment) {
        info!(id = %appointment.id, date = %appointment.date, "appointment added");
        self.appointments.push(appointment);
    }

    fn on_edit_appointment(&mut self, appointment: Appointment) {
        match self
            .appointments
            .iter_mut()
            .find(|existing| existing.id == appointment.id)
        {
            Some(existing) => {
                info!(id = %appointment.id, "appointment replaced");
                *existing = appointment;
            }
            None => {
                warn!(id = %appointment.id, "edit for unknown appointment, appending");
                self.appointments.push(appointment);
            }
        }
    }

    fn contains_id(&self, id: &str) -> bool {
        self.appointment(id).is_some()
    }
}

pub fn generate_id() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ID_LEN)
        .map(char::from)
        .collect()
}

/// Generates identifiers until one is not taken.
pub fn fresh_id(is_taken: impl Fn(&str) -> bool) -> String {
    loop {
        let id = generate_id();
        if !is_taken(&id) {
            return id;
        }
    }
}

/// Sample directory and first appointment written into a brand new store.
pub fn seed_calendar(today: NaiveDate) -> Calendar {
    let contacts = vec![
        Contact {
            id: "1".to_string(),
            name: "Carlos Ruiz".to_string(),
            email: "carlos@techcorp.com".to_string(),
            company: Some("TechCorp".to_string()),
        },
        Contact {
            id: "2".to_string(),
            name: "Maria Gomez".to_string(),
            email: "maria@innovate.es".to_string(),
            company: Some("Innovate SL".to_string()),
        },
        Contact {
            id: "3".to_string(),
            name: "Juan Perez".to_string(),
            email: "juan@soluciones.com".to_string(),
            company: Some("Soluciones Web".to_string()),
        },
    ];
    let appointments = vec![Appointment {
        id: "1".to_string(),
        title: "Product demo".to_string(),
        date: today,
        time: "10:00".to_string(),
        end_time: Some("11:00".to_string()),
        description: "Full walkthrough of the product.".to_string(),
        location: None,
        meet_link: Some("meet.google.com/abc-defg-hij".to_string()),
        guests: vec!["1".to_string()],
        kind: AppointmentType::Demo,
        contact_id: Some("1".to_string()),
    }];
    Calendar::new(appointments, contacts)
}
