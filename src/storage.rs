use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Appointment, Calendar, Contact};

const APPOINTMENTS_MARKER: &str = "\n=== APPOINTMENTS ===\n";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML header: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to encode TOML header: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("failed to parse appointment on line {line}: {source}")]
    JsonDecode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to encode appointment: {0}")]
    JsonEncode(serde_json::Error),
}

/// The persistence collaborator. Saves always replace the whole collection.
pub trait AppointmentStore {
    fn get_appointments(&self) -> Result<Vec<Appointment>, StorageError>;
    fn save_appointments(&mut self, appointments: &[Appointment]) -> Result<(), StorageError>;
    fn get_contacts(&self) -> Result<Vec<Contact>, StorageError>;
    fn save_contacts(&mut self, contacts: &[Contact]) -> Result<(), StorageError>;

    fn load_calendar(&self) -> Result<Calendar, StorageError> {
        Ok(Calendar::new(self.get_appointments()?, self.get_contacts()?))
    }

    fn save_calendar(&mut self, calendar: &Calendar) -> Result<(), StorageError> {
        self.save_contacts(&calendar.contacts)?;
        self.save_appointments(&calendar.appointments)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreHeader {
    schema_version: u32,
    created_at: DateTime<Utc>,
    #[serde(default)]
    contacts: Vec<Contact>,
}

impl StoreHeader {
    fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            contacts: Vec::new(),
        }
    }
}

/// TOML header holding the contact directory, then one JSON appointment per line.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn read(&self) -> Result<(StoreHeader, Vec<Appointment>), StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "store missing, treating as empty");
                return Ok((StoreHeader::new(), Vec::new()));
            }
            Err(err) => return Err(StorageError::Io(err)),
        };

        if raw.trim().is_empty() {
            return Ok((StoreHeader::new(), Vec::new()));
        }

        let (header_blob, appointments_blob) = raw
            .split_once(APPOINTMENTS_MARKER)
            .unwrap_or((raw.as_str(), ""));

        let header: StoreHeader = toml::from_str(header_blob)?;
        let mut appointments = Vec::new();
        for (index, line) in appointments_blob.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let appointment = serde_json::from_str(line).map_err(|source| StorageError::JsonDecode {
                line: index + 1,
                source,
            })?;
            appointments.push(appointment);
        }

        debug!(
            path = %self.path.display(),
            appointments = appointments.len(),
            contacts = header.contacts.len(),
            "store loaded"
        );
        Ok((header, appointments))
    }

    fn write(&self, header: &StoreHeader, appointments: &[Appointment]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let header_blob = toml::to_string_pretty(header)?;
        let mut file = fs::File::create(&self.path)?;
        file.write_all(header_blob.as_bytes())?;
        file.write_all(APPOINTMENTS_MARKER.as_bytes())?;

        for appointment in appointments {
            let line = serde_json::to_string(appointment).map_err(StorageError::JsonEncode)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }

        info!(
            path = %self.path.display(),
            appointments = appointments.len(),
            "store saved"
        );
        Ok(())
    }
}

impl AppointmentStore for FileStore {
    fn get_appointments(&self) -> Result<Vec<Appointment>, StorageError> {
        Ok(self.read()?.1)
    }

    fn save_appointments(&mut self, appointments: &[Appointment]) -> Result<(), StorageError> {
        let (header, _) = self.read()?;
        self.write(&header, appointments)
    }

    fn get_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        Ok(self.read()?.0.contacts)
    }

    fn save_contacts(&mut self, contacts: &[Contact]) -> Result<(), StorageError> {
        let (mut header, appointments) = self.read()?;
        header.contacts = contacts.to_vec();
        self.write(&header, &appointments)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    pub appointments: Vec<Appointment>,
    pub contacts: Vec<Contact>,
    pub saves: usize,
}

impl AppointmentStore for MemoryStore {
    fn get_appointments(&self) -> Result<Vec<Appointment>, StorageError> {
        Ok(self.appointments.clone())
    }

    fn save_appointments(&mut self, appointments: &[Appointment]) -> Result<(), StorageError> {
        self.appointments = appointments.to_vec();
        self.saves += 1;
        Ok(())
    }

    fn get_contacts(&self) -> Result<Vec<Contact>, StorageError> {
        Ok(self.contacts.clone())
    }

    fn save_contacts(&mut self, contacts: &[Contact]) -> Result<(), StorageError> {
        self.contacts = contacts.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use chrono::NaiveDate;

    use crate::domain::{AppointmentSink, seed_calendar};
    use crate::editor::EventEditor;

    use super::{AppointmentStore, FileStore, MemoryStore, StorageError};

    fn temp_file(name: &str) -> PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("{}_{}", name, std::process::id()));
        path
    }

    #[test]
    fn round_trips_header_and_appointment_lines() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        let mut calendar = seed_calendar(today);
        let mut editor = EventEditor::default();
        editor.open_create(today, Some("14:00"));
        editor.submit(&mut calendar).expect("submitted");

        let path = temp_file("chronos_agenda_store_roundtrip.store");
        let mut store = FileStore::new(&path);
        store.save_calendar(&calendar).expect("save should succeed");

        let loaded = store.load_calendar().expect("load should succeed");
        assert_eq!(loaded.contacts, calendar.contacts);
        assert_eq!(loaded.appointments, calendar.appointments);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn saving_appointments_keeps_contacts() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 5).expect("valid date");
        let calendar = seed_calendar(today);
        let path = temp_file("chronos_agenda_store_replace.store");
        let mut store = FileStore::new(&path);
        store.save_calendar(&calendar).expect("save should succeed");

        store.save_appointments(&[]).expect("save should succeed");
        assert!(store.get_appointments().expect("load").is_empty());
        assert_eq!(store.get_contacts().expect("load").len(), 3);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn missing_file_is_an_empty_store() {
        let store = FileStore::new(temp_file("chronos_agenda_store_missing.store"));
        assert!(store.get_appointments().expect("load").is_empty());
        assert!(store.get_contacts().expect("load").is_empty());
    }

    #[test]
    fn reports_bad_appointment_line() {
        let path = temp_file("chronos_agenda_store_corrupt.store");
        fs::write(
            &path,
            "schema_version = 1\ncreated_at = \"2024-03-05T10:00:00Z\"\n\n=== APPOINTMENTS ===\n{not json}\n",
        )
        .expect("write fixture");
        let err = FileStore::new(&path).get_appointments().expect_err("should fail");
        assert!(matches!(err, StorageError::JsonDecode { line: 1, .. }));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn memory_store_replaces_collection() {
        let mut store = MemoryStore::default();
        let mut calendar = store.load_calendar().expect("load");
        let mut editor = EventEditor::default();
        editor.open_create(NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid date"), None);
        editor.submit(&mut calendar);
        assert!(calendar.contains_id(&calendar.appointments[0].id));
        store.save_appointments(&calendar.appointments).expect("save");
        assert_eq!(store.appointments.len(), 1);
        assert_eq!(store.saves, 1);
    }
}
