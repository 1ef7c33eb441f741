use chrono::NaiveDate;
use rand::{Rng, thread_rng};
use tracing::{debug, info};

use crate::datemath::{default_end_time, normalize_clock};
use crate::domain::{Appointment, AppointmentSink, AppointmentType, Contact, UNTITLED, fresh_id};
use crate::views::DEFAULT_CREATE_TIME;

const MEET_HOST: &str = "meet.google.com";
const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

/// In-progress field values of the editor modal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDraft {
    pub editing_id: Option<String>,
    pub title: String,
    pub kind: AppointmentType,
    pub date: NaiveDate,
    pub time: String,
    pub end_time: String,
    pub location: String,
    pub meet_link: String,
    pub description: String,
    pub guests: Vec<String>,
    pub guest_query: String,
}

impl EditorDraft {
    /// Derived defaults for a new appointment: +1h end, no link, meeting type.
    pub fn for_create(date: NaiveDate, time: Option<&str>) -> Self {
        let time = time.unwrap_or(DEFAULT_CREATE_TIME).to_string();
        Self {
            editing_id: None,
            title: String::new(),
            kind: AppointmentType::Meeting,
            date,
            end_time: default_end_time(&time),
            time,
            location: String::new(),
            meet_link: String::new(),
            description: String::new(),
            guests: Vec::new(),
            guest_query: String::new(),
        }
    }

    pub fn for_edit(appointment: &Appointment) -> Self {
        Self {
            editing_id: Some(appointment.id.clone()),
            title: appointment.title.clone(),
            kind: appointment.kind,
            date: appointment.date,
            time: appointment.time.clone(),
            end_time: appointment
                .end_time
                .clone()
                .unwrap_or_else(|| appointment.time.clone()),
            location: appointment.location.clone().unwrap_or_default(),
            meet_link: appointment.meet_link.clone().unwrap_or_default(),
            description: appointment.description.clone(),
            guests: appointment.guests.clone(),
            guest_query: String::new(),
        }
    }

    pub fn is_edit(&self) -> bool {
        self.editing_id.is_some()
    }

    pub fn add_guest(&mut self, contact_id: &str) {
        if !self.guests.iter().any(|guest| guest == contact_id) {
            self.guests.push(contact_id.to_string());
        }
        self.guest_query.clear();
    }

    pub fn remove_guest(&mut self, contact_id: &str) {
        self.guests.retain(|guest| guest != contact_id);
    }

    pub fn generate_meet_link(&mut self) {
        self.meet_link = generate_meet_link();
    }

    pub fn clear_meet_link(&mut self) {
        self.meet_link.clear();
    }

    /// Contacts whose name contains the current query, minus those already invited.
    pub fn guest_suggestions<'c>(&self, contacts: &'c [Contact]) -> Vec<&'c Contact> {
        search_contacts(contacts, &self.guest_query, &self.guests)
    }

    fn into_appointment(self, id: String) -> Appointment {
        let title = if self.title.trim().is_empty() {
            UNTITLED.to_string()
        } else {
            self.title
        };
        Appointment {
            id,
            title,
            date: self.date,
            time: normalize_clock(&self.time),
            end_time: non_empty(self.end_time).map(|end_time| normalize_clock(&end_time)),
            description: self.description,
            location: non_empty(self.location),
            meet_link: non_empty(self.meet_link),
            contact_id: self.guests.first().cloned(),
            guests: self.guests,
            kind: self.kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum EditorState {
    #[default]
    Closed,
    Open(EditorDraft),
}

/// Single modal fed by two entry transitions: create at a slot, or edit a record.
#[derive(Debug, Clone, Default)]
pub struct EventEditor {
    state: EditorState,
}

impl EventEditor {
    pub fn is_open(&self) -> bool {
        matches!(self.state, EditorState::Open(_))
    }

    pub fn draft(&self) -> Option<&EditorDraft> {
        match &self.state {
            EditorState::Open(draft) => Some(draft),
            EditorState::Closed => None,
        }
    }

    pub fn draft_mut(&mut self) -> Option<&mut EditorDraft> {
        match &mut self.state {
            EditorState::Open(draft) => Some(draft),
            EditorState::Closed => None,
        }
    }

    pub fn open_create(&mut self, date: NaiveDate, time: Option<&str>) {
        debug!(%date, time = time.unwrap_or(DEFAULT_CREATE_TIME), "editor opened for create");
        self.state = EditorState::Open(EditorDraft::for_create(date, time));
    }

    pub fn open_edit(&mut self, appointment: &Appointment) {
        debug!(id = %appointment.id, "editor opened for edit");
        self.state = EditorState::Open(EditorDraft::for_edit(appointment));
    }

    pub fn cancel(&mut self) {
        if self.is_open() {
            debug!("editor cancelled");
        }
        self.state = EditorState::Closed;
    }

    /// Builds the record and hands it to exactly one callback. Returns the submitted record.
    pub fn submit(&mut self, sink: &mut impl AppointmentSink) -> Option<Appointment> {
        let EditorState::Open(draft) = std::mem::take(&mut self.state) else {
            return None;
        };

        match draft.editing_id.clone() {
            Some(id) => {
                let appointment = draft.into_appointment(id);
                info!(id = %appointment.id, "editor submitted edit");
                sink.on_edit_appointment(appointment.clone());
                Some(appointment)
            }
            None => {
                let id = fresh_id(|candidate| sink.contains_id(candidate));
                let appointment = draft.into_appointment(id);
                info!(id = %appointment.id, "editor submitted new appointment");
                sink.on_add_appointment(appointment.clone());
                Some(appointment)
            }
        }
    }
}

pub fn search_contacts<'c>(contacts: &'c [Contact], query: &str, exclude: &[String]) -> Vec<&'c Contact> {
    let query = query.trim().to_lowercase();
    contacts
        .iter()
        .filter(|contact| contact.name.to_lowercase().contains(&query))
        .filter(|contact| !exclude.iter().any(|id| id == &contact.id))
        .collect()
}

/// Placeholder conferencing address built from three random lowercase groups.
pub fn generate_meet_link() -> String {
    let mut rng = thread_rng();
    let mut group = |len: usize| {
        (0..len)
            .map(|_| char::from(LOWERCASE[rng.gen_range(0..LOWERCASE.len())]))
            .collect::<String>()
    };
    let first = group(3);
    let second = group(4);
    let third = group(3);
    format!("{MEET_HOST}/{first}-{second}-{third}")
}

/// Blank input means "not set"; anything else is kept byte for byte.
fn non_empty(value: String) -> Option<String> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use crate::domain::{AppointmentSink, AppointmentType, Calendar, Contact};

    use super::{EditorDraft, EventEditor, generate_meet_link, search_contacts};

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, day).expect("valid date")
    }

    fn contacts() -> Vec<Contact> {
        ["Carlos Ruiz", "Maria Gomez", "Mario Santos"]
            .iter()
            .enumerate()
            .map(|(index, name)| Contact {
                id: (index + 1).to_string(),
                name: name.to_string(),
                email: format!("c{index}@example.com"),
                company: None,
            })
            .collect()
    }

    #[derive(Default)]
    struct RecordingSink {
        added: Vec<String>,
        edited: Vec<String>,
    }

    impl AppointmentSink for RecordingSink {
        fn on_add_appointment(&mut self, appointment: crate::domain::Appointment) {
            self.added.push(appointment.id);
        }

        fn on_edit_appointment(&mut self, appointment: crate::domain::Appointment) {
            self.edited.push(appointment.id);
        }
    }

    #[test]
    fn create_defaults_end_one_hour_after_start() {
        let draft = EditorDraft::for_create(date(5), Some("14:00"));
        assert_eq!(draft.end_time, "15:00");
        assert_eq!(draft.kind, AppointmentType::Meeting);

        let draft = EditorDraft::for_create(date(5), None);
        assert_eq!(draft.time, "09:00");
        assert_eq!(draft.end_time, "10:00");
    }

    #[test]
    fn submit_new_then_edit_round_trips_fields() {
        let mut calendar = Calendar::new(Vec::new(), contacts());
        let mut editor = EventEditor::default();
        editor.open_create(date(5), Some("14:00"));
        {
            let draft = editor.draft_mut().expect("editor open");
            draft.title = "Pricing call".to_string();
            draft.kind = AppointmentType::Call;
            draft.location = "Madrid".to_string();
            draft.description = "Discuss discount".to_string();
            draft.generate_meet_link();
            draft.add_guest("2");
            draft.add_guest("1");
        }
        let created = editor.submit(&mut calendar).expect("submitted");
        assert!(!editor.is_open());
        assert_eq!(created.contact_id.as_deref(), Some("2"));
        assert_eq!(calendar.appointments, vec![created.clone()]);

        editor.open_edit(&created);
        let reopened = editor.draft().expect("editor open").clone();
        assert_eq!(reopened.editing_id.as_deref(), Some(created.id.as_str()));
        assert_eq!(reopened.title, "Pricing call");
        assert_eq!(reopened.kind, AppointmentType::Call);
        assert_eq!(reopened.date, date(5));
        assert_eq!(reopened.time, "14:00");
        assert_eq!(reopened.end_time, "15:00");
        assert_eq!(reopened.location, "Madrid");
        assert_eq!(Some(reopened.meet_link.clone()), created.meet_link);
        assert_eq!(reopened.description, "Discuss discount");
        assert_eq!(reopened.guests, vec!["2".to_string(), "1".to_string()]);

        let resubmitted = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(resubmitted, created);
        assert_eq!(calendar.appointments.len(), 1);
    }

    #[test]
    fn edit_replaces_record_under_same_id() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(5), None);
        let created = editor.submit(&mut calendar).expect("submitted");

        editor.open_edit(&created);
        {
            let draft = editor.draft_mut().expect("editor open");
            draft.date = date(6);
            draft.title.clear();
        }
        let edited = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(edited.id, created.id);
        assert_eq!(edited.title, "(untitled)");
        assert_eq!(calendar.appointment(&created.id).map(|a| a.date), Some(date(6)));
    }

    #[test]
    fn submit_routes_to_one_callback() {
        let mut sink = RecordingSink::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(1), None);
        let created = editor.submit(&mut sink).expect("submitted");
        assert_eq!(sink.added, vec![created.id.clone()]);
        assert!(sink.edited.is_empty());

        editor.open_edit(&created);
        editor.submit(&mut sink);
        assert_eq!(sink.edited, vec![created.id]);
        assert_eq!(sink.added.len(), 1);
    }

    #[test]
    fn cancel_discards_without_callbacks() {
        let mut sink = RecordingSink::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(1), None);
        if let Some(draft) = editor.draft_mut() {
            draft.title = "Never saved".to_string();
        }
        editor.cancel();
        assert!(editor.submit(&mut sink).is_none());
        assert!(sink.added.is_empty() && sink.edited.is_empty());
    }

    #[test]
    fn blank_title_is_substituted() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(2), Some("08:30"));
        let created = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(created.title, "(untitled)");
        assert_eq!(created.end_time.as_deref(), Some("09:30"));
        assert_eq!(created.contact_id, None);
    }

    #[test]
    fn padded_text_fields_survive_a_round_trip() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(5), Some("14:00"));
        if let Some(draft) = editor.draft_mut() {
            draft.location = "Madrid ".to_string();
            draft.meet_link = "   ".to_string();
        }
        let created = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(created.location.as_deref(), Some("Madrid "));
        assert_eq!(created.meet_link, None);

        editor.open_edit(&created);
        assert_eq!(editor.draft().map(|d| d.location.as_str()), Some("Madrid "));
    }

    #[test]
    fn blank_end_time_is_not_stored() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(5), Some("09:00"));
        if let Some(draft) = editor.draft_mut() {
            draft.end_time.clear();
        }
        let created = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(created.end_time, None);
        assert_eq!(created.time_range(), "09:00");
    }

    #[test]
    fn short_clock_times_are_padded_on_submit() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        for time in ["10:00", "9:05"] {
            editor.open_create(date(5), Some(time));
            editor.submit(&mut calendar).expect("submitted");
        }
        let early = &calendar.appointments[1];
        assert_eq!(early.time, "09:05");
        assert_eq!(early.end_time.as_deref(), Some("10:05"));

        let filter = crate::index::FilterState::default();
        let index = crate::index::AppointmentIndex::new(&calendar.appointments, &filter);
        let times = index
            .for_date(date(5))
            .into_iter()
            .map(|appointment| appointment.time.as_str())
            .collect::<Vec<_>>();
        assert_eq!(times, vec!["09:05", "10:00"]);

        editor.open_create(date(6), Some("later"));
        let loose = editor.submit(&mut calendar).expect("submitted");
        assert_eq!(loose.time, "later");
    }

    #[test]
    fn edit_without_end_falls_back_to_start() {
        let mut calendar = Calendar::default();
        let mut editor = EventEditor::default();
        editor.open_create(date(2), Some("08:30"));
        let mut created = editor.submit(&mut calendar).expect("submitted");
        created.end_time = None;
        editor.open_edit(&created);
        assert_eq!(editor.draft().map(|d| d.end_time.as_str()), Some("08:30"));
    }

    #[test]
    fn guest_search_is_case_insensitive_and_excludes_invited() {
        let directory = contacts();
        let mut draft = EditorDraft::for_create(date(1), None);
        draft.guest_query = "MAR".to_string();
        let names = |draft: &EditorDraft| {
            draft
                .guest_suggestions(&directory)
                .into_iter()
                .map(|contact| contact.name.clone())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(&draft), vec!["Maria Gomez", "Mario Santos"]);

        draft.add_guest("2");
        assert!(draft.guest_query.is_empty());
        draft.guest_query = "mar".to_string();
        assert_eq!(names(&draft), vec!["Mario Santos"]);

        draft.add_guest("2");
        assert_eq!(draft.guests, vec!["2".to_string()]);

        draft.remove_guest("2");
        draft.guest_query = "mar".to_string();
        assert_eq!(names(&draft), vec!["Maria Gomez", "Mario Santos"]);
        assert_eq!(search_contacts(&directory, "", &[]).len(), 3);
    }

    #[test]
    fn meet_link_has_three_lowercase_groups() {
        let link = generate_meet_link();
        let code = link.strip_prefix("meet.google.com/").expect("host prefix");
        let groups = code.split('-').collect::<Vec<_>>();
        assert_eq!(groups.iter().map(|g| g.len()).collect::<Vec<_>>(), vec![3, 4, 3]);
        assert!(code.chars().all(|c| c == '-' || c.is_ascii_lowercase()));

        let mut draft = EditorDraft::for_create(date(1), None);
        draft.generate_meet_link();
        assert!(!draft.meet_link.is_empty());
        draft.clear_meet_link();
        assert!(draft.meet_link.is_empty());
    }
}
