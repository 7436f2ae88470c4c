//! In-memory event model

use super::{
    Class, Club, Competitor, Control, DatabaseRunner, DomainError, DomainModel, EventStatus, Id,
    ListConfiguration, ListKind, ListSection, NewEntry, RenderedList, ResultRow, RunnerStatus,
    Team,
};
use std::collections::HashMap;

/// Event model held entirely in memory
///
/// # Examples
///
/// ```rust
/// use restbridge::domain::{DomainModel, MemoryEvent};
///
/// let mut event = MemoryEvent::new("Night Sprint");
/// let class = event.add_class("H21", true);
/// let club = event.add_club("OK Linné");
/// event.add_runner("Anna Berg", Some(club), Some(class));
///
/// assert_eq!(event.status().competitors, 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryEvent {
    name: Option<String>,
    date: Option<String>,
    shared_database: bool,
    classes: Vec<Class>,
    clubs: Vec<Club>,
    controls: Vec<Control>,
    competitors: Vec<Competitor>,
    teams: Vec<Team>,
    runner_database: Vec<DatabaseRunner>,
    images: HashMap<u64, Vec<u8>>,
    next_id: Id,
    entries_added: u64,
}

impl MemoryEvent {
    /// Host state with no event loaded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Loaded, empty event
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Set the event date
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Mark the event as stored in a shared database
    pub fn with_shared_database(mut self, shared: bool) -> Self {
        self.shared_database = shared;
        self
    }

    /// Whether an event is loaded
    pub fn is_loaded(&self) -> bool {
        self.name.is_some()
    }

    fn allocate_id(&mut self) -> Id {
        self.next_id += 1;
        self.next_id
    }

    /// Add a class and return its id
    pub fn add_class(&mut self, name: impl Into<String>, quick_entry: bool) -> Id {
        let id = self.allocate_id();
        self.classes.push(Class {
            id,
            name: name.into(),
            quick_entry,
            legs: 1,
        });
        id
    }

    /// Add a relay class with `legs` legs and return its id
    pub fn add_relay_class(&mut self, name: impl Into<String>, legs: u32) -> Id {
        let id = self.add_class(name, false);
        if let Some(class) = self.classes.iter_mut().find(|c| c.id == id) {
            class.legs = legs.max(1);
        }
        id
    }

    /// Add a club and return its id
    pub fn add_club(&mut self, name: impl Into<String>) -> Id {
        let id = self.allocate_id();
        self.clubs.push(Club {
            id,
            name: name.into(),
        });
        id
    }

    /// Add a control and return its id
    pub fn add_control(&mut self, name: impl Into<String>, codes: &[u32]) -> Id {
        let id = self.allocate_id();
        self.controls.push(Control {
            id,
            name: name.into(),
            codes: codes.to_vec(),
        });
        id
    }

    /// Add a competitor and return its id
    pub fn add_runner(
        &mut self,
        name: impl Into<String>,
        club: Option<Id>,
        class: Option<Id>,
    ) -> Id {
        let id = self.allocate_id();
        let mut competitor = Competitor::new(id, name);
        competitor.club = club;
        competitor.class = class;
        self.competitors.push(competitor);
        id
    }

    /// Mutable access to a competitor, e.g. to set card, times or status
    pub fn competitor_mut(&mut self, id: Id) -> Option<&mut Competitor> {
        self.competitors.iter_mut().find(|c| c.id == id)
    }

    /// Add a team and return its id
    pub fn add_team(
        &mut self,
        name: impl Into<String>,
        club: Option<Id>,
        class: Option<Id>,
        members: Vec<Id>,
    ) -> Id {
        let id = self.allocate_id();
        self.teams.push(Team {
            id,
            name: name.into(),
            club,
            class,
            members,
        });
        id
    }

    /// Add a runner to the runner database
    pub fn add_database_runner(&mut self, runner: DatabaseRunner) {
        self.runner_database.push(runner);
    }

    /// Store an image under `id`
    pub fn add_image(&mut self, id: u64, png: Vec<u8>) {
        self.images.insert(id, png);
    }

    /// Number of competitors created through [`DomainModel::add_competitor`]
    pub fn entries_added(&self) -> u64 {
        self.entries_added
    }

    fn require_loaded(&self) -> Result<&str, DomainError> {
        self.name.as_deref().ok_or(DomainError::NoEvent)
    }

    fn club_name(&self, id: Option<Id>) -> String {
        id.and_then(|id| self.clubs.iter().find(|c| c.id == id))
            .map(|c| c.name.clone())
            .unwrap_or_default()
    }

    fn selected_classes(&self, filter: &[Id]) -> Result<Vec<&Class>, DomainError> {
        if let Some(&missing) = filter
            .iter()
            .find(|&&id| !self.classes.iter().any(|c| c.id == id))
        {
            return Err(DomainError::UnknownClass(missing));
        }
        Ok(self
            .classes
            .iter()
            .filter(|c| filter.is_empty() || filter.contains(&c.id))
            .collect())
    }

    fn ranked(&self, class: Id) -> Vec<ResultRow> {
        let mut finished: Vec<&Competitor> = self
            .competitors
            .iter()
            .filter(|c| c.class == Some(class) && c.status == RunnerStatus::Ok && c.time.is_some())
            .collect();
        finished.sort_by_key(|c| (c.time, c.id));

        let mut rows = Vec::with_capacity(finished.len());
        let mut place = 0;
        let mut previous = None;
        for (index, competitor) in finished.into_iter().enumerate() {
            if previous != competitor.time {
                place = index as u32 + 1;
                previous = competitor.time;
            }
            rows.push(ResultRow {
                place: Some(place),
                competitor: competitor.clone(),
            });
        }

        let mut others: Vec<&Competitor> = self
            .competitors
            .iter()
            .filter(|c| c.class == Some(class) && !(c.status == RunnerStatus::Ok && c.time.is_some()))
            .collect();
        others.sort_by_key(|c| (c.status == RunnerStatus::Unknown, c.id));
        rows.extend(others.into_iter().map(|c| ResultRow {
            place: None,
            competitor: c.clone(),
        }));
        rows
    }

    fn on_leg(&self, competitor: Id, leg: Option<u32>) -> bool {
        match leg {
            None => true,
            Some(leg) => self.teams.iter().any(|team| {
                leg >= 1 && team.members.get(leg as usize - 1) == Some(&competitor)
            }),
        }
    }
}

fn format_clock(seconds: u32) -> String {
    format!(
        "{}:{:02}:{:02}",
        seconds / 3600,
        (seconds / 60) % 60,
        seconds % 60
    )
}

fn format_running_time(seconds: u32) -> String {
    if seconds >= 3600 {
        format_clock(seconds)
    } else {
        format!("{}:{:02}", seconds / 60, seconds % 60)
    }
}

impl DomainModel for MemoryEvent {
    fn status(&self) -> EventStatus {
        EventStatus {
            event: self.name.clone(),
            date: self.date.clone(),
            shared_database: self.shared_database,
            competitors: self.competitors.len(),
        }
    }

    fn classes(&self) -> Vec<Class> {
        self.classes.clone()
    }

    fn clubs(&self) -> Vec<Club> {
        self.clubs.clone()
    }

    fn controls(&self) -> Vec<Control> {
        self.controls.clone()
    }

    fn competitors(&self) -> Vec<Competitor> {
        self.competitors.clone()
    }

    fn teams(&self) -> Vec<Team> {
        self.teams.clone()
    }

    fn results(&self, classes: &[Id]) -> Result<Vec<ResultRow>, DomainError> {
        self.require_loaded()?;
        Ok(self
            .selected_classes(classes)?
            .into_iter()
            .flat_map(|class| self.ranked(class.id))
            .collect())
    }

    fn render_list(&self, config: &ListConfiguration) -> Result<RenderedList, DomainError> {
        let event = self.require_loaded()?;
        let classes = self.selected_classes(&config.classes)?;

        let (heading, columns): (&str, &[&str]) = match config.kind {
            ListKind::StartList => ("Start list", &["Start", "Name", "Club", "Bib"]),
            ListKind::ResultList => ("Results", &["Place", "Name", "Club", "Time"]),
            ListKind::EntryList => ("Entries", &["Name", "Club", "Card"]),
        };
        let mut title = format!("{} - {}", heading, event);
        if let Some(leg) = config.leg {
            title.push_str(&format!(", leg {}", leg));
        }

        let mut sections = Vec::with_capacity(classes.len());
        for class in classes {
            let mut rows: Vec<Vec<String>> = match config.kind {
                ListKind::StartList => {
                    let mut starters: Vec<&Competitor> = self
                        .competitors
                        .iter()
                        .filter(|c| c.class == Some(class.id) && self.on_leg(c.id, config.leg))
                        .collect();
                    starters.sort_by_key(|c| (c.start.is_none(), c.start, c.id));
                    starters
                        .into_iter()
                        .map(|c| {
                            vec![
                                c.start.map(format_clock).unwrap_or_default(),
                                c.name.clone(),
                                self.club_name(c.club),
                                c.bib.clone().unwrap_or_default(),
                            ]
                        })
                        .collect()
                }
                ListKind::ResultList => self
                    .ranked(class.id)
                    .into_iter()
                    .filter(|row| self.on_leg(row.competitor.id, config.leg))
                    .map(|row| {
                        let c = row.competitor;
                        let time = match (row.place, c.time) {
                            (Some(_), Some(time)) => format_running_time(time),
                            _ => c.status.code().to_string(),
                        };
                        vec![
                            row.place.map(|p| format!("{}.", p)).unwrap_or_default(),
                            c.name,
                            self.club_name(c.club),
                            time,
                        ]
                    })
                    .collect(),
                ListKind::EntryList => self
                    .competitors
                    .iter()
                    .filter(|c| c.class == Some(class.id) && self.on_leg(c.id, config.leg))
                    .map(|c| {
                        vec![
                            c.name.clone(),
                            self.club_name(c.club),
                            c.card.map(|card| card.to_string()).unwrap_or_default(),
                        ]
                    })
                    .collect(),
            };
            if let Some(limit) = config.limit {
                rows.truncate(limit);
            }
            sections.push(ListSection {
                heading: class.name.clone(),
                rows,
            });
        }

        Ok(RenderedList {
            title,
            columns: columns.iter().map(|c| c.to_string()).collect(),
            sections,
        })
    }

    fn image(&self, id: u64) -> Result<Vec<u8>, DomainError> {
        self.images
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::NotFound {
                kind: "Image",
                id: id.to_string(),
            })
    }

    fn runner_database(&self, name: Option<&str>, card: Option<u32>) -> Option<DatabaseRunner> {
        if name.is_none() && card.is_none() {
            return None;
        }
        self.runner_database
            .iter()
            .find(|runner| {
                let name_matches =
                    name.map_or(true, |name| runner.name.eq_ignore_ascii_case(name.trim()));
                let card_matches = card.map_or(true, |card| runner.card == Some(card));
                name_matches && card_matches
            })
            .cloned()
    }

    fn add_competitor(&mut self, entry: &NewEntry) -> Result<Competitor, DomainError> {
        self.require_loaded()?;
        if !self.classes.iter().any(|c| c.id == entry.class) {
            return Err(DomainError::UnknownClass(entry.class));
        }
        let name = entry.name.trim();
        if name.is_empty() {
            return Err(DomainError::InvalidEntry("Name is missing".to_string()));
        }
        if let Some(card) = entry.card {
            if self.competitors.iter().any(|c| c.card == Some(card)) {
                return Err(DomainError::InvalidEntry(format!(
                    "Card {} is already in use",
                    card
                )));
            }
        }

        let club = match entry.club.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(club_name) => Some(
                match self
                    .clubs
                    .iter()
                    .find(|c| c.name.eq_ignore_ascii_case(club_name))
                {
                    Some(club) => club.id,
                    None => self.add_club(club_name),
                },
            ),
            None => None,
        };

        let id = self.add_runner(name, club, Some(entry.class));
        if let Some(competitor) = self.competitor_mut(id) {
            competitor.card = entry.card;
        }
        self.entries_added += 1;
        self.competitors
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| DomainError::Other("Competitor vanished after entry".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> (MemoryEvent, Id, Id) {
        let mut event = MemoryEvent::new("Spring Cup").with_date("2026-05-01");
        let h21 = event.add_class("H21", false);
        let d21 = event.add_class("D21", true);
        let club = event.add_club("OK Linné");
        for (name, time, status) in [
            ("Anna", Some(1900), RunnerStatus::Ok),
            ("Berit", Some(1800), RunnerStatus::Ok),
            ("Cecilia", Some(1900), RunnerStatus::Ok),
            ("Dora", None, RunnerStatus::DidNotFinish),
        ] {
            let id = event.add_runner(name, Some(club), Some(d21));
            let competitor = event.competitor_mut(id).unwrap();
            competitor.time = time;
            competitor.status = status;
        }
        event.add_runner("Erik", Some(club), Some(h21));
        (event, h21, d21)
    }

    #[test]
    fn test_results_rank_ties() {
        let (event, _, d21) = sample_event();
        let rows = event.results(&[d21]).unwrap();
        let places: Vec<_> = rows
            .iter()
            .map(|r| (r.competitor.name.as_str(), r.place))
            .collect();
        assert_eq!(
            places,
            vec![
                ("Berit", Some(1)),
                ("Anna", Some(2)),
                ("Cecilia", Some(2)),
                ("Dora", None)
            ]
        );
    }

    #[test]
    fn test_results_unknown_class() {
        let (event, _, _) = sample_event();
        assert_eq!(event.results(&[999]), Err(DomainError::UnknownClass(999)));
        assert_eq!(MemoryEvent::empty().results(&[]), Err(DomainError::NoEvent));
    }

    #[test]
    fn test_render_result_list() {
        let (event, _, d21) = sample_event();
        let mut config = ListConfiguration::new(ListKind::ResultList).with_classes([d21]);
        config.limit = Some(3);
        let list = event.render_list(&config).unwrap();

        assert_eq!(list.title, "Results - Spring Cup");
        assert_eq!(list.sections.len(), 1);
        assert_eq!(list.sections[0].heading, "D21");
        assert_eq!(list.sections[0].rows.len(), 3);
        assert_eq!(list.sections[0].rows[0], vec!["1.", "Berit", "OK Linné", "30:00"]);
    }

    #[test]
    fn test_add_competitor_creates_club() {
        let (mut event, h21, _) = sample_event();
        let entry = NewEntry {
            name: " Fredrik ".to_string(),
            club: Some("IFK Lidingö".to_string()),
            class: h21,
            card: Some(500123),
            birth_year: None,
        };
        let competitor = event.add_competitor(&entry).unwrap();
        assert_eq!(competitor.name, "Fredrik");
        assert_eq!(competitor.card, Some(500123));
        assert_eq!(event.clubs().len(), 2);
        assert_eq!(event.entries_added(), 1);

        // Same card twice is rejected
        assert!(matches!(
            event.add_competitor(&entry),
            Err(DomainError::InvalidEntry(_))
        ));
        assert_eq!(event.entries_added(), 1);
    }

    #[test]
    fn test_runner_database_lookup() {
        let mut event = MemoryEvent::new("Test");
        event.add_database_runner(DatabaseRunner {
            name: "Gustav Holm".to_string(),
            club: Some("OK Linné".to_string()),
            card: Some(4711),
            birth_year: Some(1990),
        });
        assert!(event.runner_database(Some("gustav holm"), None).is_some());
        assert!(event.runner_database(None, Some(4711)).is_some());
        assert!(event.runner_database(Some("Gustav Holm"), Some(1)).is_none());
        assert!(event.runner_database(None, None).is_none());
    }

    #[test]
    fn test_time_formatting() {
        assert_eq!(format_clock(36_000 + 125), "10:02:05");
        assert_eq!(format_running_time(1805), "30:05");
        assert_eq!(format_running_time(3725), "1:02:05");
    }
}
