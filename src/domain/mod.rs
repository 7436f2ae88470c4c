//! Domain-model boundary
//!
//! The event model (classes, competitors, teams, results) belongs to the host
//! application and is not thread-safe. The bridge only ever calls it through
//! [`DomainModel`] from the application thread inside the drain step.
//!
//! [`MemoryEvent`] is a small in-memory implementation used by the
//! `restbridge` binary and the tests.

pub mod memory;

pub use memory::MemoryEvent;

use crate::cache::SlotKey;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Identifier of a class, club, control, competitor or team
pub type Id = u32;

/// Errors raised by the domain model
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// The operation needs a loaded event
    #[error("No event is loaded")]
    NoEvent,
    /// A referenced class does not exist
    #[error("Unknown class {0}")]
    UnknownClass(Id),
    /// A referenced object does not exist
    #[error("{kind} {id} not found")]
    NotFound {
        /// Kind of object
        kind: &'static str,
        /// Requested identifier
        id: String,
    },
    /// An entry was rejected by the model
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),
    /// Any other failure reported by the host
    #[error("{0}")]
    Other(String),
}

/// Overall state of the host application
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventStatus {
    /// Name of the loaded event, `None` when no event is loaded
    pub event: Option<String>,
    /// Event date as displayed by the host
    pub date: Option<String>,
    /// Whether the event is stored in a shared database
    pub shared_database: bool,
    /// Number of registered competitors
    pub competitors: usize,
}

/// Competition class
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Class {
    /// Class id
    pub id: Id,
    /// Display name
    pub name: String,
    /// Whether the class is open for quick entry
    pub quick_entry: bool,
    /// Number of legs for relay classes, 1 otherwise
    pub legs: u32,
}

/// Club or organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Club {
    /// Club id
    pub id: Id,
    /// Display name
    pub name: String,
}

/// Control point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Control {
    /// Control id
    pub id: Id,
    /// Display name
    pub name: String,
    /// Punch codes accepted at the control
    pub codes: Vec<u32>,
}

/// Race status of a competitor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum RunnerStatus {
    /// Not yet finished
    #[default]
    Unknown,
    /// Valid result
    Ok,
    /// Missing punch
    MissingPunch,
    /// Did not finish
    DidNotFinish,
    /// Did not start
    DidNotStart,
    /// Disqualified
    Disqualified,
}

impl RunnerStatus {
    /// Short code used in exported documents
    pub fn code(&self) -> &'static str {
        match self {
            RunnerStatus::Unknown => "Unknown",
            RunnerStatus::Ok => "OK",
            RunnerStatus::MissingPunch => "MP",
            RunnerStatus::DidNotFinish => "DNF",
            RunnerStatus::DidNotStart => "DNS",
            RunnerStatus::Disqualified => "DQ",
        }
    }
}

/// Registered competitor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Competitor {
    /// Competitor id
    pub id: Id,
    /// Full name
    pub name: String,
    /// Club, if any
    pub club: Option<Id>,
    /// Class, if assigned
    pub class: Option<Id>,
    /// Punch card number
    pub card: Option<u32>,
    /// Bib
    pub bib: Option<String>,
    /// Start time in seconds after midnight
    pub start: Option<u32>,
    /// Running time in seconds
    pub time: Option<u32>,
    /// Race status
    pub status: RunnerStatus,
}

impl Competitor {
    /// Competitor with only a name and id set
    pub fn new(id: Id, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            club: None,
            class: None,
            card: None,
            bib: None,
            start: None,
            time: None,
            status: RunnerStatus::Unknown,
        }
    }
}

/// Relay or patrol team
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Team {
    /// Team id
    pub id: Id,
    /// Team name
    pub name: String,
    /// Club, if any
    pub club: Option<Id>,
    /// Class, if assigned
    pub class: Option<Id>,
    /// Competitor ids, one per leg
    pub members: Vec<Id>,
}

/// Entry in the national runner database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseRunner {
    /// Full name
    pub name: String,
    /// Club name
    pub club: Option<String>,
    /// Punch card number
    pub card: Option<u32>,
    /// Birth year
    pub birth_year: Option<u16>,
}

/// New competitor submitted over the network
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    /// Full name
    pub name: String,
    /// Club name, if any
    pub club: Option<String>,
    /// Class to enter
    pub class: Id,
    /// Punch card number
    pub card: Option<u32>,
    /// Birth year
    pub birth_year: Option<u16>,
}

/// One row of a result list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultRow {
    /// Place, `None` for competitors without a valid result
    pub place: Option<u32>,
    /// The competitor
    pub competitor: Competitor,
}

/// Kind of list that can be rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListKind {
    /// Start times per class
    StartList,
    /// Results per class
    ResultList,
    /// Registered entries per class
    EntryList,
}

impl ListKind {
    const NAMES: [(&'static str, ListKind); 3] = [
        ("startlist", ListKind::StartList),
        ("resultlist", ListKind::ResultList),
        ("entrylist", ListKind::EntryList),
    ];

    /// Coarse numeric code of the list type
    pub fn code(&self) -> u32 {
        match self {
            ListKind::StartList => 1,
            ListKind::ResultList => 2,
            ListKind::EntryList => 3,
        }
    }

    /// All list kinds
    pub fn all() -> impl Iterator<Item = ListKind> {
        Self::NAMES.into_iter().map(|(_, kind)| kind)
    }
}

impl FromStr for ListKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|&(_, kind)| kind)
            .ok_or(())
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, kind)| kind == self)
            .map_or("list", |(name, _)| *name);
        f.write_str(name)
    }
}

/// What to render: list kind plus filters and display options
///
/// Equality is structural; class filters are kept sorted and deduplicated so
/// that `class=2;1` and `class=1&class=2` describe the same list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ListConfiguration {
    /// List type
    pub kind: ListKind,
    /// Class filter, empty for all classes
    pub classes: Vec<Id>,
    /// Relay leg, if restricted
    pub leg: Option<u32>,
    /// Maximum rows per class
    pub limit: Option<usize>,
}

impl ListConfiguration {
    /// Unfiltered configuration of a list kind
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            classes: Vec::new(),
            leg: None,
            limit: None,
        }
    }

    /// Restrict to the given classes
    pub fn with_classes(mut self, classes: impl IntoIterator<Item = Id>) -> Self {
        let mut classes: Vec<Id> = classes.into_iter().collect();
        classes.sort_unstable();
        classes.dedup();
        self.classes = classes;
        self
    }

    /// Whether a class passes the class filter
    pub fn includes_class(&self, class: Id) -> bool {
        self.classes.is_empty() || self.classes.binary_search(&class).is_ok()
    }
}

impl SlotKey for ListConfiguration {
    fn coarse_code(&self) -> u32 {
        self.kind.code()
    }
}

/// Rendered list description
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderedList {
    /// List heading
    pub title: String,
    /// Column headings
    pub columns: Vec<String>,
    /// Sections, one per class
    pub sections: Vec<ListSection>,
}

/// One section (class) of a rendered list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListSection {
    /// Section heading
    pub heading: String,
    /// Table rows
    pub rows: Vec<Vec<String>>,
}

/// Operations the bridge needs from the host's event model
///
/// Every method is called on the application thread only.
pub trait DomainModel {
    /// Overall state, also valid when no event is loaded
    fn status(&self) -> EventStatus;

    /// All classes
    fn classes(&self) -> Vec<Class>;

    /// All clubs
    fn clubs(&self) -> Vec<Club>;

    /// All controls
    fn controls(&self) -> Vec<Control>;

    /// All competitors
    fn competitors(&self) -> Vec<Competitor>;

    /// All teams
    fn teams(&self) -> Vec<Team>;

    /// Ranked results of the given classes, all classes if empty
    fn results(&self, classes: &[Id]) -> Result<Vec<ResultRow>, DomainError>;

    /// Compute a list layout
    fn render_list(&self, config: &ListConfiguration) -> Result<RenderedList, DomainError>;

    /// PNG bytes of an image stored in the event
    fn image(&self, id: u64) -> Result<Vec<u8>, DomainError>;

    /// Search the runner database by name and/or card
    fn runner_database(&self, name: Option<&str>, card: Option<u32>) -> Option<DatabaseRunner>;

    /// Register a new competitor
    fn add_competitor(&mut self, entry: &NewEntry) -> Result<Competitor, DomainError>;

    /// A single class by id
    fn class(&self, id: Id) -> Option<Class> {
        self.classes().into_iter().find(|class| class.id == id)
    }

    /// A single club by id
    fn club(&self, id: Id) -> Option<Club> {
        self.clubs().into_iter().find(|club| club.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_kind_names() {
        assert_eq!("ResultList".parse::<ListKind>(), Ok(ListKind::ResultList));
        assert!("podium".parse::<ListKind>().is_err());
        assert_eq!(ListKind::StartList.to_string(), "startlist");
        assert_eq!(ListKind::all().count(), 3);
    }

    #[test]
    fn test_configuration_equality_is_structural() {
        let a = ListConfiguration::new(ListKind::ResultList).with_classes([2, 1, 2]);
        let b = ListConfiguration::new(ListKind::ResultList).with_classes([1, 2]);
        assert_eq!(a, b);
        assert_eq!(a.coarse_code(), 2);
        assert!(a.includes_class(1));
        assert!(!a.includes_class(3));
        assert!(ListConfiguration::new(ListKind::StartList).includes_class(3));

        let mut c = b.clone();
        c.leg = Some(2);
        assert_ne!(b, c);
        assert_eq!(b.coarse_code(), c.coarse_code());
    }

    #[test]
    fn test_domain_error_display() {
        assert_eq!(DomainError::NoEvent.to_string(), "No event is loaded");
        assert_eq!(
            DomainError::NotFound {
                kind: "Image",
                id: "12".to_string()
            }
            .to_string(),
            "Image 12 not found"
        );
    }
}
