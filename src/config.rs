//! Service configuration
//!
//! The entry policy has two independent axes. An entry is accepted only if
//! both allow it:
//!
//! | who may enter | accepted when |
//! |---------------|---------------|
//! | `none` | never |
//! | `any` | always |
//! | `database` | the runner is found in the runner database |
//! | `database-club` | found in the runner database and the club exists in the event |
//!
//! | which classes | accepted when |
//! |---------------|---------------|
//! | `none` | never |
//! | `any` | the class exists |
//! | `quick-entry` | the class is flagged for quick entry |

use crate::metrics::DEFAULT_LEDGER_CAPACITY;
use crate::queue::Parameters;
use crate::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default listen port of the information service
pub const DEFAULT_PORT: u16 = 2009;

/// Default time a network session waits for the application thread
pub const DEFAULT_CEILING: Duration = Duration::from_secs(10);

/// Who may submit an entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EntrantPolicy {
    /// Entries are disabled
    #[default]
    None,
    /// Anyone may enter
    Any,
    /// Only runners found in the runner database
    RunnerDatabase,
    /// Only runners in the runner database whose club exists in the event
    DatabaseAndExistingClub,
}

/// Which classes accept entries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ClassPolicy {
    /// No class accepts entries
    #[default]
    None,
    /// Every class accepts entries
    Any,
    /// Only classes flagged for quick entry
    QuickEntry,
}

impl EntrantPolicy {
    const NAMES: [(&'static str, EntrantPolicy); 4] = [
        ("none", EntrantPolicy::None),
        ("any", EntrantPolicy::Any),
        ("database", EntrantPolicy::RunnerDatabase),
        ("database-club", EntrantPolicy::DatabaseAndExistingClub),
    ];
}

impl ClassPolicy {
    const NAMES: [(&'static str, ClassPolicy); 3] = [
        ("none", ClassPolicy::None),
        ("any", ClassPolicy::Any),
        ("quick-entry", ClassPolicy::QuickEntry),
    ];
}

impl FromStr for EntrantPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|&(_, policy)| policy)
            .ok_or_else(|| Error::InvalidConfig {
                what: "entrant policy",
                value: s.to_string(),
            })
    }
}

impl FromStr for ClassPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::NAMES
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s.trim()))
            .map(|&(_, policy)| policy)
            .ok_or_else(|| Error::InvalidConfig {
                what: "class policy",
                value: s.to_string(),
            })
    }
}

impl fmt::Display for EntrantPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, policy)| policy == self)
            .map_or("none", |(name, _)| *name);
        f.write_str(name)
    }
}

impl fmt::Display for ClassPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = Self::NAMES
            .iter()
            .find(|(_, policy)| policy == self)
            .map_or("none", |(name, _)| *name);
        f.write_str(name)
    }
}

/// Entry permission policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryPermission {
    /// Who may enter
    pub who: EntrantPolicy,
    /// Which classes accept entries
    pub classes: ClassPolicy,
}

impl EntryPermission {
    /// Policy accepting anyone into any class
    pub const OPEN: EntryPermission = EntryPermission {
        who: EntrantPolicy::Any,
        classes: ClassPolicy::Any,
    };

    /// Whether the policy rejects every entry regardless of its content
    pub fn is_closed(&self) -> bool {
        self.who == EntrantPolicy::None || self.classes == ClassPolicy::None
    }
}

/// Configuration of the information service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    /// Listen port
    pub port: u16,
    /// Entry permission policy
    pub entry: EntryPermission,
    /// Query string answered for a request without parameters
    pub root_map: Option<String>,
    /// Maximum time a network session waits for its answer
    pub ceiling: Duration,
    /// Number of response times kept for statistics
    pub ledger_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            entry: EntryPermission::default(),
            root_map: None,
            ceiling: DEFAULT_CEILING,
            ledger_capacity: DEFAULT_LEDGER_CAPACITY,
        }
    }
}

impl ServiceConfig {
    /// Set the listen port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the entry permission policy
    pub fn with_entry(mut self, who: EntrantPolicy, classes: ClassPolicy) -> Self {
        self.entry = EntryPermission { who, classes };
        self
    }

    /// Set the root remapping query string, e.g. `html=resultlist&class=2`
    pub fn with_root_map(mut self, root_map: impl Into<String>) -> Self {
        let root_map = root_map.into();
        self.root_map = if root_map.trim().is_empty() {
            None
        } else {
            Some(root_map)
        };
        self
    }

    /// Set the wait ceiling
    pub fn with_ceiling(mut self, ceiling: Duration) -> Self {
        self.ceiling = ceiling;
        self
    }

    /// Parameters substituted for an empty request, if a root map is set
    pub fn root_parameters(&self) -> Option<Parameters> {
        self.root_map
            .as_deref()
            .map(Parameters::parse_query)
            .filter(|params| !params.is_empty())
    }
}
