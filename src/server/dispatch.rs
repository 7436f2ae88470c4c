//! Request classification and answer computation
//!
//! Everything here runs on the application thread inside the drain step and
//! is the only code that talks to the domain model.

use crate::cache::{ImageCache, RenderCache, SlotId};
use crate::config::{ClassPolicy, EntrantPolicy, ServiceConfig};
use crate::domain::{
    Competitor, DomainError, DomainModel, Id, ListConfiguration, ListKind, NewEntry, RenderedList,
};
use crate::payload::{escape, html_list, html_page, XmlWriter};
use crate::queue::{Answer, Parameters};
use std::collections::HashMap;
use std::fmt::Write;
use thiserror::Error;

/// Bytes of the built-in logo served for `image=meos`
pub const LOGO_PNG: &[u8] = include_bytes!("../../assets/logo.png");

/// Image token of the built-in logo
pub const LOGO_TOKEN: &str = "meos";

/// Prefix of every textual error answer
pub const ERROR_PREFIX: &str = "Error (MeOS): ";

/// Top-level request verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    /// Submit a new competitor
    Entry,
    /// Structured data export
    Get,
    /// Single-entity search
    Lookup,
    /// Templated page by tag
    Page,
    /// Entry form page
    Enter,
    /// Binary image asset
    Image,
    /// Rendered list
    Html,
    /// Request without parameters
    Root,
}

impl Verb {
    /// Verbs in classification priority order
    const PRIORITY: [(&'static str, Verb); 7] = [
        ("entry", Verb::Entry),
        ("get", Verb::Get),
        ("lookup", Verb::Lookup),
        ("page", Verb::Page),
        ("enter", Verb::Enter),
        ("image", Verb::Image),
        ("html", Verb::Html),
    ];

    /// Parameter key carrying the verb
    pub fn key(&self) -> &'static str {
        Self::PRIORITY
            .iter()
            .find(|(_, verb)| verb == self)
            .map_or("", |(key, _)| *key)
    }
}

/// Classify a request by its parameters
///
/// The highest-priority verb present wins, so `get=status&html=2` is a `get`.
pub fn classify(params: &Parameters) -> Result<Verb, DispatchError> {
    if params.is_empty() {
        return Ok(Verb::Root);
    }
    Verb::PRIORITY
        .iter()
        .find(|(key, _)| params.contains_key(key))
        .map(|&(_, verb)| verb)
        .ok_or(DispatchError::UnknownCommand)
}

/// Failures turned into a textual answer at the dispatch boundary
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The domain model reported an error
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// No known verb in the request
    #[error("Unknown command")]
    UnknownCommand,
    /// Known verb with an unknown sub-type
    #[error("Unknown request '{0}'")]
    UnknownRequest(String),
    /// A required parameter is absent
    #[error("Missing parameter '{0}'")]
    MissingParameter(&'static str),
    /// A parameter could not be parsed
    #[error("Invalid value '{value}' for '{name}'")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Offending value
        value: String,
    },
    /// `html=<n>` names a slot that does not exist
    #[error("Unknown list {0}")]
    UnknownSlot(SlotId),
    /// `page=<tag>` names no registered page
    #[error("Unknown page '{0}'")]
    UnknownPage(String),
    /// Domain code panicked
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Text answer reporting this error to the client
    pub fn to_answer(&self) -> Answer {
        Answer::Text(format!("{}{}", ERROR_PREFIX, self))
    }
}

type DispatchResult = Result<Answer, DispatchError>;

fn parse_param<T: std::str::FromStr>(
    params: &Parameters,
    name: &'static str,
) -> Result<Option<T>, DispatchError> {
    match params.get(name).map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| DispatchError::InvalidParameter {
                name,
                value: value.to_string(),
            }),
    }
}

/// Ids from every occurrence of `name`, each possibly a `;` or `,` separated list
fn id_list(params: &Parameters, name: &'static str) -> Result<Vec<Id>, DispatchError> {
    let mut ids = Vec::new();
    for value in params.get_all(name) {
        for part in value.split([';', ',']).map(str::trim).filter(|p| !p.is_empty()) {
            let id = part.parse().map_err(|_| DispatchError::InvalidParameter {
                name,
                value: part.to_string(),
            })?;
            ids.push(id);
        }
    }
    Ok(ids)
}

fn opt_attr(value: Option<impl ToString>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn entry_response(status: &str, info: &str, competitor: Option<&Competitor>) -> Answer {
    let mut xml = XmlWriter::new();
    xml.open("EntryResponse", &[]);
    xml.element("Status", &[], status);
    xml.element("Info", &[], info);
    if let Some(c) = competitor {
        let id = c.id.to_string();
        xml.open("Competitor", &[("id", &id)]);
        xml.element("Name", &[], &c.name);
        xml.element("Class", &[], &opt_attr(c.class));
        xml.element("Card", &[], &opt_attr(c.card));
        xml.close();
    }
    Answer::Text(xml.finish())
}

fn entry_denied(reason: &str) -> Answer {
    entry_response("Failed", reason, None)
}

/// Per-event state the dispatcher keeps between requests
#[derive(Debug, Default)]
pub(crate) struct Dispatcher {
    pub(crate) lists: RenderCache<ListConfiguration, RenderedList>,
    pub(crate) images: ImageCache,
    pub(crate) pages: HashMap<String, String>,
}

impl Dispatcher {
    /// Compute the answer for one request
    pub(crate) fn answer<M: DomainModel + ?Sized>(
        &mut self,
        config: &ServiceConfig,
        model: &mut M,
        params: &Parameters,
    ) -> DispatchResult {
        match classify(params)? {
            Verb::Root => match config.root_parameters() {
                Some(mapped) => self.answer(config, model, &mapped),
                None => Ok(self.root_page(model)),
            },
            Verb::Entry => self.entry(config, model, params),
            Verb::Get => {
                let what = params.get("get").unwrap_or_default();
                self.get(config, model, what, params)
            }
            Verb::Lookup => {
                let what = params.get("lookup").unwrap_or_default();
                self.lookup(model, what, params)
            }
            Verb::Page => {
                let tag = params.get("page").unwrap_or_default();
                self.page(model, tag)
            }
            Verb::Enter => {
                let tag = params
                    .get("enter")
                    .filter(|t| !t.is_empty())
                    .unwrap_or("enter");
                self.page(model, tag)
            }
            Verb::Image => {
                let token = params.get("image").unwrap_or_default();
                self.image(model, token)
            }
            Verb::Html => {
                let what = params.get("html").unwrap_or_default();
                self.html(model, what, params)
            }
        }
    }

    fn root_page<M: DomainModel + ?Sized>(&self, model: &M) -> Answer {
        let status = model.status();
        let Some(event) = status.event else {
            return Answer::Text(html_page("MeOS", "<h1>MeOS</h1>\n<p>No event is loaded</p>\n"));
        };

        let mut body = format!("<h1>{}</h1>\n", escape(&event));
        for kind in ListKind::all() {
            let _ = writeln!(
                body,
                "<h2><a href=\"/meos?html={kind}\">{kind}</a></h2>\n<ul>"
            );
            for class in model.classes() {
                let _ = writeln!(
                    body,
                    "<li><a href=\"/meos?html={}&amp;class={}\">{}</a></li>",
                    kind,
                    class.id,
                    escape(&class.name)
                );
            }
            body.push_str("</ul>\n");
        }
        Answer::Text(html_page(&event, &body))
    }

    fn get<M: DomainModel + ?Sized>(
        &self,
        config: &ServiceConfig,
        model: &M,
        what: &str,
        params: &Parameters,
    ) -> DispatchResult {
        let mut xml = XmlWriter::new();
        match what.to_ascii_lowercase().as_str() {
            "status" => {
                let status = model.status();
                xml.open("Status", &[]);
                match &status.event {
                    Some(name) => xml.element("Event", &[("loaded", "true")], name),
                    None => xml.element("Event", &[("loaded", "false")], "No event"),
                };
                if status.shared_database {
                    xml.element("Database", &[("shared", "true")], "Shared database");
                } else {
                    xml.element(
                        "Database",
                        &[("shared", "false")],
                        "Not using a shared database",
                    );
                }
                if let Some(date) = &status.date {
                    xml.element("Date", &[], date);
                }
                xml.element("Competitors", &[], &status.competitors.to_string());
            }
            "class" => {
                xml.open("Classes", &[]);
                for class in model.classes() {
                    let id = class.id.to_string();
                    let legs = class.legs.to_string();
                    xml.element("Class", &[("id", &id), ("legs", &legs)], &class.name);
                }
            }
            "entryclass" => {
                xml.open("EntryClasses", &[]);
                let entries_open = config.entry.who != EntrantPolicy::None;
                for class in model.classes().into_iter().filter(|class| {
                    entries_open
                        && match config.entry.classes {
                            ClassPolicy::None => false,
                            ClassPolicy::Any => true,
                            ClassPolicy::QuickEntry => class.quick_entry,
                        }
                }) {
                    let id = class.id.to_string();
                    xml.element("Class", &[("id", &id)], &class.name);
                }
            }
            "organization" | "club" => {
                xml.open("Organizations", &[]);
                for club in model.clubs() {
                    let id = club.id.to_string();
                    xml.element("Organization", &[("id", &id)], &club.name);
                }
            }
            "control" => {
                xml.open("Controls", &[]);
                for control in model.controls() {
                    let id = control.id.to_string();
                    let codes = control
                        .codes
                        .iter()
                        .map(u32::to_string)
                        .collect::<Vec<_>>()
                        .join(";");
                    xml.element("Control", &[("id", &id), ("codes", &codes)], &control.name);
                }
            }
            "competitor" => {
                let classes = id_list(params, "class")?;
                xml.open("Competitors", &[]);
                for c in model
                    .competitors()
                    .into_iter()
                    .filter(|c| classes.is_empty() || c.class.map_or(false, |id| classes.contains(&id)))
                {
                    write_competitor(&mut xml, &c);
                }
            }
            "team" => {
                let classes = id_list(params, "class")?;
                xml.open("Teams", &[]);
                for team in model
                    .teams()
                    .into_iter()
                    .filter(|t| classes.is_empty() || t.class.map_or(false, |id| classes.contains(&id)))
                {
                    let id = team.id.to_string();
                    let class = opt_attr(team.class);
                    let club = opt_attr(team.club);
                    let members = team
                        .members
                        .iter()
                        .map(Id::to_string)
                        .collect::<Vec<_>>()
                        .join(";");
                    xml.open("Team", &[("id", &id), ("class", &class), ("club", &club)]);
                    xml.element("Name", &[], &team.name);
                    xml.element("Members", &[], &members);
                    xml.close();
                }
            }
            "result" => {
                let classes = id_list(params, "class")?;
                let rows = model.results(&classes)?;
                xml.open("Results", &[]);
                for row in rows {
                    let c = &row.competitor;
                    let id = c.id.to_string();
                    let place = opt_attr(row.place);
                    let class = opt_attr(c.class);
                    xml.open(
                        "Result",
                        &[("id", &id), ("class", &class), ("place", &place)],
                    );
                    xml.element("Name", &[], &c.name);
                    xml.element("Time", &[], &opt_attr(c.time));
                    xml.element("Status", &[], c.status.code());
                    xml.close();
                }
            }
            other => return Err(DispatchError::UnknownRequest(other.to_string())),
        }
        Ok(Answer::Text(xml.finish()))
    }

    fn lookup<M: DomainModel + ?Sized>(
        &self,
        model: &M,
        what: &str,
        params: &Parameters,
    ) -> DispatchResult {
        let name = params
            .get("name")
            .map(str::trim)
            .filter(|n| !n.is_empty());
        let card: Option<u32> = parse_param(params, "card")?;

        let mut xml = XmlWriter::new();
        match what.to_ascii_lowercase().as_str() {
            "competitor" => {
                let id: Option<Id> = parse_param(params, "id")?;
                let bib = params.get("bib").map(str::trim).filter(|b| !b.is_empty());
                if id.is_none() && card.is_none() && bib.is_none() && name.is_none() {
                    return Err(DispatchError::MissingParameter("id, card, bib or name"));
                }
                xml.open("Competitors", &[]);
                for c in model.competitors().into_iter().filter(|c| {
                    id.map_or(true, |id| c.id == id)
                        && card.map_or(true, |card| c.card == Some(card))
                        && bib.map_or(true, |bib| c.bib.as_deref() == Some(bib))
                        && name.map_or(true, |name| c.name.eq_ignore_ascii_case(name))
                }) {
                    write_competitor(&mut xml, &c);
                }
            }
            "dbcompetitor" => {
                if name.is_none() && card.is_none() {
                    return Err(DispatchError::MissingParameter("card or name"));
                }
                xml.open("DatabaseCompetitors", &[]);
                if let Some(runner) = model.runner_database(name, card) {
                    xml.open("DatabaseCompetitor", &[]);
                    xml.element("Name", &[], &runner.name);
                    xml.element("Club", &[], runner.club.as_deref().unwrap_or_default());
                    xml.element("Card", &[], &opt_attr(runner.card));
                    xml.element("BirthYear", &[], &opt_attr(runner.birth_year));
                    xml.close();
                }
            }
            other => return Err(DispatchError::UnknownRequest(other.to_string())),
        }
        Ok(Answer::Text(xml.finish()))
    }

    fn page<M: DomainModel + ?Sized>(&self, model: &M, tag: &str) -> DispatchResult {
        let template = self
            .pages
            .get(tag)
            .ok_or_else(|| DispatchError::UnknownPage(tag.to_string()))?;
        let status = model.status();
        let page = template
            .replace("{{event}}", &escape(status.event.as_deref().unwrap_or_default()))
            .replace("{{date}}", &escape(status.date.as_deref().unwrap_or_default()));
        Ok(Answer::Text(page))
    }

    fn image<M: DomainModel + ?Sized>(&mut self, model: &M, token: &str) -> DispatchResult {
        let token = token.trim().to_ascii_lowercase();
        let token = token.strip_suffix(".png").unwrap_or(&token);
        if token == LOGO_TOKEN {
            let bytes = self
                .images
                .get_or_load::<DispatchError, _>(token, |_| Ok(LOGO_PNG.to_vec()))?;
            return Ok(Answer::Image(bytes));
        }
        let id: u64 = token.parse().map_err(|_| DispatchError::InvalidParameter {
            name: "image",
            value: token.to_string(),
        })?;
        let bytes = self
            .images
            .get_or_load(token, |_| model.image(id).map_err(DispatchError::from))?;
        Ok(Answer::Image(bytes))
    }

    fn html<M: DomainModel + ?Sized>(
        &mut self,
        model: &M,
        what: &str,
        params: &Parameters,
    ) -> DispatchResult {
        let what = what.trim();
        let slot = if let Ok(slot) = what.parse::<SlotId>() {
            if self.lists.configuration(slot).is_none() {
                return Err(DispatchError::UnknownSlot(slot));
            }
            slot
        } else if let Ok(kind) = what.parse::<ListKind>() {
            let mut config = ListConfiguration::new(kind).with_classes(id_list(params, "class")?);
            config.leg = parse_param(params, "leg")?;
            config.limit = parse_param(params, "limit")?;
            self.lists.get_or_create_slot(&config)
        } else {
            return Err(DispatchError::UnknownRequest(what.to_string()));
        };

        match self.lists.get_rendered(slot, |config| model.render_list(config)) {
            Some(Ok(list)) => Ok(Answer::Text(html_list(list))),
            Some(Err(err)) => Err(err.into()),
            None => Err(DispatchError::UnknownSlot(slot)),
        }
    }

    fn entry<M: DomainModel + ?Sized>(
        &mut self,
        config: &ServiceConfig,
        model: &mut M,
        params: &Parameters,
    ) -> DispatchResult {
        let policy = config.entry;
        if policy.is_closed() {
            return Ok(entry_denied("Permission denied"));
        }

        let Some(name) = params.get("name").map(str::trim).filter(|n| !n.is_empty()) else {
            return Ok(entry_denied("Name is missing"));
        };
        let Ok(Some(class_id)) = parse_param::<Id>(params, "class") else {
            return Ok(entry_denied("Class is missing or invalid"));
        };
        let Ok(card) = parse_param::<u32>(params, "card") else {
            return Ok(entry_denied("Invalid card number"));
        };
        let Ok(birth_year) = parse_param::<u16>(params, "birth") else {
            return Ok(entry_denied("Invalid birth year"));
        };
        let mut club = params
            .get("club")
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string);

        let Some(class) = model.class(class_id) else {
            return Ok(entry_denied("Unknown class"));
        };
        if policy.classes == ClassPolicy::QuickEntry && !class.quick_entry {
            return Ok(entry_denied("Permission denied: class is not open for entry"));
        }

        match policy.who {
            EntrantPolicy::None => return Ok(entry_denied("Permission denied")),
            EntrantPolicy::Any => {}
            EntrantPolicy::RunnerDatabase | EntrantPolicy::DatabaseAndExistingClub => {
                let Some(runner) = model.runner_database(Some(name), card) else {
                    return Ok(entry_denied("Permission denied: not in runner database"));
                };
                if policy.who == EntrantPolicy::DatabaseAndExistingClub {
                    let runner_club = runner.club.as_deref().unwrap_or_default();
                    let club_exists = !runner_club.is_empty()
                        && model
                            .clubs()
                            .iter()
                            .any(|c| c.name.eq_ignore_ascii_case(runner_club));
                    if !club_exists {
                        return Ok(entry_denied("Permission denied: club is not in the event"));
                    }
                    // The entry is always filed under the database club
                    if club
                        .as_deref()
                        .is_some_and(|c| !c.eq_ignore_ascii_case(runner_club))
                    {
                        return Ok(entry_denied(
                            "Permission denied: club does not match runner database",
                        ));
                    }
                    club = runner.club;
                } else if club.is_none() {
                    club = runner.club;
                }
            }
        }

        let entry = NewEntry {
            name: name.to_string(),
            club,
            class: class.id,
            card,
            birth_year,
        };
        match model.add_competitor(&entry) {
            Ok(competitor) => Ok(entry_response("OK", "Entry accepted", Some(&competitor))),
            Err(DomainError::InvalidEntry(reason)) => Ok(entry_denied(&reason)),
            Err(err) => Err(err.into()),
        }
    }
}

fn write_competitor(xml: &mut XmlWriter, c: &Competitor) {
    let id = c.id.to_string();
    let class = opt_attr(c.class);
    let club = opt_attr(c.club);
    xml.open("Competitor", &[("id", &id), ("class", &class), ("club", &club)]);
    xml.element("Name", &[], &c.name);
    xml.element("Card", &[], &opt_attr(c.card));
    xml.element("Bib", &[], c.bib.as_deref().unwrap_or_default());
    xml.element("Status", &[], c.status.code());
    xml.close();
}
