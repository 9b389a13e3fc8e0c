//! Route records and per-page fragments.
//!
//! A [`Route`] is created once by the extraction run and never mutated
//! afterwards. `grade`, `block` and `sector` are opaque strings: no grade
//! vocabulary is enforced, and an empty value counts as missing.
//!
//! Fragments are read leniently. The typed fields are derived from the
//! route object without ever rejecting it, and the object itself is kept in
//! [`Route::source`] and written back unchanged, so the consolidated catalog
//! echoes the fragments it was built from.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// A route object exactly as it appears in a fragment.
pub type RouteObject = Map<String, Value>;

/// A single climbing route extracted from one guidebook page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RouteObject", into = "RouteObject")]
pub struct Route {
    /// Route number as printed in the guidebook (`id_number`, or `id`).
    /// 0 when missing or not a whole number; the original value stays in
    /// [`Route::source`].
    pub id: u32,

    pub name: String,

    /// Difficulty token, e.g. `V0`..`V10`.
    pub grade: Option<String>,

    /// How to start and climb the route.
    pub description: String,

    /// Guidebook page the route is described on. 0 when unknown.
    pub page_number: u32,

    pub block: Option<String>,

    pub sector: Option<String>,

    /// The object this route was read from. Serialisation writes it back
    /// verbatim; a route built in code (empty `source`) is serialised from
    /// its typed fields instead.
    pub source: RouteObject,
}

impl From<RouteObject> for Route {
    fn from(source: RouteObject) -> Self {
        Self {
            id: whole_number(source.get("id_number").or_else(|| source.get("id"))),
            name: text(source.get("name")).unwrap_or_default(),
            grade: text(source.get("grade")),
            description: text(source.get("description")).unwrap_or_default(),
            page_number: whole_number(source.get("page_number")),
            block: text(source.get("block")),
            sector: text(source.get("sector")),
            source,
        }
    }
}

impl From<Route> for RouteObject {
    fn from(route: Route) -> Self {
        if !route.source.is_empty() {
            return route.source;
        }
        let mut object = Map::new();
        object.insert("id_number".into(), route.id.into());
        object.insert("name".into(), route.name.into());
        if let Some(grade) = route.grade {
            object.insert("grade".into(), grade.into());
        }
        object.insert("description".into(), route.description.into());
        object.insert("page_number".into(), route.page_number.into());
        if let Some(block) = route.block {
            object.insert("block".into(), block.into());
        }
        if let Some(sector) = route.sector {
            object.insert("sector".into(), sector.into());
        }
        object
    }
}

/// Strings as-is, numbers and booleans as their JSON text; `null`, arrays
/// and objects as missing.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Non-negative integers, also when written as a string (`"12"`); anything
/// else is 0.
fn whole_number(value: Option<&Value>) -> u32 {
    match value {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()).unwrap_or(0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

impl Route {
    /// Grade, or `None` when absent or empty.
    pub fn grade(&self) -> Option<&str> {
        non_empty(self.grade.as_deref())
    }

    /// Block name, or `None` when absent or empty.
    pub fn block(&self) -> Option<&str> {
        non_empty(self.block.as_deref())
    }

    /// Sector name, or `None` when absent or empty.
    pub fn sector(&self) -> Option<&str> {
        non_empty(self.sector.as_deref())
    }

    /// Short label used in route pickers: `"{name} ({grade})"`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.grade().unwrap_or(""))
    }

    /// Full heading: `"{sector} / {block} / {name} - {grade}"`.
    pub fn heading(&self) -> String {
        format!(
            "{} / {} / {} - {}",
            self.sector().unwrap_or(""),
            self.block().unwrap_or(""),
            self.name,
            self.grade().unwrap_or("")
        )
    }

    /// Location of this route's guidebook page image inside `image_folder`.
    pub fn image_path(&self, image_folder: &Path) -> PathBuf {
        page_image_path(image_folder, self.page_number)
    }
}

/// One structured guidebook page, as produced by the extraction step and
/// stored as `page_{N}.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CroquiPage {
    /// Page-level text: warnings, access notes, etc.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub page_message: String,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub routes: Vec<Route>,
}

/// `folder/page_{N}.png`
pub fn page_image_path(folder: &Path, page_number: u32) -> PathBuf {
    folder.join(format!("page_{page_number}.png"))
}

/// `folder/page_{N}.txt`
pub fn page_text_path(folder: &Path, page_number: u32) -> PathBuf {
    folder.join(format!("page_{page_number}.txt"))
}

/// `folder/page_{N}.json`
pub fn page_fragment_path(folder: &Path, page_number: u32) -> PathBuf {
    folder.join(format!("page_{page_number}.json"))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
