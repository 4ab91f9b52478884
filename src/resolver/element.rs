//! Element vocabulary: kinds, descriptors and the caller's configuration

use crate::chat::{ElementAdvert, Question};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

/// Normalized element type
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ElementKind {
    Text,
    Radio,
    MultiSelect,
    Slider,
    Select,
    Dropdown,
    /// Any type outside the built-in set, lowercased
    Custom(String),
}

impl ElementKind {
    /// Case-insensitive; `multiselect` and `multi-select` both mean `multi_select`
    pub fn parse(raw: &str) -> Self {
        let lowered = raw.trim().to_lowercase();
        match lowered.as_str() {
            "text" => ElementKind::Text,
            "radio" => ElementKind::Radio,
            "multi_select" | "multiselect" | "multi-select" => ElementKind::MultiSelect,
            "slider" => ElementKind::Slider,
            "select" => ElementKind::Select,
            "dropdown" => ElementKind::Dropdown,
            _ => ElementKind::Custom(lowered),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Radio => "radio",
            ElementKind::MultiSelect => "multi_select",
            ElementKind::Slider => "slider",
            ElementKind::Select => "select",
            ElementKind::Dropdown => "dropdown",
            ElementKind::Custom(name) => name,
        }
    }

    /// Choice-based kinds, which are rendered from a list of options
    pub fn expects_options(&self) -> bool {
        matches!(
            self,
            ElementKind::Radio
                | ElementKind::MultiSelect
                | ElementKind::Slider
                | ElementKind::Select
                | ElementKind::Dropdown
        )
    }
}

impl FromStr for ElementKind {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ElementKind::parse(s))
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the resolver needs to know about one question
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementDescriptor {
    pub kind: String,
    pub text: String,
    pub options: Option<Vec<String>>,
}

impl ElementDescriptor {
    pub fn new(kind: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            text: text.into(),
            options: None,
        }
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }
}

impl From<&Question> for ElementDescriptor {
    fn from(question: &Question) -> Self {
        Self {
            kind: question.kind.clone(),
            text: question.text.clone(),
            options: question.options.clone(),
        }
    }
}

/// How one element type is rendered, and how it is described to the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec<C> {
    pub component: C,
    pub description: String,
}

/// Caller-supplied mapping from element type to render target.
///
/// Keys are normalized through [`ElementKind::parse`], so lookups are
/// case-insensitive. The same mapping is advertised to the backend as the
/// vocabulary it may choose from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementConfig<C> {
    entries: BTreeMap<String, ElementSpec<C>>,
}

impl<C> Default for ElementConfig<C> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<C> ElementConfig<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, kind: &str, component: C, description: impl Into<String>) -> Self {
        self.insert(kind, component, description);
        self
    }

    /// Returns the previous spec for this type, if any
    pub fn insert(
        &mut self,
        kind: &str,
        component: C,
        description: impl Into<String>,
    ) -> Option<ElementSpec<C>> {
        self.entries.insert(
            normalize_key(kind),
            ElementSpec {
                component,
                description: description.into(),
            },
        )
    }

    pub fn get(&self, kind: &str) -> Option<&ElementSpec<C>> {
        self.entries.get(&normalize_key(kind))
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.entries.contains_key(&normalize_key(kind))
    }

    pub fn component(&self, kind: &str) -> Option<&C> {
        self.get(kind).map(|spec| &spec.component)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ElementSpec<C>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Type names and descriptions, as sent with `start`
    pub fn adverts(&self) -> Vec<ElementAdvert> {
        self.entries
            .iter()
            .map(|(name, spec)| ElementAdvert {
                name: name.clone(),
                description: spec.description.clone(),
            })
            .collect()
    }
}

impl<C, S: AsRef<str>> FromIterator<(S, ElementSpec<C>)> for ElementConfig<C> {
    fn from_iter<I: IntoIterator<Item = (S, ElementSpec<C>)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(kind, spec)| (normalize_key(kind.as_ref()), spec))
                .collect(),
        }
    }
}

pub(crate) fn normalize_key(kind: &str) -> String {
    ElementKind::parse(kind).as_str().to_string()
}
