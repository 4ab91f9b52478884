//! Element resolver
//!
//! Maps the abstract element a backend question asks for onto one of the
//! caller's configured render targets, and builds the props to render it
//! with. Resolution is pure apart from the unique id.

mod element;
mod id;

pub use element::{ElementConfig, ElementDescriptor, ElementKind, ElementSpec};
pub use id::{format_unique_id, next_counter, IdGenerator, MonotonicIds};

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Element type used when a question's type is not configured
pub const DEFAULT_FALLBACK: &str = "text";

/// Called with the new value whenever the rendered control changes
pub type ChangeHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Called with the question text and new value; used by `resolve_all`
pub type AnswerChangeHandler = Arc<dyn Fn(&str, String) + Send + Sync>;

pub type OptionsPredicate = Arc<dyn Fn(&ElementKind) -> bool + Send + Sync>;
pub type DefaultOptions = Arc<dyn Fn(&ElementKind) -> Vec<String> + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("No component configured for element type \"{kind}\" and no fallback available")]
    NoComponent { kind: String },
}

/// Hooks fired on every resolution
pub trait ResolveObserver: Send + Sync {
    fn on_resolve(&self, _kind: &str, _component_key: &str) {}
    fn on_fallback(&self, _kind: &str, _fallback: &str, _reason: &str) {}
}

/// Default observer: logs through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl ResolveObserver for TracingObserver {
    fn on_resolve(&self, kind: &str, component_key: &str) {
        tracing::debug!(kind, component_key, "Resolved element");
    }

    fn on_fallback(&self, kind: &str, fallback: &str, reason: &str) {
        tracing::warn!(kind, fallback, reason, "Falling back to default element");
    }
}

/// Knobs for [`Resolver`]; every field has a sensible default
#[derive(Clone)]
pub struct ResolverOptions {
    /// Element type used for unconfigured types; `None` makes them an error
    pub fallback: Option<String>,
    pub expects_options: OptionsPredicate,
    /// Options substituted when a choice-based element arrives without any
    pub default_options: DefaultOptions,
    pub observer: Arc<dyn ResolveObserver>,
    pub ids: Arc<dyn IdGenerator>,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            fallback: Some(DEFAULT_FALLBACK.to_string()),
            expects_options: Arc::new(ElementKind::expects_options),
            default_options: Arc::new(|kind: &ElementKind| match kind {
                ElementKind::Radio => vec!["Yes".to_string(), "No".to_string()],
                _ => Vec::new(),
            }),
            observer: Arc::new(TracingObserver),
            ids: Arc::new(MonotonicIds),
        }
    }
}

impl fmt::Debug for ResolverOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverOptions")
            .field("fallback", &self.fallback)
            .finish_non_exhaustive()
    }
}

impl ResolverOptions {
    #[must_use]
    pub fn with_fallback(mut self, fallback: Option<&str>) -> Self {
        self.fallback = fallback.map(str::to_string);
        self
    }

    #[must_use]
    pub fn with_expects_options(
        mut self,
        predicate: impl Fn(&ElementKind) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.expects_options = Arc::new(predicate);
        self
    }

    #[must_use]
    pub fn with_default_options(
        mut self,
        provider: impl Fn(&ElementKind) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        self.default_options = Arc::new(provider);
        self
    }

    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn ResolveObserver>) -> Self {
        self.observer = observer;
        self
    }

    #[must_use]
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }
}

/// Everything a render target needs to draw one question
#[derive(Clone)]
pub struct ElementProps {
    pub text: String,
    pub value: String,
    pub on_change: ChangeHandler,
    pub unique_id: String,
    pub element_index: usize,
    /// `None` when there is nothing to choose from, never an empty list
    pub options: Option<Vec<String>>,
}

impl fmt::Debug for ElementProps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementProps")
            .field("text", &self.text)
            .field("value", &self.value)
            .field("unique_id", &self.unique_id)
            .field("element_index", &self.element_index)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ComponentResolution {
    pub kind: ElementKind,
    /// Key into the [`ElementConfig`] of the component to render
    pub component_key: String,
    pub props: ElementProps,
}

/// Resolves element descriptors against an [`ElementConfig`]
#[derive(Debug)]
pub struct Resolver<C> {
    config: ElementConfig<C>,
    options: ResolverOptions,
}

impl<C> Resolver<C> {
    pub fn new(config: ElementConfig<C>) -> Self {
        Self::with_options(config, ResolverOptions::default())
    }

    pub fn with_options(config: ElementConfig<C>, options: ResolverOptions) -> Self {
        Self { config, options }
    }

    pub fn config(&self) -> &ElementConfig<C> {
        &self.config
    }

    pub fn options(&self) -> &ResolverOptions {
        &self.options
    }

    /// Render target for a resolution's `component_key`
    pub fn component(&self, component_key: &str) -> Option<&C> {
        self.config.component(component_key)
    }

    /// Resolve one element.
    ///
    /// Unconfigured types fall back to the configured fallback type.
    ///
    /// # Errors
    ///
    /// [`ResolveError::NoComponent`] when neither the type nor the fallback
    /// is configured.
    pub fn resolve(
        &self,
        element: &ElementDescriptor,
        value: impl Into<String>,
        on_change: ChangeHandler,
        index: usize,
    ) -> Result<ComponentResolution, ResolveError> {
        let kind = ElementKind::parse(&element.kind);
        let component_key = self.component_key(&kind)?;
        self.options
            .observer
            .on_resolve(kind.as_str(), &component_key);

        let mut options = element.options.clone().unwrap_or_default();
        if options.is_empty() && (self.options.expects_options)(&kind) {
            options = (self.options.default_options)(&kind);
        }

        let unique_id = self.options.ids.generate(kind.as_str(), index);

        Ok(ComponentResolution {
            props: ElementProps {
                text: element.text.clone(),
                value: value.into(),
                on_change,
                unique_id,
                element_index: index,
                options: (!options.is_empty()).then_some(options),
            },
            kind,
            component_key,
        })
    }

    /// Resolve a list of elements, looking each current value up by
    /// question text and routing changes through `on_change` with that text.
    ///
    /// # Errors
    ///
    /// The first element that cannot be resolved.
    pub fn resolve_all(
        &self,
        elements: &[ElementDescriptor],
        values: &HashMap<String, String>,
        on_change: &AnswerChangeHandler,
    ) -> Result<Vec<ComponentResolution>, ResolveError> {
        elements
            .iter()
            .enumerate()
            .map(|(index, element)| {
                let value = values.get(&element.text).cloned().unwrap_or_default();
                let handler = Arc::clone(on_change);
                let text = element.text.clone();
                let change: ChangeHandler = Arc::new(move |v: String| handler(&text, v));
                self.resolve(element, value, change, index)
            })
            .collect()
    }

    fn component_key(&self, kind: &ElementKind) -> Result<String, ResolveError> {
        if self.config.contains(kind.as_str()) {
            return Ok(kind.as_str().to_string());
        }

        let fallback = self
            .options
            .fallback
            .as_deref()
            .map(element::normalize_key)
            .filter(|key| self.config.contains(key))
            .ok_or_else(|| ResolveError::NoComponent {
                kind: kind.as_str().to_string(),
            })?;

        let reason = format!("No component found for type \"{kind}\"");
        self.options
            .observer
            .on_fallback(kind.as_str(), &fallback, &reason);
        Ok(fallback)
    }
}

/// A change handler that ignores every change
pub fn ignore_changes() -> ChangeHandler {
    Arc::new(|_| {})
}
