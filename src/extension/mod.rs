//! Browser extension site adapters.
//!
//! Adapters read identifying data from a third-party page's client-side
//! framework state, look the identity up, and splice rendered pronouns into
//! the page. The page itself sits behind [`Page`] so the adapters stay
//! independent from any concrete DOM binding. Third-party markup is
//! untrusted: a missing anchor or field means "skip", never an error.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

mod lookup;
pub mod modrinth;

pub use lookup::{ApiLookup, PronounLookup};
pub use modrinth::Modrinth;

/// Opaque handle to a node owned by the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeRef(pub u64);

/// Markup to insert into the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Element {
        tag: &'static str,
        attrs: Vec<(String, String)>,
        children: Vec<Fragment>,
    },
    Text(String),
    /// Copy of an existing node, with extra children appended to the copy.
    Clone {
        node: NodeRef,
        deep: bool,
        children: Vec<Fragment>,
        /// Inline style applied to the copy's first child.
        first_child_style: Option<String>,
    },
}

/// Build an element fragment.
pub fn h(tag: &'static str, attrs: &[(&str, &str)], children: Vec<Fragment>) -> Fragment {
    Fragment::Element {
        tag,
        attrs: attrs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect(),
        children,
    }
}

/// Inline style string from property pairs.
pub fn css(properties: &[(&str, &str)]) -> String {
    properties
        .iter()
        .map(|(k, v)| format!("{k}:{v};"))
        .collect()
}

/// The document an adapter runs against.
#[async_trait]
pub trait Page: Send + Sync {
    fn element_by_id(&self, id: &str) -> Option<NodeRef>;

    fn query_selector(&self, selector: &str) -> Option<NodeRef>;

    fn first_child(&self, node: NodeRef) -> Option<NodeRef>;

    /// `data-*` attribute names of a node, without the `data-` prefix.
    fn data_keys(&self, node: NodeRef) -> Vec<String>;

    fn prepend(&self, parent: NodeRef, fragment: Fragment);

    fn replace(&self, node: NodeRef, fragment: Fragment);

    /// Read a property path from the framework view-model bound to `node`.
    /// `None` means the value is not defined (yet).
    async fn view_prop(&self, node: NodeRef, path: &[&str]) -> Option<Value>;
}

/// A batch of nodes inserted into the document.
#[derive(Debug, Clone, Default)]
pub struct MutationRecord {
    pub added_nodes: Vec<AddedNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddedNode {
    Element { id: Option<String> },
    Text,
}

/// Linear backoff for [`fetch_until_data`]: the i-th failed poll waits `i * step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub attempts: u32,
    pub step: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 20,
            step: Duration::from_millis(25),
        }
    }
}

impl Backoff {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.step * attempt
    }
}

/// Result of polling the page for a value.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Ready(T),
    /// Every attempt found the value undefined.
    TimedOut,
}

impl<T> PollOutcome<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::TimedOut => None,
        }
    }
}

/// Poll `path` on `node`'s view-model until it is defined.
///
/// Gives up after `backoff.attempts` polls and touches the page no further.
pub async fn fetch_until_data<P: Page + ?Sized>(
    page: &P,
    node: NodeRef,
    path: &[&str],
    backoff: Backoff,
) -> PollOutcome<Value> {
    for attempt in 1..=backoff.attempts {
        if let Some(value) = page.view_prop(node, path).await {
            return PollOutcome::Ready(value);
        }
        if attempt < backoff.attempts {
            tokio::time::sleep(backoff.delay(attempt)).await;
        }
    }

    tracing::debug!("Gave up polling {:?} after {} attempts", path, backoff.attempts);
    PollOutcome::TimedOut
}

/// Platform identifier from a view-model value, skipping JS-falsy values.
pub fn identifier(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory page used by adapter tests.

    use std::collections::HashMap;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct FakePage {
        pub ids: HashMap<String, NodeRef>,
        pub selectors: HashMap<String, NodeRef>,
        pub first_children: HashMap<NodeRef, NodeRef>,
        pub data: HashMap<NodeRef, Vec<String>>,
        /// `(node, joined path)` to value, plus how many polls it stays hidden.
        pub props: Mutex<HashMap<(NodeRef, String), (u32, Value)>>,
        pub polls: Mutex<u32>,
        pub prepended: Mutex<Vec<(NodeRef, Fragment)>>,
        pub replaced: Mutex<Vec<(NodeRef, Fragment)>>,
    }

    impl FakePage {
        pub fn set_prop(&self, node: NodeRef, path: &[&str], hidden_for: u32, value: Value) {
            self.props
                .lock()
                .insert((node, path.join(".")), (hidden_for, value));
        }

        pub fn polls(&self) -> u32 {
            *self.polls.lock()
        }
    }

    #[async_trait]
    impl Page for FakePage {
        fn element_by_id(&self, id: &str) -> Option<NodeRef> {
            self.ids.get(id).copied()
        }

        fn query_selector(&self, selector: &str) -> Option<NodeRef> {
            self.selectors.get(selector).copied()
        }

        fn first_child(&self, node: NodeRef) -> Option<NodeRef> {
            self.first_children.get(&node).copied()
        }

        fn data_keys(&self, node: NodeRef) -> Vec<String> {
            self.data.get(&node).cloned().unwrap_or_default()
        }

        fn prepend(&self, parent: NodeRef, fragment: Fragment) {
            self.prepended.lock().push((parent, fragment));
        }

        fn replace(&self, node: NodeRef, fragment: Fragment) {
            self.replaced.lock().push((node, fragment));
        }

        async fn view_prop(&self, node: NodeRef, path: &[&str]) -> Option<Value> {
            *self.polls.lock() += 1;
            let mut props = self.props.lock();
            let (hidden_for, value) = props.get_mut(&(node, path.join(".")))?;
            if *hidden_for > 0 {
                *hidden_for -= 1;
                return None;
            }
            Some(value.clone())
        }
    }
}
