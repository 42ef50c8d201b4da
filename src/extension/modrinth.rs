//! Modrinth adapter.
//!
//! Modrinth is a Vue single-page app. User profiles carry the GitHub id in the
//! layout's view-model, and project pages list team members in `$data`.

use std::sync::Arc;

use serde_json::Value;
use tokio::{sync::mpsc, task::JoinSet};

use super::{
    css, fetch_until_data, h, identifier, AddedNode, Backoff, Fragment, MutationRecord, NodeRef,
    Page, PollOutcome, PronounLookup,
};
use crate::models::Pronouns;

const ORIGIN: &str = "https://modrinth.com";

/// Feather `message-circle` icon path.
const MESSAGE_CIRCLE: &str = "M21 11.5a8.38 8.38 0 0 1-.9 3.8 8.5 8.5 0 0 1-7.6 4.7 8.38 8.38 0 0 1-3.8-.9L3 21l1.9-5.7a8.38 8.38 0 0 1-.9-3.8 8.5 8.5 0 0 1 4.7-7.6 8.38 8.38 0 0 1 3.8-.9h.5a8.48 8.48 0 0 1 8 8v.5z";

/// True if the adapter applies to `url`.
pub fn matches(url: &str) -> bool {
    url.starts_with(ORIGIN)
}

/// Modrinth content script.
pub struct Modrinth<P, L> {
    page: Arc<P>,
    lookup: Arc<L>,
    backoff: Backoff,
}

impl<P, L> Modrinth<P, L>
where
    P: Page + 'static,
    L: PronounLookup + 'static,
{
    pub fn new(page: Arc<P>, lookup: Arc<L>) -> Self {
        Self::with_backoff(page, lookup, Backoff::default())
    }

    pub fn with_backoff(page: Arc<P>, lookup: Arc<L>, backoff: Backoff) -> Self {
        Self {
            page,
            lookup,
            backoff,
        }
    }

    /// Pronouns for a GitHub id, `None` when unspecified.
    async fn github_pronouns(&self, github_id: &str) -> Option<Pronouns> {
        Some(self.lookup.fetch_pronouns("github", github_id).await).filter(Pronouns::is_specified)
    }

    /// Add a pronouns line to a profile's stats block.
    pub async fn process_profile_info(&self, stats: NodeRef) {
        let Some(layout) = self.page.element_by_id("main") else {
            return;
        };

        let mut github_id = self
            .page
            .view_prop(layout, &["$children", "0", "user", "github_id"])
            .await
            .as_ref()
            .and_then(identifier);
        if github_id.is_none() {
            github_id = self
                .page
                .view_prop(layout, &["$parent", "$children", "0", "user", "github_id"])
                .await
                .as_ref()
                .and_then(identifier);
        }
        let Some(github_id) = github_id else {
            return;
        };

        let Some(pronouns) = self.github_pronouns(&github_id).await else {
            return;
        };

        // The first stat is the template: same classes, same Vue scope id.
        let Some(template) = self.page.first_child(stats) else {
            return;
        };
        let Some(scope) = self
            .page
            .data_keys(template)
            .into_iter()
            .find(|k| k.starts_with("v-"))
        else {
            return;
        };
        let scope_attr = format!("data-{scope}");

        let icon = h(
            "svg",
            &[
                ("class", "secondary-stat__icon"),
                ("viewBox", "0 0 24 24"),
                ("fill", "none"),
                ("stroke", "currentColor"),
                ("stroke-width", "2"),
                ("stroke-linecap", "round"),
                ("stroke-linejoin", "round"),
                (scope_attr.as_str(), ""),
            ],
            vec![h("path", &[("d", MESSAGE_CIRCLE)], vec![])],
        );
        let text = h(
            "span",
            &[("class", "secondary-stat__text"), (scope_attr.as_str(), "")],
            vec![Fragment::Text(pronouns.format().to_string())],
        );

        self.page.prepend(
            stats,
            Fragment::Clone {
                node: template,
                deep: false,
                children: vec![icon, text],
                first_child_style: None,
            },
        );
    }

    /// Add pronouns next to each team member of a project.
    pub async fn process_team_members(&self) {
        let Some(layout) = self.page.element_by_id("main") else {
            return;
        };

        let members =
            match fetch_until_data(&*self.page, layout, &["$data", "members"], self.backoff).await {
                PollOutcome::Ready(Value::Array(members)) => members,
                PollOutcome::Ready(_) | PollOutcome::TimedOut => return,
            };

        for member in members {
            let (Some(github_id), Some(name)) = (
                identifier(&member["user"]["github_id"]),
                member["name"].as_str(),
            ) else {
                continue;
            };

            let Some(pronouns) = self.github_pronouns(&github_id).await else {
                continue;
            };

            let selector = format!(".team-member .member-info a[href='/user/{name}']");
            let Some(link) = self.page.query_selector(&selector) else {
                continue;
            };

            let row_style = css(&[
                ("display", "flex"),
                ("align-items", "center"),
                ("gap", "4px"),
                ("margin", "0.2rem 0"),
            ]);
            let label_style = css(&[("font-size", "var(--font-size-xs)")]);
            let row = h(
                "div",
                &[("style", row_style.as_str())],
                vec![
                    Fragment::Clone {
                        node: link,
                        deep: true,
                        children: vec![],
                        first_child_style: Some(css(&[("margin", "0")])),
                    },
                    h(
                        "span",
                        &[("style", label_style.as_str())],
                        vec![Fragment::Text(format!("({})", pronouns.format()))],
                    ),
                ],
            );
            self.page.replace(link, row);
        }
    }

    /// Run every processor whose anchor is on the page.
    pub async fn process_page(&self) {
        let team = async {
            if self.page.query_selector(".extra-info .team-member").is_some() {
                self.process_team_members().await;
            }
        };
        let profile = async {
            if let Some(stats) = self.page.query_selector("aside.card.sidebar .stats-block") {
                self.process_profile_info(stats).await;
            }
        };
        tokio::join!(team, profile);
    }

    /// True if a batch inserted the app's `#main` root, i.e. the SPA navigated.
    pub fn should_reprocess(records: &[MutationRecord]) -> bool {
        records.iter().flat_map(|r| &r.added_nodes).any(|node| {
            matches!(node, AddedNode::Element { id: Some(id) } if id == "main")
        })
    }

    /// Process the loaded page, then again after every client-side navigation.
    ///
    /// `mutations` delivers the document observer's batches (subtree-wide,
    /// rooted at the document). Returns once the observer is gone and every
    /// pending pass finished.
    pub async fn inject(self: Arc<Self>, mut mutations: mpsc::Receiver<Vec<MutationRecord>>) {
        let mut passes = JoinSet::new();
        let this = Arc::clone(&self);
        passes.spawn(async move { this.process_page().await });

        while let Some(records) = mutations.recv().await {
            if Self::should_reprocess(&records) {
                tracing::debug!("Modrinth navigation detected, processing page");
                let this = Arc::clone(&self);
                passes.spawn(async move { this.process_page().await });
            }
        }

        while let Some(result) = passes.join_next().await {
            if let Err(e) = result {
                tracing::warn!("Modrinth page pass failed: {}", e);
            }
        }
    }
}
