//! Selector resolution over an ordered candidate list.
//!
//! Candidates are tried in order; the first one matching at least one
//! element wins. Nothing here fails: malformed candidates and per-candidate
//! driver errors are recorded in the attempt trail and skipped, and a list
//! with no matches yields an empty [`Resolution`].

use serde::Serialize;
use std::fmt;

use crate::driver::{ElementHandle, PageDriver};
use crate::selector::SelectorDescriptor;

/// What happened when one candidate was tried
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Matched this many elements
    Matched(usize),
    /// Valid, but nothing matched
    NoMatch,
    /// Could not be parsed or validated
    Malformed(String),
    /// The driver failed to run the query
    Failed(String),
}

/// One entry of the attempt trail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attempt {
    /// Candidate as written
    pub candidate: String,
    /// Result
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone)]
struct Matched {
    selector: SelectorDescriptor,
    count: usize,
    element: ElementHandle,
}

/// Outcome of resolving a candidate list
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    matched: Option<Matched>,
    attempts: Vec<Attempt>,
}

impl Resolution {
    /// Whether any candidate matched
    #[must_use]
    pub fn exists(&self) -> bool {
        self.matched.is_some()
    }

    /// Matches of the winning candidate (0 when none matched)
    #[must_use]
    pub fn count(&self) -> usize {
        self.matched.as_ref().map_or(0, |m| m.count)
    }

    /// First element of the winning candidate
    #[must_use]
    pub fn element(&self) -> Option<&ElementHandle> {
        self.matched.as_ref().map(|m| &m.element)
    }

    /// The winning candidate
    #[must_use]
    pub fn selector(&self) -> Option<&SelectorDescriptor> {
        self.matched.as_ref().map(|m| &m.selector)
    }

    /// Per-candidate trail, in the order tried
    #[must_use]
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Take the element out of the resolution
    #[must_use]
    pub fn into_element(self) -> Option<ElementHandle> {
        self.matched.map(|m| m.element)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.matched {
            Some(m) => write!(f, "{} ({} match(es))", m.selector, m.count),
            None => {
                let tried: Vec<&str> = self.attempts.iter().map(|a| a.candidate.as_str()).collect();
                write!(f, "no match among [{}]", tried.join(", "))
            }
        }
    }
}

/// Resolve typed candidates
pub async fn resolve(driver: &dyn PageDriver, candidates: &[SelectorDescriptor]) -> Resolution {
    let mut resolution = Resolution::default();
    for candidate in candidates {
        if try_candidate(driver, candidate, &mut resolution).await {
            break;
        }
    }
    resolution
}

/// Resolve string candidates; unparsable strings are recorded and skipped
pub async fn resolve_strs<S: AsRef<str> + Sync>(driver: &dyn PageDriver, candidates: &[S]) -> Resolution {
    let mut resolution = Resolution::default();
    for raw in candidates {
        let raw = raw.as_ref();
        match SelectorDescriptor::parse(raw) {
            Ok(candidate) => {
                if try_candidate(driver, &candidate, &mut resolution).await {
                    break;
                }
            }
            Err(e) => {
                tracing::debug!(candidate = raw, error = %e, "skipping malformed selector");
                resolution.attempts.push(Attempt {
                    candidate: raw.to_string(),
                    outcome: AttemptOutcome::Malformed(e.to_string()),
                });
            }
        }
    }
    resolution
}

/// Returns true when the candidate matched
async fn try_candidate(
    driver: &dyn PageDriver,
    candidate: &SelectorDescriptor,
    resolution: &mut Resolution,
) -> bool {
    let name = candidate.to_string();
    let outcome = match candidate.validate() {
        Err(e) => AttemptOutcome::Malformed(e.to_string()),
        Ok(()) => match driver.count(candidate).await {
            Err(e) if e.is_invalid_selector() => AttemptOutcome::Malformed(e.to_string()),
            Err(e) => AttemptOutcome::Failed(e.to_string()),
            Ok(0) => AttemptOutcome::NoMatch,
            Ok(count) => match driver.element(candidate, 0).await {
                Ok(Some(element)) => {
                    tracing::trace!(selector = %name, count, "selector resolved");
                    resolution.attempts.push(Attempt {
                        candidate: name,
                        outcome: AttemptOutcome::Matched(count),
                    });
                    resolution.matched = Some(Matched {
                        selector: candidate.clone(),
                        count,
                        element,
                    });
                    return true;
                }
                // Detached between count and fetch
                Ok(None) => AttemptOutcome::NoMatch,
                Err(e) => AttemptOutcome::Failed(e.to_string()),
            },
        },
    };
    if matches!(outcome, AttemptOutcome::Malformed(_) | AttemptOutcome::Failed(_)) {
        tracing::debug!(selector = %name, ?outcome, "selector candidate skipped");
    }
    resolution.attempts.push(Attempt {
        candidate: name,
        outcome,
    });
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockElement, MockPage};

    fn form_page() -> MockPage {
        let page = MockPage::new();
        page.with_document(|doc| {
            doc.add(MockElement::new("input").with_id("name"));
            doc.add(MockElement::new("button").with_text("Submit"));
            doc.add(MockElement::new("li").with_class("item"));
            doc.add(MockElement::new("li").with_class("item"));
        });
        page
    }

    mod resolve_tests {
        use super::*;

        #[tokio::test]
        async fn test_first_matching_candidate_wins() {
            let page = form_page();
            let resolution = resolve_strs(&page, &["#missingBtn", r#"button:has-text("Submit")"#]).await;
            assert!(resolution.exists());
            assert_eq!(resolution.count(), 1);
            assert_eq!(resolution.element().unwrap().tag_name, "button");
            assert_eq!(resolution.attempts()[0].outcome, AttemptOutcome::NoMatch);
            assert_eq!(resolution.attempts()[1].outcome, AttemptOutcome::Matched(1));
        }

        #[tokio::test]
        async fn test_later_candidates_not_tried_after_match() {
            let page = form_page();
            let resolution = resolve_strs(&page, &[".item", "#name"]).await;
            assert_eq!(resolution.count(), 2);
            assert_eq!(resolution.attempts().len(), 1);
            assert_eq!(resolution.selector(), Some(&SelectorDescriptor::css(".item")));
        }

        #[tokio::test]
        async fn test_no_match_is_empty_not_error() {
            let page = form_page();
            let resolution = resolve_strs(&page, &["#a", "#b"]).await;
            assert!(!resolution.exists());
            assert_eq!(resolution.count(), 0);
            assert!(resolution.element().is_none());
            assert!(resolution.to_string().contains("#a, #b"));
        }

        #[tokio::test]
        async fn test_empty_candidate_list() {
            let page = form_page();
            let resolution = resolve(&page, &[]).await;
            assert!(!resolution.exists());
            assert!(resolution.attempts().is_empty());
        }

        #[tokio::test]
        async fn test_malformed_candidates_are_skipped() {
            let page = form_page();
            let resolution = resolve_strs(&page, &["button[", "li:first-child", "#name"]).await;
            assert!(resolution.exists());
            assert!(matches!(resolution.attempts()[0].outcome, AttemptOutcome::Malformed(_)));
            assert!(matches!(resolution.attempts()[1].outcome, AttemptOutcome::Malformed(_)));
            assert_eq!(resolution.element().unwrap().attribute("id"), Some("name"));
        }

        #[tokio::test]
        async fn test_unparsed_typed_candidate_recorded_and_skipped() {
            let page = form_page();
            let candidates = vec![SelectorDescriptor::from("li[".to_string()), SelectorDescriptor::css("#name")];
            let resolution = resolve(&page, &candidates).await;
            assert_eq!(resolution.selector(), Some(&candidates[1]));
            assert_eq!(resolution.attempts()[0].candidate, "li[");
            assert!(matches!(resolution.attempts()[0].outcome, AttemptOutcome::Malformed(_)));
        }

        #[tokio::test]
        async fn test_script_source_is_not_a_text_match() {
            let page = MockPage::new();
            page.with_document(|doc| {
                doc.add(MockElement::new("script").with_text("app.on('Start', run)"));
                doc.add(MockElement::new("button").with_id("run"));
            });
            let resolution = resolve_strs(&page, &["text=Start", "#run"]).await;
            assert_eq!(resolution.attempts()[0].outcome, AttemptOutcome::NoMatch);
            assert_eq!(resolution.selector(), Some(&SelectorDescriptor::css("#run")));
        }

        #[tokio::test]
        async fn test_typed_candidates() {
            let page = form_page();
            let candidates = vec![
                SelectorDescriptor::role_named("button", "cancel"),
                SelectorDescriptor::role_named("button", "submit"),
            ];
            let resolution = resolve(&page, &candidates).await;
            assert_eq!(resolution.selector(), Some(&candidates[1]));
        }

        #[tokio::test]
        async fn test_resolution_has_no_side_effects() {
            let page = form_page();
            let _ = resolve_strs(&page, &["button"]).await;
            assert!(page.interactions().is_empty());
        }
    }
}
