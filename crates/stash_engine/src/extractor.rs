use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::html::resolve_url;
use crate::Page;

static VIEW_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/view/\d+/").expect("submission link pattern"));

/// Finds the submission links on a listing page.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubmissionExtractor;

impl SubmissionExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Absolute detail URLs of every distinct `/view/<id>/` link, in order of
    /// first appearance. Pages without such links yield an empty list.
    pub fn extract(&self, page: &Page) -> Vec<String> {
        let mut seen = HashSet::new();
        page.anchors
            .iter()
            .filter(|anchor| VIEW_LINK.is_match(&anchor.href))
            .filter(|anchor| seen.insert(anchor.href.as_str()))
            .filter_map(|anchor| resolve_url(&anchor.href, &page.url))
            .map(String::from)
            .collect()
    }
}
