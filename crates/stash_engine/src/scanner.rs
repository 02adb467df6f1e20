use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use regex::Regex;
use stash_core::ListingType;
use stash_logging::{stash_debug, stash_error, stash_info, stash_warn};
use tokio_util::sync::CancellationToken;

use crate::fetch::{with_retries, Fetcher, RetryPolicy};
use crate::html::resolve_url;
use crate::site::SiteProfile;
use crate::{FailureKind, FetchError, Page};

#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("user '{0}' cannot be found")]
    InvalidUser(String),
    #[error("failed to load {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: FetchError,
    },
    #[error("invalid next-page pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("scan cancelled")]
    Cancelled,
}

/// Already fetched listing pages in site order.
#[derive(Debug, Clone, Default)]
pub struct PageQueue {
    pages: VecDeque<Page>,
    total_pages: usize,
}

impl PageQueue {
    fn from_pages(pages: Vec<Page>) -> Self {
        let total_pages = pages.len();
        Self {
            pages: pages.into(),
            total_pages,
        }
    }

    /// Number of pages discovered by the scan; unaffected by draining.
    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn remaining(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn pop_front(&mut self) -> Option<Page> {
        self.pages.pop_front()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter()
    }
}

/// Discovers the listing pages of a user.
pub struct PageScanner {
    fetcher: Arc<dyn Fetcher>,
    site: SiteProfile,
    retry: RetryPolicy,
}

impl PageScanner {
    pub fn new(fetcher: Arc<dyn Fetcher>, site: SiteProfile, retry: RetryPolicy) -> Self {
        Self {
            fetcher,
            site,
            retry,
        }
    }

    /// Loads the user's profile page and fails with [`ScanError::InvalidUser`]
    /// when the site reports the user as unknown.
    pub async fn resolve_user(&self, user: &str, cancel: &CancellationToken) -> Result<(), ScanError> {
        let page = self.fetch(&self.site.user_url(user), cancel).await?;
        if page.contains_text(&self.site.user_not_found) {
            stash_info!("User '{}' not found", user);
            return Err(ScanError::InvalidUser(user.to_string()));
        }
        Ok(())
    }

    pub async fn scan(
        &self,
        user: &str,
        listing: ListingType,
        cancel: &CancellationToken,
    ) -> Result<PageQueue, ScanError> {
        let pages = match listing {
            ListingType::Favorites => self.scan_favorites(user, cancel).await?,
            ListingType::Gallery | ListingType::Scraps => {
                self.scan_numbered(user, listing, cancel).await?
            }
        };
        stash_info!("Number of pages for {} of '{}': {}", listing, user, pages.len());
        Ok(PageQueue::from_pages(pages))
    }

    /// Favorites have no page count; follow the "next" links until there is none.
    async fn scan_favorites(&self, user: &str, cancel: &CancellationToken) -> Result<Vec<Page>, ScanError> {
        let next_pattern = Regex::new(&format!(
            r"(?i)/favorites/{}/\d+/next",
            regex::escape(user)
        ))?;

        let start_url = self.site.listing_url(ListingType::Favorites, user);
        let start = self.fetch(&start_url, cancel).await?;
        let mut visited = HashSet::from([start.url.clone(), start_url]);
        let mut pages = vec![start];

        loop {
            let Some(current) = pages.last() else {
                break;
            };
            let next = current
                .anchors
                .iter()
                .find(|anchor| next_pattern.is_match(&anchor.href))
                .and_then(|anchor| resolve_url(&anchor.href, &current.url));
            let Some(next) = next else {
                break;
            };
            let next = next.to_string();
            if !visited.insert(next.clone()) {
                stash_warn!("Favorites page {} links back to a visited page; stopping", next);
                break;
            }
            stash_debug!("Following favorites link {}", next);
            let page = self.fetch(&next, cancel).await?;
            visited.insert(page.url.clone());
            pages.push(page);
        }

        Ok(pages)
    }

    /// Gallery and scraps pages are numbered; the first page showing the
    /// "no submissions" phrase ends the listing and is not kept.
    async fn scan_numbered(
        &self,
        user: &str,
        listing: ListingType,
        cancel: &CancellationToken,
    ) -> Result<Vec<Page>, ScanError> {
        let mut pages = Vec::new();
        for number in 1.. {
            let url = self.site.listing_page_url(listing, user, number);
            let page = self.fetch(&url, cancel).await?;
            if page.contains_text(&self.site.no_submissions) {
                stash_debug!("Page {} of {} is past the end", number, listing);
                break;
            }
            pages.push(page);
        }
        Ok(pages)
    }

    async fn fetch(&self, url: &str, cancel: &CancellationToken) -> Result<Page, ScanError> {
        let fetcher = self.fetcher.as_ref();
        with_retries(self.retry, cancel, url, || fetcher.fetch_page(url))
            .await
            .map_err(|source| {
                if source.kind == FailureKind::Cancelled {
                    return ScanError::Cancelled;
                }
                stash_error!("Error loading listing page {}: {}", url, source);
                ScanError::Fetch {
                    url: url.to_string(),
                    source,
                }
            })
    }
}
