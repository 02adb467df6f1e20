use stash_core::ListingType;

use crate::Anchor;

/// URLs and page phrases of the crawled site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteProfile {
    /// Scheme and host, without trailing slash.
    pub base_url: String,
    /// Shown on a profile page when the user does not exist.
    pub user_not_found: String,
    /// Shown on a gallery or scraps page past the last one.
    pub no_submissions: String,
    /// `class` attribute of the download control on a submission page.
    pub download_class: String,
    /// Label of the download control.
    pub download_label: String,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::new("https://www.furaffinity.net")
    }
}

impl SiteProfile {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_not_found: "This user cannot be found".to_string(),
            no_submissions: "There are no submissions to list".to_string(),
            download_class: "button section-button".to_string(),
            download_label: "Download".to_string(),
        }
    }

    pub fn user_url(&self, user: &str) -> String {
        format!("{}/user/{}/", self.base_url, user)
    }

    /// First page of a listing, `<site>/<listing>/<user>/`.
    pub fn listing_url(&self, listing: ListingType, user: &str) -> String {
        format!("{}/{}/{}/", self.base_url, listing.path_segment(), user)
    }

    /// 1-based numbered page of a gallery or scraps listing.
    pub fn listing_page_url(&self, listing: ListingType, user: &str, page: usize) -> String {
        format!("{}{}/", self.listing_url(listing, user), page)
    }

    pub fn is_download_control(&self, anchor: &Anchor) -> bool {
        anchor.class == self.download_class && anchor.text == self.download_label
    }
}

#[cfg(test)]
mod tests {
    use super::SiteProfile;
    use stash_core::ListingType;

    #[test]
    fn builds_listing_urls() {
        let site = SiteProfile::new("https://site.test/");
        assert_eq!(site.user_url("bob"), "https://site.test/user/bob/");
        assert_eq!(
            site.listing_url(ListingType::Favorites, "bob"),
            "https://site.test/favorites/bob/"
        );
        assert_eq!(
            site.listing_page_url(ListingType::Scraps, "bob", 3),
            "https://site.test/scraps/bob/3/"
        );
    }
}
