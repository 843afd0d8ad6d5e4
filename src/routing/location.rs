//! Navigation location.

use std::str::FromStr;
use url::Url;

/// The address the host is currently showing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    /// Parse an absolute URL.
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Url::parse(href).map(Self::from_url)
    }

    pub fn from_url(url: Url) -> Self {
        Self { url }
    }

    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    pub fn path(&self) -> &str {
        self.url.path()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Path plus fragment, with origin and query stripped.
    ///
    /// Hash routers keep their query inside the fragment, so the fragment is
    /// cut at its first `?` as well.
    pub fn route(&self) -> String {
        let mut route = self.url.path().to_string();
        if let Some(fragment) = self.url.fragment() {
            route.push('#');
            route.push_str(fragment.split('?').next().unwrap_or_default());
        }
        route
    }
}

impl FromStr for Location {
    type Err = url::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.href())
    }
}
