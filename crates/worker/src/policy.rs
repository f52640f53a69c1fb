//! Request routing policy.
//!
//! Classification is an ordered list of (predicate, strategy) rules
//! evaluated top-down with first-match-wins semantics:
//!
//! 1. network-first patterns (external API/identity/content hosts),
//!    excluded from every cache store
//! 2. declared precache asset, or any same-origin URL -> cache-first
//! 3. everything else -> network-first, dynamically cacheable by extension

use std::collections::HashSet;

use regex::Regex;
use stashway_core::{Error, WorkerConfig};
use url::Url;

use crate::request::canonicalize;

/// Caching strategy for a classified request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve from cache if present, else fetch and populate.
    CacheFirst,
    /// Attempt network first, fall back to cache only on failure.
    NetworkFirst,
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub strategy: Strategy,
    /// The request must never be written to any store, and never be
    /// served from one while the network answers.
    pub never_cache: bool,
}

/// One routing rule: a predicate over the request URL plus the strategy
/// applied when it matches.
#[derive(Debug)]
struct RouteRule {
    matcher: Matcher,
    strategy: Strategy,
    never_cache: bool,
}

#[derive(Debug)]
enum Matcher {
    /// Regex match against the full URL string.
    Pattern(Regex),
    /// URL is on the declared critical-asset list.
    PrecachedAsset,
    /// URL shares the site's own origin.
    SameOrigin,
    /// Unconditional; terminates the rule list.
    Any,
}

/// Ordered routing table built once from configuration.
#[derive(Debug)]
pub struct RoutingPolicy {
    rules: Vec<RouteRule>,
    origin: Url,
    precached: HashSet<String>,
    cacheable_extensions: HashSet<String>,
}

impl RoutingPolicy {
    /// Compile the routing table from configuration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPattern` for an uncompilable network-first pattern
    /// and `InvalidUrl` for an unparseable origin or asset path.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, Error> {
        let origin = canonicalize(&config.origin)?;

        let mut rules = Vec::new();
        for pattern in &config.network_first_patterns {
            let regex = Regex::new(pattern).map_err(|e| Error::InvalidPattern(format!("{pattern}: {e}")))?;
            rules.push(RouteRule { matcher: Matcher::Pattern(regex), strategy: Strategy::NetworkFirst, never_cache: true });
        }
        rules.push(RouteRule { matcher: Matcher::PrecachedAsset, strategy: Strategy::CacheFirst, never_cache: false });
        rules.push(RouteRule { matcher: Matcher::SameOrigin, strategy: Strategy::CacheFirst, never_cache: false });
        rules.push(RouteRule { matcher: Matcher::Any, strategy: Strategy::NetworkFirst, never_cache: false });

        let precached = config
            .precache_assets
            .iter()
            .map(|path| {
                origin
                    .join(path)
                    .map(|u| u.to_string())
                    .map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))
            })
            .collect::<Result<HashSet<_>, _>>()?;

        let cacheable_extensions = config.cacheable_extensions.iter().map(|e| e.to_lowercase()).collect();

        Ok(Self { rules, origin, precached, cacheable_extensions })
    }

    /// Classify a request URL; first matching rule wins.
    pub fn classify(&self, url: &Url) -> Classification {
        for rule in &self.rules {
            let matched = match &rule.matcher {
                Matcher::Pattern(regex) => regex.is_match(url.as_str()),
                Matcher::PrecachedAsset => self.is_precached_asset(url),
                Matcher::SameOrigin => self.is_same_origin(url),
                Matcher::Any => true,
            };
            if matched {
                return Classification { strategy: rule.strategy, never_cache: rule.never_cache };
            }
        }
        // The terminal Any rule always matches.
        Classification { strategy: Strategy::NetworkFirst, never_cache: false }
    }

    /// Whether the URL is on the declared critical-asset list.
    pub fn is_precached_asset(&self, url: &Url) -> bool {
        self.precached.contains(url.as_str())
    }

    /// Whether the URL shares the configured site origin.
    pub fn is_same_origin(&self, url: &Url) -> bool {
        url.origin() == self.origin.origin()
    }

    /// Whether a response for this URL qualifies for the dynamic store,
    /// judged by file extension.
    pub fn is_dynamically_cacheable(&self, url: &Url) -> bool {
        let Some(extension) = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .and_then(|last| last.rsplit_once('.'))
            .map(|(_, ext)| ext.to_lowercase())
        else {
            return false;
        };
        self.cacheable_extensions.contains(&extension)
    }

    /// The URL of the home/landing document for fallback lookups.
    pub fn home_document_url(&self, config: &WorkerConfig) -> Result<Url, Error> {
        self.origin
            .join(&config.home_document)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.home_document)))
    }
}
