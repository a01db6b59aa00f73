//! Protocol constants shared across the client.

use std::time::Duration;

/// Items requested per listing page.
pub const PAGE_SIZE: u64 = 100;

/// Default bound on a session's concurrent outbound requests.
pub const MAX_CONCURRENT_REQUESTS: usize = 5;

/// Consecutive zero-item pages tolerated before a sequential search stops.
/// Protects against endpoints whose reported total never reconciles with
/// what they actually return.
pub const SEARCH_MAX_EMPTY_PAGES: u32 = 100;

/// Reserved keys of the listing envelope; the single remaining key carries
/// the page's item array.
pub const RESERVED_LIST_KEYS: [&str; 3] = ["items", "current", "last"];

/// Cache key for a session's auth material, under the session's scope.
pub const AUTH_CACHE_KEY: &str = "auth";

/// Auth material lives this long in the cache before a login is forced.
pub const AUTH_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// The admin backend is picky about non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/130.0.0.0 Safari/537.36";

/// Header carrying the CSRF token on authenticated requests.
pub const CSRF_HEADER: &str = "x-csrf-token";
