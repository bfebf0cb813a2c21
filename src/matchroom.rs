// src/matchroom.rs
// Match id and player nickname extraction from FACEIT page URLs

use once_cell::sync::Lazy;
use regex::Regex;

pub const MATCHROOM_MARKER: &str = "/cs2/room/";

static PLAYER_HREF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/players/([^/?#]*)").expect("valid player href pattern"));

pub fn is_matchroom_url(url: &str) -> bool {
    url.contains(MATCHROOM_MARKER)
}

/// Last path segment of a matchroom URL, ignoring query and fragment.
pub fn match_id_from_url(url: &str) -> Option<String> {
    if !is_matchroom_url(url) {
        return None;
    }
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .next()
        .filter(|segment| !segment.is_empty())
        .map(str::to_string)
}

/// Nickname from a `/players/<nick>/...` link; empty when there is none.
pub fn nickname_from_player_href(href: &str) -> String {
    PLAYER_HREF
        .captures(href)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}
