//! URL hand-off of a session between deployments.
//!
//! A session travels between the web and mobile deployments as query
//! parameters: `token` (required), `userData` (percent-encoded JSON profile)
//! and `refreshToken`. The receiving side saves the session and then strips
//! those parameters from the address bar.

use crate::error::Result;
use crate::types::{TokenRecord, UserProfile};
use std::fmt;
use url::{form_urlencoded, ParseError, Position, Url};

pub const TOKEN_PARAM: &str = "token";
pub const USER_DATA_PARAM: &str = "userData";
pub const REFRESH_TOKEN_PARAM: &str = "refreshToken";

const SESSION_PARAMS: [&str; 3] = [TOKEN_PARAM, USER_DATA_PARAM, REFRESH_TOKEN_PARAM];

// Resolves relative inputs such as `/home?token=..`.
const RELATIVE_BASE: &str = "http://relative.invalid/";

/// Which deployment a hand-off link targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Deployment {
    Web,
    Mobile,
}

impl Deployment {
    /// Deployment suited to a browser user agent.
    ///
    /// ```
    /// use core_auth::Deployment;
    ///
    /// let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_0 like Mac OS X)";
    /// assert_eq!(Deployment::for_user_agent(ua), Deployment::Mobile);
    /// assert_eq!(Deployment::for_user_agent("Mozilla/5.0 (X11; Linux x86_64)"), Deployment::Web);
    /// ```
    pub fn for_user_agent(user_agent: &str) -> Self {
        const MOBILE_MARKERS: [&str; 8] = [
            "android",
            "webos",
            "iphone",
            "ipad",
            "ipod",
            "blackberry",
            "iemobile",
            "opera mini",
        ];

        let ua = user_agent.to_ascii_lowercase();
        if MOBILE_MARKERS.iter().any(|marker| ua.contains(marker)) {
            Deployment::Mobile
        } else {
            Deployment::Web
        }
    }
}

impl fmt::Display for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Deployment::Web => f.write_str("web"),
            Deployment::Mobile => f.write_str("mobile"),
        }
    }
}

/// Session parameters read from an inbound URL.
#[derive(Debug, Clone, PartialEq)]
pub struct HandoffPayload {
    pub token: String,
    pub user_profile: Option<UserProfile>,
    pub refresh_token: Option<String>,
    /// `userData` was present but could not be parsed.
    pub profile_malformed: bool,
}

fn parse_lenient(url: &str) -> std::result::Result<(Url, bool), ParseError> {
    match Url::parse(url) {
        Ok(parsed) => Ok((parsed, false)),
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = Url::parse(RELATIVE_BASE)?;
            Ok((base.join(url)?, true))
        }
        Err(e) => Err(e),
    }
}

/// Read the session parameters of `url`.
///
/// Returns `Ok(None)` when the URL carries no non-empty `token`.
///
/// # Errors
///
/// [`AuthError::InvalidUrl`](crate::AuthError::InvalidUrl) when the URL
/// cannot be parsed.
pub fn parse_handoff_url(url: &str) -> Result<Option<HandoffPayload>> {
    let (parsed, _) = parse_lenient(url)?;

    let mut token = None;
    let mut user_data = None;
    let mut refresh_token = None;

    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            TOKEN_PARAM if token.is_none() => token = Some(value.into_owned()),
            USER_DATA_PARAM if user_data.is_none() => user_data = Some(value.into_owned()),
            REFRESH_TOKEN_PARAM if refresh_token.is_none() => {
                refresh_token = Some(value.into_owned())
            }
            _ => {}
        }
    }

    let token = match token {
        Some(token) if !token.trim().is_empty() => token,
        _ => return Ok(None),
    };

    let (user_profile, profile_malformed) = match user_data.filter(|data| !data.is_empty()) {
        None => (None, false),
        Some(data) => match UserProfile::from_json_str(&data) {
            Ok(profile) => (Some(profile), false),
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed userData in hand-off URL");
                (None, true)
            }
        },
    };

    Ok(Some(HandoffPayload {
        token,
        user_profile,
        refresh_token: refresh_token.filter(|t| !t.is_empty()),
        profile_malformed,
    }))
}

/// Build `base + path`, carrying `record` as query parameters.
///
/// Without a record the result is exactly `base + path`. An existing query
/// is extended and a fragment stays last.
///
/// ```
/// use core_auth::handoff::build_handoff_url;
///
/// assert_eq!(build_handoff_url("https://m.example.com", "/home", None), "https://m.example.com/home");
/// ```
pub fn build_handoff_url(base: &str, path: &str, record: Option<&TokenRecord>) -> String {
    let target = format!("{}{}", base, path);

    let record = match record {
        Some(record) => record,
        None => return target,
    };

    let mut query = form_urlencoded::Serializer::new(String::new());
    query.append_pair(TOKEN_PARAM, &record.access_token);
    if let Some(profile) = &record.user_profile {
        match profile.to_json_string() {
            Ok(json) => {
                query.append_pair(USER_DATA_PARAM, &json);
            }
            Err(e) => tracing::warn!(error = %e, "Omitting profile from hand-off URL"),
        }
    }
    if let Some(refresh_token) = &record.refresh_token {
        query.append_pair(REFRESH_TOKEN_PARAM, refresh_token);
    }
    let query = query.finish();

    let (head, fragment) = match target.split_once('#') {
        Some((head, fragment)) => (head, Some(fragment)),
        None => (target.as_str(), None),
    };

    let separator = if !head.contains('?') {
        "?"
    } else if head.ends_with('?') || head.ends_with('&') {
        ""
    } else {
        "&"
    };

    let mut url = format!("{}{}{}", head, separator, query);
    if let Some(fragment) = fragment {
        url.push('#');
        url.push_str(fragment);
    }
    url
}

/// Remove the session parameters from `url`.
///
/// Path, other query pairs and the fragment are preserved. Input without
/// session parameters, or that cannot be parsed, is returned unchanged.
///
/// ```
/// use core_auth::handoff::strip_session_params;
///
/// assert_eq!(
///     strip_session_params("https://app.test/home?tab=2&token=abc#top"),
///     "https://app.test/home?tab=2#top"
/// );
/// ```
pub fn strip_session_params(url: &str) -> String {
    let (mut parsed, relative) = match parse_lenient(url) {
        Ok(parsed) => parsed,
        Err(_) => return url.to_string(),
    };

    let has_session_params = parsed
        .query_pairs()
        .any(|(key, _)| SESSION_PARAMS.contains(&key.as_ref()));
    if !has_session_params {
        return url.to_string();
    }

    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !SESSION_PARAMS.contains(&key.as_ref()))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if kept.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(kept);
    }

    if relative {
        parsed[Position::BeforePath..].to_string()
    } else {
        parsed.to_string()
    }
}
