//! Request routing by verb and path pattern.
//!
//! Routes are tried in registration order and the first one whose verb is
//! equal and whose pattern matches wins. There is no "best match": callers
//! register overlapping patterns most-specific-first.

use crate::Result;
use regex::Regex;
use std::collections::HashMap;

/// A compiled route: endpoint name, HTTP verb and path pattern.
#[derive(Clone, Debug)]
pub struct Route {
    pub name: String,
    pub verb: String,
    pub expression: Regex,
}

/// The result of a successful [`RequestRouter::matches`] call.
#[derive(Clone, Debug)]
pub struct RouteMatch {
    pub name: String,
    pub verb: String,
    pub path: String,
    /// Named capture group -> matched substring. Unnamed groups are ignored,
    /// named groups that did not participate map to an empty string.
    pub variables: HashMap<String, String>,
    pub expression: Regex,
}

impl RouteMatch {
    /// Returns the value captured for `name`, if the pattern declares it.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }
}

/// An ordered list of routes.
#[derive(Clone, Debug, Default)]
pub struct RequestRouter {
    routes: Vec<Route>,
}

impl RequestRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `pattern` and appends the route.
    ///
    /// The pattern is used as written: it matches anywhere in the path unless
    /// it anchors itself with `^`/`$`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`](crate::Error::InvalidPattern) if the
    /// pattern does not compile. The router is left unchanged.
    pub fn add_route(
        &mut self,
        name: impl Into<String>,
        verb: impl Into<String>,
        pattern: &str,
    ) -> Result<()> {
        let route = Route {
            name: name.into(),
            verb: verb.into(),
            expression: Regex::new(pattern)?,
        };
        tracing::trace!(name = %route.name, verb = %route.verb, pattern, "Route added");
        self.routes.push(route);
        Ok(())
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// Returns the first registered route matching `verb` and `path`.
    pub fn matches(&self, verb: &str, path: &str) -> Option<RouteMatch> {
        self.routes
            .iter()
            .filter(|route| route.verb == verb)
            .find_map(|route| {
                let captures = route.expression.captures(path)?;
                let variables = route
                    .expression
                    .capture_names()
                    .flatten()
                    .map(|name| {
                        let value = captures.name(name).map_or("", |m| m.as_str());
                        (name.to_owned(), value.to_owned())
                    })
                    .collect();

                Some(RouteMatch {
                    name: route.name.clone(),
                    verb: route.verb.clone(),
                    path: path.to_owned(),
                    variables,
                    expression: route.expression.clone(),
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    const PATTERN: &str = "/(?P<queue>[a-z]+)";

    #[test]
    fn routes_are_attached_in_order() {
        let mut r = RequestRouter::new();
        r.add_route("routeName1", "GET", "/route1").unwrap();
        r.add_route("routeName2", "GET", "/route2").unwrap();
        r.add_route("routeName3", "GET", "/route3").unwrap();

        let names: Vec<_> = r.routes().iter().map(|route| route.name.as_str()).collect();
        assert_eq!(names, ["routeName1", "routeName2", "routeName3"]);
    }

    #[test]
    fn matches_by_verb_and_extracts_variables() {
        let mut r = RequestRouter::new();
        r.add_route("routeName1", "GET", PATTERN).unwrap();
        r.add_route("routeName2", "PUT", PATTERN).unwrap();

        let m = r.matches("PUT", "/myqueue").unwrap();
        assert_eq!(m.name, "routeName2");
        assert_eq!(m.path, "/myqueue");
        assert_eq!(m.verb, "PUT");
        assert_eq!(m.expression.as_str(), PATTERN);
        assert_eq!(m.variable("queue"), Some("myqueue"));
        assert_eq!(m.variables.len(), 1);
    }

    #[test]
    fn first_registered_route_wins() {
        let mut r = RequestRouter::new();
        r.add_route("specific", "GET", "/a").unwrap();
        r.add_route("catch_all", "GET", "/.*").unwrap();
        assert_eq!(r.matches("GET", "/a").unwrap().name, "specific");

        let mut r = RequestRouter::new();
        r.add_route("catch_all", "GET", "/.*").unwrap();
        r.add_route("specific", "GET", "/a").unwrap();
        assert_eq!(r.matches("GET", "/a").unwrap().name, "catch_all");
    }

    #[test]
    fn no_match_on_verb_or_path() {
        let mut r = RequestRouter::new();
        r.add_route("getQueue", "GET", PATTERN).unwrap();

        assert!(r.matches("DELETE", "/myqueue").is_none());
        assert!(r.matches("GET", "/123").is_none());
        assert!(r.matches("GET", "12345").is_none());
        assert!(RequestRouter::new().matches("GET", "/").is_none());
    }

    #[test]
    fn unanchored_patterns_match_anywhere() {
        let mut r = RequestRouter::new();
        r.add_route("loose", "GET", PATTERN).unwrap();
        r.add_route("strict", "POST", "^/(?P<queue>[a-z]+)$").unwrap();

        assert_eq!(
            r.matches("GET", "/123/abc").unwrap().variable("queue"),
            Some("abc")
        );
        assert!(r.matches("POST", "/abc/messages").is_none());
    }

    #[test]
    fn unnamed_groups_ignored_and_missing_named_groups_empty() {
        let mut r = RequestRouter::new();
        r.add_route(
            "message",
            "DELETE",
            "^/(?P<queue>[a-z]+)/(messages)(?:/(?P<message>[0-9a-f-]+))?$",
        )
        .unwrap();

        let m = r.matches("DELETE", "/q/messages").unwrap();
        assert_eq!(m.variables.len(), 2);
        assert_eq!(m.variable("queue"), Some("q"));
        assert_eq!(m.variable("message"), Some(""));

        let m = r.matches("DELETE", "/q/messages/ab-12").unwrap();
        assert_eq!(m.variable("message"), Some("ab-12"));
    }

    #[test]
    fn invalid_pattern_is_rejected() {
        let mut r = RequestRouter::new();
        let err = r.add_route("broken", "GET", "/(?P<queue>[a-z+").unwrap_err();
        assert!(matches!(err, Error::InvalidPattern(_)));
        assert!(r.routes().is_empty());
    }
}
