//! URL routing for the emulated endpoints.
//!
//! URLs are percent-decoded and stripped of their scheme before matching.
//! Credentials travel in the query as `login=..&password=..`.

use bugbridge_core::rest::Method;
use regex::{Captures, Regex};

/// A recognised endpoint with its path parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    User {
        credentials: Option<String>,
        username: String,
    },
    Bug {
        id: u64,
        credentials: Option<String>,
    },
    SeeAlso {
        id: u64,
    },
    Comments {
        id: u64,
        credentials: Option<String>,
    },
    ProductEnterable,
    Product {
        id: u64,
    },
    Field {
        name: String,
    },
    CreateBug {
        credentials: Option<String>,
    },
    ShowBug {
        id: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    User,
    Bug,
    SeeAlso,
    Comments,
    ProductEnterable,
    Product,
    Field,
    CreateBug,
    ShowBug,
}

/// Parsed `login`/`password` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Login {
    pub login: String,
    pub password: String,
}

/// Regex router bound to one host.
#[derive(Debug, Clone)]
pub struct Router {
    routes: Vec<(Endpoint, Regex)>,
    credentials: Regex,
}

impl Router {
    /// Compile the route table for `host`.
    ///
    /// # Errors
    ///
    /// Returns the regex error if a route fails to compile.
    pub fn new(host: &str) -> Result<Self, regex::Error> {
        let host = regex::escape(host);
        let creds = r"login=\S+&password=\S+";
        let table = [
            (
                Endpoint::User,
                format!(r"^{host}/rest/user\?(?P<credentials>{creds}&)?names=(?P<username>\S+)$"),
            ),
            (
                Endpoint::Bug,
                format!(r"^{host}/rest/bug/(?P<id>\d+)(?:\?(?P<credentials>{creds}))?$"),
            ),
            (
                Endpoint::SeeAlso,
                format!(r"^{host}/rest/bug/(?P<id>\d+)\?(?:{creds}&)?include_fields=see_also$"),
            ),
            (
                Endpoint::Comments,
                format!(r"^{host}/rest/bug/(?P<id>\d+)/comment(?:\?(?P<credentials>{creds}))?$"),
            ),
            (
                Endpoint::ProductEnterable,
                format!(r"^{host}/rest/product_enterable(?:\?{creds})?$"),
            ),
            (
                Endpoint::Product,
                format!(r"^{host}/rest/product/(?P<id>\d+)(?:\?{creds})?$"),
            ),
            (
                Endpoint::Field,
                format!(r"^{host}/rest/field/bug/(?P<name>\w+)(?:\?{creds})?$"),
            ),
            (
                Endpoint::CreateBug,
                format!(r"^{host}/rest/bug(?:\?(?P<credentials>{creds}))?$"),
            ),
            (
                Endpoint::ShowBug,
                format!(r"^{host}/show_bug\.cgi\?(?:{creds}&)?id=(?P<id>\d+)$"),
            ),
        ];
        let routes = table
            .into_iter()
            .map(|(endpoint, pattern)| Regex::new(&pattern).map(|re| (endpoint, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            routes,
            credentials: Regex::new(r"^\??login=(?P<login>\S+?)&password=(?P<password>\S+?)&?$")?,
        })
    }

    /// Match `method` and `url` against the table.
    #[must_use]
    pub fn resolve(&self, method: Method, url: &str) -> Option<Route> {
        let (scheme, rest) = url.split_once("://")?;
        if scheme != "http" && scheme != "https" {
            return None;
        }
        let decoded = urlencoding::decode(rest).ok()?;

        self.routes.iter().find_map(|(endpoint, regex)| {
            let captures = regex.captures(&decoded)?;
            Self::route(*endpoint, method, &captures)
        })
    }

    fn route(endpoint: Endpoint, method: Method, captures: &Captures<'_>) -> Option<Route> {
        let id = || captures.name("id").and_then(|m| m.as_str().parse().ok());
        let credentials = || captures.name("credentials").map(|m| m.as_str().to_string());
        match (endpoint, method) {
            (Endpoint::User, Method::Get) => Some(Route::User {
                credentials: credentials(),
                username: captures.name("username")?.as_str().to_string(),
            }),
            (Endpoint::Bug, Method::Get | Method::Put) => Some(Route::Bug {
                id: id()?,
                credentials: credentials(),
            }),
            (Endpoint::SeeAlso, Method::Get) => Some(Route::SeeAlso { id: id()? }),
            (Endpoint::Comments, Method::Get | Method::Post) => Some(Route::Comments {
                id: id()?,
                credentials: credentials(),
            }),
            (Endpoint::ProductEnterable, Method::Get) => Some(Route::ProductEnterable),
            (Endpoint::Product, Method::Get) => Some(Route::Product { id: id()? }),
            (Endpoint::Field, Method::Get) => Some(Route::Field {
                name: captures.name("name")?.as_str().to_string(),
            }),
            (Endpoint::CreateBug, Method::Post) => Some(Route::CreateBug {
                credentials: credentials(),
            }),
            (Endpoint::ShowBug, Method::Get) => Some(Route::ShowBug { id: id()? }),
            _ => None,
        }
    }

    /// Split a credentials fragment into login and password.
    #[must_use]
    pub fn login(&self, credentials: &str) -> Option<Login> {
        let captures = self.credentials.captures(credentials)?;
        Some(Login {
            login: captures.name("login")?.as_str().to_string(),
            password: captures.name("password")?.as_str().to_string(),
        })
    }
}
