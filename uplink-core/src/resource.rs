// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Protocol-Prefixed Resource References
//!
//! Resolves the reserved `scheme://` reference prefixes to concrete,
//! context-relative URLs. The scheme set is closed: adding one is a
//! compile-time change to [`ResourceProtocol`], not a string match.

use thiserror::Error;

use crate::protocol::constants::{
    APP_PATH, APP_PROTOCOL_PREFIX, CONTEXT_PROTOCOL_PREFIX, FONTICON_PROTOCOL_PREFIX,
    FRONTEND_PROTOCOL_PREFIX, PUBLISHED_FILE_PATH, PUBLISHED_PROTOCOL_PREFIX,
    THEME_PROTOCOL_PREFIX, VAADIN_PROTOCOL_PREFIX,
};

/// Resource resolution error types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("unknown resource scheme in reference: {0}")]
    UnknownScheme(String),

    #[error("frontend base URL nests deeper than one protocol level: {0}")]
    NestedFrontendBase(String),
}

/// The closed set of reserved reference schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceProtocol {
    /// `app://` - application resources below the APP endpoint.
    App,
    /// `vaadin://` - resources in the framework directory.
    Vaadin,
    /// `context://` - resources relative to the context root.
    Context,
    /// `fonticon://` - font icon references.
    FontIcon,
    /// `published://` - files published through APP/PUBLISHED.
    Published,
    /// `frontend://` - frontend build output.
    Frontend,
    /// `theme://` - resources of the active theme.
    Theme,
}

impl ResourceProtocol {
    /// The wire prefix for this scheme, including the `://` separator.
    pub fn prefix(&self) -> &'static str {
        match self {
            ResourceProtocol::App => APP_PROTOCOL_PREFIX,
            ResourceProtocol::Vaadin => VAADIN_PROTOCOL_PREFIX,
            ResourceProtocol::Context => CONTEXT_PROTOCOL_PREFIX,
            ResourceProtocol::FontIcon => FONTICON_PROTOCOL_PREFIX,
            ResourceProtocol::Published => PUBLISHED_PROTOCOL_PREFIX,
            ResourceProtocol::Frontend => FRONTEND_PROTOCOL_PREFIX,
            ResourceProtocol::Theme => THEME_PROTOCOL_PREFIX,
        }
    }

    /// All reserved schemes, in prefix-match order.
    pub fn all() -> &'static [ResourceProtocol] {
        &[
            ResourceProtocol::App,
            ResourceProtocol::Vaadin,
            ResourceProtocol::Context,
            ResourceProtocol::FontIcon,
            ResourceProtocol::Published,
            ResourceProtocol::Frontend,
            ResourceProtocol::Theme,
        ]
    }

    /// Splits a reference into its scheme and the remaining path.
    ///
    /// Returns `None` for plain URLs without a reserved prefix.
    pub fn parse(reference: &str) -> Option<(ResourceProtocol, &str)> {
        for scheme in Self::all() {
            if let Some(rest) = reference.strip_prefix(scheme.prefix()) {
                return Some((*scheme, rest));
            }
        }
        None
    }
}

/// True if the reference carries any `scheme://` marker, reserved or not.
///
/// Used to distinguish "plain URL, pass through" from "looks like a
/// protocol reference but the scheme is unknown".
pub fn has_scheme_marker(reference: &str) -> bool {
    reference
        .split_once("://")
        .is_some_and(|(scheme, _)| !scheme.is_empty() && scheme.chars().all(char::is_alphanumeric))
}

/// Maps protocol-prefixed references to concrete context-relative URLs.
///
/// Resolution is a pure function of the configured base paths, so it is
/// idempotent and safe to cache for the application lifetime.
#[derive(Debug, Clone)]
pub struct ResourceResolver {
    /// URL of the application context root, with a trailing slash.
    context_root: String,
    /// URL of the framework directory, with a trailing slash.
    vaadin_dir: String,
    /// Base URL that `frontend://` resolves against. May itself carry a
    /// reserved prefix (e.g. `vaadin://frontend/`), resolved one level.
    frontend_url: String,
    /// Name of the active theme.
    theme: String,
}

impl ResourceResolver {
    pub fn new(
        context_root: impl Into<String>,
        vaadin_dir: impl Into<String>,
        frontend_url: impl Into<String>,
        theme: impl Into<String>,
    ) -> Self {
        ResourceResolver {
            context_root: with_trailing_slash(context_root.into()),
            vaadin_dir: with_trailing_slash(vaadin_dir.into()),
            frontend_url: with_trailing_slash(frontend_url.into()),
            theme: theme.into(),
        }
    }

    /// Resolves a single reference to a concrete URL.
    ///
    /// Plain relative references and ordinary `http(s)` URLs pass
    /// through unchanged. Any other scheme marker that is not one of
    /// the reserved prefixes fails with [`ResourceError::UnknownScheme`].
    pub fn resolve(&self, reference: &str) -> Result<String, ResourceError> {
        let Some((scheme, path)) = ResourceProtocol::parse(reference) else {
            if has_scheme_marker(reference)
                && !reference.starts_with("http://")
                && !reference.starts_with("https://")
            {
                return Err(ResourceError::UnknownScheme(reference.to_string()));
            }
            return Ok(reference.to_string());
        };

        match scheme {
            ResourceProtocol::App => Ok(format!("{}{}/{}", self.context_root, APP_PATH, path)),
            ResourceProtocol::Vaadin => Ok(format!("{}{}", self.vaadin_dir, path)),
            ResourceProtocol::Context => Ok(format!("{}{}", self.context_root, path)),
            ResourceProtocol::FontIcon => Ok(format!("{}fonticon/{}", self.vaadin_dir, path)),
            ResourceProtocol::Published => {
                Ok(format!("{}{}/{}", self.context_root, PUBLISHED_FILE_PATH, path))
            }
            ResourceProtocol::Frontend => {
                let base = self.resolve_frontend_base()?;
                Ok(format!("{}{}", base, path))
            }
            ResourceProtocol::Theme => Ok(format!(
                "{}themes/{}/{}",
                self.vaadin_dir, self.theme, path
            )),
        }
    }

    /// Resolves the configured frontend base, which may itself be a
    /// protocol reference one level deep (e.g. `vaadin://frontend/`).
    fn resolve_frontend_base(&self) -> Result<String, ResourceError> {
        match ResourceProtocol::parse(&self.frontend_url) {
            None => Ok(self.frontend_url.clone()),
            Some((ResourceProtocol::Frontend, _)) => Err(ResourceError::NestedFrontendBase(
                self.frontend_url.clone(),
            )),
            Some(_) => self.resolve(&self.frontend_url),
        }
    }
}

fn with_trailing_slash(mut s: String) -> String {
    if !s.ends_with('/') {
        s.push('/');
    }
    s
}
