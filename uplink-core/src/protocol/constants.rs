// SPDX-FileCopyrightText: 2026 Uplink Contributors
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Wire Contract Constants
//!
//! Single source of truth for every identifier that crosses the wire:
//! endpoint path segments, header and parameter names, reserved URI
//! prefixes. These must match byte-for-byte what existing clients send,
//! so they are never derived or rebuilt at runtime.

/// Path segment for the application bootstrap endpoint.
pub const APP_PATH: &str = "APP";

/// Path segment for the UI-delta (UIDL) endpoint.
pub const UIDL_PATH: &str = "UIDL";

/// Path segment for the heartbeat endpoint.
pub const HEARTBEAT_PATH: &str = "HEARTBEAT";

/// Path segment for the push endpoint.
pub const PUSH_PATH: &str = "PUSH";

/// Path for published files, nested under the bootstrap endpoint.
pub const PUBLISHED_FILE_PATH: &str = "APP/PUBLISHED";

/// Header carrying the anti-CSRF token on UIDL requests.
pub const UIDL_SECURITY_TOKEN_HEADER: &str = "Vaadin-Security-Key";

/// Header carrying the push connection identifier.
pub const UIDL_PUSH_ID_HEADER: &str = "Vaadin-Push-ID";

/// Bootstrap parameter name for the CSRF token.
pub const CSRF_TOKEN_PARAMETER: &str = "v-csrfToken";

/// Bootstrap parameter name for the push connection identifier.
pub const PUSH_ID_PARAMETER: &str = "v-pushId";

/// Request parameter name for an application resource path.
pub const V_RESOURCE_PATH: &str = "v-resourcePath";

/// Field name carrying the RPC invocation batch.
pub const RPC_INVOCATIONS: &str = "rpc";

/// Field name carrying the CSRF token inside a UIDL message.
pub const CSRF_TOKEN: &str = "csrfToken";

/// Field name carrying the server sync id.
///
/// The value can be set to [`IGNORE_SYNC_ID`] e.g. when testing with
/// pre-recorded requests to make the server ignore the sync id.
pub const SERVER_SYNC_ID: &str = "syncId";

/// Field name carrying the id of client-to-server messages.
pub const CLIENT_TO_SERVER_ID: &str = "clientId";

/// URL parameter forcing the full server-side state to be returned,
/// i.e. without any incremental changes.
pub const URL_PARAMETER_REPAINT_ALL: &str = "repaintAll";

/// Field name of the resynchronization request flag.
pub const RESYNCHRONIZE_ID: &str = "resynchronize";

/// Field name carrying the widget set version for the server-side check.
pub const WIDGETSET_VERSION_ID: &str = "wsver";

/// Reserved CSRF token value, accepted only when security protection is
/// explicitly disabled. Never issued by the token store.
pub const CSRF_TOKEN_DEFAULT_VALUE: &str = "init";

/// Sync id sentinel that disables the server-sync ordering check for a
/// single inbound batch (record/replay testing).
pub const IGNORE_SYNC_ID: i64 = -1;

/// URI prefix for application resources.
pub const APP_PROTOCOL_PREFIX: &str = "app://";

/// URI prefix for resources served from the framework directory.
pub const VAADIN_PROTOCOL_PREFIX: &str = "vaadin://";

/// URI prefix for resources relative to the application context root.
pub const CONTEXT_PROTOCOL_PREFIX: &str = "context://";

/// URI prefix for font icon references.
pub const FONTICON_PROTOCOL_PREFIX: &str = "fonticon://";

/// URI prefix for published files.
pub const PUBLISHED_PROTOCOL_PREFIX: &str = "published://";

/// URI prefix for frontend resources.
pub const FRONTEND_PROTOCOL_PREFIX: &str = "frontend://";

/// URI prefix for theme resources.
pub const THEME_PROTOCOL_PREFIX: &str = "theme://";

/// Configuration key giving the (possibly relative) URL to the web
/// application context root.
pub const CONTEXT_ROOT_URL: &str = "contextRootUrl";

/// Configuration key giving the URL of the framework directory from
/// where themes and widget sets are loaded.
pub const VAADIN_DIR_URL: &str = "vaadinDir";

/// Configuration key giving the base URL that `frontend://` resolves to.
pub const FRONTEND_URL: &str = "frontendUrl";

/// Configuration key for the service URL.
pub const SERVICE_URL: &str = "serviceUrl";

/// Configuration key for the path parameter name of the service URL.
pub const SERVICE_URL_PARAMETER_NAME: &str = "pathParameterName";

/// Content type for HTML-bearing responses (always UTF-8).
pub const CONTENT_TYPE_TEXT_HTML_UTF_8: &str = "text/html; charset=utf-8";
