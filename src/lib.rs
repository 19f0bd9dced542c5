//! # Ponto (Web/Native Authentication Bridge)
//!
//! `ponto` lets a single web front end serve ordinary browsers and a native
//! mobile app embedding a WebView with one identity-provider-backed session,
//! and hands session credentials across the web/native boundary without
//! leaking them to the wrong context.
//!
//! ## Path policy
//!
//! One classification table lives in [`policy`] and is consulted by both the
//! edge [`gate`] middleware and the client-side [`flow`] mirrors, so the two
//! layers can never disagree about which paths require a session.
//!
//! ## Mobile hand-off
//!
//! A navigation that originates from a native app carries `app_scheme` and
//! `redirect_url` query parameters. The [`mobile`] module extracts, validates,
//! and re-serializes them so they survive the whole login → provider →
//! callback redirect chain, and finally encodes session tokens into a
//! `{app_scheme}://auth/callback?...` deep link the app intercepts. Tokens
//! only ever appear in that native-scheme URL, never in a web redirect.
//!
//! ## Sessions
//!
//! Sessions are issued by an external identity provider and are opaque here:
//! the bridge reads and relays access/refresh tokens, it never mints,
//! inspects, or stores them. The provider client in [`provider`] is built per
//! request or per check, never cached process-wide.

pub mod api;
pub mod cli;
pub mod config;
pub mod flow;
pub mod gate;
pub mod mobile;
pub mod policy;
pub mod provider;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
