//! Navigation lifecycle events.

use std::fmt;
use std::str::FromStr;

use electrobun_common::ViewId;
use serde::{Deserialize, Serialize};

/// Events a view reports while it navigates.
///
/// On the process-wide bus each is published under `"<event>-<view id>"`,
/// so listeners for one view never see another view's traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NavigationEvent {
    WillNavigate,
    DidNavigate,
    DidNavigateInPage,
    DidCommitNavigation,
    DomReady,
    NewWindowOpen,
}

impl NavigationEvent {
    pub const ALL: [NavigationEvent; 6] = [
        Self::WillNavigate,
        Self::DidNavigate,
        Self::DidNavigateInPage,
        Self::DidCommitNavigation,
        Self::DomReady,
        Self::NewWindowOpen,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::WillNavigate => "will-navigate",
            Self::DidNavigate => "did-navigate",
            Self::DidNavigateInPage => "did-navigate-in-page",
            Self::DidCommitNavigation => "did-commit-navigation",
            Self::DomReady => "dom-ready",
            Self::NewWindowOpen => "new-window-open",
        }
    }

    /// Bus name for this event on `view_id`.
    pub fn scoped(self, view_id: ViewId) -> String {
        format!("{}-{}", self.as_str(), view_id.get())
    }
}

impl fmt::Display for NavigationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEvent(pub String);

impl fmt::Display for UnknownEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown navigation event: {}", self.0)
    }
}

impl std::error::Error for UnknownEvent {}

impl FromStr for NavigationEvent {
    type Err = UnknownEvent;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| UnknownEvent(s.to_string()))
    }
}
