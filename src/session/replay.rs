//! Session re-establishment after a reconnect
//!
//! The transport records every request it actually transmits. After a
//! replacement connection opens, the last known viewport, per-tab navigation
//! target and per-tab streaming toggle are sent again before anything else.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::config::ReplayConfig;
use crate::protocol::{Request, Scope};

pub const RESIZE: &str = "resize";
pub const NAVIGATE: &str = "navigate";
pub const START_VIDEO: &str = "startVideo";
pub const STOP_VIDEO: &str = "stopVideo";
pub const CLOSE_TAB: &str = "closeTab";

/// One command to re-send; the transport mints a fresh id for it.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayCommand {
    pub scope: Scope,
    pub method: &'static str,
    pub params: Value,
}

#[derive(Debug, Clone, Default)]
pub struct ReplayState {
    version: u64,
    viewport: Option<(Scope, Value)>,
    navigation: BTreeMap<i32, Value>,
    streaming: BTreeMap<i32, bool>,
}

impl ReplayState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bumped on every change, so a replay can be tied to the state it was built from.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn is_empty(&self) -> bool {
        self.viewport.is_none() && self.navigation.is_empty() && self.streaming.is_empty()
    }

    /// Record a transmitted request. Returns whether the state changed.
    pub fn observe(&mut self, request: &Request) -> bool {
        let tab = request.scope.tab_id();
        let changed = match (request.method.as_str(), tab) {
            (RESIZE, _) => {
                self.viewport = Some((request.scope, request.params.clone()));
                true
            }
            (NAVIGATE, Some(tab)) => {
                self.navigation.insert(tab, request.params.clone());
                true
            }
            (START_VIDEO, Some(tab)) => self.streaming.insert(tab, true) != Some(true),
            (STOP_VIDEO, Some(tab)) => self.streaming.insert(tab, false) != Some(false),
            (CLOSE_TAB, Some(tab)) => {
                let had_nav = self.navigation.remove(&tab).is_some();
                let had_stream = self.streaming.remove(&tab).is_some();
                had_nav || had_stream
            }
            _ => false,
        };
        if changed {
            self.version += 1;
        }
        changed
    }

    /// Commands to re-send, viewport first, then navigation, then streaming.
    pub fn commands(&self, enabled: &ReplayConfig) -> Vec<ReplayCommand> {
        let mut commands = Vec::new();

        if enabled.size {
            if let Some((scope, params)) = &self.viewport {
                commands.push(ReplayCommand {
                    scope: *scope,
                    method: RESIZE,
                    params: params.clone(),
                });
            }
        }

        if enabled.navigation {
            commands.extend(self.navigation.iter().map(|(tab, params)| ReplayCommand {
                scope: Scope::Tab(*tab),
                method: NAVIGATE,
                params: params.clone(),
            }));
        }

        if enabled.streaming {
            commands.extend(self.streaming.iter().map(|(tab, on)| ReplayCommand {
                scope: Scope::Tab(*tab),
                method: if *on { START_VIDEO } else { STOP_VIDEO },
                params: Value::Object(Default::default()),
            }));
        }

        commands
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(scope: Scope, method: &str, params: Value) -> Request {
        Request::new("x", scope, method, params)
    }

    fn all() -> ReplayConfig {
        ReplayConfig {
            size: true,
            navigation: true,
            streaming: true,
        }
    }

    #[test]
    fn test_empty_state_replays_nothing() {
        let state = ReplayState::new();
        assert!(state.is_empty());
        assert!(state.commands(&all()).is_empty());
    }

    #[test]
    fn test_last_known_values_win() {
        let mut state = ReplayState::new();
        state.observe(&request(Scope::Global, RESIZE, json!({ "width": 800, "height": 600 })));
        state.observe(&request(Scope::Global, RESIZE, json!({ "width": 1920, "height": 1080 })));
        state.observe(&request(Scope::Tab(2), NAVIGATE, json!({ "url": "https://a.test" })));
        state.observe(&request(Scope::Tab(2), NAVIGATE, json!({ "url": "https://b.test" })));
        state.observe(&request(Scope::Tab(2), START_VIDEO, json!({})));
        state.observe(&request(Scope::Tab(2), STOP_VIDEO, json!({})));

        let commands = state.commands(&all());
        let summary: Vec<(Scope, &str)> = commands.iter().map(|c| (c.scope, c.method)).collect();
        assert_eq!(
            summary,
            vec![
                (Scope::Global, RESIZE),
                (Scope::Tab(2), NAVIGATE),
                (Scope::Tab(2), STOP_VIDEO)
            ]
        );
        assert_eq!(commands[0].params, json!({ "width": 1920, "height": 1080 }));
        assert_eq!(commands[1].params, json!({ "url": "https://b.test" }));
    }

    #[test]
    fn test_closing_tab_forgets_its_state() {
        let mut state = ReplayState::new();
        state.observe(&request(Scope::Tab(1), NAVIGATE, json!({ "url": "https://a.test" })));
        state.observe(&request(Scope::Tab(1), START_VIDEO, json!({})));
        state.observe(&request(Scope::Tab(3), START_VIDEO, json!({})));
        state.observe(&request(Scope::Tab(1), CLOSE_TAB, json!({})));

        let commands = state.commands(&all());
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].scope, Scope::Tab(3));
    }

    #[test]
    fn test_version_tracks_changes_only() {
        let mut state = ReplayState::new();
        assert!(!state.observe(&request(Scope::Tab(1), "getTitle", json!({}))));
        assert_eq!(state.version(), 0);

        assert!(state.observe(&request(Scope::Tab(1), START_VIDEO, json!({}))));
        assert!(!state.observe(&request(Scope::Tab(1), START_VIDEO, json!({}))));
        assert_eq!(state.version(), 1);
    }

    #[test]
    fn test_disabled_categories_are_skipped() {
        let mut state = ReplayState::new();
        state.observe(&request(Scope::Global, RESIZE, json!({ "width": 1, "height": 1 })));
        state.observe(&request(Scope::Tab(1), NAVIGATE, json!({ "url": "https://a.test" })));
        state.observe(&request(Scope::Tab(1), START_VIDEO, json!({})));

        let only_size = ReplayConfig {
            size: true,
            navigation: false,
            streaming: false,
        };
        let commands = state.commands(&only_size);
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].method, RESIZE);
    }
}
