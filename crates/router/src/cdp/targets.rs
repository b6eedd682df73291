//! Target Lifecycle Tracker - browser contexts and the targets inside them
//!
//! The tree is browser -> browser context -> target. The default context
//! has no id and is keyed as `None`.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::domains::target::TargetInfo;
use super::protocol::{BrowserContextId, TargetId};

#[derive(Default)]
struct Tree {
    targets: HashMap<TargetId, TargetInfo>,
    contexts: BTreeMap<Option<BrowserContextId>, BTreeSet<TargetId>>,
}

impl Tree {
    fn unlink(&mut self, target_id: &str, context: &Option<BrowserContextId>) {
        if let Some(members) = self.contexts.get_mut(context) {
            members.remove(target_id);
            // Keep explicit contexts around until disposed
            if context.is_none() && members.is_empty() {
                self.contexts.remove(context);
            }
        }
    }
}

#[derive(Default)]
pub struct TargetTree {
    tree: RwLock<Tree>,
}

impl TargetTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a target. Returns true if it was not known before.
    pub fn upsert(&self, info: TargetInfo) -> bool {
        let mut tree = self.tree.write();
        let previous = tree.targets.get(&info.target_id).map(|old| old.browser_context_id.clone());
        let created = previous.is_none();

        if let Some(old_context) = previous {
            if old_context != info.browser_context_id {
                tree.unlink(&info.target_id, &old_context);
            }
        }
        tree.contexts
            .entry(info.browser_context_id.clone())
            .or_default()
            .insert(info.target_id.clone());
        tree.targets.insert(info.target_id.clone(), info);
        created
    }

    pub fn remove_target(&self, target_id: &str) -> Option<TargetInfo> {
        let mut tree = self.tree.write();
        let info = tree.targets.remove(target_id)?;
        tree.unlink(target_id, &info.browser_context_id);
        Some(info)
    }

    pub fn add_context(&self, context_id: BrowserContextId) {
        self.tree.write().contexts.entry(Some(context_id)).or_default();
    }

    /// Drop a context and every target in it. Returns the removed targets.
    pub fn remove_context(&self, context_id: &str) -> Vec<TargetId> {
        let mut tree = self.tree.write();
        let members = tree
            .contexts
            .remove(&Some(context_id.to_string()))
            .unwrap_or_default();
        for target_id in &members {
            tree.targets.remove(target_id);
        }
        members.into_iter().collect()
    }

    pub fn get(&self, target_id: &str) -> Option<TargetInfo> {
        self.tree.read().targets.get(target_id).cloned()
    }

    pub fn targets(&self) -> Vec<TargetInfo> {
        let mut targets: Vec<TargetInfo> = self.tree.read().targets.values().cloned().collect();
        targets.sort_by(|a, b| a.target_id.cmp(&b.target_id));
        targets
    }

    /// Targets in one context; `None` is the default context.
    pub fn targets_in(&self, context_id: Option<&str>) -> Vec<TargetInfo> {
        let tree = self.tree.read();
        let key = context_id.map(str::to_string);
        tree.contexts
            .get(&key)
            .map(|members| {
                members
                    .iter()
                    .filter_map(|id| tree.targets.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Explicit (non-default) browser contexts
    pub fn browser_contexts(&self) -> Vec<BrowserContextId> {
        self.tree
            .read()
            .contexts
            .keys()
            .filter_map(|key| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(target_id: &str, context: Option<&str>) -> TargetInfo {
        TargetInfo {
            target_id: target_id.to_string(),
            target_type: "page".to_string(),
            title: String::new(),
            url: "about:blank".to_string(),
            attached: false,
            opener_id: None,
            browser_context_id: context.map(str::to_string),
        }
    }

    #[test]
    fn test_upsert_and_remove() {
        let tree = TargetTree::new();
        assert!(tree.upsert(info("T1", None)));
        assert!(!tree.upsert(info("T1", None)));
        assert!(tree.upsert(info("T2", Some("C1"))));

        assert_eq!(tree.targets().len(), 2);
        assert_eq!(tree.browser_contexts(), vec!["C1".to_string()]);
        assert_eq!(tree.targets_in(None)[0].target_id, "T1");

        assert!(tree.remove_target("T1").is_some());
        assert!(tree.remove_target("T1").is_none());
        assert!(tree.targets_in(None).is_empty());
    }

    #[test]
    fn test_context_move_on_info_change() {
        let tree = TargetTree::new();
        tree.add_context("C1".into());
        tree.upsert(info("T1", None));
        tree.upsert(info("T1", Some("C1")));
        assert!(tree.targets_in(None).is_empty());
        assert_eq!(tree.targets_in(Some("C1")).len(), 1);
    }

    #[test]
    fn test_remove_context_takes_targets() {
        let tree = TargetTree::new();
        tree.add_context("C1".into());
        assert_eq!(tree.browser_contexts(), vec!["C1".to_string()]);
        tree.upsert(info("T1", Some("C1")));
        tree.upsert(info("T2", Some("C1")));
        tree.upsert(info("T3", None));

        let removed = tree.remove_context("C1");
        assert_eq!(removed, vec!["T1".to_string(), "T2".to_string()]);
        assert!(tree.browser_contexts().is_empty());
        assert_eq!(tree.targets().len(), 1);
        assert!(tree.get("T3").is_some());
    }
}
