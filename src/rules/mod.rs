//! Graph rules: handlers that react to mutation events and keep the graph
//! consistent by staging further operations into the triggering transaction.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::error::{GraphError, Result, RuleErrors};
use crate::graph::{EventKind, GraphEvent, GraphManager, Trans};

mod system;

pub use system::{CascadeDeleteEdges, MaintainMetadataIndex};

/// A pluggable handler bound to a fixed set of event kinds.
pub trait Rule: Send + Sync {
    /// Unique rule name.
    fn name(&self) -> &str;

    /// Event kinds this rule subscribes to.
    fn handles(&self) -> &[EventKind];

    /// Handles an event. Every change must be staged into `trans`.
    ///
    /// `gm` is a read-only clone whose shared lock is held for the duration
    /// of the call.
    fn handle(&self, gm: &GraphManager, trans: &mut Trans, event: &GraphEvent) -> Result<()>;
}

#[derive(Default)]
struct Registry {
    rules: FxHashMap<String, Arc<dyn Rule>>,
    by_event: FxHashMap<EventKind, FxHashMap<String, Arc<dyn Rule>>>,
}

/// Registry of rules indexed by name and by event kind.
#[derive(Default)]
pub struct RuleEngine {
    registry: RwLock<Registry>,
}

impl RuleEngine {
    /// Creates an engine without any rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine with the cascading delete and metadata index rules.
    pub fn with_system_rules() -> Self {
        let engine = Self::new();
        engine.set_rule(Arc::new(CascadeDeleteEdges));
        engine.set_rule(Arc::new(MaintainMetadataIndex));
        engine
    }

    /// Registers `rule`, fully replacing any rule registered under the same name.
    pub fn set_rule(&self, rule: Arc<dyn Rule>) {
        let name = rule.name().to_owned();
        let mut registry = self.registry.write();
        for rules in registry.by_event.values_mut() {
            rules.remove(&name);
        }
        registry.by_event.retain(|_, rules| !rules.is_empty());
        for kind in rule.handles() {
            registry
                .by_event
                .entry(*kind)
                .or_default()
                .insert(name.clone(), Arc::clone(&rule));
        }
        debug!(rule = %name, handles = ?rule.handles(), "rules.set");
        registry.rules.insert(name, rule);
    }

    /// Sorted names of all registered rules.
    pub fn rule_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.registry.read().rules.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Names of the rules subscribed to `kind`, sorted.
    pub fn rules_for(&self, kind: EventKind) -> Vec<String> {
        let mut names: Vec<String> = self
            .registry
            .read()
            .by_event
            .get(&kind)
            .map(|rules| rules.keys().cloned().collect())
            .unwrap_or_default();
        names.sort_unstable();
        names
    }

    /// Runs every rule subscribed to the event's kind.
    ///
    /// All matching rules run even when some fail; failures are returned as
    /// one aggregated [`GraphError::Rule`]. Operations staged by rules are
    /// left in `trans` regardless of failures.
    pub fn dispatch(&self, gm: &GraphManager, trans: &mut Trans, event: &GraphEvent) -> Result<()> {
        let kind = event.kind();
        let matching: Vec<Arc<dyn Rule>> = match self.registry.read().by_event.get(&kind) {
            Some(rules) => rules.values().cloned().collect(),
            None => return Ok(()),
        };

        let mut errors = RuleErrors::default();
        for rule in matching {
            let snapshot = gm.read_only_clone();
            let _guard = snapshot.read_lock();
            if let Err(err) = rule.handle(&snapshot, trans, event) {
                warn!(rule = rule.name(), event = %kind, error = %err, "rules.dispatch.failed");
                errors.push(rule.name(), err);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(GraphError::Rule(errors))
        }
    }
}

impl fmt::Debug for RuleEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleEngine")
            .field("rules", &self.rule_names())
            .finish()
    }
}
