use std::sync::{Arc, Weak};

use crate::levels::SeverityTable;

/// Source of records a transport can be attached to.
///
/// Both values are read once per attach; the table is expected to stay the
/// same for as long as the attachment lasts.
pub trait Producer: Send + Sync {
    /// Severity table shared with every attached transport.
    fn levels(&self) -> Arc<SeverityTable>;

    /// The producer's own threshold, inherited by transports without one.
    fn level(&self) -> Option<String>;
}

/// A producer with a fixed table and threshold.
#[derive(Debug, Clone)]
pub struct StaticProducer {
    levels: Arc<SeverityTable>,
    level: Option<String>,
}

impl StaticProducer {
    pub fn new(levels: SeverityTable, level: Option<&str>) -> Self {
        StaticProducer {
            levels: Arc::new(levels),
            level: level.map(str::to_string),
        }
    }
}

impl Producer for StaticProducer {
    fn levels(&self) -> Arc<SeverityTable> {
        Arc::clone(&self.levels)
    }

    fn level(&self) -> Option<String> {
        self.level.clone()
    }
}

/// Attach/detach bookkeeping of one transport.
///
/// Two transitions only: `attach` overwrites table, inherited level and
/// parent; `detach` clears the parent when it names the current one.
#[derive(Default)]
pub(crate) struct Binding {
    levels: Option<Arc<SeverityTable>>,
    inherited_level: Option<String>,
    parent: Option<Weak<dyn Producer>>,
}

impl Binding {
    pub(crate) fn with_levels(levels: Option<Arc<SeverityTable>>) -> Self {
        Binding {
            levels,
            ..Binding::default()
        }
    }

    pub(crate) fn attach(&mut self, producer: &Arc<dyn Producer>, explicit_level: bool) {
        self.levels = Some(producer.levels());
        if !explicit_level {
            self.inherited_level = producer.level();
        }
        self.parent = Some(Arc::downgrade(producer));
    }

    /// Returns `true` when `producer` was the current parent and got cleared.
    pub(crate) fn detach<P: Producer + ?Sized>(&mut self, producer: &Arc<P>) -> bool {
        let is_current = self
            .parent
            .as_ref()
            .is_some_and(|parent| same_producer(parent, producer));
        if is_current {
            self.parent = None;
        }
        is_current
    }

    pub(crate) fn levels(&self) -> Option<&Arc<SeverityTable>> {
        self.levels.as_ref()
    }

    pub(crate) fn parent(&self) -> Option<Arc<dyn Producer>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// Level copied at attach time, else the live parent's level.
    pub(crate) fn fallback_level(&self) -> Option<String> {
        self.inherited_level
            .clone()
            .or_else(|| self.parent().and_then(|p| p.level()))
    }
}

fn same_producer<P: Producer + ?Sized>(parent: &Weak<dyn Producer>, producer: &Arc<P>) -> bool {
    std::ptr::addr_eq(parent.as_ptr(), Arc::as_ptr(producer))
}
