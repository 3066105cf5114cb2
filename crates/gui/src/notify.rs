//! Outbound notifications. Listeners run synchronously inside the handler that raised
//! the event, at most once per user action.

use glam::Vec2;

#[derive(Debug, Clone, PartialEq)]
pub enum CanvasEvent {
    /// Camera zoom, angles or target changed
    ViewportChanged,
    DoubleClick,
    /// Right click over a volume, in canvas pixels
    RightClick { position: Vec2 },
    /// Object id of the newly selected group; `None` after clearing the selection
    SelectionChanged { object_id: Option<usize> },
    /// A layer height profile was edited or reset
    ModelUpdated,
    /// Volumes translated by a drag
    VolumeMoved { volume_idxs: Vec<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ViewportChanged,
    DoubleClick,
    RightClick,
    SelectionChanged,
    ModelUpdated,
    VolumeMoved,
}

impl CanvasEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ViewportChanged => EventKind::ViewportChanged,
            Self::DoubleClick => EventKind::DoubleClick,
            Self::RightClick { .. } => EventKind::RightClick,
            Self::SelectionChanged { .. } => EventKind::SelectionChanged,
            Self::ModelUpdated => EventKind::ModelUpdated,
            Self::VolumeMoved { .. } => EventKind::VolumeMoved,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Listener = Box<dyn FnMut(&CanvasEvent)>;

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    listener: Listener,
}

/// Typed listener registry
#[derive(Default)]
pub struct EventDispatcher {
    subscriptions: Vec<Subscription>,
    next_id: u64,
}

impl std::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscriptions", &self.subscriptions.len())
            .finish()
    }
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen to every event
    pub fn subscribe(&mut self, listener: impl FnMut(&CanvasEvent) + 'static) -> SubscriptionId {
        self.add(None, Box::new(listener))
    }

    /// Listen to one kind of event
    pub fn on(&mut self, kind: EventKind, listener: impl FnMut(&CanvasEvent) + 'static) -> SubscriptionId {
        self.add(Some(kind), Box::new(listener))
    }

    fn add(&mut self, kind: Option<EventKind>, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscriptions.push(Subscription { id, kind, listener });
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|s| s.id != id);
        self.subscriptions.len() != before
    }

    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }

    pub fn emit(&mut self, event: CanvasEvent) {
        tracing::trace!(?event, "canvas event");
        let kind = event.kind();
        for sub in &mut self.subscriptions {
            if sub.kind.is_none_or(|k| k == kind) {
                (sub.listener)(&event);
            }
        }
    }
}
