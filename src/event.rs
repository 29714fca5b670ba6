//! Contact notifications and deferred changes to the world.

use crate::physics::{body_set::BodyKey, collision::PairKey, joint::JointKey};

use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContactEventKind {
    /// The bodies started touching this tick.
    Begin,
    /// The bodies were already touching during the previous tick.
    Continue,
    /// The bodies touched during the previous tick but not this one,
    /// or one of them was removed.
    End,
}

/// Event produced by the physics world when two bodies touch.
/// Each pair of bodies produces at most one event per tick.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContactEvent {
    pub kind: ContactEventKind,
    /// The bodies in the order they were detected in.
    /// A moving body comes before a static one,
    /// otherwise the one added to the world earlier comes first.
    pub bodies: [BodyKey; 2],
    pub pair: PairKey,
}

impl ContactEvent {
    /// Get the other body of the pair, if `body` is part of it.
    pub fn other(&self, body: BodyKey) -> Option<BodyKey> {
        match self.bodies {
            [a, b] if a == body => Some(b),
            [a, b] if b == body => Some(a),
            _ => None,
        }
    }
}

/// Changes to the world requested while a tick is running.
/// These are applied when the tick ends.
#[derive(Clone, Debug, Default)]
pub struct Commands {
    pub(crate) removed_bodies: Vec<BodyKey>,
    pub(crate) removed_joints: Vec<JointKey>,
}

impl Commands {
    /// Remove a body at the end of the tick.
    /// Removing the same body several times is fine.
    pub fn remove_body(&mut self, key: BodyKey) {
        if !self.removed_bodies.contains(&key) {
            self.removed_bodies.push(key);
        }
    }

    /// Remove a joint at the end of the tick.
    pub fn remove_joint(&mut self, key: JointKey) {
        if !self.removed_joints.contains(&key) {
            self.removed_joints.push(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.removed_bodies.is_empty() && self.removed_joints.is_empty()
    }
}

type Listener = Box<dyn FnMut(&ContactEvent, &mut Commands)>;

/// Gathers contact events and hands them to listeners as they happen.
///
/// Listeners can't touch the world directly while it's being simulated,
/// so they get a [`Commands`] buffer to queue changes into instead.
/// Events are also stored until drained,
/// for users who'd rather poll than register callbacks.
#[derive(Default)]
pub struct EventSink {
    events: Vec<ContactEvent>,
    listeners: Vec<Listener>,
    commands: Commands,
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("events", &self.events)
            .field("listeners", &self.listeners.len())
            .field("commands", &self.commands)
            .finish()
    }
}

impl EventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(&mut self, listener: impl FnMut(&ContactEvent, &mut Commands) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    pub fn push(&mut self, evt: ContactEvent) {
        for listener in &mut self.listeners {
            listener(&evt, &mut self.commands);
        }
        self.events.push(evt);
    }

    /// Take all events gathered since the last drain.
    pub fn drain(&mut self) -> std::vec::Drain<'_, ContactEvent> {
        self.events.drain(..)
    }

    /// Commands queued by listeners so far.
    #[inline]
    pub fn commands_mut(&mut self) -> &mut Commands {
        &mut self.commands
    }

    pub(crate) fn take_commands(&mut self) -> Commands {
        std::mem::take(&mut self.commands)
    }
}

/// Remembers which pairs touched during this tick and the previous one,
/// which is what decides between begin, continue and end events.
#[derive(Debug, Default)]
pub(crate) struct ContactTracker {
    last_tick: HashMap<PairKey, [BodyKey; 2]>,
    this_tick: HashMap<PairKey, [BodyKey; 2]>,
}

impl ContactTracker {
    /// Record a contact. Returns the kind of event to emit,
    /// or `None` if the pair was already seen this tick.
    pub fn touch(&mut self, pair: PairKey, bodies: [BodyKey; 2]) -> Option<ContactEventKind> {
        if self.this_tick.contains_key(&pair) {
            return None;
        }
        self.this_tick.insert(pair, bodies);
        Some(if self.last_tick.contains_key(&pair) {
            ContactEventKind::Continue
        } else {
            ContactEventKind::Begin
        })
    }

    /// End the tick, emitting an end event for every pair that stopped touching.
    pub fn finish(&mut self, sink: &mut EventSink) {
        let mut ended: Vec<(PairKey, [BodyKey; 2])> = self
            .last_tick
            .iter()
            .filter(|(pair, _)| !self.this_tick.contains_key(pair))
            .map(|(pair, bodies)| (*pair, *bodies))
            .collect();
        ended.sort_unstable_by_key(|(pair, _)| *pair);
        for (pair, bodies) in ended {
            sink.push(ContactEvent {
                kind: ContactEventKind::End,
                bodies,
                pair,
            });
        }
        self.last_tick = std::mem::take(&mut self.this_tick);
    }

    /// Forget every pair involving a body, emitting end events for them.
    pub fn forget_body(&mut self, body: BodyKey, sink: &mut EventSink) {
        let mut ended: Vec<(PairKey, [BodyKey; 2])> = Vec::new();
        for map in [&mut self.last_tick, &mut self.this_tick] {
            map.retain(|pair, bodies| {
                if bodies.contains(&body) {
                    if !ended.iter().any(|(p, _)| p == pair) {
                        ended.push((*pair, *bodies));
                    }
                    false
                } else {
                    true
                }
            });
        }
        ended.sort_unstable_by_key(|(pair, _)| *pair);
        for (pair, bodies) in ended {
            sink.push(ContactEvent {
                kind: ContactEventKind::End,
                bodies,
                pair,
            });
        }
    }

    /// Pairs touching as of the latest finished tick.
    pub fn touching(&self) -> impl Iterator<Item = (PairKey, [BodyKey; 2])> + '_ {
        self.last_tick.iter().map(|(pair, bodies)| (*pair, *bodies))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{
        collision::SpatialHashParams, Body, BodyId, BodyOptions, BodySet,
    };
    use std::{cell::RefCell, rc::Rc};

    fn three_keys() -> [BodyKey; 3] {
        let mut set = BodySet::new(SpatialHashParams::default());
        let mut add = |x| set.insert(Body::circle(x, 0.0, 0.5, BodyOptions::default()).unwrap());
        [add(0.0), add(1.0), add(2.0)]
    }

    #[test]
    fn contact_lifecycle() {
        let [a, b, _] = three_keys();
        let pair = PairKey::new(BodyId(1), BodyId(2));
        let mut tracker = ContactTracker::default();
        let mut sink = EventSink::new();

        assert_eq!(tracker.touch(pair, [a, b]), Some(ContactEventKind::Begin));
        // once per tick
        assert_eq!(tracker.touch(pair, [a, b]), None);
        tracker.finish(&mut sink);
        assert_eq!(sink.drain().count(), 0);

        assert_eq!(tracker.touch(pair, [a, b]), Some(ContactEventKind::Continue));
        tracker.finish(&mut sink);
        assert_eq!(tracker.touching().count(), 1);

        tracker.finish(&mut sink);
        let events: Vec<ContactEvent> = sink.drain().collect();
        assert_eq!(
            events,
            vec![ContactEvent {
                kind: ContactEventKind::End,
                bodies: [a, b],
                pair,
            }]
        );
        assert_eq!(tracker.touching().count(), 0);
    }

    #[test]
    fn forgetting_a_body_ends_its_contacts() {
        let [a, b, c] = three_keys();
        let ab = PairKey::new(BodyId(1), BodyId(2));
        let bc = PairKey::new(BodyId(2), BodyId(3));
        let mut tracker = ContactTracker::default();
        let mut sink = EventSink::new();
        tracker.touch(ab, [a, b]);
        tracker.finish(&mut sink);
        tracker.touch(ab, [a, b]);
        tracker.touch(bc, [b, c]);

        tracker.forget_body(a, &mut sink);
        let events: Vec<ContactEvent> = sink.drain().collect();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].pair, ab);
        assert_eq!(events[0].other(a), Some(b));
        assert_eq!(events[0].other(c), None);

        // no second end event once the tick finishes
        tracker.finish(&mut sink);
        assert_eq!(sink.drain().count(), 0);
    }

    #[test]
    fn listeners_queue_commands() {
        let [a, b, _] = three_keys();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let mut sink = EventSink::new();
        {
            let seen = Rc::clone(&seen);
            sink.add_listener(move |evt, cmds| {
                seen.borrow_mut().push(evt.kind);
                cmds.remove_body(evt.bodies[1]);
            });
        }
        let evt = ContactEvent {
            kind: ContactEventKind::Begin,
            bodies: [a, b],
            pair: PairKey::new(BodyId(1), BodyId(2)),
        };
        sink.push(evt);
        sink.push(ContactEvent {
            kind: ContactEventKind::End,
            ..evt
        });

        assert_eq!(*seen.borrow(), vec![ContactEventKind::Begin, ContactEventKind::End]);
        let cmds = sink.take_commands();
        assert_eq!(cmds.removed_bodies, vec![b]);
        assert!(sink.commands_mut().is_empty());
        assert_eq!(sink.drain().count(), 2);
    }
}
