//! The table-driven grammar engine.
//!
//! A decoded PDU subtree is flattened into a stream of TLV events, and each
//! message or component shape is described by a static table of transitions
//! keyed on (state, event tag). Transitions carry a semantic action that
//! mutates the shared in-progress container; actions can push a sub-grammar
//! onto the engine stack (the shared LDAPResult component, the
//! self-recursive filter grammar). An event no table claims while the
//! current grammar sits in an accepting state pops back to the parent
//! grammar and is offered again; anywhere else it is a protocol error.

use berstream::common::TagClass;
use berstream::structure::{StructureTag, PL};

use crate::error::OpError;

pub(crate) type State = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum EvKind {
    /// A constructed TLV begins.
    Open,
    /// A primitive TLV, complete with its value.
    Prim,
    /// The innermost open constructed TLV ends.
    Close,
}

/// One flattened TLV event. `value` is empty except for `Prim`.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Event<'a> {
    pub kind: EvKind,
    pub class: TagClass,
    pub id: u64,
    pub value: &'a [u8],
}

/// Flatten a TLV tree into document-order events, iteratively: nesting
/// depth is attacker-controlled and must not consume call stack.
pub(crate) fn events_of(root: &StructureTag) -> Vec<Event<'_>> {
    enum Step<'a> {
        Visit(&'a StructureTag),
        Leave(&'a StructureTag),
    }
    let mut out = Vec::new();
    let mut work = vec![Step::Visit(root)];
    while let Some(step) = work.pop() {
        match step {
            Step::Visit(t) => match &t.payload {
                PL::P(value) => out.push(Event {
                    kind: EvKind::Prim,
                    class: t.class,
                    id: t.id,
                    value,
                }),
                PL::C(children) => {
                    out.push(Event {
                        kind: EvKind::Open,
                        class: t.class,
                        id: t.id,
                        value: &[],
                    });
                    work.push(Step::Leave(t));
                    for child in children.iter().rev() {
                        work.push(Step::Visit(child));
                    }
                }
            },
            Step::Leave(t) => out.push(Event {
                kind: EvKind::Close,
                class: t.class,
                id: t.id,
                value: &[],
            }),
        }
    }
    out
}

/// The tag pattern a transition fires on. `Close` patterns ignore class
/// and id: at most one close transition may leave a state.
#[derive(Clone, Copy, Debug)]
pub(crate) struct On {
    kind: EvKind,
    class: TagClass,
    id: u64,
}

impl On {
    pub(crate) const fn open(class: TagClass, id: u64) -> On {
        On {
            kind: EvKind::Open,
            class,
            id,
        }
    }

    pub(crate) const fn prim(class: TagClass, id: u64) -> On {
        On {
            kind: EvKind::Prim,
            class,
            id,
        }
    }

    pub(crate) const fn close() -> On {
        On {
            kind: EvKind::Close,
            class: TagClass::Universal,
            id: 0,
        }
    }

    fn matches(&self, ev: &Event) -> bool {
        self.kind == ev.kind
            && (self.kind == EvKind::Close || (self.class == ev.class && self.id == ev.id))
    }
}

/// What the engine does after running an action.
pub(crate) enum Follow<C: 'static> {
    /// Move to the transition's target state.
    Next,
    /// Override the target state (for actions whose outcome depends on
    /// container state, e.g. closing the last open filter frame).
    Goto(State),
    /// Move to the target state, then run the sub-grammar starting with
    /// the next event.
    Enter(&'static GrammarTable<C>),
    /// Move to the target state, then run the sub-grammar and offer it the
    /// current event (the sub-grammar owns the triggering TLV).
    Redispatch(&'static GrammarTable<C>),
}

pub(crate) type Action<C> = fn(&mut C, &Event) -> Result<Follow<C>, OpError>;

pub(crate) struct Transition<C: 'static> {
    pub from: State,
    pub on: On,
    pub to: State,
    pub action: Action<C>,
}

pub(crate) struct GrammarTable<C: 'static> {
    /// Used in protocol-error diagnostics.
    pub name: &'static str,
    pub start: State,
    pub transitions: &'static [Transition<C>],
    /// May the grammar end in this state? Consulted for sub-grammar
    /// pop-back and at end of input; may look at the container (the filter
    /// grammar accepts only once its frame stack has drained).
    pub accepting: fn(&C, State) -> bool,
}

/// No-op action for transitions that only move the state.
pub(crate) fn skip<C>(_c: &mut C, _ev: &Event) -> Result<Follow<C>, OpError> {
    Ok(Follow::Next)
}

pub(crate) struct Engine<C: 'static> {
    stack: Vec<(&'static GrammarTable<C>, State)>,
}

impl<C> Engine<C> {
    pub(crate) fn new(grammar: &'static GrammarTable<C>) -> Engine<C> {
        Engine {
            stack: vec![(grammar, grammar.start)],
        }
    }

    pub(crate) fn event(&mut self, ev: &Event, container: &mut C) -> Result<(), OpError> {
        loop {
            let (grammar, state) = *self.stack.last().expect("grammar frame");
            let hit = grammar
                .transitions
                .iter()
                .find(|t| t.from == state && t.on.matches(ev));
            match hit {
                Some(t) => {
                    let follow = (t.action)(container, ev)?;
                    let top = self.stack.last_mut().expect("grammar frame");
                    top.1 = t.to;
                    match follow {
                        Follow::Next => return Ok(()),
                        Follow::Goto(state) => {
                            top.1 = state;
                            return Ok(());
                        }
                        Follow::Enter(sub) => {
                            self.stack.push((sub, sub.start));
                            return Ok(());
                        }
                        Follow::Redispatch(sub) => {
                            self.stack.push((sub, sub.start));
                            continue;
                        }
                    }
                }
                None => {
                    if self.stack.len() > 1 && (grammar.accepting)(container, state) {
                        self.stack.pop();
                        continue;
                    }
                    return Err(OpError::Protocol(grammar.name));
                }
            }
        }
    }

    /// End of events: drain accepting sub-grammars and verify the outermost
    /// grammar accepts.
    pub(crate) fn finish(&mut self, container: &C) -> Result<(), OpError> {
        while self.stack.len() > 1 {
            let (grammar, state) = *self.stack.last().expect("grammar frame");
            if (grammar.accepting)(container, state) {
                self.stack.pop();
            } else {
                return Err(OpError::Protocol(grammar.name));
            }
        }
        let (grammar, state) = *self.stack.last().expect("grammar frame");
        if (grammar.accepting)(container, state) {
            Ok(())
        } else {
            Err(OpError::Protocol(grammar.name))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn events_cover_tree_in_document_order() {
        let tree = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![
                StructureTag {
                    class: TagClass::Universal,
                    id: 2,
                    payload: PL::P(vec![1]),
                },
                StructureTag {
                    class: TagClass::Application,
                    id: 0,
                    payload: PL::C(vec![StructureTag {
                        class: TagClass::Context,
                        id: 0,
                        payload: PL::P(vec![2]),
                    }]),
                },
            ]),
        };
        let evs = events_of(&tree);
        let kinds: Vec<EvKind> = evs.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EvKind::Open,
                EvKind::Prim,
                EvKind::Open,
                EvKind::Prim,
                EvKind::Close,
                EvKind::Close
            ]
        );
        assert_eq!(evs[1].value, &[1]);
        assert_eq!(evs[3].class, TagClass::Context);
    }

    #[test]
    fn deep_nesting_does_not_recurse() {
        let mut tree = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(vec![]),
        };
        for _ in 0..200_000 {
            tree = StructureTag {
                class: TagClass::Universal,
                id: 16,
                payload: PL::C(vec![tree]),
            };
        }
        let evs = events_of(&tree);
        assert_eq!(evs.len(), 2 * 200_000 + 1);
        // dropping the tree itself must not recurse either
        drop_iteratively(tree);
    }

    fn drop_iteratively(tree: StructureTag) {
        let mut work = vec![tree];
        while let Some(t) = work.pop() {
            if let PL::C(children) = t.payload {
                work.extend(children);
            }
        }
    }
}
