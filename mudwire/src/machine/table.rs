use std::collections::HashMap;

use crate::engine::Engine;
use crate::machine::{State, Trigger};
use crate::Result;

/// An entry action. Receives the engine and the byte that fired the
/// transition; all mutable state it touches lives in the engine.
pub(crate) type Action = fn(&mut Engine, u8) -> Result<()>;

/// A dynamic-permit guard: picks the target state from the engine's current
/// state and the triggering byte.
pub(crate) type Guard = fn(&Engine, u8) -> State;

/// Where a transition lands.
pub(crate) enum Target {
    /// A fixed target state.
    Fixed(State),

    /// Re-enter the state that owned the trigger. When the trigger resolved
    /// through a parent state the machine stays in the child.
    Reentry,

    /// The guard decides at fire time.
    Dynamic(Guard),
}

/// One permitted `(state, trigger)` pair.
pub(crate) struct Transition {
    pub(crate) target: Target,
    pub(crate) actions: Vec<Action>,
}

impl Transition {
    /// Register an entry action. Actions run in registration order, to
    /// completion, before the next byte is processed.
    pub(crate) fn on_entry(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }
}

/// The complete transition table. Built once; the runtime only reads it.
#[derive(Default)]
pub(crate) struct Table {
    transitions: HashMap<(State, Trigger), Transition>,
    parents: HashMap<State, State>,
    follow: HashMap<State, State>,
}

impl Table {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Declare a transition to a fixed target.
    pub(crate) fn permit(
        &mut self,
        state: State,
        trigger: Trigger,
        target: State,
    ) -> &mut Transition {
        self.insert(state, trigger, Target::Fixed(target))
    }

    /// Declare a transition that re-enters the current state.
    pub(crate) fn permit_reentry(&mut self, state: State, trigger: Trigger) -> &mut Transition {
        self.insert(state, trigger, Target::Reentry)
    }

    /// Declare a transition whose target a guard picks at fire time.
    pub(crate) fn permit_dynamic(
        &mut self,
        state: State,
        trigger: Trigger,
        guard: Guard,
    ) -> &mut Transition {
        self.insert(state, trigger, Target::Dynamic(guard))
    }

    /// Make `child` inherit any trigger it does not handle from `parent`.
    pub(crate) fn substate_of(&mut self, child: State, parent: State) {
        self.parents.insert(child, parent);
    }

    /// Mark `state` transient: after its entry actions run the machine moves
    /// straight to `next` without consuming a byte.
    pub(crate) fn auto_advance(&mut self, state: State, next: State) {
        self.follow.insert(state, next);
    }

    /// Whether an exact `(state, trigger)` entry exists. Used by the safety
    /// net to avoid shadowing handler registrations.
    pub(crate) fn claimed(&self, state: State, trigger: Trigger) -> bool {
        self.transitions.contains_key(&(state, trigger))
    }

    /// Find the transition for `(state, trigger)`: the exact entry, a parent
    /// state's entry, or the same chain for the catch-all trigger. `None`
    /// means the unhandled-trigger hook must fire.
    pub(crate) fn resolve(&self, state: State, trigger: Trigger) -> Option<&Transition> {
        self.lookup(state, trigger).or_else(|| match trigger {
            Trigger::Any | Trigger::Error => None,
            _ => self.lookup(state, Trigger::Any),
        })
    }

    /// The transient follow state, if `state` auto-advances.
    pub(crate) fn follow(&self, state: State) -> Option<State> {
        self.follow.get(&state).copied()
    }

    fn insert(&mut self, state: State, trigger: Trigger, target: Target) -> &mut Transition {
        use std::collections::hash_map::Entry;

        let transition = Transition {
            target,
            actions: Vec::new(),
        };
        match self.transitions.entry((state, trigger)) {
            Entry::Occupied(mut occupied) => {
                occupied.insert(transition);
                occupied.into_mut()
            }
            Entry::Vacant(vacant) => vacant.insert(transition),
        }
    }

    fn lookup(&self, mut state: State, trigger: Trigger) -> Option<&Transition> {
        loop {
            if let Some(transition) = self.transitions.get(&(state, trigger)) {
                return Some(transition);
            }
            state = *self.parents.get(&state)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telnet::TelnetOption;

    #[test]
    fn exact_beats_catch_all() {
        let mut table = Table::new();
        table.permit(State::Accepting, Trigger::Any, State::ReadingCharacters);
        table.permit(State::Accepting, Trigger::Iac, State::StartNegotiation);

        let hit = table.resolve(State::Accepting, Trigger::Iac).unwrap();
        assert!(matches!(hit.target, Target::Fixed(State::StartNegotiation)));
    }

    #[test]
    fn option_trigger_falls_back_to_catch_all() {
        let mut table = Table::new();
        table.permit_reentry(State::ReadingCharacters, Trigger::Any);

        let trigger = Trigger::Option(TelnetOption::Echo);
        let hit = table.resolve(State::ReadingCharacters, trigger).unwrap();
        assert!(matches!(hit.target, Target::Reentry));
    }

    #[test]
    fn child_falls_through_to_parent() {
        let opt = TelnetOption::Charset;
        let mut table = Table::new();
        table.permit(State::Negotiating(opt), Trigger::Iac, State::Escaping(opt));
        table.substate_of(State::Evaluating(opt), State::Negotiating(opt));

        let hit = table.resolve(State::Evaluating(opt), Trigger::Iac).unwrap();
        assert!(matches!(hit.target, Target::Fixed(State::Escaping(_))));
    }

    #[test]
    fn unregistered_pair_resolves_to_none() {
        let table = Table::new();
        assert!(table.resolve(State::Accepting, Trigger::Se).is_none());
    }
}
