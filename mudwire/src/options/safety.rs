//! The safety net: reject-gracefully transitions for everything no handler
//! claimed.
//!
//! Installed after every option handler has registered, so its catch-all
//! entries never shadow a claimed `(state, trigger)` pair. Together with the
//! engine's unhandled-trigger hook this closes the transition table: any
//! byte in any state either matches a registration here or recovers through
//! the synthetic `Error` trigger.

use crate::engine::actions;
use crate::machine::{State, Table, Trigger};

pub(crate) fn install(table: &mut Table) {
    // Unclaimed options in the four negotiation states. WILL and DO demand
    // the standard denial; WONT and DONT for something never enabled need no
    // answer, only consumption.
    if !table.claimed(State::Willing, Trigger::Any) {
        table
            .permit(State::Willing, Trigger::Any, State::BadWilling)
            .on_entry(actions::reject_will);
    }
    if !table.claimed(State::Refusing, Trigger::Any) {
        table.permit(State::Refusing, Trigger::Any, State::BadRefusing);
    }
    if !table.claimed(State::Doing, Trigger::Any) {
        table
            .permit(State::Doing, Trigger::Any, State::BadDo)
            .on_entry(actions::reject_do);
    }
    if !table.claimed(State::Donting, Trigger::Any) {
        table.permit(State::Donting, Trigger::Any, State::BadDont);
    }
    table.auto_advance(State::BadWilling, State::Accepting);
    table.auto_advance(State::BadRefusing, State::Accepting);
    table.auto_advance(State::BadDo, State::Accepting);
    table.auto_advance(State::BadDont, State::Accepting);

    // Unclaimed subnegotiations: swallow the whole body, honouring the
    // IAC IAC escape and the IAC SE terminator, without touching user data.
    table
        .permit(State::SubNegotiation, Trigger::Any, State::BadSubNegotiation)
        .on_entry(actions::bad_subnegotiation);
    table.permit_reentry(State::BadSubNegotiation, Trigger::Any);
    table.permit(
        State::BadSubNegotiation,
        Trigger::Iac,
        State::BadSubNegotiationEscaping,
    );
    table.permit(
        State::BadSubNegotiationEscaping,
        Trigger::Iac,
        State::BadSubNegotiation,
    );
    table.permit(State::BadSubNegotiationEscaping, Trigger::Se, State::Accepting);
    // A bare IAC followed by anything else inside a swallowed body is still
    // consumed; the body was already condemned.
    table.permit(
        State::BadSubNegotiationEscaping,
        Trigger::Any,
        State::BadSubNegotiation,
    );
}
