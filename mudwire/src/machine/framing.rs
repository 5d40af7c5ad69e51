//! The global entry topology of the state machine: IAC recognition, the
//! doubled-IAC literal, command dispatch, line buffering, and the CR/LF
//! deframing discipline.
//!
//! Option handlers hang their subgraphs off [`State::Willing`],
//! [`State::Refusing`], [`State::Doing`], [`State::Donting`] and
//! [`State::SubNegotiation`]; everything registered here is option-agnostic.

use crate::engine::actions;
use crate::machine::{State, Table, Trigger};

pub(crate) fn register(table: &mut Table) {
    // At rest: data buffers, CR is swallowed, LF flushes, IAC escapes into
    // command dispatch.
    table
        .permit(State::Accepting, Trigger::Any, State::ReadingCharacters)
        .on_entry(actions::append_user_byte);
    table
        .permit(State::Accepting, Trigger::NewLine, State::Act)
        .on_entry(actions::flush_line);
    table.permit_reentry(State::Accepting, Trigger::CarriageReturn);
    table.permit(State::Accepting, Trigger::Iac, State::StartNegotiation);

    table
        .permit_reentry(State::ReadingCharacters, Trigger::Any)
        .on_entry(actions::append_user_byte);
    table
        .permit(State::ReadingCharacters, Trigger::NewLine, State::Act)
        .on_entry(actions::flush_line);
    table.permit_reentry(State::ReadingCharacters, Trigger::CarriageReturn);
    table.permit(State::ReadingCharacters, Trigger::Iac, State::StartNegotiation);

    table.auto_advance(State::Act, State::Accepting);

    // IAC IAC is a literal 0xFF data byte.
    table
        .permit(State::StartNegotiation, Trigger::Iac, State::ReadingCharacters)
        .on_entry(actions::append_user_byte);

    table.permit(State::StartNegotiation, Trigger::Will, State::Willing);
    table.permit(State::StartNegotiation, Trigger::Wont, State::Refusing);
    table.permit(State::StartNegotiation, Trigger::Do, State::Doing);
    table.permit(State::StartNegotiation, Trigger::Dont, State::Donting);
    table.permit(State::StartNegotiation, Trigger::Sb, State::SubNegotiation);

    table.permit(State::StartNegotiation, Trigger::Nop, State::DoNothing);
    table
        .permit(State::StartNegotiation, Trigger::Ga, State::DoNothing)
        .on_entry(actions::prompt_received);
    table
        .permit(State::StartNegotiation, Trigger::Eor, State::DoNothing)
        .on_entry(actions::prompt_received);
    table.auto_advance(State::DoNothing, State::Accepting);

    // The held-completion path: a handler that parked the machine in
    // EndSubNegotiation (NAWS after its fourth payload byte) completes when
    // the closing SE arrives.
    table
        .permit(State::EndSubNegotiation, Trigger::Se, State::Accepting)
        .on_entry(actions::complete_subnegotiation);
}
