//! The sans-I/O negotiation engine.
//!
//! [`Engine`] consumes one inbound octet at a time, walks the transition
//! table, and queues [`Event`]s: outbound negotiation buffers, completed
//! lines, and decoded option payloads. It performs no I/O itself — the
//! [`crate::driver`] module wraps it in a tokio task, and tests drive it
//! synchronously.

pub(crate) mod actions;
mod builder;
mod event;

use std::collections::VecDeque;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use encoding_rs::Encoding;
use serde::Serialize;
use tokio_util::bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, warn};

pub use builder::{Builder, CharsetOrder};
pub use event::{Event, FlowControlAction};

use crate::error::{ErrorKind, GmcpError};
use crate::machine::{State, Table, Target, Trigger};
use crate::msdp::{self, MsdpValue, ServerModel};
use crate::negotiation::{self, Edge, Side};
use crate::options::HandlerSet;
use crate::telnet::{self, subneg, Negotiation, TelnetOption};
use crate::Result;

/// Which role this end of the connection plays.
///
/// Servers advertise their supported options unsolicited at startup; clients
/// only answer peer offers (apart from replies such as the terminal-type
/// cycle, which a queried client drives).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Client,
}

/// Per-connection engine state. One per connection; single-consumer.
pub struct Engine {
    role: Role,
    state: State,
    table: Arc<Table>,
    handlers: Arc<HandlerSet>,

    pub(crate) opts: negotiation::Table,
    pub(crate) config: builder::Config,
    pub(crate) msdp_model: Option<ServerModel>,
    pub(crate) encoding: &'static Encoding,

    buffer: BytesMut,
    discarded: usize,

    pub(crate) subneg: SubnegBuffer,
    pub(crate) naws_dims: (u16, u16),
    pub(crate) ttype: TtypeState,
    pub(crate) charset_requested: bool,
    pub(crate) compression_started: bool,

    events: VecDeque<Event>,
    started: bool,
    frame_errors: u64,
}

/// The shared subnegotiation collect buffer. Capacity depends on the option
/// being negotiated; overflow truncates silently and is reported once at
/// completion.
pub(crate) struct SubnegBuffer {
    pub(crate) buf: BytesMut,
    pub(crate) cap: usize,
    pub(crate) truncated: usize,
    pub(crate) option: Option<TelnetOption>,
}

#[derive(Default)]
pub(crate) struct TtypeState {
    /// Terminal types collected from the peer, in receipt order.
    pub(crate) seen: Vec<String>,
    /// The request cycle closed on a repeated type.
    pub(crate) complete: bool,
    /// Client-side cursor into the configured terminal type list.
    pub(crate) cycle: usize,
}

impl Engine {
    /// Start building an engine for the given role.
    #[must_use]
    pub fn builder(role: Role) -> Builder {
        Builder::new(role)
    }

    pub(crate) fn new(
        role: Role,
        table: Table,
        handlers: HandlerSet,
        opts: negotiation::Table,
        config: builder::Config,
        msdp_model: Option<ServerModel>,
    ) -> Self {
        Self {
            role,
            state: State::Accepting,
            table: Arc::new(table),
            handlers: Arc::new(handlers),
            opts,
            buffer: BytesMut::with_capacity(1024),
            discarded: 0,
            subneg: SubnegBuffer {
                buf: BytesMut::with_capacity(1024),
                cap: 1024,
                truncated: 0,
                option: None,
            },
            naws_dims: (DEFAULT_NAWS_WIDTH, DEFAULT_NAWS_HEIGHT),
            ttype: TtypeState::default(),
            charset_requested: false,
            compression_started: false,
            encoding: encoding_rs::UTF_8,
            config,
            msdp_model,
            events: VecDeque::new(),
            started: false,
            frame_errors: 0,
        }
    }

    /// Emit the role's unsolicited initial offers. Idempotent; the driver
    /// calls this once before consuming bytes.
    pub fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;

        if self.role == Role::Server {
            let handlers = Arc::clone(&self.handlers);
            for handler in handlers.iter() {
                let Some(side) = handler.offer(self.role) else {
                    continue;
                };
                if let Some(offer) = self.opts.request_enable(handler.option(), side) {
                    debug!(option = %handler.option(), ?side, "offering");
                    self.send_negotiation(offer);
                }
            }
        }
        Ok(())
    }

    /// Feed one inbound octet through the state machine.
    ///
    /// All entry actions for the resulting transition run to completion
    /// before this returns; queued [`Event`]s are observable afterwards.
    pub fn receive(&mut self, byte: u8) -> Result<()> {
        self.fire(Trigger::classify(byte), byte)
    }

    /// Feed a buffer of inbound octets in order.
    pub fn receive_all(&mut self, bytes: &[u8]) -> Result<()> {
        for byte in bytes {
            self.receive(*byte)?;
        }
        Ok(())
    }

    /// Pop the oldest queued event.
    pub fn pop_event(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Drain all queued events, oldest first.
    pub fn drain_events(&mut self) -> Vec<Event> {
        self.events.drain(..).collect()
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    /// The machine's current position. [`State::Accepting`] between frames.
    #[must_use]
    pub fn state(&self) -> State {
        self.state
    }

    /// The encoding user data and option payloads decode with. Starts as
    /// UTF-8 and follows charset negotiation.
    #[must_use]
    pub fn current_encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// The peer's window size as `(width, height)`. Defaults to 78x24 until
    /// NAWS reports otherwise.
    #[must_use]
    pub fn naws(&self) -> (u16, u16) {
        self.naws_dims
    }

    /// Terminal types collected from the peer so far.
    #[must_use]
    pub fn terminal_types(&self) -> &[String] {
        &self.ttype.seen
    }

    /// Whether an option is currently enabled for the given side.
    #[must_use]
    pub fn option_enabled(&self, opt: TelnetOption, side: Side) -> bool {
        self.opts.enabled(opt, side)
    }

    /// Count of framing violations recovered from via the safety net.
    #[must_use]
    pub fn frame_errors(&self) -> u64 {
        self.frame_errors
    }

    /// The server-side MSDP catalogue, when configured.
    #[must_use]
    pub fn msdp_model(&self) -> Option<&ServerModel> {
        self.msdp_model.as_ref()
    }

    // ---- outbound helpers -------------------------------------------------

    /// Queue a line of user data for the transport: IAC-escaped, CRLF
    /// terminated, delivered as one atomic write.
    pub fn send_line(&mut self, line: &[u8]) {
        let mut out = BytesMut::with_capacity(line.len() + 2);
        out.put_slice(&telnet::telnet_safe(line));
        out.put_slice(b"\r\n");
        self.push_event(Event::Negotiate(out.freeze()));
    }

    /// Queue a complete subnegotiation message. The payload is IAC-escaped
    /// here; pass it unescaped.
    pub fn send_subnegotiation(&mut self, opt: TelnetOption, payload: &[u8]) {
        let escaped = telnet::telnet_safe(payload);
        self.push_event(Event::Negotiate(telnet::subnegotiation(
            opt.byte(),
            &escaped,
        )));
    }

    /// Queue a GMCP message: `IAC SB GMCP <package> SP <json> IAC SE`.
    pub fn send_gmcp(&mut self, package: &str, data: &impl Serialize) -> Result<()> {
        let json = serde_json::to_string(data)
            .map_err(|_| ErrorKind::Gmcp(GmcpError::InvalidJson))?;
        self.send_subnegotiation(TelnetOption::Gmcp, format!("{package} {json}").as_bytes());
        Ok(())
    }

    /// Queue one MSDP variable. Uses the MSDP option when negotiated,
    /// falling back to a GMCP "MSDP" message when only GMCP is up.
    pub fn send_msdp(&mut self, name: &str, value: &MsdpValue) -> Result<()> {
        let msdp_up = self.opts.enabled(TelnetOption::Msdp, Side::Local)
            || self.opts.enabled(TelnetOption::Msdp, Side::Remote);
        if !msdp_up
            && (self.opts.enabled(TelnetOption::Gmcp, Side::Local)
                || self.opts.enabled(TelnetOption::Gmcp, Side::Remote))
        {
            let body = serde_json::Value::Object(
                [(name.to_string(), value.to_json())].into_iter().collect(),
            );
            return self.send_gmcp("MSDP", &body);
        }
        let wire = msdp::encode(name, value);
        self.send_subnegotiation(TelnetOption::Msdp, &wire);
        Ok(())
    }

    /// Update a variable in the server MSDP model, pushing the new value to
    /// the peer when the variable is being reported.
    pub fn msdp_update(
        &mut self,
        name: impl Into<String>,
        value: impl Into<MsdpValue>,
    ) -> Result<()> {
        let Some(model) = self.msdp_model.as_mut() else {
            return Ok(());
        };
        if let Some((name, value)) = model.set(name, value) {
            self.send_msdp(&name, &value)?;
        }
        Ok(())
    }

    /// Queue a prompt boundary: `IAC EOR` when the peer agreed to EOR,
    /// `IAC GA` unless go-aheads are suppressed, otherwise nothing.
    pub fn send_prompt(&mut self) {
        if self.opts.enabled(TelnetOption::EndOfRecord, Side::Local) {
            self.push_event(Event::Negotiate(Bytes::from_static(&[
                telnet::command::IAC,
                telnet::command::EOR,
            ])));
        } else if !self.opts.enabled(TelnetOption::SuppressGoAhead, Side::Local) {
            self.push_event(Event::Negotiate(Bytes::from_static(&[
                telnet::command::IAC,
                telnet::command::GA,
            ])));
        }
    }

    /// Open a charset negotiation: `REQUEST ;<offer-list>`. No-op when a
    /// request is already in flight.
    pub fn request_charset(&mut self) {
        if self.charset_requested {
            return;
        }
        self.charset_requested = true;
        let mut payload = vec![subneg::CHARSET_REQUEST];
        for name in &self.config.charset_offer {
            payload.push(b';');
            payload.extend_from_slice(name.as_bytes());
        }
        self.send_subnegotiation(TelnetOption::Charset, &payload);
    }

    /// Begin server-to-client MCCP2 compression: sends the marker
    /// subnegotiation and flags the outbound splice. Idempotent; requires
    /// the peer to have accepted MCCP2.
    pub fn start_compression(&mut self) {
        if self.compression_started
            || !self.opts.enabled(TelnetOption::Mccp2, Side::Local)
        {
            return;
        }
        self.compression_started = true;
        self.send_subnegotiation(TelnetOption::Mccp2, &[]);
        self.push_event(Event::Compression {
            direction: crate::compress::Direction::Outbound,
            active: true,
        });
    }

    // ---- internals --------------------------------------------------------

    fn fire(&mut self, trigger: Trigger, byte: u8) -> Result<()> {
        let table = Arc::clone(&self.table);
        let Some(transition) = table.resolve(self.state, trigger) else {
            self.unhandled(trigger, byte);
            return Ok(());
        };

        self.state = match &transition.target {
            Target::Fixed(state) => *state,
            Target::Reentry => self.state,
            Target::Dynamic(guard) => guard(self, byte),
        };
        for action in &transition.actions {
            action(self, byte)?;
        }
        // Transient states advance without consuming a byte.
        while let Some(next) = table.follow(self.state) {
            self.state = next;
        }
        Ok(())
    }

    /// The unhandled-trigger hook: log, fire the synthetic `Error` trigger,
    /// land back in `Accepting`. The violating byte is discarded and the
    /// connection survives.
    fn unhandled(&mut self, trigger: Trigger, byte: u8) {
        self.frame_errors += 1;
        warn!(
            state = %self.state,
            ?trigger,
            byte = format_args!("{byte:#04x}"),
            "unhandled trigger; recovering to Accepting",
        );
        self.state = State::Accepting;
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push_back(event);
    }

    pub(crate) fn send_negotiation(&mut self, negotiation: Negotiation) {
        self.push_event(Event::Negotiate(negotiation.encode()));
    }

    pub(crate) fn buffer_user_byte(&mut self, byte: u8) {
        if self.buffer.len() >= self.config.max_buffer_size {
            if self.discarded == 0 {
                warn!(
                    cap = self.config.max_buffer_size,
                    "user buffer full; discarding until next line flush",
                );
            }
            self.discarded += 1;
            return;
        }
        self.buffer.put_u8(byte);
        if self.config.per_byte {
            let encoding = self.encoding;
            self.push_event(Event::UserByte { byte, encoding });
        }
    }

    pub(crate) fn flush_user_buffer(&mut self) {
        if self.discarded > 0 {
            warn!(discarded = self.discarded, "line flushed after overflow");
            self.discarded = 0;
        }
        // Small lines are copied so the backing allocation is reused; larger
        // ones are split off wholesale.
        let bytes = if self.buffer.len() <= INLINE_COPY_MAX {
            let bytes = Bytes::copy_from_slice(&self.buffer);
            self.buffer.clear();
            bytes
        } else {
            self.buffer.split().freeze()
        };
        let encoding = self.encoding;
        self.push_event(Event::Line { bytes, encoding });
    }

    pub(crate) fn begin_subnegotiation(&mut self, opt: TelnetOption) {
        self.subneg.option = Some(opt);
        self.subneg.cap = subneg_capacity(opt);
        self.subneg.truncated = 0;
        self.subneg.buf.clear();
    }

    pub(crate) fn buffer_subneg_byte(&mut self, byte: u8) {
        if self.subneg.buf.len() >= self.subneg.cap {
            self.subneg.truncated += 1;
            return;
        }
        self.subneg.buf.put_u8(byte);
    }

    pub(crate) fn complete_subnegotiation(&mut self) -> Result<()> {
        let Some(opt) = self.subneg.option.take() else {
            warn!("subnegotiation completed without an option in flight");
            return Ok(());
        };
        if self.subneg.truncated > 0 {
            warn!(
                option = %opt,
                truncated = self.subneg.truncated,
                "subnegotiation body exceeded its buffer",
            );
            self.subneg.truncated = 0;
        }
        let body = self.subneg.buf.split().freeze();
        self.dispatch_message(opt, body)
    }

    pub(crate) fn apply_outcome(
        &mut self,
        opt: TelnetOption,
        outcome: negotiation::Outcome,
    ) -> Result<()> {
        if let Some(reply) = outcome.reply {
            debug!(option = %opt, ?reply, "negotiation reply");
            self.send_negotiation(reply);
        }
        match outcome.edge {
            Some(Edge::Enabled(side)) => self.dispatch_enabled(opt, side),
            Some(Edge::Disabled(side)) => self.dispatch_disabled(opt, side),
            None => Ok(()),
        }
    }

    fn dispatch_enabled(&mut self, opt: TelnetOption, side: Side) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        match handlers.get(opt) {
            Some(handler) => handler.on_enabled(self, side),
            None => Ok(()),
        }
    }

    fn dispatch_disabled(&mut self, opt: TelnetOption, side: Side) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        match handlers.get(opt) {
            Some(handler) => handler.on_disabled(self, side),
            None => Ok(()),
        }
    }

    fn dispatch_message(&mut self, opt: TelnetOption, body: Bytes) -> Result<()> {
        let handlers = Arc::clone(&self.handlers);
        match handlers.get(opt) {
            Some(handler) => handler.on_message(self, body),
            None => Ok(()),
        }
    }
}

impl Debug for Engine {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("role", &self.role)
            .field("state", &self.state)
            .field("encoding", &self.encoding.name())
            .field("buffered", &self.buffer.len())
            .field("pending_events", &self.events.len())
            .field("frame_errors", &self.frame_errors)
            .finish_non_exhaustive()
    }
}

/// Per-option subnegotiation buffer bounds.
fn subneg_capacity(opt: TelnetOption) -> usize {
    match opt {
        TelnetOption::Msdp | TelnetOption::Gmcp | TelnetOption::Mssp => 8 * 1024,
        TelnetOption::Naws => 4,
        _ => 1024,
    }
}

/// Lines at or below this size are copied out of the buffer instead of
/// splitting the allocation.
const INLINE_COPY_MAX: usize = 512;

const DEFAULT_NAWS_WIDTH: u16 = 78;
const DEFAULT_NAWS_HEIGHT: u16 = 24;

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn outbound(engine: &mut Engine) -> Vec<Vec<u8>> {
        engine
            .drain_events()
            .into_iter()
            .filter_map(|event| match event {
                Event::Negotiate(bytes) => Some(bytes.to_vec()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn send_line_escapes_and_terminates() {
        let mut engine = Engine::builder(Role::Server).build().unwrap();
        engine.send_line(&[b'h', 0xFF, b'i']);
        assert_eq!(outbound(&mut engine), vec![vec![b'h', 0xFF, 0xFF, b'i', b'\r', b'\n']]);
    }

    #[test]
    fn prompt_prefers_eor_over_ga() {
        let mut engine = Engine::builder(Role::Server)
            .options([TelnetOption::EndOfRecord, TelnetOption::SuppressGoAhead])
            .build()
            .unwrap();

        // Nothing agreed yet: plain GA.
        engine.send_prompt();
        assert_eq!(outbound(&mut engine), vec![vec![255, 249]]);

        // EOR agreed: IAC EOR.
        engine.start().unwrap();
        engine.receive_all(&[255, 253, 25]).unwrap();
        let _ = engine.drain_events();
        engine.send_prompt();
        assert_eq!(outbound(&mut engine), vec![vec![255, 239]]);
    }

    #[test]
    fn prompt_suppressed_by_sga() {
        let mut engine = Engine::builder(Role::Server)
            .options([TelnetOption::SuppressGoAhead])
            .build()
            .unwrap();
        engine.start().unwrap();
        // Peer agrees to suppress go-aheads; no EOR: silence.
        engine.receive_all(&[255, 253, 3]).unwrap();
        let _ = engine.drain_events();
        engine.send_prompt();
        assert!(outbound(&mut engine).is_empty());
    }

    #[test]
    fn builder_rejects_zero_sizes() {
        assert!(Engine::builder(Role::Server).max_buffer_size(0).build().is_err());
        assert!(Engine::builder(Role::Server).ingress_capacity(0).build().is_err());
        assert!(Engine::builder(Role::Server)
            .charset_offer(["NOT-A-CHARSET-LABEL"])
            .build()
            .is_err());
    }

    #[test]
    fn start_is_idempotent() {
        let mut engine = Engine::builder(Role::Server)
            .option(TelnetOption::Gmcp)
            .build()
            .unwrap();
        engine.start().unwrap();
        assert_eq!(outbound(&mut engine), vec![vec![255, 251, 201]]);
        engine.start().unwrap();
        assert!(outbound(&mut engine).is_empty());
    }

    #[test]
    fn client_role_offers_nothing() {
        let mut engine = Engine::builder(Role::Client)
            .options([TelnetOption::TerminalType, TelnetOption::Gmcp])
            .build()
            .unwrap();
        engine.start().unwrap();
        assert!(outbound(&mut engine).is_empty());
    }

    #[test]
    fn user_buffer_cap_discards_overflow() {
        let mut engine = Engine::builder(Role::Server)
            .max_buffer_size(4)
            .build()
            .unwrap();
        engine.receive_all(b"overflowing\n").unwrap();
        let events = engine.drain_events();
        let Some(Event::Line { bytes, .. }) = events.first() else {
            panic!("expected a line event");
        };
        assert_eq!(bytes.as_ref(), b"over");
    }
}
