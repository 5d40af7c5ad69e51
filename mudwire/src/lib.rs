//! A Telnet negotiation engine for MUD servers and clients.
//!
//! mudwire implements RFC 854 option negotiation plus the MUD-community
//! extensions (GMCP, MSDP, MSSP, MCCP2/3, MTTS, CHARSET, and the classic
//! terminal options) as a deterministic byte-driven state machine that
//! guarantees forward progress on any input, malformed or adversarial.
//!
//! Two layers:
//!
//! - [`Engine`] is the sans-I/O core: feed it bytes with
//!   [`Engine::receive`], drain [`Event`]s (outbound buffers, completed
//!   lines, decoded option payloads). No sockets, no tasks.
//! - [`Driver`] wraps an engine in a tokio task with a bounded,
//!   back-pressured ingress queue, transparent MCCP (de)compression, and an
//!   async [`TelnetHandler`] callback surface.
//!
//! ```no_run
//! use mudwire::{Driver, Engine, Role, TelnetOption};
//! # fn handler() -> Box<dyn mudwire::TelnetHandler> { unimplemented!() }
//!
//! # fn main() -> mudwire::Result<()> {
//! let engine = Engine::builder(Role::Server)
//!     .options([
//!         TelnetOption::TerminalType,
//!         TelnetOption::Naws,
//!         TelnetOption::Gmcp,
//!     ])
//!     .build()?;
//! let (handle, _task) = Driver::spawn(engine, handler());
//! # Ok(())
//! # }
//! ```

pub mod compress;
pub mod driver;
pub mod engine;
pub mod error;
pub mod machine;
pub mod msdp;
pub mod mssp;
pub mod telnet;

mod handler;
mod negotiation;
mod options;

pub use compress::Direction;
pub use driver::{Action, Driver, Handle};
pub use engine::{Builder, CharsetOrder, Engine, Event, FlowControlAction, Role};
pub use error::Error;
pub use handler::TelnetHandler;
pub use msdp::{MsdpValue, ServerModel};
pub use mssp::{MsspConfig, MsspList};
pub use negotiation::Side;
pub use telnet::{telnet_safe, TelnetOption};

pub static CRATE_NAME: &str = env!("CARGO_CRATE_NAME");

pub type Result<T, E = error::Error> = core::result::Result<T, E>;
