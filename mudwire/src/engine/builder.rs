use std::collections::BTreeSet;

use encoding_rs::Encoding;
use tracing::debug;

use crate::engine::{Engine, Role};
use crate::error::{BuilderError, ErrorKind};
use crate::machine::{framing, Table};
use crate::msdp::ServerModel;
use crate::mssp::MsspConfig;
use crate::negotiation::{self, Side};
use crate::options::{self, HandlerSet};
use crate::telnet::TelnetOption;
use crate::Result;

/// How the charset responder ranks the names that survive filtering.
#[derive(Debug, Clone, Default)]
pub enum CharsetOrder {
    /// Plain lexicographic order.
    #[default]
    Alphabetical,

    /// Names on the preference list come first, in list order; everything
    /// else follows alphabetically.
    Preference(Vec<String>),
}

impl CharsetOrder {
    pub(crate) fn rank(&self, names: &mut [String]) {
        match self {
            CharsetOrder::Alphabetical => names.sort_unstable(),
            CharsetOrder::Preference(preferred) => {
                names.sort_by(|a, b| {
                    let pos = |name: &str| {
                        preferred
                            .iter()
                            .position(|p| p.eq_ignore_ascii_case(name))
                            .unwrap_or(usize::MAX)
                    };
                    pos(a).cmp(&pos(b)).then_with(|| a.cmp(b))
                });
            }
        }
    }
}

/// Runtime configuration carried by the engine.
#[derive(Debug, Clone)]
pub(crate) struct Config {
    pub(crate) max_buffer_size: usize,
    pub(crate) ingress_capacity: usize,
    pub(crate) per_byte: bool,
    pub(crate) charset_offer: Vec<String>,
    pub(crate) charset_order: CharsetOrder,
    pub(crate) allowed_encodings: Option<Vec<String>>,
    pub(crate) terminal_types: Vec<String>,
    pub(crate) naws_dimensions: Option<(u16, u16)>,
    pub(crate) x_display: Option<String>,
    pub(crate) terminal_speed: (String, String),
    pub(crate) environ: Vec<(String, String)>,
    pub(crate) mssp: Option<MsspConfig>,
}

/// Fluent construction of an [`Engine`].
///
/// ```
/// use mudwire::{Engine, Role, TelnetOption};
///
/// let engine = Engine::builder(Role::Server)
///     .options([TelnetOption::TerminalType, TelnetOption::Naws])
///     .build()
///     .unwrap();
/// assert_eq!(engine.role(), Role::Server);
/// ```
#[derive(Debug)]
pub struct Builder {
    role: Role,
    options: BTreeSet<TelnetOption>,
    max_buffer_size: usize,
    ingress_capacity: usize,
    per_byte: bool,
    charset_offer: Vec<String>,
    charset_order: CharsetOrder,
    allowed_encodings: Option<Vec<String>>,
    terminal_types: Vec<String>,
    naws_dimensions: Option<(u16, u16)>,
    x_display: Option<String>,
    terminal_speed: (String, String),
    environ: Vec<(String, String)>,
    mssp: Option<MsspConfig>,
    msdp_model: Option<ServerModel>,
}

impl Builder {
    pub(crate) fn new(role: Role) -> Self {
        Self {
            role,
            options: BTreeSet::new(),
            max_buffer_size: DEFAULT_MAX_BUFFER,
            ingress_capacity: DEFAULT_INGRESS_CAPACITY,
            per_byte: false,
            charset_offer: vec!["UTF-8".to_string()],
            charset_order: CharsetOrder::default(),
            allowed_encodings: None,
            terminal_types: Vec::new(),
            naws_dimensions: None,
            x_display: None,
            terminal_speed: ("38400".to_string(), "38400".to_string()),
            environ: Vec::new(),
            mssp: None,
            msdp_model: None,
        }
    }

    /// Enable one option. Options not enabled here are answered by the
    /// safety net.
    #[must_use]
    pub fn option(mut self, opt: TelnetOption) -> Self {
        self.options.insert(opt);
        self
    }

    /// Enable a set of options.
    #[must_use]
    pub fn options(mut self, opts: impl IntoIterator<Item = TelnetOption>) -> Self {
        self.options.extend(opts);
        self
    }

    /// Cap on buffered user data before a line flush. Default 5 MiB.
    #[must_use]
    pub fn max_buffer_size(mut self, bytes: usize) -> Self {
        self.max_buffer_size = bytes;
        self
    }

    /// Bounded ingress queue depth; producers block when it fills. Default
    /// 10 000.
    #[must_use]
    pub fn ingress_capacity(mut self, bytes: usize) -> Self {
        self.ingress_capacity = bytes;
        self
    }

    /// Report every buffered user byte as an event.
    #[must_use]
    pub fn per_byte(mut self, enabled: bool) -> Self {
        self.per_byte = enabled;
        self
    }

    /// The charset names offered when this engine initiates a REQUEST.
    #[must_use]
    pub fn charset_offer(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.charset_offer = names.into_iter().map(Into::into).collect();
        self
    }

    /// Ranking applied to an inbound charset REQUEST list.
    #[must_use]
    pub fn charset_order(mut self, order: CharsetOrder) -> Self {
        self.charset_order = order;
        self
    }

    /// Restrict acceptable charsets to this allow-list. Default: any label
    /// the encoding table resolves.
    #[must_use]
    pub fn allowed_encodings(
        mut self,
        names: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.allowed_encodings = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Client role: the terminal type list cycled through on each SEND.
    #[must_use]
    pub fn terminal_types(
        mut self,
        types: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.terminal_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Client role: window size reported once NAWS is agreed.
    #[must_use]
    pub fn naws_dimensions(mut self, width: u16, height: u16) -> Self {
        self.naws_dimensions = Some((width, height));
        self
    }

    /// Client role: the X display string reported on XDISPLOC SEND.
    #[must_use]
    pub fn x_display(mut self, display: impl Into<String>) -> Self {
        self.x_display = Some(display.into());
        self
    }

    /// Client role: the `(transmit, receive)` tuple reported on TSPEED SEND.
    #[must_use]
    pub fn terminal_speed(
        mut self,
        transmit: impl Into<String>,
        receive: impl Into<String>,
    ) -> Self {
        self.terminal_speed = (transmit.into(), receive.into());
        self
    }

    /// Client role: environment pairs reported on NEW-ENVIRON SEND.
    #[must_use]
    pub fn environ(
        mut self,
        vars: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Self {
        self.environ = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Server role: the MSSP payload published once MSSP is agreed.
    #[must_use]
    pub fn mssp_config(mut self, config: MsspConfig) -> Self {
        self.mssp = Some(config);
        self
    }

    /// Server role: the MSDP variable/list/command catalogue.
    #[must_use]
    pub fn msdp_model(mut self, model: ServerModel) -> Self {
        self.msdp_model = Some(model);
        self
    }

    /// Validate the configuration and assemble the engine: framing first,
    /// then each enabled option's subgraph, then the safety net over
    /// everything neither claimed.
    pub fn build(self) -> Result<Engine> {
        if self.max_buffer_size == 0 {
            return Err(ErrorKind::from(BuilderError::ZeroBufferSize).into());
        }
        if self.ingress_capacity == 0 {
            return Err(ErrorKind::from(BuilderError::ZeroIngressCapacity).into());
        }
        for name in &self.charset_offer {
            if Encoding::for_label(name.as_bytes()).is_none() {
                return Err(ErrorKind::from(BuilderError::UnknownCharset(name.clone())).into());
            }
        }

        let mut table = Table::new();
        framing::register(&mut table);

        let handlers = HandlerSet::build(&self.options);
        let mut opts = negotiation::Table::default();
        for handler in handlers.iter() {
            let (local, remote) = handler.sides(self.role);
            if local {
                opts.set_support(handler.option(), Side::Local);
            }
            if remote {
                opts.set_support(handler.option(), Side::Remote);
            }
            handler.configure(&mut table, self.role);
        }
        options::safety::install(&mut table);

        debug!(role = ?self.role, options = ?self.options, "engine built");

        let config = Config {
            max_buffer_size: self.max_buffer_size,
            ingress_capacity: self.ingress_capacity,
            per_byte: self.per_byte,
            charset_offer: self.charset_offer,
            charset_order: self.charset_order,
            allowed_encodings: self.allowed_encodings,
            terminal_types: self.terminal_types,
            naws_dimensions: self.naws_dimensions,
            x_display: self.x_display,
            terminal_speed: self.terminal_speed,
            environ: self.environ,
            mssp: self.mssp,
        };
        Ok(Engine::new(
            self.role,
            table,
            handlers,
            opts,
            config,
            self.msdp_model,
        ))
    }
}

const DEFAULT_MAX_BUFFER: usize = 5 * 1024 * 1024;
const DEFAULT_INGRESS_CAPACITY: usize = 10_000;
