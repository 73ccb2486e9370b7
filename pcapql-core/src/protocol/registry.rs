//! Protocol registry and the parser trait.

use super::{
    ArpProtocol, DnsProtocol, EthernetProtocol, IcmpProtocol, Ipv4Protocol, Ipv6Protocol,
    ParseContext, ParseResult, TcpProtocol, UdpProtocol, VlanProtocol,
};

/// Core trait all protocol parsers implement.
pub trait Protocol: Send + Sync {
    /// Layer name used in field paths (e.g., "tcp", "ipv4").
    fn name(&self) -> &'static str;

    /// Human-readable display name.
    fn display_name(&self) -> &'static str {
        self.name()
    }

    /// Short names accepted in place of `name()` (e.g., "ip" for "ipv4").
    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Check if this parser can handle the given context.
    /// Returns a priority score (higher = more specific match).
    fn can_parse(&self, context: &ParseContext) -> Option<u32>;

    /// Parse bytes into structured fields.
    fn parse<'a>(&self, data: &'a [u8], context: &ParseContext) -> ParseResult<'a>;

    /// Field names this layer produces, without the layer prefix.
    fn fields(&self) -> &'static [&'static str];

    /// Application layers sit above the transport payload boundary.
    fn is_application(&self) -> bool {
        false
    }
}

/// Enum of all built-in protocol parsers, dispatched statically.
#[derive(Debug, Clone, Copy)]
pub enum BuiltinProtocol {
    Ethernet(EthernetProtocol),
    Vlan(VlanProtocol),
    Arp(ArpProtocol),
    Ipv4(Ipv4Protocol),
    Ipv6(Ipv6Protocol),
    Icmp(IcmpProtocol),
    Tcp(TcpProtocol),
    Udp(UdpProtocol),
    Dns(DnsProtocol),
}

macro_rules! delegate_protocol {
    ($self:expr, $method:ident $(, $arg:expr)*) => {
        match $self {
            BuiltinProtocol::Ethernet(p) => p.$method($($arg),*),
            BuiltinProtocol::Vlan(p) => p.$method($($arg),*),
            BuiltinProtocol::Arp(p) => p.$method($($arg),*),
            BuiltinProtocol::Ipv4(p) => p.$method($($arg),*),
            BuiltinProtocol::Ipv6(p) => p.$method($($arg),*),
            BuiltinProtocol::Icmp(p) => p.$method($($arg),*),
            BuiltinProtocol::Tcp(p) => p.$method($($arg),*),
            BuiltinProtocol::Udp(p) => p.$method($($arg),*),
            BuiltinProtocol::Dns(p) => p.$method($($arg),*),
        }
    };
}

impl Protocol for BuiltinProtocol {
    #[inline]
    fn name(&self) -> &'static str {
        delegate_protocol!(self, name)
    }

    #[inline]
    fn display_name(&self) -> &'static str {
        delegate_protocol!(self, display_name)
    }

    #[inline]
    fn aliases(&self) -> &'static [&'static str] {
        delegate_protocol!(self, aliases)
    }

    #[inline]
    fn can_parse(&self, context: &ParseContext) -> Option<u32> {
        delegate_protocol!(self, can_parse, context)
    }

    #[inline]
    fn parse<'a>(&self, data: &'a [u8], context: &ParseContext) -> ParseResult<'a> {
        delegate_protocol!(self, parse, data, context)
    }

    #[inline]
    fn fields(&self) -> &'static [&'static str] {
        delegate_protocol!(self, fields)
    }

    #[inline]
    fn is_application(&self) -> bool {
        delegate_protocol!(self, is_application)
    }
}

macro_rules! builtin_from {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for BuiltinProtocol {
                fn from(p: $ty) -> Self {
                    BuiltinProtocol::$variant(p)
                }
            }
        )*
    };
}

builtin_from! {
    EthernetProtocol => Ethernet,
    VlanProtocol => Vlan,
    ArpProtocol => Arp,
    Ipv4Protocol => Ipv4,
    Ipv6Protocol => Ipv6,
    IcmpProtocol => Icmp,
    TcpProtocol => Tcp,
    UdpProtocol => Udp,
    DnsProtocol => Dns,
}

/// Registry for protocol parsers with priority-based selection.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
    parsers: Vec<BuiltinProtocol>,
}

impl ProtocolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a protocol parser.
    pub fn register<P: Into<BuiltinProtocol>>(&mut self, parser: P) {
        self.parsers.push(parser.into());
    }

    /// Find the best parser for the given context.
    #[inline]
    pub fn find_parser(&self, context: &ParseContext) -> Option<&BuiltinProtocol> {
        self.parsers
            .iter()
            .filter_map(|p| p.can_parse(context).map(|priority| (p, priority)))
            .max_by_key(|(_, priority)| *priority)
            .map(|(parser, _)| parser)
    }

    pub fn all_parsers(&self) -> impl Iterator<Item = &BuiltinProtocol> {
        self.parsers.iter()
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_protocol_size() {
        let size = std::mem::size_of::<BuiltinProtocol>();
        assert!(size <= 8, "BuiltinProtocol is {} bytes, expected <= 8", size);
    }

    #[test]
    fn test_find_root_parser() {
        let mut registry = ProtocolRegistry::new();
        registry.register(EthernetProtocol);
        registry.register(Ipv4Protocol);
        registry.register(TcpProtocol);
        assert_eq!(registry.len(), 3);

        let ctx = ParseContext::new(1);
        assert_eq!(registry.find_parser(&ctx).unwrap().name(), "ethernet");

        let mut ctx = ParseContext::new(1);
        ctx.parent_protocol = Some("ethernet");
        ctx.insert_hint("ethertype", 0x0800);
        assert_eq!(registry.find_parser(&ctx).unwrap().name(), "ipv4");
    }
}
