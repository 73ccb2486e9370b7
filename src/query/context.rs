//! Side tables collected while parsing one statement.

use std::collections::BTreeSet;

use super::ast::Ipv4Literal;

/// Which address an IPv4 literal constrains.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpRole {
    Src,
    Dst,
}

impl IpRole {
    /// Role set by a dotted field name, if it is an IPv4 address field.
    pub fn for_field(name: &str) -> Option<Self> {
        let (layer, field) = name.split_once('.')?;
        if !(layer.eq_ignore_ascii_case("ip") || layer.eq_ignore_ascii_case("ipv4")) {
            return None;
        }
        if field.eq_ignore_ascii_case("src") {
            Some(IpRole::Src)
        } else if field.eq_ignore_ascii_case("dst") {
            Some(IpRole::Dst)
        } else {
            None
        }
    }
}

/// IPv4 networks named next to `ip.src` / `ip.dst` in a statement.
///
/// Used as a prefilter over index records: with networks for both roles a
/// record must match both sides; with one role only that side is checked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpLiterals {
    pub src: Vec<Ipv4Literal>,
    pub dst: Vec<Ipv4Literal>,
}

impl IpLiterals {
    pub fn is_empty(&self) -> bool {
        self.src.is_empty() && self.dst.is_empty()
    }

    pub fn record(&mut self, role: IpRole, literal: Ipv4Literal) {
        match role {
            IpRole::Src => self.src.push(literal),
            IpRole::Dst => self.dst.push(literal),
        }
    }

    /// Apply the src/dst matching policy to one pair of addresses.
    pub fn matches(&self, ip_src: u32, ip_dst: u32) -> bool {
        let src_ok = || self.src.iter().any(|net| net.contains(ip_src));
        let dst_ok = || self.dst.iter().any(|net| net.contains(ip_dst));

        match (self.src.is_empty(), self.dst.is_empty()) {
            (true, true) => true,
            (false, true) => src_ok(),
            (true, false) => dst_ok(),
            (false, false) => src_ok() && dst_ok(),
        }
    }
}

/// Per-parse compilation state, owned by the caller and reset for every
/// statement.
#[derive(Debug, Default)]
pub struct CompileContext {
    protocols: BTreeSet<String>,
    ip_literals: IpLiterals,
    active_role: Option<IpRole>,
}

impl CompileContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.protocols.clear();
        self.ip_literals = IpLiterals::default();
        self.active_role = None;
    }

    /// Note a dotted field: its layer becomes a referenced protocol and it
    /// sets (or clears) the active IP role.
    pub fn note_field(&mut self, name: &str) {
        if let Some((layer, _)) = name.split_once('.') {
            self.protocols.insert(layer.to_ascii_uppercase());
            self.active_role = IpRole::for_field(name);
        }
    }

    pub fn note_protocol(&mut self, name: &str) {
        self.protocols.insert(name.to_ascii_uppercase());
    }

    /// Record an IPv4 literal under the active role, if any.
    pub fn note_ipv4(&mut self, literal: Ipv4Literal) {
        if let Some(role) = self.active_role {
            self.ip_literals.record(role, literal);
        }
    }

    pub fn protocols(&self) -> &BTreeSet<String> {
        &self.protocols
    }

    pub fn ip_literals(&self) -> &IpLiterals {
        &self.ip_literals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: u32 = 0x0A00_0001;
    const B: u32 = 0x0A00_0002;
    const C: u32 = 0x0A00_0003;

    #[test]
    fn test_both_roles_must_match() {
        let mut literals = IpLiterals::default();
        literals.record(IpRole::Src, Ipv4Literal::host(A));
        literals.record(IpRole::Dst, Ipv4Literal::host(B));

        assert!(literals.matches(A, B));
        assert!(!literals.matches(A, C));
        assert!(!literals.matches(C, B));
    }

    #[test]
    fn test_single_role_checks_one_side() {
        let mut literals = IpLiterals::default();
        literals.record(IpRole::Src, Ipv4Literal::host(A));
        assert!(literals.matches(A, B));
        assert!(literals.matches(A, C));
        assert!(!literals.matches(C, A));

        let mut literals = IpLiterals::default();
        literals.record(IpRole::Dst, Ipv4Literal::new(A, 24));
        assert!(literals.matches(0, C));
        assert!(!literals.matches(A, 0x0B00_0000));

        assert!(IpLiterals::default().matches(1, 2));
    }

    #[test]
    fn test_role_tracking() {
        let mut ctx = CompileContext::new();
        ctx.note_field("ip.src");
        ctx.note_ipv4(Ipv4Literal::host(A));
        ctx.note_field("tcp.dport");
        ctx.note_ipv4(Ipv4Literal::host(B));
        ctx.note_field("IP.DST");
        ctx.note_ipv4(Ipv4Literal::host(C));

        assert_eq!(ctx.ip_literals().src, vec![Ipv4Literal::host(A)]);
        assert_eq!(ctx.ip_literals().dst, vec![Ipv4Literal::host(C)]);
        assert!(ctx.protocols().contains("IP"));
        assert!(ctx.protocols().contains("TCP"));

        ctx.reset();
        assert!(ctx.protocols().is_empty());
        assert!(ctx.ip_literals().is_empty());
    }
}
