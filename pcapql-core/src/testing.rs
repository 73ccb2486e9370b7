//! Test utilities: packet builders and a segment writer.
//!
//! Compiled for this crate's tests and, behind the `test-utils` feature, for
//! downstream integration tests.

use std::io;
use std::path::Path;

/// Builder for constructing Ethernet frames.
#[derive(Debug, Clone)]
pub struct EthernetBuilder {
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
    vlan: Option<u16>,
    ethertype: u16,
    payload: Vec<u8>,
}

impl Default for EthernetBuilder {
    fn default() -> Self {
        Self {
            src_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            dst_mac: [0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            vlan: None,
            ethertype: 0x0800,
            payload: Vec::new(),
        }
    }
}

impl EthernetBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_mac(mut self, mac: [u8; 6]) -> Self {
        self.src_mac = mac;
        self
    }

    pub fn dst_mac(mut self, mac: [u8; 6]) -> Self {
        self.dst_mac = mac;
        self
    }

    /// Insert an 802.1Q tag with the given VLAN id.
    pub fn vlan(mut self, id: u16) -> Self {
        self.vlan = Some(id);
        self
    }

    pub fn ethertype(mut self, ethertype: u16) -> Self {
        self.ethertype = ethertype;
        self
    }

    pub fn ipv4(self) -> Self {
        self.ethertype(0x0800)
    }

    pub fn ipv6(self) -> Self {
        self.ethertype(0x86DD)
    }

    pub fn arp(self) -> Self {
        self.ethertype(0x0806)
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(18 + self.payload.len());
        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        if let Some(id) = self.vlan {
            frame.extend_from_slice(&0x8100u16.to_be_bytes());
            frame.extend_from_slice(&(id & 0x0FFF).to_be_bytes());
        }
        frame.extend_from_slice(&self.ethertype.to_be_bytes());
        frame.extend_from_slice(&self.payload);
        frame
    }
}

/// Builder for Ethernet/IPv4 ARP bodies.
#[derive(Debug, Clone)]
pub struct ArpBuilder {
    operation: u16,
    sender_mac: [u8; 6],
    sender_ip: [u8; 4],
    target_mac: [u8; 6],
    target_ip: [u8; 4],
}

impl ArpBuilder {
    pub fn request(sender_ip: [u8; 4], target_ip: [u8; 4]) -> Self {
        Self {
            operation: 1,
            sender_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            sender_ip,
            target_mac: [0; 6],
            target_ip,
        }
    }

    pub fn reply(mut self) -> Self {
        self.operation = 2;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut body = Vec::with_capacity(28);
        body.extend_from_slice(&1u16.to_be_bytes());
        body.extend_from_slice(&0x0800u16.to_be_bytes());
        body.push(6);
        body.push(4);
        body.extend_from_slice(&self.operation.to_be_bytes());
        body.extend_from_slice(&self.sender_mac);
        body.extend_from_slice(&self.sender_ip);
        body.extend_from_slice(&self.target_mac);
        body.extend_from_slice(&self.target_ip);
        body
    }
}

/// Builder for constructing IPv4 headers.
#[derive(Debug, Clone)]
pub struct Ipv4Builder {
    tos: u8,
    identification: u16,
    flags_fragment: u16,
    ttl: u8,
    protocol: u8,
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    payload: Vec<u8>,
}

impl Default for Ipv4Builder {
    fn default() -> Self {
        Self {
            tos: 0,
            identification: 0x0001,
            flags_fragment: 0x4000,
            ttl: 64,
            protocol: 6,
            src_ip: [192, 168, 1, 1],
            dst_ip: [192, 168, 1, 2],
            payload: Vec::new(),
        }
    }
}

impl Ipv4Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ttl(mut self, ttl: u8) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn tos(mut self, tos: u8) -> Self {
        self.tos = tos;
        self
    }

    pub fn protocol(mut self, protocol: u8) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn tcp(self) -> Self {
        self.protocol(6)
    }

    pub fn udp(self) -> Self {
        self.protocol(17)
    }

    pub fn icmp(self) -> Self {
        self.protocol(1)
    }

    pub fn src_ip(mut self, ip: [u8; 4]) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: [u8; 4]) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let total_length = (20 + self.payload.len()) as u16;
        let mut packet = Vec::with_capacity(total_length as usize);
        packet.push(0x45);
        packet.push(self.tos);
        packet.extend_from_slice(&total_length.to_be_bytes());
        packet.extend_from_slice(&self.identification.to_be_bytes());
        packet.extend_from_slice(&self.flags_fragment.to_be_bytes());
        packet.push(self.ttl);
        packet.push(self.protocol);
        packet.extend_from_slice(&[0, 0]);
        packet.extend_from_slice(&self.src_ip);
        packet.extend_from_slice(&self.dst_ip);

        let checksum = header_checksum(&packet);
        packet[10..12].copy_from_slice(&checksum.to_be_bytes());

        packet.extend_from_slice(&self.payload);
        packet
    }
}

fn header_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]) as u32)
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Builder for constructing IPv6 headers.
#[derive(Debug, Clone)]
pub struct Ipv6Builder {
    next_header: u8,
    hop_limit: u8,
    src_ip: [u8; 16],
    dst_ip: [u8; 16],
    payload: Vec<u8>,
}

impl Default for Ipv6Builder {
    fn default() -> Self {
        let mut src_ip = [0u8; 16];
        src_ip[0] = 0xfe;
        src_ip[1] = 0x80;
        src_ip[15] = 1;
        let mut dst_ip = src_ip;
        dst_ip[15] = 2;
        Self {
            next_header: 6,
            hop_limit: 64,
            src_ip,
            dst_ip,
            payload: Vec::new(),
        }
    }
}

impl Ipv6Builder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_header(mut self, next_header: u8) -> Self {
        self.next_header = next_header;
        self
    }

    pub fn src_ip(mut self, ip: [u8; 16]) -> Self {
        self.src_ip = ip;
        self
    }

    pub fn dst_ip(mut self, ip: [u8; 16]) -> Self {
        self.dst_ip = ip;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut packet = Vec::with_capacity(40 + self.payload.len());
        packet.extend_from_slice(&[0x60, 0, 0, 0]);
        packet.extend_from_slice(&(self.payload.len() as u16).to_be_bytes());
        packet.push(self.next_header);
        packet.push(self.hop_limit);
        packet.extend_from_slice(&self.src_ip);
        packet.extend_from_slice(&self.dst_ip);
        packet.extend_from_slice(&self.payload);
        packet
    }
}

/// Builder for constructing TCP headers.
#[derive(Debug, Clone)]
pub struct TcpBuilder {
    src_port: u16,
    dst_port: u16,
    seq: u32,
    ack: u32,
    flags: u8,
    window: u16,
    payload: Vec<u8>,
}

impl Default for TcpBuilder {
    fn default() -> Self {
        Self {
            src_port: 12345,
            dst_port: 80,
            seq: 0,
            ack: 0,
            flags: 0x02,
            window: 65535,
            payload: Vec::new(),
        }
    }
}

impl TcpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn seq(mut self, seq: u32) -> Self {
        self.seq = seq;
        self
    }

    pub fn ack_num(mut self, ack: u32) -> Self {
        self.ack = ack;
        self
    }

    pub fn flags(mut self, flags: u8) -> Self {
        self.flags = flags;
        self
    }

    pub fn syn(self) -> Self {
        self.flags(0x02)
    }

    pub fn ack(self) -> Self {
        self.flags(0x10)
    }

    pub fn psh_ack(self) -> Self {
        self.flags(0x18)
    }

    pub fn window(mut self, window: u16) -> Self {
        self.window = window;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut segment = Vec::with_capacity(20 + self.payload.len());
        segment.extend_from_slice(&self.src_port.to_be_bytes());
        segment.extend_from_slice(&self.dst_port.to_be_bytes());
        segment.extend_from_slice(&self.seq.to_be_bytes());
        segment.extend_from_slice(&self.ack.to_be_bytes());
        segment.push(0x50);
        segment.push(self.flags);
        segment.extend_from_slice(&self.window.to_be_bytes());
        segment.extend_from_slice(&[0, 0, 0, 0]);
        segment.extend_from_slice(&self.payload);
        segment
    }
}

/// Builder for constructing UDP datagrams.
#[derive(Debug, Clone)]
pub struct UdpBuilder {
    src_port: u16,
    dst_port: u16,
    payload: Vec<u8>,
}

impl Default for UdpBuilder {
    fn default() -> Self {
        Self {
            src_port: 12345,
            dst_port: 53,
            payload: Vec::new(),
        }
    }
}

impl UdpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn src_port(mut self, port: u16) -> Self {
        self.src_port = port;
        self
    }

    pub fn dst_port(mut self, port: u16) -> Self {
        self.dst_port = port;
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let length = (8 + self.payload.len()) as u16;
        let mut datagram = Vec::with_capacity(length as usize);
        datagram.extend_from_slice(&self.src_port.to_be_bytes());
        datagram.extend_from_slice(&self.dst_port.to_be_bytes());
        datagram.extend_from_slice(&length.to_be_bytes());
        datagram.extend_from_slice(&[0, 0]);
        datagram.extend_from_slice(&self.payload);
        datagram
    }
}

/// Builder for constructing ICMP messages.
#[derive(Debug, Clone, Default)]
pub struct IcmpBuilder {
    icmp_type: u8,
    code: u8,
    rest: [u8; 4],
    payload: Vec<u8>,
}

impl IcmpBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn echo_request(mut self) -> Self {
        self.icmp_type = 8;
        self.code = 0;
        self
    }

    pub fn echo_reply(mut self) -> Self {
        self.icmp_type = 0;
        self.code = 0;
        self
    }

    pub fn destination_unreachable(mut self, code: u8) -> Self {
        self.icmp_type = 3;
        self.code = code;
        self
    }

    pub fn identifier(mut self, id: u16) -> Self {
        self.rest[0..2].copy_from_slice(&id.to_be_bytes());
        self
    }

    pub fn sequence(mut self, seq: u16) -> Self {
        self.rest[2..4].copy_from_slice(&seq.to_be_bytes());
        self
    }

    pub fn payload(mut self, payload: Vec<u8>) -> Self {
        self.payload = payload;
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut message = vec![self.icmp_type, self.code, 0, 0];
        message.extend_from_slice(&self.rest);
        message.extend_from_slice(&self.payload);
        message
    }
}

/// A DNS query message with one question.
pub fn build_dns_query(id: u16, name: &str, qtype: u16) -> Vec<u8> {
    let mut message = Vec::with_capacity(12 + name.len() + 6);
    message.extend_from_slice(&id.to_be_bytes());
    message.extend_from_slice(&0x0100u16.to_be_bytes()); // RD
    message.extend_from_slice(&1u16.to_be_bytes());
    message.extend_from_slice(&[0, 0, 0, 0, 0, 0]);
    for label in name.split('.').filter(|l| !l.is_empty()) {
        message.push(label.len() as u8);
        message.extend_from_slice(label.as_bytes());
    }
    message.push(0);
    message.extend_from_slice(&qtype.to_be_bytes());
    message.extend_from_slice(&1u16.to_be_bytes()); // IN
    message
}

/// Ethernet/IPv4/TCP frame.
pub fn build_tcp_packet(
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let tcp = TcpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .psh_ack()
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new()
        .tcp()
        .src_ip(src_ip)
        .dst_ip(dst_ip)
        .payload(tcp)
        .build();
    EthernetBuilder::new().ipv4().payload(ip).build()
}

/// Ethernet/IPv4/UDP frame.
pub fn build_udp_packet(
    src_ip: [u8; 4],
    dst_ip: [u8; 4],
    src_port: u16,
    dst_port: u16,
    payload: &[u8],
) -> Vec<u8> {
    let udp = UdpBuilder::new()
        .src_port(src_port)
        .dst_port(dst_port)
        .payload(payload.to_vec())
        .build();
    let ip = Ipv4Builder::new()
        .udp()
        .src_ip(src_ip)
        .dst_ip(dst_ip)
        .payload(udp)
        .build();
    EthernetBuilder::new().ipv4().payload(ip).build()
}

/// Ethernet/IPv4/UDP frame carrying an A query for `name` to port 53.
pub fn build_dns_packet(src_ip: [u8; 4], dst_ip: [u8; 4], src_port: u16, name: &str) -> Vec<u8> {
    build_udp_packet(src_ip, dst_ip, src_port, 53, &build_dns_query(0x1234, name, 1))
}

/// Ethernet/IPv4/ICMP echo request.
pub fn build_icmp_echo_request(src_ip: [u8; 4], dst_ip: [u8; 4], id: u16, seq: u16) -> Vec<u8> {
    let icmp = IcmpBuilder::new()
        .echo_request()
        .identifier(id)
        .sequence(seq)
        .payload(vec![0u8; 32])
        .build();
    let ip = Ipv4Builder::new()
        .icmp()
        .src_ip(src_ip)
        .dst_ip(dst_ip)
        .payload(icmp)
        .build();
    EthernetBuilder::new().ipv4().payload(ip).build()
}

/// Ethernet/IPv4/ICMP destination-unreachable message.
pub fn build_icmp_unreachable(src_ip: [u8; 4], dst_ip: [u8; 4], code: u8) -> Vec<u8> {
    let icmp = IcmpBuilder::new()
        .destination_unreachable(code)
        .payload(vec![0u8; 28])
        .build();
    let ip = Ipv4Builder::new()
        .icmp()
        .src_ip(src_ip)
        .dst_ip(dst_ip)
        .payload(icmp)
        .build();
    EthernetBuilder::new().ipv4().payload(ip).build()
}

/// Writer for segment files.
#[derive(Debug, Clone)]
pub struct SegmentBuilder {
    little_endian: bool,
    link_type: u32,
    packets: Vec<(u32, u32, Vec<u8>)>,
}

impl Default for SegmentBuilder {
    fn default() -> Self {
        Self {
            little_endian: false,
            link_type: 1,
            packets: Vec::new(),
        }
    }
}

impl SegmentBuilder {
    /// A big-endian Ethernet segment.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn little_endian(mut self) -> Self {
        self.little_endian = true;
        self
    }

    pub fn link_type(mut self, link_type: u32) -> Self {
        self.link_type = link_type;
        self
    }

    /// Append a packet captured at `ts_sec` seconds plus `ts_usec` microseconds.
    pub fn packet(mut self, ts_sec: u32, ts_usec: u32, frame: Vec<u8>) -> Self {
        self.packets.push((ts_sec, ts_usec, frame));
        self
    }

    pub fn push(&mut self, ts_sec: u32, ts_usec: u32, frame: Vec<u8>) {
        self.packets.push((ts_sec, ts_usec, frame));
    }

    pub fn build(&self) -> Vec<u8> {
        let word = |v: u32| {
            if self.little_endian {
                v.to_le_bytes()
            } else {
                v.to_be_bytes()
            }
        };
        let half = |v: u16| {
            if self.little_endian {
                v.to_le_bytes()
            } else {
                v.to_be_bytes()
            }
        };

        let mut out = Vec::new();
        out.extend_from_slice(&word(0xa1b2c3d4));
        out.extend_from_slice(&half(2));
        out.extend_from_slice(&half(4));
        out.extend_from_slice(&word(0)); // thiszone
        out.extend_from_slice(&word(0)); // sigfigs
        out.extend_from_slice(&word(65535)); // snaplen
        out.extend_from_slice(&word(self.link_type));

        for (ts_sec, ts_usec, frame) in &self.packets {
            let len = frame.len() as u32;
            out.extend_from_slice(&word(*ts_sec));
            out.extend_from_slice(&word(*ts_usec));
            out.extend_from_slice(&word(len));
            out.extend_from_slice(&word(len));
            out.extend_from_slice(frame);
        }
        out
    }

    /// Write the segment to `path`.
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        std::fs::write(path, self.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipv4_checksum_verifies() {
        let packet = Ipv4Builder::new().build();
        assert_eq!(header_checksum(&packet[..20]), 0);
    }

    #[test]
    fn test_vlan_frame_layout() {
        let frame = EthernetBuilder::new().vlan(100).ipv4().build();
        assert_eq!(&frame[12..14], &[0x81, 0x00]);
        assert_eq!(&frame[14..16], &[0x00, 0x64]);
        assert_eq!(&frame[16..18], &[0x08, 0x00]);
    }

    #[test]
    fn test_segment_header_magic() {
        assert_eq!(&SegmentBuilder::new().build()[0..4], &[0xa1, 0xb2, 0xc3, 0xd4]);
        assert_eq!(
            &SegmentBuilder::new().little_endian().build()[0..4],
            &[0xd4, 0xc3, 0xb2, 0xa1]
        );
    }
}
