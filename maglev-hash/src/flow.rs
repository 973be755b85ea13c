//! Flow keys as hashed by the datapath.
//!
//! A key is a fixed 36-byte buffer: a 16-byte tunnel address field, a 16-byte
//! packet address field and a 2-byte transport port field, followed by two
//! bytes of padding. Source and destination values are xored into the same
//! field, so both directions of a connection produce the same key.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use crate::hash_bytes;

/// Size of the hashed flow key buffer.
pub const FLOW_KEY_LEN: usize = 36;

/// IANA protocol number for TCP.
pub const IPPROTO_TCP: u8 = 6;
/// IANA protocol number for UDP.
pub const IPPROTO_UDP: u8 = 17;

const TUNNEL_OFFSET: usize = 0;
const PACKET_OFFSET: usize = 16;
const ADDR_LEN: usize = 16;
const PORT_OFFSET: usize = 32;

/// The hashing input for one network flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowKey {
    bytes: [u8; FLOW_KEY_LEN],
    protocol: u8,
}

impl FlowKey {
    /// An empty key for the given IP protocol.
    pub fn new(protocol: u8) -> Self {
        Self {
            bytes: [0; FLOW_KEY_LEN],
            protocol,
        }
    }

    /// Key for an IPv4 flow.
    pub fn from_ipv4(src: Ipv4Addr, sport: u16, dst: Ipv4Addr, dport: u16, protocol: u8) -> Self {
        let mut key = Self::new(protocol);
        key.mix_packet_addr(IpAddr::V4(src));
        key.mix_packet_addr(IpAddr::V4(dst));
        key.mix_port(sport);
        key.mix_port(dport);
        key
    }

    /// Key for a flow between two socket addresses of either family.
    pub fn from_socket_addrs(src: SocketAddr, dst: SocketAddr, protocol: u8) -> Self {
        let mut key = Self::new(protocol);
        key.mix_packet_addr(src.ip());
        key.mix_packet_addr(dst.ip());
        key.mix_port(src.port());
        key.mix_port(dst.port());
        key
    }

    /// Add the outer tunnel endpoints of an encapsulated flow.
    pub fn with_tunnel(mut self, src: IpAddr, dst: IpAddr) -> Self {
        self.mix_tunnel_addr(src);
        self.mix_tunnel_addr(dst);
        self
    }

    /// Xor an address into the packet address field.
    pub fn mix_packet_addr(&mut self, addr: IpAddr) {
        xor_addr(&mut self.bytes[PACKET_OFFSET..PACKET_OFFSET + ADDR_LEN], addr);
    }

    /// Xor an address into the tunnel address field.
    pub fn mix_tunnel_addr(&mut self, addr: IpAddr) {
        xor_addr(&mut self.bytes[TUNNEL_OFFSET..TUNNEL_OFFSET + ADDR_LEN], addr);
    }

    /// Xor a transport port (host order) into the port field.
    pub fn mix_port(&mut self, port: u16) {
        xor_into(&mut self.bytes[PORT_OFFSET..PORT_OFFSET + 2], &port.to_be_bytes());
    }

    /// The IP protocol number.
    pub fn protocol(&self) -> u8 {
        self.protocol
    }

    /// The raw buffer that gets hashed.
    pub fn as_bytes(&self) -> &[u8; FLOW_KEY_LEN] {
        &self.bytes
    }

    /// Hash the key.
    ///
    /// The protocol byte is hashed first and its result seeds the hash of the
    /// buffer.
    pub fn hash(&self) -> u32 {
        let basis = hash_bytes(&[self.protocol], 0);
        hash_bytes(&self.bytes, basis)
    }
}

// IPv4 addresses occupy the first four bytes of the field, in network order.
fn xor_addr(field: &mut [u8], addr: IpAddr) {
    match addr {
        IpAddr::V4(v4) => xor_into(&mut field[..4], &v4.octets()),
        IpAddr::V6(v6) => xor_into(field, &v6.octets()),
    }
}

fn xor_into(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv6Addr;

    fn reference_flow() -> FlowKey {
        FlowKey::from_ipv4(
            Ipv4Addr::new(172, 20, 88, 194),
            52794,
            Ipv4Addr::new(172, 20, 234, 26),
            80,
            IPPROTO_TCP,
        )
    }

    #[test]
    fn reference_flow_hash() {
        assert_eq!(reference_flow().hash(), 0x5271_e49c);
    }

    #[test]
    fn buffer_layout() {
        let key = reference_flow();
        let bytes = key.as_bytes();
        assert!(bytes[..16].iter().all(|b| *b == 0));
        assert_eq!(&bytes[16..20], &[0, 0, 0xb2, 0xd8]);
        assert_eq!(&bytes[32..34], &[0xce, 0x6a]);
        assert!(bytes[34..].iter().all(|b| *b == 0));
    }

    #[test]
    fn both_directions_hash_the_same() {
        let forward = reference_flow();
        let reverse = FlowKey::from_ipv4(
            Ipv4Addr::new(172, 20, 234, 26),
            80,
            Ipv4Addr::new(172, 20, 88, 194),
            52794,
            IPPROTO_TCP,
        );
        assert_eq!(forward, reverse);
        assert_eq!(forward.hash(), reverse.hash());
    }

    #[test]
    fn socket_addrs_match_ipv4_constructor() {
        let src: SocketAddr = "172.20.88.194:52794".parse().unwrap();
        let dst: SocketAddr = "172.20.234.26:80".parse().unwrap();
        assert_eq!(FlowKey::from_socket_addrs(src, dst, IPPROTO_TCP), reference_flow());
    }

    #[test]
    fn protocol_and_tunnel_change_the_hash() {
        let tcp = reference_flow();
        let mut udp = tcp;
        udp.protocol = IPPROTO_UDP;
        assert_ne!(tcp.hash(), udp.hash());

        let tunneled = tcp.with_tunnel(
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2)),
        );
        assert_ne!(tcp.hash(), tunneled.hash());
    }

    #[test]
    fn ipv6_fills_whole_field() {
        let v6 = Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1);
        let src = IpAddr::V6(v6);
        let mut key = FlowKey::new(IPPROTO_TCP);
        key.mix_packet_addr(src);
        assert_eq!(&key.as_bytes()[16..32], &v6.octets());

        key.mix_packet_addr(src);
        assert_eq!(key, FlowKey::new(IPPROTO_TCP));
    }
}
