//! Packet header parsing and re-serialization.
//!
//! The packet-in evaluator works on a flat record of L2-L4 header fields.
//! Parsing is tolerant: fields of absent layers are left zeroed. Writing
//! modified fields back patches the original bytes in place, keeping the
//! IPv4 and TCP/UDP checksums consistent, rather than rebuilding the packet.

use byteorder::{BigEndian, ByteOrder};

use crate::error::Error;
use crate::message::PortId;

pub const ETH_TYP_VLAN: u16 = 0x8100;
pub const ETH_TYP_IPV4: u16 = 0x0800;
pub const IP_PROTO_TCP: u8 = 6;
pub const IP_PROTO_UDP: u8 = 17;

/// Where a packet currently sits: at a physical port, or handed to a named
/// application pipe.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Location {
    Physical(PortId),
    Pipe(String),
}

/// Flat record of the header fields a policy can observe and modify, plus
/// the packet's current location.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct HeadersValues {
    pub location: Location,
    pub dl_src: u64,
    pub dl_dst: u64,
    pub dl_typ: u16,
    pub dl_vlan: Option<u16>,
    pub dl_vlan_pcp: u8,
    pub nw_src: u32,
    pub nw_dst: u32,
    pub nw_proto: u8,
    pub nw_tos: u8,
    pub tp_src: u16,
    pub tp_dst: u16,
}

impl HeadersValues {
    /// Whether any header field differs from `other`, the location aside.
    pub fn differs_from(&self, other: &HeadersValues) -> bool {
        self.dl_src != other.dl_src
            || self.dl_dst != other.dl_dst
            || self.dl_typ != other.dl_typ
            || self.dl_vlan != other.dl_vlan
            || self.dl_vlan_pcp != other.dl_vlan_pcp
            || self.nw_src != other.nw_src
            || self.nw_dst != other.nw_dst
            || self.nw_proto != other.nw_proto
            || self.nw_tos != other.nw_tos
            || self.tp_src != other.tp_src
            || self.tp_dst != other.tp_dst
    }
}

pub fn mac_of_bytes(bytes: [u8; 6]) -> u64 {
    let mut mac = 0u64;
    for b in bytes.iter() {
        mac = (mac << 8) | u64::from(*b);
    }
    mac
}

pub fn bytes_of_mac(mac: u64) -> [u8; 6] {
    let mut bytes = [0u8; 6];
    for (i, b) in bytes.iter_mut().enumerate() {
        *b = (mac >> (8 * (5 - i))) as u8;
    }
    bytes
}

enum L4 {
    Tcp(usize),
    Udp(usize),
}

/// Byte offsets of the layers present in a packet.
struct Offsets {
    l3: Option<usize>,
    l4: Option<L4>,
}

impl Offsets {
    fn of(bytes: &[u8]) -> Offsets {
        let mut off = Offsets { l3: None, l4: None };
        if bytes.len() < 14 {
            return off;
        }
        let outer_typ = BigEndian::read_u16(&bytes[12..14]);
        let (dl_typ, l3) = if outer_typ == ETH_TYP_VLAN && bytes.len() >= 18 {
            (BigEndian::read_u16(&bytes[16..18]), 18)
        } else {
            (outer_typ, 14)
        };
        if dl_typ != ETH_TYP_IPV4 || bytes.len() < l3 + 20 {
            return off;
        }
        let ihl = usize::from(bytes[l3] & 0x0F) * 4;
        if ihl < 20 || bytes.len() < l3 + ihl {
            return off;
        }
        off.l3 = Some(l3);
        let l4 = l3 + ihl;
        match bytes[l3 + 9] {
            IP_PROTO_TCP if bytes.len() >= l4 + 20 => off.l4 = Some(L4::Tcp(l4)),
            IP_PROTO_UDP if bytes.len() >= l4 + 8 => off.l4 = Some(L4::Udp(l4)),
            _ => {}
        }
        off
    }
}

/// Parse the leading header bytes of a packet arriving on `in_port`.
pub fn parse(bytes: &[u8], in_port: PortId) -> HeadersValues {
    let mut hv = HeadersValues {
        location: Location::Physical(in_port),
        dl_src: 0,
        dl_dst: 0,
        dl_typ: 0,
        dl_vlan: None,
        dl_vlan_pcp: 0,
        nw_src: 0,
        nw_dst: 0,
        nw_proto: 0,
        nw_tos: 0,
        tp_src: 0,
        tp_dst: 0,
    };
    if bytes.len() < 14 {
        return hv;
    }
    hv.dl_dst = mac_of_bytes(bytes[0..6].try_into().unwrap());
    hv.dl_src = mac_of_bytes(bytes[6..12].try_into().unwrap());
    hv.dl_typ = BigEndian::read_u16(&bytes[12..14]);
    if hv.dl_typ == ETH_TYP_VLAN && bytes.len() >= 18 {
        let tci = BigEndian::read_u16(&bytes[14..16]);
        hv.dl_vlan = Some(tci & 0x0FFF);
        hv.dl_vlan_pcp = (tci >> 13) as u8;
        hv.dl_typ = BigEndian::read_u16(&bytes[16..18]);
    }
    let off = Offsets::of(bytes);
    if let Some(l3) = off.l3 {
        hv.nw_tos = bytes[l3 + 1];
        hv.nw_proto = bytes[l3 + 9];
        hv.nw_src = BigEndian::read_u32(&bytes[l3 + 12..l3 + 16]);
        hv.nw_dst = BigEndian::read_u32(&bytes[l3 + 16..l3 + 20]);
    }
    match off.l4 {
        Some(L4::Tcp(l4)) | Some(L4::Udp(l4)) => {
            hv.tp_src = BigEndian::read_u16(&bytes[l4..l4 + 2]);
            hv.tp_dst = BigEndian::read_u16(&bytes[l4 + 2..l4 + 4]);
        }
        None => {}
    }
    hv
}

/// Incremental internet-checksum update for one changed 16-bit word
/// (RFC 1624, equation 3).
fn csum_update(csum: u16, old: u16, new: u16) -> u16 {
    let mut sum = u32::from(!csum) + u32::from(!old) + u32::from(new);
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

fn patch_word(out: &mut [u8], csum_at: usize, at: usize, new: u16) {
    let old = BigEndian::read_u16(&out[at..at + 2]);
    let csum = BigEndian::read_u16(&out[csum_at..csum_at + 2]);
    BigEndian::write_u16(&mut out[at..at + 2], new);
    BigEndian::write_u16(&mut out[csum_at..csum_at + 2], csum_update(csum, old, new));
}

/// Update a transport checksum for a changed word that is part of its
/// pseudo-header (the word itself lives in the IP header and was already
/// rewritten there).
fn patch_pseudo(out: &mut [u8], csum_at: usize, old: u16, new: u16) {
    let csum = BigEndian::read_u16(&out[csum_at..csum_at + 2]);
    if csum == 0 {
        // UDP with checksumming disabled.
        return;
    }
    BigEndian::write_u16(&mut out[csum_at..csum_at + 2], csum_update(csum, old, new));
}

/// Write the fields changed between `original` and `modified` back into a
/// copy of the packet bytes.
///
/// Modifications to the VLAN id, VLAN priority, ethertype, or IP protocol
/// cannot be realized here and fail with [`Error::UnsupportedMod`], as do
/// modifications to fields of a layer the packet does not carry.
pub fn sync_headers(
    bytes: &[u8],
    original: &HeadersValues,
    modified: &HeadersValues,
) -> Result<Vec<u8>, Error> {
    if modified.dl_vlan != original.dl_vlan {
        return Err(Error::UnsupportedMod { field: "vlan" });
    }
    if modified.dl_vlan_pcp != original.dl_vlan_pcp {
        return Err(Error::UnsupportedMod { field: "vlanPcp" });
    }
    if modified.dl_typ != original.dl_typ {
        return Err(Error::UnsupportedMod { field: "ethType" });
    }
    if modified.nw_proto != original.nw_proto {
        return Err(Error::UnsupportedMod { field: "ipProto" });
    }

    let mut out = bytes.to_vec();
    if modified.dl_dst != original.dl_dst {
        out[0..6].copy_from_slice(&bytes_of_mac(modified.dl_dst));
    }
    if modified.dl_src != original.dl_src {
        out[6..12].copy_from_slice(&bytes_of_mac(modified.dl_src));
    }

    let off = Offsets::of(bytes);
    let l4_csum_at = match off.l4 {
        Some(L4::Tcp(l4)) => Some(l4 + 16),
        Some(L4::Udp(l4)) => Some(l4 + 6),
        None => None,
    };

    if modified.nw_tos != original.nw_tos
        || modified.nw_src != original.nw_src
        || modified.nw_dst != original.nw_dst
    {
        let l3 = match off.l3 {
            Some(l3) => l3,
            None => return Err(Error::UnsupportedMod { field: "ipField" }),
        };
        let ip_csum_at = l3 + 10;
        if modified.nw_tos != original.nw_tos {
            let new = BigEndian::read_u16(&out[l3..l3 + 2]) & 0xFF00 | u16::from(modified.nw_tos);
            patch_word(&mut out, ip_csum_at, l3, new);
        }
        for (field, at) in [(modified.nw_src, l3 + 12), (modified.nw_dst, l3 + 16)] {
            let old = BigEndian::read_u32(&out[at..at + 4]);
            if field == old {
                continue;
            }
            let (old_hi, old_lo) = ((old >> 16) as u16, old as u16);
            let (new_hi, new_lo) = ((field >> 16) as u16, field as u16);
            patch_word(&mut out, ip_csum_at, at, new_hi);
            patch_word(&mut out, ip_csum_at, at + 2, new_lo);
            // Addresses are in the transport pseudo-header too.
            if let Some(csum_at) = l4_csum_at {
                patch_pseudo(&mut out, csum_at, old_hi, new_hi);
                patch_pseudo(&mut out, csum_at, old_lo, new_lo);
            }
        }
    }

    if modified.tp_src != original.tp_src || modified.tp_dst != original.tp_dst {
        let (l4, csum_at) = match (&off.l4, l4_csum_at) {
            (Some(L4::Tcp(l4)), Some(c)) | (Some(L4::Udp(l4)), Some(c)) => (*l4, c),
            _ => return Err(Error::UnsupportedMod { field: "tpPort" }),
        };
        if modified.tp_src != original.tp_src {
            let csum = BigEndian::read_u16(&out[csum_at..csum_at + 2]);
            let old = BigEndian::read_u16(&out[l4..l4 + 2]);
            BigEndian::write_u16(&mut out[l4..l4 + 2], modified.tp_src);
            if csum != 0 {
                BigEndian::write_u16(
                    &mut out[csum_at..csum_at + 2],
                    csum_update(csum, old, modified.tp_src),
                );
            }
        }
        if modified.tp_dst != original.tp_dst {
            let csum = BigEndian::read_u16(&out[csum_at..csum_at + 2]);
            let old = BigEndian::read_u16(&out[l4 + 2..l4 + 4]);
            BigEndian::write_u16(&mut out[l4 + 2..l4 + 4], modified.tp_dst);
            if csum != 0 {
                BigEndian::write_u16(
                    &mut out[csum_at..csum_at + 2],
                    csum_update(csum, old, modified.tp_dst),
                );
            }
        }
    }

    Ok(out)
}
