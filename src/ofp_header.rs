use std::io::Cursor;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

/// OpenFlow transaction id. Replies carry the id of the request they answer;
/// the controller allocates fresh ids monotonically for barriers.
pub type Xid = u32;

/// Wire protocol version for OpenFlow 1.0.
pub const OFP10_VERSION: u8 = 1;

pub const OFP_HEADER_LENGTH: usize = 8;

/// OpenFlow header.
///
/// The first fields of every OpenFlow message, no matter the protocol
/// version. The core parses this to delimit messages on the TCP stream; the
/// body past it is handed to the wire codec.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct OfpHeader {
    version: u8,
    typ: u8,
    length: u16,
    xid: Xid,
}

impl OfpHeader {
    pub fn new(version: u8, typ: u8, length: u16, xid: Xid) -> OfpHeader {
        OfpHeader {
            version,
            typ,
            length,
            xid,
        }
    }

    /// Byte-size of a header on the wire.
    pub fn size() -> usize {
        OFP_HEADER_LENGTH
    }

    /// Append the header fields to a message buffer.
    pub fn marshal(bytes: &mut Vec<u8>, header: OfpHeader) {
        bytes.push(header.version());
        bytes.push(header.type_code());
        bytes.write_u16::<BigEndian>(header.length() as u16).unwrap();
        bytes.write_u32::<BigEndian>(header.xid()).unwrap();
    }

    /// Parse a header out of a buffer of at least [`OFP_HEADER_LENGTH`]
    /// bytes.
    pub fn parse(buf: &[u8]) -> Self {
        assert!(buf.len() >= OFP_HEADER_LENGTH);
        let mut bytes = Cursor::new(buf);
        OfpHeader {
            version: bytes.read_u8().unwrap(),
            typ: bytes.read_u8().unwrap(),
            length: bytes.read_u16::<BigEndian>().unwrap(),
            xid: bytes.read_u32::<BigEndian>().unwrap(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    /// Raw OpenFlow message type code; interpreting it is the codec's job.
    pub fn type_code(&self) -> u8 {
        self.typ
    }

    /// Total message length, header included.
    pub fn length(&self) -> usize {
        self.length as usize
    }

    pub fn xid(&self) -> Xid {
        self.xid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trip() {
        let header = OfpHeader::new(OFP10_VERSION, 18, 8, 0x12345678);
        let mut bytes = Vec::new();
        OfpHeader::marshal(&mut bytes, header);
        assert_eq!(bytes.len(), OfpHeader::size());
        assert_eq!(OfpHeader::parse(&bytes), header);
    }

    #[test]
    fn parse_reads_big_endian_fields() {
        let bytes = [1u8, 10, 0x00, 0x10, 0xDE, 0xAD, 0xBE, 0xEF];
        let header = OfpHeader::parse(&bytes);
        assert_eq!(header.version(), 1);
        assert_eq!(header.type_code(), 10);
        assert_eq!(header.length(), 16);
        assert_eq!(header.xid(), 0xDEADBEEF);
    }
}
