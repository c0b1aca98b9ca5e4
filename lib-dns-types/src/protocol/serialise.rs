//! Serialisation of DNS messages to the wire format.  See the `types`
//! module for details of the format.

use std::collections::HashMap;

use bytes::BytesMut;

use crate::protocol::types::*;

impl Message {
    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn to_octets(&self) -> Result<BytesMut, Error> {
        let mut buffer = WritableBuffer::default();
        self.serialise(&mut buffer)?;
        Ok(buffer.octets)
    }

    /// # Errors
    ///
    /// If the message is invalid (the `Message` type permits more
    /// states than strictly allowed).
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        let qdcount = usize_to_u16(self.questions.len())?;
        let ancount = usize_to_u16(self.answers.len())?;
        let nscount = usize_to_u16(self.authority.len())?;
        let arcount = usize_to_u16(self.additional.len())?;

        self.header.serialise(buffer);
        buffer.write_u16(qdcount);
        buffer.write_u16(ancount);
        buffer.write_u16(nscount);
        buffer.write_u16(arcount);

        for question in &self.questions {
            question.serialise(buffer);
        }
        for rr in &self.answers {
            rr.serialise(buffer)?;
        }
        for rr in &self.authority {
            rr.serialise(buffer)?;
        }
        for rr in &self.additional {
            rr.serialise(buffer)?;
        }

        Ok(())
    }
}

impl Header {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        // octet 1
        let flag_qr = if self.is_response { HEADER_MASK_QR } else { 0 };
        let field_opcode = HEADER_MASK_OPCODE & (u8::from(self.opcode) << HEADER_OFFSET_OPCODE);
        let flag_aa = if self.is_authoritative {
            HEADER_MASK_AA
        } else {
            0
        };
        let flag_tc = if self.is_truncated { HEADER_MASK_TC } else { 0 };
        let flag_rd = if self.recursion_desired {
            HEADER_MASK_RD
        } else {
            0
        };
        // octet 2
        let flag_ra = if self.recursion_available {
            HEADER_MASK_RA
        } else {
            0
        };
        let flag_ad = if self.authentic_data {
            HEADER_MASK_AD
        } else {
            0
        };
        let flag_cd = if self.checking_disabled {
            HEADER_MASK_CD
        } else {
            0
        };
        let field_rcode = HEADER_MASK_RCODE & (u8::from(self.rcode) << HEADER_OFFSET_RCODE);

        buffer.write_u16(self.id);
        buffer.write_u8(flag_qr | field_opcode | flag_aa | flag_tc | flag_rd);
        buffer.write_u8(flag_ra | flag_ad | flag_cd | field_rcode);
    }
}

impl Question {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        self.name.serialise(buffer, true);
        self.qtype.serialise(buffer);
        self.qclass.serialise(buffer);
    }
}

impl ResourceRecord {
    /// # Errors
    ///
    /// If the RDATA is too long.
    pub fn serialise(&self, buffer: &mut WritableBuffer) -> Result<(), Error> {
        self.name.serialise(buffer, true);
        self.rtype_with_data.rtype().serialise(buffer);
        self.rclass.serialise(buffer);
        buffer.write_u32(self.ttl);

        // filled in below
        let rdlength_index = buffer.index();
        buffer.write_u16(0);

        // name fields nested in RDATA are never compressed: backpatching
        // the rdlength above is already fiddly enough without having to
        // retroactively rewrite pointers too.
        match &self.rtype_with_data {
            RecordTypeWithData::A { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::NS { nsdname } => nsdname.serialise(buffer, false),
            RecordTypeWithData::MD { madname } => madname.serialise(buffer, false),
            RecordTypeWithData::MF { madname } => madname.serialise(buffer, false),
            RecordTypeWithData::CNAME { cname } => cname.serialise(buffer, false),
            RecordTypeWithData::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                mname.serialise(buffer, false);
                rname.serialise(buffer, false);
                buffer.write_u32(*serial);
                buffer.write_u32(*refresh);
                buffer.write_u32(*retry);
                buffer.write_u32(*expire);
                buffer.write_u32(*minimum);
            }
            RecordTypeWithData::MB { madname } => madname.serialise(buffer, false),
            RecordTypeWithData::MG { mdmname } => mdmname.serialise(buffer, false),
            RecordTypeWithData::MR { newname } => newname.serialise(buffer, false),
            RecordTypeWithData::NULL { octets } => buffer.write_octets(octets),
            RecordTypeWithData::WKS { octets } => buffer.write_octets(octets),
            RecordTypeWithData::PTR { ptrdname } => ptrdname.serialise(buffer, false),
            RecordTypeWithData::HINFO { octets } => buffer.write_octets(octets),
            RecordTypeWithData::MINFO { rmailbx, emailbx } => {
                rmailbx.serialise(buffer, false);
                emailbx.serialise(buffer, false);
            }
            RecordTypeWithData::MX {
                preference,
                exchange,
            } => {
                buffer.write_u16(*preference);
                exchange.serialise(buffer, false);
            }
            RecordTypeWithData::TXT { octets } => buffer.write_octets(octets),
            RecordTypeWithData::AAAA { address } => buffer.write_octets(&address.octets()),
            RecordTypeWithData::SRV {
                priority,
                weight,
                port,
                target,
            } => {
                buffer.write_u16(*priority);
                buffer.write_u16(*weight);
                buffer.write_u16(*port);
                target.serialise(buffer, false);
            }
            RecordTypeWithData::OPT { options } => buffer.write_octets(options),
            RecordTypeWithData::RRSIG {
                type_covered,
                algorithm,
                labels,
                original_ttl,
                signature_expiration,
                signature_inception,
                key_tag,
                signer_name,
                signature,
            } => {
                type_covered.serialise(buffer);
                buffer.write_u8(*algorithm);
                buffer.write_u8(*labels);
                buffer.write_u32(*original_ttl);
                buffer.write_u32(*signature_expiration);
                buffer.write_u32(*signature_inception);
                buffer.write_u16(*key_tag);
                signer_name.serialise(buffer, false);
                buffer.write_octets(signature);
            }
            RecordTypeWithData::DNSKEY {
                flags,
                protocol,
                algorithm,
                public_key,
            } => {
                buffer.write_u16(*flags);
                buffer.write_u8(*protocol);
                buffer.write_u8(*algorithm);
                buffer.write_octets(public_key);
            }
            RecordTypeWithData::Unimplemented { octets, .. } => buffer.write_octets(octets),
            RecordTypeWithData::Unknown { octets, .. } => buffer.write_octets(octets),
        }

        // -2 so we don't also include the 2 octets for the rdlength
        let rdlength = usize_to_u16(buffer.index() - rdlength_index - 2)?;
        let [hi, lo] = rdlength.to_be_bytes();
        buffer.octets[rdlength_index] = hi;
        buffer.octets[rdlength_index + 1] = lo;

        Ok(())
    }
}

impl DomainName {
    /// Serialise this name, optionally compressing it against names
    /// already written to `buffer`.  Compression is only safe for
    /// names that live outside RDATA (owner names and names in the
    /// question section); RDATA-embedded names skip it so computing
    /// RDLENGTH above doesn't have to account for pointers created by
    /// nested writes.
    pub fn serialise(&self, buffer: &mut WritableBuffer, compress: bool) {
        if compress {
            if let Some(ptr) = buffer.name_pointer(self) {
                let [hi, lo] = ptr.to_be_bytes();
                buffer.write_u8(hi);
                buffer.write_u8(lo);
                return;
            }
            buffer.memoise_name(self);
        }

        for label in &self.labels {
            buffer.write_u8(label.len());
            buffer.write_octets(label.octets());
        }
    }
}

impl QueryType {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl QueryClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

impl RecordType {
    pub fn serialise(&self, buffer: &mut WritableBuffer) {
        buffer.write_u16((*self).into());
    }
}

impl RecordClass {
    pub fn serialise(self, buffer: &mut WritableBuffer) {
        buffer.write_u16(self.into());
    }
}

/// Errors encountered when serialising a message.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Error {
    /// A counter does not fit in the desired width.
    CounterTooLarge { counter: usize, bits: u32 },
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            Error::CounterTooLarge { counter, bits } => {
                write!(f, "'{counter}' cannot be converted to a u{bits}")
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        None
    }
}

/// A buffer which can be written to, for serialisation purposes.
///
/// Tracks the offset of every domain name written so far so that
/// later names pointing at the same suffix can be compressed into a
/// 2-octet back-pointer, per section 4.1.4 of RFC 1035.
pub struct WritableBuffer {
    pub octets: BytesMut,
    name_pointers: HashMap<DomainName, u16>,
}

impl Default for WritableBuffer {
    fn default() -> Self {
        Self {
            octets: BytesMut::with_capacity(512),
            name_pointers: HashMap::new(),
        }
    }
}

impl WritableBuffer {
    pub fn index(&self) -> usize {
        self.octets.len()
    }

    /// Record that `name` starts at the buffer's current write
    /// position, so a later occurrence of the same name can point
    /// back here.  The root name is never memoised: every message
    /// potentially ends in it, and a pointer saves nothing over the
    /// single zero octet it would replace.
    pub fn memoise_name(&mut self, name: &DomainName) {
        if name.is_root() || self.name_pointers.contains_key(name) {
            return;
        }
        if let Ok(ptr) = u16::try_from(self.index()) {
            self.name_pointers.insert(name.clone(), ptr | 0b1100_0000_0000_0000);
        }
    }

    pub fn name_pointer(&self, name: &DomainName) -> Option<u16> {
        self.name_pointers.get(name).copied()
    }

    pub fn write_u8(&mut self, octet: u8) {
        self.octets.extend_from_slice(&[octet]);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.octets.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_octets(&mut self, octets: &[u8]) {
        self.octets.extend_from_slice(octets);
    }
}

/// Helper function to convert a `usize` into a `u16` (or return an error).
///
/// # Errors
///
/// If the value cannot be converted.
fn usize_to_u16(counter: usize) -> Result<u16, Error> {
    if let Ok(t) = u16::try_from(counter) {
        Ok(t)
    } else {
        Err(Error::CounterTooLarge {
            counter,
            bits: u16::BITS,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::test_util::*;

    #[test]
    #[rustfmt::skip]
    fn test_sets_rdlength() {
        let mut buf = WritableBuffer::default();
        buf.write_u8(1);
        buf.write_u8(2);
        buf.write_u8(3);
        buf.write_u8(4);

        let rr = ResourceRecord {
            name: domain("www.example.com."),
            rtype_with_data: RecordTypeWithData::MX {
                preference: 32,
                exchange: domain("mx.example.com."),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        let _ = rr.serialise(&mut buf);

        assert_eq!(
            &[
                1, 2, 3, 4,
                // NAME
                3, 119, 119, 119, // "www"
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
                // TYPE
                0b0000_0000, 0b0000_1111, // MX
                // CLASS
                0b0000_0000, 0b0000_0001, // IN
                // TTL
                0b0000_0000, 0b0000_0000, 0b0000_0001, 0b0010_1100, // 300
                // RDLENGTH
                0b0000_0000, 0b0001_0010, // 18 octets
                // RDATA
                0, 32, // preference
                2, 109, 120, // "mx" (not compressed: lives in RDATA)
                7, 101, 120, 97, 109, 112, 108, 101, // "example"
                3, 99, 111, 109, 0, // "com"
            ][..],
            &buf.octets[..],
        );
    }

    #[test]
    fn test_name_compression_opt_in() {
        let mut buf = WritableBuffer::default();
        let name = domain("www.example.com.");
        name.serialise(&mut buf, true);
        let first_write_len = buf.index();
        name.serialise(&mut buf, true);

        // second write should be a 2-octet pointer back to offset 0
        assert_eq!(buf.octets.len(), first_write_len + 2);
        assert_eq!(buf.octets[first_write_len] & 0b1100_0000, 0b1100_0000);
    }

    #[test]
    fn test_name_compression_opt_out() {
        let mut buf = WritableBuffer::default();
        let name = domain("www.example.com.");
        name.serialise(&mut buf, false);
        let first_write_len = buf.index();
        name.serialise(&mut buf, false);

        // compression never kicks in when writes opt out, even for a
        // repeated name
        assert_eq!(buf.octets.len(), first_write_len * 2);
    }

    #[test]
    fn test_name_compression_records() {
        let mut uncompressed = WritableBuffer::default();
        domain("example.com.").serialise(&mut uncompressed, false);
        let uncompressed_name_len = uncompressed.index();

        let mut buf = WritableBuffer::default();

        let question = Question {
            name: domain("example.com."),
            qtype: QueryType::Record(RecordType::MX),
            qclass: QueryClass::Record(RecordClass::IN),
        };
        question.serialise(&mut buf);
        let question_end = buf.index();

        let rr = ResourceRecord {
            name: domain("example.com."),
            rtype_with_data: RecordTypeWithData::CNAME {
                cname: domain("example.com."),
            },
            rclass: RecordClass::IN,
            ttl: 300,
        };
        let _ = rr.serialise(&mut buf);

        // the RR's owner name should be a 2-octet pointer back into
        // the question, not a fresh copy of the labels: TYPE(2) +
        // CLASS(2) + TTL(4) + RDLENGTH(2) + pointer(2) + RDATA, where
        // RDATA is the uncompressed CNAME target.
        let rr_len = buf.index() - question_end;
        assert_eq!(rr_len, 2 + 2 + 2 + 4 + 2 + uncompressed_name_len);
    }
}
