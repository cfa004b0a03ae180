//! OpenFlow 1.0 framing and the message types the harness speaks.
//!
//! Every message starts with the same 8-byte header: `version` (always
//! 0x01), `type`, `length` (total, header included) and `xid`, all
//! multi-byte fields in network byte order. Replies reuse the request's xid
//! bit-for-bit; unsolicited packet-ins carry a per-switch monotonic xid.
//!
//! The builders here produce complete frames as owned byte vectors so the
//! caller can queue them atomically. [`OfpHeader::peek`] never consumes
//! input: a short buffer reports [`PeekError::Truncated`] and the caller
//! waits for more bytes.

/// Protocol version spoken by every fake switch.
pub const OFP_VERSION: u8 = 0x01;

/// Size of the common message header.
pub const OFP_HEADER_LEN: usize = 8;

/// Fixed part of a PACKET_IN body before the captured frame bytes.
pub const PACKET_IN_FIXED_LEN: usize = 10;

/// Port number announced in FEATURES_REPLY and used as the packet-in
/// ingress port.
pub const SWITCH_PORT: u16 = 1;

const OFPP_NONE: u16 = 0xffff;

/// OpenFlow 1.0 message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MsgType {
    Hello = 0,
    Error = 1,
    EchoRequest = 2,
    EchoReply = 3,
    Vendor = 4,
    FeaturesRequest = 5,
    FeaturesReply = 6,
    GetConfigRequest = 7,
    GetConfigReply = 8,
    SetConfig = 9,
    PacketIn = 10,
    FlowRemoved = 11,
    PortStatus = 12,
    PacketOut = 13,
    FlowMod = 14,
    PortMod = 15,
    StatsRequest = 16,
    StatsReply = 17,
    BarrierRequest = 18,
    BarrierReply = 19,
}

impl MsgType {
    /// Decode a wire type byte. `None` for types the harness never
    /// interprets; the parser consumes those silently.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Hello),
            1 => Some(Self::Error),
            2 => Some(Self::EchoRequest),
            3 => Some(Self::EchoReply),
            4 => Some(Self::Vendor),
            5 => Some(Self::FeaturesRequest),
            6 => Some(Self::FeaturesReply),
            7 => Some(Self::GetConfigRequest),
            8 => Some(Self::GetConfigReply),
            9 => Some(Self::SetConfig),
            10 => Some(Self::PacketIn),
            11 => Some(Self::FlowRemoved),
            12 => Some(Self::PortStatus),
            13 => Some(Self::PacketOut),
            14 => Some(Self::FlowMod),
            15 => Some(Self::PortMod),
            16 => Some(Self::StatsRequest),
            17 => Some(Self::StatsReply),
            18 => Some(Self::BarrierRequest),
            19 => Some(Self::BarrierReply),
            _ => None,
        }
    }
}

/// Statistics kind carried in the first two body bytes of STATS_REQUEST
/// and STATS_REPLY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    Desc,
    Flow,
    Aggregate,
    Table,
    Port,
    Queue,
    Vendor,
}

impl StatsKind {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Desc),
            1 => Some(Self::Flow),
            2 => Some(Self::Aggregate),
            3 => Some(Self::Table),
            4 => Some(Self::Port),
            5 => Some(Self::Queue),
            0xffff => Some(Self::Vendor),
            _ => None,
        }
    }

    /// Length of a well-formed zero-filled reply body for this kind, not
    /// counting the 4-byte type/flags prefix. List-shaped kinds reply with
    /// an empty list.
    pub fn reply_body_len(self) -> usize {
        match self {
            Self::Desc => 1056,
            Self::Flow => 0,
            Self::Aggregate => 24,
            Self::Table => 64,
            Self::Port => 104,
            Self::Queue | Self::Vendor => 0,
        }
    }
}

/// Outcome of peeking at bytes that do not yet hold a valid header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeekError {
    /// Fewer bytes available than a header (or a whole message) needs.
    /// Recoverable: wait for more input.
    Truncated,
    /// The bytes can never become a valid header: wrong version or a
    /// length smaller than the header itself.
    Invalid,
}

/// The common 8-byte message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OfpHeader {
    pub version: u8,
    pub msg_type: u8,
    pub length: u16,
    pub xid: u32,
}

impl OfpHeader {
    /// Read the header at the front of `buf` without consuming anything.
    pub fn peek(buf: &[u8]) -> Result<Self, PeekError> {
        if buf.len() < OFP_HEADER_LEN {
            return Err(PeekError::Truncated);
        }
        let header = Self {
            version: buf[0],
            msg_type: buf[1],
            length: u16::from_be_bytes([buf[2], buf[3]]),
            xid: u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]),
        };
        if header.version != OFP_VERSION || (header.length as usize) < OFP_HEADER_LEN {
            return Err(PeekError::Invalid);
        }
        Ok(header)
    }

    /// Append the 8 header bytes to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.version);
        out.push(self.msg_type);
        out.extend_from_slice(&self.length.to_be_bytes());
        out.extend_from_slice(&self.xid.to_be_bytes());
    }
}

/// Assemble a complete frame: header plus `body`.
fn frame(msg_type: MsgType, xid: u32, body: &[u8]) -> Vec<u8> {
    let length = OFP_HEADER_LEN + body.len();
    debug_assert!(length <= u16::MAX as usize);
    let mut out = Vec::with_capacity(length);
    let header = OfpHeader {
        version: OFP_VERSION,
        msg_type: msg_type as u8,
        length: length as u16,
        xid,
    };
    header.write_to(&mut out);
    out.extend_from_slice(body);
    out
}

/// HELLO, sent by the switch immediately after connecting.
pub fn hello(xid: u32) -> Vec<u8> {
    frame(MsgType::Hello, xid, &[])
}

/// ECHO_REPLY echoing the request's xid and body.
pub fn echo_reply(xid: u32, request_body: &[u8]) -> Vec<u8> {
    frame(MsgType::EchoReply, xid, request_body)
}

/// FEATURES_REQUEST, as a controller (or the test harness) sends it.
pub fn features_request(xid: u32) -> Vec<u8> {
    frame(MsgType::FeaturesRequest, xid, &[])
}

/// FEATURES_REPLY declaring `dpid` and a single physical port.
///
/// Body layout: dpid(8) n_buffers(4) n_tables(1) pad(3) capabilities(4)
/// actions(4), then one 48-byte port description.
pub fn features_reply(xid: u32, dpid: u64) -> Vec<u8> {
    const OFPC_FLOW_STATS: u32 = 1 << 0;
    const OFPAT_OUTPUT_BIT: u32 = 1 << 0;
    // curr: 1 Gb/s full duplex, copper medium.
    const PORT_FEATURES: u32 = (1 << 5) | (1 << 7);

    let mut body = Vec::with_capacity(24 + 48);
    body.extend_from_slice(&dpid.to_be_bytes());
    body.extend_from_slice(&256u32.to_be_bytes()); // n_buffers
    body.push(1); // n_tables
    body.extend_from_slice(&[0; 3]); // pad
    body.extend_from_slice(&OFPC_FLOW_STATS.to_be_bytes());
    body.extend_from_slice(&OFPAT_OUTPUT_BIT.to_be_bytes());

    // ofp_phy_port
    body.extend_from_slice(&SWITCH_PORT.to_be_bytes());
    body.extend_from_slice(&port_hw_addr(dpid));
    let mut name = [0u8; 16];
    name[..4].copy_from_slice(b"eth0");
    body.extend_from_slice(&name);
    body.extend_from_slice(&0u32.to_be_bytes()); // config
    body.extend_from_slice(&0u32.to_be_bytes()); // state
    body.extend_from_slice(&PORT_FEATURES.to_be_bytes()); // curr
    body.extend_from_slice(&0u32.to_be_bytes()); // advertised
    body.extend_from_slice(&0u32.to_be_bytes()); // supported
    body.extend_from_slice(&0u32.to_be_bytes()); // peer
    frame(MsgType::FeaturesReply, xid, &body)
}

/// Hardware address announced for the switch's single port.
fn port_hw_addr(dpid: u64) -> [u8; 6] {
    let b = dpid.to_be_bytes();
    [0x02, b[3], b[4], b[5], b[6], b[7]]
}

/// GET_CONFIG_REPLY with no flags and the protocol-default miss send
/// length.
pub fn get_config_reply(xid: u32) -> Vec<u8> {
    let mut body = Vec::with_capacity(4);
    body.extend_from_slice(&0u16.to_be_bytes()); // flags
    body.extend_from_slice(&128u16.to_be_bytes()); // miss_send_len
    frame(MsgType::GetConfigReply, xid, &body)
}

/// STATS_REPLY of the requested kind with a zero-filled body of the
/// matching length. Unknown kinds get an empty body.
pub fn stats_reply(xid: u32, kind_raw: u16) -> Vec<u8> {
    let body_len = StatsKind::from_u16(kind_raw)
        .map(StatsKind::reply_body_len)
        .unwrap_or(0);
    let mut body = vec![0u8; 4 + body_len];
    body[..2].copy_from_slice(&kind_raw.to_be_bytes());
    // flags and the stats body stay zero
    frame(MsgType::StatsReply, xid, &body)
}

/// Minimal VENDOR reply: header plus a zero vendor identifier.
pub fn vendor_reply(xid: u32) -> Vec<u8> {
    frame(MsgType::Vendor, xid, &0u32.to_be_bytes())
}

/// BARRIER_REQUEST, sent by the switch to close the MAC priming phase.
pub fn barrier_request(xid: u32) -> Vec<u8> {
    frame(MsgType::BarrierRequest, xid, &[])
}

/// BARRIER_REPLY echoing the request's xid.
pub fn barrier_reply(xid: u32) -> Vec<u8> {
    frame(MsgType::BarrierReply, xid, &[])
}

/// PACKET_IN carrying `packet` as a frame received on the switch port.
///
/// Body layout: buffer_id(4) total_len(2) in_port(2) reason(1) pad(1),
/// then the captured bytes.
pub fn packet_in(xid: u32, buffer_id: u32, packet: &[u8]) -> Vec<u8> {
    const OFPR_NO_MATCH: u8 = 0;
    let mut body = Vec::with_capacity(PACKET_IN_FIXED_LEN + packet.len());
    body.extend_from_slice(&buffer_id.to_be_bytes());
    body.extend_from_slice(&(packet.len() as u16).to_be_bytes());
    body.extend_from_slice(&SWITCH_PORT.to_be_bytes());
    body.push(OFPR_NO_MATCH);
    body.push(0); // pad
    body.extend_from_slice(packet);
    frame(MsgType::PacketIn, xid, &body)
}

/// PACKET_OUT releasing `buffer_id` through a single output action, as a
/// controller responds to a packet-in. Used by the mock-controller side.
pub fn packet_out(xid: u32, buffer_id: u32) -> Vec<u8> {
    const OFPAT_OUTPUT: u16 = 0;
    let mut body = Vec::with_capacity(8 + 8);
    body.extend_from_slice(&buffer_id.to_be_bytes());
    body.extend_from_slice(&OFPP_NONE.to_be_bytes()); // in_port
    body.extend_from_slice(&8u16.to_be_bytes()); // actions_len
    body.extend_from_slice(&OFPAT_OUTPUT.to_be_bytes());
    body.extend_from_slice(&8u16.to_be_bytes()); // action len
    body.extend_from_slice(&SWITCH_PORT.to_be_bytes()); // out port
    body.extend_from_slice(&0u16.to_be_bytes()); // max_len
    frame(MsgType::PacketOut, xid, &body)
}

/// FLOW_MOD installing a flow for `buffer_id`, as a controller responds to
/// a packet-in. Match and timeouts stay zeroed; the harness never models a
/// flow table. Used by the mock-controller side.
pub fn flow_mod(xid: u32, buffer_id: u32) -> Vec<u8> {
    let mut body = vec![0u8; 64];
    // match(40) cookie(8) command(2) idle(2) hard(2) priority(2)
    // buffer_id(4) out_port(2) flags(2); command 0 is OFPFC_ADD.
    body[56..60].copy_from_slice(&buffer_id.to_be_bytes());
    body[60..62].copy_from_slice(&OFPP_NONE.to_be_bytes());
    frame(MsgType::FlowMod, xid, &body)
}
