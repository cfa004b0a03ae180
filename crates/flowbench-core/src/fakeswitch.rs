//! The fake OpenFlow 1.0 switch.
//!
//! One instance per controller connection. The switch answers
//! controller-initiated traffic at all times, walks the handshake state
//! machine, optionally primes the controller's MAC table, then generates
//! the measured packet-in workload:
//!
//! ```text
//! Started ──features_request──▶ LearnDsts ──barrier_reply──▶ ReadyToSend
//!    │                             (Waiting in between)          ▲
//!    └────────────── learn-dst-macs off ───────────────────────┘
//! ```
//!
//! The switch is generic over its connection so the state machine can be
//! driven by scripted in-memory connections in tests; the worker
//! instantiates it with `mio::net::TcpStream`.
//!
//! Buffer discipline: only whole frames enter `outbuf`, and the generator
//! stops when headroom drops below one packet-in message. An `inbuf` that
//! can never parse again is a fatal protocol desync.

use std::io::{self, Read, Write};

use log::{debug, trace};

use crate::config::Mode;
use crate::error::BenchError;
use crate::msgbuf::MsgBuf;
use crate::payload;
use crate::wire::{self, MsgType, OfpHeader, PeekError};

/// Complete size of one generated packet-in message.
pub const PROBE_MSG_LEN: usize =
    wire::OFP_HEADER_LEN + wire::PACKET_IN_FIXED_LEN + payload::FRAME_LEN;

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchState {
    /// Handshake in progress: HELLO queued, features_reply not yet sent.
    Started,
    /// Emitting one priming ARP per candidate destination MAC.
    LearnDsts,
    /// All priming frames queued; waiting for the barrier reply.
    Waiting,
    /// Measurement generator active.
    ReadyToSend,
}

/// What one `handle_io` call observed, for the worker's bookkeeping.
#[derive(Debug, Default, Clone, Copy)]
pub struct IoOutcome {
    /// The switch left `Started` during this call.
    pub initialized: bool,
}

pub struct FakeSwitch<S> {
    conn: S,
    dpid: u64,
    state: SwitchState,
    mode: Mode,
    inbuf: MsgBuf,
    outbuf: MsgBuf,
    /// PACKET_OUT/FLOW_MOD responses seen this window.
    count: u64,
    total_mac_addresses: u32,
    current_mac_address: u32,
    current_buffer_id: u32,
    /// Latency: 0 = may send, 1 = probe outstanding.
    /// Throughput: outstanding probe estimate (saturating).
    probe_state: u32,
    xid: u32,
    learn_dst_macs: bool,
    /// Priming frames still to queue while in `LearnDsts`.
    macs_to_learn: u32,
    /// Kernel accepted our last write; cleared when a write would block.
    writable: bool,
}

impl<S: Read + Write> FakeSwitch<S> {
    pub fn new(
        dpid: u64,
        conn: S,
        mode: Mode,
        total_mac_addresses: u32,
        learn_dst_macs: bool,
    ) -> Self {
        let mut sw = Self {
            conn,
            dpid,
            state: SwitchState::Started,
            mode,
            inbuf: MsgBuf::new(),
            outbuf: MsgBuf::new(),
            count: 0,
            total_mac_addresses,
            current_mac_address: 0,
            current_buffer_id: 0,
            probe_state: 0,
            xid: 0,
            learn_dst_macs,
            macs_to_learn: 0,
            writable: false,
        };
        // HELLO goes out as the very first frame after connect.
        let hello = wire::hello(sw.next_xid());
        sw.outbuf.push(&hello);
        sw
    }

    pub fn dpid(&self) -> u64 {
        self.dpid
    }

    pub fn state(&self) -> SwitchState {
        self.state
    }

    /// Bytes queued for the controller; drives WRITABLE interest re-arming.
    pub fn outbuf_len(&self) -> usize {
        self.outbuf.len()
    }

    /// The underlying connection, for readiness (re-)registration.
    pub fn conn_mut(&mut self) -> &mut S {
        &mut self.conn
    }

    /// Harvest and reset the window's response count.
    pub fn take_count(&mut self) -> u64 {
        std::mem::take(&mut self.count)
    }

    fn next_xid(&mut self) -> u32 {
        self.xid = self.xid.wrapping_add(1);
        self.xid
    }

    /// Handle readiness events on the connection. `gate_open` permits
    /// measurement packet-in generation.
    pub fn handle_io(
        &mut self,
        readable: bool,
        writable: bool,
        gate_open: bool,
    ) -> Result<IoOutcome, BenchError> {
        let mut outcome = IoOutcome::default();
        if writable {
            self.writable = true;
        }
        if readable {
            let fill = self.inbuf.fill_from(&mut self.conn)?;
            if fill.bytes > 0 {
                self.parse_inbuf(&mut outcome)?;
            }
            if fill.closed {
                return Err(BenchError::Io(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("controller closed connection to switch {:#x}", self.dpid),
                )));
            }
        }
        self.pump_write(gate_open)?;
        Ok(outcome)
    }

    /// Run the workload generator and flush queued frames. Also called by
    /// the worker when the measurement gate opens, so generation starts
    /// without waiting for a readiness event.
    pub fn pump_write(&mut self, gate_open: bool) -> Result<(), BenchError> {
        // Two rounds: flushing can free the headroom generation needed.
        for _ in 0..2 {
            let queued = self.generate(gate_open);
            let flushed = self.flush()?;
            if queued == 0 || flushed == 0 {
                break;
            }
        }
        Ok(())
    }

    /// Queue workload frames into `outbuf` as state and headroom allow.
    /// Returns the number of frames queued.
    fn generate(&mut self, gate_open: bool) -> usize {
        match self.state {
            SwitchState::LearnDsts => self.generate_priming(),
            SwitchState::ReadyToSend if gate_open => match self.mode {
                Mode::Latency => {
                    if self.probe_state == 0 && self.queue_probe() {
                        self.probe_state = 1;
                        1
                    } else {
                        0
                    }
                }
                Mode::Throughput => {
                    let mut queued = 0;
                    while self.outbuf.headroom() >= PROBE_MSG_LEN {
                        if !self.queue_probe() {
                            break;
                        }
                        self.probe_state = self.probe_state.saturating_add(1);
                        queued += 1;
                    }
                    queued
                }
            },
            _ => 0,
        }
    }

    /// Emit priming ARPs until done or out of headroom, then the barrier
    /// that closes the phase.
    fn generate_priming(&mut self) -> usize {
        let mut queued = 0;
        while self.macs_to_learn > 0 {
            if self.outbuf.headroom() < PROBE_MSG_LEN {
                return queued;
            }
            let index = self.total_mac_addresses - self.macs_to_learn;
            let frame = payload::arp_reply_frame(payload::learned_dst_mac(self.dpid, index));
            self.current_buffer_id = self.current_buffer_id.wrapping_add(1);
            let msg = wire::packet_in(self.next_xid(), self.current_buffer_id, &frame);
            if !self.outbuf.push(&msg) {
                return queued;
            }
            self.macs_to_learn -= 1;
            queued += 1;
        }
        let barrier = wire::barrier_request(self.next_xid());
        if self.outbuf.push(&barrier) {
            self.state = SwitchState::Waiting;
            debug!(
                "switch {:#x}: {} priming arps queued, barrier sent",
                self.dpid, self.total_mac_addresses
            );
            queued += 1;
        }
        queued
    }

    /// Queue one measurement packet-in. Returns false when out of headroom.
    fn queue_probe(&mut self) -> bool {
        if self.outbuf.headroom() < PROBE_MSG_LEN {
            return false;
        }
        let index = self.current_mac_address % self.total_mac_addresses;
        self.current_mac_address = self.current_mac_address.wrapping_add(1);
        let frame = payload::measurement_frame(
            payload::probe_src_mac(self.dpid, index),
            payload::learned_dst_mac(self.dpid, index),
        );
        self.current_buffer_id = self.current_buffer_id.wrapping_add(1);
        let msg = wire::packet_in(self.next_xid(), self.current_buffer_id, &frame);
        self.outbuf.push(&msg)
    }

    /// Flush `outbuf` while the kernel accepts bytes.
    fn flush(&mut self) -> Result<usize, BenchError> {
        if self.outbuf.is_empty() || !self.writable {
            return Ok(0);
        }
        let n = self.outbuf.drain_to(&mut self.conn)?;
        if !self.outbuf.is_empty() {
            // kernel stopped short of draining us: wait for writability
            self.writable = false;
        }
        Ok(n)
    }

    /// Consume every complete message queued in `inbuf`.
    fn parse_inbuf(&mut self, outcome: &mut IoOutcome) -> Result<(), BenchError> {
        loop {
            let header = match OfpHeader::peek(self.inbuf.data()) {
                Ok(h) => h,
                Err(PeekError::Truncated) => return Ok(()), // wait for more bytes
                Err(PeekError::Invalid) => {
                    return Err(BenchError::ProtocolDesync(format!(
                        "switch {:#x}: bad header {:02x?}",
                        self.dpid,
                        &self.inbuf.data()[..self.inbuf.data().len().min(8)]
                    )));
                }
            };
            let total_len = header.length as usize;
            if self.inbuf.len() < total_len {
                if self.inbuf.headroom() == 0 {
                    return Err(BenchError::ProtocolDesync(format!(
                        "switch {:#x}: {}-byte message exceeds receive buffer",
                        self.dpid, total_len
                    )));
                }
                return Ok(()); // whole message not here yet
            }
            self.dispatch(header, total_len, outcome);
        }
    }

    /// Act on one complete message and consume it from `inbuf`.
    fn dispatch(&mut self, header: OfpHeader, total_len: usize, outcome: &mut IoOutcome) {
        match MsgType::from_u8(header.msg_type) {
            Some(MsgType::FeaturesRequest) => {
                self.inbuf.consume(total_len);
                let reply = wire::features_reply(header.xid, self.dpid);
                self.outbuf.push(&reply);
                if self.state == SwitchState::Started {
                    outcome.initialized = true;
                    if self.learn_dst_macs && self.total_mac_addresses > 0 {
                        self.macs_to_learn = self.total_mac_addresses;
                        self.state = SwitchState::LearnDsts;
                        debug!(
                            "switch {:#x}: initialized, learning {} destination macs",
                            self.dpid, self.total_mac_addresses
                        );
                    } else {
                        self.state = SwitchState::ReadyToSend;
                        debug!("switch {:#x}: initialized, ready to send", self.dpid);
                    }
                }
            }
            Some(MsgType::EchoRequest) => {
                let body = self.inbuf.data()[wire::OFP_HEADER_LEN..total_len].to_vec();
                self.inbuf.consume(total_len);
                let reply = wire::echo_reply(header.xid, &body);
                self.outbuf.push(&reply);
            }
            Some(MsgType::GetConfigRequest) => {
                self.inbuf.consume(total_len);
                let reply = wire::get_config_reply(header.xid);
                self.outbuf.push(&reply);
            }
            Some(MsgType::StatsRequest) => {
                let kind = if total_len >= wire::OFP_HEADER_LEN + 2 {
                    let d = self.inbuf.data();
                    u16::from_be_bytes([d[8], d[9]])
                } else {
                    0
                };
                self.inbuf.consume(total_len);
                let reply = wire::stats_reply(header.xid, kind);
                self.outbuf.push(&reply);
            }
            Some(MsgType::Vendor) => {
                self.inbuf.consume(total_len);
                let reply = wire::vendor_reply(header.xid);
                self.outbuf.push(&reply);
            }
            Some(MsgType::BarrierRequest) => {
                self.inbuf.consume(total_len);
                let reply = wire::barrier_reply(header.xid);
                self.outbuf.push(&reply);
            }
            Some(MsgType::BarrierReply) => {
                self.inbuf.consume(total_len);
                if self.state == SwitchState::Waiting {
                    self.state = SwitchState::ReadyToSend;
                    debug!("switch {:#x}: priming barrier answered, ready to send", self.dpid);
                }
            }
            Some(MsgType::PacketOut) => {
                self.inbuf.consume(total_len);
                match self.state {
                    SwitchState::ReadyToSend => self.record_response(),
                    SwitchState::LearnDsts | SwitchState::Waiting => self.count += 1,
                    SwitchState::Started => {}
                }
            }
            Some(MsgType::FlowMod) => {
                self.inbuf.consume(total_len);
                if self.state == SwitchState::ReadyToSend {
                    self.record_response();
                }
            }
            Some(other) => {
                // HELLO, SET_CONFIG, ERROR and everything else the harness
                // does not interpret
                trace!("switch {:#x}: consuming {:?}", self.dpid, other);
                self.inbuf.consume(total_len);
            }
            None => {
                trace!(
                    "switch {:#x}: consuming unknown message type {}",
                    self.dpid, header.msg_type
                );
                self.inbuf.consume(total_len);
            }
        }
    }

    fn record_response(&mut self) {
        self.count += 1;
        match self.mode {
            Mode::Latency => self.probe_state = 0,
            Mode::Throughput => self.probe_state = self.probe_state.saturating_sub(1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Scripted in-memory connection
    // -----------------------------------------------------------------------

    /// Acts like a non-blocking socket: scripted input, captured output,
    /// WouldBlock when the script runs dry.
    struct TestConn {
        input: Vec<u8>,
        read_pos: usize,
        closed: bool,
        output: Vec<u8>,
    }

    impl TestConn {
        fn new() -> Self {
            Self {
                input: Vec::new(),
                read_pos: 0,
                closed: false,
                output: Vec::new(),
            }
        }
    }

    impl Read for TestConn {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            let remaining = &self.input[self.read_pos..];
            if remaining.is_empty() {
                if self.closed {
                    return Ok(0);
                }
                return Err(io::Error::from(io::ErrorKind::WouldBlock));
            }
            let n = remaining.len().min(out.len());
            out[..n].copy_from_slice(&remaining[..n]);
            self.read_pos += n;
            Ok(n)
        }
    }

    impl Write for TestConn {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            self.output.extend_from_slice(data);
            Ok(data.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn new_switch(mode: Mode, macs: u32, learn: bool) -> FakeSwitch<TestConn> {
        FakeSwitch::new(0x2a, TestConn::new(), mode, macs, learn)
    }

    /// Split captured output into (type, xid, frame) triples.
    fn sent_frames(sw: &FakeSwitch<TestConn>) -> Vec<(u8, u32, Vec<u8>)> {
        let mut frames = Vec::new();
        let bytes = &sw.conn.output;
        let mut at = 0;
        while at < bytes.len() {
            let h = OfpHeader::peek(&bytes[at..]).expect("well-formed output");
            let len = h.length as usize;
            frames.push((h.msg_type, h.xid, bytes[at..at + len].to_vec()));
            at += len;
        }
        frames
    }

    fn feed(sw: &mut FakeSwitch<TestConn>, msg: &[u8]) {
        sw.conn.input.extend_from_slice(msg);
    }

    fn drive(sw: &mut FakeSwitch<TestConn>, gate_open: bool) -> IoOutcome {
        sw.handle_io(true, true, gate_open).expect("io ok")
    }

    // -----------------------------------------------------------------------
    // Handshake
    // -----------------------------------------------------------------------

    #[test]
    fn hello_is_first_frame_out() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        drive(&mut sw, false);
        let frames = sent_frames(&sw);
        assert_eq!(frames[0].0, MsgType::Hello as u8);
    }

    #[test]
    fn features_request_initializes_switch() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        feed(&mut sw, &wire::features_request(0x1111));
        let outcome = drive(&mut sw, false);

        assert!(outcome.initialized);
        assert_eq!(sw.state(), SwitchState::ReadyToSend);
        let frames = sent_frames(&sw);
        let reply = frames
            .iter()
            .find(|f| f.0 == MsgType::FeaturesReply as u8)
            .expect("features reply sent");
        assert_eq!(reply.1, 0x1111, "xid preserved");
        // dpid announced in the reply body
        assert_eq!(&reply.2[8..16], &0x2au64.to_be_bytes());
    }

    #[test]
    fn features_request_reported_initialized_once() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        feed(&mut sw, &wire::features_request(1));
        assert!(drive(&mut sw, false).initialized);
        feed(&mut sw, &wire::features_request(2));
        assert!(!drive(&mut sw, false).initialized);
    }

    // -----------------------------------------------------------------------
    // Control-message replies (any state)
    // -----------------------------------------------------------------------

    #[test]
    fn echo_reply_preserves_xid_and_body() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        let mut echo = wire::echo_reply(0xabcd, b"payload");
        echo[1] = MsgType::EchoRequest as u8; // same layout, request type
        feed(&mut sw, &echo);
        drive(&mut sw, false);

        let frames = sent_frames(&sw);
        let reply = frames
            .iter()
            .find(|f| f.0 == MsgType::EchoReply as u8)
            .expect("echo reply");
        assert_eq!(reply.1, 0xabcd);
        assert_eq!(&reply.2[8..], b"payload");
    }

    #[test]
    fn stats_request_answered_with_matching_kind() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        // desc stats request: header plus type/flags
        let mut req = wire::stats_reply(0x77, 0); // same body layout as a request
        req[1] = MsgType::StatsRequest as u8;
        req[2..4].copy_from_slice(&12u16.to_be_bytes());
        req.truncate(12);
        feed(&mut sw, &req);
        drive(&mut sw, false);

        let frames = sent_frames(&sw);
        let reply = frames
            .iter()
            .find(|f| f.0 == MsgType::StatsReply as u8)
            .expect("stats reply");
        assert_eq!(reply.1, 0x77);
        assert_eq!(reply.2.len(), 8 + 4 + 1056); // desc body
    }

    #[test]
    fn barrier_request_from_controller_is_answered() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        feed(&mut sw, &wire::barrier_request(0x5050));
        drive(&mut sw, false);
        let frames = sent_frames(&sw);
        assert!(
            frames
                .iter()
                .any(|f| f.0 == MsgType::BarrierReply as u8 && f.1 == 0x5050)
        );
    }

    // -----------------------------------------------------------------------
    // Destination-MAC priming
    // -----------------------------------------------------------------------

    #[test]
    fn priming_sends_one_arp_per_mac_then_barrier() {
        let mut sw = new_switch(Mode::Latency, 16, true);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, false);

        assert_eq!(sw.state(), SwitchState::Waiting);
        let frames = sent_frames(&sw);
        let arps: Vec<_> = frames
            .iter()
            .filter(|f| f.0 == MsgType::PacketIn as u8)
            .collect();
        assert_eq!(arps.len(), 16, "one priming packet-in per candidate mac");
        for arp in &arps {
            // ethertype of the embedded frame is ARP
            let packet = &arp.2[8 + wire::PACKET_IN_FIXED_LEN..];
            assert_eq!(&packet[12..14], &0x0806u16.to_be_bytes());
        }
        // the barrier request comes after every priming frame
        let barrier_pos = frames
            .iter()
            .position(|f| f.0 == MsgType::BarrierRequest as u8)
            .expect("barrier request queued");
        let last_arp_pos = frames
            .iter()
            .rposition(|f| f.0 == MsgType::PacketIn as u8)
            .unwrap();
        assert!(barrier_pos > last_arp_pos);

        // no measurement traffic before the barrier reply
        drive(&mut sw, true);
        assert_eq!(
            sent_frames(&sw)
                .iter()
                .filter(|f| f.0 == MsgType::PacketIn as u8)
                .count(),
            16
        );

        // the reply releases the generator
        feed(&mut sw, &wire::barrier_reply(99));
        drive(&mut sw, true);
        assert_eq!(sw.state(), SwitchState::ReadyToSend);
        assert_eq!(
            sent_frames(&sw)
                .iter()
                .filter(|f| f.0 == MsgType::PacketIn as u8)
                .count(),
            17,
            "first measurement probe after priming"
        );
    }

    #[test]
    fn priming_arps_announce_distinct_macs() {
        let mut sw = new_switch(Mode::Latency, 8, true);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, false);

        let frames = sent_frames(&sw);
        let mut macs: Vec<[u8; 6]> = frames
            .iter()
            .filter(|f| f.0 == MsgType::PacketIn as u8)
            .map(|f| {
                let packet = &f.2[8 + wire::PACKET_IN_FIXED_LEN..];
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&packet[6..12]);
                mac
            })
            .collect();
        macs.sort();
        macs.dedup();
        assert_eq!(macs.len(), 8);
    }

    // -----------------------------------------------------------------------
    // Latency mode
    // -----------------------------------------------------------------------

    fn count_probes(sw: &FakeSwitch<TestConn>) -> usize {
        sent_frames(sw)
            .iter()
            .filter(|f| f.0 == MsgType::PacketIn as u8)
            .count()
    }

    #[test]
    fn latency_keeps_one_probe_outstanding() {
        let mut sw = new_switch(Mode::Latency, 100, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);
        assert_eq!(count_probes(&sw), 1);

        // no response yet: repeated pumps add nothing
        drive(&mut sw, true);
        drive(&mut sw, true);
        assert_eq!(count_probes(&sw), 1);

        // a packet-out releases the next probe and counts
        feed(&mut sw, &wire::packet_out(5, 1));
        drive(&mut sw, true);
        assert_eq!(count_probes(&sw), 2);
        assert_eq!(sw.take_count(), 1);
    }

    #[test]
    fn flow_mod_also_counts_as_response() {
        let mut sw = new_switch(Mode::Latency, 100, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);
        feed(&mut sw, &wire::flow_mod(5, 1));
        drive(&mut sw, true);
        assert_eq!(sw.take_count(), 1);
        assert_eq!(count_probes(&sw), 2);
    }

    #[test]
    fn gate_closed_suppresses_generation_but_not_replies() {
        let mut sw = new_switch(Mode::Latency, 100, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, false);
        assert_eq!(count_probes(&sw), 0, "no probes before the gate opens");

        // controller traffic is still answered
        let mut echo = wire::echo_reply(3, &[]);
        echo[1] = MsgType::EchoRequest as u8;
        feed(&mut sw, &echo);
        drive(&mut sw, false);
        assert!(
            sent_frames(&sw)
                .iter()
                .any(|f| f.0 == MsgType::EchoReply as u8)
        );

        // opening the gate starts the workload
        drive(&mut sw, true);
        assert_eq!(count_probes(&sw), 1);
    }

    #[test]
    fn probe_source_macs_rotate_through_the_space() {
        let mut sw = new_switch(Mode::Latency, 3, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);
        for xid in 0..5u32 {
            feed(&mut sw, &wire::packet_out(xid, xid));
            drive(&mut sw, true);
        }
        let frames = sent_frames(&sw);
        let macs: Vec<Vec<u8>> = frames
            .iter()
            .filter(|f| f.0 == MsgType::PacketIn as u8)
            .map(|f| f.2[8 + wire::PACKET_IN_FIXED_LEN + 6..][..6].to_vec())
            .collect();
        assert_eq!(macs.len(), 6);
        // rotation modulus 3: probe i and probe i+3 share a source mac
        assert_eq!(macs[0], macs[3]);
        assert_eq!(macs[1], macs[4]);
        assert_ne!(macs[0], macs[1]);
    }

    // -----------------------------------------------------------------------
    // Throughput mode
    // -----------------------------------------------------------------------

    #[test]
    fn throughput_batches_until_headroom_runs_out() {
        let mut sw = new_switch(Mode::Throughput, 100_000, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);

        let probes = count_probes(&sw);
        // the full buffer minus handshake frames, in whole probe messages
        assert!(probes > 100, "expected a large batch, got {probes}");

        // every response counts without gating on outstanding state
        for xid in 0..10u32 {
            feed(&mut sw, &wire::packet_out(xid, xid));
        }
        drive(&mut sw, true);
        assert_eq!(sw.take_count(), 10);
    }

    #[test]
    fn throughput_outbuf_frames_stay_whole() {
        let mut sw = new_switch(Mode::Throughput, 1000, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);
        // every captured byte parses as a whole frame chain
        let frames = sent_frames(&sw);
        let total: usize = frames.iter().map(|f| f.2.len()).sum();
        assert_eq!(total, sw.conn.output.len());
    }

    // -----------------------------------------------------------------------
    // Failure semantics
    // -----------------------------------------------------------------------

    #[test]
    fn bad_version_is_protocol_desync() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        feed(&mut sw, &[0x04, 0x00, 0x00, 0x08, 0, 0, 0, 1]);
        let err = sw.handle_io(true, true, false).unwrap_err();
        assert!(matches!(err, BenchError::ProtocolDesync(_)), "got {err}");
    }

    #[test]
    fn controller_close_is_fatal_io_error() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        sw.conn.closed = true;
        let err = sw.handle_io(true, true, false).unwrap_err();
        assert!(matches!(err, BenchError::Io(_)), "got {err}");
    }

    #[test]
    fn truncated_message_waits_for_more_bytes() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        let echo = {
            let mut m = wire::echo_reply(7, b"abcdef");
            m[1] = MsgType::EchoRequest as u8;
            m
        };
        feed(&mut sw, &echo[..10]); // header + partial body
        drive(&mut sw, false);
        assert!(
            !sent_frames(&sw)
                .iter()
                .any(|f| f.0 == MsgType::EchoReply as u8)
        );

        feed(&mut sw, &echo[10..]);
        drive(&mut sw, false);
        assert!(
            sent_frames(&sw)
                .iter()
                .any(|f| f.0 == MsgType::EchoReply as u8 && f.1 == 7)
        );
    }

    #[test]
    fn own_packet_in_loops_back_cleanly() {
        // a generated probe fed to the parser is well-formed and consumed
        let mut sw = new_switch(Mode::Latency, 100, false);
        feed(&mut sw, &wire::features_request(1));
        drive(&mut sw, true);
        let probe = sent_frames(&sw)
            .iter()
            .find(|f| f.0 == MsgType::PacketIn as u8)
            .map(|f| f.2.clone())
            .expect("one probe generated");

        feed(&mut sw, &probe);
        let outcome = sw.handle_io(true, true, true);
        assert!(outcome.is_ok());
        assert_eq!(sw.inbuf.len(), 0, "probe fully consumed");
    }

    #[test]
    fn unknown_message_type_consumed_silently() {
        let mut sw = new_switch(Mode::Latency, 10, false);
        // type 42 does not exist in OpenFlow 1.0
        feed(&mut sw, &[0x01, 42, 0x00, 0x0c, 0, 0, 0, 9, 1, 2, 3, 4]);
        let outcome = sw.handle_io(true, true, false);
        assert!(outcome.is_ok());
        assert_eq!(sw.inbuf.len(), 0);
    }
}
