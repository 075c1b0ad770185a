//! Minimal MPEG-TS demuxer for the UI video stream.
//!
//! The stream carries a single program whose first video elementary stream
//! is selected; audio streams are ignored. PAT and PMT are parsed just far
//! enough to find that stream, then PES packets are reassembled into access
//! units with their PTS/DTS and the adaptation field's random-access
//! indicator.

use bytes::{Bytes, BytesMut};
use tracing::{debug, trace};

/// Transport packet size.
pub(crate) const TS_PACKET_SIZE: usize = 188;

const TS_SYNC_BYTE: u8 = 0x47;
const PID_PAT: u16 = 0x0000;

/// `stream_type` of H.264 in the PMT.
pub(crate) const STREAM_TYPE_H264: u8 = 0x1b;

/// Video `stream_type` values the demuxer will select.
const VIDEO_STREAM_TYPES: [u8; 5] = [
    0x01, // MPEG-1 video
    0x02, // MPEG-2 video
    0x10, // MPEG-4 part 2
    STREAM_TYPE_H264,
    0x24, // HEVC
];

/// One reassembled PES access unit from the selected video stream.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EsFrame {
    /// Presentation timestamp in 90 kHz ticks.
    pub pts: i64,
    /// Decode timestamp; equals `pts` when the PES carried no DTS.
    pub dts: i64,
    /// Random-access indicator from the adaptation field.
    pub random_access: bool,
    pub data: Bytes,
}

/// Incremental demuxer; feed arbitrary chunks, collect [`EsFrame`]s.
#[derive(Debug, Default)]
pub(crate) struct TsDemuxer {
    buf: BytesMut,
    pmt_pid: Option<u16>,
    video_pid: Option<u16>,
    video_stream_type: Option<u8>,

    // PES reassembly state for the selected stream.
    in_pes: bool,
    pes: BytesMut,
    pes_pts: i64,
    pes_dts: i64,
    pes_random_access: bool,
}

impl TsDemuxer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected stream's PMT `stream_type`, once the PMT has been seen.
    pub fn video_stream_type(&self) -> Option<u8> {
        self.video_stream_type
    }

    /// Feed a chunk; completed access units are appended to `out`.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<EsFrame>) {
        self.buf.extend_from_slice(chunk);

        loop {
            // Resynchronize if needed.
            if let Some(skip) = self.buf.iter().position(|&b| b == TS_SYNC_BYTE) {
                if skip > 0 {
                    debug!(skipped = skip, "resynchronizing transport stream");
                    let _ = self.buf.split_to(skip);
                }
            } else {
                self.buf.clear();
                return;
            }
            if self.buf.len() < TS_PACKET_SIZE {
                return;
            }
            let packet = self.buf.split_to(TS_PACKET_SIZE);
            self.handle_packet(&packet, out);
        }
    }

    /// Flush the trailing access unit at end of stream.
    pub fn finish(&mut self, out: &mut Vec<EsFrame>) {
        self.flush_pes(out);
    }

    fn handle_packet(&mut self, packet: &[u8], out: &mut Vec<EsFrame>) {
        if packet[1] & 0x80 != 0 {
            trace!("dropping transport packet with error indicator");
            return;
        }
        let pusi = packet[1] & 0x40 != 0;
        let pid = u16::from(packet[1] & 0x1f) << 8 | u16::from(packet[2]);
        let adaptation_control = (packet[3] >> 4) & 0x03;

        let mut payload_start = 4;
        let mut random_access = false;
        if adaptation_control & 0b10 != 0 {
            let af_len = usize::from(packet[4]);
            if af_len > 0 && packet.len() > 5 {
                random_access = packet[5] & 0x40 != 0;
            }
            payload_start = 5 + af_len;
        }
        if adaptation_control & 0b01 == 0 || payload_start >= packet.len() {
            return;
        }
        let payload = &packet[payload_start..];

        if pid == PID_PAT {
            self.parse_pat(payload, pusi);
        } else if Some(pid) == self.pmt_pid {
            self.parse_pmt(payload, pusi);
        } else if Some(pid) == self.video_pid {
            if pusi {
                self.flush_pes(out);
                self.start_pes(payload, random_access);
            } else if self.in_pes {
                self.pes.extend_from_slice(payload);
            }
        }
    }

    fn parse_pat(&mut self, payload: &[u8], pusi: bool) {
        let Some(table) = psi_table(payload, pusi, 0x00) else {
            return;
        };
        // Entries sit between the 8-byte section header and the 4-byte CRC.
        let section_length = usize::from(table[1] & 0x0f) << 8 | usize::from(table[2]);
        let end = (3 + section_length).saturating_sub(4).min(table.len());
        let mut i = 8;
        while i + 4 <= end {
            let program = u16::from(table[i]) << 8 | u16::from(table[i + 1]);
            let pid = u16::from(table[i + 2] & 0x1f) << 8 | u16::from(table[i + 3]);
            if program != 0 {
                if self.pmt_pid != Some(pid) {
                    debug!(pmt_pid = pid, "selected program map");
                }
                self.pmt_pid = Some(pid);
                return;
            }
            i += 4;
        }
    }

    fn parse_pmt(&mut self, payload: &[u8], pusi: bool) {
        if self.video_pid.is_some() {
            return;
        }
        let Some(table) = psi_table(payload, pusi, 0x02) else {
            return;
        };
        let section_length = usize::from(table[1] & 0x0f) << 8 | usize::from(table[2]);
        let end = (3 + section_length).saturating_sub(4).min(table.len());
        if table.len() < 12 {
            return;
        }
        let program_info_length = usize::from(table[10] & 0x0f) << 8 | usize::from(table[11]);
        let mut i = 12 + program_info_length;
        while i + 5 <= end {
            let stream_type = table[i];
            let es_pid = u16::from(table[i + 1] & 0x1f) << 8 | u16::from(table[i + 2]);
            let es_info_length = usize::from(table[i + 3] & 0x0f) << 8 | usize::from(table[i + 4]);
            if VIDEO_STREAM_TYPES.contains(&stream_type) {
                debug!(es_pid, stream_type, "selected video stream");
                self.video_pid = Some(es_pid);
                self.video_stream_type = Some(stream_type);
                return;
            }
            i += 5 + es_info_length;
        }
    }

    fn start_pes(&mut self, payload: &[u8], random_access: bool) {
        // packet_start_code_prefix, stream_id, PES_packet_length,
        // two flag bytes, PES_header_data_length.
        if payload.len() < 9 || payload[0] != 0 || payload[1] != 0 || payload[2] != 1 {
            trace!("ignoring malformed PES start");
            return;
        }
        let flags = payload[7];
        let header_len = usize::from(payload[8]);
        let mut pts = 0;
        let mut dts;
        let ts_area = &payload[9..];

        if flags & 0x80 != 0 && ts_area.len() >= 5 {
            pts = parse_timestamp(&ts_area[..5]);
        }
        dts = pts;
        if flags & 0x40 != 0 && ts_area.len() >= 10 {
            dts = parse_timestamp(&ts_area[5..10]);
        }

        let data_start = 9 + header_len;
        if data_start > payload.len() {
            trace!("PES header exceeds packet payload");
            return;
        }

        self.in_pes = true;
        self.pes_pts = pts;
        self.pes_dts = dts;
        self.pes_random_access = random_access;
        self.pes.clear();
        self.pes.extend_from_slice(&payload[data_start..]);
    }

    fn flush_pes(&mut self, out: &mut Vec<EsFrame>) {
        if self.in_pes && !self.pes.is_empty() {
            out.push(EsFrame {
                pts: self.pes_pts,
                dts: self.pes_dts,
                random_access: self.pes_random_access,
                data: self.pes.split().freeze(),
            });
        }
        self.in_pes = false;
    }
}

/// Strip the pointer field from a PSI payload and check the table id.
fn psi_table(payload: &[u8], pusi: bool, table_id: u8) -> Option<&[u8]> {
    if !pusi || payload.is_empty() {
        return None;
    }
    let pointer = usize::from(payload[0]);
    let table = payload.get(1 + pointer..)?;
    if table.first() != Some(&table_id) || table.len() < 8 {
        return None;
    }
    Some(table)
}

/// 33-bit PTS/DTS from the 5-byte marker-bit encoding.
fn parse_timestamp(b: &[u8]) -> i64 {
    (i64::from(b[0] & 0x0e) << 29)
        | (i64::from(b[1]) << 22)
        | (i64::from(b[2] & 0xfe) << 14)
        | (i64::from(b[3]) << 7)
        | (i64::from(b[4]) >> 1)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
