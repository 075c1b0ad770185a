//! H.264 Annex-B bitstream assembly.
//!
//! The demuxed elementary stream is re-framed so every NAL unit sits behind
//! a 4-byte start code, with the stream's SPS and PPS captured once and
//! prepended before every key frame. Players fed from the middle of the
//! stream can then start decoding at any key frame.

use bytes::{BufMut, Bytes, BytesMut};

/// 4-byte Annex-B start code.
pub(crate) const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

const NAL_IDR: u8 = 5;
const NAL_SPS: u8 = 7;
const NAL_PPS: u8 = 8;

/// NAL unit type from the first byte after the start code.
fn nal_type(nal: &[u8]) -> u8 {
    nal.first().map_or(0, |b| b & 0x1f)
}

/// Split an elementary stream into NAL units, tolerating both 3- and 4-byte
/// start codes.
pub(crate) fn split_nal_units(es: &[u8]) -> Vec<&[u8]> {
    let mut units = Vec::new();
    let mut start = None;
    let mut i = 0;
    while i + 2 < es.len() {
        if es[i] == 0 && es[i + 1] == 0 && es[i + 2] == 1 {
            let code_start = if i > 0 && es[i - 1] == 0 { i - 1 } else { i };
            if let Some(s) = start {
                units.push(&es[s..code_start]);
            }
            start = Some(i + 3);
            i += 3;
        } else {
            i += 1;
        }
    }
    if let Some(s) = start {
        units.push(&es[s..]);
    }
    units
}

/// Output of one [`H264Assembler::assemble`] call.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct AssembledFrame {
    /// SPS+PPS codec configuration, emitted once when first known.
    pub config: Option<Bytes>,
    /// The access unit in Annex-B form, absent when the ES carried only
    /// parameter sets.
    pub frame: Option<Bytes>,
    /// Whether the access unit contains an IDR slice.
    pub is_key_frame: bool,
}

/// Stateful Annex-B re-framer for one H.264 stream.
#[derive(Debug, Default)]
pub(crate) struct H264Assembler {
    sps: Option<Bytes>,
    pps: Option<Bytes>,
    config_sent: bool,
}

impl H264Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-frame one demuxed access unit.
    ///
    /// In-band SPS/PPS are captured rather than re-emitted; key frames get
    /// the captured parameter sets prepended instead, so every key frame
    /// starts with SPS then PPS.
    pub fn assemble(&mut self, es: &[u8]) -> AssembledFrame {
        let mut body = BytesMut::new();
        let mut is_key_frame = false;

        for nal in split_nal_units(es) {
            match nal_type(nal) {
                NAL_SPS => self.sps = Some(Bytes::copy_from_slice(nal)),
                NAL_PPS => self.pps = Some(Bytes::copy_from_slice(nal)),
                t => {
                    if t == NAL_IDR {
                        is_key_frame = true;
                    }
                    body.put_slice(&START_CODE);
                    body.put_slice(nal);
                }
            }
        }

        let config = if !self.config_sent && self.sps.is_some() && self.pps.is_some() {
            self.config_sent = true;
            Some(self.parameter_sets())
        } else {
            None
        };

        let frame = if body.is_empty() {
            None
        } else if is_key_frame {
            let mut framed = BytesMut::new();
            framed.put(self.parameter_sets());
            framed.put(body);
            Some(framed.freeze())
        } else {
            Some(body.freeze())
        };

        AssembledFrame {
            config,
            frame,
            is_key_frame,
        }
    }

    /// Captured SPS+PPS behind start codes (empty pieces skipped until seen).
    fn parameter_sets(&self) -> Bytes {
        let mut out = BytesMut::new();
        for ps in [&self.sps, &self.pps].into_iter().flatten() {
            out.put_slice(&START_CODE);
            out.put_slice(ps);
        }
        out.freeze()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
