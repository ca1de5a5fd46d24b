//! SLIP framing for OSC-over-TCP: a frame delimiter plus byte-stuffing so a
//! stream of packets can be split back into discrete messages.

const END: u8 = 0xC0;
const ESC: u8 = 0xDB;
const ESC_END: u8 = 0xDC;
const ESC_ESC: u8 = 0xDD;

/// Wrap `packet` in a double-ended SLIP frame, escaping any literal `0xC0`/`0xDB`
/// bytes inside it.
pub fn encode_frame(packet: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packet.len() + 4);
    out.push(END);
    for &b in packet {
        match b {
            END => {
                out.push(ESC);
                out.push(ESC_END);
            }
            ESC => {
                out.push(ESC);
                out.push(ESC_ESC);
            }
            _ => out.push(b),
        }
    }
    out.push(END);
    out
}

/// Incremental SLIP decoder for a TCP byte stream: feed arbitrary chunks in,
/// drain completed frames out. Frames with no content (an empty `END`..`END`
/// run, e.g. from back-to-back delimiters) are discarded rather than emitted.
#[derive(Default)]
pub struct SlipDecoder {
    current: Vec<u8>,
    escaped: bool,
}

impl SlipDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes, appending any fully decoded frames to `out`.
    pub fn feed(&mut self, chunk: &[u8], out: &mut Vec<Vec<u8>>) {
        for &b in chunk {
            if self.escaped {
                self.escaped = false;
                match b {
                    ESC_END => self.current.push(END),
                    ESC_ESC => self.current.push(ESC),
                    other => self.current.push(other),
                }
                continue;
            }
            match b {
                END => {
                    if !self.current.is_empty() {
                        out.push(std::mem::take(&mut self.current));
                    }
                }
                ESC => self.escaped = true,
                other => self.current.push(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_packet_containing_frame_bytes() {
        let packet = vec![0x01, END, 0x02, ESC, 0x03];
        let framed = encode_frame(&packet);
        let mut decoder = SlipDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&framed, &mut out);
        assert_eq!(out, vec![packet]);
    }

    #[test]
    fn decodes_multiple_frames_fed_across_several_chunks() {
        let a = encode_frame(&[1, 2, 3]);
        let b = encode_frame(&[4, 5]);
        let mut combined = a;
        combined.extend_from_slice(&b);

        let mut decoder = SlipDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&combined[..3], &mut out);
        decoder.feed(&combined[3..], &mut out);

        assert_eq!(out, vec![vec![1, 2, 3], vec![4, 5]]);
    }

    #[test]
    fn back_to_back_delimiters_produce_no_empty_frame() {
        let mut decoder = SlipDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[END, END, END], &mut out);
        assert!(out.is_empty());
    }
}
