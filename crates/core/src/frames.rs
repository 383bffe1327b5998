/// 20 ms of 8 kHz µ-law, the frame size Twilio media streams expect.
pub const DEFAULT_FRAME_SIZE: usize = 160;

/// Repacks arbitrarily sized audio chunks into fixed-size frames.
///
/// Bytes that do not fill a frame are carried over to the next `push`.
#[derive(Debug)]
pub struct FrameAligner {
    frame_size: usize,
    remainder: Vec<u8>,
}

impl Default for FrameAligner {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_SIZE)
    }
}

impl FrameAligner {
    pub fn new(frame_size: usize) -> Self {
        Self {
            frame_size: frame_size.max(1),
            remainder: Vec::with_capacity(frame_size),
        }
    }

    pub fn push(&mut self, audio: &[u8]) -> Vec<Vec<u8>> {
        self.remainder.extend_from_slice(audio);
        let full = self.remainder.len() / self.frame_size * self.frame_size;
        let ready: Vec<u8> = self.remainder.drain(..full).collect();
        ready.chunks(self.frame_size).map(<[u8]>::to_vec).collect()
    }

    /// Emit whatever is left as one short frame.
    pub fn flush(&mut self) -> Option<Vec<u8>> {
        if self.remainder.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.remainder))
        }
    }

    /// Drop buffered bytes, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let discarded = self.remainder.len();
        self.remainder.clear();
        discarded
    }

    pub fn buffered(&self) -> usize {
        self.remainder.len()
    }
}
