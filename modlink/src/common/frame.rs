use crate::codec::MAX_PDU_LENGTH;
use crate::common::buffer::ReadBuffer;
use crate::common::phys::PhysLayer;
use crate::decode::DecodeLevel;
use crate::error::RequestError;
use crate::types::UnitId;

/// Transaction identifier carried in the MBAP header
///
/// The counter wraps from 0xFFFF back to 0x0000.
#[derive(PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Debug, Hash, Default)]
pub struct TxId {
    value: u16,
}

impl TxId {
    /// wrap a raw transaction id
    pub const fn new(value: u16) -> Self {
        TxId { value }
    }

    /// raw value of the id
    pub const fn to_u16(self) -> u16 {
        self.value
    }

    /// the id that follows this one
    pub(crate) fn successor(self) -> TxId {
        TxId::new(self.value.wrapping_add(1))
    }

    /// advance the counter, returning the value it held
    pub(crate) fn next(&mut self) -> TxId {
        let ret = *self;
        *self = self.successor();
        ret
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#06X}", self.value)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct FrameHeader {
    pub(crate) unit_id: UnitId,
    pub(crate) tx_id: TxId,
}

impl FrameHeader {
    pub(crate) fn new(unit_id: UnitId, tx_id: TxId) -> Self {
        FrameHeader { unit_id, tx_id }
    }
}

pub(crate) struct Frame {
    pub(crate) header: FrameHeader,
    length: usize,
    pdu: [u8; MAX_PDU_LENGTH],
}

impl Frame {
    pub(crate) fn new(header: FrameHeader) -> Frame {
        Frame {
            header,
            length: 0,
            pdu: [0; MAX_PDU_LENGTH],
        }
    }

    pub(crate) fn set(&mut self, src: &[u8]) -> bool {
        match self.pdu.get_mut(0..src.len()) {
            Some(dest) => {
                dest.copy_from_slice(src);
                self.length = src.len();
                true
            }
            None => false,
        }
    }

    pub(crate) fn payload(&self) -> &[u8] {
        &self.pdu[0..self.length]
    }
}

/// Reads complete frames from a byte stream
pub(crate) trait FrameParser {
    fn max_frame_size(&self) -> usize;

    /// Parse bytes from the buffer. Consumed bytes can be discarded.
    ///
    /// Err implies the input data is invalid and the stream cannot be resynchronized
    /// Ok(None) implies that more data is required to complete parsing
    /// Ok(Some(..)) is a fully parsed frame
    fn parse(&mut self, buffer: &mut ReadBuffer) -> Result<Option<Frame>, RequestError>;

    fn reset(&mut self);
}

pub(crate) struct FramedReader<T>
where
    T: FrameParser,
{
    parser: T,
    buffer: ReadBuffer,
}

impl<T: FrameParser> FramedReader<T> {
    pub(crate) fn new(parser: T) -> Self {
        let size = parser.max_frame_size();
        Self {
            parser,
            buffer: ReadBuffer::new(size),
        }
    }

    /// drop partial frames when the connection is replaced
    pub(crate) fn reset(&mut self) {
        self.parser.reset();
        self.buffer.clear();
    }

    /// Cancel-safe: partial data stays buffered if the future is dropped
    pub(crate) async fn next_frame(
        &mut self,
        io: &mut PhysLayer,
        decode_level: DecodeLevel,
    ) -> Result<Frame, RequestError> {
        loop {
            match self.parser.parse(&mut self.buffer)? {
                Some(frame) => return Ok(frame),
                None => {
                    self.buffer.read_some(io, decode_level.physical).await?;
                }
            }
        }
    }
}
