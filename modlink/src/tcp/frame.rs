use crate::codec::response::response_pdu_length;
use crate::codec::MAX_PDU_LENGTH;
use crate::command::Command;
use crate::common::buffer::ReadBuffer;
use crate::common::frame::{Frame, FrameHeader, FrameParser, TxId};
use crate::decode::FrameDecodeLevel;
use crate::error::{FrameParseError, InternalError, RequestError};
use crate::types::UnitId;

pub(crate) mod constants {
    pub(crate) const HEADER_LENGTH: usize = 7;
    pub(crate) const MAX_FRAME_LENGTH: usize = HEADER_LENGTH + crate::codec::MAX_PDU_LENGTH;
    // includes the 1 byte unit id
    pub(crate) const MAX_LENGTH_FIELD: usize = crate::codec::MAX_PDU_LENGTH + 1;
}

#[derive(Clone, Copy)]
struct MbapHeader {
    tx_id: TxId,
    adu_length: usize,
    unit_id: UnitId,
}

impl MbapHeader {
    fn new(
        tx_id: u16,
        protocol_id: u16,
        length: usize,
        unit_id: u8,
    ) -> Result<Self, FrameParseError> {
        if protocol_id != 0 {
            return Err(FrameParseError::UnknownProtocolId(protocol_id));
        }

        if length > constants::MAX_LENGTH_FIELD {
            return Err(FrameParseError::MbapLengthTooBig(
                length,
                constants::MAX_LENGTH_FIELD,
            ));
        }

        // must be > 0 b/c the 1-byte unit identifier counts towards length
        if length == 0 {
            return Err(FrameParseError::MbapLengthZero);
        }

        Ok(MbapHeader {
            tx_id: TxId::new(tx_id),
            adu_length: length - 1,
            unit_id: UnitId::new(unit_id),
        })
    }
}

/// Prefix `payload` with an MBAP header
///
/// The length field counts the unit id plus the payload.
pub fn wrap(payload: &[u8], tx_id: TxId, unit_id: UnitId) -> Result<Vec<u8>, RequestError> {
    if payload.len() > MAX_PDU_LENGTH {
        return Err(InternalError::AduTooBig(payload.len()).into());
    }

    let length = (payload.len() + 1) as u16;
    let mut frame = Vec::with_capacity(constants::HEADER_LENGTH + payload.len());
    frame.extend_from_slice(&tx_id.to_u16().to_be_bytes());
    frame.extend_from_slice(&[0x00, 0x00]);
    frame.extend_from_slice(&length.to_be_bytes());
    frame.push(unit_id.value);
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Validate a complete MBAP frame and split it into its transaction id, unit id and payload
pub fn unwrap(frame: &[u8]) -> Result<(TxId, UnitId, &[u8]), RequestError> {
    let (header, payload) = match frame.get(..constants::HEADER_LENGTH) {
        Some(header) => (header, &frame[constants::HEADER_LENGTH..]),
        None => return Err(FrameParseError::FrameTooShort(frame.len()).into()),
    };

    let header = MbapHeader::new(
        u16::from_be_bytes([header[0], header[1]]),
        u16::from_be_bytes([header[2], header[3]]),
        u16::from_be_bytes([header[4], header[5]]) as usize,
        header[6],
    )?;

    if header.adu_length != payload.len() {
        return Err(FrameParseError::FrameLengthMismatch(header.adu_length, payload.len()).into());
    }

    Ok((header.tx_id, header.unit_id, payload))
}

/// Size of the complete MBAP response frame for `command`
pub fn response_length(command: &Command) -> usize {
    constants::HEADER_LENGTH + response_pdu_length(command)
}

/// Incremental parser of MBAP frames from a byte stream
pub(crate) struct MbapParser {
    state: ParseState,
}

#[derive(Clone, Copy)]
enum ParseState {
    Begin,
    Header(MbapHeader),
}

impl MbapParser {
    pub(crate) fn new() -> Self {
        Self {
            state: ParseState::Begin,
        }
    }

    fn parse_header(cursor: &mut ReadBuffer) -> Result<MbapHeader, RequestError> {
        let tx_id = cursor.read_u16_be()?;
        let protocol_id = cursor.read_u16_be()?;
        let length = cursor.read_u16_be()? as usize;
        let unit_id = cursor.read_u8()?;

        Ok(MbapHeader::new(tx_id, protocol_id, length, unit_id)?)
    }

    fn parse_body(header: &MbapHeader, cursor: &mut ReadBuffer) -> Result<Frame, RequestError> {
        let mut frame = Frame::new(FrameHeader::new(header.unit_id, header.tx_id));
        if !frame.set(cursor.read(header.adu_length)?) {
            return Err(InternalError::AduTooBig(header.adu_length).into());
        }
        Ok(frame)
    }
}

impl FrameParser for MbapParser {
    fn max_frame_size(&self) -> usize {
        constants::MAX_FRAME_LENGTH
    }

    fn parse(&mut self, cursor: &mut ReadBuffer) -> Result<Option<Frame>, RequestError> {
        match self.state {
            ParseState::Header(header) => {
                if cursor.len() < header.adu_length {
                    return Ok(None);
                }

                let ret = Self::parse_body(&header, cursor)?;
                self.state = ParseState::Begin;
                Ok(Some(ret))
            }
            ParseState::Begin => {
                if cursor.len() < constants::HEADER_LENGTH {
                    return Ok(None);
                }

                self.state = ParseState::Header(Self::parse_header(cursor)?);
                self.parse(cursor)
            }
        }
    }

    fn reset(&mut self) {
        self.state = ParseState::Begin;
    }
}

pub(crate) struct MbapDisplay<'a> {
    level: FrameDecodeLevel,
    header: FrameHeader,
    payload: &'a [u8],
}

impl<'a> MbapDisplay<'a> {
    pub(crate) fn new(level: FrameDecodeLevel, header: FrameHeader, payload: &'a [u8]) -> Self {
        MbapDisplay {
            level,
            header,
            payload,
        }
    }
}

impl std::fmt::Display for MbapDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "tx_id: {} unit: {} len: {}",
            self.header.tx_id,
            self.header.unit_id,
            self.payload.len()
        )?;
        if self.level.payload_enabled() {
            crate::common::phys::format_bytes(f, self.payload)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tokio_test::block_on;
    use tokio_test::io::Builder;

    use crate::common::frame::FramedReader;
    use crate::common::phys::PhysLayer;
    use crate::decode::DecodeLevel;

    use super::*;

    //                            |   tx id  |  proto id |  length  | unit |  payload   |
    const SIMPLE_FRAME: &[u8] = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x03, 0x2A, 0x03, 0x04];

    fn assert_equals_simple_frame(frame: &Frame) {
        assert_eq!(frame.header.tx_id, TxId::new(0x0007));
        assert_eq!(frame.header.unit_id, UnitId::new(0x2A));
        assert_eq!(frame.payload(), &[0x03, 0x04]);
    }

    fn test_segmented_parse(split_at: usize) {
        let (f1, f2) = SIMPLE_FRAME.split_at(split_at);
        let mut io = PhysLayer::new_mock(Builder::new().read(f1).read(f2).build());
        let mut reader = FramedReader::new(MbapParser::new());
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&frame);
    }

    fn test_error(input: &[u8]) -> RequestError {
        let mut io = PhysLayer::new_mock(Builder::new().read(input).build());
        let mut reader = FramedReader::new(MbapParser::new());
        block_on(reader.next_frame(&mut io, DecodeLevel::nothing()))
            .err()
            .unwrap()
    }

    #[test]
    fn correctly_wraps_frame() {
        let output = wrap(&[0x03, 0x04], TxId::new(7), UnitId::new(42)).unwrap();
        assert_eq!(output, SIMPLE_FRAME)
    }

    #[test]
    fn unwrap_inverts_wrap() {
        let (tx_id, unit_id, payload) = unwrap(SIMPLE_FRAME).unwrap();
        assert_eq!(tx_id, TxId::new(7));
        assert_eq!(unit_id, UnitId::new(0x2A));
        assert_eq!(payload, &[0x03, 0x04]);
    }

    #[test]
    fn wraps_read_holding_registers_example() {
        let payload = crate::codec::encode_request(
            &Command::read_holding_registers(UnitId::new(5), 2300, 1).unwrap(),
        )
        .unwrap();
        assert_eq!(
            wrap(&payload, TxId::new(0x1234), UnitId::new(5)).unwrap(),
            vec![0x12, 0x34, 0x00, 0x00, 0x00, 0x06, 0x05, 0x03, 0x08, 0xFC, 0x00, 0x01]
        );
    }

    #[test]
    fn wrap_rejects_oversized_payload() {
        assert_eq!(
            wrap(&[0u8; 254], TxId::new(1), UnitId::new(1)),
            Err(RequestError::Internal(InternalError::AduTooBig(254)))
        );
    }

    #[test]
    fn unwrap_rejects_length_mismatch() {
        assert_eq!(
            unwrap(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x04, 0x2A, 0x03, 0x04]),
            Err(RequestError::BadFrame(
                FrameParseError::FrameLengthMismatch(3, 2)
            ))
        );
        assert_eq!(
            unwrap(&[0x00, 0x07, 0x00, 0x00]),
            Err(RequestError::BadFrame(FrameParseError::FrameTooShort(4)))
        );
    }

    #[test]
    fn response_length_includes_header() {
        let command = Command::read_holding_registers(UnitId::new(5), 2300, 1).unwrap();
        assert_eq!(response_length(&command), 7 + 4);
        let command = Command::write_single_coil(UnitId::new(5), 1, true);
        assert_eq!(response_length(&command), 7 + 5);
    }

    #[test]
    fn can_parse_frame_from_stream() {
        let mut io = PhysLayer::new_mock(Builder::new().read(SIMPLE_FRAME).build());
        let mut reader = FramedReader::new(MbapParser::new());
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_equals_simple_frame(&frame);
    }

    #[test]
    fn can_parse_maximum_size_frame() {
        // maximum ADU length is 253, so max MBAP length value is 254 which is 0xFE
        let header = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFE, 0x2A];
        let payload = &[0xCC; 253];

        let mut io = PhysLayer::new_mock(Builder::new().read(header).read(payload).build());
        let mut reader = FramedReader::new(MbapParser::new());
        let frame = block_on(reader.next_frame(&mut io, DecodeLevel::nothing())).unwrap();

        assert_eq!(frame.payload(), payload.as_ref());
    }

    #[test]
    fn can_parse_frame_if_segmented_in_header() {
        test_segmented_parse(4);
    }

    #[test]
    fn can_parse_frame_if_segmented_in_payload() {
        test_segmented_parse(8);
    }

    #[test]
    fn errors_on_bad_protocol_id() {
        let frame = &[0x00, 0x07, 0xCA, 0xFE, 0x00, 0x01, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::UnknownProtocolId(0xCAFE))
        );
    }

    #[test]
    fn errors_on_length_of_zero() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0x00, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::MbapLengthZero)
        );
    }

    #[test]
    fn errors_when_mbap_length_too_big() {
        let frame = &[0x00, 0x07, 0x00, 0x00, 0x00, 0xFF, 0x2A];
        assert_eq!(
            test_error(frame),
            RequestError::BadFrame(FrameParseError::MbapLengthTooBig(
                0xFF,
                constants::MAX_LENGTH_FIELD,
            ))
        );
    }
}
