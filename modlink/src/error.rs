use crate::exception::ExceptionCode;

/// The task processing requests has shut down
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Shutdown;

impl std::fmt::Display for Shutdown {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str("the client task has shut down")
    }
}

impl std::error::Error for Shutdown {}

/// Top-level error type for the codec, the framers, and the client
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestError {
    /// Transport connect/send/recv failure
    Io(std::io::ErrorKind),
    /// Device replied with an exception response
    Exception(ExceptionCode),
    /// Command parameters are invalid (ranges, value shapes)
    BadRequest(InvalidRequest),
    /// A received request payload could not be decoded
    MalformedRequest(AduParseError),
    /// A received response payload could not be decoded
    BadResponse(AduParseError),
    /// A frame (RTU or TCP) is malformed or failed its integrity check
    BadFrame(FrameParseError),
    /// Operation invoked in the wrong connection state or delivery mode
    InvalidState(StateError),
    /// No response was received before the configured timeout
    ResponseTimeout,
    /// Internal error that indicates a bug in the library
    Internal(InternalError),
    /// The client task has shut down
    Shutdown,
}

impl std::error::Error for RequestError {}

impl std::fmt::Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RequestError::Io(kind) => write!(f, "I/O error: {kind}"),
            RequestError::Exception(ex) => write!(f, "exception response: {ex}"),
            RequestError::BadRequest(err) => write!(f, "bad request: {err}"),
            RequestError::MalformedRequest(err) => write!(f, "malformed request: {err}"),
            RequestError::BadResponse(err) => write!(f, "malformed response: {err}"),
            RequestError::BadFrame(err) => write!(f, "bad frame: {err}"),
            RequestError::InvalidState(err) => write!(f, "invalid state: {err}"),
            RequestError::ResponseTimeout => {
                f.write_str("timeout occurred before receiving a response")
            }
            RequestError::Internal(err) => write!(f, "internal error: {err}"),
            RequestError::Shutdown => Shutdown.fmt(f),
        }
    }
}

impl RequestError {
    /// true if the error means the underlying socket can no longer be used
    pub(crate) fn is_disconnect(&self) -> bool {
        match self {
            RequestError::Io(kind) => matches!(
                kind,
                std::io::ErrorKind::BrokenPipe
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::NotConnected
                    | std::io::ErrorKind::UnexpectedEof
                    | std::io::ErrorKind::WriteZero
            ),
            _ => false,
        }
    }
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err.kind())
    }
}

impl From<ExceptionCode> for RequestError {
    fn from(ex: ExceptionCode) -> Self {
        RequestError::Exception(ex)
    }
}

impl From<InvalidRequest> for RequestError {
    fn from(err: InvalidRequest) -> Self {
        RequestError::BadRequest(err)
    }
}

impl From<InvalidRange> for RequestError {
    fn from(err: InvalidRange) -> Self {
        RequestError::BadRequest(err.into())
    }
}

/// Response parsing is the common case, request decoding maps to
/// [`RequestError::MalformedRequest`] explicitly
impl From<AduParseError> for RequestError {
    fn from(err: AduParseError) -> Self {
        RequestError::BadResponse(err)
    }
}

impl From<FrameParseError> for RequestError {
    fn from(err: FrameParseError) -> Self {
        RequestError::BadFrame(err)
    }
}

impl From<StateError> for RequestError {
    fn from(err: StateError) -> Self {
        RequestError::InvalidState(err)
    }
}

impl From<InternalError> for RequestError {
    fn from(err: InternalError) -> Self {
        RequestError::Internal(err)
    }
}

impl From<scursor::WriteError> for RequestError {
    fn from(err: scursor::WriteError) -> Self {
        RequestError::Internal(err.into())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for RequestError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        RequestError::Shutdown
    }
}

impl From<tokio::sync::oneshot::error::RecvError> for RequestError {
    fn from(_: tokio::sync::oneshot::error::RecvError) -> Self {
        RequestError::Shutdown
    }
}

impl From<Shutdown> for RequestError {
    fn from(_: Shutdown) -> Self {
        RequestError::Shutdown
    }
}

/// Errors that result from an invalid start/count pair
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidRange {
    /// Count of zero is never valid
    CountOfZero,
    /// start + count - 1 exceeds u16::MAX
    AddressOverflow(u16, u16),
    /// count exceeds the maximum allowed for the function
    CountTooLargeForType(u16, u16),
}

impl std::error::Error for InvalidRange {}

impl std::fmt::Display for InvalidRange {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRange::CountOfZero => f.write_str("range contains a count of zero"),
            InvalidRange::AddressOverflow(start, count) => write!(
                f,
                "start == {start} and count == {count} would overflow the representation of u16"
            ),
            InvalidRange::CountTooLargeForType(count, max) => write!(
                f,
                "the count of {count} exceeds the maximum allowed count of {max} for this type"
            ),
        }
    }
}

/// Errors that result from bad command parameters
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InvalidRequest {
    /// The address range is invalid
    BadRange(InvalidRange),
    /// The number of values does not fit in a u16
    CountTooBigForU16(usize),
    /// Response values are not of the kind (bits or registers) the command reads
    ValueTypeMismatch,
    /// Number of response values doesn't match the requested count (expected, actual)
    ValueCountMismatch(usize, usize),
}

impl From<InvalidRange> for InvalidRequest {
    fn from(err: InvalidRange) -> Self {
        InvalidRequest::BadRange(err)
    }
}

impl std::error::Error for InvalidRequest {}

impl std::fmt::Display for InvalidRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InvalidRequest::BadRange(err) => write!(f, "{err}"),
            InvalidRequest::CountTooBigForU16(count) => write!(
                f,
                "the count of values ({count}) exceeds the maximum value of u16"
            ),
            InvalidRequest::ValueTypeMismatch => {
                f.write_str("values are not of the type the command operates on")
            }
            InvalidRequest::ValueCountMismatch(expected, actual) => write!(
                f,
                "expected {expected} values but {actual} were provided"
            ),
        }
    }
}

/// Errors that occur while parsing request or response payloads
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AduParseError {
    /// Payload is too short to be valid
    InsufficientBytes,
    /// Byte count doesn't match what is expected from the count (expected, actual)
    RequestByteCountMismatch(usize, usize),
    /// Byte count doesn't match the number of bytes present (count, remaining)
    InsufficientBytesForByteCount(usize, usize),
    /// Payload contains extra trailing bytes
    TrailingBytes(usize),
    /// A field expected to be echoed in the reply did not match
    ReplyEchoMismatch,
    /// Unexpected response function code (actual, expected, expected error)
    UnknownResponseFunction(u8, u8, u8),
    /// Function code is not one of the supported functions
    UnknownFunction(u8),
    /// Coil value other than 0xFF00 or 0x0000
    UnknownCoilState(u16),
    /// The decoded address range is invalid
    BadRange(InvalidRange),
}

impl From<scursor::ReadError> for AduParseError {
    fn from(_: scursor::ReadError) -> Self {
        AduParseError::InsufficientBytes
    }
}

impl From<InvalidRange> for AduParseError {
    fn from(err: InvalidRange) -> Self {
        AduParseError::BadRange(err)
    }
}

impl std::error::Error for AduParseError {}

impl std::fmt::Display for AduParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            AduParseError::InsufficientBytes => f.write_str("payload is too short to be valid"),
            AduParseError::RequestByteCountMismatch(expected, actual) => write!(
                f,
                "byte count ({actual}) doesn't match what is expected based on the count ({expected})"
            ),
            AduParseError::InsufficientBytesForByteCount(count, remaining) => write!(
                f,
                "byte count ({count}) doesn't match the actual number of bytes remaining ({remaining})"
            ),
            AduParseError::TrailingBytes(count) => {
                write!(f, "payload contains {count} extra trailing bytes")
            }
            AduParseError::ReplyEchoMismatch => {
                f.write_str("a field expected to be echoed in the reply did not match")
            }
            AduParseError::UnknownResponseFunction(actual, expected, error) => write!(
                f,
                "received response function code {actual:#04X}, expected {expected:#04X} or {error:#04X}"
            ),
            AduParseError::UnknownFunction(code) => {
                write!(f, "unsupported function code: {code:#04X}")
            }
            AduParseError::UnknownCoilState(value) => {
                write!(f, "coil state with unspecified value: {value:#06X}")
            }
            AduParseError::BadRange(err) => write!(f, "{err}"),
        }
    }
}

/// Errors that occur while unwrapping RTU or TCP frames
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameParseError {
    /// TCP frame with the length field set to zero
    MbapLengthZero,
    /// TCP frame length field exceeds the maximum (actual, max)
    MbapLengthTooBig(usize, usize),
    /// TCP frame with a non-Modbus protocol id
    UnknownProtocolId(u16),
    /// Length field disagrees with the bytes present (declared, actual)
    FrameLengthMismatch(usize, usize),
    /// Frame is shorter than its fixed overhead
    FrameTooShort(usize),
    /// RTU CRC mismatch (received, expected)
    CrcValidationFailure(u16, u16),
    /// Active-mode response with no matching pending transaction
    UnknownTransactionId(u16),
    /// Passive-mode response carries a different transaction id (received, expected)
    TxIdMismatch(u16, u16),
}

impl std::error::Error for FrameParseError {}

impl std::fmt::Display for FrameParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameParseError::MbapLengthZero => {
                f.write_str("received TCP frame with the length field set to zero")
            }
            FrameParseError::MbapLengthTooBig(size, max) => write!(
                f,
                "received TCP frame with length ({size}) that exceeds max allowed size ({max})"
            ),
            FrameParseError::UnknownProtocolId(id) => {
                write!(f, "received TCP frame with non-Modbus protocol id: {id}")
            }
            FrameParseError::FrameLengthMismatch(declared, actual) => write!(
                f,
                "frame declares {declared} bytes but {actual} are present"
            ),
            FrameParseError::FrameTooShort(len) => {
                write!(f, "frame of {len} bytes is too short to be valid")
            }
            FrameParseError::CrcValidationFailure(received, expected) => write!(
                f,
                "received CRC {received:#06X} doesn't match the computed CRC {expected:#06X}"
            ),
            FrameParseError::UnknownTransactionId(id) => {
                write!(f, "no pending transaction with id {id:#06X}")
            }
            FrameParseError::TxIdMismatch(received, expected) => write!(
                f,
                "received transaction id {received:#06X} while expecting {expected:#06X}"
            ),
        }
    }
}

/// Operation invoked in the wrong state or mode
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StateError {
    /// The connection is closed
    Closed,
    /// `close` was called on a closed connection
    AlreadyClosed,
    /// `connect` was called on a connected client
    AlreadyConnected,
    /// Configuration can only change while closed
    Connected,
    /// `confirmation` is only available in passive mode
    WrongMode,
    /// `confirmation` was called without an outstanding request
    NoRequestInFlight,
}

impl std::error::Error for StateError {}

impl std::fmt::Display for StateError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StateError::Closed => f.write_str("connection is closed"),
            StateError::AlreadyClosed => f.write_str("connection is already closed"),
            StateError::AlreadyConnected => f.write_str("connection is already established"),
            StateError::Connected => {
                f.write_str("configuration may only be changed while closed")
            }
            StateError::WrongMode => f.write_str("operation is not available in active mode"),
            StateError::NoRequestInFlight => f.write_str("no request is awaiting confirmation"),
        }
    }
}

/// Errors that should only occur if there is a logic error in the library
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InternalError {
    /// Attempted to write past the end of a buffer
    InsufficientWriteSpace,
    /// Byte count would exceed the maximum size of u8
    BadByteCount(usize),
    /// The calculated ADU size exceeds what is allowed
    AduTooBig(usize),
    /// Attempted to read more bytes than are buffered (requested, present)
    InsufficientBytesForRead(usize, usize),
}

impl From<scursor::WriteError> for InternalError {
    fn from(_: scursor::WriteError) -> Self {
        InternalError::InsufficientWriteSpace
    }
}

impl std::error::Error for InternalError {}

impl std::fmt::Display for InternalError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            InternalError::InsufficientWriteSpace => {
                f.write_str("attempted to write past the end of the buffer")
            }
            InternalError::BadByteCount(count) => {
                write!(f, "byte count would exceed maximum size of u8: {count}")
            }
            InternalError::AduTooBig(size) => {
                write!(f, "ADU length of {size} exceeds the maximum allowed length")
            }
            InternalError::InsufficientBytesForRead(requested, present) => write!(
                f,
                "attempted to read {requested} bytes with only {present} buffered"
            ),
        }
    }
}
