use scursor::{ReadCursor, WriteCursor};

use crate::error::{AduParseError, RequestError};

pub(crate) trait Serialize {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError>;
}

pub(crate) trait Parse: Sized {
    fn parse(cursor: &mut ReadCursor) -> Result<Self, AduParseError>;
}
