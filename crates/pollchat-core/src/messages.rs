//! pollchat message type codes.
//!
//! Requests are odd, replies are the following even code. The numbers are
//! the wire contract and must never be renumbered.

/// Protocol version written into every outgoing header.
pub const PROTOCOL_VERSION: u32 = 1;

/// Numeric message type tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum MsgType {
    LoginRequest = 1,
    LoginReply = 2,
    SendRequest = 3,
    SendReply = 4,
    FetchRequest = 5,
    FetchReply = 6,
    LogoutRequest = 7,
    LogoutReply = 8,
}

impl MsgType {
    /// The reply code paired with a request, or `None` for reply codes.
    pub fn reply(self) -> Option<MsgType> {
        match self {
            Self::LoginRequest => Some(Self::LoginReply),
            Self::SendRequest => Some(Self::SendReply),
            Self::FetchRequest => Some(Self::FetchReply),
            Self::LogoutRequest => Some(Self::LogoutReply),
            _ => None,
        }
    }

    pub fn is_request(self) -> bool {
        self.reply().is_some()
    }
}

impl From<MsgType> for u32 {
    fn from(m: MsgType) -> u32 {
        m as u32
    }
}

impl TryFrom<u32> for MsgType {
    type Error = crate::ChatError;
    fn try_from(v: u32) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(Self::LoginRequest),
            2 => Ok(Self::LoginReply),
            3 => Ok(Self::SendRequest),
            4 => Ok(Self::SendReply),
            5 => Ok(Self::FetchRequest),
            6 => Ok(Self::FetchReply),
            7 => Ok(Self::LogoutRequest),
            8 => Ok(Self::LogoutReply),
            other => Err(crate::ChatError::UnknownMessageType(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(u32::from(MsgType::LoginRequest), 1);
        assert_eq!(u32::from(MsgType::LogoutReply), 8);
        for code in 1..=8u32 {
            let t = MsgType::try_from(code).unwrap();
            assert_eq!(u32::from(t), code);
        }
    }

    #[test]
    fn unknown_code_rejected() {
        assert!(matches!(
            MsgType::try_from(0),
            Err(crate::ChatError::UnknownMessageType(0))
        ));
        assert!(MsgType::try_from(9).is_err());
    }

    #[test]
    fn requests_pair_with_replies() {
        assert_eq!(MsgType::FetchRequest.reply(), Some(MsgType::FetchReply));
        assert!(MsgType::SendRequest.is_request());
        assert!(!MsgType::SendReply.is_request());
        assert_eq!(MsgType::LoginReply.reply(), None);
    }
}
