//! Disconnect close codes.

/// Reasons a session's transport connection is closed server-side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseCode {
    /// Admin action, or superseded by a newer session for the same account.
    Admin = 1000,
    /// Auth token present but invalid.
    AuthInvalid = 4001,
    /// Auth required but no token supplied.
    AuthRequired = 4002,
    /// Requested display name collides with an existing character.
    NameTaken = 4003,
}

impl CloseCode {
    #[must_use]
    pub const fn code(self) -> u16 {
        self as u16
    }

    #[must_use]
    pub const fn reason(self) -> &'static str {
        match self {
            Self::Admin => "new connection from same player",
            Self::AuthInvalid => "invalid auth token",
            Self::AuthRequired => "auth required",
            Self::NameTaken => "name taken",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_match_spec() {
        assert_eq!(CloseCode::Admin.code(), 1000);
        assert_eq!(CloseCode::AuthInvalid.code(), 4001);
        assert_eq!(CloseCode::AuthRequired.code(), 4002);
        assert_eq!(CloseCode::NameTaken.code(), 4003);
    }
}
