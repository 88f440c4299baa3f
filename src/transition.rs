//! Legal status transitions for upload sessions.
//!
//! ```text
//! CREATED ──first file──▶ UPLOADING ──make permanent──▶ COPYING_IN_PROGRESS ──▶ STORED
//!    │   ◀──last removed──    │                               │                 │  │
//!    ▼                        ▼                               ▼                 │  │
//! EXPIRED ◀───────────── (expire)                      COPYING_FAILED           │  │
//!                                                                  copy-out ◀───┘  │
//! CREATED ◀── REMOVING_IN_PROGRESS ◀──────────── reset (UPLOADING or STORED) ──────┘
//! ```

use crate::entity::upload_session::SessionStatus;

impl SessionStatus {
    /// Whether a session in `self` may move to `next`.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        use SessionStatus::*;

        match self {
            Created => matches!(next, Uploading | Expired),
            Uploading => matches!(
                next,
                Created | Expired | CopyingInProgress | RemovingInProgress
            ),
            CopyingInProgress => matches!(next, Stored | CopyingFailed),
            Stored => matches!(next, CopyingInProgress | RemovingInProgress),
            RemovingInProgress => matches!(next, Created),
            Expired | CopyingFailed => false,
        }
    }

    /// States no operation can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Expired | SessionStatus::CopyingFailed)
    }

    /// States in which new temporary files may still be added.
    pub fn accepts_uploads(self) -> bool {
        matches!(self, SessionStatus::Created | SessionStatus::Uploading)
    }
}
