use crypta_types::ObjectType;
use serde::{Deserialize, Serialize};

/// Upper bound on an encoded message. Payloads never carry object bytes,
/// so anything near this size is hostile.
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Lock negotiation actions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockAction {
    /// Ask for the sync window.
    Request,
    /// The window was granted.
    Accept,
    /// Give up the window, or (from the node) deny a request.
    Release,
}

/// Kinds of notification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyKind {
    /// The requested object does not exist here.
    Missing,
    /// The sender removed the object; the receiver should too.
    Removed,
}

/// All message types in the sync protocol.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    Lock {
        action: LockAction,
    },
    Request {
        obj_type: ObjectType,
        identification: String,
    },
    Push {
        obj_type: ObjectType,
        identification: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    Notify {
        notify: NotifyKind,
        identification: String,
        obj_type: ObjectType,
    },
}

impl Message {
    pub fn lock(action: LockAction) -> Self {
        Self::Lock { action }
    }

    pub fn request(obj_type: ObjectType, identification: impl Into<String>) -> Self {
        Self::Request {
            obj_type,
            identification: identification.into(),
        }
    }

    pub fn push(
        obj_type: ObjectType,
        identification: impl Into<String>,
        name: Option<String>,
    ) -> Self {
        Self::Push {
            obj_type,
            identification: identification.into(),
            name,
        }
    }

    pub fn notify(
        notify: NotifyKind,
        identification: impl Into<String>,
        obj_type: ObjectType,
    ) -> Self {
        Self::Notify {
            notify,
            identification: identification.into(),
            obj_type,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Lock { .. } => "lock",
            Self::Request { .. } => "request",
            Self::Push { .. } => "push",
            Self::Notify { .. } => "notify",
        }
    }

    /// Identification carried by the message, if any.
    pub fn identification(&self) -> Option<&str> {
        match self {
            Self::Lock { .. } => None,
            Self::Request { identification, .. }
            | Self::Push { identification, .. }
            | Self::Notify { identification, .. } => Some(identification),
        }
    }
}
