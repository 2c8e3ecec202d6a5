/// The session context passed explicitly into the task service. Dispatch on
/// this variant decides which physical backend serves each call.
#[derive(Debug, Clone)]
pub enum Session {
    /// Authenticated against the remote service.
    Remote { user_id: String, token: String },
    /// Unauthenticated, identified by the local store's session record.
    Guest { session_id: String },
    /// No identity at all; reads come back empty, writes fail fast.
    None,
}

impl Session {
    /// The id stamped onto created tasks, when one exists.
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Session::Remote { user_id, .. } => Some(user_id),
            Session::Guest { session_id } => Some(session_id),
            Session::None => None,
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, Session::Remote { .. })
    }
}
