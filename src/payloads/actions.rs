use crate::pending::ActionKind;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// A protected action attempted by a client, signed in or not.
#[derive(Serialize, Deserialize, Debug)]
pub struct ExecuteActionPayload {
    /// Stable per-browser id under which a deferred action is kept.
    pub client_id: Uuid,
    pub kind: ActionKind,
    pub payload: JsonValue,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct CompleteActionPayload {
    pub client_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ApplyInternshipPayload {
    pub internship_id: Uuid,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct EnrollCoursePayload {
    pub course_id: Uuid,
}
