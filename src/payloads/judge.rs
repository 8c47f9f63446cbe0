use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct ScoreSubmissionPayload {
    pub submission_id: Uuid,
    pub score: BigDecimal,
    pub feedback: Option<String>,
}
