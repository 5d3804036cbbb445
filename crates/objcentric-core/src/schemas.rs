use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pool::Observation;

/// Body of `POST /predict`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PredictRequest {
    /// Base64 encoded image bytes. A `data:<mime>;base64,` prefix is tolerated.
    pub image_base64: String,
}

/// Response of `POST /predict`.
///
/// `matched_kernel_ids[i]` is scored by `matched_scores[i]`, best match first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub num_kernels: usize,
    pub matched_kernel_ids: Vec<Uuid>,
    pub matched_scores: Vec<f32>,
}

impl From<Observation> for PredictResponse {
    fn from(observation: Observation) -> Self {
        let (matched_kernel_ids, matched_scores) = observation
            .matches
            .into_iter()
            .map(|m| (m.id, m.score))
            .unzip();
        Self {
            num_kernels: observation.num_kernels,
            matched_kernel_ids,
            matched_scores,
        }
    }
}

/// Body returned with every non-success status.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    /// Stable machine readable code, e.g. `bad_request`.
    pub error: String,
    pub detail: String,
}

/// Response of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
    pub num_kernels: usize,
    pub capacity: usize,
    pub encoder: String,
    pub devices: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::KernelMatch;

    #[test]
    fn response_keeps_ids_and_scores_aligned() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let observation = Observation {
            matches: vec![
                KernelMatch {
                    id: first,
                    score: 0.9,
                },
                KernelMatch {
                    id: second,
                    score: 0.4,
                },
            ],
            admitted: None,
            evicted: None,
            num_kernels: 7,
        };

        let response = PredictResponse::from(observation);

        assert_eq!(response.num_kernels, 7);
        assert_eq!(response.matched_kernel_ids, vec![first, second]);
        assert_eq!(response.matched_scores, vec![0.9, 0.4]);
    }

    #[test]
    fn response_serializes_with_wire_field_names() {
        let response = PredictResponse {
            num_kernels: 0,
            matched_kernel_ids: vec![],
            matched_scores: vec![],
        };
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "num_kernels": 0,
                "matched_kernel_ids": [],
                "matched_scores": [],
            })
        );
    }
}
