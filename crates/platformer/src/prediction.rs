use engine::{ClientPredictionData, NetRole, PredictionDataProvider};
use tracing::debug;

use crate::saved_move::ClimbSavedMove;

/// Owns the client move buffer of one character, created on first use.
#[derive(Debug, Default)]
pub struct ClimbPredictionProvider {
    data: Option<ClientPredictionData<ClimbSavedMove>>,
}

impl ClimbPredictionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_initialized(&self) -> bool {
        self.data.is_some()
    }

    /// Read-only view of the buffer; `None` until the client first predicts.
    pub fn data(&self) -> Option<&ClientPredictionData<ClimbSavedMove>> {
        self.data.as_ref()
    }
}

impl PredictionDataProvider for ClimbPredictionProvider {
    type Move = ClimbSavedMove;

    fn prediction_data_client(
        &mut self,
        role: NetRole,
    ) -> &mut ClientPredictionData<ClimbSavedMove> {
        assert!(
            !role.is_authority(),
            "client prediction data requested on the authority"
        );
        self.data.get_or_insert_with(|| {
            debug!(?role, "client_prediction_data_created");
            ClientPredictionData::new()
        })
    }
}
