use crate::api::{ApiError, DesignRecord, SaveDesignRequest};
use crate::gallery::MutationTicket;
use crate::generation::GenerationResult;
use crate::wizard::SelectionMap;

#[derive(Debug)]
pub enum StudioCommand {
    Generate { selections: SelectionMap },
    SaveDesign {
        run: u64,
        index: usize,
        request: SaveDesignRequest,
    },
    LoadGallery {
        run: u64,
    },
    ToggleFavorite {
        run: u64,
        ticket: MutationTicket,
    },
    DeleteDesign {
        run: u64,
        ticket: MutationTicket,
    },
    Shutdown,
}

#[derive(Debug)]
pub enum StudioEvent {
    GenerationFinished {
        outcome: Result<GenerationResult, ApiError>,
    },
    DesignSaved {
        run: u64,
        index: usize,
        outcome: Result<DesignRecord, ApiError>,
    },
    GalleryLoaded {
        run: u64,
        outcome: Result<Vec<DesignRecord>, ApiError>,
    },
    MutationSettled {
        run: u64,
        ticket: MutationTicket,
        outcome: Result<(), ApiError>,
    },
}

impl StudioEvent {
    pub fn requires_login(&self) -> bool {
        match self {
            Self::GenerationFinished { outcome } => is_auth_failure(outcome),
            Self::DesignSaved { outcome, .. } => is_auth_failure(outcome),
            Self::GalleryLoaded { outcome, .. } => is_auth_failure(outcome),
            Self::MutationSettled { outcome, .. } => is_auth_failure(outcome),
        }
    }
}

/// Generation counters for the views that can be replaced while requests are in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ViewRuns {
    pub results: u64,
    pub gallery: u64,
}

impl ViewRuns {
    pub fn next_results(&mut self) -> u64 {
        self.results = self.results.wrapping_add(1);
        self.results
    }

    pub fn next_gallery(&mut self) -> u64 {
        self.gallery = self.gallery.wrapping_add(1);
        self.gallery
    }

    pub fn is_current(&self, event: &StudioEvent) -> bool {
        match event {
            StudioEvent::GenerationFinished { .. } => true,
            StudioEvent::DesignSaved { run, .. } => *run == self.results,
            StudioEvent::GalleryLoaded { run, .. } | StudioEvent::MutationSettled { run, .. } => {
                *run == self.gallery
            }
        }
    }
}

fn is_auth_failure<T>(outcome: &Result<T, ApiError>) -> bool {
    outcome
        .as_ref()
        .err()
        .is_some_and(ApiError::is_unauthenticated)
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;

    use super::{StudioEvent, ViewRuns};
    use crate::api::ApiError;
    use crate::gallery::Gallery;
    use crate::generation::GenerationResult;

    #[test]
    fn auth_failures_request_login() {
        let signed_out = StudioEvent::GalleryLoaded {
            run: 0,
            outcome: Err(ApiError::Unauthenticated),
        };
        assert!(signed_out.requires_login());

        let rejected_token = StudioEvent::GenerationFinished {
            outcome: Err(ApiError::Http {
                status: StatusCode::UNAUTHORIZED,
                message: "Unauthorized".to_owned(),
            }),
        };
        assert!(rejected_token.requires_login());
    }

    #[test]
    fn other_outcomes_do_not_request_login() {
        let ok = StudioEvent::GenerationFinished {
            outcome: Ok(GenerationResult::default()),
        };
        assert!(!ok.requires_login());

        let server_error = StudioEvent::GalleryLoaded {
            run: 0,
            outcome: Err(ApiError::Http {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "boom".to_owned(),
            }),
        };
        assert!(!server_error.requires_login());
    }

    #[test]
    fn events_from_a_replaced_gallery_are_not_current() {
        let mut runs = ViewRuns::default();
        let first_load = runs.next_gallery();

        let stale_load = StudioEvent::GalleryLoaded {
            run: first_load,
            outcome: Ok(Vec::new()),
        };
        assert!(runs.is_current(&stale_load));

        let second_load = runs.next_gallery();
        assert!(!runs.is_current(&stale_load));
        assert!(runs.is_current(&StudioEvent::GalleryLoaded {
            run: second_load,
            outcome: Ok(Vec::new()),
        }));
    }

    #[test]
    fn stale_mutation_and_save_events_are_not_current() {
        let mut runs = ViewRuns::default();
        let old_gallery = runs.next_gallery();
        let old_results = runs.next_results();

        let mut gallery = Gallery::new(vec![crate::api::DesignRecord {
            id: "y".to_owned(),
            image_url: "https://img/y.png".to_owned(),
            prompt: "design y".to_owned(),
            is_favorite: false,
            created_at: chrono::Utc::now(),
        }]);
        let ticket = gallery.begin_toggle_favorite("y").expect("known design");
        let settled = StudioEvent::MutationSettled {
            run: old_gallery,
            ticket,
            outcome: Ok(()),
        };
        let saved = StudioEvent::DesignSaved {
            run: old_results,
            index: 0,
            outcome: Err(ApiError::Unauthenticated),
        };
        assert!(runs.is_current(&settled));
        assert!(runs.is_current(&saved));

        runs.next_gallery();
        runs.next_results();
        assert!(!runs.is_current(&settled));
        assert!(!runs.is_current(&saved));
        assert!(runs.is_current(&StudioEvent::GenerationFinished {
            outcome: Ok(GenerationResult::default()),
        }));
    }
}
