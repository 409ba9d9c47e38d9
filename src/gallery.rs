use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use anyhow::anyhow;
use tracing::{debug, info, warn};

use crate::api::{ApiError, DesignApi, DesignRecord};

pub const EMPTY_GALLERY_MESSAGE: &str = "You have no saved designs yet.";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to fetch designs.";
pub const FAVORITE_FAILED_MESSAGE: &str = "Failed to update favorite status.";
pub const DELETE_FAILED_MESSAGE: &str = "Failed to delete design.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortMode {
    #[default]
    Recent,
    Favorites,
}

impl SortMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Recent => "recent",
            Self::Favorites => "favorites",
        }
    }
}

impl Display for SortMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> anyhow::Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "recent" => Ok(Self::Recent),
            "favorites" | "favourites" => Ok(Self::Favorites),
            other => Err(anyhow!(
                "invalid sort mode `{other}`; expected `recent` or `favorites`"
            )),
        }
    }
}

pub fn sort_designs<'a>(
    records: impl IntoIterator<Item = &'a DesignRecord>,
    mode: SortMode,
) -> Vec<&'a DesignRecord> {
    let mut sorted: Vec<_> = records.into_iter().collect();
    sorted.sort_by(|a, b| compare_for_display(a, b, mode));
    sorted
}

fn compare_for_display(a: &DesignRecord, b: &DesignRecord, mode: SortMode) -> Ordering {
    let newest_first = b.created_at.cmp(&a.created_at);
    match mode {
        SortMode::Recent => newest_first,
        SortMode::Favorites => b.is_favorite.cmp(&a.is_favorite).then(newest_first),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingMutation {
    ToggleFavorite { previous: bool },
    Delete,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationState {
    #[default]
    Stable,
    Pending(PendingMutation),
    RolledBack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryItem {
    pub record: DesignRecord,
    pub state: MutationState,
    load_order: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ToggleFavorite,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "a pending mutation must be settled"]
pub struct MutationTicket {
    gallery_id: u64,
    design_id: String,
    kind: MutationKind,
}

impl MutationTicket {
    pub fn design_id(&self) -> &str {
        &self.design_id
    }

    pub fn kind(&self) -> MutationKind {
        self.kind
    }

    pub fn gallery_id(&self) -> u64 {
        self.gallery_id
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GalleryError {
    #[error("no design with id `{0}` in the gallery")]
    UnknownDesign(String),

    #[error("design `{0}` already has a change in flight")]
    MutationInFlight(String),

    #[error("Failed to update favorite status.")]
    FavoriteRolledBack {
        design_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Failed to delete design.")]
    DeleteRolledBack {
        design_id: String,
        #[source]
        source: ApiError,
    },
}

impl GalleryError {
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Self::FavoriteRolledBack { source, .. } | Self::DeleteRolledBack { source, .. } => {
                Some(source)
            }
            Self::UnknownDesign(_) | Self::MutationInFlight(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct RemovedItem {
    load_order: usize,
    record: DesignRecord,
}

static NEXT_GALLERY_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Gallery {
    id: u64,
    items: Vec<GalleryItem>,
    removed: Vec<RemovedItem>,
}

impl Gallery {
    pub fn new(records: Vec<DesignRecord>) -> Self {
        Self {
            id: NEXT_GALLERY_ID.fetch_add(1, AtomicOrdering::Relaxed),
            items: records
                .into_iter()
                .enumerate()
                .map(|(load_order, record)| GalleryItem {
                    record,
                    state: MutationState::Stable,
                    load_order,
                })
                .collect(),
            removed: Vec::new(),
        }
    }

    /// Tickets issued by one gallery are ignored by any other, including a reload.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn items(&self) -> &[GalleryItem] {
        &self.items
    }

    pub fn records(&self) -> impl Iterator<Item = &DesignRecord> {
        self.items.iter().map(|item| &item.record)
    }

    pub fn get(&self, design_id: &str) -> Option<&GalleryItem> {
        self.items.iter().find(|item| item.record.id == design_id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn empty_message(&self) -> Option<&'static str> {
        self.is_empty().then_some(EMPTY_GALLERY_MESSAGE)
    }

    pub fn sorted(&self, mode: SortMode) -> Vec<&DesignRecord> {
        sort_designs(self.records(), mode)
    }

    pub fn has_pending(&self) -> bool {
        !self.removed.is_empty()
            || self
                .items
                .iter()
                .any(|item| matches!(item.state, MutationState::Pending(_)))
    }

    pub fn begin_toggle_favorite(&mut self, design_id: &str) -> Result<MutationTicket, GalleryError> {
        let item = self.available_item_mut(design_id)?;
        let previous = item.record.is_favorite;
        item.record.is_favorite = !previous;
        item.state = MutationState::Pending(PendingMutation::ToggleFavorite { previous });
        debug!(design_id, favorite = !previous, "optimistic favorite toggle");

        Ok(MutationTicket {
            gallery_id: self.id,
            design_id: design_id.to_owned(),
            kind: MutationKind::ToggleFavorite,
        })
    }

    pub fn begin_delete(&mut self, design_id: &str) -> Result<MutationTicket, GalleryError> {
        self.available_item_mut(design_id)?;
        let index = self
            .position(design_id)
            .ok_or_else(|| GalleryError::UnknownDesign(design_id.to_owned()))?;
        let item = self.items.remove(index);
        self.removed.push(RemovedItem {
            load_order: item.load_order,
            record: item.record,
        });
        debug!(design_id, index, "optimistic delete");

        Ok(MutationTicket {
            gallery_id: self.id,
            design_id: design_id.to_owned(),
            kind: MutationKind::Delete,
        })
    }

    pub fn settle(
        &mut self,
        ticket: MutationTicket,
        outcome: Result<(), ApiError>,
    ) -> Result<(), GalleryError> {
        let MutationTicket {
            gallery_id,
            design_id,
            kind,
        } = ticket;
        if gallery_id != self.id {
            debug!(
                design_id = %design_id,
                gallery_id,
                "discarding ticket from a previous gallery load"
            );
            return Ok(());
        }

        match (kind, outcome) {
            (MutationKind::ToggleFavorite, Ok(())) => {
                if let Some(item) = self.item_mut(&design_id) {
                    item.state = MutationState::Stable;
                }
                Ok(())
            }
            (MutationKind::ToggleFavorite, Err(source)) => {
                if let Some(item) = self.item_mut(&design_id) {
                    if let MutationState::Pending(PendingMutation::ToggleFavorite { previous }) =
                        item.state
                    {
                        item.record.is_favorite = previous;
                    }
                    item.state = MutationState::RolledBack;
                }
                warn!(design_id = %design_id, error = %source, "favorite toggle rolled back");
                Err(GalleryError::FavoriteRolledBack { design_id, source })
            }
            (MutationKind::Delete, Ok(())) => {
                self.removed.retain(|removed| removed.record.id != design_id);
                info!(design_id = %design_id, "design deleted");
                Ok(())
            }
            (MutationKind::Delete, Err(source)) => {
                if let Some(position) = self
                    .removed
                    .iter()
                    .position(|removed| removed.record.id == design_id)
                {
                    let RemovedItem { load_order, record } = self.removed.remove(position);
                    let index = self
                        .items
                        .iter()
                        .position(|item| item.load_order > load_order)
                        .unwrap_or(self.items.len());
                    self.items.insert(
                        index,
                        GalleryItem {
                            record,
                            state: MutationState::RolledBack,
                            load_order,
                        },
                    );
                }
                warn!(design_id = %design_id, error = %source, "delete rolled back");
                Err(GalleryError::DeleteRolledBack { design_id, source })
            }
        }
    }

    pub async fn toggle_favorite<A: DesignApi>(
        &mut self,
        api: &A,
        design_id: &str,
    ) -> Result<(), GalleryError> {
        let ticket = self.begin_toggle_favorite(design_id)?;
        let outcome = api.toggle_favorite(design_id).await;
        self.settle(ticket, outcome)
    }

    pub async fn delete<A: DesignApi>(
        &mut self,
        api: &A,
        design_id: &str,
    ) -> Result<(), GalleryError> {
        let ticket = self.begin_delete(design_id)?;
        let outcome = api.delete_design(design_id).await;
        self.settle(ticket, outcome)
    }

    fn position(&self, design_id: &str) -> Option<usize> {
        self.items.iter().position(|item| item.record.id == design_id)
    }

    fn item_mut(&mut self, design_id: &str) -> Option<&mut GalleryItem> {
        self.items
            .iter_mut()
            .find(|item| item.record.id == design_id)
    }

    fn available_item_mut(&mut self, design_id: &str) -> Result<&mut GalleryItem, GalleryError> {
        if self.removed.iter().any(|removed| removed.record.id == design_id) {
            return Err(GalleryError::MutationInFlight(design_id.to_owned()));
        }
        let item = self
            .item_mut(design_id)
            .ok_or_else(|| GalleryError::UnknownDesign(design_id.to_owned()))?;
        if matches!(item.state, MutationState::Pending(_)) {
            return Err(GalleryError::MutationInFlight(design_id.to_owned()));
        }
        Ok(item)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GalleryState {
    Loading,
    Failed { message: String },
    Ready(Gallery),
}

impl GalleryState {
    pub async fn load<A: DesignApi>(api: &A) -> Self {
        Self::from_outcome(api.my_designs().await)
    }

    pub fn from_outcome(outcome: Result<Vec<DesignRecord>, ApiError>) -> Self {
        match outcome {
            Ok(records) => {
                info!(count = records.len(), "loaded saved designs");
                Self::Ready(Gallery::new(records))
            }
            Err(error) => {
                warn!(error = %error, "failed to load saved designs");
                let message = error.to_string();
                let message = if message.trim().is_empty() {
                    LOAD_FAILED_MESSAGE.to_owned()
                } else {
                    message
                };
                Self::Failed { message }
            }
        }
    }

    pub fn gallery(&self) -> Option<&Gallery> {
        match self {
            Self::Ready(gallery) => Some(gallery),
            Self::Loading | Self::Failed { .. } => None,
        }
    }

    pub fn gallery_mut(&mut self) -> Option<&mut Gallery> {
        match self {
            Self::Ready(gallery) => Some(gallery),
            Self::Loading | Self::Failed { .. } => None,
        }
    }
}
