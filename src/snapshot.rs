//! Snapshot assembly: one consistent read of the store per broadcast cycle.

use std::future::Future;

use crate::db::models::{Accident, Mode, Settings, Snapshot};
use crate::error::Result;
use crate::store::Store;

/// Anything that can produce a fresh snapshot. The scheduler depends on this
/// rather than on a concrete store so it can be driven by fakes in tests.
pub trait SnapshotSource: Send + Sync + 'static {
    fn assemble(&self) -> impl Future<Output = Result<Snapshot>> + Send;
}

pub struct SnapshotAssembler<S> {
    store: S,
}

impl<S: Store> SnapshotAssembler<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Read mode, data, accident and settings concurrently, then the selected
    /// playlist if any. Any failed fetch fails the whole snapshot; a missing
    /// playlist only omits the field.
    #[tracing::instrument(skip(self))]
    pub async fn assemble(&self) -> Result<Snapshot> {
        let (mode, data, accident, settings) = tokio::try_join!(
            self.store.get_or_create_singleton::<Mode>(),
            self.store.get_all_data(),
            self.store.get_or_create_singleton::<Accident>(),
            self.store.get_or_create_singleton::<Settings>(),
        )?;

        let playlist = match mode.selected_playlist() {
            Some(id) => {
                let playlist = self.store.get_playlist_with_medias(id).await?;
                if playlist.is_none() {
                    tracing::debug!(playlist_id = id, "Selected playlist not found, omitting");
                }
                playlist
            },
            None => None,
        };

        Ok(Snapshot {
            mode,
            data,
            accident,
            settings,
            playlist,
        })
    }
}

impl<S: Store> SnapshotSource for SnapshotAssembler<S> {
    fn assemble(&self) -> impl Future<Output = Result<Snapshot>> + Send {
        SnapshotAssembler::assemble(self)
    }
}
