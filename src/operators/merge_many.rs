use crate::changeset::ChangeSet;
use futures_util::stream::Stream;
use std::pin::Pin;
use std::task::{Context, Poll};

type BoxedSource<K, V, E> = Pin<Box<dyn Stream<Item = Result<ChangeSet<K, V>, E>> + Send>>;

/// Merges N changeset streams of caches with disjoint key spaces into
/// one stream. Per-source ordering is preserved; sources are
/// interleaved in whatever order they actually become ready, not a
/// fixed round-robin. An error from any source is forwarded and then
/// the merged stream completes — the remaining sources are dropped
/// rather than drained.
pub struct MergeMany<K, V, E> {
    sources: Vec<Option<BoxedSource<K, V, E>>>,
    errored: bool,
}

impl<K, V, E> MergeMany<K, V, E> {
    /// Merges `sources`, each a stream of changesets (or a terminal
    /// error) from one disjoint-keyspace cache.
    pub fn new(sources: Vec<BoxedSource<K, V, E>>) -> Self {
        MergeMany {
            sources: sources.into_iter().map(Some).collect(),
            errored: false,
        }
    }
}

impl<K, V, E> Stream for MergeMany<K, V, E>
where
    K: Unpin,
    V: Unpin,
    E: Unpin,
{
    type Item = Result<ChangeSet<K, V>, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.errored {
            return Poll::Ready(None);
        }

        let mut any_pending = false;
        for slot in self.sources.iter_mut() {
            let source = match slot {
                Some(source) => source,
                None => continue,
            };
            match source.as_mut().poll_next(cx) {
                Poll::Ready(Some(Err(error))) => {
                    self.errored = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Poll::Ready(Some(Ok(changes))) => {
                    return Poll::Ready(Some(Ok(changes)));
                }
                Poll::Ready(None) => {
                    *slot = None;
                }
                Poll::Pending => {
                    any_pending = true;
                }
            }
        }

        if any_pending {
            Poll::Pending
        } else {
            Poll::Ready(None)
        }
    }
}
