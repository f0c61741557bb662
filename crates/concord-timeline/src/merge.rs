//! Ordered, deduplicating merge of raw timeline pages.

use std::collections::HashMap;

use tracing::warn;

use crate::item::{ChatItem, ChatItemId};

/// Merge raw pages into one newest-first timeline.
///
/// Pages may overlap (a live-pushed item can also arrive via pagination)
/// and may be supplied in any order; the output is deterministic for the
/// same input set. Duplicated ids keep the later-merged instance — the
/// position is computed once by the single final sort, not by re-sorting
/// per duplicate. A duplicate whose immutable fields disagree is a merge
/// invariant violation: logged, then last-write-wins, never an error to
/// the render path.
///
/// When `empty_state` is provided it is appended at the oldest position
/// (tail of the newest-first sequence) only while no real message exists;
/// it never enters the sort, so its disappearance cannot shift unrelated
/// items.
#[must_use]
pub fn merge_pages(pages: &[Vec<ChatItem>], empty_state: Option<ChatItem>) -> Vec<ChatItem> {
    let mut by_id: HashMap<ChatItemId, ChatItem> = HashMap::new();

    for page in pages {
        for item in page {
            if matches!(item, ChatItem::EmptyState { .. }) {
                // The placeholder is a local construct; a server page must
                // never carry one.
                warn!(id = %item.id(), "dropping empty-state item found in a raw page");
                continue;
            }
            if let Some(existing) = by_id.get(item.id()) {
                if !existing.immutable_fields_match(item) {
                    warn!(
                        id = %item.id(),
                        "merge invariant violation: duplicate id with conflicting fields, keeping later instance"
                    );
                }
            }
            by_id.insert(item.id().clone(), item.clone());
        }
    }

    let mut merged: Vec<ChatItem> = by_id.into_values().collect();
    merged.sort_by(ChatItem::cmp_newest_first);

    if let Some(placeholder) = empty_state {
        if !merged.iter().any(ChatItem::is_message) {
            merged.push(placeholder);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{IndicatorKind, MessageStatus, Role};

    fn message(id: &str, ts: u64) -> ChatItem {
        ChatItem::Message {
            id: id.into(),
            role: Role::Partner,
            content: format!("m-{id}"),
            timestamp_ms: ts,
            status: MessageStatus::Sent,
        }
    }

    fn indicator(id: &str, ts: u64) -> ChatItem {
        ChatItem::Indicator {
            id: id.into(),
            kind: IndicatorKind::StageEntered,
            timestamp_ms: ts,
        }
    }

    fn ids(items: &[ChatItem]) -> Vec<&str> {
        items.iter().map(|i| i.id().as_str()).collect()
    }

    #[test]
    fn orders_newest_first() {
        let pages = vec![vec![message("a", 100), message("c", 300), message("b", 200)]];
        let merged = merge_pages(&pages, None);
        assert_eq!(ids(&merged), ["c", "b", "a"]);
    }

    #[test]
    fn identical_timestamps_tiebreak_on_id_desc() {
        // Two messages share timestamp T; "b" must precede "a" on every run.
        let pages = vec![vec![message("a", 500)], vec![message("b", 500)]];
        for _ in 0..10 {
            let merged = merge_pages(&pages, None);
            assert_eq!(ids(&merged), ["b", "a"]);
        }
    }

    #[test]
    fn dedup_keeps_single_occurrence() {
        // The same id arrives via live append and via pagination.
        let live = vec![message("x", 900), message("y", 901)];
        let paged = vec![message("w", 100), message("x", 900)];
        let merged = merge_pages(&[live, paged], None);

        assert_eq!(ids(&merged), ["y", "x", "w"]);
    }

    #[test]
    fn dedup_later_instance_wins() {
        let mut updated = message("x", 900);
        if let ChatItem::Message { status, .. } = &mut updated {
            *status = MessageStatus::Delivered;
        }
        let pages = vec![vec![message("x", 900)], vec![updated.clone()]];

        let merged = merge_pages(&pages, None);
        assert_eq!(merged, vec![updated]);
    }

    #[test]
    fn conflicting_duplicate_is_last_write_wins() {
        // Same id, different timestamp: invariant violation, but the render
        // path still gets a timeline.
        let pages = vec![vec![message("x", 100)], vec![message("x", 200)]];
        let merged = merge_pages(&pages, None);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].timestamp_ms(), 200);
    }

    #[test]
    fn empty_state_injected_only_without_messages() {
        let pages = vec![vec![indicator("i1", 100), indicator("i2", 200)]];
        let merged = merge_pages(&pages, Some(ChatItem::empty_state()));

        // Oldest position = tail of the newest-first sequence.
        assert_eq!(ids(&merged), ["i2", "i1", "empty-state"]);
    }

    #[test]
    fn empty_state_vanishes_with_first_message() {
        let pages = vec![vec![indicator("i1", 100), message("m1", 150)]];
        let merged = merge_pages(&pages, Some(ChatItem::empty_state()));

        // The placeholder is gone and the real items keep their positions.
        assert_eq!(ids(&merged), ["m1", "i1"]);
    }

    #[test]
    fn empty_state_in_raw_page_is_dropped() {
        let pages = vec![vec![ChatItem::empty_state(), indicator("i1", 100)]];
        let merged = merge_pages(&pages, None);
        assert_eq!(ids(&merged), ["i1"]);
    }

    #[test]
    fn merge_of_no_pages_is_empty() {
        assert!(merge_pages(&[], None).is_empty());
        assert_eq!(
            merge_pages(&[], Some(ChatItem::empty_state())),
            vec![ChatItem::empty_state()]
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn arb_item() -> impl Strategy<Value = ChatItem> {
            // Small id/timestamp spaces force collisions.
            ("[a-e]{1,2}", 0u64..5).prop_map(|(id, ts)| message(&id, ts))
        }

        proptest! {
            /// Output order is identical regardless of page arrangement,
            /// including duplicated timestamps (sort is stable and total).
            #[test]
            fn order_independent_of_page_arrangement(
                items in proptest::collection::vec(arb_item(), 0..20),
                split in 0usize..20,
            ) {
                // Dedup conflicting ids up front: determinism is only
                // promised for well-formed input sets.
                let mut seen = std::collections::HashSet::new();
                let items: Vec<_> = items
                    .into_iter()
                    .filter(|i| seen.insert(i.id().clone()))
                    .collect();

                let split = split.min(items.len());
                let (front, back) = items.split_at(split);

                let forward = merge_pages(&[front.to_vec(), back.to_vec()], None);
                let reversed = merge_pages(&[back.to_vec(), front.to_vec()], None);
                let single = merge_pages(&[items.clone()], None);

                prop_assert_eq!(&forward, &reversed);
                prop_assert_eq!(&forward, &single);

                // And the order really is newest-first with id-desc ties.
                for pair in forward.windows(2) {
                    prop_assert!(
                        pair[0].cmp_newest_first(&pair[1]) == std::cmp::Ordering::Less
                    );
                }
            }

            /// Every id in the input appears exactly once in the output.
            #[test]
            fn dedup_exactly_once(
                items in proptest::collection::vec(arb_item(), 0..20),
            ) {
                let merged = merge_pages(&[items.clone(), items.clone()], None);
                let mut out_ids: Vec<_> = merged.iter().map(|i| i.id().clone()).collect();
                out_ids.sort();
                out_ids.dedup();
                prop_assert_eq!(out_ids.len(), merged.len());

                let distinct: std::collections::HashSet<_> =
                    items.iter().map(|i| i.id().clone()).collect();
                prop_assert_eq!(merged.len(), distinct.len());
            }
        }
    }
}
