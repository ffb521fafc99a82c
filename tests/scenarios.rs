//! End-to-end scenarios combining the cache core with individual
//! operators, one per characteristic behavior the library promises.

use futures_util::StreamExt;
use reactive_cache::cache::ObservableCache;
use reactive_cache::change::{Change, ChangeReason};
use reactive_cache::changeset::ChangeSet;
use reactive_cache::key_value_collection::SortOptimisations;
use reactive_cache::operators::{DynamicFilter, Page, PageRequest, PageResponse, Sort, TimeExpirer, TreeBuilder};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Clone, Debug, PartialEq)]
struct Adult {
    name: &'static str,
    age: u32,
}

#[tokio::test]
async fn basic_add_update_remove_publishes_one_changeset_per_edit() {
    let cache = ObservableCache::new(|a: &Adult| a.name);
    let mut stream = cache.connect(None);
    assert!(stream.next().await.unwrap().unwrap().is_empty());

    cache.edit(|u| u.add_or_update(Adult { name: "Adult1", age: 50 }));
    let added = stream.next().await.unwrap().unwrap();
    assert_eq!(added.counts().adds, 1);
    assert_eq!(*added.iter().next().unwrap().current(), Adult { name: "Adult1", age: 50 });
    assert_eq!(cache.count(), 1);

    cache.edit(|u| u.add_or_update(Adult { name: "Adult1", age: 51 }));
    let updated = stream.next().await.unwrap().unwrap();
    assert_eq!(updated.counts().updates, 1);
    let change = updated.iter().next().unwrap();
    assert_eq!(change.previous().unwrap().age, 50);
    assert_eq!(change.current().age, 51);

    cache.edit(|u| u.remove_key(&"Adult1"));
    let removed = stream.next().await.unwrap().unwrap();
    assert_eq!(removed.counts().removes, 1);
    assert_eq!(removed.iter().next().unwrap().current().age, 51);
    assert_eq!(cache.count(), 0);
}

#[tokio::test]
async fn add_then_remove_in_one_batch_publishes_nothing() {
    let cache = ObservableCache::new(|a: &Adult| a.name);
    let mut stream = cache.connect(None);
    assert!(stream.next().await.unwrap().unwrap().is_empty());

    cache.edit(|u| {
        u.add_or_update(Adult { name: "Adult1", age: 50 });
        u.remove_key(&"Adult1");
    });
    assert_eq!(cache.count(), 0);

    // No changeset was queued for the net-zero edit; disposing ends the
    // stream cleanly rather than leaving this test waiting forever.
    cache.dispose();
    assert!(stream.next().await.is_none());
}

fn ascending() -> reactive_cache::operators::Comparer<i32> {
    Arc::new(|a: &i32, b: &i32| a.cmp(b))
}

#[test]
fn sort_resorts_wholesale_only_once_the_reset_threshold_is_exceeded() {
    let mut sort = Sort::new(ascending(), SortOptimisations::NONE, 25);

    let mut preload = ChangeSet::new();
    preload.push(Change::add(0, 0));
    sort.process(&preload);

    let mut big_batch = ChangeSet::new();
    for n in 1..=100 {
        big_batch.push(Change::add(n, n));
    }
    let (snapshot, changes) = sort.process(&big_batch);
    assert_eq!(snapshot.reason(), reactive_cache::key_value_collection::SortReason::Reset);
    assert_eq!(changes.counts().adds, 100);
    assert_eq!(snapshot.len(), 101);

    let mut small_batch = ChangeSet::new();
    for n in 101..=124 {
        small_batch.push(Change::add(n, n));
    }
    let (snapshot, changes) = sort.process(&small_batch);
    assert_eq!(snapshot.reason(), reactive_cache::key_value_collection::SortReason::DataChanged);
    assert_eq!(changes.counts().adds, 24);
}

#[test]
fn page_window_tracks_a_sorted_collection_and_reports_the_window_diff() {
    let mut sort = Sort::new(Arc::new(|a: &f64, b: &f64| a.partial_cmp(b).unwrap()), SortOptimisations::NONE, 1000);
    let mut initial = ChangeSet::new();
    for i in 0..100 {
        initial.push(Change::add(i, i as f64));
    }
    let (snapshot, _) = sort.process(&initial);

    let mut page = Page::new();
    let (response, changes) = page.request(PageRequest { page: 2, size: 10 }, &snapshot).unwrap();
    assert_eq!(response, PageResponse { page_size: 10, total_size: 100, page: 2, pages: 10 });
    assert_eq!(changes.counts().adds, 10);
    let before_ids: Vec<i32> = page.current().iter().map(|(k, _)| *k).collect();
    assert_eq!(before_ids, (10..20).collect::<Vec<_>>());

    // Move key 5 from position 5 to position 15, squarely into the
    // current window.
    let mut update = ChangeSet::new();
    update.push(Change::update(5, 15.5, 5.0));
    let (snapshot, _) = sort.process(&update);

    let (response, changes) = page.refresh(&snapshot).unwrap();
    assert_eq!(response.total_size, 100);
    assert_eq!(changes.counts().adds, 1, "the incoming element enters the window");
    assert_eq!(changes.counts().removes, 1, "the element pushed out of the window leaves it");
    assert!(changes.counts().moves >= 1, "items reordered within the window report Moved");
    assert!(page.current().iter().any(|(k, _)| *k == 5));
    assert!(!page.current().iter().any(|(k, _)| *k == 10));
}

#[test]
fn filter_toggling_transitions_membership_via_adds_and_removes_only() {
    let mut filter = DynamicFilter::new(Arc::new(|v: &i32| v % 2 == 0));
    let seed = filter.seed((1..=10).map(|n| (n, n)));
    assert_eq!(seed.counts().adds, 5);
    let mut held: Vec<i32> = filter.current().map(|(_, v)| *v).collect();
    held.sort_unstable();
    assert_eq!(held, vec![2, 4, 6, 8, 10]);

    let transition = filter.set_predicate(Arc::new(|v: &i32| *v > 5));
    assert_eq!(transition.counts().adds, 2, "7 and 9 newly qualify");
    assert_eq!(transition.counts().removes, 2, "2 and 4 no longer qualify");
    assert_eq!(transition.counts().updates, 0, "no item crossing the boundary is re-sent unchanged");

    let mut held: Vec<i32> = filter.current().map(|(_, v)| *v).collect();
    held.sort_unstable();
    assert_eq!(held, vec![6, 7, 8, 9, 10]);
}

#[test]
fn time_expirer_evicts_by_ttl_and_spares_items_with_no_ttl() {
    let mut expirer = TimeExpirer::new(|ttl: &Option<Duration>| *ttl, Duration::from_millis(50));
    let now = Instant::now();

    let mut changes = ChangeSet::new();
    changes.push(Change::add(1, Some(Duration::from_millis(100))));
    changes.push(Change::add(2, Some(Duration::from_millis(200))));
    changes.push(Change::add(3, None));
    expirer.process(&changes, now);

    let after_300ms = now + Duration::from_millis(300);
    let mut evicted = expirer.sweep(now + Duration::from_millis(100));
    evicted.extend(expirer.sweep(now + Duration::from_millis(200)));
    evicted.extend(expirer.sweep(after_300ms));

    let mut evicted = evicted;
    evicted.sort_unstable();
    assert_eq!(evicted, vec![1, 2]);
    assert!(expirer.sweep(after_300ms).is_empty(), "key 3 has no TTL and is never evicted");
}

#[derive(Clone, Debug, PartialEq)]
struct Category {
    id: u32,
    parent_id: Option<u32>,
}

#[test]
fn tree_builder_maintains_a_forest_as_categories_are_added_and_reparented() {
    let mut tree: TreeBuilder<u32, Category> = TreeBuilder::new(|c: &Category| c.parent_id);

    let mut changes = ChangeSet::new();
    changes.push(Change::add(1, Category { id: 1, parent_id: None }));
    changes.push(Change::add(2, Category { id: 2, parent_id: Some(1) }));
    changes.push(Change::add(3, Category { id: 3, parent_id: Some(1) }));
    let out = tree.process(&changes);
    assert_eq!(out.counts().adds, 1, "only the root itself is surfaced");
    assert_eq!(tree.roots().len(), 1);
    assert_eq!(tree.node(&1).unwrap().children().len(), 2);

    // 2 moves from category 1 to category 3.
    let mut reparent = ChangeSet::new();
    reparent.push(Change::update(
        2,
        Category { id: 2, parent_id: Some(3) },
        Category { id: 2, parent_id: Some(1) },
    ));
    tree.process(&reparent);
    assert_eq!(tree.node(&1).unwrap().children().len(), 1);
    assert_eq!(tree.node(&3).unwrap().children().len(), 1);
    assert_eq!(*tree.node(&3).unwrap().children()[0].key(), 2);

    // Removing the root promotes its remaining child back to a root.
    let mut removal = ChangeSet::new();
    removal.push(Change::remove(1, Category { id: 1, parent_id: None }));
    let out = tree.process(&removal);
    assert_eq!(out.counts().removes, 1);
    let mut root_keys: Vec<u32> = tree.roots().iter().map(|n| *n.key()).collect();
    root_keys.sort_unstable();
    assert_eq!(root_keys, vec![3]);
}

#[test]
fn change_reason_display_round_trips_every_variant() {
    for reason in [
        ChangeReason::Add,
        ChangeReason::Update,
        ChangeReason::Remove,
        ChangeReason::Refresh,
        ChangeReason::Moved,
    ] {
        assert!(!reason.to_string().is_empty());
    }
}
