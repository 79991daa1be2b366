use super::*;
use crate::testing::{event, events_with_categories};

fn scenario_events() -> Vec<Event> {
    events_with_categories(&["Rock", "Jazz", "Rock", "Indie", "Jazz"])
}

fn ids(events: &[&Event]) -> Vec<i64> {
    events.iter().map(|event| event.id.0).collect()
}

#[test]
fn default_view_shows_one_page_of_everything() {
    let mut list = EventListController::new();
    list.load(scenario_events());

    assert_eq!(list.categories(), vec!["Rock", "Jazz", "Indie"]);
    assert_eq!(ids(&list.visible()), vec![1, 2, 3]);
    assert!(list.has_more());
    assert_eq!(list.filter().selected_category(), None);
    assert_eq!(list.filter().visible_count(), PAGE_SIZE);
}

#[test]
fn category_filter_shows_matching_events_only() {
    let mut list = EventListController::new();
    list.load(scenario_events());
    list.set_category(Some("Jazz".to_string()));

    assert_eq!(list.filtered_len(), 2);
    assert_eq!(ids(&list.visible()), vec![2, 5]);
    assert!(!list.has_more());
}

#[test]
fn filter_is_exact_and_case_sensitive() {
    let mut list = EventListController::new();
    list.load(events_with_categories(&["Hip Hop", "hip hop", "Hip", "Hip Hop"]));
    list.set_category(Some("Hip Hop".to_string()));
    assert_eq!(ids(&list.visible()), vec![1, 4]);

    list.set_category(Some("rock".to_string()));
    assert!(list.visible().is_empty());
    assert!(!list.has_more());
}

#[test]
fn filtering_preserves_source_order() {
    let mut list = EventListController::new();
    let events = vec![
        event(9, "Rock", None),
        event(2, "Jazz", None),
        event(7, "Rock", None),
        event(4, "Rock", None),
    ];
    list.load(events);
    list.set_category(Some("Rock".to_string()));
    list.load_more();
    assert_eq!(ids(&list.visible()), vec![9, 7, 4]);
}

#[test]
fn load_more_grows_by_exactly_one_page() {
    let categories = ["Rock"; 11];
    let mut list = EventListController::new();
    list.load(events_with_categories(&categories));
    list.set_category(Some("Rock".to_string()));

    for k in 0..5 {
        assert_eq!(list.filter().visible_count(), PAGE_SIZE * (k + 1));
        assert_eq!(
            list.visible().len(),
            (PAGE_SIZE * (k + 1)).min(list.filtered_len())
        );
        assert_eq!(
            list.has_more(),
            list.filter().visible_count() < list.filtered_len()
        );
        list.load_more();
    }

    assert_eq!(list.visible().len(), 11);
    assert!(!list.has_more());
}

#[test]
fn load_more_past_the_end_is_harmless() {
    let mut list = EventListController::new();
    list.load(events_with_categories(&["Rock", "Jazz"]));
    assert!(!list.has_more());

    list.load_more();
    list.load_more();

    assert_eq!(list.visible().len(), 2);
    assert_eq!(list.filter().visible_count(), PAGE_SIZE * 3);
    assert!(!list.has_more());
}

#[test]
fn has_more_is_false_exactly_at_the_boundary() {
    let mut list = EventListController::new();
    list.load(events_with_categories(&["Rock"; PAGE_SIZE]));
    assert!(!list.has_more());

    list.load(events_with_categories(&["Rock"; PAGE_SIZE + 1]));
    assert!(list.has_more());
    list.load_more();
    assert!(!list.has_more());
}

#[test]
fn changing_category_resets_to_one_page() {
    let mut list = EventListController::new();
    list.load(events_with_categories(&["Rock"; 8]));
    list.load_more();
    list.load_more();
    assert_eq!(list.filter().visible_count(), PAGE_SIZE * 3);

    list.set_category(Some("Rock".to_string()));
    assert_eq!(list.filter().visible_count(), PAGE_SIZE);

    list.load_more();
    list.set_category(None);
    assert_eq!(list.filter().visible_count(), PAGE_SIZE);
    assert_eq!(list.filter().selected_category(), None);
}

#[test]
fn setting_the_same_category_twice_is_idempotent() {
    let mut once = EventListController::new();
    once.load(scenario_events());
    once.set_category(Some("Rock".to_string()));

    let mut twice = EventListController::new();
    twice.load(scenario_events());
    twice.set_category(Some("Rock".to_string()));
    twice.set_category(Some("Rock".to_string()));

    assert_eq!(once.filter(), twice.filter());
    assert_eq!(ids(&once.visible()), ids(&twice.visible()));
}

#[test]
fn reload_resets_filter_and_recomputes_categories() {
    let mut list = EventListController::new();
    list.load(scenario_events());
    list.set_category(Some("Indie".to_string()));
    list.load_more();

    list.load(events_with_categories(&["Blues", "Folk", "Blues"]));

    assert_eq!(list.filter(), &FilterState::default());
    assert_eq!(list.categories(), vec!["Blues", "Folk"]);
    assert_eq!(list.visible().len(), 3);
}

#[test]
fn empty_collection_has_no_categories_and_nothing_more() {
    let mut list = EventListController::new();
    list.load(Vec::new());
    assert!(list.categories().is_empty());
    assert!(list.visible().is_empty());
    assert!(!list.has_more());
}
