use shared::domain::EventDraft;
use storage::Storage;

#[tokio::test]
async fn attendance_round_trip_is_visible_from_profile_queries() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");

    let host = storage.create_user("host@example.com", "Host").await.expect("host");
    let fan = storage.create_user("fan@example.com", "Fan").await.expect("fan");

    let mut created = Vec::new();
    for (name, date, category) in [
        ("Basement Show", "2025-03-01", "Punk"),
        ("Rooftop Set", "2025-03-08", "Electronic"),
        ("Quiet Hour", "2025-03-15", "Classical"),
    ] {
        let event = storage
            .insert_event(
                Some(host),
                &EventDraft {
                    name: name.to_string(),
                    description: "desc".to_string(),
                    image_url: "https://img.example/x.png".to_string(),
                    location: "Denver, CO".to_string(),
                    venue: String::new(),
                    event_date: date.parse().expect("date"),
                    event_time: "09:00 PM".to_string(),
                    category: category.to_string(),
                },
            )
            .await
            .expect("event");
        created.push(event);
    }

    storage
        .insert_attendance(created[2].id, fan)
        .await
        .expect("attend third");
    storage
        .insert_attendance(created[0].id, fan)
        .await
        .expect("attend first");

    let attending = storage.list_attending_events(fan).await.expect("attending");
    let names: Vec<_> = attending.iter().map(|event| event.name.as_str()).collect();
    assert_eq!(names, vec!["Quiet Hour", "Basement Show"]);

    let hosted = storage.list_events_by_owner(host).await.expect("hosted");
    assert_eq!(hosted.len(), 3);
    assert!(storage.list_events_by_owner(fan).await.expect("none").is_empty());
}
