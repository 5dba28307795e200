use chrono::{TimeZone, Utc};
use stockwatch_core::db::{into_shared, open_db_in_memory, SharedConnection};
use stockwatch_core::repo::alert_repo::{AlertStore, SqliteAlertRepository};
use stockwatch_core::repo::item_repo::{ItemStore, SqliteItemRepository};
use stockwatch_core::{AlertRule, Item, RepoError, ValidationError};
use uuid::Uuid;

fn shared_db() -> SharedConnection {
    into_shared(open_db_in_memory().unwrap())
}

async fn seeded_item(conn: &SharedConnection, name: &str, quantity: i64) -> Item {
    let item = Item::new(name, quantity);
    SqliteItemRepository::new(conn.clone())
        .create_item(&item)
        .await
        .unwrap();
    item
}

#[tokio::test]
async fn create_and_read_back_rule() {
    let conn = shared_db();
    let item = seeded_item(&conn, "Zip ties", 12).await;
    let repo = SqliteAlertRepository::new(conn);

    let rule = AlertRule::new(item.uuid, 10.0, Some("  reorder  ".to_string()));
    repo.create_alert(&rule).await.unwrap();

    let loaded = repo.get_alert(rule.uuid).await.unwrap().unwrap();
    assert_eq!(loaded.item_id, item.uuid);
    assert_eq!(loaded.threshold, 10.0);
    assert_eq!(loaded.name.as_deref(), Some("reorder"));
    assert!(loaded.is_active);
    assert_eq!(loaded.last_sent, None);
}

#[tokio::test]
async fn duplicate_threshold_for_item_is_a_conflict() {
    let conn = shared_db();
    let item = seeded_item(&conn, "Glue", 2).await;
    let repo = SqliteAlertRepository::new(conn);

    repo.create_alert(&AlertRule::new(item.uuid, 5.0, None)).await.unwrap();
    let err = repo
        .create_alert(&AlertRule::new(item.uuid, 5.0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));

    let other = AlertRule::new(item.uuid, 8.0, None);
    repo.create_alert(&other).await.unwrap();
    let mut moved = other.clone();
    moved.threshold = 5.0;
    let err = repo.update_alert(&moved).await.unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[tokio::test]
async fn rule_for_unknown_item_is_not_found() {
    let repo = SqliteAlertRepository::new(shared_db());
    let err = repo
        .create_alert(&AlertRule::new(Uuid::new_v4(), 1.0, None))
        .await
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "item", .. }));
}

#[tokio::test]
async fn negative_threshold_is_rejected() {
    let conn = shared_db();
    let item = seeded_item(&conn, "Oil", 1).await;
    let repo = SqliteAlertRepository::new(conn);

    let err = repo
        .create_alert(&AlertRule::new(item.uuid, -1.0, None))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepoError::Validation(ValidationError::InvalidThreshold(_))
    ));
}

#[tokio::test]
async fn active_listing_joins_item_quantity_and_skips_inactive_rules() {
    let conn = shared_db();
    let low = seeded_item(&conn, "Nuts", 3).await;
    let high = seeded_item(&conn, "Bolts", 90).await;
    let repo = SqliteAlertRepository::new(conn);

    repo.create_alert(&AlertRule::new(low.uuid, 5.0, None)).await.unwrap();
    repo.create_alert(&AlertRule::new(high.uuid, 5.0, None)).await.unwrap();
    let mut disabled = AlertRule::new(high.uuid, 50.0, None);
    disabled.is_active = false;
    repo.create_alert(&disabled).await.unwrap();

    let active = repo.list_active_alerts_with_item_quantity().await.unwrap();
    assert_eq!(active.len(), 2);
    let nuts = active.iter().find(|alert| alert.item_name == "Nuts").unwrap();
    assert_eq!(nuts.quantity, 3);

    let for_high = repo.list_active_alerts_for_item(high.uuid).await.unwrap();
    assert_eq!(for_high.len(), 1);
    assert_eq!(for_high[0].quantity, 90);

    let all_for_high = repo.list_alerts_for_item(high.uuid).await.unwrap();
    assert_eq!(all_for_high.len(), 2);
}

#[tokio::test]
async fn last_sent_is_set_and_cleared_in_batches() {
    let conn = shared_db();
    let item = seeded_item(&conn, "Tape", 0).await;
    let repo = SqliteAlertRepository::new(conn);
    let first = AlertRule::new(item.uuid, 1.0, None);
    let second = AlertRule::new(item.uuid, 2.0, None);
    repo.create_alert(&first).await.unwrap();
    repo.create_alert(&second).await.unwrap();

    let at = Utc.with_ymd_and_hms(2026, 5, 4, 8, 30, 0).unwrap();
    let changed = repo
        .set_last_sent(&[first.uuid, second.uuid], Some(at))
        .await
        .unwrap();
    assert_eq!(changed, 2);
    assert_eq!(repo.get_alert(first.uuid).await.unwrap().unwrap().last_sent, Some(at));

    repo.set_last_sent(&[second.uuid], None).await.unwrap();
    assert_eq!(repo.get_alert(second.uuid).await.unwrap().unwrap().last_sent, None);
    assert_eq!(repo.get_alert(first.uuid).await.unwrap().unwrap().last_sent, Some(at));

    assert_eq!(repo.set_last_sent(&[], Some(at)).await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_missing_rule_is_not_found() {
    let repo = SqliteAlertRepository::new(shared_db());
    let err = repo.delete_alert(Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "alert", .. }));
}

#[tokio::test]
async fn quantity_updates_require_an_existing_item() {
    let conn = shared_db();
    let item = seeded_item(&conn, "Pins", 4).await;
    let items = SqliteItemRepository::new(conn);

    items.set_item_quantity(item.uuid, 7).await.unwrap();
    assert_eq!(items.get_item(item.uuid).await.unwrap().unwrap().quantity, 7);

    let err = items.set_item_quantity(Uuid::new_v4(), 1).await.unwrap_err();
    assert!(matches!(err, RepoError::NotFound { entity: "item", .. }));
}
