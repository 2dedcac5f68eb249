//! End-to-end lifecycle of a tweet row through the guarded status
//! machine, driven the way the HTTP handlers drive it.

use chrono::{Duration, Utc};
use tweetwise_db::Database;

fn setup() -> (Database, String) {
    let db = Database::open_in_memory().unwrap();
    let uid = uuid::Uuid::new_v4().to_string();
    db.create_user(&uid, "lifecycle@example.com", "$argon2id$hash")
        .unwrap();
    (db, uid)
}

#[test]
fn draft_schedule_cancel_reschedule_send() {
    let (db, uid) = setup();
    db.insert_tweet("t1", &uid, "shipping soon", "draft").unwrap();

    let first = tweetwise_db::timestamp(Utc::now() + Duration::hours(1));
    assert!(db.mark_scheduled("t1", &uid, &first).unwrap());
    // double-schedule loses the guard
    assert!(!db.mark_scheduled("t1", &uid, &first).unwrap());

    assert!(db.cancel_schedule("t1", &uid).unwrap());
    let row = db.get_tweet("t1", &uid).unwrap().unwrap();
    assert_eq!(row.status, "draft");
    assert!(row.scheduled_for.is_none());

    let second = tweetwise_db::timestamp(Utc::now() + Duration::days(2));
    assert!(db.mark_scheduled("t1", &uid, &second).unwrap());
    assert!(db.mark_sent("t1", &uid, "1850000000000000001").unwrap());

    let row = db.get_tweet("t1", &uid).unwrap().unwrap();
    assert_eq!(row.status, "sent");
    assert!(row.scheduled_for.is_none());
    assert_eq!(row.twitter_tweet_id.as_deref(), Some("1850000000000000001"));

    // terminal: no further writes land
    assert!(!db.cancel_schedule("t1", &uid).unwrap());
    assert!(!db.mark_sent("t1", &uid, "other").unwrap());
    assert!(!db.update_tweet_content("t1", &uid, "rewrite").unwrap());
}

#[test]
fn deleting_a_user_cascades_to_tweets_and_tokens() {
    let (db, uid) = setup();
    db.insert_tweet("t1", &uid, "orphan-to-be", "draft").unwrap();
    db.upsert_twitter_tokens("r1", &uid, "acc", None, "42", "wise", "Wise", None)
        .unwrap();

    db.with_conn_mut(|conn| {
        conn.execute("DELETE FROM users WHERE id = ?1", [uid.as_str()])?;
        Ok(())
    })
    .unwrap();

    let tweets: i64 = db
        .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM tweets", [], |r| r.get(0))?))
        .unwrap();
    let tokens: i64 = db
        .with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM twitter_tokens", [], |r| r.get(0))?)
        })
        .unwrap();
    assert_eq!(tweets, 0);
    assert_eq!(tokens, 0);
}
