mod common;

use std::sync::Arc;
use std::time::Duration;

use lantern::http::response::StatusCode;
use lantern::lookup::{LookupError, LookupRecord, Upstream};

async fn collect(upstream: &Upstream, query: &str) -> Result<Vec<LookupRecord>, LookupError> {
    let mut session = upstream.begin(query).await?;
    let mut records = Vec::new();
    while let Some(record) = session.next_record().await? {
        records.push(record);
    }
    Ok(records)
}

#[tokio::test]
async fn test_single_query_round_trip() {
    let (stream, mut seen) = common::fake_lookup_service(|_| vec!["1: {alice} said {hi}".to_string()]);
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let records = collect(&upstream, "alice").await.unwrap();

    assert_eq!(seen.recv().await.unwrap(), "alice");
    assert_eq!(
        records,
        vec![LookupRecord {
            number: "1".to_string(),
            name: "alice".to_string(),
            message: "hi".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_empty_reply() {
    let (stream, _seen) = common::fake_lookup_service(|_| Vec::new());
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    assert!(collect(&upstream, "nobody").await.unwrap().is_empty());
    // The connection is still usable afterwards.
    assert!(collect(&upstream, "again").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_concurrent_queries_get_their_own_replies() {
    let (stream, _seen) = common::fake_lookup_service(common::echo_reply);
    let upstream = Arc::new(Upstream::new(stream, Duration::from_secs(5)));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let upstream = upstream.clone();
        tasks.push(tokio::spawn(async move {
            let query = format!("user{i}");
            let records = collect(&upstream, &query).await.unwrap();
            (query, records)
        }));
    }

    for task in tasks {
        let (query, records) = task.await.unwrap();
        assert_eq!(records.len(), 2);
        for record in records {
            assert_eq!(record.name, query);
            assert!(record.message.ends_with(&query));
        }
    }
}

#[tokio::test]
async fn test_query_with_line_break_is_rejected() {
    let (stream, _seen) = common::fake_lookup_service(common::echo_reply);
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let err = upstream.begin("alice\nbob").await.err().unwrap();
    assert!(matches!(err, LookupError::InvalidQuery));
    assert_eq!(err.status(), StatusCode::BadRequest);

    assert!(matches!(upstream.begin("a\rb").await, Err(LookupError::InvalidQuery)));
}

#[tokio::test]
async fn test_protocol_error_drains_reply() {
    let (stream, _seen) = common::fake_lookup_service(|query| {
        if query == "bad" {
            vec!["garbage".to_string(), "2: {x} said {y}".to_string()]
        } else {
            common::echo_reply(query)
        }
    });
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let err = collect(&upstream, "bad").await.unwrap_err();
    assert!(matches!(err, LookupError::Protocol(ref line) if line == "garbage"));
    assert_eq!(err.status(), StatusCode::InternalServerError);

    let records = collect(&upstream, "good").await.unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.name == "good"));
}

#[tokio::test]
async fn test_timeout_poisons_connection() {
    // Keep the far end open but never answer.
    let (stream, _far_end) = tokio::io::duplex(1024);
    let upstream = Upstream::new(stream, Duration::from_millis(50));

    let mut session = upstream.begin("alice").await.unwrap();
    assert!(matches!(session.next_record().await, Err(LookupError::Timeout)));
    drop(session);

    assert!(matches!(upstream.begin("bob").await, Err(LookupError::Poisoned)));
}

#[tokio::test]
async fn test_abandoned_session_poisons_connection() {
    let (stream, _seen) = common::fake_lookup_service(common::echo_reply);
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let mut session = upstream.begin("alice").await.unwrap();
    assert!(session.next_record().await.unwrap().is_some());
    drop(session);

    assert!(matches!(upstream.begin("bob").await, Err(LookupError::Poisoned)));
}

#[tokio::test]
async fn test_drained_session_keeps_connection_usable() {
    let (stream, _seen) = common::fake_lookup_service(common::echo_reply);
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let mut session = upstream.begin("alice").await.unwrap();
    assert!(session.next_record().await.unwrap().is_some());
    session.drain().await;
    drop(session);

    let records = collect(&upstream, "bob").await.unwrap();
    assert!(records.iter().all(|r| r.name == "bob"));
}

#[tokio::test]
async fn test_end_of_stream_ends_reply() {
    let (stream, mut far_end) = tokio::io::duplex(1024);
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let mut session = upstream.begin("alice").await.unwrap();
    {
        use tokio::io::AsyncWriteExt;
        far_end.write_all(b"5: {alice} said {bye}\n").await.unwrap();
    }
    drop(far_end);

    assert_eq!(session.next_record().await.unwrap().unwrap().number, "5");
    assert!(session.next_record().await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_utf8_record_is_decoded_lossily() {
    let (stream, _seen) = common::fake_lookup_service_raw(|query| {
        if query == "latin1" {
            b"1: {caf\xe9} said {hi}\n\n".to_vec()
        } else {
            format!("2: {{{query}}} said {{ok}}\n\n").into_bytes()
        }
    });
    let upstream = Upstream::new(stream, Duration::from_secs(5));

    let records = collect(&upstream, "latin1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "caf\u{FFFD}");
    assert_eq!(records[0].message, "hi");

    // The connection stays usable for everyone else.
    let records = collect(&upstream, "next").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name, "next");
}
