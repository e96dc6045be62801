/*
    Direct Channel Integration Tests

    Two clients talking over the in-memory substrate:
    - consent promotion on first send and legacy dual-stack mirroring
    - history queries (time window, status, direction, limit)
    - batch resilience against undecodable records
*/

use std::sync::Arc;

use parley_core::core_codec::{ContentTypeId, EncodedContent, JsonCodec, SendOptions};
use parley_core::core_dm::{
    ConsentState, DeliveryStatus, DeliveryStatusFilter, DmError, MessageQuery, SortDirection,
    Timestamp,
};
use parley_core::test_utils::{
    dm_pair, envelope_bytes, text_envelope_bytes, DmPairBuilder, LegacyCall,
    RecordingLegacyContacts,
};
use parley_core::Content;

#[tokio::test]
async fn test_first_send_allows_channel() -> anyhow::Result<()> {
    let pair = dm_pair();
    assert_eq!(pair.alix.dm.consent_state()?, ConsentState::Unknown);

    let id = pair.alix.dm.send(&Content::from("hi"), None).await?;
    assert!(!id.is_empty());
    assert_eq!(pair.alix.dm.consent_state()?, ConsentState::Allowed);

    // The receiver's consent is its own decision
    assert_eq!(pair.bo.dm.consent_state()?, ConsentState::Unknown);

    let received = pair.bo.dm.messages(&MessageQuery::new())?;
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].id, id);
    assert_eq!(received[0].content.as_text(), Some("hi"));
    Ok(())
}

#[tokio::test]
async fn test_dual_stack_mirrors_consent() -> anyhow::Result<()> {
    let legacy = Arc::new(RecordingLegacyContacts::default());
    let pair = DmPairBuilder::new()
        .with_alix_legacy_contacts(legacy.clone())
        .build();
    let id = pair.alix.dm.id().to_string();

    assert!(pair.alix.client.has_legacy_stack());
    pair.alix.dm.send(&Content::from("hi"), None).await?;
    pair.alix.dm.send(&Content::from("again"), None).await?;
    pair.alix.dm.update_consent_state(ConsentState::Unknown).await?;
    pair.alix.dm.update_consent_state(ConsentState::Denied).await?;

    assert_eq!(
        legacy.calls(),
        vec![LegacyCall::Allow(vec![id.clone()]), LegacyCall::Deny(vec![id])]
    );
    assert_eq!(pair.alix.dm.consent_state()?, ConsentState::Denied);
    Ok(())
}

#[tokio::test]
async fn test_failed_send_keeps_consent_and_is_listed_as_failed() -> anyhow::Result<()> {
    let pair = dm_pair();
    pair.alix.conversation.set_send_failure(true);

    let err = pair.alix.dm.send(&Content::from("lost"), None).await.unwrap_err();
    assert!(matches!(err, DmError::Substrate(_)));
    assert_eq!(pair.alix.dm.consent_state()?, ConsentState::Allowed);

    let failed = pair
        .alix
        .dm
        .messages(&MessageQuery::new().delivery_status(DeliveryStatusFilter::Failed))?;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].content.as_text(), Some("lost"));
    Ok(())
}

#[tokio::test]
async fn test_history_time_window() -> anyhow::Result<()> {
    let pair = dm_pair();
    for (ms, text) in [(1_000i64, "one"), (2_000, "two"), (3_000, "three")] {
        pair.bo
            .conversation
            .inject_raw_at("alix", ms * 1_000_000, text_envelope_bytes(text));
    }

    let query = MessageQuery::new()
        .after(Timestamp(2_000))
        .before(Timestamp(3_000));
    let window = pair.bo.dm.messages(&query)?;
    assert_eq!(window.len(), 1);
    assert_eq!(window[0].content.as_text(), Some("two"));
    assert_eq!(window[0].sent_at(), Timestamp(2_000));

    let options = pair.bo.conversation.last_query().expect("query recorded");
    assert_eq!(options.sent_after_ns, Some(2_000_000_000));
    assert_eq!(options.sent_before_ns, Some(3_000_000_000));
    assert_eq!(options.delivery_status, None);
    assert_eq!(options.direction, Some(SortDirection::Descending));
    Ok(())
}

#[tokio::test]
async fn test_history_direction_and_limit() -> anyhow::Result<()> {
    let pair = dm_pair();
    for text in ["a", "b", "c", "d"] {
        pair.alix.dm.send(&Content::from(text), None).await?;
    }

    let newest: Vec<String> = pair
        .bo
        .dm
        .messages(&MessageQuery::new().limit(2))?
        .into_iter()
        .filter_map(|m| m.content.as_text().map(str::to_string))
        .collect();
    assert_eq!(newest, vec!["d", "c"]);

    let oldest: Vec<String> = pair
        .bo
        .dm
        .messages(&MessageQuery::new().limit(3).direction(SortDirection::Ascending))?
        .into_iter()
        .filter_map(|m| m.content.as_text().map(str::to_string))
        .collect();
    assert_eq!(oldest, vec!["a", "b", "c"]);
    Ok(())
}

#[tokio::test]
async fn test_history_status_filter() -> anyhow::Result<()> {
    let pair = dm_pair();
    pair.alix.dm.send(&Content::from("sent"), None).await?;
    pair.alix.dm.prepare_message(&Content::from("queued"), None).await?;

    let unpublished = pair
        .alix
        .dm
        .messages(&MessageQuery::new().delivery_status(DeliveryStatusFilter::Unpublished))?;
    assert_eq!(unpublished.len(), 1);
    assert_eq!(unpublished[0].delivery_status, DeliveryStatus::Unpublished);

    let published = pair
        .alix
        .dm
        .messages(&MessageQuery::new().delivery_status(DeliveryStatusFilter::Published))?;
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].content.as_text(), Some("sent"));

    assert_eq!(pair.alix.dm.messages(&MessageQuery::new())?.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_history_skips_undecodable_records() -> anyhow::Result<()> {
    let pair = dm_pair();
    let poll = ContentTypeId::new("example.org", "poll", 1, 0);

    pair.alix.dm.send(&Content::from("one"), None).await?;
    pair.bo.conversation.inject_raw("alix", vec![0xff, 0x00]);
    pair.alix.dm.send(&Content::from("two"), None).await?;
    pair.bo.conversation.inject_raw(
        "alix",
        envelope_bytes(&EncodedContent::new(poll, br#"{"q":"lunch?"}"#.to_vec())),
    );
    pair.alix.dm.send(&Content::from("three"), None).await?;

    // Five records: one malformed, one without a codec
    let decoded = pair.bo.dm.messages(&MessageQuery::new())?;
    assert_eq!(decoded.len(), 3);

    // The unknown type still parses as an envelope
    let decrypted = pair.bo.dm.decrypted_messages(&MessageQuery::new())?;
    assert_eq!(decrypted.len(), 4);
    assert!(decrypted
        .iter()
        .any(|m| m.encoded_content.content_type.type_id == "poll"));
    Ok(())
}

#[tokio::test]
async fn test_custom_codec_registered_after_channel_creation() -> anyhow::Result<()> {
    let pair = dm_pair();
    let poll = ContentTypeId::new("example.org", "poll", 1, 0);
    let value = serde_json::json!({ "q": "lunch?" });

    for side in [&pair.alix, &pair.bo] {
        side.client
            .register(JsonCodec::new(poll.clone()).with_fallback("Sent a poll"));
    }

    let options = SendOptions::new().content_type(poll.clone());
    let content = Content::Custom {
        content_type: poll,
        value: value.clone(),
    };
    pair.alix.dm.send(&content, Some(&options)).await?;

    let received = pair.bo.dm.messages(&MessageQuery::new())?;
    assert_eq!(received[0].content, content);
    assert_eq!(received[0].fallback(), Some("Sent a poll"));
    Ok(())
}

#[tokio::test]
async fn test_overflowing_query_rejected() {
    let pair = dm_pair();

    let err = pair
        .bo
        .dm
        .messages(&MessageQuery::new().before(Timestamp(u64::MAX)))
        .unwrap_err();
    assert!(matches!(err, DmError::InvalidQuery(_)));
    assert!(pair.bo.conversation.last_query().is_none());
}
