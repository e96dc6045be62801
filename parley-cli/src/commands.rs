//! Subcommand implementations
//!
//! Each command returns its output as a value so `main` only decides how to
//! print it.

use anyhow::{anyhow, bail, Context, Result};
use futures::StreamExt;
use parley_core::core_codec::{
    decode_content, encode_content, CodecRegistry, Compression, Content, EncodedContent,
    Reaction, ReactionAction, ReactionCodec, ReactionSchema, SendOptions,
};
use parley_core::core_dm::adapters::MemoryNetwork;
use parley_core::core_dm::{Client, Dm, MessageQuery, SortDirection, StreamState};
use parley_core::Config;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Content to encode
pub enum EncodeInput {
    Text(String),
    Reaction {
        reference: String,
        content: String,
        action: String,
        schema: String,
    },
}

/// Encode content into hex envelope bytes
pub fn encode(input: EncodeInput, compression: Option<&str>) -> Result<String> {
    let registry = CodecRegistry::with_standard_codecs();

    let (content, mut options) = match input {
        EncodeInput::Text(text) => (Content::from(text), SendOptions::new()),
        EncodeInput::Reaction {
            reference,
            content,
            action,
            schema,
        } => {
            let reaction = Reaction::new(
                reference,
                ReactionAction::parse(&action),
                content,
                ReactionSchema::parse(&schema),
            );
            (
                Content::from(reaction),
                SendOptions::new().content_type(ReactionCodec::content_type_id()),
            )
        }
    };

    if let Some(compression) = compression {
        let compression: Compression = compression
            .parse()
            .map_err(|e| anyhow!("{}", e))?;
        options = options.compression(compression);
    }

    let encoded = encode_content(&registry, &content, Some(&options))?;
    debug!(content_type = %encoded.content_type, "Encoded");
    Ok(hex::encode(encoded.to_bytes()?))
}

/// Decode hex envelope bytes into a JSON description
pub fn decode(hex_bytes: &str, config: &Config) -> Result<Value> {
    let bytes = hex::decode(hex_bytes.trim()).context("envelope is not valid hex")?;
    let encoded = EncodedContent::from_bytes(&bytes)?;

    let registry = CodecRegistry::with_standard_codecs();
    let content = decode_content(&registry, &encoded, config.codec.max_decompressed_bytes)?;

    Ok(json!({
        "content_type": encoded.content_type.to_string(),
        "parameters": encoded.parameters,
        "fallback": encoded.fallback,
        "compression": encoded.compression,
        "content": content,
    }))
}

/// Outcome of [`demo`]
#[derive(Debug)]
pub struct DemoReport {
    pub channel_id: String,
    pub topic: String,
    /// Rendered history as seen by `bo`, oldest first
    pub history: Vec<String>,
    /// Messages `bo` received over the live stream
    pub streamed: Vec<String>,
}

/// Run a two-party exchange over the in-memory substrate
pub async fn demo(config: &Config) -> Result<DemoReport> {
    let network = MemoryNetwork::new();
    let registry = Arc::new(CodecRegistry::with_standard_codecs());

    let alix_client = Client::new("alix", config.clone())?.with_registry(Arc::clone(&registry));
    let bo_client = Client::new("bo", config.clone())?.with_registry(registry);

    let alix = Dm::new(network.find_or_create_dm("alix", "bo"), Arc::new(alix_client));
    let bo = Dm::new(network.find_or_create_dm("bo", "alix"), Arc::new(bo_client));
    info!(channel = %alix.id(), "Demo channel ready");

    let mut stream = bo.stream_messages();
    let registered = tokio::time::timeout(Duration::from_secs(1), async {
        while stream.state() == StreamState::Starting {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    if registered.is_err() || stream.state() != StreamState::Active {
        bail!("stream registration failed");
    }

    let greeting = alix.send(&Content::from("gm bo"), None).await?;
    bo.send(&Content::from("gm alix"), None).await?;

    let reaction = Reaction::new(greeting, ReactionAction::Added, "☕", ReactionSchema::Unicode);
    let options = SendOptions::new()
        .content_type(ReactionCodec::content_type_id())
        .compression(Compression::Deflate);
    bo.send(&Content::from(reaction), Some(&options)).await?;

    let mut streamed = Vec::new();
    for _ in 0..3 {
        match tokio::time::timeout(Duration::from_secs(1), stream.next()).await {
            Ok(Some(message)) => {
                let message = message?;
                streamed.push(line(&message.sender_inbox_id, &message.content, message.fallback()));
            }
            Ok(None) => break,
            Err(_) => bail!("stream stalled"),
        }
    }
    stream.cancel();

    let history = bo
        .messages(&MessageQuery::new().direction(SortDirection::Ascending))?
        .into_iter()
        .map(|message| line(&message.sender_inbox_id, &message.content, message.fallback()))
        .collect();

    Ok(DemoReport {
        channel_id: bo.id().to_string(),
        topic: bo.topic(),
        history,
        streamed,
    })
}

/// `sender: text`, using the fallback for non-text content
fn line(sender: &str, content: &Content, fallback: Option<&str>) -> String {
    let body = match content {
        Content::Text(text) => text.clone(),
        _ => fallback
            .map(str::to_string)
            .unwrap_or_else(|| format!("<{}>", content.kind())),
    };
    format!("{}: {}", sender, body)
}
