use std::io::{self, BufRead};

use anyhow::{Context, Result};
use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde::Deserialize;
use thiserror::Error;
use tokio::{
    fs::File,
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};

use crate::{
    config::FeedSource,
    dom::{Document, DomError, NodeId, NodeSpec},
    infrastructure::shutdown::ShutdownListener,
    relay::{RelayEnvelope, RelayRequest},
};

/// One line of the host feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HostEvent {
    Snapshot {
        root: NodeSpec,
    },
    Mutations {
        records: Vec<HostMutation>,
    },
    Relay {
        #[serde(default)]
        id: Option<String>,
        request: RelayRequest,
    },
}

/// Element references are `id` attribute values; a missing parent means the
/// document body.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum HostMutation {
    Insert {
        #[serde(default)]
        parent: Option<String>,
        #[serde(default)]
        before: Option<String>,
        node: NodeSpec,
    },
    Remove {
        target: String,
    },
}

/// Events that touch the document, in feed order.
#[derive(Debug, Clone)]
pub enum DocumentEvent {
    Snapshot(NodeSpec),
    Mutations(Vec<HostMutation>),
}

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no connected element with id {0:?}")]
    UnknownElement(String),
    #[error(transparent)]
    Dom(#[from] DomError),
}

pub type LineStream = BoxStream<'static, io::Result<String>>;

pub struct HostChannels {
    pub document: mpsc::Sender<DocumentEvent>,
    pub relay: mpsc::Sender<RelayEnvelope>,
}

/// Replaces the body's attributes, text and children with the snapshot's.
pub fn load_snapshot(doc: &mut Document, root: &NodeSpec) -> Result<(), DomError> {
    let body = doc.root();
    for child in doc.children(body).to_vec() {
        doc.remove(child)?;
    }
    doc.set_text(body, &root.text)?;
    doc.clear_attrs(body)?;
    for (name, value) in &root.attrs {
        doc.set_attr(body, name, value)?;
    }
    for child in &root.children {
        let node = doc.build(child);
        doc.append_child(body, node)?;
    }
    Ok(())
}

pub fn apply_mutation(doc: &mut Document, mutation: &HostMutation) -> Result<(), HostError> {
    match mutation {
        HostMutation::Insert {
            parent,
            before,
            node,
        } => {
            let parent = match parent {
                Some(id) => lookup(doc, id)?,
                None => doc.root(),
            };
            let before = before.as_deref().map(|id| lookup(doc, id)).transpose()?;
            let node = doc.build(node);
            doc.insert_before(parent, node, before)?;
        }
        HostMutation::Remove { target } => {
            let target = lookup(doc, target)?;
            doc.remove(target)?;
        }
    }
    Ok(())
}

fn lookup(doc: &Document, id: &str) -> Result<NodeId, HostError> {
    doc.element_by_id(id)
        .ok_or_else(|| HostError::UnknownElement(id.to_string()))
}

pub async fn open_feed(source: &FeedSource) -> Result<LineStream> {
    match source {
        FeedSource::Stdin => stdin_lines(),
        FeedSource::File(path) => {
            let file = File::open(path)
                .await
                .with_context(|| format!("failed to open host feed {}", path.display()))?;
            Ok(reader_lines(BufReader::new(file)))
        }
    }
}

pub fn reader_lines<R>(reader: R) -> LineStream
where
    R: tokio::io::AsyncBufRead + Unpin + Send + 'static,
{
    stream::unfold(reader.lines(), |mut lines| async move {
        lines.next_line().await.transpose().map(|line| (line, lines))
    })
    .boxed()
}

// Blocking reads live on a plain thread so a pending read never holds up
// runtime shutdown.
fn stdin_lines() -> Result<LineStream> {
    let (tx, rx) = mpsc::channel::<io::Result<String>>(64);
    std::thread::Builder::new()
        .name("host-feed-stdin".into())
        .spawn(move || {
            for line in io::stdin().lock().lines() {
                let failed = line.is_err();
                if tx.blocking_send(line).is_err() || failed {
                    break;
                }
            }
        })
        .context("failed to spawn stdin reader")?;
    Ok(stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|line| (line, rx)) }).boxed())
}

/// Reads the feed until it ends or shutdown, routing each event. Returns the
/// number of events accepted.
pub async fn pump(
    mut lines: LineStream,
    channels: HostChannels,
    mut shutdown: ShutdownListener,
) -> Result<usize> {
    let mut accepted = 0;
    let mut line_no = 0usize;
    loop {
        let line = tokio::select! {
            line = lines.next() => line,
            _ = shutdown.notified() => {
                tracing::info!(target: "host", "shutdown requested; closing host feed");
                break;
            }
        };
        let Some(line) = line else {
            tracing::info!(target: "host", events = accepted, "host feed ended");
            break;
        };
        let line = line.context("failed to read host feed")?;
        line_no += 1;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let event: HostEvent = match serde_json::from_str(trimmed) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(target: "host", line = line_no, error = %err, "skipping malformed feed line");
                continue;
            }
        };

        let delivered = match event {
            HostEvent::Snapshot { root } => {
                channels.document.send(DocumentEvent::Snapshot(root)).await.is_ok()
            }
            HostEvent::Mutations { records } => channels
                .document
                .send(DocumentEvent::Mutations(records))
                .await
                .is_ok(),
            HostEvent::Relay { id, request } => {
                if channels.relay.send(RelayEnvelope { id, request }).await.is_err() {
                    tracing::warn!(target: "host", line = line_no, "relay service is gone; request dropped");
                }
                true
            }
        };
        if !delivered {
            tracing::warn!(target: "host", "feed processor stopped; no longer reading host feed");
            break;
        }
        accepted += 1;
    }
    Ok(accepted)
}
