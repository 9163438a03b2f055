use std::time::Duration;

use anyhow::{anyhow, bail, Context};
use docrepo_repository::{
    DeleteTarget, Entity, LiveUpdate, Repository, RepositoryError, Subscription,
};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::complete;
use crate::document::JsonDocument;

const SETTLE: Duration = Duration::from_millis(200);

/// A write read from stdin while watching.
#[derive(Debug, Clone, PartialEq)]
enum WriteCommand {
    Set { id: String, document: JsonDocument },
    Update { id: String, document: JsonDocument },
    Delete { id: String },
}

/// Listen to the collection (or one document) and print every update until
/// `ticks` updates were printed, stdin is exhausted, or Ctrl+C.
pub async fn run(
    repository: &Repository<JsonDocument>,
    id: Option<String>,
    ticks: Option<usize>,
) -> anyhow::Result<()> {
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let subscription: Subscription = match id {
        Some(id) => repository.listen(id, move |update| {
            let _ = tx.send(render_document(update));
        }),
        None => repository.listen_all(move |update| {
            let _ = tx.send(render_collection(update));
        }),
    };
    info!("Watching {}", subscription.target());

    let writer = repository.clone();
    let mut writes = tokio::spawn(async move { apply_stdin(&writer).await });
    let mut writes_done = false;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut printed = 0usize;
    loop {
        tokio::select! {
            line = rx.recv() => {
                let Some(line) = line else { break };
                println!("{}", line);
                printed += 1;
                if ticks.is_some_and(|max| printed >= max) {
                    break;
                }
            }
            result = &mut writes, if !writes_done => {
                writes_done = true;
                match result {
                    Ok(Ok(())) => debug!("stdin closed"),
                    Ok(Err(e)) => warn!("stdin reader failed: {:#}", e),
                    Err(e) => warn!("stdin reader task failed: {}", e),
                }
                // Without a tick limit there is nothing left to wait for
                if ticks.is_none() {
                    drain(&mut rx).await;
                    break;
                }
            }
            _ = &mut ctrl_c => {
                info!("Received Ctrl+C, stopping watch");
                break;
            }
        }
    }

    writes.abort();
    subscription.unsubscribe();
    Ok(())
}

/// Print updates still in flight after the last write, until the listener
/// has been quiet for [`SETTLE`].
async fn drain(rx: &mut mpsc::UnboundedReceiver<String>) {
    while let Ok(Some(line)) = tokio::time::timeout(SETTLE, rx.recv()).await {
        println!("{}", line);
    }
}

async fn apply_stdin(repository: &Repository<JsonDocument>) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        let command = match parse_write(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping {:?}: {:#}", line, e);
                continue;
            }
        };
        if let Err(e) = apply(repository, command).await {
            warn!("Write {:?} failed: {:#}", line, e);
        }
    }

    Ok(())
}

async fn apply(
    repository: &Repository<JsonDocument>,
    command: WriteCommand,
) -> anyhow::Result<()> {
    match command {
        WriteCommand::Set { id, document } => {
            complete(|callback| repository.create(document, Some(id), callback)).await?;
        }
        WriteCommand::Update { id, mut document } => {
            document.set_reference(repository.collection().document(id));
            complete(|callback| repository.update(document, callback)).await?;
        }
        WriteCommand::Delete { id } => {
            complete(|callback| repository.delete(DeleteTarget::id(id), callback)).await?;
        }
    }
    Ok(())
}

/// Parse one stdin line. Blank lines and `#` comments yield `None`.
fn parse_write(line: &str) -> anyhow::Result<Option<WriteCommand>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let mut parts = line.splitn(3, char::is_whitespace);
    let verb = parts.next().unwrap_or_default();
    let id = parts
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("missing document id"))?
        .to_string();
    let body = parts.next().map(str::trim);

    let command = match (verb, body) {
        ("set", Some(body)) => WriteCommand::Set {
            id,
            document: parse_body(body)?,
        },
        ("update", Some(body)) => WriteCommand::Update {
            id,
            document: parse_body(body)?,
        },
        ("delete", None) => WriteCommand::Delete { id },
        ("set" | "update", None) => bail!("{} needs a JSON body", verb),
        ("delete", Some(_)) => bail!("delete takes no body"),
        (other, _) => bail!("unknown command {:?}", other),
    };
    Ok(Some(command))
}

fn parse_body(body: &str) -> anyhow::Result<JsonDocument> {
    match serde_json::from_str(body).context("invalid JSON body")? {
        Value::Object(fields) => Ok(JsonDocument::new(fields)),
        _ => bail!("document body must be a JSON object"),
    }
}

fn render_document(
    update: Result<LiveUpdate<JsonDocument, JsonDocument>, RepositoryError>,
) -> String {
    match update {
        Ok(update) => update
            .data
            .map_or(Value::Null, |document| document.to_json())
            .to_string(),
        Err(e) => format!("error: {}", e),
    }
}

fn render_collection(
    update: Result<LiveUpdate<Vec<JsonDocument>, JsonDocument>, RepositoryError>,
) -> String {
    let update = match update {
        Ok(update) => update,
        Err(e) => return format!("error: {}", e),
    };

    let count = update.data.as_ref().map_or(0, Vec::len);
    let changes: Vec<String> = update
        .changes
        .into_iter()
        .flatten()
        .map(|change| {
            let id = change
                .data
                .as_ref()
                .and_then(|document| document.id())
                .unwrap_or("?")
                .to_string();
            format!(
                "{:?} {} ({:?} -> {:?})",
                change.change_type, id, change.old_index, change.new_index
            )
        })
        .collect();

    format!("{} document(s): {}", count, changes.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docrepo_repository::{Change, ChangeType, Changeset, DocumentReference};
    use serde_json::json;

    fn document(id: &str, body: Value) -> JsonDocument {
        let mut document: JsonDocument = serde_json::from_value(body).unwrap();
        let reference: DocumentReference =
            serde_json::from_value(json!({ "collection_path": "notes", "id": id })).unwrap();
        document.set_reference(reference);
        document
    }

    #[test]
    fn test_parse_write_commands() {
        assert_eq!(
            parse_write(r#"set n1 {"title": "hi"}"#).unwrap(),
            Some(WriteCommand::Set {
                id: "n1".to_string(),
                document: serde_json::from_value(json!({"title": "hi"})).unwrap(),
            })
        );
        assert_eq!(
            parse_write("delete n1").unwrap(),
            Some(WriteCommand::Delete {
                id: "n1".to_string()
            })
        );
        assert!(matches!(
            parse_write(r#"update n2 {"n": 1}"#).unwrap(),
            Some(WriteCommand::Update { ref id, .. }) if id == "n2"
        ));
    }

    #[test]
    fn test_parse_write_skips_blank_and_comments() {
        assert_eq!(parse_write("   ").unwrap(), None);
        assert_eq!(parse_write("# note").unwrap(), None);
    }

    #[test]
    fn test_parse_write_rejects_malformed() {
        assert!(parse_write("set").is_err());
        assert!(parse_write("set n1").is_err());
        assert!(parse_write("set n1 [1, 2]").is_err());
        assert!(parse_write("set n1 {oops").is_err());
        assert!(parse_write("delete n1 {}").is_err());
        assert!(parse_write("rename n1 n2").is_err());
    }

    #[test]
    fn test_render_document() {
        let update = LiveUpdate {
            data: Some(document("n1", json!({"title": "hi"}))),
            changes: None,
        };
        assert_eq!(render_document(Ok(update)), r#"{"id":"n1","title":"hi"}"#);

        let missing = LiveUpdate {
            data: None,
            changes: None,
        };
        assert_eq!(render_document(Ok(missing)), "null");
    }

    #[test]
    fn test_render_collection() {
        let added = document("n2", json!({}));
        let changes: Changeset<JsonDocument> = vec![Change {
            change_type: ChangeType::Added,
            old_index: None,
            new_index: Some(1),
            data: Some(added.clone()),
        }]
        .into_iter()
        .collect();
        let update = LiveUpdate {
            data: Some(vec![document("n1", json!({})), added]),
            changes: Some(changes),
        };

        assert_eq!(
            render_collection(Ok(update)),
            "2 document(s): Added n2 (None -> Some(1))"
        );
    }

    #[test]
    fn test_render_error() {
        let error = RepositoryError::EmptyBatch {
            operation: "delete",
        };
        assert!(render_collection(Err(error)).starts_with("error: "));
    }
}
