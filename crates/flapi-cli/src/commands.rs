//! Subcommand implementations.

use anyhow::{anyhow, bail, Context, Result};
use flapi::{codec, Session, SessionEvent, Value};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Split `Class.method`.
fn split_method(qualified: &str) -> Result<(&str, &str)> {
    match qualified.split_once('.') {
        Some((class, method)) if !class.is_empty() && !method.is_empty() => Ok((class, method)),
        _ => bail!("Expected <Class>.<method>, got '{}'", qualified),
    }
}

fn parse_params(params: Option<&str>) -> Result<Value> {
    match params {
        None => Ok(Value::object()),
        Some(raw) => {
            let json: serde_json::Value =
                serde_json::from_str(raw).context("Parameters are not valid JSON")?;
            if !json.is_object() {
                bail!("Parameters must be a JSON object");
            }
            Ok(Value::from(json))
        }
    }
}

fn print_value(value: &Value) -> Result<()> {
    let wire = codec::encode(value)?;
    println!("{}", serde_json::to_string_pretty(&wire)?);
    Ok(())
}

pub async fn call(session: &Session, method: &str, params: Option<&str>) -> Result<()> {
    split_method(method)?;
    let params = parse_params(params)?;
    let result = session.request(None, method, params).await?;
    print_value(&result)
}

pub async fn permissions(session: &Session) -> Result<()> {
    let result = session.get_permissions().await?;
    print_value(&result)
}

/// Print every `signal` emitted by the object `getter` returns, until Ctrl-C
/// or the connection ends.
pub async fn watch(session: &Session, getter: &str, signal: &str) -> Result<()> {
    let (class, method) = split_method(getter)?;
    let target = session
        .class(class)?
        .request_static(method, Value::Null)
        .await?;
    let target = target
        .as_remote()
        .cloned()
        .ok_or_else(|| anyhow!("{} did not return an object", getter))?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let listener = target.connect(signal, move |event| {
        let _ = tx.send(event.args.clone());
        None
    })?;
    info!("Watching {} on {}", signal, target);

    let mut events = session.events();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            Some(args) = rx.recv() => print_value(&args)?,
            event = events.recv() => {
                if let Ok(SessionEvent::Close) = event {
                    bail!("Connection closed");
                }
            }
            _ = &mut ctrl_c => {
                debug!("Shutdown signal received");
                break;
            }
        }
    }

    target.disconnect(signal, listener)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_method() {
        assert_eq!(split_method("Application.get").unwrap(), ("Application", "get"));
        assert!(split_method("get").is_err());
        assert!(split_method(".get").is_err());
        assert!(split_method("Application.").is_err());
    }

    #[test]
    fn test_parse_params() {
        assert_eq!(parse_params(None).unwrap(), Value::object());
        let params = parse_params(Some(r#"{"x": 5}"#)).unwrap();
        assert_eq!(params.get("x").and_then(Value::as_i64), Some(5));
        assert!(parse_params(Some("[1, 2]")).is_err());
        assert!(parse_params(Some("{oops")).is_err());
    }
}
