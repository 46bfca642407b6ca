use std::fs;
use std::time::Duration;

use framemux_conn::connect;
use framemux_rpc::{Invoker, InvokerConfig, OperationPath};

use crate::cmd::CallArgs;
use crate::exit::{conn_error, rpc_error, CliError, CliResult, FAILURE, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_response, OutputFormat};

pub async fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let path: OperationPath = args
        .operation
        .parse()
        .map_err(|err| CliError::new(USAGE, format!("{err}")))?;
    let payload = resolve_payload(&args)?;

    let (conn, task) = tokio::time::timeout(timeout, connect(&args.path))
        .await
        .map_err(|_| CliError::new(TIMEOUT, format!("connect timed out after {timeout:?}")))?
        .map_err(|err| conn_error("connect failed", err))?;

    let invoker = Invoker::with_config(
        conn.clone(),
        InvokerConfig {
            timeout: Some(timeout),
            ..InvokerConfig::default()
        },
    );
    let result = invoker.invoke(&path, payload).await;

    conn.shutdown();
    if let Err(err) = task.join().await {
        tracing::debug!(error = %err, "connection teardown reported an error");
    }

    let response = result.map_err(|err| rpc_error("call failed", err))?;
    print_response(&path, &response, format);

    Ok(if response.is_success() {
        SUCCESS
    } else {
        FAILURE
    })
}

fn resolve_payload(args: &CallArgs) -> CliResult<Vec<u8>> {
    if let Some(json) = &args.json {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;
        return Ok(json.as_bytes().to_vec());
    }
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn args() -> CallArgs {
        CallArgs {
            path: PathBuf::from("/tmp/unused.sock"),
            operation: "echo/echo".to_string(),
            json: None,
            data: None,
            file: None,
            timeout: "5s".to_string(),
        }
    }

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
        assert_eq!(parse_duration("").unwrap_err().code, USAGE);
    }

    #[test]
    fn json_payload_must_parse() {
        let mut bad = args();
        bad.json = Some("{not json".to_string());
        assert_eq!(resolve_payload(&bad).unwrap_err().code, USAGE);

        let mut good = args();
        good.json = Some(r#"{"x":1}"#.to_string());
        assert_eq!(resolve_payload(&good).unwrap(), br#"{"x":1}"#.to_vec());
    }

    #[test]
    fn missing_payload_is_empty() {
        assert!(resolve_payload(&args()).unwrap().is_empty());
    }
}
