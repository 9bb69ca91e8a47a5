use clap::{App, Arg};
use colored::*;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: &str = "5000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let matches = App::new("domectl")
        .version("0.1.0")
        .about("Send one command to the dome controller and print the reply")
        .arg(
            Arg::with_name("host")
                .long("host")
                .value_name("HOST")
                .help("Controller host address")
                .takes_value(true)
                .default_value(DEFAULT_HOST),
        )
        .arg(
            Arg::with_name("port")
                .short("p")
                .long("port")
                .value_name("PORT")
                .help("Controller port")
                .takes_value(true)
                .default_value(DEFAULT_PORT),
        )
        .arg(
            Arg::with_name("command-id")
                .long("command-id")
                .value_name("ID")
                .help("Correlation id; omitted ids are synthesized server side")
                .takes_value(true)
                .validator(|v| {
                    v.parse::<u64>()
                        .map(|_| ())
                        .map_err(|_| "command id must be a number".to_string())
                }),
        )
        .arg(
            Arg::with_name("COMMAND")
                .help("Command name, e.g. moveAz or statusAMCS")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::with_name("PARAMS")
                .help("Command parameters as a JSON object")
                .index(2),
        )
        .get_matches();

    let host = matches.value_of("host").unwrap_or(DEFAULT_HOST);
    let port = matches.value_of("port").unwrap_or(DEFAULT_PORT);
    let command = matches.value_of("COMMAND").unwrap_or_default();

    let mut message = json!({ "command": command });
    if let Some(params) = matches.value_of("PARAMS") {
        let parsed: Value = serde_json::from_str(params)
            .map_err(|e| format!("parameters are not valid JSON: {e}"))?;
        message["parameters"] = parsed;
    }
    if let Some(id) = matches.value_of("command-id") {
        message["commandId"] = json!(id.parse::<u64>()?);
    }

    let stream = TcpStream::connect(format!("{host}:{port}")).await?;
    let (reader, mut writer) = stream.into_split();
    let mut buf_reader = BufReader::new(reader);

    let line = format!("{message}\r\n");
    writer.write_all(line.as_bytes()).await?;

    let mut reply = String::new();
    buf_reader.read_line(&mut reply).await?;
    let reply: Value = serde_json::from_str(reply.trim())?;

    let response = reply.get("response").and_then(Value::as_i64).unwrap_or(-1);
    let header = if response == 0 {
        format!("OK ({response})").green()
    } else {
        format!("rejected ({response})").red()
    };
    println!("{} {}", header, serde_json::to_string_pretty(&reply)?);

    Ok(())
}
