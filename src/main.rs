use quic_loopback::pump::TRANSFER_BUFFER_SIZE;
use quic_loopback::{Config, Connection, HandshakePump, PumpError, StderrSink, PROTOCOL_VERSION};
use std::env;
use std::process::ExitCode;
use std::sync::Arc;

const APPLICATION_PROTOCOLS: &[u8] = b"\x06proto1\x06proto2";
const CLIENT_ID: [u8; 4] = [1, 0, 0, 0];
const SERVER_ID: [u8; 4] = [2, 0, 0, 0];

struct Options {
    cert: String,
    key: String,
    server_name: Option<String>,
    max_rounds: usize,
    verbose: bool,
}

fn usage(program: &str) {
    println!("QUIC loopback handshake harness");
    println!("===============================\n");
    println!("Usage:");
    println!(
        "  {} [--cert PATH] [--key PATH] [--server-name NAME] [--max-rounds N] [-v]",
        program
    );
}

fn parse_args(args: &[String]) -> Result<Option<Options>, String> {
    let mut options = Options {
        cert: "tests/data/cert.crt".to_string(),
        key: "tests/data/cert.key".to_string(),
        server_name: None,
        max_rounds: quic_loopback::pump::DEFAULT_MAX_ROUNDS,
        verbose: false,
    };

    let mut iter = args.iter().skip(1);
    while let Some(arg) = iter.next() {
        let mut value = |name: &str| {
            iter.next()
                .cloned()
                .ok_or_else(|| format!("{} needs a value", name))
        };

        match arg.as_str() {
            "--cert" => options.cert = value("--cert")?,
            "--key" => options.key = value("--key")?,
            "--server-name" => options.server_name = Some(value("--server-name")?),
            "--max-rounds" => {
                let raw = value("--max-rounds")?;
                options.max_rounds = raw
                    .parse()
                    .map_err(|_| format!("invalid round count: {}", raw))?;
            }
            "-v" | "--verbose" => options.verbose = true,
            "-h" | "--help" => return Ok(None),
            other => return Err(format!("unknown argument: {}", other)),
        }
    }

    Ok(Some(options))
}

fn fail(phase: &str, error: impl std::fmt::Display) -> ExitCode {
    eprintln!("{}: {}", phase, error);
    ExitCode::FAILURE
}

fn main() -> ExitCode {
    quic_loopback::init_logging();

    let args: Vec<String> = env::args().collect();
    let options = match parse_args(&args) {
        Ok(Some(options)) => options,
        Ok(None) => {
            usage(&args[0]);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            usage(&args[0]);
            return fail("arguments", e);
        }
    };

    let mut builder = Config::builder(PROTOCOL_VERSION)
        .load_cert_chain_from_pem_file(&options.cert)
        .load_priv_key_from_pem_file(&options.key)
        .set_application_protos(APPLICATION_PROTOCOLS)
        .verify_peer(false);
    if options.verbose {
        builder = builder.enable_debug_logging(Arc::new(StderrSink));
    }
    let config = match builder.build() {
        Ok(config) => config,
        Err(e) => return fail("config build", e),
    };

    let connections = Connection::connect(options.server_name.as_deref(), &CLIENT_ID, &config)
        .and_then(|client| Ok((client, Connection::accept(&SERVER_ID, None, &config)?)));
    let (mut client, mut server) = match connections {
        Ok(pair) => pair,
        Err(e) => return fail("connection create", e),
    };

    let mut buffer = vec![0u8; TRANSFER_BUFFER_SIZE];
    let result = HandshakePump::new()
        .max_rounds(options.max_rounds)
        .observe(|report| println!("{} sent {} bytes", report.role, report.produced))
        .run(&mut client, &mut server, &mut buffer);

    match result {
        Ok(summary) => {
            println!("connected");
            log::info!(
                "handshake finished in {} rounds ({} client bytes, {} server bytes)",
                summary.rounds,
                summary.initiator_bytes,
                summary.responder_bytes
            );
            log::info!("client stats: {}", client.stats());
            log::info!("server stats: {}", server.stats());
            ExitCode::SUCCESS
        }
        Err(e @ PumpError::InitialSend(_)) | Err(e @ PumpError::EmptyInitialFlight) => fail("send", e),
        Err(e) => fail("recv/send round", e),
    }
}
