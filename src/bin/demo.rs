//! dpf-pir-demo: run the two-server protocol in one process
//!
//! Run with:
//! ```bash
//! cargo run --bin dpf-pir-demo -- --num-records 4 --indices 0,2 --output joined
//! cargo run --bin dpf-pir-demo -- --records-file records.txt --indices 5 --mode leader
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use dpf_pir::client::{ClientBuilder, OutputMode, RetrievedOutput};
use dpf_pir::core::{AeadSealer, PirConfig, PirResponse, RequestPair, ResponsePair};
use dpf_pir::server::{DpfPirServer, ServerBuilder};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Mode {
    /// Two independent servers, one request each
    Plain,
    /// One Leader request, Helper share sealed and forwarded
    Leader,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Output {
    Records,
    Joined,
}

#[derive(Parser, Debug)]
#[command(name = "dpf-pir-demo")]
#[command(about = "Retrieve records privately from two in-process PIR servers")]
struct Args {
    /// Number of generated records when no file is given
    #[arg(long, default_value = "4")]
    num_records: usize,

    /// Prefix of generated records
    #[arg(long, default_value = "Element")]
    prefix: String,

    /// File with one record per line
    #[arg(long)]
    records_file: Option<PathBuf>,

    /// Config file (JSON); overrides context string and delimiter
    #[arg(long)]
    config: Option<PathBuf>,

    /// Indices to retrieve, comma separated
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    indices: Vec<i64>,

    #[arg(long, value_enum, default_value = "plain")]
    mode: Mode,

    #[arg(long, value_enum, default_value = "records")]
    output: Output,

    /// Print the base64/JSON framed requests and responses
    #[arg(long)]
    print_wire: bool,
}

fn load_records(args: &Args) -> anyhow::Result<Vec<Vec<u8>>> {
    match &args.records_file {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            Ok(content.lines().map(|l| l.as_bytes().to_vec()).collect())
        }
        None => Ok(dpf_pir::counting_records(&args.prefix, args.num_records)),
    }
}

fn print_output(output: RetrievedOutput) {
    match output {
        RetrievedOutput::Joined(joined) => println!("{}", joined),
        RetrievedOutput::Records(records) => {
            for record in records {
                match String::from_utf8(record) {
                    Ok(text) => println!("{}", text),
                    Err(e) => println!("0x{}", hex::encode(e.into_bytes())),
                }
            }
        }
    }
}

fn run_plain(
    config: PirConfig,
    database: dpf_pir::core::Database,
    output_mode: OutputMode,
    args: &Args,
) -> anyhow::Result<RetrievedOutput> {
    let database = Arc::new(database);
    let server_a = ServerBuilder::new(config.clone()).database(database.clone()).build()?;
    let server_b = ServerBuilder::new(config.clone()).database(database).build()?;

    let client = ClientBuilder::from_config(&config)
        .output_mode(output_mode)
        .build()?;
    let (request1, request2, state) = client.create_plain_requests(&args.indices)?;

    let requests = RequestPair::encode(&request1, &request2)?;
    if args.print_wire {
        println!("{}", requests.to_json()?);
    }
    let (bytes1, bytes2) = requests.request_bytes()?;

    let responses = ResponsePair::encode(
        &server_a.handle_request(&bytes1)?,
        &server_b.handle_request(&bytes2)?,
    )?;
    if args.print_wire {
        println!("{}", responses.to_json()?);
    }
    let (response1, response2) = responses.decode()?;

    Ok(client.handle_response_output(&response1, &response2, &state)?)
}

fn run_leader(
    config: PirConfig,
    database: dpf_pir::core::Database,
    output_mode: OutputMode,
    args: &Args,
) -> anyhow::Result<RetrievedOutput> {
    let database = Arc::new(database);
    let sealer = AeadSealer::generate();

    let helper: Arc<DpfPirServer> = Arc::new(
        ServerBuilder::new(config.clone())
            .helper(sealer.clone())
            .database(database.clone())
            .build()?,
    );
    let leader = ServerBuilder::new(config.clone())
        .leader(move |sealed: &[u8]| -> dpf_pir::core::Result<Vec<u8>> {
            helper
                .handle_request_bytes(sealed)
                .map_err(|e| dpf_pir::core::Error::Internal(e.to_string()))
        })
        .database(database)
        .build()?;

    let client = ClientBuilder::from_config(&config)
        .encrypter(sealer)
        .output_mode(output_mode)
        .build()?;
    let (request, state) = client.create_request(&args.indices)?;
    let request_bytes = request.to_bytes()?;
    tracing::info!(request_bytes = request_bytes.len(), "Sending leader request");

    let response: PirResponse = leader.handle_request(&request_bytes)?;
    let records = client.handle_leader_response(&response, &state)?;
    Ok(client.present(records))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("dpf_pir=info".parse()?))
        .init();

    let args = Args::parse();

    let database = dpf_pir::database_from_records(load_records(&args)?)?;
    let num_records = database.size() as u64;

    let config = match &args.config {
        Some(path) => {
            let loaded = PirConfig::load(path)?;
            anyhow::ensure!(
                loaded.num_elements == num_records,
                "config expects {} records, found {}",
                loaded.num_elements,
                num_records
            );
            loaded
        }
        None => PirConfig::new(num_records),
    };

    let output_mode = match args.output {
        Output::Records => OutputMode::Records,
        Output::Joined => OutputMode::Joined {
            delimiter: config.joined_delimiter.clone(),
        },
    };

    tracing::info!(
        records = database.size(),
        mode = ?args.mode,
        "Running private retrieval"
    );

    let output = match args.mode {
        Mode::Plain => run_plain(config, database, output_mode, &args)?,
        Mode::Leader => run_leader(config, database, output_mode, &args)?,
    };
    print_output(output);

    Ok(())
}
