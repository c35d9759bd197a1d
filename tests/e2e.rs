//! End-to-end tests for two-server DPF PIR
//!
//! Tests the full pipeline: database builder -> client -> two plain servers -> client

use std::sync::Arc;

use dpf_pir::client::{ClientBuilder, DpfPirClient, OutputMode, RetrievedOutput};
use dpf_pir::core::{
    Database, PirConfig, PirResponse, RequestPair, ResponsePair, StatusKind,
};
use dpf_pir::server::{BucketStore, CuckooTable, DpfPirServer, ServerBuilder};
use dpf_pir::{counting_database, counting_records};

struct Deployment {
    client: DpfPirClient,
    server_a: DpfPirServer,
    server_b: DpfPirServer,
}

fn deploy(database: Database, output_mode: OutputMode) -> Deployment {
    let config = PirConfig::new(database.size() as u64);
    let database = Arc::new(database);
    Deployment {
        client: ClientBuilder::from_config(&config)
            .output_mode(output_mode)
            .build()
            .unwrap(),
        server_a: ServerBuilder::new(config.clone())
            .database(database.clone())
            .build()
            .unwrap(),
        server_b: ServerBuilder::new(config).database(database).build().unwrap(),
    }
}

impl Deployment {
    fn responses(&self, indices: &[i64]) -> (PirResponse, PirResponse, dpf_pir::core::ClientState) {
        let (r1, r2, state) = self.client.create_plain_requests(indices).unwrap();
        let a = self.server_a.handle_request(&r1.to_bytes().unwrap()).unwrap();
        let b = self.server_b.handle_request(&r2.to_bytes().unwrap()).unwrap();
        (a, b, state)
    }

    fn retrieve(&self, indices: &[i64]) -> Vec<Vec<u8>> {
        let (a, b, state) = self.responses(indices);
        self.client.handle_response(&a, &b, &state).unwrap()
    }
}

/// N=4 counting strings, index 1
#[test]
fn test_single_index_retrieval() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::Records);
    assert_eq!(deployment.retrieve(&[1]), vec![b"Element1".to_vec()]);
}

/// N=4 counting strings, indices 0 and 2, joined output
#[test]
fn test_multi_index_joined_output() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::joined());
    let (a, b, state) = deployment.responses(&[0, 2]);
    let output = deployment.client.handle_response_output(&a, &b, &state).unwrap();
    assert_eq!(output, RetrievedOutput::Joined("Element0, Element2".to_string()));
}

/// N=100 records "Element {i}", index 5
#[test]
fn test_hundred_records() {
    let deployment = deploy(counting_database("Element ", 100).unwrap(), OutputMode::Records);
    assert_eq!(deployment.retrieve(&[5]), vec![b"Element 5".to_vec()]);
    assert_eq!(deployment.retrieve(&[99]), vec![b"Element 99".to_vec()]);
}

/// Every index of a non-power-of-two database, plus repeats in one request
#[test]
fn test_every_index_and_repeats() {
    let deployment = deploy(counting_database("Element", 13).unwrap(), OutputMode::Records);
    let indices: Vec<i64> = (0..13).collect();
    assert_eq!(deployment.retrieve(&indices), counting_records("Element", 13));

    let repeated = deployment.retrieve(&[7, 7, 3, 7]);
    assert_eq!(
        repeated,
        vec![
            b"Element7".to_vec(),
            b"Element7".to_vec(),
            b"Element3".to_vec(),
            b"Element7".to_vec()
        ]
    );
}

/// Single-record database still works with a one-bit domain
#[test]
fn test_single_record_database() {
    let deployment = deploy(counting_database("only", 1).unwrap(), OutputMode::Records);
    assert_eq!(deployment.retrieve(&[0]), vec![b"only0".to_vec()]);
}

/// Records of different lengths, including empty and binary, come back exactly
#[test]
fn test_variable_length_records() {
    let mut builder = dpf_pir::core::DatabaseBuilder::new();
    builder
        .insert("")
        .insert("a somewhat longer record that spans several blocks")
        .insert(vec![0u8, 255, 0, 1])
        .insert("x");
    let deployment = deploy(builder.build().unwrap(), OutputMode::Records);

    let records = deployment.retrieve(&[0, 1, 2, 3]);
    assert_eq!(records[0], b"");
    assert_eq!(records[1], b"a somewhat longer record that spans several blocks");
    assert_eq!(records[2], vec![0u8, 255, 0, 1]);
    assert_eq!(records[3], b"x");
}

/// Indices outside [0, N) produce no requests
#[test]
fn test_out_of_range_indices_rejected() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::Records);
    for indices in [vec![-1i64], vec![4], vec![1, 4]] {
        let err = deployment.client.create_plain_requests(&indices).unwrap_err();
        assert_eq!(err.kind(), StatusKind::InvalidArgument, "{:?}", indices);
    }
}

/// Responses of different arity or width are rejected without partial output
#[test]
fn test_mismatched_responses_rejected() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::Records);
    let (a, b, state) = deployment.responses(&[0, 1]);

    let mut short = b.clone();
    short.masked_values.pop();
    let err = deployment.client.handle_response(&a, &short, &state).unwrap_err();
    assert_eq!(err.kind(), StatusKind::InvalidArgument);

    let mut narrow = b.clone();
    narrow.masked_values[1].pop();
    let err = deployment.client.handle_response(&a, &narrow, &state).unwrap_err();
    assert_eq!(err.kind(), StatusKind::InvalidArgument);
}

/// Swapping requests between servers still reconstructs the record
#[test]
fn test_server_order_does_not_matter() {
    let deployment = deploy(counting_database("Element", 8).unwrap(), OutputMode::Records);
    let (r1, r2, state) = deployment.client.create_plain_requests(&[6]).unwrap();
    let a = deployment.server_a.handle_request(&r2.to_bytes().unwrap()).unwrap();
    let b = deployment.server_b.handle_request(&r1.to_bytes().unwrap()).unwrap();
    assert_eq!(
        deployment.client.handle_response(&a, &b, &state).unwrap(),
        vec![b"Element6".to_vec()]
    );
}

/// A single server's response alone does not reveal the record
#[test]
fn test_single_response_is_masked() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::Records);
    let (a, _, _) = deployment.responses(&[1]);
    let framed = &a.masked_values[0];
    assert!(!framed.windows(8).any(|w| w == b"Element1"));
}

/// Requests and responses survive the base64/JSON text framing
#[test]
fn test_text_framing_pipeline() {
    let deployment = deploy(counting_database("Element", 4).unwrap(), OutputMode::Records);
    let (r1, r2, state) = deployment.client.create_plain_requests(&[3]).unwrap();

    let json = RequestPair::encode(&r1, &r2).unwrap().to_json().unwrap();
    let (bytes1, bytes2) = RequestPair::from_json(&json).unwrap().request_bytes().unwrap();

    let responses = ResponsePair::encode(
        &deployment.server_a.handle_request(&bytes1).unwrap(),
        &deployment.server_b.handle_request(&bytes2).unwrap(),
    )
    .unwrap();
    let (a, b) = ResponsePair::from_json(&responses.to_json().unwrap())
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(
        deployment.client.handle_response(&a, &b, &state).unwrap(),
        vec![b"Element3".to_vec()]
    );
}

/// Many threads share one server
#[test]
fn test_concurrent_requests() {
    let deployment = Arc::new(deploy(
        counting_database("Element", 32).unwrap(),
        OutputMode::Records,
    ));

    let handles: Vec<_> = (0..8i64)
        .map(|t| {
            let deployment = deployment.clone();
            std::thread::spawn(move || {
                for round in 0..4i64 {
                    let index = (t * 4 + round) % 32;
                    let records = deployment.retrieve(&[index]);
                    assert_eq!(records, vec![format!("Element{}", index).into_bytes()]);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }
}

/// Bit frequencies of request1 look the same whichever index is queried
#[test]
fn test_single_request_is_index_independent() {
    let client = ClientBuilder::new(16).build().unwrap();
    let trials = 400;

    let bit_frequencies = |index: i64| -> Vec<f64> {
        let mut counts: Vec<u32> = Vec::new();
        for _ in 0..trials {
            let (r1, _, _) = client.create_plain_requests(&[index]).unwrap();
            let bytes = r1.to_bytes().unwrap();
            if counts.is_empty() {
                counts = vec![0; bytes.len() * 8];
            }
            assert_eq!(counts.len(), bytes.len() * 8);
            for (i, byte) in bytes.iter().enumerate() {
                for bit in 0..8 {
                    counts[i * 8 + bit] += ((byte >> bit) & 1) as u32;
                }
            }
        }
        counts.iter().map(|&c| c as f64 / trials as f64).collect()
    };

    let low = bit_frequencies(0);
    let high = bit_frequencies(15);
    assert_eq!(low.len(), high.len());
    for (bit, (a, b)) in low.iter().zip(&high).enumerate() {
        assert!((a - b).abs() < 0.2, "bit {} differs: {} vs {}", bit, a, b);
    }
}

/// Configuration saved by one side loads identically on the other
#[test]
fn test_config_file_shared_by_client_and_server() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pir.json");
    PirConfig::new(4).with_delimiter(" / ").save(&path).unwrap();

    let config = PirConfig::load(&path).unwrap();
    let server_a = ServerBuilder::new(config.clone())
        .database(counting_database("Element", 4).unwrap())
        .build()
        .unwrap();
    let server_b = ServerBuilder::new(config.clone())
        .database(counting_database("Element", 4).unwrap())
        .build()
        .unwrap();
    let client = ClientBuilder::from_config(&config)
        .output_mode(OutputMode::Joined {
            delimiter: config.joined_delimiter.clone(),
        })
        .build()
        .unwrap();

    let (r1, r2, state) = client.create_plain_requests(&[3, 0]).unwrap();
    let a = server_a.handle_request(&r1.to_bytes().unwrap()).unwrap();
    let b = server_b.handle_request(&r2.to_bytes().unwrap()).unwrap();
    assert_eq!(
        client.handle_response_output(&a, &b, &state).unwrap(),
        RetrievedOutput::Joined("Element3 / Element0".to_string())
    );
}

/// Items in a cuckoo table come back by privately fetching both buckets
#[test]
fn test_cuckoo_item_retrieved_from_its_buckets() {
    let item_size = 16;
    let table = CuckooTable::new(32, 4, item_size, *b"bucket-key-1", *b"bucket-key-2", 7).unwrap();
    let store = BucketStore::new(table).unwrap();

    let config = PirConfig::new(store.num_buckets() as u64);
    let server_a = ServerBuilder::new(config.clone())
        .store(store.records())
        .build()
        .unwrap();
    let server_b = ServerBuilder::new(config.clone())
        .store(store.records())
        .build()
        .unwrap();
    let client = ClientBuilder::from_config(&config).build().unwrap();

    let items = (0..40u64).map(|i| (i, 1000 + i, format!("item-{:011}", i).into_bytes()));
    store.batch_insert(items).unwrap();

    let (b1, b2) = store.buckets_for(1017).unwrap();
    let (r1, r2, state) = client
        .create_plain_requests(&[b1 as i64, b2 as i64])
        .unwrap();
    let a = server_a.handle_request(&r1.to_bytes().unwrap()).unwrap();
    let b = server_b.handle_request(&r2.to_bytes().unwrap()).unwrap();
    let buckets = client.handle_response(&a, &b, &state).unwrap();

    assert!(buckets.iter().all(|bucket| bucket.len() == 4 * item_size));
    assert!(buckets
        .iter()
        .flat_map(|bucket| bucket.chunks(item_size))
        .any(|chunk| chunk == b"item-00000000017"));
}
